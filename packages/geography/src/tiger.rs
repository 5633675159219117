//! CBSA, ZCTA, and census tract boundaries from the Census Bureau
//! `TIGERweb` REST API.
//!
//! Every query asks for `f=geojson&outSR=4326` so geometries arrive as
//! WGS84 longitude/latitude `GeoJSON`. Large layers are paginated with
//! `resultOffset` + `resultRecordCount` until `ArcGIS` stops reporting
//! `exceededTransferLimit`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use zcta_geography_models::{GeographyLevel, GeometryRecord};
use zcta_metro_models::CountyRef;
use zcta_metro_models::fips::zero_pad;
use zcta_source::progress::ProgressCallback;
use zcta_source::{HttpSettings, retry, truncate_for_log};

use crate::GeoError;
use crate::geometry::parse_geometry;

/// Page size for `TIGERweb` paginated requests. Kept low to avoid WAF
/// blocks on large geospatial responses.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Courtesy delay between successive pages and counties.
const PAGE_DELAY: std::time::Duration = std::time::Duration::from_millis(100);

/// `TIGERweb` layer query URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TigerEndpoints {
    /// CBSA layer query endpoint.
    pub cbsa_url: String,
    /// ZCTA layer query endpoint.
    pub zcta_url: String,
    /// Census tract layer query endpoint.
    pub tract_url: String,
    /// Features requested per page.
    pub page_size: u32,
}

impl Default for TigerEndpoints {
    fn default() -> Self {
        Self {
            cbsa_url: "https://tigerweb.geo.census.gov/arcgis/rest/services/TIGERweb/CBSA/MapServer/15/query".to_string(),
            zcta_url: "https://tigerweb.geo.census.gov/arcgis/rest/services/TIGERweb/tigerWMS_ACS2024/MapServer/2/query".to_string(),
            tract_url: "https://tigerweb.geo.census.gov/arcgis/rest/services/TIGERweb/Tracts_Blocks/MapServer/7/query".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Downloads boundary geometries for a metro.
pub struct TigerFetcher {
    client: reqwest::Client,
    endpoints: TigerEndpoints,
    max_retries: u32,
}

impl TigerFetcher {
    /// Creates a fetcher with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Fetch`] if the HTTP client cannot be built.
    pub fn new(http: &HttpSettings, endpoints: TigerEndpoints) -> Result<Self, GeoError> {
        let client = http.build_client().map_err(|source| GeoError::Fetch {
            label: "TIGERweb client".to_string(),
            source,
        })?;
        Ok(Self::with_client(client, http.max_retries, endpoints))
    }

    /// Creates a fetcher around an existing client.
    #[must_use]
    pub const fn with_client(
        client: reqwest::Client,
        max_retries: u32,
        endpoints: TigerEndpoints,
    ) -> Self {
        Self {
            client,
            endpoints,
            max_retries,
        }
    }

    /// Fetches the boundary polygon of one CBSA.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the request fails, `TIGERweb` reports an
    /// error, the geometry is malformed, or no CBSA matches `cbsa_code`.
    pub async fn fetch_cbsa(&self, cbsa_code: &str) -> Result<GeometryRecord, GeoError> {
        let label = format!("CBSA {cbsa_code}");
        log::info!("Fetching {label} boundary...");

        let where_clause = format!("CBSA='{cbsa_code}'");
        let features = self
            .fetch_paginated(&self.endpoints.cbsa_url, &where_clause, "CBSA,NAME", &label)
            .await?;
        let records = features_to_records(&features, GeographyLevel::Cbsa, &label, "CBSA")?;

        let mut records = records.into_iter();
        let Some(mut record) = records.next() else {
            return Err(GeoError::Empty { label });
        };
        // A CBSA split across pages would arrive as several features.
        for extra in records {
            record.geometry.0.extend(extra.geometry.0);
        }
        record.id = cbsa_code.to_string();
        log::info!(
            "{label}: {} ({} polygon parts)",
            record.name.as_deref().unwrap_or("unnamed"),
            record.geometry.0.len()
        );
        Ok(record)
    }

    /// Fetches every ZCTA whose code starts with one of `prefixes`.
    ///
    /// Results are deduplicated by ZCTA code and returned sorted.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if any page fails or no ZCTA matches.
    pub async fn fetch_zctas(&self, prefixes: &[String]) -> Result<Vec<GeometryRecord>, GeoError> {
        let label = format!("ZCTAs with prefixes {}", prefixes.join(","));
        log::info!("Fetching {label}...");

        let where_clause = zcta_where_clause(prefixes);
        let features = self
            .fetch_paginated(
                &self.endpoints.zcta_url,
                &where_clause,
                "ZCTA5,GEOID,NAME",
                &label,
            )
            .await?;
        let records = features_to_records(&features, GeographyLevel::Zcta, &label, "ZCTA5")?;

        let mut by_code: BTreeMap<String, GeometryRecord> = BTreeMap::new();
        for mut record in records {
            record.id = zero_pad(&record.id, 5);
            by_code.entry(record.id.clone()).or_insert(record);
        }

        if by_code.is_empty() {
            return Err(GeoError::Empty { label });
        }
        log::info!("{label}: {} unique ZCTAs", by_code.len());
        Ok(by_code.into_values().collect())
    }

    /// Fetches tracts for each county, concatenated in county order.
    ///
    /// Each county is queried independently. A county with no tracts is
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] on the first county that fails.
    pub async fn fetch_tracts(
        &self,
        counties: &[CountyRef],
        progress: &dyn ProgressCallback,
    ) -> Result<Vec<GeometryRecord>, GeoError> {
        progress.set_total(counties.len() as u64);
        let mut all = Vec::new();

        for (i, county) in counties.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(PAGE_DELAY).await;
            }
            let label = format!("tracts for {}", county.label());
            progress.set_message(label.clone());
            log::info!("Fetching {label}...");

            let where_clause = format!(
                "STATE='{}' AND COUNTY='{}'",
                county.state_fips, county.county_fips
            );
            let features = self
                .fetch_paginated(
                    &self.endpoints.tract_url,
                    &where_clause,
                    "GEOID,STATE,COUNTY,NAME",
                    &label,
                )
                .await?;
            let records = features_to_records(&features, GeographyLevel::Tract, &label, "GEOID")?;
            if records.is_empty() {
                return Err(GeoError::Empty { label });
            }

            log::info!("{label}: {} tracts", records.len());
            all.extend(records.into_iter().map(|mut r| {
                r.id = zero_pad(&r.id, 11);
                r.state_fips.get_or_insert_with(|| county.state_fips.clone());
                r.county_fips
                    .get_or_insert_with(|| county.county_fips.clone());
                r
            }));
            progress.inc(1);
        }

        progress.finish(format!("{} tracts", all.len()));
        Ok(all)
    }

    /// Fetches all features matching `where_clause`, one page at a time.
    async fn fetch_paginated(
        &self,
        url: &str,
        where_clause: &str,
        out_fields: &str,
        label: &str,
    ) -> Result<Vec<serde_json::Value>, GeoError> {
        let page_size = self.endpoints.page_size.max(1);
        let mut all_features = Vec::new();
        let mut offset = 0u32;

        loop {
            let params = [
                ("where", where_clause.to_string()),
                ("outFields", out_fields.to_string()),
                ("returnGeometry", "true".to_string()),
                ("outSR", "4326".to_string()),
                ("f", "geojson".to_string()),
                ("resultOffset", offset.to_string()),
                ("resultRecordCount", page_size.to_string()),
            ];

            let json = retry::send_json(|| self.client.get(url).query(&params), self.max_retries)
                .await
                .map_err(|source| GeoError::Fetch {
                    label: format!("{label} (offset={offset})"),
                    source,
                })?;

            let (features, exceeded) = parse_page(json, label, offset)?;
            if features.is_empty() {
                break;
            }

            #[allow(clippy::cast_possible_truncation)]
            let page_len = features.len() as u32;
            all_features.extend(features);

            if !exceeded {
                break;
            }

            offset += page_len;
            log::info!(
                "{label}: fetched {page_len} features (total so far: {}), fetching next page...",
                all_features.len()
            );
            tokio::time::sleep(PAGE_DELAY).await;
        }

        Ok(all_features)
    }
}

/// Builds `ZCTA5 LIKE '85%' OR ZCTA5 LIKE '86%'`.
fn zcta_where_clause(prefixes: &[String]) -> String {
    prefixes
        .iter()
        .map(|p| format!("ZCTA5 LIKE '{p}%'"))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Splits one `TIGERweb` page into its features and whether more pages
/// exist, rejecting `ArcGIS` error envelopes.
fn parse_page(
    mut json: serde_json::Value,
    label: &str,
    offset: u32,
) -> Result<(Vec<serde_json::Value>, bool), GeoError> {
    // ArcGIS error envelope: {"error": {"code": 500, "message": "..."}}
    if let Some(error_obj) = json.get("error") {
        let code = error_obj
            .get("code")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0);
        let message = error_obj
            .get("message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        log::error!(
            "{label} (offset={offset}): ArcGIS error {code}. Full error: {}",
            truncate_for_log(&error_obj.to_string(), 500)
        );
        return Err(GeoError::Arcgis {
            label: label.to_string(),
            code,
            message,
        });
    }

    // ArcGIS reports the flag at the top level for f=json and sometimes
    // under "properties" for f=geojson.
    let exceeded = json
        .get("exceededTransferLimit")
        .or_else(|| json.pointer("/properties/exceededTransferLimit"))
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);

    let Some(serde_json::Value::Array(features)) =
        json.get_mut("features").map(serde_json::Value::take)
    else {
        return Err(GeoError::Malformed {
            label: label.to_string(),
            message: format!(
                "no features array (offset={offset}): {}",
                truncate_for_log(&json.to_string(), 500)
            ),
        });
    };

    Ok((features, exceeded))
}

/// Converts `GeoJSON` features into [`GeometryRecord`]s.
///
/// `id_field` names the property holding the identifier. Any feature with
/// a missing identifier or a non-polygon geometry fails the whole batch.
fn features_to_records(
    features: &[serde_json::Value],
    level: GeographyLevel,
    label: &str,
    id_field: &str,
) -> Result<Vec<GeometryRecord>, GeoError> {
    features
        .iter()
        .enumerate()
        .map(|(i, feature)| {
            let props = &feature["properties"];
            let id = prop_string(props, id_field).ok_or_else(|| GeoError::Malformed {
                label: label.to_string(),
                message: format!("feature {i} has no {id_field} property"),
            })?;
            let geometry =
                parse_geometry(&feature["geometry"]).ok_or_else(|| GeoError::Malformed {
                    label: label.to_string(),
                    message: format!("{level} {id} has a missing or non-polygon geometry"),
                })?;

            let mut record = GeometryRecord::new(id, level, geometry);
            record.name = prop_string(props, "NAME");
            if level == GeographyLevel::Tract {
                record.state_fips = prop_string(props, "STATE");
                record.county_fips = prop_string(props, "COUNTY");
            }
            Ok(record)
        })
        .collect()
}

/// Reads a property that `TIGERweb` may encode as a string or a number.
fn prop_string(props: &serde_json::Value, key: &str) -> Option<String> {
    match props.get(key)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square_feature(props: serde_json::Value) -> serde_json::Value {
        json!({
            "type": "Feature",
            "properties": props,
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[-112.0, 33.0], [-111.9, 33.0], [-111.9, 33.1], [-112.0, 33.1], [-112.0, 33.0]]]
            }
        })
    }

    #[test]
    fn where_clause_ors_prefixes() {
        let prefixes = vec!["38".to_string(), "72".to_string()];
        assert_eq!(
            zcta_where_clause(&prefixes),
            "ZCTA5 LIKE '38%' OR ZCTA5 LIKE '72%'"
        );
    }

    #[test]
    fn page_reports_transfer_limit() {
        let page = json!({
            "type": "FeatureCollection",
            "features": [square_feature(json!({"ZCTA5": "85004"}))],
            "exceededTransferLimit": true
        });
        let (features, exceeded) = parse_page(page, "test", 0).unwrap();
        assert_eq!(features.len(), 1);
        assert!(exceeded);

        let page = json!({
            "type": "FeatureCollection",
            "features": [],
            "properties": {"exceededTransferLimit": false}
        });
        let (features, exceeded) = parse_page(page, "test", 100).unwrap();
        assert!(features.is_empty());
        assert!(!exceeded);
    }

    #[test]
    fn arcgis_error_envelope_is_an_error() {
        let page = json!({"error": {"code": 400, "message": "Invalid query"}});
        let err = parse_page(page, "ZCTAs", 0).unwrap_err();
        match err {
            GeoError::Arcgis { code, message, .. } => {
                assert_eq!(code, 400);
                assert_eq!(message, "Invalid query");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_features_array_is_malformed() {
        let err = parse_page(json!({"type": "FeatureCollection"}), "x", 0).unwrap_err();
        assert!(matches!(err, GeoError::Malformed { .. }));
    }

    #[test]
    fn tract_features_keep_county_attribution() {
        let features = vec![square_feature(json!({
            "GEOID": "04013010101",
            "STATE": "04",
            "COUNTY": "013",
            "NAME": "Census Tract 101.01"
        }))];
        let records =
            features_to_records(&features, GeographyLevel::Tract, "tracts", "GEOID").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "04013010101");
        assert_eq!(records[0].state_fips.as_deref(), Some("04"));
        assert_eq!(records[0].county_fips.as_deref(), Some("013"));
        assert_eq!(records[0].name.as_deref(), Some("Census Tract 101.01"));
    }

    #[test]
    fn numeric_ids_and_bad_geometry() {
        let features = vec![square_feature(json!({"ZCTA5": 85004}))];
        let records =
            features_to_records(&features, GeographyLevel::Zcta, "zctas", "ZCTA5").unwrap();
        assert_eq!(records[0].id, "85004");

        let bad = vec![json!({"properties": {"ZCTA5": "85004"}, "geometry": null})];
        assert!(matches!(
            features_to_records(&bad, GeographyLevel::Zcta, "zctas", "ZCTA5"),
            Err(GeoError::Malformed { .. })
        ));

        let no_id = vec![square_feature(json!({"NAME": "x"}))];
        assert!(features_to_records(&no_id, GeographyLevel::Zcta, "zctas", "ZCTA5").is_err());
    }

    #[test]
    fn default_endpoints_request_geojson_layers() {
        let endpoints = TigerEndpoints::default();
        assert!(endpoints.zcta_url.contains("tigerWMS_ACS2024/MapServer/2"));
        assert!(endpoints.tract_url.contains("Tracts_Blocks/MapServer/7"));
        assert_eq!(endpoints.page_size, DEFAULT_PAGE_SIZE);
    }
}
