//! Census Data API client for ACS 5-year tract estimates.
//!
//! One request per county fetches every variable in
//! [`ACS_VARIABLES`](zcta_census_models::ACS_VARIABLES) for all tracts:
//!
//! `GET {base}/{year}/acs/acs5?get=B25064_001E,...&for=tract:*&in=state:04 county:013`
//!
//! The response is a JSON array of arrays whose first row is the header.

use zcta_census_models::{RawCounts, TractFeatureRow, is_supported_year, variable_codes};
use zcta_metro_models::CountyRef;
use zcta_metro_models::fips::{is_county_fips, is_state_fips, zero_pad};
use zcta_source::progress::ProgressCallback;
use zcta_source::{HttpSettings, retry};

use crate::features::{CommuteBins, derive};
use crate::{AcsSettings, CensusError};

/// Fetches and derives tract rows from the Census Data API.
pub struct AcsClient {
    client: reqwest::Client,
    settings: AcsSettings,
    bins: CommuteBins,
    max_retries: u32,
}

impl AcsClient {
    /// Creates a client after validating the configured year.
    ///
    /// # Errors
    ///
    /// Returns [`CensusError::InvalidYear`] for an unsupported vintage or
    /// [`CensusError::Fetch`] if the HTTP client cannot be built.
    pub fn new(
        http: &HttpSettings,
        settings: AcsSettings,
        bins: CommuteBins,
    ) -> Result<Self, CensusError> {
        if !is_supported_year(settings.year) {
            return Err(CensusError::InvalidYear {
                year: settings.year,
            });
        }
        let client = http.build_client().map_err(|source| CensusError::Fetch {
            label: "Census API client".to_string(),
            source,
        })?;
        Ok(Self {
            client,
            settings,
            bins,
            max_retries: http.max_retries,
        })
    }

    /// The ACS vintage this client requests.
    #[must_use]
    pub const fn year(&self) -> u16 {
        self.settings.year
    }

    /// Fetches every tract of one county.
    ///
    /// # Errors
    ///
    /// Returns [`CensusError`] if a FIPS code is malformed, the request
    /// fails, the response is not a header-plus-rows table, or it
    /// contains no tracts.
    pub async fn fetch_county(
        &self,
        state_fips: &str,
        county_fips: &str,
    ) -> Result<Vec<TractFeatureRow>, CensusError> {
        validate_fips(state_fips, county_fips)?;
        let label = format!("state {state_fips} county {county_fips} ({})", self.settings.year);

        let mut params = vec![
            ("get", variable_codes()),
            ("for", "tract:*".to_string()),
            ("in", format!("state:{state_fips} county:{county_fips}")),
        ];
        if let Some(key) = self.settings.api_key.as_deref().filter(|k| !k.is_empty()) {
            params.push(("key", key.to_string()));
        }

        let url = self.settings.endpoint();
        log::debug!("GET {url} for {label}");
        let json = retry::send_json(|| self.client.get(&url).query(&params), self.max_retries)
            .await
            .map_err(|source| CensusError::Fetch {
                label: label.clone(),
                source,
            })?;

        let tracts = parse_response(&json, &label)?;
        log::info!("ACS {label}: {} tracts", tracts.len());

        Ok(tracts
            .into_iter()
            .map(|(geoid, raw)| {
                let features = derive(&raw, &self.bins);
                TractFeatureRow {
                    geoid,
                    year: self.settings.year,
                    raw,
                    features,
                }
            })
            .collect())
    }

    /// Fetches every county in order and concatenates the rows.
    ///
    /// The first failing county aborts the whole fetch; partial results
    /// are never returned.
    ///
    /// # Errors
    ///
    /// Returns the first [`CensusError`] encountered.
    pub async fn fetch_counties(
        &self,
        counties: &[CountyRef],
        progress: &dyn ProgressCallback,
    ) -> Result<Vec<TractFeatureRow>, CensusError> {
        progress.set_total(counties.len() as u64);
        let mut rows = Vec::new();
        for county in counties {
            progress.set_message(format!("ACS {}", county.label()));
            rows.extend(
                self.fetch_county(&county.state_fips, &county.county_fips)
                    .await?,
            );
            progress.inc(1);
        }
        progress.finish(format!("{} ACS tract rows", rows.len()));
        Ok(rows)
    }
}

/// Rejects malformed state/county FIPS codes before any request.
///
/// # Errors
///
/// Returns [`CensusError::InvalidFips`] describing the bad code.
pub fn validate_fips(state_fips: &str, county_fips: &str) -> Result<(), CensusError> {
    if !is_state_fips(state_fips) {
        return Err(CensusError::InvalidFips {
            message: format!("state '{state_fips}' must be a two-digit state code (e.g. '04')"),
        });
    }
    if !is_county_fips(county_fips) {
        return Err(CensusError::InvalidFips {
            message: format!("county '{county_fips}' must be three digits (e.g. '013')"),
        });
    }
    Ok(())
}

/// Parses a Census API table into `(geoid, counts)` pairs.
///
/// The first row is the header. `state`, `county`, and `tract` columns
/// are zero-padded and concatenated into the eleven-digit GEOID.
///
/// # Errors
///
/// Returns [`CensusError::Malformed`] if the table shape is wrong or a
/// geography column is missing, and [`CensusError::Empty`] if there are
/// no data rows.
pub fn parse_response(
    json: &serde_json::Value,
    label: &str,
) -> Result<Vec<(String, RawCounts)>, CensusError> {
    let malformed = |message: String| CensusError::Malformed {
        label: label.to_string(),
        message,
    };

    let table = json
        .as_array()
        .ok_or_else(|| malformed("response is not an array".to_string()))?;
    let Some((header, rows)) = table.split_first() else {
        return Err(malformed("response has no header row".to_string()));
    };
    let header: Vec<&str> = header
        .as_array()
        .ok_or_else(|| malformed("header row is not an array".to_string()))?
        .iter()
        .map(|h| h.as_str().unwrap_or_default())
        .collect();

    let column = |name: &str| {
        header
            .iter()
            .position(|h| *h == name)
            .ok_or_else(|| malformed(format!("missing '{name}' column")))
    };
    let state_col = column("state")?;
    let county_col = column("county")?;
    let tract_col = column("tract")?;

    if rows.is_empty() {
        return Err(CensusError::Empty {
            label: label.to_string(),
        });
    }

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let cells = row
                .as_array()
                .filter(|cells| cells.len() == header.len())
                .ok_or_else(|| malformed(format!("row {} does not match the header", i + 1)))?;

            let geo_part = |col: usize, width: usize| {
                cell_str(&cells[col])
                    .map(|s| zero_pad(&s, width))
                    .ok_or_else(|| malformed(format!("row {} has an empty {}", i + 1, header[col])))
            };
            let geoid = format!(
                "{}{}{}",
                geo_part(state_col, 2)?,
                geo_part(county_col, 3)?,
                geo_part(tract_col, 6)?
            );

            let mut raw = RawCounts::default();
            for (name, cell) in header.iter().zip(cells) {
                if let Some(slot) = raw.slot_mut(name) {
                    *slot = parse_value(cell);
                }
            }
            Ok((geoid, raw))
        })
        .collect()
}

/// Parses one estimate cell.
///
/// The API returns numbers as strings. Negative values are Census
/// missing-data sentinels (`-666666666` and friends) and become `None`,
/// as do nulls and unparseable cells.
#[must_use]
pub fn parse_value(cell: &serde_json::Value) -> Option<f64> {
    let value = match cell {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (value.is_finite() && value >= 0.0).then_some(value)
}

fn cell_str(cell: &serde_json::Value) -> Option<String> {
    match cell {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
