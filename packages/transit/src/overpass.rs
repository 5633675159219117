//! OpenStreetMap Overpass API feature counts.
//!
//! One query per ZCTA and tag filter, unioning a `nwr` statement per
//! exterior ring:
//!
//! ```text
//! [out:json][timeout:180];
//! (
//!   nwr["highway"="bus_stop"](poly:"33.45 -112.07 33.46 -112.07 ...");
//! );
//! out count;
//! ```
//!
//! The union removes duplicates, and `out count` answers with a single
//! `count` element whose `tags.total` is the number of distinct features.
//! Overpass `poly` filters have no holes, so interior rings are ignored.

use geo::MultiPolygon;
use zcta_source::{HttpSettings, SourceError, retry, truncate_for_log};

use crate::{TransitError, TransitFeatureSource, TransitSettings};

/// Counts features through an Overpass interpreter.
pub struct OverpassSource {
    client: reqwest::Client,
    url: String,
    query_timeout_secs: u64,
    max_retries: u32,
}

impl OverpassSource {
    /// Creates a source with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`TransitError::Client`] if the HTTP client cannot be
    /// built.
    pub fn new(http: &HttpSettings, settings: &TransitSettings) -> Result<Self, TransitError> {
        Ok(Self {
            client: http.build_client()?,
            url: settings.overpass_url.clone(),
            query_timeout_secs: settings.query_timeout_secs,
            max_retries: http.max_retries,
        })
    }
}

#[async_trait::async_trait]
impl TransitFeatureSource for OverpassSource {
    async fn count(
        &self,
        polygon: &MultiPolygon<f64>,
        tag_filter: &str,
    ) -> Result<u64, SourceError> {
        let Some(query) = build_query(polygon, tag_filter, self.query_timeout_secs) else {
            return Ok(0);
        };
        log::trace!("Overpass query: {}", truncate_for_log(&query, 300));

        let json = retry::send_json(
            || self.client.post(&self.url).form(&[("data", query.as_str())]),
            self.max_retries,
        )
        .await?;

        count_total(&json)
    }
}

/// Builds the Overpass QL query, or `None` if the polygon has no usable
/// ring.
#[must_use]
pub fn build_query(polygon: &MultiPolygon<f64>, tag_filter: &str, timeout_secs: u64) -> Option<String> {
    let statements: Vec<String> = polygon
        .0
        .iter()
        .filter_map(|p| poly_filter(p.exterior()))
        .map(|poly| format!("  nwr{tag_filter}(poly:\"{poly}\");"))
        .collect();

    if statements.is_empty() {
        return None;
    }

    Some(format!(
        "[out:json][timeout:{timeout_secs}];\n(\n{}\n);\nout count;",
        statements.join("\n")
    ))
}

/// `"lat lon lat lon ..."` for a ring, without the closing vertex.
fn poly_filter(ring: &geo::LineString<f64>) -> Option<String> {
    let mut coords: Vec<_> = ring.coords().collect();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    if coords.len() < 3 {
        return None;
    }
    Some(
        coords
            .iter()
            .map(|c| format!("{:.6} {:.6}", c.y, c.x))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// Feature total from an `out count` response.
///
/// # Errors
///
/// Returns [`SourceError::Response`] if the server reported a runtime
/// error (Overpass answers these with HTTP 200 and a `remark`) or the
/// body has no `count` element with a numeric `tags.total`.
pub fn count_total(json: &serde_json::Value) -> Result<u64, SourceError> {
    if let Some(remark) = json.get("remark").and_then(serde_json::Value::as_str)
        && remark.contains("error")
    {
        return Err(SourceError::Response {
            message: format!("Overpass: {remark}"),
        });
    }

    let total = json
        .get("elements")
        .and_then(serde_json::Value::as_array)
        .and_then(|elements| {
            elements
                .iter()
                .find(|e| e.get("type").and_then(serde_json::Value::as_str) == Some("count"))
        })
        .and_then(|count| count.get("tags")?.get("total"));

    total
        .and_then(|total| match total {
            serde_json::Value::String(s) => s.trim().parse().ok(),
            other => other.as_u64(),
        })
        .ok_or_else(|| SourceError::Response {
            message: "Overpass response has no count total".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use geo::{LineString, Polygon};
    use serde_json::json;

    use super::*;
    use crate::DEFAULT_FALLBACK_FILTER;

    fn triangle() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![
                (-112.0, 33.0),
                (-111.9, 33.0),
                (-112.0, 33.1),
                (-112.0, 33.0),
            ]),
            vec![],
        )])
    }

    #[test]
    fn query_lists_lat_lon_pairs_without_closing_vertex() {
        let query = build_query(&triangle(), DEFAULT_FALLBACK_FILTER, 60).unwrap();
        assert!(query.starts_with("[out:json][timeout:60];"));
        assert!(query.contains(
            r#"nwr["highway"="bus_stop"](poly:"33.000000 -112.000000 33.000000 -111.900000 33.100000 -112.000000");"#
        ));
        assert!(query.ends_with("out count;"));
    }

    #[test]
    fn one_statement_per_part() {
        let mut mp = triangle();
        mp.0.push(triangle().0.remove(0));
        let query = build_query(&mp, DEFAULT_FALLBACK_FILTER, 60).unwrap();
        assert_eq!(query.matches("nwr").count(), 2);
    }

    #[test]
    fn empty_polygon_has_no_query() {
        assert!(build_query(&MultiPolygon::new(vec![]), DEFAULT_FALLBACK_FILTER, 60).is_none());
    }

    #[test]
    fn reads_count_total_and_detects_runtime_errors() {
        let ok = json!({
            "elements": [{
                "type": "count",
                "id": 0,
                "tags": {"nodes": "3", "ways": "1", "relations": "0", "total": "4"}
            }]
        });
        assert_eq!(count_total(&ok).unwrap(), 4);

        let none = json!({
            "elements": [{"type": "count", "id": 0, "tags": {"total": "0"}}]
        });
        assert_eq!(count_total(&none).unwrap(), 0);

        let timed_out = json!({
            "elements": [],
            "remark": "runtime error: Query timed out in \"query\" at line 3 after 181 seconds."
        });
        assert!(count_total(&timed_out).is_err());
        assert!(count_total(&json!({"elements": []})).is_err());
        assert!(count_total(&json!({"foo": 1})).is_err());
    }
}
