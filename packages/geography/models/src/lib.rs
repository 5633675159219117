#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry records for CBSAs, ZCTAs, and census tracts.
//!
//! All geometries are `MultiPolygon<f64>` in WGS84 longitude/latitude.
//! Projection to a metric CRS happens only where areas or centroids are
//! computed.

use std::fmt;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// The geographic unit a [`GeometryRecord`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeographyLevel {
    /// Core-Based Statistical Area (metro boundary).
    Cbsa,
    /// ZIP Code Tabulation Area.
    Zcta,
    /// Census tract.
    Tract,
}

impl GeographyLevel {
    /// Short lowercase label used in logs and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cbsa => "cbsa",
            Self::Zcta => "zcta",
            Self::Tract => "tract",
        }
    }
}

impl fmt::Display for GeographyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One boundary polygon fetched from `TIGERweb`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryRecord {
    /// CBSA code, five-digit ZCTA code, or eleven-digit tract GEOID.
    pub id: String,
    /// Which geography this record describes.
    pub level: GeographyLevel,
    /// Display name from `TIGERweb`, if provided.
    pub name: Option<String>,
    /// Two-digit state FIPS (tracts only).
    pub state_fips: Option<String>,
    /// Three-digit county FIPS (tracts only).
    pub county_fips: Option<String>,
    /// Boundary in longitude/latitude.
    pub geometry: MultiPolygon<f64>,
}

impl GeometryRecord {
    /// Builds a record with no name or county attribution.
    #[must_use]
    pub const fn new(id: String, level: GeographyLevel, geometry: MultiPolygon<f64>) -> Self {
        Self {
            id,
            level,
            name: None,
            state_fips: None,
            county_fips: None,
            geometry,
        }
    }

    /// `"zcta 85004"`-style label for log output.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.level, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn label_uses_level_and_id() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let record = GeometryRecord::new(
            "85004".to_string(),
            GeographyLevel::Zcta,
            MultiPolygon::new(vec![poly]),
        );
        assert_eq!(record.label(), "zcta 85004");
        assert!(record.name.is_none());
    }

    #[test]
    fn level_serializes_snake_case() {
        assert_eq!(GeographyLevel::Tract.to_string(), "tract");
        assert!(GeographyLevel::Cbsa < GeographyLevel::Tract);
    }
}
