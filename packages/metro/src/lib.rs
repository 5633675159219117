#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Metro area registry.
//!
//! Metro definitions live in TOML files under `metros/` and are embedded at
//! compile time. Adding a metro requires creating a TOML file and adding a
//! corresponding entry to [`registry`]. Every lookup goes through
//! [`validate`], so a malformed definition is rejected before the pipeline
//! touches the network.

pub mod registry;

use std::collections::BTreeSet;

use thiserror::Error;
use zcta_metro_models::MetroConfig;
use zcta_metro_models::fips::{is_county_fips, is_numeric_code, is_state_fips};

pub use registry::{all_metros, find_metro, metro_keys};

/// Errors raised while loading or validating metro configurations.
#[derive(Debug, Error)]
pub enum MetroError {
    /// No metro is registered under the requested key.
    #[error("Unknown metro '{key}' (available: {available})")]
    UnknownMetro {
        /// The requested key.
        key: String,
        /// Comma-separated list of registered keys.
        available: String,
    },

    /// An embedded TOML definition failed to parse.
    #[error("Failed to parse metro definition '{name}': {source}")]
    Parse {
        /// Registry entry name.
        name: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A definition parsed but violates a structural rule.
    #[error("Invalid metro '{key}': {message}")]
    Invalid {
        /// Metro key.
        key: String,
        /// Description of the violated rule.
        message: String,
    },
}

/// Checks a metro definition for structural problems.
///
/// # Errors
///
/// Returns [`MetroError::Invalid`] describing the first violated rule.
pub fn validate(metro: &MetroConfig) -> Result<(), MetroError> {
    let invalid = |message: String| MetroError::Invalid {
        key: metro.key.clone(),
        message,
    };

    if metro.key.trim().is_empty() {
        return Err(invalid("empty key".to_string()));
    }
    if metro.name.trim().is_empty() {
        return Err(invalid("empty name".to_string()));
    }
    if !is_numeric_code(&metro.cbsa_code, 5) {
        return Err(invalid(format!(
            "CBSA code '{}' is not five digits",
            metro.cbsa_code
        )));
    }
    if metro.counties.is_empty() {
        return Err(invalid("no counties".to_string()));
    }

    let mut seen = BTreeSet::new();
    for county in &metro.counties {
        if !is_state_fips(&county.state_fips) {
            return Err(invalid(format!(
                "state FIPS '{}' is not a known two-digit code",
                county.state_fips
            )));
        }
        if !is_county_fips(&county.county_fips) {
            return Err(invalid(format!(
                "county FIPS '{}' is not three digits",
                county.county_fips
            )));
        }
        if !seen.insert(county.geoid()) {
            return Err(invalid(format!("duplicate county {}", county.geoid())));
        }
    }

    if metro.zip_prefixes.is_empty() {
        return Err(invalid("no ZIP prefixes".to_string()));
    }
    for prefix in &metro.zip_prefixes {
        if prefix.is_empty()
            || prefix.len() > 5
            || !prefix.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid(format!("ZIP prefix '{prefix}' is not 1-5 digits")));
        }
    }

    if metro.utm_zone().is_none() {
        return Err(invalid(format!(
            "EPSG:{} is not a WGS84 UTM zone",
            metro.utm_epsg
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zcta_metro_models::CountyRef;

    fn valid() -> MetroConfig {
        MetroConfig {
            key: "phoenix".to_string(),
            name: "Phoenix-Mesa-Chandler, AZ".to_string(),
            cbsa_code: "38060".to_string(),
            counties: vec![CountyRef {
                state_fips: "04".to_string(),
                county_fips: "013".to_string(),
                name: None,
            }],
            zip_prefixes: vec!["85".to_string()],
            utm_epsg: 32612,
        }
    }

    #[test]
    fn accepts_valid_config() {
        validate(&valid()).unwrap();
    }

    #[test]
    fn rejects_bad_cbsa() {
        let mut metro = valid();
        metro.cbsa_code = "3806".to_string();
        assert!(matches!(validate(&metro), Err(MetroError::Invalid { .. })));
    }

    #[test]
    fn rejects_bad_county() {
        let mut metro = valid();
        metro.counties[0].county_fips = "13".to_string();
        assert!(validate(&metro).is_err());

        let mut metro = valid();
        metro.counties[0].state_fips = "99".to_string();
        assert!(validate(&metro).is_err());
    }

    #[test]
    fn rejects_duplicate_county() {
        let mut metro = valid();
        metro.counties.push(metro.counties[0].clone());
        let err = validate(&metro).unwrap_err().to_string();
        assert!(err.contains("duplicate county 04013"), "{err}");
    }

    #[test]
    fn rejects_missing_prefixes_and_bad_zone() {
        let mut metro = valid();
        metro.zip_prefixes.clear();
        assert!(validate(&metro).is_err());

        let mut metro = valid();
        metro.zip_prefixes = vec!["8a".to_string()];
        assert!(validate(&metro).is_err());

        let mut metro = valid();
        metro.utm_epsg = 3857;
        assert!(validate(&metro).is_err());
    }
}
