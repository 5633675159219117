#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Census American Community Survey tract data.
//!
//! [`acs`] fetches the 5-year estimates for every tract of a county in a
//! single batched request; [`features`] turns those raw counts into the
//! ratios and percentages the dataset is built from.

pub mod acs;
pub mod features;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zcta_census_models::{ACS_YEARS, DEFAULT_ACS_YEAR};
use zcta_source::SourceError;

/// Errors that can occur while fetching or parsing ACS data.
#[derive(Debug, Error)]
pub enum CensusError {
    /// The requested vintage is not one of the supported ACS years.
    #[error("Invalid ACS year {year} (must be one of {years:?})", years = ACS_YEARS)]
    InvalidYear {
        /// The rejected year.
        year: u16,
    },

    /// A state or county FIPS code is malformed.
    #[error("Invalid FIPS code: {message}")]
    InvalidFips {
        /// Description of the bad code.
        message: String,
    },

    /// The HTTP request failed.
    #[error("Failed to fetch ACS data for {label}: {source}")]
    Fetch {
        /// Which county was being fetched.
        label: String,
        /// Underlying transport error.
        source: SourceError,
    },

    /// The response was not the expected header-plus-rows table.
    #[error("Malformed ACS response for {label}: {message}")]
    Malformed {
        /// Which county was being fetched.
        label: String,
        /// Description of what went wrong.
        message: String,
    },

    /// The API returned a header but no tract rows.
    #[error("ACS returned no tracts for {label}")]
    Empty {
        /// Which county was being fetched.
        label: String,
    },
}

/// Census Data API location and request options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcsSettings {
    /// Base URL of the Census Data API.
    pub base_url: String,
    /// Dataset path under the year, e.g. `acs/acs5`.
    pub dataset: String,
    /// ACS 5-year vintage.
    pub year: u16,
    /// Optional API key for higher rate limits.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for AcsSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.census.gov/data".to_string(),
            dataset: "acs/acs5".to_string(),
            year: DEFAULT_ACS_YEAR,
            api_key: None,
        }
    }
}

impl AcsSettings {
    /// Full endpoint for the configured year and dataset.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.year,
            self.dataset.trim_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoint_is_acs5_2023() {
        assert_eq!(
            AcsSettings::default().endpoint(),
            "https://api.census.gov/data/2023/acs/acs5"
        );
    }

    #[test]
    fn api_key_is_never_serialized() {
        let settings = AcsSettings {
            api_key: Some("secret".to_string()),
            ..AcsSettings::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn invalid_year_message_lists_supported_years() {
        let err = CensusError::InvalidYear { year: 2022 };
        assert_eq!(
            err.to_string(),
            "Invalid ACS year 2022 (must be one of [2015, 2017, 2019, 2021, 2023])"
        );
    }
}
