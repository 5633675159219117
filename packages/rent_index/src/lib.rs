#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Zillow Observed Rent Index (ZORI) by ZIP code.
//!
//! Zillow publishes ZORI as one wide CSV: a row per ZIP and a column per
//! month. There is no server-side filter, so the whole file is downloaded
//! and the metro's ZIP prefixes are applied afterwards. See [`parse`] for
//! how the latest period is chosen.

pub mod parse;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zcta_dataset_models::RentIndexObservation;
use zcta_source::{HttpSettings, SourceError, retry};

/// Default ZORI download (all homes, smoothed, seasonally adjusted).
pub const DEFAULT_ZORI_URL: &str =
    "https://files.zillowstatic.com/research/public_csvs/zori/Zip_zori_uc_sfrcondomfr_sm_sa_month.csv";

/// Errors that can occur while fetching or parsing the rent index.
#[derive(Debug, Error)]
pub enum RentIndexError {
    /// The download failed.
    #[error("Failed to download rent index from {url}: {source}")]
    Fetch {
        /// Download URL.
        url: String,
        /// Underlying transport error.
        source: SourceError,
    },

    /// The CSV could not be read.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The CSV is readable but not shaped like a ZORI table.
    #[error("Malformed rent index table: {message}")]
    Malformed {
        /// Description of what went wrong.
        message: String,
    },
}

/// Where to download the rent index and which column holds the ZIP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RentIndexSettings {
    /// CSV download URL.
    pub url: String,
    /// Header of the ZIP code column.
    pub zip_column: String,
}

impl Default for RentIndexSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_ZORI_URL.to_string(),
            zip_column: "RegionName".to_string(),
        }
    }
}

/// Downloads the ZORI table and extracts the latest value per ZIP.
pub struct RentIndexFetcher {
    client: reqwest::Client,
    settings: RentIndexSettings,
    max_retries: u32,
}

impl RentIndexFetcher {
    /// Creates a fetcher with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`RentIndexError::Fetch`] if the HTTP client cannot be
    /// built.
    pub fn new(http: &HttpSettings, settings: RentIndexSettings) -> Result<Self, RentIndexError> {
        let client = http.build_client().map_err(|source| RentIndexError::Fetch {
            url: settings.url.clone(),
            source,
        })?;
        Ok(Self {
            client,
            settings,
            max_retries: http.max_retries,
        })
    }

    /// Downloads the table and returns the latest observation for every
    /// ZIP matching one of `zip_prefixes`, sorted by ZIP.
    ///
    /// # Errors
    ///
    /// Returns [`RentIndexError`] if the download fails or the CSV is not
    /// a ZORI table.
    pub async fn fetch_latest(
        &self,
        zip_prefixes: &[String],
    ) -> Result<Vec<RentIndexObservation>, RentIndexError> {
        let url = &self.settings.url;
        log::info!("Downloading rent index from {url}");

        let text = retry::send_text(|| self.client.get(url), self.max_retries)
            .await
            .map_err(|source| RentIndexError::Fetch {
                url: url.clone(),
                source,
            })?;
        log::info!("Downloaded {} bytes of rent index data", text.len());

        let observations = parse::parse_latest(&text, &self.settings.zip_column, zip_prefixes)?;
        log::info!(
            "Rent index: {} ZIPs match prefixes {zip_prefixes:?}",
            observations.len()
        );
        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_to_zillow_region_name() {
        let settings = RentIndexSettings::default();
        assert_eq!(settings.url, DEFAULT_ZORI_URL);
        assert_eq!(settings.zip_column, "RegionName");
    }
}
