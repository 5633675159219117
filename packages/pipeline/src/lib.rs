#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! One metro's ZCTA dataset build, end to end.
//!
//! ```text
//! TIGERweb CBSA + ZCTAs -> centroid boundary filter
//! TIGERweb tracts + ACS -> tract -> ZCTA map -> weighted rollup
//! ZORI + Overpass       -> left join -> income segments -> CSV
//! ```
//!
//! Everything a run needs is passed in through [`PipelineSettings`] and
//! [`RunOptions`]; nothing is read from globals, so several metros can be
//! built in one process.

pub mod debug;
pub mod run;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zcta_census::features::CommuteBins;
use zcta_census::{AcsSettings, CensusError};
use zcta_dataset::DatasetError;
use zcta_geography::GeoError;
use zcta_geography::tiger::TigerEndpoints;
use zcta_metro::MetroError;
use zcta_rent_index::RentIndexSettings;
use zcta_source::HttpSettings;
use zcta_source::progress::{ProgressCallback, null_progress};
use zcta_transit::{TransitError, TransitSettings};

pub use run::{build_metro_dataset, export_boundaries};

/// Errors that abort a metro run.
///
/// Each variant names the metro and the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The settings file could not be read or parsed.
    #[error("Invalid settings file {path}: {message}")]
    Settings {
        /// Settings file path.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// Unknown or invalid metro configuration.
    #[error(transparent)]
    Metro(#[from] MetroError),

    /// A boundary or tract geometry stage failed.
    #[error("[{metro}] {stage} failed: {source}")]
    Geography {
        /// Metro key.
        metro: String,
        /// Stage description.
        stage: &'static str,
        /// Underlying error, naming the geography.
        source: GeoError,
    },

    /// The ACS fetch failed.
    #[error("[{metro}] ACS fetch failed: {source}")]
    Census {
        /// Metro key.
        metro: String,
        /// Underlying error, naming the county.
        source: CensusError,
    },

    /// The transit source could not be set up.
    #[error("[{metro}] transit setup failed: {source}")]
    Transit {
        /// Metro key.
        metro: String,
        /// Underlying error.
        source: TransitError,
    },

    /// A mandatory stage produced nothing.
    #[error("[{metro}] {message}")]
    EmptyResult {
        /// Metro key.
        metro: String,
        /// What was empty.
        message: String,
    },

    /// Writing the dataset failed.
    #[error("[{metro}] failed to write dataset: {source}")]
    Dataset {
        /// Metro key.
        metro: String,
        /// Underlying error.
        source: DatasetError,
    },

    /// Writing debug artifacts failed.
    #[error("[{metro}] failed to write debug output {path}: {message}")]
    Debug {
        /// Metro key.
        metro: String,
        /// File being written.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },
}

/// Upstream endpoints and tunables for a run.
///
/// Every field has a default, so a settings file only needs the values
/// it overrides:
///
/// ```toml
/// [http]
/// timeout_secs = 300
/// max_retries = 2
///
/// [acs]
/// year = 2021
///
/// [commute]
/// top_bin_offset = 15.0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// HTTP client behaviour shared by every upstream.
    pub http: HttpSettings,
    /// `TIGERweb` layer URLs.
    pub tiger: TigerEndpoints,
    /// Census Data API options.
    pub acs: AcsSettings,
    /// ZORI download.
    pub rent_index: RentIndexSettings,
    /// Overpass endpoint and tag filters.
    pub transit: TransitSettings,
    /// Travel-time histogram valuation.
    pub commute: CommuteBins,
    /// Skip the transit stage (every ZCTA gets a null `stops_per_km2`).
    pub skip_transit: bool,
}

impl PipelineSettings {
    /// Parses settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Settings`] if the TOML is invalid.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, PipelineError> {
        toml::from_str(text).map_err(|e| PipelineError::Settings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Settings`] if the file cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::Settings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&text, path)
    }
}

/// Where a run writes its artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Directory for `final_zcta_dataset_{metro}.csv`.
    pub output_dir: PathBuf,
    /// Optional `GeoJSON` export of the retained ZCTA boundaries.
    pub boundary_file: Option<PathBuf>,
    /// Optional directory for intermediate tables.
    pub debug_dir: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data/final"),
            boundary_file: None,
            debug_dir: None,
        }
    }
}

/// Progress reporters for the long-running stages.
#[derive(Clone)]
pub struct RunProgress {
    /// Tract geometry downloads, one unit per county.
    pub tracts: Arc<dyn ProgressCallback>,
    /// ACS downloads, one unit per county.
    pub census: Arc<dyn ProgressCallback>,
    /// Transit queries, one unit per ZCTA.
    pub transit: Arc<dyn ProgressCallback>,
}

impl Default for RunProgress {
    fn default() -> Self {
        Self {
            tracts: null_progress(),
            census: null_progress(),
            transit: null_progress(),
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Metro key.
    pub metro: String,
    /// Path of the written dataset.
    pub output_path: PathBuf,
    /// ZCTAs inside the metro boundary.
    pub zctas_in_boundary: usize,
    /// Rows written (ZCTAs with at least one tract).
    pub rows_written: usize,
    /// ACS tract rows fetched.
    pub tracts_fetched: usize,
    /// Tracts that fell outside every ZCTA.
    pub tracts_unmapped: usize,
    /// Rows with a rent index value.
    pub rows_with_rent_index: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_are_all_defaults() {
        let settings = PipelineSettings::from_toml("", Path::new("settings.toml")).unwrap();
        assert_eq!(settings, PipelineSettings::default());
        assert_eq!(settings.acs.year, 2023);
        assert!((settings.commute.top_bin_offset - 10.0).abs() < f64::EPSILON);
        assert_eq!(settings.http.max_retries, 0);
    }

    #[test]
    fn partial_sections_override_only_named_fields() {
        let text = r#"
            skip_transit = true

            [http]
            max_retries = 3

            [acs]
            year = 2021

            [commute]
            top_bin_offset = 15.0

            [transit]
            fallback_filter = '["railway"="tram_stop"]'
        "#;
        let settings = PipelineSettings::from_toml(text, Path::new("settings.toml")).unwrap();

        assert!(settings.skip_transit);
        assert_eq!(settings.http.max_retries, 3);
        assert_eq!(settings.http.timeout_secs, HttpSettings::default().timeout_secs);
        assert_eq!(settings.acs.year, 2021);
        assert_eq!(settings.acs.dataset, "acs/acs5");
        assert!((settings.commute.top_bin_offset - 15.0).abs() < f64::EPSILON);
        assert_eq!(settings.transit.fallback_filter, r#"["railway"="tram_stop"]"#);
        assert_eq!(
            settings.transit.primary_filter,
            zcta_transit::DEFAULT_PRIMARY_FILTER
        );
    }

    #[test]
    fn bad_settings_name_the_file() {
        let err = PipelineSettings::from_toml("[acs]\nyear = \"soon\"", Path::new("x.toml"))
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid settings file x.toml"));
    }
}
