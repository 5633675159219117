#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Transit stop density per ZCTA.
//!
//! Stops are counted by a [`TransitFeatureSource`] (OpenStreetMap's
//! Overpass API in production) under a [`FallbackPolicy`]: a narrow
//! public-transport query first, a broader bus-stop query when that comes
//! back empty, and zero only after both. A failed query on one ZCTA is
//! recorded as zero with a warning and never stops the run.

pub mod overpass;
pub mod policy;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zcta_dataset_models::{TransitDensity, TransitOutcome};
use zcta_geography::projection::UtmProjection;
use zcta_geography_models::GeometryRecord;
use zcta_source::SourceError;
use zcta_source::progress::ProgressCallback;

pub use policy::FallbackPolicy;

/// Primary Overpass tag filter.
pub const DEFAULT_PRIMARY_FILTER: &str = r#"["public_transport"~"platform|stop|station"]"#;

/// Fallback Overpass tag filter, tried when the primary finds nothing.
pub const DEFAULT_FALLBACK_FILTER: &str = r#"["highway"="bus_stop"]"#;

/// Public Overpass interpreter endpoint.
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Errors that can occur while setting up transit queries.
#[derive(Debug, Error)]
pub enum TransitError {
    /// The HTTP client could not be created.
    #[error("Failed to create Overpass client: {0}")]
    Client(#[from] SourceError),
}

/// A service that counts point features inside a polygon.
#[async_trait::async_trait]
pub trait TransitFeatureSource: Send + Sync {
    /// Counts features matching `tag_filter` inside a longitude/latitude
    /// polygon.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the query fails.
    async fn count(&self, polygon: &MultiPolygon<f64>, tag_filter: &str)
    -> Result<u64, SourceError>;
}

/// Overpass endpoint and tag filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitSettings {
    /// Overpass interpreter URL.
    pub overpass_url: String,
    /// Server-side query timeout in seconds (`[timeout:N]`).
    pub query_timeout_secs: u64,
    /// Primary tag filter.
    pub primary_filter: String,
    /// Fallback tag filter.
    pub fallback_filter: String,
}

impl Default for TransitSettings {
    fn default() -> Self {
        Self {
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            query_timeout_secs: 180,
            primary_filter: DEFAULT_PRIMARY_FILTER.to_string(),
            fallback_filter: DEFAULT_FALLBACK_FILTER.to_string(),
        }
    }
}

impl TransitSettings {
    /// The fallback policy described by these filters.
    #[must_use]
    pub fn policy(&self) -> FallbackPolicy {
        FallbackPolicy::new(&self.primary_filter, &self.fallback_filter)
    }
}

/// `stop_count / area_km2`, or `0` for a zero-area polygon.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn stops_per_km2(stop_count: u64, area_km2: f64) -> f64 {
    if area_km2 > 0.0 {
        stop_count as f64 / area_km2
    } else {
        0.0
    }
}

/// Computes stop density for every ZCTA in order.
///
/// Areas are measured in `projection`, the same zone used for population
/// density. Always returns one entry per input ZCTA.
pub async fn compute_densities(
    source: &dyn TransitFeatureSource,
    policy: &FallbackPolicy,
    zctas: &[GeometryRecord],
    projection: &UtmProjection,
    progress: &dyn ProgressCallback,
) -> Vec<TransitDensity> {
    progress.set_total(zctas.len() as u64);
    let mut densities = Vec::with_capacity(zctas.len());

    for zcta in zctas {
        progress.set_message(format!("Transit {}", zcta.id));

        let (stop_count, outcome) = match policy.resolve(source, &zcta.geometry).await {
            Ok(resolved) => resolved,
            Err(e) => {
                log::warn!("Transit query failed for ZCTA {}; recording 0 stops: {e}", zcta.id);
                (0, TransitOutcome::Failed)
            }
        };

        let area_km2 = projection.area_km2(&zcta.geometry);
        densities.push(TransitDensity {
            zcta: zcta.id.clone(),
            stop_count,
            area_km2,
            stops_per_km2: stops_per_km2(stop_count, area_km2),
            outcome,
        });
        progress.inc(1);
    }

    let failed = densities
        .iter()
        .filter(|d| d.outcome == TransitOutcome::Failed)
        .count();
    let fallback = densities
        .iter()
        .filter(|d| d.outcome == TransitOutcome::Fallback)
        .count();
    if failed > 0 {
        log::warn!("Transit density: {failed} of {} ZCTAs failed", densities.len());
    }
    progress.finish(format!(
        "Transit density for {} ZCTAs ({fallback} via fallback, {failed} failed)",
        densities.len()
    ));

    densities
}
