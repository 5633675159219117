//! Fallback-before-zero query policy.

use geo::MultiPolygon;
use zcta_dataset_models::TransitOutcome;
use zcta_source::SourceError;

use crate::TransitFeatureSource;

/// Tries a primary tag filter, then a fallback filter when the primary
/// finds nothing.
///
/// An empty primary result is not evidence of no transit: OSM tagging is
/// uneven, and many areas tag bus stops only with `highway=bus_stop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackPolicy {
    primary: String,
    fallback: String,
}

impl FallbackPolicy {
    /// Creates a policy from two Overpass tag filters.
    #[must_use]
    pub fn new(primary: &str, fallback: &str) -> Self {
        Self {
            primary: primary.to_string(),
            fallback: fallback.to_string(),
        }
    }

    /// The primary tag filter.
    #[must_use]
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// The fallback tag filter.
    #[must_use]
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Counts features in `polygon`, falling back when the primary filter
    /// is empty.
    ///
    /// # Errors
    ///
    /// Returns the [`SourceError`] of whichever query failed.
    pub async fn resolve(
        &self,
        source: &dyn TransitFeatureSource,
        polygon: &MultiPolygon<f64>,
    ) -> Result<(u64, TransitOutcome), SourceError> {
        let primary = source.count(polygon, &self.primary).await?;
        if primary > 0 {
            return Ok((primary, TransitOutcome::Primary));
        }

        let fallback = source.count(polygon, &self.fallback).await?;
        if fallback > 0 {
            log::debug!("Primary transit filter empty; fallback found {fallback}");
            Ok((fallback, TransitOutcome::Fallback))
        } else {
            Ok((0, TransitOutcome::Empty))
        }
    }
}
