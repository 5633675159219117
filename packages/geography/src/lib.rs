#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Boundary geometry for one metro.
//!
//! Downloads CBSA, ZCTA, and census tract polygons from the Census Bureau
//! `TIGERweb` REST API ([`tiger`]), converts `GeoJSON` geometries into
//! `geo` types ([`geometry`]), projects them into the metro's UTM zone for
//! areas and centroids ([`projection`]), and writes filtered boundaries
//! back out as `GeoJSON` ([`export`]).

pub mod export;
pub mod geometry;
pub mod projection;
pub mod tiger;

use thiserror::Error;
use zcta_source::SourceError;

/// Errors that can occur during geography operations.
#[derive(Debug, Error)]
pub enum GeoError {
    /// The HTTP request for a geography failed.
    #[error("Failed to fetch {label}: {source}")]
    Fetch {
        /// Which geography was being fetched.
        label: String,
        /// Underlying transport error.
        source: SourceError,
    },

    /// `TIGERweb` answered with an `ArcGIS` error envelope.
    #[error("ArcGIS error {code} for {label}: {message}")]
    Arcgis {
        /// Which geography was being fetched.
        label: String,
        /// `ArcGIS` error code.
        code: i64,
        /// `ArcGIS` error message.
        message: String,
    },

    /// The response parsed as JSON but not as the expected shape.
    #[error("Malformed response for {label}: {message}")]
    Malformed {
        /// Which geography was being fetched.
        label: String,
        /// Description of what went wrong.
        message: String,
    },

    /// A mandatory query returned no features.
    #[error("No features returned for {label}")]
    Empty {
        /// Which geography was being fetched.
        label: String,
    },

    /// The configured EPSG code is not a WGS84 UTM zone.
    #[error("EPSG:{epsg} is not a supported UTM projection")]
    Projection {
        /// The rejected EPSG code.
        epsg: u32,
    },

    /// I/O error (boundary export).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
