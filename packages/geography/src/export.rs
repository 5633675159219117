//! `GeoJSON` export of filtered boundaries for map rendering.

use std::path::Path;

use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use zcta_geography_models::GeometryRecord;

use crate::GeoError;

/// Builds a `FeatureCollection` with one feature per record.
///
/// Each feature carries `id`, `level`, and (when known) `name` properties.
/// ZCTA features additionally get a `ZCTA5CE` property so the file can be
/// joined against the output dataset.
#[must_use]
pub fn to_feature_collection(records: &[GeometryRecord]) -> FeatureCollection {
    let features = records
        .iter()
        .map(|record| {
            let mut properties = JsonObject::new();
            properties.insert("id".to_string(), record.id.clone().into());
            properties.insert("level".to_string(), record.level.as_str().into());
            if let Some(name) = &record.name {
                properties.insert("name".to_string(), name.clone().into());
            }
            if record.level == zcta_geography_models::GeographyLevel::Zcta {
                properties.insert("ZCTA5CE".to_string(), record.id.clone().into());
            }

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::from(&record.geometry))),
                id: Some(geojson::feature::Id::String(record.id.clone())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Writes records to `path` as a `GeoJSON` `FeatureCollection`.
///
/// Parent directories are created as needed.
///
/// # Errors
///
/// Returns [`GeoError`] if serialization or the file write fails.
pub fn write_boundaries(records: &[GeometryRecord], path: &Path) -> Result<(), GeoError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let collection = to_feature_collection(records);
    let json = serde_json::to_string(&collection)?;
    std::fs::write(path, json)?;

    log::info!("Wrote {} boundaries to {}", records.len(), path.display());
    Ok(())
}
