//! `GeoJSON` geometry conversion.

use geo::MultiPolygon;

/// Converts a `GeoJSON` geometry object into a [`MultiPolygon`].
///
/// Handles both `Polygon` and `MultiPolygon` geometry types. Returns
/// `None` for null geometries, other geometry types, or invalid
/// coordinates.
#[must_use]
pub fn parse_geometry(value: &serde_json::Value) -> Option<MultiPolygon<f64>> {
    if value.is_null() {
        return None;
    }
    let geometry: geojson::Geometry = serde_json::from_value(value.clone()).ok()?;
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        _ => None,
    }
}

/// Parses a `GeoJSON` geometry string into a [`MultiPolygon`].
#[must_use]
pub fn parse_geometry_str(geojson_str: &str) -> Option<MultiPolygon<f64>> {
    let value: serde_json::Value = serde_json::from_str(geojson_str).ok()?;
    parse_geometry(&value)
}

/// Number of exterior-ring vertices across all polygons.
#[must_use]
pub fn vertex_count(mp: &MultiPolygon<f64>) -> usize {
    mp.0.iter().map(|p| p.exterior().0.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_polygon_as_single_member_multipolygon() {
        let value = json!({
            "type": "Polygon",
            "coordinates": [[[-112.0, 33.0], [-111.9, 33.0], [-111.9, 33.1], [-112.0, 33.0]]]
        });
        let mp = parse_geometry(&value).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(vertex_count(&mp), 4);
    }

    #[test]
    fn parses_multipolygon() {
        let mp = parse_geometry_str(
            r#"{"type":"MultiPolygon","coordinates":[
                [[[0,0],[1,0],[1,1],[0,0]]],
                [[[2,2],[3,2],[3,3],[2,2]]]
            ]}"#,
        )
        .unwrap();
        assert_eq!(mp.0.len(), 2);
    }

    #[test]
    fn rejects_null_points_and_garbage() {
        assert!(parse_geometry(&serde_json::Value::Null).is_none());
        assert!(parse_geometry(&json!({"type": "Point", "coordinates": [0.0, 0.0]})).is_none());
        assert!(parse_geometry(&json!({"type": "Polygon"})).is_none());
        assert!(parse_geometry_str("not json").is_none());
    }
}
