//! WGS84 / UTM projection for metric areas and centroids.
//!
//! Longitude/latitude degrees are not an area unit, so every area and
//! centroid in the pipeline is computed on geometry projected into the
//! metro's UTM zone. Uses the Krüger series (third order), accurate to
//! well under a millimetre within a zone.

use geo::{Area, Centroid, Coord, MapCoords, MultiPolygon, Point};
use zcta_metro_models::UtmZone;

use crate::GeoError;

/// WGS84 semi-major axis (metres).
const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
/// WGS84 flattening.
const FLATTENING: f64 = 1.0 / 298.257_223_563;
/// UTM central meridian scale factor.
const SCALE_FACTOR: f64 = 0.9996;
/// UTM false easting (metres).
const FALSE_EASTING: f64 = 500_000.0;
/// UTM false northing for the southern hemisphere (metres).
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;
/// Square metres per square kilometre.
const M2_PER_KM2: f64 = 1_000_000.0;

/// Transverse Mercator projection for one UTM zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtmProjection {
    zone: UtmZone,
    lon0: f64,
    false_northing: f64,
    eccentricity: f64,
    /// `k0 * A`, the scaled rectifying radius.
    k0_a: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
}

impl UtmProjection {
    /// Builds the projection for a UTM zone.
    #[must_use]
    pub fn new(zone: UtmZone) -> Self {
        let n = FLATTENING / (2.0 - FLATTENING);
        let n2 = n * n;
        let n3 = n2 * n;
        let rectifying = SEMI_MAJOR_AXIS / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0);

        Self {
            zone,
            lon0: zone.central_meridian().to_radians(),
            false_northing: if zone.north { 0.0 } else { FALSE_NORTHING_SOUTH },
            eccentricity: (FLATTENING * (2.0 - FLATTENING)).sqrt(),
            k0_a: SCALE_FACTOR * rectifying,
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
                61.0 * n3 / 240.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
                n2 / 48.0 + n3 / 15.0,
                17.0 * n3 / 480.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
                56.0 * n3 / 15.0,
            ],
        }
    }

    /// Builds the projection for a WGS84 UTM EPSG code such as `32612`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Projection`] if `epsg` is not a UTM zone.
    pub fn from_epsg(epsg: u32) -> Result<Self, GeoError> {
        UtmZone::from_epsg(epsg)
            .map(Self::new)
            .ok_or(GeoError::Projection { epsg })
    }

    /// The zone this projection was built for.
    #[must_use]
    pub const fn zone(&self) -> UtmZone {
        self.zone
    }

    /// Projects a longitude/latitude coordinate (degrees) to UTM
    /// easting/northing (metres).
    #[must_use]
    pub fn forward(&self, lonlat: Coord<f64>) -> Coord<f64> {
        let phi = lonlat.y.to_radians();
        let dlam = lonlat.x.to_radians() - self.lon0;
        let e = self.eccentricity;

        let t = (phi.sin().atanh() - e * (e * phi.sin()).atanh()).sinh();
        let xi_p = t.atan2(dlam.cos());
        let eta_p = (dlam.sin() / t.hypot(1.0)).atanh();

        let mut xi = xi_p;
        let mut eta = eta_p;
        for (j, a) in self.alpha.iter().enumerate() {
            let k = series_multiplier(j);
            xi += a * (k * xi_p).sin() * (k * eta_p).cosh();
            eta += a * (k * xi_p).cos() * (k * eta_p).sinh();
        }

        Coord {
            x: FALSE_EASTING + self.k0_a * eta,
            y: self.false_northing + self.k0_a * xi,
        }
    }

    /// Inverse of [`Self::forward`]: UTM metres back to longitude/latitude.
    #[must_use]
    pub fn inverse(&self, en: Coord<f64>) -> Coord<f64> {
        let xi = (en.y - self.false_northing) / self.k0_a;
        let eta = (en.x - FALSE_EASTING) / self.k0_a;

        let mut xi_p = xi;
        let mut eta_p = eta;
        for (j, b) in self.beta.iter().enumerate() {
            let k = series_multiplier(j);
            xi_p -= b * (k * xi).sin() * (k * eta).cosh();
            eta_p -= b * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_p.sin() / eta_p.cosh()).asin();
        let mut phi = chi;
        for (j, d) in self.delta.iter().enumerate() {
            phi += d * (series_multiplier(j) * chi).sin();
        }
        let lam = self.lon0 + eta_p.sinh().atan2(xi_p.cos());

        Coord {
            x: lam.to_degrees(),
            y: phi.to_degrees(),
        }
    }

    /// Projects every vertex of a longitude/latitude multipolygon.
    #[must_use]
    pub fn project(&self, mp: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        mp.map_coords(|c| self.forward(c))
    }

    /// Maps a projected multipolygon back to longitude/latitude.
    #[must_use]
    pub fn unproject(&self, mp: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        mp.map_coords(|c| self.inverse(c))
    }

    /// Planar area of a longitude/latitude multipolygon in km², measured
    /// in this UTM zone.
    #[must_use]
    pub fn area_km2(&self, mp: &MultiPolygon<f64>) -> f64 {
        self.project(mp).unsigned_area() / M2_PER_KM2
    }

    /// Centroid computed in UTM and returned as longitude/latitude.
    ///
    /// Returns `None` for an empty multipolygon.
    #[must_use]
    pub fn centroid(&self, mp: &MultiPolygon<f64>) -> Option<Point<f64>> {
        self.project(mp)
            .centroid()
            .map(|p| Point::from(self.inverse(p.0)))
    }
}

/// `2j` for the `j`-th (zero-based) series term.
#[allow(clippy::cast_precision_loss)]
const fn series_multiplier(j: usize) -> f64 {
    2.0 * (j + 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};

    fn zone12() -> UtmProjection {
        UtmProjection::from_epsg(32612).unwrap()
    }

    /// Builds a lon/lat multipolygon whose UTM footprint is an axis-aligned
    /// square of side `side_m` metres with its lower-left corner at
    /// `(easting, northing)`.
    fn utm_square(
        proj: &UtmProjection,
        easting: f64,
        northing: f64,
        side_m: f64,
    ) -> MultiPolygon<f64> {
        let corners = [
            (easting, northing),
            (easting + side_m, northing),
            (easting + side_m, northing + side_m),
            (easting, northing + side_m),
            (easting, northing),
        ];
        let ring: Vec<Coord<f64>> = corners
            .iter()
            .map(|&(x, y)| proj.inverse(Coord { x, y }))
            .collect();
        MultiPolygon::new(vec![Polygon::new(LineString::new(ring), vec![])])
    }

    #[test]
    fn central_meridian_on_equator_is_false_origin() {
        let en = zone12().forward(Coord { x: -111.0, y: 0.0 });
        assert!((en.x - 500_000.0).abs() < 1e-6, "{en:?}");
        assert!(en.y.abs() < 1e-6, "{en:?}");
    }

    #[test]
    fn meridian_arc_to_45_degrees() {
        // Meridian arc from the equator to 45N on WGS84 is 4 984 944.378 m.
        let en = zone12().forward(Coord { x: -111.0, y: 45.0 });
        assert!((en.y - 0.9996 * 4_984_944.378).abs() < 0.5, "{en:?}");
    }

    #[test]
    fn inverse_recovers_phoenix() {
        let proj = zone12();
        let lonlat = Coord {
            x: -112.074,
            y: 33.448,
        };
        let back = proj.inverse(proj.forward(lonlat));
        assert!((back.x - lonlat.x).abs() < 1e-8);
        assert!((back.y - lonlat.y).abs() < 1e-8);
    }

    #[test]
    fn southern_zone_uses_false_northing() {
        let proj = UtmProjection::from_epsg(32733).unwrap();
        let en = proj.forward(Coord { x: 15.0, y: -10.0 });
        assert!(en.y > 8_000_000.0 && en.y < FALSE_NORTHING_SOUTH, "{en:?}");
        let back = proj.inverse(en);
        assert!((back.y - -10.0).abs() < 1e-8);
    }

    #[test]
    fn rejects_non_utm_epsg() {
        assert!(matches!(
            UtmProjection::from_epsg(3857),
            Err(GeoError::Projection { epsg: 3857 })
        ));
    }

    #[test]
    fn square_area_in_km2() {
        let proj = zone12();
        let square = utm_square(&proj, 400_000.0, 3_700_000.0, 2_000.0);
        let area = proj.area_km2(&square);
        assert!((area - 4.0).abs() < 1e-4, "area = {area}");
    }

    #[test]
    fn centroid_round_trips_through_projection() {
        let proj = zone12();
        let square = utm_square(&proj, 400_000.0, 3_700_000.0, 1_000.0);
        let centroid = proj.centroid(&square).unwrap();
        let en = proj.forward(centroid.0);
        assert!((en.x - 400_500.0).abs() < 0.01, "{en:?}");
        assert!((en.y - 3_700_500.0).abs() < 0.01, "{en:?}");
    }

    #[test]
    fn empty_multipolygon_has_no_centroid() {
        assert!(zone12().centroid(&MultiPolygon::new(vec![])).is_none());
        assert!(zone12().area_km2(&MultiPolygon::new(vec![])).abs() < f64::EPSILON);
    }
}
