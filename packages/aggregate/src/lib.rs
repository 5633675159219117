#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Population-weighted rollup of tract features to ZCTAs.
//!
//! Ratio and percentage features become `Σ(value × pop) / Σ pop` over the
//! tracts mapped to a ZCTA; counts are summed. Aggregation works over a
//! set, so the order tracts arrive in never changes the result.

use std::collections::{BTreeMap, BTreeSet};

use zcta_census_models::{FEATURE_COUNT, FeatureSet, TractFeatureRow};
use zcta_dataset_models::ZctaAggregate;
use zcta_geography::projection::UtmProjection;
use zcta_geography_models::GeometryRecord;
use zcta_spatial::TractToZctaMap;

/// Running sums for one ZCTA.
#[derive(Debug, Clone, Default)]
struct Accumulator {
    tract_count: usize,
    total_pop: f64,
    ttw_total: f64,
    weighted: [f64; FEATURE_COUNT],
    weights: [f64; FEATURE_COUNT],
}

impl Accumulator {
    fn add(&mut self, row: &TractFeatureRow) {
        self.tract_count += 1;
        let pop = row.total_pop().unwrap_or(0.0);
        self.total_pop += pop;
        self.ttw_total += row.ttw_total().unwrap_or(0.0);

        for (i, value) in row.features.values().into_iter().enumerate() {
            if let Some(value) = value {
                self.weighted[i] += value * pop;
                self.weights[i] += pop;
            }
        }
    }

    fn features(&self) -> FeatureSet {
        let mut values = [None; FEATURE_COUNT];
        for (slot, (weighted, weight)) in values
            .iter_mut()
            .zip(self.weighted.iter().zip(self.weights.iter()))
        {
            *slot = weighted_mean(*weighted, *weight);
        }
        FeatureSet::from_values(values)
    }
}

/// `weighted / weight`, undefined when the weight is zero.
#[must_use]
pub fn weighted_mean(weighted: f64, weight: f64) -> Option<f64> {
    (weight > 0.0).then(|| weighted / weight)
}

/// `total_pop / area_km2`, undefined for a zero-area polygon.
#[must_use]
pub fn density(count: f64, area_km2: f64) -> Option<f64> {
    (area_km2 > 0.0).then(|| count / area_km2)
}

/// Rolls tract rows up to one [`ZctaAggregate`] per ZCTA with at least
/// one mapped tract.
///
/// Tracts absent from `map` are ignored, and a repeated GEOID only counts
/// its first row. ZCTAs with no mapped tract are
/// left out entirely. Areas are measured on each ZCTA polygon projected
/// into `projection`. Output is sorted by ZCTA code.
#[must_use]
pub fn aggregate_to_zctas(
    tracts: &[TractFeatureRow],
    map: &TractToZctaMap,
    zctas: &[GeometryRecord],
    projection: &UtmProjection,
) -> Vec<ZctaAggregate> {
    let mut accumulators: BTreeMap<&str, Accumulator> = BTreeMap::new();
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut unmapped = 0usize;
    let mut aggregated = 0usize;

    for row in tracts {
        if !seen.insert(row.geoid.as_str()) {
            log::warn!("Duplicate ACS row for tract {}; keeping the first", row.geoid);
            continue;
        }
        if let Some(zcta) = map.zcta_for(&row.geoid) {
            accumulators.entry(zcta).or_default().add(row);
            aggregated += 1;
        } else {
            unmapped += 1;
        }
    }

    if unmapped > 0 {
        log::info!("{unmapped} ACS tract rows had no ZCTA and were not aggregated");
    }

    let geometries: BTreeMap<&str, &GeometryRecord> =
        zctas.iter().map(|z| (z.id.as_str(), z)).collect();

    let aggregates: Vec<ZctaAggregate> = accumulators
        .into_iter()
        .map(|(zcta, acc)| {
            let area_km2 = geometries.get(zcta).map_or_else(
                || {
                    log::warn!("ZCTA {zcta} has tracts but no polygon; area is zero");
                    0.0
                },
                |record| projection.area_km2(&record.geometry),
            );
            ZctaAggregate {
                zcta: zcta.to_string(),
                tract_count: acc.tract_count,
                total_pop: acc.total_pop,
                ttw_total: acc.ttw_total,
                area_km2,
                pop_density: density(acc.total_pop, area_km2),
                features: acc.features(),
            }
        })
        .collect();

    log::info!(
        "Aggregated {} tract rows into {} ZCTAs ({} ZCTAs had no tracts)",
        aggregated,
        aggregates.len(),
        zctas.len().saturating_sub(aggregates.len())
    );

    aggregates
}

#[cfg(test)]
mod tests {
    use geo::{Coord, LineString, MultiPolygon, Polygon};
    use zcta_census_models::RawCounts;
    use zcta_geography_models::GeographyLevel;

    use super::*;

    fn zone12() -> UtmProjection {
        UtmProjection::from_epsg(32612).unwrap()
    }

    /// Lon/lat multipolygon whose UTM footprint is a `side_m` square.
    fn utm_square(proj: &UtmProjection, easting: f64, northing: f64, side_m: f64) -> MultiPolygon<f64> {
        let ring: Vec<Coord<f64>> = [
            (easting, northing),
            (easting + side_m, northing),
            (easting + side_m, northing + side_m),
            (easting, northing + side_m),
            (easting, northing),
        ]
        .iter()
        .map(|&(x, y)| proj.inverse(Coord { x, y }))
        .collect();
        MultiPolygon::new(vec![Polygon::new(LineString::new(ring), vec![])])
    }

    fn tract(geoid: &str, pop: f64, ttw: f64, features: FeatureSet) -> TractFeatureRow {
        TractFeatureRow {
            geoid: geoid.to_string(),
            year: 2023,
            raw: RawCounts {
                total_pop: Some(pop),
                ttw_total: Some(ttw),
                ..RawCounts::default()
            },
            features,
        }
    }

    fn commute(minutes: f64) -> FeatureSet {
        FeatureSet {
            commute_min_proxy: Some(minutes),
            ..FeatureSet::default()
        }
    }

    fn map(pairs: &[(&str, &str)]) -> TractToZctaMap {
        TractToZctaMap {
            assignments: pairs
                .iter()
                .map(|(t, z)| ((*t).to_string(), (*z).to_string()))
                .collect(),
            unmapped: Vec::new(),
        }
    }

    fn zcta(id: &str, proj: &UtmProjection, side_m: f64) -> GeometryRecord {
        GeometryRecord::new(
            id.to_string(),
            GeographyLevel::Zcta,
            utm_square(proj, 400_000.0, 3_700_000.0, side_m),
        )
    }

    #[test]
    fn commute_is_population_weighted() {
        let proj = zone12();
        let tracts = vec![
            tract("04013000100", 100.0, 50.0, commute(20.0)),
            tract("04013000200", 300.0, 150.0, commute(30.0)),
        ];
        let map = map(&[("04013000100", "85001"), ("04013000200", "85001")]);
        let out = aggregate_to_zctas(&tracts, &map, &[zcta("85001", &proj, 1_000.0)], &proj);

        assert_eq!(out.len(), 1);
        let commute = out[0].features.commute_min_proxy.unwrap();
        assert!((commute - 27.5).abs() < 1e-12, "{commute}");
        assert_eq!(out[0].tract_count, 2);
    }

    #[test]
    fn population_and_workers_are_summed_without_double_counting() {
        let proj = zone12();
        let tracts = vec![
            tract("04013000100", 100.0, 40.0, commute(20.0)),
            tract("04013000200", 250.0, 90.0, commute(25.0)),
            tract("04013000300", 75.0, 30.0, commute(30.0)),
            tract("04013000400", 500.0, 200.0, commute(35.0)),
        ];
        let map = map(&[
            ("04013000100", "85001"),
            ("04013000200", "85001"),
            ("04013000300", "85002"),
        ]);
        let zctas = vec![zcta("85001", &proj, 1_000.0), zcta("85002", &proj, 1_000.0)];
        let out = aggregate_to_zctas(&tracts, &map, &zctas, &proj);

        let by_zcta: BTreeMap<_, _> = out.iter().map(|a| (a.zcta.as_str(), a)).collect();
        assert!((by_zcta["85001"].total_pop - 350.0).abs() < f64::EPSILON);
        assert!((by_zcta["85001"].ttw_total - 130.0).abs() < f64::EPSILON);
        assert!((by_zcta["85002"].total_pop - 75.0).abs() < f64::EPSILON);

        let mapped_pop: f64 = tracts
            .iter()
            .filter(|t| map.zcta_for(&t.geoid).is_some())
            .filter_map(TractFeatureRow::total_pop)
            .sum();
        let output_pop: f64 = out.iter().map(|a| a.total_pop).sum();
        assert!((mapped_pop - output_pop).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_population_leaves_means_undefined() {
        let proj = zone12();
        let tracts = vec![tract("04013000100", 0.0, 0.0, commute(20.0))];
        let map = map(&[("04013000100", "85001")]);
        let out = aggregate_to_zctas(&tracts, &map, &[zcta("85001", &proj, 1_000.0)], &proj);

        assert_eq!(out[0].features.commute_min_proxy, None);
        assert!(out[0].total_pop.abs() < f64::EPSILON);
    }

    #[test]
    fn undefined_tract_values_do_not_dilute_the_mean() {
        let proj = zone12();
        let tracts = vec![
            tract("04013000100", 100.0, 10.0, commute(40.0)),
            tract("04013000200", 900.0, 0.0, FeatureSet::default()),
        ];
        let map = map(&[("04013000100", "85001"), ("04013000200", "85001")]);
        let out = aggregate_to_zctas(&tracts, &map, &[zcta("85001", &proj, 1_000.0)], &proj);

        assert_eq!(out[0].features.commute_min_proxy, Some(40.0));
        assert!((out[0].total_pop - 1_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn density_uses_projected_area() {
        let proj = zone12();
        // 2 km x 2 km = 4 km².
        let tracts = vec![tract("04013000100", 1_000.0, 400.0, commute(20.0))];
        let map = map(&[("04013000100", "85001")]);
        let out = aggregate_to_zctas(&tracts, &map, &[zcta("85001", &proj, 2_000.0)], &proj);

        let area = out[0].area_km2;
        assert!((area - 4.0).abs() < 1e-4, "{area}");
        let density = out[0].pop_density.unwrap();
        assert!((density - 1_000.0 / area).abs() < 1e-9, "{density}");
    }

    #[test]
    fn zcta_without_tracts_is_absent() {
        let proj = zone12();
        let tracts = vec![tract("04013000100", 100.0, 40.0, commute(20.0))];
        let map = map(&[("04013000100", "85001")]);
        let zctas = vec![zcta("85001", &proj, 1_000.0), zcta("85002", &proj, 1_000.0)];
        let out = aggregate_to_zctas(&tracts, &map, &zctas, &proj);

        assert_eq!(out.len(), 1);
        assert!(out.iter().all(|a| a.zcta != "85002"));
    }

    #[test]
    fn result_does_not_depend_on_tract_order() {
        let proj = zone12();
        let mut tracts = vec![
            tract("04013000100", 120.0, 40.0, commute(18.0)),
            tract("04013000200", 310.0, 90.0, commute(33.0)),
            tract("04013000300", 55.0, 30.0, commute(41.0)),
        ];
        let map = map(&[
            ("04013000100", "85001"),
            ("04013000200", "85001"),
            ("04013000300", "85001"),
        ]);
        let zctas = vec![zcta("85001", &proj, 1_000.0)];
        let forward = aggregate_to_zctas(&tracts, &map, &zctas, &proj);
        tracts.reverse();
        let reversed = aggregate_to_zctas(&tracts, &map, &zctas, &proj);

        let a = forward[0].features.commute_min_proxy.unwrap();
        let b = reversed[0].features.commute_min_proxy.unwrap();
        assert!((a - b).abs() < 1e-9);
        assert!((forward[0].total_pop - reversed[0].total_pop).abs() < f64::EPSILON);
    }

    #[test]
    fn repeated_tract_row_counts_once() {
        let proj = zone12();
        let tracts = vec![
            tract("04013000100", 100.0, 40.0, commute(20.0)),
            tract("04013000100", 100.0, 40.0, commute(60.0)),
        ];
        let map = map(&[("04013000100", "85001")]);
        let out = aggregate_to_zctas(&tracts, &map, &[zcta("85001", &proj, 1_000.0)], &proj);

        assert_eq!(out[0].tract_count, 1);
        assert!((out[0].total_pop - 100.0).abs() < f64::EPSILON);
        assert!((out[0].ttw_total - 40.0).abs() < f64::EPSILON);
        assert_eq!(out[0].features.commute_min_proxy, Some(20.0));
    }

    #[test]
    fn zero_area_has_no_density() {
        assert_eq!(density(100.0, 0.0), None);
        assert_eq!(density(100.0, 4.0), Some(25.0));
        assert_eq!(weighted_mean(10.0, 0.0), None);
    }
}
