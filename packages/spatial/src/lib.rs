#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Centroid-containment joins.
//!
//! Two joins reconcile the mismatched geographies: ZCTAs are kept when
//! their centroid falls inside the metro boundary, and each tract is
//! assigned to the ZCTA polygon containing its centroid. Polygon overlap
//! is never consulted. Centroids are computed in the metro's UTM zone and
//! tested in longitude/latitude against an R-tree of ZCTA envelopes.

use std::collections::BTreeMap;

use geo::{BoundingRect, Contains, MultiPolygon, Point};
use rstar::{AABB, RTree, RTreeObject};
use zcta_geography::projection::UtmProjection;
use zcta_geography_models::GeometryRecord;

/// A ZCTA polygon stored in the R-tree with its code.
struct BoundaryEntry {
    zcta: String,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over ZCTA polygons for point lookups.
pub struct ZctaIndex {
    tree: RTree<BoundaryEntry>,
}

impl ZctaIndex {
    /// Builds the index. Records with an empty geometry are skipped.
    #[must_use]
    pub fn build(zctas: &[GeometryRecord]) -> Self {
        let entries: Vec<BoundaryEntry> = zctas
            .iter()
            .filter_map(|record| {
                let Some(envelope) = compute_envelope(&record.geometry) else {
                    log::warn!("ZCTA {} has an empty geometry; not indexed", record.id);
                    return None;
                };
                Some(BoundaryEntry {
                    zcta: record.id.clone(),
                    envelope,
                    polygon: record.geometry.clone(),
                })
            })
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed ZCTAs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns `true` if nothing was indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Looks up the ZCTA containing a longitude/latitude point.
    ///
    /// ZCTAs should not overlap, but where they do the smallest code
    /// wins so the answer never depends on tree order.
    #[must_use]
    pub fn lookup(&self, point: Point<f64>) -> Option<&str> {
        let query_env = AABB::from_point([point.x(), point.y()]);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.contains(&point))
            .map(|entry| entry.zcta.as_str())
            .min()
    }
}

/// Tract GEOID to ZCTA code assignments from a centroid join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TractToZctaMap {
    /// tract GEOID -> ZCTA code. Each tract appears at most once.
    pub assignments: BTreeMap<String, String>,
    /// Tracts whose centroid fell in no ZCTA (or had no centroid).
    pub unmapped: Vec<String>,
}

impl TractToZctaMap {
    /// ZCTA assigned to a tract, if any.
    #[must_use]
    pub fn zcta_for(&self, tract_geoid: &str) -> Option<&str> {
        self.assignments.get(tract_geoid).map(String::as_str)
    }

    /// Groups mapped tracts by ZCTA.
    #[must_use]
    pub fn tracts_by_zcta(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (tract, zcta) in &self.assignments {
            grouped.entry(zcta.as_str()).or_default().push(tract.as_str());
        }
        grouped
    }

    /// Number of mapped tracts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Returns `true` if no tract was mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Keeps the ZCTAs whose centroid lies inside the metro boundary.
///
/// A ZCTA that straddles the boundary is kept or dropped purely on where
/// its centroid falls.
#[must_use]
pub fn filter_within_boundary(
    zctas: Vec<GeometryRecord>,
    boundary: &MultiPolygon<f64>,
    projection: &UtmProjection,
) -> Vec<GeometryRecord> {
    let before = zctas.len();
    let kept: Vec<GeometryRecord> = zctas
        .into_iter()
        .filter(|zcta| {
            projection
                .centroid(&zcta.geometry)
                .is_some_and(|centroid| boundary.contains(&centroid))
        })
        .collect();

    log::info!(
        "Boundary filter kept {} of {before} ZCTAs",
        kept.len()
    );
    kept
}

/// Assigns every tract to the ZCTA containing its centroid.
///
/// Tracts with no containing ZCTA are listed in
/// [`TractToZctaMap::unmapped`] and logged; they are never assigned a
/// default.
#[must_use]
pub fn map_tracts_to_zctas(
    tracts: &[GeometryRecord],
    zctas: &[GeometryRecord],
    projection: &UtmProjection,
) -> TractToZctaMap {
    let index = ZctaIndex::build(zctas);
    let mut map = TractToZctaMap::default();

    for tract in tracts {
        let zcta = projection
            .centroid(&tract.geometry)
            .and_then(|centroid| index.lookup(centroid));

        match zcta {
            Some(zcta) => {
                if let Some(previous) = map.assignments.get(&tract.id) {
                    log::warn!(
                        "Tract {} listed twice; keeping ZCTA {previous}",
                        tract.id
                    );
                    continue;
                }
                map.assignments.insert(tract.id.clone(), zcta.to_string());
            }
            None => {
                log::debug!("Tract {} centroid is outside every ZCTA", tract.id);
                map.unmapped.push(tract.id.clone());
            }
        }
    }

    if !map.unmapped.is_empty() {
        log::warn!(
            "{} of {} tracts fell outside the metro ZCTAs and are excluded",
            map.unmapped.len(),
            tracts.len()
        );
    }
    log::info!(
        "Mapped {} tracts onto {} ZCTAs",
        map.len(),
        map.tracts_by_zcta().len()
    );

    map
}

/// Bounding box envelope for a [`MultiPolygon`]; `None` when empty.
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
