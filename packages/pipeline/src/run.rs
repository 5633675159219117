//! Stage sequencing for one metro.
//!
//! Mandatory stages (boundaries, tracts, ACS) abort the run on any
//! error. The rent index and transit stages are optional sources: their
//! failures are logged and the affected columns stay null or zero.

use std::path::Path;
use std::time::Instant;

use zcta_aggregate::aggregate_to_zctas;
use zcta_census::acs::AcsClient;
use zcta_dataset::{assemble, dataset_path, write_dataset};
use zcta_dataset_models::{RentIndexObservation, TransitDensity, ZctaAggregate};
use zcta_geography::export::write_boundaries;
use zcta_geography::projection::UtmProjection;
use zcta_geography::GeoError;
use zcta_geography::tiger::TigerFetcher;
use zcta_geography_models::GeometryRecord;
use zcta_metro_models::MetroConfig;
use zcta_rent_index::RentIndexFetcher;
use zcta_spatial::{filter_within_boundary, map_tracts_to_zctas};
use zcta_transit::compute_densities;
use zcta_transit::overpass::OverpassSource;

use crate::debug;
use crate::{PipelineError, PipelineSettings, RunOptions, RunProgress, RunSummary};

/// Validated metro plus the clients every stage shares.
struct Context<'a> {
    metro: &'a MetroConfig,
    projection: UtmProjection,
    tiger: TigerFetcher,
}

impl<'a> Context<'a> {
    fn new(metro: &'a MetroConfig, settings: &PipelineSettings) -> Result<Self, PipelineError> {
        zcta_metro::validate(metro)?;
        let geo_err = |stage, source| PipelineError::Geography {
            metro: metro.key.clone(),
            stage,
            source,
        };
        let projection =
            UtmProjection::from_epsg(metro.utm_epsg).map_err(|e| geo_err("projection setup", e))?;
        let tiger = TigerFetcher::new(&settings.http, settings.tiger.clone())
            .map_err(|e| geo_err("TIGERweb client setup", e))?;
        Ok(Self {
            metro,
            projection,
            tiger,
        })
    }

    fn geo_err(&self, stage: &'static str, source: GeoError) -> PipelineError {
        PipelineError::Geography {
            metro: self.metro.key.clone(),
            stage,
            source,
        }
    }

    /// CBSA boundary, then the prefix-matched ZCTAs whose centroid is
    /// inside it.
    async fn metro_zctas(&self) -> Result<Vec<GeometryRecord>, PipelineError> {
        let metro = self.metro;
        log::info!(
            "[{}] Fetching CBSA {} boundary ({})",
            metro.key,
            metro.cbsa_code,
            metro.name
        );
        let boundary = self
            .tiger
            .fetch_cbsa(&metro.cbsa_code)
            .await
            .map_err(|e| self.geo_err("CBSA boundary fetch", e))?;

        log::info!(
            "[{}] Fetching ZCTAs with prefixes {:?}",
            metro.key,
            metro.zip_prefixes
        );
        let candidates = self
            .tiger
            .fetch_zctas(&metro.zip_prefixes)
            .await
            .map_err(|e| self.geo_err("ZCTA fetch", e))?;

        let zctas = filter_within_boundary(candidates, &boundary.geometry, &self.projection);
        if zctas.is_empty() {
            return Err(PipelineError::EmptyResult {
                metro: metro.key.clone(),
                message: format!(
                    "no ZCTA centroid falls inside CBSA {} boundary",
                    metro.cbsa_code
                ),
            });
        }
        Ok(zctas)
    }
}

/// Builds and writes the ZCTA dataset for one metro.
///
/// The dataset is only written once every mandatory stage succeeds, so a
/// failed run leaves any previous output untouched.
///
/// # Errors
///
/// Returns [`PipelineError`] naming the stage and geography that failed.
#[allow(clippy::too_many_lines)]
pub async fn build_metro_dataset(
    metro: &MetroConfig,
    settings: &PipelineSettings,
    options: &RunOptions,
    progress: &RunProgress,
) -> Result<RunSummary, PipelineError> {
    let start = Instant::now();
    let key = metro.key.clone();

    // Validate everything that can be checked offline before any request.
    let ctx = Context::new(metro, settings)?;
    let acs = AcsClient::new(&settings.http, settings.acs.clone(), settings.commute).map_err(
        |source| PipelineError::Census {
            metro: key.clone(),
            source,
        },
    )?;
    log::info!(
        "[{key}] Building dataset for {} ({} counties, ACS {}, EPSG:{})",
        metro.name,
        metro.counties.len(),
        acs.year(),
        metro.utm_epsg
    );

    // --- 1. Boundaries ---
    let zctas = ctx.metro_zctas().await?;
    if let Some(path) = &options.boundary_file {
        write_boundaries(&zctas, path).map_err(|e| ctx.geo_err("boundary export", e))?;
    }

    // --- 2. Tracts ---
    let tract_geometries = ctx
        .tiger
        .fetch_tracts(&metro.counties, progress.tracts.as_ref())
        .await
        .map_err(|e| ctx.geo_err("tract fetch", e))?;

    let tract_rows = acs
        .fetch_counties(&metro.counties, progress.census.as_ref())
        .await
        .map_err(|source| PipelineError::Census {
            metro: key.clone(),
            source,
        })?;

    // --- 3. Spatial join and rollup ---
    let map = map_tracts_to_zctas(&tract_geometries, &zctas, &ctx.projection);
    let aggregates = aggregate_to_zctas(&tract_rows, &map, &zctas, &ctx.projection);
    if aggregates.is_empty() {
        return Err(PipelineError::EmptyResult {
            metro: key,
            message: "no tract centroid falls inside any metro ZCTA".to_string(),
        });
    }

    if let Some(dir) = &options.debug_dir {
        debug::write_tract_map(&key, &map, &dir.join(format!("tract_zcta_map_{key}.csv")))?;
    }

    // --- 4. Optional sources ---
    let rent_index = fetch_rent_index(metro, settings).await;

    let aggregated = aggregated_zctas(&zctas, &aggregates);
    let transit = if settings.skip_transit {
        log::info!("[{key}] Transit stage skipped");
        Vec::new()
    } else {
        fetch_transit(&key, settings, &aggregated, &ctx.projection, progress).await?
    };

    // --- 5. Assemble and write ---
    let rows = assemble(&aggregates, &rent_index, &transit);
    let output_path = dataset_path(&options.output_dir, &key);
    write_dataset(&rows, &output_path).map_err(|source| PipelineError::Dataset {
        metro: key.clone(),
        source,
    })?;

    let summary = RunSummary {
        metro: key,
        output_path,
        zctas_in_boundary: zctas.len(),
        rows_written: rows.len(),
        tracts_fetched: tract_rows.len(),
        tracts_unmapped: map.unmapped.len(),
        rows_with_rent_index: rows.iter().filter(|r| r.zori.is_some()).count(),
        elapsed: start.elapsed(),
    };
    log::info!(
        "[{}] Done in {:.1}s: {} rows -> {}",
        summary.metro,
        summary.elapsed.as_secs_f64(),
        summary.rows_written,
        summary.output_path.display()
    );
    Ok(summary)
}

/// Writes the metro's boundary-filtered ZCTAs as `GeoJSON` without
/// building the dataset.
///
/// Returns the number of ZCTAs written.
///
/// # Errors
///
/// Returns [`PipelineError`] if the metro is invalid or a boundary fetch
/// or write fails.
pub async fn export_boundaries(
    metro: &MetroConfig,
    settings: &PipelineSettings,
    path: &Path,
) -> Result<usize, PipelineError> {
    let ctx = Context::new(metro, settings)?;
    let zctas = ctx.metro_zctas().await?;
    write_boundaries(&zctas, path).map_err(|e| ctx.geo_err("boundary export", e))?;
    log::info!(
        "[{}] Wrote {} ZCTA boundaries to {}",
        metro.key,
        zctas.len(),
        path.display()
    );
    Ok(zctas.len())
}

/// ZCTA polygons that received at least one tract. Only these are sent to
/// the transit source.
fn aggregated_zctas(zctas: &[GeometryRecord], aggregates: &[ZctaAggregate]) -> Vec<GeometryRecord> {
    zctas
        .iter()
        .filter(|z| aggregates.binary_search_by(|a| a.zcta.cmp(&z.id)).is_ok())
        .cloned()
        .collect()
}

/// Latest rent index per ZIP, or nothing (with a warning) on failure.
async fn fetch_rent_index(
    metro: &MetroConfig,
    settings: &PipelineSettings,
) -> Vec<RentIndexObservation> {
    let result = match RentIndexFetcher::new(&settings.http, settings.rent_index.clone()) {
        Ok(fetcher) => fetcher.fetch_latest(&metro.zip_prefixes).await,
        Err(e) => Err(e),
    };
    result.unwrap_or_else(|e| {
        log::warn!("[{}] Rent index unavailable; zori left empty: {e}", metro.key);
        Vec::new()
    })
}

async fn fetch_transit(
    key: &str,
    settings: &PipelineSettings,
    zctas: &[GeometryRecord],
    projection: &UtmProjection,
    progress: &RunProgress,
) -> Result<Vec<TransitDensity>, PipelineError> {
    let source =
        OverpassSource::new(&settings.http, &settings.transit).map_err(|source| {
            PipelineError::Transit {
                metro: key.to_string(),
                source,
            }
        })?;
    Ok(compute_densities(
        &source,
        &settings.transit.policy(),
        zctas,
        projection,
        progress.transit.as_ref(),
    )
    .await)
}
