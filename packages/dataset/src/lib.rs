#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Final dataset assembly and persistence.
//!
//! [`assemble`] left-joins the ZCTA aggregates with the rent index and
//! transit density and assigns income segments. [`write_dataset`]
//! persists the rows as CSV with the fixed column order in
//! [`COLUMNS`](zcta_dataset_models::COLUMNS).

pub mod segment;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zcta_dataset_models::{
    COLUMNS, RentIndexObservation, TransitDensity, ZctaAggregate, ZctaAggregateRow,
};

use crate::segment::IncomeQuartiles;

/// Errors that can occur while writing or reading the dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// I/O error (file read/write).
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// CSV serialization or parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The file's header is not the dataset header.
    #[error("Unexpected dataset header in {path}: {message}")]
    Header {
        /// File being read.
        path: PathBuf,
        /// Description of the mismatch.
        message: String,
    },

    /// A column named for filtering is not a dataset column.
    #[error("Unknown dataset column {column:?}")]
    UnknownColumn {
        /// The rejected name.
        column: String,
    },
}

/// File name of a metro's dataset.
#[must_use]
pub fn dataset_file_name(metro_key: &str) -> String {
    format!("final_zcta_dataset_{metro_key}.csv")
}

/// Full path of a metro's dataset inside `output_dir`.
#[must_use]
pub fn dataset_path(output_dir: &Path, metro_key: &str) -> PathBuf {
    output_dir.join(dataset_file_name(metro_key))
}

/// Joins aggregates with the external indexes and assigns income
/// segments.
///
/// Every aggregate yields exactly one row; ZCTAs missing from an
/// external source keep nulls in that source's columns. Rows are sorted
/// by ZCTA code.
#[must_use]
pub fn assemble(
    aggregates: &[ZctaAggregate],
    rent_index: &[RentIndexObservation],
    transit: &[TransitDensity],
) -> Vec<ZctaAggregateRow> {
    let rent_by_zip: BTreeMap<&str, &RentIndexObservation> =
        rent_index.iter().map(|o| (o.zip.as_str(), o)).collect();
    let transit_by_zcta: BTreeMap<&str, &TransitDensity> =
        transit.iter().map(|t| (t.zcta.as_str(), t)).collect();

    let mut rows: Vec<ZctaAggregateRow> = aggregates
        .iter()
        .map(|aggregate| {
            let mut row = ZctaAggregateRow::from_aggregate(aggregate);
            if let Some(obs) = rent_by_zip.get(aggregate.zcta.as_str()) {
                row.zori = Some(obs.value);
                row.period = Some(obs.period);
            }
            if let Some(density) = transit_by_zcta.get(aggregate.zcta.as_str()) {
                row.stops_per_km2 = Some(density.stops_per_km2);
            }
            row
        })
        .collect();
    rows.sort_by(|a, b| a.zcta.cmp(&b.zcta));

    assign_income_segments(&mut rows);

    let with_zori = rows.iter().filter(|r| r.zori.is_some()).count();
    let with_transit = rows.iter().filter(|r| r.stops_per_km2.is_some()).count();
    log::info!(
        "Assembled {} ZCTA rows ({with_zori} with rent index, {with_transit} with transit)",
        rows.len()
    );

    rows
}

/// Sets `income_segment` from quartiles of the rows' median incomes.
///
/// Rows without an income keep a null segment.
pub fn assign_income_segments(rows: &mut [ZctaAggregateRow]) {
    let Some(quartiles) = IncomeQuartiles::from_incomes(rows.iter().filter_map(|r| r.median_income))
    else {
        log::warn!("No ZCTA has a median income; income segments left empty");
        return;
    };
    log::debug!(
        "Income quartiles: q25 = {:.0}, q75 = {:.0}",
        quartiles.q25,
        quartiles.q75
    );

    for row in rows {
        row.income_segment = row.median_income.map(|income| quartiles.segment(income));
    }
}

/// Writes rows as CSV to `path`.
///
/// The file is written beside `path` under a temporary name and renamed
/// into place, so a failure never leaves a partial dataset behind.
/// Parent directories are created as needed.
///
/// # Errors
///
/// Returns [`DatasetError`] if the directory, file, or rename fails.
pub fn write_dataset(rows: &[ZctaAggregateRow], path: &Path) -> Result<(), DatasetError> {
    let io_err = |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let tmp = path.with_extension("csv.tmp");
    let result = write_rows(rows, &tmp);
    if let Err(e) = result {
        std::fs::remove_file(&tmp).ok();
        return Err(e);
    }
    std::fs::rename(&tmp, path).map_err(io_err)?;

    log::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

fn write_rows(rows: &[ZctaAggregateRow], path: &Path) -> Result<(), DatasetError> {
    let mut writer = csv::Writer::from_path(path)?;
    if rows.is_empty() {
        writer.write_record(COLUMNS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Reads a dataset written by [`write_dataset`].
///
/// # Errors
///
/// Returns [`DatasetError::Header`] if the header differs from
/// [`COLUMNS`], or [`DatasetError::Csv`] if a row cannot be parsed.
pub fn read_dataset(path: &Path) -> Result<Vec<ZctaAggregateRow>, DatasetError> {
    let mut reader = csv::Reader::from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
    if headers != COLUMNS {
        return Err(DatasetError::Header {
            path: path.to_path_buf(),
            message: format!("expected {} columns in fixed order, found {headers:?}", COLUMNS.len()),
        });
    }

    let rows = reader
        .deserialize()
        .collect::<Result<Vec<ZctaAggregateRow>, _>>()?;
    log::info!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Drops rows with a null in any of `required` columns, logging how many
/// were dropped.
///
/// # Errors
///
/// Returns [`DatasetError::UnknownColumn`] if a name in `required` is not
/// one of [`COLUMNS`]; no rows are filtered in that case.
pub fn drop_incomplete(
    rows: Vec<ZctaAggregateRow>,
    required: &[&str],
) -> Result<Vec<ZctaAggregateRow>, DatasetError> {
    if let Some(column) = required.iter().find(|c| !COLUMNS.contains(*c)) {
        return Err(DatasetError::UnknownColumn {
            column: (*column).to_string(),
        });
    }

    let before = rows.len();
    let kept: Vec<ZctaAggregateRow> = rows
        .into_iter()
        .filter(|row| required.iter().all(|column| !row.is_null(column)))
        .collect();

    let dropped = before - kept.len();
    if dropped > 0 {
        log::info!("Dropped {dropped} of {before} rows with nulls in {required:?}");
    }
    Ok(kept)
}
