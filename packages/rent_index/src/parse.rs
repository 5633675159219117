//! Wide-to-latest conversion of the ZORI table.
//!
//! Period columns are recognised by their header: four leading digits
//! followed by a `-` or `/` date (`2024-01-31`, `2024/01/31`, `2024-01`).
//! For each ZIP the observation with the greatest parsed date and a
//! numeric value wins, so column order in the file does not matter.
//! Non-numeric cells (Zillow uses blanks and `MA`) are skipped.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use zcta_dataset_models::RentIndexObservation;
use zcta_metro_models::fips::zero_pad;

use crate::RentIndexError;

/// Parses a period column header into a date.
///
/// Month-only headers are dated to the first of the month.
#[must_use]
pub fn parse_period(header: &str) -> Option<NaiveDate> {
    let header = header.trim();
    let looks_dated = header.len() >= 7
        && header.as_bytes()[..4].iter().all(u8::is_ascii_digit)
        && (header.contains('-') || header.contains('/'));
    if !looks_dated {
        return None;
    }

    ["%Y-%m-%d", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(header, fmt).ok())
        .or_else(|| NaiveDate::parse_from_str(&format!("{header}-01"), "%Y-%m-%d").ok())
        .or_else(|| NaiveDate::parse_from_str(&format!("{header}/01"), "%Y/%m/%d").ok())
}

/// Normalises a ZIP cell to five digits.
///
/// Accepts integer-looking values with dropped leading zeros (`501`) and
/// spreadsheet-style floats (`501.0`). Returns `None` for anything else.
#[must_use]
pub fn normalize_zip(cell: &str) -> Option<String> {
    let cell = cell.trim();
    let digits = cell.strip_suffix(".0").unwrap_or(cell);
    if digits.is_empty() || digits.len() > 5 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(zero_pad(digits, 5))
}

/// Extracts the latest observation per ZIP from a ZORI CSV.
///
/// Only ZIPs starting with one of `zip_prefixes` are kept; an empty
/// prefix list keeps every ZIP. Output is sorted by ZIP.
///
/// # Errors
///
/// Returns [`RentIndexError::Csv`] if the CSV cannot be read and
/// [`RentIndexError::Malformed`] if the ZIP column or every period column
/// is missing.
pub fn parse_latest(
    csv_text: &str,
    zip_column: &str,
    zip_prefixes: &[String],
) -> Result<Vec<RentIndexObservation>, RentIndexError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    let zip_idx = headers
        .iter()
        .position(|h| h == zip_column)
        .ok_or_else(|| RentIndexError::Malformed {
            message: format!("no '{zip_column}' column in header"),
        })?;

    let periods: Vec<(usize, NaiveDate)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| parse_period(h).map(|date| (i, date)))
        .collect();
    if periods.is_empty() {
        return Err(RentIndexError::Malformed {
            message: "no period columns in header".to_string(),
        });
    }
    log::debug!(
        "Rent index has {} period columns ({} .. {})",
        periods.len(),
        periods.iter().map(|(_, d)| d).min().map_or_else(String::new, ToString::to_string),
        periods.iter().map(|(_, d)| d).max().map_or_else(String::new, ToString::to_string),
    );

    let mut latest: BTreeMap<String, RentIndexObservation> = BTreeMap::new();
    let mut skipped = 0u64;

    for record in reader.records() {
        let record = record?;
        let Some(zip) = record.get(zip_idx).and_then(normalize_zip) else {
            skipped += 1;
            continue;
        };
        if !zip_prefixes.is_empty() && !zip_prefixes.iter().any(|p| zip.starts_with(p.as_str())) {
            continue;
        }

        let newest = periods
            .iter()
            .filter_map(|&(i, period)| {
                let value = record.get(i)?.trim().parse::<f64>().ok()?;
                value.is_finite().then_some((period, value))
            })
            .max_by_key(|(period, _)| *period);

        let Some((period, value)) = newest else {
            continue;
        };

        let replace = latest
            .get(&zip)
            .is_none_or(|existing| period > existing.period);
        if replace {
            latest.insert(zip.clone(), RentIndexObservation { zip, period, value });
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} rent index rows with an unreadable ZIP");
    }

    Ok(latest.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn prefixes(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn latest_period_wins_regardless_of_column_order() {
        let csv = "\
RegionID,SizeRank,RegionName,2023-03-31,2023-01-31,2023-02-28
1,0,85001,1500.5,1400,1450
";
        let out = parse_latest(csv, "RegionName", &prefixes(&["850"])).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].zip, "85001");
        assert_eq!(out[0].period, date(2023, 3, 31));
        assert!((out[0].value - 1500.5).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_latest_value_falls_back_to_previous_period() {
        let csv = "\
RegionName,2023-01-31,2023-02-28,2023-03-31
85001,1400,1450,
85002,1200,MA,
";
        let out = parse_latest(csv, "RegionName", &[]).unwrap();
        assert_eq!(out[0].period, date(2023, 2, 28));
        assert_eq!(out[1].zip, "85002");
        assert_eq!(out[1].period, date(2023, 1, 31));
    }

    #[test]
    fn zips_are_padded_and_filtered_by_prefix() {
        let csv = "\
RegionName,State,2024-01
501,NY,900
85004,AZ,1700
38103,TN,1300
";
        let out = parse_latest(csv, "RegionName", &prefixes(&["850", "005"])).unwrap();
        let zips: Vec<&str> = out.iter().map(|o| o.zip.as_str()).collect();
        assert_eq!(zips, vec!["00501", "85004"]);
        assert_eq!(out[0].period, date(2024, 1, 1));
    }

    #[test]
    fn rows_without_any_value_are_absent() {
        let csv = "RegionName,2023-01-31\n85001,\n85002,1000\n";
        let out = parse_latest(csv, "RegionName", &[]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].zip, "85002");
    }

    #[test]
    fn period_headers() {
        assert_eq!(parse_period("2024-01-31"), Some(date(2024, 1, 31)));
        assert_eq!(parse_period("2024/02/29"), Some(date(2024, 2, 29)));
        assert_eq!(parse_period("2024-05"), Some(date(2024, 5, 1)));
        assert_eq!(parse_period("RegionName"), None);
        assert_eq!(parse_period("SizeRank"), None);
        assert_eq!(parse_period("2024"), None);
    }

    #[test]
    fn zip_normalisation() {
        assert_eq!(normalize_zip(" 501 "), Some("00501".to_string()));
        assert_eq!(normalize_zip("85001.0"), Some("85001".to_string()));
        assert_eq!(normalize_zip("850011"), None);
        assert_eq!(normalize_zip("Phoenix"), None);
        assert_eq!(normalize_zip(""), None);
    }

    #[test]
    fn missing_columns_are_malformed() {
        assert!(matches!(
            parse_latest("Zip,2023-01-31\n85001,1\n", "RegionName", &[]),
            Err(RentIndexError::Malformed { .. })
        ));
        assert!(matches!(
            parse_latest("RegionName,State\n85001,AZ\n", "RegionName", &[]),
            Err(RentIndexError::Malformed { .. })
        ));
    }
}
