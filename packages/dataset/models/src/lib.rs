#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! ZCTA-level records produced by aggregation and assembly.
//!
//! [`ZctaAggregate`] is the population-weighted rollup of a ZCTA's tracts.
//! [`RentIndexObservation`] and [`TransitDensity`] are the external
//! indexes joined onto it, and [`ZctaAggregateRow`] is one row of the
//! final dataset, with fields declared in output column order.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use zcta_census_models::FeatureSet;

/// Output columns, in order. Downstream analysis depends on these names
/// and this order.
pub const COLUMNS: [&str; 32] = [
    "ZCTA5CE",
    "rent_to_income",
    "pct_rent_burden_30",
    "pct_rent_burden_50",
    "zori",
    "commute_min_proxy",
    "pct_commute_lt10",
    "pct_commute_10_19",
    "pct_commute_20_29",
    "pct_commute_30_44",
    "pct_commute_45_59",
    "pct_commute_60_plus",
    "ttw_total",
    "pct_drive_alone",
    "pct_carpool",
    "pct_car",
    "pct_transit",
    "pct_walk",
    "pct_wfh",
    "renter_share",
    "vehicle_access",
    "total_pop",
    "pop_density",
    "pct_white",
    "pct_black",
    "pct_asian",
    "pct_hispanic",
    "pct_other",
    "median_income",
    "income_segment",
    "stops_per_km2",
    "period",
];

/// Population-weighted statistics for one ZCTA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZctaAggregate {
    /// Five-digit ZCTA code.
    pub zcta: String,
    /// Number of tracts whose centroid falls in this ZCTA.
    pub tract_count: usize,
    /// Sum of tract populations.
    pub total_pop: f64,
    /// Sum of tract workers reporting a travel time.
    pub ttw_total: f64,
    /// Area in km², measured in the metro's UTM zone.
    pub area_km2: f64,
    /// `total_pop / area_km2`; `None` for a zero-area polygon.
    pub pop_density: Option<f64>,
    /// Population-weighted means of the tract features.
    pub features: FeatureSet,
}

/// Median-income tier of a ZCTA relative to the rest of its metro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IncomeSegment {
    /// At or below the 25th percentile.
    Low,
    /// Between the 25th (exclusive) and 75th (inclusive) percentiles.
    Medium,
    /// Above the 75th percentile.
    High,
}

impl IncomeSegment {
    /// Label written to the dataset.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for IncomeSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncomeSegment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Self::Low),
            "Medium" => Ok(Self::Medium),
            "High" => Ok(Self::High),
            other => Err(format!("unknown income segment '{other}'")),
        }
    }
}

/// Latest rent index value for one ZIP code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentIndexObservation {
    /// Five-digit ZIP code.
    pub zip: String,
    /// Period (month end) of the observation.
    pub period: NaiveDate,
    /// Index value (typical monthly rent, USD).
    pub value: f64,
}

/// Which query produced a ZCTA's transit stop count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitOutcome {
    /// The primary tag filter found stops.
    Primary,
    /// The primary filter was empty and the fallback filter found stops.
    Fallback,
    /// Both filters returned nothing; zero is the real count.
    Empty,
    /// A query failed; zero was recorded with a warning.
    Failed,
}

/// Transit stop density for one ZCTA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitDensity {
    /// Five-digit ZCTA code.
    pub zcta: String,
    /// Number of transit features found.
    pub stop_count: u64,
    /// Area in km², measured in the metro's UTM zone.
    pub area_km2: f64,
    /// `stop_count / area_km2`, or `0` for a zero-area polygon.
    pub stops_per_km2: f64,
    /// Which query produced the count.
    pub outcome: TransitOutcome,
}

/// One row of the final dataset. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZctaAggregateRow {
    #[serde(rename = "ZCTA5CE")]
    pub zcta: String,
    pub rent_to_income: Option<f64>,
    pub pct_rent_burden_30: Option<f64>,
    pub pct_rent_burden_50: Option<f64>,
    pub zori: Option<f64>,
    pub commute_min_proxy: Option<f64>,
    pub pct_commute_lt10: Option<f64>,
    pub pct_commute_10_19: Option<f64>,
    pub pct_commute_20_29: Option<f64>,
    pub pct_commute_30_44: Option<f64>,
    pub pct_commute_45_59: Option<f64>,
    pub pct_commute_60_plus: Option<f64>,
    pub ttw_total: f64,
    pub pct_drive_alone: Option<f64>,
    pub pct_carpool: Option<f64>,
    pub pct_car: Option<f64>,
    pub pct_transit: Option<f64>,
    pub pct_walk: Option<f64>,
    pub pct_wfh: Option<f64>,
    pub renter_share: Option<f64>,
    pub vehicle_access: Option<f64>,
    pub total_pop: f64,
    pub pop_density: Option<f64>,
    pub pct_white: Option<f64>,
    pub pct_black: Option<f64>,
    pub pct_asian: Option<f64>,
    pub pct_hispanic: Option<f64>,
    pub pct_other: Option<f64>,
    pub median_income: Option<f64>,
    pub income_segment: Option<IncomeSegment>,
    pub stops_per_km2: Option<f64>,
    pub period: Option<NaiveDate>,
}

impl ZctaAggregateRow {
    /// Builds a row from an aggregate with no external data joined yet.
    #[must_use]
    pub fn from_aggregate(aggregate: &ZctaAggregate) -> Self {
        let f = &aggregate.features;
        Self {
            zcta: aggregate.zcta.clone(),
            rent_to_income: f.rent_to_income,
            pct_rent_burden_30: f.pct_rent_burden_30,
            pct_rent_burden_50: f.pct_rent_burden_50,
            zori: None,
            commute_min_proxy: f.commute_min_proxy,
            pct_commute_lt10: f.pct_commute_lt10,
            pct_commute_10_19: f.pct_commute_10_19,
            pct_commute_20_29: f.pct_commute_20_29,
            pct_commute_30_44: f.pct_commute_30_44,
            pct_commute_45_59: f.pct_commute_45_59,
            pct_commute_60_plus: f.pct_commute_60_plus,
            ttw_total: aggregate.ttw_total,
            pct_drive_alone: f.pct_drive_alone,
            pct_carpool: f.pct_carpool,
            pct_car: f.pct_car,
            pct_transit: f.pct_transit,
            pct_walk: f.pct_walk,
            pct_wfh: f.pct_wfh,
            renter_share: f.renter_share,
            vehicle_access: f.vehicle_access,
            total_pop: aggregate.total_pop,
            pop_density: aggregate.pop_density,
            pct_white: f.pct_white,
            pct_black: f.pct_black,
            pct_asian: f.pct_asian,
            pct_hispanic: f.pct_hispanic,
            pct_other: f.pct_other,
            median_income: f.median_income,
            income_segment: None,
            stops_per_km2: None,
            period: None,
        }
    }

    /// Value of a numeric column by name; `None` for null cells and for
    /// the non-numeric columns.
    #[must_use]
    pub const fn numeric(&self, column: &str) -> Option<f64> {
        match column.as_bytes() {
            b"rent_to_income" => self.rent_to_income,
            b"pct_rent_burden_30" => self.pct_rent_burden_30,
            b"pct_rent_burden_50" => self.pct_rent_burden_50,
            b"zori" => self.zori,
            b"commute_min_proxy" => self.commute_min_proxy,
            b"pct_commute_lt10" => self.pct_commute_lt10,
            b"pct_commute_10_19" => self.pct_commute_10_19,
            b"pct_commute_20_29" => self.pct_commute_20_29,
            b"pct_commute_30_44" => self.pct_commute_30_44,
            b"pct_commute_45_59" => self.pct_commute_45_59,
            b"pct_commute_60_plus" => self.pct_commute_60_plus,
            b"ttw_total" => Some(self.ttw_total),
            b"pct_drive_alone" => self.pct_drive_alone,
            b"pct_carpool" => self.pct_carpool,
            b"pct_car" => self.pct_car,
            b"pct_transit" => self.pct_transit,
            b"pct_walk" => self.pct_walk,
            b"pct_wfh" => self.pct_wfh,
            b"renter_share" => self.renter_share,
            b"vehicle_access" => self.vehicle_access,
            b"total_pop" => Some(self.total_pop),
            b"pop_density" => self.pop_density,
            b"pct_white" => self.pct_white,
            b"pct_black" => self.pct_black,
            b"pct_asian" => self.pct_asian,
            b"pct_hispanic" => self.pct_hispanic,
            b"pct_other" => self.pct_other,
            b"median_income" => self.median_income,
            b"stops_per_km2" => self.stops_per_km2,
            _ => None,
        }
    }

    /// Returns `true` if the named column is null in this row.
    ///
    /// Names outside [`COLUMNS`] read as null; callers filtering on
    /// user-supplied names check them against [`COLUMNS`] first.
    #[must_use]
    pub fn is_null(&self, column: &str) -> bool {
        match column {
            "ZCTA5CE" => self.zcta.is_empty(),
            "income_segment" => self.income_segment.is_none(),
            "period" => self.period.is_none(),
            other => self.numeric(other).is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn aggregate() -> ZctaAggregate {
        ZctaAggregate {
            zcta: "85004".to_string(),
            tract_count: 2,
            total_pop: 400.0,
            ttw_total: 200.0,
            area_km2: 4.0,
            pop_density: Some(100.0),
            features: FeatureSet {
                commute_min_proxy: Some(27.5),
                median_income: Some(55_000.0),
                ..FeatureSet::default()
            },
        }
    }

    #[test]
    fn columns_are_unique() {
        let unique: BTreeSet<_> = COLUMNS.iter().collect();
        assert_eq!(unique.len(), COLUMNS.len());
    }

    #[test]
    fn every_numeric_column_is_addressable() {
        let row = ZctaAggregateRow::from_aggregate(&aggregate());
        assert_eq!(row.numeric("total_pop"), Some(400.0));
        assert_eq!(row.numeric("commute_min_proxy"), Some(27.5));
        assert_eq!(row.numeric("ZCTA5CE"), None);
        assert!(!row.is_null("ZCTA5CE"));
        assert!(row.is_null("zori"));
        assert!(row.is_null("income_segment"));
        assert!(row.is_null("period"));
        assert!(!row.is_null("pop_density"));
    }

    #[test]
    fn from_aggregate_leaves_external_columns_null() {
        let row = ZctaAggregateRow::from_aggregate(&aggregate());
        assert_eq!(row.zcta, "85004");
        assert_eq!(row.zori, None);
        assert_eq!(row.stops_per_km2, None);
        assert_eq!(row.period, None);
        assert_eq!(row.median_income, Some(55_000.0));
    }

    #[test]
    fn income_segment_labels() {
        assert_eq!(IncomeSegment::Low.to_string(), "Low");
        assert_eq!("High".parse::<IncomeSegment>(), Ok(IncomeSegment::High));
        assert!("low".parse::<IncomeSegment>().is_err());
    }
}
