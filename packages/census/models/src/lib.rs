#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! American Community Survey tract data types.
//!
//! [`RawCounts`] holds the ACS 5-year estimates fetched for one tract,
//! keyed by the variable table in [`ACS_VARIABLES`]. [`FeatureSet`] holds
//! the ratios and percentages derived from them; the same type carries
//! the population-weighted values at the ZCTA level.

use serde::{Deserialize, Serialize};

/// ACS 5-year vintages the pipeline accepts.
pub const ACS_YEARS: [u16; 5] = [2015, 2017, 2019, 2021, 2023];

/// Vintage used when none is requested.
pub const DEFAULT_ACS_YEAR: u16 = 2023;

/// One ACS variable requested from the Census API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcsVariable {
    /// Census variable code, e.g. `B25064_001E`.
    pub code: &'static str,
    /// Field name in [`RawCounts`].
    pub name: &'static str,
}

/// Every variable fetched per tract, in request order.
pub const ACS_VARIABLES: &[AcsVariable] = &[
    AcsVariable { code: "B25064_001E", name: "median_rent" },
    AcsVariable { code: "B19013_001E", name: "median_income" },
    // Travel time to work (B08303)
    AcsVariable { code: "B08303_001E", name: "ttw_total" },
    AcsVariable { code: "B08303_002E", name: "ttw_lt5" },
    AcsVariable { code: "B08303_003E", name: "ttw_5_9" },
    AcsVariable { code: "B08303_004E", name: "ttw_10_14" },
    AcsVariable { code: "B08303_005E", name: "ttw_15_19" },
    AcsVariable { code: "B08303_006E", name: "ttw_20_24" },
    AcsVariable { code: "B08303_007E", name: "ttw_25_29" },
    AcsVariable { code: "B08303_008E", name: "ttw_30_34" },
    AcsVariable { code: "B08303_009E", name: "ttw_35_39" },
    AcsVariable { code: "B08303_010E", name: "ttw_40_44" },
    AcsVariable { code: "B08303_011E", name: "ttw_45_59" },
    AcsVariable { code: "B08303_012E", name: "ttw_60_89" },
    AcsVariable { code: "B08303_013E", name: "ttw_90_plus" },
    // Means of transportation to work (B08301)
    AcsVariable { code: "B08301_001E", name: "mode_total" },
    AcsVariable { code: "B08301_003E", name: "mode_car_alone" },
    AcsVariable { code: "B08301_004E", name: "mode_carpool" },
    AcsVariable { code: "B08301_010E", name: "mode_transit" },
    AcsVariable { code: "B08301_019E", name: "mode_walk" },
    AcsVariable { code: "B08301_020E", name: "mode_other" },
    AcsVariable { code: "B08301_021E", name: "mode_wfh" },
    // Gross rent as a percentage of household income (B25070)
    AcsVariable { code: "B25070_001E", name: "rent_burden_total" },
    AcsVariable { code: "B25070_008E", name: "rent_burden_30_34" },
    AcsVariable { code: "B25070_009E", name: "rent_burden_35_39" },
    AcsVariable { code: "B25070_010E", name: "rent_burden_40_49" },
    AcsVariable { code: "B25070_011E", name: "rent_burden_50_plus" },
    // Tenure (B25003)
    AcsVariable { code: "B25003_001E", name: "tenure_total" },
    AcsVariable { code: "B25003_002E", name: "tenure_owner" },
    AcsVariable { code: "B25003_003E", name: "tenure_renter" },
    // Vehicles available (B08201)
    AcsVariable { code: "B08201_001E", name: "vehicles_total" },
    AcsVariable { code: "B08201_002E", name: "vehicles_none" },
    AcsVariable { code: "B08201_003E", name: "vehicles_1" },
    AcsVariable { code: "B08201_007E", name: "vehicles_2_plus" },
    // Hispanic or Latino origin by race (B03002)
    AcsVariable { code: "B03002_001E", name: "total_pop" },
    AcsVariable { code: "B03002_012E", name: "hispanic" },
    AcsVariable { code: "B03002_003E", name: "white_nh" },
    AcsVariable { code: "B03002_004E", name: "black_nh" },
    AcsVariable { code: "B03002_006E", name: "asian_nh" },
];

/// Returns `true` if `year` is one of [`ACS_YEARS`].
#[must_use]
pub fn is_supported_year(year: u16) -> bool {
    ACS_YEARS.contains(&year)
}

/// Comma-separated variable codes for the API `get` parameter.
#[must_use]
pub fn variable_codes() -> String {
    ACS_VARIABLES
        .iter()
        .map(|v| v.code)
        .collect::<Vec<_>>()
        .join(",")
}

/// ACS estimates for one tract. `None` means the Census reported a
/// missing-value sentinel or the cell could not be parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCounts {
    pub median_rent: Option<f64>,
    pub median_income: Option<f64>,
    pub ttw_total: Option<f64>,
    pub ttw_lt5: Option<f64>,
    pub ttw_5_9: Option<f64>,
    pub ttw_10_14: Option<f64>,
    pub ttw_15_19: Option<f64>,
    pub ttw_20_24: Option<f64>,
    pub ttw_25_29: Option<f64>,
    pub ttw_30_34: Option<f64>,
    pub ttw_35_39: Option<f64>,
    pub ttw_40_44: Option<f64>,
    pub ttw_45_59: Option<f64>,
    pub ttw_60_89: Option<f64>,
    pub ttw_90_plus: Option<f64>,
    pub mode_total: Option<f64>,
    pub mode_car_alone: Option<f64>,
    pub mode_carpool: Option<f64>,
    pub mode_transit: Option<f64>,
    pub mode_walk: Option<f64>,
    pub mode_other: Option<f64>,
    pub mode_wfh: Option<f64>,
    pub rent_burden_total: Option<f64>,
    pub rent_burden_30_34: Option<f64>,
    pub rent_burden_35_39: Option<f64>,
    pub rent_burden_40_49: Option<f64>,
    pub rent_burden_50_plus: Option<f64>,
    pub tenure_total: Option<f64>,
    pub tenure_owner: Option<f64>,
    pub tenure_renter: Option<f64>,
    pub vehicles_total: Option<f64>,
    pub vehicles_none: Option<f64>,
    pub vehicles_1: Option<f64>,
    pub vehicles_2_plus: Option<f64>,
    pub total_pop: Option<f64>,
    pub hispanic: Option<f64>,
    pub white_nh: Option<f64>,
    pub black_nh: Option<f64>,
    pub asian_nh: Option<f64>,
}

impl RawCounts {
    /// Mutable slot for an ACS variable code, or `None` for codes that
    /// are not part of [`ACS_VARIABLES`].
    pub fn slot_mut(&mut self, code: &str) -> Option<&mut Option<f64>> {
        let slot = match code {
            "B25064_001E" => &mut self.median_rent,
            "B19013_001E" => &mut self.median_income,
            "B08303_001E" => &mut self.ttw_total,
            "B08303_002E" => &mut self.ttw_lt5,
            "B08303_003E" => &mut self.ttw_5_9,
            "B08303_004E" => &mut self.ttw_10_14,
            "B08303_005E" => &mut self.ttw_15_19,
            "B08303_006E" => &mut self.ttw_20_24,
            "B08303_007E" => &mut self.ttw_25_29,
            "B08303_008E" => &mut self.ttw_30_34,
            "B08303_009E" => &mut self.ttw_35_39,
            "B08303_010E" => &mut self.ttw_40_44,
            "B08303_011E" => &mut self.ttw_45_59,
            "B08303_012E" => &mut self.ttw_60_89,
            "B08303_013E" => &mut self.ttw_90_plus,
            "B08301_001E" => &mut self.mode_total,
            "B08301_003E" => &mut self.mode_car_alone,
            "B08301_004E" => &mut self.mode_carpool,
            "B08301_010E" => &mut self.mode_transit,
            "B08301_019E" => &mut self.mode_walk,
            "B08301_020E" => &mut self.mode_other,
            "B08301_021E" => &mut self.mode_wfh,
            "B25070_001E" => &mut self.rent_burden_total,
            "B25070_008E" => &mut self.rent_burden_30_34,
            "B25070_009E" => &mut self.rent_burden_35_39,
            "B25070_010E" => &mut self.rent_burden_40_49,
            "B25070_011E" => &mut self.rent_burden_50_plus,
            "B25003_001E" => &mut self.tenure_total,
            "B25003_002E" => &mut self.tenure_owner,
            "B25003_003E" => &mut self.tenure_renter,
            "B08201_001E" => &mut self.vehicles_total,
            "B08201_002E" => &mut self.vehicles_none,
            "B08201_003E" => &mut self.vehicles_1,
            "B08201_007E" => &mut self.vehicles_2_plus,
            "B03002_001E" => &mut self.total_pop,
            "B03002_012E" => &mut self.hispanic,
            "B03002_003E" => &mut self.white_nh,
            "B03002_004E" => &mut self.black_nh,
            "B03002_006E" => &mut self.asian_nh,
            _ => return None,
        };
        Some(slot)
    }

    /// Travel-time histogram counts in bin order (`<5` through `90+`).
    #[must_use]
    pub const fn travel_time_bins(&self) -> [Option<f64>; 12] {
        [
            self.ttw_lt5,
            self.ttw_5_9,
            self.ttw_10_14,
            self.ttw_15_19,
            self.ttw_20_24,
            self.ttw_25_29,
            self.ttw_30_34,
            self.ttw_35_39,
            self.ttw_40_44,
            self.ttw_45_59,
            self.ttw_60_89,
            self.ttw_90_plus,
        ]
    }

    /// Non-Hispanic population outside the four named groups: the
    /// residual of the total, clipped at zero.
    #[must_use]
    pub fn other_nh(&self) -> Option<f64> {
        let residual = self.total_pop?
            - self.hispanic?
            - self.white_nh?
            - self.black_nh?
            - self.asian_nh?;
        Some(residual.max(0.0))
    }
}

/// Number of fields in a [`FeatureSet`].
pub const FEATURE_COUNT: usize = 25;

/// Derived tract (or population-weighted ZCTA) statistics.
///
/// Percentages are on a 0-100 scale. `None` means undefined, usually
/// because the denominator was zero or missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub median_income: Option<f64>,
    pub rent_to_income: Option<f64>,
    pub commute_min_proxy: Option<f64>,
    pub pct_commute_lt10: Option<f64>,
    pub pct_commute_10_19: Option<f64>,
    pub pct_commute_20_29: Option<f64>,
    pub pct_commute_30_44: Option<f64>,
    pub pct_commute_45_59: Option<f64>,
    pub pct_commute_60_plus: Option<f64>,
    pub pct_drive_alone: Option<f64>,
    pub pct_carpool: Option<f64>,
    pub pct_car: Option<f64>,
    pub pct_transit: Option<f64>,
    pub pct_walk: Option<f64>,
    pub pct_wfh: Option<f64>,
    pub pct_rent_burden_30: Option<f64>,
    pub pct_rent_burden_50: Option<f64>,
    pub renter_share: Option<f64>,
    pub pct_no_vehicle: Option<f64>,
    pub vehicle_access: Option<f64>,
    pub pct_hispanic: Option<f64>,
    pub pct_white: Option<f64>,
    pub pct_black: Option<f64>,
    pub pct_asian: Option<f64>,
    pub pct_other: Option<f64>,
}

impl FeatureSet {
    /// Field names, in the order used by [`Self::values`].
    pub const NAMES: [&'static str; FEATURE_COUNT] = [
        "median_income",
        "rent_to_income",
        "commute_min_proxy",
        "pct_commute_lt10",
        "pct_commute_10_19",
        "pct_commute_20_29",
        "pct_commute_30_44",
        "pct_commute_45_59",
        "pct_commute_60_plus",
        "pct_drive_alone",
        "pct_carpool",
        "pct_car",
        "pct_transit",
        "pct_walk",
        "pct_wfh",
        "pct_rent_burden_30",
        "pct_rent_burden_50",
        "renter_share",
        "pct_no_vehicle",
        "vehicle_access",
        "pct_hispanic",
        "pct_white",
        "pct_black",
        "pct_asian",
        "pct_other",
    ];

    /// All fields as an array, ordered like [`Self::NAMES`].
    #[must_use]
    pub const fn values(&self) -> [Option<f64>; FEATURE_COUNT] {
        [
            self.median_income,
            self.rent_to_income,
            self.commute_min_proxy,
            self.pct_commute_lt10,
            self.pct_commute_10_19,
            self.pct_commute_20_29,
            self.pct_commute_30_44,
            self.pct_commute_45_59,
            self.pct_commute_60_plus,
            self.pct_drive_alone,
            self.pct_carpool,
            self.pct_car,
            self.pct_transit,
            self.pct_walk,
            self.pct_wfh,
            self.pct_rent_burden_30,
            self.pct_rent_burden_50,
            self.renter_share,
            self.pct_no_vehicle,
            self.vehicle_access,
            self.pct_hispanic,
            self.pct_white,
            self.pct_black,
            self.pct_asian,
            self.pct_other,
        ]
    }

    /// Inverse of [`Self::values`].
    #[must_use]
    pub const fn from_values(values: [Option<f64>; FEATURE_COUNT]) -> Self {
        let [
            median_income,
            rent_to_income,
            commute_min_proxy,
            pct_commute_lt10,
            pct_commute_10_19,
            pct_commute_20_29,
            pct_commute_30_44,
            pct_commute_45_59,
            pct_commute_60_plus,
            pct_drive_alone,
            pct_carpool,
            pct_car,
            pct_transit,
            pct_walk,
            pct_wfh,
            pct_rent_burden_30,
            pct_rent_burden_50,
            renter_share,
            pct_no_vehicle,
            vehicle_access,
            pct_hispanic,
            pct_white,
            pct_black,
            pct_asian,
            pct_other,
        ] = values;
        Self {
            median_income,
            rent_to_income,
            commute_min_proxy,
            pct_commute_lt10,
            pct_commute_10_19,
            pct_commute_20_29,
            pct_commute_30_44,
            pct_commute_45_59,
            pct_commute_60_plus,
            pct_drive_alone,
            pct_carpool,
            pct_car,
            pct_transit,
            pct_walk,
            pct_wfh,
            pct_rent_burden_30,
            pct_rent_burden_50,
            renter_share,
            pct_no_vehicle,
            vehicle_access,
            pct_hispanic,
            pct_white,
            pct_black,
            pct_asian,
            pct_other,
        }
    }

    /// Names of the fields that are percentages on a 0-100 scale.
    pub fn percentage_names() -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(|name| {
                name.starts_with("pct_") || *name == "renter_share" || *name == "vehicle_access"
            })
    }

    /// Value of the named field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        Self::NAMES
            .iter()
            .position(|n| *n == name)
            .and_then(|i| self.values()[i])
    }
}

/// One tract's ACS data and derived features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TractFeatureRow {
    /// Eleven-digit tract GEOID (state + county + tract).
    pub geoid: String,
    /// ACS 5-year vintage.
    pub year: u16,
    /// Raw estimates.
    pub raw: RawCounts,
    /// Derived features.
    pub features: FeatureSet,
}

impl TractFeatureRow {
    /// Tract population (`B03002_001E`).
    #[must_use]
    pub const fn total_pop(&self) -> Option<f64> {
        self.raw.total_pop
    }

    /// Workers reporting a travel time (`B08303_001E`).
    #[must_use]
    pub const fn ttw_total(&self) -> Option<f64> {
        self.raw.ttw_total
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn every_variable_has_a_slot() {
        let mut raw = RawCounts::default();
        for var in ACS_VARIABLES {
            assert!(raw.slot_mut(var.code).is_some(), "no slot for {}", var.code);
        }
        assert!(raw.slot_mut("B99999_001E").is_none());
    }

    #[test]
    fn variable_codes_and_names_are_unique() {
        let codes: BTreeSet<_> = ACS_VARIABLES.iter().map(|v| v.code).collect();
        let names: BTreeSet<_> = ACS_VARIABLES.iter().map(|v| v.name).collect();
        assert_eq!(codes.len(), ACS_VARIABLES.len());
        assert_eq!(names.len(), ACS_VARIABLES.len());
    }

    #[test]
    fn slot_writes_the_named_field() {
        let mut raw = RawCounts::default();
        *raw.slot_mut("B25064_001E").unwrap() = Some(1200.0);
        *raw.slot_mut("B08303_013E").unwrap() = Some(4.0);
        assert_eq!(raw.median_rent, Some(1200.0));
        assert_eq!(raw.travel_time_bins()[11], Some(4.0));
    }

    #[test]
    fn other_residual_is_clipped() {
        let raw = RawCounts {
            total_pop: Some(100.0),
            hispanic: Some(40.0),
            white_nh: Some(30.0),
            black_nh: Some(20.0),
            asian_nh: Some(5.0),
            ..RawCounts::default()
        };
        assert_eq!(raw.other_nh(), Some(5.0));

        let over = RawCounts {
            asian_nh: Some(15.0),
            ..raw.clone()
        };
        assert_eq!(over.other_nh(), Some(0.0));

        let missing = RawCounts {
            hispanic: None,
            ..raw
        };
        assert_eq!(missing.other_nh(), None);
    }

    #[test]
    fn feature_values_round_trip_by_position() {
        let mut values = [None; FEATURE_COUNT];
        for (i, v) in values.iter_mut().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            {
                *v = Some(i as f64);
            }
        }
        let set = FeatureSet::from_values(values);
        assert_eq!(set.values(), values);
        assert_eq!(set.get("median_income"), Some(0.0));
        assert_eq!(set.get("pct_other"), Some(24.0));
        assert_eq!(set.get("nope"), None);
    }

    #[test]
    fn percentage_names_exclude_ratios() {
        let names: Vec<_> = FeatureSet::percentage_names().collect();
        assert_eq!(names.len(), 22);
        assert!(!names.contains(&"rent_to_income"));
        assert!(!names.contains(&"commute_min_proxy"));
        assert!(!names.contains(&"median_income"));
    }

    #[test]
    fn supported_years() {
        assert!(is_supported_year(DEFAULT_ACS_YEAR));
        assert!(is_supported_year(2015));
        assert!(!is_supported_year(2022));
        assert!(variable_codes().starts_with("B25064_001E,B19013_001E,"));
    }
}
