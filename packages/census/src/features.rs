//! Tract feature derivation from raw ACS counts.
//!
//! Every feature is a pure function of one tract's [`RawCounts`], so the
//! same tract always yields the same features regardless of which metro
//! it is fetched for.

use serde::{Deserialize, Serialize};
use zcta_census_models::{FeatureSet, RawCounts};

/// Midpoints (minutes) of the eleven closed travel-time bins, `<5`
/// through `60-89`.
pub const BIN_MIDPOINTS: [f64; 11] = [
    2.5, 7.0, 12.0, 17.0, 22.0, 27.0, 32.0, 37.0, 42.0, 52.0, 75.0,
];

/// Lower bound of the open-ended top travel-time bin (`90+`).
pub const TOP_BIN_LOWER: f64 = 90.0;

/// Minutes added to [`TOP_BIN_LOWER`] when valuing the `90+` bin.
pub const DEFAULT_TOP_BIN_OFFSET: f64 = 10.0;

/// How the travel-time histogram is collapsed into a mean commute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommuteBins {
    /// Minutes added to the `90+` bin's lower bound.
    pub top_bin_offset: f64,
}

impl Default for CommuteBins {
    fn default() -> Self {
        Self {
            top_bin_offset: DEFAULT_TOP_BIN_OFFSET,
        }
    }
}

impl CommuteBins {
    /// Value assigned to the `90+` bin.
    #[must_use]
    pub fn top_bin_value(&self) -> f64 {
        TOP_BIN_LOWER + self.top_bin_offset
    }

    /// Midpoint-weighted mean travel time over the histogram.
    ///
    /// Returns `None` when the worker total is missing or zero. Missing
    /// bins contribute nothing.
    #[must_use]
    pub fn mean_minutes(&self, raw: &RawCounts) -> Option<f64> {
        let total = positive(raw.ttw_total)?;
        let top = self.top_bin_value();
        let weighted: f64 = raw
            .travel_time_bins()
            .iter()
            .zip(BIN_MIDPOINTS.iter().chain(std::iter::once(&top)))
            .map(|(count, minutes)| count.unwrap_or(0.0) * minutes)
            .sum();
        Some(weighted / total)
    }
}

/// Derives every tract feature from raw counts.
#[must_use]
pub fn derive(raw: &RawCounts, bins: &CommuteBins) -> FeatureSet {
    let ttw = raw.ttw_total;
    let mode = raw.mode_total;
    let burden = raw.rent_burden_total;
    let vehicles = raw.vehicles_total;
    let pop = raw.total_pop;

    FeatureSet {
        median_income: raw.median_income,
        rent_to_income: rent_to_income(raw.median_rent, raw.median_income),
        commute_min_proxy: bins.mean_minutes(raw),
        pct_commute_lt10: pct(sum(&[raw.ttw_lt5, raw.ttw_5_9]), ttw),
        pct_commute_10_19: pct(sum(&[raw.ttw_10_14, raw.ttw_15_19]), ttw),
        pct_commute_20_29: pct(sum(&[raw.ttw_20_24, raw.ttw_25_29]), ttw),
        pct_commute_30_44: pct(sum(&[raw.ttw_30_34, raw.ttw_35_39, raw.ttw_40_44]), ttw),
        pct_commute_45_59: pct(raw.ttw_45_59, ttw),
        pct_commute_60_plus: pct(sum(&[raw.ttw_60_89, raw.ttw_90_plus]), ttw),
        pct_drive_alone: pct(raw.mode_car_alone, mode),
        pct_carpool: pct(raw.mode_carpool, mode),
        pct_car: pct(sum(&[raw.mode_car_alone, raw.mode_carpool]), mode),
        pct_transit: pct(raw.mode_transit, mode),
        pct_walk: pct(raw.mode_walk, mode),
        pct_wfh: pct(raw.mode_wfh, mode),
        pct_rent_burden_30: pct(
            sum(&[
                raw.rent_burden_30_34,
                raw.rent_burden_35_39,
                raw.rent_burden_40_49,
                raw.rent_burden_50_plus,
            ]),
            burden,
        ),
        pct_rent_burden_50: pct(raw.rent_burden_50_plus, burden),
        renter_share: pct(raw.tenure_renter, raw.tenure_total),
        pct_no_vehicle: pct(raw.vehicles_none, vehicles),
        vehicle_access: pct(sum(&[raw.vehicles_1, raw.vehicles_2_plus]), vehicles),
        pct_hispanic: pct(raw.hispanic, pop),
        pct_white: pct(raw.white_nh, pop),
        pct_black: pct(raw.black_nh, pop),
        pct_asian: pct(raw.asian_nh, pop),
        pct_other: pct(raw.other_nh(), pop),
    }
}

/// Median gross rent as a percentage of median household income.
///
/// Defined only when both are positive.
#[must_use]
pub fn rent_to_income(median_rent: Option<f64>, median_income: Option<f64>) -> Option<f64> {
    let rent = positive(median_rent)?;
    let income = positive(median_income)?;
    Some(100.0 * rent / income)
}

/// `100 * part / total`, clamped to `[0, 100]`; `None` if either side is
/// missing or the total is zero.
#[must_use]
pub fn pct(part: Option<f64>, total: Option<f64>) -> Option<f64> {
    let total = positive(total)?;
    Some((100.0 * part? / total).clamp(0.0, 100.0))
}

/// Sum of several counts; `None` if any is missing.
fn sum(values: &[Option<f64>]) -> Option<f64> {
    values.iter().try_fold(0.0, |acc, v| v.map(|v| acc + v))
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.unwrap_or_else(|| panic!("expected {expected}, got None"));
        assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
    }

    fn histogram(bins: [f64; 12]) -> RawCounts {
        RawCounts {
            ttw_total: Some(bins.iter().sum()),
            ttw_lt5: Some(bins[0]),
            ttw_5_9: Some(bins[1]),
            ttw_10_14: Some(bins[2]),
            ttw_15_19: Some(bins[3]),
            ttw_20_24: Some(bins[4]),
            ttw_25_29: Some(bins[5]),
            ttw_30_34: Some(bins[6]),
            ttw_35_39: Some(bins[7]),
            ttw_40_44: Some(bins[8]),
            ttw_45_59: Some(bins[9]),
            ttw_60_89: Some(bins[10]),
            ttw_90_plus: Some(bins[11]),
            ..RawCounts::default()
        }
    }

    #[test]
    fn commute_proxy_uses_bin_midpoints() {
        // Half the workers in 25-29 (27) and half in 30-34 (32).
        let raw = histogram([0.0, 0.0, 0.0, 0.0, 0.0, 50.0, 50.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let features = derive(&raw, &CommuteBins::default());
        assert_close(features.commute_min_proxy, 29.5);
        assert_close(features.pct_commute_20_29, 50.0);
        assert_close(features.pct_commute_30_44, 50.0);
    }

    #[test]
    fn top_bin_offset_is_configurable() {
        let mut counts = [0.0; 12];
        counts[11] = 10.0;
        let raw = histogram(counts);
        assert_close(CommuteBins::default().mean_minutes(&raw), 100.0);
        let bins = CommuteBins {
            top_bin_offset: 30.0,
        };
        assert_close(bins.mean_minutes(&raw), 120.0);
        assert_close(derive(&raw, &bins).pct_commute_60_plus, 100.0);
    }

    #[test]
    fn zero_workers_leave_commute_undefined() {
        let raw = histogram([0.0; 12]);
        let features = derive(&raw, &CommuteBins::default());
        assert_eq!(features.commute_min_proxy, None);
        assert_eq!(features.pct_commute_lt10, None);
        assert_eq!(features.pct_commute_60_plus, None);
    }

    #[test]
    fn rent_to_income_is_a_percentage() {
        assert_close(rent_to_income(Some(1_000.0), Some(50_000.0)), 2.0);
        assert_eq!(rent_to_income(Some(1_000.0), Some(0.0)), None);
        assert_eq!(rent_to_income(None, Some(50_000.0)), None);
        assert_eq!(rent_to_income(Some(0.0), Some(50_000.0)), None);
    }

    #[test]
    fn percentages_are_clamped_and_undefined_on_zero_total() {
        assert_close(pct(Some(5.0), Some(20.0)), 25.0);
        assert_close(pct(Some(25.0), Some(20.0)), 100.0);
        assert_close(pct(Some(-1.0), Some(20.0)), 0.0);
        assert_eq!(pct(Some(5.0), Some(0.0)), None);
        assert_eq!(pct(Some(5.0), None), None);
        assert_eq!(pct(None, Some(20.0)), None);
    }

    #[test]
    fn mode_tenure_vehicle_and_race_shares() {
        let raw = RawCounts {
            mode_total: Some(200.0),
            mode_car_alone: Some(120.0),
            mode_carpool: Some(20.0),
            mode_transit: Some(10.0),
            mode_walk: Some(10.0),
            mode_wfh: Some(30.0),
            rent_burden_total: Some(50.0),
            rent_burden_30_34: Some(5.0),
            rent_burden_35_39: Some(5.0),
            rent_burden_40_49: Some(5.0),
            rent_burden_50_plus: Some(10.0),
            tenure_total: Some(100.0),
            tenure_renter: Some(40.0),
            vehicles_total: Some(100.0),
            vehicles_none: Some(10.0),
            vehicles_1: Some(40.0),
            vehicles_2_plus: Some(50.0),
            total_pop: Some(1_000.0),
            hispanic: Some(400.0),
            white_nh: Some(300.0),
            black_nh: Some(150.0),
            asian_nh: Some(100.0),
            ..RawCounts::default()
        };
        let f = derive(&raw, &CommuteBins::default());

        assert_close(f.pct_drive_alone, 60.0);
        assert_close(f.pct_carpool, 10.0);
        assert_close(f.pct_car, 70.0);
        assert_close(f.pct_transit, 5.0);
        assert_close(f.pct_wfh, 15.0);
        assert_close(f.pct_rent_burden_30, 50.0);
        assert_close(f.pct_rent_burden_50, 20.0);
        assert_close(f.renter_share, 40.0);
        assert_close(f.pct_no_vehicle, 10.0);
        assert_close(f.vehicle_access, 90.0);
        assert_close(f.pct_hispanic, 40.0);
        assert_close(f.pct_other, 5.0);
    }

    #[test]
    fn every_percentage_stays_in_range() {
        // Inconsistent counts (parts exceed totals) still yield 0-100.
        let raw = RawCounts {
            ttw_total: Some(10.0),
            ttw_lt5: Some(50.0),
            ttw_5_9: Some(50.0),
            mode_total: Some(1.0),
            mode_car_alone: Some(5.0),
            mode_carpool: Some(5.0),
            total_pop: Some(10.0),
            hispanic: Some(20.0),
            white_nh: Some(0.0),
            black_nh: Some(0.0),
            asian_nh: Some(0.0),
            ..RawCounts::default()
        };
        let f = derive(&raw, &CommuteBins::default());
        for name in FeatureSet::percentage_names() {
            if let Some(v) = f.get(name) {
                assert!((0.0..=100.0).contains(&v), "{name} = {v}");
            }
        }
    }
}
