//! Quartile-based income segmentation.
//!
//! A ZCTA is `Low` when its median income is at or below the metro's
//! 25th percentile, `High` when strictly above the 75th, and `Medium`
//! otherwise. Percentiles use linear interpolation between the two
//! nearest ranks over the ZCTAs that have an income.

use zcta_dataset_models::IncomeSegment;

/// Lower and upper quartile of a set of incomes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncomeQuartiles {
    /// 25th percentile.
    pub q25: f64,
    /// 75th percentile.
    pub q75: f64,
}

impl IncomeQuartiles {
    /// Computes quartiles from incomes, ignoring non-finite values.
    ///
    /// Returns `None` when no income is defined.
    #[must_use]
    pub fn from_incomes(incomes: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut sorted: Vec<f64> = incomes.into_iter().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);
        Some(Self {
            q25: quantile(&sorted, 0.25)?,
            q75: quantile(&sorted, 0.75)?,
        })
    }

    /// Segment for one income.
    #[must_use]
    pub fn segment(&self, income: f64) -> IncomeSegment {
        if income <= self.q25 {
            IncomeSegment::Low
        } else if income > self.q75 {
            IncomeSegment::High
        } else {
            IncomeSegment::Medium
        }
    }
}

/// Linearly interpolated quantile of an ascending slice.
///
/// Returns `None` for an empty slice.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let pos = q.clamp(0.0, 1.0) * last as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}
