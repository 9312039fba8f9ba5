//! Per-year deviation statistics from model residuals
//!
//! A [`ResidualRecord`] pairs one observed temperature with a model prediction. Grouping the
//! records by year yields one [`ResidualStats`] per year: how far off the model was on average,
//! and what share of days were unusually warm or cold.
//!
//! "Unusual" is relative to a single global threshold, usually the 90th percentile of all
//! absolute residuals (see [`unusual_threshold`]). The threshold is computed once and passed in;
//! it is never re-derived per year.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    statistics,
};

/// Default percentile of absolute residuals above which a day is unusual.
pub const DEFAULT_UNUSUAL_PERCENTILE: f64 = 0.9;

/// One observed temperature and its model prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidualRecord {
    /// Calendar year of the observation
    pub year: i32,

    /// Observed temperature
    pub actual: f64,

    /// Predicted temperature
    pub predicted: f64,
}

impl ResidualRecord {
    /// Creates a new record.
    #[must_use]
    pub fn new(year: i32, actual: f64, predicted: f64) -> Self {
        Self {
            year,
            actual,
            predicted,
        }
    }

    /// `predicted - actual`; negative when the model underestimates.
    #[must_use]
    pub fn error(&self) -> f64 {
        self.predicted - self.actual
    }

    /// True if the day was warmer than predicted by more than `threshold`.
    #[must_use]
    pub fn is_unusually_warm(&self, threshold: f64) -> bool {
        self.actual > self.predicted + threshold
    }

    /// True if the day was colder than predicted by more than `threshold`.
    #[must_use]
    pub fn is_unusually_cold(&self, threshold: f64) -> bool {
        self.actual < self.predicted - threshold
    }
}

/// Deviation statistics for one year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidualStats {
    /// Calendar year
    pub year: i32,

    /// Number of observations in the year; never zero
    pub n_days: usize,

    /// Mean of `predicted - actual`
    pub mean_error: f64,

    /// Mean of `|predicted - actual|`
    pub mean_abs_error: f64,

    /// Share of days warmer than predicted by more than the threshold
    pub prop_unusually_warm: f64,

    /// Share of days colder than predicted by more than the threshold
    pub prop_unusually_cold: f64,
}

impl ResidualStats {
    /// Share of days that were unusual in either direction.
    #[must_use]
    pub fn prop_unusual(&self) -> f64 {
        self.prop_unusually_warm + self.prop_unusually_cold
    }

    /// Statistics for one year's worth of records.
    ///
    /// `records` must be non-empty and belong to `year`.
    fn from_year(year: i32, records: &[ResidualRecord], threshold: f64) -> Self {
        let n_days = records.len();
        let n = n_days as f64;

        let warm = records
            .iter()
            .filter(|r| r.is_unusually_warm(threshold))
            .count();
        let cold = records
            .iter()
            .filter(|r| r.is_unusually_cold(threshold))
            .count();

        Self {
            year,
            n_days,
            mean_error: statistics::mean(records.iter().map(ResidualRecord::error)),
            mean_abs_error: statistics::mean_absolute_error(
                records.iter().map(|r| r.predicted),
                records.iter().map(|r| r.actual),
            ),
            prop_unusually_warm: warm as f64 / n,
            prop_unusually_cold: cold as f64 / n,
        }
    }
}

/// Computes one [`ResidualStats`] per distinct year in `records`, ascending by year.
///
/// Years with no records do not appear. Records may arrive in any order.
///
/// With the `parallel` feature, years are processed concurrently. Each year is still reduced
/// sequentially, in input order, so results are identical to the sequential path.
///
/// # Errors
/// Returns [`Error::InvalidInput`] if `threshold` is negative or not finite.
///
/// # Example
/// ```
/// # use climatefit::residuals::{compute_stats, ResidualRecord};
/// let records = [
///     ResidualRecord::new(2000, 10.0, 9.0),
///     ResidualRecord::new(2000, 10.0, 11.0),
///     ResidualRecord::new(2001, 10.0, 10.0),
/// ];
/// let stats = compute_stats(&records, 0.5).unwrap();
/// assert_eq!(stats.len(), 2);
/// assert_eq!(stats[0].mean_abs_error, 1.0);
/// assert_eq!(stats[0].prop_unusual(), 1.0);
/// ```
pub fn compute_stats(records: &[ResidualRecord], threshold: f64) -> Result<Vec<ResidualStats>> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(Error::InvalidInput(format!(
            "threshold {threshold} must be finite and non-negative"
        )));
    }

    let mut by_year: BTreeMap<i32, Vec<ResidualRecord>> = BTreeMap::new();
    for record in records {
        by_year.entry(record.year).or_default().push(*record);
    }

    #[cfg(feature = "parallel")]
    let stats = {
        use rayon::prelude::*;
        by_year
            .into_par_iter()
            .map(|(year, group)| ResidualStats::from_year(year, &group, threshold))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let stats = by_year
        .into_iter()
        .map(|(year, group)| ResidualStats::from_year(year, &group, threshold))
        .collect();

    Ok(stats)
}

/// Derives the unusual-day threshold: the `percentile` quantile of `|actual - predicted|`
/// over every record.
///
/// # Errors
/// - [`Error::NoData`] if `records` is empty.
/// - [`Error::InvalidInput`] if `percentile` is outside `[0, 1]`.
pub fn unusual_threshold(records: &[ResidualRecord], percentile: f64) -> Result<f64> {
    if records.is_empty() {
        return Err(Error::NoData);
    }

    let abs_errors: Vec<f64> = records.iter().map(|r| r.error().abs()).collect();
    statistics::quantile(&abs_errors, percentile).ok_or_else(|| {
        Error::InvalidInput(format!("percentile {percentile} is outside [0, 1]"))
    })
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::assert_close;

    #[test]
    fn ten_unusual_days_in_a_year() {
        let threshold = 2.0;
        let records: Vec<ResidualRecord> = (0..365)
            .map(|day| {
                let actual = 15.0;
                let predicted = match day {
                    0..=4 => actual - threshold - 1.0, // warm
                    5..=9 => actual + threshold + 1.0, // cold
                    _ => actual,
                };
                ResidualRecord::new(1990, actual, predicted)
            })
            .collect();

        let stats = compute_stats(&records, threshold).unwrap();
        assert_eq!(stats.len(), 1);

        let year = &stats[0];
        assert_eq!(year.n_days, 365);
        assert_close!(year.prop_unusual(), 10.0 / 365.0, epsilon = 1e-12);
        assert_close!(year.prop_unusually_warm, 5.0 / 365.0, epsilon = 1e-12);
        assert_close!(year.mean_error, 0.0, epsilon = 1e-12);
        assert_close!(year.mean_abs_error, 30.0 / 365.0, epsilon = 1e-12);
    }

    #[test]
    fn groups_every_year_once() {
        let records = [
            ResidualRecord::new(2003, 1.0, 2.0),
            ResidualRecord::new(2001, 1.0, 1.0),
            ResidualRecord::new(2003, 1.0, 0.0),
            ResidualRecord::new(2002, 4.0, 1.0),
        ];

        let stats = compute_stats(&records, 0.5).unwrap();
        let years: Vec<i32> = stats.iter().map(|s| s.year).collect();
        assert_eq!(years, vec![2001, 2002, 2003]);

        assert_eq!(stats[1].mean_error, -3.0);
        assert_eq!(stats[1].prop_unusually_warm, 1.0);
        assert_eq!(stats[2].mean_error, 0.0);
        assert_eq!(stats[2].mean_abs_error, 1.0);
        assert_eq!(stats[2].prop_unusually_warm, 0.5);
        assert_eq!(stats[2].prop_unusually_cold, 0.5);
    }

    #[test]
    fn stats_match_sequential_reduction() {
        // Interleaved years with uneven magnitudes
        let records: Vec<ResidualRecord> = (0..20_000)
            .map(|i| {
                let year = 1900 + (i * 7919) % 120;
                let actual = f64::from(i).sin() * 1e3;
                let predicted = actual + f64::from(i % 97) * 0.013 - 0.6;
                ResidualRecord::new(year, actual, predicted)
            })
            .collect();
        let threshold = 0.5;

        let mut expected = Vec::new();
        for year in 1900..2020 {
            let group: Vec<ResidualRecord> =
                records.iter().filter(|r| r.year == year).copied().collect();
            expected.push(ResidualStats::from_year(year, &group, threshold));
        }

        assert_eq!(compute_stats(&records, threshold).unwrap(), expected);
    }

    #[test]
    fn boundary_is_not_unusual() {
        let record = ResidualRecord::new(2000, 12.0, 10.0);
        assert!(!record.is_unusually_warm(2.0));
        assert!(record.is_unusually_warm(1.999));
        assert!(!record.is_unusually_cold(0.0));
    }

    #[test]
    fn empty_and_invalid_inputs() {
        assert!(compute_stats(&[], 1.0).unwrap().is_empty());
        assert!(matches!(compute_stats(&[], -1.0), Err(Error::InvalidInput(_))));
        assert!(matches!(
            compute_stats(&[], f64::NAN),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(unusual_threshold(&[], 0.9), Err(Error::NoData)));
    }

    #[test]
    fn threshold_is_global_percentile() {
        let records: Vec<ResidualRecord> = (0..=10)
            .map(|i| {
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                ResidualRecord::new(2000 + i % 2, 0.0, sign * f64::from(i))
            })
            .collect();

        // |errors| are 0..=10
        assert_close!(unusual_threshold(&records, 0.9).unwrap(), 9.0, epsilon = 1e-12);
        assert!(matches!(
            unusual_threshold(&records, 1.5),
            Err(Error::InvalidInput(_))
        ));
    }
}
