//! Ordering years by their deviation statistics
//!
//! [`rank_years`] sorts a set of [`ResidualStats`] by one [`RankKey`] and numbers the result.
//! Ranking is total and deterministic: values are compared with [`f64::total_cmp`] and ties are
//! always broken by ascending year, whichever [`SortOrder`] is requested.
//!
//! [`top_n`] and [`bottom_n`] are views over the same ordering.
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::residuals::ResidualStats;

/// Statistic years are ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankKey {
    /// [`ResidualStats::mean_error`]
    MeanError,

    /// [`ResidualStats::mean_abs_error`]
    MeanAbsError,

    /// [`ResidualStats::prop_unusual`]
    PropUnusual,

    /// [`ResidualStats::prop_unusually_warm`]
    PropUnusuallyWarm,

    /// [`ResidualStats::prop_unusually_cold`]
    PropUnusuallyCold,
}

impl RankKey {
    /// Reads this key's value from a year's statistics.
    #[must_use]
    pub fn value(self, stats: &ResidualStats) -> f64 {
        match self {
            Self::MeanError => stats.mean_error,
            Self::MeanAbsError => stats.mean_abs_error,
            Self::PropUnusual => stats.prop_unusual(),
            Self::PropUnusuallyWarm => stats.prop_unusually_warm,
            Self::PropUnusuallyCold => stats.prop_unusually_cold,
        }
    }
}

/// Direction of a ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Smallest value first
    #[default]
    Ascending,

    /// Largest value first
    Descending,
}

impl SortOrder {
    /// The opposite direction.
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// One year's position in a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedYear {
    /// 1-based position, with no gaps
    pub rank: usize,

    /// The year's statistics
    pub stats: ResidualStats,
}

impl From<RankedYear> for ResidualStats {
    fn from(ranked: RankedYear) -> Self {
        ranked.stats
    }
}

/// Sorts years by `key` and assigns 1-based ranks.
///
/// Ties are broken by ascending year in both orders, so reversing `order` reverses the
/// ranks of distinct values but keeps tied years in the same relative order.
///
/// Empty input yields an empty ranking.
///
/// # Example
/// ```
/// # use climatefit::ranking::{rank_years, RankKey, SortOrder};
/// # use climatefit::residuals::{compute_stats, ResidualRecord};
/// let records = [
///     ResidualRecord::new(2000, 10.0, 12.0),
///     ResidualRecord::new(2001, 10.0, 10.5),
/// ];
/// let stats = compute_stats(&records, 1.0).unwrap();
///
/// let ranked = rank_years(&stats, RankKey::MeanAbsError, SortOrder::Ascending);
/// assert_eq!(ranked[0].stats.year, 2001);
/// assert_eq!(ranked[0].rank, 1);
/// ```
#[must_use]
pub fn rank_years(stats: &[ResidualStats], key: RankKey, order: SortOrder) -> Vec<RankedYear> {
    let mut sorted = stats.to_vec();
    sorted.sort_by(|a, b| compare(a, b, key, order));

    sorted
        .into_iter()
        .enumerate()
        .map(|(i, stats)| RankedYear { rank: i + 1, stats })
        .collect()
}

/// The `n` years with the highest `key`, largest first.
#[must_use]
pub fn top_n(stats: &[ResidualStats], n: usize, key: RankKey) -> Vec<RankedYear> {
    let mut ranked = rank_years(stats, key, SortOrder::Descending);
    ranked.truncate(n);
    ranked
}

/// The `n` years with the lowest `key`, smallest first.
#[must_use]
pub fn bottom_n(stats: &[ResidualStats], n: usize, key: RankKey) -> Vec<RankedYear> {
    let mut ranked = rank_years(stats, key, SortOrder::Ascending);
    ranked.truncate(n);
    ranked
}

fn compare(a: &ResidualStats, b: &ResidualStats, key: RankKey, order: SortOrder) -> Ordering {
    let by_value = key.value(a).total_cmp(&key.value(b));
    let by_value = match order {
        SortOrder::Ascending => by_value,
        SortOrder::Descending => by_value.reverse(),
    };
    by_value.then(a.year.cmp(&b.year))
}
