//! End-to-end deviation analysis over a dataset
//!
//! [`analyze`] runs the whole pipeline once:
//! 1. Encodes every observation onto the annual cycle.
//! 2. Fits three model variants (see [`ModelVariant`]).
//! 3. Derives the unusual-day threshold once, from the seasonal model's residuals over the
//!    entire dataset, unless [`AnalysisConfig::threshold`] fixes it.
//! 4. Computes per-year [`ResidualStats`] for each variant over every year, using that one threshold.
//!
//! The resulting [`AnalysisReport`] answers ranking queries for any variant, statistic and order.
//!
//! # Configuration
//! [`AnalysisConfig`] can be built in code or loaded from JSON. Every field has a default:
//! ```
//! # use climatefit::analysis::{AnalysisConfig, BaselineWindow};
//! let config = AnalysisConfig::from_json(r#"{ "baseline": { "years": { "start": 1950, "end": 1979 } } }"#).unwrap();
//! assert_eq!(config.baseline, BaselineWindow::Years { start: 1950, end: 1979 });
//! assert_eq!(config.unusual_percentile, 0.9);
//! ```
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{
    basis::{Basis, SeasonalBasis, SeasonalTrendBasis},
    dataset::Dataset,
    error::{Error, Result},
    fit::{fit_seasonal, fit_seasonal_with_trend, FittedModel, SeasonalModel, TrendModel},
    phase::FeatureRow,
    ranking::{bottom_n, rank_years, top_n, RankKey, RankedYear, SortOrder},
    residuals::{
        compute_stats, unusual_threshold, ResidualRecord, ResidualStats,
        DEFAULT_UNUSUAL_PERCENTILE,
    },
    wave::WaveParameters,
};

/// Historical window the baseline model is trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineWindow {
    /// The first `n` calendar years, counted from the earliest observation.
    FirstYears(u32),

    /// An explicit, inclusive range of years.
    Years {
        /// First year of the window
        start: i32,
        /// Last year of the window
        end: i32,
    },
}

impl Default for BaselineWindow {
    fn default() -> Self {
        Self::FirstYears(30)
    }
}

impl BaselineWindow {
    /// The inclusive year range this window covers in `dataset`.
    ///
    /// # Errors
    /// Returns [`Error::NoData`] for a [`BaselineWindow::FirstYears`] window over an empty dataset.
    pub fn resolve(&self, dataset: &Dataset) -> Result<RangeInclusive<i32>> {
        match *self {
            Self::FirstYears(n) => {
                let first = *dataset.year_range().ok_or(Error::NoData)?.start();
                let span = i32::try_from(n.saturating_sub(1)).unwrap_or(i32::MAX);
                let last = first.saturating_add(span);
                Ok(first..=last)
            }
            Self::Years { start, end } => Ok(start..=end),
        }
    }
}

/// Settings for [`analyze`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Window the baseline model is trained on
    pub baseline: BaselineWindow,

    /// Percentile of absolute residuals above which a day is unusual, in `(0, 1)`
    pub unusual_percentile: f64,

    /// Fixed threshold, in °C, overriding the percentile
    pub threshold: Option<f64>,

    /// Number of years in the "most ideal" and "most unusual" reports
    pub report_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            baseline: BaselineWindow::default(),
            unusual_percentile: DEFAULT_UNUSUAL_PERCENTILE,
            threshold: None,
            report_size: 5,
        }
    }
}

impl AnalysisConfig {
    /// Parses and validates a configuration from JSON.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    /// - [`Error::Config`] if the JSON is malformed.
    /// - [`Error::InvalidConfig`] if a value is out of range.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value is within its valid range.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(self.unusual_percentile > 0.0 && self.unusual_percentile < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "unusual_percentile must be in (0, 1), got {}",
                self.unusual_percentile
            )));
        }

        if let Some(threshold) = self.threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "threshold must be finite and non-negative, got {threshold}"
                )));
            }
        }

        if self.report_size == 0 {
            return Err(Error::InvalidConfig("report_size must be at least 1".into()));
        }

        match self.baseline {
            BaselineWindow::FirstYears(0) => Err(Error::InvalidConfig(
                "baseline must cover at least one year".into(),
            )),
            BaselineWindow::Years { start, end } if start > end => Err(Error::InvalidConfig(
                format!("baseline window {start}..={end} is empty"),
            )),
            _ => Ok(()),
        }
    }
}

/// The three models every analysis fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    /// Seasonal-only model, trained on all years
    Seasonal,

    /// Seasonal model with a linear trend, trained on all years
    SeasonalTrend,

    /// Seasonal-only model, trained on the baseline window
    Baseline,
}

impl ModelVariant {
    /// Every variant, in report order.
    pub const ALL: [Self; 3] = [Self::Seasonal, Self::SeasonalTrend, Self::Baseline];
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seasonal => write!(f, "seasonal"),
            Self::SeasonalTrend => write!(f, "seasonal + trend"),
            Self::Baseline => write!(f, "baseline"),
        }
    }
}

/// A fitted model with its residuals and per-year statistics over the whole dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantReport<B: Basis> {
    model: FittedModel<B>,
    records: Vec<ResidualRecord>,
    stats: Vec<ResidualStats>,
}

impl<B: Basis> VariantReport<B> {
    fn new(model: FittedModel<B>, records: Vec<ResidualRecord>, threshold: f64) -> Result<Self> {
        let stats = compute_stats(&records, threshold)?;
        Ok(Self {
            model,
            records,
            stats,
        })
    }

    /// The fitted model.
    #[must_use]
    pub fn model(&self) -> &FittedModel<B> {
        &self.model
    }

    /// One record per observation in the dataset.
    #[must_use]
    pub fn records(&self) -> &[ResidualRecord] {
        &self.records
    }

    /// One entry per year in the dataset, ascending by year.
    #[must_use]
    pub fn stats(&self) -> &[ResidualStats] {
        &self.stats
    }
}

/// Output of [`analyze`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    threshold: f64,
    baseline_years: RangeInclusive<i32>,
    report_size: usize,
    seasonal: VariantReport<SeasonalBasis>,
    trend: VariantReport<SeasonalTrendBasis>,
    baseline: VariantReport<SeasonalBasis>,
}

impl AnalysisReport {
    /// The unusual-day threshold applied to every variant, in °C.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Years the baseline model was trained on.
    #[must_use]
    pub fn baseline_years(&self) -> &RangeInclusive<i32> {
        &self.baseline_years
    }

    /// Seasonal-only model over all years.
    #[must_use]
    pub fn seasonal(&self) -> &VariantReport<SeasonalBasis> {
        &self.seasonal
    }

    /// Seasonal model with trend over all years.
    #[must_use]
    pub fn trend(&self) -> &VariantReport<SeasonalTrendBasis> {
        &self.trend
    }

    /// Seasonal-only model over the baseline window.
    #[must_use]
    pub fn baseline(&self) -> &VariantReport<SeasonalBasis> {
        &self.baseline
    }

    /// Per-year statistics for a variant.
    #[must_use]
    pub fn stats(&self, variant: ModelVariant) -> &[ResidualStats] {
        match variant {
            ModelVariant::Seasonal => self.seasonal.stats(),
            ModelVariant::SeasonalTrend => self.trend.stats(),
            ModelVariant::Baseline => self.baseline.stats(),
        }
    }

    /// In-sample R² of a variant's model.
    #[must_use]
    pub fn r_squared(&self, variant: ModelVariant) -> f64 {
        match variant {
            ModelVariant::Seasonal => self.seasonal.model.r_squared(),
            ModelVariant::SeasonalTrend => self.trend.model.r_squared(),
            ModelVariant::Baseline => self.baseline.model.r_squared(),
        }
    }

    /// Amplitude and phase of a variant's annual cycle.
    ///
    /// # Errors
    /// Returns [`Error::DegenerateCoefficient`] if the model has no seasonal cycle.
    pub fn wave_parameters(&self, variant: ModelVariant) -> Result<WaveParameters> {
        match variant {
            ModelVariant::Seasonal => self.seasonal.model.wave_parameters(),
            ModelVariant::SeasonalTrend => self.trend.model.wave_parameters(),
            ModelVariant::Baseline => self.baseline.model.wave_parameters(),
        }
    }

    /// Ranks a variant's years; see [`rank_years`].
    #[must_use]
    pub fn rank(&self, variant: ModelVariant, key: RankKey, order: SortOrder) -> Vec<RankedYear> {
        rank_years(self.stats(variant), key, order)
    }

    /// The years a variant's model explains best: lowest mean absolute error first.
    #[must_use]
    pub fn most_ideal_years(&self, variant: ModelVariant) -> Vec<RankedYear> {
        bottom_n(self.stats(variant), self.report_size, RankKey::MeanAbsError)
    }

    /// The years with the most unusual days under a variant's model, highest share first.
    #[must_use]
    pub fn most_unusual_years(&self, variant: ModelVariant) -> Vec<RankedYear> {
        top_n(self.stats(variant), self.report_size, RankKey::PropUnusual)
    }
}

/// Fits every model variant and computes per-year deviation statistics.
///
/// # Errors
/// - [`Error::InvalidConfig`] if `config` does not validate.
/// - [`Error::NoData`] if `dataset` is empty.
/// - [`Error::InsufficientData`] if the baseline window holds fewer observations than
///   the model has parameters.
/// - Any error from fitting.
#[instrument(skip(dataset, config), fields(n = dataset.len()))]
pub fn analyze(dataset: &Dataset, config: &AnalysisConfig) -> Result<AnalysisReport> {
    config.validate()?;
    if dataset.is_empty() {
        return Err(Error::NoData);
    }

    let rows = dataset.feature_rows()?;

    let seasonal: SeasonalModel = fit_seasonal(&rows)?;
    let trend: TrendModel = fit_seasonal_with_trend(&rows)?;

    let baseline_years = config.baseline.resolve(dataset)?;
    let baseline_rows: Vec<FeatureRow> = rows
        .iter()
        .filter(|row| baseline_years.contains(&row.year()))
        .copied()
        .collect();
    debug!(
        start = *baseline_years.start(),
        end = *baseline_years.end(),
        n = baseline_rows.len(),
        "selected baseline window"
    );
    let baseline = fit_seasonal(&baseline_rows)?;

    let seasonal_records = seasonal.residual_records(&rows);
    let threshold = match config.threshold {
        Some(threshold) => threshold,
        None => unusual_threshold(&seasonal_records, config.unusual_percentile)?,
    };
    debug!(threshold, percentile = config.unusual_percentile, "unusual-day threshold");

    let seasonal = VariantReport::new(seasonal, seasonal_records, threshold)?;
    let trend_records = trend.residual_records(&rows);
    let trend = VariantReport::new(trend, trend_records, threshold)?;
    let baseline_records = baseline.residual_records(&rows);
    let baseline = VariantReport::new(baseline, baseline_records, threshold)?;

    info!(
        years = seasonal.stats().len(),
        threshold,
        seasonal_r2 = seasonal.model().r_squared(),
        trend_r2 = trend.model().r_squared(),
        baseline_r2 = baseline.model().r_squared(),
        "analysis complete"
    );

    Ok(AnalysisReport {
        threshold,
        baseline_years,
        report_size: config.report_size,
        seasonal,
        trend,
        baseline,
    })
}

#[cfg(test)]
mod tests {
    use std::f64::consts::TAU;

    use chrono::{Datelike, NaiveDate};

    use super::*;
    use crate::{assert_close, dataset::DatasetBuilder};

    /// Daily data with a year-dependent offset and a small deterministic wobble.
    fn dataset(years: RangeInclusive<i32>, offset: impl Fn(i32) -> f64) -> Dataset {
        let records: Vec<(NaiveDate, f64)> = years
            .flat_map(|year| (1..=366).filter_map(move |d| NaiveDate::from_yo_opt(year, d)))
            .map(|date| {
                let x = TAU * f64::from(date.ordinal()) / 366.0;
                let wobble = (f64::from(date.ordinal()) * 12.9898).sin();
                (date, 10.0 - 10.0 * x.cos() - 3.0 * x.sin() + offset(date.year()) + wobble)
            })
            .collect();
        DatasetBuilder::new().with_records(records).build().unwrap()
    }

    #[test]
    fn config_defaults_and_json() {
        let config = AnalysisConfig::from_json("{}").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.baseline, BaselineWindow::FirstYears(30));

        let config = AnalysisConfig::from_json(
            r#"{ "baseline": { "first_years": 10 }, "threshold": 2.5, "report_size": 3 }"#,
        )
        .unwrap();
        assert_eq!(config.baseline, BaselineWindow::FirstYears(10));
        assert_eq!(config.threshold, Some(2.5));
        assert_eq!(config.report_size, 3);

        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(AnalysisConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn config_rejects_bad_values() {
        assert!(matches!(
            AnalysisConfig::from_json("{ not json"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_json(r#"{ "unusual_percentile": 1.0 }"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_json(r#"{ "threshold": -1.0 }"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_json(r#"{ "baseline": { "years": { "start": 2000, "end": 1990 } } }"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_json(r#"{ "report_size": 0 }"#),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn baseline_window_resolution() {
        let data = dataset(1960..=1962, |_| 0.0);
        assert_eq!(BaselineWindow::FirstYears(2).resolve(&data).unwrap(), 1960..=1961);
        assert_eq!(
            BaselineWindow::Years { start: 1900, end: 1910 }.resolve(&data).unwrap(),
            1900..=1910
        );
        assert!(matches!(
            BaselineWindow::FirstYears(2).resolve(&Dataset::default()),
            Err(Error::NoData)
        ));
    }

    #[test]
    fn oversized_first_years_window_covers_everything() {
        let data = dataset(2000..=2001, |_| 0.0);
        for n in [u32::MAX, (1 << 31) + 1, 1 << 31] {
            let window = BaselineWindow::FirstYears(n);
            assert_eq!(window.resolve(&data).unwrap(), 2000..=i32::MAX);
        }

        let config = AnalysisConfig {
            baseline: BaselineWindow::FirstYears(u32::MAX),
            ..AnalysisConfig::default()
        };
        config.validate().unwrap();

        let report = analyze(&data, &config).unwrap();
        assert_eq!(report.baseline().model().n_obs(), 366 + 365);
    }

    #[test]
    fn rejects_empty_dataset_and_empty_baseline() {
        let config = AnalysisConfig::default();
        assert!(matches!(
            analyze(&Dataset::default(), &config),
            Err(Error::NoData)
        ));

        let config = AnalysisConfig {
            baseline: BaselineWindow::Years { start: 1800, end: 1810 },
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            analyze(&dataset(2000..=2001, |_| 0.0), &config),
            Err(Error::InsufficientData { n: 0, k: 3 })
        ));
    }

    #[test]
    fn warming_shows_against_early_baseline() {
        let data = dataset(1950..=1959, |_| 0.0);
        let late = dataset(2015..=2024, |_| 3.0);
        let data = Dataset::new([data.observations(), late.observations()].concat()).unwrap();

        let config = AnalysisConfig {
            baseline: BaselineWindow::Years { start: 1950, end: 1959 },
            ..AnalysisConfig::default()
        };
        let report = analyze(&data, &config).unwrap();

        assert!(report.threshold() > 0.0);
        assert_eq!(report.stats(ModelVariant::Baseline).len(), 20);

        for stats in report.stats(ModelVariant::Baseline) {
            if stats.year >= 2015 {
                assert_close!(stats.mean_error, -3.0, epsilon = 0.1);
            } else {
                assert_close!(stats.mean_error, 0.0, epsilon = 0.1);
            }
        }

        for stats in report.stats(ModelVariant::SeasonalTrend) {
            assert!(stats.mean_error.abs() < 0.5, "{}: {}", stats.year, stats.mean_error);
        }

        let unusual = report.most_unusual_years(ModelVariant::Baseline);
        assert_eq!(unusual.len(), 5);
        assert!(unusual.iter().all(|r| r.stats.year >= 2015));

        let ideal = report.most_ideal_years(ModelVariant::Baseline);
        assert!(ideal.iter().all(|r| r.stats.year < 1960));

        let wave = report.wave_parameters(ModelVariant::Seasonal).unwrap();
        assert_close!(wave.amplitude, 109f64.sqrt(), epsilon = 0.1);

        let ranked = report.rank(ModelVariant::Seasonal, RankKey::MeanError, SortOrder::Ascending);
        assert_eq!(ranked[0].rank, 1);
        assert!(ranked[0].stats.year >= 2015);
        assert!(report.r_squared(ModelVariant::Baseline) > 0.9);
    }

    #[test]
    fn fixed_threshold_overrides_percentile() {
        let config = AnalysisConfig {
            baseline: BaselineWindow::FirstYears(1),
            threshold: Some(100.0),
            ..AnalysisConfig::default()
        };
        let report = analyze(&dataset(2000..=2002, |y| f64::from(y - 2000)), &config).unwrap();

        assert_close!(report.threshold(), 100.0);
        assert_eq!(report.baseline_years(), &(2000..=2000));
        for variant in ModelVariant::ALL {
            assert!(report.stats(variant).iter().all(|s| s.prop_unusual() == 0.0));
        }
    }

    #[cfg(feature = "synthetic")]
    #[test]
    fn synthetic_end_to_end() {
        use crate::synthetic::SyntheticClimate;

        let climate = SyntheticClimate::default().with_noise(1.5);
        let mut observations = climate.clone().with_seed(1).observations(1950..=1959).unwrap();
        observations.extend(
            climate
                .with_offset(3.0)
                .with_seed(2)
                .observations(2015..=2024)
                .unwrap(),
        );
        let data = Dataset::new(observations).unwrap();

        let config = AnalysisConfig {
            baseline: BaselineWindow::FirstYears(10),
            ..AnalysisConfig::default()
        };
        let report = analyze(&data, &config).unwrap();

        for stats in report.stats(ModelVariant::Baseline) {
            let expected = if stats.year >= 2015 { -3.0 } else { 0.0 };
            assert_close!(stats.mean_error, expected, epsilon = 0.5);
        }
        for stats in report.stats(ModelVariant::SeasonalTrend) {
            assert!(stats.mean_error.abs() < 0.5, "{}: {}", stats.year, stats.mean_error);
        }
    }
}
