//! Functions for evaluating fitted temperature models and summarising residuals
//!
//! # Model Fit / Regression Diagnostics
//! - [`r_squared`]: Proportion of variance explained by the model. Higher is better (0 to 1).
//! - [`adjusted_r_squared`]: R² adjusted for the number of model parameters.
//! - [`residual_variance`]: Unbiased estimate of the variance of errors after fitting.
//!
//! # Error Metrics
//! - [`mean_absolute_error`]: Average absolute difference between observed and predicted values.
//! - [`root_mean_squared_error`]: Square root of the mean squared error, in °C.
//!
//! # Descriptive Statistics
//! - [`mean`]: Arithmetic mean of a dataset.
//! - [`quantile`]: Value below which a given fraction of the data falls.
//!
//! # Examples
//!
//! ```rust
//! use climatefit::statistics::{r_squared, quantile};
//!
//! let y = vec![1.0, 2.0, 3.0];
//! let y_fit = vec![1.1, 1.9, 3.05];
//!
//! let r2 = r_squared(y.iter().copied(), y_fit.iter().copied());
//! assert!(r2 > 0.98);
//!
//! let q = quantile(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.5);
//! assert_eq!(q, Some(3.0));
//! ```

/// Calculates the unbiased variance of the residuals of a fit.
///
/// <div class="warning">
///
/// **Technical Details**
///
/// ```math
/// σ² = Σ (y_i - y_fit_i)² / (n - k)
/// where
///   n = number of observations
///   k = number of model parameters
/// ```
/// </div>
///
/// Returns zero when `n <= k`, since there are no degrees of freedom left.
pub fn residual_variance(
    y: impl Iterator<Item = f64>,
    y_fit: impl Iterator<Item = f64>,
    k: usize,
) -> f64 {
    let mut ss_residual = 0.0;
    let mut n = 0usize;
    for (y, y_fit) in y.zip(y_fit) {
        ss_residual += (y - y_fit).powi(2);
        n += 1;
    }

    if n <= k {
        return 0.0;
    }
    ss_residual / (n - k) as f64
}

/// Calculate the R-squared value for a set of data.
///
/// R-squared tells you how well the model explains the data:
/// - `0` means the model explains none of the variation.
/// - `1` means the model explains all the variation.
///
/// <div class="warning">
///
/// **Technical Details**
///
/// ```math
/// R² = 1 - (SS_res / SS_tot)
/// where
///   SS_res = Σ (y_i - y_fit_i)²
///   SS_tot = Σ (y_i - y_mean)²
/// ```
///
/// If the observed values are constant (`SS_tot = 0`) the result is `1` for an exact fit and
/// `0` otherwise.
/// </div>
///
/// # Example
/// ```
/// # use climatefit::statistics::r_squared;
/// let y = [1.0, 2.0, 3.0];
/// assert_eq!(r_squared(y.iter().copied(), y.iter().copied()), 1.0);
/// ```
pub fn r_squared(y: impl Iterator<Item = f64>, y_fit: impl Iterator<Item = f64>) -> f64 {
    let (r2, _) = r_squared_with_n(y, y_fit);
    r2
}

/// Calculates R² adjusted for the number of model parameters.
///
/// ```math
/// R²_adj = R² - (1 - R²) · k / (n - k)
/// ```
///
/// Falls back to plain R² when `n <= k`.
pub fn adjusted_r_squared(
    y: impl Iterator<Item = f64>,
    y_fit: impl Iterator<Item = f64>,
    k: usize,
) -> f64 {
    let (r2, n) = r_squared_with_n(y, y_fit);
    if n <= k {
        return r2;
    }
    r2 - (1.0 - r2) * k as f64 / (n - k) as f64
}

/// Returns (R², n)
fn r_squared_with_n(y: impl Iterator<Item = f64>, y_fit: impl Iterator<Item = f64>) -> (f64, usize) {
    let pairs: Vec<(f64, f64)> = y.zip(y_fit).collect();
    let n = pairs.len();
    if n == 0 {
        return (0.0, 0);
    }

    let y_mean = mean(pairs.iter().map(|(y, _)| *y));

    let mut ss_total = 0.0;
    let mut ss_residual = 0.0;
    for (y, y_fit) in pairs {
        ss_total += (y - y_mean).powi(2);
        ss_residual += (y - y_fit).powi(2);
    }

    if ss_total <= f64::EPSILON {
        let r2 = if ss_residual <= f64::EPSILON { 1.0 } else { 0.0 };
        return (r2, n);
    }

    (1.0 - ss_residual / ss_total, n)
}

/// Computes the arithmetic mean of a sequence of values.
///
/// ```math
/// Mean = (Σ x_i) / N
/// ```
///
/// Returns zero if the iterator yields no elements.
///
/// # Examples
/// ```rust
/// let values = vec![1.0, 2.0, 3.0];
/// assert_eq!(climatefit::statistics::mean(values.into_iter()), 2.0);
/// ```
pub fn mean(data: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in data {
        sum += value;
        count += 1;
    }

    if count == 0 {
        return 0.0;
    }
    sum / count as f64
}

/// Computes the mean absolute error (MAE) between two sets of values.
///
/// ```math
/// MAE = (Σ |y_i - y_fit_i|) / N
/// ```
///
/// Returns zero for empty input.
pub fn mean_absolute_error(y: impl Iterator<Item = f64>, y_fit: impl Iterator<Item = f64>) -> f64 {
    mean(y.zip(y_fit).map(|(y, y_fit)| (y - y_fit).abs()))
}

/// Computes the root mean squared error (RMSE) between two sets of values.
///
/// ```math
/// RMSE = √( (Σ (y_i - y_fit_i)²) / N )
/// ```
///
/// Returns zero for empty input.
pub fn root_mean_squared_error(
    y: impl Iterator<Item = f64>,
    y_fit: impl Iterator<Item = f64>,
) -> f64 {
    mean(y.zip(y_fit).map(|(y, y_fit)| (y - y_fit).powi(2))).sqrt()
}

/// Computes the `q`-quantile of a set of values.
///
/// Uses linear interpolation between the two closest ranks, so `q = 0` is the minimum,
/// `q = 1` the maximum and `q = 0.5` the median.
///
/// <div class="warning">
///
/// **Technical Details**
///
/// ```math
/// h = (n - 1) · q
/// Q(q) = x_⌊h⌋ + (h - ⌊h⌋) · (x_⌊h⌋+1 - x_⌊h⌋)
/// where x is sorted ascending
/// ```
/// </div>
///
/// Returns `None` if `values` is empty or `q` is outside `[0, 1]`.
#[must_use]
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let h = (sorted.len() - 1) as f64 * q;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lower = h.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let frac = h - h.floor();

    Some(sorted[lower] + frac * (sorted[upper] - sorted[lower]))
}
