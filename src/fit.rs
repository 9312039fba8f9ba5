use nalgebra::{DMatrix, DVector, SVD};

use crate::{
    basis::{Basis, Regressors, SeasonalBasis, SeasonalTrendBasis},
    dataset::Observation,
    display::ModelDisplay,
    error::{Error, Result},
    phase::FeatureRow,
    residuals::ResidualRecord,
    statistics,
    wave::{to_wave_parameters, WaveParameters},
};

/// Seasonal-only model
///
/// ```math
/// T(x) = β0 + β1·cos(x) + β2·sin(x)
/// ```
///
/// Assumes every year shares one climatology.
pub type SeasonalModel = FittedModel<SeasonalBasis>;

/// Seasonal model with a linear secular trend
///
/// ```math
/// T(x, year) = β0 + β1·cos(x) + β2·sin(x) + β3·year
/// ```
///
/// Predictions require a year.
pub type TrendModel = FittedModel<SeasonalTrendBasis>;

/// Fits a [`SeasonalModel`] by ordinary least squares.
///
/// # Errors
/// See [`FittedModel::new`].
///
/// # Example
/// ```
/// # use chrono::NaiveDate;
/// # use climatefit::{fit_seasonal, dataset::DatasetBuilder};
/// let dataset = DatasetBuilder::new()
///     .with_records((1..=365).map(|d| {
///         let date = NaiveDate::from_yo_opt(2001, d).unwrap();
///         let x = std::f64::consts::TAU * f64::from(d) / 366.0;
///         (date, 10.0 + 5.0 * x.cos() - 3.0 * x.sin())
///     }))
///     .build()
///     .unwrap();
///
/// let model = fit_seasonal(&dataset.feature_rows().unwrap()).unwrap();
/// assert!((model.intercept() - 10.0).abs() < 1e-9);
/// ```
pub fn fit_seasonal(rows: &[FeatureRow]) -> Result<SeasonalModel> {
    SeasonalModel::new(rows)
}

/// Fits a [`TrendModel`] by ordinary least squares.
///
/// # Errors
/// See [`FittedModel::new`].
pub fn fit_seasonal_with_trend(rows: &[FeatureRow]) -> Result<TrendModel> {
    TrendModel::new(rows)
}

/// A harmonic regression model fitted to daily temperatures.
///
/// Created once per fitting call and immutable afterwards. Coefficients are exposed in raw form,
/// in the order intercept, cosine, sine, then the trend term if the basis has one.
///
/// # Type Parameters
/// - `B`: The [`Basis`] the model is a linear combination of.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel<B: Basis = SeasonalBasis> {
    basis: B,

    /// Coefficients in the basis' normalized space
    normalized: Vec<f64>,

    /// Coefficients for raw regressors
    coefficients: Vec<f64>,

    /// Coefficient covariance, raw space
    covariance: DMatrix<f64>,

    n_obs: usize,
    r_squared: f64,
    adjusted_r_squared: f64,
    residual_variance: f64,
}

/// Row count from which fits switch to chunked normal equations.
#[cfg(feature = "parallel")]
const MIN_ROWS_TO_PARALLEL: usize = 500_000;

impl<B: Basis> FittedModel<B> {
    /// Turns a set of rows into a design matrix and temperature vector.
    fn create_matrix(rows: &[FeatureRow], basis: &B, k: usize) -> (DMatrix<f64>, DVector<f64>) {
        let mut bigx = DMatrix::zeros(rows.len(), k);
        let b = DVector::from_iterator(rows.len(), rows.iter().map(FeatureRow::temperature));

        for (matrix_row, row) in bigx.row_iter_mut().zip(rows) {
            let x = basis.normalize(Regressors::from(row));
            basis.fill_matrix_row(0, x, matrix_row);
        }

        (bigx, b)
    }

    /// If appropriate, builds the normal equations in parallel chunks.
    /// Otherwise, falls back to `create_matrix`.
    ///
    /// The bool indicates if the result is already the `k x k` normal system.
    fn create_parallel_matrix(
        rows: &[FeatureRow],
        basis: &B,
        k: usize,
    ) -> (DMatrix<f64>, DVector<f64>, bool) {
        #[cfg(not(feature = "parallel"))]
        {
            let (m, b) = Self::create_matrix(rows, basis, k);
            return (m, b, false);
        }

        #[cfg(feature = "parallel")]
        {
            if rows.len() < MIN_ROWS_TO_PARALLEL {
                let (m, b) = Self::create_matrix(rows, basis, k);
                return (m, b, false);
            }

            let chunk_size = (rows.len() / rayon::current_num_threads()).max(1);
            let (xtx, xtb) = Self::chunked_normal_equations(rows, basis, k, chunk_size);
            (xtx, xtb, true)
        }
    }

    /// Builds `XᵀX` and `Xᵀb` chunk by chunk on the rayon pool, then sums the chunks.
    #[cfg(feature = "parallel")]
    fn chunked_normal_equations(
        rows: &[FeatureRow],
        basis: &B,
        k: usize,
        chunk_size: usize,
    ) -> (DMatrix<f64>, DVector<f64>) {
        use rayon::prelude::*;

        let partial_results: Vec<(DMatrix<f64>, DVector<f64>)> = rows
            .par_chunks(chunk_size.max(1))
            .map(|chunk| {
                let (m, b) = Self::create_matrix(chunk, basis, k);
                Self::normal_equations(&m, &b)
            })
            .collect();

        let mut xtx = DMatrix::<f64>::zeros(k, k);
        let mut xtb = DVector::<f64>::zeros(k);

        // Kahan summation over the chunks, in chunk order
        let mut xtx_c = DMatrix::<f64>::zeros(k, k);
        let mut xtb_c = DVector::<f64>::zeros(k);
        for (part_xtx, part_xtb) in partial_results {
            for i in 0..k {
                let y = part_xtb[i] - xtb_c[i];
                let t = xtb[i] + y;
                xtb_c[i] = (t - xtb[i]) - y;
                xtb[i] = t;

                for j in 0..k {
                    let y = part_xtx[(i, j)] - xtx_c[(i, j)];
                    let t = xtx[(i, j)] + y;
                    xtx_c[(i, j)] = (t - xtx[(i, j)]) - y;
                    xtx[(i, j)] = t;
                }
            }
        }

        (xtx, xtb)
    }

    /// Reduce the `n x k` / `n x 1` system to `XᵀX` and `Xᵀb`.
    #[cfg(feature = "parallel")]
    fn normal_equations(matrix: &DMatrix<f64>, b: &DVector<f64>) -> (DMatrix<f64>, DVector<f64>) {
        let xt = matrix.transpose();
        (&xt * matrix, xt * b)
    }

    /// Solves the least-squares system using SVD.
    fn solve_matrix(matrix: DMatrix<f64>, b: &DVector<f64>) -> Result<Vec<f64>> {
        let size = matrix.shape();
        let decomp = SVD::new_unordered(matrix, true, true);

        // ~= machine_epsilon * max(size) * max_singular
        let max_size = size.0.max(size.1);
        let sigma_max = decomp.singular_values.max();
        let epsilon = f64::EPSILON * max_size as f64 * sigma_max;

        let big_x = decomp.solve(b, epsilon).map_err(Error::Algebra)?;
        let coefficients: Vec<f64> = big_x.data.into();

        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(Error::Algebra("Non-finite value in coefficients"));
        }

        Ok(coefficients)
    }

    /// Computes `σ² · (XᵀX)⁻¹` from the normal matrix.
    fn covariance_matrix(xtx: DMatrix<f64>, residual_variance: f64) -> Result<DMatrix<f64>> {
        let k = xtx.nrows();
        let xtx_reg = xtx + DMatrix::<f64>::identity(k, k) * f64::EPSILON;
        let svd = xtx_reg.svd(true, true);
        let xtx_inv = svd.pseudo_inverse(f64::EPSILON).map_err(Error::Algebra)?;
        Ok(xtx_inv * residual_variance)
    }

    /// Fits a model to the given rows by ordinary least squares.
    ///
    /// # Errors
    /// - [`Error::InsufficientData`] if there are fewer rows than model parameters.
    /// - [`Error::Algebra`] if the system could not be solved.
    ///
    /// # Behavior
    /// - Builds the design matrix with [`Basis::fill_matrix_row`], normalizing each row first.
    /// - Solves `X · β = y` by SVD, without regularization.
    /// - Computes R², adjusted R², residual variance and the coefficient covariance.
    ///
    /// # Warning
    /// If the `parallel` feature is enabled, and there are more than 500,000 rows,
    /// the normal equations are built in parallel chunks and solved instead of the full system.
    pub fn new(rows: &[FeatureRow]) -> Result<Self> {
        let basis = B::from_rows(rows);
        let k = basis.k();
        let n_obs = rows.len();

        if n_obs < k {
            return Err(Error::InsufficientData { n: n_obs, k });
        }

        let (m, b, is_normal) = Self::create_parallel_matrix(rows, &basis, k);
        let xtx = if is_normal {
            m.clone()
        } else {
            m.transpose() * &m
        };
        let normalized = Self::solve_matrix(m, &b)?;

        let predicted: Vec<f64> = rows
            .iter()
            .map(|row| basis.solve(basis.normalize(row.into()), &normalized))
            .collect();
        let actual = || rows.iter().map(FeatureRow::temperature);

        let r_squared = statistics::r_squared(actual(), predicted.iter().copied()).clamp(0.0, 1.0);
        let adjusted_r_squared =
            statistics::adjusted_r_squared(actual(), predicted.iter().copied(), k);
        let residual_variance =
            statistics::residual_variance(actual(), predicted.iter().copied(), k);

        let t = basis.denormalization_matrix();
        let coefficients: Vec<f64> = (&t * DVector::from_column_slice(&normalized)).data.into();
        let covariance = &t * Self::covariance_matrix(xtx, residual_variance)? * t.transpose();

        tracing::debug!(
            basis = ?basis,
            n = n_obs,
            k,
            r_squared,
            "fitted harmonic model"
        );

        Ok(Self {
            basis,
            normalized,
            coefficients,
            covariance,
            n_obs,
            r_squared,
            adjusted_r_squared,
            residual_variance,
        })
    }

    /// The basis the model was fitted in.
    #[must_use]
    pub fn basis(&self) -> &B {
        &self.basis
    }

    /// All coefficients: intercept, cosine, sine, then the trend term if present.
    #[must_use]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// β0, the intercept.
    ///
    /// For trend models this is the value extrapolated to year 0, not a typical temperature.
    #[must_use]
    pub fn intercept(&self) -> f64 {
        self.coefficients[0]
    }

    /// β1, the cosine coefficient.
    #[must_use]
    pub fn cos_coeff(&self) -> f64 {
        self.coefficients[1]
    }

    /// β2, the sine coefficient.
    #[must_use]
    pub fn sin_coeff(&self) -> f64 {
        self.coefficients[2]
    }

    /// β3, the warming per year, if the model has a trend term.
    #[must_use]
    pub fn trend_coeff(&self) -> Option<f64> {
        self.coefficients.get(3).copied()
    }

    /// Standard error of each coefficient, in coefficient order.
    ///
    /// The square roots of the diagonal of `σ² · (XᵀX)⁻¹`.
    #[must_use]
    pub fn standard_errors(&self) -> Vec<f64> {
        self.covariance
            .diagonal()
            .iter()
            .map(|v| v.max(0.0).sqrt())
            .collect()
    }

    /// Covariance matrix of the coefficients.
    #[must_use]
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Number of observations the model was fitted to.
    #[must_use]
    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    /// In-sample R², in `[0, 1]`.
    ///
    /// See [`statistics::r_squared`].
    #[must_use]
    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }

    /// In-sample R² adjusted for the number of parameters.
    #[must_use]
    pub fn adjusted_r_squared(&self) -> f64 {
        self.adjusted_r_squared
    }

    /// Unbiased variance of the in-sample residuals.
    #[must_use]
    pub fn residual_variance(&self) -> f64 {
        self.residual_variance
    }

    /// Evaluates the model at a phase angle.
    ///
    /// # Errors
    /// Returns [`Error::MissingParameter`] if the model has a trend term and `year` is `None`.
    pub fn predict_at(&self, phase_angle: f64, year: Option<i32>) -> Result<f64> {
        if B::REQUIRES_YEAR && year.is_none() {
            return Err(Error::MissingParameter("year"));
        }

        let x = Regressors::new(phase_angle, year.map_or(0.0, f64::from));
        Ok(self.basis.solve(self.basis.normalize(x), &self.normalized))
    }

    /// Evaluates the model at a row's phase angle, for the given year.
    ///
    /// The year is ignored by models without a trend term.
    ///
    /// # Errors
    /// Returns [`Error::MissingParameter`] if the model has a trend term and `year` is `None`.
    pub fn predict(&self, row: &FeatureRow, year: Option<i32>) -> Result<f64> {
        self.predict_at(row.phase_angle(), year)
    }

    /// Evaluates the model for a row, using the row's own year.
    #[must_use]
    pub fn predict_row(&self, row: &FeatureRow) -> f64 {
        self.basis
            .solve(self.basis.normalize(row.into()), &self.normalized)
    }

    /// Evaluates the model for an observation.
    ///
    /// # Errors
    /// Returns an error if the observation cannot be encoded.
    pub fn predict_observation(&self, observation: &Observation) -> Result<f64> {
        let row = FeatureRow::new(*observation)?;
        Ok(self.predict_row(&row))
    }

    /// Pairs each row's temperature with the model's prediction.
    ///
    /// The rows need not be the ones the model was fitted to.
    #[must_use]
    pub fn residual_records(&self, rows: &[FeatureRow]) -> Vec<ResidualRecord> {
        rows.iter()
            .map(|row| ResidualRecord::new(row.year(), row.temperature(), self.predict_row(row)))
            .collect()
    }

    /// Amplitude and phase of the fitted annual cycle.
    ///
    /// # Errors
    /// Returns [`Error::DegenerateCoefficient`] if both harmonic coefficients are zero.
    pub fn wave_parameters(&self) -> Result<WaveParameters> {
        to_wave_parameters(self.cos_coeff(), self.sin_coeff())
    }
}

impl<B: Basis + ModelDisplay> std::fmt::Display for FittedModel<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.basis.format_model(f, &self.coefficients)?;
        write!(f, " (R² = {:.4})", self.r_squared)
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::TAU;

    use chrono::{Datelike, NaiveDate};

    use super::*;
    use crate::{assert_close, assert_coefficients, assert_r_squared, dataset::DatasetBuilder};

    /// Every day of the given years, with temperatures from `f(phase_angle, year)`.
    fn rows(years: std::ops::RangeInclusive<i32>, f: impl Fn(f64, i32) -> f64) -> Vec<FeatureRow> {
        let records = years.flat_map(|year| {
            (1..=366).filter_map(move |d| NaiveDate::from_yo_opt(year, d).map(|date| (date, year)))
        });
        let records: Vec<(NaiveDate, f64)> = records
            .map(|(date, year)| {
                let x = TAU * f64::from(date.ordinal()) / 366.0;
                (date, f(x, year))
            })
            .collect();

        DatasetBuilder::new()
            .with_records(records)
            .build()
            .unwrap()
            .feature_rows()
            .unwrap()
    }

    #[test]
    fn recovers_exact_coefficients() {
        let data = rows(2001..=2002, |x, _| 10.0 + 5.0 * x.cos() - 3.0 * x.sin());
        let model = fit_seasonal(&data).unwrap();

        assert_coefficients!(model, [10.0, 5.0, -3.0], epsilon = 1e-9);
        assert_eq!(model.trend_coeff(), None);
        assert_eq!(model.n_obs(), 730);
        assert_close!(model.r_squared(), 1.0, epsilon = 1e-12);
        assert!(model.standard_errors().iter().all(|se| *se < 1e-6));

        let wave = model.wave_parameters().unwrap();
        assert_close!(wave.amplitude, 34f64.sqrt(), epsilon = 1e-9);
    }

    #[cfg(feature = "synthetic")]
    #[test]
    fn recovers_coefficients_under_noise() {
        use crate::synthetic::SyntheticClimate;

        let dataset = SyntheticClimate::new(10.0, 5.0, -3.0)
            .with_noise(0.01)
            .with_seed(7)
            .dataset(1990..=1999)
            .unwrap();
        let model = fit_seasonal(&dataset.feature_rows().unwrap()).unwrap();

        assert_coefficients!(model, [10.0, 5.0, -3.0], epsilon = 0.1);
        assert_r_squared!(model, 0.99);
        assert!(model.adjusted_r_squared() <= model.r_squared());
        assert_close!(model.residual_variance(), 0.0001, epsilon = 5e-5);
    }

    #[test]
    fn trend_model_recovers_warming() {
        let data = rows(1950..=1989, |x, year| {
            10.0 + 5.0 * x.cos() - 3.0 * x.sin() + 0.02 * f64::from(year - 1950)
        });
        let model = fit_seasonal_with_trend(&data).unwrap();

        assert_close!(model.trend_coeff().unwrap(), 0.02, epsilon = 1e-9);
        assert_close!(model.intercept(), 10.0 - 0.02 * 1950.0, epsilon = 1e-6);
        assert_close!(model.cos_coeff(), 5.0, epsilon = 1e-9);

        let last = data.last().unwrap();
        assert_close!(
            model.predict(last, Some(1989)).unwrap(),
            last.temperature(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn trend_model_requires_year() {
        let data = rows(2000..=2001, |x, _| x.cos());
        let model = fit_seasonal_with_trend(&data).unwrap();

        assert!(matches!(
            model.predict(&data[0], None),
            Err(Error::MissingParameter("year"))
        ));
        assert!(model.predict_at(1.0, Some(2000)).is_ok());

        let seasonal = fit_seasonal(&data).unwrap();
        assert_close!(
            seasonal.predict(&data[0], None).unwrap(),
            seasonal.predict(&data[0], Some(1900)).unwrap()
        );
    }

    #[test]
    fn rejects_insufficient_data() {
        let data = rows(2001..=2001, |x, _| x.sin());

        assert!(matches!(
            fit_seasonal(&data[..2]),
            Err(Error::InsufficientData { n: 2, k: 3 })
        ));
        assert!(matches!(
            fit_seasonal_with_trend(&data[..3]),
            Err(Error::InsufficientData { n: 3, k: 4 })
        ));
        assert!(fit_seasonal(&data[..3]).is_ok());
        assert!(matches!(
            fit_seasonal(&[]),
            Err(Error::InsufficientData { n: 0, k: 3 })
        ));
    }

    #[test]
    fn residual_records_follow_rows() {
        let data = rows(2001..=2002, |x, year| {
            x.cos() + if year == 2002 { 1.0 } else { -1.0 }
        });
        let model = fit_seasonal(&data).unwrap();
        let records = model.residual_records(&data);

        assert_eq!(records.len(), data.len());
        assert_eq!(records[0].year, 2001);
        assert_close!(records[0].error(), 1.0, epsilon = 1e-6);
        assert_close!(records.last().unwrap().error(), -1.0, epsilon = 1e-6);

        let obs = data[10].observation();
        assert_close!(
            model.predict_observation(obs).unwrap(),
            records[10].predicted
        );
    }

    #[test]
    fn display_shows_equation() {
        let data = rows(2001..=2001, |x, _| 10.0 + 5.0 * x.cos() - 3.0 * x.sin());
        let model = fit_seasonal(&data).unwrap();
        assert_eq!(
            model.to_string(),
            "T(x) = 10.00 + 5.00·cos(x) - 3.00·sin(x) (R² = 1.0000)"
        );
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn chunked_normal_equations_match_full_system() {
        let data = rows(1950..=1959, |x, year| {
            10.0 + 5.0 * x.cos() - 3.0 * x.sin() + 0.02 * f64::from(year - 1950) + (37.0 * x).sin()
        });
        let basis = SeasonalTrendBasis::from_rows(&data);
        let (m, b) = TrendModel::create_matrix(&data, &basis, 4);
        let (xtx, xtb) = TrendModel::normal_equations(&m, &b);
        let full = TrendModel::solve_matrix(m, &b).unwrap();

        for chunk_size in [1, 97, 1000, data.len()] {
            let (c_xtx, c_xtb) = TrendModel::chunked_normal_equations(&data, &basis, 4, chunk_size);
            crate::assert_all_close!(c_xtx.as_slice(), xtx.as_slice(), epsilon = 1e-6);
            crate::assert_all_close!(c_xtb.as_slice(), xtb.as_slice(), epsilon = 1e-6);

            let chunked = TrendModel::solve_matrix(c_xtx, &c_xtb).unwrap();
            crate::assert_all_close!(chunked, full, epsilon = 1e-9);
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn large_fits_use_chunked_normal_equations() {
        let data = rows(600..=2000, |x, year| {
            10.0 + 5.0 * x.cos() - 3.0 * x.sin() + 0.01 * f64::from(year - 1300)
        });
        assert!(data.len() >= MIN_ROWS_TO_PARALLEL);

        let basis = SeasonalTrendBasis::from_rows(&data);
        let (_, _, is_normal) = TrendModel::create_parallel_matrix(&data, &basis, 4);
        assert!(is_normal);

        let model = fit_seasonal_with_trend(&data).unwrap();
        assert_close!(model.intercept(), 10.0 - 0.01 * 1300.0, epsilon = 1e-6);
        assert_close!(model.cos_coeff(), 5.0, epsilon = 1e-9);
        assert_close!(model.sin_coeff(), -3.0, epsilon = 1e-9);
        assert_close!(model.trend_coeff().unwrap(), 0.01, epsilon = 1e-10);
        assert_close!(model.r_squared(), 1.0, epsilon = 1e-9);
    }
}
