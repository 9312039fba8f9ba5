//! Regressor bases for harmonic regression
//!
//! This module defines the [`Basis`] trait, which abstracts the set of functions a
//! temperature model is a linear combination of. Both provided bases describe a single
//! annual harmonic; the trend basis adds a linear year term.
//!
//! # Provided Bases
//! - [`SeasonalBasis`]: `1, cos(x), sin(x)`
//! - [`SeasonalTrendBasis`]: `1, cos(x), sin(x), year`
//!
//! # Why a linear basis?
//! A cosine wave with unknown amplitude and phase, `c·cos(x + φ)`, is not linear in `φ`.
//! Expanding it with the angle-sum identity gives `a·cos(x) + b·sin(x)`, which *is* linear
//! in `a` and `b`. Fitting then reduces to ordinary least squares, with no iterative
//! optimisation; see [`crate::wave`] for the way back to `(c, φ)`.
use nalgebra::{DMatrix, MatrixViewMut};

use crate::phase::FeatureRow;

pub(crate) mod seasonal;
pub use seasonal::SeasonalBasis;

pub(crate) mod trend;
pub use trend::SeasonalTrendBasis;

/// Inputs to the basis functions at one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regressors {
    /// Angle on the annual cycle, see [`crate::phase::phase_angle`]
    pub phase_angle: f64,

    /// Calendar year; ignored by bases without a trend term
    pub year: f64,
}
impl Regressors {
    /// Creates a new set of regressors.
    #[must_use]
    pub fn new(phase_angle: f64, year: f64) -> Self {
        Self { phase_angle, year }
    }
}
impl From<&FeatureRow> for Regressors {
    fn from(row: &FeatureRow) -> Self {
        Self::new(row.phase_angle(), f64::from(row.year()))
    }
}

/// A trait representing a regression basis.
///
/// A basis defines the functions φ₀, φ₁, …, φₖ₋₁ a model is a linear combination of.
/// Coefficients are always ordered intercept, cosine, sine, then any extra terms.
///
/// Bases may rescale their inputs for numerical stability; the coefficients are then fitted in
/// the rescaled space and [`Basis::denormalization_matrix`] maps them back.
pub trait Basis: Sized + Clone + std::fmt::Debug + Send + Sync {
    /// Whether the basis needs a year to be evaluated.
    const REQUIRES_YEAR: bool;

    /// Create a new basis from the rows it will be fitted to
    ///
    /// Initializes any needed metadata for normalization
    fn from_rows(rows: &[FeatureRow]) -> Self;

    /// Number of basis functions, and therefore of free model parameters.
    fn k(&self) -> usize;

    /// Human-readable name of each basis function, in coefficient order.
    fn term_names(&self) -> &'static [&'static str];

    /// Normalizes the regressors for this basis.
    ///
    /// This is a no-op for bases without a trend term.
    fn normalize(&self, x: Regressors) -> Regressors {
        x
    }

    /// Populates a row of the design matrix with this basis evaluated at `x`.
    ///
    /// All `k` functions are written into `row` starting at column `start_index`.
    ///
    /// `x` will be normalized by the caller using the `normalize` method.
    fn fill_matrix_row<R: nalgebra::Dim, C: nalgebra::Dim, RS: nalgebra::Dim, CS: nalgebra::Dim>(
        &self,
        start_index: usize,
        x: Regressors,
        row: MatrixViewMut<'_, f64, R, C, RS, CS>,
    );

    /// Evaluates the jth basis function at `x`.
    ///
    /// `x` will be normalized by the caller using the `normalize` method.
    fn solve_function(&self, j: usize, x: Regressors) -> f64;

    /// Evaluates the linear combination of the basis functions at `x`.
    ///
    /// `x` will be normalized by the caller using the `normalize` method.
    fn solve(&self, x: Regressors, coefficients: &[f64]) -> f64 {
        coefficients
            .iter()
            .enumerate()
            .map(|(j, c)| c * self.solve_function(j, x))
            .sum()
    }

    /// Matrix `T` such that `T · c` gives the coefficients for un-normalized inputs.
    ///
    /// The identity for bases that do not rescale.
    fn denormalization_matrix(&self) -> DMatrix<f64> {
        DMatrix::identity(self.k(), self.k())
    }
}
