use nalgebra::{DMatrix, MatrixViewMut};

use crate::{
    basis::{seasonal::harmonic_term, Basis, Regressors},
    display::{format_coefficient, ModelDisplay, Sign, Term, DEFAULT_PRECISION},
    phase::FeatureRow,
};

/// Single-harmonic basis with a linear secular trend.
///
/// ```math
/// 1, cos(x), sin(x), year
/// ```
///
/// The year regressor is centred on the mean training year before solving, which keeps the
/// design matrix well conditioned (raw years are ~2000 while the other columns are ~1).
/// Coefficients are mapped back to raw-year form by [`Basis::denormalization_matrix`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SeasonalTrendBasis {
    year_center: f64,
}
impl SeasonalTrendBasis {
    /// Creates a new trend basis centred on the given year.
    #[must_use]
    pub fn new(year_center: f64) -> Self {
        Self { year_center }
    }

    /// The year subtracted from the year regressor during fitting.
    #[must_use]
    pub fn year_center(&self) -> f64 {
        self.year_center
    }
}

impl Basis for SeasonalTrendBasis {
    const REQUIRES_YEAR: bool = true;

    fn from_rows(rows: &[FeatureRow]) -> Self {
        if rows.is_empty() {
            return Self::default();
        }

        let sum: f64 = rows.iter().map(|r| f64::from(r.year())).sum();
        Self::new(sum / rows.len() as f64)
    }

    fn k(&self) -> usize {
        4
    }

    fn term_names(&self) -> &'static [&'static str] {
        &["intercept", "cos", "sin", "year"]
    }

    fn normalize(&self, x: Regressors) -> Regressors {
        Regressors::new(x.phase_angle, x.year - self.year_center)
    }

    fn fill_matrix_row<R: nalgebra::Dim, C: nalgebra::Dim, RS: nalgebra::Dim, CS: nalgebra::Dim>(
        &self,
        start_index: usize,
        x: Regressors,
        mut row: MatrixViewMut<'_, f64, R, C, RS, CS>,
    ) {
        let (sin_x, cos_x) = x.phase_angle.sin_cos();
        row[start_index] = 1.0;
        row[start_index + 1] = cos_x;
        row[start_index + 2] = sin_x;
        row[start_index + 3] = x.year;
    }

    fn solve_function(&self, j: usize, x: Regressors) -> f64 {
        match j {
            0 => 1.0,
            1 => x.phase_angle.cos(),
            2 => x.phase_angle.sin(),
            3 => x.year,
            _ => 0.0,
        }
    }

    /// `β0 + β3·(year - center)` is `(β0 - β3·center) + β3·year`
    fn denormalization_matrix(&self) -> DMatrix<f64> {
        let mut t = DMatrix::identity(4, 4);
        t[(0, 3)] = -self.year_center;
        t
    }
}

impl ModelDisplay for SeasonalTrendBasis {
    fn format_term(&self, j: usize, coef: f64) -> Option<Term> {
        if j == 3 {
            let sign = Sign::from_coef(coef);
            let coef = format_coefficient(coef, DEFAULT_PRECISION + 2)?;
            return Some(Term::new(sign, format!("{coef}·year")));
        }

        harmonic_term(j, coef)
    }
}
