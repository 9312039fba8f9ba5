use nalgebra::MatrixViewMut;

use crate::{
    basis::{Basis, Regressors},
    display::{format_coefficient, ModelDisplay, Sign, Term, DEFAULT_PRECISION},
    phase::FeatureRow,
};

/// Single-harmonic basis for the annual temperature cycle.
///
/// ```math
/// 1, cos(x), sin(x)
/// ```
///
/// where `x` is the phase angle of the day. No trend term: every year is assumed to share the
/// same climatology.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SeasonalBasis;

impl Basis for SeasonalBasis {
    const REQUIRES_YEAR: bool = false;

    fn from_rows(_: &[FeatureRow]) -> Self {
        Self
    }

    fn k(&self) -> usize {
        3
    }

    fn term_names(&self) -> &'static [&'static str] {
        &["intercept", "cos", "sin"]
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
    }

    fn solve_function(&self, j: usize, x: Regressors) -> f64 {
        match j {
            0 => 1.0,
            1 => x.phase_angle.cos(),
            2 => x.phase_angle.sin(),
            _ => 0.0,
        }
    }
}

impl ModelDisplay for SeasonalBasis {
    fn format_term(&self, j: usize, coef: f64) -> Option<Term> {
        harmonic_term(j, coef)
    }
}

/// Formats the intercept and harmonic terms shared by both bases.
pub(crate) fn harmonic_term(j: usize, coef: f64) -> Option<Term> {
    let sign = Sign::from_coef(coef);
    let coef = format_coefficient(coef, DEFAULT_PRECISION)?;

    let body = match j {
        0 => coef,
        1 => format!("{coef}·cos(x)"),
        2 => format!("{coef}·sin(x)"),
        _ => return None,
    };
    Some(Term::new(sign, body))
}

#[cfg(test)]
mod tests {
    use nalgebra::DMatrix;

    use super::*;
    use crate::assert_close;

    #[test]
    fn fills_intercept_cos_sin() {
        let basis = SeasonalBasis;
        let x = Regressors::new(std::f64::consts::FRAC_PI_3, 1999.0);

        let mut m = DMatrix::zeros(1, basis.k());
        basis.fill_matrix_row(0, x, m.row_mut(0));

        assert_close!(m[(0, 0)], 1.0);
        assert_close!(m[(0, 1)], 0.5, epsilon = 1e-12);
        assert_close!(m[(0, 2)], 3f64.sqrt() / 2.0, epsilon = 1e-12);

        for j in 0..basis.k() {
            assert_close!(m[(0, j)], basis.solve_function(j, x), epsilon = 1e-12);
        }
    }

    #[test]
    fn solve_is_linear_combination() {
        let basis = SeasonalBasis;
        let x = Regressors::new(std::f64::consts::PI, 0.0);
        // 10 + 5·cos(π) - 3·sin(π) = 5
        assert_close!(basis.solve(x, &[10.0, 5.0, -3.0]), 5.0, epsilon = 1e-12);
    }
}
