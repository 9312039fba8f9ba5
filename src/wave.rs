//! Recovery of amplitude and phase from fitted harmonic coefficients
//!
//! A fitted model describes the annual cycle as `a·cos(x) + b·sin(x)`. The same curve can be
//! written as a single shifted cosine:
//!
//! ```math
//! a·cos(x) + b·sin(x) = c·cos(x + φ)
//! where
//!   c = √(a² + b²)
//!   φ = atan2(-b, a)
//! ```
//!
//! The amplitude `c` is half the peak-to-trough seasonal swing, and `φ` locates the warmest day.
//! The two-argument arctangent is used for every input, so `a = 0` is handled like any other
//! value (`φ = ∓π/2`). Only `a = b = 0` is rejected, as the phase of a flat line is undefined.
use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    phase::day_of_phase,
};

/// Amplitude and phase of a single-harmonic annual cycle.
///
/// Always has `amplitude > 0` and `phase_shift` in `(-π, π]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveParameters {
    /// Half the seasonal swing, `c`, in °C.
    pub amplitude: f64,

    /// Phase shift `φ`, in radians.
    pub phase_shift: f64,
}

/// Converts linear harmonic coefficients into [`WaveParameters`].
///
/// # Errors
/// - [`Error::InvalidInput`] if either coefficient is not finite.
/// - [`Error::DegenerateCoefficient`] if both coefficients are zero.
///
/// # Example
/// ```
/// # use climatefit::wave::to_wave_parameters;
/// let wave = to_wave_parameters(0.0, 2.0).unwrap();
/// assert!((wave.amplitude - 2.0).abs() < 1e-12);
/// assert!((wave.phase_shift + std::f64::consts::FRAC_PI_2).abs() < 1e-12);
/// ```
pub fn to_wave_parameters(cos_coeff: f64, sin_coeff: f64) -> Result<WaveParameters> {
    if !cos_coeff.is_finite() || !sin_coeff.is_finite() {
        return Err(Error::InvalidInput(format!(
            "harmonic coefficients must be finite (cos = {cos_coeff}, sin = {sin_coeff})"
        )));
    }

    if cos_coeff == 0.0 && sin_coeff == 0.0 {
        return Err(Error::DegenerateCoefficient {
            cos_coeff,
            sin_coeff,
        });
    }

    Ok(WaveParameters {
        amplitude: cos_coeff.hypot(sin_coeff),
        phase_shift: (-sin_coeff).atan2(cos_coeff),
    })
}

impl WaveParameters {
    /// See [`to_wave_parameters`].
    ///
    /// # Errors
    /// Same as [`to_wave_parameters`].
    pub fn from_coefficients(cos_coeff: f64, sin_coeff: f64) -> Result<Self> {
        to_wave_parameters(cos_coeff, sin_coeff)
    }

    /// Evaluates `intercept + c·cos(x + φ)`.
    #[must_use]
    pub fn evaluate(&self, intercept: f64, phase_angle: f64) -> f64 {
        intercept + self.amplitude * (phase_angle + self.phase_shift).cos()
    }

    /// Maps back to the linear `(cos, sin)` coefficients.
    ///
    /// `c·cos(x + φ) = c·cos(φ)·cos(x) - c·sin(φ)·sin(x)`
    #[must_use]
    pub fn linear_coefficients(&self) -> (f64, f64) {
        let (sin_phi, cos_phi) = self.phase_shift.sin_cos();
        (self.amplitude * cos_phi, -self.amplitude * sin_phi)
    }

    /// Phase angle of the cycle's maximum, in `(0, 2π]`.
    #[must_use]
    pub fn peak_phase(&self) -> f64 {
        let x = (-self.phase_shift).rem_euclid(TAU);
        if x == 0.0 {
            TAU
        } else {
            x
        }
    }

    /// Fractional day-of-year of the cycle's maximum, in `(0, 366]`.
    #[must_use]
    pub fn peak_day_of_year(&self) -> f64 {
        day_of_phase(self.peak_phase())
    }
}

impl std::fmt::Display for WaveParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.2}·cos(x {} {:.4})",
            self.amplitude,
            if self.phase_shift < 0.0 { '-' } else { '+' },
            self.phase_shift.abs()
        )
    }
}

/// Largest disagreement between the linear and cosine-wave forms over a set of angles.
///
/// Compares `intercept + a·cos(x) + b·sin(x)` against `intercept + c·cos(x + φ)` at every
/// angle. Useful as a numerical cross-check on a fitted model.
///
/// # Errors
/// Same as [`to_wave_parameters`].
pub fn max_reconstruction_error(
    intercept: f64,
    cos_coeff: f64,
    sin_coeff: f64,
    phase_angles: impl IntoIterator<Item = f64>,
) -> Result<f64> {
    let wave = to_wave_parameters(cos_coeff, sin_coeff)?;
    Ok(phase_angles
        .into_iter()
        .map(|x| {
            let linear = intercept + cos_coeff * x.cos() + sin_coeff * x.sin();
            (linear - wave.evaluate(intercept, x)).abs()
        })
        .fold(0.0, f64::max))
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use proptest::prelude::*;

    use super::*;
    use crate::assert_close;

    #[test]
    fn zero_cosine_uses_quarter_turn() {
        let wave = to_wave_parameters(0.0, 3.0).unwrap();
        assert_close!(wave.amplitude, 3.0);
        assert_close!(wave.phase_shift, -FRAC_PI_2);

        let wave = to_wave_parameters(0.0, -3.0).unwrap();
        assert_close!(wave.amplitude, 3.0);
        assert_close!(wave.phase_shift, FRAC_PI_2);
    }

    #[test]
    fn negative_cosine_keeps_positive_amplitude() {
        let wave = to_wave_parameters(-4.0, 0.0).unwrap();
        assert_close!(wave.amplitude, 4.0);
        assert_close!(wave.phase_shift.abs(), PI);
    }

    #[test]
    fn rejects_degenerate_and_non_finite() {
        assert!(matches!(
            to_wave_parameters(0.0, 0.0),
            Err(Error::DegenerateCoefficient { .. })
        ));
        assert!(matches!(
            to_wave_parameters(f64::NAN, 1.0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn linear_coefficients_invert() {
        let wave = to_wave_parameters(5.0, -3.0).unwrap();
        let (a, b) = wave.linear_coefficients();
        assert_close!(a, 5.0, epsilon = 1e-12);
        assert_close!(b, -3.0, epsilon = 1e-12);
    }

    #[test]
    fn peak_matches_maximum() {
        // -cos(x) peaks at x = π, mid-year
        let wave = to_wave_parameters(-10.0, 0.0).unwrap();
        assert_close!(wave.peak_phase(), PI, epsilon = 1e-12);
        assert_close!(wave.peak_day_of_year(), 183.0, epsilon = 1e-9);

        let peak = wave.evaluate(0.0, wave.peak_phase());
        assert_close!(peak, wave.amplitude, epsilon = 1e-12);
    }

    #[test]
    fn display() {
        let wave = WaveParameters {
            amplitude: 2.0,
            phase_shift: -0.5,
        };
        assert_eq!(wave.to_string(), "2.00·cos(x - 0.5000)");
    }

    proptest! {
        #[test]
        fn wave_form_reproduces_linear_form(
            intercept in -50.0f64..50.0,
            a in -40.0f64..40.0,
            b in -40.0f64..40.0,
        ) {
            prop_assume!(a != 0.0);
            let angles = (0..1000).map(|i| TAU * f64::from(i) / 1000.0);
            let err = max_reconstruction_error(intercept, a, b, angles).unwrap();
            prop_assert!(err < 1e-9, "max error {err}");
        }
    }
}
