//! Cyclical encoding of calendar days
//!
//! A day-of-year is mapped onto the unit circle so that the annual temperature cycle
//! becomes a function of a single angle:
//!
//! ```math
//! x = 2π · day_of_year / 366
//! ```
//!
//! The period is 366 for every year, leap or not. This lines leap and common years up on the
//! same cycle at the cost of a sub-day drift; it is an approximation, not an equinox alignment.
//!
//! [`FeatureRow`] is an [`Observation`] augmented with its phase angle. It is derived, never
//! mutated, and is what the regression models consume.
use std::f64::consts::TAU;

use crate::{
    dataset::Observation,
    error::{Error, Result},
};

/// Number of days in one cycle of the encoding.
pub const DAYS_PER_CYCLE: u16 = 366;

/// Converts a day-of-year into its phase angle on the annual cycle.
///
/// The result lies in `(0, 2π]`, and is strictly increasing in `day_of_year`.
///
/// # Errors
/// Returns [`Error::InvalidInput`] if `day_of_year` is outside `1..=366`.
///
/// # Example
/// ```
/// # use climatefit::phase::phase_angle;
/// let x = phase_angle(183).unwrap();
/// assert!((x - std::f64::consts::PI).abs() < 1e-12);
/// ```
pub fn phase_angle(day_of_year: u16) -> Result<f64> {
    if !(1..=DAYS_PER_CYCLE).contains(&day_of_year) {
        return Err(Error::InvalidInput(format!(
            "day of year {day_of_year} is outside 1..={DAYS_PER_CYCLE}"
        )));
    }

    Ok(TAU * f64::from(day_of_year) / f64::from(DAYS_PER_CYCLE))
}

/// Converts a phase angle back into a (fractional) day-of-year.
///
/// Angles are wrapped onto `(0, 2π]` first, so the result is in `(0, 366]`.
#[must_use]
pub fn day_of_phase(phase_angle: f64) -> f64 {
    let mut x = phase_angle.rem_euclid(TAU);
    if x == 0.0 {
        x = TAU;
    }
    x * f64::from(DAYS_PER_CYCLE) / TAU
}

/// An observation together with its position on the annual cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    observation: Observation,
    phase_angle: f64,
}
impl FeatureRow {
    /// Encodes an observation.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if the observation's day-of-year cannot be encoded.
    pub fn new(observation: Observation) -> Result<Self> {
        let phase_angle = phase_angle(observation.day_of_year())?;
        Ok(Self {
            observation,
            phase_angle,
        })
    }

    /// The underlying observation.
    #[must_use]
    pub fn observation(&self) -> &Observation {
        &self.observation
    }

    /// Angle on the annual cycle, in `(0, 2π]`.
    #[must_use]
    pub fn phase_angle(&self) -> f64 {
        self.phase_angle
    }

    /// Calendar year of the observation.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.observation.year()
    }

    /// Observed temperature, in °C.
    #[must_use]
    pub fn temperature(&self) -> f64 {
        self.observation.temperature()
    }
}
