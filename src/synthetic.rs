//! Seeded synthetic daily temperature records
//!
//! [`SyntheticClimate`] generates a daily series from a known harmonic model, optionally with a
//! linear warming trend, a constant offset and Gaussian noise. It is the ground truth the fitting
//! and analysis code is tested and benchmarked against.
//!
//! <div class="warning">
//!
//! **Technical Details**
//!
//! ```math
//! T(date) = β0 + β1·cos(x) + β2·sin(x) + trend·(year - origin) + offset + ε
//! where
//!   x = phase angle of the date
//!   ε ~ N(0, noise²)
//! ```
//! </div>
use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::{
    dataset::{Dataset, Observation},
    error::{Error, Result},
    phase::phase_angle,
};

/// Generator for synthetic daily temperatures.
///
/// # Example
/// ```
/// # use climatefit::synthetic::SyntheticClimate;
/// let dataset = SyntheticClimate::new(10.0, -8.0, -2.0)
///     .with_trend(0.03, 1950)
///     .with_noise(1.5)
///     .with_seed(42)
///     .dataset(1950..=1959)
///     .unwrap();
///
/// assert_eq!(dataset.len(), 3652);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticClimate {
    intercept: f64,
    cos_coeff: f64,
    sin_coeff: f64,
    trend_per_year: f64,
    trend_origin: i32,
    offset: f64,
    noise: f64,

    /// Fixes the RNG seed for reproducibility.
    /// If not provided, a system RNG will be used each run.
    seed: Option<u64>,
}

impl Default for SyntheticClimate {
    /// A temperate northern-hemisphere climate, peaking in mid July.
    fn default() -> Self {
        Self::new(10.0, -10.0, -3.0)
    }
}

impl SyntheticClimate {
    /// Creates a noiseless, trendless generator from harmonic coefficients.
    #[must_use]
    pub fn new(intercept: f64, cos_coeff: f64, sin_coeff: f64) -> Self {
        Self {
            intercept,
            cos_coeff,
            sin_coeff,
            trend_per_year: 0.0,
            trend_origin: 0,
            offset: 0.0,
            noise: 0.0,
            seed: None,
        }
    }

    /// Adds `per_year · (year - origin)` to every day.
    #[must_use]
    pub fn with_trend(mut self, per_year: f64, origin: i32) -> Self {
        self.trend_per_year = per_year;
        self.trend_origin = origin;
        self
    }

    /// Adds a constant to every day.
    #[must_use]
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Adds Gaussian noise with the given standard deviation.
    #[must_use]
    pub fn with_noise(mut self, std_dev: f64) -> Self {
        self.noise = std_dev;
        self
    }

    /// Fixes the RNG seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn rng(&self) -> rand::rngs::SmallRng {
        match self.seed {
            Some(s) => rand::rngs::SmallRng::seed_from_u64(s),
            None => rand::rngs::SmallRng::from_rng(&mut rand::rng()),
        }
    }

    /// The noiseless temperature for a date.
    ///
    /// # Errors
    /// Returns an error if the date cannot be encoded.
    #[allow(clippy::cast_possible_truncation)] // ordinal is at most 366
    pub fn expected(&self, date: NaiveDate) -> Result<f64> {
        let x = phase_angle(date.ordinal() as u16)?;
        let years = f64::from(date.year() - self.trend_origin);
        Ok(self.intercept
            + self.cos_coeff * x.cos()
            + self.sin_coeff * x.sin()
            + self.trend_per_year * years
            + self.offset)
    }

    /// One observation for every calendar day of the given years.
    ///
    /// # Errors
    /// - [`Error::InvalidInput`] if the noise level is negative or not finite.
    /// - [`Error::InvalidInput`] if a year is outside the supported calendar.
    pub fn observations(&self, years: RangeInclusive<i32>) -> Result<Vec<Observation>> {
        if !self.noise.is_finite() || self.noise < 0.0 {
            return Err(Error::InvalidInput(format!(
                "noise level {} must be finite and non-negative",
                self.noise
            )));
        }

        let normal = Normal::new(0.0, self.noise).map_err(|e| {
            Error::InvalidInput(format!("noise level {}: {e}", self.noise))
        })?;
        let mut rng = self.rng();

        let mut observations = Vec::new();
        for year in years {
            let mut date = NaiveDate::from_ymd_opt(year, 1, 1)
                .ok_or_else(|| Error::InvalidInput(format!("year {year} is out of range")))?;

            while date.year() == year {
                let temperature = self.expected(date)? + normal.sample(&mut rng);
                observations.push(Observation::new(date, temperature));

                match date.succ_opt() {
                    Some(next) => date = next,
                    None => break,
                }
            }
        }

        Ok(observations)
    }

    /// See [`SyntheticClimate::observations`].
    ///
    /// # Errors
    /// Same as [`SyntheticClimate::observations`].
    pub fn dataset(&self, years: RangeInclusive<i32>) -> Result<Dataset> {
        Dataset::new(self.observations(years)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assert_close, statistics};

    #[test]
    fn noiseless_matches_expected() {
        let climate = SyntheticClimate::new(5.0, 2.0, 1.0).with_trend(0.1, 2000);
        let observations = climate.observations(2000..=2001).unwrap();

        assert_eq!(observations.len(), 366 + 365);
        for obs in &observations {
            assert_close!(obs.temperature(), climate.expected(obs.date()).unwrap());
        }

        let first = observations[0];
        let x = phase_angle(1).unwrap();
        assert_close!(first.temperature(), 5.0 + 2.0 * x.cos() + x.sin(), epsilon = 1e-12);
    }

    #[test]
    fn trend_and_offset_shift_years() {
        let climate = SyntheticClimate::default()
            .with_trend(0.5, 2000)
            .with_offset(3.0);
        let date = NaiveDate::from_ymd_opt(2010, 4, 1).unwrap();
        let base = SyntheticClimate::default().expected(date).unwrap();
        assert_close!(climate.expected(date).unwrap() - base, 8.0, epsilon = 1e-12);
    }

    #[test]
    fn seeded_noise_is_reproducible() {
        let climate = SyntheticClimate::new(0.0, 0.0, 0.0).with_noise(1.0).with_seed(3);
        let a = climate.observations(1999..=1999).unwrap();
        let b = climate.observations(1999..=1999).unwrap();
        assert_eq!(a, b);

        let mean = statistics::mean(a.iter().map(Observation::temperature));
        assert!(mean.abs() < 0.3, "mean {mean}");
    }

    #[test]
    fn rejects_negative_noise() {
        let climate = SyntheticClimate::default().with_noise(-1.0);
        assert!(matches!(
            climate.observations(2000..=2000),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            SyntheticClimate::default().with_noise(f64::NAN).dataset(2000..=2000),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn zero_noise_is_allowed() {
        let climate = SyntheticClimate::default().with_noise(0.0);
        assert_eq!(climate.observations(2001..=2001).unwrap().len(), 365);
    }
}
