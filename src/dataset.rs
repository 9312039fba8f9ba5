//! Daily observations and the immutable dataset the pipeline runs over
//!
//! A [`Dataset`] is an ascending, date-unique sequence of [`Observation`]s. It is built once by a
//! [`DatasetBuilder`] and then only read: every model and every analysis step borrows it.
//!
//! Days missing from the record are simply absent; nothing is imputed.
use std::{collections::BTreeMap, ops::RangeInclusive};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    phase::FeatureRow,
};

/// One daily temperature record.
///
/// `year` and `day_of_year` are derived from the date, so they can never disagree with it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    date: NaiveDate,
    temperature: f64,
}
impl Observation {
    /// Creates a new observation.
    #[must_use]
    pub fn new(date: NaiveDate, temperature: f64) -> Self {
        Self { date, temperature }
    }

    /// Calendar date of the record.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Observed temperature, in °C.
    #[must_use]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Calendar year of the record.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Day of the year, `1..=366`, counting February 29th in leap years.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // ordinal is at most 366
    pub fn day_of_year(&self) -> u16 {
        self.date.ordinal() as u16
    }
}

/// How a [`DatasetBuilder`] resolves two records for the same date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the record that was added first.
    #[default]
    KeepFirst,

    /// Keep the record that was added last.
    KeepLast,

    /// Fail with [`Error::DuplicateDate`].
    Reject,
}

/// Builder for creating a [`Dataset`] from one or more sources.
///
/// Records can arrive in any order and sources may overlap; the builder sorts them
/// and enforces one record per date according to its [`DuplicatePolicy`].
///
/// # Example
/// ```
/// # use chrono::NaiveDate;
/// # use climatefit::dataset::{DatasetBuilder, DuplicatePolicy};
/// let day = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
/// let dataset = DatasetBuilder::new()
///     .with_records([(day, 1.0)])
///     .with_records([(day, 2.0)])
///     .build()
///     .unwrap();
///
/// assert_eq!(dataset.len(), 1);
/// assert_eq!(dataset.observations()[0].temperature(), 1.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DatasetBuilder {
    records: Vec<Observation>,
    policy: DuplicatePolicy,
}

impl DatasetBuilder {
    /// Create a new, empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duplicate resolution policy
    #[must_use]
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Add a single observation
    #[must_use]
    pub fn with_observation(mut self, observation: Observation) -> Self {
        self.records.push(observation);
        self
    }

    /// Add a batch of `(date, temperature)` records
    #[must_use]
    pub fn with_records(mut self, records: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        self.records.extend(
            records
                .into_iter()
                .map(|(date, temperature)| Observation::new(date, temperature)),
        );
        self
    }

    /// Build the dataset
    ///
    /// # Errors
    /// - [`Error::InvalidInput`] if a temperature is not finite.
    /// - [`Error::DuplicateDate`] if two records share a date under [`DuplicatePolicy::Reject`].
    pub fn build(self) -> Result<Dataset> {
        let total = self.records.len();
        let mut by_date: BTreeMap<NaiveDate, Observation> = BTreeMap::new();

        for observation in self.records {
            if !observation.temperature().is_finite() {
                return Err(Error::InvalidInput(format!(
                    "temperature {} on {} is not finite",
                    observation.temperature(),
                    observation.date()
                )));
            }

            match self.policy {
                DuplicatePolicy::KeepFirst => {
                    by_date.entry(observation.date()).or_insert(observation);
                }
                DuplicatePolicy::KeepLast => {
                    by_date.insert(observation.date(), observation);
                }
                DuplicatePolicy::Reject => {
                    if by_date.insert(observation.date(), observation).is_some() {
                        return Err(Error::DuplicateDate(observation.date()));
                    }
                }
            }
        }

        let dropped = total - by_date.len();
        if dropped > 0 {
            tracing::debug!(dropped, kept = by_date.len(), policy = ?self.policy, "dropped duplicate observations");
        }

        Ok(Dataset {
            observations: by_date.into_values().collect(),
        })
    }
}

/// An ordered, date-unique sequence of daily observations.
///
/// Immutable once built; subsets are new datasets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    observations: Vec<Observation>,
}

impl Dataset {
    /// Creates a dataset from already-clean observations.
    ///
    /// The input must be strictly ascending by date.
    ///
    /// # Errors
    /// - [`Error::DuplicateDate`] if a date repeats.
    /// - [`Error::InvalidInput`] if dates are out of order or a temperature is not finite.
    pub fn new(observations: Vec<Observation>) -> Result<Self> {
        for pair in observations.windows(2) {
            let (a, b) = (pair[0].date(), pair[1].date());
            if a == b {
                return Err(Error::DuplicateDate(a));
            } else if a > b {
                return Err(Error::InvalidInput(format!(
                    "observations are not in date order: {a} comes before {b}"
                )));
            }
        }

        if let Some(bad) = observations.iter().find(|o| !o.temperature().is_finite()) {
            return Err(Error::InvalidInput(format!(
                "temperature {} on {} is not finite",
                bad.temperature(),
                bad.date()
            )));
        }

        Ok(Self { observations })
    }

    /// Number of observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// True if there are no observations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// The observations, ascending by date.
    #[must_use]
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Iterates over the observations, ascending by date.
    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.observations.iter()
    }

    /// Distinct years present, ascending.
    #[must_use]
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.observations.iter().map(Observation::year).collect();
        years.dedup();
        years
    }

    /// First and last year present.
    #[must_use]
    pub fn year_range(&self) -> Option<RangeInclusive<i32>> {
        let first = self.observations.first()?.year();
        let last = self.observations.last()?.year();
        Some(first..=last)
    }

    /// The observations falling within the given years, as a new dataset.
    #[must_use]
    pub fn window(&self, years: RangeInclusive<i32>) -> Dataset {
        let observations = self
            .observations
            .iter()
            .filter(|o| years.contains(&o.year()))
            .copied()
            .collect();
        Dataset { observations }
    }

    /// Encodes every observation onto the annual cycle.
    ///
    /// # Errors
    /// Returns an error if an observation cannot be encoded.
    pub fn feature_rows(&self) -> Result<Vec<FeatureRow>> {
        self.observations.iter().copied().map(FeatureRow::new).collect()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.iter()
    }
}
