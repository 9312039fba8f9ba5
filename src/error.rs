//! Error types for harmonic climate fitting
//!
//! This module defines the failure modes of the fitting and analysis pipeline,
//! along with a convenient `Result` alias.
//!
//! Every variant carries the offending input so a wrapping tool can surface it verbatim.

use chrono::NaiveDate;

/// Errors that can occur while building datasets, fitting models, or analysing residuals.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An input value is outside its valid domain.
    ///
    /// For example a day-of-year outside `1..=366`, or a non-finite temperature.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// There is nothing to compute over.
    #[error("No data available")]
    NoData,

    /// Fewer observations than free model parameters.
    #[error("Not enough data to fit {k} parameters: got {n} observations")]
    InsufficientData {
        /// Number of observations supplied
        n: usize,
        /// Number of free parameters in the model
        k: usize,
    },

    /// A parameter required by the model was not supplied.
    ///
    /// Trend-aware models cannot predict without a year.
    #[error("Missing parameter `{0}`: this model requires it for prediction")]
    MissingParameter(&'static str),

    /// Wave parameters cannot be recovered from the given coefficients.
    ///
    /// Raised when both coefficients are zero; the amplitude vanishes and the phase is undefined.
    #[error("Degenerate coefficients (cos = {cos_coeff}, sin = {sin_coeff}): phase shift is undefined for a zero amplitude")]
    DegenerateCoefficient {
        /// Fitted cosine coefficient
        cos_coeff: f64,
        /// Fitted sine coefficient
        sin_coeff: f64,
    },

    /// Two observations share the same date.
    #[error("Duplicate observation for {0}")]
    DuplicateDate(NaiveDate),

    /// Failed to solve the least-squares system.
    ///
    /// Contains a static string describing the solver error.
    #[error("Failed to solve: {0}")]
    Algebra(&'static str),

    /// The analysis configuration is inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The analysis configuration could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for climate fitting operations
pub type Result<T> = std::result::Result<T, Error>;
