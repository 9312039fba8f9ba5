//! Utilities for displaying fitted temperature models
//!
//! This module turns coefficient vectors into human-readable equations such as
//! `T(x) = 10.00 + 5.00·cos(x) - 3.00·sin(x)`.
//!
//! # Key Concepts
//! - **[`ModelDisplay`]**: Trait to define how a basis renders its terms.
//! - **[`Term`]**: Represents a single term with a sign and body.
//! - **[`Sign`]**: Tracks whether a term is positive or negative.

/// Default precision for formatting used by the provided implementations of [`ModelDisplay`]
pub const DEFAULT_PRECISION: usize = 2;

/// Range of magnitudes printed in fixed notation; anything else is scientific.
const FIXED_RANGE: std::ops::Range<f64> = 1e-3..1e3;

/// Trait for formatting fitted models as equations.
///
/// Implementors control how individual terms are displayed, while a default implementation
/// assembles them into a full equation.
pub trait ModelDisplay {
    /// Formats the term for coefficient `j`.
    ///
    /// Returning `None` indicates the term should be skipped
    /// (typically when the coefficient is zero).
    fn format_term(&self, j: usize, coef: f64) -> Option<Term>;

    /// Writes the full equation into the provided buffer.
    ///
    /// The output is prefixed with `"T(x) = "`; the first term is written without a leading `+`.
    ///
    /// # Errors
    /// Returns an error if writing to `buffer` fails.
    fn format_model<B: std::fmt::Write>(
        &self,
        buffer: &mut B,
        coefficients: &[f64],
    ) -> std::fmt::Result {
        let mut terms = coefficients
            .iter()
            .enumerate()
            .filter_map(|(j, &coef)| self.format_term(j, coef));

        write!(buffer, "T(x) = ")?;
        let Some(first) = terms.next() else {
            return write!(buffer, "0");
        };

        if first.sign == Sign::Negative {
            write!(buffer, "{}", first.sign.char())?;
        }
        write!(buffer, "{}", first.body)?;

        for term in terms {
            write!(buffer, " {} {}", term.sign.char(), term.body)?;
        }

        Ok(())
    }
}

/// Represents the sign of a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    /// Positive sign (`+` when displayed).
    Positive,

    /// Negative sign (`-` when displayed).
    Negative,
}

impl Sign {
    /// Determines the sign from a numeric coefficient.
    ///
    /// # Example
    /// ```
    /// # use climatefit::display::Sign;
    /// assert_eq!(Sign::from_coef(3.0), Sign::Positive);
    /// assert_eq!(Sign::from_coef(-2.0), Sign::Negative);
    /// ```
    #[must_use]
    pub fn from_coef(coef: f64) -> Self {
        if coef < 0.0 {
            Self::Negative
        } else {
            Self::Positive
        }
    }

    /// Returns the character representation of the sign.
    #[must_use]
    pub fn char(&self) -> char {
        match self {
            Sign::Positive => '+',
            Sign::Negative => '-',
        }
    }
}

/// A single term of an equation for display purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    /// The sign of the term (positive or negative).
    pub sign: Sign,

    /// The body of the term (e.g., `"5.00·cos(x)"`), without its sign.
    pub body: String,
}

impl Term {
    /// Creates a new term with the given sign and body.
    #[must_use]
    pub fn new(sign: Sign, body: String) -> Self {
        Self { sign, body }
    }
}

/// Formats the magnitude of a coefficient for display in a term.
///
/// - Returns `None` if the coefficient is zero or effectively zero (≤ epsilon).
/// - Formats as a decimal if the absolute value is between `1e-3` and `1e3`.
/// - Formats in scientific notation otherwise.
///
/// # Example
/// ```
/// # use climatefit::display::format_coefficient;
/// assert_eq!(format_coefficient(0.0, 2), None);
/// assert_eq!(format_coefficient(-2.5, 2), Some("2.50".to_string()));
/// assert_eq!(format_coefficient(1e5, 2), Some("1.00e5".to_string()));
/// ```
#[must_use]
pub fn format_coefficient(coef: f64, precision: usize) -> Option<String> {
    let abs = coef.abs();
    if abs <= f64::EPSILON {
        return None;
    }

    if FIXED_RANGE.contains(&abs) {
        Some(format!("{abs:.precision$}"))
    } else {
        Some(format!("{abs:.precision$e}"))
    }
}
