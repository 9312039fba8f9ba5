//! # Climatefit
//! ## Which years were weird, and by how much?
//!
//! Decades of daily temperatures follow one dominant pattern: a yearly wave. This library fits
//! that wave with harmonic regression, then asks how far each individual year strayed from it.
//!
//! I provide a set of tools designed to help you:
//! - Encode calendar days onto the annual cycle
//! - Fit the seasonal cycle, with or without a long-term warming trend
//! - Recover the amplitude and timing of the cycle from the fitted coefficients
//! - Summarise every year's residuals and count its unusually warm or cold days
//! - Rank years from most ideal to most unusual
//!
//! The simplest use-case is the whole pipeline at once:
//! ```rust
//! # #[cfg(feature = "synthetic")]
//! # {
//! use climatefit::{analyze, AnalysisConfig, ModelVariant, synthetic::SyntheticClimate};
//!
//! let dataset = SyntheticClimate::default()
//!     .with_trend(0.03, 1950)
//!     .with_noise(2.0)
//!     .with_seed(1)
//!     .dataset(1950..=2000)
//!     .unwrap();
//!
//! let report = analyze(&dataset, &AnalysisConfig::default()).unwrap();
//! for year in report.most_unusual_years(ModelVariant::Baseline) {
//!     println!("#{} {}: {:.1}% unusual days", year.rank, year.stats.year, 100.0 * year.stats.prop_unusual());
//! }
//! # }
//! ```
//!
//! # Core Concepts
//! - A [`dataset::Dataset`] is an ordered, date-unique series of daily [`dataset::Observation`]s.
//! - The **phase angle** of a day places it on the annual cycle: `x = 2π · day_of_year / 366`.
//!     - See [`phase`].
//! - A [`FittedModel`] is a least-squares fit of `β0 + β1·cos(x) + β2·sin(x)`, optionally `+ β3·year`.
//!     - The cosine-with-phase model `c·cos(x + φ)` is not linear in `φ`, but the sum of a cosine and a
//!       sine is. Fitting is therefore ordinary least squares, with no iterative optimisation.
//!     - [`wave`] converts the fitted coefficients back to amplitude and phase.
//! - [`residuals::ResidualStats`] summarise one year's deviation from a model.
//!     - A day is **unusual** when its residual exceeds a single global threshold,
//!       by default the 90th percentile of all absolute residuals.
//! - [`ranking`] orders years by any of those statistics.
//!
//! # Implementation Details
//!
//! Linear algebra is done with `nalgebra`, solving the least-squares system by SVD.
//! The library logs through `tracing` and never installs a subscriber.
//!
//! # Features
//! - `synthetic` *(default)*: seeded synthetic climate generator, see [`synthetic`].
//! - `parallel`: uses `rayon` for very large fits and for per-year residual aggregation.
//!
//! # Testing utilities
//!
//! This crate includes assertion macros for validating fitted models. See [`test`].
//!
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::needless_range_loop)] // The worst clippy lint
#![allow(clippy::cast_precision_loss)] // Day counts are nowhere near 2^52
#![allow(clippy::similar_names)] //       Clippy does not get to decide what names are similar
#![cfg_attr(docsrs, feature(doc_cfg))]


#[cfg(feature = "synthetic")]
#[cfg_attr(docsrs, doc(cfg(feature = "synthetic")))]
pub mod synthetic;

pub mod analysis;
pub mod basis;
pub mod dataset;
pub mod display;
pub mod error;
pub mod phase;
pub mod ranking;
pub mod residuals;
pub mod statistics;
pub mod wave;

mod fit;

pub use analysis::{analyze, AnalysisConfig, AnalysisReport, ModelVariant};
pub use fit::*;

pub use nalgebra;
