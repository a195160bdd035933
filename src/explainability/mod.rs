//! Model explainability module
//!
//! Ceteris paribus profiles (individual conditional expectation) and their
//! aggregation into partial dependence curves:
//! - [`SplitSelector`] chooses the grid each variable is swept across
//! - [`ProfileBuilder`] evaluates a [`Predictor`] on every observation x grid point
//! - [`ProfileAggregator`] averages profiles, optionally per group

mod aggregate;
mod config;
mod profiles;
mod splits;

pub use aggregate::{aggregate, AggregatedCurve, AggregatedPoint, Grouping, ProfileAggregator};
pub use config::{ProfileConfig, SplitType};
pub use profiles::{build_profiles, Predictions, Predictor, ProfileBuilder, ProfileRow, ProfileTable};
pub use splits::{compute_splits, quantile, Grid, SplitSelector, VariableSplits};
