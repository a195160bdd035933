//! Ceteris paribus profiles for black-box models
//!
//! For each observation and each chosen feature, all other features are held
//! fixed while the chosen feature is swept across a grid of representative
//! values, recording the model's prediction at each point. Averaging these
//! per-observation curves gives partial dependence summaries.
//!
//! # Modules
//!
//! - [`data`] - Tabular data model and storage adapters (in-memory, polars, ndarray)
//! - [`explainability`] - Split selection, profile building and aggregation
//! - [`utils`] - Parallel execution helpers
//!
//! # Example
//!
//! ```
//! use ceteris::prelude::*;
//! use polars::df;
//!
//! let df = df!(
//!     "surface" => &[40.0, 60.0, 80.0, 100.0],
//!     "district" => &["Ochota", "Wola", "Ochota", "Mokotow"],
//! )?;
//!
//! let model = |rows: &Dataset| -> ceteris::Result<Predictions> {
//!     let x = rows.select_array2(&["surface"])?;
//!     Ok(x.column(0).mapv(|s| 2000.0 + 50.0 * s).into())
//! };
//!
//! let splits = compute_splits(&df, &["surface", "district"], 5)?;
//! let profiles = build_profiles(&df, &splits, model)?;
//! assert_eq!(profiles.len(), 4 * 5 + 4 * 3);
//!
//! let pdp = aggregate::<&str>(&[profiles], Grouping::All, None)?;
//! assert_eq!(pdp.get("surface", &Value::Numeric(40.0), "model", None), Some(4000.0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core error handling
pub mod error;

// Data model
pub mod data;

// Profiling core
pub mod explainability;

// Utilities
pub mod utils;

pub use error::{CeterisError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{CeterisError, Result};

    // Data
    pub use crate::data::{ColumnData, Dataset, MatrixSource, TabularSource, Value};

    // Explainability
    pub use crate::explainability::{
        aggregate, build_profiles, compute_splits, AggregatedCurve, Grid, Grouping, Predictions,
        Predictor, ProfileAggregator, ProfileBuilder, ProfileConfig, ProfileRow, ProfileTable,
        SplitSelector, SplitType, VariableSplits,
    };

    // Utilities
    pub use crate::utils::ParallelConfig;
}
