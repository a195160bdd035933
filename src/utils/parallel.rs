//! Parallel processing utilities

use crate::error::{CeterisError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for parallel processing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Whether to compute independent work items in parallel
    pub enabled: bool,
    /// Number of threads (None = use the global rayon pool)
    pub n_threads: Option<usize>,
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable parallel execution on the global pool
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            n_threads: None,
        }
    }

    /// Set number of threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_threads.unwrap_or_else(rayon::current_num_threads)
    }
}

/// Map `f` over `items`, in parallel when enabled, preserving item order
///
/// Fails if any item fails; with parallelism on, which error is reported is
/// not deterministic.
pub fn try_map_ordered<T, U, F>(items: &[T], config: &ParallelConfig, f: F) -> Result<Vec<U>>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> Result<U> + Send + Sync,
{
    if !config.enabled {
        return items.iter().map(f).collect();
    }

    match config.n_threads {
        None => items.par_iter().map(f).collect(),
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| CeterisError::ConfigError(format!("Thread pool error: {}", e)))?;
            pool.install(|| items.par_iter().map(f).collect())
        }
    }
}
