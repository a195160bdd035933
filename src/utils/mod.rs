//! Utility functions and types

mod parallel;

pub use parallel::{try_map_ordered, ParallelConfig};
