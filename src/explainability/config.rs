//! Profiling configuration

use crate::error::{CeterisError, Result};
use crate::utils::ParallelConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How numeric grids are placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitType {
    /// Empirical quantiles at evenly spaced probabilities
    #[default]
    Quantiles,
    /// Evenly spaced values between the observed minimum and maximum
    Uniform,
}

/// Configuration for split selection and profile building
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Number of candidate grid points for numeric variables
    pub grid_points: usize,

    /// Placement of numeric grid points
    pub split_type: SplitType,

    /// Add the explained observations' own values to each grid
    pub include_observation_values: bool,

    /// Source tag attached to every profile row
    pub label: String,

    /// Parallel computation of per-variable blocks
    pub parallel: ParallelConfig,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            grid_points: 101,
            split_type: SplitType::Quantiles,
            include_observation_values: false,
            label: "model".to_string(),
            parallel: ParallelConfig::default(),
        }
    }
}

impl ProfileConfig {
    /// Create a new profile configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the number of grid points
    pub fn with_grid_points(mut self, n: usize) -> Self {
        self.grid_points = n;
        self
    }

    /// Builder method to set the split type
    pub fn with_split_type(mut self, split_type: SplitType) -> Self {
        self.split_type = split_type;
        self
    }

    /// Builder method to include observation values in grids
    pub fn with_observation_values(mut self, include: bool) -> Self {
        self.include_observation_values = include;
        self
    }

    /// Builder method to set the row label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Builder method to set parallel execution
    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_grid_points(self.grid_points)?;
        if self.label.is_empty() {
            return Err(CeterisError::ConfigError("label must not be empty".to_string()));
        }
        if self.parallel.n_threads == Some(0) {
            return Err(CeterisError::ConfigError(
                "parallel.n_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_grid_points(grid_points: usize) -> Result<()> {
    if grid_points < 2 {
        return Err(CeterisError::InvalidArgument(format!(
            "grid_points must be at least 2, got {}",
            grid_points
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ProfileConfig::default();
        assert_eq!(config.grid_points, 101);
        assert_eq!(config.split_type, SplitType::Quantiles);
        assert!(!config.include_observation_values);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            ProfileConfig::from_json(r#"{"grid_points": 11, "split_type": "uniform", "label": "rf"}"#)
                .unwrap();
        assert_eq!(config.grid_points, 11);
        assert_eq!(config.split_type, SplitType::Uniform);
        assert_eq!(config.label, "rf");
        assert!(!config.parallel.enabled);
    }

    #[test]
    fn test_validation() {
        let err = ProfileConfig::from_json(r#"{"grid_points": 1}"#).unwrap_err();
        assert!(matches!(err, CeterisError::InvalidArgument(_)));

        let err = ProfileConfig::new().with_label("").validate().unwrap_err();
        assert!(matches!(err, CeterisError::ConfigError(_)));

        let config = ProfileConfig::new().with_parallel(ParallelConfig::enabled().with_threads(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"grid_points": 5, "parallel": {{"enabled": true}}}}"#).unwrap();

        let config = ProfileConfig::from_file(file.path()).unwrap();
        assert_eq!(config.grid_points, 5);
        assert!(config.parallel.enabled);

        assert!(matches!(
            ProfileConfig::from_file("/nonexistent/ceteris.json"),
            Err(CeterisError::IoError(_))
        ));
    }
}
