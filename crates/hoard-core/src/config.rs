//! Indexing configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::table::{DEFAULT_GROWTH_STEP, DEFAULT_LOAD_FACTOR};

/// Configuration for an indexing run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct IndexConfig {
    /// Root directory to index.
    pub root: PathBuf,

    /// Follow symbolic links when reading metadata and opening directories.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Initial catalog capacity, rounded up to a prime.
    #[builder(default = "4099")]
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,

    /// Entries-to-buckets ratio that triggers a resize.
    #[builder(default = "DEFAULT_LOAD_FACTOR")]
    #[serde(default = "default_load_factor")]
    pub load_factor: f64,

    /// Which prime above twice the capacity a resize targets.
    #[builder(default = "DEFAULT_GROWTH_STEP")]
    #[serde(default = "default_growth_step")]
    pub growth_step: usize,

    /// Publish a progress snapshot every this many cataloged entries.
    #[builder(default = "1000")]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

fn default_initial_capacity() -> usize {
    4099
}

fn default_load_factor() -> f64 {
    DEFAULT_LOAD_FACTOR
}

fn default_growth_step() -> usize {
    DEFAULT_GROWTH_STEP
}

fn default_progress_interval() -> u64 {
    1000
}

impl IndexConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            None => return Err("Root path is required".to_string()),
            _ => {}
        }
        if let Some(load_factor) = self.load_factor {
            if !(load_factor > 0.0 && load_factor <= 1.0) {
                return Err(format!("Load factor must be in (0, 1], got {load_factor}"));
            }
        }
        if self.growth_step == Some(0) {
            return Err("Growth step must be at least 1".to_string());
        }
        Ok(())
    }
}

impl IndexConfig {
    /// Create a new config builder.
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }

    /// Create a simple config for indexing a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_symlinks: false,
            initial_capacity: default_initial_capacity(),
            load_factor: DEFAULT_LOAD_FACTOR,
            growth_step: DEFAULT_GROWTH_STEP,
            progress_interval: default_progress_interval(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = IndexConfig::builder()
            .root("/srv/data")
            .follow_symlinks(true)
            .initial_capacity(31usize)
            .growth_step(3usize)
            .build()
            .unwrap();

        assert_eq!(config.root, PathBuf::from("/srv/data"));
        assert!(config.follow_symlinks);
        assert_eq!(config.initial_capacity, 31);
        assert_eq!(config.growth_step, 3);
        assert_eq!(config.load_factor, 0.5);
    }

    #[test]
    fn test_config_simple() {
        let config = IndexConfig::new("/srv/data");
        assert!(!config.follow_symlinks);
        assert_eq!(config.initial_capacity, 4099);
        assert_eq!(config.growth_step, 10);
    }

    #[test]
    fn test_config_validation() {
        assert!(IndexConfig::builder().build().is_err());
        assert!(IndexConfig::builder().root("").build().is_err());
        assert!(IndexConfig::builder().root("/x").load_factor(0.0).build().is_err());
        assert!(IndexConfig::builder().root("/x").load_factor(1.5).build().is_err());
        assert!(IndexConfig::builder().root("/x").growth_step(0usize).build().is_err());
        assert!(IndexConfig::builder().root("/x").load_factor(1.0).build().is_ok());
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let config: IndexConfig = serde_json::from_str(r#"{"root": "/srv"}"#).unwrap();
        assert_eq!(config.initial_capacity, 4099);
        assert_eq!(config.load_factor, 0.5);
        assert!(!config.follow_symlinks);
    }
}
