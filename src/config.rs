//! Replication configuration
//!
//! Settings are loaded from YAML; every field falls back to its default.
//!
//! ```yaml
//! data_parts: 4
//! parity_parts: 2
//! max_lost_vec_size: 100000
//! huge_blob_threshold: 524288
//! arena_chunk_size: 1048576
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ec::scheme::ErasureScheme;
use crate::error::{Error, Result};
use crate::repl::arena::DEFAULT_CHUNK_SIZE;

/// Default capacity of the lost-blob task queue
pub const DEFAULT_MAX_LOST_VEC_SIZE: usize = 100_000;

/// Default part size from which a blob is stored as per-part records (512KB)
pub const DEFAULT_HUGE_BLOB_THRESHOLD: usize = 512 * 1024;

/// Configuration of one storage node's replication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    /// Number of data parts (k)
    pub data_parts: u8,

    /// Number of parity parts (m)
    pub parity_parts: u8,

    /// Task queue size at which planning pauses
    pub max_lost_vec_size: usize,

    /// Part size in bytes at or above which a blob is huge
    pub huge_blob_threshold: usize,

    /// Size of the chunks the record arena allocates
    pub arena_chunk_size: usize,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            data_parts: 4,
            parity_parts: 2,
            max_lost_vec_size: DEFAULT_MAX_LOST_VEC_SIZE,
            huge_blob_threshold: DEFAULT_HUGE_BLOB_THRESHOLD,
            arena_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ReplConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        self.scheme()?;
        if self.max_lost_vec_size == 0 {
            return Err(Error::Config(
                "max_lost_vec_size must be greater than 0".to_string(),
            ));
        }
        if self.huge_blob_threshold == 0 {
            return Err(Error::Config(
                "huge_blob_threshold must be greater than 0".to_string(),
            ));
        }
        if self.arena_chunk_size == 0 {
            return Err(Error::Config(
                "arena_chunk_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Erasure scheme described by this configuration
    pub fn scheme(&self) -> Result<ErasureScheme> {
        ErasureScheme::new(self.data_parts, self.parity_parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = ReplConfig::default();

        assert_eq!(config.data_parts, 4);
        assert_eq!(config.parity_parts, 2);
        assert_eq!(config.max_lost_vec_size, 100_000);
        assert_eq!(config.huge_blob_threshold, 512 * 1024);
        assert_eq!(config.arena_chunk_size, 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = ReplConfig::from_yaml_str("data_parts: 6\nparity_parts: 3\n").unwrap();

        assert_eq!(config.scheme().unwrap(), ErasureScheme::new(6, 3).unwrap());
        assert_eq!(config.max_lost_vec_size, DEFAULT_MAX_LOST_VEC_SIZE);
    }

    #[test]
    fn test_invalid_yaml_values() {
        assert!(matches!(
            ReplConfig::from_yaml_str("max_lost_vec_size: 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ReplConfig::from_yaml_str("parity_parts: 0"),
            Err(Error::InvalidEcConfig(_))
        ));
        assert!(matches!(
            ReplConfig::from_yaml_str("data_parts: [1]"),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("repl-config-{}.yaml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "huge_blob_threshold: 4096").unwrap();
        drop(file);

        let config = ReplConfig::from_file(&path).unwrap();
        assert_eq!(config.huge_blob_threshold, 4096);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ReplConfig::from_file("/nonexistent/repl.yaml"),
            Err(Error::Io(_))
        ));
    }
}
