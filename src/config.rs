use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{spool, ConfigError};

/// Default spill threshold in bytes.
pub const DEFAULT_SIZE_THRESHOLD: u64 = 10 * 1024;

/// Storage item factory configuration.
///
/// Derives serde traits so applications can embed it in their own
/// configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Largest content size, in bytes, that stays in memory.
    pub size_threshold: u64,
    /// Directory for spool files; `None` means the platform temp directory.
    pub spool_directory: Option<PathBuf>,
    /// Maximum accepted size of a single item, in bytes.
    pub max_item_size: Option<u64>,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            size_threshold: DEFAULT_SIZE_THRESHOLD,
            spool_directory: None,
            max_item_size: None,
        }
    }
}

impl FactoryConfig {
    /// Validates configuration invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(max_item_size) = self.max_item_size {
            if max_item_size == 0 {
                return Err(ConfigError::ZeroMaxItemSize);
            }
            if self.size_threshold > max_item_size {
                return Err(ConfigError::ThresholdExceedsMaxItemSize {
                    size_threshold: self.size_threshold,
                    max_item_size,
                });
            }
        }

        if let Some(directory) = &self.spool_directory {
            spool::check_directory_path(directory)
                .map_err(|reason| ConfigError::InvalidSpoolDirectory { reason })?;
        }

        Ok(())
    }

    /// Returns the directory spool files are created in.
    pub fn effective_spool_directory(&self) -> PathBuf {
        self.spool_directory
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(FactoryConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_threshold_above_max_item_size() {
        let config = FactoryConfig {
            size_threshold: 64,
            max_item_size: Some(32),
            ..FactoryConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ThresholdExceedsMaxItemSize {
                size_threshold: 64,
                max_item_size: 32,
            })
        );
    }

    #[test]
    fn rejects_nul_in_spool_directory() {
        let config = FactoryConfig {
            spool_directory: Some(PathBuf::from("/tmp/\0uploads")),
            ..FactoryConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSpoolDirectory { .. })
        ));
    }
}
