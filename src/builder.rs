use std::path::PathBuf;

use crate::{config::FactoryConfig, ConfigError, StorageItemFactory};

/// Builder for configuring a [`StorageItemFactory`].
#[derive(Debug, Clone, Default)]
pub struct StorageItemFactoryBuilder {
    config: FactoryConfig,
}

impl StorageItemFactoryBuilder {
    /// Creates a builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the largest content size, in bytes, that stays in memory.
    pub fn size_threshold(mut self, size_threshold: u64) -> Self {
        self.config.size_threshold = size_threshold;
        self
    }

    /// Sets the directory spool files are created in.
    pub fn spool_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config.spool_directory = Some(directory.into());
        self
    }

    /// Uses the platform temp directory for spool files.
    pub fn platform_spool_directory(mut self) -> Self {
        self.config.spool_directory = None;
        self
    }

    /// Sets the maximum accepted size of a single item.
    pub fn max_item_size(mut self, max_item_size: u64) -> Self {
        self.config.max_item_size = Some(max_item_size);
        self
    }

    /// Replaces the whole configuration snapshot.
    pub fn config(mut self, config: FactoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the current builder configuration snapshot.
    pub fn current_config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Validates the configuration and builds the factory.
    pub fn build(self) -> Result<StorageItemFactory, ConfigError> {
        StorageItemFactory::with_config(self.config)
    }
}
