use crate::{config::FactoryConfig, ConfigError, StorageItem, StorageItemFactoryBuilder};

/// Creates [`StorageItem`]s that share one spill configuration.
///
/// The factory is immutable once built and can be shared across threads. It
/// has no part in an item's lifecycle after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageItemFactory {
    config: FactoryConfig,
}

impl StorageItemFactory {
    /// Creates a fluent builder with default settings.
    pub fn builder() -> StorageItemFactoryBuilder {
        StorageItemFactoryBuilder::default()
    }

    /// Creates a factory from explicit, validated configuration.
    pub fn with_config(config: FactoryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Returns the spill threshold in bytes.
    pub fn size_threshold(&self) -> u64 {
        self.config.size_threshold
    }

    /// Creates a new item in the writable state.
    pub fn create_item(
        &self,
        field_name: impl Into<String>,
        content_type: impl Into<String>,
        is_form_field: bool,
        file_name: Option<&str>,
    ) -> StorageItem {
        StorageItem::new(
            field_name.into(),
            content_type.into(),
            is_form_field,
            file_name.map(ToOwned::to_owned),
            self.config.size_threshold,
            self.config.spool_directory.clone(),
            self.config.max_item_size,
        )
    }
}
