//! Portable item form and validated restore.
//!
//! The portable form never references the spool file: spooled content is read
//! back and embedded as bytes. On restore the spool directory string is
//! untrusted input; it is checked lexically before any filesystem call and
//! then resolved, and an unusable directory fails the restore outright.

use bytes::{Bytes, BytesMut};
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::{
    item::{Content, ItemState},
    spool, StorageItem, StorageItemError,
};

/// Serializable snapshot of a [`StorageItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedItem {
    /// Multipart field name.
    pub field_name: String,
    /// Declared content type.
    pub content_type: String,
    /// Plain form field flag.
    pub is_form_field: bool,
    /// Client-supplied file name.
    pub file_name: Option<String>,
    /// Spill threshold in bytes.
    pub size_threshold: u64,
    /// Absolute spool directory path; absent for the platform temp directory.
    pub spool_directory: Option<String>,
    /// Maximum accepted item size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_item_size: Option<u64>,
    /// Item content; absent when the item held no data.
    pub content: Option<Bytes>,
}

impl StorageItem {
    /// Captures this item in its portable form, reading spooled content back from disk.
    pub fn snapshot(&self) -> Result<SerializedItem, StorageItemError> {
        if self.state == ItemState::Disposed {
            return Err(StorageItemError::Disposed);
        }

        let spool_directory = match &self.spool_directory {
            Some(directory) => {
                let absolute = spool::absolutize(directory)?;
                let raw = absolute
                    .to_str()
                    .ok_or_else(|| StorageItemError::InvalidPath {
                        path: absolute.to_string_lossy().into_owned(),
                        reason: "path is not valid UTF-8",
                    })?;
                Some(raw.to_owned())
            }
            None => None,
        };

        let content = if self.written_size > 0 {
            Some(self.get_bytes()?)
        } else {
            None
        };

        Ok(SerializedItem {
            field_name: self.field_name.clone(),
            content_type: self.content_type.clone(),
            is_form_field: self.is_form_field,
            file_name: self.file_name.clone(),
            size_threshold: self.size_threshold,
            spool_directory,
            max_item_size: self.max_item_size,
            content,
        })
    }

    /// Rebuilds an item from its portable form.
    ///
    /// A spool directory containing a NUL character, a relative path or a
    /// `..` component fails with [`StorageItemError::InvalidPath`] before the
    /// filesystem is touched. A path that is missing or is not a directory
    /// fails with [`StorageItemError::Io`]. The restored item holds its content
    /// in memory and stays writable; a later spill re-validates the directory.
    pub fn restore(serialized: SerializedItem) -> Result<Self, StorageItemError> {
        let SerializedItem {
            field_name,
            content_type,
            is_form_field,
            file_name,
            size_threshold,
            spool_directory,
            max_item_size,
            content,
        } = serialized;

        let spool_directory = match spool_directory {
            Some(raw) => {
                let directory = spool::parse_restored_directory(&raw)?;
                spool::ensure_directory(&directory)?;
                Some(directory)
            }
            None => None,
        };

        let content = content.unwrap_or_default();
        if let Some(max_item_size) = max_item_size {
            if content.len() as u64 > max_item_size {
                return Err(StorageItemError::ItemSizeLimitExceeded {
                    field: field_name,
                    max_item_size,
                });
            }
        }

        let written_size = content.len() as u64;
        debug!(field = %field_name, size = written_size, "restored storage item");
        Ok(Self {
            field_name,
            content_type,
            is_form_field,
            file_name,
            size_threshold,
            spool_directory,
            max_item_size,
            state: ItemState::Writable,
            content: Content::Memory(BytesMut::from(&content[..])),
            written_size,
            spilled: false,
        })
    }
}

impl TryFrom<SerializedItem> for StorageItem {
    type Error = StorageItemError;

    fn try_from(serialized: SerializedItem) -> Result<Self, Self::Error> {
        Self::restore(serialized)
    }
}

impl Serialize for StorageItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.snapshot()
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StorageItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let serialized = SerializedItem::deserialize(deserializer)?;
        Self::restore(serialized).map_err(de::Error::custom)
    }
}
