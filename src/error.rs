use std::{io, path::PathBuf};

use thiserror::Error;

/// Error type used by storage item operations.
#[derive(Debug, Error)]
pub enum StorageItemError {
    /// A write was attempted after the item's sink was closed.
    #[error("storage item is already finalized")]
    AlreadyFinalized,
    /// The spool file could not be created in the spool directory.
    #[error("failed to create spool file in `{}`: {source}", directory.display())]
    SpoolCreation {
        /// Directory the spool file was to be created in.
        directory: PathBuf,
        /// Underlying filesystem failure.
        #[source]
        source: io::Error,
    },
    /// A restored or configured path failed validation before any filesystem access.
    #[error("invalid spool directory path `{}`: {reason}", path.escape_debug())]
    InvalidPath {
        /// Offending path as received.
        path: String,
        /// Human-readable rejection reason.
        reason: &'static str,
    },
    /// General I/O failure while reading, writing or resolving storage.
    #[error("storage item I/O error: {0}")]
    Io(#[from] io::Error),
    /// The item was disposed and can no longer be used.
    #[error("storage item has been disposed")]
    Disposed,
    /// A write would exceed the item's configured maximum size.
    #[error("field `{field}` exceeded maximum item size of {max_item_size} bytes")]
    ItemSizeLimitExceeded {
        /// Field name of the offending item.
        field: String,
        /// Configured size limit.
        max_item_size: u64,
    },
}

impl StorageItemError {
    /// Converts this error into an [`io::Error`] for use behind `std::io` traits.
    ///
    /// Plain I/O errors are returned unchanged; every other variant is wrapped
    /// and can be recovered with [`StorageItemError::from_io`].
    pub fn into_io(self) -> io::Error {
        match self {
            Self::Io(err) => err,
            other => {
                let kind = match &other {
                    Self::AlreadyFinalized | Self::Disposed => io::ErrorKind::BrokenPipe,
                    Self::InvalidPath { .. } => io::ErrorKind::InvalidInput,
                    _ => io::ErrorKind::Other,
                };
                io::Error::new(kind, other)
            }
        }
    }

    /// Recovers a storage item error previously wrapped by [`StorageItemError::into_io`].
    pub fn from_io(err: io::Error) -> Self {
        let is_wrapped = err
            .get_ref()
            .is_some_and(|inner| inner.is::<StorageItemError>());
        if !is_wrapped {
            return Self::Io(err);
        }

        match err.into_inner().map(|inner| inner.downcast::<StorageItemError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(inner)) => Self::Io(io::Error::other(inner)),
            None => Self::Io(io::Error::other("unrecoverable wrapped error")),
        }
    }

    /// Returns `true` when this error means the item was disposed.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }

    /// Returns `true` when this error is a path validation failure.
    pub fn is_invalid_path(&self) -> bool {
        matches!(self, Self::InvalidPath { .. })
    }
}

/// Factory configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A maximum item size of zero accepts no content at all.
    #[error("max_item_size must be greater than zero")]
    ZeroMaxItemSize,
    /// The spill threshold is larger than the maximum item size.
    #[error("size_threshold ({size_threshold}) exceeds max_item_size ({max_item_size})")]
    ThresholdExceedsMaxItemSize {
        /// Configured spill threshold.
        size_threshold: u64,
        /// Configured maximum item size.
        max_item_size: u64,
    },
    /// The configured spool directory failed path validation.
    #[error("invalid spool directory: {reason}")]
    InvalidSpoolDirectory {
        /// Human-readable rejection reason.
        reason: &'static str,
    },
}
