#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Transient storage for uploaded items of unknown size.
//!
//! A [`StorageItem`] buffers content in memory until it grows past its size
//! threshold, then spills to a uniquely named spool file and keeps writing
//! there. Readers see the same bytes either way. Items are created by a
//! [`StorageItemFactory`] and can be captured as a [`SerializedItem`] and
//! restored, with the spool directory re-validated on the way back in.
//!
//! All operations are synchronous and run on the caller's thread. An item
//! expects a single writer; finalized items may be read concurrently.

/// Fluent factory builder.
pub mod builder;
/// Factory configuration.
pub mod config;
/// Request-side interface consumed by the storage core.
pub mod context;
/// Error types exposed by this crate.
pub mod error;
/// Item factory.
pub mod factory;
/// Storage item, write sink and reader.
pub mod item;
/// Portable item form and restore validation.
pub mod serialize;

mod spool;

pub use builder::StorageItemFactoryBuilder;
pub use config::{FactoryConfig, DEFAULT_SIZE_THRESHOLD};
pub use context::{store_request_body, HttpRequestContext, RequestContext};
pub use error::{ConfigError, StorageItemError};
pub use factory::StorageItemFactory;
pub use item::{ContentReader, ItemState, StorageItem, WriteSink};
pub use serialize::SerializedItem;
