//! Upload item that keeps small content in memory and spools large content to disk.
//!
//! An item moves through [`ItemState::Writable`], [`ItemState::Finalized`] and
//! [`ItemState::Disposed`], in that order only. It expects a single writer; once
//! finalized, any number of readers may open independent streams over it.

use std::{
    fmt,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::{spool, StorageItemError};

/// Streaming reader over item content.
pub mod reader;
/// Write sink feeding an item.
pub mod sink;

pub use reader::ContentReader;
pub use sink::WriteSink;

/// Lifecycle state of a [`StorageItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    /// Accepting writes through a [`WriteSink`].
    Writable,
    /// Sink closed; the item is read-only.
    Finalized,
    /// Spool file removed and buffers released; the item is unusable.
    Disposed,
}

pub(crate) enum Content {
    Memory(BytesMut),
    Spooled {
        path: PathBuf,
        file: Option<File>,
        cache: Option<Bytes>,
    },
    Cleared,
}

/// One uploaded field or file whose storage is chosen by size.
///
/// Content up to and including `size_threshold` bytes stays in memory. The
/// first write that crosses the threshold creates a spool file, flushes the
/// buffered bytes into it and sends every later byte straight to disk. The
/// switch happens at most once.
pub struct StorageItem {
    pub(crate) field_name: String,
    pub(crate) content_type: String,
    pub(crate) is_form_field: bool,
    pub(crate) file_name: Option<String>,
    pub(crate) size_threshold: u64,
    pub(crate) spool_directory: Option<PathBuf>,
    pub(crate) max_item_size: Option<u64>,
    pub(crate) state: ItemState,
    pub(crate) content: Content,
    pub(crate) written_size: u64,
    pub(crate) spilled: bool,
}

impl StorageItem {
    pub(crate) fn new(
        field_name: String,
        content_type: String,
        is_form_field: bool,
        file_name: Option<String>,
        size_threshold: u64,
        spool_directory: Option<PathBuf>,
        max_item_size: Option<u64>,
    ) -> Self {
        Self {
            field_name,
            content_type,
            is_form_field,
            file_name,
            size_threshold,
            spool_directory,
            max_item_size,
            state: ItemState::Writable,
            content: Content::Memory(BytesMut::new()),
            written_size: 0,
            spilled: false,
        }
    }

    /// Opens the write sink for this item.
    ///
    /// While the item is writable this may be called repeatedly; every sink
    /// appends to the same content. Fails once the item has been finalized.
    pub fn open_write_sink(&mut self) -> Result<WriteSink<'_>, StorageItemError> {
        match self.state {
            ItemState::Writable => Ok(WriteSink::new(self)),
            ItemState::Finalized => Err(StorageItemError::AlreadyFinalized),
            ItemState::Disposed => Err(StorageItemError::Disposed),
        }
    }

    /// Alias of [`StorageItem::open_write_sink`].
    pub fn output_stream(&mut self) -> Result<WriteSink<'_>, StorageItemError> {
        self.open_write_sink()
    }

    /// Returns the multipart field name.
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Replaces the multipart field name.
    pub fn set_field_name(&mut self, field_name: impl Into<String>) {
        self.field_name = field_name.into();
    }

    /// Returns the declared content type, possibly empty.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Parses the declared content type, if it is a valid MIME type.
    pub fn content_mime(&self) -> Option<mime::Mime> {
        self.content_type.parse().ok()
    }

    /// Returns the `charset` parameter of the content type, if any.
    pub fn charset(&self) -> Option<String> {
        self.content_mime()
            .and_then(|parsed| parsed.get_param(mime::CHARSET).map(|value| value.as_str().to_owned()))
    }

    /// Returns `true` for plain form fields, `false` for file uploads.
    pub fn is_form_field(&self) -> bool {
        self.is_form_field
    }

    /// Marks this item as a plain form field or a file upload.
    pub fn set_form_field(&mut self, is_form_field: bool) {
        self.is_form_field = is_form_field;
    }

    /// Returns the client-supplied file name, unvalidated.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Returns the spill threshold in bytes.
    pub fn size_threshold(&self) -> u64 {
        self.size_threshold
    }

    /// Returns the configured spool directory; `None` means the platform temp directory.
    pub fn spool_directory(&self) -> Option<&Path> {
        self.spool_directory.as_deref()
    }

    /// Returns the maximum accepted item size, if limited.
    pub fn max_item_size(&self) -> Option<u64> {
        self.max_item_size
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ItemState {
        self.state
    }

    /// Returns `true` if the content never spilled to disk.
    ///
    /// Still reflects the spill after [`StorageItem::dispose`].
    pub fn is_in_memory(&self) -> bool {
        !self.spilled
    }

    /// Returns the number of bytes accepted so far.
    pub fn size(&self) -> u64 {
        self.written_size
    }

    /// Returns the spool file location once the item has spilled.
    pub fn spool_path(&self) -> Option<&Path> {
        match &self.content {
            Content::Spooled { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Returns an owned copy of the full content.
    ///
    /// Spooled content is read from disk unless [`StorageItem::materialize`]
    /// already cached it.
    pub fn get_bytes(&self) -> Result<Bytes, StorageItemError> {
        match &self.content {
            Content::Memory(buffer) => Ok(Bytes::copy_from_slice(buffer)),
            Content::Spooled {
                cache: Some(cache), ..
            } => Ok(cache.clone()),
            Content::Spooled { path, .. } => Ok(Bytes::from(fs::read(path)?)),
            Content::Cleared => Err(StorageItemError::Disposed),
        }
    }

    /// Reads spooled content once and keeps it cached for later reads.
    ///
    /// Only finalized items are cached, since a writable item may still grow.
    pub fn materialize(&mut self) -> Result<Bytes, StorageItemError> {
        if self.state == ItemState::Finalized {
            if let Content::Spooled { path, cache, .. } = &mut self.content {
                if cache.is_none() {
                    let bytes = Bytes::from(fs::read(path.as_path())?);
                    *cache = Some(bytes.clone());
                    return Ok(bytes);
                }
            }
        }
        self.get_bytes()
    }

    /// Opens an independent reader positioned at the start of the content.
    pub fn input_stream(&self) -> Result<ContentReader, StorageItemError> {
        match &self.content {
            Content::Memory(buffer) => Ok(ContentReader::memory(Bytes::copy_from_slice(buffer))),
            Content::Spooled {
                cache: Some(cache), ..
            } => Ok(ContentReader::memory(cache.clone())),
            Content::Spooled { path, .. } => Ok(ContentReader::file(File::open(path)?)),
            Content::Cleared => Err(StorageItemError::Disposed),
        }
    }

    /// Decodes the content using the declared `charset`.
    ///
    /// Without a charset the content is decoded as UTF-8. `us-ascii` and
    /// `iso-8859-1` are also supported; any other charset fails with
    /// [`io::ErrorKind::InvalidData`].
    pub fn text(&self) -> Result<String, StorageItemError> {
        let bytes = self.get_bytes()?;
        let charset = self.charset().map(|value| value.to_ascii_lowercase());
        match charset.as_deref() {
            None | Some("utf-8" | "utf8") => String::from_utf8(bytes.to_vec())
                .map_err(|err| invalid_data(err.to_string())),
            Some("us-ascii" | "ascii") => {
                if bytes.is_ascii() {
                    Ok(bytes.iter().map(|&byte| char::from(byte)).collect())
                } else {
                    Err(invalid_data("content is not valid US-ASCII".to_owned()))
                }
            }
            Some("iso-8859-1" | "latin1") => Ok(bytes.iter().map(|&byte| char::from(byte)).collect()),
            Some(other) => Err(invalid_data(format!("unsupported charset `{other}`"))),
        }
    }

    /// Copies the content to `destination`, leaving the spool file in place.
    pub fn write_to(&self, destination: impl AsRef<Path>) -> Result<u64, StorageItemError> {
        let destination = destination.as_ref();
        match &self.content {
            Content::Spooled {
                path, cache: None, ..
            } => Ok(fs::copy(path, destination)?),
            Content::Cleared => Err(StorageItemError::Disposed),
            _ => {
                let bytes = self.get_bytes()?;
                fs::write(destination, &bytes)?;
                Ok(bytes.len() as u64)
            }
        }
    }

    /// Deletes the spool file, if any, and releases buffered content.
    ///
    /// Idempotent. A failed deletion is logged and otherwise ignored.
    pub fn dispose(&mut self) {
        if self.state == ItemState::Disposed {
            return;
        }

        if let Content::Spooled { path, file, .. } =
            std::mem::replace(&mut self.content, Content::Cleared)
        {
            drop(file);
            match fs::remove_file(&path) {
                Ok(()) => debug!(field = %self.field_name, path = %path.display(), "removed spool file"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!(
                    field = %self.field_name,
                    path = %path.display(),
                    error = %err,
                    "failed to remove spool file"
                ),
            }
        }

        self.content = Content::Cleared;
        self.state = ItemState::Disposed;
    }

    /// Appends one chunk, spilling to disk if it crosses the threshold.
    ///
    /// A chunk is accepted whole or not at all as far as `size()` is concerned.
    pub(crate) fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StorageItemError> {
        self.ensure_writable()?;
        if chunk.is_empty() {
            return Ok(());
        }

        let next = self.written_size.saturating_add(chunk.len() as u64);
        if let Some(max_item_size) = self.max_item_size {
            if next > max_item_size {
                return Err(StorageItemError::ItemSizeLimitExceeded {
                    field: self.field_name.clone(),
                    max_item_size,
                });
            }
        }

        if matches!(self.content, Content::Memory(_)) && next > self.size_threshold {
            self.spill()?;
        }

        match &mut self.content {
            Content::Memory(buffer) => buffer.extend_from_slice(chunk),
            Content::Spooled {
                file: Some(file), ..
            } => file.write_all(chunk)?,
            Content::Spooled { file: None, .. } => {
                return Err(StorageItemError::Io(io::Error::other(
                    "spool file handle already released",
                )))
            }
            Content::Cleared => return Err(StorageItemError::Disposed),
        }

        self.written_size = next;
        Ok(())
    }

    pub(crate) fn flush_spool(&mut self) -> Result<(), StorageItemError> {
        if let Content::Spooled {
            file: Some(file), ..
        } = &mut self.content
        {
            file.flush()?;
        }
        Ok(())
    }

    /// Closes the write side: flushes and releases the spool file handle.
    pub(crate) fn finalize(&mut self) -> Result<(), StorageItemError> {
        self.ensure_writable()?;
        if let Content::Spooled { file, .. } = &mut self.content {
            if let Some(handle) = file.as_mut() {
                handle.flush()?;
            }
            *file = None;
        }

        self.state = ItemState::Finalized;
        debug!(
            field = %self.field_name,
            size = self.written_size,
            in_memory = self.is_in_memory(),
            "storage item finalized"
        );
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), StorageItemError> {
        match self.state {
            ItemState::Writable => Ok(()),
            ItemState::Finalized => Err(StorageItemError::AlreadyFinalized),
            ItemState::Disposed => Err(StorageItemError::Disposed),
        }
    }

    /// Moves buffered content into a new spool file.
    ///
    /// On failure the item keeps its in-memory content and no file is left behind.
    fn spill(&mut self) -> Result<(), StorageItemError> {
        let configured = self
            .spool_directory
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let directory =
            spool::absolutize(&configured).map_err(|source| StorageItemError::SpoolCreation {
                directory: configured.clone(),
                source,
            })?;
        let Content::Memory(buffer) = &self.content else {
            return Ok(());
        };
        let (path, mut file) = spool::create_spool_file(&directory)?;
        if let Err(err) = file.write_all(buffer) {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&path) {
                warn!(
                    field = %self.field_name,
                    path = %path.display(),
                    error = %cleanup,
                    "failed to remove partial spool file"
                );
            }
            return Err(err.into());
        }

        debug!(
            field = %self.field_name,
            path = %path.display(),
            flushed = buffer.len(),
            "spilled storage item to disk"
        );
        self.content = Content::Spooled {
            path,
            file: Some(file),
            cache: None,
        };
        self.spilled = true;
        Ok(())
    }
}

impl fmt::Debug for StorageItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageItem")
            .field("field_name", &self.field_name)
            .field("content_type", &self.content_type)
            .field("is_form_field", &self.is_form_field)
            .field("file_name", &self.file_name)
            .field("size_threshold", &self.size_threshold)
            .field("state", &self.state)
            .field("size", &self.written_size)
            .field("spool_path", &self.spool_path())
            .finish()
    }
}

impl Drop for StorageItem {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn invalid_data(message: String) -> StorageItemError {
    StorageItemError::Io(io::Error::new(io::ErrorKind::InvalidData, message))
}
