use std::io::{self, Read, Write};

use crate::{StorageItem, StorageItemError};

const COPY_BUFFER_SIZE: usize = 8 * 1024;

/// Write side of a [`StorageItem`].
///
/// Writes are applied in call order. Each call is handed to the item
/// unbuffered, so wrap the sink in a `BufWriter` when feeding many tiny
/// writes into a spooled item. Dropping the sink without [`WriteSink::close`]
/// leaves the item writable.
#[derive(Debug)]
pub struct WriteSink<'a> {
    item: &'a mut StorageItem,
}

impl<'a> WriteSink<'a> {
    pub(crate) fn new(item: &'a mut StorageItem) -> Self {
        Self { item }
    }

    /// Appends a chunk, reporting failures as [`StorageItemError`].
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StorageItemError> {
        self.item.write_chunk(chunk)
    }

    /// Streams everything from `reader` into the item and returns the byte count.
    pub fn copy_from<R: Read>(&mut self, mut reader: R) -> Result<u64, StorageItemError> {
        let mut buffer = vec![0_u8; COPY_BUFFER_SIZE];
        let mut copied = 0_u64;
        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => return Ok(copied),
                Ok(read) => read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            self.item.write_chunk(&buffer[..read])?;
            copied += read as u64;
        }
    }

    /// Returns the number of bytes the item has accepted so far.
    pub fn written(&self) -> u64 {
        self.item.size()
    }

    /// Returns `true` while the item has not spilled to disk.
    pub fn is_in_memory(&self) -> bool {
        self.item.is_in_memory()
    }

    /// Finalizes the item: flushes and releases the spool file handle.
    ///
    /// The spool file itself is kept until the item is disposed.
    pub fn close(self) -> Result<(), StorageItemError> {
        self.item.finalize()
    }
}

impl Write for WriteSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.item
            .write_chunk(buf)
            .map_err(StorageItemError::into_io)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.item.flush_spool().map_err(StorageItemError::into_io)
    }
}
