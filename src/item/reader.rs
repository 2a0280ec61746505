use std::{
    fs::File,
    io::{self, BufRead, BufReader, Cursor, Read},
};

use bytes::Bytes;

/// Reader over the content of a [`StorageItem`](crate::StorageItem).
///
/// Each reader is independent; the caller owns it and closes it by dropping.
#[derive(Debug)]
pub struct ContentReader {
    inner: ReaderInner,
}

#[derive(Debug)]
enum ReaderInner {
    Memory(Cursor<Bytes>),
    File(BufReader<File>),
}

impl ContentReader {
    pub(crate) fn memory(bytes: Bytes) -> Self {
        Self {
            inner: ReaderInner::Memory(Cursor::new(bytes)),
        }
    }

    pub(crate) fn file(file: File) -> Self {
        Self {
            inner: ReaderInner::File(BufReader::new(file)),
        }
    }

    /// Returns `true` when this reader streams from a spool file.
    pub fn is_spooled(&self) -> bool {
        matches!(self.inner, ReaderInner::File(_))
    }
}

impl Read for ContentReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            ReaderInner::Memory(cursor) => cursor.read(buf),
            ReaderInner::File(reader) => reader.read(buf),
        }
    }
}

impl BufRead for ContentReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match &mut self.inner {
            ReaderInner::Memory(cursor) => cursor.fill_buf(),
            ReaderInner::File(reader) => reader.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match &mut self.inner {
            ReaderInner::Memory(cursor) => cursor.consume(amt),
            ReaderInner::File(reader) => reader.consume(amt),
        }
    }
}
