//! Pooled file readers.
//!
//! A [`BlockReader`] owns a reusable read buffer. The [`ReaderPool`] hands out a
//! fixed number of them; when every reader is checked out, acquisition fails
//! immediately instead of waiting.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::ops::{Deref, DerefMut};
use std::path::Path;

/// Attempts made for a read that fails with a transient error.
const MAX_ATTEMPTS: usize = 3;

fn is_transient(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Reads byte ranges of files into an internal buffer.
#[derive(Debug, Default)]
pub struct BlockReader {
    buf: Vec<u8>,
}

impl BlockReader {
    /// Creates a reader with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the file at `path`.
    pub fn file_size(&self, path: &Path) -> Result<u64> {
        std::fs::metadata(path)
            .map(|m| m.len())
            .map_err(|e| Error::file_io(format!("stat {}: {}", path.display(), e)))
    }

    /// Reads `len` bytes at `offset`. A short read is an error and leaves the
    /// buffer empty.
    pub fn read_at(&mut self, path: &Path, offset: u64, len: usize) -> Result<&[u8]> {
        self.buf.clear();
        self.buf.resize(len, 0);

        let mut last_err = None;
        for _ in 0..MAX_ATTEMPTS {
            match Self::try_read(path, offset, &mut self.buf) {
                Ok(()) => return Ok(&self.buf),
                Err(e) if is_transient(&e) => last_err = Some(e),
                Err(e) => {
                    last_err = Some(e);
                    break;
                }
            }
        }
        self.buf.clear();
        let reason = last_err.map(|e| e.to_string()).unwrap_or_default();
        Err(Error::file_io(format!(
            "read {} bytes at {} from {}: {}",
            len,
            offset,
            path.display(),
            reason
        )))
    }

    /// Reads the whole file.
    pub fn read_all(&mut self, path: &Path) -> Result<&[u8]> {
        let len = self.file_size(path)?;
        let len = usize::try_from(len)
            .map_err(|_| Error::file_io(format!("{} is too large to read", path.display())))?;
        self.read_at(path, 0, len)
    }

    fn try_read(path: &Path, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }
}

/// Fixed-size free list of readers.
#[derive(Debug)]
pub struct ReaderPool {
    free: Mutex<Vec<BlockReader>>,
    capacity: usize,
}

impl ReaderPool {
    /// Creates a pool of `capacity` readers.
    pub fn new(capacity: usize) -> Self {
        let free = (0..capacity).map(|_| BlockReader::new()).collect();
        Self { free: Mutex::new(free), capacity }
    }

    /// Checks out a reader; it returns to the pool when the guard drops.
    pub fn acquire(&self) -> Result<PooledReader<'_>> {
        match self.free.lock().pop() {
            Some(reader) => Ok(PooledReader { pool: self, reader: Some(reader) }),
            None => Err(Error::file_io("No available reader")),
        }
    }

    /// Readers currently checked in.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Total readers owned by the pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A reader checked out of a [`ReaderPool`].
pub struct PooledReader<'a> {
    pool: &'a ReaderPool,
    reader: Option<BlockReader>,
}

impl Deref for PooledReader<'_> {
    type Target = BlockReader;

    fn deref(&self) -> &BlockReader {
        // Only `drop` takes the reader out.
        self.reader.as_ref().unwrap_or_else(|| unreachable!("reader already returned"))
    }
}

impl DerefMut for PooledReader<'_> {
    fn deref_mut(&mut self) -> &mut BlockReader {
        self.reader.as_mut().unwrap_or_else(|| unreachable!("reader already returned"))
    }
}

impl Drop for PooledReader<'_> {
    fn drop(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.buf.clear();
            self.pool.free.lock().push(reader);
        }
    }
}
