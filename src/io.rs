//! Byte stream contracts used by the parser and the writer.
//!
//! Reads are positional so the same source can be shared by the document,
//! the availability checker and the incremental writer. Writes are
//! sequential and report failure as `false`, matching the callback shape
//! hosts provide for saving.

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;

/// Random-access byte source.
pub trait SeekableReadStream {
    /// Total size in bytes.
    fn get_size(&self) -> u64;

    /// Position of the last read, for streams that track one.
    fn get_position(&self) -> u64 {
        0
    }

    /// Fill `buffer` from `offset`. Returns `false` if the range cannot be read.
    fn read_block_at_offset(&self, buffer: &mut [u8], offset: u64) -> bool;
}

/// Sequential byte sink.
pub trait WriteStream {
    /// Append `data`. Returns `false` on failure.
    fn write_block(&mut self, data: &[u8]) -> bool;

    /// Flush buffered output.
    fn flush(&mut self) -> bool {
        true
    }
}

/// In-memory stream usable as both source and sink.
#[derive(Debug, Default, Clone)]
pub struct MemoryStream {
    data: Vec<u8>,
    position: Cell<u64>,
}

impl MemoryStream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing bytes.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            position: Cell::new(0),
        }
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the stream and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl SeekableReadStream for MemoryStream {
    fn get_size(&self) -> u64 {
        self.data.len() as u64
    }

    fn get_position(&self) -> u64 {
        self.position.get()
    }

    fn read_block_at_offset(&self, buffer: &mut [u8], offset: u64) -> bool {
        let Ok(start) = usize::try_from(offset) else {
            return false;
        };
        let Some(end) = start.checked_add(buffer.len()) else {
            return false;
        };
        if end > self.data.len() {
            return false;
        }
        buffer.copy_from_slice(&self.data[start..end]);
        self.position.set(end as u64);
        true
    }
}

impl WriteStream for MemoryStream {
    fn write_block(&mut self, data: &[u8]) -> bool {
        self.data.extend_from_slice(data);
        self.position.set(self.data.len() as u64);
        true
    }
}

/// File-backed stream.
#[derive(Debug)]
pub struct FileStream {
    file: RefCell<File>,
    size: u64,
    position: Cell<u64>,
}

impl FileStream {
    /// Open `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_file(file)
    }

    /// Create (or truncate) `path` for writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Self::from_file(file)
    }

    /// Wrap an open file.
    pub fn from_file(file: File) -> Result<Self> {
        let size = file.metadata()?.len();
        Ok(Self {
            file: RefCell::new(file),
            size,
            position: Cell::new(0),
        })
    }
}

impl SeekableReadStream for FileStream {
    fn get_size(&self) -> u64 {
        self.size
    }

    fn get_position(&self) -> u64 {
        self.position.get()
    }

    fn read_block_at_offset(&self, buffer: &mut [u8], offset: u64) -> bool {
        if offset.checked_add(buffer.len() as u64).map_or(true, |end| end > self.size) {
            return false;
        }
        let mut file = self.file.borrow_mut();
        let ok = file.seek(SeekFrom::Start(offset)).is_ok() && file.read_exact(buffer).is_ok();
        if ok {
            self.position.set(offset + buffer.len() as u64);
        }
        ok
    }
}

impl WriteStream for FileStream {
    fn write_block(&mut self, data: &[u8]) -> bool {
        let file = self.file.get_mut();
        if file.write_all(data).is_err() {
            log::error!("Failed to write {} bytes", data.len());
            return false;
        }
        self.size += data.len() as u64;
        self.position.set(self.size);
        true
    }

    fn flush(&mut self) -> bool {
        self.file.get_mut().flush().is_ok()
    }
}

/// Adapter turning a closure into a [`WriteStream`].
///
/// The closure receives each block and returns `false` to abort the save.
pub struct WriteCallback<F>
where
    F: FnMut(&[u8]) -> bool,
{
    callback: F,
}

impl<F> WriteCallback<F>
where
    F: FnMut(&[u8]) -> bool,
{
    /// Wrap `callback`.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> WriteStream for WriteCallback<F>
where
    F: FnMut(&[u8]) -> bool,
{
    fn write_block(&mut self, data: &[u8]) -> bool {
        (self.callback)(data)
    }
}

/// Write stream wrapper that tracks the number of bytes written.
///
/// Cross-reference offsets are taken from [`offset`](Self::offset).
/// The first failed write sticks: later writes are skipped.
pub struct CountingWriter<'a> {
    inner: &'a mut dyn WriteStream,
    offset: u64,
    failed: bool,
}

impl<'a> CountingWriter<'a> {
    /// Start counting at `offset` (the size of any prefix already written).
    pub fn new(inner: &'a mut dyn WriteStream, offset: u64) -> Self {
        Self {
            inner,
            offset,
            failed: false,
        }
    }

    /// Current output offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// True once any write has failed.
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Write `data`, returning `false` if this or an earlier write failed.
    pub fn write(&mut self, data: &[u8]) -> bool {
        if self.failed {
            return false;
        }
        if data.is_empty() {
            return true;
        }
        if !self.inner.write_block(data) {
            self.failed = true;
            return false;
        }
        self.offset += data.len() as u64;
        true
    }

    /// Write a string.
    pub fn write_str(&mut self, s: &str) -> bool {
        self.write(s.as_bytes())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> bool {
        !self.failed && self.inner.flush()
    }
}

/// Read the whole of `stream` into memory.
pub fn read_all(stream: &dyn SeekableReadStream) -> Option<Vec<u8>> {
    let size = usize::try_from(stream.get_size()).ok()?;
    let mut buffer = vec![0u8; size];
    stream.read_block_at_offset(&mut buffer, 0).then_some(buffer)
}

/// Read up to `len` bytes at `offset`, clamped to the end of `stream`.
pub fn read_range(stream: &dyn SeekableReadStream, offset: u64, len: u64) -> Option<Vec<u8>> {
    let size = stream.get_size();
    if offset > size {
        return None;
    }
    let len = usize::try_from(len.min(size - offset)).ok()?;
    let mut buffer = vec![0u8; len];
    stream.read_block_at_offset(&mut buffer, offset).then_some(buffer)
}
