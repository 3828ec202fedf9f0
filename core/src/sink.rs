use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A writable target for flushed blocks.
///
/// Blocks never own the sink. It is lent to a block only for the duration of
/// that block's flush.
pub trait ByteSink {
    /// Write all of `bytes` starting at `byte_offset` from the beginning of the
    /// file.
    fn write_at(&mut self, bytes: &[u8], byte_offset: u64) -> io::Result<()>;

    /// Push any buffered bytes down to the underlying storage.
    fn flush(&mut self) -> io::Result<()>;
}

/// A type that creates the backing storage for a file.
pub trait Storage {
    /// The sink handed out for each created file.
    type Sink: ByteSink;

    /// Create the file at `path`, truncating it if it already exists.
    fn create_or_truncate(&mut self, path: &Path) -> io::Result<Self::Sink>;

    /// Delete the file at `path`. A file that does not exist is not an error.
    fn remove(&mut self, path: &Path) -> io::Result<()>;
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn write_at(&mut self, bytes: &[u8], byte_offset: u64) -> io::Result<()> {
        (**self).write_at(bytes, byte_offset)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

impl<S: ByteSink + ?Sized> ByteSink for Box<S> {
    fn write_at(&mut self, bytes: &[u8], byte_offset: u64) -> io::Result<()> {
        (**self).write_at(bytes, byte_offset)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An in-memory sink. Clones share the same contents, so a clone kept by the
/// caller can inspect what a file wrote after the file is closed.
#[derive(Debug, Clone, Default)]
pub struct MemSink {
    bytes: Arc<Mutex<Vec<u8>>>,
    fail_writes: Arc<Mutex<bool>>,
    num_flushes: Arc<Mutex<usize>>,
}

impl MemSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every byte written so far.
    pub fn bytes(&self) -> Vec<u8> {
        lock(&self.bytes).clone()
    }

    /// The written bytes decoded as native-endian `i16` samples.
    pub fn samples(&self) -> Vec<i16> {
        lock(&self.bytes)
            .chunks_exact(2)
            .map(|b| i16::from_ne_bytes([b[0], b[1]]))
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.bytes).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.bytes).is_empty()
    }

    /// The number of times `flush()` was called on this sink.
    pub fn num_flushes(&self) -> usize {
        *lock(&self.num_flushes)
    }

    /// Make every following `write_at()` and `flush()` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        *lock(&self.fail_writes) = fail;
    }

    fn check_failing(&self) -> io::Result<()> {
        if *lock(&self.fail_writes) {
            Err(io::Error::new(io::ErrorKind::Other, "mem sink write failure"))
        } else {
            Ok(())
        }
    }
}

impl ByteSink for MemSink {
    fn write_at(&mut self, bytes: &[u8], byte_offset: u64) -> io::Result<()> {
        self.check_failing()?;

        let start = usize::try_from(byte_offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset too large"))?;
        let end = start + bytes.len();

        let mut buf = lock(&self.bytes);
        if buf.len() < end {
            buf.resize(end, 0);
        }
        buf[start..end].copy_from_slice(bytes);

        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check_failing()?;
        *lock(&self.num_flushes) += 1;
        Ok(())
    }
}

/// An in-memory storage that hands out [`MemSink`]s keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemStorage {
    files: Arc<Mutex<HashMap<PathBuf, MemSink>>>,
    create_failures: Arc<Mutex<usize>>,
    num_removes: Arc<Mutex<usize>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls to `create_or_truncate()` fail.
    pub fn fail_next_creates(&self, n: usize) {
        *lock(&self.create_failures) = n;
    }

    /// The sink that was created for `path`, if any.
    pub fn file(&self, path: impl AsRef<Path>) -> Option<MemSink> {
        lock(&self.files).get(path.as_ref()).cloned()
    }

    /// The number of times `remove()` was called.
    pub fn num_removes(&self) -> usize {
        *lock(&self.num_removes)
    }
}

impl Storage for MemStorage {
    type Sink = MemSink;

    fn create_or_truncate(&mut self, path: &Path) -> io::Result<MemSink> {
        {
            let mut failures = lock(&self.create_failures);
            if *failures > 0 {
                *failures -= 1;
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "mem storage create failure",
                ));
            }
        }

        let sink = MemSink::new();
        lock(&self.files).insert(path.to_path_buf(), sink.clone());
        Ok(sink)
    }

    fn remove(&mut self, path: &Path) -> io::Result<()> {
        *lock(&self.num_removes) += 1;
        lock(&self.files).remove(path);
        Ok(())
    }
}
