#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(clippy::missing_panics_doc)]
#![warn(clippy::clone_on_ref_ptr)]
#![deny(trivial_numeric_casts)]
#![forbid(unsafe_code)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use seqblock_core::{ByteSink, Storage};
use tracing::debug;

#[cfg(test)]
mod tests;

/// Creates block files on the local filesystem.
#[derive(Debug, Clone, Copy)]
pub struct FsStorage {
    /// The size of the write buffer in front of each file.
    pub buffer_size: usize,

    /// Create missing parent directories when creating a file.
    pub create_dirs: bool,

    /// Call `sync_data()` on the file every time the sink is flushed.
    pub sync_on_flush: bool,
}

impl FsStorage {
    pub const DEFAULT_BUFFER_SIZE: usize = 131072;

    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for FsStorage {
    fn default() -> Self {
        Self {
            buffer_size: Self::DEFAULT_BUFFER_SIZE,
            create_dirs: true,
            sync_on_flush: false,
        }
    }
}

impl Storage for FsStorage {
    type Sink = FsSink;

    fn create_or_truncate(&mut self, path: &Path) -> io::Result<FsSink> {
        if self.create_dirs {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(path)?;

        debug!(?path, "created file");

        Ok(FsSink {
            writer: BufWriter::with_capacity(self.buffer_size, file),
            path: path.to_path_buf(),
            position: 0,
            sync_on_flush: self.sync_on_flush,
        })
    }

    fn remove(&mut self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// A buffered, positioned writer into one file.
///
/// Consecutive writes are appended through the buffer. A write anywhere else
/// flushes the buffer and seeks first.
#[derive(Debug)]
pub struct FsSink {
    writer: BufWriter<File>,
    path: PathBuf,
    position: u64,
    sync_on_flush: bool,
}

impl FsSink {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The byte offset the next sequential write would land at.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl ByteSink for FsSink {
    fn write_at(&mut self, bytes: &[u8], byte_offset: u64) -> io::Result<()> {
        if byte_offset != self.position {
            // Seeking a `BufWriter` flushes it first.
            self.writer.seek(SeekFrom::Start(byte_offset))?;
            self.position = byte_offset;
        }

        self.writer.write_all(bytes)?;
        self.position += bytes.len() as u64;

        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()?;

        if self.sync_on_flush {
            self.writer.get_ref().sync_data()?;
        }

        Ok(())
    }
}
