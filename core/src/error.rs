use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// An error opening, writing, or closing a [`SequentialBlockFile`].
///
/// [`SequentialBlockFile`]: crate::SequentialBlockFile
#[derive(Debug, Error)]
pub enum BlockFileError {
    /// The file was never opened, failed to open, or has already been closed.
    #[error("the block file is not open")]
    NotOpen,
    /// `open()` was called on a file that is already open.
    #[error("the block file is already open")]
    AlreadyOpen,
    /// The options given to the file are unusable.
    #[error("invalid block file options: {0}")]
    InvalidOptions(&'static str),
    /// The channel index is not less than the number of channels in the file.
    #[error("channel {channel} is out of range for a file with {num_channels} channels")]
    InvalidChannel { channel: usize, num_channels: usize },
    /// The write targets a position that has already been evicted from the
    /// resident window. This happens when one channel falls further behind the
    /// others than the window can hold.
    ///
    /// If this is returned, then nothing was written and the window was not
    /// modified.
    #[error(
        "channel {channel} wrote at frame {start_pos}, but the first resident frame is {first_resident}"
    )]
    WindowUnderrun {
        channel: usize,
        start_pos: u64,
        first_resident: u64,
    },
    /// The backing storage could not be created, even after deleting and
    /// re-creating it once.
    #[error("could not create {path:?}: {source}")]
    StorageCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A write segment does not fit inside a block.
    #[error(
        "write of {len} frames at local frame {local_frame} (channel {channel}) overruns a block of {samples_per_block} frames"
    )]
    BoundsViolation {
        channel: usize,
        local_frame: usize,
        len: usize,
        samples_per_block: usize,
    },
    /// Writing a block (or the final sink flush) to the backing storage failed.
    #[error("failed to flush block at frame {offset}: {source}")]
    FlushFailure {
        offset: u64,
        #[source]
        source: io::Error,
    },
}

impl BlockFileError {
    /// Whether the file can no longer be written to after this error.
    ///
    /// Errors that only reject a single write (underruns, bad channels,
    /// overruns) are not fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BlockFileError::NotOpen
                | BlockFileError::StorageCreate { .. }
                | BlockFileError::FlushFailure { .. }
        )
    }
}
