use thiserror::Error;

use crate::BlockFileError;

/// A fatal error occurred and the stream cannot continue.
#[derive(Debug, Error)]
pub enum FatalWriteError {
    /// The stream is closed and thus cannot continue.
    #[error("stream is closed")]
    StreamClosed,
    /// The file could not be written. The stream cannot continue.
    #[error("fatal file error: {0}")]
    File(#[source] BlockFileError),
}

/// An error writing to a `WriteStream`.
#[derive(Debug, Error)]
pub enum WriteError {
    /// A fatal error occurred. The stream cannot continue.
    #[error("fatal error: {0}")]
    Fatal(#[from] FatalWriteError),
    /// The IO server rejected an earlier write. This happens when a channel
    /// falls further behind the others than the file's window can hold.
    ///
    /// The stream can continue. The data of the rejected write was not
    /// written to the file, but the data of the current call (if any) was.
    #[error("channel {channel} write at frame {start_pos} was rejected: {error}")]
    Rejected {
        channel: usize,
        start_pos: u64,
        #[source]
        error: BlockFileError,
    },
    /// There are no more chunks left in the pool because the server was too
    /// slow applying previous ones. Make sure there are enough chunks
    /// available to the stream.
    ///
    /// If this is returned, then no data in the given buffer will be written
    /// to the file.
    #[error("no more chunks are left in the pool")]
    Underflow,
    /// The given buffer is too long. The length of the buffer cannot exceed
    /// `chunk_len`.
    ///
    /// If this is returned, then no data in the given buffer will be written
    /// to the file.
    #[error("buffer with len {buffer_len} is longer than the chunk length {chunk_len}")]
    ChunkTooLong { buffer_len: usize, chunk_len: usize },
    /// The channel index is out of range of the stream's channels.
    ///
    /// If this is returned, then no data in the given buffer will be written
    /// to the file.
    #[error("channel {channel} is out of range for a stream with {num_channels} channels")]
    InvalidChannel { channel: usize, num_channels: usize },
    /// The message channel to the IO server was full.
    ///
    /// In theory this should not happen, but if it does, try writing again
    /// later.
    ///
    /// If this is returned, then no data in the given buffer will be written
    /// to the file.
    #[error("the message channel to the IO server is full")]
    ServerChannelFull,
}
