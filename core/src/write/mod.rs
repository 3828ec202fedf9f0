//! A realtime-friendly front end that moves a [`SequentialBlockFile`] onto its
//! own IO thread.
//!
//! The client copies each channel write into a preallocated chunk and pushes it
//! through a lock-free ring buffer. The server thread applies the writes to the
//! file in the order they were pushed and hands the chunks back to be reused.
//!
//! [`SequentialBlockFile`]: crate::SequentialBlockFile

mod data;
mod server;
mod write_stream;

pub mod error;

use std::time::Duration;

pub use data::WriteChunk;
pub use error::{FatalWriteError, WriteError};
pub use write_stream::WriteStream;

use data::HeapData;
use server::WriteServer;

use crate::{BlockFileError, BlockFileOptions};

pub(crate) enum ServerToClientMsg {
    NewChunk {
        chunk: WriteChunk,
    },
    Rejected {
        chunk: WriteChunk,
        error: BlockFileError,
    },
    Finished,
    FatalError(BlockFileError),
}

pub(crate) enum ClientToServerMsg {
    Write { chunk: WriteChunk },
    FinishFile,
}

/// Options for a write stream.
#[derive(Debug, Clone, Copy)]
pub struct WriteStreamOptions {
    /// Options for the file the stream writes into.
    pub file: BlockFileOptions,

    /// The number of chunks to reserve. Each call to `WriteStream::write()`
    /// uses one chunk until the IO server has applied it, so this must be large
    /// enough to cover the worst case write latency.
    ///
    /// This should be left alone unless you know what you are doing.
    pub num_chunks: usize,

    /// The maximum number of samples in a single call to `WriteStream::write()`.
    pub chunk_len: usize,

    /// The size of the ring buffers that send data to and from the IO server.
    ///
    /// Set this to `None` to automatically find a generous size based on the
    /// other options. This should be left as `None` unless you know what you
    /// are doing.
    ///
    /// The default is `None`.
    pub server_msg_channel_size: Option<usize>,

    /// How long the IO server sleeps when there is nothing to do.
    pub poll_interval: Duration,
}

impl WriteStreamOptions {
    pub const DEFAULT_NUM_CHUNKS: usize = 64;
    pub const DEFAULT_CHUNK_LEN: usize = 1024;
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

    pub fn new(file: BlockFileOptions) -> Self {
        Self {
            file,
            num_chunks: Self::DEFAULT_NUM_CHUNKS,
            chunk_len: Self::DEFAULT_CHUNK_LEN,
            server_msg_channel_size: None,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Default for WriteStreamOptions {
    fn default() -> Self {
        Self::new(BlockFileOptions::default())
    }
}
