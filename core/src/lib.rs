#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(clippy::missing_panics_doc)]
#![warn(clippy::clone_on_ref_ptr)]
#![deny(trivial_numeric_casts)]
#![forbid(unsafe_code)]

use std::time;

mod block;
mod error;
mod file;
mod sink;
mod window;

pub mod write;


pub use block::{Block, BYTES_PER_SAMPLE};
pub use error::BlockFileError;
pub use file::{BlockFileOptions, SequentialBlockFile};
pub use sink::{ByteSink, MemSink, MemStorage, Storage};
pub use window::ChannelPolicy;
pub use write::{FatalWriteError, WriteError, WriteStream, WriteStreamOptions};

const BLOCKING_POLL_INTERVAL: time::Duration = time::Duration::from_millis(1);
