//! Sequential block files for multi-channel sample streams.
//!
//! Every channel writes its samples independently, at absolute frame
//! positions, into one file of interleaved `i16` samples. Writes are staged in
//! a sliding window of in-memory blocks that are written out once every
//! channel has moved past them.
//!
//! ```no_run
//! # #[cfg(feature = "fs")]
//! # fn main() -> Result<(), seqblock::BlockFileError> {
//! use seqblock::{BlockFileOptions, FsStorage, SequentialBlockFile};
//!
//! let mut storage = FsStorage::default();
//! let mut file = SequentialBlockFile::new(BlockFileOptions::new(2, 4096))?;
//! file.open(&mut storage, "recording.bin")?;
//!
//! file.write(0, 0, &[1, 2, 3, 4])?;
//! file.write(1, 0, &[5, 6, 7, 8])?;
//!
//! file.close()?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "fs"))]
//! # fn main() {}
//! ```

pub use seqblock_core::*;

#[cfg(feature = "fs")]
pub use seqblock_fs::{FsSink, FsStorage};
