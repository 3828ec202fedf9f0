use std::path::Path;

use tracing::{error, info, warn};

use crate::window::BlockWindow;
use crate::{BlockFileError, ByteSink, ChannelPolicy, Storage};

/// Options for a [`SequentialBlockFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockFileOptions {
    /// The number of interleaved channels in the file.
    pub num_channels: usize,

    /// The number of frames in one block. Each resident block holds
    /// `num_channels * samples_per_block` samples.
    ///
    /// This also bounds how far channels may drift apart: a channel can only
    /// write into blocks that are still resident.
    pub samples_per_block: usize,

    /// How channels that never wrote are treated when evicting blocks.
    ///
    /// The default is [`ChannelPolicy::WaitForAll`].
    pub channel_policy: ChannelPolicy,
}

impl BlockFileOptions {
    pub const DEFAULT_SAMPLES_PER_BLOCK: usize = 4096;

    pub fn new(num_channels: usize, samples_per_block: usize) -> Self {
        Self {
            num_channels,
            samples_per_block,
            channel_policy: ChannelPolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), BlockFileError> {
        if self.num_channels == 0 {
            return Err(BlockFileError::InvalidOptions(
                "num_channels must be greater than zero",
            ));
        }
        if self.samples_per_block == 0 {
            return Err(BlockFileError::InvalidOptions(
                "samples_per_block must be greater than zero",
            ));
        }

        Ok(())
    }
}

impl Default for BlockFileOptions {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_SAMPLES_PER_BLOCK)
    }
}

/// A file of interleaved `i16` samples that every channel writes into
/// independently.
///
/// Writes are staged in a window of resident blocks. A block is written to the
/// sink once every channel has moved past it, and the last block is trimmed to
/// the furthest frame any channel reached when the file is closed.
///
/// Call [`SequentialBlockFile::close()`] to observe flush errors. If the file is
/// dropped while still open it is closed anyway and any error is logged.
pub struct SequentialBlockFile<S: ByteSink> {
    options: BlockFileOptions,
    sink: Option<S>,
    window: Option<BlockWindow>,
    frames_flushed: u64,
}

impl<S: ByteSink> SequentialBlockFile<S> {
    /// Create a new, unopened file.
    pub fn new(options: BlockFileOptions) -> Result<Self, BlockFileError> {
        options.validate()?;

        Ok(Self {
            options,
            sink: None,
            window: None,
            frames_flushed: 0,
        })
    }

    /// Create the backing storage at `path` and get ready for writing.
    ///
    /// If the storage cannot be created, the path is removed and creation is
    /// tried exactly once more.
    pub fn open<St>(&mut self, storage: &mut St, path: impl AsRef<Path>) -> Result<(), BlockFileError>
    where
        St: Storage<Sink = S> + ?Sized,
    {
        if self.window.is_some() {
            return Err(BlockFileError::AlreadyOpen);
        }

        let path = path.as_ref();
        let sink = match storage.create_or_truncate(path) {
            Ok(sink) => sink,
            Err(e) => {
                warn!(?path, "error creating file, re-creating: {}", e);

                if let Err(e) = storage.remove(path) {
                    warn!(?path, "could not remove file: {}", e);
                }

                storage
                    .create_or_truncate(path)
                    .map_err(|source| BlockFileError::StorageCreate {
                        path: path.to_path_buf(),
                        source,
                    })?
            }
        };

        info!(
            ?path,
            num_channels = self.options.num_channels,
            samples_per_block = self.options.samples_per_block,
            "opened block file"
        );

        self.sink = Some(sink);
        self.window = Some(BlockWindow::new(
            self.options.num_channels,
            self.options.samples_per_block,
            self.options.channel_policy,
        ));
        self.frames_flushed = 0;

        Ok(())
    }

    /// Write `samples` into `channel` starting at absolute frame `start_pos`.
    ///
    /// If an error is returned, nothing from `samples` was written, with the
    /// exception of [`BlockFileError::FlushFailure`], after which the file
    /// should be considered broken.
    pub fn write(
        &mut self,
        channel: usize,
        start_pos: u64,
        samples: &[i16],
    ) -> Result<(), BlockFileError> {
        match (self.window.as_mut(), self.sink.as_mut()) {
            (Some(window), Some(sink)) => window.write(sink, channel, start_pos, samples),
            _ => Err(BlockFileError::NotOpen),
        }
    }

    /// Flush every remaining block and close the file.
    ///
    /// All blocks except the last are written in full. The last block is only
    /// written up to the furthest frame any channel reached in it, so the file
    /// never ends in padding.
    ///
    /// Closing a file that is not open does nothing.
    pub fn close(&mut self) -> Result<(), BlockFileError> {
        let mut window = match self.window.take() {
            Some(w) => w,
            None => return Ok(()),
        };
        let sink = match self.sink.as_mut() {
            Some(s) => s,
            None => return Err(BlockFileError::NotOpen),
        };

        let res = window.finish(sink);
        self.frames_flushed = window.frames_flushed();

        let offset = self.frames_flushed;
        let flush_res = sink
            .flush()
            .map_err(|source| BlockFileError::FlushFailure { offset, source });

        res.and(flush_res)?;

        info!(frames = self.frames_flushed, "closed block file");

        Ok(())
    }

    pub fn options(&self) -> &BlockFileOptions {
        &self.options
    }

    pub fn num_channels(&self) -> usize {
        self.options.num_channels
    }

    pub fn samples_per_block(&self) -> usize {
        self.options.samples_per_block
    }

    /// Whether the file has been opened and not yet closed.
    pub fn is_open(&self) -> bool {
        self.window.is_some()
    }

    /// The number of blocks currently held in memory.
    pub fn resident_blocks(&self) -> usize {
        self.window.as_ref().map_or(0, BlockWindow::len)
    }

    /// The starting frame of every resident block, front to back.
    pub fn resident_offsets(&self) -> Vec<u64> {
        self.window
            .as_ref()
            .map(|w| w.offsets().collect())
            .unwrap_or_default()
    }

    /// The first frame that can still be written, if the file is open.
    pub fn first_resident_frame(&self) -> Option<u64> {
        self.window.as_ref().map(BlockWindow::first_offset)
    }

    /// The index (relative to the first resident block) of the last block
    /// `channel` wrote into.
    pub fn last_written_block(&self, channel: usize) -> Option<usize> {
        self.window.as_ref().and_then(|w| w.last_written(channel))
    }

    /// The furthest frame written into the last resident block.
    pub fn last_block_fill(&self) -> usize {
        self.window.as_ref().map_or(0, BlockWindow::last_block_fill)
    }

    /// The number of frames written to the sink so far.
    pub fn frames_flushed(&self) -> u64 {
        self.window
            .as_ref()
            .map_or(self.frames_flushed, BlockWindow::frames_flushed)
    }

    pub fn sink(&self) -> Option<&S> {
        self.sink.as_ref()
    }
}

impl<S: ByteSink> Drop for SequentialBlockFile<S> {
    fn drop(&mut self) {
        if self.window.is_some() {
            if let Err(e) = self.close() {
                error!("error closing block file on drop: {}", e);
            }
        }
    }
}
