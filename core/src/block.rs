use byte_slice_cast::AsByteSlice;

use crate::{BlockFileError, ByteSink};

/// The number of bytes in one stored sample.
pub const BYTES_PER_SAMPLE: u64 = std::mem::size_of::<i16>() as u64;

/// A fixed-capacity staging buffer for one contiguous range of frames.
///
/// Samples are stored interleaved, so the sample for `channel` at local frame
/// `f` lives at `f * num_channels + channel`. This is exactly the layout of the
/// region the block covers in the file.
#[derive(Debug)]
pub struct Block {
    data: Box<[i16]>,
    offset: u64,
    num_channels: usize,
    samples_per_block: usize,
}

impl Block {
    /// Create a zeroed block that starts at frame `offset`.
    pub fn new(num_channels: usize, samples_per_block: usize, offset: u64) -> Self {
        Block {
            data: vec![0; num_channels * samples_per_block].into_boxed_slice(),
            offset,
            num_channels,
            samples_per_block,
        }
    }

    /// The absolute frame this block starts at.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The first absolute frame after this block.
    pub fn end(&self) -> u64 {
        self.offset + self.samples_per_block as u64
    }

    /// The number of samples (not frames) this block holds.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn samples_per_block(&self) -> usize {
        self.samples_per_block
    }

    /// The interleaved samples in this block.
    pub fn data(&self) -> &[i16] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [i16] {
        &mut self.data
    }

    /// Copy `samples` into `channel`, starting at `local_frame` within this
    /// block.
    ///
    /// Nothing is written if the samples would not fit.
    pub fn write(
        &mut self,
        local_frame: usize,
        channel: usize,
        samples: &[i16],
    ) -> Result<(), BlockFileError> {
        if channel >= self.num_channels
            || local_frame
                .checked_add(samples.len())
                .map_or(true, |end| end > self.samples_per_block)
        {
            return Err(BlockFileError::BoundsViolation {
                channel,
                local_frame,
                len: samples.len(),
                samples_per_block: self.samples_per_block,
            });
        }
        if samples.is_empty() {
            return Ok(());
        }

        let start = local_frame * self.num_channels + channel;
        for (dst, src) in self.data[start..]
            .iter_mut()
            .step_by(self.num_channels)
            .zip(samples)
        {
            *dst = *src;
        }

        Ok(())
    }

    /// Write the first `frames` frames of this block to the sink, then release
    /// the block.
    pub fn flush<S: ByteSink + ?Sized>(
        self,
        sink: &mut S,
        frames: usize,
    ) -> Result<(), BlockFileError> {
        let frames = frames.min(self.samples_per_block);
        if frames == 0 {
            return Ok(());
        }

        let byte_offset = self.offset * self.num_channels as u64 * BYTES_PER_SAMPLE;
        let region = &self.data[0..frames * self.num_channels];

        sink.write_at(region.as_byte_slice(), byte_offset)
            .map_err(|source| BlockFileError::FlushFailure {
                offset: self.offset,
                source,
            })
    }

    /// Write the whole block to the sink, then release it.
    pub fn flush_full<S: ByteSink + ?Sized>(self, sink: &mut S) -> Result<(), BlockFileError> {
        let frames = self.samples_per_block;
        self.flush(sink, frames)
    }
}
