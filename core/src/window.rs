use std::collections::VecDeque;

use tracing::{debug, error, warn};

use crate::{Block, BlockFileError, ByteSink};

/// How channels that have never written are treated when deciding which
/// blocks can be evicted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPolicy {
    /// A channel that has never written holds on to the first resident block,
    /// so nothing is evicted until every channel has written at least once.
    ///
    /// If a channel never writes, the window grows for as long as the file is
    /// open.
    #[default]
    WaitForAll,
    /// Channels that have never written are ignored. A silent channel that
    /// starts writing later than the others may hit
    /// [`BlockFileError::WindowUnderrun`].
    SkipSilent,
}

/// The resident, contiguous run of blocks that writes land in.
#[derive(Debug)]
pub(crate) struct BlockWindow {
    blocks: VecDeque<Block>,

    /// For each channel, the index into `blocks` of the last block it wrote.
    last_written: Box<[Option<usize>]>,
    /// High-water mark (in frames) of the tail block.
    last_block_fill: usize,

    num_channels: usize,
    samples_per_block: usize,
    policy: ChannelPolicy,

    frames_flushed: u64,
}

impl BlockWindow {
    pub(crate) fn new(num_channels: usize, samples_per_block: usize, policy: ChannelPolicy) -> Self {
        let mut blocks = VecDeque::with_capacity(4);
        blocks.push_back(Block::new(num_channels, samples_per_block, 0));

        Self {
            blocks,
            last_written: vec![None; num_channels].into_boxed_slice(),
            last_block_fill: 0,
            num_channels,
            samples_per_block,
            policy,
            frames_flushed: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.blocks.len()
    }

    pub(crate) fn offsets(&self) -> impl Iterator<Item = u64> + '_ {
        self.blocks.iter().map(Block::offset)
    }

    pub(crate) fn first_offset(&self) -> u64 {
        self.blocks.front().map_or(0, Block::offset)
    }

    pub(crate) fn tail_end(&self) -> u64 {
        self.blocks.back().map_or(0, Block::end)
    }

    pub(crate) fn last_written(&self, channel: usize) -> Option<usize> {
        self.last_written.get(channel).copied().flatten()
    }

    pub(crate) fn last_block_fill(&self) -> usize {
        self.last_block_fill
    }

    pub(crate) fn frames_flushed(&self) -> u64 {
        self.frames_flushed
    }

    /// The index of the earliest block some channel may still write into.
    fn min_block(&self) -> usize {
        let last_written = self.last_written.iter();
        let min = match self.policy {
            ChannelPolicy::WaitForAll => last_written.map(|b| b.unwrap_or(0)).min(),
            ChannelPolicy::SkipSilent => last_written.flatten().copied().min(),
        };

        // Never evict the tail.
        min.unwrap_or(0).min(self.blocks.len().saturating_sub(1))
    }

    /// The index of the last resident block starting at or before `pos`.
    fn locate(&self, pos: u64) -> Option<usize> {
        self.blocks.iter().rposition(|b| b.offset() <= pos)
    }

    /// Flush and drop `count` blocks from the front of the window.
    fn evict_front<S: ByteSink + ?Sized>(
        &mut self,
        sink: &mut S,
        count: usize,
    ) -> Result<(), BlockFileError> {
        let mut res = Ok(());
        let mut evicted = 0;

        while evicted < count {
            let block = match self.blocks.pop_front() {
                Some(b) => b,
                None => break,
            };
            evicted += 1;

            if let Err(e) = block.flush_full(sink) {
                res = Err(e);
                break;
            }
            self.frames_flushed += self.samples_per_block as u64;
        }

        for last in self.last_written.iter_mut().flatten() {
            *last = last.saturating_sub(evicted);
        }

        if evicted > 0 {
            debug!(
                evicted,
                first_resident = self.first_offset(),
                "evicted blocks from the window"
            );
        }

        res
    }

    /// Append as many blocks as needed for the tail to reach `end`.
    fn allocate(&mut self, end: u64) {
        let spb = self.samples_per_block as u64;
        let mut offset = self.tail_end();
        if end <= offset {
            return;
        }

        let new_blocks = (end - offset + spb - 1) / spb;
        for _ in 0..new_blocks {
            self.blocks
                .push_back(Block::new(self.num_channels, self.samples_per_block, offset));
            offset += spb;
        }

        // The new tail has not been written yet.
        self.last_block_fill = 0;

        debug!(
            new_blocks,
            resident = self.blocks.len(),
            tail_end = offset,
            "allocated blocks"
        );
    }

    /// Write `samples` to `channel` starting at absolute frame `start_pos`.
    pub(crate) fn write<S: ByteSink + ?Sized>(
        &mut self,
        sink: &mut S,
        channel: usize,
        start_pos: u64,
        samples: &[i16],
    ) -> Result<(), BlockFileError> {
        if channel >= self.num_channels {
            return Err(BlockFileError::InvalidChannel {
                channel,
                num_channels: self.num_channels,
            });
        }
        if samples.is_empty() {
            return Ok(());
        }

        let end = start_pos.saturating_add(samples.len() as u64);
        let grow = end > self.tail_end();
        let evict = if grow { self.min_block() } else { 0 };

        // Check against the front as it will be after eviction, so a rejected
        // write leaves everything untouched.
        let first_resident = self
            .blocks
            .get(evict)
            .map_or_else(|| self.tail_end(), Block::offset);
        if start_pos < first_resident {
            warn!(
                channel,
                start_pos,
                first_resident,
                last_written = ?self.last_written,
                "write targets a block that is no longer resident"
            );
            return Err(BlockFileError::WindowUnderrun {
                channel,
                start_pos,
                first_resident,
            });
        }

        if grow {
            self.evict_front(sink, evict)?;
            self.allocate(end);
        }

        let mut index = self
            .locate(start_pos)
            .ok_or_else(|| BlockFileError::WindowUnderrun {
                channel,
                start_pos,
                first_resident: self.first_offset(),
            })?;
        let tail_index = self.blocks.len() - 1;

        let mut local_frame = (start_pos - self.blocks[index].offset()) as usize;
        let mut remaining = samples;
        loop {
            let len = remaining
                .len()
                .min(self.samples_per_block.saturating_sub(local_frame));
            let (segment, rest) = remaining.split_at(len);

            let block = self
                .blocks
                .get_mut(index)
                .ok_or(BlockFileError::BoundsViolation {
                    channel,
                    local_frame,
                    len: remaining.len(),
                    samples_per_block: self.samples_per_block,
                })?;
            block.write(local_frame, channel, segment)?;

            let fill = local_frame + len;
            if index == tail_index && fill > self.last_block_fill {
                self.last_block_fill = fill;
            }

            remaining = rest;
            if remaining.is_empty() {
                break;
            }

            index += 1;
            local_frame = 0;
        }

        self.last_written[channel] = Some(index);

        Ok(())
    }

    /// Flush every block but the tail in full, then the tail up to its
    /// high-water mark. Leaves the window empty.
    ///
    /// Every block is attempted even if an earlier one fails. The first
    /// failure is returned.
    pub(crate) fn finish<S: ByteSink + ?Sized>(&mut self, sink: &mut S) -> Result<(), BlockFileError> {
        let mut first_err = None;

        while self.blocks.len() > 1 {
            if let Some(block) = self.blocks.pop_front() {
                match block.flush_full(sink) {
                    Ok(()) => self.frames_flushed += self.samples_per_block as u64,
                    Err(e) => {
                        error!("{}", e);
                        first_err.get_or_insert(e);
                    }
                }
            }
        }

        if let Some(tail) = self.blocks.pop_front() {
            match tail.flush(sink, self.last_block_fill) {
                Ok(()) => self.frames_flushed += self.last_block_fill as u64,
                Err(e) => {
                    error!("{}", e);
                    first_err.get_or_insert(e);
                }
            }
        }

        for last in self.last_written.iter_mut() {
            *last = None;
        }
        self.last_block_fill = 0;

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
