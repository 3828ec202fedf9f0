/// One channel write travelling from a `WriteStream` to its IO server.
#[derive(Debug)]
pub struct WriteChunk {
    pub(crate) samples: Vec<i16>,
    pub(crate) channel: usize,
    pub(crate) start_pos: u64,
}

impl WriteChunk {
    pub fn new(chunk_len: usize) -> Self {
        WriteChunk {
            samples: Vec::with_capacity(chunk_len),
            channel: 0,
            start_pos: 0,
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn start_pos(&self) -> u64 {
        self.start_pos
    }

    /// Fill this chunk without growing its allocation. The caller checks that
    /// `samples` fits in the chunk's capacity.
    pub(crate) fn fill(&mut self, channel: usize, start_pos: u64, samples: &[i16]) {
        self.samples.clear();
        self.samples.extend_from_slice(samples);
        self.channel = channel;
        self.start_pos = start_pos;
    }
}

pub(crate) struct HeapData {
    pub chunk_pool: Vec<WriteChunk>,
}
