use rtrb::{Consumer, Producer, RingBuffer};
use std::path::PathBuf;

use super::data::HeapData;
use super::error::{FatalWriteError, WriteError};
use super::{ClientToServerMsg, ServerToClientMsg, WriteChunk, WriteServer, WriteStreamOptions};
use crate::{BlockFileError, Storage, BLOCKING_POLL_INTERVAL};

/// A realtime-safe writer that feeds a `SequentialBlockFile` running on its
/// own IO thread.
///
/// Writes from every channel must come through this one stream, which keeps
/// them in the order they were made.
pub struct WriteStream {
    to_server_tx: Producer<ClientToServerMsg>,
    from_server_rx: Consumer<ServerToClientMsg>,
    close_signal_tx: Producer<Option<HeapData>>,

    heap_data: Option<HeapData>,

    num_channels: usize,
    chunk_len: usize,

    samples_written: u64,
    rejection: Option<WriteError>,
    num_rejected: usize,

    closed: bool,
    file_finished: bool,
    fatal_error: bool,
}

impl WriteStream {
    /// Open a new realtime-safe writer.
    ///
    /// This blocks until the IO server has created the file.
    ///
    /// * `path` - The path of the file to create.
    /// * `storage` - Creates the file. It is moved to the IO thread.
    /// * `stream_opts` - Options for the stream and the file.
    pub fn new<P, St>(
        path: P,
        storage: St,
        stream_opts: WriteStreamOptions,
    ) -> Result<WriteStream, BlockFileError>
    where
        P: Into<PathBuf>,
        St: Storage + Send + 'static,
    {
        stream_opts.file.validate()?;
        if stream_opts.num_chunks == 0 {
            return Err(BlockFileError::InvalidOptions(
                "num_chunks must be greater than zero",
            ));
        }
        if stream_opts.chunk_len == 0 {
            return Err(BlockFileError::InvalidOptions(
                "chunk_len must be greater than zero",
            ));
        }
        if stream_opts.server_msg_channel_size == Some(0) {
            return Err(BlockFileError::InvalidOptions(
                "server_msg_channel_size must be greater than zero",
            ));
        }

        // Reserve ample space for the message channels.
        let msg_channel_size = stream_opts
            .server_msg_channel_size
            .unwrap_or((stream_opts.num_chunks * 2) + 8);

        let (to_server_tx, from_client_rx) =
            RingBuffer::<ClientToServerMsg>::new(msg_channel_size);
        let (to_client_tx, from_server_rx) =
            RingBuffer::<ServerToClientMsg>::new(msg_channel_size);

        // Create dedicated close signal.
        let (close_signal_tx, close_signal_rx) = RingBuffer::<Option<HeapData>>::new(1);

        WriteServer::spawn(
            path.into(),
            storage,
            stream_opts,
            to_client_tx,
            from_client_rx,
            close_signal_rx,
        )?;

        let chunk_pool: Vec<WriteChunk> = (0..stream_opts.num_chunks)
            .map(|_| WriteChunk::new(stream_opts.chunk_len))
            .collect();

        Ok(Self {
            to_server_tx,
            from_server_rx,
            close_signal_tx,

            heap_data: Some(HeapData { chunk_pool }),

            num_channels: stream_opts.file.num_channels,
            chunk_len: stream_opts.chunk_len,

            samples_written: 0,
            rejection: None,
            num_rejected: 0,

            closed: false,
            file_finished: false,
            fatal_error: false,
        })
    }

    /// Returns true if the stream is ready for writing, false otherwise.
    ///
    /// This is realtime-safe.
    pub fn is_ready(&mut self) -> Result<bool, WriteError> {
        if self.fatal_error || self.closed {
            return Err(FatalWriteError::StreamClosed.into());
        }

        self.poll()?;

        let has_chunk = self
            .heap_data
            .as_ref()
            .map_or(false, |heap| !heap.chunk_pool.is_empty());

        Ok(has_chunk && !self.to_server_tx.is_full())
    }

    /// Blocks the current thread until the stream is ready to be written to.
    ///
    /// This is ***not*** realtime-safe.
    pub fn block_until_ready(&mut self) -> Result<(), WriteError> {
        loop {
            if self.is_ready()? {
                break;
            }

            std::thread::sleep(BLOCKING_POLL_INTERVAL);
        }

        Ok(())
    }

    /// Write `samples` into `channel` starting at absolute frame `start_pos`.
    ///
    /// This is realtime-safe.
    ///
    /// The write is applied later on the IO thread. If the file rejects it,
    /// the rejection is returned as `WriteError::Rejected` from a later call
    /// to this method (after that call's own data has been sent).
    pub fn write(
        &mut self,
        channel: usize,
        start_pos: u64,
        samples: &[i16],
    ) -> Result<(), WriteError> {
        if self.fatal_error || self.closed {
            return Err(FatalWriteError::StreamClosed.into());
        }

        if channel >= self.num_channels {
            return Err(WriteError::InvalidChannel {
                channel,
                num_channels: self.num_channels,
            });
        }
        if samples.len() > self.chunk_len {
            return Err(WriteError::ChunkTooLong {
                buffer_len: samples.len(),
                chunk_len: self.chunk_len,
            });
        }

        self.poll()?;

        // Check that there is at-least one slot open.
        if self.to_server_tx.is_full() {
            return Err(WriteError::ServerChannelFull);
        }

        let heap = self
            .heap_data
            .as_mut()
            .ok_or(WriteError::Fatal(FatalWriteError::StreamClosed))?;
        let mut chunk = heap.chunk_pool.pop().ok_or(WriteError::Underflow)?;

        chunk.fill(channel, start_pos, samples);

        // This cannot fail because we made sure there was a slot open in
        // a previous step.
        let _ = self.to_server_tx.push(ClientToServerMsg::Write { chunk });

        self.samples_written += samples.len() as u64;

        match self.rejection.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Finish the file and close the stream. `WriteStream::write()` cannot be
    /// used after calling this.
    ///
    /// This is realtime-safe.
    ///
    /// The file may still be in the process of finishing when this method
    /// returns. Periodically call `WriteStream::poll_finished()` to find out
    /// when it is done.
    pub fn finish_and_close(&mut self) -> Result<(), WriteError> {
        if self.fatal_error || self.closed {
            return Err(FatalWriteError::StreamClosed.into());
        }

        // Check that there is at-least one slot open.
        if self.to_server_tx.is_full() {
            return Err(WriteError::ServerChannelFull);
        }

        // This cannot fail because we made sure there was a slot open in
        // a previous step.
        let _ = self.to_server_tx.push(ClientToServerMsg::FinishFile);

        self.closed = true;

        Ok(())
    }

    /// Finish the file and consume the stream. This will block the current
    /// thread until either the file has successfully finished or an error is
    /// returned.
    ///
    /// This is ***not*** realtime-safe.
    pub fn finish_blocking(mut self) -> Result<(), WriteError> {
        self.finish_and_close()?;

        loop {
            if self.poll_finished()? {
                break;
            }

            std::thread::sleep(BLOCKING_POLL_INTERVAL);
        }

        Ok(())
    }

    fn poll(&mut self) -> Result<(), WriteError> {
        if self.fatal_error {
            return Err(FatalWriteError::StreamClosed.into());
        }

        let heap = match self.heap_data.as_mut() {
            Some(heap) => heap,
            None => return Err(FatalWriteError::StreamClosed.into()),
        };

        while let Ok(msg) = self.from_server_rx.pop() {
            match msg {
                ServerToClientMsg::NewChunk { chunk } => {
                    // This will never allocate new data because the server can
                    // only send chunks that have been sent to it by this client.
                    heap.chunk_pool.push(chunk);
                }
                ServerToClientMsg::Rejected { chunk, error } => {
                    self.num_rejected += 1;
                    if self.rejection.is_none() {
                        self.rejection = Some(WriteError::Rejected {
                            channel: chunk.channel,
                            start_pos: chunk.start_pos,
                            error,
                        });
                    }

                    heap.chunk_pool.push(chunk);
                }
                ServerToClientMsg::Finished => {
                    self.file_finished = true;
                }
                ServerToClientMsg::FatalError(e) => {
                    self.fatal_error = true;
                    return Err(FatalWriteError::File(e).into());
                }
            }
        }

        Ok(())
    }

    /// Poll to see if the file has successfully finished being written after a
    /// call to `WriteStream::finish_and_close()`.
    ///
    /// This is realtime-safe.
    pub fn poll_finished(&mut self) -> Result<bool, WriteError> {
        self.poll()?;

        Ok(self.file_finished)
    }

    /// Take the oldest rejection the IO server has reported and that has not
    /// been returned yet.
    ///
    /// This is realtime-safe.
    pub fn take_rejection(&mut self) -> Option<WriteError> {
        let _ = self.poll();
        self.rejection.take()
    }

    /// The total number of writes the IO server has rejected so far.
    pub fn num_rejected(&self) -> usize {
        self.num_rejected
    }

    /// The total number of samples (across all channels) pushed to the stream.
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    /// Returns whether or not this stream is closed.
    ///
    /// This is realtime-safe.
    pub fn closed(&self) -> bool {
        self.closed
    }
}

impl Drop for WriteStream {
    fn drop(&mut self) {
        // Tell the server to deallocate any heap data.
        // This cannot fail because this is the only place the signal is ever sent.
        let _ = self.close_signal_tx.push(self.heap_data.take());
    }
}
