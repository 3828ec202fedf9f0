use std::{path::PathBuf, time::Duration};

use rtrb::{Consumer, Producer, RingBuffer};
use tracing::error;

use crate::{BlockFileError, SequentialBlockFile, Storage, BLOCKING_POLL_INTERVAL};

use super::data::HeapData;
use super::{ClientToServerMsg, ServerToClientMsg, WriteStreamOptions};

pub(super) struct WriteServer<St: Storage> {
    to_client_tx: Producer<ServerToClientMsg>,
    from_client_rx: Consumer<ClientToServerMsg>,
    close_signal_rx: Consumer<Option<HeapData>>,

    file: SequentialBlockFile<St::Sink>,

    file_finished: bool,
    fatal_error: bool,

    run: bool,
    client_closed: bool,
    poll_interval: Duration,
}

impl<St> WriteServer<St>
where
    St: Storage + Send + 'static,
{
    pub(super) fn spawn(
        path: PathBuf,
        mut storage: St,
        opts: WriteStreamOptions,
        to_client_tx: Producer<ServerToClientMsg>,
        from_client_rx: Consumer<ClientToServerMsg>,
        close_signal_rx: Consumer<Option<HeapData>>,
    ) -> Result<(), BlockFileError> {
        let (mut open_tx, mut open_rx) = RingBuffer::<Result<(), BlockFileError>>::new(1);

        std::thread::spawn(move || {
            let opened = SequentialBlockFile::new(opts.file).and_then(|mut file| {
                file.open(&mut storage, &path)?;
                Ok(file)
            });

            match opened {
                Ok(file) => {
                    // Push cannot fail because only one message is ever sent.
                    let _ = open_tx.push(Ok(()));

                    WriteServer::<St>::run(Self {
                        to_client_tx,
                        from_client_rx,
                        close_signal_rx,
                        file,
                        file_finished: false,
                        fatal_error: false,
                        run: true,
                        client_closed: false,
                        poll_interval: opts.poll_interval,
                    });
                }
                Err(e) => {
                    // Push cannot fail because only one message is ever sent.
                    let _ = open_tx.push(Err(e));
                }
            }
        });

        loop {
            if let Ok(res) = open_rx.pop() {
                return res;
            }

            std::thread::sleep(BLOCKING_POLL_INTERVAL);
        }
    }

    fn run(mut self) {
        while self.run {
            let mut do_sleep = true;

            while let Ok(msg) = self.from_client_rx.pop() {
                match msg {
                    ClientToServerMsg::Write { chunk } => {
                        let res = self
                            .file
                            .write(chunk.channel, chunk.start_pos, &chunk.samples);

                        match res {
                            Ok(()) => {
                                // Send chunk to be re-used by client.
                                self.send_msg(ServerToClientMsg::NewChunk { chunk });
                            }
                            Err(e) if !e.is_fatal() => {
                                self.send_msg(ServerToClientMsg::Rejected { chunk, error: e });
                            }
                            Err(e) => {
                                error!("fatal stream error: {}", e);
                                self.send_msg(ServerToClientMsg::FatalError(e));
                                self.fatal_error = true;
                                self.run = false;
                                do_sleep = false;
                                break;
                            }
                        }
                    }
                    ClientToServerMsg::FinishFile => {
                        self.file_finished = true;
                        self.run = false;
                        do_sleep = false;

                        match self.file.close() {
                            Ok(()) => self.send_msg(ServerToClientMsg::Finished),
                            Err(e) => {
                                error!("error finishing stream file: {}", e);
                                self.fatal_error = true;
                                self.send_msg(ServerToClientMsg::FatalError(e));
                            }
                        }
                        break;
                    }
                }
            }

            // Check for close signal.
            if let Ok(heap_data) = self.close_signal_rx.pop() {
                // Drop heap data here.
                let _ = heap_data;
                self.run = false;
                self.client_closed = true;
                self.apply_pending();
                break;
            }

            if do_sleep {
                std::thread::sleep(self.poll_interval);
            }
        }

        // Attempt to finish the file if it was not already.
        if !self.file_finished && !self.fatal_error {
            if let Err(e) = self.file.close() {
                error!("error finishing stream file: {}", e);
            }
        }

        // If client has not closed yet, wait until it does before closing.
        if !self.client_closed {
            loop {
                if let Ok(heap_data) = self.close_signal_rx.pop() {
                    // Drop heap data here.
                    let _ = heap_data;
                    break;
                }

                std::thread::sleep(BLOCKING_POLL_INTERVAL);
            }
        }
    }

    /// Apply writes the client pushed right before it went away.
    fn apply_pending(&mut self) {
        while let Ok(msg) = self.from_client_rx.pop() {
            if let ClientToServerMsg::Write { chunk } = msg {
                if let Err(e) = self
                    .file
                    .write(chunk.channel, chunk.start_pos, &chunk.samples)
                {
                    if e.is_fatal() {
                        error!("fatal stream error: {}", e);
                        self.fatal_error = true;
                        break;
                    }
                }
            }
        }
    }

    fn send_msg(&mut self, msg: ServerToClientMsg) {
        // Do nothing if the client has gone away.
        if self.client_closed {
            return;
        }

        // Block until message can be sent.
        loop {
            if !self.to_client_tx.is_full() {
                break;
            }

            // Check for close signal to avoid waiting forever.
            if let Ok(heap_data) = self.close_signal_rx.pop() {
                // Drop heap data here.
                let _ = heap_data;
                self.run = false;
                self.client_closed = true;
                return;
            }

            std::thread::sleep(BLOCKING_POLL_INTERVAL);
        }

        // Push will never fail because we made sure a slot is available in the
        // previous step.
        let _ = self.to_client_tx.push(msg);
    }
}
