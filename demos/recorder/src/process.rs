use std::time::{Duration, Instant};

use rtrb::Producer;
use seqblock::{WriteError, WriteStream};
use tracing::error;

use crate::ProcessToMainMsg;

/// Simulated acquisition hardware. Every channel produces a sine wave of its
/// own frequency and hands it over in its own chunk size, so the channels
/// drift apart the way independently clocked inputs do.
pub struct Process {
    write_stream: Option<WriteStream>,
    to_main_tx: Producer<ProcessToMainMsg>,

    sample_rate: u32,
    tick_frames: usize,
    total_frames: u64,

    positions: Vec<u64>,
    phases: Vec<f32>,
    buffer: Vec<i16>,
}

impl Process {
    pub fn new(
        write_stream: WriteStream,
        to_main_tx: Producer<ProcessToMainMsg>,
        sample_rate: u32,
        tick_frames: usize,
        total_frames: u64,
    ) -> Self {
        let num_channels = write_stream.num_channels();
        let tick_frames = tick_frames.min(write_stream.chunk_len()).max(1);

        Self {
            write_stream: Some(write_stream),
            to_main_tx,
            sample_rate,
            tick_frames,
            total_frames,
            positions: vec![0; num_channels],
            phases: vec![0.0; num_channels],
            buffer: Vec::with_capacity(tick_frames),
        }
    }

    pub fn run(&mut self) {
        let tick_duration =
            Duration::from_secs_f64(self.tick_frames as f64 / f64::from(self.sample_rate));
        let mut last_report = Instant::now();

        let mut target = 0;
        while target < self.total_frames {
            let tick_start = Instant::now();
            target = (target + self.tick_frames as u64).min(self.total_frames);

            if let Err(e) = self.tick(target) {
                error!("{}", e);
                self.write_stream = None;
                let _ = self.to_main_tx.push(ProcessToMainMsg::FatalError);
                return;
            }

            if last_report.elapsed() >= Duration::from_secs(1) {
                last_report = Instant::now();
                let _ = self
                    .to_main_tx
                    .push(ProcessToMainMsg::FramesWritten(target));
            }

            if let Some(remaining) = tick_duration.checked_sub(tick_start.elapsed()) {
                std::thread::sleep(remaining);
            }
        }

        let msg = match self.write_stream.take() {
            Some(stream) => match stream.finish_blocking() {
                Ok(()) => ProcessToMainMsg::Finished,
                Err(e) => {
                    error!("{}", e);
                    ProcessToMainMsg::FatalError
                }
            },
            None => ProcessToMainMsg::FatalError,
        };
        let _ = self.to_main_tx.push(msg);
    }

    /// Bring every channel up to `target` frames.
    fn tick(&mut self, target: u64) -> Result<(), WriteError> {
        let write_stream = match self.write_stream.as_mut() {
            Some(s) => s,
            None => return Ok(()),
        };

        for channel in 0..self.positions.len() {
            // Channels hand over data in a full, half or quarter chunk.
            let step = (self.tick_frames >> (channel % 3)).max(1) as u64;
            let freq = 50.0 * (channel + 1) as f32;
            let phase_inc = freq / self.sample_rate as f32;

            while self.positions[channel] < target {
                let start_pos = self.positions[channel];
                let len = step.min(target - start_pos) as usize;

                self.buffer.clear();
                let mut phase = self.phases[channel];
                for _ in 0..len {
                    let s = (phase * std::f32::consts::TAU).sin() * 0.5;
                    self.buffer.push((s * i16::MAX as f32) as i16);

                    // Keep the phase between [0.0, 1.0).
                    phase = (phase + phase_inc).fract();
                }

                match write_stream.write(channel, start_pos, &self.buffer) {
                    Ok(()) => {}
                    Err(WriteError::Rejected {
                        channel: rejected_channel,
                        start_pos: rejected_pos,
                        ..
                    }) => {
                        // The data of this call was still sent.
                        let _ = self.to_main_tx.push(ProcessToMainMsg::Rejected {
                            channel: rejected_channel,
                            start_pos: rejected_pos,
                        });
                    }
                    Err(WriteError::Underflow) | Err(WriteError::ServerChannelFull) => {
                        // The IO thread is behind. Try this chunk again.
                        write_stream.block_until_ready()?;
                        continue;
                    }
                    Err(e) => return Err(e),
                }

                self.phases[channel] = phase;
                self.positions[channel] += len as u64;
            }
        }

        Ok(())
    }
}
