use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use rtrb::RingBuffer;
use seqblock::{BlockFileOptions, ChannelPolicy, FsStorage, WriteStream, WriteStreamOptions};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod process;

/// Record synthetic multi-channel acquisition data into a sequential block file.
#[derive(Debug, Parser)]
#[command(name = "recorder")]
struct Args {
    /// The file to write.
    #[arg(short, long, default_value = "recording.bin")]
    output: PathBuf,

    /// The number of channels to record.
    #[arg(short, long, default_value_t = 8)]
    channels: usize,

    /// The number of frames in one block.
    #[arg(short = 'b', long, default_value_t = BlockFileOptions::DEFAULT_SAMPLES_PER_BLOCK)]
    samples_per_block: usize,

    /// Frames per second of the simulated acquisition.
    #[arg(short = 'r', long, default_value_t = 30_000)]
    sample_rate: u32,

    /// How long to record for.
    #[arg(short, long, default_value_t = 5.0)]
    seconds: f64,

    /// The largest number of frames any channel writes at once.
    #[arg(long, default_value_t = 512)]
    chunk_frames: usize,

    /// Let blocks be evicted even if some channel has not written yet.
    #[arg(long)]
    skip_silent: bool,
}

pub enum ProcessToMainMsg {
    FramesWritten(u64),
    Rejected { channel: usize, start_pos: u64 },
    FatalError,
    Finished,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut file_opts = BlockFileOptions::new(args.channels, args.samples_per_block);
    if args.skip_silent {
        file_opts.channel_policy = ChannelPolicy::SkipSilent;
    }

    let mut stream_opts = WriteStreamOptions::new(file_opts);
    stream_opts.chunk_len = args.chunk_frames;

    let write_stream = match WriteStream::new(&args.output, FsStorage::default(), stream_opts) {
        Ok(s) => s,
        Err(e) => {
            error!("could not open {:?}: {}", args.output, e);
            std::process::exit(1);
        }
    };

    let total_frames = (args.seconds * f64::from(args.sample_rate)) as u64;

    info!(
        path = ?args.output,
        channels = args.channels,
        total_frames,
        "recording"
    );

    let (to_main_tx, mut from_process_rx) = RingBuffer::<ProcessToMainMsg>::new(256);

    let mut process = process::Process::new(
        write_stream,
        to_main_tx,
        args.sample_rate,
        args.chunk_frames,
        total_frames,
    );
    let handle = std::thread::spawn(move || process.run());

    let mut ok = true;
    'outer: loop {
        while let Ok(msg) = from_process_rx.pop() {
            match msg {
                ProcessToMainMsg::FramesWritten(frames) => {
                    info!(frames, "progress");
                }
                ProcessToMainMsg::Rejected { channel, start_pos } => {
                    warn!(channel, start_pos, "write rejected");
                }
                ProcessToMainMsg::FatalError => {
                    ok = false;
                    break 'outer;
                }
                ProcessToMainMsg::Finished => break 'outer,
            }
        }

        std::thread::sleep(Duration::from_millis(50));
    }

    let _ = handle.join();

    if ok {
        info!(path = ?args.output, "finished recording");
    } else {
        error!("recording failed");
        std::process::exit(1);
    }
}
