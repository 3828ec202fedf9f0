use crate::*;
use seqblock_core::{BlockFileOptions, SequentialBlockFile, WriteStream, WriteStreamOptions};
use std::time::Duration;
use tempfile::TempDir;

fn read_samples(path: &Path) -> Vec<i16> {
    fs::read(path)
        .unwrap()
        .chunks_exact(2)
        .map(|b| i16::from_ne_bytes([b[0], b[1]]))
        .collect()
}

#[test]
fn writes_interleaved_samples_to_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("two_channels.bin");

    let mut storage = FsStorage::new();
    let mut file = SequentialBlockFile::new(BlockFileOptions::new(2, 4)).unwrap();
    file.open(&mut storage, &path).unwrap();

    file.write(0, 0, &[1, 2, 3, 4]).unwrap();
    file.write(1, 0, &[5, 6, 7, 8]).unwrap();
    file.close().unwrap();

    assert_eq!(fs::metadata(&path).unwrap().len(), 16);
    assert_eq!(read_samples(&path), vec![1, 5, 2, 6, 3, 7, 4, 8]);
}

#[test]
fn long_recording_has_no_trailing_padding() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("long.bin");

    let num_channels = 4;
    let samples_per_block = 256;
    let total_frames = 10_000u64;

    let mut storage = FsStorage {
        buffer_size: 1024,
        ..FsStorage::default()
    };
    let mut file =
        SequentialBlockFile::new(BlockFileOptions::new(num_channels, samples_per_block)).unwrap();
    file.open(&mut storage, &path).unwrap();

    // Channels write in differently sized chunks.
    let mut pos = vec![0u64; num_channels];
    while pos.iter().any(|p| *p < total_frames) {
        for ch in 0..num_channels {
            let len = (37 * (ch as u64 + 1)).min(total_frames - pos[ch]);
            let samples: Vec<i16> = (pos[ch]..pos[ch] + len)
                .map(|f| (f as i16).wrapping_mul(ch as i16 + 1))
                .collect();
            file.write(ch, pos[ch], &samples).unwrap();
            pos[ch] += len;
        }
    }
    file.close().unwrap();

    let samples = read_samples(&path);
    assert_eq!(samples.len() as u64, total_frames * num_channels as u64);
    for (frame, chunk) in samples.chunks_exact(num_channels).enumerate() {
        for (ch, s) in chunk.iter().enumerate() {
            assert_eq!(*s, (frame as i16).wrapping_mul(ch as i16 + 1));
        }
    }
}

#[test]
fn existing_file_is_truncated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("existing.bin");
    fs::write(&path, vec![0xAAu8; 4096]).unwrap();

    let mut storage = FsStorage::new();
    let mut file = SequentialBlockFile::new(BlockFileOptions::new(1, 8)).unwrap();
    file.open(&mut storage, &path).unwrap();
    file.write(0, 0, &[1, 2, 3]).unwrap();
    file.close().unwrap();

    assert_eq!(read_samples(&path), vec![1, 2, 3]);
}

#[test]
fn parent_directories_are_created() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a").join("b").join("nested.bin");

    let mut storage = FsStorage::new();
    let mut sink = storage.create_or_truncate(&path).unwrap();
    sink.write_at(&[1, 2], 0).unwrap();
    sink.flush().unwrap();

    assert!(path.exists());
    assert_eq!(sink.path(), path.as_path());
}

#[test]
fn missing_parent_fails_without_create_dirs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing").join("file.bin");

    let mut storage = FsStorage {
        create_dirs: false,
        ..FsStorage::default()
    };
    let mut file = SequentialBlockFile::new(BlockFileOptions::new(1, 8)).unwrap();

    assert!(matches!(
        file.open(&mut storage, &path),
        Err(seqblock_core::BlockFileError::StorageCreate { .. })
    ));
}

#[test]
fn sink_seeks_for_out_of_order_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("seek.bin");

    let mut storage = FsStorage::new();
    let mut sink = storage.create_or_truncate(&path).unwrap();

    sink.write_at(&[3, 3], 4).unwrap();
    assert_eq!(sink.position(), 6);
    sink.write_at(&[1, 1, 2, 2], 0).unwrap();
    assert_eq!(sink.position(), 4);
    sink.write_at(&[4, 4], 6).unwrap();
    sink.flush().unwrap();

    assert_eq!(fs::read(&path).unwrap(), vec![1, 1, 2, 2, 3, 3, 4, 4]);
}

#[test]
fn removing_a_missing_file_is_ok() {
    let dir = TempDir::new().unwrap();
    let mut storage = FsStorage::new();

    storage.remove(&dir.path().join("never_created.bin")).unwrap();
}

#[test]
fn stream_writes_to_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stream.bin");

    let mut opts = WriteStreamOptions::new(BlockFileOptions::new(3, 64));
    opts.chunk_len = 32;
    opts.num_chunks = 16;
    opts.poll_interval = Duration::from_micros(100);

    let mut stream = WriteStream::new(path.clone(), FsStorage::new(), opts).unwrap();

    for start in (0..1024u64).step_by(32) {
        for ch in 0..3 {
            let samples: Vec<i16> = (start..start + 32).map(|f| f as i16 + ch as i16).collect();
            loop {
                match stream.write(ch, start, &samples) {
                    Ok(()) => break,
                    Err(seqblock_core::WriteError::Underflow)
                    | Err(seqblock_core::WriteError::ServerChannelFull) => {
                        std::thread::sleep(Duration::from_millis(1))
                    }
                    Err(e) => panic!("{}", e),
                }
            }
        }
    }

    stream.finish_blocking().unwrap();

    let samples = read_samples(&path);
    assert_eq!(samples.len(), 1024 * 3);
    for (frame, chunk) in samples.chunks_exact(3).enumerate() {
        assert_eq!(chunk, &[frame as i16, frame as i16 + 1, frame as i16 + 2]);
    }
}
