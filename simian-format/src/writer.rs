//! The threaded encoder: worker ring, ordered write-back, seek table, MD5.
//!
//! Each worker owns a complete [`FrameEncoder`] and trades frames with the
//! producer through a `(process, ready)` semaphore pair acting as a
//! single-slot mailbox. The producer addresses workers round-robin and
//! reaps a worker's previous frame before handing it the next one, so
//! frames retire in submission order no matter how threads are scheduled.
//!
//! Frame payloads may end mid-word; the writer carries the trailing 0..=3
//! bytes of each frame into the front of the next so every on-disk segment
//! except the closing word is whole 32-bit little-endian words.

use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use simian_codec::{CompressionLevel, FrameEncoder};
use simian_core::error::{Error, Result};
use simian_core::md5::Md5;
use simian_core::sample::{flags, SampleFormat};
use tracing::{debug, trace};

use crate::layout::{
    Descriptor, FileHeader, DESCRIPTOR_BYTES, FILE_VERSION, HEADER_BYTES,
    WAV_HEADER_OR_FOOTER_MAXIMUM_BYTES,
};

/// Most worker threads one encoder may drive.
pub const MAX_THREADS: usize = 32;

/// Counting semaphore built on the workspace lock stack.
struct Semaphore {
    count: Mutex<u32>,
    available: Condvar,
}

impl Semaphore {
    fn new(initial: u32) -> Self {
        Semaphore {
            count: Mutex::new(initial),
            available: Condvar::new(),
        }
    }

    fn post(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.available.notify_one();
    }

    fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.available.wait(&mut count);
        }
        *count -= 1;
    }
}

/// A finished frame handed back from a worker.
struct FrameOutput {
    words: Vec<u32>,
    byte_len: u32,
}

#[derive(Default)]
struct WorkerSlot {
    input: Vec<u8>,
    output: Option<FrameOutput>,
    exit: bool,
}

struct WorkerShared {
    process: Semaphore,
    ready: Semaphore,
    slot: Mutex<WorkerSlot>,
}

struct Worker {
    shared: Arc<WorkerShared>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shared.slot.lock().exit = true;
            self.shared.process.post();
            let _ = handle.join();
        }
    }
}

fn worker_loop(shared: Arc<WorkerShared>, mut core: FrameEncoder) {
    loop {
        shared.process.wait();

        let input = {
            let mut slot = shared.slot.lock();
            if slot.exit {
                break;
            }
            std::mem::take(&mut slot.input)
        };

        let output = match core.encode(&input) {
            Ok(()) => Some(FrameOutput {
                words: core.frame_words().to_vec(),
                byte_len: core.frame_bytes(),
            }),
            Err(_) => None,
        };

        {
            let mut slot = shared.slot.lock();
            slot.input = input;
            slot.output = output;
        }
        shared.ready.post();
    }
}

/// Streaming encoder writing the full container to `W`.
///
/// `W` must be seekable: the descriptor, header and seek table are
/// back-patched once at [`finish`](Self::finish).
pub struct Encoder<W: Write + Seek> {
    io: W,
    format: SampleFormat,
    level: CompressionLevel,
    format_flags: u32,
    blocks_per_frame: u32,
    workers: Vec<Worker>,
    next_worker: usize,
    seek_table: Vec<u32>,
    max_frames: usize,
    frame_index: usize,
    last_frame_blocks: u32,
    carry: Vec<u8>,
    md5: Md5,
    wav_header_bytes: u32,
    too_much_data: bool,
}

impl<W: Write + Seek> Encoder<W> {
    /// Validate the configuration, write the provisional layout and spin up
    /// the worker ring.
    ///
    /// `total_audio_bytes` bounds the stream and sizes the seek table;
    /// submitting more frames than it allows fails with
    /// [`Error::TooMuchData`]. `header_data` is the source container's
    /// verbatim header; `None` asks decoders to synthesize a plain WAV
    /// header instead.
    pub fn start(
        mut io: W,
        threads: usize,
        format: &SampleFormat,
        total_audio_bytes: u64,
        level: CompressionLevel,
        header_data: Option<&[u8]>,
        source_flags: u32,
    ) -> Result<Self> {
        format.validate()?;
        #[cfg(not(feature = "float"))]
        if format.float {
            return Err(Error::invalid_input("float input support is disabled"));
        }
        if threads == 0 || threads > MAX_THREADS {
            return Err(Error::bad_parameter(format!(
                "thread count {threads} outside 1..={MAX_THREADS}"
            )));
        }

        let mut format_flags = source_flags;
        if format.float {
            format_flags |= flags::FLOATING_POINT;
        }
        if header_data.is_none() {
            format_flags |= flags::CREATE_WAV_HEADER;
        }

        let header_blob = header_data.unwrap_or(&[]);
        if header_blob.len() as u64 > WAV_HEADER_OR_FOOTER_MAXIMUM_BYTES {
            return Err(Error::InputTooLarge {
                bytes: header_blob.len() as u64,
                limit: WAV_HEADER_OR_FOOTER_MAXIMUM_BYTES,
            });
        }

        let blocks_per_frame = level.blocks_per_frame();
        let align = format.block_align() as u64;
        let total_blocks = total_audio_bytes / align;
        let mut max_frames = (total_blocks / blocks_per_frame as u64) as usize;
        if total_blocks % blocks_per_frame as u64 != 0 {
            max_frames += 1;
        }
        if max_frames == 0 {
            return Err(Error::bad_parameter("stream declares no audio"));
        }

        debug!(
            channels = format.channels,
            bits = format.bits_per_sample,
            sample_rate = format.sample_rate,
            level = level.wire_value(),
            threads,
            max_frames,
            "encoder starting"
        );

        // Provisional layout; every field that is only known at the end is
        // written as zero and patched in finish().
        let descriptor = Descriptor {
            float: format_flags & flags::FLOATING_POINT != 0,
            version: FILE_VERSION,
            descriptor_bytes: DESCRIPTOR_BYTES,
            header_bytes: HEADER_BYTES,
            seek_table_bytes: (max_frames * 4) as u32,
            wav_header_bytes: header_blob.len() as u32,
            frame_data_bytes: 0,
            wav_terminating_bytes: 0,
            file_md5: [0; 16],
        };
        descriptor.write_to(&mut io)?;

        let header = FileHeader {
            compression_level: level.wire_value(),
            format_flags: format_flags as u16,
            blocks_per_frame,
            final_frame_blocks: 0,
            total_frames: 0,
            bits_per_sample: format.bits_per_sample,
            channels: format.channels,
            sample_rate: format.sample_rate,
        };
        header.write_to(&mut io)?;

        io.write_all(&vec![0u8; max_frames * 4]).map_err(Error::Write)?;

        let mut md5 = Md5::new();
        if !header_blob.is_empty() {
            md5.update(header_blob);
            io.write_all(header_blob).map_err(Error::Write)?;
        }

        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let shared = Arc::new(WorkerShared {
                process: Semaphore::new(0),
                ready: Semaphore::new(1),
                slot: Mutex::new(WorkerSlot::default()),
            });
            let core = FrameEncoder::new(format, level, blocks_per_frame as usize);
            let thread_shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("simian-worker-{index}"))
                .spawn(move || worker_loop(thread_shared, core))
                .map_err(|e| Error::InsufficientMemory(e.to_string()))?;
            workers.push(Worker {
                shared,
                handle: Some(handle),
            });
        }

        Ok(Encoder {
            io,
            format: *format,
            level,
            format_flags,
            blocks_per_frame,
            workers,
            next_worker: 0,
            seek_table: vec![0; max_frames],
            max_frames,
            frame_index: 0,
            last_frame_blocks: blocks_per_frame,
            carry: Vec::new(),
            md5,
            wav_header_bytes: header_blob.len() as u32,
            too_much_data: false,
        })
    }

    /// Bytes in one full frame of input.
    pub fn full_frame_bytes(&self) -> usize {
        self.blocks_per_frame as usize * self.format.block_align()
    }

    /// Whether a frame submission has already overrun the declared length.
    pub fn too_much_data(&self) -> bool {
        self.too_much_data
    }

    /// Submit one frame of normalized PCM.
    ///
    /// Frames must be full-size except the very last; a short frame
    /// followed by anything fails with [`Error::Undefined`].
    pub fn encode_frame(&mut self, data: &[u8]) -> Result<()> {
        if self.too_much_data {
            return Err(Error::TooMuchData);
        }
        let align = self.format.block_align();
        if data.is_empty() || data.len() % align != 0 {
            return Err(Error::bad_parameter("input is not a whole number of blocks"));
        }
        let blocks = (data.len() / align) as u32;
        if blocks > self.blocks_per_frame {
            return Err(Error::bad_parameter("frame larger than blocks-per-frame"));
        }
        if blocks < self.blocks_per_frame && self.last_frame_blocks < self.blocks_per_frame {
            // A short frame is legal at most once, as the last submission.
            return Err(Error::Undefined);
        }

        let index = self.next_worker;
        self.workers[index].shared.ready.wait();
        let previous = self.workers[index].shared.slot.lock().output.take();
        if let Some(output) = previous {
            if let Err(error) = self.write_frame(output) {
                // The worker stays idle with no output; give its ready
                // token back so finish() can still drain the ring.
                self.workers[index].shared.ready.post();
                return Err(error);
            }
        }

        {
            let mut slot = self.workers[index].shared.slot.lock();
            slot.input.clear();
            slot.input.extend_from_slice(data);
        }
        self.workers[index].shared.process.post();

        self.last_frame_blocks = blocks;
        self.next_worker = (index + 1) % self.workers.len();
        Ok(())
    }

    fn set_seek_byte(&mut self, frame: usize, offset: u64) -> Result<()> {
        if frame >= self.max_frames {
            self.too_much_data = true;
            return Err(Error::TooMuchData);
        }
        // Low 32 bits only; decoders rebuild the high part from
        // monotonicity.
        self.seek_table[frame] = offset as u32;
        Ok(())
    }

    fn write_frame(&mut self, output: FrameOutput) -> Result<()> {
        let position = self.io.stream_position().map_err(Error::Write)?;
        self.set_seek_byte(self.frame_index, position + self.carry.len() as u64)?;
        self.frame_index += 1;

        // Splice the previous frame's trailing bytes onto this frame's
        // stream, then push whole words back out in on-disk byte order.
        let carry_len = self.carry.len();
        let mut stream = std::mem::take(&mut self.carry);
        stream.reserve(output.words.len() * 4);
        for word in &output.words {
            stream.extend_from_slice(&word.to_be_bytes());
        }
        stream.truncate(carry_len + output.byte_len as usize);

        let whole = stream.len() & !3;
        let mut disk = Vec::with_capacity(whole);
        for chunk in stream[..whole].chunks_exact(4) {
            disk.extend_from_slice(&[chunk[3], chunk[2], chunk[1], chunk[0]]);
        }
        self.md5.update(&disk);
        self.io.write_all(&disk).map_err(Error::Write)?;

        self.carry = stream[whole..].to_vec();
        trace!(
            frame = self.frame_index - 1,
            bytes = output.byte_len,
            carried = self.carry.len(),
            "frame appended"
        );
        Ok(())
    }

    /// Drain the worker ring in order, close out the stream and back-patch
    /// the layout.
    ///
    /// This always joins every worker, even after an error; the first
    /// failure is reported once the file is as complete as it can be.
    pub fn finish(mut self, terminating_data: &[u8], wav_terminating_bytes: u64) -> Result<W> {
        let mut first_error: Option<Error> = None;

        for _ in 0..self.workers.len() {
            let index = self.next_worker;
            self.workers[index].shared.ready.wait();
            let output = self.workers[index].shared.slot.lock().output.take();
            if let Some(output) = output {
                if let Err(error) = self.write_frame(output) {
                    if !matches!(error, Error::TooMuchData) && first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }

            self.workers[index].shared.slot.lock().exit = true;
            self.workers[index].shared.process.post();
            if let Some(handle) = self.workers[index].handle.take() {
                let _ = handle.join();
            }
            self.next_worker = (index + 1) % self.workers.len();
        }

        // The closing word is written unconditionally, zero-padded.
        let mut tail = std::mem::take(&mut self.carry);
        tail.resize(4, 0);
        let closing = [tail[3], tail[2], tail[1], tail[0]];
        self.md5.update(&closing);
        self.io.write_all(&closing).map_err(Error::Write)?;

        let tail_position = self.io.stream_position().map_err(Error::Write)?;

        if !terminating_data.is_empty() {
            if terminating_data.len() as u64 > WAV_HEADER_OR_FOOTER_MAXIMUM_BYTES {
                return Err(Error::InputTooLarge {
                    bytes: terminating_data.len() as u64,
                    limit: WAV_HEADER_OR_FOOTER_MAXIMUM_BYTES,
                });
            }
            let covered = wav_terminating_bytes.min(terminating_data.len() as u64) as usize;
            self.md5.update(&terminating_data[..covered]);
            self.io.write_all(terminating_data).map_err(Error::Write)?;
        }

        let header = FileHeader {
            compression_level: self.level.wire_value(),
            format_flags: self.format_flags as u16,
            blocks_per_frame: self.blocks_per_frame,
            final_frame_blocks: self.last_frame_blocks,
            total_frames: self.frame_index as u32,
            bits_per_sample: self.format.bits_per_sample,
            channels: self.format.channels,
            sample_rate: self.format.sample_rate,
        };
        let mut header_bytes = Vec::with_capacity(HEADER_BYTES as usize);
        header.write_to(&mut header_bytes)?;

        let mut seek_bytes = Vec::with_capacity(self.seek_table.len() * 4);
        for entry in &self.seek_table {
            seek_bytes.extend_from_slice(&entry.to_le_bytes());
        }

        let mut md5 = std::mem::replace(&mut self.md5, Md5::new());
        md5.update(&header_bytes);
        md5.update(&seek_bytes);

        let seek_table_bytes = (self.max_frames * 4) as u32;
        let descriptor = Descriptor {
            float: self.format_flags & flags::FLOATING_POINT != 0,
            version: FILE_VERSION,
            descriptor_bytes: DESCRIPTOR_BYTES,
            header_bytes: HEADER_BYTES,
            seek_table_bytes,
            wav_header_bytes: self.wav_header_bytes,
            frame_data_bytes: tail_position
                - (DESCRIPTOR_BYTES + HEADER_BYTES + seek_table_bytes + self.wav_header_bytes)
                    as u64,
            wav_terminating_bytes: wav_terminating_bytes as u32,
            file_md5: md5.finalize(),
        };

        self.io.seek(SeekFrom::Start(0)).map_err(Error::Write)?;
        descriptor.write_to(&mut self.io)?;
        self.io.write_all(&header_bytes).map_err(Error::Write)?;
        self.io.write_all(&seek_bytes).map_err(Error::Write)?;
        self.io.flush().map_err(Error::Write)?;

        debug!(
            frames = self.frame_index,
            frame_data_bytes = descriptor.frame_data_bytes,
            "encoder finished"
        );

        if self.too_much_data {
            return Err(Error::TooMuchData);
        }
        if let Some(error) = first_error {
            return Err(error);
        }
        Ok(self.io)
    }
}
