//! Convenience glue from a parsed input source to a finished file.

use std::io::{Seek, Write};

use simian_codec::CompressionLevel;
use simian_core::error::Result;
use simian_io::InputSource;
use tracing::debug;

use crate::writer::Encoder;

/// Encode everything `source` delivers into `output`.
///
/// Reads full frames from the source, submits them to the worker ring and
/// finalizes the container with the source's verbatim terminator.
pub fn encode_source<W: Write + Seek>(
    source: &mut dyn InputSource,
    output: W,
    level: CompressionLevel,
    threads: usize,
) -> Result<W> {
    let desc = source.description().clone();
    let header_blob = source.header_data()?;
    let terminator_blob = source.terminating_data()?;
    let total_audio_bytes = desc.total_blocks * desc.format.block_align() as u64;

    let mut encoder = Encoder::start(
        output,
        threads,
        &desc.format,
        total_audio_bytes,
        level,
        Some(&header_blob),
        desc.flags,
    )?;

    let frame_blocks = encoder.full_frame_bytes() / desc.format.block_align();
    let mut buf = Vec::new();
    loop {
        let blocks = source.read_blocks(frame_blocks, &mut buf)?;
        if blocks == 0 {
            break;
        }
        encoder.encode_frame(&buf)?;
        if blocks < frame_blocks {
            break;
        }
    }

    debug!(blocks = desc.total_blocks, "source fully submitted");
    encoder.finish(&terminator_blob, terminator_blob.len() as u64)
}
