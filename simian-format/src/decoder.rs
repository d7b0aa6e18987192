//! File-level decoder.
//!
//! Exists so every property of the encoder can be checked end to end:
//! layout parse, per-frame decode, MD5 verification and byte-exact
//! reconstruction of the original source container.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use simian_codec::{CompressionLevel, FrameDecoder};
use simian_core::error::{Error, Result};
use simian_core::md5::Md5;
use simian_core::sample::{flags, SampleFormat};

use crate::layout::{Descriptor, FileHeader};

/// Everything recovered from one compressed file.
pub struct DecodedFile {
    /// The parsed descriptor.
    pub descriptor: Descriptor,
    /// The parsed header.
    pub header: FileHeader,
    /// Normalized sample format.
    pub format: SampleFormat,
    /// Compression level the frames were coded at.
    pub level: CompressionLevel,
    /// The seek table as stored (low 32 bits of each frame offset).
    pub seek_table: Vec<u32>,
    /// Normalized PCM (little-endian, 8-bit unsigned).
    pub pcm: Vec<u8>,
    /// Verbatim source-container header blob.
    pub header_blob: Vec<u8>,
    /// Verbatim source-container terminator blob.
    pub terminator_blob: Vec<u8>,
}

impl DecodedFile {
    /// Rebuild the original container byte-for-byte: header blob, sample
    /// bytes denormalized per the format flags, terminator blob.
    ///
    /// Files stored without a header blob get a canonical WAV header
    /// synthesized from the audio parameters instead.
    pub fn original_bytes(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(self.header_blob.len() + self.pcm.len() + self.terminator_blob.len());
        if self.header_blob.is_empty()
            && self.header.format_flags as u32 & flags::CREATE_WAV_HEADER != 0
        {
            out.extend_from_slice(&synthesize_wav_header(&self.format, self.pcm.len() as u32));
        } else {
            out.extend_from_slice(&self.header_blob);
        }

        let format_flags = self.header.format_flags as u32;
        let mut pcm = self.pcm.clone();
        if format_flags & flags::SIGNED_8_BIT != 0 && self.format.bits_per_sample == 8 {
            for byte in &mut pcm {
                *byte = byte.wrapping_sub(128);
            }
        } else if format_flags & flags::BIG_ENDIAN != 0 {
            let width = self.format.bytes_per_sample();
            for sample in pcm.chunks_exact_mut(width) {
                sample.reverse();
            }
        }
        out.extend_from_slice(&pcm);

        out.extend_from_slice(&self.terminator_blob);
        out
    }
}

/// A canonical 44-byte WAV header for headerless files.
fn synthesize_wav_header(format: &SampleFormat, data_bytes: u32) -> Vec<u8> {
    let block_align = format.block_align() as u32;
    let mut header = Vec::with_capacity(44);
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&(36 + data_bytes).to_le_bytes());
    header.extend_from_slice(b"WAVE");
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes());
    header.extend_from_slice(&(if format.float { 3u16 } else { 1u16 }).to_le_bytes());
    header.extend_from_slice(&format.channels.to_le_bytes());
    header.extend_from_slice(&format.sample_rate.to_le_bytes());
    header.extend_from_slice(&(format.sample_rate * block_align).to_le_bytes());
    header.extend_from_slice(&(block_align as u16).to_le_bytes());
    header.extend_from_slice(&format.bits_per_sample.to_le_bytes());
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_bytes.to_le_bytes());
    header
}

/// Decode a complete file, verifying frame CRCs and the stream MD5.
pub fn decode_file<R: Read + Seek>(mut input: R) -> Result<DecodedFile> {
    let descriptor = Descriptor::read_from(&mut input)?;
    input
        .seek(SeekFrom::Start(descriptor.descriptor_bytes as u64))
        .map_err(Error::Read)?;
    let header = FileHeader::read_from(&mut input)?;

    let level = CompressionLevel::from_wire_value(header.compression_level)
        .ok_or_else(|| Error::invalid_input("unknown compression level"))?;
    let format = SampleFormat {
        sample_rate: header.sample_rate,
        channels: header.channels,
        bits_per_sample: header.bits_per_sample,
        float: header.format_flags as u32 & flags::FLOATING_POINT != 0,
    };
    format.validate()?;
    #[cfg(not(feature = "float"))]
    if format.float {
        return Err(Error::invalid_input("float input support is disabled"));
    }

    // Seek table.
    input
        .seek(SeekFrom::Start(
            (descriptor.descriptor_bytes + descriptor.header_bytes) as u64,
        ))
        .map_err(Error::Read)?;
    let entries = descriptor.seek_table_bytes / 4;
    let mut seek_table = Vec::with_capacity(entries as usize);
    let mut seek_bytes = Vec::with_capacity(descriptor.seek_table_bytes as usize);
    for _ in 0..entries {
        let entry = input.read_u32::<LittleEndian>().map_err(Error::Read)?;
        seek_bytes.extend_from_slice(&entry.to_le_bytes());
        seek_table.push(entry);
    }

    // Stored header blob.
    let mut header_blob = vec![0u8; descriptor.wav_header_bytes as usize];
    input.read_exact(&mut header_blob).map_err(Error::Read)?;

    // Frame data region, as stored.
    if descriptor.frame_data_bytes % 4 != 0 {
        return Err(Error::invalid_input("frame data is not whole words"));
    }
    let mut frame_data = vec![0u8; descriptor.frame_data_bytes as usize];
    input.read_exact(&mut frame_data).map_err(Error::Read)?;

    // Whatever trails the frame data is the terminator blob.
    let mut terminator_blob = Vec::new();
    input
        .read_to_end(&mut terminator_blob)
        .map_err(Error::Read)?;

    // Verify the stream MD5 before doing any expensive work.
    let mut md5 = Md5::new();
    md5.update(&header_blob);
    md5.update(&frame_data);
    let covered = (descriptor.wav_terminating_bytes as usize).min(terminator_blob.len());
    md5.update(&terminator_blob[..covered]);
    let mut header_image = Vec::new();
    header.write_to(&mut header_image)?;
    md5.update(&header_image);
    md5.update(&seek_bytes);
    if md5.finalize() != descriptor.file_md5 {
        return Err(Error::invalid_input("stream MD5 mismatch"));
    }

    // Undo the per-word byte reversal so frames read sequentially.
    let mut stream = frame_data;
    for chunk in stream.chunks_exact_mut(4) {
        chunk.reverse();
    }

    let total_frames = header.total_frames as usize;
    if total_frames > seek_table.len() {
        return Err(Error::invalid_input("more frames than seek entries"));
    }

    let frame_base = (descriptor.descriptor_bytes
        + descriptor.header_bytes
        + descriptor.seek_table_bytes
        + descriptor.wav_header_bytes) as u64;

    let mut decoder = FrameDecoder::new(&format, level, header.blocks_per_frame as usize);
    let mut pcm = Vec::with_capacity(header.total_blocks() as usize * format.block_align());

    // Seek entries are the low 32 bits of monotonically increasing
    // offsets; rebuild the high part as they wrap.
    let mut high = 0u64;
    let mut previous = frame_base;
    for index in 0..total_frames {
        let mut offset = high | seek_table[index] as u64;
        if offset < previous {
            high += 1 << 32;
            offset = high | seek_table[index] as u64;
        }
        previous = offset;

        let start = (offset - frame_base) as usize;
        if start >= stream.len() {
            return Err(Error::invalid_input("seek entry outside frame data"));
        }
        let blocks = if index == total_frames - 1 {
            header.final_frame_blocks as usize
        } else {
            header.blocks_per_frame as usize
        };

        let frame_pcm = decoder.decode(&stream[start..], blocks)?;
        pcm.extend_from_slice(&frame_pcm);
    }

    Ok(DecodedFile {
        descriptor,
        header,
        format,
        level,
        seek_table,
        pcm,
        header_blob,
        terminator_blob,
    })
}
