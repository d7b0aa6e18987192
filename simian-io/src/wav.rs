//! RIFF WAVE reader (also RF64 and BW64 framing).
//!
//! Parsing is strictly forward: chunks are read and discarded rather than
//! seeked over, so the prefix cache retains the raw header bytes and the
//! sniffing path works on inputs where seeking is costly.

use std::io::{Read, Seek};

use byteorder::{LittleEndian, ReadBytesExt};
use simian_core::error::{Error, Result};
use simian_core::sample::{flags, SampleFormat};

use crate::buffer::PrefixCache;
use crate::source::{self, InputSource, SourceDescription};

const WAVE_FORMAT_PCM: u16 = 1;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// KSDATAFORMAT_SUBTYPE_PCM.
const SUBTYPE_PCM: [u8; 16] = [1, 0, 0, 0, 0, 0, 16, 0, 128, 0, 0, 170, 0, 56, 155, 113];
/// KSDATAFORMAT_SUBTYPE_IEEE_FLOAT.
const SUBTYPE_IEEE_FLOAT: [u8; 16] = [3, 0, 0, 0, 0, 0, 16, 0, 128, 0, 0, 170, 0, 56, 155, 113];

/// Largest fmt-chunk extension worth reading.
const MAX_FORMAT_EXTRA: u32 = 1024 * 1024;

/// Does the stream head look like a WAV family file?
pub fn header_matches(head: &[u8; 64]) -> bool {
    matches!(&head[..4], b"RIFF" | b"RF64" | b"BW64")
}

/// A parsed WAV input.
pub struct WavSource<R: Read + Seek> {
    reader: PrefixCache<R>,
    desc: SourceDescription,
    data_remaining: u64,
}

impl<R: Read + Seek> WavSource<R> {
    /// Parse a WAV stream positioned at byte zero.
    pub fn open(reader: R) -> Result<Self> {
        let mut reader = PrefixCache::new(reader);
        let file_bytes = source::stream_len(&mut reader)?;

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(Error::Read)?;
        if !matches!(&magic, b"RIFF" | b"RF64" | b"BW64") {
            return Err(Error::invalid_input("not a RIFF stream"));
        }
        // Riff size; plenty of real files carry wonky values, so only the
        // chunk walk below is trusted.
        let _riff_bytes = reader.read_u32::<LittleEndian>().map_err(Error::Read)?;

        let mut wave = [0u8; 4];
        reader.read_exact(&mut wave).map_err(Error::Read)?;
        if &wave != b"WAVE" {
            return Err(Error::invalid_input("RIFF stream is not WAVE"));
        }

        // Walk to the fmt chunk.
        let (mut label, mut chunk_bytes) = read_chunk_header(&mut reader)?;
        while &label != b"fmt " {
            skip_chunk(&mut reader, chunk_bytes, file_bytes)?;
            (label, chunk_bytes) = read_chunk_header(&mut reader)?;
        }
        if chunk_bytes < 16 {
            return Err(Error::invalid_input("fmt chunk too short"));
        }

        let format_tag = reader.read_u16::<LittleEndian>().map_err(Error::Read)?;
        let channels = reader.read_u16::<LittleEndian>().map_err(Error::Read)?;
        let sample_rate = reader.read_u32::<LittleEndian>().map_err(Error::Read)?;
        let _avg_bytes = reader.read_u32::<LittleEndian>().map_err(Error::Read)?;
        let block_align = reader.read_u16::<LittleEndian>().map_err(Error::Read)?;
        let mut bits_per_sample = reader.read_u16::<LittleEndian>().map_err(Error::Read)?;

        if !matches!(
            format_tag,
            WAVE_FORMAT_PCM | WAVE_FORMAT_IEEE_FLOAT | WAVE_FORMAT_EXTENSIBLE
        ) {
            return Err(Error::invalid_input("unsupported WAVE format tag"));
        }
        let mut float = format_tag == WAVE_FORMAT_IEEE_FLOAT;

        // Round odd bit depths up to the container's sample width; the
        // stored header keeps the original value for reconstruction.
        let sample_bits = 8 * block_align as u32 / (channels.max(1) as u32);
        if sample_bits > 0 {
            bits_per_sample =
                (((bits_per_sample as u32 + sample_bits - 1) / sample_bits) * sample_bits) as u16;
        }

        // Format extension: may redefine PCM vs float via sub-GUID.
        let extra = chunk_bytes - 16;
        if extra > 0 && extra < MAX_FORMAT_EXTRA {
            let mut extension = vec![0u8; extra as usize];
            reader.read_exact(&mut extension).map_err(Error::Read)?;
            if extension.len() >= 24 {
                let cb_size = u16::from_le_bytes([extension[0], extension[1]]);
                if cb_size == 22 {
                    let guid: [u8; 16] = extension[8..24].try_into().unwrap();
                    if guid == SUBTYPE_IEEE_FLOAT {
                        float = true;
                    } else if guid != SUBTYPE_PCM {
                        return Err(Error::invalid_input("unsupported extensible sub-format"));
                    }
                }
            }
        } else if extra >= MAX_FORMAT_EXTRA {
            source::discard(&mut reader, extra as u64)?;
        }

        if float && bits_per_sample != 32 {
            return Err(Error::invalid_input("float WAVE must be 32-bit"));
        }
        #[cfg(not(feature = "float"))]
        if float {
            return Err(Error::invalid_input("float input support is disabled"));
        }

        // Walk to the data chunk.
        let (mut label, mut chunk_bytes) = read_chunk_header(&mut reader)?;
        while &label != b"data" {
            skip_chunk(&mut reader, chunk_bytes, file_bytes)?;
            (label, chunk_bytes) = read_chunk_header(&mut reader)?;
        }

        let header_bytes = reader.stream_position().map_err(Error::Read)?;
        let format = SampleFormat {
            sample_rate,
            channels,
            bits_per_sample,
            float,
        };
        format.validate()?;
        let align = format.block_align() as u64;

        let mut data_bytes = if chunk_bytes == u32::MAX {
            file_bytes - header_bytes
        } else {
            chunk_bytes as u64
        };
        if data_bytes > file_bytes - header_bytes {
            data_bytes = file_bytes - header_bytes;
        }
        data_bytes = data_bytes / align * align;

        let desc = SourceDescription {
            format,
            total_blocks: data_bytes / align,
            header_bytes,
            terminating_bytes: file_bytes - header_bytes - data_bytes,
            flags: if float { flags::FLOATING_POINT } else { 0 },
        };

        Ok(WavSource {
            reader,
            desc,
            data_remaining: data_bytes,
        })
    }
}

fn read_chunk_header<R: Read>(reader: &mut R) -> Result<([u8; 4], u32)> {
    let mut label = [0u8; 4];
    reader.read_exact(&mut label).map_err(Error::Read)?;
    let bytes = reader.read_u32::<LittleEndian>().map_err(Error::Read)?;
    Ok((label, bytes))
}

fn skip_chunk<R: Read + Seek>(
    reader: &mut PrefixCache<R>,
    chunk_bytes: u32,
    file_bytes: u64,
) -> Result<()> {
    let pos = reader.stream_position().map_err(Error::Read)?;
    if chunk_bytes as u64 > file_bytes.saturating_sub(pos) {
        return Err(Error::invalid_input("chunk runs past end of file"));
    }
    source::discard(reader, chunk_bytes as u64)
}

impl<R: Read + Seek> InputSource for WavSource<R> {
    fn description(&self) -> &SourceDescription {
        &self.desc
    }

    fn read_blocks(&mut self, blocks: usize, buf: &mut Vec<u8>) -> Result<usize> {
        let align = self.desc.format.block_align();
        let want = ((blocks as u64 * align as u64).min(self.data_remaining)) as usize;
        let got = source::read_payload(&mut self.reader, want, buf)?;
        let whole = got / align * align;
        buf.truncate(whole);
        self.data_remaining -= whole as u64;
        Ok(whole / align)
    }

    fn header_data(&mut self) -> Result<Vec<u8>> {
        let bytes = self.desc.header_bytes;
        if (bytes as usize) <= self.reader.prefix().len() {
            return Ok(self.reader.prefix()[..bytes as usize].to_vec());
        }
        source::read_header_blob(&mut self.reader, bytes)
    }

    fn terminating_data(&mut self) -> Result<Vec<u8>> {
        source::read_terminator_blob(&mut self.reader, self.desc.terminating_bytes)
    }
}
