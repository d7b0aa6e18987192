//! Sony Wave64 reader.
//!
//! The RIFF idea with 16-byte GUID labels and 64-bit sizes; chunk sizes
//! include their own 24-byte header and payloads are aligned to 8 bytes.
//! Sample data is little-endian like WAV.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use simian_core::error::{Error, Result};
use simian_core::sample::{flags, SampleFormat};

use crate::source::{self, InputSource, SourceDescription};

const GUID_RIFF: [u8; 16] = [
    b'r', b'i', b'f', b'f', 0x2E, 0x91, 0xCF, 0x11, 0xA5, 0xD6, 0x28, 0xDB, 0x04, 0xC1, 0x00, 0x00,
];
const GUID_WAVE: [u8; 16] = [
    b'w', b'a', b'v', b'e', 0xF3, 0xAC, 0xD3, 0x11, 0x8C, 0xD1, 0x00, 0xC0, 0x4F, 0x8E, 0xDB, 0x8A,
];
const GUID_FMT: [u8; 16] = [
    b'f', b'm', b't', b' ', 0xF3, 0xAC, 0xD3, 0x11, 0x8C, 0xD1, 0x00, 0xC0, 0x4F, 0x8E, 0xDB, 0x8A,
];
const GUID_DATA: [u8; 16] = [
    b'd', b'a', b't', b'a', 0xF3, 0xAC, 0xD3, 0x11, 0x8C, 0xD1, 0x00, 0xC0, 0x4F, 0x8E, 0xDB, 0x8A,
];

const WAVE_FORMAT_PCM: u16 = 1;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

fn align8(value: u64) -> u64 {
    (value + 7) & !7
}

/// Does the stream head look like a Wave64 file?
pub fn header_matches(head: &[u8; 64]) -> bool {
    head[..16] == GUID_RIFF && head[24..40] == GUID_WAVE
}

/// A parsed Wave64 input.
pub struct W64Source<R: Read + Seek> {
    reader: R,
    desc: SourceDescription,
    data_remaining: u64,
}

impl<R: Read + Seek> W64Source<R> {
    /// Parse a Wave64 stream positioned at byte zero.
    pub fn open(mut reader: R) -> Result<Self> {
        let file_bytes = source::stream_len(&mut reader)?;

        let mut guid = [0u8; 16];
        reader.read_exact(&mut guid).map_err(Error::Read)?;
        let riff_bytes = reader.read_u64::<LittleEndian>().map_err(Error::Read)?;
        if guid != GUID_RIFF || riff_bytes != file_bytes {
            return Err(Error::invalid_input("not a Wave64 stream"));
        }

        reader.read_exact(&mut guid).map_err(Error::Read)?;
        if guid != GUID_WAVE {
            return Err(Error::invalid_input("Wave64 stream is not WAVE"));
        }

        let mut format: Option<SampleFormat> = None;
        let mut header_bytes = 0u64;
        let mut data_bytes: Option<u64> = None;

        while format.is_none() || data_bytes.is_none() {
            if reader.read_exact(&mut guid).is_err() {
                break;
            }
            let chunk_bytes = reader.read_u64::<LittleEndian>().map_err(Error::Read)?;
            let remaining = chunk_bytes.saturating_sub(24);
            let pos = reader.stream_position().map_err(Error::Read)?;
            if pos + remaining > file_bytes {
                break;
            }

            if guid == GUID_FMT && remaining >= 16 {
                let format_tag = reader.read_u16::<LittleEndian>().map_err(Error::Read)?;
                let channels = reader.read_u16::<LittleEndian>().map_err(Error::Read)?;
                let sample_rate = reader.read_u32::<LittleEndian>().map_err(Error::Read)?;
                let _avg_bytes = reader.read_u32::<LittleEndian>().map_err(Error::Read)?;
                let _block_align = reader.read_u16::<LittleEndian>().map_err(Error::Read)?;
                let bits_per_sample = reader.read_u16::<LittleEndian>().map_err(Error::Read)?;

                let float = match format_tag {
                    WAVE_FORMAT_IEEE_FLOAT => true,
                    WAVE_FORMAT_PCM | WAVE_FORMAT_EXTENSIBLE => false,
                    _ => return Err(Error::invalid_input("unsupported Wave64 format tag")),
                };
                #[cfg(not(feature = "float"))]
                if float {
                    return Err(Error::invalid_input("float input support is disabled"));
                }

                let fmt = SampleFormat {
                    sample_rate,
                    channels,
                    bits_per_sample,
                    float,
                };
                fmt.validate()?;
                format = Some(fmt);

                reader
                    .seek(SeekFrom::Start(pos + align8(remaining)))
                    .map_err(Error::Read)?;
            } else if guid == GUID_DATA {
                data_bytes = Some(remaining);
                header_bytes = pos;
                if format.is_some() {
                    break;
                }
                reader
                    .seek(SeekFrom::Start(pos + align8(remaining)))
                    .map_err(Error::Read)?;
            } else {
                reader
                    .seek(SeekFrom::Start(pos + align8(remaining)))
                    .map_err(Error::Read)?;
            }
        }

        let format = format.ok_or_else(|| Error::invalid_input("missing Wave64 fmt chunk"))?;
        let mut data_bytes =
            data_bytes.ok_or_else(|| Error::invalid_input("missing Wave64 data chunk"))?;
        data_bytes = data_bytes.min(file_bytes - header_bytes);
        let align = format.block_align() as u64;
        data_bytes = data_bytes / align * align;

        let mut source_flags = flags::W64;
        if format.float {
            source_flags |= flags::FLOATING_POINT;
        }

        // Position at the start of sample data for streaming.
        reader
            .seek(SeekFrom::Start(header_bytes))
            .map_err(Error::Read)?;

        let desc = SourceDescription {
            total_blocks: data_bytes / align,
            header_bytes,
            terminating_bytes: file_bytes - header_bytes - data_bytes,
            flags: source_flags,
            format,
        };

        Ok(W64Source {
            reader,
            desc,
            data_remaining: data_bytes,
        })
    }
}

impl<R: Read + Seek> InputSource for W64Source<R> {
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
        source::read_header_blob(&mut self.reader, self.desc.header_bytes)
    }

    fn terminating_data(&mut self) -> Result<Vec<u8>> {
        source::read_terminator_blob(&mut self.reader, self.desc.terminating_bytes)
    }
}
