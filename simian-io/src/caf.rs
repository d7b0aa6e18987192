//! Core Audio Format reader.
//!
//! Big-endian chunked container: a `desc` chunk fixes the `lpcm` layout
//! (float and little-endian flags, channels, bit depth) and the `data`
//! chunk carries the payload. 8-bit CAF samples are signed.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};
use simian_core::error::{Error, Result};
use simian_core::sample::{flags, SampleFormat};

use crate::source::{self, InputSource, SourceDescription};

const FORMAT_FLAG_FLOAT: u32 = 1 << 0;
const FORMAT_FLAG_LITTLE_ENDIAN: u32 = 1 << 1;

/// Does the stream head look like a CAF v1 file?
pub fn header_matches(head: &[u8; 64]) -> bool {
    &head[..4] == b"caff" && u16::from_be_bytes([head[4], head[5]]) == 1
}

/// A parsed CAF input.
pub struct CafSource<R: Read + Seek> {
    reader: R,
    desc: SourceDescription,
    little_endian: bool,
    data_remaining: u64,
}

impl<R: Read + Seek> CafSource<R> {
    /// Parse a CAF stream positioned at byte zero.
    pub fn open(mut reader: R) -> Result<Self> {
        let file_bytes = source::stream_len(&mut reader)?;

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(Error::Read)?;
        let version = reader.read_u16::<BigEndian>().map_err(Error::Read)?;
        let _file_flags = reader.read_u16::<BigEndian>().map_err(Error::Read)?;
        if &magic != b"caff" || version != 1 {
            return Err(Error::invalid_input("not a CAF v1 stream"));
        }

        let mut format: Option<SampleFormat> = None;
        let mut little_endian = false;
        let header_bytes;
        let data_bytes;

        loop {
            let mut chunk_type = [0u8; 4];
            if reader.read_exact(&mut chunk_type).is_err() {
                return Err(Error::invalid_input("no CAF data chunk found"));
            }
            let chunk_bytes = reader.read_u64::<BigEndian>().map_err(Error::Read)?;

            match &chunk_type {
                b"desc" => {
                    if chunk_bytes != 32 {
                        return Err(Error::invalid_input("bad CAF desc chunk size"));
                    }
                    let sample_rate =
                        f64::from_bits(reader.read_u64::<BigEndian>().map_err(Error::Read)?);
                    let mut format_id = [0u8; 4];
                    reader.read_exact(&mut format_id).map_err(Error::Read)?;
                    if &format_id != b"lpcm" {
                        return Err(Error::invalid_input("CAF stream is not linear PCM"));
                    }
                    let format_flags = reader.read_u32::<BigEndian>().map_err(Error::Read)?;
                    let _bytes_per_packet = reader.read_u32::<BigEndian>().map_err(Error::Read)?;
                    let _frames_per_packet =
                        reader.read_u32::<BigEndian>().map_err(Error::Read)?;
                    let channels = reader.read_u32::<BigEndian>().map_err(Error::Read)?;
                    let bits_per_channel = reader.read_u32::<BigEndian>().map_err(Error::Read)?;

                    let float = format_flags & FORMAT_FLAG_FLOAT != 0;
                    if float && bits_per_channel != 32 {
                        return Err(Error::invalid_input("float CAF must be 32-bit"));
                    }
                    #[cfg(not(feature = "float"))]
                    if float {
                        return Err(Error::invalid_input("float input support is disabled"));
                    }
                    little_endian = format_flags & FORMAT_FLAG_LITTLE_ENDIAN != 0;

                    let fmt = SampleFormat {
                        sample_rate: sample_rate as u32,
                        channels: channels as u16,
                        bits_per_sample: bits_per_channel as u16,
                        float,
                    };
                    fmt.validate()?;
                    format = Some(fmt);
                }
                b"data" => {
                    let fmt = format
                        .as_ref()
                        .ok_or_else(|| Error::invalid_input("CAF data before desc"))?;
                    header_bytes = reader.stream_position().map_err(Error::Read)?;
                    let align = fmt.block_align() as u64;
                    data_bytes = chunk_bytes.min(file_bytes - header_bytes) / align * align;
                    break;
                }
                _ => {
                    reader
                        .seek(SeekFrom::Current(chunk_bytes as i64))
                        .map_err(Error::Read)?;
                }
            }
        }

        let format = format.ok_or_else(|| Error::invalid_input("missing CAF desc chunk"))?;

        let mut source_flags = flags::CAF;
        if !little_endian {
            source_flags |= flags::BIG_ENDIAN;
        }
        if format.bits_per_sample == 8 {
            source_flags |= flags::SIGNED_8_BIT;
        }
        if format.float {
            source_flags |= flags::FLOATING_POINT;
        }

        let desc = SourceDescription {
            total_blocks: data_bytes / format.block_align() as u64,
            header_bytes,
            terminating_bytes: file_bytes - header_bytes - data_bytes,
            flags: source_flags,
            format,
        };

        Ok(CafSource {
            reader,
            desc,
            little_endian,
            data_remaining: data_bytes,
        })
    }
}

impl<R: Read + Seek> InputSource for CafSource<R> {
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

        if self.desc.format.bits_per_sample == 8 {
            source::bias_signed_8_bit(buf);
        } else if !self.little_endian {
            source::swap_sample_bytes(buf, self.desc.format.bytes_per_sample());
        }
        Ok(whole / align)
    }

    fn header_data(&mut self) -> Result<Vec<u8>> {
        source::read_header_blob(&mut self.reader, self.desc.header_bytes)
    }

    fn terminating_data(&mut self) -> Result<Vec<u8>> {
        source::read_terminator_blob(&mut self.reader, self.desc.terminating_bytes)
    }
}
