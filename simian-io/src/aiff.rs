//! AIFF / AIFC reader.
//!
//! Big-endian chunks; the COMM chunk carries the sample rate as an 80-bit
//! extended float. AIFC adds a compression id: `NONE` (big-endian PCM),
//! `sowt` (little-endian PCM) and `fl32`/`FL32` (big-endian float) are the
//! supported codings. 8-bit AIFF samples are signed and get biased to the
//! unsigned convention on read.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};
use simian_core::error::{Error, Result};
use simian_core::sample::{flags, SampleFormat};

use crate::source::{self, InputSource, SourceDescription};

/// Does the stream head look like an AIFF/AIFC file?
pub fn header_matches(head: &[u8; 64]) -> bool {
    &head[..4] == b"FORM" && matches!(&head[8..12], b"AIFF" | b"AIFC")
}

/// A parsed AIFF input.
pub struct AiffSource<R: Read + Seek> {
    reader: R,
    desc: SourceDescription,
    little_endian: bool,
    data_remaining: u64,
}

impl<R: Read + Seek> AiffSource<R> {
    /// Parse an AIFF stream positioned at byte zero.
    pub fn open(mut reader: R) -> Result<Self> {
        let file_bytes = source::stream_len(&mut reader)?;

        let mut form = [0u8; 4];
        reader.read_exact(&mut form).map_err(Error::Read)?;
        if &form != b"FORM" {
            return Err(Error::invalid_input("not a FORM stream"));
        }
        let form_bytes = reader.read_u32::<BigEndian>().map_err(Error::Read)?;
        if form_bytes as u64 != file_bytes - 8 {
            return Err(Error::invalid_input("FORM size does not match the file"));
        }

        let mut kind = [0u8; 4];
        reader.read_exact(&mut kind).map_err(Error::Read)?;
        if !matches!(&kind, b"AIFF" | b"AIFC") {
            return Err(Error::invalid_input("FORM stream is not AIFF"));
        }

        let mut format: Option<SampleFormat> = None;
        let mut frames = 0u64;
        let mut little_endian = false;
        let mut float = false;
        let mut data_bytes = 0u64;

        loop {
            let mut label = [0u8; 4];
            if reader.read_exact(&mut label).is_err() {
                return Err(Error::invalid_input("no SSND chunk found"));
            }
            let raw_bytes = reader.read_u32::<BigEndian>().map_err(Error::Read)?;
            // Chunk payloads are padded to even lengths.
            let chunk_bytes = (raw_bytes as u64 + 1) & !1;

            match &label {
                b"COMM" => {
                    if chunk_bytes < 18 {
                        return Err(Error::invalid_input("COMM chunk too short"));
                    }
                    let channels = reader.read_i16::<BigEndian>().map_err(Error::Read)?;
                    frames = reader.read_u32::<BigEndian>().map_err(Error::Read)? as u64;
                    let sample_size = reader.read_i16::<BigEndian>().map_err(Error::Read)?;
                    let rate_exponent = reader.read_u16::<BigEndian>().map_err(Error::Read)?;
                    let rate_mantissa = reader.read_u64::<BigEndian>().map_err(Error::Read)?;
                    let sample_rate = extended_to_f64(rate_exponent, rate_mantissa) as u32;

                    let extra_bytes = chunk_bytes - 18;
                    if extra_bytes > 0 {
                        let mut extra = vec![0u8; extra_bytes as usize];
                        reader.read_exact(&mut extra).map_err(Error::Read)?;
                        if extra.len() >= 4 {
                            match &extra[..4] {
                                b"NONE" => {}
                                b"sowt" => little_endian = true,
                                b"fl32" | b"FL32" => float = true,
                                _ => {
                                    return Err(Error::invalid_input(
                                        "unsupported AIFC compression",
                                    ))
                                }
                            }
                        }
                    }

                    #[cfg(not(feature = "float"))]
                    if float {
                        return Err(Error::invalid_input("float input support is disabled"));
                    }

                    let fmt = SampleFormat {
                        sample_rate,
                        channels: channels as u16,
                        bits_per_sample: sample_size as u16,
                        float,
                    };
                    fmt.validate()?;
                    format = Some(fmt);
                }
                b"SSND" => {
                    let _offset = reader.read_u32::<BigEndian>().map_err(Error::Read)?;
                    let _block_size = reader.read_u32::<BigEndian>().map_err(Error::Read)?;
                    data_bytes = chunk_bytes.saturating_sub(8);

                    let fmt = format
                        .as_ref()
                        .ok_or_else(|| Error::invalid_input("SSND before COMM"))?;
                    if frames > 0 && data_bytes / frames != fmt.block_align() as u64 {
                        return Err(Error::invalid_input("SSND size disagrees with COMM"));
                    }
                    break;
                }
                _ => {
                    reader
                        .seek(SeekFrom::Current(chunk_bytes as i64))
                        .map_err(Error::Read)?;
                }
            }
        }

        if data_bytes == 0 {
            return Err(Error::invalid_input("empty SSND chunk"));
        }

        let format = format.ok_or_else(|| Error::invalid_input("missing COMM chunk"))?;
        let header_bytes = reader.stream_position().map_err(Error::Read)?;

        let mut source_flags = flags::AIFF;
        if !little_endian {
            source_flags |= flags::BIG_ENDIAN;
        }
        if format.bits_per_sample == 8 {
            source_flags |= flags::SIGNED_8_BIT;
        }
        if float {
            source_flags |= flags::FLOATING_POINT;
        }

        let desc = SourceDescription {
            total_blocks: data_bytes / format.block_align() as u64,
            header_bytes,
            terminating_bytes: file_bytes - header_bytes - data_bytes,
            flags: source_flags,
            format,
        };

        Ok(AiffSource {
            reader,
            desc,
            little_endian,
            data_remaining: data_bytes,
        })
    }
}

/// Decode an 80-bit extended-precision sample rate.
fn extended_to_f64(exponent: u16, mantissa: u64) -> f64 {
    let sign = if exponent & 0x8000 != 0 { -1.0 } else { 1.0 };
    let scale = 2.0f64.powi((exponent & 0x7FFF) as i32 - 16446);
    mantissa as f64 * scale * sign
}

impl<R: Read + Seek> InputSource for AiffSource<R> {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extended_rate_decode() {
        // 44100 encoded as 80-bit extended: exponent 0x400E, mantissa
        // 0xAC44000000000000.
        let rate = extended_to_f64(0x400E, 0xAC44_0000_0000_0000);
        assert_eq!(rate as u32, 44100);

        let rate = extended_to_f64(0x400D, 0xAC44_0000_0000_0000);
        assert_eq!(rate as u32, 22050);
    }
}
