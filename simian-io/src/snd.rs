//! AU (NeXT/Sun `.snd`) reader.
//!
//! A 24-byte header in either byte order: `.snd` magic means big-endian
//! fields and payload, `dns.` the reverse. Encodings 2 through 6 cover
//! signed PCM at 8/16/24/32 bits plus 32-bit float; 8-bit data is signed
//! and biased to unsigned on read.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use simian_core::error::{Error, Result};
use simian_core::sample::{flags, SampleFormat};

use crate::source::{self, InputSource, SourceDescription};

/// Does the stream head look like an AU file?
pub fn header_matches(head: &[u8; 64]) -> bool {
    matches!(&head[..4], b".snd" | b"dns.")
}

/// A parsed AU input.
pub struct SndSource<R: Read + Seek> {
    reader: R,
    desc: SourceDescription,
    big_endian: bool,
    data_remaining: u64,
}

impl<R: Read + Seek> SndSource<R> {
    /// Parse an AU stream positioned at byte zero.
    pub fn open(mut reader: R) -> Result<Self> {
        let file_bytes = source::stream_len(&mut reader)?;

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(Error::Read)?;
        let big_endian = match &magic {
            b".snd" => true,
            b"dns." => false,
            _ => return Err(Error::invalid_input("not an AU stream")),
        };

        let mut fields = [0u32; 5];
        for field in &mut fields {
            *field = if big_endian {
                reader.read_u32::<BigEndian>().map_err(Error::Read)?
            } else {
                reader.read_u32::<LittleEndian>().map_err(Error::Read)?
            };
        }
        let [data_offset, data_size, encoding, sample_rate, channels] = fields;

        if (data_offset as u64) < 24 || data_offset as u64 >= file_bytes {
            return Err(Error::invalid_input("bad AU data offset"));
        }

        let (bits_per_sample, float) = match encoding {
            2 => (8u16, false),
            3 => (16, false),
            4 => (24, false),
            5 => (32, false),
            6 => (32, true),
            _ => return Err(Error::invalid_input("unsupported AU encoding")),
        };
        #[cfg(not(feature = "float"))]
        if float {
            return Err(Error::invalid_input("float input support is disabled"));
        }

        let format = SampleFormat {
            sample_rate,
            channels: channels as u16,
            bits_per_sample,
            float,
        };
        format.validate()?;

        let header_bytes = data_offset as u64;
        let mut data_bytes = file_bytes - header_bytes;
        if data_size > 0 {
            data_bytes = data_bytes.min(data_size as u64);
        }
        let align = format.block_align() as u64;
        data_bytes = data_bytes / align * align;

        let mut source_flags = flags::SND;
        if big_endian {
            source_flags |= flags::BIG_ENDIAN;
        }
        if bits_per_sample == 8 {
            source_flags |= flags::SIGNED_8_BIT;
        }
        if float {
            source_flags |= flags::FLOATING_POINT;
        }

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

        Ok(SndSource {
            reader,
            desc,
            big_endian,
            data_remaining: data_bytes,
        })
    }
}

impl<R: Read + Seek> InputSource for SndSource<R> {
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
        } else if self.big_endian {
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
