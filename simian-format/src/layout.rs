//! On-disk descriptor, header and seek-table layout.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use simian_core::error::{Error, Result};

/// Interface version written to the descriptor; decoders reject newer.
pub const FILE_VERSION: u16 = 13;

/// Size of the descriptor on disk.
pub const DESCRIPTOR_BYTES: u32 = 52;
/// Size of the header on disk.
pub const HEADER_BYTES: u32 = 24;

/// Cap on the verbatim header or terminator blob of the source container.
pub const WAV_HEADER_OR_FOOTER_MAXIMUM_BYTES: u64 = 100 * 1024 * 1024;

const MAGIC_PCM: [u8; 4] = *b"MAC ";
const MAGIC_FLOAT: [u8; 4] = *b"MACF";

/// The leading fixed structure: sizes, version and the stream MD5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Float-compressed file (switches the magic to `MACF`).
    pub float: bool,
    /// Interface version, little-endian.
    pub version: u16,
    /// Bytes of this descriptor.
    pub descriptor_bytes: u32,
    /// Bytes of the header that follows.
    pub header_bytes: u32,
    /// Bytes of the seek table.
    pub seek_table_bytes: u32,
    /// Bytes of the stored source header blob.
    pub wav_header_bytes: u32,
    /// Bytes of compressed frame data (including the closing word).
    pub frame_data_bytes: u64,
    /// Source terminator bytes covered by the MD5.
    pub wav_terminating_bytes: u32,
    /// MD5 over header blob, frame data, terminator, header, seek table.
    pub file_md5: [u8; 16],
}

impl Descriptor {
    /// Serialize to `writer` in wire order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let put = |writer: &mut W, buf: &[u8]| writer.write_all(buf).map_err(Error::Write);

        put(writer, if self.float { &MAGIC_FLOAT } else { &MAGIC_PCM })?;
        writer
            .write_u16::<LittleEndian>(self.version)
            .map_err(Error::Write)?;
        writer.write_u16::<LittleEndian>(0).map_err(Error::Write)?;
        writer
            .write_u32::<LittleEndian>(self.descriptor_bytes)
            .map_err(Error::Write)?;
        writer
            .write_u32::<LittleEndian>(self.header_bytes)
            .map_err(Error::Write)?;
        writer
            .write_u32::<LittleEndian>(self.seek_table_bytes)
            .map_err(Error::Write)?;
        writer
            .write_u32::<LittleEndian>(self.wav_header_bytes)
            .map_err(Error::Write)?;
        writer
            .write_u32::<LittleEndian>(self.frame_data_bytes as u32)
            .map_err(Error::Write)?;
        writer
            .write_u32::<LittleEndian>((self.frame_data_bytes >> 32) as u32)
            .map_err(Error::Write)?;
        writer
            .write_u32::<LittleEndian>(self.wav_terminating_bytes)
            .map_err(Error::Write)?;
        put(writer, &self.file_md5)
    }

    /// Parse from `reader`, validating magic and version.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(Error::Read)?;
        let float = match magic {
            MAGIC_PCM => false,
            MAGIC_FLOAT => true,
            _ => return Err(Error::invalid_input("bad descriptor magic")),
        };

        let version = reader.read_u16::<LittleEndian>().map_err(Error::Read)?;
        if version > FILE_VERSION {
            return Err(Error::invalid_input(format!(
                "file version {version} is newer than supported {FILE_VERSION}"
            )));
        }
        let _padding = reader.read_u16::<LittleEndian>().map_err(Error::Read)?;

        let descriptor_bytes = reader.read_u32::<LittleEndian>().map_err(Error::Read)?;
        let header_bytes = reader.read_u32::<LittleEndian>().map_err(Error::Read)?;
        let seek_table_bytes = reader.read_u32::<LittleEndian>().map_err(Error::Read)?;
        let wav_header_bytes = reader.read_u32::<LittleEndian>().map_err(Error::Read)?;
        let frame_low = reader.read_u32::<LittleEndian>().map_err(Error::Read)?;
        let frame_high = reader.read_u32::<LittleEndian>().map_err(Error::Read)?;
        let wav_terminating_bytes = reader.read_u32::<LittleEndian>().map_err(Error::Read)?;

        let mut file_md5 = [0u8; 16];
        reader.read_exact(&mut file_md5).map_err(Error::Read)?;

        Ok(Descriptor {
            float,
            version,
            descriptor_bytes,
            header_bytes,
            seek_table_bytes,
            wav_header_bytes,
            frame_data_bytes: (frame_high as u64) << 32 | frame_low as u64,
            wav_terminating_bytes,
            file_md5,
        })
    }
}

/// The fixed audio-parameter header following the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Compression level wire value (1000..=5000).
    pub compression_level: u16,
    /// Provenance flags of the source stream.
    pub format_flags: u16,
    /// Blocks per full frame.
    pub blocks_per_frame: u32,
    /// Blocks in the final (possibly short) frame.
    pub final_frame_blocks: u32,
    /// Number of frames stored.
    pub total_frames: u32,
    /// Bits per sample.
    pub bits_per_sample: u16,
    /// Channel count.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl FileHeader {
    /// Serialize to `writer` in wire order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer
            .write_u16::<LittleEndian>(self.compression_level)
            .map_err(Error::Write)?;
        writer
            .write_u16::<LittleEndian>(self.format_flags)
            .map_err(Error::Write)?;
        writer
            .write_u32::<LittleEndian>(self.blocks_per_frame)
            .map_err(Error::Write)?;
        writer
            .write_u32::<LittleEndian>(self.final_frame_blocks)
            .map_err(Error::Write)?;
        writer
            .write_u32::<LittleEndian>(self.total_frames)
            .map_err(Error::Write)?;
        writer
            .write_u16::<LittleEndian>(self.bits_per_sample)
            .map_err(Error::Write)?;
        writer
            .write_u16::<LittleEndian>(self.channels)
            .map_err(Error::Write)?;
        writer
            .write_u32::<LittleEndian>(self.sample_rate)
            .map_err(Error::Write)
    }

    /// Parse from `reader`.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(FileHeader {
            compression_level: reader.read_u16::<LittleEndian>().map_err(Error::Read)?,
            format_flags: reader.read_u16::<LittleEndian>().map_err(Error::Read)?,
            blocks_per_frame: reader.read_u32::<LittleEndian>().map_err(Error::Read)?,
            final_frame_blocks: reader.read_u32::<LittleEndian>().map_err(Error::Read)?,
            total_frames: reader.read_u32::<LittleEndian>().map_err(Error::Read)?,
            bits_per_sample: reader.read_u16::<LittleEndian>().map_err(Error::Read)?,
            channels: reader.read_u16::<LittleEndian>().map_err(Error::Read)?,
            sample_rate: reader.read_u32::<LittleEndian>().map_err(Error::Read)?,
        })
    }

    /// Total audio blocks across all frames.
    pub fn total_blocks(&self) -> u64 {
        if self.total_frames == 0 {
            return 0;
        }
        (self.total_frames as u64 - 1) * self.blocks_per_frame as u64
            + self.final_frame_blocks as u64
    }
}
