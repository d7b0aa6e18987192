//! The input-source contract and the container sniffing dispatch.

use std::io::{Read, Seek, SeekFrom};

use simian_core::error::{Error, Result};
use simian_core::sample::SampleFormat;
use tracing::debug;

/// What a reader learned about its container.
#[derive(Debug, Clone)]
pub struct SourceDescription {
    /// Normalized sample format.
    pub format: SampleFormat,
    /// Total audio blocks in the payload.
    pub total_blocks: u64,
    /// Bytes of container header preceding the payload.
    pub header_bytes: u64,
    /// Bytes trailing the payload (tags, LIST chunks, padding).
    pub terminating_bytes: u64,
    /// Provenance flags (see `simian_core::sample::flags`).
    pub flags: u32,
}

/// A parsed PCM container, streaming normalized sample data.
pub trait InputSource {
    /// The parsed stream description.
    fn description(&self) -> &SourceDescription;

    /// Read up to `blocks` blocks of normalized PCM into `buf` (which is
    /// cleared first); returns the number of blocks delivered. Zero means
    /// the payload is exhausted.
    fn read_blocks(&mut self, blocks: usize, buf: &mut Vec<u8>) -> Result<usize>;

    /// The verbatim container header bytes.
    fn header_data(&mut self) -> Result<Vec<u8>>;

    /// The verbatim terminator bytes.
    fn terminating_data(&mut self) -> Result<Vec<u8>>;
}

/// Sniff the stream head and hand off to the matching container parser.
pub fn open_source<R: Read + Seek + 'static>(mut reader: R) -> Result<Box<dyn InputSource>> {
    let mut head = [0u8; 64];
    let got = read_head(&mut reader, &mut head)?;
    reader.seek(SeekFrom::Start(0)).map_err(Error::Read)?;
    if got < 12 {
        return Err(Error::invalid_input("file too short to identify"));
    }

    if crate::wav::header_matches(&head) {
        debug!(container = "wav", "input identified");
        Ok(Box::new(crate::wav::WavSource::open(reader)?))
    } else if crate::aiff::header_matches(&head) {
        debug!(container = "aiff", "input identified");
        Ok(Box::new(crate::aiff::AiffSource::open(reader)?))
    } else if crate::w64::header_matches(&head) {
        debug!(container = "w64", "input identified");
        Ok(Box::new(crate::w64::W64Source::open(reader)?))
    } else if crate::snd::header_matches(&head) {
        debug!(container = "snd", "input identified");
        Ok(Box::new(crate::snd::SndSource::open(reader)?))
    } else if crate::caf::header_matches(&head) {
        debug!(container = "caf", "input identified");
        Ok(Box::new(crate::caf::CafSource::open(reader)?))
    } else {
        Err(Error::invalid_input("unrecognized container"))
    }
}

fn read_head<R: Read>(reader: &mut R, head: &mut [u8; 64]) -> Result<usize> {
    let mut filled = 0;
    while filled < head.len() {
        let n = reader.read(&mut head[filled..]).map_err(Error::Read)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

// ── Helpers shared by the concrete parsers ───────────────────────────

/// Total stream length, preserving the current position.
pub(crate) fn stream_len<R: Seek>(reader: &mut R) -> Result<u64> {
    let pos = reader.stream_position().map_err(Error::Read)?;
    let len = reader.seek(SeekFrom::End(0)).map_err(Error::Read)?;
    reader.seek(SeekFrom::Start(pos)).map_err(Error::Read)?;
    Ok(len)
}

/// Read `bytes` bytes from the start of the stream, preserving position.
pub(crate) fn read_header_blob<R: Read + Seek>(reader: &mut R, bytes: u64) -> Result<Vec<u8>> {
    if bytes == 0 {
        return Ok(Vec::new());
    }
    let pos = reader.stream_position().map_err(Error::Read)?;
    reader.seek(SeekFrom::Start(0)).map_err(Error::Read)?;
    let mut blob = vec![0u8; bytes as usize];
    reader.read_exact(&mut blob).map_err(Error::Read)?;
    reader.seek(SeekFrom::Start(pos)).map_err(Error::Read)?;
    Ok(blob)
}

/// Read `bytes` bytes from the end of the stream, preserving position.
pub(crate) fn read_terminator_blob<R: Read + Seek>(reader: &mut R, bytes: u64) -> Result<Vec<u8>> {
    if bytes == 0 {
        return Ok(Vec::new());
    }
    let pos = reader.stream_position().map_err(Error::Read)?;
    reader
        .seek(SeekFrom::End(-(bytes as i64)))
        .map_err(Error::Read)?;
    let mut blob = vec![0u8; bytes as usize];
    reader.read_exact(&mut blob).map_err(Error::Read)?;
    reader.seek(SeekFrom::Start(pos)).map_err(Error::Read)?;
    Ok(blob)
}

/// Read as much payload as is available, up to `want` bytes.
pub(crate) fn read_payload<R: Read>(
    reader: &mut R,
    want: usize,
    buf: &mut Vec<u8>,
) -> Result<usize> {
    buf.clear();
    buf.resize(want, 0);
    let mut filled = 0;
    while filled < want {
        let n = reader.read(&mut buf[filled..]).map_err(Error::Read)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(filled)
}

/// Read and discard `bytes` bytes (forward-only skip, pipe-friendly).
pub(crate) fn discard<R: Read>(reader: &mut R, mut bytes: u64) -> Result<()> {
    let mut scratch = [0u8; 4096];
    while bytes > 0 {
        let want = bytes.min(scratch.len() as u64) as usize;
        reader.read_exact(&mut scratch[..want]).map_err(Error::Read)?;
        bytes -= want as u64;
    }
    Ok(())
}

/// Bias signed 8-bit samples to the unsigned convention.
pub(crate) fn bias_signed_8_bit(buf: &mut [u8]) {
    for byte in buf {
        *byte = byte.wrapping_add(128);
    }
}

/// Swap each sample of `width` bytes into the opposite byte order.
pub(crate) fn swap_sample_bytes(buf: &mut [u8], width: usize) {
    if width <= 1 {
        return;
    }
    for sample in buf.chunks_exact_mut(width) {
        sample.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bias_8_bit() {
        let mut buf = [0x00, 0x80, 0xFF];
        bias_signed_8_bit(&mut buf);
        assert_eq!(buf, [0x80, 0x00, 0x7F]);
    }

    #[test]
    fn test_swap_24_bit() {
        let mut buf = [1, 2, 3, 4, 5, 6];
        swap_sample_bytes(&mut buf, 3);
        assert_eq!(buf, [3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn test_open_source_rejects_garbage() {
        let data = vec![0xEEu8; 128];
        assert!(open_source(std::io::Cursor::new(data)).is_err());
    }
}
