//! Prefix-caching reader.
//!
//! The WAV parser never seeks while analyzing a file, so wrapping its input
//! in a [`PrefixCache`] keeps the raw header bytes available afterwards
//! without re-reading; the same trick lets header sniffing work on inputs
//! where seeking is expensive.

use std::io::{Read, Seek, SeekFrom};

/// How much of the stream head is retained.
pub const PREFIX_CACHE_BYTES: usize = 256 * 1024;

/// A reader that remembers the contiguous prefix it has streamed.
pub struct PrefixCache<R> {
    inner: R,
    cache: Vec<u8>,
    position: u64,
}

impl<R> PrefixCache<R> {
    /// Wrap a reader positioned at the start of the stream.
    pub fn new(inner: R) -> Self {
        PrefixCache {
            inner,
            cache: Vec::new(),
            position: 0,
        }
    }

    /// The cached stream prefix (everything read sequentially from offset
    /// zero, up to the cache limit).
    pub fn prefix(&self) -> &[u8] {
        &self.cache
    }
}

impl<R: Read> Read for PrefixCache<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        // Only a read that extends the contiguous frontier is cached.
        if self.position == self.cache.len() as u64 && self.cache.len() < PREFIX_CACHE_BYTES {
            let keep = n.min(PREFIX_CACHE_BYTES - self.cache.len());
            self.cache.extend_from_slice(&buf[..keep]);
        }
        self.position += n as u64;
        Ok(n)
    }
}

impl<R: Seek> Seek for PrefixCache<R> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let new_pos = self.inner.seek(pos)?;
        self.position = new_pos;
        Ok(new_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_prefix_is_cached() {
        let data: Vec<u8> = (0..100u8).collect();
        let mut reader = PrefixCache::new(Cursor::new(data.clone()));

        let mut buf = [0u8; 30];
        reader.read_exact(&mut buf).unwrap();
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(reader.prefix(), &data[..60]);
    }

    #[test]
    fn test_reads_after_seek_do_not_corrupt_cache() {
        let data: Vec<u8> = (0..100u8).collect();
        let mut reader = PrefixCache::new(Cursor::new(data.clone()));

        let mut buf = [0u8; 10];
        reader.read_exact(&mut buf).unwrap();
        reader.seek(SeekFrom::Start(50)).unwrap();
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(reader.prefix(), &data[..10]);

        // Returning to the frontier resumes caching.
        reader.seek(SeekFrom::Start(10)).unwrap();
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(reader.prefix(), &data[..20]);
    }
}
