//! Container parsing tests over synthetic files.

use std::io::Cursor;

use simian_core::sample::flags;
use simian_io::open_source;

fn le16(v: u16) -> [u8; 2] {
    v.to_le_bytes()
}
fn le32(v: u32) -> [u8; 4] {
    v.to_le_bytes()
}
fn be16(v: u16) -> [u8; 2] {
    v.to_be_bytes()
}
fn be32(v: u32) -> [u8; 4] {
    v.to_be_bytes()
}

fn build_wav(payload: &[u8], channels: u16, rate: u32, bits: u16, trailer: &[u8]) -> Vec<u8> {
    let block_align = channels * bits / 8;
    let mut file = Vec::new();
    file.extend_from_slice(b"RIFF");
    file.extend_from_slice(&le32(36 + payload.len() as u32 + trailer.len() as u32));
    file.extend_from_slice(b"WAVE");
    file.extend_from_slice(b"fmt ");
    file.extend_from_slice(&le32(16));
    file.extend_from_slice(&le16(1));
    file.extend_from_slice(&le16(channels));
    file.extend_from_slice(&le32(rate));
    file.extend_from_slice(&le32(rate * block_align as u32));
    file.extend_from_slice(&le16(block_align));
    file.extend_from_slice(&le16(bits));
    file.extend_from_slice(b"data");
    file.extend_from_slice(&le32(payload.len() as u32));
    file.extend_from_slice(payload);
    file.extend_from_slice(trailer);
    file
}

#[test]
fn test_wav_basic() {
    let payload: Vec<u8> = (0..64u8).collect();
    let trailer = b"LIST\x04\x00\x00\x00INFO";
    let file = build_wav(&payload, 2, 44100, 16, trailer);

    let mut source = open_source(Cursor::new(file.clone())).unwrap();
    let desc = source.description().clone();
    assert_eq!(desc.format.sample_rate, 44100);
    assert_eq!(desc.format.channels, 2);
    assert_eq!(desc.format.bits_per_sample, 16);
    assert!(!desc.format.float);
    assert_eq!(desc.header_bytes, 44);
    assert_eq!(desc.total_blocks, 16);
    assert_eq!(desc.terminating_bytes, trailer.len() as u64);
    assert_eq!(desc.flags, 0);

    let mut buf = Vec::new();
    assert_eq!(source.read_blocks(16, &mut buf).unwrap(), 16);
    assert_eq!(buf, payload);
    assert_eq!(source.read_blocks(16, &mut buf).unwrap(), 0);

    assert_eq!(source.header_data().unwrap(), file[..44].to_vec());
    assert_eq!(source.terminating_data().unwrap(), trailer.to_vec());
}

#[test]
fn test_wav_skips_leading_chunks() {
    let payload = [1u8, 2, 3, 4];
    let mut file = Vec::new();
    file.extend_from_slice(b"RIFF");
    file.extend_from_slice(&le32(0)); // size is untrusted
    file.extend_from_slice(b"WAVE");
    file.extend_from_slice(b"junk");
    file.extend_from_slice(&le32(6));
    file.extend_from_slice(b"ABCDEF");
    file.extend_from_slice(b"fmt ");
    file.extend_from_slice(&le32(16));
    file.extend_from_slice(&le16(1));
    file.extend_from_slice(&le16(1));
    file.extend_from_slice(&le32(8000));
    file.extend_from_slice(&le32(16000));
    file.extend_from_slice(&le16(2));
    file.extend_from_slice(&le16(16));
    file.extend_from_slice(b"fact");
    file.extend_from_slice(&le32(4));
    file.extend_from_slice(&le32(2));
    file.extend_from_slice(b"data");
    file.extend_from_slice(&le32(payload.len() as u32));
    file.extend_from_slice(&payload);

    let mut source = open_source(Cursor::new(file)).unwrap();
    assert_eq!(source.description().total_blocks, 2);

    let mut buf = Vec::new();
    source.read_blocks(2, &mut buf).unwrap();
    assert_eq!(buf, payload);
}

#[test]
fn test_wav_extensible_float_guid() {
    let payload = [0u8; 8];
    let mut file = Vec::new();
    file.extend_from_slice(b"RIFF");
    file.extend_from_slice(&le32(0));
    file.extend_from_slice(b"WAVE");
    file.extend_from_slice(b"fmt ");
    file.extend_from_slice(&le32(40));
    file.extend_from_slice(&le16(0xFFFE));
    file.extend_from_slice(&le16(1));
    file.extend_from_slice(&le32(48000));
    file.extend_from_slice(&le32(48000 * 4));
    file.extend_from_slice(&le16(4));
    file.extend_from_slice(&le16(32));
    file.extend_from_slice(&le16(22)); // cbSize
    file.extend_from_slice(&le16(32)); // valid bits
    file.extend_from_slice(&le32(0)); // channel mask
    file.extend_from_slice(&[3, 0, 0, 0, 0, 0, 16, 0, 128, 0, 0, 170, 0, 56, 155, 113]);
    file.extend_from_slice(b"data");
    file.extend_from_slice(&le32(payload.len() as u32));
    file.extend_from_slice(&payload);

    let source = open_source(Cursor::new(file)).unwrap();
    let desc = source.description();
    assert!(desc.format.float);
    assert_eq!(desc.flags, flags::FLOATING_POINT);
}

#[test]
fn test_aiff_8_bit_signed_bias_and_terminator() {
    // 22.05 kHz mono 8-bit AIFF with a trailing tag blob.
    let samples: &[u8] = &[0x00, 0x80, 0xFF, 0x01, 0x7F, 0xFE]; // signed source bytes
    let trailer = b"ANNO\x02\x00hi";

    let mut file = Vec::new();
    file.extend_from_slice(b"FORM");
    let form_size_at = file.len();
    file.extend_from_slice(&be32(0)); // patched below
    file.extend_from_slice(b"AIFF");
    file.extend_from_slice(b"COMM");
    file.extend_from_slice(&be32(18));
    file.extend_from_slice(&be16(1)); // channels
    file.extend_from_slice(&be32(samples.len() as u32)); // frames
    file.extend_from_slice(&be16(8)); // sample size
    file.extend_from_slice(&be16(0x400D)); // 22050 as 80-bit extended
    file.extend_from_slice(&0xAC44_0000_0000_0000u64.to_be_bytes());
    file.extend_from_slice(b"SSND");
    file.extend_from_slice(&be32(8 + samples.len() as u32));
    file.extend_from_slice(&be32(0)); // offset
    file.extend_from_slice(&be32(0)); // block size
    file.extend_from_slice(samples);
    let header_bytes = file.len() - samples.len();
    file.extend_from_slice(trailer);
    let form_size = (file.len() - 8) as u32;
    file[form_size_at..form_size_at + 4].copy_from_slice(&be32(form_size));

    let mut source = open_source(Cursor::new(file.clone())).unwrap();
    let desc = source.description().clone();
    assert_eq!(desc.format.sample_rate, 22050);
    assert_eq!(desc.format.bits_per_sample, 8);
    assert_eq!(desc.header_bytes, header_bytes as u64);
    assert_eq!(desc.terminating_bytes, trailer.len() as u64);
    assert_ne!(desc.flags & flags::AIFF, 0);
    assert_ne!(desc.flags & flags::SIGNED_8_BIT, 0);

    let mut buf = Vec::new();
    source.read_blocks(samples.len(), &mut buf).unwrap();
    // Signed bytes biased to the unsigned convention.
    assert_eq!(buf, vec![0x80, 0x00, 0x7F, 0x81, 0xFF, 0x7E]);

    assert_eq!(source.terminating_data().unwrap(), trailer.to_vec());
}

#[test]
fn test_aiff_16_bit_is_byte_swapped() {
    let samples_be: &[u8] = &[0x12, 0x34, 0xAB, 0xCD];

    let mut file = Vec::new();
    file.extend_from_slice(b"FORM");
    let form_size_at = file.len();
    file.extend_from_slice(&be32(0));
    file.extend_from_slice(b"AIFF");
    file.extend_from_slice(b"COMM");
    file.extend_from_slice(&be32(18));
    file.extend_from_slice(&be16(1));
    file.extend_from_slice(&be32(2));
    file.extend_from_slice(&be16(16));
    file.extend_from_slice(&be16(0x400E));
    file.extend_from_slice(&0xAC44_0000_0000_0000u64.to_be_bytes());
    file.extend_from_slice(b"SSND");
    file.extend_from_slice(&be32(8 + samples_be.len() as u32));
    file.extend_from_slice(&be32(0));
    file.extend_from_slice(&be32(0));
    file.extend_from_slice(samples_be);
    let form_size = (file.len() - 8) as u32;
    file[form_size_at..form_size_at + 4].copy_from_slice(&be32(form_size));

    let mut source = open_source(Cursor::new(file)).unwrap();
    assert_ne!(source.description().flags & flags::BIG_ENDIAN, 0);

    let mut buf = Vec::new();
    source.read_blocks(2, &mut buf).unwrap();
    assert_eq!(buf, vec![0x34, 0x12, 0xCD, 0xAB]);
}

#[test]
fn test_w64_basic() {
    let payload = [9u8, 8, 7, 6, 5, 4, 3, 2];

    const GUID_RIFF: [u8; 16] = [
        b'r', b'i', b'f', b'f', 0x2E, 0x91, 0xCF, 0x11, 0xA5, 0xD6, 0x28, 0xDB, 0x04, 0xC1,
        0x00, 0x00,
    ];
    const GUID_WAVE: [u8; 16] = [
        b'w', b'a', b'v', b'e', 0xF3, 0xAC, 0xD3, 0x11, 0x8C, 0xD1, 0x00, 0xC0, 0x4F, 0x8E,
        0xDB, 0x8A,
    ];
    const GUID_FMT: [u8; 16] = [
        b'f', b'm', b't', b' ', 0xF3, 0xAC, 0xD3, 0x11, 0x8C, 0xD1, 0x00, 0xC0, 0x4F, 0x8E,
        0xDB, 0x8A,
    ];
    const GUID_DATA: [u8; 16] = [
        b'd', b'a', b't', b'a', 0xF3, 0xAC, 0xD3, 0x11, 0x8C, 0xD1, 0x00, 0xC0, 0x4F, 0x8E,
        0xDB, 0x8A,
    ];

    let mut file = Vec::new();
    file.extend_from_slice(&GUID_RIFF);
    let riff_size_at = file.len();
    file.extend_from_slice(&[0u8; 8]);
    file.extend_from_slice(&GUID_WAVE);
    file.extend_from_slice(&GUID_FMT);
    file.extend_from_slice(&(24u64 + 16).to_le_bytes());
    file.extend_from_slice(&le16(1));
    file.extend_from_slice(&le16(2));
    file.extend_from_slice(&le32(48000));
    file.extend_from_slice(&le32(48000 * 4));
    file.extend_from_slice(&le16(4));
    file.extend_from_slice(&le16(16));
    file.extend_from_slice(&GUID_DATA);
    file.extend_from_slice(&(24u64 + payload.len() as u64).to_le_bytes());
    file.extend_from_slice(&payload);
    let total = file.len() as u64;
    file[riff_size_at..riff_size_at + 8].copy_from_slice(&total.to_le_bytes());

    let mut source = open_source(Cursor::new(file)).unwrap();
    let desc = source.description().clone();
    assert_eq!(desc.flags, flags::W64);
    assert_eq!(desc.format.channels, 2);
    assert_eq!(desc.total_blocks, 2);

    let mut buf = Vec::new();
    source.read_blocks(2, &mut buf).unwrap();
    assert_eq!(buf, payload);
}

#[test]
fn test_au_big_endian_16_bit() {
    let payload_be = [0x01u8, 0x02, 0xFF, 0xFE];
    let annotation = b"notes\0\0\0";

    let mut file = Vec::new();
    file.extend_from_slice(b".snd");
    file.extend_from_slice(&be32(24 + annotation.len() as u32));
    file.extend_from_slice(&be32(payload_be.len() as u32));
    file.extend_from_slice(&be32(3)); // 16-bit PCM
    file.extend_from_slice(&be32(8000));
    file.extend_from_slice(&be32(1));
    file.extend_from_slice(annotation);
    file.extend_from_slice(&payload_be);

    let mut source = open_source(Cursor::new(file)).unwrap();
    let desc = source.description().clone();
    assert_ne!(desc.flags & flags::SND, 0);
    assert_ne!(desc.flags & flags::BIG_ENDIAN, 0);
    assert_eq!(desc.header_bytes, 24 + annotation.len() as u64);
    assert_eq!(desc.total_blocks, 2);

    let mut buf = Vec::new();
    source.read_blocks(2, &mut buf).unwrap();
    assert_eq!(buf, vec![0x02, 0x01, 0xFE, 0xFF]);
}

#[test]
fn test_caf_big_endian_16_bit() {
    let payload_be = [0x00u8, 0x10, 0x80, 0x00];

    let mut file = Vec::new();
    file.extend_from_slice(b"caff");
    file.extend_from_slice(&be16(1));
    file.extend_from_slice(&be16(0));
    file.extend_from_slice(b"desc");
    file.extend_from_slice(&32u64.to_be_bytes());
    file.extend_from_slice(&44100.0f64.to_bits().to_be_bytes());
    file.extend_from_slice(b"lpcm");
    file.extend_from_slice(&be32(0)); // integer, big-endian
    file.extend_from_slice(&be32(4)); // bytes per packet
    file.extend_from_slice(&be32(1)); // frames per packet
    file.extend_from_slice(&be32(2)); // channels
    file.extend_from_slice(&be32(16)); // bits
    file.extend_from_slice(b"data");
    file.extend_from_slice(&(payload_be.len() as u64).to_be_bytes());
    file.extend_from_slice(&payload_be);

    let mut source = open_source(Cursor::new(file)).unwrap();
    let desc = source.description().clone();
    assert_ne!(desc.flags & flags::CAF, 0);
    assert_ne!(desc.flags & flags::BIG_ENDIAN, 0);
    assert_eq!(desc.format.sample_rate, 44100);
    assert_eq!(desc.total_blocks, 1);

    let mut buf = Vec::new();
    source.read_blocks(1, &mut buf).unwrap();
    assert_eq!(buf, vec![0x10, 0x00, 0x00, 0x80]);
}
