//! Frame-level encode/decode round trips across channel layouts, depths and
//! fast paths.

use simian_codec::{special, CompressionLevel, FrameDecoder, FrameEncoder};
use simian_core::range::words_to_stream;
use simian_core::SampleFormat;

fn roundtrip_frame(format: &SampleFormat, level: CompressionLevel, input: &[u8]) -> Vec<u8> {
    let max_blocks = 4096;
    let mut encoder = FrameEncoder::new(format, level, max_blocks);
    encoder.encode(input).unwrap();

    let stream = words_to_stream(encoder.frame_words(), encoder.frame_bytes() as usize);
    let blocks = input.len() / format.block_align();
    let mut decoder = FrameDecoder::new(format, level, max_blocks);
    decoder.decode(&stream, blocks).unwrap()
}

fn pack_i16(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn noise_i16(len: usize, seed: u64) -> Vec<i16> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 48) as i16
        })
        .collect()
}

#[test]
fn test_mono_16_bit_roundtrip() {
    let format = SampleFormat::pcm(44100, 1, 16);
    let samples: Vec<i16> = (0..2048)
        .map(|i| (((i as f64) * 0.02).sin() * 12_000.0) as i16)
        .collect();
    let input = pack_i16(&samples);
    assert_eq!(roundtrip_frame(&format, CompressionLevel::Normal, &input), input);
}

#[test]
fn test_stereo_16_bit_roundtrip_all_levels() {
    let format = SampleFormat::pcm(48000, 2, 16);
    let samples = noise_i16(2 * 1500, 0xfeed);
    let input = pack_i16(&samples);
    for level in [
        CompressionLevel::Fast,
        CompressionLevel::Normal,
        CompressionLevel::High,
        CompressionLevel::ExtraHigh,
        CompressionLevel::Insane,
    ] {
        assert_eq!(roundtrip_frame(&format, level, &input), input);
    }
}

#[test]
fn test_stereo_24_bit_roundtrip() {
    let format = SampleFormat::pcm(96000, 2, 24);
    let mut input = Vec::new();
    for i in 0..1024i64 {
        for ch in 0..2i64 {
            let v = (((i * 31 + ch * 17) % 16_777_216) - 8_388_608) as i32;
            input.extend_from_slice(&[(v as u32) as u8, (v as u32 >> 8) as u8, (v as u32 >> 16) as u8]);
        }
    }
    assert_eq!(roundtrip_frame(&format, CompressionLevel::High, &input), input);
}

#[test]
fn test_mono_silence_frame_is_header_only() {
    let format = SampleFormat::pcm(44100, 1, 16);
    let blocks = 1024;
    let input = vec![0u8; blocks * format.block_align()];

    let mut encoder = FrameEncoder::new(&format, CompressionLevel::Normal, 4096);
    encoder.encode(&input).unwrap();

    // CRC word + special-code word + range finalization pad of at most 8.
    assert!(encoder.frame_bytes() >= 8);
    assert!(encoder.frame_bytes() <= 16);

    let stream = words_to_stream(encoder.frame_words(), encoder.frame_bytes() as usize);
    let codes = u32::from_be_bytes(stream[4..8].try_into().unwrap());
    assert_eq!(codes, special::MONO_SILENCE);

    let mut decoder = FrameDecoder::new(&format, CompressionLevel::Normal, 4096);
    assert_eq!(decoder.decode(&stream, blocks).unwrap(), input);
}

#[test]
fn test_stereo_both_silent_roundtrip() {
    let format = SampleFormat::pcm(44100, 2, 16);
    let input = vec![0u8; 800 * format.block_align()];

    let mut encoder = FrameEncoder::new(&format, CompressionLevel::Normal, 4096);
    encoder.encode(&input).unwrap();
    let stream = words_to_stream(encoder.frame_words(), encoder.frame_bytes() as usize);
    let codes = u32::from_be_bytes(stream[4..8].try_into().unwrap());
    assert_eq!(
        codes,
        special::LEFT_SILENCE | special::RIGHT_SILENCE
    );

    let mut decoder = FrameDecoder::new(&format, CompressionLevel::Normal, 4096);
    assert_eq!(decoder.decode(&stream, 800).unwrap(), input);
}

#[test]
fn test_stereo_left_silence_roundtrip() {
    let format = SampleFormat::pcm(44100, 2, 16);
    let right = noise_i16(900, 0xabcd);
    let mut samples = Vec::with_capacity(1800);
    for &r in &right {
        samples.push(0i16);
        samples.push(r);
    }
    let input = pack_i16(&samples);

    let mut encoder = FrameEncoder::new(&format, CompressionLevel::Normal, 4096);
    encoder.encode(&input).unwrap();
    let stream = words_to_stream(encoder.frame_words(), encoder.frame_bytes() as usize);
    let codes = u32::from_be_bytes(stream[4..8].try_into().unwrap());
    assert_eq!(codes, special::LEFT_SILENCE);

    let mut decoder = FrameDecoder::new(&format, CompressionLevel::Normal, 4096);
    assert_eq!(decoder.decode(&stream, 900).unwrap(), input);
}

#[test]
fn test_pseudo_stereo_roundtrip() {
    let format = SampleFormat::pcm(44100, 2, 16);
    let mono = noise_i16(700, 0x1234);
    let mut samples = Vec::with_capacity(1400);
    for &m in &mono {
        samples.push(m);
        samples.push(m);
    }
    let input = pack_i16(&samples);

    let mut encoder = FrameEncoder::new(&format, CompressionLevel::Normal, 4096);
    encoder.encode(&input).unwrap();
    let stream = words_to_stream(encoder.frame_words(), encoder.frame_bytes() as usize);
    let codes = u32::from_be_bytes(stream[4..8].try_into().unwrap());
    assert_eq!(codes, special::PSEUDO_STEREO);

    let mut decoder = FrameDecoder::new(&format, CompressionLevel::Normal, 4096);
    assert_eq!(decoder.decode(&stream, 700).unwrap(), input);
}

#[test]
fn test_six_channel_roundtrip() {
    let format = SampleFormat::pcm(96000, 6, 16);
    let samples = noise_i16(6 * 512, 0x5555);
    let input = pack_i16(&samples);
    assert_eq!(roundtrip_frame(&format, CompressionLevel::Normal, &input), input);
}

#[test]
fn test_32_bit_integer_roundtrip() {
    let format = SampleFormat::pcm(48000, 2, 32);
    let mut input = Vec::new();
    let mut state = 0x2468_ace0_u64;
    for _ in 0..(2 * 700) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        input.extend_from_slice(&((state >> 32) as u32).to_le_bytes());
    }
    assert_eq!(roundtrip_frame(&format, CompressionLevel::Normal, &input), input);
}

#[cfg(feature = "float")]
#[test]
fn test_float_roundtrip() {
    let format = SampleFormat::ieee_float(44100, 2);
    let mut input = Vec::new();
    for i in 0..(2 * 600) {
        let v = (((i as f64) * 0.017).sin() * 0.8) as f32;
        input.extend_from_slice(&v.to_bits().to_le_bytes());
    }
    assert_eq!(roundtrip_frame(&format, CompressionLevel::ExtraHigh, &input), input);
}

#[test]
fn test_corrupt_frame_fails_crc() {
    let format = SampleFormat::pcm(44100, 2, 16);
    let samples = noise_i16(2 * 400, 0x9999);
    let input = pack_i16(&samples);

    let mut encoder = FrameEncoder::new(&format, CompressionLevel::Normal, 4096);
    encoder.encode(&input).unwrap();
    let mut stream = words_to_stream(encoder.frame_words(), encoder.frame_bytes() as usize);
    let last = stream.len() - 6;
    stream[last] ^= 0x10;

    let mut decoder = FrameDecoder::new(&format, CompressionLevel::Normal, 4096);
    assert!(decoder.decode(&stream, 400).is_err());
}
