//! Property-based tests for the range coder.
//!
//! Uses proptest to verify that any sequence of signed residuals survives an
//! encode/finalize/decode cycle bit-exactly, with the adaptive estimator
//! kept in lockstep on both sides.

use proptest::prelude::*;
use simian_core::range::{words_to_stream, RangeReader, RangeWriter, RiceState};

fn roundtrip(values: &[i64]) -> (Vec<i64>, u32, u32) {
    let mut writer = RangeWriter::new(1024);
    writer.flush();
    let mut enc_state = RiceState::new();
    for &v in values {
        writer.encode_value(v, &mut enc_state);
    }
    writer.finalize();
    writer.advance_to_byte_boundary();

    let stream = words_to_stream(writer.words(), writer.byte_len() as usize);
    let mut reader = RangeReader::new(&stream);
    let mut dec_state = RiceState::new();
    let decoded = values
        .iter()
        .map(|_| reader.decode_value(&mut dec_state))
        .collect();
    (decoded, enc_state.k_sum, dec_state.k_sum)
}

proptest! {
    /// Small residuals, the common audio case.
    #[test]
    fn roundtrip_small_residuals(values in prop::collection::vec(-2000i64..2000, 1..400)) {
        let (decoded, enc_ksum, dec_ksum) = roundtrip(&values);
        prop_assert_eq!(decoded, values);
        prop_assert_eq!(enc_ksum, dec_ksum);
    }

    /// Full 32-bit-audio residual range.
    #[test]
    fn roundtrip_wide_residuals(values in prop::collection::vec(-(1i64 << 33)..(1i64 << 33), 1..100)) {
        let (decoded, enc_ksum, dec_ksum) = roundtrip(&values);
        prop_assert_eq!(decoded, values);
        prop_assert_eq!(enc_ksum, dec_ksum);
    }

    /// Long zero runs drive the pivot to its floor.
    #[test]
    fn roundtrip_sparse_spikes(
        spike in 1i64..(1i64 << 31),
        zeros in 1usize..600,
    ) {
        let mut values = vec![0i64; zeros];
        values.push(spike);
        values.extend(std::iter::repeat(0).take(zeros));
        values.push(-spike);

        let (decoded, enc_ksum, dec_ksum) = roundtrip(&values);
        prop_assert_eq!(decoded, values);
        prop_assert_eq!(enc_ksum, dec_ksum);
    }

    /// Interleaving aligned 32-bit words with coded values must not desync
    /// the coder as long as segments are flushed around them.
    #[test]
    fn header_word_then_values(word in any::<u32>(), values in prop::collection::vec(-500i64..500, 1..50)) {
        let mut writer = RangeWriter::new(1024);
        writer.reset();
        writer.encode_u32(word);
        writer.flush();
        let mut enc_state = RiceState::new();
        for &v in &values {
            writer.encode_value(v, &mut enc_state);
        }
        writer.finalize();
        writer.advance_to_byte_boundary();

        let stream = words_to_stream(writer.words(), writer.byte_len() as usize);
        prop_assert_eq!(u32::from_be_bytes(stream[..4].try_into().unwrap()), word);

        let mut reader = RangeReader::new(&stream[4..]);
        let mut dec_state = RiceState::new();
        for &v in &values {
            prop_assert_eq!(reader.decode_value(&mut dec_state), v);
        }
    }
}
