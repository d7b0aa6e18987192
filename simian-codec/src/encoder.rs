//! Whole-frame encoding: prepare, predict, range-code.

use simian_core::error::Result;
use simian_core::range::{RangeWriter, RiceState};
use simian_core::sample::SampleFormat;

use crate::level::CompressionLevel;
use crate::predictor::{new_predictor, ChannelPredictor};
use crate::prepare::prepare;
use crate::special;

/// Encodes one frame at a time, owning every piece of per-frame state.
///
/// A worker thread holds exactly one of these; nothing here is shared.
pub struct FrameEncoder {
    format: SampleFormat,
    max_blocks: usize,
    writer: RangeWriter,
    predictors: Vec<Box<dyn ChannelPredictor>>,
    states: Vec<RiceState>,
    data: Vec<i32>,
}

impl FrameEncoder {
    /// Build an encoder for frames of up to `max_blocks` blocks.
    pub fn new(format: &SampleFormat, level: CompressionLevel, max_blocks: usize) -> Self {
        let raw_bytes = max_blocks * format.block_align();
        let lanes = (format.channels as usize).max(2);
        FrameEncoder {
            format: *format,
            max_blocks,
            writer: RangeWriter::new(raw_bytes / 4 * 3),
            predictors: (0..lanes)
                .map(|_| new_predictor(level, format.bits_per_sample))
                .collect(),
            states: vec![RiceState::new(); lanes],
            data: vec![0; max_blocks * lanes],
        }
    }

    /// Encode one frame of normalized PCM into the internal bitstream
    /// buffer; read it back with [`frame_words`](Self::frame_words).
    pub fn encode(&mut self, input: &[u8]) -> Result<()> {
        self.writer.reset();

        let prepared = prepare(input, &self.format, self.max_blocks, &mut self.data)?;
        self.writer.encode_u32(prepared.stored_crc);
        if prepared.special_codes != 0 {
            self.writer.encode_u32(prepared.special_codes);
        }

        for predictor in &mut self.predictors {
            predictor.flush();
        }
        for state in &mut self.states {
            *state = RiceState::new();
        }
        self.writer.flush();

        let blocks = prepared.blocks;
        let codes = prepared.special_codes;
        let max = self.max_blocks;

        match self.format.channels {
            1 => {
                if codes & special::MONO_SILENCE == 0 {
                    for i in 0..blocks {
                        let residual = self.predictors[0].compress(self.data[i] as i64, 0);
                        self.writer.encode_value(residual, &mut self.states[0]);
                    }
                }
            }
            2 => {
                let both_silent = codes & special::LEFT_SILENCE != 0
                    && codes & special::RIGHT_SILENCE != 0;
                let one_silent = !both_silent
                    && codes & (special::LEFT_SILENCE | special::RIGHT_SILENCE) != 0;

                if both_silent {
                    // Nothing past the frame header.
                } else if codes & special::PSEUDO_STEREO != 0 {
                    for i in 0..blocks {
                        let residual =
                            self.predictors[1].compress(self.data[max + i] as i64, 0);
                        self.writer.encode_value(residual, &mut self.states[1]);
                    }
                } else if one_silent {
                    for i in 0..blocks {
                        let residual = self.predictors[0].compress(self.data[i] as i64, 0);
                        self.writer.encode_value(residual, &mut self.states[0]);
                    }
                } else {
                    let mut last_x = 0i64;
                    for i in 0..blocks {
                        let x = self.data[i] as i64;
                        let y = self.data[max + i] as i64;

                        let residual_y = self.predictors[1].compress(y, last_x);
                        self.writer.encode_value(residual_y, &mut self.states[1]);
                        let residual_x = self.predictors[0].compress(x, y);
                        self.writer.encode_value(residual_x, &mut self.states[0]);

                        last_x = x;
                    }
                }
            }
            channels => {
                for i in 0..blocks {
                    for ch in 0..channels as usize {
                        let residual =
                            self.predictors[ch].compress(self.data[ch * max + i] as i64, 0);
                        self.writer.encode_value(residual, &mut self.states[ch]);
                    }
                }
            }
        }

        self.writer.finalize();
        self.writer.advance_to_byte_boundary();
        Ok(())
    }

    /// The encoded frame as whole 32-bit words.
    pub fn frame_words(&self) -> &[u32] {
        self.writer.words()
    }

    /// Length of the encoded frame in bytes.
    pub fn frame_bytes(&self) -> u32 {
        self.writer.byte_len()
    }
}
