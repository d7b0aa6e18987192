//! Whole-frame decoding, the exact mirror of [`crate::encoder`].

use simian_core::crc::crc32;
use simian_core::error::{Error, Result};
use simian_core::range::{RangeReader, RiceState};
use simian_core::sample::SampleFormat;

use crate::level::CompressionLevel;
use crate::predictor::{new_predictor, ChannelPredictor};
use crate::prepare::{encode_sample, stored_crc, unprepare_stereo};
use crate::special;

/// Decodes one frame at a time from its sequential byte stream.
pub struct FrameDecoder {
    format: SampleFormat,
    max_blocks: usize,
    predictors: Vec<Box<dyn ChannelPredictor>>,
    states: Vec<RiceState>,
    data: Vec<i32>,
}

impl FrameDecoder {
    /// Build a decoder matching the encoder's configuration.
    pub fn new(format: &SampleFormat, level: CompressionLevel, max_blocks: usize) -> Self {
        let lanes = (format.channels as usize).max(2);
        FrameDecoder {
            format: *format,
            max_blocks,
            predictors: (0..lanes)
                .map(|_| new_predictor(level, format.bits_per_sample))
                .collect(),
            states: vec![RiceState::new(); lanes],
            data: vec![0; max_blocks * lanes],
        }
    }

    /// Decode `blocks` blocks from `stream` (the frame's bytes in
    /// sequential order) and return the normalized PCM, verifying the CRC.
    pub fn decode(&mut self, stream: &[u8], blocks: usize) -> Result<Vec<u8>> {
        if blocks > self.max_blocks {
            return Err(Error::bad_parameter("frame exceeds the configured maximum"));
        }
        if stream.len() < 4 {
            return Err(Error::invalid_input("frame too short for its header"));
        }

        let stored = u32::from_be_bytes(stream[..4].try_into().unwrap());
        let has_codes = stored & 0x8000_0000 != 0;
        let mut offset = 4;
        let codes = if has_codes {
            if stream.len() < 8 {
                return Err(Error::invalid_input("frame too short for special codes"));
            }
            offset = 8;
            u32::from_be_bytes(stream[4..8].try_into().unwrap())
        } else {
            0
        };

        for predictor in &mut self.predictors {
            predictor.flush();
        }
        for state in &mut self.states {
            *state = RiceState::new();
        }
        let max = self.max_blocks;
        let lanes = self.predictors.len();
        for lane in 0..lanes {
            self.data[lane * max..lane * max + blocks].fill(0);
        }

        let mut reader = RangeReader::new(&stream[offset..]);

        match self.format.channels {
            1 => {
                if codes & special::MONO_SILENCE == 0 {
                    for i in 0..blocks {
                        let residual = reader.decode_value(&mut self.states[0]);
                        self.data[i] = self.predictors[0].decompress(residual, 0) as i32;
                    }
                }
            }
            2 => {
                let both_silent = codes & special::LEFT_SILENCE != 0
                    && codes & special::RIGHT_SILENCE != 0;
                let one_silent = !both_silent
                    && codes & (special::LEFT_SILENCE | special::RIGHT_SILENCE) != 0;

                if both_silent {
                    // Streams are empty; both channels stay zero.
                } else if codes & special::PSEUDO_STEREO != 0 {
                    for i in 0..blocks {
                        let residual = reader.decode_value(&mut self.states[1]);
                        self.data[max + i] = self.predictors[1].decompress(residual, 0) as i32;
                    }
                } else if one_silent {
                    for i in 0..blocks {
                        let residual = reader.decode_value(&mut self.states[0]);
                        self.data[i] = self.predictors[0].decompress(residual, 0) as i32;
                    }
                } else {
                    let mut last_x = 0i64;
                    for i in 0..blocks {
                        let residual_y = reader.decode_value(&mut self.states[1]);
                        let residual_x = reader.decode_value(&mut self.states[0]);

                        let y = self.predictors[1].decompress(residual_y, last_x);
                        let x = self.predictors[0].decompress(residual_x, y);
                        self.data[max + i] = y as i32;
                        self.data[i] = x as i32;

                        last_x = x;
                    }
                }
            }
            channels => {
                for i in 0..blocks {
                    for ch in 0..channels as usize {
                        let residual = reader.decode_value(&mut self.states[ch]);
                        self.data[ch * max + i] =
                            self.predictors[ch].decompress(residual, 0) as i32;
                    }
                }
            }
        }

        // Rebuild the normalized byte image.
        let mut out = Vec::with_capacity(blocks * self.format.block_align());
        match self.format.channels {
            1 => {
                for i in 0..blocks {
                    encode_sample(self.data[i], &self.format, &mut out);
                }
            }
            2 => {
                unprepare_stereo(
                    &self.data[..blocks],
                    &self.data[max..max + blocks],
                    codes,
                    &self.format,
                    &mut out,
                );
            }
            channels => {
                for i in 0..blocks {
                    for ch in 0..channels as usize {
                        encode_sample(self.data[ch * max + i], &self.format, &mut out);
                    }
                }
            }
        }

        if stored_crc(crc32(&out), has_codes) != stored {
            return Err(Error::invalid_input("frame CRC mismatch"));
        }
        Ok(out)
    }
}
