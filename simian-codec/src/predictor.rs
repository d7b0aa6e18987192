//! The prediction cascade: long-term tap, short-term mixer, neural stages.
//!
//! Every layer adapts by residual sign only, so the decompress direction can
//! replay the identical updates from values it has already reconstructed.
//! The long-term layer also takes a cross-channel context sample; stereo
//! frames feed the other channel's value there.

use simian_core::history::HistoryBuffer;

use crate::level::CompressionLevel;
use crate::nnfilter::{FilterData, NnFilter};

const LONG_TERM_SHIFT: u32 = 12;
const SHORT_TERM_SHIFT: u32 = 9;

#[inline]
fn sign(value: i64) -> i64 {
    match value.cmp(&0) {
        std::cmp::Ordering::Greater => 1,
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
    }
}

/// One-tap predictor at a fixed lag with a learned gain, plus a learned
/// gain on the cross-channel context sample.
struct LongTermFilter {
    history: HistoryBuffer<i64>,
    lag: isize,
    gain: i64,
    context_gain: i64,
}

impl LongTermFilter {
    fn new(lag: usize) -> Self {
        LongTermFilter {
            history: HistoryBuffer::new(lag),
            lag: lag as isize,
            gain: 0,
            context_gain: 0,
        }
    }

    fn flush(&mut self) {
        self.history.flush();
        self.gain = 0;
        self.context_gain = 0;
    }

    #[inline]
    fn predict(&self, context: i64) -> (i64, i64) {
        let tap = self.history.get(-self.lag);
        let prediction = (self.gain * tap + self.context_gain * context) >> LONG_TERM_SHIFT;
        (prediction, tap)
    }

    #[inline]
    fn adapt(&mut self, residual: i64, tap: i64, context: i64) {
        if residual > 0 {
            self.gain += sign(tap);
            self.context_gain += sign(context);
        } else if residual < 0 {
            self.gain -= sign(tap);
            self.context_gain -= sign(context);
        }
    }

    #[inline]
    fn compress(&mut self, input: i64, context: i64) -> i64 {
        let (prediction, tap) = self.predict(context);
        let residual = input - prediction;
        self.adapt(residual, tap, context);
        self.history.set(0, input);
        self.history.advance();
        residual
    }

    #[inline]
    fn decompress(&mut self, residual: i64, context: i64) -> i64 {
        let (prediction, tap) = self.predict(context);
        let input = residual + prediction;
        self.adapt(residual, tap, context);
        self.history.set(0, input);
        self.history.advance();
        input
    }
}

/// Two running coefficients mixing the previous input against the previous
/// residual.
struct ShortTermFilter {
    input_gain: i64,
    residual_gain: i64,
    last_input: i64,
    last_residual: i64,
}

impl ShortTermFilter {
    fn new() -> Self {
        ShortTermFilter {
            input_gain: 0,
            residual_gain: 0,
            last_input: 0,
            last_residual: 0,
        }
    }

    fn flush(&mut self) {
        *self = ShortTermFilter::new();
    }

    #[inline]
    fn predict(&self) -> i64 {
        (self.input_gain * self.last_input + self.residual_gain * self.last_residual)
            >> SHORT_TERM_SHIFT
    }

    #[inline]
    fn adapt(&mut self, residual: i64) {
        if residual > 0 {
            self.input_gain += sign(self.last_input);
            self.residual_gain += sign(self.last_residual);
        } else if residual < 0 {
            self.input_gain -= sign(self.last_input);
            self.residual_gain -= sign(self.last_residual);
        }
    }

    #[inline]
    fn compress(&mut self, input: i64) -> i64 {
        let residual = input - self.predict();
        self.adapt(residual);
        self.last_input = input;
        self.last_residual = residual;
        residual
    }

    #[inline]
    fn decompress(&mut self, residual: i64) -> i64 {
        let input = residual + self.predict();
        self.adapt(residual);
        self.last_input = input;
        self.last_residual = residual;
        input
    }
}

/// A complete per-channel predictor for one frame stream.
pub struct Predictor<D: FilterData> {
    long_term: Option<LongTermFilter>,
    short_term: ShortTermFilter,
    stages: Vec<NnFilter<D>>,
}

impl<D: FilterData> Predictor<D> {
    /// Build the cascade for one compression level.
    pub fn new(level: CompressionLevel) -> Self {
        Predictor {
            long_term: level.long_term_lag().map(LongTermFilter::new),
            short_term: ShortTermFilter::new(),
            stages: level
                .filter_stages()
                .iter()
                .map(|&(order, shift)| NnFilter::new(order, shift))
                .collect(),
        }
    }
}

/// The two predictor instantiations behind one object-safe seam.
pub trait ChannelPredictor: Send {
    /// Reset all adaptive state at a frame boundary.
    fn flush(&mut self);
    /// Turn one sample into a residual; `context` is the cross-channel side
    /// input (zero outside the stereo both-channel path).
    fn compress(&mut self, input: i64, context: i64) -> i64;
    /// Reconstruct one sample from its residual with the same context.
    fn decompress(&mut self, residual: i64, context: i64) -> i64;
}

impl<D: FilterData> ChannelPredictor for Predictor<D> {
    fn flush(&mut self) {
        if let Some(long_term) = &mut self.long_term {
            long_term.flush();
        }
        self.short_term.flush();
        for stage in &mut self.stages {
            stage.flush();
        }
    }

    fn compress(&mut self, input: i64, context: i64) -> i64 {
        let mut value = input;
        if let Some(long_term) = &mut self.long_term {
            value = long_term.compress(value, context);
        }
        value = self.short_term.compress(value);
        for stage in &mut self.stages {
            value = stage.compress(value);
        }
        value
    }

    fn decompress(&mut self, residual: i64, context: i64) -> i64 {
        let mut value = residual;
        for stage in self.stages.iter_mut().rev() {
            value = stage.decompress(value);
        }
        value = self.short_term.decompress(value);
        if let Some(long_term) = &mut self.long_term {
            value = long_term.decompress(value, context);
        }
        value
    }
}

/// Pick the element width from the bit depth and build a predictor.
///
/// Audio up to 24 bits rides 16-bit filter elements; 32-bit audio (including
/// transformed float) needs the wide variant.
pub fn new_predictor(level: CompressionLevel, bits_per_sample: u16) -> Box<dyn ChannelPredictor> {
    if bits_per_sample < 32 {
        Box::new(Predictor::<i16>::new(level))
    } else {
        Box::new(Predictor::<i32>::new(level))
    }
}
