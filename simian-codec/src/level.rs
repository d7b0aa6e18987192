//! Compression level presets.

/// Blocks per frame at the standard levels.
pub const BLOCKS_PER_FRAME: u32 = 73_728;

/// Compression level presets, ordered fastest to slowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CompressionLevel {
    /// Single short filter, minimal work.
    Fast,
    /// The default balance.
    Normal,
    /// Longer predictor history.
    High,
    /// Four frames' worth of blocks per frame, two stacked filters.
    ExtraHigh,
    /// Sixteen frames' worth of blocks per frame, deepest filters.
    Insane,
}

impl CompressionLevel {
    /// Numeric wire value stored in the file header.
    pub const fn wire_value(&self) -> u16 {
        match self {
            CompressionLevel::Fast => 1000,
            CompressionLevel::Normal => 2000,
            CompressionLevel::High => 3000,
            CompressionLevel::ExtraHigh => 4000,
            CompressionLevel::Insane => 5000,
        }
    }

    /// Parse the wire value back into a preset.
    pub fn from_wire_value(value: u16) -> Option<CompressionLevel> {
        match value {
            1000 => Some(CompressionLevel::Fast),
            2000 => Some(CompressionLevel::Normal),
            3000 => Some(CompressionLevel::High),
            4000 => Some(CompressionLevel::ExtraHigh),
            5000 => Some(CompressionLevel::Insane),
            _ => None,
        }
    }

    /// Blocks per full frame at this level.
    pub const fn blocks_per_frame(&self) -> u32 {
        match self {
            CompressionLevel::ExtraHigh => BLOCKS_PER_FRAME * 4,
            CompressionLevel::Insane => BLOCKS_PER_FRAME * 16,
            _ => BLOCKS_PER_FRAME,
        }
    }

    /// Long-term predictor lag; `None` disables the layer.
    pub const fn long_term_lag(&self) -> Option<usize> {
        match self {
            CompressionLevel::Fast => None,
            CompressionLevel::Normal => Some(16),
            CompressionLevel::High => Some(64),
            CompressionLevel::ExtraHigh => Some(256),
            CompressionLevel::Insane => Some(1280),
        }
    }

    /// Neural filter stages as `(order, shift)` pairs, applied in order on
    /// the compress side.
    pub const fn filter_stages(&self) -> &'static [(usize, u32)] {
        match self {
            CompressionLevel::Fast => &[(16, 11)],
            CompressionLevel::Normal => &[(16, 11), (64, 11)],
            CompressionLevel::High => &[(256, 13)],
            CompressionLevel::ExtraHigh => &[(32, 10), (256, 13)],
            CompressionLevel::Insane => &[(256, 13), (1280, 15)],
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        CompressionLevel::Normal
    }
}
