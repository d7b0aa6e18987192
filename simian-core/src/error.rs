//! Error types shared across the simian workspace.

use thiserror::Error;

/// Main error type for the codec.
#[derive(Error, Debug)]
pub enum Error {
    /// A caller-supplied parameter was rejected.
    #[error("bad parameter: {0}")]
    BadParameter(String),

    /// The input declares a channel count outside 1..=32.
    #[error("unsupported channel count: {0}")]
    UnsupportedChannelCount(u16),

    /// The input declares a bit depth other than 8, 16, 24 or 32.
    #[error("unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    /// The input file could not be parsed as a supported container.
    #[error("invalid input file: {0}")]
    InvalidInput(String),

    /// A header or terminator blob exceeds the format maximum.
    #[error("input blob too large: {bytes} bytes (limit {limit})")]
    InputTooLarge {
        /// Size of the offending blob.
        bytes: u64,
        /// The format maximum.
        limit: u64,
    },

    /// An underlying read failed.
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    /// An underlying write or seek on the output failed.
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    /// A bounded allocation could not be satisfied.
    #[error("insufficient memory: {0}")]
    InsufficientMemory(String),

    /// More frames were submitted than the file declared room for.
    #[error("too much data for the declared stream length")]
    TooMuchData,

    /// Catch-all for violated internal expectations (e.g. a short frame
    /// followed by another frame).
    #[error("undefined operation")]
    Undefined,
}

/// Result type alias using the workspace [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a bad-parameter error.
    pub fn bad_parameter(msg: impl Into<String>) -> Self {
        Error::BadParameter(msg.into())
    }

    /// Create an invalid-input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Whether this error still allows the encoder to drain and close.
    #[must_use]
    pub fn is_drainable(&self) -> bool {
        matches!(self, Error::TooMuchData | Error::Undefined)
    }
}
