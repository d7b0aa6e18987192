//! PCM container readers for the simian codec.
//!
//! Each reader parses one container family, reports the sample format plus
//! the byte-exact header and terminator blobs, and streams normalized PCM:
//! little-endian samples, 8-bit unsigned, multi-byte depths byte-swapped
//! when the source was big-endian. [`open_source`] sniffs the first bytes
//! and dispatches to the right parser.

#![warn(missing_docs)]

pub mod aiff;
pub mod buffer;
pub mod caf;
pub mod snd;
pub mod source;
pub mod w64;
pub mod wav;

pub use source::{open_source, InputSource, SourceDescription};
