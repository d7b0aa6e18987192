//! Container layout and the threaded encoder for the simian codec.
//!
//! The on-disk shape is: a fixed 52-byte descriptor, a fixed 24-byte
//! header, a seek table with one 32-bit offset per frame, an optional
//! verbatim source-container header blob, the compressed frames as whole
//! little-endian words, and an optional verbatim terminator blob. The
//! descriptor is back-patched at finalize with sizes and an MD5 of the
//! stored stream.

#![warn(missing_docs)]

pub mod decoder;
pub mod encode;
pub mod layout;
pub mod writer;

pub use decoder::{decode_file, DecodedFile};
pub use encode::encode_source;
pub use layout::{Descriptor, FileHeader};
pub use writer::Encoder;
