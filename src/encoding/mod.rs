//! # Encoding Module
//!
//! Wire-level byte cursors shared by row decoding, predicate decoding, and
//! bulk serialization. Numerics are fixed-width little-endian; Text/Blob
//! payloads are u32-length-prefixed.

pub mod cursor;

pub use cursor::{ByteReader, ByteWriter};
