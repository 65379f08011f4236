//! # Wire Byte Cursors
//!
//! `ByteReader` and `ByteWriter` are the cursors every wire payload moves
//! through: encoded rows, bulk-insert streams, predicate trees, and the
//! serialize-all output. Numerics are little-endian; Text/Blob payloads are
//! u32-length-prefixed.
//!
//! Readers fail with positioned errors on truncation rather than panicking;
//! a malformed request must fail that request only.

use eyre::{ensure, Result};

/// Read cursor over a wire payload.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Consumes exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        ensure!(
            self.remaining() >= len,
            "truncated payload: need {} bytes at offset {}, have {}",
            len,
            self.pos,
            self.remaining()
        );
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.read_bytes(8)?;
        Ok(u64::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let b = self.read_bytes(2)?;
        Ok(i16::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.read_bytes(4)?;
        Ok(i32::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let b = self.read_bytes(8)?;
        Ok(i64::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let b = self.read_bytes(4)?;
        Ok(f32::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let b = self.read_bytes(8)?;
        Ok(f64::from_le_bytes(b.try_into().unwrap()))
    }

    /// Consumes a u32-length-prefixed byte string.
    pub fn read_len_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }
}

/// Write cursor producing a wire payload.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes a u32-length-prefixed byte string.
    pub fn write_len_prefixed(&mut self, bytes: &[u8]) {
        self.write_u32(bytes.len() as u32);
        self.write_bytes(bytes);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_round_trip() {
        let mut w = ByteWriter::new();
        w.write_u8(7);
        w.write_i16(-2);
        w.write_i32(40_000);
        w.write_i64(-1 << 40);
        w.write_f32(1.5);
        w.write_f64(-2.25);
        w.write_u32(9);

        let mut r = ByteReader::new(w.as_slice());
        assert_eq!(r.read_u8().unwrap(), 7);
        assert_eq!(r.read_i16().unwrap(), -2);
        assert_eq!(r.read_i32().unwrap(), 40_000);
        assert_eq!(r.read_i64().unwrap(), -1 << 40);
        assert_eq!(r.read_f32().unwrap(), 1.5);
        assert_eq!(r.read_f64().unwrap(), -2.25);
        assert_eq!(r.read_u32().unwrap(), 9);
        assert!(r.is_empty());
    }

    #[test]
    fn len_prefixed_round_trip() {
        let mut w = ByteWriter::new();
        w.write_len_prefixed(b"hello");
        w.write_len_prefixed(b"");

        let mut r = ByteReader::new(w.as_slice());
        assert_eq!(r.read_len_prefixed().unwrap(), b"hello");
        assert_eq!(r.read_len_prefixed().unwrap(), b"");
    }

    #[test]
    fn truncation_reports_offset() {
        let mut r = ByteReader::new(&[1, 2]);
        r.read_u8().unwrap();
        let err = r.read_u32().unwrap_err();
        assert!(err.to_string().contains("offset 1"));
    }

    #[test]
    fn len_prefix_beyond_payload_fails() {
        let mut w = ByteWriter::new();
        w.write_u32(100);
        w.write_bytes(b"abc");
        let mut r = ByteReader::new(w.as_slice());
        assert!(r.read_len_prefixed().is_err());
    }
}
