//! Wire primitives: big-endian numbers and length-prefixed strings.
//!
//! Everything on the wire is big-endian regardless of host byte order.
//! [`WireWriter`] appends to a growable buffer; [`WireReader`] consumes a
//! borrowed slice and reports running out of input as
//! [`ProtocolError::UnexpectedEnd`] instead of panicking.
//!
//! Three string encodings exist, differing only in the width of the length
//! prefix:
//!
//! | encoding | prefix | max payload |
//! |----------|--------|-------------|
//! | tiny     | `u8`   | 255         |
//! | short    | `u16`  | 65,535      |
//! | long     | `u32`  | 4 GiB       |
//!
//! Strings longer than the prefix allows are truncated to the maximum
//! payload and the prefix is written as the maximum value.

use bytes::{Buf, BufMut, BytesMut};

use crate::ProtocolError;

/// Ends every option list, packet, and parameter block.
pub const TERMINATOR: u8 = 0x00;

const TINY_MAX: usize = u8::MAX as usize;
const SHORT_MAX: usize = u16::MAX as usize;

// ---------------------------------------------------------------------------
// WireWriter
// ---------------------------------------------------------------------------

/// Append-only big-endian output buffer.
///
/// `BytesMut` from the `bytes` crate does the heavy lifting; its `put_*`
/// methods already write network byte order.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buf.put_i8(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.put_u64(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.put_f32(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.put_f64(value);
    }

    /// Writes raw bytes with no length prefix.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Writes a `u32` length followed by the bytes.
    pub fn write_blob(&mut self, data: &[u8]) {
        let len = u32::try_from(data.len()).unwrap_or(u32::MAX);
        self.buf.put_u32(len);
        self.buf.put_slice(&data[..len as usize]);
    }

    /// Writes a string with a one-byte length prefix, truncating at 255 bytes.
    pub fn write_tiny_string(&mut self, value: &str) {
        let data = clamp(value, TINY_MAX, "tiny");
        self.buf.put_u8(data.len() as u8);
        self.buf.put_slice(data);
    }

    /// Writes a string with a two-byte length prefix, truncating at 65,535 bytes.
    pub fn write_short_string(&mut self, value: &str) {
        let data = clamp(value, SHORT_MAX, "short");
        self.buf.put_u16(data.len() as u16);
        self.buf.put_slice(data);
    }

    /// Writes a string with a four-byte length prefix.
    pub fn write_long_string(&mut self, value: &str) {
        self.write_blob(value.as_bytes());
    }

    pub fn terminate(&mut self) {
        self.buf.put_u8(TERMINATOR);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

fn clamp<'a>(value: &'a str, max: usize, encoding: &'static str) -> &'a [u8] {
    let data = value.as_bytes();
    if data.len() > max {
        tracing::warn!(
            len = data.len(),
            max,
            encoding,
            "string exceeds length prefix, truncating"
        );
        &data[..max]
    } else {
        data
    }
}

// ---------------------------------------------------------------------------
// WireReader
// ---------------------------------------------------------------------------

/// Cursor over a borrowed byte slice.
///
/// `&[u8]` implements `bytes::Buf`, whose `get_*` methods advance the
/// slice and read big-endian. They panic on short input, so every read
/// goes through [`ensure`](Self::ensure) first.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), ProtocolError> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(ProtocolError::UnexpectedEnd { needed, remaining });
        }
        Ok(())
    }

    /// Returns the next byte without consuming it.
    pub fn peek_u8(&self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf[0])
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf.get_i8())
    }

    /// Any non-zero byte reads as `true`.
    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_u64(&mut self) -> Result<u64, ProtocolError> {
        self.ensure(8)?;
        Ok(self.buf.get_u64())
    }

    pub fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn read_f32(&mut self) -> Result<f32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_f32())
    }

    pub fn read_f64(&mut self) -> Result<f64, ProtocolError> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, ProtocolError> {
        self.ensure(len)?;
        let data = self.buf[..len].to_vec();
        self.buf.advance(len);
        Ok(data)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        self.ensure(N)?;
        let mut data = [0u8; N];
        self.buf.copy_to_slice(&mut data);
        Ok(data)
    }

    /// Reads a `u32` length followed by that many bytes.
    pub fn read_blob(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }

    pub fn read_tiny_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_u8()? as usize;
        self.read_string(len)
    }

    pub fn read_short_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_u16()? as usize;
        self.read_string(len)
    }

    pub fn read_long_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_u32()? as usize;
        self.read_string(len)
    }

    // Truncation can split a multi-byte character, so decoding is lossy.
    fn read_string(&mut self, len: usize) -> Result<String, ProtocolError> {
        let data = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}

// =========================================================================
// Tests
// =========================================================================
