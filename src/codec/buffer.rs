//! Bounds-checked little-endian reader and writer.

use crate::address::{Address, ADDRESS_LEN};
use crate::error::CodecError;

/// Cursor over an account buffer. Every read is checked against the
/// remaining length, so a truncated or lying buffer fails instead of
/// reading out of bounds.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Start reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Read exactly `len` bytes.
    pub fn bytes(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], CodecError> {
        if len > self.remaining() {
            return Err(CodecError::FieldOverrun {
                field,
                offset: self.pos,
                len,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(field, N)?);
        Ok(out)
    }

    /// Read one byte.
    pub fn u8(&mut self, field: &'static str) -> Result<u8, CodecError> {
        Ok(self.array::<1>(field)?[0])
    }

    /// Read a boolean flag, which must be 0 or 1.
    pub fn flag(&mut self, field: &'static str) -> Result<bool, CodecError> {
        match self.u8(field)? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(CodecError::InvalidFlag { field, value }),
        }
    }

    /// Read a little-endian u32.
    pub fn u32(&mut self, field: &'static str) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.array(field)?))
    }

    /// Read a little-endian i32.
    pub fn i32(&mut self, field: &'static str) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.array(field)?))
    }

    /// Read a little-endian u64.
    pub fn u64(&mut self, field: &'static str) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.array(field)?))
    }

    /// Read a little-endian f32.
    pub fn f32(&mut self, field: &'static str) -> Result<f32, CodecError> {
        Ok(f32::from_le_bytes(self.array(field)?))
    }

    /// Read an 8-byte unsigned timestamp that must fit a non-negative i64.
    pub fn timestamp(&mut self, field: &'static str) -> Result<i64, CodecError> {
        i64::try_from(self.u64(field)?).map_err(|_| CodecError::InvalidValue {
            field,
            reason: "timestamp out of range",
        })
    }

    /// Read a 32-byte address.
    pub fn address(&mut self, field: &'static str) -> Result<Address, CodecError> {
        Ok(Address::new(self.array::<ADDRESS_LEN>(field)?))
    }

    /// Read a u32 length prefix followed by that many bytes.
    pub fn prefixed(&mut self, field: &'static str) -> Result<&'a [u8], CodecError> {
        let len = self.u32(field)? as usize;
        self.bytes(field, len)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn string(&mut self, field: &'static str) -> Result<String, CodecError> {
        let raw = self.prefixed(field)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8 { field })
    }
}

/// Growable output buffer mirroring [`Reader`].
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Create a writer with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append raw bytes.
    pub fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append one byte.
    pub fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Append a boolean flag as 0 or 1.
    pub fn flag(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    /// Append a little-endian u32.
    pub fn u32(&mut self, value: u32) {
        self.bytes(&value.to_le_bytes());
    }

    /// Append a little-endian i32.
    pub fn i32(&mut self, value: i32) {
        self.bytes(&value.to_le_bytes());
    }

    /// Append a little-endian u64.
    pub fn u64(&mut self, value: u64) {
        self.bytes(&value.to_le_bytes());
    }

    /// Append a little-endian f32.
    pub fn f32(&mut self, value: f32) {
        self.bytes(&value.to_le_bytes());
    }

    /// Append a timestamp; negative values cannot be encoded.
    pub fn timestamp(&mut self, field: &'static str, value: i64) -> Result<(), CodecError> {
        let raw = u64::try_from(value).map_err(|_| CodecError::InvalidValue {
            field,
            reason: "timestamp is negative",
        })?;
        self.u64(raw);
        Ok(())
    }

    /// Append a 32-byte address.
    pub fn address(&mut self, value: &Address) {
        self.bytes(value.as_ref());
    }

    /// Append a u32 length prefix and the bytes.
    pub fn prefixed(&mut self, field: &'static str, value: &[u8]) -> Result<(), CodecError> {
        let len = u32::try_from(value.len()).map_err(|_| CodecError::FieldTooLong {
            field,
            len: value.len(),
        })?;
        self.u32(len);
        self.bytes(value);
        Ok(())
    }

    /// Append a length-prefixed UTF-8 string.
    pub fn string(&mut self, field: &'static str, value: &str) -> Result<(), CodecError> {
        self.prefixed(field, value.as_bytes())
    }

    /// Finish and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
