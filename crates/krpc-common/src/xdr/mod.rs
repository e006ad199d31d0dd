//! XDR wire codec
//!
//! Fixed-width integers are written big-endian in 4-byte units. Variable
//! length data (strings, arrays) carries a `u32` count prefix and is checked
//! against a compile-time bound on both encode and decode; opaque bytes are
//! zero-padded to the next 4-byte boundary.
//!
//! # Example
//!
//! ```
//! use krpc_common::xdr::{XdrCodec, XdrDecoder, XdrEncoder};
//! use krpc_common::tasks::{Task, Tasks};
//!
//! let mut tasks = Tasks::new();
//! tasks.try_push(Task::new("init", 1, 0, 0)).unwrap();
//!
//! let mut enc = XdrEncoder::new();
//! tasks.encode(&mut enc).unwrap();
//!
//! let bytes = enc.into_inner();
//! let decoded = Tasks::decode(&mut XdrDecoder::new(&bytes)).unwrap();
//! assert_eq!(decoded, tasks);
//! ```

pub mod bounded;
pub mod record;

pub use bounded::{BoundedBytes, BoundedVec, Release};

use crate::protocol::error::{KrpcError, Result};

/// Size of one XDR unit; every item on the wire is a multiple of this.
pub const XDR_UNIT: usize = 4;

/// Rounds `len` up to the next multiple of [`XDR_UNIT`].
pub const fn padded_len(len: usize) -> usize {
    (len + XDR_UNIT - 1) & !(XDR_UNIT - 1)
}

/// A value with a bounded XDR representation.
///
/// `MAX_ENCODED_LEN` is the largest number of bytes `encode` can produce. It
/// is what procedure descriptors advertise to the transport for buffer
/// sizing, so it has to follow the same bound constants the codec enforces.
pub trait XdrCodec: Sized {
    const MAX_ENCODED_LEN: usize;

    fn encode(&self, enc: &mut XdrEncoder) -> Result<()>;

    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self>;
}

/// Append-only XDR writer.
///
/// An encoder may carry a byte limit; writes past it fail the same way an
/// exhausted fixed-size reply buffer would.
#[derive(Debug, Default)]
pub struct XdrEncoder {
    buf: Vec<u8>,
    limit: Option<usize>,
}

impl XdrEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an encoder whose output may not exceed `limit` bytes, with the
    /// whole buffer reserved up front.
    pub fn with_limit(limit: usize) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(limit)?;
        Ok(Self {
            buf,
            limit: Some(limit),
        })
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Drops everything written after `len`. Used to roll back a body whose
    /// encoding failed half way.
    pub fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
    }

    fn reserve(&mut self, additional: usize) -> Result<()> {
        if let Some(limit) = self.limit {
            if self.buf.len() + additional > limit {
                return Err(KrpcError::EncodeInconsistency(format!(
                    "encoded data exceeds {} byte buffer",
                    limit
                )));
            }
        }
        self.buf.try_reserve(additional)?;
        Ok(())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<()> {
        self.reserve(XDR_UNIT)?;
        self.buf.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    pub fn put_i32(&mut self, value: i32) -> Result<()> {
        self.reserve(XDR_UNIT)?;
        self.buf.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Writes `data` followed by zero padding, without a length prefix.
    pub fn put_fixed_opaque(&mut self, data: &[u8]) -> Result<()> {
        let padded = padded_len(data.len());
        self.reserve(padded)?;
        self.buf.extend_from_slice(data);
        self.buf.resize(self.buf.len() + (padded - data.len()), 0);
        Ok(())
    }
}

/// Cursor over an XDR byte slice.
#[derive(Debug, Clone)]
pub struct XdrDecoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> XdrDecoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(KrpcError::Truncated {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        let bytes = self.take(XDR_UNIT)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        let bytes = self.take(XDR_UNIT)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads `len` bytes of opaque data and skips the padding after them.
    pub fn get_fixed_opaque(&mut self, len: usize) -> Result<&'a [u8]> {
        let padded = self.take(padded_len(len))?;
        Ok(&padded[..len])
    }
}

impl XdrCodec for () {
    const MAX_ENCODED_LEN: usize = 0;

    fn encode(&self, _enc: &mut XdrEncoder) -> Result<()> {
        Ok(())
    }

    fn decode(_dec: &mut XdrDecoder<'_>) -> Result<Self> {
        Ok(())
    }
}

impl XdrCodec for u32 {
    const MAX_ENCODED_LEN: usize = XDR_UNIT;

    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        enc.put_u32(*self)
    }

    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        dec.get_u32()
    }
}

impl XdrCodec for i32 {
    const MAX_ENCODED_LEN: usize = XDR_UNIT;

    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        enc.put_i32(*self)
    }

    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        dec.get_i32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_len() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), 4);
        assert_eq!(padded_len(4), 4);
        assert_eq!(padded_len(5), 8);
        assert_eq!(padded_len(16), 16);
    }

    #[test]
    fn test_scalars_are_big_endian() {
        let mut enc = XdrEncoder::new();
        enc.put_u32(0x0102_0304).unwrap();
        enc.put_i32(-2).unwrap();
        assert_eq!(
            enc.as_bytes(),
            &[0x01, 0x02, 0x03, 0x04, 0xFF, 0xFF, 0xFF, 0xFE]
        );

        let mut dec = XdrDecoder::new(enc.as_bytes());
        assert_eq!(dec.get_u32().unwrap(), 0x0102_0304);
        assert_eq!(dec.get_i32().unwrap(), -2);
        assert_eq!(dec.remaining(), 0);
    }

    #[test]
    fn test_fixed_opaque_is_padded() {
        let mut enc = XdrEncoder::new();
        enc.put_fixed_opaque(b"bash").unwrap();
        enc.put_fixed_opaque(b"init!").unwrap();
        assert_eq!(enc.len(), 12);
        assert_eq!(&enc.as_bytes()[4..], b"init!\0\0\0");

        let mut dec = XdrDecoder::new(enc.as_bytes());
        assert_eq!(dec.get_fixed_opaque(4).unwrap(), b"bash");
        assert_eq!(dec.get_fixed_opaque(5).unwrap(), b"init!");
        assert_eq!(dec.remaining(), 0);
    }

    #[test]
    fn test_short_input_is_truncated_error() {
        let mut dec = XdrDecoder::new(&[0x00, 0x01]);
        let err = dec.get_u32().unwrap_err();
        assert!(matches!(
            err,
            KrpcError::Truncated {
                needed: 4,
                remaining: 2
            }
        ));
        // A failed read does not move the cursor.
        assert_eq!(dec.position(), 0);
    }

    #[test]
    fn test_encoder_limit() {
        let mut enc = XdrEncoder::with_limit(8).unwrap();
        enc.put_u32(1).unwrap();
        enc.put_u32(2).unwrap();
        let err = enc.put_u32(3).unwrap_err();
        assert!(matches!(err, KrpcError::EncodeInconsistency(_)));
        assert_eq!(enc.len(), 8);
    }

    #[test]
    fn test_unit_encodes_nothing() {
        let mut enc = XdrEncoder::new();
        ().encode(&mut enc).unwrap();
        assert!(enc.is_empty());
        <()>::decode(&mut XdrDecoder::new(&[])).unwrap();
    }
}
