//! Bounded variable-length buffers.
//!
//! A bounded buffer owns its storage exclusively. An empty buffer holds no
//! allocation. The bound is not enforced on construction; it is checked where
//! the buffer crosses the wire, so an over-long buffer fails to encode
//! rather than being silently cut.

use std::ops::Deref;

use super::{padded_len, XdrCodec, XdrDecoder, XdrEncoder, XDR_UNIT};
use crate::protocol::error::{KrpcError, Result};

/// Frees owned payload storage and resets the value to empty.
///
/// Implementations recurse into nested buffers. Releasing an empty value is a
/// no-op, so calling `release` twice is harmless.
pub trait Release {
    fn release(&mut self);
}

impl Release for () {
    fn release(&mut self) {}
}

impl Release for u32 {
    fn release(&mut self) {}
}

impl Release for i32 {
    fn release(&mut self) {}
}

/// Variable-length array of at most `MAX` elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedVec<T, const MAX: usize> {
    items: Vec<T>,
}

impl<T, const MAX: usize> BoundedVec<T, MAX> {
    pub const BOUND: usize = MAX;

    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Reserves room for `capacity` elements, failing instead of aborting
    /// when the allocation cannot be satisfied.
    pub fn try_with_capacity(capacity: usize) -> Result<Self> {
        if capacity > MAX {
            return Err(KrpcError::AllocationFailure(format!(
                "requested capacity {} exceeds bound {}",
                capacity, MAX
            )));
        }
        let mut items = Vec::new();
        items.try_reserve_exact(capacity)?;
        Ok(Self { items })
    }

    /// Wraps `items` as is. The bound is checked when the value is encoded.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self { items }
    }

    /// Appends `item` if the array is below its bound and the push does not
    /// need an allocation that fails; hands the item back otherwise.
    pub fn try_push(&mut self, item: T) -> std::result::Result<(), T> {
        if self.items.len() >= MAX || self.items.try_reserve(1).is_err() {
            return Err(item);
        }
        self.items.push(item);
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= MAX
    }

    pub fn is_within_bound(&self) -> bool {
        self.items.len() <= MAX
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    /// Drops every element past `len`. The storage is kept.
    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }
}

impl<T, const MAX: usize> Default for BoundedVec<T, MAX> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const MAX: usize> Deref for BoundedVec<T, MAX> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<'a, T, const MAX: usize> IntoIterator for &'a BoundedVec<T, MAX> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Release, const MAX: usize> Release for BoundedVec<T, MAX> {
    fn release(&mut self) {
        for item in self.items.iter_mut() {
            item.release();
        }
        self.items = Vec::new();
    }
}

impl<T: XdrCodec + Release, const MAX: usize> XdrCodec for BoundedVec<T, MAX> {
    const MAX_ENCODED_LEN: usize = XDR_UNIT + MAX * T::MAX_ENCODED_LEN;

    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        if self.items.len() > MAX {
            return Err(KrpcError::EncodeInconsistency(format!(
                "array holds {} elements, bound is {}",
                self.items.len(),
                MAX
            )));
        }
        enc.put_u32(self.items.len() as u32)?;
        for item in &self.items {
            item.encode(enc)?;
        }
        Ok(())
    }

    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        let declared = dec.get_u32()? as usize;
        if declared > MAX {
            return Err(KrpcError::DecodeBoundsExceeded { declared, max: MAX });
        }
        if declared == 0 {
            return Ok(Self::new());
        }

        let mut items = Vec::new();
        items.try_reserve_exact(declared)?;
        let mut out = Self { items };

        for index in 0..declared {
            match T::decode(dec) {
                Ok(item) => out.items.push(item),
                Err(e) => {
                    // Only the elements that were fully constructed exist;
                    // release exactly those.
                    tracing::debug!(
                        "array decode failed at element {} of {}: {}",
                        index,
                        declared,
                        e
                    );
                    out.release();
                    return Err(e);
                }
            }
        }

        Ok(out)
    }
}

/// Variable-length opaque string of at most `MAX` bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BoundedBytes<const MAX: usize> {
    bytes: Vec<u8>,
}

impl<const MAX: usize> BoundedBytes<MAX> {
    pub const BOUND: usize = MAX;

    pub const fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Copies `data` as is. The bound is checked when the value is encoded.
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            bytes: data.to_vec(),
        }
    }

    /// Copies at most the first `MAX` bytes of `data`.
    pub fn truncated(data: &[u8]) -> Self {
        Self::from_slice(&data[..data.len().min(MAX)])
    }

    /// Replaces the contents with at most `MAX` bytes of `data`, reusing the
    /// existing allocation when it is large enough.
    pub fn fill_truncated(&mut self, data: &[u8]) {
        self.bytes.clear();
        self.bytes.extend_from_slice(&data[..data.len().min(MAX)]);
    }

    /// Creates an empty string with `MAX` bytes reserved, failing instead of
    /// aborting when the allocation cannot be satisfied.
    pub fn try_preallocated() -> Result<Self> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(MAX)?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    pub fn is_within_bound(&self) -> bool {
        self.bytes.len() <= MAX
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

impl<const MAX: usize> From<&str> for BoundedBytes<MAX> {
    fn from(value: &str) -> Self {
        Self::from_slice(value.as_bytes())
    }
}

impl<const MAX: usize> Release for BoundedBytes<MAX> {
    fn release(&mut self) {
        self.bytes = Vec::new();
    }
}

impl<const MAX: usize> XdrCodec for BoundedBytes<MAX> {
    const MAX_ENCODED_LEN: usize = XDR_UNIT + padded_len(MAX);

    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        if self.bytes.len() > MAX {
            return Err(KrpcError::EncodeInconsistency(format!(
                "string is {} bytes, bound is {}",
                self.bytes.len(),
                MAX
            )));
        }
        enc.put_u32(self.bytes.len() as u32)?;
        enc.put_fixed_opaque(&self.bytes)
    }

    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        let declared = dec.get_u32()? as usize;
        if declared > MAX {
            return Err(KrpcError::DecodeBoundsExceeded { declared, max: MAX });
        }
        if declared == 0 {
            return Ok(Self::new());
        }

        let data = dec.get_fixed_opaque(declared)?;
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(declared)?;
        bytes.extend_from_slice(data);
        Ok(Self { bytes })
    }
}
