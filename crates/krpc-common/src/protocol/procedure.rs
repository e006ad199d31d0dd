//! Procedure descriptors shared by both sides of the wire.

use crate::xdr::{Release, XdrCodec};

/// A remote procedure: its number within a version, and the argument and
/// reply types that define its wire form.
///
/// Client and server drive the same implementation, so the codec used to
/// encode a call on one side is the one used to decode it on the other.
pub trait Procedure: Send + Sync + 'static {
    const NUMBER: u32;
    const NAME: &'static str;

    type Args: XdrCodec + Release + Default + Send;
    type Reply: XdrCodec + Release + Default + Send;

    /// Static descriptor for this procedure.
    fn info() -> ProcedureInfo {
        ProcedureInfo {
            number: Self::NUMBER,
            name: Self::NAME,
            arg_size: <Self::Args as XdrCodec>::MAX_ENCODED_LEN,
            reply_size: <Self::Reply as XdrCodec>::MAX_ENCODED_LEN,
        }
    }
}

/// Immutable per-procedure metadata.
///
/// `arg_size` and `reply_size` are upper bounds on the encoded argument and
/// reply bodies. The transport sizes its buffers from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcedureInfo {
    pub number: u32,
    pub name: &'static str,
    pub arg_size: usize,
    pub reply_size: usize,
}
