use krpc_common::protocol::{CallHeader, KrpcError, Procedure, ReplyHeader, Result};
use krpc_common::xdr::{XdrCodec, XdrDecoder, XdrEncoder};

use crate::client::ClientContext;

/// Calls procedure `P` and waits for its reply.
///
/// The returned reply is owned by the caller. Dropping it frees it; so does
/// [`krpc_common::xdr::Release::release`], which is also safe on an empty
/// reply.
///
/// # Errors
///
/// - `NotInitialized` if `ctx` holds no connection
/// - `Rejected` if the server answered with anything but success
/// - codec errors if the reply body does not decode
/// - transport errors otherwise
pub fn call<P: Procedure>(ctx: &ClientContext, args: &P::Args) -> Result<P::Reply> {
    let conn = ctx.get().ok_or(KrpcError::NotInitialized)?;
    let info = P::info();
    let xid = conn.next_xid();

    let mut request = XdrEncoder::with_limit(CallHeader::MAX_LEN + info.arg_size)?;
    CallHeader::new(xid, conn.program(), conn.version(), P::NUMBER).encode(&mut request)?;
    args.encode(&mut request)?;

    tracing::debug!(xid, procedure = P::NAME, "Sending call");
    let reply = conn.round_trip(request.as_bytes(), ReplyHeader::MAX_LEN + info.reply_size)?;

    let mut dec = XdrDecoder::new(&reply);
    let header = ReplyHeader::decode(&mut dec)?;
    if header.xid != xid {
        return Err(KrpcError::InvalidMessage(format!(
            "reply xid {} does not match call xid {}",
            header.xid, xid
        )));
    }
    if let Err(failure) = header.into_result() {
        tracing::warn!(xid, procedure = P::NAME, "Call rejected: {}", failure);
        return Err(KrpcError::Rejected(failure));
    }

    let result = P::Reply::decode(&mut dec)?;
    if dec.remaining() != 0 {
        tracing::debug!(xid, extra = dec.remaining(), "Ignoring trailing reply bytes");
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use krpc_common::tasks::{GetTasks, EXAMPLE_PROGRAM};

    #[test]
    fn test_call_without_init() {
        let ctx = ClientContext::new(EXAMPLE_PROGRAM, ClientConfig::new(1));
        let result = call::<GetTasks>(&ctx, &());
        assert!(matches!(result, Err(KrpcError::NotInitialized)));
    }
}
