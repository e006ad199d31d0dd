//! Turns one call record into at most one reply record.

use krpc_common::protocol::{
    AcceptStat, AuthStat, CallHeader, RejectStat, ReplyHeader, Result, RPC_VERSION,
};
use krpc_common::xdr::{XdrDecoder, XdrEncoder};

use crate::dispatch::DispatchOutcome;
use crate::registry::Program;

/// Processes one call record against `program`.
///
/// Returns the encoded reply, or `None` when nothing must be sent: the
/// record was not a decodable call, or the handler dropped the reply.
pub fn process_call(program: &Program, record: &[u8]) -> Option<Vec<u8>> {
    let mut dec = XdrDecoder::new(record);
    let call = match CallHeader::decode(&mut dec) {
        Ok(call) => call,
        Err(e) => {
            tracing::warn!("Dropping undecodable call: {}", e);
            return None;
        }
    };

    let xid = call.xid;
    tracing::debug!(
        xid,
        program = call.program,
        version = call.version,
        procedure = call.procedure,
        "Call received"
    );

    if call.rpc_version != RPC_VERSION {
        return header_only(ReplyHeader::denied(
            xid,
            RejectStat::RpcMismatch {
                low: RPC_VERSION,
                high: RPC_VERSION,
            },
        ));
    }
    if !call.credential.is_null() {
        tracing::warn!(xid, flavor = call.credential.flavor, "Unsupported credential flavor");
        return header_only(ReplyHeader::denied(
            xid,
            RejectStat::AuthError(AuthStat::BadCred),
        ));
    }
    if call.program != program.number() {
        return header_only(ReplyHeader::accepted(xid, AcceptStat::ProgUnavail));
    }
    let Some(version) = program.version(call.version) else {
        return header_only(ReplyHeader::accepted(
            xid,
            AcceptStat::ProgMismatch {
                low: program.lowest_version(),
                high: program.highest_version(),
            },
        ));
    };
    let Some(procedure) = version.procedure(call.procedure) else {
        return header_only(ReplyHeader::accepted(xid, AcceptStat::ProcUnavail));
    };

    let info = procedure.info();
    let mut out = match XdrEncoder::with_limit(ReplyHeader::MAX_LEN + info.reply_size) {
        Ok(out) => out,
        Err(e) => {
            tracing::error!(xid, "Failed to allocate reply buffer: {}", e);
            return header_only(ReplyHeader::accepted(xid, AcceptStat::SystemErr));
        }
    };
    if let Err(e) = ReplyHeader::accepted(xid, AcceptStat::Success).encode(&mut out) {
        tracing::error!(xid, "Failed to encode reply header: {}", e);
        return None;
    }

    match version.dispatch(call.procedure, &mut dec, &mut out) {
        Some(DispatchOutcome::Reply) => Some(out.into_inner()),
        Some(DispatchOutcome::Dropped) => None,
        Some(DispatchOutcome::Failed(status)) => {
            header_only(ReplyHeader::accepted(xid, status))
        }
        None => header_only(ReplyHeader::accepted(xid, AcceptStat::ProcUnavail)),
    }
}

fn header_only(header: ReplyHeader) -> Option<Vec<u8>> {
    match encode_header(&header) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::error!(xid = header.xid, "Failed to encode reply header: {}", e);
            None
        }
    }
}

fn encode_header(header: &ReplyHeader) -> Result<Vec<u8>> {
    let mut enc = XdrEncoder::with_limit(ReplyHeader::MAX_LEN)?;
    header.encode(&mut enc)?;
    Ok(enc.into_inner())
}
