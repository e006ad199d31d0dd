//! Call and reply headers.
//!
//! The layout follows ONC RPC (RFC 5531):
//!
//! ```text
//! call:  xid | CALL  | rpcvers | prog | vers | proc | cred | verf | args...
//! reply: xid | REPLY | MSG_ACCEPTED | verf | accept_stat [| results...]
//!        xid | REPLY | MSG_DENIED   | reject_stat | (mismatch info | auth_stat)
//! ```

use thiserror::Error;

use crate::protocol::error::{KrpcError, Result};
use crate::xdr::{BoundedBytes, XdrCodec, XdrDecoder, XdrEncoder, XDR_UNIT};

/// Version of the RPC message protocol itself.
pub const RPC_VERSION: u32 = 2;

/// Maximum size of a credential or verifier body.
pub const MAX_AUTH_BYTES: usize = 400;

/// The null authentication flavor.
pub const AUTH_NULL: u32 = 0;

const MSG_CALL: u32 = 0;
const MSG_REPLY: u32 = 1;

const MSG_ACCEPTED: u32 = 0;
const MSG_DENIED: u32 = 1;

const RPC_MISMATCH: u32 = 0;
const AUTH_ERROR: u32 = 1;

crate::xdr_record! {
    /// Credential or verifier.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct OpaqueAuth {
        pub flavor: u32,
        pub body: BoundedBytes<MAX_AUTH_BYTES>,
    }
}

impl OpaqueAuth {
    /// The trivial credential handle: null flavor, empty body.
    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.flavor == AUTH_NULL
    }
}

/// Header of a call message. The encoded arguments follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHeader {
    pub xid: u32,
    pub rpc_version: u32,
    pub program: u32,
    pub version: u32,
    pub procedure: u32,
    pub credential: OpaqueAuth,
    pub verifier: OpaqueAuth,
}

impl CallHeader {
    /// Largest possible encoded call header.
    pub const MAX_LEN: usize = 6 * XDR_UNIT + 2 * OpaqueAuth::MAX_ENCODED_LEN;

    /// Builds a call header carrying the null credential.
    pub fn new(xid: u32, program: u32, version: u32, procedure: u32) -> Self {
        Self {
            xid,
            rpc_version: RPC_VERSION,
            program,
            version,
            procedure,
            credential: OpaqueAuth::null(),
            verifier: OpaqueAuth::null(),
        }
    }

    pub fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        enc.put_u32(self.xid)?;
        enc.put_u32(MSG_CALL)?;
        enc.put_u32(self.rpc_version)?;
        enc.put_u32(self.program)?;
        enc.put_u32(self.version)?;
        enc.put_u32(self.procedure)?;
        self.credential.encode(enc)?;
        self.verifier.encode(enc)
    }

    pub fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        let xid = dec.get_u32()?;
        let msg_type = dec.get_u32()?;
        if msg_type != MSG_CALL {
            return Err(KrpcError::InvalidMessage(format!(
                "expected call message, got message type {}",
                msg_type
            )));
        }
        Ok(Self {
            xid,
            rpc_version: dec.get_u32()?,
            program: dec.get_u32()?,
            version: dec.get_u32()?,
            procedure: dec.get_u32()?,
            credential: OpaqueAuth::decode(dec)?,
            verifier: OpaqueAuth::decode(dec)?,
        })
    }
}

/// Outcome of an accepted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptStat {
    Success,
    ProgUnavail,
    ProgMismatch { low: u32, high: u32 },
    ProcUnavail,
    GarbageArgs,
    SystemErr,
}

impl AcceptStat {
    fn code(&self) -> u32 {
        match self {
            AcceptStat::Success => 0,
            AcceptStat::ProgUnavail => 1,
            AcceptStat::ProgMismatch { .. } => 2,
            AcceptStat::ProcUnavail => 3,
            AcceptStat::GarbageArgs => 4,
            AcceptStat::SystemErr => 5,
        }
    }
}

/// Authentication failure reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStat {
    Ok,
    BadCred,
    RejectedCred,
    BadVerf,
    RejectedVerf,
    TooWeak,
    InvalidResp,
    Failed,
}

impl AuthStat {
    fn code(&self) -> u32 {
        match self {
            AuthStat::Ok => 0,
            AuthStat::BadCred => 1,
            AuthStat::RejectedCred => 2,
            AuthStat::BadVerf => 3,
            AuthStat::RejectedVerf => 4,
            AuthStat::TooWeak => 5,
            AuthStat::InvalidResp => 6,
            AuthStat::Failed => 7,
        }
    }

    fn from_code(code: u32) -> Result<Self> {
        Ok(match code {
            0 => AuthStat::Ok,
            1 => AuthStat::BadCred,
            2 => AuthStat::RejectedCred,
            3 => AuthStat::BadVerf,
            4 => AuthStat::RejectedVerf,
            5 => AuthStat::TooWeak,
            6 => AuthStat::InvalidResp,
            7 => AuthStat::Failed,
            other => {
                return Err(KrpcError::InvalidMessage(format!(
                    "unknown auth status {}",
                    other
                )))
            }
        })
    }
}

/// Why a call was denied before reaching a procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectStat {
    RpcMismatch { low: u32, high: u32 },
    AuthError(AuthStat),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    Accepted {
        verifier: OpaqueAuth,
        status: AcceptStat,
    },
    Denied(RejectStat),
}

/// Header of a reply message. On `Accepted { status: Success, .. }` the
/// encoded results follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyHeader {
    pub xid: u32,
    pub body: ReplyBody,
}

impl ReplyHeader {
    /// Largest possible encoded reply header.
    pub const MAX_LEN: usize = 3 * XDR_UNIT + OpaqueAuth::MAX_ENCODED_LEN + 3 * XDR_UNIT;

    pub fn accepted(xid: u32, status: AcceptStat) -> Self {
        Self {
            xid,
            body: ReplyBody::Accepted {
                verifier: OpaqueAuth::null(),
                status,
            },
        }
    }

    pub fn denied(xid: u32, reason: RejectStat) -> Self {
        Self {
            xid,
            body: ReplyBody::Denied(reason),
        }
    }

    pub fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        enc.put_u32(self.xid)?;
        enc.put_u32(MSG_REPLY)?;
        match &self.body {
            ReplyBody::Accepted { verifier, status } => {
                enc.put_u32(MSG_ACCEPTED)?;
                verifier.encode(enc)?;
                enc.put_u32(status.code())?;
                if let AcceptStat::ProgMismatch { low, high } = status {
                    enc.put_u32(*low)?;
                    enc.put_u32(*high)?;
                }
            }
            ReplyBody::Denied(reason) => {
                enc.put_u32(MSG_DENIED)?;
                match reason {
                    RejectStat::RpcMismatch { low, high } => {
                        enc.put_u32(RPC_MISMATCH)?;
                        enc.put_u32(*low)?;
                        enc.put_u32(*high)?;
                    }
                    RejectStat::AuthError(stat) => {
                        enc.put_u32(AUTH_ERROR)?;
                        enc.put_u32(stat.code())?;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        let xid = dec.get_u32()?;
        let msg_type = dec.get_u32()?;
        if msg_type != MSG_REPLY {
            return Err(KrpcError::InvalidMessage(format!(
                "expected reply message, got message type {}",
                msg_type
            )));
        }

        let body = match dec.get_u32()? {
            MSG_ACCEPTED => {
                let verifier = OpaqueAuth::decode(dec)?;
                let status = match dec.get_u32()? {
                    0 => AcceptStat::Success,
                    1 => AcceptStat::ProgUnavail,
                    2 => AcceptStat::ProgMismatch {
                        low: dec.get_u32()?,
                        high: dec.get_u32()?,
                    },
                    3 => AcceptStat::ProcUnavail,
                    4 => AcceptStat::GarbageArgs,
                    5 => AcceptStat::SystemErr,
                    other => {
                        return Err(KrpcError::InvalidMessage(format!(
                            "unknown accept status {}",
                            other
                        )))
                    }
                };
                ReplyBody::Accepted { verifier, status }
            }
            MSG_DENIED => match dec.get_u32()? {
                RPC_MISMATCH => ReplyBody::Denied(RejectStat::RpcMismatch {
                    low: dec.get_u32()?,
                    high: dec.get_u32()?,
                }),
                AUTH_ERROR => {
                    ReplyBody::Denied(RejectStat::AuthError(AuthStat::from_code(dec.get_u32()?)?))
                }
                other => {
                    return Err(KrpcError::InvalidMessage(format!(
                        "unknown reject status {}",
                        other
                    )))
                }
            },
            other => {
                return Err(KrpcError::InvalidMessage(format!(
                    "unknown reply status {}",
                    other
                )))
            }
        };

        Ok(Self { xid, body })
    }

    /// `Ok(())` when results follow the header, the failure otherwise.
    pub fn into_result(self) -> std::result::Result<(), RpcFailure> {
        match self.body {
            ReplyBody::Accepted { status, .. } => match status {
                AcceptStat::Success => Ok(()),
                AcceptStat::ProgUnavail => Err(RpcFailure::ProgUnavailable),
                AcceptStat::ProgMismatch { low, high } => {
                    Err(RpcFailure::ProgMismatch { low, high })
                }
                AcceptStat::ProcUnavail => Err(RpcFailure::ProcUnavailable),
                AcceptStat::GarbageArgs => Err(RpcFailure::GarbageArgs),
                AcceptStat::SystemErr => Err(RpcFailure::SystemError),
            },
            ReplyBody::Denied(RejectStat::RpcMismatch { low, high }) => {
                Err(RpcFailure::RpcMismatch { low, high })
            }
            ReplyBody::Denied(RejectStat::AuthError(stat)) => Err(RpcFailure::AuthError(stat)),
        }
    }
}

/// A non-success reply, as seen by the caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcFailure {
    #[error("program unavailable")]
    ProgUnavailable,

    #[error("program version mismatch (supported {low}..={high})")]
    ProgMismatch { low: u32, high: u32 },

    #[error("procedure unavailable")]
    ProcUnavailable,

    #[error("garbage arguments")]
    GarbageArgs,

    #[error("system error")]
    SystemError,

    #[error("RPC version mismatch (supported {low}..={high})")]
    RpcMismatch { low: u32, high: u32 },

    #[error("authentication error ({0:?})")]
    AuthError(AuthStat),
}
