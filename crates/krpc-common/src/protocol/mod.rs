pub mod error;
pub mod message;
pub mod procedure;

pub use error::{KrpcError, Result};
pub use message::{
    AcceptStat, AuthStat, CallHeader, OpaqueAuth, RejectStat, ReplyBody, ReplyHeader, RpcFailure,
    AUTH_NULL, RPC_VERSION,
};
pub use procedure::{Procedure, ProcedureInfo};
