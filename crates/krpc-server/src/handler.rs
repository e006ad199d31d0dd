use std::marker::PhantomData;

use krpc_common::protocol::{KrpcError, Procedure};
use thiserror::Error;

/// What the dispatcher should do with the reply once the handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Encode the reply and send it.
    Reply,
    /// Send nothing. The call counts as successful to the transport.
    Drop,
}

/// Handler failure. Every variant is answered with `SYSTEM_ERR`.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Allocation failure: {0}")]
    AllocationFailure(String),

    #[error("Task source error: {0}")]
    Source(#[from] std::io::Error),

    #[error("Handler failed: {0}")]
    Failed(String),
}

impl From<KrpcError> for HandlerError {
    fn from(err: KrpcError) -> Self {
        match err {
            KrpcError::AllocationFailure(msg) => HandlerError::AllocationFailure(msg),
            other => HandlerError::Failed(other.to_string()),
        }
    }
}

/// Server-side implementation of procedure `P`.
///
/// `reply` starts out as `P::Reply::default()`. The handler allocates and
/// fills it; whatever it leaves there is released by the dispatcher after
/// encoding, or immediately if the handler fails.
pub trait ProcedureHandler<P: Procedure>: Send + Sync + 'static {
    fn handle(&self, args: &P::Args, reply: &mut P::Reply) -> Result<Outcome, HandlerError>;
}

/// Adapts a closure into a [`ProcedureHandler`].
pub struct FnHandler<P, F> {
    f: F,
    _procedure: PhantomData<fn() -> P>,
}

impl<P, F> FnHandler<P, F>
where
    P: Procedure,
    F: Fn(&P::Args, &mut P::Reply) -> Result<Outcome, HandlerError> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _procedure: PhantomData,
        }
    }
}

impl<P, F> ProcedureHandler<P> for FnHandler<P, F>
where
    P: Procedure,
    F: Fn(&P::Args, &mut P::Reply) -> Result<Outcome, HandlerError> + Send + Sync + 'static,
{
    fn handle(&self, args: &P::Args, reply: &mut P::Reply) -> Result<Outcome, HandlerError> {
        (self.f)(args, reply)
    }
}
