//! The per-call dispatch pipeline.
//!
//! Every call runs the same four stages against one procedure:
//!
//! 1. decode the arguments from the request body
//! 2. run the handler, which allocates and fills the reply
//! 3. encode the reply into the response buffer
//! 4. release arguments and reply
//!
//! Stage 4 runs on every path out of the pipeline. Arguments and reply are
//! held in [`Released`] guards, so returning early from any stage still frees
//! them exactly once.

use std::ops::{Deref, DerefMut};

use krpc_common::protocol::{AcceptStat, Procedure};
use krpc_common::xdr::{Release, XdrCodec, XdrDecoder, XdrEncoder};

use crate::handler::{Outcome, ProcedureHandler};

/// How a dispatched call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The reply body was written to the response buffer.
    Reply,
    /// The handler asked for no response to be sent.
    Dropped,
    /// The call failed; nothing was written to the response buffer.
    Failed(AcceptStat),
}

/// Owns a value and releases it when dropped.
pub struct Released<T: Release> {
    value: T,
}

impl<T: Release> Released<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Release> Deref for Released<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Release> DerefMut for Released<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Release> Drop for Released<T> {
    fn drop(&mut self) {
        self.value.release();
    }
}

/// Runs one call of procedure `P` through `handler`.
///
/// `args` is positioned at the start of the argument body. On
/// [`DispatchOutcome::Reply`] the encoded reply has been appended to
/// `results`; on any other outcome `results` is left as it was.
pub fn dispatch<P, H>(
    handler: &H,
    args: &mut XdrDecoder<'_>,
    results: &mut XdrEncoder,
) -> DispatchOutcome
where
    P: Procedure,
    H: ProcedureHandler<P> + ?Sized,
{
    let args = match P::Args::decode(args) {
        Ok(args) => Released::new(args),
        Err(e) => {
            tracing::warn!(procedure = P::NAME, "Failed to decode arguments: {}", e);
            return DispatchOutcome::Failed(AcceptStat::GarbageArgs);
        }
    };
    tracing::debug!(procedure = P::NAME, "Arguments decoded");

    let mut reply = Released::new(P::Reply::default());
    match handler.handle(&args, &mut reply) {
        Ok(Outcome::Reply) => {}
        Ok(Outcome::Drop) => {
            tracing::debug!(procedure = P::NAME, "Handler dropped the reply");
            return DispatchOutcome::Dropped;
        }
        Err(e) => {
            tracing::warn!(procedure = P::NAME, "Handler failed: {}", e);
            return DispatchOutcome::Failed(AcceptStat::SystemErr);
        }
    }

    let mark = results.len();
    if let Err(e) = reply.encode(results) {
        results.truncate(mark);
        tracing::error!(procedure = P::NAME, "Failed to encode reply: {}", e);
        return DispatchOutcome::Failed(AcceptStat::SystemErr);
    }
    tracing::debug!(
        procedure = P::NAME,
        bytes = results.len() - mark,
        "Reply encoded"
    );

    DispatchOutcome::Reply
}
