//! Typed wrappers for the example program.

use krpc_common::protocol::Result;
use krpc_common::tasks::{GetTasks, Null, Tasks};
use krpc_common::xdr::Release;

use crate::call::call;
use crate::client::ClientContext;

/// Pings the server.
pub fn null(ctx: &ClientContext) -> Result<()> {
    call::<Null>(ctx, &())
}

/// Fetches the server's task list.
pub fn get_tasks(ctx: &ClientContext) -> Result<Tasks> {
    call::<GetTasks>(ctx, &())
}

/// Frees a task list returned by [`get_tasks`], leaving it empty.
pub fn release_tasks(tasks: &mut Tasks) {
    tasks.release();
}
