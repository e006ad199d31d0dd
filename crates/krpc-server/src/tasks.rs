//! Server side of the example task-listing program.

use krpc_common::protocol::Result;
use krpc_common::tasks::{
    GetTasks, Null, Task, TaskName, Tasks, EXAMPLE_PROGRAM, EXAMPLE_PROGRAM_NAME, INITIAL_VERSION,
    MAX_TASKS,
};

use crate::handler::{HandlerError, Outcome, ProcedureHandler};
use crate::registry::{Program, Version};
use crate::task_source::TaskSource;

/// `NULL`: answers with an empty reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHandler;

impl ProcedureHandler<Null> for NullHandler {
    fn handle(&self, _args: &(), _reply: &mut ()) -> std::result::Result<Outcome, HandlerError> {
        Ok(Outcome::Reply)
    }
}

/// `GET_TASKS`: lists up to [`MAX_TASKS`] tasks from a [`TaskSource`].
///
/// The whole reply, including every name buffer, is allocated before any
/// task is read, so an allocation failure never leaves a partly filled
/// reply behind. Names longer than the wire bound are cut.
pub struct GetTasksHandler<S> {
    source: S,
}

impl<S: TaskSource> GetTasksHandler<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

/// A reply with all `MAX_TASKS` slots and their name buffers reserved.
fn preallocated_tasks() -> std::result::Result<Tasks, HandlerError> {
    let mut tasks = Tasks::try_with_capacity(MAX_TASKS)?;
    while !tasks.is_full() {
        let task = Task {
            name: TaskName::try_preallocated()?,
            ..Task::default()
        };
        if tasks.try_push(task).is_err() {
            return Err(HandlerError::AllocationFailure(
                "task list is full".to_string(),
            ));
        }
    }
    Ok(tasks)
}

impl<S: TaskSource> ProcedureHandler<GetTasks> for GetTasksHandler<S> {
    fn handle(&self, _args: &(), reply: &mut Tasks) -> std::result::Result<Outcome, HandlerError> {
        let mut tasks = preallocated_tasks()?;

        let mut count = 0;
        for (slot, info) in tasks.as_mut_slice().iter_mut().zip(self.source.tasks()?) {
            slot.name.fill_truncated(&info.name);
            slot.pid = info.pid;
            slot.state = info.state;
            slot.flags = info.flags;
            count += 1;
        }
        tasks.truncate(count);

        tracing::debug!(count, "Collected tasks");
        *reply = tasks;
        Ok(Outcome::Reply)
    }
}

/// Builds the example program: version `INITIAL` with `NULL` and
/// `GET_TASKS` served from `source`.
pub fn example_program<S: TaskSource>(source: S) -> Result<Program> {
    let version = Version::builder(INITIAL_VERSION)
        .procedure::<Null, _>(NullHandler)
        .procedure::<GetTasks, _>(GetTasksHandler::new(source))
        .build()?;

    Program::builder(EXAMPLE_PROGRAM, EXAMPLE_PROGRAM_NAME)
        .version(version)
        .build()
}
