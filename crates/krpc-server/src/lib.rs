//! KRPC Server
//!
//! Serves programs described by a procedure table over record-marked TCP.
//!
//! - [`registry`]: programs, versions and their procedure tables
//! - [`dispatch`]: the decode, handle, encode, release pipeline
//! - [`svc`]: header checks and reply framing around one call
//! - [`service`]: listener, worker pool and lifecycle
//! - [`tasks`] and [`task_source`]: the example task-listing program

pub mod config;
pub mod dispatch;
pub mod handler;
pub mod registry;
pub mod service;
pub mod svc;
pub mod task_source;
pub mod tasks;

pub use config::ServerConfig;
pub use dispatch::DispatchOutcome;
pub use handler::{HandlerError, Outcome, ProcedureHandler};
pub use registry::{Program, ServerProcedure, Version};
pub use service::{Service, ServiceHandle};
pub use svc::process_call;
pub use task_source::{ProcfsTasks, StaticTasks, TaskInfo, TaskSource};
pub use tasks::{example_program, GetTasksHandler, NullHandler};
