//! KRPC Client
//!
//! Synchronous calls over a cached, lazily opened TCP connection.

pub mod api;
pub mod call;
pub mod client;
pub mod config;

pub use api::{get_tasks, null, release_tasks};
pub use call::call;
pub use client::{ClientContext, Connection};
pub use config::ClientConfig;
