//! KRPC Transport Layer
//!
//! Record-marked framing over TCP, and the blocking client transport.
//!
//! # Components
//!
//! - **[`record`]**: fragment headers, reassembly and size limits (sync and async)
//! - **[`TcpTransport`]**: synchronous TCP transport (used by the client)
//!
//! The server side drives [`record::read_record_async`] and
//! [`record::write_record_async`] from its own accept loop.

pub mod record;
pub mod tcp;

pub use record::{read_record, read_record_async, write_record, write_record_async};
pub use tcp::TcpTransport;
