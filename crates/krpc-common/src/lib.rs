//! KRPC Common Types and Transport
//!
//! Core pieces shared by the KRPC client and server:
//!
//! - **XDR codec** ([`xdr`]): big-endian scalars and bounded, length-prefixed
//!   strings and arrays, with an explicit [`xdr::Release`] for owned payloads
//! - **Protocol** ([`protocol`]): error taxonomy, procedure descriptors and
//!   ONC-style call/reply headers
//! - **Transport** ([`transport`]): record-marked TCP framing
//! - **Example program** ([`tasks`]): the task-listing procedures
//!
//! # Wire Format
//!
//! Every message is one record: `[u32 fragment header][call or reply header][body]`.
//! Bodies are sized by the procedure descriptors, which derive their bounds
//! from the same constants the codec enforces.

pub mod protocol;
pub mod tasks;
pub mod transport;
pub mod xdr;

pub use protocol::*;
