//! # Driver Host
//!
//! Runs an [`Invoker`](driver_invoker::Invoker) inside a process and exposes
//! it to controllers over a Unix socket.
//!
//! - [`protocol`]: request and response envelopes, one JSON document per line
//! - [`server`]: accept loop, per-connection tasks and bounded blocking dispatch
//! - [`demo`]: the object graph the binary serves

pub mod demo;
pub mod protocol;
pub mod server;

pub use protocol::{handle_request, parse_request, Request, Response};
pub use server::DriverServer;
