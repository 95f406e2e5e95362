//! # Remote Driver Types
//!
//! Transport-agnostic data model shared between the driver controller and the
//! in-process invoker.
//!
//! ## Message Flow
//!
//! ```text
//!  controller                         invoker
//!  ──────────                         ───────
//!  Call { kind, type_name, args } ──▶ resolve + execute
//!                                 ◀── CallResult::Value | Handle | HandleList
//! ```
//!
//! - [`Call`] describes one remote call: what to construct or which method to
//!   run, on which receiver, under which lock and on which thread.
//! - [`Argument`] is either a literal [`Value`] or a [`Ref`] handle issued by an
//!   earlier call.
//! - [`CallResult`] carries the shaped result. Pass-by-value data travels as a
//!   [`Value`]; everything else travels as one or more [`Ref`] handles.
//!
//! Every type derives `serde` so the transport can choose its own encoding.

pub mod call;
pub mod reference;
pub mod result;
pub mod value;
pub mod version;

pub use call::{Argument, Call, CallKind, LockSemantics, OnDispatcher};
pub use reference::{Ref, RefList};
pub use result::CallResult;
pub use value::{Value, ValueTypeError};
pub use version::ProductVersion;

/// Session id reserved for the process-wide weak reference table
pub const GLOBAL_SESSION_ID: u32 = 0;
