//! Interactive debugging over precomputed traces
//!
//! A debug session holds the full trace of one execution plus a cursor
//! and a breakpoint set; navigation commands move the cursor forward and
//! never backward. The manager keys sessions by unguessable IDs and
//! serializes commands per session.

pub mod manager;
pub mod session;

pub use manager::DebugSessionManager;
pub use session::{CommandOutcome, DebugCommand, DebugSession};
