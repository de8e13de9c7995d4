//! ABOUTME: Core types shared by every stepscope crate
//! ABOUTME: Provides the trace event model, trace documents, and the error taxonomy

pub mod error;
pub mod trace;

pub use error::{Result, StepscopeError};
pub use trace::{TraceDocument, TraceEvent, TraceStatus};
