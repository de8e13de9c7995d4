//! ABOUTME: Language backends for stepscope
//! ABOUTME: JavaScript runs in-process under instrumentation; Python runs through an external tracer

pub mod engine;
pub mod javascript;
pub mod python;

pub use engine::{Language, TraceBackend};
pub use javascript::JsEngine;
pub use python::PythonTracer;
