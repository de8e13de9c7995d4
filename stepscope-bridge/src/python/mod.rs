//! ABOUTME: Python backend - external tracer subprocess coordination
//! ABOUTME: Manages temp-file lifecycle, spawn-with-timeout, and wire-format parsing

mod runner;

pub use runner::PythonTracer;
