//! HTTP surface for stepscope
//!
//! Three POST endpoints drive the service: `/execute` runs code under
//! either backend, `/debug/start` precomputes a Python trace and opens an
//! interactive session over it, and `/debug/command` navigates that
//! session. User-program failures are payload-level (`error: true` under
//! HTTP 200); only bad requests, unknown sessions, and service failures
//! use HTTP status codes.

pub mod error;
pub mod handlers;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use server::WebServer;
pub use state::AppState;
