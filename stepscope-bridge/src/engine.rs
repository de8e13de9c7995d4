//! Script backend abstraction
//!
//! The execution endpoint dispatches by language to one of two very
//! different runners; this trait is the seam between them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use stepscope_core::{Result, TraceDocument};

/// Languages the service can trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Javascript,
    Python,
}

impl Language {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Javascript => "javascript",
            Self::Python => "python",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "javascript" => Ok(Self::Javascript),
            "python" => Ok(Self::Python),
            _ => Err(()),
        }
    }
}

/// A language backend that turns source code into a trace document.
///
/// User-program failures (syntax errors, throws, tracer-reported errors)
/// come back inside the document with `status = error`; an `Err` from
/// `trace` means the service itself failed (for example temp-file I/O)
/// and maps to a 500 at the HTTP boundary.
#[async_trait]
pub trait TraceBackend: Send + Sync {
    /// Which language this backend runs.
    fn language(&self) -> Language;

    /// Execute `source` and collect its trace. Backends that cannot honor
    /// breakpoints ignore them.
    async fn trace(&self, source: &str, breakpoints: &[u32]) -> Result<TraceDocument>;
}
