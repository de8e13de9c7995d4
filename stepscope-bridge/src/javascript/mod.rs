//! ABOUTME: JavaScript backend - in-process instrumentation and evaluation
//! ABOUTME: Rewrites source with trace probes, then runs it in an embedded boa context

pub mod conversion;
pub mod evaluator;
pub mod instrument;
mod lexer;

pub use evaluator::evaluate;
pub use instrument::instrument;

use crate::engine::{Language, TraceBackend};
use async_trait::async_trait;
use stepscope_config::JsEngineConfig;
use stepscope_core::{Result, StepscopeError, TraceDocument};

/// The in-process JavaScript backend: instrument, then evaluate.
pub struct JsEngine {
    config: JsEngineConfig,
}

impl JsEngine {
    #[must_use]
    pub const fn new(config: JsEngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TraceBackend for JsEngine {
    fn language(&self) -> Language {
        Language::Javascript
    }

    async fn trace(&self, source: &str, _breakpoints: &[u32]) -> Result<TraceDocument> {
        let instrumented = match instrument(source) {
            Ok(instrumented) => instrumented,
            // a program that cannot be parsed is the user's failure, not
            // ours; it travels back payload-level
            Err(StepscopeError::Instrumentation { message }) => {
                return Ok(TraceDocument::error(vec![], message));
            }
            Err(other) => return Err(other),
        };
        Ok(evaluate(&instrumented, &self.config).await)
    }
}
