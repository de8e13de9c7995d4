//! Shared application state.

use std::sync::Arc;
use std::time::Duration;
use stepscope_bridge::{JsEngine, Language, PythonTracer, TraceBackend};
use stepscope_config::StepscopeConfig;
use stepscope_debug::DebugSessionManager;

#[derive(Clone)]
pub struct AppState {
    javascript: Arc<dyn TraceBackend>,
    python: Arc<dyn TraceBackend>,
    pub sessions: Arc<DebugSessionManager>,
}

impl AppState {
    #[must_use]
    pub fn from_config(config: &StepscopeConfig) -> Self {
        Self::with_backends(
            Arc::new(JsEngine::new(config.javascript.clone())),
            Arc::new(PythonTracer::new(config.python.clone())),
            Arc::new(DebugSessionManager::new(
                Duration::from_secs(config.sessions.ttl_secs),
                config.sessions.max_sessions,
            )),
        )
    }

    /// Assemble state from explicit parts; tests use this to swap in
    /// stub tracers.
    #[must_use]
    pub fn with_backends(
        javascript: Arc<dyn TraceBackend>,
        python: Arc<dyn TraceBackend>,
        sessions: Arc<DebugSessionManager>,
    ) -> Self {
        Self {
            javascript,
            python,
            sessions,
        }
    }

    #[must_use]
    pub fn backend(&self, language: Language) -> &Arc<dyn TraceBackend> {
        match language {
            Language::Javascript => &self.javascript,
            Language::Python => &self.python,
        }
    }
}
