//! Command execution.

use crate::cli::Commands;
use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::sync::Arc;
use stepscope_bridge::{JsEngine, Language, PythonTracer, TraceBackend};
use stepscope_config::StepscopeConfig;
use stepscope_web::{AppState, WebServer};

pub async fn execute_command(command: Commands, mut config: StepscopeConfig) -> Result<()> {
    match command {
        Commands::Serve { host, port, tracer } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(tracer) = tracer {
                config.python.tracer_path = tracer;
            }
            let state = AppState::from_config(&config);
            WebServer::run(&config.server, state).await
        }
        Commands::Exec { path, language } => {
            let source = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let language = resolve_language(language.as_deref(), &path)?;
            let backend: Arc<dyn TraceBackend> = match language {
                Language::Javascript => Arc::new(JsEngine::new(config.javascript.clone())),
                Language::Python => Arc::new(PythonTracer::new(config.python.clone())),
            };
            let document = backend.trace(&source, &[]).await?;
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(())
        }
    }
}

fn resolve_language(flag: Option<&str>, path: &Path) -> Result<Language> {
    if let Some(raw) = flag {
        return raw
            .parse()
            .map_err(|()| anyhow!("unsupported language: {raw}"));
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("js" | "mjs") => Ok(Language::Javascript),
        Some("py") => Ok(Language::Python),
        other => Err(anyhow!(
            "cannot infer language from extension {other:?}; pass --language"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn languages_resolve_from_extensions() {
        assert_eq!(
            resolve_language(None, Path::new("a.js")).unwrap(),
            Language::Javascript
        );
        assert_eq!(
            resolve_language(None, Path::new("a.py")).unwrap(),
            Language::Python
        );
        assert!(resolve_language(None, Path::new("a.rb")).is_err());
    }

    #[test]
    fn explicit_language_wins() {
        assert_eq!(
            resolve_language(Some("python"), Path::new("a.js")).unwrap(),
            Language::Python
        );
        assert!(resolve_language(Some("cobol"), Path::new("a.js")).is_err());
    }
}
