//! Router assembly and the listening server.

use crate::handlers;
use crate::state::AppState;
use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use stepscope_config::ServerConfig;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct WebServer;

impl WebServer {
    /// Build the application router. Kept separate from `run` so tests
    /// can drive it in-process.
    #[must_use]
    pub fn build_app(state: AppState) -> Router {
        Router::new()
            .route("/execute", post(handlers::execute))
            .route("/debug/start", post(handlers::debug_start))
            .route("/debug/command", post(handlers::debug_command))
            .route("/debug/destroy", post(handlers::debug_destroy))
            .route("/health", get(handlers::health))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind and serve until the process exits.
    ///
    /// # Errors
    ///
    /// Returns an error if the listen address cannot be bound.
    pub async fn run(config: &ServerConfig, state: AppState) -> Result<()> {
        let app = Self::build_app(state);
        let addr = format!("{}:{}", config.host, config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!(%addr, "stepscope listening");
        axum::serve(listener, app).await?;
        Ok(())
    }
}
