//! Request handlers for the execution and debug endpoints.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stepscope_bridge::Language;
use stepscope_core::{TraceDocument, TraceEvent};
use stepscope_debug::{CommandOutcome, DebugCommand};
use tracing::info;

// ==================== /execute ====================

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub language: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub events: Vec<TraceEvent>,
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<TraceDocument> for ExecuteResponse {
    fn from(doc: TraceDocument) -> Self {
        Self {
            error: doc.is_error(),
            events: doc.events,
            output: doc.stdout,
            message: doc.message,
        }
    }
}

/// Run code under the requested backend. User-code failures are part of
/// the payload, never an HTTP failure.
pub async fn execute(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> ApiResult<Json<ExecuteResponse>> {
    let (language, code) = required_inputs(request.language, request.code)?;
    let language = parse_language(&language)?;
    info!(%language, bytes = code.len(), "execute request");
    let document = state.backend(language).trace(&code, &[]).await?;
    Ok(Json(ExecuteResponse::from(document)))
}

// ==================== /debug/start ====================

#[derive(Debug, Deserialize)]
pub struct DebugStartRequest {
    pub language: Option<String>,
    pub code: Option<String>,
    #[serde(default)]
    pub breakpoints: Vec<u32>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DebugStartResponse {
    Started {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Failed {
        error: bool,
        message: String,
    },
}

/// Precompute a Python trace and open an interactive session over it.
pub async fn debug_start(
    State(state): State<AppState>,
    Json(request): Json<DebugStartRequest>,
) -> ApiResult<Json<DebugStartResponse>> {
    let (language, code) = required_inputs(request.language, request.code)?;
    if parse_language(&language)? != Language::Python {
        return Err(ApiError::bad_request(
            "Interactive debugging is only supported for python",
        ));
    }

    let document = state
        .backend(Language::Python)
        .trace(&code, &request.breakpoints)
        .await?;
    if document.is_error() {
        return Ok(Json(DebugStartResponse::Failed {
            error: true,
            message: document
                .message
                .unwrap_or_else(|| "tracer failed".to_string()),
        }));
    }

    let session_id = state
        .sessions
        .create(document.events, request.breakpoints)
        .await;
    info!(%session_id, "debug session started");
    Ok(Json(DebugStartResponse::Started { session_id }))
}

// ==================== /debug/command ====================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugCommandRequest {
    pub session_id: Option<String>,
    pub command: Option<String>,
    /// Only meaningful for `setBreakpoint`; non-numeric values are
    /// silently ignored there.
    pub line: Option<Value>,
}

/// Interpret one debugger command against a session. Commands on the
/// same session serialize behind its mutex.
pub async fn debug_command(
    State(state): State<AppState>,
    Json(request): Json<DebugCommandRequest>,
) -> ApiResult<Json<CommandOutcome>> {
    let session_id = request
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing required field: sessionId"))?;
    let command = request
        .command
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing required field: command"))?;
    let command: DebugCommand = command
        .parse()
        .map_err(|()| ApiError::bad_request(format!("Unknown debug command: {command}")))?;

    let session = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    let line = request.line.as_ref().and_then(Value::as_u64);
    let mut guard = session.lock().await;
    Ok(Json(guard.execute(command, line)))
}

// ==================== /debug/destroy ====================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugDestroyRequest {
    pub session_id: Option<String>,
}

pub async fn debug_destroy(
    State(state): State<AppState>,
    Json(request): Json<DebugDestroyRequest>,
) -> ApiResult<Json<Value>> {
    let session_id = request
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing required field: sessionId"))?;
    let destroyed = state.sessions.remove(&session_id).await;
    Ok(Json(json!({ "destroyed": destroyed })))
}

// ==================== /health ====================

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ==================== helpers ====================

fn required_inputs(
    language: Option<String>,
    code: Option<String>,
) -> ApiResult<(String, String)> {
    let language = language
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing required field: language"))?;
    let code = code.ok_or_else(|| ApiError::bad_request("Missing required field: code"))?;
    Ok((language, code))
}

fn parse_language(raw: &str) -> ApiResult<Language> {
    raw.parse()
        .map_err(|()| ApiError::bad_request("Unsupported language"))
}
