//! ABOUTME: Trace event model shared by both language backends
//! ABOUTME: Defines TraceEvent, TraceStatus, and TraceDocument with their wire shapes

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single observable event produced during a traced execution.
///
/// Serializes with an `event` discriminator so both backends and the
/// debug endpoints speak the same wire shape:
/// `{"event":"step","line":3,"locals":{...},"callStack":[...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TraceEvent {
    /// A program point reached just before executing the statement at `line`.
    Step {
        /// 1-based line in the original source.
        line: u32,
        /// Snapshot of the user's top-level variables at this point.
        #[serde(default)]
        locals: Map<String, Value>,
        /// Function names from outermost to innermost, when the backend
        /// can introspect its call stack.
        #[serde(rename = "callStack", default, skip_serializing_if = "Option::is_none")]
        call_stack: Option<Vec<String>>,
    },
    /// A user-visible console write.
    Log { value: String },
    /// A terminal execution failure observed from inside evaluation.
    Error { message: String },
}

impl TraceEvent {
    /// Step event without call stack information.
    #[must_use]
    pub fn step(line: u32, locals: Map<String, Value>) -> Self {
        Self::Step {
            line,
            locals,
            call_stack: None,
        }
    }

    /// Step event with call stack frames.
    #[must_use]
    pub fn step_with_stack(line: u32, locals: Map<String, Value>, call_stack: Vec<String>) -> Self {
        Self::Step {
            line,
            locals,
            call_stack: Some(call_stack),
        }
    }

    /// Console output event.
    pub fn log(value: impl Into<String>) -> Self {
        Self::Log {
            value: value.into(),
        }
    }

    /// Failure event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// The source line of a step event, if this is one.
    #[must_use]
    pub fn line(&self) -> Option<u32> {
        match self {
            Self::Step { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// Call-stack depth of this event. Events without a call stack
    /// (logs, errors, steps from backends that do not report one) have
    /// depth zero.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Step {
                call_stack: Some(stack),
                ..
            } => stack.len(),
            _ => 0,
        }
    }
}

/// Overall outcome of a traced execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStatus {
    Ok,
    Error,
}

/// An ordered, finite sequence of trace events plus the execution outcome.
///
/// `stdout` is populated only by the subprocess backend, which captures the
/// program's standard output separately from its log events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceDocument {
    pub events: Vec<TraceEvent>,
    pub status: TraceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
}

impl TraceDocument {
    /// Successful execution.
    #[must_use]
    pub fn ok(events: Vec<TraceEvent>) -> Self {
        Self {
            events,
            status: TraceStatus::Ok,
            message: None,
            stdout: None,
        }
    }

    /// Failed execution, keeping whatever events accumulated beforehand.
    pub fn error(events: Vec<TraceEvent>, message: impl Into<String>) -> Self {
        Self {
            events,
            status: TraceStatus::Error,
            message: Some(message.into()),
            stdout: None,
        }
    }

    /// Attach captured standard output.
    #[must_use]
    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = Some(stdout.into());
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == TraceStatus::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_serializes_with_event_discriminator() {
        let mut locals = Map::new();
        locals.insert("x".to_string(), json!(1));
        let event = TraceEvent::step(3, locals);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"event": "step", "line": 3, "locals": {"x": 1}}));
    }

    #[test]
    fn call_stack_field_is_camel_cased() {
        let event = TraceEvent::step_with_stack(1, Map::new(), vec!["<module>".into(), "f".into()]);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["callStack"], json!(["<module>", "f"]));
    }

    #[test]
    fn log_and_error_payload_field_names() {
        let log = serde_json::to_value(TraceEvent::log("hello world")).unwrap();
        assert_eq!(log, json!({"event": "log", "value": "hello world"}));
        let err = serde_json::to_value(TraceEvent::error("boom")).unwrap();
        assert_eq!(err, json!({"event": "error", "message": "boom"}));
    }

    #[test]
    fn deserializes_tracer_shaped_events() {
        let event: TraceEvent = serde_json::from_value(json!({
            "event": "step",
            "line": 7,
            "locals": {"n": 2},
            "callStack": ["<module>", "fib"]
        }))
        .unwrap();
        assert_eq!(event.line(), Some(7));
        assert_eq!(event.depth(), 2);
    }

    #[test]
    fn missing_locals_and_stack_default() {
        let event: TraceEvent = serde_json::from_value(json!({"event": "step", "line": 1})).unwrap();
        assert_eq!(event.depth(), 0);
        match event {
            TraceEvent::Step { locals, .. } => assert!(locals.is_empty()),
            _ => panic!("expected step"),
        }
    }

    #[test]
    fn depth_of_non_step_events_is_zero() {
        assert_eq!(TraceEvent::log("x").depth(), 0);
        assert_eq!(TraceEvent::error("x").depth(), 0);
        assert_eq!(TraceEvent::log("x").line(), None);
    }

    #[test]
    fn document_constructors() {
        let doc = TraceDocument::ok(vec![TraceEvent::log("hi")]);
        assert!(!doc.is_error());
        assert!(doc.message.is_none());

        let doc = TraceDocument::error(vec![], "timeout").with_stdout("partial");
        assert!(doc.is_error());
        assert_eq!(doc.message.as_deref(), Some("timeout"));
        assert_eq!(doc.stdout.as_deref(), Some("partial"));
    }

    #[test]
    fn document_omits_absent_optionals() {
        let value = serde_json::to_value(TraceDocument::ok(vec![])).unwrap();
        assert_eq!(value, json!({"events": [], "status": "ok"}));
    }
}
