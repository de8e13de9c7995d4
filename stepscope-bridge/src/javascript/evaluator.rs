//! In-process evaluation of instrumented JavaScript.
//!
//! Each evaluation builds a fresh `boa` context holding exactly three
//! bindings: `sandbox` (the reified top-level scope object), `console`
//! (with a capturing `log`) and the `__trace` hook. The blocking engine
//! work runs on the tokio blocking pool; a shared, mutex-guarded event
//! buffer lets the async caller reclaim partial traces even when the
//! wall-clock budget expires.
//!
//! Timeout layering: the `__trace` hook checks the deadline at statement
//! granularity and aborts the script as a runtime error; engine loop and
//! recursion limits cover probe-free loops; an outer tokio timeout with a
//! small grace period is the last resort.

use super::conversion::{format_console_arg, js_value_to_json, own_enumerable_keys, MAX_SNAPSHOT_DEPTH};
use boa_engine::builtins::promise::PromiseState;
use boa_engine::object::builtins::JsPromise;
use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::{
    js_string, Context, JsArgs, JsNativeError, JsObject, JsResult, JsValue, NativeFunction, Source,
};
use parking_lot::Mutex;
use serde_json::Map;
use std::cell::RefCell;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stepscope_core::{TraceDocument, TraceEvent};
use stepscope_config::JsEngineConfig;
use tracing::{debug, instrument};

/// Message attached to deadline failures.
const TIMEOUT_MESSAGE: &str = "execution timed out";

/// Extra wall-clock allowance for the outer timeout, beyond the
/// cooperative deadline.
const GRACE_MS: u64 = 250;

/// State shared between the async caller and the native hooks running on
/// the blocking thread.
struct EvalShared {
    events: Mutex<Vec<TraceEvent>>,
    deadline: Instant,
}

impl EvalShared {
    fn new(deadline: Instant) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            deadline,
        }
    }

    fn push(&self, event: TraceEvent) {
        self.events.lock().push(event);
    }

    fn take_events(&self) -> Vec<TraceEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

thread_local! {
    /// The evaluation currently running on this blocking thread. Native
    /// hooks have no captures, so this is how they reach the buffer.
    static ACTIVE: RefCell<Option<Arc<EvalShared>>> = const { RefCell::new(None) };
}

struct ActiveGuard;

impl ActiveGuard {
    fn install(shared: Arc<EvalShared>) -> Self {
        ACTIVE.with(|slot| *slot.borrow_mut() = Some(shared));
        Self
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        ACTIVE.with(|slot| *slot.borrow_mut() = None);
    }
}

fn current_shared() -> Option<Arc<EvalShared>> {
    ACTIVE.with(|slot| slot.borrow().clone())
}

/// Evaluate an instrumented program and collect its trace.
///
/// Runtime failures (throws, deadline expiry, engine limits) append an
/// error event and yield `status = error`; events accumulated before the
/// failure are always kept.
#[instrument(level = "debug", skip_all, fields(bytes = instrumented.len()))]
pub async fn evaluate(instrumented: &str, config: &JsEngineConfig) -> TraceDocument {
    let deadline = Instant::now() + Duration::from_millis(config.timeout_ms);
    let shared = Arc::new(EvalShared::new(deadline));
    let worker_shared = shared.clone();
    let source = instrumented.to_owned();
    let worker_config = config.clone();

    let handle =
        tokio::task::spawn_blocking(move || run_in_context(&source, &worker_shared, &worker_config));

    let budget = Duration::from_millis(config.timeout_ms + GRACE_MS);
    let outcome = tokio::time::timeout(budget, handle).await;
    let mut events = shared.take_events();
    match outcome {
        Ok(Ok(Ok(()))) => TraceDocument::ok(events),
        Ok(Ok(Err(message))) => {
            debug!(%message, "script evaluation failed");
            events.push(TraceEvent::error(message.clone()));
            TraceDocument::error(events, message)
        }
        Ok(Err(join_error)) => {
            let message = format!("evaluator worker failed: {join_error}");
            events.push(TraceEvent::error(message.clone()));
            TraceDocument::error(events, message)
        }
        Err(_) => {
            // the worker is still grinding; engine limits will stop it
            debug!("evaluation exceeded its wall-clock budget");
            events.push(TraceEvent::error(TIMEOUT_MESSAGE));
            TraceDocument::error(events, TIMEOUT_MESSAGE)
        }
    }
}

fn run_in_context(
    source: &str,
    shared: &Arc<EvalShared>,
    config: &JsEngineConfig,
) -> Result<(), String> {
    let _guard = ActiveGuard::install(shared.clone());

    let mut context = Context::default();
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(config.loop_iteration_limit);
    context
        .runtime_limits_mut()
        .set_recursion_limit(config.recursion_limit);
    install_globals(&mut context).map_err(|e| e.to_string())?;

    let value = context
        .eval(Source::from_bytes(source))
        .map_err(|e| e.to_string())?;
    let _ = context.run_jobs();

    if let Some(object) = value.as_object() {
        if let Ok(promise) = JsPromise::from_object(object.clone()) {
            if let PromiseState::Rejected(reason) = promise.state() {
                return Err(rejection_message(&reason, &mut context));
            }
        }
    }
    Ok(())
}

fn install_globals(context: &mut Context) -> JsResult<()> {
    let sandbox = JsObject::with_object_proto(context.intrinsics());
    context.register_global_property(
        js_string!("sandbox"),
        sandbox,
        Attribute::WRITABLE | Attribute::CONFIGURABLE,
    )?;

    let console = ObjectInitializer::new(context)
        .function(NativeFunction::from_fn_ptr(console_log), js_string!("log"), 1)
        .build();
    context.register_global_property(
        js_string!("console"),
        console,
        Attribute::WRITABLE | Attribute::CONFIGURABLE,
    )?;

    context.register_global_callable(
        js_string!("__trace"),
        1,
        NativeFunction::from_fn_ptr(trace_hook),
    )?;
    Ok(())
}

/// `__trace(line)`: record a step event with a shallow snapshot of the
/// sandbox, enforcing the cooperative deadline.
fn trace_hook(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let Some(shared) = current_shared() else {
        return Ok(JsValue::undefined());
    };
    if Instant::now() >= shared.deadline {
        return Err(JsNativeError::error().with_message(TIMEOUT_MESSAGE).into());
    }
    let line = args.get_or_undefined(0).to_u32(context)?;
    let locals = snapshot_sandbox(context)?;
    shared.push(TraceEvent::step(line, locals));
    Ok(JsValue::undefined())
}

/// `console.log(...)`: join the space-separated rendering of each
/// argument into a log event.
fn console_log(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let Some(shared) = current_shared() else {
        return Ok(JsValue::undefined());
    };
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        parts.push(format_console_arg(arg, context)?);
    }
    shared.push(TraceEvent::log(parts.join(" ")));
    Ok(JsValue::undefined())
}

/// Shallow clone of the sandbox's own enumerable keys. Values convert
/// depth-bounded; `undefined` and function-valued keys are omitted, like
/// `JSON.stringify` would.
fn snapshot_sandbox(context: &mut Context) -> JsResult<Map<String, serde_json::Value>> {
    let sandbox = context
        .global_object()
        .get(js_string!("sandbox"), context)?;
    let Some(sandbox) = sandbox.as_object() else {
        return Ok(Map::new());
    };
    let sandbox = sandbox.clone();
    let mut locals = Map::new();
    for key in own_enumerable_keys(&sandbox, context)? {
        let value = sandbox.get(boa_engine::JsString::from(key.as_str()), context)?;
        if let Some(json) = js_value_to_json(&value, context, MAX_SNAPSHOT_DEPTH) {
            locals.insert(key, json);
        }
    }
    Ok(locals)
}

fn rejection_message(reason: &JsValue, context: &mut Context) -> String {
    if let Some(object) = reason.as_object() {
        if let Ok(message) = object.get(js_string!("message"), context) {
            if !message.is_undefined() {
                if let Ok(s) = message.to_string(context) {
                    return s.to_std_string_escaped();
                }
            }
        }
    }
    reason.display().to_string()
}
