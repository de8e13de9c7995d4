//! Coordination with the external Python tracer.
//!
//! The tracer is an opaque collaborator: it receives a source file path
//! (plus a JSON breakpoint list when one is set) and prints a single JSON
//! document to stdout. Everything the subprocess does wrong — crashing,
//! hanging, printing garbage — comes back as a payload-level error
//! document; only temp-file I/O failures are errors of this service.

use crate::engine::{Language, TraceBackend};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use stepscope_config::PythonTracerConfig;
use stepscope_core::{Result, TraceDocument, TraceEvent, TraceStatus};
use tokio::fs;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Wire format printed by the tracer.
#[derive(Debug, Deserialize)]
struct TracerReport {
    status: String,
    #[serde(default)]
    traces: Vec<TraceEvent>,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    error: Option<String>,
}

/// The out-of-process Python backend.
pub struct PythonTracer {
    config: PythonTracerConfig,
}

impl PythonTracer {
    #[must_use]
    pub const fn new(config: PythonTracerConfig) -> Self {
        Self { config }
    }

    /// Run `source` under the tracer and collect its trace document.
    ///
    /// # Errors
    ///
    /// Returns an error only for temp-file I/O failures; subprocess
    /// failures are reported inside the document.
    #[instrument(level = "debug", skip(self, source), fields(bytes = source.len()))]
    pub async fn run(&self, source: &str, breakpoints: &[u32]) -> Result<TraceDocument> {
        fs::create_dir_all(&self.config.temp_dir).await?;
        let source_path = self
            .config
            .temp_dir
            .join(format!("{}.py", Uuid::new_v4()));
        fs::write(&source_path, source).await?;

        let document = self.spawn_and_collect(&source_path, breakpoints).await;

        if let Err(e) = fs::remove_file(&source_path).await {
            debug!(path = %source_path.display(), error = %e, "failed to remove temp source");
        }
        Ok(document)
    }

    async fn spawn_and_collect(&self, source_path: &Path, breakpoints: &[u32]) -> TraceDocument {
        let tracer = match resolve_tracer(&self.config.tracer_path) {
            Ok(path) => path,
            Err(message) => return TraceDocument::error(vec![], message),
        };

        let mut command = Command::new(&tracer);
        command
            .arg(source_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !breakpoints.is_empty() {
            command.arg(serde_json::to_string(breakpoints).unwrap_or_default());
        }

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return TraceDocument::error(
                    vec![],
                    format!("failed to launch tracer {}: {e}", tracer.display()),
                );
            }
        };

        let budget = Duration::from_millis(self.config.timeout_ms);
        let output = match timeout(budget, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return TraceDocument::error(vec![], e.to_string()),
            // dropping the future kills the child (kill_on_drop)
            Err(_) => return TraceDocument::error(vec![], "timeout"),
        };

        if !output.stderr.is_empty() {
            debug!(stderr = %String::from_utf8_lossy(&output.stderr), "tracer stderr");
        }

        match serde_json::from_slice::<TracerReport>(&output.stdout) {
            Ok(report) => report_to_document(report),
            Err(e) => {
                debug!(error = %e, "tracer stdout was not a valid report");
                TraceDocument::error(vec![], String::from_utf8_lossy(&output.stdout).into_owned())
            }
        }
    }
}

#[async_trait]
impl TraceBackend for PythonTracer {
    fn language(&self) -> Language {
        Language::Python
    }

    async fn trace(&self, source: &str, breakpoints: &[u32]) -> Result<TraceDocument> {
        self.run(source, breakpoints).await
    }
}

fn report_to_document(report: TracerReport) -> TraceDocument {
    let status = if report.status == "ok" {
        TraceStatus::Ok
    } else {
        TraceStatus::Error
    };
    let message = match status {
        TraceStatus::Ok => None,
        TraceStatus::Error => Some(
            report
                .error
                .unwrap_or_else(|| "tracer reported an error".to_string()),
        ),
    };
    TraceDocument {
        events: report.traces,
        status,
        message,
        stdout: Some(report.stdout),
    }
}

/// Resolve the configured tracer to an absolute path: explicit paths are
/// canonicalized, bare names looked up on PATH.
fn resolve_tracer(configured: &Path) -> std::result::Result<PathBuf, String> {
    if configured.is_absolute() {
        return Ok(configured.to_path_buf());
    }
    if configured.components().count() > 1 || configured.exists() {
        return std::fs::canonicalize(configured)
            .map_err(|e| format!("tracer not found at {}: {e}", configured.display()));
    }
    which::which(configured)
        .map_err(|e| format!("tracer '{}' not found on PATH: {e}", configured.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Write an executable stub tracer into `dir`.
    #[cfg(unix)]
    fn stub_tracer(dir: &Path, name: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        file.write_all(script.as_bytes()).unwrap();
        drop(file);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn tracer_with(dir: &tempfile::TempDir, script: &str) -> PythonTracer {
        let path = stub_tracer(dir.path(), "stub_tracer.sh", script);
        PythonTracer::new(PythonTracerConfig {
            tracer_path: path,
            timeout_ms: 5_000,
            temp_dir: dir.path().join("temp"),
        })
    }

    const HAPPY_REPORT: &str = r#"printf '%s' '{"status": "ok", "traces": [{"event": "step", "line": 1, "locals": {}, "callStack": ["<module>"]}, {"event": "step", "line": 2, "locals": {"x": 1}, "callStack": ["<module>", "main"]}], "stdout": "hello\n"}'"#;

    #[cfg(unix)]
    #[tokio::test]
    async fn happy_path_parses_the_report() {
        let dir = tempfile::tempdir().unwrap();
        let tracer = tracer_with(&dir, HAPPY_REPORT);
        let doc = tracer.run("print('hello')\n", &[]).await.unwrap();
        assert_eq!(doc.status, TraceStatus::Ok);
        assert_eq!(doc.stdout.as_deref(), Some("hello\n"));
        assert_eq!(doc.events.len(), 2);
        assert_eq!(doc.events[1].depth(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tracer_reported_errors_carry_the_message() {
        let dir = tempfile::tempdir().unwrap();
        let tracer = tracer_with(
            &dir,
            r#"echo '{"status": "error", "traces": [], "stdout": "", "error": "NameError: x"}'"#,
        );
        let doc = tracer.run("x\n", &[]).await.unwrap();
        assert!(doc.is_error());
        assert_eq!(doc.message.as_deref(), Some("NameError: x"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn garbage_stdout_becomes_the_error_message() {
        let dir = tempfile::tempdir().unwrap();
        let tracer = tracer_with(&dir, "echo 'Traceback: something exploded'");
        let doc = tracer.run("pass\n", &[]).await.unwrap();
        assert!(doc.is_error());
        assert!(doc
            .message
            .as_deref()
            .is_some_and(|m| m.contains("something exploded")));
        assert!(doc.events.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_tracers_time_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = stub_tracer(dir.path(), "sleepy.sh", "sleep 30");
        let tracer = PythonTracer::new(PythonTracerConfig {
            tracer_path: path,
            timeout_ms: 300,
            temp_dir: dir.path().join("temp"),
        });
        let doc = tracer.run("while True: pass\n", &[]).await.unwrap();
        assert!(doc.is_error());
        assert_eq!(doc.message.as_deref(), Some("timeout"));
        assert!(doc.events.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn breakpoints_are_passed_as_a_json_argument() {
        let dir = tempfile::tempdir().unwrap();
        // echo argv[2] back through the report's stdout field
        let tracer = tracer_with(
            &dir,
            r#"printf '{"status": "ok", "traces": [], "stdout": "%s"}' "$2""#,
        );
        let doc = tracer.run("pass\n", &[5, 9]).await.unwrap();
        assert_eq!(doc.stdout.as_deref(), Some("[5,9]"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn no_breakpoint_argument_when_none_are_set() {
        let dir = tempfile::tempdir().unwrap();
        let tracer = tracer_with(
            &dir,
            r#"printf '{"status": "ok", "traces": [], "stdout": "argc=%s"}' "$#""#,
        );
        let doc = tracer.run("pass\n", &[]).await.unwrap();
        assert_eq!(doc.stdout.as_deref(), Some("argc=1"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn temp_files_are_cleaned_up_on_every_path() {
        let dir = tempfile::tempdir().unwrap();
        let temp = dir.path().join("temp");

        let tracer = tracer_with(&dir, HAPPY_REPORT);
        tracer.run("print(1)\n", &[]).await.unwrap();
        assert_eq!(std::fs::read_dir(&temp).unwrap().count(), 0);

        let broken = PythonTracer::new(PythonTracerConfig {
            tracer_path: dir.path().join("does-not-exist"),
            timeout_ms: 1_000,
            temp_dir: temp.clone(),
        });
        let doc = broken.run("print(1)\n", &[]).await.unwrap();
        assert!(doc.is_error());
        assert_eq!(std::fs::read_dir(&temp).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_tracer_is_payload_level() {
        let dir = tempfile::tempdir().unwrap();
        let tracer = PythonTracer::new(PythonTracerConfig {
            tracer_path: PathBuf::from("/definitely/not/a/tracer"),
            timeout_ms: 1_000,
            temp_dir: dir.path().join("temp"),
        });
        let doc = tracer.run("pass\n", &[]).await.unwrap();
        assert!(doc.is_error());
        assert!(doc.message.is_some());
    }
}
