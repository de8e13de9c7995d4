//! ABOUTME: Central configuration management for stepscope
//! ABOUTME: Handles TOML parsing, discovery, and environment variable overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Configuration file discovery order
const CONFIG_SEARCH_PATHS: &[&str] = &[
    "stepscope.toml",
    ".stepscope.toml",
    "config/stepscope.toml",
];

/// Environment variable prefix
const ENV_PREFIX: &str = "STEPSCOPE_";

/// Central stepscope configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StepscopeConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// In-process JavaScript evaluator settings
    pub javascript: JsEngineConfig,
    /// External Python tracer settings
    pub python: PythonTracerConfig,
    /// Debug session retention policy
    pub sessions: SessionConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Settings for the embedded JavaScript evaluator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JsEngineConfig {
    /// Wall-clock budget for a single evaluation, in milliseconds.
    pub timeout_ms: u64,
    /// Engine-level loop iteration ceiling, the backstop for loops that
    /// never reach a trace probe.
    pub loop_iteration_limit: u64,
    /// Engine-level recursion ceiling.
    pub recursion_limit: usize,
}

impl Default for JsEngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1_000,
            loop_iteration_limit: 10_000_000,
            recursion_limit: 512,
        }
    }
}

/// Settings for the external Python tracer subprocess
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PythonTracerConfig {
    /// Path to the tracer executable. Relative paths are resolved against
    /// the working directory; bare names are looked up on PATH.
    pub tracer_path: PathBuf,
    /// Wall-clock budget for the subprocess, in milliseconds.
    pub timeout_ms: u64,
    /// Directory for per-request source files.
    pub temp_dir: PathBuf,
}

impl Default for PythonTracerConfig {
    fn default() -> Self {
        Self {
            tracer_path: PathBuf::from("tracer/python_tracer.py"),
            timeout_ms: 5_000,
            temp_dir: PathBuf::from("temp"),
        }
    }
}

/// Debug session retention policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions older than this are swept.
    pub ttl_secs: u64,
    /// Hard cap; the oldest session is evicted beyond it.
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3_600,
            max_sessions: 256,
        }
    }
}

impl StepscopeConfig {
    /// Load configuration: an explicit path if given, otherwise the first
    /// file found on the discovery list, otherwise defaults. Environment
    /// overrides are applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit path cannot be read or any
    /// discovered file fails to parse.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit {
            Self::from_file(path).await?
        } else if let Some(path) = discover_config_file() {
            debug!(path = %path.display(), "loading discovered configuration");
            Self::from_file(&path).await?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Apply `STEPSCOPE_*` environment overrides on top of the loaded
    /// values. Unparseable values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std_env::var(format!("{ENV_PREFIX}HOST")) {
            self.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("PORT") {
            self.server.port = port;
        }
        if let Ok(path) = std_env::var(format!("{ENV_PREFIX}TRACER")) {
            self.python.tracer_path = PathBuf::from(path);
        }
        if let Ok(dir) = std_env::var(format!("{ENV_PREFIX}TEMP_DIR")) {
            self.python.temp_dir = PathBuf::from(dir);
        }
        if let Some(ms) = env_parse::<u64>("JS_TIMEOUT_MS") {
            self.javascript.timeout_ms = ms;
        }
        if let Some(ms) = env_parse::<u64>("TRACER_TIMEOUT_MS") {
            self.python.timeout_ms = ms;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std_env::var(format!("{ENV_PREFIX}{key}")).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

fn discover_config_file() -> Option<PathBuf> {
    CONFIG_SEARCH_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = StepscopeConfig::default();
        assert_eq!(config.javascript.timeout_ms, 1_000);
        assert_eq!(config.python.timeout_ms, 5_000);
        assert_eq!(config.python.temp_dir, PathBuf::from("temp"));
        assert_eq!(config.sessions.ttl_secs, 3_600);
    }

    #[tokio::test]
    async fn parses_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stepscope.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 9000

[python]
tracer_path = "/opt/tracer/run.py"
"#,
        )
        .unwrap();

        let config = StepscopeConfig::from_file(&path).await.unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.python.tracer_path, PathBuf::from("/opt/tracer/run.py"));
        // untouched sections keep defaults
        assert_eq!(config.javascript.timeout_ms, 1_000);
    }

    #[tokio::test]
    async fn missing_explicit_file_is_an_error() {
        let result = StepscopeConfig::from_file(Path::new("/nonexistent/stepscope.toml")).await;
        assert!(result.is_err());
    }

    #[test]
    fn env_overrides_apply() {
        // serial-unsafe env mutation kept to a single test
        std_env::set_var("STEPSCOPE_PORT", "7777");
        std_env::set_var("STEPSCOPE_TRACER", "/usr/local/bin/pytracer");
        let mut config = StepscopeConfig::default();
        config.apply_env_overrides();
        std_env::remove_var("STEPSCOPE_PORT");
        std_env::remove_var("STEPSCOPE_TRACER");

        assert_eq!(config.server.port, 7777);
        assert_eq!(config.python.tracer_path, PathBuf::from("/usr/local/bin/pytracer"));
    }
}
