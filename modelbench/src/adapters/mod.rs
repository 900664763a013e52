//! Provider adapter contract and shared result types.
//!
//! An [`Adapter`] wraps one AI provider (local CLI, cloud CLI, or HTTP API)
//! behind a uniform detect / list-models / run / capabilities surface.
//! Operational failures are values, never errors: adapters convert whatever
//! the underlying tool or transport reports into a [`RunResult`] so callers
//! up the stack (fallback, routing, orchestration) never need to catch
//! anything.

pub mod anthropic;
pub mod claude;
pub mod codex;
pub mod fake;
pub mod gemini;
pub mod goose;
pub mod llamacpp;
pub mod ollama;
pub mod openai;
pub mod opencode;
pub mod registry;
pub mod vllm;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::io::executor::{EXIT_NOT_FOUND, ExecutionResult, ProcessRunner};

/// Default per-call timeout when the caller does not override it.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for cheap detection probes (`--version` and similar).
pub(crate) const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Authentication state reported by detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    Authenticated,
    Unauthenticated,
    Unknown,
    Error,
}

impl AuthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthStatus::Authenticated => "authenticated",
            AuthStatus::Unauthenticated => "unauthenticated",
            AuthStatus::Unknown => "unknown",
            AuthStatus::Error => "error",
        }
    }
}

/// Result of probing whether a provider is installed and usable.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    pub detected: bool,
    pub binary_path: Option<PathBuf>,
    pub version: Option<String>,
    pub auth_status: Option<AuthStatus>,
    /// False when the resolved binary lives outside the allow-listed
    /// directory set. A weak supply-chain signal, not a verdict.
    pub trusted: bool,
    pub error: Option<String>,
}

impl DetectionResult {
    pub fn not_found(error: impl Into<String>) -> Self {
        Self {
            detected: false,
            binary_path: None,
            version: None,
            auth_status: None,
            trusted: true,
            error: Some(error.into()),
        }
    }
}

/// Static per-adapter capability descriptor. Pure; no I/O.
#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub name: String,
    pub streaming: bool,
    pub tool_calling: bool,
    pub max_tokens: Option<u32>,
    pub max_context: Option<u32>,
    pub supports_system_prompt: bool,
    /// True for fully local providers with no network egress.
    pub offline: bool,
    pub cost_per_1k_input: Option<f64>,
    pub cost_per_1k_output: Option<f64>,
}

impl Capabilities {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            streaming: false,
            tool_calling: false,
            max_tokens: None,
            max_context: None,
            supports_system_prompt: true,
            offline: false,
            cost_per_1k_input: None,
            cost_per_1k_output: None,
        }
    }
}

/// Options for one `run` call. Constructed by the caller, read-only to the
/// adapter apart from borrowing the streaming callback.
pub struct RunOptions<'a> {
    /// Target model identifier. Required, non-empty.
    pub model: String,
    pub stream: bool,
    pub timeout: Duration,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub system_prompt: Option<String>,
    /// Invoked once per output chunk, in order, on the calling thread.
    pub on_chunk: Option<&'a mut dyn FnMut(&str)>,
}

impl<'a> RunOptions<'a> {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            stream: false,
            timeout: DEFAULT_RUN_TIMEOUT,
            max_tokens: None,
            temperature: None,
            system_prompt: None,
            on_chunk: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn streaming(mut self, on_chunk: &'a mut dyn FnMut(&str)) -> Self {
        self.stream = true;
        self.on_chunk = Some(on_chunk);
        self
    }

    /// Borrow the streaming callback, present only when streaming was
    /// requested and a callback was supplied.
    pub fn chunk_sink(&mut self) -> Option<&mut dyn FnMut(&str)> {
        match (self.stream, self.on_chunk.as_mut()) {
            (true, Some(callback)) => Some(&mut **callback),
            _ => None,
        }
    }
}

impl std::fmt::Debug for RunOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("model", &self.model)
            .field("stream", &self.stream)
            .field("timeout", &self.timeout)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("system_prompt", &self.system_prompt)
            .field("on_chunk", &self.on_chunk.is_some())
            .finish()
    }
}

/// Outcome of running a prompt through an adapter.
///
/// `exit_code == 0` if and only if the call counts as successful for
/// fallback and routing; `error` is set whenever the code is non-zero and a
/// reason is known.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub output: String,
    pub exit_code: i32,
    pub wall_time_ms: u64,
    pub ttft_ms: Option<u64>,
    pub error: Option<String>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    /// True when token counts are estimated rather than provider-reported.
    pub tokens_estimated: bool,
    pub raw_response: Option<serde_json::Value>,
    pub chunks: Vec<String>,
}

impl RunResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// Result for a provider whose binary could not be resolved.
    pub fn binary_missing(name: &str) -> Self {
        Self {
            exit_code: EXIT_NOT_FOUND,
            error: Some(format!("{name} binary not found")),
            ..Self::default()
        }
    }

    pub fn failure(exit_code: i32, error: impl Into<String>) -> Self {
        Self {
            exit_code,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Map a finished subprocess execution onto the adapter contract.
    pub fn from_execution(exec: ExecutionResult) -> Self {
        let error = if exec.exit_code == 0 {
            None
        } else if !exec.stderr.trim().is_empty() {
            Some(exec.stderr.trim().to_string())
        } else if exec.timed_out {
            Some(format!("timed out after {} ms", exec.wall_time_ms))
        } else {
            Some(format!("exit code {}", exec.exit_code))
        };
        Self {
            output: exec.stdout,
            exit_code: exec.exit_code,
            wall_time_ms: exec.wall_time_ms,
            ttft_ms: exec.ttft_ms,
            error,
            chunks: exec.chunks,
            ..Self::default()
        }
    }
}

/// Uniform capability over one AI provider.
pub trait Adapter {
    /// Stable provider identifier (e.g. `"ollama"`).
    fn name(&self) -> &str;

    /// Human-readable name for display.
    fn display_name(&self) -> String {
        let mut chars = self.name().chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    }

    /// Lightweight, never-billed check of whether the provider is usable.
    fn detect(&self) -> DetectionResult;

    /// Best-effort model enumeration; empty when the provider has none.
    fn list_models(&self) -> Vec<String>;

    /// Run a prompt through the provider.
    ///
    /// Subprocess-backed implementations must pass the prompt exclusively
    /// over stdin; argv carries static flags plus the model identifier only.
    fn run(&self, prompt: &str, options: &mut RunOptions<'_>) -> RunResult;

    /// Static capability descriptor. Pure; no I/O.
    fn capabilities(&self) -> Capabilities;

    fn is_available(&self) -> bool {
        self.detect().detected
    }

    fn auth_status(&self) -> AuthStatus {
        self.detect().auth_status.unwrap_or(AuthStatus::Unknown)
    }
}

/// Run a `--version` probe against a resolved binary.
///
/// Returns the trimmed stdout on exit 0, `None` otherwise.
pub(crate) fn version_probe(runner: &dyn ProcessRunner, binary: &Path) -> Option<String> {
    let args = vec![binary.display().to_string(), "--version".to_string()];
    let result = runner.run(&args, None, None, PROBE_TIMEOUT, None);
    if result.exit_code != 0 {
        return None;
    }
    let version = result.stdout.trim().to_string();
    (!version.is_empty()).then_some(version)
}
