//! Test doubles shared by unit and integration tests.
//!
//! [`SpyRunner`] stands in for the subprocess executor so adapter tests can
//! assert on the exact argv/stdin/timeout an adapter constructed without
//! spawning anything. [`ScriptedAdapter`] returns canned results per model
//! for router, fallback, and orchestrator tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::adapters::{Adapter, AuthStatus, Capabilities, DetectionResult, RunOptions, RunResult};
use crate::io::executor::{ExecutionResult, ProcessRunner};

/// One captured call into a [`SpyRunner`].
#[derive(Debug, Clone)]
pub struct SpyCall {
    pub args: Vec<String>,
    pub stdin: Option<String>,
    pub timeout: Duration,
    pub streamed: bool,
}

/// Process runner that records calls and returns a canned result.
///
/// Clones share state, so keep one handle for assertions after moving the
/// other into an adapter.
#[derive(Clone)]
pub struct SpyRunner {
    state: Arc<Mutex<SpyState>>,
}

struct SpyState {
    result: ExecutionResult,
    calls: Vec<SpyCall>,
}

impl SpyRunner {
    pub fn ok(stdout: &str) -> Self {
        Self::with_result(ExecutionResult {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: 0,
            wall_time_ms: 1,
            timed_out: false,
            ttft_ms: None,
            chunks: Vec::new(),
        })
    }

    pub fn failing(exit_code: i32, stderr: &str) -> Self {
        Self::with_result(ExecutionResult {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code,
            wall_time_ms: 1,
            timed_out: false,
            ttft_ms: None,
            chunks: Vec::new(),
        })
    }

    pub fn with_result(result: ExecutionResult) -> Self {
        Self {
            state: Arc::new(Mutex::new(SpyState {
                result,
                calls: Vec::new(),
            })),
        }
    }

    pub fn calls(&self) -> Vec<SpyCall> {
        self.state.lock().expect("spy lock").calls.clone()
    }

    pub fn last_call(&self) -> Option<SpyCall> {
        self.state.lock().expect("spy lock").calls.last().cloned()
    }
}

impl ProcessRunner for SpyRunner {
    fn run(
        &self,
        args: &[String],
        stdin: Option<&str>,
        _cwd: Option<&Path>,
        timeout: Duration,
        on_chunk: Option<&mut dyn FnMut(&str)>,
    ) -> ExecutionResult {
        let mut state = self.state.lock().expect("spy lock");
        state.calls.push(SpyCall {
            args: args.to_vec(),
            stdin: stdin.map(str::to_string),
            timeout,
            streamed: on_chunk.is_some(),
        });
        state.result.clone()
    }
}

/// Adapter returning scripted results per model identifier.
pub struct ScriptedAdapter {
    name: String,
    capabilities: Capabilities,
    models: Vec<String>,
    detected: bool,
    results: BTreeMap<String, RunResult>,
    default_result: RunResult,
    run_calls: Mutex<Vec<String>>,
}

impl ScriptedAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            capabilities: Capabilities::new(name.as_str()),
            name,
            models: Vec::new(),
            detected: true,
            results: BTreeMap::new(),
            default_result: RunResult {
                output: "ok".to_string(),
                ..RunResult::default()
            },
            run_calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    /// Script the result returned for one model identifier.
    #[must_use]
    pub fn with_result(mut self, model: &str, result: RunResult) -> Self {
        self.results.insert(model.to_string(), result);
        self
    }

    #[must_use]
    pub fn with_default_result(mut self, result: RunResult) -> Self {
        self.default_result = result;
        self
    }

    #[must_use]
    pub fn undetected(mut self) -> Self {
        self.detected = false;
        self
    }

    /// Models attempted through `run`, in call order.
    pub fn models_run(&self) -> Vec<String> {
        self.run_calls.lock().expect("calls lock").clone()
    }
}

impl Adapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self) -> DetectionResult {
        if self.detected {
            DetectionResult {
                detected: true,
                binary_path: Some(PathBuf::from("/scripted")),
                version: Some("0.0.0".to_string()),
                auth_status: Some(AuthStatus::Authenticated),
                trusted: true,
                error: None,
            }
        } else {
            DetectionResult::not_found(format!("{} not installed", self.name))
        }
    }

    fn list_models(&self) -> Vec<String> {
        self.models.clone()
    }

    fn run(&self, _prompt: &str, options: &mut RunOptions<'_>) -> RunResult {
        self.run_calls
            .lock()
            .expect("calls lock")
            .push(options.model.clone());
        self.results
            .get(&options.model)
            .cloned()
            .unwrap_or_else(|| self.default_result.clone())
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }
}
