//! Claude Code adapter.
//!
//! Wraps the `claude` CLI in non-interactive print mode.

use std::path::PathBuf;

use crate::adapters::{
    Adapter, AuthStatus, Capabilities, DetectionResult, RunOptions, RunResult, version_probe,
};
use crate::io::discovery::Discovery;
use crate::io::executor::{ProcessRunner, SubprocessExecutor};

pub struct ClaudeAdapter {
    binary: Option<PathBuf>,
    discovery: Discovery,
    runner: Box<dyn ProcessRunner>,
}

impl ClaudeAdapter {
    pub fn new(discovery: Discovery) -> Self {
        Self {
            binary: None,
            discovery,
            runner: Box::new(SubprocessExecutor::new()),
        }
    }

    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    #[cfg(any(test, feature = "test-support"))]
    #[must_use]
    pub fn with_runner(mut self, runner: Box<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    fn resolve(&self) -> Option<PathBuf> {
        self.binary
            .clone()
            .or_else(|| self.discovery.find_binary("claude"))
    }
}

impl Adapter for ClaudeAdapter {
    fn name(&self) -> &str {
        "claude"
    }

    fn display_name(&self) -> String {
        "Claude Code".to_string()
    }

    fn detect(&self) -> DetectionResult {
        let Some(binary) = self.resolve() else {
            return DetectionResult::not_found("claude binary not found in PATH");
        };
        let version = version_probe(self.runner.as_ref(), &binary);
        DetectionResult {
            detected: true,
            trusted: self.discovery.is_trusted(&binary),
            binary_path: Some(binary),
            version,
            // Knowing for sure would need a billed call.
            auth_status: Some(AuthStatus::Unknown),
            error: None,
        }
    }

    fn list_models(&self) -> Vec<String> {
        // No model-listing command; common aliases.
        vec![
            "claude-3-5-sonnet".to_string(),
            "claude-3-opus".to_string(),
            "claude-3-haiku".to_string(),
        ]
    }

    fn run(&self, prompt: &str, options: &mut RunOptions<'_>) -> RunResult {
        let Some(binary) = self.resolve() else {
            return RunResult::binary_missing("claude");
        };
        // Static flags plus the model; the prompt itself travels over stdin.
        let mut args = vec![
            binary.display().to_string(),
            "-p".to_string(),
            "-".to_string(),
            "--output-format".to_string(),
            "text".to_string(),
        ];
        if !options.model.is_empty() {
            args.push("--model".to_string());
            args.push(options.model.clone());
        }
        let timeout = options.timeout;
        let exec = self
            .runner
            .run_with_stdin_prompt(&args, prompt, None, timeout, options.chunk_sink());
        RunResult::from_execution(exec)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming: true,
            tool_calling: true,
            max_tokens: Some(8_192),
            max_context: Some(200_000),
            ..Capabilities::new(self.name())
        }
    }
}
