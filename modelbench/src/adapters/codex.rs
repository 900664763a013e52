//! Codex CLI adapter.

use std::path::PathBuf;

use crate::adapters::{
    Adapter, AuthStatus, Capabilities, DetectionResult, RunOptions, RunResult, version_probe,
};
use crate::io::discovery::Discovery;
use crate::io::executor::{ProcessRunner, SubprocessExecutor};

pub struct CodexAdapter {
    binary: Option<PathBuf>,
    discovery: Discovery,
    runner: Box<dyn ProcessRunner>,
}

impl CodexAdapter {
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
            .or_else(|| self.discovery.find_binary("codex"))
    }
}

impl Adapter for CodexAdapter {
    fn name(&self) -> &str {
        "codex"
    }

    fn display_name(&self) -> String {
        "Codex CLI".to_string()
    }

    fn detect(&self) -> DetectionResult {
        let Some(binary) = self.resolve() else {
            return DetectionResult::not_found("codex binary not found in PATH");
        };
        let version = version_probe(self.runner.as_ref(), &binary);
        DetectionResult {
            detected: true,
            trusted: self.discovery.is_trusted(&binary),
            binary_path: Some(binary),
            version,
            auth_status: Some(AuthStatus::Unknown),
            error: None,
        }
    }

    fn list_models(&self) -> Vec<String> {
        vec![
            "o4-mini".to_string(),
            "o3".to_string(),
            "gpt-4.1".to_string(),
        ]
    }

    fn run(&self, prompt: &str, options: &mut RunOptions<'_>) -> RunResult {
        let Some(binary) = self.resolve() else {
            return RunResult::binary_missing("codex");
        };
        // `exec -` reads the prompt from stdin.
        let mut args = vec![
            binary.display().to_string(),
            "exec".to_string(),
            "-".to_string(),
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
            max_tokens: Some(16_384),
            max_context: Some(128_000),
            ..Capabilities::new(self.name())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SpyRunner;

    #[test]
    fn run_sends_prompt_over_stdin_not_argv() {
        let spy = SpyRunner::ok("done");
        let adapter = CodexAdapter::new(Discovery::new())
            .with_binary("/usr/bin/codex")
            .with_runner(Box::new(spy.clone()));

        adapter.run("secret prompt", &mut RunOptions::new("o4-mini"));

        let call = spy.last_call().expect("call");
        assert_eq!(call.args[1], "exec");
        assert_eq!(call.args[2], "-");
        assert!(call.args.iter().all(|arg| !arg.contains("secret prompt")));
        assert_eq!(call.stdin.as_deref(), Some("secret prompt"));
    }
}
