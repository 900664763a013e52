//! OpenCode agent CLI adapter.

use std::path::PathBuf;

use crate::adapters::{
    Adapter, AuthStatus, Capabilities, DetectionResult, RunOptions, RunResult, version_probe,
};
use crate::io::discovery::Discovery;
use crate::io::executor::{ProcessRunner, SubprocessExecutor};

pub struct OpenCodeAdapter {
    binary: Option<PathBuf>,
    discovery: Discovery,
    runner: Box<dyn ProcessRunner>,
}

impl OpenCodeAdapter {
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
            .or_else(|| self.discovery.find_binary("opencode"))
    }
}

impl Adapter for OpenCodeAdapter {
    fn name(&self) -> &str {
        "opencode"
    }

    fn display_name(&self) -> String {
        "OpenCode".to_string()
    }

    fn detect(&self) -> DetectionResult {
        let Some(binary) = self.resolve() else {
            return DetectionResult::not_found("opencode binary not found in PATH");
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
        Vec::new()
    }

    fn run(&self, prompt: &str, options: &mut RunOptions<'_>) -> RunResult {
        let Some(binary) = self.resolve() else {
            return RunResult::binary_missing("opencode");
        };
        let mut args = vec![binary.display().to_string(), "run".to_string()];
        if !options.model.is_empty() && options.model != "default" {
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
            ..Capabilities::new(self.name())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SpyRunner;

    #[test]
    fn default_placeholder_model_is_not_forwarded() {
        let spy = SpyRunner::ok("done");
        let adapter = OpenCodeAdapter::new(Discovery::new())
            .with_binary("/usr/bin/opencode")
            .with_runner(Box::new(spy.clone()));

        adapter.run("prompt", &mut RunOptions::new("default"));

        let call = spy.last_call().expect("call");
        assert_eq!(call.args[1..], ["run"]);
        assert_eq!(call.stdin.as_deref(), Some("prompt"));
    }

    #[test]
    fn explicit_model_goes_into_argv() {
        let spy = SpyRunner::ok("done");
        let adapter = OpenCodeAdapter::new(Discovery::new())
            .with_binary("/usr/bin/opencode")
            .with_runner(Box::new(spy.clone()));

        adapter.run("prompt", &mut RunOptions::new("anthropic/claude-sonnet"));

        let call = spy.last_call().expect("call");
        assert!(call.args.contains(&"--model".to_string()));
        assert!(call.args.contains(&"anthropic/claude-sonnet".to_string()));
    }
}
