//! Goose agent CLI adapter.

use std::path::PathBuf;

use crate::adapters::{
    Adapter, AuthStatus, Capabilities, DetectionResult, RunOptions, RunResult, version_probe,
};
use crate::io::discovery::Discovery;
use crate::io::executor::{ProcessRunner, SubprocessExecutor};

pub struct GooseAdapter {
    binary: Option<PathBuf>,
    discovery: Discovery,
    runner: Box<dyn ProcessRunner>,
}

impl GooseAdapter {
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
            .or_else(|| self.discovery.find_binary("goose"))
    }
}

impl Adapter for GooseAdapter {
    fn name(&self) -> &str {
        "goose"
    }

    fn detect(&self) -> DetectionResult {
        let Some(binary) = self.resolve() else {
            return DetectionResult::not_found("goose binary not found in PATH");
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
        // Goose works with recipes rather than direct model selection.
        Vec::new()
    }

    fn run(&self, prompt: &str, options: &mut RunOptions<'_>) -> RunResult {
        let Some(binary) = self.resolve() else {
            return RunResult::binary_missing("goose");
        };
        let args = vec![
            binary.display().to_string(),
            "run".to_string(),
            "-".to_string(),
        ];
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
    fn run_reads_prompt_from_stdin() {
        let spy = SpyRunner::ok("done");
        let adapter = GooseAdapter::new(Discovery::new())
            .with_binary("/usr/local/bin/goose")
            .with_runner(Box::new(spy.clone()));

        adapter.run("task text", &mut RunOptions::new("default"));

        let call = spy.last_call().expect("call");
        assert_eq!(call.args[1..], ["run", "-"]);
        assert_eq!(call.stdin.as_deref(), Some("task text"));
    }
}
