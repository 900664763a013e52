//! Gemini CLI adapter.

use std::path::PathBuf;

use crate::adapters::{
    Adapter, AuthStatus, Capabilities, DetectionResult, RunOptions, RunResult, version_probe,
};
use crate::io::discovery::Discovery;
use crate::io::executor::{ProcessRunner, SubprocessExecutor};

pub struct GeminiAdapter {
    binary: Option<PathBuf>,
    discovery: Discovery,
    runner: Box<dyn ProcessRunner>,
}

impl GeminiAdapter {
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
            .or_else(|| self.discovery.find_binary("gemini"))
    }
}

impl Adapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    fn detect(&self) -> DetectionResult {
        let Some(binary) = self.resolve() else {
            return DetectionResult::not_found("gemini binary not found in PATH");
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
            "gemini-2.5-pro".to_string(),
            "gemini-2.5-flash".to_string(),
        ]
    }

    fn run(&self, prompt: &str, options: &mut RunOptions<'_>) -> RunResult {
        let Some(binary) = self.resolve() else {
            return RunResult::binary_missing("gemini");
        };
        // Piped stdin is the prompt; only the model goes into argv.
        let mut args = vec![binary.display().to_string()];
        if !options.model.is_empty() {
            args.push("-m".to_string());
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
            max_context: Some(1_000_000),
            ..Capabilities::new(self.name())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SpyRunner;

    #[test]
    fn run_keeps_prompt_off_argv() {
        let spy = SpyRunner::ok("answer");
        let adapter = GeminiAdapter::new(Discovery::new())
            .with_binary("/usr/bin/gemini")
            .with_runner(Box::new(spy.clone()));

        adapter.run("classified", &mut RunOptions::new("gemini-2.5-pro"));

        let call = spy.last_call().expect("call");
        assert_eq!(call.args[1], "-m");
        assert_eq!(call.args[2], "gemini-2.5-pro");
        assert!(call.args.iter().all(|arg| !arg.contains("classified")));
        assert_eq!(call.stdin.as_deref(), Some("classified"));
    }
}
