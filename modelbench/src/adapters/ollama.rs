//! Ollama adapter for local model inference.

use std::path::{Path, PathBuf};

use crate::adapters::{
    Adapter, AuthStatus, Capabilities, DetectionResult, PROBE_TIMEOUT, RunOptions, RunResult,
};
use crate::io::discovery::Discovery;
use crate::io::executor::{ExecutionResult, ProcessRunner, SubprocessExecutor};

pub struct OllamaAdapter {
    binary: Option<PathBuf>,
    discovery: Discovery,
    runner: Box<dyn ProcessRunner>,
}

impl OllamaAdapter {
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
            .or_else(|| self.discovery.find_binary("ollama"))
    }

    fn command(&self, binary: &Path, args: &[&str]) -> ExecutionResult {
        let mut argv = vec![binary.display().to_string()];
        argv.extend(args.iter().map(|arg| (*arg).to_string()));
        self.runner.run(&argv, None, None, PROBE_TIMEOUT, None)
    }
}

impl Adapter for OllamaAdapter {
    fn name(&self) -> &str {
        "ollama"
    }

    fn detect(&self) -> DetectionResult {
        let Some(binary) = self.resolve() else {
            return DetectionResult::not_found("ollama binary not found in PATH");
        };

        let version = {
            let probe = self.command(&binary, &["--version"]);
            // Output looks like "ollama version 0.1.0".
            (probe.exit_code == 0).then(|| {
                let output = probe.stdout.trim();
                output
                    .rsplit_once(' ')
                    .map_or(output, |(_, version)| version)
                    .to_string()
            })
        };

        // Ollama has no auth; a working `list` means the server is up.
        let list = self.command(&binary, &["list"]);
        let auth_status = if list.exit_code == 0 {
            AuthStatus::Authenticated
        } else {
            AuthStatus::Unknown
        };

        DetectionResult {
            detected: true,
            trusted: self.discovery.is_trusted(&binary),
            binary_path: Some(binary),
            version,
            auth_status: Some(auth_status),
            error: None,
        }
    }

    fn list_models(&self) -> Vec<String> {
        let Some(binary) = self.resolve() else {
            return Vec::new();
        };
        let result = self.command(&binary, &["list"]);
        if result.exit_code != 0 {
            return Vec::new();
        }
        // First column of each row after the header is the model name.
        result
            .stdout
            .lines()
            .skip(1)
            .filter_map(|line| line.split_whitespace().next())
            .map(str::to_string)
            .collect()
    }

    fn run(&self, prompt: &str, options: &mut RunOptions<'_>) -> RunResult {
        let Some(binary) = self.resolve() else {
            return RunResult::binary_missing("ollama");
        };
        let args = vec![
            binary.display().to_string(),
            "run".to_string(),
            options.model.clone(),
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
            offline: true,
            cost_per_1k_input: Some(0.0),
            cost_per_1k_output: Some(0.0),
            ..Capabilities::new(self.name())
        }
    }
}
