//! vLLM CLI adapter.

use std::path::PathBuf;

use crate::adapters::{
    Adapter, AuthStatus, Capabilities, DetectionResult, RunOptions, RunResult, version_probe,
};
use crate::io::discovery::Discovery;
use crate::io::executor::{ProcessRunner, SubprocessExecutor};

pub struct VllmAdapter {
    binary: Option<PathBuf>,
    discovery: Discovery,
    runner: Box<dyn ProcessRunner>,
}

impl VllmAdapter {
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
            .or_else(|| self.discovery.find_binary("vllm"))
    }
}

impl Adapter for VllmAdapter {
    fn name(&self) -> &str {
        "vllm"
    }

    fn display_name(&self) -> String {
        "vLLM".to_string()
    }

    fn detect(&self) -> DetectionResult {
        let Some(binary) = self.resolve() else {
            return DetectionResult::not_found("vllm binary not found in PATH");
        };
        let version = version_probe(self.runner.as_ref(), &binary);
        DetectionResult {
            detected: true,
            trusted: self.discovery.is_trusted(&binary),
            binary_path: Some(binary),
            version,
            auth_status: Some(AuthStatus::Authenticated),
            error: None,
        }
    }

    fn list_models(&self) -> Vec<String> {
        // vLLM takes HuggingFace model ids; no local enumeration.
        vec![
            "meta-llama/Llama-2-7b-chat-hf".to_string(),
            "mistralai/Mistral-7B-v0.1".to_string(),
        ]
    }

    fn run(&self, prompt: &str, options: &mut RunOptions<'_>) -> RunResult {
        let Some(binary) = self.resolve() else {
            return RunResult::binary_missing("vllm");
        };
        let mut args = vec![
            binary.display().to_string(),
            "complete".to_string(),
            "--quick".to_string(),
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
            offline: true,
            ..Capabilities::new(self.name())
        }
    }
}
