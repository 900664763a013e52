//! llama.cpp adapter.
//!
//! Resolves any of the conventional binary names and maps model identifiers
//! onto `.gguf` files found under the usual model directories.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::adapters::{
    Adapter, AuthStatus, Capabilities, DetectionResult, RunOptions, RunResult, version_probe,
};
use crate::io::discovery::Discovery;
use crate::io::executor::{ProcessRunner, SubprocessExecutor};

/// Binary names tried in order.
const BINARY_NAMES: &[&str] = &["llama-cli", "llama-server", "main"];

/// Default generation length passed to the CLI.
const MAX_GENERATED_TOKENS: &str = "512";

pub struct LlamaCppAdapter {
    binary: Option<PathBuf>,
    discovery: Discovery,
    runner: Box<dyn ProcessRunner>,
    models_dir: Option<PathBuf>,
}

impl LlamaCppAdapter {
    pub fn new(discovery: Discovery) -> Self {
        Self {
            binary: None,
            discovery,
            runner: Box::new(SubprocessExecutor::new()),
            models_dir: None,
        }
    }

    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    #[must_use]
    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = Some(dir.into());
        self
    }

    #[cfg(any(test, feature = "test-support"))]
    #[must_use]
    pub fn with_runner(mut self, runner: Box<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    fn resolve(&self) -> Option<PathBuf> {
        if let Some(binary) = &self.binary {
            return Some(binary.clone());
        }
        BINARY_NAMES
            .iter()
            .find_map(|name| self.discovery.find_binary(name))
    }

    fn models_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.models_dir {
            return dir.exists().then(|| dir.clone());
        }
        let home = PathBuf::from(env::var_os("HOME")?);
        [
            home.join(".cache/llama.cpp/models"),
            home.join(".local/share/llama.cpp/models"),
            home.join("models"),
        ]
        .into_iter()
        .find(|dir| dir.exists())
    }

    fn find_model(&self, model: &str) -> Option<PathBuf> {
        let dir = self.models_dir()?;
        let exact = dir.join(format!("{model}.gguf"));
        if exact.exists() {
            return Some(exact);
        }
        collect_gguf(&dir)
            .into_iter()
            .find(|path| path_stem(path).contains(model))
    }
}

impl Adapter for LlamaCppAdapter {
    fn name(&self) -> &str {
        "llamacpp"
    }

    fn display_name(&self) -> String {
        "llama.cpp".to_string()
    }

    fn detect(&self) -> DetectionResult {
        let Some(binary) = self.resolve() else {
            return DetectionResult::not_found("llama.cpp binary not found in PATH");
        };
        let version = version_probe(self.runner.as_ref(), &binary);
        DetectionResult {
            detected: true,
            trusted: self.discovery.is_trusted(&binary),
            binary_path: Some(binary),
            version,
            // Local inference, nothing to authenticate.
            auth_status: Some(AuthStatus::Authenticated),
            error: None,
        }
    }

    fn list_models(&self) -> Vec<String> {
        let Some(dir) = self.models_dir() else {
            return Vec::new();
        };
        collect_gguf(&dir)
            .iter()
            .map(|path| path_stem(path))
            .collect()
    }

    fn run(&self, prompt: &str, options: &mut RunOptions<'_>) -> RunResult {
        let Some(binary) = self.resolve() else {
            return RunResult::binary_missing("llama.cpp");
        };
        let Some(model_path) = self.find_model(&options.model) else {
            return RunResult::failure(1, format!("Model not found: {}", options.model));
        };
        let args = vec![
            binary.display().to_string(),
            "-m".to_string(),
            model_path.display().to_string(),
            "-p".to_string(),
            "-".to_string(),
            // Keeps the echoed prompt out of captured stdout.
            "--no-display-prompt".to_string(),
            "-n".to_string(),
            MAX_GENERATED_TOKENS.to_string(),
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
            ..Capabilities::new(self.name())
        }
    }
}

/// Recursively collect `.gguf` files, sorted for stable listings.
fn collect_gguf(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let Ok(entries) = fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().and_then(|ext| ext.to_str()) == Some("gguf") {
                found.push(path);
            }
        }
    }
    found.sort();
    found
}

fn path_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string()
}
