//! Fake provider for contract testing and development.
//!
//! Always detected, no external dependencies. Model names select behavior:
//! `fake-fast` returns immediately, `fake-slow` adds latency, `fake-error`
//! always fails, `fake-stream` emits word-by-word chunks.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use crate::adapters::{
    Adapter, AuthStatus, Capabilities, DetectionResult, RunOptions, RunResult,
};

const SLOW_MODEL_DELAY: Duration = Duration::from_millis(150);
const CHUNK_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Default)]
pub struct FakeAdapter;

impl FakeAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Adapter for FakeAdapter {
    fn name(&self) -> &str {
        "fake"
    }

    fn display_name(&self) -> String {
        "Fake (Testing)".to_string()
    }

    fn detect(&self) -> DetectionResult {
        DetectionResult {
            detected: true,
            binary_path: Some(PathBuf::from("fake")),
            version: Some("1.0.0".to_string()),
            auth_status: Some(AuthStatus::Authenticated),
            trusted: true,
            error: None,
        }
    }

    fn list_models(&self) -> Vec<String> {
        vec![
            "fake-fast".to_string(),
            "fake-slow".to_string(),
            "fake-error".to_string(),
            "fake-stream".to_string(),
        ]
    }

    fn run(&self, prompt: &str, options: &mut RunOptions<'_>) -> RunResult {
        let start = Instant::now();

        if options.model == "fake-error" {
            return RunResult {
                exit_code: 1,
                wall_time_ms: elapsed_ms(start),
                error: Some("Simulated error from fake-error model".to_string()),
                ..RunResult::default()
            };
        }

        if options.model == "fake-slow" {
            thread::sleep(SLOW_MODEL_DELAY);
        }

        let truncated: String = prompt.chars().take(50).collect();
        let ellipsis = if prompt.chars().count() > 50 { "..." } else { "" };
        let output = format!("Fake response to: {truncated}{ellipsis}");

        let mut chunks = Vec::new();
        let mut ttft_ms = None;
        if let Some(callback) = options.chunk_sink() {
            let words: Vec<&str> = output.split_whitespace().collect();
            let count = words.len();
            for (index, word) in words.into_iter().enumerate() {
                let chunk = if index + 1 < count {
                    format!("{word} ")
                } else {
                    format!("{word}\n")
                };
                callback(&chunk);
                chunks.push(chunk);
                if ttft_ms.is_none() {
                    ttft_ms = Some(elapsed_ms(start));
                }
                thread::sleep(CHUNK_DELAY);
            }
        }

        // Whitespace word counts as a rough token estimate.
        let input_tokens = prompt.split_whitespace().count() as u64;
        let output_tokens = output.split_whitespace().count() as u64;

        RunResult {
            output,
            exit_code: 0,
            wall_time_ms: elapsed_ms(start),
            ttft_ms,
            input_tokens: Some(input_tokens),
            output_tokens: Some(output_tokens),
            tokens_estimated: true,
            chunks,
            ..RunResult::default()
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming: true,
            max_tokens: Some(4_096),
            max_context: Some(8_192),
            offline: true,
            cost_per_1k_input: Some(0.0),
            cost_per_1k_output: Some(0.0),
            ..Capabilities::new(self.name())
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_model_succeeds_with_estimated_tokens() {
        let adapter = FakeAdapter::new();
        let result = adapter.run("hello world", &mut RunOptions::new("fake-fast"));
        assert!(result.succeeded());
        assert!(result.output.contains("hello world"));
        assert!(result.tokens_estimated);
        assert_eq!(result.input_tokens, Some(2));
    }

    #[test]
    fn error_model_always_fails() {
        let adapter = FakeAdapter::new();
        let result = adapter.run("x", &mut RunOptions::new("fake-error"));
        assert_eq!(result.exit_code, 1);
        assert!(result.error.expect("error").contains("Simulated error"));
    }

    #[test]
    fn stream_model_delivers_ordered_chunks() {
        let adapter = FakeAdapter::new();
        let mut seen = Vec::new();
        let mut callback = |chunk: &str| seen.push(chunk.to_string());
        let mut options = RunOptions::new("fake-stream").streaming(&mut callback);
        let result = adapter.run("stream please", &mut options);

        assert!(result.succeeded());
        assert_eq!(seen, result.chunks);
        assert!(result.ttft_ms.is_some());
        assert_eq!(seen.join(""), format!("{}\n", result.output.trim_end()));
    }

    #[test]
    fn long_prompts_are_truncated_in_output() {
        let adapter = FakeAdapter::new();
        let prompt = "word ".repeat(40);
        let result = adapter.run(&prompt, &mut RunOptions::new("fake-fast"));
        assert!(result.output.ends_with("..."));
    }
}
