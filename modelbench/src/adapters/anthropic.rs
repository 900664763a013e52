//! Anthropic Messages API adapter.
//!
//! Bypasses the subprocess executor entirely: requests go through a
//! blocking HTTP client, and every transport or API failure is converted
//! into a failed [`RunResult`] rather than an error.

use std::env;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tracing::debug;

use crate::adapters::{
    Adapter, AuthStatus, Capabilities, DetectionResult, RunOptions, RunResult,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

const ANTHROPIC_MODELS: &[&str] = &[
    "claude-sonnet-4-20250514",
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];

pub struct AnthropicAdapter {
    api_key: Option<String>,
    base_url: String,
}

impl AnthropicAdapter {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("ANTHROPIC_API_KEY").ok(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn request(&self, key: &str, body: &Value, timeout: Duration) -> Result<Value, String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| format!("HTTP client error: {err}"))?;
        let response = client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .map_err(|err| format!("API request failed: {err}"))?;
        let status = response.status();
        let value: Value = response
            .json()
            .map_err(|err| format!("API response unreadable: {err}"))?;
        if !status.is_success() {
            let message = value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(format!("API error {status}: {message}"));
        }
        Ok(value)
    }
}

impl Adapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn detect(&self) -> DetectionResult {
        // Format-only check: detection must be free and fast, so no
        // network call happens here.
        let Some(key) = &self.api_key else {
            return DetectionResult::not_found(
                "ANTHROPIC_API_KEY not set. Set it in your environment or pass api_key.",
            );
        };
        if key.starts_with("sk-ant-") {
            DetectionResult {
                detected: true,
                binary_path: None,
                version: None,
                auth_status: Some(AuthStatus::Unknown),
                trusted: true,
                error: None,
            }
        } else {
            DetectionResult {
                detected: true,
                binary_path: None,
                version: None,
                auth_status: Some(AuthStatus::Unauthenticated),
                trusted: true,
                error: Some("ANTHROPIC_API_KEY does not look like an Anthropic key".to_string()),
            }
        }
    }

    fn list_models(&self) -> Vec<String> {
        ANTHROPIC_MODELS.iter().map(|m| (*m).to_string()).collect()
    }

    fn run(&self, prompt: &str, options: &mut RunOptions<'_>) -> RunResult {
        let Some(key) = self.api_key.clone() else {
            return RunResult::failure(
                1,
                "ANTHROPIC_API_KEY not set. Set it in your environment or pass api_key.",
            );
        };

        let mut body = json!({
            "model": options.model,
            "max_tokens": options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(system) = &options.system_prompt {
            body["system"] = json!(system);
        }
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }

        let start = Instant::now();
        match self.request(&key, &body, options.timeout) {
            Ok(raw) => {
                let output = raw
                    .pointer("/content")
                    .and_then(Value::as_array)
                    .map(|blocks| {
                        blocks
                            .iter()
                            .filter_map(|block| block.get("text").and_then(Value::as_str))
                            .collect::<String>()
                    })
                    .unwrap_or_default();
                let input_tokens = raw
                    .pointer("/usage/input_tokens")
                    .and_then(Value::as_u64);
                let output_tokens = raw
                    .pointer("/usage/output_tokens")
                    .and_then(Value::as_u64);
                debug!(model = %options.model, "anthropic request complete");
                RunResult {
                    output,
                    exit_code: 0,
                    wall_time_ms: start.elapsed().as_millis() as u64,
                    input_tokens,
                    output_tokens,
                    raw_response: Some(raw),
                    ..RunResult::default()
                }
            }
            Err(message) => RunResult {
                wall_time_ms: start.elapsed().as_millis() as u64,
                ..RunResult::failure(1, message)
            },
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming: true,
            tool_calling: true,
            ..Capabilities::new(self.name())
        }
    }
}
