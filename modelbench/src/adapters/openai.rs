//! OpenAI Chat Completions API adapter.

use std::env;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tracing::debug;

use crate::adapters::{
    Adapter, AuthStatus, Capabilities, DetectionResult, PROBE_TIMEOUT, RunOptions, RunResult,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Static fallback when the models endpoint is unreachable.
const OPENAI_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4-turbo",
    "gpt-4",
    "gpt-3.5-turbo",
];

pub struct OpenAiAdapter {
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiAdapter {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("OPENAI_API_KEY").ok(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn client(timeout: Duration) -> Result<reqwest::blocking::Client, String> {
        reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| format!("HTTP client error: {err}"))
    }

    fn static_models() -> Vec<String> {
        OPENAI_MODELS.iter().map(|m| (*m).to_string()).collect()
    }
}

impl Adapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    fn display_name(&self) -> String {
        "OpenAI".to_string()
    }

    fn detect(&self) -> DetectionResult {
        // Format-only; no billed or networked call during detection.
        let Some(key) = &self.api_key else {
            return DetectionResult::not_found(
                "OPENAI_API_KEY not set. Set it in your environment or pass api_key.",
            );
        };
        let plausible = key.starts_with("sk-");
        DetectionResult {
            detected: true,
            binary_path: None,
            version: None,
            auth_status: Some(if plausible {
                AuthStatus::Unknown
            } else {
                AuthStatus::Unauthenticated
            }),
            trusted: true,
            error: (!plausible)
                .then(|| "OPENAI_API_KEY does not look like an OpenAI key".to_string()),
        }
    }

    fn list_models(&self) -> Vec<String> {
        let Some(key) = &self.api_key else {
            return Self::static_models();
        };
        let Ok(client) = Self::client(PROBE_TIMEOUT) else {
            return Self::static_models();
        };
        let response = client
            .get(format!("{}/v1/models", self.base_url))
            .bearer_auth(key)
            .send();
        match response.and_then(|r| r.error_for_status()) {
            Ok(response) => response
                .json::<Value>()
                .ok()
                .and_then(|value| {
                    value.pointer("/data").and_then(Value::as_array).map(|models| {
                        models
                            .iter()
                            .filter_map(|model| model.get("id").and_then(Value::as_str))
                            .map(str::to_string)
                            .collect::<Vec<_>>()
                    })
                })
                .filter(|models: &Vec<String>| !models.is_empty())
                .unwrap_or_else(Self::static_models),
            Err(_) => Self::static_models(),
        }
    }

    fn run(&self, prompt: &str, options: &mut RunOptions<'_>) -> RunResult {
        let Some(key) = self.api_key.clone() else {
            return RunResult::failure(
                1,
                "OPENAI_API_KEY not set. Set it in your environment or pass api_key.",
            );
        };

        let mut messages = Vec::new();
        if let Some(system) = &options.system_prompt {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));
        let mut body = json!({
            "model": options.model,
            "messages": messages,
        });
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }

        let start = Instant::now();
        let send = || -> Result<Value, String> {
            let client = Self::client(options.timeout)?;
            let response = client
                .post(format!("{}/v1/chat/completions", self.base_url))
                .bearer_auth(&key)
                .json(&body)
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
        };

        match send() {
            Ok(raw) => {
                let output = raw
                    .pointer("/choices/0/message/content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let input_tokens = raw
                    .pointer("/usage/prompt_tokens")
                    .and_then(Value::as_u64);
                let output_tokens = raw
                    .pointer("/usage/completion_tokens")
                    .and_then(Value::as_u64);
                debug!(model = %options.model, "openai request complete");
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_not_detected() {
        let adapter = OpenAiAdapter::new(None, None);
        assert!(!adapter.detect().detected);
    }

    #[test]
    fn list_models_degrades_to_static_list_without_key() {
        let adapter = OpenAiAdapter::new(None, None);
        let models = adapter.list_models();
        assert!(models.contains(&"gpt-4o-mini".to_string()));
    }

    #[test]
    fn list_models_degrades_on_unreachable_endpoint() {
        let adapter = OpenAiAdapter::new(
            Some("sk-placeholder-not-a-key".to_string()),
            Some("http://127.0.0.1:1".to_string()),
        );
        let models = adapter.list_models();
        assert_eq!(models, OpenAiAdapter::static_models());
    }

    #[test]
    fn run_without_key_fails_fast() {
        let adapter = OpenAiAdapter::new(None, None);
        let result = adapter.run("hi", &mut RunOptions::new("gpt-4o-mini"));
        assert_eq!(result.exit_code, 1);
        assert!(result.error.expect("error").contains("OPENAI_API_KEY"));
    }

    #[test]
    fn transport_failure_becomes_failed_result() {
        let adapter = OpenAiAdapter::new(
            Some("sk-placeholder-not-a-key".to_string()),
            Some("http://127.0.0.1:1".to_string()),
        );
        let mut options =
            RunOptions::new("gpt-4o-mini").with_timeout(Duration::from_millis(500));
        let result = adapter.run("hi", &mut options);
        assert_eq!(result.exit_code, 1);
        assert!(result.error.expect("error").contains("API request failed"));
    }
}
