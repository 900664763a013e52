//! Name-keyed adapter collection.
//!
//! Constructed explicitly at startup and passed by reference; there is no
//! process-wide default instance. The reference usage pattern is
//! single-threaded, so no interior locking — callers exposing a registry to
//! concurrent threads must synchronize `register` themselves.

use std::collections::BTreeMap;

use tracing::debug;

use crate::adapters::anthropic::AnthropicAdapter;
use crate::adapters::claude::ClaudeAdapter;
use crate::adapters::codex::CodexAdapter;
use crate::adapters::fake::FakeAdapter;
use crate::adapters::gemini::GeminiAdapter;
use crate::adapters::goose::GooseAdapter;
use crate::adapters::llamacpp::LlamaCppAdapter;
use crate::adapters::ollama::OllamaAdapter;
use crate::adapters::opencode::OpenCodeAdapter;
use crate::adapters::openai::OpenAiAdapter;
use crate::adapters::vllm::VllmAdapter;
use crate::adapters::{Adapter, DetectionResult};
use crate::io::config::BenchConfig;
use crate::io::discovery::Discovery;

#[derive(Default)]
pub struct Registry {
    adapters: BTreeMap<String, Box<dyn Adapter>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in adapter, honoring per-provider config
    /// (enabled flags and binary overrides).
    pub fn with_builtin_adapters(config: &BenchConfig) -> Self {
        let mut registry = Self::new();
        let discovery = Discovery::from_config(&config.discovery);

        registry.register(Box::new(FakeAdapter::new()));

        if config.provider_enabled("ollama") {
            let mut adapter = OllamaAdapter::new(discovery.clone());
            if let Some(binary) = config.provider_binary("ollama") {
                adapter = adapter.with_binary(binary);
            }
            registry.register(Box::new(adapter));
        }
        if config.provider_enabled("claude") {
            let mut adapter = ClaudeAdapter::new(discovery.clone());
            if let Some(binary) = config.provider_binary("claude") {
                adapter = adapter.with_binary(binary);
            }
            registry.register(Box::new(adapter));
        }
        if config.provider_enabled("codex") {
            let mut adapter = CodexAdapter::new(discovery.clone());
            if let Some(binary) = config.provider_binary("codex") {
                adapter = adapter.with_binary(binary);
            }
            registry.register(Box::new(adapter));
        }
        if config.provider_enabled("gemini") {
            let mut adapter = GeminiAdapter::new(discovery.clone());
            if let Some(binary) = config.provider_binary("gemini") {
                adapter = adapter.with_binary(binary);
            }
            registry.register(Box::new(adapter));
        }
        if config.provider_enabled("goose") {
            let mut adapter = GooseAdapter::new(discovery.clone());
            if let Some(binary) = config.provider_binary("goose") {
                adapter = adapter.with_binary(binary);
            }
            registry.register(Box::new(adapter));
        }
        if config.provider_enabled("opencode") {
            let mut adapter = OpenCodeAdapter::new(discovery.clone());
            if let Some(binary) = config.provider_binary("opencode") {
                adapter = adapter.with_binary(binary);
            }
            registry.register(Box::new(adapter));
        }
        if config.provider_enabled("llamacpp") {
            let mut adapter = LlamaCppAdapter::new(discovery.clone());
            if let Some(binary) = config.provider_binary("llamacpp") {
                adapter = adapter.with_binary(binary);
            }
            registry.register(Box::new(adapter));
        }
        if config.provider_enabled("vllm") {
            let mut adapter = VllmAdapter::new(discovery.clone());
            if let Some(binary) = config.provider_binary("vllm") {
                adapter = adapter.with_binary(binary);
            }
            registry.register(Box::new(adapter));
        }

        // API adapters read their keys from the environment.
        if config.provider_enabled("anthropic") {
            registry.register(Box::new(AnthropicAdapter::from_env()));
        }
        if config.provider_enabled("openai") {
            registry.register(Box::new(OpenAiAdapter::from_env()));
        }

        debug!(adapters = registry.len(), "registry built");
        registry
    }

    /// Register an adapter, replacing any existing one with the same name.
    pub fn register(&mut self, adapter: Box<dyn Adapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Adapter> {
        self.adapters.get(name).map(|adapter| adapter.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Adapter> {
        self.adapters.values().map(|adapter| adapter.as_ref())
    }

    /// Detection results for every registered adapter, in name order.
    ///
    /// Detection is sequential; a provider that fails to detect reports
    /// `detected = false` without affecting the others.
    pub fn detect_all(&self) -> Vec<(String, DetectionResult)> {
        self.adapters
            .iter()
            .map(|(name, adapter)| (name.clone(), adapter.detect()))
            .collect()
    }

    /// Adapters currently reporting themselves available.
    pub fn available(&self) -> Vec<&dyn Adapter> {
        self.iter().filter(|adapter| adapter.is_available()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedAdapter;

    #[test]
    fn register_overwrites_on_name_collision() {
        let mut registry = Registry::new();
        registry.register(Box::new(
            ScriptedAdapter::new("dup").with_models(vec!["first".to_string()]),
        ));
        registry.register(Box::new(
            ScriptedAdapter::new("dup").with_models(vec!["second".to_string()]),
        ));

        assert_eq!(registry.len(), 1);
        let adapter = registry.get("dup").expect("registered");
        assert_eq!(adapter.list_models(), vec!["second"]);
    }

    #[test]
    fn available_filters_undetected_adapters() {
        let mut registry = Registry::new();
        registry.register(Box::new(ScriptedAdapter::new("up")));
        registry.register(Box::new(ScriptedAdapter::new("down").undetected()));

        let available = registry.available();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].name(), "up");

        let detections = registry.detect_all();
        assert_eq!(detections.len(), 2);
        let down = detections
            .iter()
            .find(|(name, _)| name == "down")
            .expect("down listed");
        assert!(!down.1.detected);
    }

    #[test]
    fn builtin_registry_respects_enabled_flags() {
        let mut config = BenchConfig::default();
        config
            .providers
            .insert("claude".to_string(), crate::io::config::ProviderConfig {
                enabled: false,
                ..Default::default()
            });
        let registry = Registry::with_builtin_adapters(&config);

        assert!(registry.get("claude").is_none());
        assert!(registry.get("ollama").is_some());
        // The fake adapter is always registered and always available.
        assert!(registry.get("fake").expect("fake").is_available());
    }

    #[test]
    fn get_unknown_name_returns_none() {
        let registry = Registry::new();
        assert!(registry.get("nope").is_none());
    }
}
