//! Tool configuration loaded from `~/.config/modelbench/config.toml`.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Root configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable.
/// Missing fields and a missing file both fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BenchConfig {
    pub general: GeneralConfig,
    pub discovery: DiscoveryConfig,
    pub routing: RoutingConfig,
    pub providers: BTreeMap<String, ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Store full prompt text in the database instead of hash + preview.
    pub store_prompts: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Directories searched after PATH when resolving provider binaries.
    pub extra_paths: Vec<String>,
    /// Prefixes whose binaries count as trusted.
    pub trusted_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoutingConfig {
    /// Provider names in preference order; unlisted providers sort last.
    pub preference_order: Vec<String>,
    pub constraints: ConstraintDefaults,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConstraintDefaults {
    pub offline_only: bool,
    pub streaming_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub enabled: bool,
    /// Explicit binary path, bypassing PATH resolution.
    pub binary: Option<String>,
    pub default_model: Option<String>,
    /// Models tried in order after the primary fails.
    pub fallback_models: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            store_prompts: false,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extra_paths: vec!["~/bin".to_string(), "~/.local/bin".to_string()],
            trusted_paths: vec![
                "/opt/homebrew/bin".to_string(),
                "/usr/local/bin".to_string(),
                "/usr/bin".to_string(),
                "~/.local/bin".to_string(),
            ],
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            preference_order: vec![
                "ollama".to_string(),
                "claude".to_string(),
                "codex".to_string(),
                "gemini".to_string(),
                "goose".to_string(),
                "opencode".to_string(),
            ],
            constraints: ConstraintDefaults::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            binary: None,
            default_model: None,
            fallback_models: Vec::new(),
        }
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            discovery: DiscoveryConfig::default(),
            routing: RoutingConfig::default(),
            providers: BTreeMap::new(),
        }
    }
}

impl BenchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.general.timeout_secs == 0 {
            return Err(anyhow!("general.timeout_secs must be > 0"));
        }
        for name in &self.routing.preference_order {
            if name.trim().is_empty() {
                return Err(anyhow!("routing.preference_order entries must be non-empty"));
            }
        }
        for (name, provider) in &self.providers {
            if let Some(binary) = &provider.binary
                && binary.trim().is_empty()
            {
                return Err(anyhow!("providers.{name}.binary must be non-empty when set"));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.general.timeout_secs)
    }

    pub fn provider_enabled(&self, name: &str) -> bool {
        self.providers.get(name).is_none_or(|p| p.enabled)
    }

    pub fn provider_binary(&self, name: &str) -> Option<PathBuf> {
        self.providers
            .get(name)
            .and_then(|p| p.binary.as_deref())
            .map(PathBuf::from)
    }

    /// Configured per-provider default models.
    pub fn default_models(&self) -> BTreeMap<String, String> {
        self.providers
            .iter()
            .filter_map(|(name, p)| {
                p.default_model
                    .clone()
                    .map(|model| (name.clone(), model))
            })
            .collect()
    }

    pub fn fallback_models(&self, name: &str) -> Vec<String> {
        self.providers
            .get(name)
            .map(|p| p.fallback_models.clone())
            .unwrap_or_default()
    }
}

/// Default config file location.
pub fn default_config_path() -> PathBuf {
    home_dir().join(".config/modelbench/config.toml")
}

/// Default database location.
pub fn default_db_path() -> PathBuf {
    home_dir().join(".local/share/modelbench/modelbench.db")
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map(PathBuf::from).unwrap_or_default()
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `BenchConfig::default()`.
pub fn load_config(path: &Path) -> Result<BenchConfig> {
    if !path.exists() {
        let config = BenchConfig::default();
        config.validate()?;
        return Ok(config);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let config: BenchConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
