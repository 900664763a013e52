//! Benchmark suite files.
//!
//! Suites are TOML documents: a `name` plus `[[prompts]]` entries, each
//! with an `id`, non-empty `text`, and optional per-provider model
//! overrides and fallback lists.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

/// A parsed benchmark suite.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Suite {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prompts: Vec<SuitePrompt>,
}

/// One prompt within a suite.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SuitePrompt {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Per-provider model override (provider name → model).
    #[serde(default)]
    pub model_overrides: BTreeMap<String, String>,
    /// Per-provider fallback models, a single name or a list.
    #[serde(default)]
    pub fallback_models: BTreeMap<String, FallbackModels>,
}

/// One model or an ordered list; both TOML shapes are accepted.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FallbackModels {
    One(String),
    Many(Vec<String>),
}

impl FallbackModels {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            FallbackModels::One(model) => vec![model.clone()],
            FallbackModels::Many(models) => models.clone(),
        }
    }
}

impl Suite {
    /// Load and validate a suite file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read suite {}", path.display()))?;
        let suite: Suite =
            toml::from_str(&contents).with_context(|| format!("parse suite {}", path.display()))?;
        suite
            .validate()
            .with_context(|| format!("validate suite {}", path.display()))?;
        Ok(suite)
    }

    #[cfg(test)]
    pub fn parse_str(contents: &str) -> Result<Self> {
        let suite: Suite = toml::from_str(contents).context("parse suite")?;
        suite.validate()?;
        Ok(suite)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("suite name must be non-empty");
        }
        if self.prompts.is_empty() {
            bail!("prompts must be a non-empty array");
        }
        for (index, prompt) in self.prompts.iter().enumerate() {
            if prompt.id.trim().is_empty() {
                bail!("prompts[{index}].id must be non-empty");
            }
            if prompt.text.trim().is_empty() {
                bail!("prompts[{index}].text must be non-empty");
            }
        }
        let mut ids: Vec<&str> = self.prompts.iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        for pair in ids.windows(2) {
            if pair[0] == pair[1] {
                return Err(anyhow!("duplicate prompt id {}", pair[0]));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_suite() {
        let input = r#"
name = "smoke"
description = "quick sanity prompts"

[[prompts]]
id = "greeting"
text = "Say hello."

[[prompts]]
id = "haiku"
text = "Write a haiku about pipes."
tags = ["creative"]

[prompts.model_overrides]
ollama = "llama3.2"

[prompts.fallback_models]
ollama = ["qwen2.5", "mistral"]
claude = "claude-3-haiku"
"#;
        let suite = Suite::parse_str(input).expect("suite parses");
        assert_eq!(suite.name, "smoke");
        assert_eq!(suite.prompts.len(), 2);
        let haiku = &suite.prompts[1];
        assert_eq!(
            haiku.model_overrides.get("ollama").map(String::as_str),
            Some("llama3.2")
        );
        assert_eq!(
            haiku.fallback_models.get("ollama").map(FallbackModels::to_vec),
            Some(vec!["qwen2.5".to_string(), "mistral".to_string()])
        );
        assert_eq!(
            haiku.fallback_models.get("claude").map(FallbackModels::to_vec),
            Some(vec!["claude-3-haiku".to_string()])
        );
    }

    #[test]
    fn rejects_empty_prompt_text() {
        let input = r#"
name = "bad"

[[prompts]]
id = "p1"
text = "   "
"#;
        let err = Suite::parse_str(input).expect_err("invalid text");
        assert!(err.to_string().contains("text"));
    }

    #[test]
    fn rejects_duplicate_prompt_ids() {
        let input = r#"
name = "bad"

[[prompts]]
id = "p1"
text = "one"

[[prompts]]
id = "p1"
text = "two"
"#;
        let err = Suite::parse_str(input).expect_err("duplicate ids");
        assert!(err.to_string().contains("duplicate prompt id"));
    }

    #[test]
    fn rejects_empty_suite() {
        let err = Suite::parse_str("name = \"empty\"\n").expect_err("no prompts");
        assert!(err.to_string().contains("prompts"));
    }
}
