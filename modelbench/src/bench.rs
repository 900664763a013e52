//! Benchmark orchestration: suite prompts × providers, one job at a time.
//!
//! Each job goes through the fallback runner, and results land in storage
//! as the run progresses. Adapter failures are recorded, never raised;
//! only storage itself can error out of a run.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::adapters::Adapter;
use crate::adapters::registry::Registry;
use crate::fallback::FallbackRunner;
use crate::io::config::BenchConfig;
use crate::io::storage::{Storage, hash_prompt};
use crate::io::suite::{Suite, SuitePrompt};

/// Stored prompt preview length, in characters.
const PREVIEW_CHARS: usize = 100;

/// Outcome of one prompt × provider job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub prompt_id: String,
    pub provider: String,
    /// Model that produced the terminal result (a fallback when the
    /// primary failed over).
    pub model: String,
    pub success: bool,
    pub wall_time_ms: u64,
    pub ttft_ms: Option<u64>,
    pub output: String,
    pub error: Option<String>,
    pub fallback_used: bool,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// A completed benchmark run.
#[derive(Debug)]
pub struct BenchRun {
    pub run_id: String,
    pub suite_name: String,
    pub results: Vec<JobResult>,
}

pub struct Orchestrator<'a> {
    registry: &'a Registry,
    storage: &'a Storage,
    config: &'a BenchConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(registry: &'a Registry, storage: &'a Storage, config: &'a BenchConfig) -> Self {
        Self {
            registry,
            storage,
            config,
        }
    }

    /// Run every suite prompt against every selected provider.
    ///
    /// `providers = None` means all currently available adapters.
    /// `on_progress` fires after each job completes.
    #[instrument(skip_all, fields(suite = %suite.name))]
    pub fn run_suite<F: FnMut(&JobResult)>(
        &self,
        suite: &Suite,
        providers: Option<&[String]>,
        mut on_progress: F,
    ) -> Result<BenchRun> {
        let run = self
            .storage
            .create_run(Some(&suite.name))
            .context("create run")?;

        let adapters: Vec<&dyn Adapter> = match providers {
            Some(names) => names
                .iter()
                .filter_map(|name| self.registry.get(name))
                .filter(|adapter| adapter.is_available())
                .collect(),
            None => self.registry.available(),
        };
        info!(
            adapters = adapters.len(),
            prompts = suite.prompts.len(),
            run_id = %run.id,
            "benchmark run started"
        );

        let default_models = self.config.default_models();
        let fallback = FallbackRunner::new(self.config.timeout());
        let mut results = Vec::new();

        for prompt in &suite.prompts {
            for adapter in &adapters {
                let model = resolve_model(prompt, *adapter, &default_models);
                // Hash plus bounded preview unless full prompt storage is
                // opted into.
                let stored_text = if self.config.general.store_prompts {
                    prompt.text.clone()
                } else {
                    preview(&prompt.text)
                };
                let job = self
                    .storage
                    .create_job(
                        &run.id,
                        adapter.name(),
                        &model,
                        &hash_prompt(&prompt.text),
                        Some(&stored_text),
                    )
                    .context("create job")?;
                self.storage.start_job(&job.id).context("start job")?;
                debug!(job_id = %job.id, provider = adapter.name(), model = %model, "job started");

                let fallbacks = fallback_models(prompt, adapter.name(), self.config);
                let outcome = fallback.run(*adapter, &prompt.text, &model, &fallbacks);

                self.storage
                    .complete_job(
                        &job.id,
                        outcome.result.exit_code,
                        outcome.result.error.as_deref(),
                    )
                    .context("complete job")?;
                self.record_metrics(&job.id, &outcome)?;

                let result = JobResult {
                    prompt_id: prompt.id.clone(),
                    provider: adapter.name().to_string(),
                    model: outcome.model,
                    success: outcome.result.succeeded(),
                    wall_time_ms: outcome.result.wall_time_ms,
                    ttft_ms: outcome.result.ttft_ms,
                    output: outcome.result.output,
                    error: outcome.result.error,
                    fallback_used: outcome.fallback_used,
                    input_tokens: outcome.result.input_tokens,
                    output_tokens: outcome.result.output_tokens,
                };
                on_progress(&result);
                results.push(result);
            }
        }

        self.storage.complete_run(&run.id).context("complete run")?;
        info!(jobs = results.len(), "benchmark run complete");
        Ok(BenchRun {
            run_id: run.id,
            suite_name: suite.name.clone(),
            results,
        })
    }

    fn record_metrics(&self, job_id: &str, outcome: &crate::fallback::FallbackOutcome) -> Result<()> {
        let result = &outcome.result;
        self.storage
            .add_metric(job_id, "wall_time_ms", result.wall_time_ms as f64, Some("ms"), false)
            .context("record wall time")?;
        if let Some(ttft) = result.ttft_ms {
            self.storage
                .add_metric(job_id, "ttft_ms", ttft as f64, Some("ms"), false)
                .context("record ttft")?;
        }
        if let Some(tokens) = result.output_tokens {
            self.storage
                .add_metric(
                    job_id,
                    "output_tokens",
                    tokens as f64,
                    Some("tokens"),
                    result.tokens_estimated,
                )
                .context("record output tokens")?;
        }
        self.storage
            .add_metric(
                job_id,
                "fallback_used",
                f64::from(u8::from(outcome.fallback_used)),
                None,
                false,
            )
            .context("record fallback flag")?;
        Ok(())
    }
}

/// Suite per-prompt override > configured default > first listed > "default".
fn resolve_model(
    prompt: &SuitePrompt,
    adapter: &dyn Adapter,
    default_models: &BTreeMap<String, String>,
) -> String {
    prompt
        .model_overrides
        .get(adapter.name())
        .or_else(|| default_models.get(adapter.name()))
        .cloned()
        .or_else(|| adapter.list_models().into_iter().next())
        .unwrap_or_else(|| "default".to_string())
}

/// Suite-level fallbacks win; the config's per-provider list is the default.
fn fallback_models(prompt: &SuitePrompt, provider: &str, config: &BenchConfig) -> Vec<String> {
    prompt
        .fallback_models
        .get(provider)
        .map(|models| models.to_vec())
        .unwrap_or_else(|| config.fallback_models(provider))
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}
