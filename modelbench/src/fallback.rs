//! Ordered model fallback for a single adapter.
//!
//! Given a primary model and deduplicated fallbacks, attempts run in order
//! and stop at the first success. Adapters report operational failures as
//! result values, so there is no exception path here: a non-zero exit is
//! the only failure signal.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::adapters::{Adapter, RunOptions, RunResult};

/// One failed attempt in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackAttempt {
    pub model: String,
    pub failure: String,
}

/// Terminal outcome of a fallback chain.
#[derive(Debug)]
pub struct FallbackOutcome {
    /// Model that produced `result` (the last one attempted).
    pub model: String,
    pub result: RunResult,
    /// True when the terminal result came from a non-primary candidate.
    /// Surfaced as a metric: a high rate means the primary model path is
    /// not reliable enough.
    pub fallback_used: bool,
    /// Failed attempts in order; empty when the primary succeeded outright.
    pub attempts: Vec<FallbackAttempt>,
}

#[derive(Debug, Clone)]
pub struct FallbackRunner {
    timeout: Duration,
}

impl FallbackRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Attempt `primary` then each fallback in order, stopping at the first
    /// exit-0 result. Earlier failures are discarded on success; on
    /// exhaustion the last result is returned with the full attempt history
    /// appended to its error.
    #[instrument(skip_all, fields(adapter = adapter.name(), primary = %primary))]
    pub fn run(
        &self,
        adapter: &dyn Adapter,
        prompt: &str,
        primary: &str,
        fallbacks: &[String],
    ) -> FallbackOutcome {
        let candidates = candidate_models(primary, fallbacks);
        let mut attempts: Vec<FallbackAttempt> = Vec::new();
        let mut last: Option<(String, RunResult)> = None;

        for (index, model) in candidates.iter().enumerate() {
            let mut options = RunOptions::new(model.clone()).with_timeout(self.timeout);
            let result = adapter.run(prompt, &mut options);
            if result.succeeded() {
                if index > 0 {
                    debug!(model = %model, attempt = index + 1, "fallback model succeeded");
                }
                return FallbackOutcome {
                    model: model.clone(),
                    result,
                    fallback_used: index > 0,
                    attempts,
                };
            }
            let failure = result
                .error
                .clone()
                .unwrap_or_else(|| format!("exit code {}", result.exit_code));
            warn!(model = %model, failure = %failure, "model attempt failed");
            attempts.push(FallbackAttempt {
                model: model.clone(),
                failure,
            });
            last = Some((model.clone(), result));
        }

        let Some((model, mut result)) = last else {
            // Candidates always include the primary, so this cannot happen
            // with a non-empty model name; report it rather than panic.
            return FallbackOutcome {
                model: primary.to_string(),
                result: RunResult::failure(1, "no candidate models attempted"),
                fallback_used: false,
                attempts,
            };
        };

        let history = attempts
            .iter()
            .map(|attempt| format!("{}: {}", attempt.model, attempt.failure))
            .collect::<Vec<_>>()
            .join("; ");
        let base = result
            .error
            .clone()
            .unwrap_or_else(|| format!("exit code {}", result.exit_code));
        result.error = Some(format!("{base} | attempts: {history}"));
        warn!(attempts = attempts.len(), "all candidate models failed");

        FallbackOutcome {
            fallback_used: candidates.len() > 1,
            model,
            result,
            attempts,
        }
    }
}

/// Primary first, then fallbacks with duplicates removed, order preserved.
fn candidate_models(primary: &str, fallbacks: &[String]) -> Vec<String> {
    let mut candidates = vec![primary.to_string()];
    for model in fallbacks {
        if !candidates.iter().any(|existing| existing == model) {
            candidates.push(model.clone());
        }
    }
    candidates
}
