//! Constraint-driven provider selection.
//!
//! Selection is deterministic given the adapters' reported capabilities and
//! model lists: filter out adapters violating an active constraint, order
//! the survivors by the configured preference list (stable, unlisted names
//! last), then resolve a model for the winner.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::adapters::{Adapter, Capabilities};

/// Model name used when a provider has no configured or listable models.
const PLACEHOLDER_MODEL: &str = "default";

/// Active selection constraints. All default to off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraints {
    /// Only providers with no network egress.
    pub offline_only: bool,
    pub streaming_required: bool,
    pub tool_calling_required: bool,
    /// Context-window floor in tokens. Providers with an unknown context
    /// size are not excluded by this.
    pub min_context: Option<u32>,
}

/// A routing decision: which provider, which model, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingResult {
    pub provider: String,
    pub model: String,
    pub reasons: Vec<String>,
    /// Up to three other providers that also satisfied the constraints.
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Router {
    preference_order: Vec<String>,
}

impl Router {
    pub fn new(preference_order: Vec<String>) -> Self {
        Self { preference_order }
    }

    /// Select a provider and model, or `None` when nothing satisfies the
    /// constraints. An empty result is a normal outcome, not an error.
    pub fn route(
        &self,
        adapters: &[&dyn Adapter],
        constraints: &Constraints,
        default_models: &BTreeMap<String, String>,
    ) -> Option<RoutingResult> {
        let mut candidates: Vec<&dyn Adapter> = adapters
            .iter()
            .copied()
            .filter(|adapter| satisfies(&adapter.capabilities(), constraints))
            .collect();
        if candidates.is_empty() {
            debug!("no adapter satisfies the active constraints");
            return None;
        }

        // Stable: unlisted providers keep their relative order after listed ones.
        candidates.sort_by_key(|adapter| self.preference_rank(adapter.name()));

        let selected = candidates[0];
        let alternatives = candidates[1..]
            .iter()
            .take(3)
            .map(|adapter| adapter.name().to_string())
            .collect();

        let model = default_models
            .get(selected.name())
            .cloned()
            .or_else(|| selected.list_models().into_iter().next())
            .unwrap_or_else(|| PLACEHOLDER_MODEL.to_string());

        let mut reasons = vec![format!("{} is available", selected.name())];
        if let Some(rank) = self
            .preference_order
            .iter()
            .position(|name| name == selected.name())
        {
            reasons.push(format!("ranked #{} in preference order", rank + 1));
        }

        debug!(provider = selected.name(), model = %model, "routed");
        Some(RoutingResult {
            provider: selected.name().to_string(),
            model,
            reasons,
            alternatives,
        })
    }

    fn preference_rank(&self, name: &str) -> usize {
        self.preference_order
            .iter()
            .position(|entry| entry == name)
            .unwrap_or(self.preference_order.len())
    }
}

fn satisfies(caps: &Capabilities, constraints: &Constraints) -> bool {
    if constraints.offline_only && !caps.offline {
        return false;
    }
    if constraints.streaming_required && !caps.streaming {
        return false;
    }
    if constraints.tool_calling_required && !caps.tool_calling {
        return false;
    }
    if let (Some(min), Some(max_context)) = (constraints.min_context, caps.max_context)
        && max_context < min
    {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedAdapter;

    fn offline_streaming_off(name: &str) -> ScriptedAdapter {
        ScriptedAdapter::new(name)
            .with_capabilities(Capabilities {
                offline: true,
                streaming: false,
                ..Capabilities::new(name)
            })
            .with_models(vec![format!("{name}-default")])
    }

    fn online_streaming(name: &str) -> ScriptedAdapter {
        ScriptedAdapter::new(name)
            .with_capabilities(Capabilities {
                offline: false,
                streaming: true,
                ..Capabilities::new(name)
            })
            .with_models(vec![format!("{name}-default")])
    }

    #[test]
    fn routes_only_available_adapter_with_first_listed_model() {
        let adapter = online_streaming("fake");
        let router = Router::new(Vec::new());
        let result = router
            .route(&[&adapter], &Constraints::default(), &BTreeMap::new())
            .expect("routed");
        assert_eq!(result.provider, "fake");
        assert_eq!(result.model, "fake-default");
        assert!(result.alternatives.is_empty());
    }

    #[test]
    fn empty_adapter_list_routes_to_none() {
        let router = Router::new(Vec::new());
        assert!(
            router
                .route(&[], &Constraints::default(), &BTreeMap::new())
                .is_none()
        );
    }

    #[test]
    fn constraints_partition_candidates() {
        let local = offline_streaming_off("local");
        let cloud = online_streaming("cloud");
        let adapters: Vec<&dyn Adapter> = vec![&local, &cloud];
        let router = Router::new(Vec::new());

        let offline = router
            .route(
                &adapters,
                &Constraints {
                    offline_only: true,
                    ..Constraints::default()
                },
                &BTreeMap::new(),
            )
            .expect("offline candidate");
        assert_eq!(offline.provider, "local");

        let streaming = router
            .route(
                &adapters,
                &Constraints {
                    streaming_required: true,
                    ..Constraints::default()
                },
                &BTreeMap::new(),
            )
            .expect("streaming candidate");
        assert_eq!(streaming.provider, "cloud");

        let both = router.route(
            &adapters,
            &Constraints {
                offline_only: true,
                streaming_required: true,
                ..Constraints::default()
            },
            &BTreeMap::new(),
        );
        assert!(both.is_none());
    }

    #[test]
    fn unknown_context_size_does_not_violate_floor() {
        let unknown = online_streaming("unknown-context");
        let small = ScriptedAdapter::new("small").with_capabilities(Capabilities {
            max_context: Some(4_096),
            ..Capabilities::new("small")
        });
        let adapters: Vec<&dyn Adapter> = vec![&small, &unknown];
        let router = Router::new(Vec::new());
        let result = router
            .route(
                &adapters,
                &Constraints {
                    min_context: Some(100_000),
                    ..Constraints::default()
                },
                &BTreeMap::new(),
            )
            .expect("routed");
        assert_eq!(result.provider, "unknown-context");
    }

    #[test]
    fn preference_order_wins_and_is_reported() {
        let first = online_streaming("alpha");
        let second = online_streaming("beta");
        let adapters: Vec<&dyn Adapter> = vec![&first, &second];
        let router = Router::new(vec!["beta".to_string(), "alpha".to_string()]);
        let result = router
            .route(&adapters, &Constraints::default(), &BTreeMap::new())
            .expect("routed");
        assert_eq!(result.provider, "beta");
        assert!(
            result
                .reasons
                .iter()
                .any(|reason| reason.contains("ranked #1"))
        );
        assert_eq!(result.alternatives, vec!["alpha"]);
    }

    #[test]
    fn unlisted_adapters_sort_after_listed_preserving_order() {
        let a = online_streaming("unlisted-a");
        let b = online_streaming("unlisted-b");
        let listed = online_streaming("listed");
        let adapters: Vec<&dyn Adapter> = vec![&a, &b, &listed];
        let router = Router::new(vec!["listed".to_string()]);
        let result = router
            .route(&adapters, &Constraints::default(), &BTreeMap::new())
            .expect("routed");
        assert_eq!(result.provider, "listed");
        assert_eq!(result.alternatives, vec!["unlisted-a", "unlisted-b"]);
    }

    #[test]
    fn configured_default_model_takes_precedence() {
        let adapter = online_streaming("fake");
        let router = Router::new(Vec::new());
        let defaults = BTreeMap::from([("fake".to_string(), "pinned-model".to_string())]);
        let result = router
            .route(&[&adapter], &Constraints::default(), &defaults)
            .expect("routed");
        assert_eq!(result.model, "pinned-model");
    }

    #[test]
    fn model_falls_back_to_placeholder() {
        let adapter = ScriptedAdapter::new("bare");
        let router = Router::new(Vec::new());
        let result = router
            .route(&[&adapter], &Constraints::default(), &BTreeMap::new())
            .expect("routed");
        assert_eq!(result.model, PLACEHOLDER_MODEL);
    }
}
