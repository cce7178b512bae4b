//! Olympus-Governance: External Reality Anchors (ERA + RGL)
//!
//! Samples external probes under a per-anchor policy, scores trust
//! from timeouts, variance and inconsistency, and feeds trust-adjusted
//! external scores back into the outcome axis. Probe execution is the
//! only async surface in the crate: a bounded batch of independent
//! samples with a per-sample timeout and no shared mutable state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use olympus_ledger::digest;

use crate::causal::{GapKind, IntentCausalChain, IntentGap};
use crate::policy::{AnchorMode, AnchorPolicy, PolicyRegistry};

/// One probe sample result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleResult {
    pub ok: bool,
    /// Canonical payload; variance is measured over its hash
    pub payload: serde_json::Value,
}

/// A reality probe. Implementations must not share mutable state
/// between samples.
#[async_trait]
pub trait RealityProbe: Send + Sync {
    async fn sample(&self, index: u32) -> SampleResult;
}

/// Fixed trust penalty table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustPenalty {
    Timeout,
    InsufficientSamples,
    NonDeterminism,
    HighVariance,
    MixedOutcomes,
}

impl TrustPenalty {
    /// Deduction applied per occurrence.
    pub fn deduction(self) -> f64 {
        match self {
            TrustPenalty::Timeout => 0.15,
            TrustPenalty::InsufficientSamples => 0.30,
            TrustPenalty::NonDeterminism => 0.25,
            TrustPenalty::HighVariance => 0.20,
            TrustPenalty::MixedOutcomes => 0.15,
        }
    }
}

/// Governance failures surfaced by a quorum run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GovernanceFailure {
    FlakyReality { anchor_id: String, variance: f64 },
    UntrustworthyReality { anchor_id: String, trust: f64 },
    InsufficientEvidence { anchor_id: String, executed: u32, required: u32 },
}

/// Aggregate of one anchor's samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuorumResult {
    pub anchor_id: String,
    pub mode: AnchorMode,
    pub policy_version: u64,
    pub executed: u32,
    pub successes: u32,
    pub timeouts: u32,
    pub success_rate: f64,
    /// 1 - (most common payload hash frequency / executed)
    pub payload_variance: f64,
    pub deterministic: bool,
    pub trust_score: f64,
    pub penalties: Vec<TrustPenalty>,
    /// success_rate ≥ τ_s ∧ trust ≥ τ_t ∧ executed ≥ N
    pub verdict: bool,
    pub failures: Vec<GovernanceFailure>,
}

/// The anchor engine over the policy registry.
pub struct RealityAnchorEngine<'r> {
    registry: &'r PolicyRegistry,
}

impl<'r> RealityAnchorEngine<'r> {
    pub fn new(registry: &'r PolicyRegistry) -> Self {
        Self { registry }
    }

    /// Execute an anchor's samples under its policy. Critical anchors
    /// are forced to quorum mode regardless of the registered policy.
    pub async fn probe_anchor(
        &self,
        anchor_id: &str,
        probe: &dyn RealityProbe,
        critical: bool,
    ) -> QuorumResult {
        let mut policy = self.registry.get(anchor_id);
        let policy_version = self.registry.version();
        if critical && policy.mode != AnchorMode::Quorum {
            policy.mode = AnchorMode::Quorum;
        }

        let required = policy.samples;
        let planned = match policy.mode {
            AnchorMode::Quorum => policy.samples,
            AnchorMode::Live | AnchorMode::Cached => 1,
        };

        let mut executed = 0u32;
        let mut successes = 0u32;
        let mut timeouts = 0u32;
        let mut payload_hashes: Vec<String> = Vec::new();

        for index in 0..planned {
            match tokio::time::timeout(
                Duration::from_millis(policy.timeout_ms),
                probe.sample(index),
            )
            .await
            {
                Ok(sample) => {
                    executed += 1;
                    if sample.ok {
                        successes += 1;
                    }
                    if let Ok(hash) = digest(&sample.payload) {
                        payload_hashes.push(hash);
                    }
                }
                Err(_) => {
                    // Timed-out slots are not retried.
                    timeouts += 1;
                }
            }
        }

        let success_rate = if executed > 0 {
            successes as f64 / executed as f64
        } else {
            0.0
        };

        let (payload_variance, deterministic) = variance_of(&payload_hashes);

        let mut penalties = Vec::new();
        for _ in 0..timeouts {
            penalties.push(TrustPenalty::Timeout);
        }
        let quorum_required = policy.mode == AnchorMode::Quorum;
        if quorum_required && executed < required {
            penalties.push(TrustPenalty::InsufficientSamples);
        }
        if !deterministic {
            penalties.push(TrustPenalty::NonDeterminism);
        }
        if payload_variance > policy.variance_threshold {
            penalties.push(TrustPenalty::HighVariance);
        }
        if successes > 0 && successes < executed {
            penalties.push(TrustPenalty::MixedOutcomes);
        }

        let trust_score = (1.0 - penalties.iter().map(|p| p.deduction()).sum::<f64>()).max(0.0);

        let needed = if quorum_required { required } else { 1 };
        let verdict = success_rate >= policy.success_threshold
            && trust_score >= policy.min_trust
            && executed >= needed;

        let mut failures = Vec::new();
        if payload_variance > 0.0 {
            failures.push(GovernanceFailure::FlakyReality {
                anchor_id: anchor_id.to_string(),
                variance: payload_variance,
            });
        }
        if trust_score < policy.min_trust {
            failures.push(GovernanceFailure::UntrustworthyReality {
                anchor_id: anchor_id.to_string(),
                trust: trust_score,
            });
        }
        if executed < needed {
            failures.push(GovernanceFailure::InsufficientEvidence {
                anchor_id: anchor_id.to_string(),
                executed,
                required: needed,
            });
        }

        if !failures.is_empty() {
            warn!(anchor = anchor_id, ?failures, "anchor quorum degraded");
        }
        debug!(
            anchor = anchor_id,
            executed, successes, trust_score, verdict, "anchor probed"
        );

        QuorumResult {
            anchor_id: anchor_id.to_string(),
            mode: policy.mode,
            policy_version,
            executed,
            successes,
            timeouts,
            success_rate,
            payload_variance,
            deterministic,
            trust_score,
            penalties,
            verdict,
            failures,
        }
    }
}

/// Apply a trust-adjusted external score to a chain's outcome axis.
///
/// `trust_eff = trust if trust ≥ min_trust else 0`;
/// `combined = min(internal, external × trust_eff)`. An anchor below
/// the trust floor appends a weak-assertion gap and bars satisfaction.
pub fn apply_external(
    chain: &mut IntentCausalChain,
    quorum: &QuorumResult,
    external_score: f64,
    min_trust: f64,
) {
    let trust = quorum.trust_score;
    let trust_eff = if trust >= min_trust { trust } else { 0.0 };
    let external_adj = external_score * trust_eff;

    let outcome = &mut chain.axes.outcome;
    outcome.external = Some(external_score);
    outcome.trust_score = Some(trust);
    outcome.trust_adjusted_external = Some(external_adj);
    outcome.combined = outcome.internal.min(external_adj);

    if trust < min_trust {
        chain.gaps.push(IntentGap {
            kind: GapKind::WeakAssertion,
            detail: format!(
                "anchor {} trust {:.2} below the {:.2} floor",
                quorum.anchor_id, trust, min_trust
            ),
        });
    }
    chain.rescore();
}

fn variance_of(hashes: &[String]) -> (f64, bool) {
    if hashes.is_empty() {
        return (0.0, true);
    }
    let mut counts: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
    for h in hashes {
        *counts.entry(h.as_str()).or_insert(0) += 1;
    }
    let max_freq = counts.values().copied().max().unwrap_or(0);
    let variance = 1.0 - max_freq as f64 / hashes.len() as f64;
    (variance, counts.len() <= 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::AnchorPolicy;
    use serde_json::json;

    struct SteadyProbe;

    #[async_trait]
    impl RealityProbe for SteadyProbe {
        async fn sample(&self, _index: u32) -> SampleResult {
            SampleResult {
                ok: true,
                payload: json!({"status": "ok"}),
            }
        }
    }

    struct FlakyProbe;

    #[async_trait]
    impl RealityProbe for FlakyProbe {
        async fn sample(&self, index: u32) -> SampleResult {
            SampleResult {
                ok: index % 2 == 0,
                payload: json!({"status": "ok", "jitter": index}),
            }
        }
    }

    struct SlowProbe;

    #[async_trait]
    impl RealityProbe for SlowProbe {
        async fn sample(&self, _index: u32) -> SampleResult {
            tokio::time::sleep(Duration::from_millis(50)).await;
            SampleResult {
                ok: true,
                payload: json!({"status": "ok"}),
            }
        }
    }

    fn quorum_registry() -> PolicyRegistry {
        let registry = PolicyRegistry::new();
        let mut policy = AnchorPolicy::default();
        policy.mode = AnchorMode::Quorum;
        registry.set("anchor-a", policy).unwrap();
        registry
    }

    #[tokio::test]
    async fn test_steady_quorum_passes() {
        let registry = quorum_registry();
        let engine = RealityAnchorEngine::new(&registry);
        let result = engine.probe_anchor("anchor-a", &SteadyProbe, false).await;
        assert_eq!(result.executed, 5);
        assert_eq!(result.success_rate, 1.0);
        assert!(result.deterministic);
        assert_eq!(result.trust_score, 1.0);
        assert!(result.verdict);
        assert!(result.failures.is_empty());
    }

    #[tokio::test]
    async fn test_flaky_quorum_fails_with_typed_failures() {
        let registry = quorum_registry();
        let engine = RealityAnchorEngine::new(&registry);
        let result = engine.probe_anchor("anchor-a", &FlakyProbe, false).await;
        assert!(result.payload_variance > 0.0);
        assert!(!result.deterministic);
        assert!(!result.verdict);
        assert!(result
            .failures
            .iter()
            .any(|f| matches!(f, GovernanceFailure::FlakyReality { .. })));
        assert!(result
            .failures
            .iter()
            .any(|f| matches!(f, GovernanceFailure::UntrustworthyReality { .. })));
    }

    #[tokio::test]
    async fn test_timeouts_are_penalized_not_retried() {
        let registry = PolicyRegistry::new();
        let mut policy = AnchorPolicy::default();
        policy.mode = AnchorMode::Quorum;
        policy.samples = 3;
        policy.timeout_ms = 5;
        registry.set("anchor-slow", policy).unwrap();

        let engine = RealityAnchorEngine::new(&registry);
        let result = engine.probe_anchor("anchor-slow", &SlowProbe, false).await;
        assert_eq!(result.executed, 0);
        assert_eq!(result.timeouts, 3);
        assert!(!result.verdict);
        assert!(result
            .failures
            .iter()
            .any(|f| matches!(f, GovernanceFailure::InsufficientEvidence { .. })));
    }

    #[tokio::test]
    async fn test_critical_anchor_is_forced_to_quorum() {
        let registry = PolicyRegistry::new(); // default policy: live
        let engine = RealityAnchorEngine::new(&registry);
        let result = engine.probe_anchor("anchor-x", &SteadyProbe, true).await;
        assert_eq!(result.mode, AnchorMode::Quorum);
        assert_eq!(result.executed, 5);
    }

    #[test]
    fn test_apply_external_trust_floor() {
        use crate::causal::{AxisScores, ChainConfidence, OutcomeScore};
        use crate::intent::{IntentCategory, IntentPriority, IntentSource, IntentSpec};

        let mut chain = IntentCausalChain {
            intent: IntentSpec {
                id: "INT-001".to_string(),
                requirement: "req".to_string(),
                category: IntentCategory::Interaction,
                priority: IntentPriority::High,
                source: IntentSource::Scope,
                expected_trigger: None,
                expected_state: None,
                expected_outcome: None,
            },
            axes: AxisScores {
                trigger: 1.0,
                state: 1.0,
                effect: 1.0,
                outcome: OutcomeScore::internal_only(1.0),
            },
            raw_score: 1.0,
            weighted_score: 2.0,
            satisfied: true,
            confidence: ChainConfidence::High,
            gaps: vec![],
            bound_file: None,
            bound_handler: None,
            bound_state: None,
        };

        let quorum = QuorumResult {
            anchor_id: "anchor-a".to_string(),
            mode: AnchorMode::Quorum,
            policy_version: 1,
            executed: 5,
            successes: 3,
            timeouts: 0,
            success_rate: 0.6,
            payload_variance: 0.4,
            deterministic: false,
            trust_score: 0.4,
            penalties: vec![TrustPenalty::NonDeterminism, TrustPenalty::HighVariance],
            verdict: false,
            failures: vec![],
        };

        apply_external(&mut chain, &quorum, 0.9, 0.7);
        // Below the trust floor the external contribution zeroes out.
        assert_eq!(chain.axes.outcome.trust_adjusted_external, Some(0.0));
        assert_eq!(chain.axes.outcome.combined, 0.0);
        assert!(!chain.satisfied);
        assert!(chain.gaps.iter().any(|g| g.kind == GapKind::WeakAssertion));
    }

    #[test]
    fn test_apply_external_scales_by_trust() {
        use crate::causal::{AxisScores, ChainConfidence, OutcomeScore};
        use crate::intent::{IntentCategory, IntentPriority, IntentSource, IntentSpec};

        let mut chain = IntentCausalChain {
            intent: IntentSpec {
                id: "INT-002".to_string(),
                requirement: "req".to_string(),
                category: IntentCategory::Interaction,
                priority: IntentPriority::Medium,
                source: IntentSource::Scope,
                expected_trigger: None,
                expected_state: None,
                expected_outcome: None,
            },
            axes: AxisScores {
                trigger: 1.0,
                state: 1.0,
                effect: 1.0,
                outcome: OutcomeScore::internal_only(0.5),
            },
            raw_score: 0.875,
            weighted_score: 0.875,
            satisfied: false,
            confidence: ChainConfidence::Medium,
            gaps: vec![],
            bound_file: None,
            bound_handler: None,
            bound_state: None,
        };

        let quorum = QuorumResult {
            anchor_id: "anchor-a".to_string(),
            mode: AnchorMode::Quorum,
            policy_version: 1,
            executed: 5,
            successes: 5,
            timeouts: 0,
            success_rate: 1.0,
            payload_variance: 0.0,
            deterministic: true,
            trust_score: 1.0,
            penalties: vec![],
            verdict: true,
            failures: vec![],
        };

        apply_external(&mut chain, &quorum, 0.25, 0.7);
        // combined = min(internal 0.5, 0.25 × 1.0) = 0.25
        assert_eq!(chain.axes.outcome.combined, 0.25);
        assert_eq!(chain.raw_score, 0.8125);
    }
}
