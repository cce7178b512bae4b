//! Olympus-Shadow: Cluster Saturation Engine
//!
//! Mutates a cluster's members until its invariant-word set stops
//! moving, then synthesizes a candidate capability rule from the
//! stable vocabulary. Convergence is checked every ten iterations
//! against a Jaccard stability floor; the loop always terminates at
//! the hard ceiling.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use olympus_corpus::anchors::{jaccard, tokens};
use olympus_corpus::meta::{severity_for_pressure, CandidateRule};
use olympus_corpus::rule::{RuleDef, RuleKind};
use olympus_ledger::digest_str;

use crate::cluster::Cluster;
use crate::mutation::{MutationKit, MutatorKind};

/// Saturation loop constants. Corpus constants, frozen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SaturationConfig {
    /// Jaccard stability floor between consecutive checkpoints
    pub stability_threshold: f64,
    /// Iterations required before convergence may be declared
    pub min_iterations: u32,
    /// Hard ceiling
    pub max_iterations: u32,
    /// Checkpoint interval
    pub check_interval: u32,
}

impl Default for SaturationConfig {
    fn default() -> Self {
        Self {
            stability_threshold: 0.85,
            min_iterations: 30,
            max_iterations: 200,
            check_interval: 10,
        }
    }
}

/// Outcome of saturating one cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaturationOutcome {
    pub cluster_id: String,
    pub iterations: u32,
    pub converged: bool,
    /// The stable invariant-word set
    pub invariant_words: BTreeSet<String>,
    /// Candidate rule, when the stable set is non-empty
    pub candidate: Option<CandidateRule>,
}

/// The saturation engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SaturationEngine {
    config: SaturationConfig,
    kit: MutationKit,
}

impl SaturationEngine {
    pub fn new(config: SaturationConfig) -> Self {
        Self {
            config,
            kit: MutationKit::new(),
        }
    }

    /// Run the saturation loop on one cluster.
    ///
    /// Each iteration mutates one member (mutator and member both
    /// rotate with the iteration index) and folds the mutant's tokens
    /// into the observed vocabulary. The invariant-word set is the
    /// intersection of every observed variant's tokens.
    pub fn saturate(&self, cluster: &Cluster) -> SaturationOutcome {
        if cluster.member_texts.is_empty() {
            return SaturationOutcome {
                cluster_id: cluster.id.clone(),
                iterations: 0,
                converged: false,
                invariant_words: BTreeSet::new(),
                candidate: None,
            };
        }

        let mut invariant: Option<BTreeSet<String>> = None;
        for text in &cluster.member_texts {
            let t = tokens(text);
            invariant = Some(match invariant {
                None => t,
                Some(prev) => prev.intersection(&t).cloned().collect(),
            });
        }
        let mut invariant = invariant.unwrap_or_default();

        let mut previous_checkpoint = invariant.clone();
        let mut iterations = 0u32;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            let member = &cluster.member_texts[iterations as usize % cluster.member_texts.len()];
            let mutator = MutatorKind::ALL[iterations as usize % MutatorKind::ALL.len()];
            let mutation = self.kit.apply(mutator, member, None, iterations as usize);

            let mutant_tokens = tokens(&mutation.output);
            invariant = invariant.intersection(&mutant_tokens).cloned().collect();
            iterations += 1;

            if iterations % self.config.check_interval == 0 {
                let stability = jaccard(&invariant, &previous_checkpoint);
                debug!(
                    cluster = %cluster.id,
                    iterations, stability, "saturation checkpoint"
                );
                if stability >= self.config.stability_threshold
                    && iterations >= self.config.min_iterations
                {
                    converged = true;
                    break;
                }
                previous_checkpoint = invariant.clone();
            }
        }

        let candidate = self.synthesize(cluster, &invariant);
        info!(
            cluster = %cluster.id,
            iterations,
            converged,
            words = invariant.len(),
            candidate = candidate.is_some(),
            "saturation complete"
        );

        SaturationOutcome {
            cluster_id: cluster.id.clone(),
            iterations,
            converged,
            invariant_words: invariant,
            candidate,
        }
    }

    /// Synthesize a candidate capability rule from the stable set.
    fn synthesize(&self, cluster: &Cluster, invariant: &BTreeSet<String>) -> Option<CandidateRule> {
        if invariant.is_empty() {
            return None;
        }
        let words: Vec<&str> = invariant.iter().map(String::as_str).collect();
        let pattern = words.join(".*");
        let signature_key = cluster.signature.join("-");
        let id = format!("CAP-C{}", &digest_str(&signature_key)[..6]);
        let severity = severity_for_pressure(cluster.risk_pressure);

        Some(CandidateRule {
            def: RuleDef {
                id,
                kind: RuleKind::Capability,
                name: format!("saturated:{signature_key}"),
                severity,
                inclusion: vec![pattern],
                exclusion: vec![],
                frozen: false,
            },
            explanation: format!(
                "stable vocabulary shared by every variant of cluster {}",
                cluster.id
            ),
            source_cluster: cluster.id.clone(),
            invariant_words: invariant.clone(),
            risk_pressure: cluster.risk_pressure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterBasis;

    fn cluster_of(texts: &[&str], risk: f64) -> Cluster {
        Cluster {
            id: "sim:0".to_string(),
            basis: ClusterBasis::Similarity,
            member_ids: (0..texts.len()).map(|i| format!("s-{i}")).collect(),
            member_texts: texts.iter().map(|t| t.to_string()).collect(),
            signature: vec!["preferences".to_string(), "settings".to_string()],
            risk_pressure: risk,
        }
    }

    #[test]
    fn test_saturation_terminates() {
        let cluster = cluster_of(
            &[
                "marinate the user preferences in settings sauce",
                "marinate the admin preferences in settings sauce",
            ],
            0.5,
        );
        let outcome = SaturationEngine::new(SaturationConfig::default()).saturate(&cluster);
        assert!(outcome.iterations <= 200);
        assert!(outcome.iterations >= 30 || !outcome.converged);
    }

    #[test]
    fn test_saturation_is_deterministic() {
        let cluster = cluster_of(
            &[
                "marinate the user preferences in settings sauce",
                "marinate the admin preferences in settings sauce",
            ],
            0.5,
        );
        let engine = SaturationEngine::new(SaturationConfig::default());
        let a = engine.saturate(&cluster);
        let b = engine.saturate(&cluster);
        assert_eq!(a.iterations, b.iterations);
        assert_eq!(a.invariant_words, b.invariant_words);
    }

    #[test]
    fn test_candidate_carries_cluster_pressure() {
        let cluster = cluster_of(
            &[
                "marinate the preferences in settings sauce",
                "marinate the preferences in settings sauce today",
            ],
            0.5,
        );
        let outcome = SaturationEngine::new(SaturationConfig::default()).saturate(&cluster);
        if let Some(candidate) = outcome.candidate {
            assert_eq!(candidate.risk_pressure, 0.5);
            assert!(candidate.def.id.starts_with("CAP-C"));
            assert!(!candidate.def.frozen);
        }
    }

    #[test]
    fn test_empty_cluster_yields_no_candidate() {
        let cluster = cluster_of(&[], 0.5);
        let outcome = SaturationEngine::new(SaturationConfig::default()).saturate(&cluster);
        assert!(outcome.candidate.is_none());
        assert_eq!(outcome.iterations, 0);
    }
}
