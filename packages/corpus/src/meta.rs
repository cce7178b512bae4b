//! Olympus-Corpus: Meta-Invariant Gate (MSI-001/002/003)
//!
//! Candidate rules synthesized by the saturation engine must pass all
//! three meta-invariants before they may join the candidate corpus:
//!
//! - **MSI-001 No proxy satisfaction**: the candidate must detect
//!   something no live rule already covers.
//! - **MSI-002 Non-recursive explanation**: the explanation must not
//!   cite the candidate itself or restate only its own trigger words.
//! - **MSI-003 Metric independence**: severity must follow the
//!   cluster's risk pressure, and patterns must not encode campaign
//!   bookkeeping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::registry::RuleCorpus;
use crate::rule::{RuleDef, Severity};

/// A rule proposed by the saturation pipeline, before admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRule {
    /// Proposed rule definition (kind must be CAPABILITY)
    pub def: RuleDef,
    /// Human-readable explanation of what the rule detects
    pub explanation: String,
    /// Signature of the cluster that produced it
    pub source_cluster: String,
    /// The stable invariant-word set the saturation loop converged on
    pub invariant_words: BTreeSet<String>,
    /// Risk pressure of the source cluster in [0, 1]
    pub risk_pressure: f64,
}

/// Outcome of one meta-invariant check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsiVerdict {
    /// Meta-invariant id ("MSI-001" .. "MSI-003")
    pub id: String,
    pub passed: bool,
    /// Populated on failure
    pub detail: Option<String>,
}

/// Aggregate report over all three meta-invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsiReport {
    pub rule_id: String,
    pub verdicts: Vec<MsiVerdict>,
}

impl MsiReport {
    pub fn passed(&self) -> bool {
        self.verdicts.iter().all(|v| v.passed)
    }

    pub fn failed_ids(&self) -> Vec<String> {
        self.verdicts
            .iter()
            .filter(|v| !v.passed)
            .map(|v| v.id.clone())
            .collect()
    }
}

/// Map a cluster's risk pressure to the only severity a candidate may
/// carry. MSI-003 rejects any other assignment.
pub fn severity_for_pressure(risk_pressure: f64) -> Severity {
    if risk_pressure >= 0.75 {
        Severity::High
    } else if risk_pressure >= 0.5 {
        Severity::Med
    } else {
        Severity::Low
    }
}

/// Campaign bookkeeping tokens that must never appear as trigger words.
static BOOKKEEPING_TOKENS: &[&str] = &["iteration", "mutation", "round", "sample"];

/// The meta-invariant gate.
#[derive(Debug, Default, Clone, Copy)]
pub struct MsiGate;

impl MsiGate {
    pub fn new() -> Self {
        Self
    }

    /// Run all three meta-invariants against a candidate.
    pub fn check(&self, corpus: &RuleCorpus, candidate: &CandidateRule) -> MsiReport {
        let verdicts = vec![
            self.check_no_proxy(corpus, candidate),
            self.check_non_recursive(candidate),
            self.check_metric_independence(candidate),
        ];
        MsiReport {
            rule_id: candidate.def.id.clone(),
            verdicts,
        }
    }

    /// MSI-001: fail when every invariant word is already vocabulary of
    /// a single live rule, which would only proxy that rule.
    fn check_no_proxy(&self, corpus: &RuleCorpus, candidate: &CandidateRule) -> MsiVerdict {
        if candidate.invariant_words.is_empty() {
            return MsiVerdict {
                id: "MSI-001".to_string(),
                passed: false,
                detail: Some("empty invariant-word set".to_string()),
            };
        }

        for rule in corpus.rules() {
            let vocab = pattern_vocabulary(rule.def());
            if candidate
                .invariant_words
                .iter()
                .all(|w| vocab.contains(w.as_str()))
            {
                return MsiVerdict {
                    id: "MSI-001".to_string(),
                    passed: false,
                    detail: Some(format!("proxy of existing rule {}", rule.id())),
                };
            }
        }

        MsiVerdict {
            id: "MSI-001".to_string(),
            passed: true,
            detail: None,
        }
    }

    /// MSI-002: the explanation must not cite the candidate's own id
    /// and must say more than the trigger words themselves.
    fn check_non_recursive(&self, candidate: &CandidateRule) -> MsiVerdict {
        let explanation = candidate.explanation.to_lowercase();

        if explanation.contains(&candidate.def.id.to_lowercase()) {
            return MsiVerdict {
                id: "MSI-002".to_string(),
                passed: false,
                detail: Some("explanation references its own rule id".to_string()),
            };
        }

        let novel = explanation
            .split_whitespace()
            .any(|w| w.len() >= 4 && !candidate.invariant_words.contains(w));
        if !novel {
            return MsiVerdict {
                id: "MSI-002".to_string(),
                passed: false,
                detail: Some("explanation restates only the trigger words".to_string()),
            };
        }

        MsiVerdict {
            id: "MSI-002".to_string(),
            passed: true,
            detail: None,
        }
    }

    /// MSI-003: severity must be the pressure-derived one and trigger
    /// words must be free of campaign bookkeeping.
    fn check_metric_independence(&self, candidate: &CandidateRule) -> MsiVerdict {
        let expected = severity_for_pressure(candidate.risk_pressure);
        if candidate.def.severity != expected {
            return MsiVerdict {
                id: "MSI-003".to_string(),
                passed: false,
                detail: Some(format!(
                    "severity {:?} does not follow risk pressure {:.2} (expected {:?})",
                    candidate.def.severity, candidate.risk_pressure, expected
                )),
            };
        }

        for word in &candidate.invariant_words {
            if word.chars().all(|c| c.is_ascii_digit())
                || BOOKKEEPING_TOKENS.contains(&word.as_str())
            {
                return MsiVerdict {
                    id: "MSI-003".to_string(),
                    passed: false,
                    detail: Some(format!("bookkeeping token {word:?} in trigger words")),
                };
            }
        }

        MsiVerdict {
            id: "MSI-003".to_string(),
            passed: true,
            detail: None,
        }
    }
}

fn pattern_vocabulary(def: &RuleDef) -> BTreeSet<&str> {
    def.inclusion
        .iter()
        .chain(def.exclusion.iter())
        .flat_map(|p| p.split(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.len() >= 4)
        .collect()
}
