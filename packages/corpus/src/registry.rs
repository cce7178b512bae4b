//! Olympus-Corpus: Rule Registry
//!
//! Versioned, frozen rule corpus. Loaded once at startup (built-in
//! table plus optional YAML overlay) and read-only for the lifetime of
//! every decision. A pattern compile failure aborts the whole load;
//! the corpus never partial-loads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::capability::builtin_capability_defs;
use crate::meta::{CandidateRule, MsiGate, MsiReport};
use crate::rule::{Rule, RuleDef, RuleEval, RuleHit, RuleKind, Severity};

/// Version of the built-in corpus. Thresholds and rule tables are part
/// of the external contract; any change bumps this.
pub const CORPUS_VERSION: &str = "1.0.0";

/// Errors raised while loading or extending the corpus.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("pattern {pattern_id} of rule {rule_id} failed to compile")]
    PatternCompile {
        rule_id: String,
        pattern_id: String,
        #[source]
        source: regex::Error,
    },

    #[error("duplicate rule id {0}")]
    DuplicateRule(String),

    #[error("rule {0} is frozen and cannot be superseded")]
    FrozenConflict(String),

    #[error("candidate {rule_id} failed meta-invariants: {failed:?}")]
    MetaInvariant {
        rule_id: String,
        failed: Vec<String>,
    },

    #[error("corpus file error")]
    Io(#[from] std::io::Error),

    #[error("corpus YAML error")]
    Yaml(#[from] serde_yaml::Error),
}

/// On-disk overlay shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusOverlay {
    /// Overlay version suffix appended to the corpus version
    pub version: String,
    /// Additional (non-frozen) rule definitions
    pub rules: Vec<RuleDef>,
}

/// The frozen rule corpus.
#[derive(Debug)]
pub struct RuleCorpus {
    version: String,
    /// Live rules, sorted by id
    rules: Vec<Rule>,
    /// Rule indices per kind, id order preserved
    by_kind: BTreeMap<RuleKind, Vec<usize>>,
    /// Candidate rules admitted through the meta-invariant gate.
    /// Candidates are tracked but do not participate in matching.
    candidates: Vec<Rule>,
}

impl RuleCorpus {
    /// Build the built-in corpus.
    pub fn builtin() -> Result<Self, CorpusError> {
        let mut defs = builtin_capability_defs();
        defs.extend(builtin_axiom_defs());
        defs.extend(builtin_composition_defs());
        defs.extend(builtin_auth_defs());
        defs.extend(builtin_power_invariant_defs());
        Self::from_defs(CORPUS_VERSION.to_string(), defs)
    }

    /// Build the built-in corpus plus a YAML overlay file.
    pub fn builtin_with_overlay(path: &Path) -> Result<Self, CorpusError> {
        let raw = std::fs::read_to_string(path)?;
        let overlay: CorpusOverlay = serde_yaml::from_str(&raw)?;
        let mut corpus = Self::builtin()?;
        info!(
            overlay = %overlay.version,
            rules = overlay.rules.len(),
            "applying corpus overlay"
        );
        for def in overlay.rules {
            corpus.push_rule(def)?;
        }
        corpus.version = format!("{}+{}", CORPUS_VERSION, overlay.version);
        corpus.reindex();
        Ok(corpus)
    }

    /// Compile a corpus from explicit definitions.
    pub fn from_defs(version: String, defs: Vec<RuleDef>) -> Result<Self, CorpusError> {
        let mut corpus = Self {
            version,
            rules: Vec::with_capacity(defs.len()),
            by_kind: BTreeMap::new(),
            candidates: Vec::new(),
        };
        for def in defs {
            corpus.push_rule(def)?;
        }
        corpus.reindex();
        debug!(rules = corpus.rules.len(), version = %corpus.version, "corpus loaded");
        Ok(corpus)
    }

    fn push_rule(&mut self, def: RuleDef) -> Result<(), CorpusError> {
        if let Some(existing) = self.rules.iter().find(|r| r.id() == def.id) {
            if existing.is_frozen() {
                return Err(CorpusError::FrozenConflict(def.id));
            }
            return Err(CorpusError::DuplicateRule(def.id));
        }
        self.rules.push(Rule::compile(def)?);
        Ok(())
    }

    fn reindex(&mut self) {
        self.rules.sort_by(|a, b| a.id().cmp(b.id()));
        self.by_kind.clear();
        for (idx, rule) in self.rules.iter().enumerate() {
            self.by_kind.entry(rule.kind()).or_default().push(idx);
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id() == id)
    }

    pub fn candidates(&self) -> &[Rule] {
        &self.candidates
    }

    /// Match `text` against every rule of `kind`, in rule-id order.
    /// Excluded and missed rules emit nothing; each hit is the rule's
    /// first matching inclusion.
    pub fn match_kind(&self, text: &str, kind: RuleKind) -> Vec<RuleHit> {
        self.evaluate_kind(text, kind)
            .into_iter()
            .filter_map(|(_, eval)| match eval {
                RuleEval::Hit(hit) => Some(hit),
                _ => None,
            })
            .collect()
    }

    /// Full evaluation of every rule of `kind` (hits, exclusions and
    /// misses), in rule-id order. The capability analyzer uses this to
    /// surface suppressed matches in attributions.
    pub fn evaluate_kind(&self, text: &str, kind: RuleKind) -> Vec<(String, RuleEval)> {
        let Some(indices) = self.by_kind.get(&kind) else {
            return Vec::new();
        };
        indices
            .iter()
            .map(|&idx| {
                let rule = &self.rules[idx];
                (rule.id().to_string(), rule.evaluate(text))
            })
            .collect()
    }

    /// Admit a candidate rule. Only the saturation pipeline calls this,
    /// and only with a passing meta-invariant report.
    pub fn admit_candidate(
        &mut self,
        candidate: CandidateRule,
        report: &MsiReport,
    ) -> Result<(), CorpusError> {
        if report.rule_id != candidate.def.id || !report.passed() {
            return Err(CorpusError::MetaInvariant {
                rule_id: candidate.def.id,
                failed: report.failed_ids(),
            });
        }
        if self.rules.iter().any(|r| r.id() == candidate.def.id)
            || self.candidates.iter().any(|r| r.id() == candidate.def.id)
        {
            return Err(CorpusError::DuplicateRule(candidate.def.id));
        }
        let mut def = candidate.def;
        def.frozen = false;
        self.candidates.push(Rule::compile(def)?);
        Ok(())
    }

    /// Convenience: run the gate and admit in one step.
    pub fn gate_and_admit(&mut self, candidate: CandidateRule) -> Result<MsiReport, CorpusError> {
        let report = MsiGate::new().check(self, &candidate);
        if report.passed() {
            self.admit_candidate(candidate, &report)?;
        }
        Ok(report)
    }
}

fn builtin_axiom_defs() -> Vec<RuleDef> {
    vec![RuleDef {
        id: "AX-001".to_string(),
        kind: RuleKind::Axiom,
        name: "destruction-floor".to_string(),
        severity: Severity::Critical,
        inclusion: vec![r"(delete|destroy|wipe) (all|every|everything)".to_string()],
        exclusion: vec![r"\bmy own\b".to_string()],
        frozen: true,
    }]
}

fn builtin_composition_defs() -> Vec<RuleDef> {
    vec![RuleDef {
        id: "CMP-001".to_string(),
        kind: RuleKind::Composition,
        name: "covert-exfiltration".to_string(),
        severity: Severity::Critical,
        inclusion: vec![r"(export|download|transfer).*without (logging|audit)".to_string()],
        exclusion: vec![],
        frozen: true,
    }]
}

fn builtin_auth_defs() -> Vec<RuleDef> {
    vec![RuleDef {
        id: "AUTH-001".to_string(),
        kind: RuleKind::Auth,
        name: "unauthenticated-privilege".to_string(),
        severity: Severity::High,
        inclusion: vec![r"without (signing in|authentication|credentials)".to_string()],
        exclusion: vec![],
        frozen: true,
    }]
}

/// Power-invariant metadata. These rules never match text; the graph
/// checker evaluates them as predicates and cites them by id.
fn builtin_power_invariant_defs() -> Vec<RuleDef> {
    let names = [
        ("PIL-001", "universal-authority", Severity::Critical),
        ("PIL-002", "self-elevation", Severity::Critical),
        ("PIL-003", "authority-accumulation", Severity::High),
        ("PIL-004", "sandbox-escape", Severity::Critical),
        ("PIL-005", "scope-violation", Severity::High),
        ("PIL-006", "cross-domain-leakage", Severity::High),
        ("PIL-007", "infinite-persistence", Severity::Med),
        ("PIL-008", "session-boundary", Severity::High),
    ];
    names
        .into_iter()
        .map(|(id, name, severity)| RuleDef {
            id: id.to_string(),
            kind: RuleKind::PowerInvariant,
            name: name.to_string(),
            severity,
            inclusion: vec![],
            exclusion: vec![],
            frozen: true,
        })
        .collect()
}
