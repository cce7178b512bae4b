//! Olympus-Corpus: Rule Definitions & Matching
//!
//! A rule is an ordered set of inclusion patterns guarded by an
//! ordered set of exclusion patterns. Exclusions are evaluated
//! strictly before inclusions; a rule emits at most one hit per text
//! (the first inclusion that matches).

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::registry::CorpusError;

/// Rule family within the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    /// Authentication and authorization rules
    #[serde(rename = "AUTH")]
    Auth,
    /// Foundational axioms (always-on safety floor)
    #[serde(rename = "AXIOM")]
    Axiom,
    /// Capability detection rules (CAP-xxx)
    #[serde(rename = "CAPABILITY")]
    Capability,
    /// Multi-capability composition rules
    #[serde(rename = "COMPOSITION")]
    Composition,
    /// Authority-graph invariants (PIL-xxx)
    #[serde(rename = "POWER-INVARIANT")]
    PowerInvariant,
}

/// Rule severity. Ordering matters: `High` and `Critical` satisfy the
/// hostility contract of the capability analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MED")]
    Med,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "CRITICAL")]
    Critical,
}

impl Severity {
    /// Does this severity reject a request on its own?
    pub fn is_hostile(self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

/// Serializable rule definition (the YAML/built-in form).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDef {
    /// Unique rule identifier (e.g. "CAP-002")
    pub id: String,
    /// Rule family
    pub kind: RuleKind,
    /// Human-readable name
    pub name: String,
    /// Severity assigned to hits
    pub severity: Severity,
    /// Ordered inclusion patterns (first match wins)
    #[serde(default)]
    pub inclusion: Vec<String>,
    /// Ordered exclusion patterns (any match suppresses the rule)
    #[serde(default)]
    pub exclusion: Vec<String>,
    /// Frozen rules cannot be superseded by overlays
    #[serde(default = "default_frozen")]
    pub frozen: bool,
}

fn default_frozen() -> bool {
    true
}

/// A single rule emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleHit {
    /// Rule that fired
    pub rule_id: String,
    /// Rule family
    pub kind: RuleKind,
    /// Severity of the hit
    pub severity: Severity,
    /// Pattern identifier within the rule (e.g. "CAP-002/i1")
    pub pattern_id: String,
    /// The exact text span that matched
    pub matched_text: String,
}

/// Outcome of evaluating one rule against one text.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleEval {
    /// No inclusion pattern matched
    Miss,
    /// An exclusion pattern matched before any inclusion counted
    Excluded {
        /// Pattern identifier of the exclusion (e.g. "CAP-003/x0")
        pattern_id: String,
        /// Hit the rule would have emitted absent the exclusion
        suppressed: Option<RuleHit>,
    },
    /// The first matching inclusion pattern
    Hit(RuleHit),
}

/// A compiled rule: definition plus its compiled matchers.
#[derive(Debug, Clone)]
pub struct Rule {
    def: RuleDef,
    inclusion: Vec<Regex>,
    exclusion: Vec<Regex>,
}

impl Rule {
    /// Compile a rule definition. Any pattern failure is a
    /// [`CorpusError::PatternCompile`]; the corpus never partial-loads.
    pub fn compile(def: RuleDef) -> Result<Self, CorpusError> {
        let inclusion = compile_patterns(&def.id, "i", &def.inclusion)?;
        let exclusion = compile_patterns(&def.id, "x", &def.exclusion)?;
        Ok(Self {
            def,
            inclusion,
            exclusion,
        })
    }

    pub fn id(&self) -> &str {
        &self.def.id
    }

    pub fn kind(&self) -> RuleKind {
        self.def.kind
    }

    pub fn severity(&self) -> Severity {
        self.def.severity
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn is_frozen(&self) -> bool {
        self.def.frozen
    }

    pub fn def(&self) -> &RuleDef {
        &self.def
    }

    /// Evaluate this rule against normalized text.
    ///
    /// Exclusions are checked first: if any exclusion matches, the rule
    /// is suppressed for this text regardless of inclusions. Otherwise
    /// the first matching inclusion is emitted as the single hit.
    pub fn evaluate(&self, text: &str) -> RuleEval {
        let first_inclusion = self.first_inclusion(text);

        for (idx, excl) in self.exclusion.iter().enumerate() {
            if excl.is_match(text) {
                return RuleEval::Excluded {
                    pattern_id: format!("{}/x{}", self.def.id, idx),
                    suppressed: first_inclusion,
                };
            }
        }

        match first_inclusion {
            Some(hit) => RuleEval::Hit(hit),
            None => RuleEval::Miss,
        }
    }

    fn first_inclusion(&self, text: &str) -> Option<RuleHit> {
        for (idx, incl) in self.inclusion.iter().enumerate() {
            if let Some(m) = incl.find(text) {
                return Some(RuleHit {
                    rule_id: self.def.id.clone(),
                    kind: self.def.kind,
                    severity: self.def.severity,
                    pattern_id: format!("{}/i{}", self.def.id, idx),
                    matched_text: m.as_str().to_string(),
                });
            }
        }
        None
    }
}

fn compile_patterns(
    rule_id: &str,
    prefix: &str,
    patterns: &[String],
) -> Result<Vec<Regex>, CorpusError> {
    patterns
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            Regex::new(raw).map_err(|source| CorpusError::PatternCompile {
                rule_id: rule_id.to_string(),
                pattern_id: format!("{rule_id}/{prefix}{idx}"),
                source,
            })
        })
        .collect()
}
