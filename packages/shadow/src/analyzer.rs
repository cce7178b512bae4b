//! Olympus-Shadow: Capability Analyzer (HCA)
//!
//! Runs the corpus capability table over a provenance record and
//! applies the hostility contract: a request is HOSTILE iff any
//! non-excluded match carries HIGH or CRITICAL severity. There is no
//! scoring beyond that rule.

use serde::{Deserialize, Serialize};
use tracing::debug;

use olympus_corpus::rule::{RuleEval, RuleKind, Severity};
use olympus_corpus::{Provenance, RuleCorpus};

/// One capability detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityMatch {
    /// Capability rule id (CAP-xxx)
    pub capability_id: String,
    pub severity: Severity,
    /// Provenance confidence carried through
    pub confidence: f64,
    pub matched_text: String,
    pub matched_pattern_id: String,
    /// True when an exclusion clause suppressed the match
    pub excluded: bool,
}

/// Analyzer output: live matches and suppressed candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityReport {
    /// Non-excluded matches, capability id ascending
    pub matches: Vec<CapabilityMatch>,
    /// Candidates an exclusion clause suppressed, id ascending
    pub excluded: Vec<CapabilityMatch>,
    /// The hostility contract over `matches`
    pub hostile: bool,
}

impl CapabilityReport {
    pub fn match_ids(&self) -> Vec<String> {
        self.matches.iter().map(|m| m.capability_id.clone()).collect()
    }

    pub fn hostile_ids(&self) -> Vec<String> {
        self.matches
            .iter()
            .filter(|m| m.severity.is_hostile())
            .map(|m| m.capability_id.clone())
            .collect()
    }
}

/// The capability analyzer. Stateless over a borrowed corpus.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityAnalyzer<'c> {
    corpus: &'c RuleCorpus,
}

impl<'c> CapabilityAnalyzer<'c> {
    pub fn new(corpus: &'c RuleCorpus) -> Self {
        Self { corpus }
    }

    /// Analyze a provenance record.
    pub fn analyze(&self, provenance: &Provenance) -> CapabilityReport {
        let text = provenance.corpus_text();
        let mut matches = Vec::new();
        let mut excluded = Vec::new();

        for (rule_id, eval) in self.corpus.evaluate_kind(&text, RuleKind::Capability) {
            match eval {
                RuleEval::Hit(hit) => matches.push(CapabilityMatch {
                    capability_id: rule_id,
                    severity: hit.severity,
                    confidence: provenance.confidence,
                    matched_text: hit.matched_text,
                    matched_pattern_id: hit.pattern_id,
                    excluded: false,
                }),
                RuleEval::Excluded {
                    pattern_id,
                    suppressed,
                } => {
                    let severity = self
                        .corpus
                        .rule(&rule_id)
                        .map(|r| r.severity())
                        .unwrap_or(Severity::Low);
                    excluded.push(CapabilityMatch {
                        capability_id: rule_id,
                        severity,
                        confidence: provenance.confidence,
                        matched_text: suppressed
                            .map(|h| h.matched_text)
                            .unwrap_or_default(),
                        matched_pattern_id: pattern_id,
                        excluded: true,
                    });
                }
                RuleEval::Miss => {}
            }
        }

        let hostile = matches.iter().any(|m| m.severity.is_hostile());
        debug!(
            matches = matches.len(),
            excluded = excluded.len(),
            hostile,
            "capability analysis complete"
        );

        CapabilityReport {
            matches,
            excluded,
            hostile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use olympus_corpus::{ProvenanceExtractor, RawRequest};

    fn report_for(text: &str) -> CapabilityReport {
        let corpus = RuleCorpus::builtin().unwrap();
        let provenance = ProvenanceExtractor::new().extract(&RawRequest {
            action: String::new(),
            target: String::new(),
            requirements: None,
            raw_text: Some(text.to_string()),
        });
        CapabilityAnalyzer::new(&corpus).analyze(&provenance)
    }

    #[test]
    fn test_hostile_request_triggers_cap002_and_cap006() {
        let report = report_for("grant permission to execute any operation without logging");
        assert_eq!(report.match_ids(), vec!["CAP-002", "CAP-006"]);
        assert!(report.hostile);
        assert_eq!(report.matches[0].severity, Severity::Critical);
        assert_eq!(report.matches[1].severity, Severity::High);
    }

    #[test]
    fn test_self_scope_export_emits_zero_hits() {
        let report = report_for("export my own records for backup");
        assert!(report.matches.is_empty());
        assert!(!report.hostile);
        // The exclusion remains visible for attribution.
        assert_eq!(report.excluded.len(), 1);
        assert_eq!(report.excluded[0].capability_id, "CAP-003");
        assert!(report.excluded[0].excluded);
    }

    #[test]
    fn test_med_severity_alone_is_not_hostile() {
        let report = report_for("a token that never expires");
        assert_eq!(report.match_ids(), vec!["CAP-007"]);
        assert!(!report.hostile);
    }

    #[test]
    fn test_neutral_text_matches_nothing() {
        let report = report_for("marinate the user preferences in settings sauce");
        assert!(report.matches.is_empty());
        assert!(report.excluded.is_empty());
        assert!(!report.hostile);
    }
}
