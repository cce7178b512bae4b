//! Olympus-Shadow: Unknown-Intent Detector (UID)
//!
//! Semantic-similarity classification against the frozen anchor
//! corpora. Unknown is the default: an intent must clear an anchor
//! threshold to be anything else, and UNKNOWN maps to reject-and-
//! escalate, never to a silent admit.

use serde::{Deserialize, Serialize};
use tracing::debug;

use olympus_corpus::anchors::AnchorCorpus;

/// Minimum similarity against the hostile corpus.
pub const HOSTILE_THRESHOLD: f64 = 0.45;
/// Minimum similarity against the safe corpus.
pub const SAFE_THRESHOLD: f64 = 0.50;

/// Classification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntentClass {
    Safe,
    Hostile,
    Unknown,
}

/// Action the pipeline takes for a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifiedAction {
    #[serde(rename = "ADMIT")]
    Admit,
    #[serde(rename = "REJECT")]
    Reject,
    #[serde(rename = "REJECT_AND_ESCALATE")]
    RejectAndEscalate,
}

/// Full classification record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub class: IntentClass,
    pub action: ClassifiedAction,
    pub hostile_similarity: f64,
    pub safe_similarity: f64,
    /// Nearest hostile anchor phrase, when any token overlaps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nearest_hostile: Option<String>,
    /// Nearest safe anchor phrase, when any token overlaps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nearest_safe: Option<String>,
}

/// The detector over the two frozen anchor corpora.
#[derive(Debug, Clone)]
pub struct UnknownIntentDetector {
    hostile: AnchorCorpus,
    safe: AnchorCorpus,
}

impl Default for UnknownIntentDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl UnknownIntentDetector {
    pub fn new() -> Self {
        Self {
            hostile: AnchorCorpus::builtin_hostile(),
            safe: AnchorCorpus::builtin_safe(),
        }
    }

    pub fn with_corpora(hostile: AnchorCorpus, safe: AnchorCorpus) -> Self {
        Self { hostile, safe }
    }

    /// Classify normalized text.
    ///
    /// UNKNOWN is the default; when both thresholds are met the larger
    /// similarity wins, and an exact tie resolves hostile.
    pub fn classify(&self, text: &str) -> Classification {
        let (hostile_similarity, hostile_idx) = self.hostile.max_similarity(text);
        let (safe_similarity, safe_idx) = self.safe.max_similarity(text);

        let hostile_met = hostile_similarity >= HOSTILE_THRESHOLD;
        let safe_met = safe_similarity >= SAFE_THRESHOLD;

        let class = match (hostile_met, safe_met) {
            (true, true) => {
                if safe_similarity > hostile_similarity {
                    IntentClass::Safe
                } else {
                    IntentClass::Hostile
                }
            }
            (true, false) => IntentClass::Hostile,
            (false, true) => IntentClass::Safe,
            (false, false) => IntentClass::Unknown,
        };

        let action = match class {
            IntentClass::Safe => ClassifiedAction::Admit,
            IntentClass::Hostile => ClassifiedAction::Reject,
            IntentClass::Unknown => ClassifiedAction::RejectAndEscalate,
        };

        debug!(
            ?class,
            hostile_similarity, safe_similarity, "intent classification"
        );

        Classification {
            class,
            action,
            hostile_similarity,
            safe_similarity,
            nearest_hostile: hostile_idx.map(|i| self.hostile.phrases()[i].clone()),
            nearest_safe: safe_idx.map(|i| self.safe.phrases()[i].clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostile_anchor_classifies_hostile() {
        let uid = UnknownIntentDetector::new();
        let c = uid.classify("execute arbitrary commands without logging");
        assert_eq!(c.class, IntentClass::Hostile);
        assert_eq!(c.action, ClassifiedAction::Reject);
        assert_eq!(c.hostile_similarity, 1.0);
    }

    #[test]
    fn test_safe_anchor_classifies_safe() {
        let uid = UnknownIntentDetector::new();
        let c = uid.classify("export a copy of my own records");
        assert_eq!(c.class, IntentClass::Safe);
        assert_eq!(c.action, ClassifiedAction::Admit);
    }

    #[test]
    fn test_self_scope_export_variant_stays_safe() {
        let uid = UnknownIntentDetector::new();
        let c = uid.classify("export my own records for backup");
        assert_eq!(c.class, IntentClass::Safe);
    }

    #[test]
    fn test_unknown_is_the_default() {
        let uid = UnknownIntentDetector::new();
        let c = uid.classify("marinate the user preferences in settings sauce");
        assert_eq!(c.class, IntentClass::Unknown);
        assert_eq!(c.action, ClassifiedAction::RejectAndEscalate);
        assert!(c.hostile_similarity < HOSTILE_THRESHOLD);
        assert!(c.safe_similarity < SAFE_THRESHOLD);
    }

    #[test]
    fn test_empty_text_is_unknown() {
        let uid = UnknownIntentDetector::new();
        let c = uid.classify("");
        assert_eq!(c.class, IntentClass::Unknown);
    }
}
