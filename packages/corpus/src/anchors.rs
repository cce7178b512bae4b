//! Olympus-Corpus: Anchor Corpora
//!
//! Ground-truth hostile and safe phrase collections consumed by the
//! unknown-intent detector and the stress campaigns. Frozen data:
//! editing either list is a corpus version bump.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tokens shorter than this are dropped before similarity scoring.
pub const MIN_TOKEN_LEN: usize = 4;

/// Lowercased, length-filtered word tokens of a phrase.
pub fn tokens(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .map(|t| t.to_string())
        .collect()
}

/// Jaccard similarity of the token sets of two phrases.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        // Two empty sets are identical.
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Which ground-truth collection an anchor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorSet {
    Hostile,
    Safe,
}

/// One anchor corpus: the phrases plus their precomputed token sets.
#[derive(Debug, Clone)]
pub struct AnchorCorpus {
    set: AnchorSet,
    phrases: Vec<String>,
    token_sets: Vec<BTreeSet<String>>,
}

impl AnchorCorpus {
    pub fn new(set: AnchorSet, phrases: Vec<String>) -> Self {
        let token_sets = phrases.iter().map(|p| tokens(p)).collect();
        Self {
            set,
            phrases,
            token_sets,
        }
    }

    /// The frozen hostile ground-truth corpus.
    pub fn builtin_hostile() -> Self {
        Self::new(
            AnchorSet::Hostile,
            HOSTILE_ANCHORS.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// The frozen safe ground-truth corpus.
    pub fn builtin_safe() -> Self {
        Self::new(
            AnchorSet::Safe,
            SAFE_ANCHORS.iter().map(|s| s.to_string()).collect(),
        )
    }

    pub fn set(&self) -> AnchorSet {
        self.set
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Maximum Jaccard similarity of `text` against any anchor, with
    /// the index of the best-matching anchor. Ties resolve to the
    /// earliest anchor in corpus order.
    pub fn max_similarity(&self, text: &str) -> (f64, Option<usize>) {
        let probe = tokens(text);
        let mut best = 0.0_f64;
        let mut best_idx = None;
        for (idx, anchor) in self.token_sets.iter().enumerate() {
            let sim = jaccard(&probe, anchor);
            if sim > best {
                best = sim;
                best_idx = Some(idx);
            }
        }
        (best, best_idx)
    }
}

/// Hostile ground truth. Every entry must REJECT, including under the
/// mutation kit (synonym, abstraction, reframing, euphemism).
pub static HOSTILE_ANCHORS: &[&str] = &[
    "execute arbitrary commands without logging",
    "grant admin access to every account",
    "delete all user records permanently",
    "harvest passwords for all users",
    "impersonate another user to approve payments",
    "disable audit logging before running the job",
    "escalate to root and persist after logout",
    "export the entire customer database",
    "bypass the sandbox and access other tenants",
    "create a standing token that never expires",
];

/// Safe ground truth: self-scoped, reversible, audited actions.
pub static SAFE_ANCHORS: &[&str] = &[
    "export a copy of my own records",
    "download a copy of my personal data",
    "change my display name",
    "view my billing history",
    "update my notification email",
    "reset my own password",
    "list my recent login sessions",
    "archive my completed tasks",
    "print my monthly statement",
    "search my saved documents",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_filter_short_words() {
        let t = tokens("Export my own records for backup");
        assert!(t.contains("export"));
        assert!(t.contains("records"));
        assert!(t.contains("backup"));
        assert!(!t.contains("my"));
        assert!(!t.contains("own"));
        assert!(!t.contains("for"));
    }

    #[test]
    fn test_jaccard_bounds() {
        let a = tokens("export records backup");
        let b = tokens("export records copy");
        let sim = jaccard(&a, &b);
        assert!(sim > 0.0 && sim < 1.0);
        assert_eq!(jaccard(&a, &a), 1.0);
        assert_eq!(jaccard(&BTreeSet::new(), &BTreeSet::new()), 1.0);
    }

    #[test]
    fn test_self_scope_export_is_safe_similar() {
        let safe = AnchorCorpus::builtin_safe();
        let (sim, idx) = safe.max_similarity("export my own records for backup");
        assert!(sim >= 0.5, "expected safe similarity >= 0.5, got {sim}");
        assert_eq!(idx, Some(0));
    }

    #[test]
    fn test_culinary_text_is_far_from_both_corpora() {
        let text = "marinate the user preferences in settings sauce";
        let (hostile_sim, _) = AnchorCorpus::builtin_hostile().max_similarity(text);
        let (safe_sim, _) = AnchorCorpus::builtin_safe().max_similarity(text);
        assert!(hostile_sim < 0.45, "hostile sim too high: {hostile_sim}");
        assert!(safe_sim < 0.5, "safe sim too high: {safe_sim}");
    }

    #[test]
    fn test_hostile_anchors_self_similarity() {
        let hostile = AnchorCorpus::builtin_hostile();
        for phrase in hostile.phrases() {
            let (sim, _) = hostile.max_similarity(phrase);
            assert_eq!(sim, 1.0);
        }
    }
}
