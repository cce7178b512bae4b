//! Olympus-Ledger: Replay Verification
//!
//! The replay hash binds a decision's canonical input to its canonical
//! output. Recomputing a stored attribution from its input must
//! reproduce the record bit-for-bit; anything else is evidence of a
//! non-deterministic decision path.

use serde::Serialize;
use serde_json::Value;

use crate::canonical::{canonical_string, digest, digest_str};

/// Compute the replay hash for a decision.
///
/// `replay_hash = H(input_hash || output_hash)` where `output_hash` is
/// computed over the verdict, the causal layer and the sorted
/// triggered rule ids.
pub fn replay_hash<I: Serialize>(
    input: &I,
    verdict: &str,
    causal_layer: &str,
    rule_ids: &[String],
) -> Result<String, serde_json::Error> {
    let input_hash = digest(input)?;

    let mut sorted = rule_ids.to_vec();
    sorted.sort();
    let output_form = serde_json::json!({
        "verdict": verdict,
        "causal_layer": causal_layer,
        "rule_ids": sorted,
    });
    let output_hash = digest_str(&canonical_string(&output_form)?);

    Ok(digest_str(&format!("{input_hash}{output_hash}")))
}

/// Result of comparing a stored record against its recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub matches: bool,
    pub stored_hash: String,
    pub recomputed_hash: String,
}

/// Compare a stored attribution value against a recomputed one,
/// byte-for-byte over the canonical form.
pub fn verify_replay(stored: &Value, recomputed: &Value) -> ReplayReport {
    let stored_canonical = canonical_string(stored).unwrap_or_default();
    let recomputed_canonical = canonical_string(recomputed).unwrap_or_default();
    let stored_hash = digest_str(&stored_canonical);
    let recomputed_hash = digest_str(&recomputed_canonical);
    ReplayReport {
        matches: stored_canonical == recomputed_canonical,
        stored_hash,
        recomputed_hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_replay_hash_is_deterministic() {
        let input = json!({"request_id": "r-1", "intents": []});
        let a = replay_hash(&input, "REJECT", "HCA1_ANALYZER", &["CAP-002".into(), "CAP-006".into()])
            .unwrap();
        let b = replay_hash(&input, "REJECT", "HCA1_ANALYZER", &["CAP-006".into(), "CAP-002".into()])
            .unwrap();
        // Rule id order does not matter; they are sorted first.
        assert_eq!(a, b);
    }

    #[test]
    fn test_replay_hash_binds_output() {
        let input = json!({"request_id": "r-1"});
        let reject = replay_hash(&input, "REJECT", "HCA1_ANALYZER", &[]).unwrap();
        let admit = replay_hash(&input, "ADMIT", "AGREEMENT", &[]).unwrap();
        assert_ne!(reject, admit);
    }

    #[test]
    fn test_verify_replay_detects_divergence() {
        let stored = json!({"verdict": "REJECT", "score": 1});
        let same = json!({"score": 1, "verdict": "REJECT"});
        let different = json!({"verdict": "ADMIT", "score": 1});

        assert!(verify_replay(&stored, &same).matches);
        assert!(!verify_replay(&stored, &different).matches);
    }
}
