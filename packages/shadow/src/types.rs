//! Olympus-Shadow: Core Types
//!
//! Wire-level request shape, verdicts, pipeline stages and the
//! attribution record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One intent inside a decision request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireIntent {
    /// Intent identifier, unique within the request
    pub id: String,
    /// Declared action verb
    pub action: String,
    /// Declared target
    pub target: String,
    /// Optional declared requirements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<String>>,
    /// Optional declared trigger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

/// Wire-level decision input. Unknown fields are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecisionRequest {
    /// Request identifier
    pub request_id: String,
    /// Ordered intents
    pub intents: Vec<WireIntent>,
    /// Optional free-form context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Optional raw request text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<String>,
    /// The canonical pipeline's verdict for divergence analysis
    pub canonical_verdict: Verdict,
}

/// Admit or reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Admit,
    Reject,
}

/// The six pipeline stages, in frozen order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    #[serde(rename = "PROVENANCE")]
    Provenance,
    #[serde(rename = "IAL_ALIGNMENT")]
    IntentAlignment,
    #[serde(rename = "HIA_INDICATORS")]
    IndicatorScan,
    #[serde(rename = "HCA1_ANALYZER")]
    CapabilityAnalysis,
    #[serde(rename = "PIL_INVARIANTS")]
    PowerInvariants,
    #[serde(rename = "HIC_COMPOSITE")]
    Composite,
}

impl PipelineStage {
    /// Frozen execution order. Skip-ahead is a logic error.
    pub const ORDER: [PipelineStage; 6] = [
        PipelineStage::Provenance,
        PipelineStage::IntentAlignment,
        PipelineStage::IndicatorScan,
        PipelineStage::CapabilityAnalysis,
        PipelineStage::PowerInvariants,
        PipelineStage::Composite,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Provenance => "PROVENANCE",
            PipelineStage::IntentAlignment => "IAL_ALIGNMENT",
            PipelineStage::IndicatorScan => "HIA_INDICATORS",
            PipelineStage::CapabilityAnalysis => "HCA1_ANALYZER",
            PipelineStage::PowerInvariants => "PIL_INVARIANTS",
            PipelineStage::Composite => "HIC_COMPOSITE",
        }
    }
}

/// Shadow-vs-canonical verdict classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerdictClass {
    /// Agreement
    S1,
    /// Confirmed false positive
    S2,
    /// Confirmed false negative
    S3,
    /// Critical miss: shadow admits a hostile request
    S4,
    /// Shadow stricter than canonical, pending review
    #[serde(rename = "S2_PENDING")]
    S2Pending,
    /// Shadow more permissive than canonical, pending review
    #[serde(rename = "S3_PENDING")]
    S3Pending,
}

/// Direction of a shadow/canonical divergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivergenceKind {
    #[serde(rename = "SHADOW_MORE_STRICT")]
    ShadowMoreStrict,
    #[serde(rename = "SHADOW_MORE_PERMISSIVE")]
    ShadowMorePermissive,
    #[serde(rename = "SAME_VERDICT_DIFFERENT_REASON")]
    SameVerdictDifferentReason,
}

/// One entry of the per-decision stage trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTraceEntry {
    /// Stage name (frozen strings)
    pub stage: String,
    /// Stage verdict; None when the stage defers
    pub verdict: Option<Verdict>,
    /// Rule ids emitted by the stage, id ascending
    pub rule_emissions: Vec<String>,
    /// Short free-form stage note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One link of the causal chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalLink {
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub effect: String,
}

/// Minimal counterfactual cause of a rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counterfactual {
    /// First triggered rule in stage order
    pub minimal_cause: String,
    /// The single change that would unblock the request
    pub description: String,
}

/// The immutable causal record of one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub request_id: String,
    /// Append timestamp; excluded from the replay form
    pub timestamp: DateTime<Utc>,
    /// Corpus version the decision ran against
    pub corpus_version: String,
    /// First rejecting stage, or "AGREEMENT"
    pub causal_layer: String,
    /// Stage at which shadow and canonical verdicts diverged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_divergence_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divergence: Option<DivergenceKind>,
    /// All triggered rule ids, sorted ascending
    pub rule_emissions: Vec<String>,
    pub stage_trace: Vec<StageTraceEntry>,
    pub verdict_class: VerdictClass,
    pub shadow_verdict: Verdict,
    pub canonical_verdict: Verdict,
    pub causal_chain: Vec<CausalLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterfactual: Option<Counterfactual>,
    /// H(input canonical, output digest)
    pub replay_hash: String,
}

impl Attribution {
    /// The replay-relevant projection: everything except the append
    /// timestamp, which is bookkeeping rather than decision output.
    pub fn replay_form(&self) -> Value {
        let mut v = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut v {
            map.remove("timestamp");
        }
        v
    }
}

/// Malformed input. Rejected before any ledger write.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("ERR_EMPTY_REQUEST_ID: request_id must be non-empty")]
    EmptyRequestId,

    #[error("ERR_NO_INTENTS: at least one intent is required")]
    NoIntents,

    #[error("ERR_EMPTY_INTENT_ID: intent at position {0} has an empty id")]
    EmptyIntentId(usize),

    #[error("ERR_DUPLICATE_INTENT_ID: intent id {0} appears more than once")]
    DuplicateIntentId(String),
}

impl InputError {
    /// Stable error code (the part before the colon).
    pub fn code(&self) -> &'static str {
        match self {
            InputError::EmptyRequestId => "ERR_EMPTY_REQUEST_ID",
            InputError::NoIntents => "ERR_NO_INTENTS",
            InputError::EmptyIntentId(_) => "ERR_EMPTY_INTENT_ID",
            InputError::DuplicateIntentId(_) => "ERR_DUPLICATE_INTENT_ID",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_are_rejected() {
        let raw = r#"{
            "request_id": "r-1",
            "intents": [],
            "canonical_verdict": "ADMIT",
            "surprise": true
        }"#;
        let parsed: Result<DecisionRequest, _> = serde_json::from_str(raw);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_stage_order_is_frozen() {
        let names: Vec<&str> = PipelineStage::ORDER.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "PROVENANCE",
                "IAL_ALIGNMENT",
                "HIA_INDICATORS",
                "HCA1_ANALYZER",
                "PIL_INVARIANTS",
                "HIC_COMPOSITE"
            ]
        );
    }

    #[test]
    fn test_verdict_class_serialization() {
        assert_eq!(
            serde_json::to_string(&VerdictClass::S2Pending).unwrap(),
            "\"S2_PENDING\""
        );
        assert_eq!(serde_json::to_string(&VerdictClass::S4).unwrap(), "\"S4\"");
    }

    #[test]
    fn test_replay_form_strips_timestamp() {
        let attribution = Attribution {
            request_id: "r-1".to_string(),
            timestamp: Utc::now(),
            corpus_version: "1.0.0".to_string(),
            causal_layer: "AGREEMENT".to_string(),
            first_divergence_stage: None,
            divergence: None,
            rule_emissions: vec![],
            stage_trace: vec![],
            verdict_class: VerdictClass::S1,
            shadow_verdict: Verdict::Admit,
            canonical_verdict: Verdict::Admit,
            causal_chain: vec![],
            counterfactual: None,
            replay_hash: "00".to_string(),
        };
        let form = attribution.replay_form();
        assert!(form.get("timestamp").is_none());
        assert!(form.get("replay_hash").is_some());
    }

    #[test]
    fn test_input_error_codes_are_stable() {
        assert_eq!(InputError::EmptyRequestId.code(), "ERR_EMPTY_REQUEST_ID");
        assert_eq!(InputError::NoIntents.code(), "ERR_NO_INTENTS");
    }
}
