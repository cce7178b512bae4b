//! Olympus-Shadow: Verdict Attributor
//!
//! Pure function from the ordered stage outcomes and both verdicts to
//! the immutable attribution record: causal layer, first divergence,
//! minimal counterfactual cause, verdict class and replay hash.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use olympus_ledger::replay_hash;

use crate::types::{
    Attribution, CausalLink, Counterfactual, DecisionRequest, DivergenceKind, PipelineStage,
    StageTraceEntry, Verdict, VerdictClass,
};

/// Result of running one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: PipelineStage,
    /// Some(..) when the stage decided; None when it deferred
    pub verdict: Option<Verdict>,
    /// Rule ids emitted by the stage, ascending
    pub rule_ids: Vec<String>,
    /// Short stage note for the trace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl StageOutcome {
    pub fn deferred(stage: PipelineStage) -> Self {
        Self {
            stage,
            verdict: None,
            rule_ids: Vec::new(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_rules(mut self, rule_ids: Vec<String>) -> Self {
        self.rule_ids = rule_ids;
        self
    }

    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = Some(verdict);
        self
    }
}

/// Build the attribution for one decision.
///
/// Deterministic: identical request, outcomes and corpus version
/// produce an identical record up to the append timestamp, and an
/// identical replay hash.
pub fn attribute(
    request: &DecisionRequest,
    outcomes: &[StageOutcome],
    shadow_verdict: Verdict,
    hostile_capability_present: bool,
    corpus_version: &str,
) -> Result<Attribution, serde_json::Error> {
    let causal_layer = outcomes
        .iter()
        .find(|o| o.verdict == Some(Verdict::Reject))
        .map(|o| o.stage.as_str().to_string())
        .unwrap_or_else(|| "AGREEMENT".to_string());

    let (divergence, first_divergence_stage, verdict_class) = classify(
        shadow_verdict,
        request.canonical_verdict,
        &causal_layer,
        hostile_capability_present,
    );

    let mut rule_emissions: Vec<String> = outcomes
        .iter()
        .flat_map(|o| o.rule_ids.iter().cloned())
        .collect();
    rule_emissions.sort();
    rule_emissions.dedup();

    let counterfactual = outcomes
        .iter()
        .find_map(|o| {
            o.rule_ids.first().map(|rule_id| Counterfactual {
                minimal_cause: rule_id.clone(),
                description: format!(
                    "absent {}, stage {} emits no rejection",
                    rule_id,
                    o.stage.as_str()
                ),
            })
        })
        .filter(|_| shadow_verdict == Verdict::Reject);

    let causal_chain = outcomes
        .iter()
        .map(|o| CausalLink {
            stage: o.stage.as_str().to_string(),
            rule_id: o.rule_ids.first().cloned(),
            effect: match o.verdict {
                Some(Verdict::Reject) => "rejected".to_string(),
                Some(Verdict::Admit) => "admitted".to_string(),
                None => "deferred".to_string(),
            },
        })
        .collect();

    let stage_trace = outcomes
        .iter()
        .map(|o| StageTraceEntry {
            stage: o.stage.as_str().to_string(),
            verdict: o.verdict,
            rule_emissions: o.rule_ids.clone(),
            note: o.note.clone(),
        })
        .collect();

    let verdict_str = match shadow_verdict {
        Verdict::Admit => "ADMIT",
        Verdict::Reject => "REJECT",
    };
    let replay = replay_hash(request, verdict_str, &causal_layer, &rule_emissions)?;

    Ok(Attribution {
        request_id: request.request_id.clone(),
        timestamp: Utc::now(),
        corpus_version: corpus_version.to_string(),
        causal_layer,
        first_divergence_stage,
        divergence,
        rule_emissions,
        stage_trace,
        verdict_class,
        shadow_verdict,
        canonical_verdict: request.canonical_verdict,
        causal_chain,
        counterfactual,
        replay_hash: replay,
    })
}

fn classify(
    shadow: Verdict,
    canonical: Verdict,
    causal_layer: &str,
    hostile_capability_present: bool,
) -> (Option<DivergenceKind>, Option<String>, VerdictClass) {
    match (shadow, canonical) {
        (Verdict::Reject, Verdict::Admit) => (
            Some(DivergenceKind::ShadowMoreStrict),
            Some(causal_layer.to_string()),
            VerdictClass::S2Pending,
        ),
        (Verdict::Admit, Verdict::Reject) => {
            let class = if hostile_capability_present {
                // Shadow would admit a request the canonical pipeline
                // rejects while hostile capabilities are on the table.
                VerdictClass::S4
            } else {
                VerdictClass::S3Pending
            };
            (
                Some(DivergenceKind::ShadowMorePermissive),
                Some(PipelineStage::Composite.as_str().to_string()),
                class,
            )
        }
        _ => (None, None, VerdictClass::S1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WireIntent;

    fn request(canonical: Verdict) -> DecisionRequest {
        DecisionRequest {
            request_id: "r-1".to_string(),
            intents: vec![WireIntent {
                id: "i-1".to_string(),
                action: "grant".to_string(),
                target: "permission".to_string(),
                requirements: None,
                trigger: None,
            }],
            context: None,
            raw_input: Some("grant permission to execute any operation without logging".to_string()),
            canonical_verdict: canonical,
        }
    }

    fn rejecting_outcomes() -> Vec<StageOutcome> {
        vec![
            StageOutcome::deferred(PipelineStage::Provenance),
            StageOutcome::deferred(PipelineStage::IntentAlignment),
            StageOutcome::deferred(PipelineStage::IndicatorScan),
            StageOutcome::deferred(PipelineStage::CapabilityAnalysis)
                .with_verdict(Verdict::Reject)
                .with_rules(vec!["CAP-002".to_string(), "CAP-006".to_string()]),
            StageOutcome::deferred(PipelineStage::PowerInvariants),
            StageOutcome::deferred(PipelineStage::Composite).with_verdict(Verdict::Reject),
        ]
    }

    #[test]
    fn test_causal_layer_is_first_rejecting_stage() {
        let a = attribute(
            &request(Verdict::Reject),
            &rejecting_outcomes(),
            Verdict::Reject,
            true,
            "1.0.0",
        )
        .unwrap();
        assert_eq!(a.causal_layer, "HCA1_ANALYZER");
        assert_eq!(a.verdict_class, VerdictClass::S1);
        assert_eq!(a.rule_emissions, vec!["CAP-002", "CAP-006"]);
    }

    #[test]
    fn test_minimal_cause_is_first_rule_in_stage_order() {
        let a = attribute(
            &request(Verdict::Reject),
            &rejecting_outcomes(),
            Verdict::Reject,
            true,
            "1.0.0",
        )
        .unwrap();
        let cf = a.counterfactual.unwrap();
        assert_eq!(cf.minimal_cause, "CAP-002");
    }

    #[test]
    fn test_shadow_stricter_is_s2_pending() {
        let a = attribute(
            &request(Verdict::Admit),
            &rejecting_outcomes(),
            Verdict::Reject,
            true,
            "1.0.0",
        )
        .unwrap();
        assert_eq!(a.verdict_class, VerdictClass::S2Pending);
        assert_eq!(a.divergence, Some(DivergenceKind::ShadowMoreStrict));
        assert_eq!(a.first_divergence_stage.as_deref(), Some("HCA1_ANALYZER"));
    }

    #[test]
    fn test_hostile_admission_is_s4() {
        let outcomes = vec![
            StageOutcome::deferred(PipelineStage::Provenance),
            StageOutcome::deferred(PipelineStage::Composite).with_verdict(Verdict::Admit),
        ];
        let a = attribute(&request(Verdict::Reject), &outcomes, Verdict::Admit, true, "1.0.0")
            .unwrap();
        assert_eq!(a.verdict_class, VerdictClass::S4);
        assert_eq!(a.divergence, Some(DivergenceKind::ShadowMorePermissive));
    }

    #[test]
    fn test_replay_hash_is_stable_across_runs() {
        let a = attribute(
            &request(Verdict::Reject),
            &rejecting_outcomes(),
            Verdict::Reject,
            true,
            "1.0.0",
        )
        .unwrap();
        let b = attribute(
            &request(Verdict::Reject),
            &rejecting_outcomes(),
            Verdict::Reject,
            true,
            "1.0.0",
        )
        .unwrap();
        assert_eq!(a.replay_hash, b.replay_hash);
    }

    #[test]
    fn test_agreement_has_no_counterfactual_on_admit() {
        let outcomes = vec![
            StageOutcome::deferred(PipelineStage::Provenance),
            StageOutcome::deferred(PipelineStage::Composite).with_verdict(Verdict::Admit),
        ];
        let a = attribute(&request(Verdict::Admit), &outcomes, Verdict::Admit, false, "1.0.0")
            .unwrap();
        assert_eq!(a.causal_layer, "AGREEMENT");
        assert!(a.counterfactual.is_none());
        assert_eq!(a.verdict_class, VerdictClass::S1);
    }
}
