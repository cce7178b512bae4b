//! Olympus-Shadow: Decision Pipeline
//!
//! The ordered stage driver. A decision is a pure function of the
//! request, the frozen corpus and the supplied verdict history; the
//! stage order `PROVENANCE → IAL_ALIGNMENT → HIA_INDICATORS →
//! HCA1_ANALYZER → PIL_INVARIANTS → HIC_COMPOSITE` is frozen and
//! every stage emits its outcome for the attribution trace.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info_span};

use olympus_corpus::rule::RuleKind;
use olympus_corpus::{
    IndicatorTable, Provenance, ProvenanceExtractor, RawRequest, RuleCorpus,
};

use crate::analyzer::{CapabilityAnalyzer, CapabilityReport};
use crate::attribution::{attribute, StageOutcome};
use crate::graph::GraphBuilder;
use crate::invariants::{InvariantViolation, PowerInvariantChecker};
use crate::oracle::{standard_cross_check, CrossCheckResult, InvariantContext, OracleVerdict};
use crate::types::{
    Attribution, DecisionRequest, InputError, PipelineStage, Verdict,
};
use crate::unknown::{Classification, IntentClass, UnknownIntentDetector};

/// Errors a decision can surface out-of-band. Nothing here writes a
/// partial attribution.
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("attribution serialization failed")]
    Serialization(#[from] serde_json::Error),
}

/// Output of one decision.
#[derive(Debug, Clone)]
pub struct Decision {
    pub attribution: Attribution,
    pub shadow_verdict: Verdict,
    /// True when the decision requires human escalation
    pub escalated: bool,
    pub capability_report: CapabilityReport,
    pub violations: Vec<InvariantViolation>,
    pub classification: Classification,
    pub oracle: CrossCheckResult,
    /// Single-sentence cause for a blocked request
    pub blocker: Option<String>,
}

/// The shadow pipeline over a frozen corpus.
pub struct ShadowPipeline {
    corpus: Arc<RuleCorpus>,
    extractor: ProvenanceExtractor,
    uid: UnknownIntentDetector,
    indicators: IndicatorTable,
}

impl ShadowPipeline {
    pub fn new(corpus: Arc<RuleCorpus>) -> Self {
        Self {
            corpus,
            extractor: ProvenanceExtractor::new(),
            uid: UnknownIntentDetector::new(),
            indicators: IndicatorTable::new(),
        }
    }

    pub fn corpus(&self) -> &RuleCorpus {
        &self.corpus
    }

    /// Decide a request with no verdict history.
    pub fn decide(&self, request: &DecisionRequest) -> Result<Decision, DecisionError> {
        self.decide_with_history(request, &[])
    }

    /// Decide a request against the prior verdicts recorded for the
    /// same canonical input.
    pub fn decide_with_history(
        &self,
        request: &DecisionRequest,
        prior_verdicts: &[Verdict],
    ) -> Result<Decision, DecisionError> {
        validate(request)?;
        let span = info_span!("decision", request_id = %request.request_id);
        let _guard = span.enter();

        // PROVENANCE
        let provenance = self.merge_provenance(request);
        let text = provenance.corpus_text();
        let provenance_outcome = StageOutcome::deferred(PipelineStage::Provenance)
            .with_note(format!("tags={}", provenance.semantic_tags.len()));

        // IAL_ALIGNMENT
        let classification = self.uid.classify(&text);
        let mut ial_outcome = StageOutcome::deferred(PipelineStage::IntentAlignment).with_note(
            format!(
                "class={:?} hostile_sim={:.2} safe_sim={:.2}",
                classification.class,
                classification.hostile_similarity,
                classification.safe_similarity
            ),
        );
        if classification.class == IntentClass::Hostile {
            ial_outcome = ial_outcome.with_verdict(Verdict::Reject);
        }

        // HIA_INDICATORS (advisory)
        let scan = self.indicators.scan(&text);
        let hia_outcome = StageOutcome::deferred(PipelineStage::IndicatorScan).with_note(format!(
            "hostile={} benign={}",
            scan.hostile_count(),
            scan.benign_count()
        ));

        // HCA1_ANALYZER
        let report = CapabilityAnalyzer::new(&self.corpus).analyze(&provenance);
        let mut hca_outcome = StageOutcome::deferred(PipelineStage::CapabilityAnalysis)
            .with_rules(report.match_ids());
        if report.hostile {
            hca_outcome = hca_outcome.with_verdict(Verdict::Reject);
        }

        // PIL_INVARIANTS
        let graph = GraphBuilder::new().build(&report, &provenance);
        let violations = PowerInvariantChecker::new().check(&graph);
        let mut pil_outcome = StageOutcome::deferred(PipelineStage::PowerInvariants).with_rules(
            violations
                .iter()
                .map(|v| v.invariant_id.clone())
                .collect(),
        );
        if !violations.is_empty() {
            pil_outcome = pil_outcome.with_verdict(Verdict::Reject);
        }

        // HIC_COMPOSITE
        let composite_hits = self.composite_hits(&text);
        let composite_hostile = !composite_hits.is_empty();
        let prior_reject = [&ial_outcome, &hca_outcome, &pil_outcome]
            .iter()
            .any(|o| o.verdict == Some(Verdict::Reject));
        let unknown_escalation =
            classification.class == IntentClass::Unknown && !prior_reject && !composite_hostile;

        let mut shadow_verdict = if prior_reject || composite_hostile || unknown_escalation {
            Verdict::Reject
        } else {
            Verdict::Admit
        };
        let mut hic_outcome = StageOutcome::deferred(PipelineStage::Composite)
            .with_rules(composite_hits.clone())
            .with_verdict(shadow_verdict);
        if unknown_escalation {
            hic_outcome = hic_outcome.with_note("unknown intent; reject and escalate".to_string());
        }

        // Redundant oracle cross-check over the proposed verdict.
        let ctx = InvariantContext {
            request_id: request.request_id.clone(),
            text: text.clone(),
            capability_ids: report.match_ids(),
            hostile_capability_ids: report.hostile_ids(),
            violation_ids: violations.iter().map(|v| v.invariant_id.clone()).collect(),
            classification: classification.class,
            proposed_verdict: shadow_verdict,
            prior_verdicts: prior_verdicts.to_vec(),
        };
        let oracle = standard_cross_check(&ctx);

        let mut escalated = unknown_escalation || oracle.pending.is_some();
        if shadow_verdict == Verdict::Admit && oracle.final_verdict == OracleVerdict::Fail {
            // Conservative flip: the quorum outvotes an admission.
            shadow_verdict = Verdict::Reject;
            escalated = true;
            hic_outcome = hic_outcome
                .with_verdict(Verdict::Reject)
                .with_note("oracle cross-check rejected the admission".to_string());
        } else if oracle.pending.is_some() && shadow_verdict == Verdict::Admit {
            // NO_AGREEMENT: conservative reject plus the pending record.
            shadow_verdict = Verdict::Reject;
            hic_outcome = hic_outcome
                .with_verdict(Verdict::Reject)
                .with_note("oracle quorum reached no agreement".to_string());
        }

        let outcomes = vec![
            provenance_outcome,
            ial_outcome,
            hia_outcome,
            hca_outcome,
            pil_outcome,
            hic_outcome,
        ];

        let attribution = attribute(
            request,
            &outcomes,
            shadow_verdict,
            !report.hostile_ids().is_empty(),
            self.corpus.version(),
        )?;

        let blocker = if shadow_verdict == Verdict::Reject {
            Some(match &attribution.counterfactual {
                Some(cf) => format!(
                    "rejected at {}: {}",
                    attribution.causal_layer, cf.description
                ),
                None => format!(
                    "rejected at {}: unknown intent requires escalation",
                    attribution.causal_layer
                ),
            })
        } else {
            None
        };

        debug!(?shadow_verdict, escalated, "decision complete");

        Ok(Decision {
            attribution,
            shadow_verdict,
            escalated,
            capability_report: report,
            violations,
            classification,
            oracle,
            blocker,
        })
    }

    /// Recompute the attribution for a stored input and compare replay
    /// forms byte-for-byte.
    pub fn replay(
        &self,
        request: &DecisionRequest,
        stored: &Attribution,
    ) -> Result<olympus_ledger::ReplayReport, DecisionError> {
        let fresh = self.decide(request)?;
        Ok(olympus_ledger::verify_replay(
            &stored.replay_form(),
            &fresh.attribution.replay_form(),
        ))
    }

    fn merge_provenance(&self, request: &DecisionRequest) -> Provenance {
        let mut declared = Vec::new();
        let mut derived = Vec::new();
        let mut semantic_tags = BTreeSet::new();
        let mut confidence: f64 = 1.0;

        for intent in &request.intents {
            let p = self.extractor.extract(&RawRequest {
                action: intent.action.clone(),
                target: intent.target.clone(),
                requirements: intent.requirements.clone(),
                raw_text: intent.trigger.clone(),
            });
            declared.extend(p.declared);
            derived.extend(p.derived);
            semantic_tags.extend(p.semantic_tags);
            confidence = confidence.min(p.confidence);
        }

        for extra in [&request.raw_input, &request.context] {
            if let Some(raw) = extra {
                let n = olympus_corpus::normalize(raw);
                if !n.is_empty() {
                    derived.push(n);
                }
            }
        }

        // Tags over the merged text catch cross-intent phrasing.
        let merged = Provenance {
            declared,
            derived,
            semantic_tags,
            confidence,
        };
        let mut tags = merged.semantic_tags.clone();
        tags.extend(
            olympus_corpus::SemanticTagMap::builtin().derive(&merged.corpus_text()),
        );
        Provenance {
            semantic_tags: tags,
            ..merged
        }
    }

    fn composite_hits(&self, text: &str) -> Vec<String> {
        let mut hits: Vec<String> = [RuleKind::Auth, RuleKind::Axiom, RuleKind::Composition]
            .into_iter()
            .flat_map(|kind| self.corpus.match_kind(text, kind))
            .filter(|h| h.severity.is_hostile())
            .map(|h| h.rule_id)
            .collect();
        hits.sort();
        hits
    }
}

fn validate(request: &DecisionRequest) -> Result<(), InputError> {
    if request.request_id.trim().is_empty() {
        return Err(InputError::EmptyRequestId);
    }
    if request.intents.is_empty() {
        return Err(InputError::NoIntents);
    }
    let mut seen = BTreeSet::new();
    for (idx, intent) in request.intents.iter().enumerate() {
        if intent.id.trim().is_empty() {
            return Err(InputError::EmptyIntentId(idx));
        }
        if !seen.insert(intent.id.as_str()) {
            return Err(InputError::DuplicateIntentId(intent.id.clone()));
        }
    }
    Ok(())
}
