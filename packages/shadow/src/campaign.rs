//! Olympus-Shadow: Stress Campaigns
//!
//! Drives the mutation kit across the anchor corpora and replays every
//! variant through the decision pipeline. The hostile ground truth
//! must stay REJECT under mutation; any admitted hostile variant is a
//! silent admit and fails the campaign.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use olympus_corpus::anchors::{HOSTILE_ANCHORS, SAFE_ANCHORS};

use crate::mutation::{MutationKit, MutatorKind};
use crate::pipeline::{DecisionError, ShadowPipeline};
use crate::types::{DecisionRequest, Verdict, WireIntent};

/// Variants generated per anchor/mutator pair.
pub const SAMPLES_PER_MUTATOR: usize = 3;

/// One campaign probe outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignProbe {
    pub anchor: String,
    pub mutator: MutatorKind,
    pub sample_index: usize,
    pub variant: String,
    pub verdict: Verdict,
    pub escalated: bool,
}

/// Per-mutator aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutatorStats {
    pub probes: usize,
    pub rejected: usize,
    pub admitted: usize,
}

/// Full campaign report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignReport {
    pub campaign: String,
    pub probes: Vec<CampaignProbe>,
    pub per_mutator: BTreeMap<MutatorKind, MutatorStats>,
    /// Hostile variants the pipeline admitted; must stay empty
    pub silent_admits: Vec<CampaignProbe>,
}

impl CampaignReport {
    /// The campaign invariant: zero silent admits.
    pub fn holds(&self) -> bool {
        self.silent_admits.is_empty()
    }
}

/// The campaign driver.
pub struct StressCampaign<'p> {
    pipeline: &'p ShadowPipeline,
    kit: MutationKit,
    mutators: Vec<MutatorKind>,
}

impl<'p> StressCampaign<'p> {
    /// Campaign over the four semantics-preserving mutators.
    pub fn new(pipeline: &'p ShadowPipeline) -> Self {
        Self {
            pipeline,
            kit: MutationKit::new(),
            mutators: vec![
                MutatorKind::Synonym,
                MutatorKind::AbstractionElevation,
                MutatorKind::IntentReframing,
                MutatorKind::CapabilityEuphemism,
            ],
        }
    }

    /// Include the structural and context mutators as well.
    pub fn with_all_mutators(mut self) -> Self {
        self.mutators = MutatorKind::ALL.to_vec();
        self
    }

    /// Mutate every hostile anchor and require REJECT throughout.
    pub fn run_hostile(&self) -> Result<CampaignReport, DecisionError> {
        self.run("hostile-anchors", HOSTILE_ANCHORS, Verdict::Reject)
    }

    /// Mutate the safe corpus; admissions are expected but not
    /// required, so only the probe log is interesting here.
    pub fn run_safe(&self) -> Result<CampaignReport, DecisionError> {
        self.run("safe-anchors", SAFE_ANCHORS, Verdict::Admit)
    }

    fn run(
        &self,
        campaign: &str,
        anchors: &[&str],
        canonical: Verdict,
    ) -> Result<CampaignReport, DecisionError> {
        let mut probes = Vec::new();
        let mut per_mutator: BTreeMap<MutatorKind, MutatorStats> = BTreeMap::new();
        let mut silent_admits = Vec::new();

        for (anchor_idx, anchor) in anchors.iter().enumerate() {
            for &mutator in &self.mutators {
                for sample_index in 0..SAMPLES_PER_MUTATOR {
                    let mutation = self.kit.apply(mutator, anchor, None, sample_index);
                    let request = DecisionRequest {
                        request_id: format!(
                            "campaign:{campaign}:{anchor_idx}:{mutator:?}:{sample_index}"
                        ),
                        intents: vec![WireIntent {
                            id: "i0".to_string(),
                            action: String::new(),
                            target: String::new(),
                            requirements: None,
                            trigger: None,
                        }],
                        context: None,
                        raw_input: Some(mutation.output.clone()),
                        canonical_verdict: canonical,
                    };
                    let decision = self.pipeline.decide(&request)?;

                    let stats = per_mutator.entry(mutator).or_default();
                    stats.probes += 1;
                    match decision.shadow_verdict {
                        Verdict::Reject => stats.rejected += 1,
                        Verdict::Admit => stats.admitted += 1,
                    }

                    let probe = CampaignProbe {
                        anchor: anchor.to_string(),
                        mutator,
                        sample_index,
                        variant: mutation.output,
                        verdict: decision.shadow_verdict,
                        escalated: decision.escalated,
                    };
                    if canonical == Verdict::Reject && decision.shadow_verdict == Verdict::Admit {
                        warn!(
                            anchor = probe.anchor.as_str(),
                            variant = probe.variant.as_str(),
                            "silent admit under mutation"
                        );
                        silent_admits.push(probe.clone());
                    }
                    probes.push(probe);
                }
            }
        }

        info!(
            campaign,
            probes = probes.len(),
            silent_admits = silent_admits.len(),
            "stress campaign complete"
        );
        Ok(CampaignReport {
            campaign: campaign.to_string(),
            probes,
            per_mutator,
            silent_admits,
        })
    }
}
