//! Olympus-Governance: Gradient-Descent Engine (IGDE)
//!
//! Runs only when W-ISS-D is below the hard-fail line. One intent, one
//! axis, one attempt per build; the actual code rewrite is delegated
//! to a pluggable generator, and the post-repair monotonicity check is
//! a hard fail when the score drops.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::causal::IntentCausalChain;
use crate::convergence::{
    Axis, ConvergenceContract, ImpossibilityProof, RepairEligibility,
};
use crate::debt::{DebtLedger, DebtRecord};
use crate::wissd::{WissdReport, HARD_FAIL_THRESHOLD};

/// Where the repair is inserted, by kind. The concrete edit belongs to
/// the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionLocation {
    ComponentMarkup,
    StateDeclaration,
    HandlerBody,
    RenderBlock,
}

impl InsertionLocation {
    pub fn for_axis(axis: Axis) -> Self {
        match axis {
            Axis::Trigger => InsertionLocation::ComponentMarkup,
            Axis::State => InsertionLocation::StateDeclaration,
            Axis::Effect => InsertionLocation::HandlerBody,
            Axis::Outcome => InsertionLocation::RenderBlock,
        }
    }
}

/// The one repair this build may perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairPlan {
    pub intent_id: String,
    pub axis: Axis,
    pub target_file: String,
    pub location: InsertionLocation,
}

/// Pluggable code emitter. The engine decides where and what axis;
/// how the code is written is not its concern.
pub trait RepairGenerator {
    fn emit(&self, plan: &RepairPlan) -> Result<(), String>;
}

/// Generator that records nothing and always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRepairGenerator;

impl RepairGenerator for NoopRepairGenerator {
    fn emit(&self, _plan: &RepairPlan) -> Result<(), String> {
        Ok(())
    }
}

/// Hard failures of the gradient loop.
#[derive(Debug, thiserror::Error)]
pub enum GradientError {
    #[error("MONOTONICITY_VIOLATION: W-ISS-D fell from {previous} to {current}")]
    MonotonicityViolation { previous: u32, current: u32 },
}

/// Outcome of planning one build's repair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientOutcome {
    /// False when the score was at or above the hard-fail line
    pub ran: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<RepairPlan>,
    /// True when the only eligible intent was order-blocked
    pub stalled: bool,
    /// Intents excluded because an axis is impossible
    pub excluded: Vec<String>,
}

/// Weight added per unresolved debt entry when ranking worst intents.
pub const DEBT_WEIGHT_UNIT: f64 = 0.25;

/// The gradient engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct GradientEngine;

impl GradientEngine {
    pub fn new() -> Self {
        Self
    }

    /// Plan at most one repair for this build.
    pub fn plan_repair(
        &self,
        report: &WissdReport,
        chains: &[IntentCausalChain],
        contracts: &mut BTreeMap<String, ConvergenceContract>,
        debts: &DebtLedger,
    ) -> GradientOutcome {
        if report.score >= HARD_FAIL_THRESHOLD {
            return GradientOutcome {
                ran: false,
                plan: None,
                stalled: false,
                excluded: Vec::new(),
            };
        }

        // Rank unsatisfied intents by effective criticality, worst
        // first; ties break by missing-axis dominance, then id.
        let mut candidates: Vec<&IntentCausalChain> =
            chains.iter().filter(|c| c.raw_score < 1.0).collect();
        candidates.sort_by(|a, b| {
            let crit_a = effective_criticality(a, debts);
            let crit_b = effective_criticality(b, debts);
            crit_b
                .partial_cmp(&crit_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| dominance_sum(b).cmp(&dominance_sum(a)))
                .then_with(|| a.intent.id.cmp(&b.intent.id))
        });

        let mut excluded = Vec::new();
        let mut stalled = false;

        for chain in candidates {
            let contract = contracts
                .entry(chain.intent.id.clone())
                .or_insert_with(|| ConvergenceContract::new(chain.intent.id.clone()));
            contract.sync_from_scores(&axis_scores(chain));

            let missing = missing_axes(chain);
            match contract.eligibility(&missing) {
                RepairEligibility::Ready(axis) => {
                    contract.begin_attempt(axis);
                    let plan = RepairPlan {
                        intent_id: chain.intent.id.clone(),
                        axis,
                        target_file: chain
                            .bound_file
                            .clone()
                            .unwrap_or_else(|| "src/App.tsx".to_string()),
                        location: InsertionLocation::for_axis(axis),
                    };
                    info!(intent = %plan.intent_id, ?axis, "repair planned");
                    return GradientOutcome {
                        ran: true,
                        plan: Some(plan),
                        stalled: false,
                        excluded,
                    };
                }
                RepairEligibility::Stalled => {
                    // The worst intent is order-blocked: the build
                    // stalls rather than skipping to a lesser intent.
                    stalled = true;
                    break;
                }
                RepairEligibility::Excluded => {
                    excluded.push(chain.intent.id.clone());
                    continue;
                }
                RepairEligibility::Done => continue,
            }
        }

        if stalled {
            debug!("gradient stalled: earliest missing axis is order-blocked");
        }
        GradientOutcome {
            ran: true,
            plan: None,
            stalled,
            excluded,
        }
    }

    /// Apply a repair result: record the attempt, enforce the
    /// monotonicity contract, and settle the debt ledger.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_result(
        &self,
        plan: &RepairPlan,
        previous_wissd: u32,
        new_wissd: u32,
        axis_delta: f64,
        new_axis_score: f64,
        new_raw_score: f64,
        contracts: &mut BTreeMap<String, ConvergenceContract>,
        debts: &mut DebtLedger,
        build_id: &str,
    ) -> Result<Option<ImpossibilityProof>, GradientError> {
        if new_wissd < previous_wissd {
            warn!(previous_wissd, new_wissd, "monotonicity violated");
            return Err(GradientError::MonotonicityViolation {
                previous: previous_wissd,
                current: new_wissd,
            });
        }

        let contract = contracts
            .entry(plan.intent_id.clone())
            .or_insert_with(|| ConvergenceContract::new(plan.intent_id.clone()));
        contract.observe_iss(new_wissd);
        let proof = contract.record_attempt(plan.axis, axis_delta, new_axis_score, build_id);
        let attempt_no = contract.attempt_history.len() as u32;

        if new_raw_score >= 1.0 {
            debts.resolve(&plan.intent_id, attempt_no);
        } else {
            debts.incur(DebtRecord {
                intent_id: plan.intent_id.clone(),
                attempt_no,
                missing_axes: vec![plan.axis],
                delta_score: 1.0 - new_raw_score,
                resolved: false,
            });
        }

        Ok(proof)
    }
}

fn axis_scores(chain: &IntentCausalChain) -> BTreeMap<Axis, f64> {
    BTreeMap::from([
        (Axis::Trigger, chain.axes.trigger),
        (Axis::State, chain.axes.state),
        (Axis::Effect, chain.axes.effect),
        (Axis::Outcome, chain.axes.outcome.combined),
    ])
}

fn missing_axes(chain: &IntentCausalChain) -> Vec<Axis> {
    axis_scores(chain)
        .into_iter()
        .filter(|(_, score)| *score < 1.0)
        .map(|(axis, _)| axis)
        .collect()
}

/// priority_weight × (1 + 0.25 × unresolved debt entries)
fn effective_criticality(chain: &IntentCausalChain, debts: &DebtLedger) -> f64 {
    let debt_weight = DEBT_WEIGHT_UNIT * debts.unresolved_for(&chain.intent.id) as f64;
    chain.intent.priority.weight() * (1.0 + debt_weight)
}

fn dominance_sum(chain: &IntentCausalChain) -> u32 {
    missing_axes(chain)
        .into_iter()
        .map(|a| a.dominance_weight())
        .sum()
}
