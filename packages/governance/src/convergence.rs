//! Olympus-Governance: Convergence Contracts
//!
//! Per-intent axis-order contracts for the gradient-descent loop. An
//! axis may only be attempted when every earlier axis in the
//! contract's order is CONVERGED; three consecutive non-improving
//! attempts on one axis make it IMPOSSIBLE and emit an immutable
//! proof.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// The four causal axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Trigger,
    State,
    Effect,
    Outcome,
}

impl Axis {
    /// Default contract order.
    pub const DEFAULT_ORDER: [Axis; 4] = [Axis::Trigger, Axis::State, Axis::Effect, Axis::Outcome];

    /// Dominance weight for worst-intent tie-breaking.
    pub fn dominance_weight(self) -> u32 {
        match self {
            Axis::Trigger => 4,
            Axis::State => 3,
            Axis::Effect => 2,
            Axis::Outcome => 1,
        }
    }
}

/// Per-axis convergence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AxisState {
    Pending,
    InProgress,
    Converged,
    Impossible,
}

/// Contract status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContractStatus {
    Active,
    Converged,
    Impossible,
    Blocked,
}

/// One repair attempt, append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_no: u32,
    pub axis: Axis,
    /// Axis-score delta the attempt produced
    pub delta: f64,
    pub build_id: String,
}

/// Immutable record of why an axis became impossible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpossibilityProof {
    pub intent_id: String,
    pub axis: Axis,
    /// The consecutive non-improving attempts that prove it
    pub attempts: Vec<AttemptRecord>,
    pub declared_in_build: String,
}

/// What the gradient engine may do with an intent this build.
#[derive(Debug, Clone, PartialEq)]
pub enum RepairEligibility {
    /// Attempt this axis
    Ready(Axis),
    /// The earliest missing axis is behind an unconverged earlier axis
    Stalled,
    /// Every axis is converged
    Done,
    /// The intent is excluded from further attempts
    Excluded,
}

/// Consecutive non-improving attempts after which an axis becomes
/// impossible.
pub const IMPOSSIBILITY_K: usize = 3;

/// Per-intent convergence contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceContract {
    pub intent_id: String,
    /// Permutation of the four axes
    pub axis_order: [Axis; 4],
    pub axis_states: BTreeMap<Axis, AxisState>,
    /// Append-only
    pub attempt_history: Vec<AttemptRecord>,
    /// Append-only W-ISS-D observations
    pub iss_history: Vec<u32>,
    pub status: ContractStatus,
}

impl ConvergenceContract {
    pub fn new(intent_id: impl Into<String>) -> Self {
        Self::with_order(intent_id, Axis::DEFAULT_ORDER)
    }

    pub fn with_order(intent_id: impl Into<String>, axis_order: [Axis; 4]) -> Self {
        let axis_states = axis_order
            .iter()
            .map(|axis| (*axis, AxisState::Pending))
            .collect();
        Self {
            intent_id: intent_id.into(),
            axis_order,
            axis_states,
            attempt_history: Vec::new(),
            iss_history: Vec::new(),
            status: ContractStatus::Active,
        }
    }

    pub fn axis_state(&self, axis: Axis) -> AxisState {
        self.axis_states.get(&axis).copied().unwrap_or(AxisState::Pending)
    }

    /// Mark pending axes with a full score as converged. InProgress
    /// and Impossible marks are deliberately left alone: an in-flight
    /// attempt only settles through [`Self::record_attempt`].
    pub fn sync_from_scores(&mut self, scores: &BTreeMap<Axis, f64>) {
        for axis in self.axis_order {
            if self.axis_state(axis) == AxisState::Pending
                && scores.get(&axis).copied().unwrap_or(0.0) >= 1.0
            {
                self.axis_states.insert(axis, AxisState::Converged);
            }
        }
        if self
            .axis_order
            .iter()
            .all(|a| self.axis_state(*a) == AxisState::Converged)
        {
            self.status = ContractStatus::Converged;
        }
    }

    /// Decide what may be attempted, given the axes currently below
    /// full score.
    ///
    /// The earliest missing axis is attempted only when every axis
    /// before it in the contract order is CONVERGED; an unconverged
    /// earlier axis stalls the intent, and an IMPOSSIBLE axis excludes
    /// it.
    pub fn eligibility(&self, missing: &[Axis]) -> RepairEligibility {
        if self.status == ContractStatus::Impossible {
            return RepairEligibility::Excluded;
        }
        let Some(target) = self
            .axis_order
            .iter()
            .copied()
            .find(|axis| missing.contains(axis))
        else {
            return RepairEligibility::Done;
        };

        for axis in self.axis_order {
            if axis == target {
                break;
            }
            match self.axis_state(axis) {
                AxisState::Converged => {}
                AxisState::Impossible => return RepairEligibility::Excluded,
                AxisState::Pending | AxisState::InProgress => {
                    return RepairEligibility::Stalled;
                }
            }
        }

        if self.axis_state(target) == AxisState::Impossible {
            return RepairEligibility::Excluded;
        }
        RepairEligibility::Ready(target)
    }

    /// Mark an axis as under repair.
    pub fn begin_attempt(&mut self, axis: Axis) {
        self.axis_states.insert(axis, AxisState::InProgress);
    }

    /// Record an attempt result. Returns an impossibility proof when
    /// the axis has just exhausted its K consecutive non-improving
    /// attempts.
    pub fn record_attempt(
        &mut self,
        axis: Axis,
        delta: f64,
        new_score: f64,
        build_id: &str,
    ) -> Option<ImpossibilityProof> {
        let attempt_no = self.attempt_history.len() as u32 + 1;
        self.attempt_history.push(AttemptRecord {
            attempt_no,
            axis,
            delta,
            build_id: build_id.to_string(),
        });

        if new_score >= 1.0 {
            self.axis_states.insert(axis, AxisState::Converged);
            if self
                .axis_order
                .iter()
                .all(|a| self.axis_state(*a) == AxisState::Converged)
            {
                self.status = ContractStatus::Converged;
            }
            debug!(intent = %self.intent_id, ?axis, "axis converged");
            return None;
        }

        self.axis_states.insert(axis, AxisState::InProgress);

        // Trailing run of non-improving attempts on this axis.
        let trailing: Vec<&AttemptRecord> = self
            .attempt_history
            .iter()
            .rev()
            .take_while(|a| a.axis == axis && a.delta <= 0.0)
            .collect();
        if trailing.len() >= IMPOSSIBILITY_K {
            self.axis_states.insert(axis, AxisState::Impossible);
            self.status = ContractStatus::Impossible;
            warn!(intent = %self.intent_id, ?axis, "axis declared impossible");
            let mut attempts: Vec<AttemptRecord> =
                trailing.into_iter().rev().cloned().collect();
            attempts.truncate(IMPOSSIBILITY_K);
            return Some(ImpossibilityProof {
                intent_id: self.intent_id.clone(),
                axis,
                attempts,
                declared_in_build: build_id.to_string(),
            });
        }
        None
    }

    /// Append a W-ISS-D observation.
    pub fn observe_iss(&mut self, score: u32) {
        self.iss_history.push(score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(trigger: f64, state: f64, effect: f64, outcome: f64) -> BTreeMap<Axis, f64> {
        BTreeMap::from([
            (Axis::Trigger, trigger),
            (Axis::State, state),
            (Axis::Effect, effect),
            (Axis::Outcome, outcome),
        ])
    }

    #[test]
    fn test_next_axis_respects_order() {
        let mut contract = ConvergenceContract::new("INT-001");
        contract.sync_from_scores(&scores(1.0, 1.0, 1.0, 0.25));
        let missing = vec![Axis::Outcome];
        assert_eq!(
            contract.eligibility(&missing),
            RepairEligibility::Ready(Axis::Outcome)
        );
    }

    #[test]
    fn test_earlier_missing_axis_comes_first() {
        let mut contract = ConvergenceContract::new("INT-001");
        contract.sync_from_scores(&scores(1.0, 0.5, 0.0, 0.25));
        let missing = vec![Axis::State, Axis::Effect, Axis::Outcome];
        assert_eq!(
            contract.eligibility(&missing),
            RepairEligibility::Ready(Axis::State)
        );
    }

    #[test]
    fn test_unconverged_earlier_axis_stalls() {
        let mut contract = ConvergenceContract::new("INT-001");
        contract.sync_from_scores(&scores(1.0, 1.0, 1.0, 0.25));
        // An in-flight repair left the effect axis marked in-progress.
        contract.begin_attempt(Axis::Effect);
        let missing = vec![Axis::Outcome];
        assert_eq!(contract.eligibility(&missing), RepairEligibility::Stalled);
    }

    #[test]
    fn test_k_non_improving_attempts_declare_impossible() {
        let mut contract = ConvergenceContract::new("INT-001");
        contract.sync_from_scores(&scores(1.0, 1.0, 1.0, 0.25));
        assert!(contract
            .record_attempt(Axis::Outcome, 0.0, 0.25, "build-1")
            .is_none());
        assert!(contract
            .record_attempt(Axis::Outcome, -0.1, 0.25, "build-2")
            .is_none());
        let proof = contract
            .record_attempt(Axis::Outcome, 0.0, 0.25, "build-3")
            .expect("third flat attempt proves impossibility");
        assert_eq!(proof.axis, Axis::Outcome);
        assert_eq!(proof.attempts.len(), 3);
        assert_eq!(contract.status, ContractStatus::Impossible);
        assert_eq!(
            contract.eligibility(&[Axis::Outcome]),
            RepairEligibility::Excluded
        );
    }

    #[test]
    fn test_improving_attempt_resets_the_run() {
        let mut contract = ConvergenceContract::new("INT-001");
        contract.sync_from_scores(&scores(1.0, 1.0, 1.0, 0.25));
        contract.record_attempt(Axis::Outcome, 0.0, 0.25, "build-1");
        contract.record_attempt(Axis::Outcome, 0.25, 0.5, "build-2");
        contract.record_attempt(Axis::Outcome, 0.0, 0.5, "build-3");
        // Only two trailing non-improving attempts: not impossible.
        assert_eq!(contract.status, ContractStatus::Active);
    }

    #[test]
    fn test_full_convergence() {
        let mut contract = ConvergenceContract::new("INT-001");
        contract.sync_from_scores(&scores(1.0, 1.0, 1.0, 0.5));
        let proof = contract.record_attempt(Axis::Outcome, 0.5, 1.0, "build-1");
        assert!(proof.is_none());
        assert_eq!(contract.status, ContractStatus::Converged);
        assert_eq!(contract.eligibility(&[]), RepairEligibility::Done);
    }
}
