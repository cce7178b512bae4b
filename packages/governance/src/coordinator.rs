//! Olympus-Governance: Build Coordinator
//!
//! Sequences one build through the governance loop: causal validation
//! feeds the score, topology may override it, selection picks the
//! shippable subset, fates are assigned under the evolution rules, and
//! the gradient engine plans at most one repair when the build fails.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, info_span, warn};

use crate::causal::IntentCausalChain;
use crate::convergence::ConvergenceContract;
use crate::debt::DebtLedger;
use crate::fate::{EvolutionError, FateEngine, FateEntry, FateRecord, FateThresholds};
use crate::gradient::{GradientEngine, GradientOutcome};
use crate::ledgers::GovernanceLedgers;
use crate::selection::{IntentMetrics, SelectionConstraints, SelectionEngine, SelectionResult};
use crate::topology::{IntentNode, NoopPolicyHook, PolicyHook, TopologyReport};
use crate::wissd::{self, WissdReport, WissdStatus};
use olympus_ledger::LedgerError;

/// Input for one build.
#[derive(Debug, Clone)]
pub struct BuildInput {
    pub build_id: String,
    /// Validated causal chains, one per extracted intent
    pub chains: Vec<IntentCausalChain>,
    /// Governance metrics, one per intent
    pub metrics: Vec<IntentMetrics>,
    /// Per-intent trust (anchor-derived); defaults to 1.0 when absent
    pub trust: BTreeMap<String, f64>,
}

/// Overall build status after every stage has spoken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BuildStatus {
    Ship,
    Warning,
    Fail,
    /// Topology declared the intent set contradictory
    Contradictory,
    /// An evolution or monotonicity rule hard-failed the build
    Blocked,
}

/// Everything one build produced.
#[derive(Debug)]
pub struct BuildOutcome {
    pub build_id: String,
    pub report: WissdReport,
    pub topology: TopologyReport,
    pub selection: SelectionResult,
    pub fates: FateEntry,
    pub gradient: GradientOutcome,
    pub status: BuildStatus,
    /// One sentence on what blocks the build, when anything does
    pub blocker: Option<String>,
}

/// Coordinator errors. Evolution violations mark the build BLOCKED.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Evolution(#[from] EvolutionError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// The build coordinator.
pub struct BuildCoordinator {
    fate_engine: FateEngine,
    selection_engine: SelectionEngine,
    gradient_engine: GradientEngine,
}

impl Default for BuildCoordinator {
    fn default() -> Self {
        Self::new(FateThresholds::default(), SelectionConstraints::default())
    }
}

impl BuildCoordinator {
    pub fn new(thresholds: FateThresholds, constraints: SelectionConstraints) -> Self {
        Self {
            fate_engine: FateEngine::new(thresholds),
            selection_engine: SelectionEngine::new(constraints),
            gradient_engine: GradientEngine::new(),
        }
    }

    /// Run one build with the default (no-op) policy hook.
    pub fn run(
        &self,
        input: &BuildInput,
        previous_fates: &[FateRecord],
        contracts: &mut BTreeMap<String, ConvergenceContract>,
        debts: &DebtLedger,
    ) -> Result<BuildOutcome, CoordinatorError> {
        self.run_with_policy(input, previous_fates, contracts, debts, &NoopPolicyHook)
    }

    /// Run one build.
    pub fn run_with_policy(
        &self,
        input: &BuildInput,
        previous_fates: &[FateRecord],
        contracts: &mut BTreeMap<String, ConvergenceContract>,
        debts: &DebtLedger,
        policy_hook: &dyn PolicyHook,
    ) -> Result<BuildOutcome, CoordinatorError> {
        let span = info_span!("build", build_id = %input.build_id);
        let _guard = span.enter();

        let report = wissd::compute(&input.chains);
        let topology = crate::topology::evaluate(&topology_nodes(input), policy_hook);
        let selection = self.selection_engine.select(&input.metrics);

        let fate_inputs: Vec<(IntentMetrics, bool, f64)> = input
            .metrics
            .iter()
            .map(|m| {
                let selected = selection.selected.contains(&m.intent_id);
                let trust = input.trust.get(&m.intent_id).copied().unwrap_or(1.0);
                (m.clone(), selected, trust)
            })
            .collect();

        let fates = match self
            .fate_engine
            .classify_build(&input.build_id, &fate_inputs, previous_fates)
        {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "build blocked by evolution rules");
                return Err(err.into());
            }
        };

        let gradient =
            self.gradient_engine
                .plan_repair(&report, &input.chains, contracts, debts);

        let status = if topology.should_block_proceed {
            BuildStatus::Contradictory
        } else {
            match report.status {
                WissdStatus::Ship if selection.allows_ship => BuildStatus::Ship,
                WissdStatus::Ship | WissdStatus::Warning => BuildStatus::Warning,
                WissdStatus::Fail => BuildStatus::Fail,
            }
        };

        let blocker = match status {
            BuildStatus::Contradictory => topology
                .violations
                .first()
                .map(|v| format!("contradictory intent set: {}", v.detail)),
            BuildStatus::Fail => Some(match (&report.critical_blocker, &gradient.plan) {
                (Some(critical), _) => critical.clone(),
                (None, Some(plan)) => format!(
                    "score {} below the hard-fail line; next repair targets {} axis {:?}",
                    report.score, plan.intent_id, plan.axis
                ),
                (None, None) => format!("score {} below the hard-fail line", report.score),
            }),
            BuildStatus::Warning if !selection.allows_ship => {
                Some("governance constraints do not allow shipping".to_string())
            }
            _ => None,
        };

        info!(?status, score = report.score, "build complete");
        Ok(BuildOutcome {
            build_id: input.build_id.clone(),
            report,
            topology,
            selection,
            fates,
            gradient,
            status,
            blocker,
        })
    }

    /// Run a build and persist fates, debts and convergence state.
    pub fn run_and_record(
        &self,
        input: &BuildInput,
        ledgers: &mut GovernanceLedgers,
        contracts: &mut BTreeMap<String, ConvergenceContract>,
    ) -> Result<BuildOutcome, CoordinatorError> {
        let previous: Vec<FateRecord> = ledgers.latest_fates().into_values().collect();
        let debts = ledgers.load_debts();
        let debt_offset = debts.records().len();

        let outcome = self.run(input, &previous, contracts, &debts)?;

        ledgers.record_fates(outcome.fates.clone())?;
        ledgers.record_debts(&debts, debt_offset)?;
        ledgers.record_convergence(&input.build_id, contracts)?;
        Ok(outcome)
    }
}

/// Derive topology nodes from the chains and metrics.
fn topology_nodes(input: &BuildInput) -> Vec<IntentNode> {
    input
        .chains
        .iter()
        .map(|chain| {
            let metrics = input
                .metrics
                .iter()
                .find(|m| m.intent_id == chain.intent.id);
            IntentNode {
                intent_id: chain.intent.id.clone(),
                priority: chain.intent.priority,
                state_keys: chain.bound_state.iter().cloned().collect(),
                external_anchors: chain
                    .axes
                    .outcome
                    .external
                    .is_some()
                    .then(|| format!("anchor:{}", chain.intent.id))
                    .into_iter()
                    .collect(),
                exclusive_resources: Vec::new(),
                security_level: None,
                availability_level: None,
                latency_budget_ms: metrics.map(|m| m.complexity * 100.0).unwrap_or(0.0),
                throughput_rps: 0.0,
                guarantees: Vec::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::causal::{AxisScores, ChainConfidence, OutcomeScore};
    use crate::intent::{IntentCategory, IntentPriority, IntentSource, IntentSpec};
    use olympus_ledger::OlympusHome;

    fn chain(id: &str, priority: IntentPriority, raw_axes: [f64; 4]) -> IntentCausalChain {
        let mut c = IntentCausalChain {
            intent: IntentSpec {
                id: id.to_string(),
                requirement: "req".to_string(),
                category: IntentCategory::Interaction,
                priority,
                source: IntentSource::Scope,
                expected_trigger: None,
                expected_state: None,
                expected_outcome: None,
            },
            axes: AxisScores {
                trigger: raw_axes[0],
                state: raw_axes[1],
                effect: raw_axes[2],
                outcome: OutcomeScore::internal_only(raw_axes[3]),
            },
            raw_score: 0.0,
            weighted_score: 0.0,
            satisfied: false,
            confidence: ChainConfidence::High,
            gaps: vec![],
            bound_file: None,
            bound_handler: None,
            bound_state: Some(format!("{}State", id.to_lowercase())),
        };
        c.rescore();
        c
    }

    fn metrics(id: &str, priority: IntentPriority, uvd: f64, cost: f64) -> IntentMetrics {
        IntentMetrics {
            intent_id: id.to_string(),
            priority,
            uvd,
            complexity: cost,
            external_anchors: cost,
            coupling: cost,
            trust_deficit: cost,
            stability_impact: cost,
            dependency: 0.0,
            user_facing: 0.0,
        }
    }

    fn passing_input(build_id: &str) -> BuildInput {
        BuildInput {
            build_id: build_id.to_string(),
            chains: vec![
                chain("INT-001", IntentPriority::Critical, [1.0, 1.0, 1.0, 1.0]),
                chain("INT-002", IntentPriority::High, [1.0, 1.0, 1.0, 1.0]),
            ],
            metrics: vec![
                metrics("INT-001", IntentPriority::Critical, 0.9, 0.2),
                metrics("INT-002", IntentPriority::High, 0.8, 0.2),
            ],
            trust: BTreeMap::new(),
        }
    }

    #[test]
    fn test_clean_build_ships() {
        let coordinator = BuildCoordinator::default();
        let mut contracts = BTreeMap::new();
        let outcome = coordinator
            .run(&passing_input("build-1"), &[], &mut contracts, &DebtLedger::new())
            .unwrap();
        assert_eq!(outcome.status, BuildStatus::Ship);
        assert!(outcome.blocker.is_none());
        assert!(!outcome.gradient.ran);
    }

    #[test]
    fn test_failing_build_plans_one_repair() {
        let mut input = passing_input("build-1");
        input.chains[1] = chain("INT-002", IntentPriority::High, [1.0, 1.0, 1.0, 0.0]);
        let coordinator = BuildCoordinator::default();
        let mut contracts = BTreeMap::new();
        let outcome = coordinator
            .run(&input, &[], &mut contracts, &DebtLedger::new())
            .unwrap();
        assert_eq!(outcome.status, BuildStatus::Fail);
        assert!(outcome.gradient.ran);
        assert_eq!(
            outcome.gradient.plan.as_ref().map(|p| p.intent_id.as_str()),
            Some("INT-002")
        );
        assert!(outcome.blocker.is_some());
    }

    #[test]
    fn test_run_and_record_persists_ledgers() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledgers = GovernanceLedgers::open(OlympusHome::at(dir.path())).unwrap();
        let coordinator = BuildCoordinator::default();
        let mut contracts = BTreeMap::new();

        let outcome = coordinator
            .run_and_record(&passing_input("build-1"), &mut ledgers, &mut contracts)
            .unwrap();
        assert_eq!(outcome.status, BuildStatus::Ship);
        assert_eq!(ledgers.fate_entries().len(), 1);
        assert!(ledgers.latest_convergence().is_some());
        ledgers.verify_chain().unwrap();
    }

    #[test]
    fn test_forbidden_selection_blocks_build() {
        use crate::fate::{FateRecord, IntentFate};
        let coordinator = BuildCoordinator::default();
        let mut contracts = BTreeMap::new();
        let previous = vec![FateRecord {
            intent_id: "INT-001".to_string(),
            fate: IntentFate::Forbidden,
            previous: None,
            strikes: 3,
            quarantine_reason: None,
            trust: 0.9,
        }];
        let err = coordinator.run(
            &passing_input("build-2"),
            &previous,
            &mut contracts,
            &DebtLedger::new(),
        );
        assert!(matches!(
            err,
            Err(CoordinatorError::Evolution(
                EvolutionError::ForbiddenSelected(_)
            ))
        ));
    }
}
