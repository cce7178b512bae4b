//! Olympus-Governance: Intent Governance & Gradient-Descent Loop
//!
//! Scores a generated artifact against extracted user intents on four
//! orthogonal axes, runs external reality probes under quorum and
//! trust scoring, selects a shippable subset under deterministic
//! cost/value optimization, assigns irreversible fates, and repairs at
//! most one axis of one intent per build with a monotonic-improvement
//! guarantee.
//!
//! # Structure
//!
//! - `intent`: extraction from corpus artifacts into immutable specs
//! - `causal`: per-intent trigger/state/effect/outcome binding (ICG)
//! - `wissd`: the weighted intent satisfaction score
//! - `reality` / `policy`: external anchors, quorum, trust (ERA/RGL)
//! - `topology`: the intent-interaction graph invariants (ITGCL)
//! - `selection`: deterministic subset selection (IGE)
//! - `fate`: the irreversible fate state machine
//! - `convergence` / `gradient`: contracts and gradient descent (IGDE)
//! - `debt`: the append-only debt ledger
//! - `ledgers`: persisted fate/debt/convergence stores

pub mod causal;
pub mod convergence;
pub mod coordinator;
pub mod debt;
pub mod fate;
pub mod gradient;
pub mod intent;
pub mod ledgers;
pub mod policy;
pub mod reality;
pub mod selection;
pub mod topology;
pub mod wissd;

// Re-exports
pub use causal::{
    AxisScores, CausalValidator, ChainConfidence, CodeArtifact, GapKind, IntentCausalChain,
    IntentGap, OutcomeScore,
};
pub use convergence::{
    Axis, AxisState, ContractStatus, ConvergenceContract, ImpossibilityProof, RepairEligibility,
};
pub use coordinator::{
    BuildCoordinator, BuildInput, BuildOutcome, BuildStatus, CoordinatorError,
};
pub use debt::{DebtLedger, DebtRecord};
pub use fate::{
    EvolutionError, FateEngine, FateEntry, FateEvolution, FateRecord, FateSummary, FateThresholds,
    IntentFate, QuarantineReason,
};
pub use gradient::{
    GradientEngine, GradientError, GradientOutcome, InsertionLocation, NoopRepairGenerator,
    RepairGenerator, RepairPlan,
};
pub use intent::{
    IntentCategory, IntentExtractor, IntentPriority, IntentSource, IntentSpec, SourceArtifact,
};
pub use ledgers::{ConvergenceSnapshot, GovernanceLedgers};
pub use policy::{AnchorMode, AnchorPolicy, PolicyError, PolicyRegistry};
pub use reality::{
    GovernanceFailure, QuorumResult, RealityAnchorEngine, RealityProbe, SampleResult,
    TrustPenalty,
};
pub use selection::{
    ExclusionRecord, IntentMetrics, SelectionConstraints, SelectionEngine, SelectionResult,
};
pub use topology::{
    ConflictPotential, IntentNode, NoopPolicyHook, PolicyHook, TopologyEdge, TopologyEdgeType,
    TopologyInvariant, TopologyReport, TopologyViolation, ViolationSeverity,
};
pub use wissd::{AxisAverages, WissdReport, WissdStatus};
