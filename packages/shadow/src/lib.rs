//! Olympus-Shadow: Shadow Safety Pipeline
//!
//! Classifies natural-language intents as ADMIT or REJECT through a
//! fixed ordered chain of analyzers, attributes every verdict to a
//! first divergence point and a minimal causal rule set, and evolves
//! the candidate rule corpus through stress campaigns and
//! cluster-saturation under meta-invariants.
//!
//! Stage order is frozen:
//! `PROVENANCE → IAL_ALIGNMENT → HIA_INDICATORS → HCA1_ANALYZER →
//! PIL_INVARIANTS → HIC_COMPOSITE`.
//!
//! A decision is a pure function of (request, frozen corpus,
//! append-only history); no randomness, no clocks in verdict logic.

pub mod analyzer;
pub mod attribution;
pub mod campaign;
pub mod cluster;
pub mod graph;
pub mod invariants;
pub mod ledgers;
pub mod mutation;
pub mod oracle;
pub mod pipeline;
pub mod review;
pub mod saturation;
pub mod types;
pub mod unknown;

// Re-exports
pub use analyzer::{CapabilityAnalyzer, CapabilityMatch, CapabilityReport};
pub use attribution::{attribute, StageOutcome};
pub use campaign::{CampaignProbe, CampaignReport, MutatorStats, StressCampaign};
pub use cluster::{Cluster, ClusterBasis, ClusterConfig, ClusterEngine, UnknownSample};
pub use graph::{AuthorityGraph, Edge, EdgeType, GraphBuilder, Node, NodeType};
pub use invariants::{InvariantViolation, PowerInvariantChecker};
pub use ledgers::{ShadowLedgers, ShadowSummary};
pub use mutation::{Mutation, MutationKit, MutatorKind};
pub use ledgers::NamespacedAttribution;
pub use oracle::{
    cross_check, standard_cross_check, CrossCheckOutcome, CrossCheckResult, InvariantContext,
    Oracle, OracleReport, OracleVerdict, PendingResolution, StatisticalOracle, SymbolicOracle,
    TemporalRegressionOracle,
};
pub use pipeline::{Decision, DecisionError, ShadowPipeline};
pub use review::{
    PendingReviewEntry, ResolutionRecord, ReviewError, ReviewQueue, ReviewReason,
};
pub use saturation::{SaturationConfig, SaturationEngine, SaturationOutcome};
pub use types::{
    Attribution, CausalLink, Counterfactual, DecisionRequest, DivergenceKind, InputError,
    PipelineStage, StageTraceEntry, Verdict, VerdictClass, WireIntent,
};
pub use unknown::{
    ClassifiedAction, Classification, IntentClass, UnknownIntentDetector, HOSTILE_THRESHOLD,
    SAFE_THRESHOLD,
};
