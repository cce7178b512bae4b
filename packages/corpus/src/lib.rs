//! Olympus-Corpus: Frozen Rule Corpus & Pattern Registry
//!
//! Single source of truth for every pattern the decision pipeline
//! consults: capability rules, exclusion clauses, semantic tags,
//! anchor corpora and indicator tables.
//!
//! The corpus is read-only after load. The only path that extends it
//! is candidate-rule admission through the meta-invariant gate
//! ([`meta::MsiGate`]), which the saturation engine drives.

pub mod anchors;
pub mod capability;
pub mod indicators;
pub mod meta;
pub mod provenance;
pub mod registry;
pub mod rule;
pub mod tags;

// Re-exports
pub use anchors::{AnchorCorpus, AnchorSet};
pub use capability::CapabilityClass;
pub use indicators::{IndicatorScan, IndicatorTable};
pub use meta::{MsiGate, MsiReport, MsiVerdict};
pub use provenance::{normalize, Provenance, ProvenanceExtractor, RawRequest};
pub use registry::{CorpusError, RuleCorpus};
pub use rule::{Rule, RuleDef, RuleEval, RuleHit, RuleKind, Severity};
pub use tags::SemanticTagMap;
