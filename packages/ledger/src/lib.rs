//! Olympus-Ledger: Append-Only History
//!
//! Canonical serialization, the tamper-evident audit chain, the
//! append-only JSON file stores, and replay verification. Every
//! persisted decision flows through this crate; nothing here mutates
//! or deletes a prior entry.

pub mod canonical;
pub mod chain;
pub mod home;
pub mod replay;
pub mod store;

// Re-exports
pub use canonical::{canonical_string, digest, digest_str, pretty_canonical};
pub use chain::{AuditChain, ChainLink, GENESIS_HASH};
pub use home::OlympusHome;
pub use replay::{replay_hash, verify_replay, ReplayReport};
pub use store::{flush_chain, AppendOnlyLedger, LedgerError};
