//! Olympus-Governance: Reality Policy Registry
//!
//! Per-anchor probe policies, versioned and read-mostly. Updates are
//! serialized through the registry lock and bump the version counter;
//! each decision captures the version it read at start.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use olympus_ledger::pretty_canonical;

/// Probe execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorMode {
    Live,
    Cached,
    Quorum,
}

/// One anchor's probe policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorPolicy {
    pub mode: AnchorMode,
    /// Required samples (quorum mode)
    pub samples: u32,
    /// Minimum success rate
    pub success_threshold: f64,
    /// Per-sample timeout
    pub timeout_ms: u64,
    /// Trust floor
    pub min_trust: f64,
    /// Payload variance ceiling
    pub variance_threshold: f64,
}

impl Default for AnchorPolicy {
    fn default() -> Self {
        Self {
            mode: AnchorMode::Live,
            samples: 5,
            success_threshold: 0.8,
            timeout_ms: 2000,
            min_trust: 0.7,
            variance_threshold: 0.1,
        }
    }
}

impl AnchorPolicy {
    /// Validate ranges. Invalid policies never enter the registry.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.samples == 0 {
            return Err(PolicyError::Validation("samples must be at least 1".into()));
        }
        for (name, value) in [
            ("success", self.success_threshold),
            ("trust", self.min_trust),
            ("variance", self.variance_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PolicyError::Validation(format!(
                    "{name} must be within [0, 1]"
                )));
            }
        }
        if self.timeout_ms == 0 {
            return Err(PolicyError::Validation("timeout must be positive".into()));
        }
        Ok(())
    }
}

/// Registry errors. `UnknownAnchor` maps to CLI exit code 3,
/// `Validation` to exit code 2.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("policy validation failed: {0}")]
    Validation(String),

    #[error("unknown anchor {0}")]
    UnknownAnchor(String),

    #[error("policy file error")]
    Io(#[from] std::io::Error),

    #[error("policy file serialization error")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct RegistryState {
    version: u64,
    policies: BTreeMap<String, AnchorPolicy>,
}

/// The versioned registry.
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    state: RwLock<RegistryState>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a persisted `reality-policies.json`, or start empty
    /// when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)?;
        let state: RegistryState = serde_json::from_str(&raw)?;
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Persist with deterministic key order and a trailing newline.
    pub fn persist(&self, path: &PathBuf) -> Result<(), PolicyError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut body = pretty_canonical(&*self.state.read())?;
        body.push('\n');
        std::fs::write(path, body)?;
        Ok(())
    }

    /// Current version counter.
    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    /// Policy for an anchor, falling back to the default.
    pub fn get(&self, anchor_id: &str) -> AnchorPolicy {
        self.state
            .read()
            .policies
            .get(anchor_id)
            .copied()
            .unwrap_or_default()
    }

    /// Policy for an anchor, erroring when the anchor is unknown.
    pub fn get_strict(&self, anchor_id: &str) -> Result<AnchorPolicy, PolicyError> {
        self.state
            .read()
            .policies
            .get(anchor_id)
            .copied()
            .ok_or_else(|| PolicyError::UnknownAnchor(anchor_id.to_string()))
    }

    /// Install or replace a policy, bumping the version.
    pub fn set(&self, anchor_id: impl Into<String>, policy: AnchorPolicy) -> Result<u64, PolicyError> {
        policy.validate()?;
        let mut state = self.state.write();
        state.policies.insert(anchor_id.into(), policy);
        state.version += 1;
        info!(version = state.version, "policy registry updated");
        Ok(state.version)
    }

    /// All anchor ids, sorted.
    pub fn anchor_ids(&self) -> Vec<String> {
        self.state.read().policies.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_bumps_version() {
        let registry = PolicyRegistry::new();
        assert_eq!(registry.version(), 0);
        registry.set("payments-api", AnchorPolicy::default()).unwrap();
        assert_eq!(registry.version(), 1);
        registry.set("payments-api", AnchorPolicy::default()).unwrap();
        assert_eq!(registry.version(), 2);
    }

    #[test]
    fn test_unknown_anchor_is_distinct_from_default() {
        let registry = PolicyRegistry::new();
        assert!(matches!(
            registry.get_strict("nope"),
            Err(PolicyError::UnknownAnchor(_))
        ));
        // The non-strict read falls back to the default policy.
        assert_eq!(registry.get("nope"), AnchorPolicy::default());
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let mut policy = AnchorPolicy::default();
        policy.success_threshold = 1.5;
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::Validation(_))
        ));
        policy.success_threshold = 0.8;
        policy.samples = 0;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reality-policies.json");
        let registry = PolicyRegistry::new();
        let mut policy = AnchorPolicy::default();
        policy.mode = AnchorMode::Quorum;
        registry.set("payments-api", policy).unwrap();
        registry.persist(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.ends_with('\n'));

        let reloaded = PolicyRegistry::load(&path).unwrap();
        assert_eq!(reloaded.version(), 1);
        assert_eq!(reloaded.get("payments-api").mode, AnchorMode::Quorum);
    }
}
