//! Olympus-Ledger: Home Directory Resolution
//!
//! All persisted files live under `$OLYMPUS_HOME` (default
//! `.olympus/`). The variable is read once when the handle is built.

use std::path::{Path, PathBuf};

/// Environment variable overriding the ledger directory.
pub const HOME_ENV: &str = "OLYMPUS_HOME";

/// Default directory when the variable is unset.
pub const DEFAULT_HOME: &str = ".olympus";

/// Resolved home directory handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OlympusHome {
    root: PathBuf,
}

impl OlympusHome {
    /// Resolve from the environment, falling back to `.olympus/`.
    pub fn from_env() -> Self {
        let root = std::env::var_os(HOME_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HOME));
        Self { root }
    }

    /// Use an explicit directory (tests, embedding).
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory if missing.
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    pub fn shadow_diff(&self) -> PathBuf {
        self.root.join("shadow-diff.json")
    }

    pub fn attribution(&self) -> PathBuf {
        self.root.join("attribution.json")
    }

    pub fn intent_fates(&self) -> PathBuf {
        self.root.join("intent-fates.json")
    }

    pub fn reality_policies(&self) -> PathBuf {
        self.root.join("reality-policies.json")
    }

    pub fn convergence_state(&self) -> PathBuf {
        self.root.join("convergence-state.json")
    }

    pub fn debt_ledger(&self) -> PathBuf {
        self.root.join("debt-ledger.json")
    }

    pub fn pending_reviews(&self) -> PathBuf {
        self.root.join("pending-reviews.json")
    }

    pub fn audit_chain(&self) -> PathBuf {
        self.root.join("audit-chain.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_home() {
        let home = OlympusHome::at("/tmp/olympus-test");
        assert_eq!(home.shadow_diff(), PathBuf::from("/tmp/olympus-test/shadow-diff.json"));
        assert_eq!(home.debt_ledger(), PathBuf::from("/tmp/olympus-test/debt-ledger.json"));
    }

    #[test]
    fn test_default_home_is_dot_olympus() {
        // Only checks the fallback constant; the env var itself is
        // process-global and not touched here.
        assert_eq!(DEFAULT_HOME, ".olympus");
    }
}
