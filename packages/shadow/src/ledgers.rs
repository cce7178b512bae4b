//! Olympus-Shadow: Shadow Ledgers
//!
//! Two append-only views of the same attribution stream: the
//! shadow-diff ledger (raw attributions plus campaign aggregates) and
//! the attribution ledger under the VAL-1 schema namespace. Both
//! share the global audit chain.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use olympus_ledger::{flush_chain, AppendOnlyLedger, AuditChain, LedgerError, OlympusHome};

use crate::types::{Attribution, Verdict, VerdictClass};

/// Attribution wrapped in the VAL-1 schema namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespacedAttribution {
    /// Schema namespace tag
    pub schema: String,
    pub record: Attribution,
}

impl NamespacedAttribution {
    pub const SCHEMA: &'static str = "VAL-1";

    pub fn new(record: Attribution) -> Self {
        Self {
            schema: Self::SCHEMA.to_string(),
            record,
        }
    }
}

/// Campaign aggregates over the shadow-diff ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowSummary {
    pub total: usize,
    pub agreements: usize,
    pub shadow_stricter: usize,
    pub shadow_more_permissive: usize,
    pub critical_misses: usize,
    /// Hostile requests the shadow pipeline admitted: must stay zero
    pub silent_admits: usize,
}

/// The shadow ledger pair plus the shared audit chain.
pub struct ShadowLedgers {
    home: OlympusHome,
    chain: Arc<Mutex<AuditChain>>,
    shadow_diff: AppendOnlyLedger<Attribution>,
    attribution: AppendOnlyLedger<NamespacedAttribution>,
}

impl ShadowLedgers {
    /// Open both ledgers under the given home directory.
    pub fn open(home: OlympusHome) -> Result<Self, LedgerError> {
        home.ensure()?;
        let chain = Arc::new(Mutex::new(AuditChain::new()));
        let shadow_diff =
            AppendOnlyLedger::open("shadow-diff", home.shadow_diff(), chain.clone())?;
        let attribution =
            AppendOnlyLedger::open("attribution", home.attribution(), chain.clone())?;
        Ok(Self {
            home,
            chain,
            shadow_diff,
            attribution,
        })
    }

    /// Append a decided attribution to both ledgers and persist the
    /// chain.
    pub fn record(&mut self, attribution: Attribution) -> Result<(), LedgerError> {
        self.shadow_diff.append(attribution.clone())?;
        self.attribution
            .append(NamespacedAttribution::new(attribution))?;
        flush_chain(&self.chain.lock(), &self.home.audit_chain())?;
        Ok(())
    }

    pub fn attributions(&self) -> &[Attribution] {
        self.shadow_diff.entries()
    }

    /// Look up the stored attribution for a request id.
    pub fn find(&self, request_id: &str) -> Option<&Attribution> {
        self.shadow_diff
            .entries()
            .iter()
            .find(|a| a.request_id == request_id)
    }

    pub fn verify_chain(&self) -> Result<(), LedgerError> {
        self.shadow_diff.verify_chain()
    }

    /// Compute the campaign aggregates.
    pub fn summary(&self) -> ShadowSummary {
        let entries = self.shadow_diff.entries();
        let count =
            |class: VerdictClass| entries.iter().filter(|a| a.verdict_class == class).count();
        ShadowSummary {
            total: entries.len(),
            agreements: count(VerdictClass::S1),
            shadow_stricter: count(VerdictClass::S2) + count(VerdictClass::S2Pending),
            shadow_more_permissive: count(VerdictClass::S3) + count(VerdictClass::S3Pending),
            critical_misses: count(VerdictClass::S4),
            silent_admits: entries
                .iter()
                .filter(|a| {
                    a.verdict_class == VerdictClass::S4 && a.shadow_verdict == Verdict::Admit
                })
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn attribution(request_id: &str, class: VerdictClass) -> Attribution {
        Attribution {
            request_id: request_id.to_string(),
            timestamp: Utc::now(),
            corpus_version: "1.0.0".to_string(),
            causal_layer: "AGREEMENT".to_string(),
            first_divergence_stage: None,
            divergence: None,
            rule_emissions: vec![],
            stage_trace: vec![],
            verdict_class: class,
            shadow_verdict: Verdict::Reject,
            canonical_verdict: Verdict::Reject,
            causal_chain: vec![],
            counterfactual: None,
            replay_hash: "00".to_string(),
        }
    }

    #[test]
    fn test_record_appends_to_both_ledgers() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledgers = ShadowLedgers::open(OlympusHome::at(dir.path())).unwrap();
        ledgers
            .record(attribution("r-1", VerdictClass::S1))
            .unwrap();
        assert_eq!(ledgers.attributions().len(), 1);
        assert!(dir.path().join("shadow-diff.json").exists());
        assert!(dir.path().join("attribution.json").exists());
        assert!(dir.path().join("audit-chain.json").exists());
        ledgers.verify_chain().unwrap();
    }

    #[test]
    fn test_summary_counts_classes() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledgers = ShadowLedgers::open(OlympusHome::at(dir.path())).unwrap();
        ledgers.record(attribution("r-1", VerdictClass::S1)).unwrap();
        ledgers
            .record(attribution("r-2", VerdictClass::S2Pending))
            .unwrap();
        let summary = ledgers.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.agreements, 1);
        assert_eq!(summary.shadow_stricter, 1);
        assert_eq!(summary.silent_admits, 0);
    }

    #[test]
    fn test_find_by_request_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledgers = ShadowLedgers::open(OlympusHome::at(dir.path())).unwrap();
        ledgers.record(attribution("r-1", VerdictClass::S1)).unwrap();
        assert!(ledgers.find("r-1").is_some());
        assert!(ledgers.find("r-9").is_none());
    }
}
