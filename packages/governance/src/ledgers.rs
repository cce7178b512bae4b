//! Olympus-Governance: Persisted Governance Ledgers
//!
//! Fate entries, debt records and convergence snapshots, all
//! append-only and chained into the shared audit log.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use olympus_ledger::{flush_chain, AppendOnlyLedger, AuditChain, LedgerError, OlympusHome};

use crate::convergence::ConvergenceContract;
use crate::debt::{DebtLedger, DebtRecord};
use crate::fate::{FateEntry, FateRecord, IntentFate};

/// Per-build convergence snapshot. Prior snapshots are never touched;
/// the latest one supersedes reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceSnapshot {
    pub build_id: String,
    pub timestamp: DateTime<Utc>,
    pub contracts: BTreeMap<String, ConvergenceContract>,
}

/// The governance ledger set.
pub struct GovernanceLedgers {
    home: OlympusHome,
    chain: Arc<Mutex<AuditChain>>,
    fates: AppendOnlyLedger<FateEntry>,
    debts: AppendOnlyLedger<DebtRecord>,
    convergence: AppendOnlyLedger<ConvergenceSnapshot>,
}

impl GovernanceLedgers {
    pub fn open(home: OlympusHome) -> Result<Self, LedgerError> {
        home.ensure()?;
        let chain = Arc::new(Mutex::new(AuditChain::new()));
        let fates = AppendOnlyLedger::open("intent-fates", home.intent_fates(), chain.clone())?;
        let debts = AppendOnlyLedger::open("debt-ledger", home.debt_ledger(), chain.clone())?;
        let convergence = AppendOnlyLedger::open(
            "convergence-state",
            home.convergence_state(),
            chain.clone(),
        )?;
        Ok(Self {
            home,
            chain,
            fates,
            debts,
            convergence,
        })
    }

    /// Append a build's fate entry.
    pub fn record_fates(&mut self, entry: FateEntry) -> Result<(), LedgerError> {
        self.fates.append(entry)?;
        self.flush_chain()
    }

    /// Append the debt records taken since the given offset.
    pub fn record_debts(&mut self, ledger: &DebtLedger, since: usize) -> Result<(), LedgerError> {
        for record in ledger.records().iter().skip(since) {
            self.debts.append(record.clone())?;
        }
        self.flush_chain()
    }

    /// Append a convergence snapshot.
    pub fn record_convergence(
        &mut self,
        build_id: &str,
        contracts: &BTreeMap<String, ConvergenceContract>,
    ) -> Result<(), LedgerError> {
        self.convergence.append(ConvergenceSnapshot {
            build_id: build_id.to_string(),
            timestamp: Utc::now(),
            contracts: contracts.clone(),
        })?;
        self.flush_chain()
    }

    /// Rebuild the in-memory debt ledger from the persisted records.
    pub fn load_debts(&self) -> DebtLedger {
        DebtLedger::from_records(self.debts.entries().to_vec())
    }

    /// Latest persisted fate per intent, across all builds.
    pub fn latest_fates(&self) -> BTreeMap<String, FateRecord> {
        let mut latest = BTreeMap::new();
        for entry in self.fates.entries() {
            for record in &entry.fates {
                latest.insert(record.intent_id.clone(), record.clone());
            }
        }
        latest
    }

    /// Latest convergence snapshot, when any build recorded one.
    pub fn latest_convergence(&self) -> Option<&ConvergenceSnapshot> {
        self.convergence.entries().last()
    }

    /// Every intent ever FORBIDDEN, for irreversibility checks.
    pub fn forbidden_intents(&self) -> Vec<String> {
        self.latest_fates()
            .into_iter()
            .filter(|(_, record)| record.fate == IntentFate::Forbidden)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn fate_entries(&self) -> &[FateEntry] {
        self.fates.entries()
    }

    pub fn verify_chain(&self) -> Result<(), LedgerError> {
        self.fates.verify_chain()
    }

    fn flush_chain(&self) -> Result<(), LedgerError> {
        flush_chain(&self.chain.lock(), &self.home.audit_chain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fate::{FateSummary, QuarantineReason};

    fn record(intent_id: &str, fate: IntentFate, strikes: u32) -> FateRecord {
        FateRecord {
            intent_id: intent_id.to_string(),
            fate,
            previous: None,
            strikes,
            quarantine_reason: (fate == IntentFate::Quarantined)
                .then_some(QuarantineReason::Other),
            trust: 0.9,
        }
    }

    fn entry(build_id: &str, records: Vec<FateRecord>) -> FateEntry {
        FateEntry {
            build_id: build_id.to_string(),
            timestamp: Utc::now(),
            fates: records,
            summary: FateSummary::default(),
            evolutions: vec![],
        }
    }

    #[test]
    fn test_latest_fate_supersedes_prior_builds() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledgers = GovernanceLedgers::open(OlympusHome::at(dir.path())).unwrap();
        ledgers
            .record_fates(entry(
                "build-1",
                vec![record("INT-001", IntentFate::Quarantined, 1)],
            ))
            .unwrap();
        ledgers
            .record_fates(entry(
                "build-2",
                vec![record("INT-001", IntentFate::Forbidden, 2)],
            ))
            .unwrap();

        let latest = ledgers.latest_fates();
        assert_eq!(latest["INT-001"].fate, IntentFate::Forbidden);
        assert_eq!(ledgers.forbidden_intents(), vec!["INT-001"]);
        ledgers.verify_chain().unwrap();
    }

    #[test]
    fn test_debt_records_persist_incrementally() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledgers = GovernanceLedgers::open(OlympusHome::at(dir.path())).unwrap();

        let mut debts = DebtLedger::new();
        debts.incur(DebtRecord {
            intent_id: "INT-001".to_string(),
            attempt_no: 1,
            missing_axes: vec![],
            delta_score: 0.25,
            resolved: false,
        });
        ledgers.record_debts(&debts, 0).unwrap();
        debts.resolve("INT-001", 2);
        ledgers.record_debts(&debts, 1).unwrap();

        let reloaded = ledgers.load_debts();
        assert_eq!(reloaded.records().len(), 2);
        assert!(reloaded.is_resolved("INT-001"));
    }

    #[test]
    fn test_convergence_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledgers = GovernanceLedgers::open(OlympusHome::at(dir.path())).unwrap();
        let mut contracts = BTreeMap::new();
        contracts.insert(
            "INT-001".to_string(),
            ConvergenceContract::new("INT-001"),
        );
        ledgers.record_convergence("build-1", &contracts).unwrap();
        let snapshot = ledgers.latest_convergence().unwrap();
        assert_eq!(snapshot.build_id, "build-1");
        assert!(snapshot.contracts.contains_key("INT-001"));
    }
}
