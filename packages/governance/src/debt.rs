//! Olympus-Governance: Debt Ledger
//!
//! Append-only list of per-intent debts. Resolution never mutates a
//! prior entry: it appends a resolving record that supersedes reads.

use serde::{Deserialize, Serialize};

use crate::convergence::Axis;

/// One debt entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtRecord {
    pub intent_id: String,
    pub attempt_no: u32,
    /// Axes below full score when the debt was taken
    pub missing_axes: Vec<Axis>,
    /// Score shortfall the debt represents
    pub delta_score: f64,
    pub resolved: bool,
}

/// The append-only ledger with running aggregates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebtLedger {
    records: Vec<DebtRecord>,
}

impl DebtLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<DebtRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[DebtRecord] {
        &self.records
    }

    /// Take on a new debt.
    pub fn incur(&mut self, record: DebtRecord) {
        self.records.push(record);
    }

    /// Resolve an intent's outstanding debt by appending a resolving
    /// record. No prior entry changes.
    pub fn resolve(&mut self, intent_id: &str, attempt_no: u32) {
        self.records.push(DebtRecord {
            intent_id: intent_id.to_string(),
            attempt_no,
            missing_axes: Vec::new(),
            delta_score: 0.0,
            resolved: true,
        });
    }

    /// Is the intent's latest entry a resolution?
    pub fn is_resolved(&self, intent_id: &str) -> bool {
        self.records
            .iter()
            .rev()
            .find(|r| r.intent_id == intent_id)
            .map(|r| r.resolved)
            .unwrap_or(true)
    }

    /// Unresolved entries for an intent: debts taken after its latest
    /// resolution.
    pub fn unresolved_for(&self, intent_id: &str) -> usize {
        let mut count = 0;
        for record in self.records.iter().rev() {
            if record.intent_id != intent_id {
                continue;
            }
            if record.resolved {
                break;
            }
            count += 1;
        }
        count
    }

    /// Number of intents whose latest entry is unresolved.
    pub fn unresolved_count(&self) -> usize {
        let mut intent_ids: Vec<&str> = self.records.iter().map(|r| r.intent_id.as_str()).collect();
        intent_ids.sort_unstable();
        intent_ids.dedup();
        intent_ids
            .into_iter()
            .filter(|id| !self.is_resolved(id))
            .count()
    }

    /// Sum of the score shortfall across unresolved entries.
    pub fn total_debt(&self) -> f64 {
        let mut intent_ids: Vec<&str> = self.records.iter().map(|r| r.intent_id.as_str()).collect();
        intent_ids.sort_unstable();
        intent_ids.dedup();

        intent_ids
            .into_iter()
            .map(|id| {
                self.records
                    .iter()
                    .rev()
                    .filter(|r| r.intent_id == id)
                    .take_while(|r| !r.resolved)
                    .map(|r| r.delta_score)
                    .sum::<f64>()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debt(intent_id: &str, attempt_no: u32, delta: f64) -> DebtRecord {
        DebtRecord {
            intent_id: intent_id.to_string(),
            attempt_no,
            missing_axes: vec![Axis::Outcome],
            delta_score: delta,
            resolved: false,
        }
    }

    #[test]
    fn test_incur_and_resolve() {
        let mut ledger = DebtLedger::new();
        ledger.incur(debt("INT-001", 1, 0.1875));
        assert!(!ledger.is_resolved("INT-001"));
        assert_eq!(ledger.unresolved_count(), 1);

        ledger.resolve("INT-001", 2);
        assert!(ledger.is_resolved("INT-001"));
        assert_eq!(ledger.unresolved_count(), 0);
        // Resolution appended; nothing was mutated.
        assert_eq!(ledger.records().len(), 2);
        assert!(!ledger.records()[0].resolved);
    }

    #[test]
    fn test_unresolved_for_counts_since_last_resolution() {
        let mut ledger = DebtLedger::new();
        ledger.incur(debt("INT-001", 1, 0.1));
        ledger.resolve("INT-001", 2);
        ledger.incur(debt("INT-001", 3, 0.2));
        ledger.incur(debt("INT-001", 4, 0.3));
        assert_eq!(ledger.unresolved_for("INT-001"), 2);
    }

    #[test]
    fn test_total_debt_sums_unresolved() {
        let mut ledger = DebtLedger::new();
        ledger.incur(debt("INT-001", 1, 0.25));
        ledger.incur(debt("INT-002", 1, 0.5));
        ledger.resolve("INT-002", 2);
        let total = ledger.total_debt();
        assert!((total - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_intent_has_no_debt() {
        let ledger = DebtLedger::new();
        assert!(ledger.is_resolved("INT-404"));
        assert_eq!(ledger.unresolved_for("INT-404"), 0);
    }
}
