//! Olympus-Shadow: Pending-Review Queue
//!
//! Shadow/canonical divergences and oracle disagreements escalate to
//! human review. The queue is append-only: an item is resolved by
//! appending a resolution record that upgrades the pending verdict
//! class, never by touching the original entry.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use olympus_ledger::{AppendOnlyLedger, AuditChain, LedgerError, OlympusHome};

use crate::types::{Attribution, VerdictClass};

/// Why an item landed in review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    ShadowStricter,
    ShadowMorePermissive,
    OracleDisagreement,
    OracleVeto,
}

/// One queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReviewEntry {
    pub request_id: String,
    pub reason: ReviewReason,
    /// Class at enqueue time (S2_PENDING / S3_PENDING / S1 for pure
    /// oracle escalations)
    pub pending_class: VerdictClass,
    pub created_at: DateTime<Utc>,
}

/// A recorded resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    pub request_id: String,
    /// Did the review uphold the shadow verdict?
    pub shadow_was_right: bool,
    /// Class the pending entry resolves to
    pub resolved_class: VerdictClass,
    pub resolved_at: DateTime<Utc>,
}

/// Queue errors.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("no pending review for request {0}")]
    UnknownRequest(String),

    #[error("request {0} is already resolved")]
    AlreadyResolved(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Union of pending and resolution records, persisted as one
/// append-only stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewEvent {
    Pending(PendingReviewEntry),
    Resolution(ResolutionRecord),
}

/// The review queue over its persisted event stream.
pub struct ReviewQueue {
    events: AppendOnlyLedger<ReviewEvent>,
}

impl ReviewQueue {
    pub fn open(home: &OlympusHome, chain: Arc<Mutex<AuditChain>>) -> Result<Self, LedgerError> {
        home.ensure()?;
        let events = AppendOnlyLedger::open("pending-reviews", home.pending_reviews(), chain)?;
        Ok(Self { events })
    }

    /// Enqueue the review an attribution calls for, if any.
    pub fn enqueue_for(&mut self, attribution: &Attribution) -> Result<bool, LedgerError> {
        let reason = match attribution.verdict_class {
            VerdictClass::S2Pending => ReviewReason::ShadowStricter,
            VerdictClass::S3Pending => ReviewReason::ShadowMorePermissive,
            VerdictClass::S4 => ReviewReason::ShadowMorePermissive,
            _ => return Ok(false),
        };
        self.enqueue(PendingReviewEntry {
            request_id: attribution.request_id.clone(),
            reason,
            pending_class: attribution.verdict_class,
            created_at: Utc::now(),
        })?;
        Ok(true)
    }

    /// Enqueue an explicit entry (oracle escalations use this).
    pub fn enqueue(&mut self, entry: PendingReviewEntry) -> Result<(), LedgerError> {
        info!(request_id = %entry.request_id, reason = ?entry.reason, "review enqueued");
        self.events.append(ReviewEvent::Pending(entry))?;
        Ok(())
    }

    /// Resolve a pending item. The pending entry is superseded, not
    /// mutated.
    ///
    /// A stricter shadow upheld resolves to agreement; overturned it
    /// is a confirmed false positive (S2). A more permissive shadow
    /// upheld also resolves to agreement; overturned it is a confirmed
    /// false negative (S3).
    pub fn resolve(
        &mut self,
        request_id: &str,
        shadow_was_right: bool,
    ) -> Result<ResolutionRecord, ReviewError> {
        let pending = self
            .pending_for(request_id)
            .ok_or_else(|| match self.resolution_for(request_id) {
                Some(_) => ReviewError::AlreadyResolved(request_id.to_string()),
                None => ReviewError::UnknownRequest(request_id.to_string()),
            })?;

        let resolved_class = match (pending.pending_class, shadow_was_right) {
            (_, true) => VerdictClass::S1,
            (VerdictClass::S2Pending, false) => VerdictClass::S2,
            (VerdictClass::S3Pending, false) => VerdictClass::S3,
            (other, false) => other,
        };

        let record = ResolutionRecord {
            request_id: request_id.to_string(),
            shadow_was_right,
            resolved_class,
            resolved_at: Utc::now(),
        };
        self.events.append(ReviewEvent::Resolution(record.clone()))?;
        info!(request_id, ?resolved_class, "review resolved");
        Ok(record)
    }

    /// Pending items with no later resolution, in enqueue order.
    pub fn open_items(&self) -> Vec<&PendingReviewEntry> {
        self.events
            .entries()
            .iter()
            .filter_map(|e| match e {
                ReviewEvent::Pending(p) => Some(p),
                ReviewEvent::Resolution(_) => None,
            })
            .filter(|p| self.resolution_for(&p.request_id).is_none())
            .collect()
    }

    fn pending_for(&self, request_id: &str) -> Option<&PendingReviewEntry> {
        if self.resolution_for(request_id).is_some() {
            return None;
        }
        self.events.entries().iter().find_map(|e| match e {
            ReviewEvent::Pending(p) if p.request_id == request_id => Some(p),
            _ => None,
        })
    }

    fn resolution_for(&self, request_id: &str) -> Option<&ResolutionRecord> {
        self.events.entries().iter().find_map(|e| match e {
            ReviewEvent::Resolution(r) if r.request_id == request_id => Some(r),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Verdict;
    use chrono::Utc;

    fn attribution(request_id: &str, class: VerdictClass) -> Attribution {
        Attribution {
            request_id: request_id.to_string(),
            timestamp: Utc::now(),
            corpus_version: "1.0.0".to_string(),
            causal_layer: "HCA1_ANALYZER".to_string(),
            first_divergence_stage: None,
            divergence: None,
            rule_emissions: vec![],
            stage_trace: vec![],
            verdict_class: class,
            shadow_verdict: Verdict::Reject,
            canonical_verdict: Verdict::Admit,
            causal_chain: vec![],
            counterfactual: None,
            replay_hash: "00".to_string(),
        }
    }

    fn queue(dir: &tempfile::TempDir) -> ReviewQueue {
        let home = OlympusHome::at(dir.path());
        let chain = Arc::new(Mutex::new(AuditChain::new()));
        ReviewQueue::open(&home, chain).unwrap()
    }

    #[test]
    fn test_pending_classes_enqueue() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = queue(&dir);
        assert!(q.enqueue_for(&attribution("r-1", VerdictClass::S2Pending)).unwrap());
        assert!(!q.enqueue_for(&attribution("r-2", VerdictClass::S1)).unwrap());
        assert_eq!(q.open_items().len(), 1);
    }

    #[test]
    fn test_resolution_upgrades_class() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = queue(&dir);
        q.enqueue_for(&attribution("r-1", VerdictClass::S2Pending)).unwrap();

        let record = q.resolve("r-1", false).unwrap();
        assert_eq!(record.resolved_class, VerdictClass::S2);
        assert!(q.open_items().is_empty());
    }

    #[test]
    fn test_upheld_shadow_resolves_to_agreement() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = queue(&dir);
        q.enqueue_for(&attribution("r-1", VerdictClass::S3Pending)).unwrap();
        let record = q.resolve("r-1", true).unwrap();
        assert_eq!(record.resolved_class, VerdictClass::S1);
    }

    #[test]
    fn test_double_resolution_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = queue(&dir);
        q.enqueue_for(&attribution("r-1", VerdictClass::S2Pending)).unwrap();
        q.resolve("r-1", false).unwrap();
        assert!(matches!(
            q.resolve("r-1", false),
            Err(ReviewError::AlreadyResolved(_))
        ));
        assert!(matches!(
            q.resolve("r-9", false),
            Err(ReviewError::UnknownRequest(_))
        ));
    }

    #[test]
    fn test_queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let home = OlympusHome::at(dir.path());
        let chain = Arc::new(Mutex::new(AuditChain::new()));
        {
            let mut q = ReviewQueue::open(&home, chain.clone()).unwrap();
            q.enqueue_for(&attribution("r-1", VerdictClass::S2Pending)).unwrap();
        }
        let q = ReviewQueue::open(&home, chain).unwrap();
        assert_eq!(q.open_items().len(), 1);
    }
}
