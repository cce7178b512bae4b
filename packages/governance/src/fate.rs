//! Olympus-Governance: Fate State Machine
//!
//! Assigns every intent an irreversible governance fate per build and
//! validates fate evolution against the closed transition table.
//! FORBIDDEN self-loops only; a disallowed transition or a selected
//! FORBIDDEN intent is a hard fail that blocks the build.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::selection::IntentMetrics;

/// The four fates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentFate {
    #[serde(rename = "ACCEPTED")]
    Accepted,
    #[serde(rename = "ACCEPTED_WITH_DEBT")]
    AcceptedWithDebt,
    #[serde(rename = "QUARANTINED")]
    Quarantined,
    #[serde(rename = "FORBIDDEN")]
    Forbidden,
}

impl IntentFate {
    /// The closed transition table: FORBIDDEN self-loops only.
    pub fn transition_allowed(from: IntentFate, to: IntentFate) -> bool {
        match from {
            IntentFate::Forbidden => to == IntentFate::Forbidden,
            _ => true,
        }
    }
}

/// Reason an intent landed in quarantine. The first matching reason
/// wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineReason {
    UvdBelowThreshold,
    CostAboveThreshold,
    Other,
}

/// Frozen fate thresholds. Changing any is a corpus version bump.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FateThresholds {
    /// Trust below this is immediately FORBIDDEN
    pub forbidden_trust: f64,
    /// Strikes at which an excluded QUARANTINED intent turns FORBIDDEN
    pub strike_max: u32,
    /// Accepted-with-debt band over uvd: [min, max)
    pub debt_uvd_min: f64,
    pub debt_uvd_max: f64,
    /// Stability impact above this accepts with debt
    pub debt_stability_impact: f64,
    /// Quarantine reason thresholds
    pub quarantine_uvd: f64,
    pub quarantine_cost: f64,
}

impl Default for FateThresholds {
    fn default() -> Self {
        Self {
            forbidden_trust: 0.20,
            strike_max: 3,
            debt_uvd_min: 0.40,
            debt_uvd_max: 0.60,
            debt_stability_impact: 0.70,
            quarantine_uvd: 0.40,
            quarantine_cost: 0.75,
        }
    }
}

/// One intent's fate for one build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FateRecord {
    pub intent_id: String,
    pub fate: IntentFate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<IntentFate>,
    /// Quarantine strike counter; monotone until reset by acceptance
    pub strikes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarantine_reason: Option<QuarantineReason>,
    pub trust: f64,
}

/// A recorded fate change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FateEvolution {
    pub intent_id: String,
    pub from: IntentFate,
    pub to: IntentFate,
}

/// Per-build summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FateSummary {
    pub accepted: usize,
    pub accepted_with_debt: usize,
    pub quarantined: usize,
    pub forbidden: usize,
}

/// Per-build ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FateEntry {
    pub build_id: String,
    pub timestamp: DateTime<Utc>,
    pub fates: Vec<FateRecord>,
    pub summary: FateSummary,
    pub evolutions: Vec<FateEvolution>,
}

/// Hard-fail evolution errors.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("EVOLUTION_RULE_VIOLATION: {intent_id} cannot move {from:?} -> {to:?}")]
    DisallowedTransition {
        intent_id: String,
        from: IntentFate,
        to: IntentFate,
    },

    #[error("EVOLUTION_RULE_VIOLATION: forbidden intent {0} was selected")]
    ForbiddenSelected(String),
}

/// The fate engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct FateEngine {
    thresholds: FateThresholds,
}

impl FateEngine {
    pub fn new(thresholds: FateThresholds) -> Self {
        Self { thresholds }
    }

    /// Classify one intent for this build.
    ///
    /// The seven-step order is fixed:
    /// 1. previous FORBIDDEN stays FORBIDDEN;
    /// 2. trust below the forbidden floor turns FORBIDDEN;
    /// 3. a quarantined intent excluded at strike_max turns FORBIDDEN;
    /// 4. any other excluded intent is QUARANTINED (strike + 1);
    /// 5. uvd inside the debt band accepts with debt;
    /// 6. stability impact above the ceiling accepts with debt;
    /// 7. otherwise ACCEPTED.
    pub fn classify(
        &self,
        metrics: &IntentMetrics,
        selected: bool,
        previous: Option<&FateRecord>,
        trust: f64,
    ) -> Result<FateRecord, EvolutionError> {
        let t = &self.thresholds;
        let prev_fate = previous.map(|p| p.fate);
        let prev_strikes = previous.map(|p| p.strikes).unwrap_or(0);

        let (fate, strikes, quarantine_reason) = if prev_fate == Some(IntentFate::Forbidden) {
            (IntentFate::Forbidden, prev_strikes, None)
        } else if trust < t.forbidden_trust {
            (IntentFate::Forbidden, prev_strikes, None)
        } else if prev_fate == Some(IntentFate::Quarantined)
            && prev_strikes + 1 >= t.strike_max
            && !selected
        {
            (IntentFate::Forbidden, prev_strikes + 1, None)
        } else if !selected {
            let reason = if metrics.uvd < t.quarantine_uvd {
                QuarantineReason::UvdBelowThreshold
            } else if metrics.cost() > t.quarantine_cost {
                QuarantineReason::CostAboveThreshold
            } else {
                QuarantineReason::Other
            };
            let strikes = if prev_fate == Some(IntentFate::Quarantined) {
                prev_strikes + 1
            } else {
                1
            };
            (IntentFate::Quarantined, strikes, Some(reason))
        } else if metrics.uvd >= t.debt_uvd_min && metrics.uvd < t.debt_uvd_max {
            (IntentFate::AcceptedWithDebt, 0, None)
        } else if metrics.stability_impact > t.debt_stability_impact {
            (IntentFate::AcceptedWithDebt, 0, None)
        } else {
            (IntentFate::Accepted, 0, None)
        };

        // Evolution rules are validated even for the fate we just
        // assigned; a bug upstream must surface, not persist.
        if let Some(from) = prev_fate {
            if !IntentFate::transition_allowed(from, fate) {
                return Err(EvolutionError::DisallowedTransition {
                    intent_id: metrics.intent_id.clone(),
                    from,
                    to: fate,
                });
            }
        }
        if fate == IntentFate::Forbidden && selected {
            warn!(intent = %metrics.intent_id, "forbidden intent was selected");
            return Err(EvolutionError::ForbiddenSelected(metrics.intent_id.clone()));
        }

        debug!(intent = %metrics.intent_id, ?fate, strikes, "fate classified");
        Ok(FateRecord {
            intent_id: metrics.intent_id.clone(),
            fate,
            previous: prev_fate,
            strikes,
            quarantine_reason,
            trust,
        })
    }

    /// Classify a whole build and assemble the ledger entry.
    pub fn classify_build(
        &self,
        build_id: &str,
        intents: &[(IntentMetrics, bool, f64)],
        previous: &[FateRecord],
    ) -> Result<FateEntry, EvolutionError> {
        let mut fates = Vec::new();
        let mut evolutions = Vec::new();
        let mut summary = FateSummary::default();

        for (metrics, selected, trust) in intents {
            let prev = previous.iter().find(|p| p.intent_id == metrics.intent_id);
            let record = self.classify(metrics, *selected, prev, *trust)?;

            match record.fate {
                IntentFate::Accepted => summary.accepted += 1,
                IntentFate::AcceptedWithDebt => summary.accepted_with_debt += 1,
                IntentFate::Quarantined => summary.quarantined += 1,
                IntentFate::Forbidden => summary.forbidden += 1,
            }
            if let Some(from) = record.previous {
                if from != record.fate {
                    evolutions.push(FateEvolution {
                        intent_id: record.intent_id.clone(),
                        from,
                        to: record.fate,
                    });
                }
            }
            fates.push(record);
        }

        Ok(FateEntry {
            build_id: build_id.to_string(),
            timestamp: Utc::now(),
            fates,
            summary,
            evolutions,
        })
    }
}
