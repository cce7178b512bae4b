//! Olympus-Governance: Intent Governance Engine (IGE)
//!
//! Deterministic subset selection maximizing the value/cost ratio
//! under stability, trust and feasibility constraints. No randomness,
//! no search heuristics: candidates are scanned in ratio order and
//! every tie breaks by intent id ascending.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::intent::IntentPriority;

/// Per-intent governance metrics. All components are in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentMetrics {
    pub intent_id: String,
    pub priority: IntentPriority,
    /// User-value density
    pub uvd: f64,
    pub complexity: f64,
    pub external_anchors: f64,
    pub coupling: f64,
    pub trust_deficit: f64,
    pub stability_impact: f64,
    pub dependency: f64,
    pub user_facing: f64,
}

impl IntentMetrics {
    /// value = 0.50·uvd + 0.30·priority + 0.15·dependency + 0.05·user_facing
    pub fn value(&self) -> f64 {
        0.50 * self.uvd
            + 0.30 * self.priority.norm()
            + 0.15 * self.dependency
            + 0.05 * self.user_facing
    }

    /// cost = 0.25·complexity + 0.20·anchors + 0.25·coupling
    ///      + 0.15·trust_deficit + 0.15·stability_impact
    pub fn cost(&self) -> f64 {
        0.25 * self.complexity
            + 0.20 * self.external_anchors
            + 0.25 * self.coupling
            + 0.15 * self.trust_deficit
            + 0.15 * self.stability_impact
    }

    /// ratio = value / (1 + cost)
    pub fn ratio(&self) -> f64 {
        self.value() / (1.0 + self.cost())
    }
}

/// Selection constraints. Corpus constants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SelectionConstraints {
    pub min_stability: f64,
    pub min_trust: f64,
    /// Ceiling on the subset's mean member cost
    pub max_total_cost: f64,
    /// Non-critical intents below this uvd are exclusion candidates
    pub min_intent_uvd: f64,
    /// Every critical intent must reach this uvd
    pub critical_intent_min: f64,
}

impl Default for SelectionConstraints {
    fn default() -> Self {
        Self {
            min_stability: 0.5,
            min_trust: 0.5,
            max_total_cost: 0.5,
            min_intent_uvd: 0.40,
            critical_intent_min: 0.7,
        }
    }
}

/// Why an intent was excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionRecord {
    pub intent_id: String,
    pub reason: String,
}

/// Which constraints held on the final subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintReport {
    pub stability_ok: bool,
    pub trust_ok: bool,
    pub cost_ok: bool,
    pub critical_uvd_ok: bool,
}

impl ConstraintReport {
    pub fn all_ok(&self) -> bool {
        self.stability_ok && self.trust_ok && self.cost_ok && self.critical_uvd_ok
    }
}

/// Selection output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Selected intent ids, ascending
    pub selected: Vec<String>,
    pub excluded: Vec<ExclusionRecord>,
    pub allows_ship: bool,
    pub total_value: f64,
    /// Mean member cost of the selected subset
    pub mean_cost: f64,
    /// total_value / (1 + mean_cost)
    pub effective_ratio: f64,
    pub constraints: ConstraintReport,
}

/// The selection engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelectionEngine {
    constraints: SelectionConstraints,
}

impl SelectionEngine {
    pub fn new(constraints: SelectionConstraints) -> Self {
        Self { constraints }
    }

    /// Run the deterministic selection.
    ///
    /// Start from the full set, scan candidates by ratio ascending, and
    /// try excluding each non-critical intent whose uvd sits below the
    /// floor. An exclusion is kept iff it flips the subset to
    /// ship-eligible (stop there) or strictly improves the effective
    /// value ratio.
    pub fn select(&self, intents: &[IntentMetrics]) -> SelectionResult {
        let mut members: BTreeSet<&str> =
            intents.iter().map(|m| m.intent_id.as_str()).collect();
        let mut excluded: Vec<ExclusionRecord> = Vec::new();

        let mut candidates: Vec<&IntentMetrics> = intents.iter().collect();
        candidates.sort_by(|a, b| {
            a.ratio()
                .partial_cmp(&b.ratio())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.intent_id.cmp(&b.intent_id))
        });

        for candidate in candidates {
            if candidate.priority == IntentPriority::Critical {
                continue;
            }
            if candidate.uvd >= self.constraints.min_intent_uvd {
                continue;
            }
            if !members.contains(candidate.intent_id.as_str()) {
                continue;
            }

            let mut trial = members.clone();
            trial.remove(candidate.intent_id.as_str());

            let current_eligible = self.ship_eligible(intents, &members);
            let trial_eligible = self.ship_eligible(intents, &trial);

            if !current_eligible && trial_eligible {
                members = trial;
                excluded.push(ExclusionRecord {
                    intent_id: candidate.intent_id.clone(),
                    reason: "exclusion flips the subset to ship-eligible".to_string(),
                });
                // First flip wins; stop scanning.
                break;
            }

            let current_ratio = self.effective_ratio(intents, &members);
            let trial_ratio = self.effective_ratio(intents, &trial);
            if trial_ratio > current_ratio {
                members = trial;
                excluded.push(ExclusionRecord {
                    intent_id: candidate.intent_id.clone(),
                    reason: "exclusion strictly improves the effective value ratio".to_string(),
                });
            }
        }

        let report = self.constraint_report(intents, &members);
        let allows_ship = report.all_ok();
        let (total_value, mean_cost) = self.aggregates(intents, &members);
        let result = SelectionResult {
            selected: members.iter().map(|s| s.to_string()).collect(),
            excluded,
            allows_ship,
            total_value,
            mean_cost,
            effective_ratio: total_value / (1.0 + mean_cost),
            constraints: report,
        };
        debug!(
            selected = result.selected.len(),
            excluded = result.excluded.len(),
            allows_ship,
            "selection complete"
        );
        result
    }

    fn subset<'a>(
        &self,
        intents: &'a [IntentMetrics],
        members: &BTreeSet<&str>,
    ) -> Vec<&'a IntentMetrics> {
        intents
            .iter()
            .filter(|m| members.contains(m.intent_id.as_str()))
            .collect()
    }

    fn aggregates(&self, intents: &[IntentMetrics], members: &BTreeSet<&str>) -> (f64, f64) {
        let subset = self.subset(intents, members);
        if subset.is_empty() {
            return (0.0, 0.0);
        }
        let total_value = subset.iter().map(|m| m.value()).sum::<f64>();
        let mean_cost =
            subset.iter().map(|m| m.cost()).sum::<f64>() / subset.len() as f64;
        (total_value, mean_cost)
    }

    fn effective_ratio(&self, intents: &[IntentMetrics], members: &BTreeSet<&str>) -> f64 {
        let (total_value, mean_cost) = self.aggregates(intents, members);
        total_value / (1.0 + mean_cost)
    }

    fn ship_eligible(&self, intents: &[IntentMetrics], members: &BTreeSet<&str>) -> bool {
        self.constraint_report(intents, members).all_ok()
    }

    fn constraint_report(
        &self,
        intents: &[IntentMetrics],
        members: &BTreeSet<&str>,
    ) -> ConstraintReport {
        let subset = self.subset(intents, members);
        if subset.is_empty() {
            return ConstraintReport {
                stability_ok: true,
                trust_ok: true,
                cost_ok: true,
                critical_uvd_ok: true,
            };
        }
        let n = subset.len() as f64;
        let stability =
            1.0 - subset.iter().map(|m| m.stability_impact).sum::<f64>() / n;
        let trust = 1.0 - subset.iter().map(|m| m.trust_deficit).sum::<f64>() / n;
        let mean_cost = subset.iter().map(|m| m.cost()).sum::<f64>() / n;
        let critical_uvd_ok = subset
            .iter()
            .filter(|m| m.priority == IntentPriority::Critical)
            .all(|m| m.uvd >= self.constraints.critical_intent_min);

        ConstraintReport {
            stability_ok: stability >= self.constraints.min_stability,
            trust_ok: trust >= self.constraints.min_trust,
            cost_ok: mean_cost <= self.constraints.max_total_cost,
            critical_uvd_ok,
        }
    }
}
