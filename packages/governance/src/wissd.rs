//! Olympus-Governance: Weighted Intent Satisfaction Score (W-ISS-D)
//!
//! Aggregates per-intent causal chains into the 0-100 build score and
//! its SHIP / WARNING / FAIL status. A critical intent below full
//! satisfaction is always a blocker regardless of the numeric score.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::causal::IntentCausalChain;
use crate::intent::IntentPriority;

/// Build status ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WissdStatus {
    Ship,
    Warning,
    Fail,
}

/// Mean score per axis across all chains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisAverages {
    pub trigger: f64,
    pub state: f64,
    pub effect: f64,
    pub outcome: f64,
}

/// The decomposed report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WissdReport {
    /// round(achieved / total × 100)
    pub score: u32,
    pub status: WissdStatus,
    pub total_weight: f64,
    pub achieved_weight: f64,
    pub axis_averages: AxisAverages,
    pub critical_intents_total: usize,
    pub critical_intents_satisfied: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_blocker: Option<String>,
    pub blockers: Vec<String>,
}

/// Score threshold below which a build hard-fails (and the gradient
/// engine runs).
pub const HARD_FAIL_THRESHOLD: u32 = 95;
/// Score threshold below which a shippable build is still a warning.
pub const WARNING_THRESHOLD: u32 = 98;

/// Compute the report over all chains.
pub fn compute(chains: &[IntentCausalChain]) -> WissdReport {
    let total_weight: f64 = chains.iter().map(|c| c.intent.priority.weight()).sum();
    let achieved_weight: f64 = chains.iter().map(|c| c.weighted_score).sum();

    let score = if total_weight > 0.0 {
        (achieved_weight / total_weight * 100.0).round() as u32
    } else {
        100
    };

    let n = chains.len().max(1) as f64;
    let axis_averages = AxisAverages {
        trigger: chains.iter().map(|c| c.axes.trigger).sum::<f64>() / n,
        state: chains.iter().map(|c| c.axes.state).sum::<f64>() / n,
        effect: chains.iter().map(|c| c.axes.effect).sum::<f64>() / n,
        outcome: chains.iter().map(|c| c.axes.outcome.combined).sum::<f64>() / n,
    };

    let criticals: Vec<&IntentCausalChain> = chains
        .iter()
        .filter(|c| c.intent.priority == IntentPriority::Critical)
        .collect();
    let critical_intents_total = criticals.len();
    let critical_intents_satisfied = criticals.iter().filter(|c| c.raw_score >= 1.0).count();

    let mut blockers: Vec<String> = Vec::new();
    let critical_blocker = criticals
        .iter()
        .find(|c| c.raw_score < 1.0)
        .map(|c| format!("critical intent {} is below full satisfaction", c.intent.id));
    if let Some(b) = &critical_blocker {
        blockers.push(b.clone());
    }
    for chain in chains {
        for gap in &chain.gaps {
            blockers.push(format!("{}: {}", chain.intent.id, gap.detail));
        }
    }

    let status = if score < HARD_FAIL_THRESHOLD || critical_blocker.is_some() {
        WissdStatus::Fail
    } else if score >= 100 {
        WissdStatus::Ship
    } else {
        // Scores in [95, 100) without a critical blocker stay warnings,
        // whether above or below the 98 advisory line.
        WissdStatus::Warning
    };

    info!(score, ?status, intents = chains.len(), "w-iss-d computed");

    WissdReport {
        score,
        status,
        total_weight,
        achieved_weight,
        axis_averages,
        critical_intents_total,
        critical_intents_satisfied,
        critical_blocker,
        blockers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::causal::{AxisScores, OutcomeScore};
    use crate::intent::{IntentCategory, IntentSource, IntentSpec};

    fn chain(id: &str, priority: IntentPriority, axes: [f64; 4]) -> IntentCausalChain {
        let mut c = IntentCausalChain {
            intent: IntentSpec {
                id: id.to_string(),
                requirement: "req".to_string(),
                category: IntentCategory::Interaction,
                priority,
                source: IntentSource::Scope,
                expected_trigger: None,
                expected_state: None,
                expected_outcome: None,
            },
            axes: AxisScores {
                trigger: axes[0],
                state: axes[1],
                effect: axes[2],
                outcome: OutcomeScore::internal_only(axes[3]),
            },
            raw_score: 0.0,
            weighted_score: 0.0,
            satisfied: false,
            confidence: crate::causal::ChainConfidence::High,
            gaps: vec![],
            bound_file: None,
            bound_handler: None,
            bound_state: None,
        };
        c.rescore();
        c
    }

    #[test]
    fn test_all_satisfied_ships() {
        let report = compute(&[
            chain("INT-001", IntentPriority::Critical, [1.0, 1.0, 1.0, 1.0]),
            chain("INT-002", IntentPriority::Medium, [1.0, 1.0, 1.0, 1.0]),
        ]);
        assert_eq!(report.score, 100);
        assert_eq!(report.status, WissdStatus::Ship);
        assert!(report.critical_blocker.is_none());
    }

    #[test]
    fn test_unsatisfied_critical_fails_regardless_of_score() {
        let report = compute(&[
            chain("INT-001", IntentPriority::Critical, [1.0, 1.0, 1.0, 0.5]),
            chain("INT-002", IntentPriority::Low, [1.0, 1.0, 1.0, 1.0]),
        ]);
        assert!(report.score >= 85);
        assert_eq!(report.status, WissdStatus::Fail);
        assert!(report.critical_blocker.is_some());
        assert_eq!(report.critical_intents_total, 1);
        assert_eq!(report.critical_intents_satisfied, 0);
    }

    #[test]
    fn test_low_score_fails() {
        let report = compute(&[chain(
            "INT-001",
            IntentPriority::High,
            [0.5, 0.25, 0.0, 0.5],
        )]);
        assert!(report.score < 95);
        assert_eq!(report.status, WissdStatus::Fail);
    }

    #[test]
    fn test_near_perfect_is_warning() {
        // 1 + 1 + 1 + 0.9375 raw over two intents of equal weight.
        let report = compute(&[
            chain("INT-001", IntentPriority::Medium, [1.0, 1.0, 1.0, 1.0]),
            chain("INT-002", IntentPriority::Medium, [1.0, 1.0, 0.75, 1.0]),
        ]);
        assert_eq!(report.score, 97);
        assert_eq!(report.status, WissdStatus::Warning);
    }

    #[test]
    fn test_example_build_scores_eighty_two() {
        let report = compute(&[
            chain("INT-001", IntentPriority::High, [1.0, 1.0, 1.0, 0.25]),
            chain("INT-002", IntentPriority::Medium, [1.0, 1.0, 1.0, 1.0]),
            chain("INT-003", IntentPriority::Low, [0.5, 0.5, 0.5, 0.5]),
        ]);
        assert_eq!(report.score, 82);
        assert_eq!(report.status, WissdStatus::Fail);
    }
}
