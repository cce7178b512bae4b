//! Olympus-Shadow: Redundant Oracle Cross-Checker
//!
//! Three independent deterministic oracles evaluate the same invariant
//! context; a fixed 2-of-3 quorum table combines them. Any oracle
//! whose evidence pairs "hostile" with "admission" vetoes the quorum
//! straight to FAIL with review. NO_AGREEMENT is the only recoverable
//! disagreement: it escalates through a pending-resolution record and
//! a conservative reject.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::Verdict;
use crate::unknown::IntentClass;

/// Everything an oracle may consult.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantContext {
    pub request_id: String,
    /// Normalized request text
    pub text: String,
    /// All capability ids that matched
    pub capability_ids: Vec<String>,
    /// The hostile subset of `capability_ids`
    pub hostile_capability_ids: Vec<String>,
    /// Power-invariant violations found
    pub violation_ids: Vec<String>,
    /// UID classification
    pub classification: IntentClass,
    /// The verdict the pipeline is about to emit
    pub proposed_verdict: Verdict,
    /// Prior verdicts for the same canonical input, oldest first
    pub prior_verdicts: Vec<Verdict>,
}

/// Oracle verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OracleVerdict {
    Pass,
    Fail,
    Uncertain,
}

/// One oracle's report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleReport {
    pub oracle: String,
    pub verdict: OracleVerdict,
    pub confidence: f64,
    pub evidence: Vec<String>,
}

/// An oracle maps an invariant context to a report. Implementations
/// must be pure functions of the context.
pub trait Oracle {
    fn name(&self) -> &'static str;
    fn evaluate(&self, ctx: &InvariantContext) -> OracleReport;
}

/// Rule-driven oracle over capabilities and violations.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymbolicOracle;

impl Oracle for SymbolicOracle {
    fn name(&self) -> &'static str {
        "symbolic"
    }

    fn evaluate(&self, ctx: &InvariantContext) -> OracleReport {
        let mut evidence = Vec::new();
        let verdict = if !ctx.hostile_capability_ids.is_empty() {
            evidence.push(format!(
                "hostile capabilities present: {}",
                ctx.hostile_capability_ids.join(", ")
            ));
            if ctx.proposed_verdict == Verdict::Admit {
                evidence.push("hostile capability set would survive admission".to_string());
            }
            OracleVerdict::Fail
        } else if !ctx.violation_ids.is_empty() {
            evidence.push(format!(
                "power invariants violated: {}",
                ctx.violation_ids.join(", ")
            ));
            OracleVerdict::Fail
        } else if ctx.classification == IntentClass::Safe {
            evidence.push("no capability signal; safe-anchor aligned".to_string());
            OracleVerdict::Pass
        } else {
            evidence.push("no capability signal; intent unresolved".to_string());
            OracleVerdict::Uncertain
        };

        OracleReport {
            oracle: self.name().to_string(),
            verdict,
            confidence: if verdict == OracleVerdict::Uncertain { 0.4 } else { 0.9 },
            evidence,
        }
    }
}

/// Feature-score oracle. Deterministic: the score is a fixed linear
/// combination of context counts, not a learned model.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatisticalOracle;

impl Oracle for StatisticalOracle {
    fn name(&self) -> &'static str {
        "statistical"
    }

    fn evaluate(&self, ctx: &InvariantContext) -> OracleReport {
        let score = 0.4 * ctx.hostile_capability_ids.len() as f64
            + 0.2 * ctx.violation_ids.len() as f64
            + 0.1 * ctx.capability_ids.len() as f64
            + match ctx.classification {
                IntentClass::Hostile => 0.5,
                IntentClass::Unknown => 0.2,
                IntentClass::Safe => 0.0,
            };

        let (verdict, evidence) = if score >= 0.5 {
            (
                OracleVerdict::Fail,
                format!("risk feature score {score:.2} above failure line"),
            )
        } else if score < 0.2 {
            (
                OracleVerdict::Pass,
                format!("risk feature score {score:.2} below clearance line"),
            )
        } else {
            (
                OracleVerdict::Uncertain,
                format!("risk feature score {score:.2} in the gray band"),
            )
        };

        OracleReport {
            oracle: self.name().to_string(),
            verdict,
            confidence: (score.min(1.0) - 0.5).abs() + 0.5,
            evidence: vec![evidence],
        }
    }
}

/// History oracle: a proposed admission that contradicts a rejecting
/// history is a regression.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemporalRegressionOracle;

impl Oracle for TemporalRegressionOracle {
    fn name(&self) -> &'static str {
        "temporal-regression"
    }

    fn evaluate(&self, ctx: &InvariantContext) -> OracleReport {
        if ctx.prior_verdicts.is_empty() {
            // Nothing to regress against.
            return OracleReport {
                oracle: self.name().to_string(),
                verdict: OracleVerdict::Pass,
                confidence: 0.3,
                evidence: vec!["no prior verdicts for this input".to_string()],
            };
        }

        let rejects = ctx
            .prior_verdicts
            .iter()
            .filter(|v| **v == Verdict::Reject)
            .count();
        let admits = ctx.prior_verdicts.len() - rejects;

        let (verdict, evidence) = if rejects > admits {
            if ctx.proposed_verdict == Verdict::Admit {
                (
                    OracleVerdict::Fail,
                    format!(
                        "history rejects this input {rejects}:{admits}; admission would regress"
                    ),
                )
            } else {
                (
                    OracleVerdict::Pass,
                    format!("verdict consistent with rejecting history {rejects}:{admits}"),
                )
            }
        } else if admits > rejects {
            if ctx.proposed_verdict == Verdict::Reject {
                (
                    OracleVerdict::Uncertain,
                    format!("verdict stricter than admitting history {admits}:{rejects}"),
                )
            } else {
                (
                    OracleVerdict::Pass,
                    format!("verdict consistent with admitting history {admits}:{rejects}"),
                )
            }
        } else {
            (
                OracleVerdict::Uncertain,
                format!("history split {rejects}:{admits}"),
            )
        };

        OracleReport {
            oracle: self.name().to_string(),
            verdict,
            confidence: 0.7,
            evidence: vec![evidence],
        }
    }
}

/// Quorum outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossCheckOutcome {
    #[serde(rename = "PASS_UNANIMOUS")]
    PassUnanimous,
    #[serde(rename = "FAIL_UNANIMOUS")]
    FailUnanimous,
    #[serde(rename = "PASS_MAJORITY")]
    PassMajority,
    #[serde(rename = "FAIL_MAJORITY")]
    FailMajority,
    #[serde(rename = "NO_AGREEMENT")]
    NoAgreement,
}

/// Record escalated to human review on NO_AGREEMENT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingResolution {
    pub request_id: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Combined cross-check result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossCheckResult {
    pub outcome: CrossCheckOutcome,
    pub final_verdict: OracleVerdict,
    pub review_required: bool,
    /// True when the S4 veto fired
    pub vetoed: bool,
    pub reports: Vec<OracleReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingResolution>,
}

/// Run the fixed cross-check table over three oracle reports.
pub fn cross_check(ctx: &InvariantContext, reports: Vec<OracleReport>) -> CrossCheckResult {
    // S4 veto first: evidence pairing "hostile" with "admission"
    // downgrades the quorum regardless of votes.
    let vetoed = reports.iter().any(|r| {
        let joined = r.evidence.join(" ").to_lowercase();
        joined.contains("hostile") && joined.contains("admission")
    });
    if vetoed {
        warn!(request_id = %ctx.request_id, "oracle veto: hostile admission evidence");
        return CrossCheckResult {
            outcome: CrossCheckOutcome::FailMajority,
            final_verdict: OracleVerdict::Fail,
            review_required: true,
            vetoed: true,
            reports,
            pending: None,
        };
    }

    let passes = reports
        .iter()
        .filter(|r| r.verdict == OracleVerdict::Pass)
        .count();
    let fails = reports
        .iter()
        .filter(|r| r.verdict == OracleVerdict::Fail)
        .count();

    let (outcome, final_verdict, review_required) = if passes == reports.len() {
        (CrossCheckOutcome::PassUnanimous, OracleVerdict::Pass, false)
    } else if fails == reports.len() {
        (CrossCheckOutcome::FailUnanimous, OracleVerdict::Fail, false)
    } else if passes >= 2 && fails >= 1 {
        (CrossCheckOutcome::PassMajority, OracleVerdict::Pass, true)
    } else if fails >= 2 {
        (CrossCheckOutcome::FailMajority, OracleVerdict::Fail, false)
    } else {
        (CrossCheckOutcome::NoAgreement, OracleVerdict::Uncertain, true)
    };

    let pending = if outcome == CrossCheckOutcome::NoAgreement {
        Some(PendingResolution {
            request_id: ctx.request_id.clone(),
            reason: "oracle quorum reached no agreement; conservative reject applied".to_string(),
            created_at: Utc::now(),
        })
    } else {
        None
    };

    debug!(?outcome, ?final_verdict, review_required, "oracle cross-check");

    CrossCheckResult {
        outcome,
        final_verdict,
        review_required,
        vetoed: false,
        reports,
        pending,
    }
}

/// Evaluate the three standard oracles and cross-check them.
pub fn standard_cross_check(ctx: &InvariantContext) -> CrossCheckResult {
    let reports = vec![
        SymbolicOracle.evaluate(ctx),
        StatisticalOracle.evaluate(ctx),
        TemporalRegressionOracle.evaluate(ctx),
    ];
    cross_check(ctx, reports)
}
