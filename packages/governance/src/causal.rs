//! Olympus-Governance: Intent Causal Chain Validator (ICG)
//!
//! Binds each intent to found trigger / state / effect / outcome in
//! the target code and scores the four axes. The target code is
//! treated as opaque text; all binding is regex-driven scanning.
//!
//! Axis scales: trigger and outcome are ternary {0, 0.5, 1}; state is
//! {0, 0.25, 0.5, 1}; effect is {0, 1}. A missing expectation scores
//! 1.0 (not expected means not penalized). The outcome axis may later
//! be reduced by a trust-adjusted external score; the combined value
//! is what feeds the raw average.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::intent::{IntentPriority, IntentSpec};

/// One target code file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeArtifact {
    pub path: String,
    pub content: String,
}

/// Typed satisfaction gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    MissingTrigger,
    TriggerEventMismatch,
    MissingState,
    StateNotRendered,
    StateNotWritten,
    MissingOutcome,
    OutcomeNotBound,
    MissingEffect,
    /// External anchor trust below the floor
    WeakAssertion,
}

/// One gap with its detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentGap {
    pub kind: GapKind,
    pub detail: String,
}

/// Outcome-score decomposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeScore {
    /// Internal (code-derived) outcome score
    pub internal: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_adjusted_external: Option<f64>,
    /// min(internal, trust-adjusted external) when external is present
    pub combined: f64,
}

impl OutcomeScore {
    pub fn internal_only(internal: f64) -> Self {
        Self {
            internal,
            external: None,
            trust_score: None,
            trust_adjusted_external: None,
            combined: internal,
        }
    }
}

/// The four axis scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisScores {
    pub trigger: f64,
    pub state: f64,
    pub effect: f64,
    pub outcome: OutcomeScore,
}

/// Binding confidence ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainConfidence {
    High,
    Medium,
    Low,
    None,
}

/// Per-intent causal chain record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentCausalChain {
    pub intent: IntentSpec,
    pub axes: AxisScores,
    /// Mean of the four axis values (outcome uses `combined`)
    pub raw_score: f64,
    /// raw × priority weight
    pub weighted_score: f64,
    pub satisfied: bool,
    pub confidence: ChainConfidence,
    pub gaps: Vec<IntentGap>,
    /// File the trigger was found in, when bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_file: Option<String>,
    /// Handler name the trigger binds to, when bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_handler: Option<String>,
    /// State name the state axis binds to, when bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_state: Option<String>,
}

impl IntentCausalChain {
    /// Recompute raw/weighted/satisfied after an axis value changed.
    pub fn rescore(&mut self) {
        self.raw_score = (self.axes.trigger
            + self.axes.state
            + self.axes.effect
            + self.axes.outcome.combined)
            / 4.0;
        self.weighted_score = self.raw_score * self.intent.priority.weight();
        let weak = self.gaps.iter().any(|g| g.kind == GapKind::WeakAssertion);
        self.satisfied = self.raw_score >= 1.0 && !weak;
    }

    pub fn priority(&self) -> IntentPriority {
        self.intent.priority
    }
}

static EVENT_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(on[A-Z][A-Za-z]*)\s*=\s*\{?\s*([A-Za-z_][A-Za-z0-9_]*)").expect("static pattern")
});

static STATE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"const\s*\[\s*([A-Za-z_][A-Za-z0-9_]*)\s*,\s*(set[A-Za-z0-9_]*)\s*\]\s*=\s*useState")
        .expect("static pattern")
});

/// The causal validator over a set of code artifacts.
#[derive(Debug, Clone)]
pub struct CausalValidator {
    artifacts: Vec<CodeArtifact>,
}

#[derive(Debug, Clone)]
struct TriggerBinding {
    found: bool,
    exact_event: bool,
    handler: Option<String>,
    file: Option<String>,
}

#[derive(Debug, Clone)]
struct StateBinding {
    name: Option<String>,
    setter: Option<String>,
    read_in_render: bool,
    written_in_handler: bool,
}

impl CausalValidator {
    pub fn new(artifacts: Vec<CodeArtifact>) -> Self {
        Self { artifacts }
    }

    /// Validate every intent against the code.
    pub fn validate_all(&self, intents: &[IntentSpec]) -> Vec<IntentCausalChain> {
        intents.iter().map(|i| self.validate(i)).collect()
    }

    /// Validate one intent: bind each axis, score, and collect gaps.
    pub fn validate(&self, intent: &IntentSpec) -> IntentCausalChain {
        let mut gaps = Vec::new();

        let trigger = self.find_trigger(intent);
        let trigger_score = match (&intent.expected_trigger, &trigger) {
            (None, _) => 1.0,
            (Some(_), t) if t.found && t.exact_event => 1.0,
            (Some(expected), t) if t.found => {
                gaps.push(IntentGap {
                    kind: GapKind::TriggerEventMismatch,
                    detail: format!("an event handler exists but none is {expected}"),
                });
                0.5
            }
            (Some(expected), _) => {
                gaps.push(IntentGap {
                    kind: GapKind::MissingTrigger,
                    detail: format!("no {expected} handler found"),
                });
                0.0
            }
        };

        let state = self.find_state(intent, &trigger);
        let state_score = match &intent.expected_state {
            None => 1.0,
            Some(expected) => match &state.name {
                None => {
                    gaps.push(IntentGap {
                        kind: GapKind::MissingState,
                        detail: format!("no state declaration similar to {expected}"),
                    });
                    0.0
                }
                Some(_) => {
                    if state.read_in_render && state.written_in_handler {
                        1.0
                    } else if state.read_in_render || state.written_in_handler {
                        if !state.read_in_render {
                            gaps.push(IntentGap {
                                kind: GapKind::StateNotRendered,
                                detail: "state is written but never read in render".to_string(),
                            });
                        } else {
                            gaps.push(IntentGap {
                                kind: GapKind::StateNotWritten,
                                detail: "state is rendered but no handler writes it".to_string(),
                            });
                        }
                        0.5
                    } else {
                        gaps.push(IntentGap {
                            kind: GapKind::StateNotWritten,
                            detail: "state is declared but neither written nor rendered"
                                .to_string(),
                        });
                        0.25
                    }
                }
            },
        };

        let effect_score = match (&intent.expected_trigger, &intent.expected_state) {
            (Some(_), Some(_)) => {
                if self.handler_calls_setter(&trigger, &state) {
                    1.0
                } else {
                    gaps.push(IntentGap {
                        kind: GapKind::MissingEffect,
                        detail: "the trigger handler never calls the state setter".to_string(),
                    });
                    0.0
                }
            }
            _ => 1.0,
        };

        let outcome_internal = match &intent.expected_outcome {
            None => 1.0,
            Some(_) => match &state.name {
                Some(name) => {
                    if self.conditional_render_on(name) {
                        1.0
                    } else if self.any_conditional_render() {
                        gaps.push(IntentGap {
                            kind: GapKind::OutcomeNotBound,
                            detail: format!(
                                "a conditional render exists but does not depend on {name}"
                            ),
                        });
                        0.5
                    } else {
                        gaps.push(IntentGap {
                            kind: GapKind::MissingOutcome,
                            detail: "no conditional render found".to_string(),
                        });
                        0.0
                    }
                }
                None => {
                    if self.any_conditional_render() {
                        gaps.push(IntentGap {
                            kind: GapKind::OutcomeNotBound,
                            detail: "a conditional render exists but no state binds it"
                                .to_string(),
                        });
                        0.5
                    } else {
                        gaps.push(IntentGap {
                            kind: GapKind::MissingOutcome,
                            detail: "no conditional render found".to_string(),
                        });
                        0.0
                    }
                }
            },
        };

        let bound = [
            trigger.found,
            state.name.is_some(),
            effect_score >= 1.0,
            outcome_internal >= 1.0,
        ]
        .iter()
        .filter(|b| **b)
        .count();
        let confidence = match bound {
            4 => ChainConfidence::High,
            2 | 3 => ChainConfidence::Medium,
            1 => ChainConfidence::Low,
            _ => ChainConfidence::None,
        };

        let mut chain = IntentCausalChain {
            intent: intent.clone(),
            axes: AxisScores {
                trigger: trigger_score,
                state: state_score,
                effect: effect_score,
                outcome: OutcomeScore::internal_only(outcome_internal),
            },
            raw_score: 0.0,
            weighted_score: 0.0,
            satisfied: false,
            confidence,
            gaps,
            bound_file: trigger.file.clone(),
            bound_handler: trigger.handler.clone(),
            bound_state: state.name.clone(),
        };
        chain.rescore();
        debug!(
            intent = %chain.intent.id,
            raw = chain.raw_score,
            ?confidence,
            "causal chain validated"
        );
        chain
    }

    fn find_trigger(&self, intent: &IntentSpec) -> TriggerBinding {
        let Some(expected) = &intent.expected_trigger else {
            return TriggerBinding {
                found: false,
                exact_event: false,
                handler: None,
                file: None,
            };
        };

        let mut fallback: Option<TriggerBinding> = None;
        for artifact in &self.artifacts {
            for caps in EVENT_ATTR.captures_iter(&artifact.content) {
                let event = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let handler = caps.get(2).map(|m| m.as_str().to_string());
                if event == expected {
                    return TriggerBinding {
                        found: true,
                        exact_event: true,
                        handler,
                        file: Some(artifact.path.clone()),
                    };
                }
                if fallback.is_none() {
                    fallback = Some(TriggerBinding {
                        found: true,
                        exact_event: false,
                        handler,
                        file: Some(artifact.path.clone()),
                    });
                }
            }
        }
        fallback.unwrap_or(TriggerBinding {
            found: false,
            exact_event: false,
            handler: None,
            file: None,
        })
    }

    fn find_state(&self, intent: &IntentSpec, trigger: &TriggerBinding) -> StateBinding {
        let Some(expected) = &intent.expected_state else {
            return StateBinding {
                name: None,
                setter: None,
                read_in_render: false,
                written_in_handler: false,
            };
        };

        let mut best: Option<(f64, String, String, usize)> = None;
        for (artifact_idx, artifact) in self.artifacts.iter().enumerate() {
            for caps in STATE_DECL.captures_iter(&artifact.content) {
                let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let setter = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
                let similarity = name_similarity(expected, name);
                if similarity >= 0.6 {
                    let replace = match &best {
                        None => true,
                        Some((best_sim, ..)) => similarity > *best_sim,
                    };
                    if replace {
                        best = Some((
                            similarity,
                            name.to_string(),
                            setter.to_string(),
                            artifact_idx,
                        ));
                    }
                }
            }
        }

        let Some((_, name, setter, artifact_idx)) = best else {
            return StateBinding {
                name: None,
                setter: None,
                read_in_render: false,
                written_in_handler: false,
            };
        };

        let content = &self.artifacts[artifact_idx].content;
        let read_in_render = content
            .find("return")
            .map(|idx| content[idx..].contains(&format!("{{{name}")) || content[idx..].contains(&format!("{name} ")))
            .unwrap_or(false);
        let written_in_handler = match &trigger.handler {
            Some(handler) => handler_body(content, handler)
                .map(|body| body.contains(&format!("{setter}(")))
                .unwrap_or(false),
            None => content.contains(&format!("{setter}(")),
        };

        StateBinding {
            name: Some(name),
            setter: Some(setter),
            read_in_render,
            written_in_handler,
        }
    }

    fn handler_calls_setter(&self, trigger: &TriggerBinding, state: &StateBinding) -> bool {
        let (Some(handler), Some(setter)) = (&trigger.handler, &state.setter) else {
            return false;
        };
        self.artifacts.iter().any(|artifact| {
            handler_body(&artifact.content, handler)
                .map(|body| body.contains(&format!("{setter}(")))
                .unwrap_or(false)
        })
    }

    fn conditional_render_on(&self, state_name: &str) -> bool {
        let and_form = format!("{{{state_name} &&");
        let ternary_form = format!("{{{state_name} ?");
        let if_form = format!("if ({state_name})");
        self.artifacts.iter().any(|a| {
            a.content.contains(&and_form)
                || a.content.contains(&ternary_form)
                || a.content.contains(&if_form)
        })
    }

    fn any_conditional_render(&self) -> bool {
        static CONDITIONAL: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"\{[A-Za-z_][A-Za-z0-9_]*\s*(&&|\?)").expect("static pattern")
        });
        self.artifacts.iter().any(|a| CONDITIONAL.is_match(&a.content))
    }
}

/// Deterministic name similarity: exact 1.0, containment 0.8, shared
/// 4-char prefix 0.6, else 0.
fn name_similarity(expected: &str, found: &str) -> f64 {
    let e = expected.to_lowercase();
    let f = found.to_lowercase();
    if e == f {
        1.0
    } else if e.contains(&f) || f.contains(&e) {
        0.8
    } else if e.len() >= 4 && f.len() >= 4 && e[..4] == f[..4] {
        0.6
    } else {
        0.0
    }
}

/// Extract an approximate handler body: from the definition to the
/// next blank line or 500 characters, whichever comes first.
fn handler_body<'a>(content: &'a str, handler: &str) -> Option<&'a str> {
    let patterns = [
        format!("function {handler}"),
        format!("const {handler} ="),
        format!("{handler}()"),
    ];
    for pattern in &patterns {
        if let Some(idx) = content.find(pattern.as_str()) {
            let rest = &content[idx..];
            let end = rest.find("\n\n").unwrap_or(rest.len()).min(500);
            return Some(&rest[..end]);
        }
    }
    None
}
