//! Olympus-Governance: Intent Extraction
//!
//! Extracts immutable intent specs from corpus artifacts. Extraction
//! is pattern-driven per category (closed set), deduplicated by
//! `category:prefix(requirement)`, and each intent receives its
//! expected trigger/state/outcome from the category table.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Closed category set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    Authentication,
    DataPersistence,
    UserFeedback,
    Navigation,
    Validation,
    Rendering,
    Interaction,
}

impl IntentCategory {
    /// All categories in claim order: the first matching category
    /// claims a requirement line.
    pub const ALL: [IntentCategory; 7] = [
        IntentCategory::Authentication,
        IntentCategory::DataPersistence,
        IntentCategory::UserFeedback,
        IntentCategory::Navigation,
        IntentCategory::Validation,
        IntentCategory::Rendering,
        IntentCategory::Interaction,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IntentCategory::Authentication => "authentication",
            IntentCategory::DataPersistence => "data_persistence",
            IntentCategory::UserFeedback => "user_feedback",
            IntentCategory::Navigation => "navigation",
            IntentCategory::Validation => "validation",
            IntentCategory::Rendering => "rendering",
            IntentCategory::Interaction => "interaction",
        }
    }

    /// Expected (trigger event, state name, outcome binding) for the
    /// category. `None` means the axis is not expected and scores 1.0
    /// by default.
    pub fn expectations(self) -> (Option<&'static str>, Option<&'static str>, Option<&'static str>) {
        match self {
            IntentCategory::Authentication => {
                (Some("onSubmit"), Some("authState"), Some("authState"))
            }
            IntentCategory::DataPersistence => {
                (Some("onSave"), Some("savedData"), Some("savedData"))
            }
            IntentCategory::UserFeedback => (
                Some("onClick"),
                Some("feedbackMessage"),
                Some("feedbackMessage"),
            ),
            IntentCategory::Navigation => (Some("onClick"), Some("currentView"), Some("currentView")),
            IntentCategory::Validation => (
                Some("onChange"),
                Some("validationError"),
                Some("validationError"),
            ),
            IntentCategory::Rendering => (None, Some("viewModel"), Some("viewModel")),
            IntentCategory::Interaction => (
                Some("onClick"),
                Some("interactionState"),
                Some("interactionState"),
            ),
        }
    }
}

/// Priority with its frozen weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl IntentPriority {
    /// Frozen priority weights: critical 4, high 2, medium 1, low 0.5.
    pub fn weight(self) -> f64 {
        match self {
            IntentPriority::Critical => 4.0,
            IntentPriority::High => 2.0,
            IntentPriority::Medium => 1.0,
            IntentPriority::Low => 0.5,
        }
    }

    /// Weight normalized into [0, 1] for the governance value formula.
    pub fn norm(self) -> f64 {
        self.weight() / 4.0
    }
}

/// Where an intent came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentSource {
    Oracle,
    Scope,
    Empathy,
    User,
    Inferred,
}

/// One corpus artifact handed to the extractor. Opaque beyond its
/// source tag and text content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceArtifact {
    pub source: IntentSource,
    pub content: String,
}

/// Immutable intent spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSpec {
    pub id: String,
    pub requirement: String,
    pub category: IntentCategory,
    pub priority: IntentPriority,
    pub source: IntentSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_outcome: Option<String>,
}

/// Dedup key length over the requirement text.
const DEDUP_PREFIX_LEN: usize = 40;

static CATEGORY_PATTERNS: Lazy<Vec<(IntentCategory, Regex)>> = Lazy::new(|| {
    let table: [(IntentCategory, &str); 7] = [
        (
            IntentCategory::Authentication,
            r"(?i)\b(log ?in|sign ?in|sign ?up|authenticat|session|credential)\b",
        ),
        (
            IntentCategory::DataPersistence,
            r"(?i)\b(save|persist|store|record|remember|database)\b",
        ),
        (
            IntentCategory::UserFeedback,
            r"(?i)\b(toast|notification|message|confirm|feedback|alert)\b",
        ),
        (
            IntentCategory::Navigation,
            r"(?i)\b(navigate|route|redirect|page|view|screen)\b",
        ),
        (
            IntentCategory::Validation,
            r"(?i)\b(validat|invalid|required field|format|sanitiz)\b",
        ),
        (
            IntentCategory::Rendering,
            r"(?i)\b(display|render|show|list|chart|table)\b",
        ),
        (
            IntentCategory::Interaction,
            r"(?i)\b(click|press|drag|select|toggle|input)\b",
        ),
    ];
    table
        .into_iter()
        .map(|(category, raw)| {
            (
                category,
                // The table is static and covered by tests.
                Regex::new(raw)
                    .unwrap_or_else(|e| panic!("category pattern {category:?} failed: {e}")),
            )
        })
        .collect()
});

static PRIORITY_CRITICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(must|critical|always|never)\b").expect("static pattern"));
static PRIORITY_HIGH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(should|important)\b").expect("static pattern"));
static PRIORITY_LOW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(may|could|optionally|nice to have)\b").expect("static pattern"));

/// The pattern-driven extractor.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntentExtractor;

impl IntentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract deduplicated intent specs from the artifacts, in
    /// artifact and line order.
    pub fn extract(&self, artifacts: &[SourceArtifact]) -> Vec<IntentSpec> {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut intents = Vec::new();

        for artifact in artifacts {
            for line in artifact.content.lines() {
                let requirement = line.trim().trim_start_matches(['-', '*', ' ']).trim();
                if requirement.len() < 8 {
                    continue;
                }
                let Some(category) = classify_line(requirement) else {
                    continue;
                };

                let key = dedup_key(category, requirement);
                if !seen.insert(key) {
                    continue;
                }

                let (trigger, state, outcome) = category.expectations();
                let id = format!("INT-{:03}", intents.len() + 1);
                intents.push(IntentSpec {
                    id,
                    requirement: requirement.to_string(),
                    category,
                    priority: classify_priority(requirement),
                    source: artifact.source,
                    expected_trigger: trigger.map(str::to_string),
                    expected_state: state.map(str::to_string),
                    expected_outcome: outcome.map(str::to_string),
                });
            }
        }

        debug!(intents = intents.len(), artifacts = artifacts.len(), "intent extraction");
        intents
    }
}

fn classify_line(requirement: &str) -> Option<IntentCategory> {
    CATEGORY_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(requirement))
        .map(|(category, _)| *category)
}

fn classify_priority(requirement: &str) -> IntentPriority {
    if PRIORITY_CRITICAL.is_match(requirement) {
        IntentPriority::Critical
    } else if PRIORITY_HIGH.is_match(requirement) {
        IntentPriority::High
    } else if PRIORITY_LOW.is_match(requirement) {
        IntentPriority::Low
    } else {
        IntentPriority::Medium
    }
}

fn dedup_key(category: IntentCategory, requirement: &str) -> String {
    let prefix: String = requirement
        .to_lowercase()
        .chars()
        .take(DEDUP_PREFIX_LEN)
        .collect();
    format!("{}:{}", category.as_str(), prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(source: IntentSource, content: &str) -> SourceArtifact {
        SourceArtifact {
            source,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_extraction_assigns_categories_and_expectations() {
        let intents = IntentExtractor::new().extract(&[artifact(
            IntentSource::Scope,
            "- users must be able to log in with email\n\
             - the app should save drafts to the database\n\
             - display a list of recent items",
        )]);
        assert_eq!(intents.len(), 3);
        assert_eq!(intents[0].category, IntentCategory::Authentication);
        assert_eq!(intents[0].priority, IntentPriority::Critical);
        assert_eq!(intents[0].expected_trigger.as_deref(), Some("onSubmit"));
        assert_eq!(intents[1].category, IntentCategory::DataPersistence);
        assert_eq!(intents[1].priority, IntentPriority::High);
        assert_eq!(intents[2].category, IntentCategory::Rendering);
        assert!(intents[2].expected_trigger.is_none());
    }

    #[test]
    fn test_dedup_by_category_prefix() {
        let intents = IntentExtractor::new().extract(&[
            artifact(
                IntentSource::Scope,
                "- users must be able to log in with email and password",
            ),
            artifact(
                IntentSource::Oracle,
                "- users must be able to log in with email and passphrase",
            ),
        ]);
        // Same category and same 40-char prefix collapse to one.
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].source, IntentSource::Scope);
    }

    #[test]
    fn test_uncategorized_lines_are_skipped() {
        let intents = IntentExtractor::new().extract(&[artifact(
            IntentSource::User,
            "- the weather is lovely today",
        )]);
        assert!(intents.is_empty());
    }

    #[test]
    fn test_ids_are_sequential() {
        let intents = IntentExtractor::new().extract(&[artifact(
            IntentSource::Scope,
            "- users must log in\n- show a confirmation message after saving",
        )]);
        assert_eq!(intents[0].id, "INT-001");
        assert_eq!(intents[1].id, "INT-002");
    }

    #[test]
    fn test_priority_weights_are_frozen() {
        assert_eq!(IntentPriority::Critical.weight(), 4.0);
        assert_eq!(IntentPriority::High.weight(), 2.0);
        assert_eq!(IntentPriority::Medium.weight(), 1.0);
        assert_eq!(IntentPriority::Low.weight(), 0.5);
    }
}
