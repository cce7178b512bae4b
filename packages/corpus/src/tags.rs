//! Olympus-Corpus: Semantic Tag Map
//!
//! Closed mapping from tag names to inclusion patterns. Provenance
//! derivation consults this map; unknown text simply yields an empty
//! tag set.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// One tag with its compiled inclusion pattern.
#[derive(Debug)]
struct TagEntry {
    name: &'static str,
    pattern: Regex,
}

/// The closed semantic tag map.
#[derive(Debug)]
pub struct SemanticTagMap {
    entries: Vec<TagEntry>,
}

static TAG_TABLE: &[(&str, &str)] = &[
    ("audit", r"\b(log(ging|s)?|audit(ing)?|trace|record(ing)?)\b"),
    (
        "data-access",
        r"\b(read|view|export|download|fetch|retrieve)\b",
    ),
    (
        "execution",
        r"\b(execute|run|launch|invoke|perform|trigger)\b",
    ),
    (
        "identity",
        r"\b(user|account|identity|impersonate|principal)\b",
    ),
    (
        "mutation",
        r"\b(write|update|delete|modify|remove|overwrite)\b",
    ),
    (
        "persistence",
        r"\b(persist|permanent|forever|indefinitely|standing)\b",
    ),
    (
        "privilege",
        r"\b(admin|root|permission|grant|elevate|privilege|superuser)\b",
    ),
    ("scope-global", r"\b(all|any|every|entire|whole)\b"),
    ("scope-self", r"\bmy( own)?\b|\bmyself\b"),
];

static DEFAULT_MAP: Lazy<SemanticTagMap> = Lazy::new(SemanticTagMap::compile_builtin);

impl SemanticTagMap {
    /// The frozen built-in map.
    pub fn builtin() -> &'static SemanticTagMap {
        &DEFAULT_MAP
    }

    fn compile_builtin() -> Self {
        let entries = TAG_TABLE
            .iter()
            .map(|(name, raw)| TagEntry {
                name,
                // Built-in patterns are static and covered by tests; a
                // compile failure here is a defect in this table, not
                // in caller input.
                pattern: Regex::new(raw).unwrap_or_else(|e| {
                    panic!("builtin tag pattern {name:?} failed to compile: {e}")
                }),
            })
            .collect();
        Self { entries }
    }

    /// Derive the tag set for normalized text.
    pub fn derive(&self, text: &str) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter(|e| e.pattern.is_match(text))
            .map(|e| e.name.to_string())
            .collect()
    }

    /// Number of tags in the closed set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
