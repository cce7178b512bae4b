//! Olympus-Corpus: Provenance Extraction
//!
//! Turns a raw request into a `Provenance` record: declared
//! action:target pairs, derived phrases, and the semantic tag set.
//! Extraction never fails; unknown text produces an empty tag set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use unicode_normalization::UnicodeNormalization;

use crate::tags::SemanticTagMap;

/// Raw request shape handed to the extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRequest {
    /// Declared action verb (e.g. "export")
    pub action: String,
    /// Declared target (e.g. "records")
    pub target: String,
    /// Optional declared requirements
    #[serde(default)]
    pub requirements: Option<Vec<String>>,
    /// Optional free-form request text
    #[serde(default)]
    pub raw_text: Option<String>,
}

/// Provenance record consumed by the capability analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Ordered declared "action:target" pairs
    pub declared: Vec<String>,
    /// Ordered derived phrases (requirements, then raw text)
    pub derived: Vec<String>,
    /// Semantic tags from the closed tag map
    pub semantic_tags: BTreeSet<String>,
    /// Extraction confidence in [0, 1]
    pub confidence: f64,
}

impl Provenance {
    /// All matchable text in stage order: declared first, then derived.
    pub fn corpus_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for d in &self.declared {
            parts.push(d);
        }
        for d in &self.derived {
            parts.push(d);
        }
        parts.join(" ")
    }
}

/// Normalize text ahead of all pattern matching: NFC, ASCII folding,
/// lowercasing, whitespace collapse. Homoglyph and diacritic variants
/// of an anchor phrase normalize to the same bytes.
pub fn normalize(text: &str) -> String {
    let nfc: String = text.nfc().collect();
    let folded = deunicode::deunicode(&nfc);
    let lowered = folded.to_lowercase();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stateless provenance extractor over the frozen tag map.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProvenanceExtractor;

impl ProvenanceExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract provenance from a raw request. Infallible.
    pub fn extract(&self, request: &RawRequest) -> Provenance {
        let action = normalize(&request.action);
        let target = normalize(&request.target);

        let declared = if action.is_empty() && target.is_empty() {
            Vec::new()
        } else {
            vec![format!("{action}:{target}")]
        };

        let mut derived = Vec::new();
        if let Some(reqs) = &request.requirements {
            for r in reqs {
                let n = normalize(r);
                if !n.is_empty() {
                    derived.push(n);
                }
            }
        }
        if let Some(raw) = &request.raw_text {
            let n = normalize(raw);
            if !n.is_empty() {
                derived.push(n);
            }
        }

        let tag_source = {
            let mut s = String::new();
            s.push_str(&action);
            s.push(' ');
            s.push_str(&target);
            for d in &derived {
                s.push(' ');
                s.push_str(d);
            }
            s
        };
        let semantic_tags = SemanticTagMap::builtin().derive(&tag_source);

        // Declared structure carries full confidence; raw-text-only
        // requests are weaker evidence.
        let confidence = if !declared.is_empty() {
            1.0
        } else if !derived.is_empty() {
            0.5
        } else {
            0.0
        };

        Provenance {
            declared,
            derived,
            semantic_tags,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_and_lowercases() {
        assert_eq!(normalize("Exécute  ANY   Opération"), "execute any operation");
    }

    #[test]
    fn test_declared_pair() {
        let p = ProvenanceExtractor::new().extract(&RawRequest {
            action: "Export".to_string(),
            target: "Records".to_string(),
            requirements: None,
            raw_text: None,
        });
        assert_eq!(p.declared, vec!["export:records"]);
        assert_eq!(p.confidence, 1.0);
    }

    #[test]
    fn test_derived_order_requirements_then_raw() {
        let p = ProvenanceExtractor::new().extract(&RawRequest {
            action: "export".to_string(),
            target: "records".to_string(),
            requirements: Some(vec!["for backup".to_string()]),
            raw_text: Some("Export my own records for backup".to_string()),
        });
        assert_eq!(
            p.derived,
            vec!["for backup", "export my own records for backup"]
        );
        assert!(p.semantic_tags.contains("scope-self"));
    }

    #[test]
    fn test_unknown_text_never_errors() {
        let p = ProvenanceExtractor::new().extract(&RawRequest {
            action: String::new(),
            target: String::new(),
            requirements: None,
            raw_text: Some("zxqv blorp".to_string()),
        });
        assert!(p.declared.is_empty());
        assert!(p.semantic_tags.is_empty());
        assert_eq!(p.confidence, 0.5);
    }

    #[test]
    fn test_corpus_text_orders_declared_first() {
        let p = Provenance {
            declared: vec!["a:b".to_string()],
            derived: vec!["c".to_string()],
            semantic_tags: BTreeSet::new(),
            confidence: 1.0,
        };
        assert_eq!(p.corpus_text(), "a:b c");
    }
}
