//! Olympus-Corpus: Hostile & Benign Indicator Tables
//!
//! Word-level indicators consumed by the indicator stage and the
//! cluster risk-pressure score. The two tables have overlapping
//! coverage in the wild; when both fire on the same text, the hostile
//! table wins. That priority is frozen here.

use serde::{Deserialize, Serialize};

/// Frozen hostile indicator words.
pub static HOSTILE_INDICATORS: &[&str] = &[
    "arbitrary",
    "bypass",
    "covert",
    "disable",
    "every",
    "exfiltrate",
    "forever",
    "harvest",
    "hidden",
    "impersonate",
    "permanent",
    "silently",
    "unrestricted",
    "without",
];

/// Frozen benign indicator words.
pub static BENIGN_INDICATORS: &[&str] = &[
    "backup",
    "draft",
    "local",
    "own",
    "personal",
    "preview",
    "read",
    "sample",
    "temporary",
    "view",
];

/// Which table dominated a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dominance {
    Hostile,
    Benign,
}

/// Result of scanning one text against both tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorScan {
    /// Hostile indicator words present, table order
    pub hostile_hits: Vec<String>,
    /// Benign indicator words present, table order
    pub benign_hits: Vec<String>,
    /// Dominant table, hostile winning ties; None when neither fired
    pub dominant: Option<Dominance>,
}

impl IndicatorScan {
    pub fn hostile_count(&self) -> usize {
        self.hostile_hits.len()
    }

    pub fn benign_count(&self) -> usize {
        self.benign_hits.len()
    }
}

/// The indicator table pair.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndicatorTable;

impl IndicatorTable {
    pub fn new() -> Self {
        Self
    }

    /// Scan normalized text for indicator words.
    pub fn scan(&self, text: &str) -> IndicatorScan {
        let words: Vec<&str> = text.split_whitespace().collect();
        let contains = |needle: &str| words.iter().any(|w| *w == needle);

        let hostile_hits: Vec<String> = HOSTILE_INDICATORS
            .iter()
            .filter(|w| contains(w))
            .map(|w| w.to_string())
            .collect();
        let benign_hits: Vec<String> = BENIGN_INDICATORS
            .iter()
            .filter(|w| contains(w))
            .map(|w| w.to_string())
            .collect();

        // Hostile indicators win whenever both tables fire.
        let dominant = if !hostile_hits.is_empty() {
            Some(Dominance::Hostile)
        } else if !benign_hits.is_empty() {
            Some(Dominance::Benign)
        } else {
            None
        };

        IndicatorScan {
            hostile_hits,
            benign_hits,
            dominant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostile_scan() {
        let scan = IndicatorTable::new().scan("execute any operation without logging");
        assert_eq!(scan.hostile_hits, vec!["without"]);
        assert_eq!(scan.dominant, Some(Dominance::Hostile));
    }

    #[test]
    fn test_benign_scan() {
        let scan = IndicatorTable::new().scan("export my own records for backup");
        assert!(scan.benign_hits.contains(&"own".to_string()));
        assert!(scan.benign_hits.contains(&"backup".to_string()));
        assert_eq!(scan.dominant, Some(Dominance::Benign));
    }

    #[test]
    fn test_hostile_wins_ties() {
        let scan = IndicatorTable::new().scan("backup every record without asking");
        assert!(!scan.benign_hits.is_empty());
        assert!(!scan.hostile_hits.is_empty());
        assert_eq!(scan.dominant, Some(Dominance::Hostile));
    }

    #[test]
    fn test_neutral_text() {
        let scan = IndicatorTable::new().scan("marinate the preferences in sauce");
        assert_eq!(scan.dominant, None);
    }
}
