//! Olympus-Shadow: Unknown-Intent Cluster Engine
//!
//! Groups UNKNOWN intents category-first, then by pairwise similarity
//! in corpus order. Each cluster carries a token signature and a
//! risk-pressure score feeding the saturation campaigns.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use olympus_corpus::anchors::{jaccard, tokens, MIN_TOKEN_LEN};
use olympus_corpus::IndicatorTable;

/// One unknown intent awaiting clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnknownSample {
    pub id: String,
    pub text: String,
    /// Declared category, when the request carried one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// How a cluster was formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterBasis {
    /// All members declared the same category
    Category(String),
    /// Members grouped by pairwise similarity
    Similarity,
}

/// One cluster of unknown intents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub basis: ClusterBasis,
    /// Member sample ids, corpus order
    pub member_ids: Vec<String>,
    /// Member texts, corpus order
    pub member_texts: Vec<String>,
    /// Top-k most frequent tokens, ties lexicographic
    pub signature: Vec<String>,
    /// clamp(hostile_ratio - benign_ratio + 0.5, 0, 1)
    pub risk_pressure: f64,
}

/// Clustering thresholds. Corpus constants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Minimum size for a category-based cluster
    pub min_size: usize,
    /// Pairwise similarity floor for the similarity pass
    pub sim_threshold: f64,
    /// Signature length
    pub signature_len: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            min_size: 3,
            sim_threshold: 0.30,
            signature_len: 5,
        }
    }
}

/// The cluster engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClusterEngine {
    config: ClusterConfig,
}

impl ClusterEngine {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Cluster samples: category-first, then greedy similarity over
    /// corpus order. Deterministic for identical input order.
    pub fn cluster(&self, samples: &[UnknownSample]) -> Vec<Cluster> {
        let mut assigned = vec![false; samples.len()];
        let mut clusters = Vec::new();

        // Pass 1: declared categories with enough members.
        let mut by_category: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, sample) in samples.iter().enumerate() {
            if let Some(cat) = &sample.category {
                by_category.entry(cat.as_str()).or_default().push(idx);
            }
        }
        for (category, members) in &by_category {
            if members.len() >= self.config.min_size {
                for &idx in members {
                    assigned[idx] = true;
                }
                clusters.push(self.make_cluster(
                    format!("cat:{category}"),
                    ClusterBasis::Category(category.to_string()),
                    members,
                    samples,
                ));
            }
        }

        // Pass 2: greedy similarity grouping of the remainder.
        let mut sim_index = 0usize;
        for seed in 0..samples.len() {
            if assigned[seed] {
                continue;
            }
            assigned[seed] = true;
            let mut members = vec![seed];
            let seed_tokens = tokens(&samples[seed].text);
            for other in (seed + 1)..samples.len() {
                if assigned[other] {
                    continue;
                }
                let sim = jaccard(&seed_tokens, &tokens(&samples[other].text));
                if sim >= self.config.sim_threshold {
                    assigned[other] = true;
                    members.push(other);
                }
            }
            clusters.push(self.make_cluster(
                format!("sim:{sim_index}"),
                ClusterBasis::Similarity,
                &members,
                samples,
            ));
            sim_index += 1;
        }

        debug!(clusters = clusters.len(), samples = samples.len(), "clustering complete");
        clusters
    }

    fn make_cluster(
        &self,
        id: String,
        basis: ClusterBasis,
        members: &[usize],
        samples: &[UnknownSample],
    ) -> Cluster {
        let member_ids = members.iter().map(|&i| samples[i].id.clone()).collect();
        let member_texts: Vec<String> =
            members.iter().map(|&i| samples[i].text.clone()).collect();
        let signature = signature(&member_texts, self.config.signature_len);
        let risk_pressure = risk_pressure(&member_texts);
        Cluster {
            id,
            basis,
            member_ids,
            member_texts,
            signature,
            risk_pressure,
        }
    }
}

/// Top-k most frequent length-filtered tokens; count descending, ties
/// lexicographic ascending.
fn signature(texts: &[String], k: usize) -> Vec<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for text in texts {
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() >= MIN_TOKEN_LEN)
        {
            *counts.entry(token.to_string()).or_insert(0) += 1;
        }
    }
    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.into_iter().take(k).map(|(t, _)| t).collect()
}

/// clamp(hostile_ratio - benign_ratio + 0.5, 0, 1) over the indicator
/// tables.
fn risk_pressure(texts: &[String]) -> f64 {
    if texts.is_empty() {
        return 0.5;
    }
    let table = IndicatorTable::new();
    let mut hostile = 0usize;
    let mut benign = 0usize;
    for text in texts {
        let scan = table.scan(&text.to_lowercase());
        if scan.hostile_count() > 0 {
            hostile += 1;
        }
        if scan.benign_count() > 0 {
            benign += 1;
        }
    }
    let hostile_ratio = hostile as f64 / texts.len() as f64;
    let benign_ratio = benign as f64 / texts.len() as f64;
    (hostile_ratio - benign_ratio + 0.5).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, text: &str, category: Option<&str>) -> UnknownSample {
        UnknownSample {
            id: id.to_string(),
            text: text.to_string(),
            category: category.map(|c| c.to_string()),
        }
    }

    #[test]
    fn test_category_first_clustering() {
        let samples = vec![
            sample("a", "rotate the galaxy settings", Some("settings")),
            sample("b", "invert the settings panel", Some("settings")),
            sample("c", "marinate the settings sauce", Some("settings")),
            sample("d", "unrelated phrase entirely", None),
        ];
        let clusters = ClusterEngine::new(ClusterConfig::default()).cluster(&samples);
        let cat_cluster = clusters
            .iter()
            .find(|c| c.basis == ClusterBasis::Category("settings".to_string()))
            .unwrap();
        assert_eq!(cat_cluster.member_ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_small_categories_fall_through_to_similarity() {
        let samples = vec![
            sample("a", "marinate the user preferences in settings sauce", Some("culinary")),
            sample("b", "marinate the admin preferences in settings sauce", None),
        ];
        let clusters = ClusterEngine::new(ClusterConfig::default()).cluster(&samples);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].basis, ClusterBasis::Similarity);
        assert_eq!(clusters[0].member_ids, vec!["a", "b"]);
    }

    #[test]
    fn test_signature_ties_break_lexicographically() {
        let texts = vec![
            "alpha beta gamma".to_string(),
            "alpha beta delta".to_string(),
        ];
        let sig = signature(&texts, 3);
        assert_eq!(sig, vec!["alpha", "beta", "delta"]);
    }

    #[test]
    fn test_risk_pressure_neutral_cluster() {
        let texts = vec!["marinate the preferences".to_string()];
        assert_eq!(risk_pressure(&texts), 0.5);
    }

    #[test]
    fn test_risk_pressure_hostile_cluster() {
        let texts = vec![
            "bypass every check silently".to_string(),
            "disable the permanent guard".to_string(),
        ];
        assert_eq!(risk_pressure(&texts), 1.0);
    }

    #[test]
    fn test_clustering_is_deterministic() {
        let samples = vec![
            sample("a", "marinate the user preferences in settings sauce", None),
            sample("b", "marinate the admin preferences in settings sauce", None),
            sample("c", "unrelated phrase entirely", None),
        ];
        let engine = ClusterEngine::new(ClusterConfig::default());
        assert_eq!(engine.cluster(&samples), engine.cluster(&samples));
    }
}
