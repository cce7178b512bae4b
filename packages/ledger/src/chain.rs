//! Olympus-Ledger: Global Audit Chain
//!
//! Every ledger append also appends `{prev_hash, entry_hash}` here, so
//! any mutation of a prior entry breaks the chain on verify.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::digest_str;

/// Hash of the empty chain head.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// One link of the audit chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainLink {
    /// Position in the chain, starting at 0
    pub seq: u64,
    /// Name of the ledger the entry landed in
    pub ledger: String,
    /// Canonical digest of the appended entry
    pub entry_hash: String,
    /// Hash of the previous link (genesis for seq 0)
    pub prev_hash: String,
    /// Hash of this link: H(seq | ledger | entry_hash | prev_hash)
    pub link_hash: String,
    /// Append timestamp (not part of any hash)
    pub timestamp: DateTime<Utc>,
}

/// The in-memory audit chain. Single writer; readers see a consistent
/// prefix.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AuditChain {
    links: Vec<ChainLink>,
}

impl AuditChain {
    pub fn new() -> Self {
        Self { links: Vec::new() }
    }

    pub fn from_links(links: Vec<ChainLink>) -> Self {
        Self { links }
    }

    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    fn head_hash(&self) -> String {
        self.links
            .last()
            .map(|l| l.link_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string())
    }

    /// Append a link for an entry already written to `ledger`.
    pub fn append(&mut self, ledger: &str, entry_hash: &str) -> ChainLink {
        let seq = self.links.len() as u64;
        let prev_hash = self.head_hash();
        let link_hash = link_digest(seq, ledger, entry_hash, &prev_hash);
        let link = ChainLink {
            seq,
            ledger: ledger.to_string(),
            entry_hash: entry_hash.to_string(),
            prev_hash,
            link_hash,
            timestamp: Utc::now(),
        };
        self.links.push(link.clone());
        link
    }

    /// Walk the chain and recompute every link hash. Returns the seq of
    /// the first broken link, or None when the chain is intact.
    pub fn first_break(&self) -> Option<u64> {
        let mut prev = GENESIS_HASH.to_string();
        for link in &self.links {
            if link.prev_hash != prev {
                return Some(link.seq);
            }
            let expected = link_digest(link.seq, &link.ledger, &link.entry_hash, &link.prev_hash);
            if link.link_hash != expected {
                return Some(link.seq);
            }
            prev = link.link_hash.clone();
        }
        None
    }

    pub fn verify(&self) -> bool {
        self.first_break().is_none()
    }
}

fn link_digest(seq: u64, ledger: &str, entry_hash: &str, prev_hash: &str) -> String {
    digest_str(&format!("{seq}|{ledger}|{entry_hash}|{prev_hash}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_prev() {
        let mut chain = AuditChain::new();
        let link = chain.append("attributions", "abc");
        assert_eq!(link.seq, 0);
        assert_eq!(link.prev_hash, GENESIS_HASH);
        assert!(chain.verify());
    }

    #[test]
    fn test_links_chain_forward() {
        let mut chain = AuditChain::new();
        let first = chain.append("attributions", "aaa");
        let second = chain.append("fates", "bbb");
        assert_eq!(second.prev_hash, first.link_hash);
        assert!(chain.verify());
    }

    #[test]
    fn test_tamper_is_detected() {
        let mut chain = AuditChain::new();
        chain.append("attributions", "aaa");
        chain.append("fates", "bbb");
        let mut links = chain.links().to_vec();
        links[0].entry_hash = "tampered".to_string();
        let tampered = AuditChain::from_links(links);
        assert_eq!(tampered.first_break(), Some(0));
    }
}
