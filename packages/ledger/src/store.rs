//! Olympus-Ledger: Append-Only Stores
//!
//! A store is a JSON array on disk plus its in-memory copy. Appends
//! rewrite the file with deterministic key order and a trailing
//! newline, and register the entry hash with the shared audit chain.
//! There is no update and no delete.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::canonical::{digest, pretty_canonical};
use crate::chain::{AuditChain, ChainLink};

/// Errors raised by ledger persistence.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger I/O error")]
    Io(#[from] std::io::Error),

    #[error("ledger serialization error")]
    Json(#[from] serde_json::Error),

    #[error("audit chain broken at seq {0}")]
    ChainBroken(u64),
}

/// One append-only ledger backed by a JSON array file.
///
/// Single-writer discipline: the owner serializes appends; concurrent
/// readers of a snapshot see a consistent prefix.
#[derive(Debug)]
pub struct AppendOnlyLedger<T> {
    name: &'static str,
    path: PathBuf,
    entries: Vec<T>,
    chain: Arc<Mutex<AuditChain>>,
}

impl<T> AppendOnlyLedger<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Open (or create) the ledger at `path`, wiring it to the shared
    /// audit chain.
    pub fn open(
        name: &'static str,
        path: PathBuf,
        chain: Arc<Mutex<AuditChain>>,
    ) -> Result<Self, LedgerError> {
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            Vec::new()
        };
        debug!(ledger = name, entries = entries.len(), "ledger opened");
        Ok(Self {
            name,
            path,
            entries,
            chain,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append one entry: hash it, link it into the audit chain, and
    /// rewrite the file. The prior entries are never touched.
    pub fn append(&mut self, entry: T) -> Result<ChainLink, LedgerError> {
        let entry_hash = digest(&entry)?;
        self.entries.push(entry);
        self.flush()?;
        let link = self.chain.lock().append(self.name, &entry_hash);
        debug!(ledger = self.name, seq = link.seq, "ledger append");
        Ok(link)
    }

    /// Verify the shared chain; surfaces the first broken seq.
    pub fn verify_chain(&self) -> Result<(), LedgerError> {
        match self.chain.lock().first_break() {
            Some(seq) => Err(LedgerError::ChainBroken(seq)),
            None => Ok(()),
        }
    }

    fn flush(&self) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut body = pretty_canonical(&self.entries)?;
        body.push('\n');
        std::fs::write(&self.path, body)?;
        Ok(())
    }
}

/// Persist the audit chain itself alongside the ledgers.
pub fn flush_chain(chain: &AuditChain, path: &PathBuf) -> Result<(), LedgerError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut body = pretty_canonical(chain)?;
    body.push('\n');
    std::fs::write(path, body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entry {
        id: u32,
        label: String,
    }

    fn ledger(dir: &tempfile::TempDir) -> AppendOnlyLedger<Entry> {
        let chain = Arc::new(Mutex::new(AuditChain::new()));
        AppendOnlyLedger::open("test", dir.path().join("test.json"), chain).unwrap()
    }

    #[test]
    fn test_append_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let chain = Arc::new(Mutex::new(AuditChain::new()));
        {
            let mut l: AppendOnlyLedger<Entry> =
                AppendOnlyLedger::open("test", dir.path().join("test.json"), chain.clone())
                    .unwrap();
            l.append(Entry {
                id: 1,
                label: "first".to_string(),
            })
            .unwrap();
            l.append(Entry {
                id: 2,
                label: "second".to_string(),
            })
            .unwrap();
        }
        let reopened: AppendOnlyLedger<Entry> =
            AppendOnlyLedger::open("test", dir.path().join("test.json"), chain).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.entries()[0].id, 1);
    }

    #[test]
    fn test_file_has_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let mut l = ledger(&dir);
        l.append(Entry {
            id: 1,
            label: "x".to_string(),
        })
        .unwrap();
        let raw = std::fs::read_to_string(dir.path().join("test.json")).unwrap();
        assert!(raw.ends_with('\n'));
    }

    #[test]
    fn test_appends_link_into_chain() {
        let dir = tempfile::tempdir().unwrap();
        let mut l = ledger(&dir);
        let first = l
            .append(Entry {
                id: 1,
                label: "x".to_string(),
            })
            .unwrap();
        let second = l
            .append(Entry {
                id: 2,
                label: "y".to_string(),
            })
            .unwrap();
        assert_eq!(second.prev_hash, first.link_hash);
        l.verify_chain().unwrap();
    }
}
