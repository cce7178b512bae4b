//! Olympus-Ledger: Canonical JSON
//!
//! Both replay hashes and chain entry hashes are computed over a
//! canonical form: recursively sorted object keys, compact encoding,
//! UTF-8. `serde_json`'s default map is ordered, so routing any
//! serializable value through `Value` yields sorted keys for free.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Canonical compact encoding of any serializable value.
pub fn canonical_string<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    serde_json::to_string(&v)
}

/// Pretty encoding with the same deterministic key order, used for the
/// persisted ledger files (plus the trailing newline the store adds).
pub fn pretty_canonical<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    serde_json::to_string_pretty(&v)
}

/// SHA-256 hex digest of the canonical form of a value.
pub fn digest<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(digest_str(&canonical_string(value)?))
}

/// SHA-256 hex digest of a raw string.
pub fn digest_str(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_are_sorted() {
        let v = json!({"zeta": 1, "alpha": {"nested_z": 2, "nested_a": 3}});
        let s = canonical_string(&v).unwrap();
        assert_eq!(
            s,
            r#"{"alpha":{"nested_a":3,"nested_z":2},"zeta":1}"#
        );
    }

    #[test]
    fn test_digest_is_stable() {
        let a = json!({"b": 2, "a": 1});
        let b = json!({"a": 1, "b": 2});
        assert_eq!(digest(&a).unwrap(), digest(&b).unwrap());
    }

    #[test]
    fn test_digest_str_is_sha256_hex() {
        let d = digest_str("olympus");
        assert_eq!(d.len(), 64);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
