//! Operator API keys
//!
//! Keys are never stored. The config holds sha256 hex digests and
//! requests are checked by hashing the presented key.

use sha2::{Digest, Sha256};

/// API Key prefix for identification
const API_KEY_PREFIX: &str = "swp_";

/// Hash an API key for storage using SHA-256
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a fresh random key: `swp_<32 hex chars>`
pub fn generate_api_key() -> String {
    format!("{}{}", API_KEY_PREFIX, uuid::Uuid::new_v4().simple())
}

/// Compare two digests without bailing out on the first differing byte.
fn digests_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Set of accepted key digests
#[derive(Debug, Clone, Default)]
pub struct ApiKeySet {
    hashes: Vec<String>,
}

impl ApiKeySet {
    pub fn new(hashes: &[String]) -> Self {
        Self {
            hashes: hashes
                .iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// An empty set disables operator authentication.
    pub fn is_enabled(&self) -> bool {
        !self.hashes.is_empty()
    }

    pub fn verify(&self, key: &str) -> bool {
        let digest = hash_api_key(key);
        self.hashes
            .iter()
            .fold(false, |found, h| found | digests_equal(h, &digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_lowercase_sha256_hex() {
        assert_eq!(
            hash_api_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn generated_keys_verify_against_their_hash() {
        let key = generate_api_key();
        assert!(key.starts_with("swp_"));
        assert_eq!(key.len(), 4 + 32);

        let set = ApiKeySet::new(&[hash_api_key(&key).to_uppercase()]);
        assert!(set.is_enabled());
        assert!(set.verify(&key));
        assert!(!set.verify("swp_wrong"));
    }

    #[test]
    fn blank_entries_leave_auth_disabled() {
        let set = ApiKeySet::new(&["  ".to_string()]);
        assert!(!set.is_enabled());
    }
}
