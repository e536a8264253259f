//! Credential hashing for the auth shell. The rest of the system treats the
//! stored hash as an opaque string.

use sha2::{Digest, Sha256};

/// The username doubles as a salt so equal passwords do not produce equal
/// hashes across accounts.
pub fn hash_credential(username: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update([0x1f]);
    hasher.update(password.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

pub fn verify_credential(username: &str, password: &str, stored_hash: &str) -> bool {
    hash_credential(username, password) == stored_hash
}
