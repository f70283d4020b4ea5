//! Structural hashing for property values.
//!
//! Hashes are deterministic across runs and platforms: values are encoded as
//! domain-separated byte strings and digested with SHA-256, keeping the first
//! eight bytes. An unset value always hashes to [`UNDEFINED_HASH`], and no
//! real value is ever allowed to collide with it.

use sha2::{Digest, Sha256};

/// Hash of a property that holds no value.
pub const UNDEFINED_HASH: u64 = 0;

/// Hashes a tagged value.
///
/// # Arguments
///
/// * `domain` - A short tag naming the value's variant (`"str"`, `"int"`, ...)
/// * `payload` - The value's canonical text
pub(crate) fn hash_value(domain: &str, payload: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    hasher.update([0u8]);
    hasher.update(payload.as_bytes());
    finish(hasher)
}

/// Hashes an ordered sequence of child hashes, optionally keyed.
///
/// Order matters: swapping two children changes the result.
pub(crate) fn hash_children<'a>(
    domain: &str,
    children: impl IntoIterator<Item = (Option<&'a str>, u64)>,
) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    hasher.update([0u8]);
    for (key, hash) in children {
        if let Some(key) = key {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
        }
        hasher.update(hash.to_be_bytes());
        hasher.update(b".");
    }
    finish(hasher)
}

fn finish(hasher: Sha256) -> u64 {
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    match u64::from_be_bytes(bytes) {
        UNDEFINED_HASH => 1,
        hash => hash,
    }
}
