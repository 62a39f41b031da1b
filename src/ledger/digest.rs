//! Block digest function.

use sha2::{Digest, Sha256};

/// Deterministic one-way digest producing lowercase hexadecimal.
pub trait HashFunction: Send + Sync {
    fn digest(&self, input: &str) -> String;
}

/// SHA-256 over the UTF-8 bytes of the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hash;

impl HashFunction for Sha256Hash {
    fn digest(&self, input: &str) -> String {
        hex::encode(Sha256::digest(input.as_bytes()))
    }
}

/// Whether `hash` starts with `difficulty` `'0'` characters.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}
