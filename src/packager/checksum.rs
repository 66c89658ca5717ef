//! Artifact checksum calculation.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of an artifact (64 characters)
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    for chunk in content.chunks(8192) {
        hasher.update(chunk);
    }
    format!("{:x}", hasher.finalize())
}
