//! One-way cache keys for bearer credentials.
//!
//! Raw credentials are never kept as map keys or written to logs; the session
//! cache is keyed by the SHA-256 digest of the credential instead.

use sha2::{Digest, Sha256};
use std::fmt;

/// Number of hex characters shown when a fingerprint is logged.
const LOG_PREFIX_LEN: usize = 12;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix suitable for log lines.
    pub fn short(&self) -> &str {
        &self.0[..LOG_PREFIX_LEN.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

/// Derive the cache key for a credential.
///
/// Returns `None` for empty or whitespace-only input so callers fall back to
/// the "no credential" path instead of failing.
pub fn fingerprint(credential: &str) -> Option<Fingerprint> {
    if credential.trim().is_empty() {
        return None;
    }
    let digest = Sha256::digest(credential.as_bytes());
    Some(Fingerprint(hex::encode(digest)))
}
