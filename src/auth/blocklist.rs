//! Revocation blocklist: a monotonic-append set of token fingerprints, time-bounded on
//! read (§4.3, §5). A lookup that times out is treated as a hit — fail-secure, per the
//! open question resolved in SPEC_FULL.md §9.

use super::types::{RevocationEntry, TokenType};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;

/// Default deadline for a blocklist lookup before it fails secure.
pub const DEFAULT_LOOKUP_DEADLINE: Duration = Duration::from_secs(1);

/// Hex-encode the SHA-256 digest of a raw token string.
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Shared, append-mostly table of revoked token fingerprints.
pub struct Blocklist {
    entries: RwLock<HashMap<String, RevocationEntry>>,
    lookup_deadline: Duration,
}

impl Blocklist {
    pub fn new(lookup_deadline: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            lookup_deadline,
        }
    }

    /// Record `token` as revoked. `expires_at` should mirror the token's own `exp`
    /// (epoch seconds) so the entry can be garbage-collected once it can no longer
    /// matter cryptographically.
    pub async fn revoke(
        &self,
        token: &str,
        user_id: &str,
        token_type: TokenType,
        now: i64,
        expires_at: i64,
    ) {
        let entry = RevocationEntry {
            token_fingerprint: fingerprint(token),
            user_id: user_id.to_string(),
            token_type,
            revoked_at: now,
            expires_at,
        };
        let mut guard = self.entries.write().await;
        guard.insert(entry.token_fingerprint.clone(), entry);
    }

    /// Whether `token` has been revoked. A lookup that exceeds the configured deadline,
    /// or any internal failure, is treated identically to a hit.
    pub async fn is_revoked(&self, token: &str, now: i64) -> bool {
        let fp = fingerprint(token);
        match tokio::time::timeout(self.lookup_deadline, self.lookup(&fp, now)).await {
            Ok(found) => found,
            Err(_) => {
                warn!("blocklist lookup exceeded deadline; failing secure (treating as revoked)");
                true
            }
        }
    }

    async fn lookup(&self, fingerprint: &str, now: i64) -> bool {
        let guard = self.entries.read().await;
        match guard.get(fingerprint) {
            Some(entry) => entry.expires_at > now,
            None => false,
        }
    }

    /// Evict entries whose `expires_at` has passed. Safe to call periodically or lazily
    /// on any convenient schedule; correctness never depends on it running.
    pub async fn sweep(&self, now: i64) {
        let mut guard = self.entries.write().await;
        guard.retain(|_, entry| entry.expires_at > now);
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn revoked_token_is_reported_revoked() {
        let bl = Blocklist::new(Duration::from_millis(100));
        assert!(!bl.is_revoked("tok", 1_000).await);
        bl.revoke("tok", "user1", TokenType::Refresh, 1_000, 2_000).await;
        assert!(bl.is_revoked("tok", 1_500).await);
    }

    #[tokio::test]
    async fn expired_entry_is_no_longer_reported_revoked() {
        let bl = Blocklist::new(Duration::from_millis(100));
        bl.revoke("tok", "user1", TokenType::Refresh, 1_000, 2_000).await;
        assert!(!bl.is_revoked("tok", 2_500).await);
    }

    #[tokio::test]
    async fn sweep_evicts_expired_entries() {
        let bl = Blocklist::new(Duration::from_millis(100));
        bl.revoke("tok", "user1", TokenType::Refresh, 1_000, 2_000).await;
        assert_eq!(bl.len().await, 1);
        bl.sweep(3_000).await;
        assert_eq!(bl.len().await, 0);
    }

    #[test]
    fn fingerprint_is_deterministic_hex_sha256() {
        let fp1 = fingerprint("abc");
        let fp2 = fingerprint("abc");
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.len(), 64);
        assert!(fp1.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
