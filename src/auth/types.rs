//! Data types for the authentication core: user records, token claims, and the
//! revocation ledger. Mirrors the shape `auth::core` operates on; kept free of any
//! store- or transport-specific detail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Timestamps tracked for every user, mirroring Firebase's `UserMetadata`.
///
/// `#[serde(rename_all = "camelCase")]` here is load-bearing, not cosmetic: `auth::core`
/// patches these fields through [`super::core::AuthCore`]'s `persist_login_state` using
/// the same camelCase wire names, and the store's `update` shallow-merges by key. A
/// mismatched case would silently fork the field into two keys instead of updating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMetadata {
    pub creation_time: DateTime<Utc>,
    pub last_sign_in_time: DateTime<Utc>,
}

/// A user record as stored in the reserved users collection.
///
/// `email` is always lowercased before it reaches this type. `password_hash` is the
/// bcrypt digest, never the raw password. `failed_login_attempts == 0` if and only if
/// `last_failed_login` is `None` — enforced by every write path in [`super::core`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub email_verified: bool,
    pub password_hash: String,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub disabled: bool,
    pub failed_login_attempts: u32,
    /// Epoch milliseconds of the most recent failed sign-in, or `None`.
    pub last_failed_login: Option<i64>,
    pub metadata: UserMetadata,
    pub custom_claims: Option<Json>,
}

impl UserRecord {
    /// A user is locked out if the failure threshold has been crossed and the lockout
    /// window (measured from the last failure) has not yet elapsed.
    pub fn is_locked_out(&self, now_ms: i64, threshold: u32, window_ms: i64) -> bool {
        if self.failed_login_attempts < threshold {
            return false;
        }
        match self.last_failed_login {
            Some(last) => now_ms < last + window_ms,
            None => false,
        }
    }
}

/// Which half of the token pair a [`TokenClaims`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT payload, shared by access and refresh tokens; only `type` and the lifetime
/// distinguish them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_claims: Option<Json>,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

/// The `{accessToken, refreshToken, expiresIn}` bundle returned by register/login/refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in milliseconds, not a timestamp.
    pub expires_in: i64,
}

/// One entry in the revocation blocklist, keyed externally by `token_fingerprint`.
#[derive(Debug, Clone)]
pub struct RevocationEntry {
    pub token_fingerprint: String,
    pub user_id: String,
    pub token_type: TokenType,
    pub revoked_at: i64,
    /// Mirrors the revoked token's `exp`; entries past this are garbage.
    pub expires_at: i64,
}
