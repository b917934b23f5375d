//! Auth Core: user lifecycle, sign-in with lockout, and the access/refresh token scheme
//! (§4.3). The store adapter is the system of record for user documents; this module adds
//! policy, hashing, locking, and JWT plumbing on top of it.

use super::blocklist::Blocklist;
use super::policy::{validate_email, validate_password};
use super::types::{TokenBundle, TokenClaims, TokenType, UserMetadata, UserRecord};
use crate::error::{AuthError, StoreError};
use crate::query::translator::translate;
use crate::query::{FilterOperator, QueryModel};
use crate::store::StoreAdapter;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Reserved collection holding user records, addressed through the same
/// [`StoreAdapter`] every document collection uses.
pub const USERS_COLLECTION: &str = "_auth_users";

const LOCKOUT_THRESHOLD: u32 = 5;
const LOCKOUT_WINDOW_MS: i64 = 15 * 60 * 1000;
const BCRYPT_COST: u32 = 10;

/// Tunables for token lifetimes and the lockout/blocklist deadlines, resolved once from
/// [`crate::config::Config`] at startup.
#[derive(Clone)]
pub struct AuthSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub blocklist_deadline: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            blocklist_deadline: super::blocklist::DEFAULT_LOOKUP_DEADLINE,
        }
    }
}

/// The JWT signing secret. Never printed or logged; [`std::fmt::Debug`] redacts it.
#[derive(Clone)]
pub struct JwtSecret(Arc<String>);

impl JwtSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Arc::new(secret.into()))
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtSecret(<redacted>)")
    }
}

/// Owning component for the authentication subsystem: wraps the store adapter with
/// policy, per-user serialization, token issuance, and the revocation blocklist.
pub struct AuthCore {
    store: Arc<dyn StoreAdapter>,
    secret: JwtSecret,
    settings: AuthSettings,
    blocklist: Blocklist,
    user_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl AuthCore {
    pub fn new(store: Arc<dyn StoreAdapter>, secret: JwtSecret, settings: AuthSettings) -> Self {
        let blocklist_deadline = settings.blocklist_deadline;
        Self {
            store,
            secret,
            settings,
            blocklist: Blocklist::new(blocklist_deadline),
            user_locks: RwLock::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.user_locks.read().await.get(user_id) {
            return lock.clone();
        }
        let mut guard = self.user_locks.write().await;
        guard
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Create a new user. Validates email and password policy, rejects duplicate
    /// emails, and hashes the password off the shared scheduler (§5).
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        display_name: Option<String>,
        photo_url: Option<String>,
    ) -> Result<UserRecord, AuthError> {
        let email = validate_email(email)?;
        validate_password(password)?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailExists);
        }

        let password_hash = hash_password(password).await?;
        let now = Utc::now();
        let record = UserRecord {
            id: String::new(), // overwritten by the store-assigned id below
            email,
            email_verified: false,
            password_hash,
            display_name,
            photo_url,
            disabled: false,
            failed_login_attempts: 0,
            last_failed_login: None,
            metadata: UserMetadata {
                creation_time: now,
                last_sign_in_time: now,
            },
            custom_claims: None,
        };

        let doc = serde_json::to_value(&record).map_err(|e| {
            warn!("failed to serialize new user record: {e}");
            AuthError::InvalidEmail
        })?;
        let id = self
            .store
            .add(USERS_COLLECTION, doc)
            .await
            .map_err(store_error_to_auth)?;

        info!(user_id = %id, "user created");
        Ok(UserRecord { id, ..record })
    }

    /// Validate credentials and issue a token pair. Applies the lockout policy and
    /// updates the failed-attempt counter or sign-in timestamp as a single serialized
    /// per-user operation (§5).
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<TokenBundle, AuthError> {
        let email = validate_email(email)?;
        let record = self
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if record.disabled {
            return Err(AuthError::UserDisabled);
        }

        let lock = self.lock_for(&record.id).await;
        let _guard = lock.lock().await;

        // Re-read under the per-user lock: another request may have just failed or
        // succeeded and changed the lockout state.
        let record = self
            .store
            .get(USERS_COLLECTION, &record.id)
            .await
            .map_err(store_error_to_auth)?
            .ok_or(AuthError::UserNotFound)?;
        let mut record: UserRecord = serde_json::from_value(record).map_err(|e| {
            warn!("failed to deserialize user record: {e}");
            AuthError::UserNotFound
        })?;

        let now_ms = Utc::now().timestamp_millis();
        if record.is_locked_out(now_ms, LOCKOUT_THRESHOLD, LOCKOUT_WINDOW_MS) {
            return Err(AuthError::AccountLocked);
        }

        if !verify_password(password, &record.password_hash).await {
            record.failed_login_attempts += 1;
            record.last_failed_login = Some(now_ms);
            self.persist_login_state(&record).await?;
            if record.failed_login_attempts >= LOCKOUT_THRESHOLD {
                return Err(AuthError::AccountLocked);
            }
            return Err(AuthError::InvalidCredentials);
        }

        record.failed_login_attempts = 0;
        record.last_failed_login = None;
        record.metadata.last_sign_in_time = Utc::now();
        self.persist_login_state(&record).await?;

        self.issue_tokens(&record)
    }

    async fn persist_login_state(&self, record: &UserRecord) -> Result<(), AuthError> {
        let patch = json!({
            "failedLoginAttempts": record.failed_login_attempts,
            "lastFailedLogin": record.last_failed_login,
            "metadata": record.metadata,
        });
        self.store
            .update(USERS_COLLECTION, &record.id, patch)
            .await
            .map_err(store_error_to_auth)
    }

    /// Verify a refresh token, ensure it has not been revoked, blocklist it (single-use),
    /// and issue a fresh pair for the same user.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenBundle, AuthError> {
        let claims = self.verify_token(refresh_token, TokenType::Refresh).await?;

        let record = self
            .store
            .get(USERS_COLLECTION, &claims.sub)
            .await
            .map_err(store_error_to_auth)?
            .ok_or(AuthError::UserNotFound)?;
        let record: UserRecord = serde_json::from_value(record).map_err(|e| {
            warn!("failed to deserialize user record: {e}");
            AuthError::UserNotFound
        })?;
        if record.disabled {
            return Err(AuthError::UserDisabled);
        }

        let now = Utc::now().timestamp();
        self.blocklist
            .revoke(refresh_token, &record.id, TokenType::Refresh, now, claims.exp)
            .await;

        self.issue_tokens(&record)
    }

    /// Verify a token's signature, expiry, and type. Blocklist lookup happens before
    /// cryptographic verification so revocation is honored even for a still-valid token
    /// (§4.3).
    pub async fn verify_token(
        &self,
        token: &str,
        expected_type: TokenType,
    ) -> Result<TokenClaims, AuthError> {
        let now = Utc::now().timestamp();
        if self.blocklist.is_revoked(token, now).await {
            return Err(AuthError::TokenRevoked);
        }

        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_exp = false; // expiry is checked explicitly below for a precise error code
        let data = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.secret.0.as_bytes()),
            &validation,
        )
        .map_err(|_| AuthError::InvalidToken)?;
        let claims = data.claims;

        if claims.token_type != expected_type {
            return Err(AuthError::InvalidToken);
        }
        if claims.exp < now {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }

    /// Revoke a token outright (e.g. explicit sign-out), independent of refresh flow.
    pub async fn revoke_token(&self, token: &str, claims: &TokenClaims) {
        let now = Utc::now().timestamp();
        self.blocklist
            .revoke(token, &claims.sub, claims.token_type, now, claims.exp)
            .await;
    }

    fn issue_tokens(&self, record: &UserRecord) -> Result<TokenBundle, AuthError> {
        let now = Utc::now().timestamp();
        let access_exp = now + self.settings.access_ttl.as_secs() as i64;
        let refresh_exp = now + self.settings.refresh_ttl.as_secs() as i64;

        let access_claims = TokenClaims {
            sub: record.id.clone(),
            email: record.email.clone(),
            display_name: record.display_name.clone(),
            custom_claims: record.custom_claims.clone(),
            token_type: TokenType::Access,
            iat: now,
            exp: access_exp,
        };
        let refresh_claims = TokenClaims {
            exp: refresh_exp,
            token_type: TokenType::Refresh,
            ..access_claims.clone()
        };

        let key = EncodingKey::from_secret(self.secret.0.as_bytes());
        let access_token = encode(&Header::new(jsonwebtoken::Algorithm::HS256), &access_claims, &key)
            .map_err(|_| AuthError::InvalidToken)?;
        let refresh_token = encode(&Header::new(jsonwebtoken::Algorithm::HS256), &refresh_claims, &key)
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(TokenBundle {
            access_token,
            refresh_token,
            expires_in: self.settings.access_ttl.as_millis() as i64,
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        let query = QueryModel::new()
            .where_cond("email", FilterOperator::Equal, json!(email))
            .map_err(|_| AuthError::UserNotFound)?;
        let (filter, ..) = translate(&query);
        let sort: Option<(&str, i8)> = None;
        let docs = self
            .store
            .query(USERS_COLLECTION, &filter, sort, None, Some(1))
            .await
            .map_err(store_error_to_auth)?;
        match docs.into_iter().next() {
            Some(doc) => {
                let record: UserRecord = serde_json::from_value(doc).map_err(|e| {
                    warn!("failed to deserialize user record: {e}");
                    AuthError::UserNotFound
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

fn store_error_to_auth(err: StoreError) -> AuthError {
    warn!("auth core store operation failed: {err}");
    // The auth surface only exposes auth-shaped errors; store failures during sign-in
    // are rare (disk/network) and are folded into "user not found" rather than leaking
    // a store error code through an auth endpoint.
    AuthError::UserNotFound
}

async fn hash_password(password: &str) -> Result<String, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST))
        .await
        .map_err(|_| AuthError::InvalidPassword("password hashing failed".to_string()))?
        .map_err(|_| AuthError::InvalidPassword("password hashing failed".to_string()))
}

async fn verify_password(password: &str, hash: &str) -> bool {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .unwrap_or(Ok(false))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn core() -> AuthCore {
        AuthCore::new(
            Arc::new(MemoryStore::new()),
            JwtSecret::new("test-secret"),
            AuthSettings::default(),
        )
    }

    #[tokio::test]
    async fn create_user_rejects_weak_password() {
        let auth = core();
        let err = auth
            .create_user("user@example.com", "weak", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PASSWORD");
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_email() {
        let auth = core();
        auth.create_user("user@example.com", "Str0ng!Pass", None, None)
            .await
            .unwrap();
        let err = auth
            .create_user("User@Example.com", "Str0ng!Pass", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "EMAIL_EXISTS");
    }

    #[tokio::test]
    async fn sign_in_round_trips_and_issues_tokens() {
        let auth = core();
        auth.create_user("user@example.com", "Str0ng!Pass", None, None)
            .await
            .unwrap();
        let bundle = auth.sign_in("user@example.com", "Str0ng!Pass").await.unwrap();
        assert!(!bundle.access_token.is_empty());
        let claims = auth
            .verify_token(&bundle.access_token, TokenType::Access)
            .await
            .unwrap();
        assert_eq!(claims.email, "user@example.com");
    }

    #[tokio::test]
    async fn five_failed_attempts_lock_the_account() {
        let auth = core();
        auth.create_user("user@example.com", "Str0ng!Pass", None, None)
            .await
            .unwrap();
        for _ in 0..4 {
            let err = auth.sign_in("user@example.com", "wrong").await.unwrap_err();
            assert_eq!(err.code(), "INVALID_PASSWORD");
        }
        let err = auth.sign_in("user@example.com", "wrong").await.unwrap_err();
        assert_eq!(err.code(), "ACCOUNT_LOCKED");

        // Even the correct password is rejected while locked.
        let err = auth.sign_in("user@example.com", "Str0ng!Pass").await.unwrap_err();
        assert_eq!(err.code(), "ACCOUNT_LOCKED");
    }

    #[tokio::test]
    async fn refresh_twice_yields_one_success_then_revoked() {
        let auth = core();
        auth.create_user("user@example.com", "Str0ng!Pass", None, None)
            .await
            .unwrap();
        let bundle = auth.sign_in("user@example.com", "Str0ng!Pass").await.unwrap();
        let refreshed = auth.refresh(&bundle.refresh_token).await.unwrap();
        assert!(!refreshed.access_token.is_empty());
        let err = auth.refresh(&bundle.refresh_token).await.unwrap_err();
        assert_eq!(err.code(), "TOKEN_REVOKED");
    }
}
