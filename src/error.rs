//! Unified error taxonomy
//!
//! Every error that can reach a caller (HTTP handler, websocket message) carries a stable
//! string code from this module. Codes are part of the wire contract and must not change.
//!
//! # Design
//! Uses thiserror for ergonomic error definitions. Component-specific error enums convert
//! into [`ApiError`] via `From`, which is the only error type the request surface serializes.

use thiserror::Error;

/// Top-level error type returned by every public operation in this crate.
///
/// Carries a stable `code()` string alongside a human-readable `Display` message. The
/// request surface serializes `code()` verbatim into the JSON error envelope; it never
/// leaks internal error messages for [`ApiError::Internal`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// Validation errors surfaced from the query builder and codec.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// Validation and lifecycle errors from the authentication core.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Errors surfaced by the document store adapter.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Errors surfaced by the live-query multiplexer.
    #[error("multiplexer error: {0}")]
    Multiplexer(#[from] MultiplexerError),

    /// Requested document or blob does not exist.
    #[error("document not found")]
    DocumentNotFound,

    /// Catch-all for anything that should never reach a caller verbatim.
    #[error("internal server error")]
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable error code, part of the wire contract.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Query(e) => e.code(),
            Self::Auth(e) => e.code(),
            Self::Store(e) => e.code(),
            Self::Multiplexer(e) => e.code(),
            Self::DocumentNotFound => "DOCUMENT_NOT_FOUND",
            Self::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Construct an internal error from any displayable cause, logging nothing sensitive.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Errors from the query model, translator and URL codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A condition was appended after `orderBy` had already been set.
    #[error("where must come before orderBy")]
    InvalidQuery,

    /// Malformed query parameters: bad JSON, out-of-range limit/offset, missing fields.
    #[error("invalid query parameters: {0}")]
    InvalidQueryParams(String),

    /// An operator token outside the ten recognized tokens.
    #[error("invalid operator: {0}")]
    InvalidOperator(String),

    /// An otherwise-malformed argument (wrong value shape for the operator, etc).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl QueryError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidQuery => "INVALID_QUERY",
            Self::InvalidQueryParams(_) => "INVALID_QUERY_PARAMS",
            Self::InvalidOperator(_) => "INVALID_OPERATOR",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
        }
    }
}

/// Errors from user credential validation, sign-in, and token handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Email fails the policy in the auth core.
    #[error("invalid email address")]
    InvalidEmail,

    /// Password fails the policy in the auth core; `0` lists the violated rules.
    #[error("invalid password: {0}")]
    InvalidPassword(String),

    /// Email already registered.
    #[error("email already in use")]
    EmailExists,

    /// No user with that email.
    #[error("user not found")]
    UserNotFound,

    /// User exists but `disabled` is set.
    #[error("user account disabled")]
    UserDisabled,

    /// Too many recent failed sign-ins; locked for the remainder of the lockout window.
    #[error("account locked, try again later")]
    AccountLocked,

    /// Password did not match the stored hash.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Token's `exp` has passed.
    #[error("token expired")]
    TokenExpired,

    /// Token fingerprint found in the revocation blocklist.
    #[error("token revoked")]
    TokenRevoked,

    /// Token failed signature verification or carries the wrong `type`.
    #[error("invalid token")]
    InvalidToken,
}

impl AuthError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::InvalidPassword(_) => "INVALID_PASSWORD",
            Self::EmailExists => "EMAIL_EXISTS",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::UserDisabled => "USER_DISABLED",
            Self::AccountLocked => "ACCOUNT_LOCKED",
            // Deliberately the same wire code as a bad password: the policy never reveals
            // which half of the credential pair was wrong.
            Self::InvalidCredentials => "INVALID_PASSWORD",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenRevoked => "TOKEN_REVOKED",
            Self::InvalidToken => "INVALID_TOKEN",
        }
    }
}

/// Errors from the document store adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Establishing the underlying store connection failed at startup.
    #[error("failed to connect to store: {0}")]
    Connect(String),

    /// A write (add/update/delete) was not acknowledged by the store.
    #[error("store write failed: {0}")]
    Write(String),

    /// An operation was attempted before the adapter finished connecting.
    #[error("store not connected")]
    NotConnected,

    /// The native query failed to execute.
    #[error("query execution failed: {0}")]
    QueryExec(String),
}

impl StoreError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Connect(_) => "STORE_CONNECT",
            Self::Write(_) => "STORE_WRITE",
            Self::NotConnected => "STORE_NOT_CONNECTED",
            Self::QueryExec(_) => "QUERY_ERROR",
        }
    }

    /// Whether retrying the same operation might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotConnected)
    }
}

/// Errors from the live-query multiplexer's per-channel protocol handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MultiplexerError {
    /// A message requiring `READY` state arrived before successful `auth`.
    #[error("channel is not authenticated")]
    Unauthorized,

    /// The channel table was already at capacity when the connection was accepted.
    #[error("maximum number of clients reached")]
    MaxClientsReached,

    /// The client sent a message this protocol does not recognize.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl MultiplexerError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::MaxClientsReached => "MAX_CLIENTS_REACHED",
            Self::InvalidMessage(_) => "INVALID_MESSAGE",
        }
    }
}
