//! Authentication core: email/password policy, bcrypt hashing, lockout, and JWT
//! access/refresh tokens with revocation.

pub mod blocklist;
pub mod core;
pub mod policy;
pub mod types;

pub use self::core::{AuthCore, AuthSettings, JwtSecret, USERS_COLLECTION};
pub use types::{TokenBundle, TokenClaims, TokenType, UserMetadata, UserRecord};
