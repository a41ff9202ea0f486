//! Token validation seam consumed by content services.
//!
//! # Responsibility
//! - Define the contract every token validator satisfies.
//! - Provide an in-memory validator for embedding hosts and tests.
//!
//! # Invariants
//! - A token either resolves to exactly one user or fails; there is no
//!   anonymous user.
//! - Token issuance, password hashing and signing live outside this crate.

use crate::model::item::{now_epoch_ms, UserId};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::RwLock;

pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication failures reported by validators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Caller supplied no token (or only whitespace).
    MissingToken,
    /// Token is unknown or malformed.
    UnknownToken,
    /// Token was valid but its lifetime has ended.
    Expired { expired_at: i64 },
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingToken => write!(f, "token is missing"),
            Self::UnknownToken => write!(f, "token is not recognized"),
            Self::Expired { expired_at } => write!(f, "token expired at {expired_at}"),
        }
    }
}

impl Error for AuthError {}

/// Resolves bearer tokens to user identifiers.
pub trait TokenValidator: Send + Sync {
    /// Returns the user the token belongs to.
    fn validate_token(&self, token: &str) -> AuthResult<UserId>;
}

/// Checks presence first, then delegates to the validator.
pub fn authenticate(validator: &dyn TokenValidator, token: Option<&str>) -> AuthResult<UserId> {
    match token.map(str::trim) {
        None | Some("") => Err(AuthError::MissingToken),
        Some(token) => validator.validate_token(token),
    }
}

#[derive(Debug, Clone)]
struct TokenGrant {
    user: UserId,
    expires_at: Option<i64>,
}

/// Token table held in process memory.
#[derive(Debug, Default)]
pub struct StaticTokenValidator {
    grants: RwLock<HashMap<String, TokenGrant>>,
}

impl StaticTokenValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token that never expires.
    pub fn grant(&self, token: impl Into<String>, user: impl Into<UserId>) {
        self.insert(token.into(), user.into(), None);
    }

    /// Registers a token valid until `expires_at` (epoch ms, exclusive).
    pub fn grant_until(&self, token: impl Into<String>, user: impl Into<UserId>, expires_at: i64) {
        self.insert(token.into(), user.into(), Some(expires_at));
    }

    /// Revokes a token; returns whether it existed.
    pub fn revoke(&self, token: &str) -> bool {
        match self.grants.write() {
            Ok(mut grants) => grants.remove(token).is_some(),
            Err(poisoned) => poisoned.into_inner().remove(token).is_some(),
        }
    }

    fn insert(&self, token: String, user: UserId, expires_at: Option<i64>) {
        let grant = TokenGrant { user, expires_at };
        match self.grants.write() {
            Ok(mut grants) => grants.insert(token, grant),
            Err(poisoned) => poisoned.into_inner().insert(token, grant),
        };
    }
}

impl TokenValidator for StaticTokenValidator {
    fn validate_token(&self, token: &str) -> AuthResult<UserId> {
        let grants = match self.grants.read() {
            Ok(grants) => grants,
            Err(poisoned) => poisoned.into_inner(),
        };
        let grant = grants.get(token).ok_or(AuthError::UnknownToken)?;
        if let Some(expires_at) = grant.expires_at {
            if now_epoch_ms() >= expires_at {
                return Err(AuthError::Expired {
                    expired_at: expires_at,
                });
            }
        }
        Ok(grant.user.clone())
    }
}
