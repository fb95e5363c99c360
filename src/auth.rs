//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs carrying `{user_id, username}` and, when a TTL is
//! configured, an `exp` claim.  Verification pins the algorithm: a token
//! whose header names any other algorithm is rejected before its signature
//! is checked.
//!
//! Argon2 password hashing lives here as well.

use std::collections::HashSet;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The only algorithm tokens are signed and accepted with.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

// ── Identity and claims ─────────────────────────────────────────────

/// The authenticated caller, attached to the request for protected routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
}

/// JWT claims embedded in issued tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub username: String,
    /// Expiry (seconds since epoch). Absent when tokens do not expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// Why a request failed authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    Missing,
    #[error("Authorization header must be `Bearer <token>`")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
}

// ── Gate ────────────────────────────────────────────────────────────

/// Issues and verifies bearer tokens with a single shared secret.
pub struct AuthGate {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl_seconds: u64,
}

impl AuthGate {
    /// Build a gate for `secret`. A `token_ttl_seconds` of `0` issues
    /// non-expiring tokens.
    pub fn new(secret: &str, token_ttl_seconds: u64) -> Self {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::new();
        if token_ttl_seconds > 0 {
            validation.required_spec_claims.insert("exp".to_string());
        }

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            token_ttl_seconds,
        }
    }

    /// Sign a token for `identity`.
    pub fn issue_token(&self, identity: &Identity) -> anyhow::Result<String> {
        let exp = (self.token_ttl_seconds > 0)
            .then(|| jsonwebtoken::get_current_timestamp() + self.token_ttl_seconds);
        let claims = Claims {
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            exp,
        };
        let token = encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("JWT encoding failed: {e}"))?;
        Ok(token)
    }

    /// Verify `token` and return the identity it carries.
    pub fn verify_token(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(e.to_string()),
            }
        })?;

        let claims = data.claims;
        if claims.user_id.is_empty() || claims.username.is_empty() {
            return Err(AuthError::Invalid("missing identity claims".to_string()));
        }

        Ok(Identity {
            user_id: claims.user_id,
            username: claims.username,
        })
    }

    /// Authenticate a raw `Authorization` header value.
    pub fn authenticate(&self, header: Option<&str>) -> Result<Identity, AuthError> {
        let header = header.ok_or(AuthError::Missing)?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Malformed)?;
        self.verify_token(token)
    }
}

// ── Passwords ───────────────────────────────────────────────────────

/// Hash `password` into an argon2 PHC string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

/// Verify a candidate password against an argon2 hash string.
///
/// Returns `false` for unparseable hashes.
pub fn verify_password(hash: &str, candidate: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}
