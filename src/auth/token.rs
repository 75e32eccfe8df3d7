//! Bearer token validation.
//!
//! # Purpose
//! Parses and verifies HS256-signed bearer tokens into [`Claims`] using the
//! shared signing key from configuration.
//!
//! # Security considerations
//! - Malformed, badly signed, and expired tokens all collapse into the same
//!   external outcome; the attached detail echoes the library parse error but
//!   never the signing key.
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity claims decoded from a verified bearer token.
///
/// Constructed once per request and discarded when the request ends. An empty
/// `perms` list means "derive grants from roles"; a non-empty list is the
/// complete grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub perms: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Bearer token required")]
    MissingBearer,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("insufficient permission: requires one of [{required}], resolved [{resolved}]")]
    InsufficientScope { required: String, resolved: String },
}

/// Verify a bearer token and decode its claims.
///
/// # Errors
/// - [`AuthError::InvalidToken`] when the token is malformed, carries an
///   invalid signature, or is expired.
pub fn validate_token(token: &str, signing_key: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(signing_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|err| AuthError::InvalidToken(err.to_string()))
}

/// Mint a signed token for the given identity.
///
/// Used by operator tooling and tests; the serving path only verifies.
pub fn mint_token(
    signing_key: &str,
    subject: &str,
    roles: Vec<String>,
    perms: Vec<String>,
    ttl_seconds: i64,
) -> Result<String, AuthError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: subject.to_string(),
        roles,
        perms,
        exp: now + ttl_seconds,
        iat: now,
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key.as_bytes()),
    )
    .map_err(|err| AuthError::InvalidToken(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "test-signing-key";

    #[test]
    fn round_trip_valid_token() {
        let token = mint_token(KEY, "alice", vec!["read".to_string()], vec![], 60).expect("mint");
        let claims = validate_token(&token, KEY).expect("validate");
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.roles, vec!["read".to_string()]);
        assert!(claims.perms.is_empty());
    }

    #[test]
    fn rejects_malformed_token() {
        let err = validate_token("not-a-jwt", KEY).expect_err("malformed");
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn rejects_wrong_signature() {
        let token = mint_token("other-key", "alice", vec![], vec![], 60).expect("mint");
        let err = validate_token(&token, KEY).expect_err("signature");
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn rejects_expired_token() {
        let token = mint_token(KEY, "alice", vec![], vec![], -120).expect("mint");
        let err = validate_token(&token, KEY).expect_err("expired");
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn error_detail_never_contains_signing_key() {
        let token = mint_token("other-key", "alice", vec![], vec![], 60).expect("mint");
        let err = validate_token(&token, KEY).expect_err("signature");
        assert!(!err.to_string().contains(KEY));
    }
}
