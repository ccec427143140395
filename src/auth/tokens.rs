use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id, stringified.
    pub sub: String,
    /// Expiration time (unix seconds).
    pub exp: i64,
    #[serde(rename = "type")]
    pub kind: TokenKind,
}

/// Stateless session tokens: HS256-signed claims, nothing stored
/// server-side. The issuer only guarantees signature and expiry; kind and
/// subject resolution are the caller's checks.
pub struct TokenService {
    secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: String, access_ttl_minutes: i64, refresh_ttl_days: i64) -> Self {
        Self {
            secret,
            access_ttl: Duration::minutes(access_ttl_minutes),
            refresh_ttl: Duration::days(refresh_ttl_days),
        }
    }

    pub fn issue_access(&self, subject: i64) -> Result<String, AuthError> {
        self.issue(subject, TokenKind::Access, self.access_ttl)
    }

    pub fn issue_refresh(&self, subject: i64) -> Result<String, AuthError> {
        self.issue(subject, TokenKind::Refresh, self.refresh_ttl)
    }

    fn issue(&self, subject: i64, kind: TokenKind, ttl: Duration) -> Result<String, AuthError> {
        let claims = Claims {
            sub: subject.to_string(),
            exp: (Utc::now() + ttl).timestamp(),
            kind,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|_| AuthError::InvalidToken)
    }

    /// Decode and signature-check. Bad signature, malformed structure and
    /// expiry all collapse to `InvalidToken`.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|_| AuthError::InvalidToken)
    }
}
