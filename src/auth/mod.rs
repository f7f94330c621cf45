pub mod admin;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use admin::{AuthAdmin, MemoryAuthAdmin, SupabaseAuthAdmin};

/// Signed claims carried by a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(sub: impl Into<String>, email: impl Into<String>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: sub.into(),
            email: email.into(),
            exp,
            iat: now.timestamp(),
        }
    }
}

/// Caller identity decoded from verified claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub subject_id: String,
    pub email: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            subject_id: claims.sub,
            email: claims.email,
            issued_at: timestamp(claims.iat),
            expires_at: timestamp(claims.exp),
        }
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT generation error: {0}")]
    Generation(String),
    #[error("Invalid JWT secret")]
    InvalidSecret,
}

/// Signs claims with the shared HS256 secret.
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    expiry_hours: u64,
}

impl TokenIssuer {
    pub fn new(secret: &str, expiry_hours: u64) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::InvalidSecret);
        }
        Ok(Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            expiry_hours,
        })
    }

    pub fn issue(&self, sub: &str, email: &str) -> Result<String, TokenError> {
        self.sign(&Claims::new(sub, email, self.expiry_hours))
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::default(), claims, &self.key)
            .map_err(|e| TokenError::Generation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(TokenIssuer::new("", 1), Err(TokenError::InvalidSecret)));
    }

    #[test]
    fn claims_expire_after_configured_hours() {
        let claims = Claims::new("u1", "a@example.com", 2);
        assert_eq!(claims.exp - claims.iat, 2 * 3600);
    }

    #[test]
    fn identity_carries_claim_fields() {
        let identity = Identity::from(Claims {
            sub: "u1".into(),
            email: "a@example.com".into(),
            iat: 1_700_000_000,
            exp: 1_700_003_600,
        });
        assert_eq!(identity.subject_id, "u1");
        assert_eq!(identity.issued_at.timestamp(), 1_700_000_000);
        assert_eq!(identity.expires_at.timestamp(), 1_700_003_600);
    }
}
