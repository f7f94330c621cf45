use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::auth::{Claims, Identity};
use crate::error::ApiError;

const BEARER_PREFIX: &str = "Bearer ";

/// Validates bearer credentials against the shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verifies an `Authorization` header value and returns the caller identity.
    pub fn verify(&self, authorization: Option<&str>) -> Result<Identity, ApiError> {
        let header = authorization
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let token = header.strip_prefix(BEARER_PREFIX).ok_or_else(|| {
            ApiError::unauthorized("Authorization header must use Bearer token format")
        })?;

        if token.trim().is_empty() {
            return Err(ApiError::unauthorized("Empty JWT token"));
        }

        let token_data = decode::<Claims>(token.trim(), &self.key, &self.validation)
            .map_err(|e| {
                tracing::debug!("Rejected bearer token: {}", e);
                ApiError::unauthorized("Invalid or expired token")
            })?;

        Ok(Identity::from(token_data.claims))
    }

    /// Reads the `Authorization` header from a request's headers and verifies it.
    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<Identity, ApiError> {
        let value = match headers.get(AUTHORIZATION) {
            Some(value) => Some(value.to_str().map_err(|_| {
                ApiError::unauthorized("Invalid Authorization header format")
            })?),
            None => None,
        };
        self.verify(value)
    }
}
