// HTTP API Error Types
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::database::StoreError;
use crate::middleware::response::Envelope;

/// Category an error belongs to. The response boundary maps on this tag,
/// never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Unauthenticated,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
        }
    }

    pub fn error_code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Unauthenticated => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Internal => "INTERNAL_SERVER_ERROR",
        }
    }
}

/// Infers an error kind from free-form message text.
///
/// Only used for failures that arrive untyped (remote store messages).
/// Case-insensitive, first match wins.
pub fn classify(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("validation") || lower.contains("required") {
        ErrorKind::Validation
    } else if lower.contains("not found") || lower.contains("access denied") {
        ErrorKind::NotFound
    } else if lower.contains("already exists") || lower.contains("duplicate") {
        ErrorKind::Conflict
    } else {
        ErrorKind::Internal
    }
}

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    // 400 Bad Request
    ValidationError { message: String, errors: Vec<String> },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 405 Method Not Allowed
    MethodNotAllowed { method: String, allowed: Vec<String> },

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::ValidationError { .. } => ErrorKind::Validation,
            ApiError::Unauthorized(_) => ErrorKind::Unauthenticated,
            ApiError::Forbidden(_) => ErrorKind::Forbidden,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::MethodNotAllowed { .. } => ErrorKind::MethodNotAllowed,
            ApiError::Conflict(_) => ErrorKind::Conflict,
            ApiError::InternalServerError(_) => ErrorKind::Internal,
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Get client-safe error message
    pub fn message(&self) -> String {
        match self {
            ApiError::ValidationError { message, .. } => message.clone(),
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InternalServerError(msg) => msg.clone(),
            ApiError::MethodNotAllowed { method, .. } => format!("Method {} not allowed", method),
        }
    }

    /// Error detail placed in the envelope's `error` field
    pub fn detail(&self) -> Value {
        match self {
            ApiError::ValidationError { errors, .. } => json!(errors),
            other => json!(other.kind().error_code()),
        }
    }

    /// Builds an error of the given kind.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Validation => ApiError::ValidationError {
                errors: vec![message.clone()],
                message,
            },
            ErrorKind::Unauthenticated => ApiError::Unauthorized(message),
            ErrorKind::Forbidden => ApiError::Forbidden(message),
            ErrorKind::NotFound => ApiError::NotFound(message),
            ErrorKind::MethodNotAllowed => ApiError::MethodNotAllowed {
                method: message,
                allowed: Vec::new(),
            },
            ErrorKind::Conflict => ApiError::Conflict(message),
            ErrorKind::Internal => ApiError::InternalServerError(message),
        }
    }

    pub fn into_envelope(self) -> Envelope {
        match &self {
            ApiError::ValidationError { message, errors } => {
                Envelope::validation_error(message.clone(), errors.clone())
            }
            ApiError::Unauthorized(msg) => Envelope::unauthorized(msg.clone()),
            ApiError::Forbidden(msg) => Envelope::forbidden(msg.clone()),
            ApiError::NotFound(msg) => Envelope::not_found(msg.clone()),
            ApiError::MethodNotAllowed { .. } => Envelope::method_not_allowed(self.message()),
            ApiError::Conflict(msg) => Envelope::conflict(msg.clone()),
            ApiError::InternalServerError(msg) => Envelope::server_error(msg.clone()),
        }
    }
}

// Static constructor methods
impl ApiError {
    /// Validation failure with a single error line equal to the message
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::Validation, message)
    }

    pub fn validation(message: impl Into<String>, errors: Vec<String>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            errors,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn method_not_allowed(method: impl Into<String>, allowed: Vec<String>) -> Self {
        ApiError::MethodNotAllowed {
            method: method.into(),
            allowed,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }
}

// Convert other error types to ApiError
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(msg) => ApiError::conflict(msg),
            StoreError::NotFound(msg) => ApiError::not_found(msg),
            StoreError::Remote { status, message } => {
                let kind = classify(&message);
                if kind == ErrorKind::Internal {
                    // Don't expose internal store errors to clients
                    tracing::error!("Remote store error ({}): {}", status, message);
                    return ApiError::internal_server_error(
                        "An error occurred while processing your request",
                    );
                }
                ApiError::from_kind(kind, message)
            }
            StoreError::ConfigMissing(key) => {
                tracing::error!("Store misconfigured, missing {}", key);
                ApiError::internal_server_error("Service is not configured")
            }
            StoreError::Http(e) => {
                tracing::error!("Store transport error: {}", e);
                ApiError::internal_server_error("Data store unavailable")
            }
            StoreError::Json(e) => {
                tracing::error!("Store payload error: {}", e);
                ApiError::internal_server_error("Unexpected data store response")
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {}", err);
        ApiError::internal_server_error("Failed to format response")
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let allowed = match &self {
            ApiError::MethodNotAllowed { allowed, .. } if !allowed.is_empty() => {
                Some(allowed.join(", "))
            }
            _ => None,
        };
        let mut response = self.into_envelope().into_response();
        if let Some(allow) = allowed.and_then(|a| a.parse().ok()) {
            response.headers_mut().insert(axum::http::header::ALLOW, allow);
        }
        response
    }
}
