use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Canonical JSON wrapper written for every request.
///
/// Success envelopes always carry `data` (possibly `null`); failure
/// envelopes always carry `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    pub status_code: u16,
}

impl Envelope {
    fn ok<T: Serialize>(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        match serde_json::to_value(&data) {
            Ok(value) => Self {
                success: true,
                message: message.into(),
                data: Some(value),
                error: None,
                status_code: status.as_u16(),
            },
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                Self::server_error("Failed to serialize response data")
            }
        }
    }

    fn failure(status: StatusCode, message: impl Into<String>, error: Value) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(error),
            status_code: status.as_u16(),
        }
    }

    /// 200 OK
    pub fn success<T: Serialize>(message: impl Into<String>, data: T) -> Self {
        Self::ok(StatusCode::OK, message, data)
    }

    /// 201 Created
    pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> Self {
        Self::ok(StatusCode::CREATED, message, data)
    }

    /// 200 OK after a mutation
    pub fn updated<T: Serialize>(message: impl Into<String>, data: T) -> Self {
        Self::ok(StatusCode::OK, message, data)
    }

    /// 200 OK after a removal
    pub fn deleted<T: Serialize>(message: impl Into<String>, data: T) -> Self {
        Self::ok(StatusCode::OK, message, data)
    }

    /// 400 with the list of validation failures as `error`
    pub fn validation_error(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self::failure(StatusCode::BAD_REQUEST, message, json!(errors))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::failure(StatusCode::UNAUTHORIZED, message, json!("UNAUTHORIZED"))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::failure(StatusCode::FORBIDDEN, message, json!("FORBIDDEN"))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::failure(StatusCode::NOT_FOUND, message, json!("NOT_FOUND"))
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::failure(StatusCode::METHOD_NOT_ALLOWED, message, json!("METHOD_NOT_ALLOWED"))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::failure(StatusCode::CONFLICT, message, json!("CONFLICT"))
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            json!("INTERNAL_SERVER_ERROR"),
        )
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Writes status code and JSON body.
    pub fn send(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        self.send()
    }
}

// Convenience type alias
pub type ApiResult = Result<Envelope, crate::error::ApiError>;
