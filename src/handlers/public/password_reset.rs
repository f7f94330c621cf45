// Password recovery by emailed one-time code.
//
// request → verify (optional, lets a client check the code early) → confirm

use serde_json::{json, Value};

use crate::middleware::{ApiResult, Envelope, RequestContext};
use crate::services::password_reset::{
    ConfirmReset, PasswordResetService, RequestReset, VerifyReset, MIN_PASSWORD_LEN,
};
use crate::state::AppState;
use crate::validation::{is_email, BodyCheck};

fn is_reset_code(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}

fn email_check(body: &Value) -> BodyCheck<'_> {
    BodyCheck::new(body)
        .required_string("email")
        .string_format("email", is_email, "email must be a valid email address")
}

pub fn validate_request(body: &Value) -> Vec<String> {
    email_check(body).finish()
}

pub fn validate_verify(body: &Value) -> Vec<String> {
    email_check(body)
        .required_string("code")
        .string_format("code", is_reset_code, "code must be a 6-digit code")
        .finish()
}

pub fn validate_confirm(body: &Value) -> Vec<String> {
    email_check(body)
        .required_string("code")
        .string_format("code", is_reset_code, "code must be a 6-digit code")
        .required_string("newPassword")
        .min_len("newPassword", MIN_PASSWORD_LEN)
        .finish()
}

/// POST /auth/password-reset/request - Email a reset code
///
/// Responds identically whether or not the address is registered.
pub async fn request(state: AppState, ctx: RequestContext) -> ApiResult {
    let input: RequestReset = ctx.body_as()?;
    PasswordResetService::new(&state).request(input).await?;
    Ok(Envelope::success(
        "If the email is registered, a reset code has been sent",
        Value::Null,
    ))
}

/// POST /auth/password-reset/verify - Check a code without consuming it
pub async fn verify(state: AppState, ctx: RequestContext) -> ApiResult {
    let input: VerifyReset = ctx.body_as()?;
    PasswordResetService::new(&state).verify(&input).await?;
    Ok(Envelope::success("Reset code is valid", json!({"valid": true})))
}

/// POST /auth/password-reset/confirm - Set a new password
pub async fn confirm(state: AppState, ctx: RequestContext) -> ApiResult {
    let input: ConfirmReset = ctx.body_as()?;
    PasswordResetService::new(&state).confirm(input).await?;
    Ok(Envelope::success("Password has been reset", Value::Null))
}
