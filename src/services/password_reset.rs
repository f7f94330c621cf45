use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::users::normalize_email;
use crate::auth::AuthAdmin;
use crate::database::models::{password_reset, user, PasswordReset, User};
use crate::database::models::password_reset::MAX_ATTEMPTS;
use crate::database::{Repository, RowQuery};
use crate::error::ApiError;
use crate::mail::{Mailer, Message};
use crate::state::AppState;

pub const MIN_PASSWORD_LEN: usize = 8;
const INVALID_CODE: &str = "Invalid or expired reset code";

#[derive(Debug, Deserialize)]
pub struct RequestReset {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyReset {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmReset {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// `None` writes `null`, releasing a claimed code.
#[derive(Serialize)]
struct UsedPatch {
    used_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct AttemptsPatch {
    attempts: u32,
}

/// Emailed one-time codes for password recovery.
pub struct PasswordResetService {
    users: Repository<User>,
    resets: Repository<PasswordReset>,
    mailer: Arc<dyn Mailer>,
    auth_admin: Arc<dyn AuthAdmin>,
    ttl: Duration,
}

impl PasswordResetService {
    pub fn new(state: &AppState) -> Self {
        Self {
            users: Repository::new(user::TABLE, state.rows.clone()),
            resets: Repository::new(password_reset::TABLE, state.rows.clone()),
            mailer: state.mailer.clone(),
            auth_admin: state.auth_admin.clone(),
            ttl: Duration::minutes(state.config.auth.password_reset_ttl_minutes),
        }
    }

    /// Succeeds whether or not the address belongs to a user.
    pub async fn request(&self, input: RequestReset) -> Result<(), ApiError> {
        let email = normalize_email(&input.email);
        let Some(user) = self.users.find_by("email", email.as_str()).await? else {
            info!("Password reset requested for unknown address");
            return Ok(());
        };

        self.resets
            .delete_where(RowQuery::new().eq("email", email.as_str()))
            .await?;

        let code = generate_code();
        let now = Utc::now();
        let record = PasswordReset {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            email: email.clone(),
            code_hash: hash_code(&email, &code),
            expires_at: now + self.ttl,
            used_at: None,
            attempts: 0,
            created_at: now,
        };
        self.resets.insert(&record).await?;

        let message = Message {
            to: email,
            subject: "Your password reset code".to_string(),
            text: format!(
                "Your password reset code is {}. It expires in {} minutes.",
                code,
                self.ttl.num_minutes()
            ),
        };
        self.mailer.send(message).await.map_err(|e| {
            error!("Failed to send reset code to user {}: {}", user.id, e);
            ApiError::internal_server_error("Failed to send reset code")
        })?;
        info!("Issued password reset code for user {}", user.id);
        Ok(())
    }

    /// The pending reset matching `code`, if still usable. Every mismatch
    /// counts against the code; after `MAX_ATTEMPTS` it stops verifying.
    pub async fn verify(&self, input: &VerifyReset) -> Result<PasswordReset, ApiError> {
        let email = normalize_email(&input.email);
        let query = RowQuery::new()
            .eq("email", email.as_str())
            .order_by("created_at", true);
        let Some(reset) = self
            .resets
            .select_one(query)
            .await?
            .filter(|reset| reset.is_usable(Utc::now()))
        else {
            return Err(ApiError::bad_request(INVALID_CODE));
        };

        if reset.code_hash == hash_code(&email, input.code.trim()) {
            return Ok(reset);
        }
        self.record_failure(reset).await?;
        Err(ApiError::bad_request(INVALID_CODE))
    }

    /// Bumps the attempt counter. The update is conditional on the count
    /// read, so concurrent wrong guesses cannot overwrite each other.
    /// Retries are bounded; a lost race that never settles is logged.
    async fn record_failure(&self, mut reset: PasswordReset) -> Result<(), ApiError> {
        for _ in 0..MAX_ATTEMPTS {
            if reset.attempts >= MAX_ATTEMPTS {
                return Ok(());
            }
            let query = RowQuery::new()
                .eq("id", reset.id.as_str())
                .eq("attempts", reset.attempts);
            let patch = AttemptsPatch { attempts: reset.attempts + 1 };
            if !self.resets.update_where(query, &patch).await?.is_empty() {
                if patch.attempts >= MAX_ATTEMPTS {
                    warn!("Reset code for user {} locked after {} wrong attempts", reset.user_id, MAX_ATTEMPTS);
                }
                return Ok(());
            }
            match self.resets.find_by_id(&reset.id).await? {
                Some(current) => reset = current,
                None => return Ok(()),
            }
        }
        warn!("Could not record failed reset attempt for user {}", reset.user_id);
        Ok(())
    }

    pub async fn confirm(&self, input: ConfirmReset) -> Result<(), ApiError> {
        if input.new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::bad_request(format!(
                "newPassword must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let reset = self
            .verify(&VerifyReset {
                email: input.email,
                code: input.code,
            })
            .await?;

        // Claim the code before touching the account; only one confirm wins.
        let claim = RowQuery::new()
            .eq("id", reset.id.as_str())
            .eq("used_at", Value::Null);
        let claimed = self
            .resets
            .update_where(claim, &UsedPatch { used_at: Some(Utc::now()) })
            .await?;
        if claimed.is_empty() {
            return Err(ApiError::bad_request(INVALID_CODE));
        }

        if let Err(e) = self
            .auth_admin
            .update_password(&reset.user_id, &input.new_password)
            .await
        {
            if let Err(release) = self
                .resets
                .update_by_id(&reset.id, &UsedPatch { used_at: None })
                .await
            {
                warn!("Failed to release reset code for user {}: {}", reset.user_id, release);
            }
            return Err(e.into());
        }
        info!("Password reset completed for user {}", reset.user_id);
        Ok(())
    }
}

fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

fn hash_code(email: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}
