use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TABLE: &str = "password_resets";

/// Wrong guesses tolerated before a code is dead.
pub const MAX_ATTEMPTS: u32 = 5;

/// Pending reset code. Only the SHA-256 of the code is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordReset {
    pub id: String,
    pub user_id: String,
    pub email: String,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl PasswordReset {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.attempts < MAX_ATTEMPTS && self.expires_at > now
    }
}
