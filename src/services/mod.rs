//! Domain operations over the injected stores.
//!
//! Lookups return `Option` for absence; mutations return descriptive
//! errors. Handlers own the mapping of `None` to a 404.

pub mod invoices;
pub mod password_reset;
pub mod projects;
pub mod subscriptions;
pub mod users;

use serde::Serialize;
use std::fmt::Display;

use crate::auth::Identity;
use crate::error::ApiError;

pub use invoices::InvoiceService;
pub use password_reset::PasswordResetService;
pub use projects::ProjectService;
pub use subscriptions::SubscriptionService;
pub use users::UserService;

/// Result of the best-effort secondary steps of a removal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CascadeOutcome {
    Complete,
    Partial { failures: Vec<String> },
}

impl CascadeOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, CascadeOutcome::Complete)
    }
}

/// Accumulates secondary failures without aborting the primary operation.
#[derive(Debug, Default)]
pub struct Cascade {
    failures: Vec<String>,
}

impl Cascade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt<T, E: Display>(&mut self, step: &str, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Best-effort step '{}' failed: {}", step, e);
                self.failures.push(format!("{}: {}", step, e));
                None
            }
        }
    }

    pub fn finish(self) -> CascadeOutcome {
        if self.failures.is_empty() {
            CascadeOutcome::Complete
        } else {
            CascadeOutcome::Partial {
                failures: self.failures,
            }
        }
    }
}

/// Callers may only act on records keyed by their own subject id.
pub(crate) fn ensure_self(identity: &Identity, id: &str, action: &str) -> Result<(), ApiError> {
    if identity.subject_id == id {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!("You can only {} your own account", action)))
    }
}
