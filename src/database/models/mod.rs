pub mod invoice;
pub mod password_reset;
pub mod plan;
pub mod project;
pub mod subscription;
pub mod user;

pub use invoice::{Invoice, InvoiceStatus};
pub use password_reset::PasswordReset;
pub use plan::{BillingInterval, Plan};
pub use project::{Project, ProjectStatus};
pub use subscription::{Subscription, SubscriptionStatus};
pub use user::User;
