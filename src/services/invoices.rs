use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::database::models::{invoice, plan, subscription, Invoice, InvoiceStatus, Plan, Subscription};
use crate::database::{Repository, RowQuery};
use crate::error::ApiError;
use crate::state::AppState;

pub const PAYMENT_TERM_DAYS: i64 = 14;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoice {
    pub subscription_id: String,
}

#[derive(Serialize)]
struct PaidPatch {
    status: InvoiceStatus,
    paid_at: DateTime<Utc>,
}

pub struct InvoiceService {
    invoices: Repository<Invoice>,
    subscriptions: Repository<Subscription>,
    plans: Repository<Plan>,
}

impl InvoiceService {
    pub fn new(state: &AppState) -> Self {
        Self {
            invoices: Repository::new(invoice::TABLE, state.rows.clone()),
            subscriptions: Repository::new(subscription::TABLE, state.rows.clone()),
            plans: Repository::new(plan::TABLE, state.rows.clone()),
        }
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<Invoice>, ApiError> {
        let query = RowQuery::new()
            .eq("user_id", user_id)
            .order_by("issued_at", true);
        Ok(self.invoices.select_any(query).await?)
    }

    pub async fn get(&self, user_id: &str, id: &str) -> Result<Option<Invoice>, ApiError> {
        let query = RowQuery::new().eq("id", id).eq("user_id", user_id);
        Ok(self.invoices.select_one(query).await?)
    }

    /// Bills one period of the subscription's plan.
    pub async fn create(&self, user_id: &str, input: CreateInvoice) -> Result<Invoice, ApiError> {
        let query = RowQuery::new()
            .eq("id", input.subscription_id.as_str())
            .eq("user_id", user_id);
        let subscription = self
            .subscriptions
            .select_one(query)
            .await?
            .ok_or_else(|| ApiError::not_found("Subscription not found"))?;
        let plan = self
            .plans
            .find_by_id(&subscription.plan_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Plan not found"))?;

        let now = Utc::now();
        let record = Invoice {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            subscription_id: subscription.id,
            number: invoice_number(now),
            amount_cents: plan.price_cents,
            currency: plan.currency,
            status: InvoiceStatus::Open,
            issued_at: now,
            due_at: now + Duration::days(PAYMENT_TERM_DAYS),
            paid_at: None,
        };
        let created = self.invoices.insert(&record).await?;
        info!("Issued invoice {} to {}", created.number, user_id);
        Ok(created)
    }

    pub async fn pay(&self, user_id: &str, id: &str) -> Result<Invoice, ApiError> {
        let existing = self
            .get(user_id, id)
            .await?
            .ok_or_else(|| ApiError::not_found("Invoice not found"))?;
        if existing.status == InvoiceStatus::Paid {
            return Err(ApiError::conflict("Invoice already paid"));
        }

        let patch = PaidPatch {
            status: InvoiceStatus::Paid,
            paid_at: Utc::now(),
        };
        let paid = self
            .invoices
            .update_by_id(id, &patch)
            .await?
            .ok_or_else(|| ApiError::not_found("Invoice not found"))?;
        info!("Invoice {} paid", paid.number);
        Ok(paid)
    }
}

/// `INV-YYYYMMDD-XXXXXXXX` with eight random uppercase hex digits.
pub fn invoice_number(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("INV-{}-{}", at.format("%Y%m%d"), suffix)
}
