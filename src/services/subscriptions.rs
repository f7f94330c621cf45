use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::database::models::{plan, subscription, Plan, Subscription, SubscriptionStatus};
use crate::database::{Repository, RowQuery};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscription {
    pub plan_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscription {
    pub auto_renew: Option<bool>,
    pub plan_id: Option<String>,
}

#[derive(Serialize)]
struct SubscriptionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<SubscriptionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auto_renew: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cancelled_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl SubscriptionPatch {
    fn at(now: DateTime<Utc>) -> Self {
        Self {
            status: None,
            auto_renew: None,
            plan_id: None,
            cancelled_at: None,
            updated_at: now,
        }
    }
}

pub struct SubscriptionService {
    plans: Repository<Plan>,
    subscriptions: Repository<Subscription>,
}

impl SubscriptionService {
    pub fn new(state: &AppState) -> Self {
        Self {
            plans: Repository::new(plan::TABLE, state.rows.clone()),
            subscriptions: Repository::new(subscription::TABLE, state.rows.clone()),
        }
    }

    /// Active plans, cheapest first.
    pub async fn list_plans(&self) -> Result<Vec<Plan>, ApiError> {
        let query = RowQuery::new()
            .eq("is_active", true)
            .order_by("price_cents", false);
        Ok(self.plans.select_any(query).await?)
    }

    /// Active plan by id; inactive plans read as absent.
    pub async fn find_plan(&self, plan_id: &str) -> Result<Option<Plan>, ApiError> {
        Ok(self
            .plans
            .find_by_id(plan_id)
            .await?
            .filter(|plan| plan.is_active))
    }

    pub async fn create(&self, user_id: &str, input: CreateSubscription) -> Result<Subscription, ApiError> {
        let plan = self
            .find_plan(&input.plan_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Plan not found"))?;

        let active = RowQuery::new()
            .eq("user_id", user_id)
            .eq("status", "active");
        if self.subscriptions.select_one(active).await?.is_some() {
            return Err(ApiError::conflict("Active subscription already exists"));
        }

        let now = Utc::now();
        let record = Subscription {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            plan_id: plan.id.clone(),
            status: SubscriptionStatus::Active,
            auto_renew: true,
            current_period_start: now,
            current_period_end: plan.interval.period_end(now),
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        let created = self.subscriptions.insert(&record).await?;
        info!("User {} subscribed to plan {}", user_id, plan.id);
        Ok(created)
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<Subscription>, ApiError> {
        let query = RowQuery::new()
            .eq("user_id", user_id)
            .order_by("created_at", true);
        Ok(self.subscriptions.select_any(query).await?)
    }

    pub async fn get(&self, user_id: &str, id: &str) -> Result<Option<Subscription>, ApiError> {
        let query = RowQuery::new().eq("id", id).eq("user_id", user_id);
        Ok(self.subscriptions.select_one(query).await?)
    }

    pub async fn update(&self, user_id: &str, id: &str, input: UpdateSubscription) -> Result<Subscription, ApiError> {
        let existing = self.require(user_id, id).await?;
        if existing.status == SubscriptionStatus::Cancelled {
            return Err(ApiError::bad_request("Cancelled subscriptions cannot be changed"));
        }
        if let Some(plan_id) = &input.plan_id {
            self.find_plan(plan_id)
                .await?
                .ok_or_else(|| ApiError::not_found("Plan not found"))?;
        }

        let mut patch = SubscriptionPatch::at(Utc::now());
        patch.auto_renew = input.auto_renew;
        patch.plan_id = input.plan_id;
        self.save(id, &patch).await
    }

    /// Idempotent: a repeated cancel keeps the first `cancelled_at`.
    pub async fn cancel(&self, user_id: &str, id: &str) -> Result<Subscription, ApiError> {
        let existing = self.require(user_id, id).await?;
        let now = Utc::now();

        let mut patch = SubscriptionPatch::at(now);
        patch.status = Some(SubscriptionStatus::Cancelled);
        patch.auto_renew = Some(false);
        patch.cancelled_at = Some(existing.cancelled_at.unwrap_or(now));
        let cancelled = self.save(id, &patch).await?;
        info!("Subscription {} cancelled", id);
        Ok(cancelled)
    }

    async fn require(&self, user_id: &str, id: &str) -> Result<Subscription, ApiError> {
        self.get(user_id, id)
            .await?
            .ok_or_else(|| ApiError::not_found("Subscription not found"))
    }

    async fn save(&self, id: &str, patch: &SubscriptionPatch) -> Result<Subscription, ApiError> {
        self.subscriptions
            .update_by_id(id, patch)
            .await?
            .ok_or_else(|| ApiError::not_found("Subscription not found"))
    }
}
