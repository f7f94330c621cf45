use axum::http::Method;
use serde_json::Value;

use crate::error::ApiError;
use crate::handlers::unsupported;
use crate::middleware::{ApiResult, Envelope, RequestContext};
use crate::services::invoices::{CreateInvoice, InvoiceService};
use crate::state::AppState;
use crate::validation::BodyCheck;

pub fn validate_collection(body: &Value) -> Vec<String> {
    BodyCheck::new(body).required_string("subscriptionId").finish()
}

/// GET /invoices - Caller's invoices, newest first
/// POST /invoices - Bill a subscription period
pub async fn collection(state: AppState, ctx: RequestContext) -> ApiResult {
    let user_id = ctx.identity()?.subject_id.as_str();
    let service = InvoiceService::new(&state);

    match ctx.method {
        Method::GET => {
            let invoices = service.list(user_id).await?;
            Ok(Envelope::success("Invoices retrieved", invoices))
        }
        Method::POST => {
            let input: CreateInvoice = ctx.body_as()?;
            let invoice = service.create(user_id, input).await?;
            Ok(Envelope::created("Invoice created", invoice))
        }
        _ => Err(unsupported(&ctx)),
    }
}

/// GET /invoices/:id
pub async fn item(state: AppState, ctx: RequestContext) -> ApiResult {
    let user_id = ctx.identity()?.subject_id.as_str();
    let id = ctx.param("id")?;
    match InvoiceService::new(&state).get(user_id, id).await? {
        Some(invoice) => Ok(Envelope::success("Invoice retrieved", invoice)),
        None => Err(ApiError::not_found("Invoice not found")),
    }
}

/// POST /invoices/:id/pay - Mark an open invoice paid
pub async fn pay(state: AppState, ctx: RequestContext) -> ApiResult {
    let user_id = ctx.identity()?.subject_id.as_str();
    let id = ctx.param("id")?;
    let invoice = InvoiceService::new(&state).pay(user_id, id).await?;
    Ok(Envelope::updated("Invoice paid", invoice))
}
