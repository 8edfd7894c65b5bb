/// Lead submission endpoints and the admin lead inbox
use crate::{
    api::extract::{parse_id, ClientIp, JsonOrForm},
    auth::AdminAuthContext,
    context::AppContext,
    error::{CmsError, CmsResult},
    leads::{
        ContactSubmission, LeadPage, LeadQuery, LeadRecord, LeadSubmission,
        ProductInquirySubmission, QuoteRequestSubmission,
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

/// Build lead routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/leads/contact", post(submit_contact))
        .route("/api/leads/product-inquiry", post(submit_product_inquiry))
        .route("/api/leads/quote-request", post(submit_quote_request))
        .route("/admin/leads", get(list_leads))
        .route("/admin/leads/:id", get(get_lead).delete(delete_lead))
        .route("/admin/leads/:id/toggle-read", post(toggle_read))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionAccepted {
    success: bool,
    id: Uuid,
    message: &'static str,
}

/// Honeypot hits are turned away before they can spend the client's budget
async fn accept(
    ctx: &AppContext,
    client: ClientIp,
    submission: LeadSubmission,
) -> CmsResult<impl IntoResponse> {
    if submission.is_spam() {
        tracing::warn!("Rejected {} submission from {}: honeypot filled", submission.kind(), client.0);
        return Err(CmsError::Spam);
    }
    ctx.rate_limiter.check_lead_submission(client.0)?;
    let lead = ctx.leads.submit(submission).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmissionAccepted {
            success: true,
            id: lead.id,
            message: "Thank you! We will be in touch shortly.",
        }),
    ))
}

async fn submit_contact(
    State(ctx): State<AppContext>,
    client: ClientIp,
    JsonOrForm(form): JsonOrForm<ContactSubmission>,
) -> CmsResult<impl IntoResponse> {
    accept(&ctx, client, LeadSubmission::Contact(form)).await
}

async fn submit_product_inquiry(
    State(ctx): State<AppContext>,
    client: ClientIp,
    JsonOrForm(form): JsonOrForm<ProductInquirySubmission>,
) -> CmsResult<impl IntoResponse> {
    accept(&ctx, client, LeadSubmission::ProductInquiry(form)).await
}

async fn submit_quote_request(
    State(ctx): State<AppContext>,
    client: ClientIp,
    JsonOrForm(form): JsonOrForm<QuoteRequestSubmission>,
) -> CmsResult<impl IntoResponse> {
    accept(&ctx, client, LeadSubmission::QuoteRequest(form)).await
}

async fn list_leads(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Query(query): Query<LeadQuery>,
) -> CmsResult<Json<LeadPage>> {
    Ok(Json(ctx.leads.list(&query).await?))
}

async fn get_lead(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<Json<LeadRecord>> {
    Ok(Json(ctx.leads.get(parse_id(&id, "Lead")?).await?))
}

async fn toggle_read(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<Json<LeadRecord>> {
    Ok(Json(ctx.leads.toggle_read(parse_id(&id, "Lead")?).await?))
}

async fn delete_lead(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<StatusCode> {
    ctx.leads.delete(parse_id(&id, "Lead")?).await?;
    Ok(StatusCode::NO_CONTENT)
}
