//! Versioned JSON API over the quote engine services.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use quoteflow_core::collab::{DraftContext, DraftJobId};
use quoteflow_core::domain::line_item::LineItemDraft;
use quoteflow_core::domain::order::{CustomerOrder, SupplierPurchaseOrder};
use quoteflow_core::domain::quote::{CustomerId, QuoteId, QuoteStatus, TenantId};
use quoteflow_core::errors::EngineError;
use quoteflow_core::workflow::machine::WorkflowAction;
use quoteflow_db::{
    BulkSetItems, ConversionService, DraftService, LedgerService, QuoteService, ServiceError,
    TransitionRequest, VersioningService, WorkflowService,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bootstrap::Application;

#[derive(Clone)]
pub struct ApiState {
    pub quotes: QuoteService,
    pub ledger: LedgerService,
    pub workflow: WorkflowService,
    pub versioning: VersioningService,
    pub conversion: ConversionService,
    pub drafts: DraftService,
}

impl From<&Application> for ApiState {
    fn from(app: &Application) -> Self {
        Self {
            quotes: app.quotes.clone(),
            ledger: app.ledger.clone(),
            workflow: app.workflow.clone(),
            versioning: app.versioning.clone(),
            conversion: app.conversion.clone(),
            drafts: app.drafts.clone(),
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/quotes", post(create_quote))
        .route("/api/v1/quotes/{id}", get(get_quote))
        .route("/api/v1/quotes/{id}/items", put(set_items))
        .route("/api/v1/quotes/{id}/transition", post(transition))
        .route("/api/v1/quotes/{id}/workflow-log", get(workflow_log))
        .route("/api/v1/quotes/{id}/amend", post(amend))
        .route("/api/v1/quotes/{id}/convert", post(convert))
        .route("/api/v1/quotes/{id}/draft", post(request_draft))
        .route("/api/v1/quotes/{id}/draft/complete", post(complete_draft))
        .with_state(state)
}

struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        Self(error)
    }
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        Self(ServiceError::Engine(error))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    retryable: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, retryable) = match &self.0 {
            ServiceError::Engine(engine) => {
                let status = match engine {
                    EngineError::Validation(_) => StatusCode::BAD_REQUEST,
                    EngineError::QuoteNotFound(_) => StatusCode::NOT_FOUND,
                    EngineError::Conflict { .. } | EngineError::AlreadyHasChildVersion => {
                        StatusCode::CONFLICT
                    }
                    EngineError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    EngineError::LockedForEditing(_) => StatusCode::LOCKED,
                    EngineError::Conversion(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, engine.is_retryable())
            }
            ServiceError::Database(_) | ServiceError::Decode(_) => {
                tracing::error!(event_name = "api.internal_error", error = %self.0);
                (StatusCode::INTERNAL_SERVER_ERROR, false)
            }
        };

        let body = ErrorBody { error: self.0.to_string(), retryable };
        (status, Json(body)).into_response()
    }
}

#[derive(Deserialize)]
struct CreateQuoteBody {
    tenant_id: String,
    customer_id: String,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default = "default_true")]
    manual_mode: bool,
    actor_id: String,
}

fn default_true() -> bool {
    true
}

async fn create_quote(
    State(state): State<ApiState>,
    Json(body): Json<CreateQuoteBody>,
) -> Result<impl IntoResponse, ApiError> {
    let quote = state
        .quotes
        .create_quote(
            TenantId(body.tenant_id),
            CustomerId(body.customer_id),
            body.currency,
            body.manual_mode,
            &body.actor_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(quote)))
}

async fn get_quote(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.quotes.get(&QuoteId(id)).await?;
    Ok(Json(snapshot))
}

#[derive(Deserialize)]
struct SetItemsBody {
    items: Vec<LineItemDraft>,
    #[serde(default)]
    tax_rate: Option<Decimal>,
    #[serde(default)]
    discount_amount: Option<Decimal>,
}

async fn set_items(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<SetItemsBody>,
) -> Result<impl IntoResponse, ApiError> {
    let breakdown = state
        .ledger
        .bulk_set_items(BulkSetItems {
            quote_id: QuoteId(id),
            items: body.items,
            tax_rate: body.tax_rate,
            discount_amount: body.discount_amount,
        })
        .await?;

    Ok(Json(breakdown))
}

#[derive(Deserialize)]
struct TransitionBody {
    action: String,
    actor_id: String,
    #[serde(default)]
    actor_is_approver: bool,
    #[serde(default)]
    expected_status: Option<String>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

async fn transition(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<TransitionBody>,
) -> Result<impl IntoResponse, ApiError> {
    let action = WorkflowAction::parse(&body.action).ok_or_else(|| {
        EngineError::Validation(format!("unknown workflow action `{}`", body.action))
    })?;
    let expected_status = body
        .expected_status
        .as_deref()
        .map(|raw| {
            QuoteStatus::parse(raw)
                .ok_or_else(|| EngineError::Validation(format!("unknown quote status `{raw}`")))
        })
        .transpose()?;

    let quote = state
        .workflow
        .transition(TransitionRequest {
            quote_id: QuoteId(id),
            action,
            actor_id: body.actor_id,
            actor_is_approver: body.actor_is_approver,
            expected_status,
            comment: body.comment,
            reason: body.reason,
        })
        .await?;

    Ok(Json(quote))
}

async fn workflow_log(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state.quotes.workflow_log(&QuoteId(id)).await?;
    Ok(Json(entries))
}

#[derive(Deserialize)]
struct AmendBody {
    actor_id: String,
}

async fn amend(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<AmendBody>,
) -> Result<impl IntoResponse, ApiError> {
    let child = state.versioning.amend(&QuoteId(id), &body.actor_id).await?;
    Ok((StatusCode::CREATED, Json(child)))
}

#[derive(Deserialize)]
struct ConvertBody {
    actor_id: String,
    #[serde(default)]
    po_number: Option<String>,
}

#[derive(Serialize)]
struct ConvertResponse {
    order: CustomerOrder,
    purchase_orders: Vec<SupplierPurchaseOrder>,
    created: bool,
}

async fn convert(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<ConvertBody>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .conversion
        .convert_to_order(&QuoteId(id), body.po_number, &body.actor_id)
        .await?;

    let status = if outcome.created { StatusCode::CREATED } else { StatusCode::OK };
    let response = ConvertResponse {
        order: outcome.order,
        purchase_orders: outcome.purchase_orders,
        created: outcome.created,
    };
    Ok((status, Json(response)))
}

#[derive(Deserialize)]
struct DraftBody {
    prompt: String,
    #[serde(default)]
    context: DraftContext,
}

async fn request_draft(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<DraftBody>,
) -> Result<impl IntoResponse, ApiError> {
    let quote = state.drafts.request_draft(&QuoteId(id), &body.prompt, &body.context).await?;
    Ok((StatusCode::ACCEPTED, Json(quote)))
}

#[derive(Deserialize)]
struct DraftCompleteBody {
    job_id: String,
    #[serde(default)]
    items: Vec<LineItemDraft>,
    #[serde(default)]
    error: Option<String>,
}

async fn complete_draft(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<DraftCompleteBody>,
) -> Result<impl IntoResponse, ApiError> {
    let quote_id = QuoteId(id);
    let job = DraftJobId(body.job_id);

    let quote = match body.error {
        Some(reason) => state.drafts.fail_draft(&quote_id, &job, &reason).await?,
        None => state.drafts.complete_draft(&quote_id, &job, body.items).await?,
    };

    Ok(Json(quote))
}
