use axum::{
    body::Bytes,
    extract::State,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::Actor,
    entities::{consignment, consignment_document},
    handlers::extract::{AppJson, AppPath, AppQuery},
    services::{
        consignments::{
            AttachDocument, ConsignmentCounts, ConsignmentDetail, ConsignmentListQuery,
            DgItemDetail, HoverDetails, ReviewDecision,
        },
        workflow::StepOutcome,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/consignments", get(list_consignments).post(create_consignment))
        .route("/consignments/counts", get(get_counts))
        .route("/consignments/:id", get(get_consignment))
        .route("/consignments/:id/hover", get(hover_details))
        .route("/consignments/:id/dangerous-goods", get(dg_item_details))
        .route("/consignments/:id/steps/:step", post(submit_step))
        .route("/consignments/:id/review", post(review_consignment))
        .route("/consignments/:id/cancel", post(cancel_consignment))
        .route("/consignments/:id/documents", post(attach_document))
        .route("/documents/:id", delete(remove_document))
}

pub async fn create_consignment(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<consignment::Model> {
    let created = state.services.consignments.create_draft(&actor).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn list_consignments(
    State(state): State<AppState>,
    actor: Actor,
    AppQuery(query): AppQuery<ConsignmentListQuery>,
) -> ApiResult<PaginatedResponse<consignment::Model>> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(20);
    let (items, total) = state
        .services
        .consignments
        .list_consignments(&actor, query)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

pub async fn get_counts(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<ConsignmentCounts> {
    let counts = state.services.consignments.get_counts(&actor).await?;
    Ok(Json(ApiResponse::success(counts)))
}

pub async fn get_consignment(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<ConsignmentDetail> {
    let detail = state.services.consignments.get_consignment(&actor, id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

pub async fn hover_details(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<HoverDetails> {
    let details = state
        .services
        .consignments
        .consignment_hover_details(&actor, id)
        .await?;
    Ok(Json(ApiResponse::success(details)))
}

pub async fn dg_item_details(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Vec<DgItemDetail>> {
    let items = state.services.consignments.dg_item_details(&actor, id).await?;
    Ok(Json(ApiResponse::success(items)))
}

/// Wizard step submission; the payload shape depends on the step.
pub async fn submit_step(
    State(state): State<AppState>,
    actor: Actor,
    AppPath((id, step)): AppPath<(Uuid, i32)>,
    AppJson(input): AppJson<serde_json::Value>,
) -> ApiResult<StepOutcome> {
    let outcome = state
        .services
        .workflow
        .handle_step(&actor, id, step, input)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn review_consignment(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
    AppJson(decision): AppJson<ReviewDecision>,
) -> ApiResult<consignment::Model> {
    let updated = state
        .services
        .consignments
        .review_consignment(&actor, id, decision)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn cancel_consignment(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<consignment::Model> {
    let cancelled = state
        .services
        .consignments
        .cancel_consignment(&actor, id)
        .await?;
    Ok(Json(ApiResponse::success(cancelled)))
}

#[derive(Debug, Deserialize)]
pub struct AttachDocumentParams {
    pub po_line_id: Uuid,
    pub file_name: String,
    pub document_type: String,
}

/// Raw file body; metadata travels in the query string.
pub async fn attach_document(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
    AppQuery(params): AppQuery<AttachDocumentParams>,
    body: Bytes,
) -> ApiResult<consignment_document::Model> {
    let document = state
        .services
        .consignments
        .attach_document(
            &actor,
            AttachDocument {
                consignment_id: id,
                po_line_id: params.po_line_id,
                file_name: params.file_name,
                document_type: params.document_type,
                bytes: body.to_vec(),
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(document)))
}

pub async fn remove_document(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<()> {
    state.services.consignments.remove_document(&actor, id).await?;
    Ok(Json(ApiResponse::success(())))
}
