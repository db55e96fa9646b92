use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use uuid::Uuid;

use crate::{
    auth::{Actor, Capability},
    handlers::extract::{AppJson, AppPath},
    services::allocation::{AllocateRequest, AllocationResult, LineAllocationSummary, LineQuantities},
    ApiResponse, ApiResult, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/allocations", post(allocate))
        .route("/allocations/:id", delete(deallocate))
        .route("/po-lines/:id/allocations", get(get_allocated_summary))
}

pub async fn allocate(
    State(state): State<AppState>,
    actor: Actor,
    AppJson(request): AppJson<AllocateRequest>,
) -> ApiResult<AllocationResult> {
    let result = state.services.allocations.allocate(&actor, request).await?;
    Ok(Json(ApiResponse::success(result)))
}

pub async fn deallocate(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<LineQuantities> {
    let line = state.services.allocations.deallocate(&actor, id).await?;
    Ok(Json(ApiResponse::success(line)))
}

pub async fn get_allocated_summary(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(po_line_id): AppPath<Uuid>,
) -> ApiResult<LineAllocationSummary> {
    actor.require(Capability::ViewConsignments)?;
    let summary = state
        .services
        .allocations
        .get_allocated_summary(po_line_id)
        .await?;
    Ok(Json(ApiResponse::success(summary)))
}
