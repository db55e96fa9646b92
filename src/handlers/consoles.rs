use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::Actor,
    entities::console,
    handlers::extract::{AppJson, AppPath, AppQuery},
    services::consoles::{
        AssignForwarder, AuditTrailEntry, ConsignmentSelection, ConsoleDetail, ConsoleListQuery,
        ConsoleOutcome,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/consoles", get(list_consoles).post(create_console))
        .route("/consoles/:id", get(get_console))
        .route("/consoles/:id/consignments", post(add_consignments))
        .route(
            "/consoles/:id/consignments/:consignment_id",
            delete(remove_consignment),
        )
        .route("/consoles/:id/freight-forwarder", post(assign_freight_forwarder))
        .route("/consoles/:id/reject-pickup", post(reject_pickup))
        .route("/consoles/:id/audit-trail", get(console_audit_trail))
}

/// Warnings are a 200 with `warning: true`; nothing was persisted.
fn outcome_response<T>(outcome: ConsoleOutcome<T>) -> Json<ApiResponse<T>> {
    match outcome {
        ConsoleOutcome::Applied(value) => Json(ApiResponse::success(value)),
        ConsoleOutcome::Warning { message } => Json(ApiResponse::warning(message)),
    }
}

pub async fn create_console(
    State(state): State<AppState>,
    actor: Actor,
    AppJson(selection): AppJson<ConsignmentSelection>,
) -> ApiResult<ConsoleDetail> {
    let outcome = state.services.consoles.create_console(&actor, selection).await?;
    Ok(outcome_response(outcome))
}

pub async fn list_consoles(
    State(state): State<AppState>,
    actor: Actor,
    AppQuery(query): AppQuery<ConsoleListQuery>,
) -> ApiResult<PaginatedResponse<console::Model>> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(20);
    let (items, total) = state.services.consoles.list_consoles(&actor, query).await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

pub async fn get_console(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<ConsoleDetail> {
    let detail = state.services.consoles.get_console(&actor, id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

pub async fn add_consignments(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
    AppJson(selection): AppJson<ConsignmentSelection>,
) -> ApiResult<ConsoleDetail> {
    let outcome = state
        .services
        .consoles
        .add_consignments(&actor, id, selection)
        .await?;
    Ok(outcome_response(outcome))
}

pub async fn remove_consignment(
    State(state): State<AppState>,
    actor: Actor,
    AppPath((id, consignment_id)): AppPath<(Uuid, Uuid)>,
) -> ApiResult<ConsoleDetail> {
    let detail = state
        .services
        .consoles
        .remove_consignment(&actor, id, consignment_id)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

pub async fn assign_freight_forwarder(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<AssignForwarder>,
) -> ApiResult<ConsoleDetail> {
    let detail = state
        .services
        .consoles
        .assign_freight_forwarder(&actor, id, request)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[derive(Debug, Deserialize)]
pub struct RejectPickupRequest {
    #[serde(default)]
    pub reason: String,
}

pub async fn reject_pickup(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<RejectPickupRequest>,
) -> ApiResult<ConsoleDetail> {
    let detail = state
        .services
        .consoles
        .reject_pickup(&actor, id, &request.reason)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

pub async fn console_audit_trail(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Vec<AuditTrailEntry>> {
    let trail = state.services.consoles.console_audit_trail(&actor, id).await?;
    Ok(Json(ApiResponse::success(trail)))
}
