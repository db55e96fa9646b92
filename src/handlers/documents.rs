use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use crate::{
    auth::Actor,
    handlers::extract::AppPath,
    services::documents::{ConsignmentContext, ConsoleContext, XmlDocument},
    ApiResponse, ApiResult, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/consignments/:id/document-context", get(consignment_context))
        .route("/consignments/:id/bol", post(generate_bol))
        .route("/consignments/:id/xml", post(generate_xml))
        .route("/consoles/:id/document-context", get(console_context))
        .route("/consoles/:id/bol", post(generate_console_bol))
}

pub async fn consignment_context(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<ConsignmentContext> {
    let context = state
        .services
        .documents
        .build_consignment_context(&actor, id)
        .await?;
    Ok(Json(ApiResponse::success(context)))
}

pub async fn generate_bol(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<ConsignmentContext> {
    let context = state.services.documents.generate_bol(&actor, id).await?;
    Ok(Json(ApiResponse::success(context)))
}

pub async fn generate_xml(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<XmlDocument> {
    let document = state.services.documents.generate_xml(&actor, id).await?;
    Ok(Json(ApiResponse::success(document)))
}

pub async fn console_context(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<ConsoleContext> {
    let context = state
        .services
        .documents
        .build_console_context(&actor, id)
        .await?;
    Ok(Json(ApiResponse::success(context)))
}

pub async fn generate_console_bol(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<ConsoleContext> {
    let context = state
        .services
        .documents
        .generate_console_bol(&actor, id)
        .await?;
    Ok(Json(ApiResponse::success(context)))
}
