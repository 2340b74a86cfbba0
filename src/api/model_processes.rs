//! `/api/modelprocesses` handlers. Responses carry the resolved model,
//! model group and buyer names.

use super::error::{ApiError, ApiResult};
use super::extract::{ApiJson, ApiPath};
use super::{SharedState, created};
use crate::core::model_process::{self, ModelProcessInput, ModelProcessUpdate, ModelProcessView};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Response,
    routing::get,
};

/// Routes under `/api/modelprocesses`.
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/modelprocesses", get(list).post(create))
        .route(
            "/api/modelprocesses/{id}",
            get(fetch).put(update).delete(remove),
        )
}

async fn list(State(state): State<SharedState>) -> ApiResult<Json<Vec<ModelProcessView>>> {
    Ok(Json(model_process::get_all_model_processes(&state.db).await?))
}

async fn fetch(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<ModelProcessView>> {
    model_process::get_model_process_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Model process not found: {id}")))
}

async fn create(
    State(state): State<SharedState>,
    ApiJson(input): ApiJson<ModelProcessInput>,
) -> ApiResult<Response> {
    let view = model_process::create_model_process(&state.db, input).await?;
    Ok(created(format!("/api/modelprocesses/{}", view.id), view))
}

async fn update(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(update): ApiJson<ModelProcessUpdate>,
) -> ApiResult<Json<ModelProcessView>> {
    Ok(Json(
        model_process::update_model_process(&state.db, id, update).await?,
    ))
}

async fn remove(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    model_process::delete_model_process(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
