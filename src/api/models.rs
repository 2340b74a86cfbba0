//! `/api/models` handlers.

use super::error::{ApiError, ApiResult};
use super::extract::{ApiJson, ApiPath};
use super::{SharedState, created};
use crate::core::model::{self, ModelInput};
use crate::entities::ProductModelRow;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Response,
    routing::get,
};

/// Routes under `/api/models`.
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/models", get(list).post(create))
        .route("/api/models/{id}", get(fetch).put(update).delete(remove))
}

async fn list(State(state): State<SharedState>) -> ApiResult<Json<Vec<ProductModelRow>>> {
    Ok(Json(model::get_all_models(&state.db).await?))
}

async fn fetch(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<ProductModelRow>> {
    model::get_model_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Model not found: {id}")))
}

async fn create(
    State(state): State<SharedState>,
    ApiJson(input): ApiJson<ModelInput>,
) -> ApiResult<Response> {
    let row = model::create_model(&state.db, input).await?;
    Ok(created(format!("/api/models/{}", row.id), row))
}

async fn update(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(input): ApiJson<ModelInput>,
) -> ApiResult<Json<ProductModelRow>> {
    Ok(Json(model::update_model(&state.db, id, input).await?))
}

async fn remove(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    model::delete_model(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{send, test_app};
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn test_delete_missing_model_is_not_found() {
        let (app, _db) = test_app().await;
        let (status, body) = send(&app, Method::DELETE, "/api/models/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }
}
