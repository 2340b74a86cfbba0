//! `/api/lines` handlers.

use super::error::{ApiError, ApiResult};
use super::extract::{ApiJson, ApiPath};
use super::{SharedState, created};
use crate::core::line::{self, LineInput};
use crate::entities::LineModel;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Response,
    routing::get,
};

/// Routes under `/api/lines`.
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/lines", get(list).post(create))
        .route("/api/lines/{id}", get(fetch).put(update).delete(remove))
}

async fn list(State(state): State<SharedState>) -> ApiResult<Json<Vec<LineModel>>> {
    Ok(Json(line::get_all_lines(&state.db).await?))
}

async fn fetch(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<LineModel>> {
    line::get_line_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Line not found: {id}")))
}

async fn create(
    State(state): State<SharedState>,
    ApiJson(input): ApiJson<LineInput>,
) -> ApiResult<Response> {
    let row = line::create_line(&state.db, input.name).await?;
    Ok(created(format!("/api/lines/{}", row.id), row))
}

async fn update(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(input): ApiJson<LineInput>,
) -> ApiResult<Json<LineModel>> {
    Ok(Json(line::update_line(&state.db, id, input.name).await?))
}

async fn remove(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    line::delete_line(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{send, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_update_missing_line_is_not_found() {
        let (app, _db) = test_app().await;
        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/lines/7",
            Some(json!({ "name": "L02" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Line not found: 7");
    }

    #[tokio::test]
    async fn test_line_lifecycle() {
        let (app, _db) = test_app().await;

        let (status, body) =
            send(&app, Method::POST, "/api/lines", Some(json!({ "name": "L01" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        let uri = format!("/api/lines/{}", body["id"]);

        let (status, body) = send(&app, Method::PUT, &uri, Some(json!({ "name": "L02" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "L02");

        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
