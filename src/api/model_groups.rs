//! `/api/modelgroups` handlers.

use super::error::{ApiError, ApiResult};
use super::extract::{ApiJson, ApiPath};
use super::{SharedState, created};
use crate::core::model_group::{self, ModelGroupInput};
use crate::entities::ModelGroupModel;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Response,
    routing::get,
};

/// Routes under `/api/modelgroups`.
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/modelgroups", get(list).post(create))
        .route("/api/modelgroups/{id}", get(fetch).put(update).delete(remove))
}

async fn list(State(state): State<SharedState>) -> ApiResult<Json<Vec<ModelGroupModel>>> {
    Ok(Json(model_group::get_all_model_groups(&state.db).await?))
}

async fn fetch(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<ModelGroupModel>> {
    model_group::get_model_group_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Model group not found: {id}")))
}

async fn create(
    State(state): State<SharedState>,
    ApiJson(input): ApiJson<ModelGroupInput>,
) -> ApiResult<Response> {
    let group = model_group::create_model_group(&state.db, input).await?;
    Ok(created(format!("/api/modelgroups/{}", group.id), group))
}

async fn update(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(input): ApiJson<ModelGroupInput>,
) -> ApiResult<Json<ModelGroupModel>> {
    Ok(Json(model_group::update_model_group(&state.db, id, input).await?))
}

async fn remove(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    model_group::delete_model_group(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{send, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_create_with_unknown_buyer_is_bad_request() {
        let (app, _db) = test_app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/modelgroups",
            Some(json!({ "name": "Galaxy A", "buyerId": 99 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Buyer with ID 99 does not exist");
    }

    #[tokio::test]
    async fn test_create_sets_location() {
        let (app, db) = test_app().await;
        let buyer = crate::test_utils::create_test_buyer(&db).await.unwrap();
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/modelgroups")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(
                json!({ "name": "Galaxy A", "buyerId": buyer.id }).to_string(),
            ))
            .unwrap();

        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let location = response.headers()["location"].to_str().unwrap();
        assert!(location.starts_with("/api/modelgroups/"));
    }
}
