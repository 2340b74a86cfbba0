//! `/api/buyers` handlers.

use super::error::{ApiError, ApiResult};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::{SharedState, created};
use crate::core::buyer::{self, BuyerInput, BuyerSummary};
use crate::entities::{BuyerModel, ModelGroupModel};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Response,
    routing::get,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    term: String,
}

/// Routes under `/api/buyers`.
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/buyers", get(list).post(create))
        .route("/api/buyers/search", get(search))
        .route("/api/buyers/{id}", get(fetch).put(update).delete(remove))
        .route("/api/buyers/{id}/modelgroups", get(model_groups))
}

async fn list(State(state): State<SharedState>) -> ApiResult<Json<Vec<BuyerSummary>>> {
    Ok(Json(buyer::get_all_buyers(&state.db).await?))
}

async fn fetch(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<BuyerModel>> {
    buyer::get_buyer_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Buyer not found: {id}")))
}

async fn create(
    State(state): State<SharedState>,
    ApiJson(input): ApiJson<BuyerInput>,
) -> ApiResult<Response> {
    let created_buyer = buyer::create_buyer(&state.db, input).await?;
    Ok(created(format!("/api/buyers/{}", created_buyer.id), created_buyer))
}

async fn update(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(input): ApiJson<BuyerInput>,
) -> ApiResult<Json<BuyerModel>> {
    Ok(Json(buyer::update_buyer(&state.db, id, input).await?))
}

async fn remove(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    buyer::delete_buyer(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn search(
    State(state): State<SharedState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> ApiResult<Json<Vec<BuyerModel>>> {
    Ok(Json(buyer::search_buyers(&state.db, &params.term).await?))
}

async fn model_groups(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Vec<ModelGroupModel>>> {
    Ok(Json(buyer::get_model_groups_for_buyer(&state.db, id).await?))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{send, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_fetch_buyer() {
        let (app, _db) = test_app().await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/buyers",
            Some(json!({ "code": "SS", "name": "Samsung" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_i64().unwrap();

        let (status, body) = send(&app, Method::GET, &format!("/api/buyers/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "SS");
    }

    #[tokio::test]
    async fn test_duplicate_buyer_code_is_bad_request() {
        let (app, _db) = test_app().await;
        let payload = json!({ "code": "SS", "name": "Samsung" });

        send(&app, Method::POST, "/api/buyers", Some(payload.clone())).await;
        let (status, body) = send(&app, Method::POST, "/api/buyers", Some(payload)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_delete_buyer_with_groups_is_rejected() {
        let (app, db) = test_app().await;
        let buyer = crate::test_utils::create_test_buyer(&db).await.unwrap();
        crate::test_utils::create_test_model_group(&db, "Galaxy A", buyer.id)
            .await
            .unwrap();

        let uri = format!("/api/buyers/{}", buyer.id);
        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("model groups"));

        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_search_and_model_groups() {
        let (app, db) = test_app().await;
        let buyer = crate::test_utils::create_test_buyer(&db).await.unwrap();
        crate::test_utils::create_test_model_group(&db, "Galaxy A", buyer.id)
            .await
            .unwrap();

        let (status, body) = send(&app, Method::GET, "/api/buyers/search?term=test", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let uri = format!("/api/buyers/{}/modelgroups", buyer.id);
        let (_, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(body[0]["name"], "Galaxy A");
    }
}
