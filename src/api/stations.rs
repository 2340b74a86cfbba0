//! `/api/stations` handlers.

use super::error::{ApiError, ApiResult};
use super::extract::{ApiJson, ApiPath};
use super::{SharedState, created};
use crate::core::station::{self, StationInput};
use crate::entities::StationModel;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Response,
    routing::get,
};

/// Routes under `/api/stations`.
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/stations", get(list).post(create))
        .route("/api/stations/{id}", get(fetch).put(update).delete(remove))
}

async fn list(State(state): State<SharedState>) -> ApiResult<Json<Vec<StationModel>>> {
    Ok(Json(station::get_all_stations(&state.db).await?))
}

async fn fetch(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<StationModel>> {
    station::get_station_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Station not found: {id}")))
}

async fn create(
    State(state): State<SharedState>,
    ApiJson(input): ApiJson<StationInput>,
) -> ApiResult<Response> {
    let row = station::create_station(&state.db, input).await?;
    Ok(created(format!("/api/stations/{}", row.id), row))
}

async fn update(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(input): ApiJson<StationInput>,
) -> ApiResult<Json<StationModel>> {
    Ok(Json(station::update_station(&state.db, id, input).await?))
}

async fn remove(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    station::delete_station(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{send, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_create_station_with_unknown_line() {
        let (app, _db) = test_app().await;
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/stations",
            Some(json!({ "name": "ST-01", "lineId": 5, "modelProcessId": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
