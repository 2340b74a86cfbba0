//! `/api/logs` handlers.

use super::error::{ApiError, ApiResult};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::{SharedState, created};
use crate::core::log::{self, LogBatch, LogEntryInput, LogPage, LogQuery};
use crate::entities::LogDataModel;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Response,
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
struct RangeParams {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchResponse {
    machine_id: i32,
    inserted: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CleanupResponse {
    days: i64,
    deleted: u64,
}

/// Routes under `/api/logs`.
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/logs", get(query).post(create))
        .route("/api/logs/batch", post(batch))
        .route("/api/logs/machine/{machine_id}", get(for_machine))
        .route("/api/logs/cleanup/{days}", delete(cleanup))
        .route("/api/logs/{id}", get(fetch).delete(remove))
}

async fn query(
    State(state): State<SharedState>,
    ApiQuery(params): ApiQuery<LogQuery>,
) -> ApiResult<Json<LogPage>> {
    Ok(Json(log::query_logs(&state.db, params).await?))
}

async fn create(
    State(state): State<SharedState>,
    ApiJson(input): ApiJson<LogEntryInput>,
) -> ApiResult<Response> {
    let row = log::add_log(&state.db, input).await?;
    Ok(created(format!("/api/logs/{}", row.log_id), row))
}

async fn batch(
    State(state): State<SharedState>,
    ApiJson(batch): ApiJson<LogBatch>,
) -> ApiResult<(StatusCode, Json<BatchResponse>)> {
    let machine_id = batch.machine_id;
    let inserted = log::upload_batch(&state.db, batch).await?;
    Ok((
        StatusCode::CREATED,
        Json(BatchResponse {
            machine_id,
            inserted,
        }),
    ))
}

async fn fetch(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<LogDataModel>> {
    log::get_log_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Log not found: {id}")))
}

async fn for_machine(
    State(state): State<SharedState>,
    ApiPath(machine_id): ApiPath<i32>,
    ApiQuery(range): ApiQuery<RangeParams>,
) -> ApiResult<Json<Vec<LogDataModel>>> {
    Ok(Json(
        log::get_logs_for_machine(&state.db, machine_id, range.start, range.end).await?,
    ))
}

async fn remove(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    log::delete_log(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cleanup(
    State(state): State<SharedState>,
    ApiPath(days): ApiPath<i64>,
) -> ApiResult<Json<CleanupResponse>> {
    let deleted = log::cleanup_old_logs(&state.db, days).await?;
    Ok(Json(CleanupResponse { days, deleted }))
}
