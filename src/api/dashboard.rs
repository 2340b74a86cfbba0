//! `/api/dashboard` handlers.

use super::SharedState;
use super::error::ApiResult;
use super::extract::ApiQuery;
use crate::core::dashboard::{self, Activity, Alert, DashboardMetrics};
use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use serde::Deserialize;

const DEFAULT_ACTIVITY_COUNT: u64 = 20;
const MAX_ACTIVITY_COUNT: u64 = 200;

#[derive(Debug, Default, Deserialize)]
struct ActivityParams {
    count: Option<u64>,
}

/// Routes under `/api/dashboard`.
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/dashboard/metrics", get(metrics))
        .route("/api/dashboard/alerts", get(alerts))
        .route("/api/dashboard/activities", get(activities))
}

async fn metrics(State(state): State<SharedState>) -> ApiResult<Json<DashboardMetrics>> {
    Ok(Json(dashboard::get_metrics(&state.db).await?))
}

async fn alerts(State(state): State<SharedState>) -> ApiResult<Json<Vec<Alert>>> {
    Ok(Json(dashboard::get_alerts(&state.db).await?))
}

async fn activities(
    State(state): State<SharedState>,
    ApiQuery(params): ApiQuery<ActivityParams>,
) -> ApiResult<Json<Vec<Activity>>> {
    let count = params
        .count
        .unwrap_or(DEFAULT_ACTIVITY_COUNT)
        .clamp(1, MAX_ACTIVITY_COUNT);
    Ok(Json(dashboard::get_recent_activities(&state.db, count).await?))
}
