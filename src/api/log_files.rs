//! `/api/logfiles` handlers.

use super::error::{ApiError, ApiResult};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::{SharedState, created};
use crate::core::log_file::{self, LogFileInput, LogFileStatusUpdate};
use crate::entities::LogFileModel;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Response,
    routing::get,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    machine_id: Option<i32>,
}

/// Routes under `/api/logfiles`.
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/logfiles", get(list).post(create))
        .route("/api/logfiles/{id}", get(fetch).put(update).delete(remove))
}

async fn list(
    State(state): State<SharedState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Json<Vec<LogFileModel>>> {
    Ok(Json(
        log_file::get_log_files(&state.db, params.machine_id).await?,
    ))
}

async fn fetch(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<LogFileModel>> {
    log_file::get_log_file_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Log file not found: {id}")))
}

async fn create(
    State(state): State<SharedState>,
    ApiJson(input): ApiJson<LogFileInput>,
) -> ApiResult<Response> {
    let row = log_file::create_log_file(&state.db, input).await?;
    Ok(created(format!("/api/logfiles/{}", row.id), row))
}

async fn update(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(update): ApiJson<LogFileStatusUpdate>,
) -> ApiResult<Json<LogFileModel>> {
    Ok(Json(
        log_file::update_log_file_status(&state.db, id, &update.status).await?,
    ))
}

async fn remove(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    log_file::delete_log_file(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{send, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_log_file_filter_by_machine() {
        let (app, db) = test_app().await;
        let a = crate::test_utils::create_test_machine(&db, "ICT-01", "10.224.1.10")
            .await
            .unwrap();
        let b = crate::test_utils::create_test_machine(&db, "ICT-02", "10.224.1.11")
            .await
            .unwrap();

        for (machine_id, name) in [(a.id, "a.log"), (b.id, "b.log")] {
            let (status, _) = send(
                &app,
                Method::POST,
                "/api/logfiles",
                Some(json!({ "fileName": name, "machineId": machine_id, "fileSize": 10 })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, body) = send(
            &app,
            Method::GET,
            &format!("/api/logfiles?machineId={}", a.id),
            None,
        )
        .await;
        let files = body.as_array().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["fileName"], "a.log");

        let uri = format!("/api/logfiles/{}", files[0]["id"]);
        let (status, body) =
            send(&app, Method::PUT, &uri, Some(json!({ "status": "Processed" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Processed");
    }
}
