//! `/api/commands` handlers.

use super::error::{ApiError, ApiResult};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::{SharedState, created};
use crate::core::command::{self, CommandInput, StatusUpdate};
use crate::entities::{CommandModel, CommandStatus};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Response,
    routing::{get, put},
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    status: Option<String>,
}

/// Routes under `/api/commands`.
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/commands", get(list).post(create))
        .route("/api/commands/pending/{machine_id}", get(pending))
        .route("/api/commands/machine/{machine_id}", get(for_machine))
        .route("/api/commands/{id}", get(fetch).delete(remove))
        .route("/api/commands/{id}/status", put(update_status))
}

async fn list(
    State(state): State<SharedState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Json<Vec<CommandModel>>> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<CommandStatus>)
        .transpose()
        .map_err(ApiError::bad_request)?;
    Ok(Json(command::get_all_commands(&state.db, status).await?))
}

async fn fetch(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<CommandModel>> {
    command::get_command_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Command not found: {id}")))
}

async fn create(
    State(state): State<SharedState>,
    ApiJson(input): ApiJson<CommandInput>,
) -> ApiResult<Response> {
    let row = command::create_command(&state.db, input).await?;
    Ok(created(format!("/api/commands/{}", row.command_id), row))
}

async fn pending(
    State(state): State<SharedState>,
    ApiPath(machine_id): ApiPath<i32>,
) -> ApiResult<Json<Vec<CommandModel>>> {
    Ok(Json(
        command::get_pending_commands(&state.db, machine_id).await?,
    ))
}

async fn for_machine(
    State(state): State<SharedState>,
    ApiPath(machine_id): ApiPath<i32>,
) -> ApiResult<Json<Vec<CommandModel>>> {
    Ok(Json(
        command::get_commands_for_machine(&state.db, machine_id).await?,
    ))
}

async fn update_status(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(update): ApiJson<StatusUpdate>,
) -> ApiResult<Json<CommandModel>> {
    Ok(Json(
        command::update_command_status(&state.db, id, update).await?,
    ))
}

async fn remove(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    command::delete_command(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use crate::api::test_support::{send, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_status_update_unknown_command_is_not_found() {
        let (app, _db) = test_app().await;
        let (status, _) = send(
            &app,
            Method::PUT,
            "/api/commands/123/status",
            Some(json!({ "status": "Executed" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_command_flow() {
        let (app, db) = test_app().await;
        let machine = crate::test_utils::create_test_machine(&db, "ICT-01", "10.224.1.10")
            .await
            .unwrap();

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/commands",
            Some(json!({ "machineId": machine.id, "commandType": "Ping", "status": "Executed" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "Pending");
        let id = body["commandId"].as_i64().unwrap();

        let pending_uri = format!("/api/commands/pending/{}", machine.id);
        let (_, body) = send(&app, Method::GET, &pending_uri, None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/commands/{id}/status"),
            Some(json!({ "status": "Bogus" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("Bogus"));

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/commands/{id}/status"),
            Some(json!({ "status": "Executed", "resultMessage": "pong" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Executed");

        let (_, body) = send(&app, Method::GET, &pending_uri, None).await;
        assert!(body.as_array().unwrap().is_empty());

        let (_, body) = send(&app, Method::GET, "/api/commands?status=executed", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, Method::GET, "/api/commands?status=nope", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_for_unknown_machine_is_bad_request() {
        let (app, _db) = test_app().await;
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/commands",
            Some(json!({ "machineId": 77, "commandType": "Ping" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
