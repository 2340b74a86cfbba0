//! `/api/machines` handlers: CRUD, agent registration and heartbeat,
//! and per-machine client configuration.

use super::error::{ApiError, ApiResult};
use super::extract::{ApiJson, ApiPath};
use super::{SharedState, created};
use crate::core::client_config::{self, ConfigValueInput};
use crate::core::machine::{
    self, HeartbeatRequest, MachineDetail, MachineInput, MachineStats, RegisterRequest,
    RegistrationResult, UpdateMacRequest,
};
use crate::entities::{ClientConfigModel, MachineModel};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};

/// Routes under `/api/machines`.
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/machines", get(list).post(create))
        .route("/api/machines/register", post(register))
        .route("/api/machines/update-mac", post(update_mac))
        .route("/api/machines/heartbeat", post(heartbeat))
        .route("/api/machines/stats", get(stats))
        .route("/api/machines/by-ip/{ip}", get(by_ip))
        .route("/api/machines/{id}", get(fetch).put(update).delete(remove))
        .route("/api/machines/{id}/detail", get(detail))
        .route("/api/machines/{id}/configuration", get(configuration))
        .route(
            "/api/machines/{id}/configuration/{key}",
            put(set_config).delete(remove_config),
        )
}

async fn list(State(state): State<SharedState>) -> ApiResult<Json<Vec<MachineModel>>> {
    Ok(Json(machine::get_all_machines(&state.db).await?))
}

async fn fetch(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<MachineModel>> {
    machine::get_machine_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Machine not found: {id}")))
}

async fn create(
    State(state): State<SharedState>,
    ApiJson(input): ApiJson<MachineInput>,
) -> ApiResult<Response> {
    let row = machine::create_machine(&state.db, input).await?;
    Ok(created(format!("/api/machines/{}", row.id), row))
}

async fn update(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(input): ApiJson<MachineInput>,
) -> ApiResult<Json<MachineModel>> {
    Ok(Json(machine::update_machine(&state.db, id, input).await?))
}

async fn remove(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    machine::delete_machine(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 201 for a new machine, 409 when the IP belongs to another MAC, else 200.
async fn register(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<Response> {
    let result: RegistrationResult = machine::register_machine(&state.db, request).await?;

    let status = if result.requires_mac_update {
        StatusCode::CONFLICT
    } else if result.is_new_machine {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result)).into_response())
}

async fn update_mac(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<UpdateMacRequest>,
) -> ApiResult<Json<MachineDetail>> {
    Ok(Json(machine::update_machine_mac(&state.db, request).await?))
}

async fn heartbeat(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<HeartbeatRequest>,
) -> ApiResult<StatusCode> {
    machine::heartbeat(&state.db, request.machine_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stats(State(state): State<SharedState>) -> ApiResult<Json<MachineStats>> {
    Ok(Json(machine::get_machine_stats(&state.db).await?))
}

async fn by_ip(
    State(state): State<SharedState>,
    ApiPath(ip): ApiPath<String>,
) -> ApiResult<Json<MachineDetail>> {
    let found = machine::get_machine_by_ip(&state.db, &ip)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Machine not found: IP {ip}")))?;
    Ok(Json(machine::get_machine_detail(&state.db, found).await?))
}

async fn detail(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<MachineDetail>> {
    Ok(Json(machine::get_machine_detail_by_id(&state.db, id).await?))
}

async fn configuration(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Vec<ClientConfigModel>>> {
    Ok(Json(client_config::get_config_for_machine(&state.db, id).await?))
}

async fn set_config(
    State(state): State<SharedState>,
    ApiPath((id, key)): ApiPath<(i32, String)>,
    ApiJson(input): ApiJson<ConfigValueInput>,
) -> ApiResult<Json<ClientConfigModel>> {
    Ok(Json(
        client_config::upsert_config(&state.db, id, &key, input).await?,
    ))
}

async fn remove_config(
    State(state): State<SharedState>,
    ApiPath((id, key)): ApiPath<(i32, String)>,
) -> ApiResult<StatusCode> {
    client_config::delete_config(&state.db, id, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use crate::api::test_support::{send, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_register_status_codes() {
        let (app, _db) = test_app().await;
        let payload = json!({
            "ip": "10.224.1.20",
            "macAddress": "aa-bb-cc-dd-ee-01",
            "machineName": "AOI-02",
        });

        let (status, body) =
            send(&app, Method::POST, "/api/machines/register", Some(payload.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["isNewMachine"], true);
        assert_eq!(body["machineInfo"]["clientStatus"], "Online");
        assert_eq!(body["machineInfo"]["macAddress"], "AA:BB:CC:DD:EE:01");

        let (status, body) =
            send(&app, Method::POST, "/api/machines/register", Some(payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isNewMachine"], false);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/machines/register",
            Some(json!({ "ip": "10.224.1.20", "macAddress": "aa-bb-cc-dd-ee-02" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["isSuccess"], false);
        assert_eq!(body["requiresMacUpdate"], true);
        assert_eq!(body["existingMachine"]["name"], "AOI-02");
    }

    #[tokio::test]
    async fn test_update_mac_then_register() {
        let (app, _db) = test_app().await;
        send(
            &app,
            Method::POST,
            "/api/machines/register",
            Some(json!({ "ip": "10.224.1.30", "macAddress": "AA:BB:CC:DD:EE:10" })),
        )
        .await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/machines/update-mac",
            Some(json!({ "ip": "10.224.1.30", "newMacAddress": "AA:BB:CC:DD:EE:11" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["macAddress"], "AA:BB:CC:DD:EE:11");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/machines/update-mac",
            Some(json!({ "ip": "10.9.9.9", "newMacAddress": "AA:BB:CC:DD:EE:12" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_heartbeat_and_stats() {
        let (app, db) = test_app().await;
        let machine = crate::test_utils::create_test_machine(&db, "ICT-01", "10.224.1.10")
            .await
            .unwrap();

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/machines/heartbeat",
            Some(json!({ "machineId": machine.id })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = send(&app, Method::GET, "/api/machines/stats", None).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["online"], 1);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/machines/heartbeat",
            Some(json!({ "machineId": 999 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_by_ip_and_detail() {
        let (app, db) = test_app().await;
        let machine = crate::test_utils::create_test_machine(&db, "ICT-01", "10.224.1.10")
            .await
            .unwrap();

        let (status, body) = send(&app, Method::GET, "/api/machines/by-ip/10.224.1.10", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], machine.id);

        let (status, _) = send(&app, Method::GET, "/api/machines/by-ip/10.0.0.1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/api/machines/{}/detail", machine.id);
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stationName"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_configuration_endpoints() {
        let (app, db) = test_app().await;
        let machine = crate::test_utils::create_test_machine(&db, "ICT-01", "10.224.1.10")
            .await
            .unwrap();
        let base = format!("/api/machines/{}/configuration", machine.id);

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("{base}/LogFolder"),
            Some(json!({ "configValue": "D:\\Logs" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["configKey"], "LogFolder");

        let (_, body) = send(&app, Method::GET, &base, None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, Method::DELETE, &format!("{base}/LogFolder"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, Method::GET, "/api/machines/404/configuration", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
