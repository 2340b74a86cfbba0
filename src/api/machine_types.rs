//! `/api/machinetypes` handlers.

use super::error::{ApiError, ApiResult};
use super::extract::{ApiJson, ApiPath};
use super::{SharedState, created};
use crate::core::machine_type::{self, MachineTypeInput};
use crate::entities::MachineTypeModel;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Response,
    routing::get,
};

/// Routes under `/api/machinetypes`.
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/machinetypes", get(list).post(create))
        .route(
            "/api/machinetypes/{id}",
            get(fetch).put(update).delete(remove),
        )
}

async fn list(State(state): State<SharedState>) -> ApiResult<Json<Vec<MachineTypeModel>>> {
    Ok(Json(machine_type::get_all_machine_types(&state.db).await?))
}

async fn fetch(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<MachineTypeModel>> {
    machine_type::get_machine_type_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Machine type not found: {id}")))
}

async fn create(
    State(state): State<SharedState>,
    ApiJson(input): ApiJson<MachineTypeInput>,
) -> ApiResult<Response> {
    let row = machine_type::create_machine_type(&state.db, input.name).await?;
    Ok(created(format!("/api/machinetypes/{}", row.id), row))
}

async fn update(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(input): ApiJson<MachineTypeInput>,
) -> ApiResult<Json<MachineTypeModel>> {
    Ok(Json(
        machine_type::update_machine_type(&state.db, id, input.name).await?,
    ))
}

async fn remove(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    machine_type::delete_machine_type(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
