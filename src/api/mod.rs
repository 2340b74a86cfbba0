//! REST API over the core services.
//!
//! Each resource module exposes a `routes()` function returning a
//! `Router<SharedState>`; [`router`] merges them and adds tracing and CORS.
//! Handlers stay thin: extract through `extract`, call `crate::core`, map the
//! result.

pub mod buyers;
pub mod commands;
pub mod dashboard;
pub mod error;
pub mod extract;
pub mod health;
pub mod lines;
pub mod log_files;
pub mod logs;
pub mod machine_types;
pub mod machines;
pub mod model_groups;
pub mod model_processes;
pub mod models;
pub mod server;
pub mod stations;

use axum::{
    Json, Router,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// State shared by all handlers
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// When the server started, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Wraps a connection into shared state.
    #[must_use]
    pub fn shared(db: DatabaseConnection) -> SharedState {
        Arc::new(Self {
            db,
            started_at: Instant::now(),
        })
    }
}

pub type SharedState = Arc<AppState>;

/// Builds the complete API router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(buyers::routes())
        .merge(model_groups::routes())
        .merge(models::routes())
        .merge(model_processes::routes())
        .merge(lines::routes())
        .merge(stations::routes())
        .merge(machine_types::routes())
        .merge(machines::routes())
        .merge(commands::routes())
        .merge(logs::routes())
        .merge(log_files::routes())
        .merge(dashboard::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 201 response with a `Location` header pointing at the new resource.
pub(crate) fn created<T: Serialize>(location: String, body: T) -> Response {
    let mut response = (StatusCode::CREATED, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(&location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}
