//! Liveness, readiness and version endpoints.

use super::SharedState;
use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DetailedHealth {
    status: &'static str,
    database: &'static str,
    uptime_secs: u64,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Version {
    name: &'static str,
    version: &'static str,
}

/// Routes under `/api/health`.
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/health/detailed", get(detailed))
        .route("/api/version", get(version))
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "Healthy",
        timestamp: Utc::now(),
    })
}

async fn detailed(State(state): State<SharedState>) -> (StatusCode, Json<DetailedHealth>) {
    let db_ok = state.db.ping().await.is_ok();
    let (code, status, database) = if db_ok {
        (StatusCode::OK, "Healthy", "Connected")
    } else {
        tracing::warn!("Database ping failed during health check");
        (StatusCode::SERVICE_UNAVAILABLE, "Unhealthy", "Unavailable")
    };

    (
        code,
        Json(DetailedHealth {
            status,
            database,
            uptime_secs: state.started_at.elapsed().as_secs(),
            timestamp: Utc::now(),
        }),
    )
}

async fn version() -> Json<Version> {
    Json(Version {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{send, test_app};
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn test_health_endpoints() {
        let (app, _db) = test_app().await;

        let (status, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Healthy");

        let (status, body) = send(&app, Method::GET, "/api/health/detailed", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "Connected");

        let (_, body) = send(&app, Method::GET, "/api/version", None).await;
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
