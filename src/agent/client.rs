//! HTTP client for the machine management API.
//!
//! One pooled `reqwest::Client` is shared by every call. Non-success
//! responses become [`Error::Api`] carrying the server's error message.

use crate::api::error::ErrorResponse;
use crate::config::agent::ApiSettings;
use crate::core::command::StatusUpdate;
use crate::core::log::{LogBatch, NewLogEntry};
use crate::core::machine::{
    HeartbeatRequest, MachineDetail, RegisterRequest, RegistrationResult, UpdateMacRequest,
};
use crate::entities::{ClientConfigModel, CommandModel, CommandStatus};
use crate::errors::{Error, Result};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchResponse {
    inserted: usize,
}

/// Client for one API server
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Creates a client for `base_url` with the given request timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Creates a client from the `[api]` section of the agent config.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_settings(settings: &ApiSettings) -> Result<Self> {
        Self::new(&settings.base_url, settings.timeout())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn error_from(response: Response) -> Error {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&text)
            .map(|body| body.message)
            .unwrap_or(text);
        Error::Api { status, message }
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn empty(response: Response) -> Result<()> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }

    /// Returns `true` when `/api/health` answers with a success status.
    pub async fn health_check(&self) -> bool {
        match self.client.get(self.url("/api/health")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Health check failed");
                false
            }
        }
    }

    /// Registers this machine.
    ///
    /// A conflict (the IP belongs to another MAC) is returned as a result
    /// with `requires_mac_update` set, not as an error.
    ///
    /// # Errors
    /// Returns an error on transport failures or any other non-success status.
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegistrationResult> {
        let response = self
            .client
            .post(self.url("/api/machines/register"))
            .json(request)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            return Ok(response.json().await?);
        }
        Self::json(response).await
    }

    /// Replaces the MAC registered for this machine's IP.
    ///
    /// # Errors
    /// Returns an error on transport failures or a non-success status.
    pub async fn update_mac(&self, request: &UpdateMacRequest) -> Result<MachineDetail> {
        let response = self
            .client
            .post(self.url("/api/machines/update-mac"))
            .json(request)
            .send()
            .await?;
        Self::json(response).await
    }

    /// Sends a heartbeat.
    ///
    /// # Errors
    /// Returns an error on transport failures or a non-success status.
    pub async fn heartbeat(&self, machine_id: i32) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/machines/heartbeat"))
            .json(&HeartbeatRequest { machine_id })
            .send()
            .await?;
        Self::empty(response).await
    }

    /// Uploads log entries; returns how many rows the server stored.
    ///
    /// # Errors
    /// Returns an error on transport failures or a non-success status.
    pub async fn upload_logs(&self, machine_id: i32, entries: Vec<NewLogEntry>) -> Result<usize> {
        let response = self
            .client
            .post(self.url("/api/logs/batch"))
            .json(&LogBatch {
                machine_id,
                entries,
            })
            .send()
            .await?;
        Ok(Self::json::<BatchResponse>(response).await?.inserted)
    }

    /// Fetches commands waiting for this machine.
    ///
    /// # Errors
    /// Returns an error on transport failures or a non-success status.
    pub async fn pending_commands(&self, machine_id: i32) -> Result<Vec<CommandModel>> {
        let response = self
            .client
            .get(self.url(&format!("/api/commands/pending/{machine_id}")))
            .send()
            .await?;
        Self::json(response).await
    }

    /// Reports the status of a command.
    ///
    /// # Errors
    /// Returns an error on transport failures or a non-success status.
    pub async fn update_command_status(
        &self,
        command_id: i32,
        status: CommandStatus,
        result_message: Option<String>,
        error_message: Option<String>,
    ) -> Result<CommandModel> {
        let response = self
            .client
            .put(self.url(&format!("/api/commands/{command_id}/status")))
            .json(&StatusUpdate {
                status: status.to_string(),
                result_message,
                error_message,
            })
            .send()
            .await?;
        Self::json(response).await
    }

    /// Fetches the configuration entries of this machine.
    ///
    /// # Errors
    /// Returns an error on transport failures or a non-success status.
    pub async fn configuration(&self, machine_id: i32) -> Result<Vec<ClientConfigModel>> {
        let response = self
            .client
            .get(self.url(&format!("/api/machines/{machine_id}/configuration")))
            .send()
            .await?;
        Self::json(response).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::api::{AppState, router};
    use crate::core::command::{CommandInput, create_command};
    use crate::test_utils::setup_test_db;
    use sea_orm::DatabaseConnection;

    /// Serves the real router over an in-memory database on a random port.
    pub(crate) async fn spawn_server() -> (ApiClient, DatabaseConnection) {
        let db = setup_test_db().await.unwrap();
        let app = router(AppState::shared(db.clone()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let client = ApiClient::new(&format!("http://{addr}/"), Duration::from_secs(5)).unwrap();
        (client, db)
    }

    fn register_request(ip: &str, mac: &str) -> RegisterRequest {
        RegisterRequest {
            ip: ip.to_string(),
            mac_address: mac.to_string(),
            machine_name: Some("AOI-07".to_string()),
            app_version: Some("1.0.0".to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_heartbeat_and_conflict() {
        let (client, _db) = spawn_server().await;
        assert!(client.health_check().await);

        let result = client
            .register(&register_request("10.224.5.5", "AA:BB:CC:00:00:01"))
            .await
            .unwrap();
        assert!(result.is_success);
        assert!(result.is_new_machine);
        let machine_id = result.machine_info.unwrap().id;

        client.heartbeat(machine_id).await.unwrap();

        let conflict = client
            .register(&register_request("10.224.5.5", "AA:BB:CC:00:00:02"))
            .await
            .unwrap();
        assert!(!conflict.is_success);
        assert!(conflict.requires_mac_update);

        let err = client.heartbeat(9999).await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_upload_and_commands() {
        let (client, db) = spawn_server().await;
        let machine = client
            .register(&register_request("10.224.5.6", "AA:BB:CC:00:00:03"))
            .await
            .unwrap()
            .machine_info
            .unwrap();

        let entries = vec![
            NewLogEntry {
                message: "started".to_string(),
                ..Default::default()
            };
            3
        ];
        assert_eq!(client.upload_logs(machine.id, entries).await.unwrap(), 3);

        let err = client.upload_logs(machine.id, Vec::new()).await.unwrap_err();
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Log batch cannot be empty");
            }
            other => panic!("unexpected error: {other}"),
        }

        create_command(
            &db,
            CommandInput {
                machine_id: machine.id,
                command_type: "Ping".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let pending = client.pending_commands(machine.id).await.unwrap();
        assert_eq!(pending.len(), 1);

        let updated = client
            .update_command_status(
                pending[0].command_id,
                CommandStatus::Executed,
                Some("pong".into()),
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.status, CommandStatus::Executed);
        assert!(client.pending_commands(machine.id).await.unwrap().is_empty());
        assert!(client.configuration(machine.id).await.unwrap().is_empty());
    }
}
