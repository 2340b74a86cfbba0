//! The agent's main loop.
//!
//! After registering, the agent ticks on two intervals: the heartbeat
//! interval (heartbeat plus command polling) and the log scan interval
//! (collect and upload). Monitor changes are uploaded as they arrive.
//! Ctrl-C cancels the shared token and the loop exits.

use super::backup::{self, BackupProgress};
use super::client::ApiClient;
use super::log_collector::LogCollector;
use super::machine_info::MachineInfo;
use super::monitor::{FileValueSource, ValueChange, ValueMonitor};
use crate::config::agent::{AgentConfig, load_agent_config};
use crate::core::log::NewLogEntry;
use crate::core::machine::{MachineDetail, RegisterRequest, UpdateMacRequest};
use crate::entities::{CommandModel, CommandStatus};
use crate::errors::{Error, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Category of log entries produced by the value monitor
pub const MONITOR_CATEGORY: &str = "monitor";

/// Commands the agent understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentCommand {
    Ping,
    CollectLogs,
    Backup,
    ReloadConfig,
}

impl AgentCommand {
    fn parse(command_type: &str) -> Option<Self> {
        match command_type.trim().to_ascii_lowercase().as_str() {
            "ping" => Some(Self::Ping),
            "collectlogs" => Some(Self::CollectLogs),
            "backup" => Some(Self::Backup),
            "reloadconfig" => Some(Self::ReloadConfig),
            _ => None,
        }
    }
}

pub struct Agent {
    config: AgentConfig,
    config_path: Option<PathBuf>,
    client: ApiClient,
    info: MachineInfo,
    collector: LogCollector,
    monitor: ValueMonitor,
    changes: Option<UnboundedReceiver<ValueChange>>,
    machine_id: Option<i32>,
    shutdown: CancellationToken,
}

impl Agent {
    /// Creates an agent for this machine.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: AgentConfig, config_path: Option<PathBuf>, info: MachineInfo) -> Result<Self> {
        let client = ApiClient::from_settings(&config.api)?;
        let (monitor, changes) = ValueMonitor::new();
        Ok(Self {
            config,
            config_path,
            client,
            info,
            collector: LogCollector::new(),
            monitor,
            changes: Some(changes),
            machine_id: None,
            shutdown: CancellationToken::new(),
        })
    }

    /// Token that stops [`Agent::run`] when cancelled.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Registered machine ID, if any.
    #[must_use]
    pub const fn machine_id(&self) -> Option<i32> {
        self.machine_id
    }

    fn register_request(&self) -> RegisterRequest {
        RegisterRequest {
            ip: self.info.ip.clone(),
            mac_address: self.info.mac_address.clone(),
            machine_name: Some(
                self.config
                    .api
                    .machine_name
                    .clone()
                    .unwrap_or_else(|| self.info.hostname.clone()),
            ),
            app_version: Some(self.info.app_version.clone()),
        }
    }

    /// Registers with the server.
    ///
    /// With `update_mac`, an IP conflict is resolved by replacing the MAC
    /// stored for this IP with ours.
    ///
    /// # Errors
    /// Returns an error if the server is unreachable, rejects the request, or
    /// reports an IP conflict that was not resolved.
    pub async fn register(&mut self, update_mac: bool) -> Result<MachineDetail> {
        let result = self.client.register(&self.register_request()).await?;

        let detail = if result.requires_mac_update {
            let holder = result
                .existing_machine
                .as_ref()
                .map(|m| format!("'{}' ({})", m.name, m.mac_address.as_deref().unwrap_or("-")))
                .unwrap_or_default();
            if !update_mac {
                error!(ip = %self.info.ip, holder = %holder, "IP is registered to another machine");
                return Err(Error::Api {
                    status: 409,
                    message: result.message,
                });
            }
            warn!(ip = %self.info.ip, holder = %holder, "Replacing MAC registered for this IP");
            self.client
                .update_mac(&UpdateMacRequest {
                    ip: self.info.ip.clone(),
                    new_mac_address: self.info.mac_address.clone(),
                    machine_name: self.config.api.machine_name.clone(),
                    app_version: Some(self.info.app_version.clone()),
                })
                .await?
        } else {
            result.machine_info.ok_or_else(|| Error::Api {
                status: 200,
                message: "Registration response carried no machine".to_string(),
            })?
        };

        info!(
            machine_id = detail.id,
            name = %detail.name,
            ip = %self.info.ip,
            mac = %self.info.mac_address,
            "Registered"
        );
        self.machine_id = Some(detail.id);
        Ok(detail)
    }

    fn require_machine(&self) -> Result<i32> {
        self.machine_id.ok_or_else(|| Error::Config {
            message: "Agent is not registered".to_string(),
        })
    }

    /// Uploads `entries` in batches of the configured size.
    async fn upload(&self, entries: Vec<NewLogEntry>) -> Result<usize> {
        let machine_id = self.require_machine()?;
        let batch_size = self.config.logs.batch_size.max(1);
        let mut uploaded = 0;
        for chunk in entries.chunks(batch_size) {
            uploaded += self.client.upload_logs(machine_id, chunk.to_vec()).await?;
        }
        Ok(uploaded)
    }

    /// Collects new log lines from the configured folder and uploads them.
    ///
    /// # Errors
    /// Returns an error if the folder cannot be read or the upload fails.
    pub async fn collect_and_upload(&mut self) -> Result<usize> {
        let Some(folder) = self.config.logs.folder.clone() else {
            return Ok(0);
        };
        let entries = self.collector.collect(&folder)?;
        if entries.is_empty() {
            return Ok(0);
        }
        let uploaded = self.upload(entries).await?;
        info!(uploaded, "Uploaded log entries");
        Ok(uploaded)
    }

    async fn upload_change(&self, change: ValueChange) -> Result<()> {
        let message = format!(
            "{} changed from '{}' to '{}'",
            change.identifier,
            change.previous.as_deref().unwrap_or_default(),
            change.new
        );
        let entry = NewLogEntry {
            log_level: Some("INFO".to_string()),
            message,
            source: Some(change.identifier),
            category: Some(MONITOR_CATEGORY.to_string()),
            raw_data: Some(change.new),
            log_timestamp: Some(change.timestamp),
            ..Default::default()
        };
        self.upload(vec![entry]).await.map(|_| ())
    }

    fn start_monitors(&self) {
        self.monitor.stop_all();
        for watch in &self.config.monitor.watch {
            self.monitor.start(
                &watch.identifier,
                FileValueSource::new(watch.path.clone()),
                Duration::from_millis(watch.interval_ms),
            );
        }
    }

    async fn run_backup(&self, parameters: Option<&str>) -> Result<String> {
        let from = parameters
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                NaiveDate::parse_from_str(p, "%Y-%m-%d")
                    .map_err(|e| Error::validation(format!("Invalid backup date '{p}': {e}")))
            })
            .transpose()?;

        let (tx, mut rx) = mpsc::unbounded_channel::<BackupProgress>();
        let reporter = tokio::spawn(async move {
            while let Some(p) = rx.recv().await {
                debug!(percent = p.percent, files = p.files_processed, status = %p.status, "Backup progress");
            }
        });

        let ok = backup::run_backup(
            &self.config.ftp,
            &self.config.backup,
            from,
            tx,
            self.shutdown.child_token(),
        )
        .await?;
        reporter.await?;

        if ok {
            Ok("Backup completed".to_string())
        } else {
            Err(Error::validation("Backup finished without uploading any file"))
        }
    }

    async fn reload_config(&mut self) -> Result<String> {
        if let Some(path) = &self.config_path {
            let reloaded = load_agent_config(path)?;
            self.client = ApiClient::from_settings(&reloaded.api)?;
            self.config = reloaded;
            self.start_monitors();
        }
        let entries = self.client.configuration(self.require_machine()?).await?;
        for entry in &entries {
            debug!(key = %entry.config_key, value = %entry.config_value, "Server configuration");
        }
        Ok(format!(
            "Configuration reloaded ({} server entries)",
            entries.len()
        ))
    }

    async fn execute(&mut self, command: &CommandModel) -> Result<String> {
        let kind = AgentCommand::parse(&command.command_type).ok_or_else(|| {
            Error::validation(format!("Unknown command type '{}'", command.command_type))
        })?;

        match kind {
            AgentCommand::Ping => Ok("Pong".to_string()),
            AgentCommand::CollectLogs => {
                let uploaded = self.collect_and_upload().await?;
                Ok(format!("Uploaded {uploaded} log entries"))
            }
            AgentCommand::Backup => self.run_backup(command.parameters.as_deref()).await,
            AgentCommand::ReloadConfig => self.reload_config().await,
        }
    }

    /// Fetches pending commands and runs them in order.
    ///
    /// Each command is marked `Sent`, executed, then marked `Executed` with
    /// its result or `Error` with the failure message.
    ///
    /// # Errors
    /// Returns an error if the command list or a status update cannot be
    /// exchanged with the server.
    pub async fn process_commands(&mut self) -> Result<usize> {
        let machine_id = self.require_machine()?;
        let commands = self.client.pending_commands(machine_id).await?;

        for command in &commands {
            let id = command.command_id;
            self.client
                .update_command_status(id, CommandStatus::Sent, None, None)
                .await?;

            match self.execute(command).await {
                Ok(result) => {
                    info!(command_id = id, command_type = %command.command_type, %result, "Command executed");
                    self.client
                        .update_command_status(id, CommandStatus::Executed, Some(result), None)
                        .await?;
                }
                Err(e) => {
                    warn!(command_id = id, command_type = %command.command_type, error = %e, "Command failed");
                    self.client
                        .update_command_status(id, CommandStatus::Error, None, Some(e.to_string()))
                        .await?;
                }
            }
        }
        Ok(commands.len())
    }

    async fn tick(&mut self) {
        if self.machine_id.is_none() {
            if let Err(e) = self.register(false).await {
                warn!(error = %e, "Registration failed, retrying next tick");
                return;
            }
        }
        let Some(machine_id) = self.machine_id else {
            return;
        };

        if let Err(e) = self.client.heartbeat(machine_id).await {
            warn!(error = %e, "Heartbeat failed");
            if matches!(e, Error::Api { status: 404, .. }) {
                self.machine_id = None;
            }
            return;
        }
        if let Err(e) = self.process_commands().await {
            warn!(error = %e, "Command polling failed");
        }
    }

    /// Runs until Ctrl-C or until the shutdown token is cancelled.
    ///
    /// # Errors
    /// Returns an error if the initial registration reports an IP conflict.
    pub async fn run(mut self) -> Result<()> {
        match self.register(false).await {
            Ok(_) => {}
            Err(e @ Error::Api { status: 409, .. }) => return Err(e),
            Err(e) => warn!(error = %e, "Initial registration failed, will retry"),
        }

        let shutdown = self.shutdown.clone();
        tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Ctrl-C received, stopping agent");
                }
                shutdown.cancel();
            }
        });

        self.start_monitors();
        let mut changes = self.changes.take();
        let mut heartbeat = tokio::time::interval(self.config.api.heartbeat_interval());
        let mut scan = tokio::time::interval(Duration::from_secs(self.config.logs.scan_secs.max(1)));

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = heartbeat.tick() => self.tick().await,
                _ = scan.tick(), if self.machine_id.is_some() => {
                    if let Err(e) = self.collect_and_upload().await {
                        warn!(error = %e, "Log collection failed");
                    }
                }
                Some(change) = recv(&mut changes) => {
                    if let Err(e) = self.upload_change(change).await {
                        warn!(error = %e, "Failed to upload monitor change");
                    }
                }
            }
        }

        self.monitor.stop_all();
        info!("Agent stopped");
        Ok(())
    }
}

async fn recv(changes: &mut Option<UnboundedReceiver<ValueChange>>) -> Option<ValueChange> {
    match changes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::agent::client::tests::spawn_server;
    use crate::core::command::{CommandInput, create_command, get_command_by_id};
    use crate::core::log::get_logs_for_machine;
    use chrono::Utc;
    use sea_orm::DatabaseConnection;

    async fn agent_against_server(folder: Option<PathBuf>) -> (Agent, DatabaseConnection) {
        let (client, db) = spawn_server().await;
        let mut config = AgentConfig::default();
        config.logs.folder = folder;
        let info = MachineInfo {
            hostname: "ICT-07".to_string(),
            ip: "10.224.7.7".to_string(),
            mac_address: "AA:BB:CC:07:07:07".to_string(),
            app_version: "0.2.0".to_string(),
        };
        let mut agent = Agent::new(config, None, info).unwrap();
        agent.client = client;
        (agent, db)
    }

    async fn queue(db: &DatabaseConnection, machine_id: i32, command_type: &str) -> i32 {
        create_command(
            db,
            CommandInput {
                machine_id,
                command_type: command_type.to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .command_id
    }

    #[test]
    fn test_parse_command_type() {
        assert_eq!(AgentCommand::parse("PING"), Some(AgentCommand::Ping));
        assert_eq!(AgentCommand::parse("CollectLogs"), Some(AgentCommand::CollectLogs));
        assert_eq!(AgentCommand::parse("Reboot"), None);
    }

    #[tokio::test]
    async fn test_register_uses_hostname() {
        let (mut agent, _db) = agent_against_server(None).await;
        let detail = agent.register(false).await.unwrap();
        assert_eq!(detail.name, "ICT-07");
        assert_eq!(agent.machine_id(), Some(detail.id));
    }

    #[tokio::test]
    async fn test_conflict_needs_update_mac() {
        let (mut agent, db) = agent_against_server(None).await;
        crate::core::machine::register_machine(
            &db,
            RegisterRequest {
                ip: "10.224.7.7".to_string(),
                mac_address: "11:22:33:44:55:66".to_string(),
                machine_name: Some("Old".to_string()),
                app_version: None,
            },
        )
        .await
        .unwrap();

        let err = agent.register(false).await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 409, .. }));
        assert_eq!(agent.machine_id(), None);

        let detail = agent.register(true).await.unwrap();
        assert_eq!(detail.mac_address.as_deref(), Some("AA:BB:CC:07:07:07"));
    }

    #[tokio::test]
    async fn test_commands_are_executed_or_failed() {
        let (mut agent, db) = agent_against_server(None).await;
        let machine_id = agent.register(false).await.unwrap().id;
        let ping = queue(&db, machine_id, "Ping").await;
        let reboot = queue(&db, machine_id, "Reboot").await;

        assert_eq!(agent.process_commands().await.unwrap(), 2);

        let ping = get_command_by_id(&db, ping).await.unwrap().unwrap();
        assert_eq!(ping.status, CommandStatus::Executed);
        assert_eq!(ping.result_message.as_deref(), Some("Pong"));

        let reboot = get_command_by_id(&db, reboot).await.unwrap().unwrap();
        assert_eq!(reboot.status, CommandStatus::Error);
        assert!(reboot.error_message.unwrap().contains("Reboot"));

        assert_eq!(agent.process_commands().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_collect_logs_command_uploads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ict.log"),
            "2024-01-15 10:30:45.123 | ERROR | Short circuit\nBoard passed\n",
        )
        .unwrap();

        let (mut agent, db) = agent_against_server(Some(dir.path().to_path_buf())).await;
        let machine_id = agent.register(false).await.unwrap().id;
        let id = queue(&db, machine_id, "CollectLogs").await;
        agent.process_commands().await.unwrap();

        let command = get_command_by_id(&db, id).await.unwrap().unwrap();
        assert_eq!(command.result_message.as_deref(), Some("Uploaded 2 log entries"));

        let logs = get_logs_for_machine(&db, machine_id, None, None).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().any(|l| l.log_level == "ERROR" && l.message == "Short circuit"));
    }

    #[tokio::test]
    async fn test_monitor_change_is_uploaded() {
        let (mut agent, db) = agent_against_server(None).await;
        let machine_id = agent.register(false).await.unwrap().id;

        agent
            .upload_change(ValueChange {
                identifier: "counter".to_string(),
                previous: Some("1".to_string()),
                new: "2".to_string(),
                timestamp: Utc::now(),
            })
            .await
            .unwrap();

        let logs = get_logs_for_machine(&db, machine_id, None, None).await.unwrap();
        assert_eq!(logs[0].category.as_deref(), Some(MONITOR_CATEGORY));
        assert_eq!(logs[0].message, "counter changed from '1' to '2'");
    }

    #[tokio::test]
    async fn test_backup_without_source_fails_command() {
        let (mut agent, db) = agent_against_server(None).await;
        let machine_id = agent.register(false).await.unwrap().id;
        let id = queue(&db, machine_id, "Backup").await;
        agent.process_commands().await.unwrap();

        let command = get_command_by_id(&db, id).await.unwrap().unwrap();
        assert_eq!(command.status, CommandStatus::Error);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (agent, _db) = agent_against_server(None).await;
        let token = agent.shutdown_token();
        let handle = tokio::spawn(agent.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
