use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use machine_manager::agent::backup::{self, BackupProgress};
use machine_manager::agent::{Agent, MachineInfo};
use machine_manager::api::server;
use machine_manager::config::agent::load_agent_config;
use machine_manager::config::settings::ServerSettings;
use machine_manager::errors::Result;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "machine-manager")]
#[command(version, about = "Factory machine management server and agent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API server
    Serve,
    /// Run the machine agent
    Agent {
        /// Agent configuration file
        #[arg(short, long, default_value = "agent.toml")]
        config: PathBuf,

        #[command(subcommand)]
        command: AgentCommands,
    },
}

#[derive(Subcommand)]
enum AgentCommands {
    /// Register, then heartbeat, ship logs and execute commands until Ctrl-C
    Run,
    /// Register this machine and exit
    Register {
        /// Replace the MAC stored for this IP if it differs
        #[arg(long)]
        update_mac: bool,
    },
    /// Back up the configured folder to FTP once
    Backup {
        /// Only files created or modified on or after this day (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
    },
    /// Check the FTP login
    TestFtp,
}

async fn run_agent(config_path: PathBuf, command: AgentCommands) -> Result<()> {
    let config = load_agent_config(&config_path)
        .inspect_err(|e| error!("Failed to load agent configuration: {}", e))?;

    match command {
        AgentCommands::Run => {
            let info = MachineInfo::detect(&config.api.preferred_ip_prefix);
            info!(hostname = %info.hostname, ip = %info.ip, mac = %info.mac_address, "Machine detected");
            Agent::new(config, Some(config_path), info)?.run().await
        }
        AgentCommands::Register { update_mac } => {
            let info = MachineInfo::detect(&config.api.preferred_ip_prefix);
            let detail = Agent::new(config, Some(config_path), info)?
                .register(update_mac)
                .await?;
            println!("Registered as machine {} ({})", detail.id, detail.name);
            Ok(())
        }
        AgentCommands::Backup { from } => {
            let (tx, mut rx) = mpsc::unbounded_channel::<BackupProgress>();
            let printer = tokio::spawn(async move {
                while let Some(p) = rx.recv().await {
                    println!(
                        "[{:>3}%] {}/{} {}",
                        p.percent, p.files_processed, p.total_files, p.status
                    );
                }
            });

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_ctrl_c.cancel();
                }
            });

            let ok = backup::run_backup(&config.ftp, &config.backup, from, tx, cancel).await?;
            printer.await?;
            println!("{}", if ok { "Backup completed" } else { "Backup incomplete" });
            Ok(())
        }
        AgentCommands::TestFtp => {
            let ok = backup::test_connection(&config.ftp).await;
            println!(
                "FTP connection to {}:{} {}",
                config.ftp.host,
                config.ftp.port,
                if ok { "succeeded" } else { "failed" }
            );
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve => {
            let settings = ServerSettings::from_env()
                .inspect_err(|e| error!("Invalid server settings: {}", e))?;
            server::serve(settings)
                .await
                .inspect(|_| info!("Server stopped."))
                .inspect_err(|e| error!("Server failed: {}", e))
        }
        Commands::Agent { config, command } => run_agent(config, command)
            .await
            .inspect_err(|e| error!("Agent failed: {}", e)),
    }
}
