//! Server start-up: database, seed data, the offline sweeper and the HTTP
//! listener.

use super::{AppState, router};
use crate::config::database::{create_connection, create_tables};
use crate::config::seed::{apply_seed, load_seed_config};
use crate::config::settings::ServerSettings;
use crate::core::machine::mark_stale_offline;
use crate::errors::Result;
use sea_orm::DatabaseConnection;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Runs the API server until Ctrl-C.
///
/// # Errors
/// Returns an error if the database cannot be opened or initialised, the
/// seed file is invalid, or the listener cannot bind.
pub async fn serve(settings: ServerSettings) -> Result<()> {
    let db = create_connection(&settings.database_url).await?;
    create_tables(&db).await?;
    info!(url = %settings.database_url, "Database ready");

    if settings.seed_config.exists() {
        let seed = load_seed_config(&settings.seed_config)?;
        let created = apply_seed(&db, &seed).await?;
        info!(path = %settings.seed_config.display(), created, "Seed data applied");
    }

    let shutdown = CancellationToken::new();
    let sweeper = spawn_offline_sweeper(
        db.clone(),
        settings.offline_after,
        settings.offline_sweep,
        shutdown.clone(),
    );

    let app = router(AppState::shared(db));
    let listener = tokio::net::TcpListener::bind(settings.bind_addr).await?;
    info!(addr = %settings.bind_addr, "Listening");

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Shutting down");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    sweeper.await?;
    Ok(())
}

/// Marks machines offline once their heartbeat is older than `offline_after`,
/// checking every `every` (at least one millisecond).
pub fn spawn_offline_sweeper(
    db: DatabaseConnection,
    offline_after: Duration,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = mark_stale_offline(&db, offline_after).await {
                        warn!(error = %e, "Offline sweep failed");
                    }
                }
            }
        }
    })
}
