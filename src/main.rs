use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use pickto::config::{Cli, Config, StorageBackend};
use pickto::posts::UploadOrchestrator;
use pickto::state::AppState;
use pickto::storage::{LocalObjectStore, MemoryObjectStore, ObjectStore};
use pickto::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let objects: Arc<dyn ObjectStore> = match config.storage.backend {
        StorageBackend::Local => {
            let store = LocalObjectStore::new(config.bucket_path())?;
            tracing::info!("Object bucket: {}", store.root().display());
            Arc::new(store)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory object store; images are lost on restart");
            Arc::new(MemoryObjectStore::new())
        }
    };

    let state = AppState::new(pool, config.clone(), objects)?;

    if cli.reconcile {
        let report = state.uploads.reconcile(config.storage.reconcile_repair).await?;
        tracing::info!(
            orphaned_objects = ?report.orphaned_objects,
            dangling_records = ?report.dangling_records,
            removed_objects = report.removed_objects,
            "Reconciliation finished"
        );
        return Ok(());
    }

    let sweeper = spawn_reconciler(
        state.uploads.clone(),
        config.storage.reconcile_interval_secs,
        config.storage.reconcile_repair,
    );

    let app = routes::build_router(state)?;

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    tracing::info!("Server stopped");
    Ok(())
}

/// Periodic reconciliation sweep, or `None` when the interval is zero.
fn spawn_reconciler(
    uploads: UploadOrchestrator,
    interval_secs: u64,
    repair: bool,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        return None;
    }

    tracing::info!(interval_secs, repair, "Reconciliation sweep scheduled");
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            if let Err(e) = uploads.reconcile(repair).await {
                tracing::error!("Reconciliation sweep failed: {}", e);
            }
        }
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
