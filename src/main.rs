//! YaSSP node agent - Entry Point
//!
//! Syncs shadowsocks profiles and traffic with the panel until interrupted,
//! then flushes outstanding traffic and stops the managed servers.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yassp::api::PushServer;
use yassp::config::LogConfig;
use yassp::manager::{ServerManager, SsManager};
use yassp::panel::PanelClient;
use yassp::services::SyncService;
use yassp::{Config, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    init_tracing(&config.log);
    info!(
        "Starting YaSSP agent ({} panel at {})",
        config.panel.flavor, config.panel.url
    );

    let manager: Arc<dyn ServerManager> = Arc::new(SsManager::from_config(&config.manager).await?);
    info!("Using shadowsocks manager at {}", config.manager.address);

    let panel = PanelClient::from_config(&config.panel)?;
    let sync = Arc::new(SyncService::new(
        panel,
        manager,
        config.manager.bind_address.clone(),
        config.sync.clone(),
    ));

    let (shutdown_tx, _) = watch::channel(false);
    let push_task = if config.push.enabled {
        let push_server = PushServer::new(config.push.clone(), sync.clone());
        let push_shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = push_server.run(push_shutdown).await {
                error!("Push listener error: {}", e);
            }
        }))
    } else {
        None
    };

    // Push listener is drained before the final flush
    let shutdown = async move {
        shutdown_signal().await;
        info!("Shutdown signal received");

        let _ = shutdown_tx.send(true);
        if let Some(task) = push_task {
            let _ = task.await;
        }
    };

    if let Err(e) = sync.run_until(shutdown).await {
        error!("Failed to stop servers: {}", e);
    }

    info!("YaSSP agent stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("yassp={},tower_http=info", log.level).into());
    let registry = tracing_subscriber::registry().with(filter);

    if log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
