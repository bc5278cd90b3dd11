//! Push listener server using Axum

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::config::PushConfig;
use crate::error::{Result, YasspError};
use crate::services::SyncService;

use super::routes;

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<SyncService>,
    pub token: Arc<str>,
    pub started_at: Instant,
}

/// Push listener
pub struct PushServer {
    config: PushConfig,
    state: AppState,
}

impl PushServer {
    pub fn new(config: PushConfig, sync: Arc<SyncService>) -> Self {
        let state = AppState {
            sync,
            token: Arc::from(config.token.as_str()),
            started_at: Instant::now(),
        };

        Self { config, state }
    }

    fn build_router(&self) -> Router {
        routes::create_router(self.state.clone()).layer(TraceLayer::new_for_http())
    }

    /// Run until `shutdown` flips to true
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(self.config.addr()).await?;
        info!("Push listener on {}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                while shutdown.changed().await.is_ok() {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            })
            .await
            .map_err(|e| YasspError::Internal(e.to_string()))?;

        info!("Push listener shut down");
        Ok(())
    }
}
