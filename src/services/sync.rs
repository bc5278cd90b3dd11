//! Profile and traffic synchronization service
//!
//! Runs two independent loops: one pulls the profile list and hands it to the
//! server manager, the other evaluates the traffic ledger and uploads due
//! deltas. A tick that fails is logged and abandoned; the next tick starts
//! over from scratch.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use super::traffic_ledger::{LedgerEntry, SyncPolicy, TrafficLedger};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::manager::ServerManager;
use crate::models::ServerDescriptor;
use crate::panel::{translate, PanelClient};

pub struct SyncService {
    panel: PanelClient,
    manager: Arc<dyn ServerManager>,
    bind_host: String,
    config: SyncConfig,
    /// Held for a whole traffic tick so ticks never overlap
    ledger: Mutex<TrafficLedger>,
}

impl SyncService {
    pub fn new(
        panel: PanelClient,
        manager: Arc<dyn ServerManager>,
        bind_host: impl Into<String>,
        config: SyncConfig,
    ) -> Self {
        let ledger = TrafficLedger::new(SyncPolicy::from(&config));
        Self {
            panel,
            manager,
            bind_host: bind_host.into(),
            config,
            ledger: Mutex::new(ledger),
        }
    }

    pub fn manager(&self) -> &Arc<dyn ServerManager> {
        &self.manager
    }

    /// Pull profiles from the panel and apply them.
    ///
    /// The manager is only touched once the whole list translated cleanly.
    #[instrument(skip(self))]
    pub async fn update_profiles(&self) -> Result<usize> {
        let servers = self.panel.fetch_profiles(&self.bind_host).await?;
        let count = servers.len();
        debug!("Syncing {} profiles (pull)", count);

        self.manager.update(servers).await?;
        Ok(count)
    }

    /// Apply profile records pushed to us instead of pulled
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn apply_profiles(&self, records: Vec<Value>) -> Result<usize> {
        let servers: Vec<ServerDescriptor> =
            translate(self.panel.flavor(), &self.bind_host, records).collect::<Result<_>>()?;
        let count = servers.len();

        self.manager.update(servers).await?;
        info!("Applied {} pushed profiles", count);
        Ok(count)
    }

    /// Upload every due port as one batch and return how many were uploaded.
    ///
    /// With `force` every port with outstanding traffic is due.
    #[instrument(skip(self))]
    pub async fn update_traffic(&self, force: bool) -> Result<usize> {
        let mut ledger = self.ledger.lock().await;

        let stat = self.manager.stat().await?;
        let report = ledger.evaluate(&stat, Instant::now(), force);
        if report.is_empty() {
            return Ok(0);
        }

        debug!(
            "Uploading traffic ({} ports, {} bytes)...",
            report.len(),
            report.total_bytes()
        );
        self.panel.upload_traffic(&report).await?;
        ledger.commit(&report);

        Ok(report.len())
    }

    pub async fn ledger_entry(&self, port: u16) -> Option<LedgerEntry> {
        self.ledger.lock().await.entry(port).copied()
    }

    async fn profile_tick(&self) {
        if let Err(e) = self.update_profiles().await {
            warn!("Error on update profiles: {}", e);
        }
    }

    async fn traffic_tick(&self) {
        match self.update_traffic(false).await {
            Ok(0) => {}
            Ok(n) => debug!("Uploaded traffic for {} ports", n),
            Err(e) => warn!("Error on upload traffic: {}", e),
        }
    }

    /// Pull profiles once, then start both loops in the background
    pub async fn start(self: Arc<Self>) -> SyncHandle {
        info!(
            "Starting sync service (profiles every {}s, traffic every {}s)",
            self.config.profile_refresh_period.as_secs_f64(),
            self.config.traffic_tick().as_secs_f64()
        );

        self.profile_tick().await;

        let (shutdown_tx, _) = watch::channel(false);
        let profile_task = tokio::spawn(self.clone().run_profile_loop(shutdown_tx.subscribe()));
        let traffic_task = tokio::spawn(self.clone().run_traffic_loop(shutdown_tx.subscribe()));

        SyncHandle {
            service: self,
            shutdown_tx,
            profile_task,
            traffic_task,
        }
    }

    /// Run until `signal` resolves, then flush traffic and stop the manager.
    ///
    /// `signal` is polled from the start, so a shutdown during the initial
    /// pull still ends with every managed server torn down.
    pub async fn run_until<F>(self: Arc<Self>, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(signal);

        let handle = tokio::select! {
            handle = self.clone().start() => Some(handle),
            _ = &mut signal => {
                info!("Shutdown requested during startup");
                None
            }
        };

        if let Some(handle) = handle {
            signal.await;
            // Failure is already logged by the handle
            let _ = handle.stop().await;
        }

        self.manager.stop().await
    }

    // Sleeps first: the initial pull already happened in `start`.
    async fn run_profile_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.profile_refresh_period;

        loop {
            tokio::select! {
                _ = sleep(period) => self.profile_tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Profile loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn run_traffic_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.traffic_tick();

        loop {
            tokio::select! {
                _ = sleep(period) => self.traffic_tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Traffic loop shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Handle for a started [`SyncService`]
pub struct SyncHandle {
    service: Arc<SyncService>,
    shutdown_tx: watch::Sender<bool>,
    profile_task: JoinHandle<()>,
    traffic_task: JoinHandle<()>,
}

impl SyncHandle {
    /// Stop both loops, wait for them, then flush all outstanding traffic.
    ///
    /// A tick already in flight finishes before the flush runs. Returns the
    /// number of ports uploaded by the flush.
    pub async fn stop(self) -> Result<usize> {
        let _ = self.shutdown_tx.send(true);

        for task in [self.profile_task, self.traffic_task] {
            if let Err(e) = task.await {
                error!("Sync loop ended abnormally: {}", e);
            }
        }

        info!("Flushing unsynced traffic");
        match self.service.update_traffic(true).await {
            Ok(n) => {
                info!("Final traffic flush uploaded {} ports", n);
                Ok(n)
            }
            Err(e) => {
                warn!("Final traffic flush failed, unsynced traffic is lost: {}", e);
                Err(e)
            }
        }
    }
}
