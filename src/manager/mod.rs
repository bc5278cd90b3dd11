//! Server manager boundary
//!
//! The agent never runs shadowsocks itself. It hands the desired server set
//! to a manager and reads back cumulative per-port traffic.

mod ss_manager;

pub use ss_manager::SsManager;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;
use crate::models::ServerDescriptor;

/// Owner of the running server instances
#[async_trait]
pub trait ServerManager: Send + Sync {
    /// Reconcile the running set to exactly `servers`
    async fn update(&self, servers: Vec<ServerDescriptor>) -> Result<()>;

    /// Point-in-time snapshot of lifetime traffic per active port
    async fn stat(&self) -> Result<HashMap<u16, u64>>;

    /// Tear down every managed server
    async fn stop(&self) -> Result<()>;
}
