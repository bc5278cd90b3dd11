//! Client for the shadowsocks manager UDP API
//!
//! Commands are single datagrams: `add: {json}`, `remove: {json}` (reply
//! `ok`) and `ping` (reply `stat: {"<port>": bytes, ...}`).

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use super::ServerManager;
use crate::config::ManagerConfig;
use crate::error::{Result, YasspError};
use crate::models::ServerDescriptor;

const MAX_DATAGRAM: usize = 64 * 1024;

/// Manager client that keeps the running set in line with the panel
pub struct SsManager {
    address: SocketAddr,
    reply_timeout: Duration,
    // One request in flight at a time so replies pair with their commands
    socket: Mutex<UdpSocket>,
    // Held for a whole reconciliation so concurrent updates apply in turn
    servers: Mutex<HashMap<u16, ServerDescriptor>>,
}

impl SsManager {
    pub async fn connect(address: SocketAddr, reply_timeout: Duration) -> Result<Self> {
        let local = if address.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };

        let socket = UdpSocket::bind(local).await?;
        socket.connect(address).await?;

        Ok(Self {
            address,
            reply_timeout,
            socket: Mutex::new(socket),
            servers: Mutex::new(HashMap::new()),
        })
    }

    pub async fn from_config(config: &ManagerConfig) -> Result<Self> {
        Self::connect(config.address, config.timeout).await
    }

    /// Ports currently believed to be running
    pub async fn managed_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.servers.lock().await.keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    async fn command(&self, command: &str) -> Result<String> {
        let socket = self.socket.lock().await;

        // Drop late replies to commands that already timed out
        let mut buf = vec![0u8; MAX_DATAGRAM];
        while socket.try_recv(&mut buf).is_ok() {}

        socket.send(command.as_bytes()).await?;

        let n = timeout(self.reply_timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| {
                YasspError::Manager(format!("no reply from manager at {}", self.address))
            })??;

        Ok(String::from_utf8_lossy(&buf[..n]).trim().to_string())
    }

    async fn expect_ok(&self, command: &str) -> Result<()> {
        let reply = self.command(command).await?;
        if reply == "ok" {
            Ok(())
        } else {
            Err(YasspError::Manager(format!(
                "manager refused \"{}\": {}",
                command.split(':').next().unwrap_or(command),
                reply
            )))
        }
    }

    async fn add(&self, server: &ServerDescriptor) -> Result<()> {
        if server.ota {
            debug!(port = server.port, "One-time auth is not part of the manager API, ignoring");
        }
        self.expect_ok(&add_command(server)).await
    }

    async fn remove(&self, port: u16) -> Result<()> {
        self.expect_ok(&format!("remove: {}", json!({ "server_port": port })))
            .await
    }
}

#[async_trait]
impl ServerManager for SsManager {
    #[instrument(skip(self, servers), fields(count = servers.len()))]
    async fn update(&self, servers: Vec<ServerDescriptor>) -> Result<()> {
        let desired: HashMap<u16, ServerDescriptor> =
            servers.into_iter().map(|s| (s.port, s)).collect();
        let mut running = self.servers.lock().await;
        let (to_remove, to_add) = plan(&running, &desired);

        if to_remove.is_empty() && to_add.is_empty() {
            debug!("Server set unchanged");
            return Ok(());
        }

        for port in &to_remove {
            self.remove(*port).await?;
            running.remove(port);
        }

        for server in &to_add {
            self.add(server).await?;
            running.insert(server.port, server.clone());
        }

        info!(
            "Reconciled servers: {} removed, {} added, {} running",
            to_remove.len(),
            to_add.len(),
            desired.len()
        );
        Ok(())
    }

    async fn stat(&self) -> Result<HashMap<u16, u64>> {
        let reply = self.command("ping").await?;
        parse_stat(&reply)
    }

    async fn stop(&self) -> Result<()> {
        let mut running = self.servers.lock().await;
        let mut ports: Vec<u16> = running.keys().copied().collect();
        ports.sort_unstable();

        for port in ports {
            match self.remove(port).await {
                Ok(()) => {
                    running.remove(&port);
                }
                Err(e) => warn!("Failed to stop server on port {}: {}", port, e),
            }
        }
        info!("Server manager stopped");
        Ok(())
    }
}

fn add_command(server: &ServerDescriptor) -> String {
    let spec = json!({
        "server_port": server.port,
        "password": server.password,
        "method": server.method,
        "fast_open": server.fast_open,
        "mode": if server.udp { "tcp_and_udp" } else { "tcp_only" },
    });
    format!("add: {}", spec)
}

/// Ports to remove and servers to add so that `current` becomes `desired`.
/// A changed descriptor is removed and re-added.
fn plan(
    current: &HashMap<u16, ServerDescriptor>,
    desired: &HashMap<u16, ServerDescriptor>,
) -> (Vec<u16>, Vec<ServerDescriptor>) {
    let mut to_remove: Vec<u16> = current
        .iter()
        .filter(|(port, server)| desired.get(port) != Some(server))
        .map(|(port, _)| *port)
        .collect();
    to_remove.sort_unstable();

    let mut to_add: Vec<ServerDescriptor> = desired
        .values()
        .filter(|server| current.get(&server.port) != Some(server))
        .cloned()
        .collect();
    to_add.sort_unstable_by_key(|s| s.port);

    (to_remove, to_add)
}

fn parse_stat(reply: &str) -> Result<HashMap<u16, u64>> {
    let body = reply
        .strip_prefix("stat:")
        .ok_or_else(|| YasspError::Manager(format!("unexpected stat reply: {}", reply)))?;

    let raw: HashMap<String, Value> = serde_json::from_str(body.trim())?;
    raw.into_iter()
        .map(|(port, bytes)| {
            let port = port
                .parse::<u16>()
                .map_err(|_| YasspError::Payload(format!("invalid port in stat: {}", port)))?;
            let bytes = bytes
                .as_u64()
                .ok_or_else(|| YasspError::Payload(format!("invalid traffic for port {}", port)))?;
            Ok((port, bytes))
        })
        .collect()
}
