use serde::{Deserialize, Serialize};

/// One shadowsocks server instance as the manager should run it.
///
/// `port` is the identity of a server: two descriptors with the same port
/// describe the same instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    #[serde(default)]
    pub host: String,
    pub port: u16,
    pub password: String,
    pub method: String,
    /// One-time auth
    #[serde(default)]
    pub ota: bool,
    /// UDP relay
    #[serde(default)]
    pub udp: bool,
    /// TCP fast open
    #[serde(default)]
    pub fast_open: bool,
}
