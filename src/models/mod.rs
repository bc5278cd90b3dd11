//! Value types shared across the agent

pub mod server;
pub mod traffic;

pub use server::ServerDescriptor;
pub use traffic::{PortTraffic, TrafficReport};
