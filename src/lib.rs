//! YaSSP - shadowsocks node agent
//!
//! Keeps a node's shadowsocks servers in line with a YaSSP panel.
//!
//! ## Features
//!
//! - Periodic profile pull from `nico` and `moyu` flavored panels
//! - Server reconciliation through the shadowsocks manager UDP API
//! - Traffic accounting with size/age thresholds and at-least-once upload
//! - Final force flush of unsynced traffic on shutdown
//! - Optional push listener for panel-initiated profile updates

pub mod api;
pub mod config;
pub mod error;
pub mod manager;
pub mod models;
pub mod panel;
pub mod services;

pub use config::Config;
pub use error::{Result, YasspError};
