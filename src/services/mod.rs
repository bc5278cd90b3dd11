//! Background services

pub mod sync;
pub mod traffic_ledger;

pub use sync::{SyncHandle, SyncService};
pub use traffic_ledger::{LedgerEntry, SyncPolicy, TrafficLedger};
