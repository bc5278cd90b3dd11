//! Traffic ledger
//!
//! Tracks, per port, how much of the manager's cumulative counter the panel
//! has acknowledged, and picks the ports whose outstanding delta is due.
//!
//! A port is due when its delta is nonzero and either reached the byte
//! threshold, has been outstanding longer than the max age, or a force flush
//! was requested. Nothing is marked synced until [`TrafficLedger::commit`] is
//! called with an acknowledged report, so a failed upload is simply retried
//! on the next evaluation.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::SyncConfig;
use crate::models::TrafficReport;

/// When an outstanding delta becomes due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Bytes at which a delta is due regardless of age
    pub threshold: u64,
    /// Age past which a delta is due regardless of size
    pub max_age: Duration,
}

impl From<&SyncConfig> for SyncPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            threshold: config.traffic_threshold,
            max_age: config.traffic_max_age,
        }
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

/// Per-port bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Last cumulative value the panel acknowledged
    pub synced_bytes: u64,
    /// When the current unsynced delta first showed up
    pub first_unsynced_at: Option<Instant>,
}

#[derive(Debug, Clone, Default)]
pub struct TrafficLedger {
    policy: SyncPolicy,
    entries: HashMap<u16, LedgerEntry>,
}

impl TrafficLedger {
    pub fn new(policy: SyncPolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
        }
    }

    pub fn entry(&self, port: u16) -> Option<&LedgerEntry> {
        self.entries.get(&port)
    }

    /// Select the due set for a manager snapshot taken at `now`.
    ///
    /// A counter lower than the synced value means the server restarted; the
    /// port is rebased to zero and its whole current counter is outstanding.
    pub fn evaluate(
        &mut self,
        stat: &HashMap<u16, u64>,
        now: Instant,
        force: bool,
    ) -> TrafficReport {
        let mut report = TrafficReport::new();

        for (&port, &current) in stat {
            let entry = self.entries.entry(port).or_default();

            if current < entry.synced_bytes {
                debug!(
                    port,
                    current,
                    synced = entry.synced_bytes,
                    "Traffic counter went backwards, rebasing"
                );
                entry.synced_bytes = 0;
            }

            let increment = current - entry.synced_bytes;
            if increment == 0 {
                continue;
            }

            let since = *entry.first_unsynced_at.get_or_insert(now);
            let overdue = now.saturating_duration_since(since) > self.policy.max_age;

            if force || overdue || increment >= self.policy.threshold {
                report.insert(port, increment, current);
            }
        }

        report
    }

    /// Record that the panel acknowledged `report`
    pub fn commit(&mut self, report: &TrafficReport) {
        for (port, traffic) in report.iter() {
            let entry = self.entries.entry(port).or_default();
            entry.synced_bytes = traffic.observed;
            entry.first_unsynced_at = None;
        }
    }
}
