use std::collections::BTreeMap;

/// Traffic of one port selected for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortTraffic {
    /// Bytes not yet acknowledged by the panel
    pub increment: u64,
    /// Cumulative counter at decision time; becomes the synced value on commit
    pub observed: u64,
}

/// The due set of one ledger evaluation, uploaded as a single batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficReport {
    ports: BTreeMap<u16, PortTraffic>,
}

impl TrafficReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, port: u16, increment: u64, observed: u64) {
        self.ports.insert(
            port,
            PortTraffic {
                increment,
                observed,
            },
        );
    }

    pub fn get(&self, port: u16) -> Option<&PortTraffic> {
        self.ports.get(&port)
    }

    pub fn contains(&self, port: u16) -> bool {
        self.ports.contains_key(&port)
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// `(port, increment)` pairs in port order
    pub fn increments(&self) -> impl Iterator<Item = (u16, u64)> + '_ {
        self.ports.iter().map(|(port, t)| (*port, t.increment))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &PortTraffic)> + '_ {
        self.ports.iter().map(|(port, t)| (*port, t))
    }

    pub fn total_bytes(&self) -> u64 {
        self.ports.values().map(|t| t.increment).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_orders_ports() {
        let mut report = TrafficReport::new();
        report.insert(9000, 10, 110);
        report.insert(8000, 5, 5);

        let increments: Vec<_> = report.increments().collect();
        assert_eq!(increments, vec![(8000, 5), (9000, 10)]);
        assert_eq!(report.total_bytes(), 15);
        assert_eq!(report.get(9000).unwrap().observed, 110);
        assert!(!report.contains(7000));
    }
}
