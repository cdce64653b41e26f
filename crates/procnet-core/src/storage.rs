//! Mass held by a node between input and output.
//!
//! Planning runs backward, so `current_level` is the stock still available
//! at the node's planning frontier, not a forward-simulated level. The
//! forward view is rebuilt from the signed [`StorageEntry`] records of the
//! plan with [`Storage::levels_forward`].

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::commodity::Commodity;
use crate::fixed::{Fixed64, Mass};
use crate::plan::StorageEntry;
use crate::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storage {
    pub node_name: String,
    pub commodity: Commodity,
    pub initial_level: Mass,
    pub current_level: Mass,
    pub tolerance: Mass,
}

/// Level of a storage right after the entries booked at `time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLevel {
    pub time: Timestamp,
    pub level: Mass,
}

impl Storage {
    pub fn new(node_name: &str, commodity: Commodity, initial_level: Mass, tolerance: Mass) -> Self {
        Self {
            node_name: node_name.to_string(),
            commodity,
            initial_level,
            current_level: initial_level,
            tolerance,
        }
    }

    pub fn withdraw(&mut self, mass: Mass) {
        self.current_level -= mass;
    }

    pub fn deposit(&mut self, mass: Mass) {
        self.current_level += mass;
    }

    pub fn entry(&self, time: Timestamp, mass_change: Mass, description: &str) -> StorageEntry {
        StorageEntry {
            time,
            commodity: self.commodity.clone(),
            mass_change,
            description: description.to_string(),
        }
    }

    /// Levels in time order, starting from `initial_level`. Entries at the
    /// same instant are merged; credits and debits at one instant net out.
    pub fn levels_forward(&self, entries: &[StorageEntry]) -> Vec<StorageLevel> {
        let mut sorted: Vec<&StorageEntry> = entries.iter().collect();
        sorted.sort_by_key(|e| e.time);

        let mut levels: Vec<StorageLevel> = Vec::with_capacity(sorted.len());
        let mut level = self.initial_level;
        for entry in sorted {
            level += entry.mass_change;
            match levels.last_mut() {
                Some(last) if last.time == entry.time => last.level = level,
                _ => levels.push(StorageLevel {
                    time: entry.time,
                    level,
                }),
            }
        }
        levels
    }

    /// Levels that fall below `-tolerance`. Each one is logged as a warning;
    /// none of them aborts planning.
    pub fn check_levels(&self, entries: &[StorageEntry]) -> Vec<StorageLevel> {
        let floor = Fixed64::ZERO - self.tolerance;
        let violations: Vec<StorageLevel> = self
            .levels_forward(entries)
            .into_iter()
            .filter(|l| l.level < floor)
            .collect();
        for v in &violations {
            warn!(
                node = %self.node_name,
                commodity = %self.commodity,
                time = %v.time,
                level = %v.level,
                "storage level below tolerance"
            );
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn storage(initial: f64) -> Storage {
        Storage::new("mill", ore(), mass(initial), mass(0.001))
    }

    #[test]
    fn withdraw_and_deposit_move_current_level() {
        let mut s = storage(100.0);
        s.withdraw(mass(30.0));
        s.deposit(mass(5.0));
        assert_eq!(s.current_level, mass(75.0));
        assert_eq!(s.initial_level, mass(100.0));
    }

    #[test]
    fn levels_forward_sorts_and_merges_instants() {
        let s = storage(10.0);
        let entries = vec![
            s.entry(ts("2024-01-01 12:00:00"), mass(-10.0), "output"),
            s.entry(ts("2024-01-01 11:00:00"), mass(5.0), "input"),
            s.entry(ts("2024-01-01 11:00:00"), mass(-2.0), "output"),
        ];
        let levels = s.levels_forward(&entries);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].level, mass(13.0));
        assert_eq!(levels[1].level, mass(3.0));
    }

    #[test]
    fn check_levels_reports_underflow_only() {
        let s = storage(0.0);
        let entries = vec![
            s.entry(ts("2024-01-01 10:00:00"), mass(-0.0005), "slack"),
            s.entry(ts("2024-01-01 11:00:00"), mass(-1.0), "deficit"),
        ];
        let violations = s.check_levels(&entries);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].time, ts("2024-01-01 11:00:00"));
    }
}
