//! Per-node temporal bookkeeping for backward planning.
//!
//! Planning walks from deadlines towards the past, so a node's *frontier* is
//! the earliest instant it has already committed to. Anything requested from
//! the node afterwards has to end at or before that frontier.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Instant on the planning time axis.
pub type Timestamp = NaiveDateTime;

/// Temporal state of one process node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeData {
    /// Time of the most recent (i.e. earliest, planning backward) state switch.
    pub last_process_state_switch_time: Option<Timestamp>,
    /// Externally set switch time, consumed by `AtNextDiscreteEvent` switches.
    pub next_process_state_switch_time: Option<Timestamp>,
    /// Earliest instant committed by a completed branch.
    pub frontier: Option<Timestamp>,
    /// Latest instant ever committed. Used to pad the timeline at the end.
    pub latest_planned_time: Option<Timestamp>,
    /// Total idle time recorded between branches.
    #[serde(with = "duration_millis")]
    pub idle_time: TimeDelta,
}

impl Default for TimeData {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeData {
    pub fn new() -> Self {
        Self {
            last_process_state_switch_time: None,
            next_process_state_switch_time: None,
            frontier: None,
            latest_planned_time: None,
            idle_time: TimeDelta::zero(),
        }
    }

    /// Register a completed branch spanning `[start, end]`.
    pub fn commit(&mut self, start: Timestamp, end: Timestamp) {
        self.frontier = Some(match self.frontier {
            Some(f) => f.min(start),
            None => start,
        });
        self.latest_planned_time = Some(match self.latest_planned_time {
            Some(l) => l.max(end),
            None => end,
        });
        self.last_process_state_switch_time = self.frontier;
    }

    /// Account an idle occurrence between two branches.
    pub fn add_idle_time(&mut self, start: Timestamp, end: Timestamp) {
        if end > start {
            self.idle_time += end - start;
        }
    }

    /// Whether a delivery ending at `end` fits before the frontier.
    pub fn fits_before_frontier(&self, end: Timestamp) -> bool {
        self.frontier.is_none_or(|f| end <= f)
    }
}

/// Serde adapter storing a `TimeDelta` as whole milliseconds.
pub mod duration_millis {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let millis = i64::deserialize(deserializer)?;
        Ok(TimeDelta::milliseconds(millis))
    }
}

/// Parse `YYYY-MM-DD HH:MM:SS`. Convenience for data files and tests.
pub fn parse_timestamp(text: &str) -> Result<Timestamp, chrono::ParseError> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(text: &str) -> Timestamp {
        parse_timestamp(text).unwrap()
    }

    #[test]
    fn commit_moves_frontier_backward_only() {
        let mut td = TimeData::new();
        td.commit(ts("2024-01-01 10:00:00"), ts("2024-01-01 12:00:00"));
        td.commit(ts("2024-01-01 08:00:00"), ts("2024-01-01 09:00:00"));
        assert_eq!(td.frontier, Some(ts("2024-01-01 08:00:00")));
        assert_eq!(td.latest_planned_time, Some(ts("2024-01-01 12:00:00")));
        assert_eq!(td.last_process_state_switch_time, td.frontier);
    }

    #[test]
    fn fits_before_frontier() {
        let mut td = TimeData::new();
        assert!(td.fits_before_frontier(ts("2030-01-01 00:00:00")));
        td.commit(ts("2024-01-01 10:00:00"), ts("2024-01-01 12:00:00"));
        assert!(td.fits_before_frontier(ts("2024-01-01 10:00:00")));
        assert!(!td.fits_before_frontier(ts("2024-01-01 10:00:01")));
    }

    #[test]
    fn idle_time_accumulates() {
        let mut td = TimeData::new();
        td.add_idle_time(ts("2024-01-01 10:00:00"), ts("2024-01-01 10:30:00"));
        td.add_idle_time(ts("2024-01-01 11:00:00"), ts("2024-01-01 10:00:00"));
        assert_eq!(td.idle_time, TimeDelta::minutes(30));
    }
}
