//! Load profiles for planned production.
//!
//! The [`LoadProfileHandler`] collects the energy-relevant parts of a model
//! while chains are initialised (it implements the core's
//! [`EnergyDataRegistry`]) and turns a finished production plan into
//! time-stamped power entries.
//!
//! # Design
//!
//! - Every process state of every step gets a power level. States declared
//!   as `IntermediateWithEnergy` bring their own, all others draw nothing
//!   unless a level is set explicitly.
//! - Streams draw power while they transfer, derived from a specific energy
//!   (energy per unit of mass) spread evenly over the transfer.
//! - A step's load entries cover its whole planned timeline, so a gap in
//!   them is a gap in the plan.

use std::collections::{BTreeMap, BTreeSet};

use procnet_core::energy::EnergyDataRegistry;
use procnet_core::fixed::{Fixed64, checked_div_64, checked_mul_64, hours};
use procnet_core::petri_net::{ProcessState, ProcessStateKind};
use procnet_core::plan::ProductionPlan;
use procnet_core::stream::Stream;
use procnet_core::time::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnergyError {
    #[error("energy of stream '{stream}' overflows for a transfer of {mass}")]
    Overflow { stream: String, mass: Fixed64 },
}

// ---------------------------------------------------------------------------
// Load profile entries
// ---------------------------------------------------------------------------

/// What draws the power of a load entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LoadSource {
    State { step: String, state: String },
    Stream { stream: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadProfileEntry {
    pub source: LoadSource,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    /// Power drawn over the whole entry.
    pub power: Fixed64,
}

impl LoadProfileEntry {
    pub fn energy(&self) -> Fixed64 {
        self.power * hours(self.end_time - self.start_time)
    }
}

/// Interval between two consecutive entries not covered by either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadGap {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

/// Gaps in a list of entries once sorted by start time.
pub fn check_if_list_of_load_profile_entries_has_gaps(entries: &[LoadProfileEntry]) -> Vec<LoadGap> {
    let mut sorted: Vec<&LoadProfileEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| (e.start_time, e.end_time));
    let mut gaps = Vec::new();
    let mut covered_until: Option<Timestamp> = None;
    for entry in sorted {
        if let Some(until) = covered_until {
            if entry.start_time > until {
                gaps.push(LoadGap {
                    start_time: until,
                    end_time: entry.start_time,
                });
            }
        }
        covered_until = Some(covered_until.map_or(entry.end_time, |u| u.max(entry.end_time)));
    }
    gaps
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadProfile {
    pub entries: Vec<LoadProfileEntry>,
}

impl LoadProfile {
    pub fn total_energy(&self) -> Fixed64 {
        self.entries
            .iter()
            .fold(Fixed64::ZERO, |acc, e| acc + e.energy())
    }

    /// Entries of one step's states.
    pub fn step_entries(&self, step: &str) -> Vec<LoadProfileEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(&e.source, LoadSource::State { step: s, .. } if s == step))
            .cloned()
            .collect()
    }

    /// Total power drawn at `time`. Entries are half-open: `[start, end)`.
    pub fn power_at(&self, time: Timestamp) -> Fixed64 {
        self.entries
            .iter()
            .filter(|e| e.start_time <= time && time < e.end_time)
            .fold(Fixed64::ZERO, |acc, e| acc + e.power)
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadProfileHandler {
    /// Power per (step, state), filled during registration.
    state_power: BTreeMap<(String, String), Fixed64>,
    /// Explicit power levels, taking precedence over registered ones.
    power_overrides: BTreeMap<(String, String), Fixed64>,
    /// Energy per unit of mass, per stream.
    specific_energy: BTreeMap<String, Fixed64>,
    registered_streams: BTreeSet<String>,
}

impl LoadProfileHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state_power(&mut self, step: &str, state: &str, power: Fixed64) {
        self.power_overrides
            .insert((step.to_string(), state.to_string()), power);
    }

    pub fn set_stream_specific_energy(&mut self, stream: &str, energy_per_mass: Fixed64) {
        self.specific_energy.insert(stream.to_string(), energy_per_mass);
    }

    pub fn state_power(&self, step: &str, state: &str) -> Option<Fixed64> {
        let key = (step.to_string(), state.to_string());
        self.power_overrides
            .get(&key)
            .or_else(|| self.state_power.get(&key))
            .copied()
    }

    pub fn is_stream_registered(&self, stream: &str) -> bool {
        self.registered_streams.contains(stream)
    }

    /// Power entries for every planned state of the registered steps and
    /// every transfer of the registered streams that carry energy.
    pub fn create_load_profile(&self, plan: &ProductionPlan) -> Result<LoadProfile, EnergyError> {
        let mut entries = Vec::new();
        let steps: BTreeSet<&str> = self.state_power.keys().map(|(step, _)| step.as_str()).collect();
        for step in steps {
            for data in plan.process_state_data(step) {
                let power = self
                    .state_power(step, &data.process_state_name)
                    .unwrap_or(Fixed64::ZERO);
                entries.push(LoadProfileEntry {
                    source: LoadSource::State {
                        step: step.to_string(),
                        state: data.process_state_name.clone(),
                    },
                    start_time: data.start_time,
                    end_time: data.end_time,
                    power,
                });
            }
        }

        for stream in &self.registered_streams {
            let Some(&energy_per_mass) = self.specific_energy.get(stream) else {
                continue;
            };
            for transfer in plan.stream_entries(stream) {
                let overflow = || EnergyError::Overflow {
                    stream: stream.clone(),
                    mass: transfer.mass,
                };
                let energy = checked_mul_64(transfer.mass, energy_per_mass).ok_or_else(overflow)?;
                let duration = hours(transfer.end_time - transfer.start_time);
                // Instantaneous transfers have no power level to report.
                if duration <= Fixed64::ZERO {
                    continue;
                }
                let power = checked_div_64(energy, duration).ok_or_else(overflow)?;
                entries.push(LoadProfileEntry {
                    source: LoadSource::Stream {
                        stream: stream.clone(),
                    },
                    start_time: transfer.start_time,
                    end_time: transfer.end_time,
                    power,
                });
            }
        }
        entries.sort_by(|a, b| (a.start_time, &a.source).cmp(&(b.start_time, &b.source)));
        Ok(LoadProfile { entries })
    }
}

impl EnergyDataRegistry for LoadProfileHandler {
    fn name(&self) -> &str {
        "load-profile"
    }

    fn add_process_state_energy_data(&mut self, step_name: &str, state: &ProcessState) {
        let power = match state.kind {
            ProcessStateKind::IntermediateWithEnergy { power } => power,
            _ => Fixed64::ZERO,
        };
        debug!(step = step_name, state = %state.name, %power, "state registered");
        self.state_power
            .insert((step_name.to_string(), state.name.clone()), power);
    }

    fn add_stream_energy_data(&mut self, stream: &Stream) {
        self.registered_streams.insert(stream.name().to_string());
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use procnet_core::plan::{ProcessStateData, StreamProductionPlanEntry};
    use procnet_core::test_utils::*;

    fn handler() -> LoadProfileHandler {
        let mut h = LoadProfileHandler::new();
        h.add_process_state_energy_data("mill", &ProcessState::idle("Idle"));
        h.add_process_state_energy_data(
            "mill",
            &ProcessState::intermediate_with_energy("Processing", mass(50.0)),
        );
        h.add_stream_energy_data(&make_batch_stream("ore", "mine", "mill", ore(), 30, None));
        h
    }

    fn plan() -> ProductionPlan {
        let mut plan = ProductionPlan::new();
        plan.add_process_state_data(
            "mill",
            ProcessStateData::new("Idle", ts("2024-01-01 08:00:00"), ts("2024-01-01 10:00:00")),
        );
        plan.add_process_state_data(
            "mill",
            ProcessStateData::new("Processing", ts("2024-01-01 10:00:00"), ts("2024-01-01 12:00:00")),
        );
        plan.add_stream_entry(StreamProductionPlanEntry {
            stream_name: "ore".into(),
            commodity: ore(),
            start_time: ts("2024-01-01 09:30:00"),
            end_time: ts("2024-01-01 10:00:00"),
            mass: mass(100.0),
            operation_rate: None,
        });
        plan
    }

    #[test]
    fn energy_states_carry_their_power() {
        let h = handler();
        assert_eq!(h.state_power("mill", "Processing"), Some(mass(50.0)));
        assert_eq!(h.state_power("mill", "Idle"), Some(Fixed64::ZERO));
        assert_eq!(h.state_power("press", "Idle"), None);
    }

    #[test]
    fn overrides_take_precedence() {
        let mut h = handler();
        h.set_state_power("mill", "Idle", mass(5.0));
        assert_eq!(h.state_power("mill", "Idle"), Some(mass(5.0)));
    }

    #[test]
    fn profile_covers_states_and_streams() {
        let mut h = handler();
        h.set_stream_specific_energy("ore", mass(0.5));
        let profile = h.create_load_profile(&plan()).unwrap();

        assert_eq!(profile.entries.len(), 3);
        // 50 kW for 2 h plus 100 * 0.5 spread over half an hour.
        assert_eq!(profile.total_energy(), mass(150.0));
        assert_eq!(profile.power_at(ts("2024-01-01 09:45:00")), mass(100.0));
        assert_eq!(profile.power_at(ts("2024-01-01 11:00:00")), mass(50.0));
    }

    #[test]
    fn streams_without_specific_energy_are_skipped() {
        let profile = handler().create_load_profile(&plan()).unwrap();
        assert!(profile
            .entries
            .iter()
            .all(|e| matches!(e.source, LoadSource::State { .. })));
    }

    #[test]
    fn contiguous_step_entries_have_no_gaps() {
        let profile = handler().create_load_profile(&plan()).unwrap();
        assert!(check_if_list_of_load_profile_entries_has_gaps(&profile.step_entries("mill")).is_empty());
    }

    #[test]
    fn gap_is_reported() {
        let entry = |start: &str, end: &str| LoadProfileEntry {
            source: LoadSource::State {
                step: "mill".into(),
                state: "Idle".into(),
            },
            start_time: ts(start),
            end_time: ts(end),
            power: Fixed64::ZERO,
        };
        let gaps = check_if_list_of_load_profile_entries_has_gaps(&[
            entry("2024-01-01 12:00:00", "2024-01-01 13:00:00"),
            entry("2024-01-01 10:00:00", "2024-01-01 11:00:00"),
        ]);
        assert_eq!(
            gaps,
            vec![LoadGap {
                start_time: ts("2024-01-01 11:00:00"),
                end_time: ts("2024-01-01 12:00:00"),
            }]
        );
    }
}
