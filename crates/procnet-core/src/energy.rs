//! Registration of energy-relevant model parts.
//!
//! A chain announces every process state and every stream to an
//! [`EnergyDataRegistry`] once before planning starts. What the registry does
//! with them (load profiles, energy totals) is up to the implementor.

use crate::petri_net::ProcessState;
use crate::stream::Stream;

/// Collector of energy data, called at chain initialisation only.
///
/// Both hooks default to no-ops so implementors override what they need.
pub trait EnergyDataRegistry: std::fmt::Debug {
    fn name(&self) -> &str;

    fn add_process_state_energy_data(&mut self, step_name: &str, state: &ProcessState) {
        let _ = (step_name, state);
    }

    fn add_stream_energy_data(&mut self, stream: &Stream) {
        let _ = stream;
    }
}

/// Registry that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEnergyData;

impl EnergyDataRegistry for NoEnergyData {
    fn name(&self) -> &str {
        "none"
    }
}
