use serde::{Deserialize, Serialize};

use crate::commodity::Commodity;
use crate::communicator::ProcessNodeCommunicator;
use crate::context::SimulationContext;
use crate::energy::EnergyDataRegistry;
use crate::error::{ConfigurationError, PlanningError};
use crate::fixed::{Fixed64, Mass};
use crate::mass_balance::MassBalance;
use crate::operation::NodeOperation;
use crate::petri_net::{PetriNetTemplate, ProcessStateNetwork};
use crate::simulation_data::ProcessStateNetworkContainer;
use crate::storage::Storage;
use crate::time::TimeData;

/// A transformation node: one main input stream, one main output stream,
/// a petri net describing its states and a mass balance with storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStep {
    pub name: String,
    petri_net: ProcessStateNetwork,
    mass_balance: MassBalance,
    container: ProcessStateNetworkContainer,
}

impl ProcessStep {
    /// Build a step and create its storage. The net must provide the mass
    /// balance's main output stream and be leavable backward from every state.
    pub fn new(
        name: &str,
        petri_net: ProcessStateNetwork,
        mut mass_balance: MassBalance,
        initial_storage_level: Mass,
        storage_tolerance: Mass,
    ) -> Result<Self, ConfigurationError> {
        petri_net.validate(&mass_balance.main_output_stream)?;
        mass_balance.create_storage(name, initial_storage_level, storage_tolerance)?;
        let container = ProcessStateNetworkContainer {
            current_process_state_name: petri_net.idle_state_name().to_string(),
            ..ProcessStateNetworkContainer::new()
        };
        Ok(Self {
            name: name.to_string(),
            petri_net,
            mass_balance,
            container,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_template(
        name: &str,
        template: &PetriNetTemplate,
        commodity: Commodity,
        input_to_output_conversion_factor: Fixed64,
        input_stream: &str,
        output_stream: &str,
        initial_storage_level: Mass,
        storage_tolerance: Mass,
    ) -> Result<Self, ConfigurationError> {
        let petri_net = ProcessStateNetwork::from_template(template, input_stream, output_stream)?;
        let mass_balance = MassBalance::new(
            commodity,
            input_to_output_conversion_factor,
            input_stream,
            output_stream,
        )?;
        Self::new(name, petri_net, mass_balance, initial_storage_level, storage_tolerance)
    }

    pub fn process_input_order(
        &mut self,
        operation: NodeOperation,
        ctx: &mut SimulationContext<'_>,
    ) -> Result<NodeOperation, PlanningError> {
        ProcessNodeCommunicator::new(
            &self.name,
            &self.petri_net,
            &mut self.mass_balance,
            &mut self.container,
        )
        .process_input_order(operation, ctx)
    }

    pub fn register_energy_data(&self, registry: &mut dyn EnergyDataRegistry) {
        for state in self.petri_net.states() {
            registry.add_process_state_energy_data(&self.name, state);
        }
    }

    pub fn petri_net(&self) -> &ProcessStateNetwork {
        &self.petri_net
    }

    pub fn mass_balance(&self) -> &MassBalance {
        &self.mass_balance
    }

    pub fn storage(&self) -> Result<&Storage, ConfigurationError> {
        self.mass_balance.storage()
    }

    pub fn container(&self) -> &ProcessStateNetworkContainer {
        &self.container
    }

    pub fn time_data(&self) -> &TimeData {
        &self.container.time_data
    }

    pub fn input_stream(&self) -> &str {
        &self.mass_balance.main_input_stream
    }

    pub fn output_stream(&self) -> &str {
        &self.mass_balance.main_output_stream
    }
}
