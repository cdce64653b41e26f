//! Conversion between a step's output request and the input it needs.

use serde::{Deserialize, Serialize};

use crate::commodity::Commodity;
use crate::error::{ConfigurationError, PlanningError};
use crate::fixed::{Fixed64, Mass};
use crate::simulation_data::production_state::ProductionStateData;
use crate::storage::Storage;

/// Fixed-ratio mass balance of a process step.
///
/// Storage levels are kept in input units: `required = output / factor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MassBalance {
    pub commodity: Commodity,
    pub input_to_output_conversion_factor: Fixed64,
    pub main_input_stream: String,
    pub main_output_stream: String,
    storage: Option<Storage>,
}

impl MassBalance {
    pub fn new(
        commodity: Commodity,
        input_to_output_conversion_factor: Fixed64,
        main_input_stream: &str,
        main_output_stream: &str,
    ) -> Result<Self, ConfigurationError> {
        if input_to_output_conversion_factor <= Fixed64::ZERO {
            return Err(ConfigurationError::InvalidConversionFactor(
                main_output_stream.to_string(),
            ));
        }
        Ok(Self {
            commodity,
            input_to_output_conversion_factor,
            main_input_stream: main_input_stream.to_string(),
            main_output_stream: main_output_stream.to_string(),
            storage: None,
        })
    }

    /// Create the step's storage. Must happen exactly once, before planning.
    pub fn create_storage(
        &mut self,
        node_name: &str,
        current_storage_level: Mass,
        tolerance: Mass,
    ) -> Result<(), ConfigurationError> {
        if self.storage.is_some() {
            return Err(ConfigurationError::StorageAlreadyCreated(node_name.to_string()));
        }
        self.storage = Some(Storage::new(
            node_name,
            self.commodity.clone(),
            current_storage_level,
            tolerance,
        ));
        Ok(())
    }

    pub fn storage(&self) -> Result<&Storage, ConfigurationError> {
        self.storage
            .as_ref()
            .ok_or_else(|| ConfigurationError::StorageNotCreated(self.main_output_stream.clone()))
    }

    pub fn storage_mut(&mut self) -> Result<&mut Storage, ConfigurationError> {
        let name = self.main_output_stream.clone();
        self.storage
            .as_mut()
            .ok_or(ConfigurationError::StorageNotCreated(name))
    }

    pub fn required_input_mass(&self, output_mass: Mass) -> Result<Mass, PlanningError> {
        output_mass
            .checked_div(self.input_to_output_conversion_factor)
            .ok_or_else(|| {
                PlanningError::illogical(
                    &self.main_output_stream,
                    format!("required input for {output_mass} overflows"),
                )
            })
    }

    /// Input mass still to be requested for the current output.
    ///
    /// May be negative; callers decide what a negative value means.
    pub fn determine_missing_mass_for_output_stream(
        &self,
        state: &ProductionStateData,
    ) -> Result<Mass, PlanningError> {
        let required = self.required_input_mass(state.output_stream_state()?.mass())?;
        Ok(required - state.storage_level()?)
    }

    pub fn check_if_output_stream_can_be_supplied_directly_from_storage(
        &self,
        state: &ProductionStateData,
    ) -> Result<bool, PlanningError> {
        let required = self.required_input_mass(state.output_stream_state()?.mass())?;
        Ok(state.storage_level()? >= required)
    }
}
