//! Where a process step stands in producing its current output.
//!
//! The record only ever moves forward through
//! `Uninitialized -> PreProduction -> PostProduction -> ValidatedPostProduction`
//! (with `ValidatedPostProduction -> PostProduction` for every further input
//! delivery). Every update builds a new record from the old one.

use serde::{Deserialize, Serialize};

use crate::error::PlanningError;
use crate::fixed::Mass;
use crate::stream::StreamState;

/// Output known, no input requested yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreProductionStateData {
    pub current_output_stream_state: StreamState,
    pub process_state_name: String,
    pub storage_level: Mass,
}

/// An input delivery is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostProductionStateData {
    pub current_output_stream_state: StreamState,
    pub process_state_name: String,
    pub storage_level: Mass,
    pub current_input_stream_state: StreamState,
    pub validated_input_stream_list: Vec<StreamState>,
}

/// Every requested input has been delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedPostProductionStateData {
    pub current_output_stream_state: StreamState,
    pub process_state_name: String,
    pub storage_level: Mass,
    pub validated_input_stream_list: Vec<StreamState>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductionStateData {
    #[default]
    Uninitialized,
    PreProduction(PreProductionStateData),
    PostProduction(PostProductionStateData),
    ValidatedPostProduction(ValidatedPostProductionStateData),
}

impl ProductionStateData {
    pub fn variant_name(&self) -> &'static str {
        match self {
            ProductionStateData::Uninitialized => "UninitializedCurrentStateData",
            ProductionStateData::PreProduction(_) => "PreProductionStateData",
            ProductionStateData::PostProduction(_) => "PostProductionStateData",
            ProductionStateData::ValidatedPostProduction(_) => "ValidatedPostProductionStateData",
        }
    }

    pub fn output_stream_state(&self) -> Result<&StreamState, PlanningError> {
        match self {
            ProductionStateData::Uninitialized => Err(self.unexpected("output_stream_state")),
            ProductionStateData::PreProduction(d) => Ok(&d.current_output_stream_state),
            ProductionStateData::PostProduction(d) => Ok(&d.current_output_stream_state),
            ProductionStateData::ValidatedPostProduction(d) => Ok(&d.current_output_stream_state),
        }
    }

    pub fn storage_level(&self) -> Result<Mass, PlanningError> {
        match self {
            ProductionStateData::Uninitialized => Err(self.unexpected("storage_level")),
            ProductionStateData::PreProduction(d) => Ok(d.storage_level),
            ProductionStateData::PostProduction(d) => Ok(d.storage_level),
            ProductionStateData::ValidatedPostProduction(d) => Ok(d.storage_level),
        }
    }

    /// Inputs delivered so far, oldest request first.
    pub fn validated_inputs(&self) -> &[StreamState] {
        match self {
            ProductionStateData::PostProduction(d) => &d.validated_input_stream_list,
            ProductionStateData::ValidatedPostProduction(d) => &d.validated_input_stream_list,
            _ => &[],
        }
    }

    pub fn pending_input(&self) -> Option<&StreamState> {
        match self {
            ProductionStateData::PostProduction(d) => Some(&d.current_input_stream_state),
            _ => None,
        }
    }

    pub(crate) fn unexpected(&self, operation: &str) -> PlanningError {
        PlanningError::illogical(
            "production state",
            format!("{operation} is not possible from {}", self.variant_name()),
        )
    }
}

// ---------------------------------------------------------------------------
// ProductionProcessStateContainer
// ---------------------------------------------------------------------------

/// Owner of a step's [`ProductionStateData`]. Each method is one legal
/// transition and fails on any other predecessor, leaving the record intact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionProcessStateContainer {
    current: ProductionStateData,
}

impl ProductionProcessStateContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> &ProductionStateData {
        &self.current
    }

    fn take(&mut self) -> ProductionStateData {
        std::mem::take(&mut self.current)
    }

    fn refuse(&mut self, previous: ProductionStateData, operation: &str) -> PlanningError {
        let err = previous.unexpected(operation);
        self.current = previous;
        err
    }

    /// First output of the step.
    pub fn initialize_production_data(
        &mut self,
        output: StreamState,
        process_state_name: &str,
        storage_level: Mass,
    ) -> Result<(), PlanningError> {
        match self.take() {
            ProductionStateData::Uninitialized => {
                self.current = pre_production(output, process_state_name, storage_level);
                Ok(())
            }
            other => Err(self.refuse(other, "initialize_production_data")),
        }
    }

    /// Start over for the next output. Illegal while an input is pending.
    pub fn prepare_for_new_output_branch(
        &mut self,
        output: StreamState,
        process_state_name: &str,
        storage_level: Mass,
    ) -> Result<(), PlanningError> {
        match self.take() {
            ProductionStateData::Uninitialized
            | ProductionStateData::PreProduction(_)
            | ProductionStateData::ValidatedPostProduction(_) => {
                self.current = pre_production(output, process_state_name, storage_level);
                Ok(())
            }
            other @ ProductionStateData::PostProduction(_) => {
                Err(self.refuse(other, "prepare_for_new_output_branch"))
            }
        }
    }

    pub fn add_first_input_stream_state(&mut self, input: StreamState) -> Result<(), PlanningError> {
        match self.take() {
            ProductionStateData::PreProduction(d) => {
                self.current = ProductionStateData::PostProduction(PostProductionStateData {
                    current_output_stream_state: d.current_output_stream_state,
                    process_state_name: d.process_state_name,
                    storage_level: d.storage_level,
                    current_input_stream_state: input,
                    validated_input_stream_list: Vec::new(),
                });
                Ok(())
            }
            other => Err(self.refuse(other, "add_first_input_stream_state")),
        }
    }

    pub fn add_next_input_stream_state(&mut self, input: StreamState) -> Result<(), PlanningError> {
        match self.take() {
            ProductionStateData::ValidatedPostProduction(d) => {
                self.current = ProductionStateData::PostProduction(PostProductionStateData {
                    current_output_stream_state: d.current_output_stream_state,
                    process_state_name: d.process_state_name,
                    storage_level: d.storage_level,
                    current_input_stream_state: input,
                    validated_input_stream_list: d.validated_input_stream_list,
                });
                Ok(())
            }
            other => Err(self.refuse(other, "add_next_input_stream_state")),
        }
    }

    /// Request the next input from whichever state the record is in.
    pub fn add_input_stream_state(&mut self, input: StreamState) -> Result<(), PlanningError> {
        match self.current {
            ProductionStateData::PreProduction(_) => self.add_first_input_stream_state(input),
            _ => self.add_next_input_stream_state(input),
        }
    }

    pub fn adapt_existing_input_stream_state(&mut self, adapted: StreamState) -> Result<(), PlanningError> {
        match self.take() {
            ProductionStateData::PostProduction(d) => {
                self.current = ProductionStateData::PostProduction(PostProductionStateData {
                    current_input_stream_state: adapted,
                    ..d
                });
                Ok(())
            }
            other => Err(self.refuse(other, "adapt_existing_input_stream_state")),
        }
    }

    /// The pending input arrived as `delivered`; its mass goes to storage.
    pub fn validate_input_stream(&mut self, delivered: StreamState) -> Result<(), PlanningError> {
        match self.take() {
            ProductionStateData::PostProduction(d) => {
                let mut validated = d.validated_input_stream_list;
                validated.push(delivered);
                self.current =
                    ProductionStateData::ValidatedPostProduction(ValidatedPostProductionStateData {
                        current_output_stream_state: d.current_output_stream_state,
                        process_state_name: d.process_state_name,
                        storage_level: d.storage_level + delivered.mass(),
                        validated_input_stream_list: validated,
                    });
                Ok(())
            }
            other => Err(self.refuse(other, "validate_input_stream")),
        }
    }

    pub fn update_storage_level(&mut self, storage_level: Mass) -> Result<(), PlanningError> {
        match &mut self.current {
            ProductionStateData::PreProduction(d) => d.storage_level = storage_level,
            ProductionStateData::PostProduction(d) => d.storage_level = storage_level,
            ProductionStateData::ValidatedPostProduction(d) => d.storage_level = storage_level,
            ProductionStateData::Uninitialized => {
                return Err(ProductionStateData::Uninitialized.unexpected("update_storage_level"));
            }
        }
        Ok(())
    }

    pub fn set_process_state_name(&mut self, name: &str) -> Result<(), PlanningError> {
        match &mut self.current {
            ProductionStateData::PreProduction(d) => d.process_state_name = name.to_string(),
            ProductionStateData::PostProduction(d) => d.process_state_name = name.to_string(),
            ProductionStateData::ValidatedPostProduction(d) => {
                d.process_state_name = name.to_string()
            }
            ProductionStateData::Uninitialized => {
                return Err(ProductionStateData::Uninitialized.unexpected("set_process_state_name"));
            }
        }
        Ok(())
    }
}

fn pre_production(output: StreamState, process_state_name: &str, storage_level: Mass) -> ProductionStateData {
    ProductionStateData::PreProduction(PreProductionStateData {
        current_output_stream_state: output,
        process_state_name: process_state_name.to_string(),
        storage_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn batch(end: &str, m: f64) -> StreamState {
        make_batch_stream("s", "a", "b", ore(), 20, None)
            .create_state_ending_at(ts(end), mass(m), None)
            .unwrap()
    }

    #[test]
    fn full_cycle_accumulates_storage() {
        let mut c = ProductionProcessStateContainer::new();
        c.initialize_production_data(batch("2024-01-01 12:00:00", 300.0), "Output", mass(0.0))
            .unwrap();
        c.add_input_stream_state(batch("2024-01-01 11:20:00", 300.0)).unwrap();
        assert!(c.data().pending_input().is_some());
        c.validate_input_stream(batch("2024-01-01 11:20:00", 200.0)).unwrap();
        assert_eq!(c.data().storage_level().unwrap(), mass(200.0));
        c.add_input_stream_state(batch("2024-01-01 10:40:00", 100.0)).unwrap();
        c.validate_input_stream(batch("2024-01-01 10:40:00", 100.0)).unwrap();
        assert_eq!(c.data().storage_level().unwrap(), mass(300.0));
        assert_eq!(c.data().validated_inputs().len(), 2);
    }

    #[test]
    fn validate_without_pending_input_is_illogical() {
        let mut c = ProductionProcessStateContainer::new();
        c.initialize_production_data(batch("2024-01-01 12:00:00", 1.0), "Output", mass(0.0))
            .unwrap();
        let before = c.clone();
        let err = c.validate_input_stream(batch("2024-01-01 11:00:00", 1.0)).unwrap_err();
        assert!(matches!(err, PlanningError::IllogicalSimulationState { .. }));
        assert_eq!(c, before);
    }

    #[test]
    fn new_output_branch_refused_while_input_pending() {
        let mut c = ProductionProcessStateContainer::new();
        c.initialize_production_data(batch("2024-01-01 12:00:00", 1.0), "Output", mass(0.0))
            .unwrap();
        c.add_first_input_stream_state(batch("2024-01-01 11:00:00", 1.0)).unwrap();
        assert!(c
            .prepare_for_new_output_branch(batch("2024-01-01 10:00:00", 1.0), "Output", mass(0.0))
            .is_err());
    }

    #[test]
    fn initialize_twice_is_illogical() {
        let mut c = ProductionProcessStateContainer::new();
        c.initialize_production_data(batch("2024-01-01 12:00:00", 1.0), "Output", mass(0.0))
            .unwrap();
        assert!(c
            .initialize_production_data(batch("2024-01-01 12:00:00", 1.0), "Output", mass(0.0))
            .is_err());
    }

    #[test]
    fn adaption_replaces_pending_input() {
        let mut c = ProductionProcessStateContainer::new();
        c.initialize_production_data(batch("2024-01-01 12:00:00", 1.0), "Output", mass(0.0))
            .unwrap();
        c.add_first_input_stream_state(batch("2024-01-01 11:00:00", 1.0)).unwrap();
        let adapted = batch("2024-01-01 10:00:00", 1.0);
        c.adapt_existing_input_stream_state(adapted).unwrap();
        assert_eq!(c.data().pending_input(), Some(&adapted));
    }

    #[test]
    fn uninitialized_has_no_storage_level() {
        let c = ProductionProcessStateContainer::new();
        assert!(c.data().storage_level().is_err());
    }
}
