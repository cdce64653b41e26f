//! Everything a process step tracks while it plans.

use serde::{Deserialize, Serialize};

use crate::error::PlanningError;
use crate::fixed::Mass;
use crate::id::{OutputBranchIdentifier, TemporalBranchIdentifier};
use crate::plan::{ProductionPlan, TemporaryProductionPlan};
use crate::simulation_data::branch::{BranchDataContainer, CompleteOutputBranchData};
use crate::simulation_data::production_state::{ProductionProcessStateContainer, ProductionStateData};
use crate::stream::StreamState;
use crate::time::{TimeData, Timestamp};

/// Branch bookkeeping, production state, current petri-net position and
/// time data of one step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStateNetworkContainer {
    pub branch_data: BranchDataContainer,
    pub production_state: ProductionProcessStateContainer,
    pub current_process_state_name: String,
    /// End of the occurrence of the current state, walking backward.
    pub current_state_end: Option<Timestamp>,
    pub time_data: TimeData,
}

impl ProcessStateNetworkContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn production_data(&self) -> &ProductionStateData {
        self.production_state.data()
    }

    /// Open an output branch and reset the production state for it.
    pub fn initialize_production_data(
        &mut self,
        parent_input_identifier: TemporalBranchIdentifier,
        downstream_node_name: &str,
        output_stream_name: &str,
        output: StreamState,
        output_state_name: &str,
        storage_level: Mass,
    ) -> Result<OutputBranchIdentifier, PlanningError> {
        let identifier = self.branch_data.create_new_output_branch_data(
            parent_input_identifier,
            downstream_node_name,
            output_stream_name,
            output,
        )?;
        if matches!(self.production_state.data(), ProductionStateData::Uninitialized) {
            self.production_state
                .initialize_production_data(output, output_state_name, storage_level)?;
        } else {
            self.production_state
                .prepare_for_new_output_branch(output, output_state_name, storage_level)?;
        }
        self.current_process_state_name = output_state_name.to_string();
        self.current_state_end = Some(output.end_time());
        self.time_data.last_process_state_switch_time = Some(output.end_time());
        Ok(identifier)
    }

    /// Request the next delivery on `stream_name`. Opens a stream branch when
    /// none is in progress for that stream.
    pub fn add_input_stream_state(
        &mut self,
        stream_name: &str,
        requested: StreamState,
    ) -> Result<TemporalBranchIdentifier, PlanningError> {
        let current = self.branch_data.current_stream_name().map(str::to_string);
        match current.as_deref() {
            Some(current) if current == stream_name => {}
            Some(_) => {
                self.branch_data.complete_stream_branch()?;
                self.branch_data.prepare_new_stream_branch(stream_name)?;
            }
            None => self.branch_data.prepare_new_stream_branch(stream_name)?,
        }
        let identifier = self.branch_data.prepare_new_temporal_branch(requested)?;
        self.production_state.add_input_stream_state(requested)?;
        Ok(identifier)
    }

    pub fn adapt_existing_input_stream_state(&mut self, adapted: StreamState) -> Result<(), PlanningError> {
        self.production_state.adapt_existing_input_stream_state(adapted)?;
        self.branch_data.adapt_temporal_branch(adapted)
    }

    /// The pending delivery arrived: production state and temporal branch
    /// both record it.
    pub fn validate_input_stream(&mut self, delivered: StreamState) -> Result<(), PlanningError> {
        self.production_state.validate_input_stream(delivered)?;
        self.branch_data.complete_temporal_branch(delivered)
    }

    pub fn update_storage_level(&mut self, storage_level: Mass) -> Result<(), PlanningError> {
        self.production_state.update_storage_level(storage_level)
    }

    pub fn temporary_production_plan_mut(&mut self) -> Result<&mut TemporaryProductionPlan, PlanningError> {
        self.branch_data.temporary_production_plan_mut()
    }

    /// Move to `state_name`, whose occurrence ends at `state_end`.
    pub fn enter_state(&mut self, state_name: &str, state_end: Timestamp) -> Result<(), PlanningError> {
        self.current_process_state_name = state_name.to_string();
        self.current_state_end = Some(state_end);
        self.time_data.last_process_state_switch_time = Some(state_end);
        self.production_state.set_process_state_name(state_name)
    }

    /// Close the stream branch in progress (if any), flush the temporary plan
    /// and complete the output branch. Commits the branch span to the time
    /// data.
    pub fn finish_output_branch(
        &mut self,
        plan: &mut ProductionPlan,
        step_name: &str,
    ) -> Result<CompleteOutputBranchData, PlanningError> {
        if self.branch_data.current_stream_name().is_some() {
            self.branch_data.complete_stream_branch()?;
        }
        let done = self.branch_data.finish_output_branch(plan, step_name)?.clone();
        self.time_data.commit(done.start_time, done.end_time);
        self.current_state_end = None;
        Ok(done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn state(end: &str, m: f64) -> StreamState {
        make_batch_stream("s", "a", "b", ore(), 20, None)
            .create_state_ending_at(ts(end), mass(m), None)
            .unwrap()
    }

    fn parent() -> TemporalBranchIdentifier {
        TemporalBranchIdentifier::new(0, OutputBranchIdentifier::new(0))
    }

    #[test]
    fn validation_updates_both_hierarchies() {
        let mut c = ProcessStateNetworkContainer::new();
        c.initialize_production_data(parent(), "sink", "steel", state("2024-01-01 12:00:00", 300.0), "Output", mass(0.0))
            .unwrap();
        let id = c
            .add_input_stream_state("ore", state("2024-01-01 11:40:00", 300.0))
            .unwrap();
        assert_eq!(id.branch_number, 0);
        c.validate_input_stream(state("2024-01-01 11:40:00", 300.0)).unwrap();
        assert_eq!(c.production_data().storage_level().unwrap(), mass(300.0));
        assert!(c.branch_data.pending_temporal_identifier().is_none());
    }

    #[test]
    fn finishing_commits_frontier() {
        let mut c = ProcessStateNetworkContainer::new();
        c.initialize_production_data(parent(), "sink", "steel", state("2024-01-01 12:00:00", 300.0), "Output", mass(0.0))
            .unwrap();
        c.add_input_stream_state("ore", state("2024-01-01 11:40:00", 300.0))
            .unwrap();
        c.validate_input_stream(state("2024-01-01 11:40:00", 300.0)).unwrap();
        let mut plan = ProductionPlan::new();
        let done = c.finish_output_branch(&mut plan, "mill").unwrap();
        assert_eq!(done.dict_of_complete_stream_branch.len(), 1);
        assert_eq!(c.time_data.frontier, Some(done.start_time));
    }

    #[test]
    fn second_branch_reuses_production_state() {
        let mut c = ProcessStateNetworkContainer::new();
        c.initialize_production_data(parent(), "sink", "steel", state("2024-01-01 12:00:00", 1.0), "Output", mass(1.0))
            .unwrap();
        let mut plan = ProductionPlan::new();
        c.finish_output_branch(&mut plan, "mill").unwrap();
        let id = c
            .initialize_production_data(parent(), "sink", "steel", state("2024-01-01 10:00:00", 1.0), "Output", mass(0.0))
            .unwrap();
        assert_eq!(id.branch_number, 1);
        assert_eq!(c.current_state_end, Some(ts("2024-01-01 10:00:00")));
    }
}
