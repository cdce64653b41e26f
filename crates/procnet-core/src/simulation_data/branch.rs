//! Branch bookkeeping of a process step.
//!
//! An output branch is one attempt to satisfy one output request. Inside it,
//! a stream branch collects the deliveries of one input stream, and every
//! single delivery is a temporal branch. The types below form a state
//! machine; every transition consumes the old value and builds the next.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PlanningError;
use crate::id::{OutputBranchIdentifier, StreamBranchIdentifier, TemporalBranchIdentifier};
use crate::plan::{ProductionPlan, TemporaryProductionPlan};
use crate::stream::StreamState;
use crate::time::Timestamp;

// ---------------------------------------------------------------------------
// Temporal and stream branches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteTemporalBranchData {
    pub identifier: TemporalBranchIdentifier,
    pub requested_stream_state: StreamState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteTemporalBranchData {
    pub identifier: TemporalBranchIdentifier,
    pub stream_state: StreamState,
}

/// Deliveries of one stream collected so far, none pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamBranchData {
    pub identifier: StreamBranchIdentifier,
    pub complete_temporal_branches: Vec<CompleteTemporalBranchData>,
}

/// A stream branch with one delivery pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteStreamBranchData {
    pub stream_branch: StreamBranchData,
    pub current_incomplete_input_branch: IncompleteTemporalBranchData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteStreamBranchData {
    pub identifier: StreamBranchIdentifier,
    pub temporal_branches: Vec<CompleteTemporalBranchData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrentStreamBranch {
    Ready(StreamBranchData),
    Awaiting(IncompleteStreamBranchData),
}

impl CurrentStreamBranch {
    pub fn stream_name(&self) -> &str {
        match self {
            CurrentStreamBranch::Ready(b) => &b.identifier.stream_name,
            CurrentStreamBranch::Awaiting(b) => &b.stream_branch.identifier.stream_name,
        }
    }
}

// ---------------------------------------------------------------------------
// Output branches
// ---------------------------------------------------------------------------

/// An open output branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBranchData {
    pub identifier: OutputBranchIdentifier,
    /// The requester's delivery this branch answers.
    pub parent_input_identifier: TemporalBranchIdentifier,
    pub downstream_node_name: String,
    pub output_stream_name: String,
    pub output_stream_state: StreamState,
    pub dict_of_complete_stream_branch: BTreeMap<String, CompleteStreamBranchData>,
    pub temporary_production_plan: TemporaryProductionPlan,
}

/// An output branch with a stream branch in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteOutputBranchData {
    pub output_branch: OutputBranchData,
    pub current_stream_branch: CurrentStreamBranch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteOutputBranchData {
    pub identifier: OutputBranchIdentifier,
    pub parent_input_identifier: TemporalBranchIdentifier,
    pub output_stream_state: StreamState,
    pub dict_of_complete_stream_branch: BTreeMap<String, CompleteStreamBranchData>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

/// What is kept of an archived output branch: its identity and span. The
/// stream branches are dropped once the branch has been flushed to the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBranchSummary {
    pub identifier: OutputBranchIdentifier,
    pub parent_input_identifier: TemporalBranchIdentifier,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

impl From<&CompleteOutputBranchData> for OutputBranchSummary {
    fn from(done: &CompleteOutputBranchData) -> Self {
        Self {
            identifier: done.identifier,
            parent_input_identifier: done.parent_input_identifier,
            start_time: done.start_time,
            end_time: done.end_time,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputBranch {
    #[default]
    Uninitialized,
    Open(OutputBranchData),
    Incomplete(IncompleteOutputBranchData),
    Complete(CompleteOutputBranchData),
}

impl OutputBranch {
    pub fn variant_name(&self) -> &'static str {
        match self {
            OutputBranch::Uninitialized => "UninitializedOutputBranchData",
            OutputBranch::Open(_) => "OutputBranchData",
            OutputBranch::Incomplete(b) => match b.current_stream_branch {
                CurrentStreamBranch::Ready(_) => "IncompleteOutputBranchData(StreamBranchData)",
                CurrentStreamBranch::Awaiting(_) => {
                    "IncompleteOutputBranchData(IncompleteStreamBranchData)"
                }
            },
            OutputBranch::Complete(_) => "CompleteOutputBranchData",
        }
    }

    fn refusal(&self, operation: &str) -> PlanningError {
        PlanningError::illogical(
            "branch data",
            format!("{operation} is not possible from {}", self.variant_name()),
        )
    }
}

// ---------------------------------------------------------------------------
// BranchDataContainer
// ---------------------------------------------------------------------------

/// Current output branch of a step plus summaries of completed ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchDataContainer {
    current: OutputBranch,
    history: Vec<OutputBranchSummary>,
    next_branch_number: u64,
}

impl BranchDataContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &OutputBranch {
        &self.current
    }

    pub fn history(&self) -> &[OutputBranchSummary] {
        &self.history
    }

    pub fn next_branch_number(&self) -> u64 {
        self.next_branch_number
    }

    fn take(&mut self) -> OutputBranch {
        std::mem::take(&mut self.current)
    }

    fn refuse(&mut self, previous: OutputBranch, operation: &str) -> PlanningError {
        let err = previous.refusal(operation);
        self.current = previous;
        err
    }

    /// Open a new output branch. A completed branch is archived first.
    pub fn create_new_output_branch_data(
        &mut self,
        parent_input_identifier: TemporalBranchIdentifier,
        downstream_node_name: &str,
        output_stream_name: &str,
        output_stream_state: StreamState,
    ) -> Result<OutputBranchIdentifier, PlanningError> {
        match self.take() {
            previous @ (OutputBranch::Uninitialized | OutputBranch::Complete(_)) => {
                if let OutputBranch::Complete(done) = &previous {
                    self.history.push(OutputBranchSummary::from(done));
                }
                let identifier = OutputBranchIdentifier::new(self.next_branch_number);
                self.next_branch_number += 1;
                self.current = OutputBranch::Open(OutputBranchData {
                    identifier,
                    parent_input_identifier,
                    downstream_node_name: downstream_node_name.to_string(),
                    output_stream_name: output_stream_name.to_string(),
                    output_stream_state,
                    dict_of_complete_stream_branch: BTreeMap::new(),
                    temporary_production_plan: TemporaryProductionPlan::default(),
                });
                Ok(identifier)
            }
            other => Err(self.refuse(other, "create_new_output_branch_data")),
        }
    }

    pub fn prepare_new_stream_branch(&mut self, stream_name: &str) -> Result<(), PlanningError> {
        match self.take() {
            OutputBranch::Open(output_branch) => {
                let identifier = StreamBranchIdentifier::new(stream_name, output_branch.identifier);
                self.current = OutputBranch::Incomplete(IncompleteOutputBranchData {
                    output_branch,
                    current_stream_branch: CurrentStreamBranch::Ready(StreamBranchData {
                        identifier,
                        complete_temporal_branches: Vec::new(),
                    }),
                });
                Ok(())
            }
            other => Err(self.refuse(other, "prepare_new_stream_branch")),
        }
    }

    /// Start one delivery on the current stream branch. The branch number is
    /// the count of deliveries already completed on it.
    pub fn prepare_new_temporal_branch(
        &mut self,
        requested_stream_state: StreamState,
    ) -> Result<TemporalBranchIdentifier, PlanningError> {
        match self.take() {
            OutputBranch::Incomplete(IncompleteOutputBranchData {
                output_branch,
                current_stream_branch: CurrentStreamBranch::Ready(stream_branch),
            }) => {
                let identifier = TemporalBranchIdentifier::new(
                    stream_branch.complete_temporal_branches.len() as u64,
                    output_branch.identifier,
                );
                self.current = OutputBranch::Incomplete(IncompleteOutputBranchData {
                    output_branch,
                    current_stream_branch: CurrentStreamBranch::Awaiting(IncompleteStreamBranchData {
                        stream_branch,
                        current_incomplete_input_branch: IncompleteTemporalBranchData {
                            identifier,
                            requested_stream_state,
                        },
                    }),
                });
                Ok(identifier)
            }
            other => Err(self.refuse(other, "prepare_new_temporal_branch")),
        }
    }

    /// Replace the requested state of the pending delivery.
    pub fn adapt_temporal_branch(&mut self, adapted: StreamState) -> Result<(), PlanningError> {
        match &mut self.current {
            OutputBranch::Incomplete(IncompleteOutputBranchData {
                current_stream_branch: CurrentStreamBranch::Awaiting(awaiting),
                ..
            }) => {
                awaiting.current_incomplete_input_branch.requested_stream_state = adapted;
                Ok(())
            }
            other => Err(other.refusal("adapt_temporal_branch")),
        }
    }

    /// The pending delivery arrived as `delivered`.
    pub fn complete_temporal_branch(&mut self, delivered: StreamState) -> Result<(), PlanningError> {
        match self.take() {
            OutputBranch::Incomplete(IncompleteOutputBranchData {
                output_branch,
                current_stream_branch: CurrentStreamBranch::Awaiting(awaiting),
            }) => {
                let mut stream_branch = awaiting.stream_branch;
                stream_branch
                    .complete_temporal_branches
                    .push(CompleteTemporalBranchData {
                        identifier: awaiting.current_incomplete_input_branch.identifier,
                        stream_state: delivered,
                    });
                self.current = OutputBranch::Incomplete(IncompleteOutputBranchData {
                    output_branch,
                    current_stream_branch: CurrentStreamBranch::Ready(stream_branch),
                });
                Ok(())
            }
            other => Err(self.refuse(other, "complete_temporal_branch")),
        }
    }

    pub fn complete_stream_branch(&mut self) -> Result<(), PlanningError> {
        match self.take() {
            OutputBranch::Incomplete(IncompleteOutputBranchData {
                mut output_branch,
                current_stream_branch: CurrentStreamBranch::Ready(stream_branch),
            }) => {
                let name = stream_branch.identifier.stream_name.clone();
                output_branch
                    .dict_of_complete_stream_branch
                    .entry(name)
                    .and_modify(|existing| {
                        existing
                            .temporal_branches
                            .extend(stream_branch.complete_temporal_branches.iter().cloned())
                    })
                    .or_insert_with(|| CompleteStreamBranchData {
                        identifier: stream_branch.identifier.clone(),
                        temporal_branches: stream_branch.complete_temporal_branches.clone(),
                    });
                self.current = OutputBranch::Open(output_branch);
                Ok(())
            }
            other => Err(self.refuse(other, "complete_stream_branch")),
        }
    }

    /// Close the open output branch. Start and end come from the temporary
    /// plan and the output stream state.
    pub fn complete_output_branch(&mut self) -> Result<&CompleteOutputBranchData, PlanningError> {
        match self.take() {
            OutputBranch::Open(output_branch) => {
                let (start_time, end_time) = branch_span(&output_branch);
                self.current = OutputBranch::Complete(CompleteOutputBranchData {
                    identifier: output_branch.identifier,
                    parent_input_identifier: output_branch.parent_input_identifier,
                    output_stream_state: output_branch.output_stream_state,
                    dict_of_complete_stream_branch: output_branch.dict_of_complete_stream_branch,
                    start_time,
                    end_time,
                });
                match &self.current {
                    OutputBranch::Complete(done) => Ok(done),
                    other => Err(other.refusal("complete_output_branch")),
                }
            }
            other => Err(self.refuse(other, "complete_output_branch")),
        }
    }

    /// Move the open branch's temporary plan into `plan` under `step_name`.
    pub fn store_branch_to_production_plan(
        &mut self,
        plan: &mut ProductionPlan,
        step_name: &str,
    ) -> Result<(), PlanningError> {
        match &mut self.current {
            OutputBranch::Open(output_branch) => {
                let temporary = std::mem::take(&mut output_branch.temporary_production_plan);
                plan.merge_temporary_plan(step_name, temporary);
                Ok(())
            }
            other => Err(other.refusal("store_branch_to_production_plan")),
        }
    }

    /// Flush and complete the open branch in one step. The branch span is
    /// taken before the temporary plan is flushed.
    pub fn finish_output_branch(
        &mut self,
        plan: &mut ProductionPlan,
        step_name: &str,
    ) -> Result<&CompleteOutputBranchData, PlanningError> {
        let span = match &self.current {
            OutputBranch::Open(output_branch) => branch_span(output_branch),
            other => return Err(other.refusal("finish_output_branch")),
        };
        self.store_branch_to_production_plan(plan, step_name)?;
        match self.take() {
            OutputBranch::Open(output_branch) => {
                self.current = OutputBranch::Complete(CompleteOutputBranchData {
                    identifier: output_branch.identifier,
                    parent_input_identifier: output_branch.parent_input_identifier,
                    output_stream_state: output_branch.output_stream_state,
                    dict_of_complete_stream_branch: output_branch.dict_of_complete_stream_branch,
                    start_time: span.0,
                    end_time: span.1,
                });
            }
            other => return Err(self.refuse(other, "finish_output_branch")),
        }
        match &self.current {
            OutputBranch::Complete(done) => Ok(done),
            other => Err(other.refusal("finish_output_branch")),
        }
    }

    // -- reads of the current branch --

    pub fn output_branch(&self) -> Result<&OutputBranchData, PlanningError> {
        match &self.current {
            OutputBranch::Open(b) => Ok(b),
            OutputBranch::Incomplete(b) => Ok(&b.output_branch),
            other => Err(other.refusal("output_branch")),
        }
    }

    pub fn temporary_production_plan_mut(&mut self) -> Result<&mut TemporaryProductionPlan, PlanningError> {
        match &mut self.current {
            OutputBranch::Open(b) => Ok(&mut b.temporary_production_plan),
            OutputBranch::Incomplete(b) => Ok(&mut b.output_branch.temporary_production_plan),
            other => Err(other.refusal("temporary_production_plan")),
        }
    }

    /// Name of the stream branch in progress, if any.
    pub fn current_stream_name(&self) -> Option<&str> {
        match &self.current {
            OutputBranch::Incomplete(b) => Some(b.current_stream_branch.stream_name()),
            _ => None,
        }
    }

    /// Identifier of the pending delivery, if any.
    pub fn pending_temporal_identifier(&self) -> Option<TemporalBranchIdentifier> {
        match &self.current {
            OutputBranch::Incomplete(IncompleteOutputBranchData {
                current_stream_branch: CurrentStreamBranch::Awaiting(awaiting),
                ..
            }) => Some(awaiting.current_incomplete_input_branch.identifier),
            _ => None,
        }
    }
}

fn branch_span(output_branch: &OutputBranchData) -> (Timestamp, Timestamp) {
    let output = &output_branch.output_stream_state;
    match output_branch.temporary_production_plan.time_span() {
        Some((start, end)) => (start.min(output.start_time()), end.max(output.end_time())),
        None => (output.start_time(), output.end_time()),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
