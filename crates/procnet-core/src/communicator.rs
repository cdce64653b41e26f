//! The negotiation logic of a process step.
//!
//! A [`ProcessNodeCommunicator`] borrows one step for the duration of a
//! single node operation. It answers output requests by walking the step's
//! petri net backward from the output state, suspending whenever an input
//! must be requested upstream and resuming when that input is confirmed.

use tracing::debug;

use crate::context::SimulationContext;
use crate::error::PlanningError;
use crate::fixed::{Fixed64, Mass, rate_for_window};
use crate::mass_balance::MassBalance;
use crate::operation::{NodeOperation, NodeOperationData};
use crate::petri_net::ProcessStateNetwork;
use crate::plan::ProcessStateData;
use crate::simulation_data::ProcessStateNetworkContainer;
use crate::time::Timestamp;

/// Backward switches one walk may take before it is considered stuck in a
/// cycle of its petri net.
pub const MAX_BACKWARD_STEPS_PER_WALK: u32 = 10_000;

pub struct ProcessNodeCommunicator<'a> {
    step_name: &'a str,
    petri_net: &'a ProcessStateNetwork,
    mass_balance: &'a mut MassBalance,
    container: &'a mut ProcessStateNetworkContainer,
}

impl<'a> ProcessNodeCommunicator<'a> {
    pub fn new(
        step_name: &'a str,
        petri_net: &'a ProcessStateNetwork,
        mass_balance: &'a mut MassBalance,
        container: &'a mut ProcessStateNetworkContainer,
    ) -> Self {
        Self {
            step_name,
            petri_net,
            mass_balance,
            container,
        }
    }

    pub fn process_input_order(
        &mut self,
        operation: NodeOperation,
        ctx: &mut SimulationContext<'_>,
    ) -> Result<NodeOperation, PlanningError> {
        match operation {
            NodeOperation::UpstreamNewProductionOrder(data) => self.handle_output_request(data, ctx),
            NodeOperation::UpstreamAdaptionOrder(data) => self.plan_output(data, ctx),
            NodeOperation::DownstreamValidationOrder(data) => self.handle_input_validation(data, ctx),
            NodeOperation::DownstreamAdaptionOrder(data) => self.handle_input_adaption(data),
            other @ NodeOperation::TerminateProduction { .. } => {
                Err(PlanningError::IllogicalFunctionCall {
                    node: self.step_name.to_string(),
                    operation: other.kind_name().to_string(),
                })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Provider side: output requests
    // -----------------------------------------------------------------------

    fn handle_output_request(
        &mut self,
        data: NodeOperationData,
        ctx: &mut SimulationContext<'_>,
    ) -> Result<NodeOperation, PlanningError> {
        self.check_idle_for(&data)?;
        let stream = ctx.streams.get_stream(&data.stream_name)?;
        if let Some(adapted) = stream.propose_adaption(&data.stream_state, self.container.time_data.frontier) {
            debug!(
                node = self.step_name,
                stream = %data.stream_name,
                requested_end = %data.stream_state.end_time(),
                adapted_end = %adapted.end_time(),
                "proposing adaption"
            );
            return Ok(NodeOperation::DownstreamAdaptionOrder(
                data.reply(self.step_name, adapted),
            ));
        }
        self.plan_output(data, ctx)
    }

    /// Open a branch for an accepted output and start the backward walk.
    fn plan_output(
        &mut self,
        data: NodeOperationData,
        ctx: &mut SimulationContext<'_>,
    ) -> Result<NodeOperation, PlanningError> {
        self.check_idle_for(&data)?;
        let output = data.stream_state;
        if !self.container.time_data.fits_before_frontier(output.end_time()) {
            return Err(PlanningError::illogical(
                self.step_name,
                format!("confirmed output ending {} overlaps planned production", output.end_time()),
            ));
        }

        let petri_net = self.petri_net;
        let output_state = petri_net.output_state_for(&self.mass_balance.main_output_stream)?;
        let storage_level = self.mass_balance.storage()?.current_level;
        let frontier = self.container.time_data.frontier;

        self.container.initialize_production_data(
            data.requester_branch,
            &data.sender_name,
            &data.stream_name,
            output,
            &output_state.name,
            storage_level,
        )?;
        if let Some(f) = frontier {
            self.record_idle_until(output.end_time(), f, ctx)?;
        }
        debug!(node = self.step_name, end = %output.end_time(), mass = %output.mass(), "output branch opened");
        self.walk(ctx)
    }

    /// The step idles from the end of this output until the frontier.
    fn record_idle_until(
        &mut self,
        output_end: Timestamp,
        frontier: Timestamp,
        ctx: &mut SimulationContext<'_>,
    ) -> Result<(), PlanningError> {
        self.container.time_data.next_process_state_switch_time = Some(output_end);
        let switch = self.petri_net.idle_return_switch()?;
        let idle_start = switch.calculate_next_event_time_backward(
            self.container.production_data(),
            &self.container.time_data,
        )?;
        if idle_start < frontier {
            ctx.plan.add_process_state_data(
                self.step_name,
                ProcessStateData::new(switch.end_state_name(), idle_start, frontier),
            );
            self.container.time_data.add_idle_time(idle_start, frontier);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Backward walk
    // -----------------------------------------------------------------------

    fn walk(&mut self, ctx: &mut SimulationContext<'_>) -> Result<NodeOperation, PlanningError> {
        let petri_net = self.petri_net;
        let mut steps = 0;
        loop {
            steps += 1;
            if steps > MAX_BACKWARD_STEPS_PER_WALK {
                return Err(PlanningError::NonConvergence {
                    chain: ctx.chain_name.to_string(),
                    iterations: ctx.loop_counter,
                });
            }
            let state = petri_net.get_state(&self.container.current_process_state_name)?;
            if state.is_idle() {
                return self.finish_branch(ctx);
            }
            if let Some(input_stream) = state.requested_input_stream() {
                let missing = self
                    .mass_balance
                    .determine_missing_mass_for_output_stream(self.container.production_data())?;
                if missing > Fixed64::ZERO {
                    return self.request_input(input_stream, missing, ctx);
                }
            }
            self.leave_backward()?;
        }
    }

    /// Pick the switch that led into the current state, record the state's
    /// occurrence and move to the switch's start state.
    fn leave_backward(&mut self) -> Result<(), PlanningError> {
        let petri_net = self.petri_net;
        let current = self.container.current_process_state_name.clone();
        let switch = petri_net.select_switch(&current, self.mass_balance, self.container.production_data())?;
        let entered = switch.calculate_next_event_time_backward(
            self.container.production_data(),
            &self.container.time_data,
        )?;
        let state_end = self.current_state_end()?;
        if entered > state_end {
            return Err(PlanningError::illogical(
                self.step_name,
                format!("state {current} entered at {entered} after it ended at {state_end}"),
            ));
        }
        if entered < state_end {
            self.container
                .temporary_production_plan_mut()?
                .add_process_state_data(ProcessStateData::new(&current, entered, state_end));
        }
        self.container.enter_state(switch.start_state_name(), entered)
    }

    fn request_input(
        &mut self,
        input_stream: &str,
        missing: Mass,
        ctx: &mut SimulationContext<'_>,
    ) -> Result<NodeOperation, PlanningError> {
        let stream = ctx.streams.get_stream(input_stream)?;
        let state_end = self.current_state_end()?;
        let rate_hint = if stream.is_continuous() {
            let output_start = self.container.production_data().output_stream_state()?.start_time();
            rate_for_window(missing, state_end - output_start)
        } else {
            None
        };
        let requested = stream.create_state_ending_at(state_end, missing, rate_hint)?;
        let requester_branch = self.container.add_input_stream_state(input_stream, requested)?;
        debug!(
            node = self.step_name,
            stream = input_stream,
            mass = %missing,
            end = %state_end,
            "requesting input"
        );
        Ok(NodeOperation::UpstreamNewProductionOrder(NodeOperationData {
            sender_name: self.step_name.to_string(),
            next_node_name: stream.static_data().start_process_step_name.clone(),
            stream_name: input_stream.to_string(),
            stream_state: requested,
            requester_branch,
        }))
    }

    /// Close the branch: book storage, record the output transfer, flush the
    /// branch into the plan and confirm the output downstream.
    fn finish_branch(&mut self, ctx: &mut SimulationContext<'_>) -> Result<NodeOperation, PlanningError> {
        let data = self.container.production_data().clone();
        let output = *data.output_stream_state()?;
        let required = self.mass_balance.required_input_mass(output.mass())?;
        let leftover = data.storage_level()? - required;
        if leftover < Fixed64::ZERO {
            return Err(PlanningError::illogical(
                self.step_name,
                format!("storage holds {} but output needs {required}", data.storage_level()?),
            ));
        }

        let storage = self.mass_balance.storage_mut()?;
        let mut entries = Vec::with_capacity(data.validated_inputs().len() + 1);
        for input in data.validated_inputs() {
            let time = if input.is_continuous() {
                input.start_time()
            } else {
                input.end_time()
            };
            entries.push(storage.entry(time, input.mass(), "input"));
        }
        let output_time = if output.is_continuous() {
            output.end_time()
        } else {
            output.start_time()
        };
        entries.push(storage.entry(output_time, Fixed64::ZERO - required, "output"));
        storage.current_level = leftover;

        let output_stream = ctx.streams.get_stream(&self.mass_balance.main_output_stream)?;
        let plan_entry = output_stream.create_production_plan_entry(&output)?;
        let temporary = self.container.temporary_production_plan_mut()?;
        for entry in entries {
            temporary.add_storage_entry(entry);
        }
        temporary.add_stream_entry(plan_entry);

        let branch = self.container.branch_data.output_branch()?;
        let downstream = branch.downstream_node_name.clone();
        let stream_name = branch.output_stream_name.clone();
        let done = self.container.finish_output_branch(ctx.plan, self.step_name)?;
        debug!(
            node = self.step_name,
            branch = done.identifier.branch_number,
            start = %done.start_time,
            end = %done.end_time,
            "output branch complete"
        );
        Ok(NodeOperation::DownstreamValidationOrder(NodeOperationData {
            sender_name: self.step_name.to_string(),
            next_node_name: downstream,
            stream_name,
            stream_state: output,
            requester_branch: done.parent_input_identifier,
        }))
    }

    // -----------------------------------------------------------------------
    // Requester side: answers to our input requests
    // -----------------------------------------------------------------------

    fn handle_input_validation(
        &mut self,
        data: NodeOperationData,
        ctx: &mut SimulationContext<'_>,
    ) -> Result<NodeOperation, PlanningError> {
        self.check_pending(&data)?;
        self.container.validate_input_stream(data.stream_state)?;
        debug!(node = self.step_name, stream = %data.stream_name, mass = %data.stream_state.mass(), "input validated");
        self.leave_backward()?;
        self.walk(ctx)
    }

    fn handle_input_adaption(&mut self, data: NodeOperationData) -> Result<NodeOperation, PlanningError> {
        self.check_pending(&data)?;
        self.container.adapt_existing_input_stream_state(data.stream_state)?;
        Ok(NodeOperation::UpstreamAdaptionOrder(
            data.reply(self.step_name, data.stream_state),
        ))
    }

    // -----------------------------------------------------------------------
    // Guards
    // -----------------------------------------------------------------------

    fn current_state_end(&self) -> Result<Timestamp, PlanningError> {
        self.container
            .current_state_end
            .ok_or_else(|| PlanningError::illogical(self.step_name, "no state is being planned"))
    }

    fn check_idle_for(&self, data: &NodeOperationData) -> Result<(), PlanningError> {
        if data.stream_name != self.mass_balance.main_output_stream {
            return Err(PlanningError::illogical(
                self.step_name,
                format!("output requested on foreign stream {}", data.stream_name),
            ));
        }
        if self.container.current_state_end.is_some() {
            return Err(PlanningError::illogical(
                self.step_name,
                "output requested while a branch is in progress",
            ));
        }
        Ok(())
    }

    fn check_pending(&self, data: &NodeOperationData) -> Result<(), PlanningError> {
        match self.container.branch_data.pending_temporal_identifier() {
            Some(id) if id == data.requester_branch => Ok(()),
            _ => Err(PlanningError::illogical(
                self.step_name,
                format!("no pending input matches {:?}", data.requester_branch),
            )),
        }
    }
}
