use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::commodity::Commodity;
use crate::context::SimulationContext;
use crate::error::PlanningError;
use crate::operation::{NodeOperation, NodeOperationData};
use crate::stream::Stream;
use crate::time::Timestamp;

/// Unlimited supply of one commodity at the upstream end of a chain.
///
/// Transfers on one stream never overlap: each stream has its own frontier,
/// and requests ending past it are answered with an adaption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub commodity: Commodity,
    frontiers: BTreeMap<String, Timestamp>,
}

impl Source {
    pub fn new(name: &str, commodity: Commodity) -> Self {
        Self {
            name: name.to_string(),
            commodity,
            frontiers: BTreeMap::new(),
        }
    }

    pub fn frontier(&self, stream_name: &str) -> Option<Timestamp> {
        self.frontiers.get(stream_name).copied()
    }

    pub fn process_input_order(
        &mut self,
        operation: NodeOperation,
        ctx: &mut SimulationContext<'_>,
    ) -> Result<NodeOperation, PlanningError> {
        match operation {
            NodeOperation::UpstreamNewProductionOrder(data) => self.provide(data, ctx, true),
            NodeOperation::UpstreamAdaptionOrder(data) => self.provide(data, ctx, false),
            other => Err(PlanningError::IllogicalFunctionCall {
                node: self.name.clone(),
                operation: other.kind_name().to_string(),
            }),
        }
    }

    fn provide(
        &mut self,
        data: NodeOperationData,
        ctx: &mut SimulationContext<'_>,
        negotiate: bool,
    ) -> Result<NodeOperation, PlanningError> {
        let stream = ctx.streams.get_stream(&data.stream_name)?;
        self.check_stream(stream)?;
        let frontier = self.frontier(&data.stream_name);

        if let Some(adapted) = stream.propose_adaption(&data.stream_state, frontier) {
            if negotiate {
                debug!(node = %self.name, stream = %data.stream_name, end = %adapted.end_time(), "proposing adaption");
                return Ok(NodeOperation::DownstreamAdaptionOrder(
                    data.reply(&self.name, adapted),
                ));
            }
            return Err(PlanningError::illogical(
                &self.name,
                format!("confirmed delivery on {} does not fit", data.stream_name),
            ));
        }

        let state = data.stream_state;
        ctx.plan
            .add_stream_entry(stream.create_production_plan_entry(&state)?);
        let start = state.start_time();
        self.frontiers
            .entry(data.stream_name.clone())
            .and_modify(|f| *f = (*f).min(start))
            .or_insert(start);
        debug!(node = %self.name, stream = %data.stream_name, mass = %state.mass(), "delivery validated");
        Ok(NodeOperation::DownstreamValidationOrder(
            data.reply(&self.name, state),
        ))
    }

    fn check_stream(&self, stream: &Stream) -> Result<(), PlanningError> {
        let s = stream.static_data();
        if s.start_process_step_name != self.name || s.commodity != self.commodity {
            return Err(PlanningError::illogical(
                &self.name,
                format!("stream {} is not supplied by this source", s.name),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{OutputBranchIdentifier, TemporalBranchIdentifier};
    use crate::plan::ProductionPlan;
    use crate::stream::StreamHandler;
    use crate::test_utils::*;

    fn request(end: &str) -> NodeOperation {
        NodeOperation::UpstreamNewProductionOrder(NodeOperationData {
            sender_name: "mill".into(),
            next_node_name: "mine".into(),
            stream_name: "ore".into(),
            stream_state: make_batch_stream("ore", "mine", "mill", ore(), 20, None)
                .create_state_ending_at(ts(end), mass(50.0), None)
                .unwrap(),
            requester_branch: TemporalBranchIdentifier::new(0, OutputBranchIdentifier::new(0)),
        })
    }

    fn handler() -> StreamHandler {
        let mut h = StreamHandler::new();
        h.add_stream(make_batch_stream("ore", "mine", "mill", ore(), 20, None))
            .unwrap();
        h
    }

    #[test]
    fn validates_and_records_delivery() {
        let streams = handler();
        let mut plan = ProductionPlan::new();
        let mut ctx = SimulationContext::new("chain", &streams, &mut plan);
        let mut source = Source::new("mine", ore());
        let reply = source
            .process_input_order(request("2024-01-01 12:00:00"), &mut ctx)
            .unwrap();
        assert_eq!(reply.kind_name(), "DownstreamValidationOrder");
        assert_eq!(reply.next_node_name(), Some("mill"));
        assert_eq!(source.frontier("ore"), Some(ts("2024-01-01 11:40:00")));
        assert_eq!(plan.stream_entries("ore").len(), 1);
    }

    #[test]
    fn overlapping_request_is_adapted() {
        let streams = handler();
        let mut plan = ProductionPlan::new();
        let mut ctx = SimulationContext::new("chain", &streams, &mut plan);
        let mut source = Source::new("mine", ore());
        source
            .process_input_order(request("2024-01-01 12:00:00"), &mut ctx)
            .unwrap();
        let reply = source
            .process_input_order(request("2024-01-01 11:50:00"), &mut ctx)
            .unwrap();
        match reply {
            NodeOperation::DownstreamAdaptionOrder(d) => {
                assert_eq!(d.stream_state.end_time(), ts("2024-01-01 11:40:00"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn validation_order_is_illogical_for_a_source() {
        let streams = handler();
        let mut plan = ProductionPlan::new();
        let mut ctx = SimulationContext::new("chain", &streams, &mut plan);
        let mut source = Source::new("mine", ore());
        let op = match request("2024-01-01 12:00:00") {
            NodeOperation::UpstreamNewProductionOrder(d) => NodeOperation::DownstreamValidationOrder(d),
            other => other,
        };
        assert!(matches!(
            source.process_input_order(op, &mut ctx),
            Err(PlanningError::IllogicalFunctionCall { .. })
        ));
    }
}
