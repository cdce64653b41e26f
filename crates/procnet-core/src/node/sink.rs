use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::commodity::Commodity;
use crate::context::SimulationContext;
use crate::error::PlanningError;
use crate::id::{OutputBranchIdentifier, TemporalBranchIdentifier};
use crate::operation::{NodeOperation, NodeOperationData};
use crate::order::OrderCollection;
use crate::plan::OrderDelivery;
use crate::stream::StreamState;
use crate::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PendingDelivery {
    order_number: u64,
    requester_branch: TemporalBranchIdentifier,
    requested: StreamState,
}

/// Downstream end of a chain. Turns its orders into delivery requests,
/// latest deadline first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sink {
    pub name: String,
    pub commodity: Commodity,
    pub input_stream: String,
    orders: OrderCollection,
    pending: Option<PendingDelivery>,
    frontier: Option<Timestamp>,
    requests_issued: u64,
}

impl Sink {
    pub fn new(name: &str, commodity: Commodity, input_stream: &str) -> Self {
        Self {
            name: name.to_string(),
            commodity,
            input_stream: input_stream.to_string(),
            orders: OrderCollection::default(),
            pending: None,
            frontier: None,
            requests_issued: 0,
        }
    }

    pub fn set_orders(&mut self, orders: OrderCollection) {
        self.orders = orders;
    }

    pub fn orders(&self) -> &OrderCollection {
        &self.orders
    }

    pub fn has_unfulfilled_orders(&self) -> bool {
        self.orders.has_unfulfilled_orders()
    }

    /// Earliest start of any delivery received so far.
    pub fn frontier(&self) -> Option<Timestamp> {
        self.frontier
    }

    /// Request the remaining mass of the next unfulfilled order, or end the
    /// chain run when none is left.
    pub fn plan_production(&mut self, ctx: &mut SimulationContext<'_>) -> Result<NodeOperation, PlanningError> {
        if self.pending.is_some() {
            return Err(PlanningError::illogical(
                &self.name,
                "new request while a delivery is pending",
            ));
        }
        let Some(order) = self.orders.next_unfulfilled() else {
            info!(node = %self.name, "all orders planned");
            return Ok(NodeOperation::TerminateProduction {
                sender_name: self.name.clone(),
            });
        };

        let stream = ctx.streams.get_stream(&self.input_stream)?;
        let end = match self.frontier {
            Some(f) => order.production_deadline.min(f),
            None => order.production_deadline,
        };
        let requested = stream.create_state_ending_at(end, order.remaining_mass(), None)?;
        let requester_branch = TemporalBranchIdentifier::new(
            self.requests_issued,
            OutputBranchIdentifier::new(order.order_number),
        );
        self.requests_issued += 1;
        debug!(
            node = %self.name,
            order = order.order_number,
            mass = %requested.mass(),
            end = %end,
            "requesting order delivery"
        );
        self.pending = Some(PendingDelivery {
            order_number: order.order_number,
            requester_branch,
            requested,
        });
        Ok(NodeOperation::UpstreamNewProductionOrder(NodeOperationData {
            sender_name: self.name.clone(),
            next_node_name: stream.static_data().start_process_step_name.clone(),
            stream_name: self.input_stream.clone(),
            stream_state: requested,
            requester_branch,
        }))
    }

    pub fn process_input_order(
        &mut self,
        operation: NodeOperation,
        ctx: &mut SimulationContext<'_>,
    ) -> Result<NodeOperation, PlanningError> {
        match operation {
            NodeOperation::DownstreamValidationOrder(data) => {
                self.validate_delivery(&data, ctx)?;
                self.plan_production(ctx)
            }
            NodeOperation::DownstreamAdaptionOrder(data) => {
                let pending = self.pending_for(&data)?;
                pending.requested = data.stream_state;
                Ok(NodeOperation::UpstreamAdaptionOrder(
                    data.reply(&self.name, data.stream_state),
                ))
            }
            other => Err(PlanningError::IllogicalFunctionCall {
                node: self.name.clone(),
                operation: other.kind_name().to_string(),
            }),
        }
    }

    /// Book a confirmed delivery against its order. Returns the delivery.
    pub(crate) fn validate_delivery(
        &mut self,
        data: &NodeOperationData,
        ctx: &mut SimulationContext<'_>,
    ) -> Result<OrderDelivery, PlanningError> {
        let order_number = self.pending_for(data)?.order_number;
        let name = self.name.clone();
        let order = self.orders.get_mut(order_number).ok_or_else(|| {
            PlanningError::illogical(&name, format!("order {order_number} vanished"))
        })?;
        let delivered = data.stream_state;
        order.produced_mass += delivered.mass();
        let delivery = OrderDelivery {
            order_number,
            commodity: order.commodity.clone(),
            mass: delivered.mass(),
            end_time: delivered.end_time(),
            deadline: order.production_deadline,
        };
        ctx.plan.add_order_delivery(&self.name, delivery.clone());
        self.frontier = Some(match self.frontier {
            Some(f) => f.min(delivered.start_time()),
            None => delivered.start_time(),
        });
        self.pending = None;
        debug!(node = %self.name, order = order_number, mass = %delivered.mass(), "delivery received");
        Ok(delivery)
    }

    fn pending_for(&mut self, data: &NodeOperationData) -> Result<&mut PendingDelivery, PlanningError> {
        match &mut self.pending {
            Some(p) if p.requester_branch == data.requester_branch => Ok(p),
            _ => Err(PlanningError::illogical(
                &self.name,
                format!("no pending delivery matches {:?}", data.requester_branch),
            )),
        }
    }
}
