use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::commodity::Commodity;
use crate::context::SimulationContext;
use crate::error::PlanningError;
use crate::fixed::{Fixed64, Mass};
use crate::node::{Sink, Source};
use crate::operation::{NodeOperation, NodeOperationData};
use crate::order::{OrderCollection, ProductionOrder};
use crate::plan::ProductionPlan;
use crate::storage::Storage;

/// How a chain storage takes part in one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainStorageRole {
    /// First node: supplies the chain from stock.
    Supplier(Source),
    /// Last node: refills the stock withdrawn by chains planned earlier.
    Receiver(Sink),
}

/// A storage shared between two chains under one name: the receiver side
/// ends the upstream chain, the supplier side starts the downstream one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessChainStorage {
    pub name: String,
    storage: Storage,
    role: ChainStorageRole,
}

impl ProcessChainStorage {
    pub fn supplier(name: &str, commodity: Commodity, initial_level: Mass, tolerance: Mass) -> Self {
        Self {
            name: name.to_string(),
            storage: Storage::new(name, commodity.clone(), initial_level, tolerance),
            role: ChainStorageRole::Supplier(Source::new(name, commodity)),
        }
    }

    pub fn receiver(
        name: &str,
        commodity: Commodity,
        input_stream: &str,
        initial_level: Mass,
        tolerance: Mass,
    ) -> Self {
        Self {
            name: name.to_string(),
            storage: Storage::new(name, commodity.clone(), initial_level, tolerance),
            role: ChainStorageRole::Receiver(Sink::new(name, commodity, input_stream)),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn role(&self) -> &ChainStorageRole {
        &self.role
    }

    pub fn commodity(&self) -> &Commodity {
        &self.storage.commodity
    }

    /// The refill stream, for receivers.
    pub fn input_stream(&self) -> Option<&str> {
        match &self.role {
            ChainStorageRole::Receiver(sink) => Some(&sink.input_stream),
            ChainStorageRole::Supplier(_) => None,
        }
    }

    pub fn is_receiver(&self) -> bool {
        matches!(self.role, ChainStorageRole::Receiver(_))
    }

    /// Receiver only: turn withdrawals booked in `plan` that exceed the
    /// initial level into replenishment orders due at the withdrawal.
    pub fn initialize(&mut self, plan: &ProductionPlan) {
        let ChainStorageRole::Receiver(sink) = &mut self.role else {
            return;
        };
        let mut withdrawals: Vec<_> = plan
            .storage_entries(&self.name, &self.storage.commodity)
            .iter()
            .filter(|e| e.mass_change < Fixed64::ZERO)
            .collect();
        withdrawals.sort_by_key(|e| e.time);

        let mut withdrawn = Fixed64::ZERO;
        let mut ordered = Fixed64::ZERO;
        let mut orders = OrderCollection::default();
        for entry in withdrawals {
            withdrawn -= entry.mass_change;
            let uncovered = withdrawn - self.storage.initial_level - ordered;
            if uncovered > Fixed64::ZERO {
                ordered += uncovered;
                let number = orders.len() as u64;
                orders.push(ProductionOrder::new(
                    number,
                    self.storage.commodity.clone(),
                    uncovered,
                    entry.time,
                ));
            }
        }
        info!(node = %self.name, orders = orders.len(), mass = %ordered, "replenishment orders derived");
        sink.set_orders(orders);
    }

    pub fn has_unfulfilled_orders(&self) -> bool {
        match &self.role {
            ChainStorageRole::Receiver(sink) => sink.has_unfulfilled_orders(),
            ChainStorageRole::Supplier(_) => false,
        }
    }

    pub fn plan_production(&mut self, ctx: &mut SimulationContext<'_>) -> Result<NodeOperation, PlanningError> {
        match &mut self.role {
            ChainStorageRole::Receiver(sink) => sink.plan_production(ctx),
            ChainStorageRole::Supplier(_) => Err(PlanningError::IllogicalFunctionCall {
                node: self.name.clone(),
                operation: "plan_production".into(),
            }),
        }
    }

    pub fn process_input_order(
        &mut self,
        operation: NodeOperation,
        ctx: &mut SimulationContext<'_>,
    ) -> Result<NodeOperation, PlanningError> {
        match &mut self.role {
            ChainStorageRole::Supplier(source) => {
                let reply = source.process_input_order(operation, ctx)?;
                if let NodeOperation::DownstreamValidationOrder(data) = &reply {
                    book_withdrawal(&mut self.storage, data, ctx);
                }
                Ok(reply)
            }
            ChainStorageRole::Receiver(sink) => {
                if let NodeOperation::DownstreamValidationOrder(data) = &operation {
                    let delivered = data.stream_state;
                    let time = if delivered.is_continuous() {
                        delivered.start_time()
                    } else {
                        delivered.end_time()
                    };
                    let entry = self.storage.entry(time, delivered.mass(), &data.stream_name);
                    ctx.plan
                        .add_list_of_storage_entries(&self.name, &self.storage.commodity, [entry]);
                    self.storage.deposit(delivered.mass());
                }
                sink.process_input_order(operation, ctx)
            }
        }
    }
}

fn book_withdrawal(storage: &mut Storage, data: &NodeOperationData, ctx: &mut SimulationContext<'_>) {
    let delivered = data.stream_state;
    let time = if delivered.is_continuous() {
        delivered.end_time()
    } else {
        delivered.start_time()
    };
    let entry = storage.entry(time, Fixed64::ZERO - delivered.mass(), &data.stream_name);
    let node = storage.node_name.clone();
    let commodity = storage.commodity.clone();
    ctx.plan.add_list_of_storage_entries(&node, &commodity, [entry]);
    storage.withdraw(delivered.mass());
    debug!(node = %node, mass = %delivered.mass(), level = %storage.current_level, "stock withdrawn");
}
