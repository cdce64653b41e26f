//! The addressable participants of a process chain.

pub mod chain_storage;
pub mod sink;
pub mod source;
pub mod step;

pub use chain_storage::{ChainStorageRole, ProcessChainStorage};
pub use sink::Sink;
pub use source::Source;
pub use step::ProcessStep;

use serde::{Deserialize, Serialize};

use crate::commodity::Commodity;
use crate::context::SimulationContext;
use crate::energy::EnergyDataRegistry;
use crate::error::PlanningError;
use crate::operation::NodeOperation;
use crate::plan::ProductionPlan;

/// Closed set of node kinds. Dispatch is by match, not by trait object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessNode {
    Source(Source),
    Sink(Sink),
    Step(ProcessStep),
    Storage(ProcessChainStorage),
}

impl ProcessNode {
    pub fn name(&self) -> &str {
        match self {
            ProcessNode::Source(n) => &n.name,
            ProcessNode::Sink(n) => &n.name,
            ProcessNode::Step(n) => &n.name,
            ProcessNode::Storage(n) => &n.name,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ProcessNode::Source(_) => "Source",
            ProcessNode::Sink(_) => "Sink",
            ProcessNode::Step(_) => "ProcessStep",
            ProcessNode::Storage(_) => "ProcessChainStorage",
        }
    }

    /// Commodity the node hands downstream, or receives for sinks.
    pub fn commodity(&self) -> Option<&Commodity> {
        match self {
            ProcessNode::Source(n) => Some(&n.commodity),
            ProcessNode::Sink(n) => Some(&n.commodity),
            ProcessNode::Step(_) => None,
            ProcessNode::Storage(n) => Some(n.commodity()),
        }
    }

    /// Stream the node consumes from its upstream neighbour.
    pub fn input_stream(&self) -> Option<&str> {
        match self {
            ProcessNode::Sink(n) => Some(&n.input_stream),
            ProcessNode::Step(n) => Some(n.input_stream()),
            ProcessNode::Storage(n) => n.input_stream(),
            ProcessNode::Source(_) => None,
        }
    }

    /// Create the node's plan entries and announce it to the energy registry.
    pub fn register(&self, plan: &mut ProductionPlan, registry: &mut dyn EnergyDataRegistry) {
        match self {
            ProcessNode::Step(step) => {
                plan.initialize_process_step_production_plan_entry(&step.name);
                if let Ok(storage) = step.storage() {
                    plan.initialize_storage_production_plan_entry(&step.name, &storage.commodity);
                }
                step.register_energy_data(registry);
            }
            ProcessNode::Storage(storage) => {
                plan.initialize_storage_production_plan_entry(&storage.name, storage.commodity());
            }
            ProcessNode::Source(_) | ProcessNode::Sink(_) => {}
        }
    }

    /// Prepare for a chain run. Receivers derive their orders here.
    pub fn initialize(&mut self, plan: &ProductionPlan) {
        if let ProcessNode::Storage(storage) = self {
            storage.initialize(plan);
        }
    }

    pub fn has_unfulfilled_orders(&self) -> bool {
        match self {
            ProcessNode::Sink(sink) => sink.has_unfulfilled_orders(),
            ProcessNode::Storage(storage) => storage.has_unfulfilled_orders(),
            _ => false,
        }
    }

    /// Start (or restart) the chain run from a demand node.
    pub fn plan_production(&mut self, ctx: &mut SimulationContext<'_>) -> Result<NodeOperation, PlanningError> {
        match self {
            ProcessNode::Sink(sink) => sink.plan_production(ctx),
            ProcessNode::Storage(storage) => storage.plan_production(ctx),
            other => Err(PlanningError::IllogicalFunctionCall {
                node: other.name().to_string(),
                operation: "plan_production".into(),
            }),
        }
    }

    pub fn process_input_order(
        &mut self,
        operation: NodeOperation,
        ctx: &mut SimulationContext<'_>,
    ) -> Result<NodeOperation, PlanningError> {
        match self {
            ProcessNode::Source(n) => n.process_input_order(operation, ctx),
            ProcessNode::Sink(n) => n.process_input_order(operation, ctx),
            ProcessNode::Step(n) => n.process_input_order(operation, ctx),
            ProcessNode::Storage(n) => n.process_input_order(operation, ctx),
        }
    }

    pub fn as_step(&self) -> Option<&ProcessStep> {
        match self {
            ProcessNode::Step(step) => Some(step),
            _ => None,
        }
    }

    pub fn as_sink_mut(&mut self) -> Option<&mut Sink> {
        match self {
            ProcessNode::Sink(sink) => Some(sink),
            _ => None,
        }
    }
}

impl From<Source> for ProcessNode {
    fn from(node: Source) -> Self {
        ProcessNode::Source(node)
    }
}

impl From<Sink> for ProcessNode {
    fn from(node: Sink) -> Self {
        ProcessNode::Sink(node)
    }
}

impl From<ProcessStep> for ProcessNode {
    fn from(node: ProcessStep) -> Self {
        ProcessNode::Step(node)
    }
}

impl From<ProcessChainStorage> for ProcessNode {
    fn from(node: ProcessChainStorage) -> Self {
        ProcessNode::Storage(node)
    }
}
