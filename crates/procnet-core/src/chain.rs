//! A linear process chain and its planning loop.
//!
//! Nodes are stored in a slot map and addressed by name through an index.
//! The demand node at the downstream end drives the loop: it issues a
//! request, every reply is routed to the node it names, and the run ends
//! when the demand node answers with `TerminateProduction`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::{debug, info};

use crate::context::SimulationContext;
use crate::energy::EnergyDataRegistry;
use crate::error::{ConfigurationError, PlanningError};
use crate::id::NodeId;
use crate::node::{ProcessNode, Sink};
use crate::order::OrderCollection;
use crate::plan::{ProcessStateData, ProductionPlan};
use crate::stream::StreamHandler;
use crate::time::Timestamp;

/// Outcome of one successful chain run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainPlanningReport {
    pub chain: String,
    pub iterations: u64,
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
}

#[derive(Debug, Clone)]
pub struct ProcessChain {
    name: String,
    nodes: SlotMap<NodeId, ProcessNode>,
    index: BTreeMap<String, NodeId>,
    /// Upstream to downstream.
    order: Vec<NodeId>,
    stream_handler: StreamHandler,
    last_iterations: u64,
}

impl ProcessChain {
    pub fn new(name: &str, stream_handler: StreamHandler) -> Self {
        Self {
            name: name.to_string(),
            nodes: SlotMap::with_key(),
            index: BTreeMap::new(),
            order: Vec::new(),
            stream_handler,
            last_iterations: 0,
        }
    }

    /// Append a node at the downstream end.
    pub fn add_node(&mut self, node: impl Into<ProcessNode>) -> Result<NodeId, ConfigurationError> {
        let node = node.into();
        if self.index.contains_key(node.name()) {
            return Err(ConfigurationError::DuplicateNode(node.name().to_string()));
        }
        let name = node.name().to_string();
        let id = self.nodes.insert(node);
        self.index.insert(name, id);
        self.order.push(id);
        Ok(id)
    }

    /// Build a chain from nodes listed upstream to downstream and check that
    /// consecutive nodes are joined by a stream.
    pub fn linear(
        name: &str,
        stream_handler: StreamHandler,
        nodes: impl IntoIterator<Item = ProcessNode>,
    ) -> Result<Self, ConfigurationError> {
        let mut chain = Self::new(name, stream_handler);
        for node in nodes {
            chain.add_node(node)?;
        }
        chain.validate()?;
        Ok(chain)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidChain {
            chain: self.name.clone(),
            reason,
        };
        let nodes: Vec<&ProcessNode> = self.nodes_in_order().collect();
        if nodes.len() < 2 {
            return Err(invalid("a chain needs a supplying and a demanding node".into()));
        }
        match nodes[0] {
            ProcessNode::Source(_) => {}
            ProcessNode::Storage(s) if !s.is_receiver() => {}
            other => return Err(invalid(format!("'{}' cannot start a chain", other.name()))),
        }
        match nodes[nodes.len() - 1] {
            ProcessNode::Sink(_) => {}
            ProcessNode::Storage(s) if s.is_receiver() => {}
            other => return Err(invalid(format!("'{}' cannot end a chain", other.name()))),
        }
        for middle in &nodes[1..nodes.len() - 1] {
            if middle.as_step().is_none() {
                return Err(invalid(format!(
                    "'{}' is a {} inside the chain",
                    middle.name(),
                    middle.kind_name()
                )));
            }
        }
        for pair in nodes.windows(2) {
            let (upstream, downstream) = (pair[0], pair[1]);
            let Some(stream_name) = downstream.input_stream() else {
                continue;
            };
            let stream = self.stream_handler.get_stream(stream_name)?;
            let s = stream.static_data();
            if s.start_process_step_name != upstream.name() || s.end_process_step_name != downstream.name() {
                return Err(invalid(format!(
                    "stream '{}' does not join '{}' to '{}'",
                    stream_name,
                    upstream.name(),
                    downstream.name()
                )));
            }
            if let Some(step) = upstream.as_step() {
                if step.output_stream() != stream_name {
                    return Err(invalid(format!(
                        "'{}' provides '{}' but '{}' consumes '{}'",
                        step.name,
                        step.output_stream(),
                        downstream.name(),
                        stream_name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stream_handler(&self) -> &StreamHandler {
        &self.stream_handler
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn node(&self, name: &str) -> Option<&ProcessNode> {
        self.index.get(name).and_then(|id| self.nodes.get(*id))
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut ProcessNode> {
        let id = *self.index.get(name)?;
        self.nodes.get_mut(id)
    }

    pub fn nodes_in_order(&self) -> impl Iterator<Item = &ProcessNode> {
        self.order.iter().filter_map(|id| self.nodes.get(*id))
    }

    pub fn demand_node(&self) -> Option<&ProcessNode> {
        self.order.last().and_then(|id| self.nodes.get(*id))
    }

    /// Hand orders to the chain's sink.
    pub fn set_orders(&mut self, orders: OrderCollection) -> Result<(), ConfigurationError> {
        let chain = self.name.clone();
        let sink = self.sink_mut().ok_or_else(|| ConfigurationError::InvalidChain {
            chain,
            reason: "only a chain ending in a sink takes orders".into(),
        })?;
        sink.set_orders(orders);
        Ok(())
    }

    fn sink_mut(&mut self) -> Option<&mut Sink> {
        let id = *self.order.last()?;
        self.nodes.get_mut(id)?.as_sink_mut()
    }

    /// Iterations of the most recent run, also when it failed.
    pub fn last_iterations(&self) -> u64 {
        self.last_iterations
    }

    /// Plan every order of the chain's demand node into `plan`.
    pub fn create_process_chain_production_plan(
        &mut self,
        plan: &mut ProductionPlan,
        registry: &mut dyn EnergyDataRegistry,
        max_number_of_iterations: Option<u64>,
    ) -> Result<ChainPlanningReport, PlanningError> {
        let Some(&demand) = self.order.last() else {
            return Err(ConfigurationError::InvalidChain {
                chain: self.name.clone(),
                reason: "chain has no nodes".into(),
            }
            .into());
        };
        info!(chain = %self.name, nodes = self.order.len(), registry = registry.name(), "planning chain");

        for id in &self.order {
            if let Some(node) = self.nodes.get(*id) {
                node.register(plan, registry);
            }
        }
        for stream in self.stream_handler.streams() {
            plan.initialize_stream_production_plan_entry(stream.name());
            registry.add_stream_energy_data(stream);
        }
        for id in &self.order {
            if let Some(node) = self.nodes.get_mut(*id) {
                node.initialize(plan);
            }
        }

        let has_orders = self.nodes.get(demand).is_some_and(|n| n.has_unfulfilled_orders());
        if !has_orders {
            info!(chain = %self.name, "nothing to plan");
            self.last_iterations = 0;
            return Ok(ChainPlanningReport {
                chain: self.name.clone(),
                iterations: 0,
                start: None,
                end: None,
            });
        }

        let mut ctx = SimulationContext::new(&self.name, &self.stream_handler, plan);
        let outcome = drive(
            &mut ctx,
            &mut self.nodes,
            &self.index,
            demand,
            max_number_of_iterations,
        );
        let iterations = ctx.loop_counter;
        self.last_iterations = iterations;
        outcome?;

        let (start, end) = match self.pad_timelines(plan) {
            Some((s, e)) => (Some(s), Some(e)),
            None => (None, None),
        };
        plan.sort_chronologically();
        info!(chain = %self.name, iterations, "chain planned");
        Ok(ChainPlanningReport {
            chain: self.name.clone(),
            iterations,
            start,
            end,
        })
    }

    /// Fill each step's timeline with idle occurrences up to the chain's
    /// common start and end. Returns that span.
    fn pad_timelines(&self, plan: &mut ProductionPlan) -> Option<(Timestamp, Timestamp)> {
        let steps: Vec<&str> = self
            .nodes_in_order()
            .filter_map(|n| n.as_step().map(|s| s.name.as_str()))
            .collect();
        let streams = self.stream_handler.stream_names();
        let (start, end) = plan.time_span(steps.iter().copied(), streams.iter().map(String::as_str))?;

        for node in self.nodes_in_order() {
            let Some(step) = node.as_step() else {
                continue;
            };
            let idle = step.petri_net().idle_state_name();
            let own = plan.time_span([step.name.as_str()], std::iter::empty::<&str>());
            match own {
                None => plan.add_process_state_data(&step.name, ProcessStateData::new(idle, start, end)),
                Some((first, last)) => {
                    if start < first {
                        plan.add_process_state_data(&step.name, ProcessStateData::new(idle, start, first));
                    }
                    if last < end {
                        plan.add_process_state_data(&step.name, ProcessStateData::new(idle, last, end));
                    }
                }
            }
        }
        Some((start, end))
    }
}

/// Route operations between nodes until the demand node terminates.
fn drive(
    ctx: &mut SimulationContext<'_>,
    nodes: &mut SlotMap<NodeId, ProcessNode>,
    index: &BTreeMap<String, NodeId>,
    demand: NodeId,
    max_number_of_iterations: Option<u64>,
) -> Result<(), PlanningError> {
    let demand_node = nodes
        .get_mut(demand)
        .ok_or_else(|| PlanningError::illogical(ctx.chain_name, "demand node vanished"))?;
    ctx.current_node = demand_node.name().to_string();
    let mut operation = demand_node.plan_production(ctx)?;

    while !operation.is_terminal() {
        ctx.loop_counter += 1;
        if let Some(max) = max_number_of_iterations {
            if ctx.loop_counter > max {
                return Err(PlanningError::NonConvergence {
                    chain: ctx.chain_name.to_string(),
                    iterations: ctx.loop_counter,
                });
            }
        }
        let target = operation.next_node_name().unwrap_or_default().to_string();
        let node = index
            .get(&target)
            .and_then(|id| nodes.get_mut(*id))
            .ok_or_else(|| PlanningError::UnknownNode(target.clone()))?;
        debug!(
            chain = ctx.chain_name,
            iteration = ctx.loop_counter,
            node = %target,
            operation = operation.kind_name(),
            "processing node operation"
        );
        ctx.current_node = target;
        operation = node.process_input_order(operation, ctx)?;
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
