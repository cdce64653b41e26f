//! Procnet Core -- backward-chaining production planning for process chains.
//!
//! A process chain is a line of nodes joined by material streams: a source,
//! any number of process steps, and a sink holding deadline-bound orders.
//! Planning starts at the sink and walks against the material flow. Each
//! step answers an output request by walking its petri net backward from the
//! output state, requesting input upstream as its mass balance demands, and
//! confirming the output downstream once the branch is complete.
//!
//! # Planning loop
//!
//! Nodes exchange [`operation::NodeOperation`]s. The chain routes every
//! reply to the node it names until the sink answers with
//! `TerminateProduction`:
//!
//! 1. **Request** -- `UpstreamNewProductionOrder` travels upstream.
//! 2. **Adaption** -- a provider that cannot meet the request proposes an
//!    earlier or smaller state (`DownstreamAdaptionOrder`); the requester
//!    accepts it (`UpstreamAdaptionOrder`).
//! 3. **Validation** -- `DownstreamValidationOrder` confirms a planned
//!    delivery and resumes the requester's walk.
//!
//! ```rust,ignore
//! let mut chain = ProcessChain::linear("line", streams, nodes)?;
//! chain.set_orders(orders)?;
//! let mut plan = ProductionPlan::new();
//! let report = chain.create_process_chain_production_plan(&mut plan, &mut NoEnergyData, Some(100_000))?;
//! ```
//!
//! # Key Types
//!
//! - [`chain::ProcessChain`] -- Nodes in a slot map and the planning loop.
//! - [`enterprise::Enterprise`] -- Several chains over one shared plan.
//! - [`node::ProcessNode`] -- Source, Sink, ProcessStep and ProcessChainStorage.
//! - [`petri_net::ProcessStateNetwork`] -- States, switches and selectors of a step.
//! - [`plan::ProductionPlan`] -- Every state, transfer, storage change and delivery.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for exact mass arithmetic.
//! - [`serialize`] -- Versioned plan snapshots via bitcode.

pub mod chain;
pub mod commodity;
pub mod communicator;
pub mod config;
pub mod context;
pub mod energy;
pub mod enterprise;
pub mod error;
pub mod fixed;
pub mod id;
pub mod logging;
pub mod mass_balance;
pub mod node;
pub mod operation;
pub mod order;
pub mod petri_net;
pub mod plan;
pub mod serialize;
pub mod simulation_data;
pub mod storage;
pub mod stream;
pub mod time;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
