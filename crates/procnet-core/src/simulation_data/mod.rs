//! Bookkeeping of a process step while it negotiates with its neighbours.

pub mod branch;
pub mod network_container;
pub mod production_state;

pub use branch::{BranchDataContainer, OutputBranch, OutputBranchSummary};
pub use network_container::ProcessStateNetworkContainer;
pub use production_state::{ProductionProcessStateContainer, ProductionStateData};
