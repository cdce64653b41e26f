//! Per-step petri nets: states, switches, selectors and standard templates.

pub mod network;
pub mod selector;
pub mod state;
pub mod switch;

pub use network::{COMBINED, IDLE, INPUT, OUTPUT, PROCESSING, PetriNetTemplate, ProcessStateNetwork};
pub use selector::{ProcessStateSwitchSelector, ProcessStateSwitchSelectorHandler};
pub use state::{ProcessState, ProcessStateKind};
pub use switch::{ProcessStateSwitch, StateConnector, SwitchKind};
