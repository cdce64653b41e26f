//! Model and configuration loading for the planning engine.

pub mod loader;
pub mod model;
pub mod schema;

pub use loader::DataLoadError;
pub use model::{build_enterprise, load_enterprise, load_model_data, load_simulation_config};
