//! Run-time configuration of a planning run.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::fixed::{Mass, checked_f64_to_fixed64};

/// Knobs that control one planning run.
///
/// Missing fields take their defaults when deserialized, so a data file only
/// needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Upper bound on node operations per chain. `None` disables the bound.
    pub max_number_of_iterations: Option<u64>,
    /// Storage levels down to `-storage_tolerance` are not reported.
    pub storage_tolerance: f64,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_number_of_iterations: Some(100_000),
            storage_tolerance: 1e-6,
            log_filter: "info".to_string(),
        }
    }
}

impl SimulationConfig {
    /// The tolerance as a non-negative mass. Fails for NaN, infinities and
    /// values outside the mass range.
    pub fn storage_tolerance_mass(&self) -> Result<Mass, ConfigurationError> {
        checked_f64_to_fixed64(self.storage_tolerance.abs()).ok_or_else(|| ConfigurationError::InvalidMass {
            field: "storage_tolerance".into(),
            value: self.storage_tolerance.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64;

    #[test]
    fn defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.max_number_of_iterations, Some(100_000));
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{ "max_number_of_iterations": 50 }"#).unwrap();
        assert_eq!(config.max_number_of_iterations, Some(50));
        assert_eq!(config.storage_tolerance, 1e-6);
    }

    #[test]
    fn tolerance_as_mass_is_non_negative() {
        let config = SimulationConfig {
            storage_tolerance: -0.5,
            ..SimulationConfig::default()
        };
        assert_eq!(config.storage_tolerance_mass(), Ok(f64_to_fixed64(0.5)));
    }

    #[test]
    fn unrepresentable_tolerance_is_rejected() {
        let config = SimulationConfig {
            storage_tolerance: f64::NAN,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.storage_tolerance_mass(),
            Err(ConfigurationError::InvalidMass { field, .. }) if field == "storage_tolerance"
        ));
    }
}
