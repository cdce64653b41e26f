//! Multi-chain planning over one shared production plan.

use tracing::{error, info, warn};

use crate::chain::{ChainPlanningReport, ProcessChain};
use crate::config::SimulationConfig;
use crate::energy::EnergyDataRegistry;
use crate::error::{ConfigurationError, PlanningError};
use crate::fixed::Mass;
use crate::node::ProcessNode;
use crate::plan::ProductionPlan;
use crate::serialize::{self, DeserializeError, PlanSnapshot, SerializeError};
use crate::storage::Storage;
use crate::stream::StreamHandler;
use crate::validation::{self, StepBalance, ValidationReport};

/// A chain whose run ended in a planning failure. Its partial writes were
/// rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedChainReport {
    pub chain: String,
    pub error: PlanningError,
    pub iterations: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnterpriseReport {
    pub planned: Vec<ChainPlanningReport>,
    pub failed: Vec<FailedChainReport>,
}

impl EnterpriseReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns the chains of one planning run. Chains are planned one at a time
/// in insertion order, so a chain consuming from a chain storage must be
/// added before the chain refilling it.
#[derive(Debug)]
pub struct Enterprise {
    chains: Vec<ProcessChain>,
    plan: ProductionPlan,
    stream_handler: StreamHandler,
    config: SimulationConfig,
    storage_tolerance: Mass,
}

impl Enterprise {
    /// Fails when the configured storage tolerance is not a valid mass.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigurationError> {
        let storage_tolerance = config.storage_tolerance_mass()?;
        Ok(Self {
            chains: Vec::new(),
            plan: ProductionPlan::new(),
            stream_handler: StreamHandler::new(),
            config,
            storage_tolerance,
        })
    }

    pub fn add_chain(&mut self, chain: ProcessChain) -> Result<(), ConfigurationError> {
        if self.chains.iter().any(|c| c.name() == chain.name()) {
            return Err(ConfigurationError::InvalidChain {
                chain: chain.name().to_string(),
                reason: "a chain with this name already exists".into(),
            });
        }
        self.stream_handler = StreamHandler::combine_stream_handler_from_chains(
            [&self.stream_handler, chain.stream_handler()],
        )?;
        self.chains.push(chain);
        Ok(())
    }

    pub fn chains(&self) -> &[ProcessChain] {
        &self.chains
    }

    pub fn chain_mut(&mut self, name: &str) -> Option<&mut ProcessChain> {
        self.chains.iter_mut().find(|c| c.name() == name)
    }

    pub fn plan(&self) -> &ProductionPlan {
        &self.plan
    }

    pub fn into_plan(self) -> ProductionPlan {
        self.plan
    }

    pub fn stream_handler(&self) -> &StreamHandler {
        &self.stream_handler
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Plan every chain. Planning failures are reported per chain and leave
    /// the plan as it was before that chain; any other error aborts the run.
    pub fn plan_all(&mut self, registry: &mut dyn EnergyDataRegistry) -> Result<EnterpriseReport, PlanningError> {
        let mut report = EnterpriseReport::default();
        info!(chains = self.chains.len(), "planning enterprise");
        for chain in &mut self.chains {
            let checkpoint = self.plan.clone();
            match chain.create_process_chain_production_plan(
                &mut self.plan,
                registry,
                self.config.max_number_of_iterations,
            ) {
                Ok(done) => report.planned.push(done),
                Err(e) if e.is_planning_failure() => {
                    error!(chain = chain.name(), error = %e, "chain planning failed");
                    self.plan = checkpoint;
                    report.failed.push(FailedChainReport {
                        chain: chain.name().to_string(),
                        error: e,
                        iterations: chain.last_iterations(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            planned = report.planned.len(),
            failed = report.failed.len(),
            "enterprise planned"
        );
        Ok(report)
    }

    /// Mass balance parameters of every step, for plan validation.
    pub fn step_balances(&self) -> Vec<StepBalance> {
        self.chains
            .iter()
            .flat_map(|c| c.nodes_in_order())
            .filter_map(|n| n.as_step())
            .map(|step| StepBalance {
                step: step.name.clone(),
                input_stream: step.input_stream().to_string(),
                output_stream: step.output_stream().to_string(),
                factor: step.mass_balance().input_to_output_conversion_factor,
                commodity: step.mass_balance().commodity.clone(),
            })
            .collect()
    }

    /// Check the finished plan. Violations are logged and returned.
    pub fn validate(&self) -> ValidationReport {
        let report = validation::validate_plan(
            &self.plan,
            &self.step_balances(),
            &self.initial_storage_levels(),
            self.storage_tolerance,
        );
        for violation in &report.violations {
            warn!(%violation, "plan violation");
        }
        report
    }

    fn initial_storage_levels(&self) -> Vec<Storage> {
        let mut levels: Vec<Storage> = Vec::new();
        for node in self.chains.iter().flat_map(|c| c.nodes_in_order()) {
            let storage = match node {
                ProcessNode::Step(step) => step.storage().ok(),
                ProcessNode::Storage(s) => Some(s.storage()),
                _ => None,
            };
            if let Some(s) = storage {
                if !levels.iter().any(|l| l.node_name == s.node_name && l.commodity == s.commodity) {
                    levels.push(s.clone());
                }
            }
        }
        levels
    }

    pub fn snapshot(&self) -> Result<Vec<u8>, SerializeError> {
        serialize::write_plan_snapshot(&PlanSnapshot::new(self.plan.clone(), self.stream_handler.clone()))
    }

    /// Replace the plan with one read back from a snapshot.
    pub fn restore(&mut self, data: &[u8]) -> Result<(), DeserializeError> {
        let snapshot = serialize::read_plan_snapshot(data)?;
        self.plan = snapshot.plan;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        self.plan.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy::NoEnergyData;
    use crate::test_utils::*;

    #[test]
    fn chains_with_conflicting_streams_are_rejected() {
        let mut enterprise = Enterprise::new(SimulationConfig::default()).unwrap();
        enterprise.add_chain(batch_chain("a", 0.0)).unwrap();
        let mut streams = StreamHandler::new();
        streams
            .add_stream(make_batch_stream("ore", "mine", "mill", ore(), 90, None))
            .unwrap();
        let other = ProcessChain::new("b", streams);
        assert!(enterprise.add_chain(other).is_err());
    }

    #[test]
    fn duplicate_chain_names_are_rejected() {
        let mut enterprise = Enterprise::new(SimulationConfig::default()).unwrap();
        enterprise.add_chain(batch_chain("a", 0.0)).unwrap();
        assert!(enterprise.add_chain(batch_chain("a", 0.0)).is_err());
    }

    #[test]
    fn failed_chain_is_rolled_back_and_reported() {
        let config = SimulationConfig {
            max_number_of_iterations: Some(2),
            ..SimulationConfig::default()
        };
        let mut enterprise = Enterprise::new(config).unwrap();
        let mut chain = batch_chain("a", 0.0);
        chain
            .set_orders(orders(&[(300.0, "2024-01-01 12:00:00")]))
            .unwrap();
        enterprise.add_chain(chain).unwrap();

        let report = enterprise.plan_all(&mut NoEnergyData).unwrap();
        assert!(!report.is_complete());
        assert_eq!(report.failed[0].chain, "a");
        assert_eq!(report.failed[0].iterations, 3);
        assert!(matches!(report.failed[0].error, PlanningError::NonConvergence { .. }));
        assert!(enterprise.plan().stream_entries("ore").is_empty());
        assert!(enterprise.plan().process_state_data("mill").is_empty());
    }

    #[test]
    fn negative_tolerance_counts_as_its_magnitude() {
        let config = SimulationConfig {
            storage_tolerance: -1e-6,
            ..SimulationConfig::default()
        };
        let mut enterprise = Enterprise::new(config).unwrap();
        let mut chain = batch_chain("a", 0.0);
        chain
            .set_orders(orders(&[(300.0, "2024-01-01 12:00:00")]))
            .unwrap();
        enterprise.add_chain(chain).unwrap();
        enterprise.plan_all(&mut NoEnergyData).unwrap();
        let validation = enterprise.validate();
        assert!(validation.is_valid(), "{:?}", validation.violations);
    }

    #[test]
    fn non_finite_tolerance_is_rejected() {
        let config = SimulationConfig {
            storage_tolerance: f64::INFINITY,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            Enterprise::new(config),
            Err(ConfigurationError::InvalidMass { .. })
        ));
    }

    #[test]
    fn planned_enterprise_validates_and_snapshots() {
        let mut enterprise = Enterprise::new(SimulationConfig::default()).unwrap();
        let mut chain = batch_chain("a", 0.0);
        chain
            .set_orders(orders(&[
                (300.0, "2024-01-01 12:00:00"),
                (200.0, "2024-01-01 16:00:00"),
            ]))
            .unwrap();
        enterprise.add_chain(chain).unwrap();

        let report = enterprise.plan_all(&mut NoEnergyData).unwrap();
        assert!(report.is_complete());
        let validation = enterprise.validate();
        assert!(validation.is_valid(), "{:?}", validation.violations);

        let bytes = enterprise.snapshot().unwrap();
        let before = enterprise.plan().clone();
        enterprise.restore(&bytes).unwrap();
        assert_eq!(enterprise.plan(), &before);
    }
}
