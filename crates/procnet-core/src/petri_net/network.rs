//! A step's complete petri net and the standard templates.

use std::collections::{BTreeMap, BTreeSet};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, PlanningError};
use crate::mass_balance::MassBalance;
use crate::petri_net::selector::{ProcessStateSwitchSelector, ProcessStateSwitchSelectorHandler};
use crate::petri_net::state::ProcessState;
use crate::petri_net::switch::{ProcessStateSwitch, SwitchKind};
use crate::simulation_data::production_state::ProductionStateData;
use crate::time::duration_millis;

pub const IDLE: &str = "Idle";
pub const INPUT: &str = "Input";
pub const PROCESSING: &str = "Processing";
pub const OUTPUT: &str = "Output";
pub const COMBINED: &str = "Combined";

/// Standard nets for steps with one input and one output stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PetriNetTemplate {
    /// Idle -> Input -> Output -> Idle.
    Batch,
    /// Idle -> Input -> Processing -> Output -> Idle.
    BatchWithProcessing {
        #[serde(with = "duration_millis")]
        processing_time: TimeDelta,
    },
    /// Batch, plus Idle -> Output when storage covers the output.
    BatchWithStorage,
    /// Idle -> Combined -> Idle, input and output running in parallel.
    Continuous,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStateNetwork {
    states: BTreeMap<String, ProcessState>,
    selector_handler: ProcessStateSwitchSelectorHandler,
    idle_state_name: String,
    idle_return_switch: Option<ProcessStateSwitch>,
}

impl ProcessStateNetwork {
    pub fn new(idle_state: ProcessState) -> Result<Self, ConfigurationError> {
        if !idle_state.is_idle() {
            return Err(ConfigurationError::UnknownProcessState(format!(
                "{} is not an idle state",
                idle_state.name
            )));
        }
        let idle_state_name = idle_state.name.clone();
        let mut states = BTreeMap::new();
        states.insert(idle_state_name.clone(), idle_state);
        Ok(Self {
            states,
            selector_handler: ProcessStateSwitchSelectorHandler::new(),
            idle_state_name,
            idle_return_switch: None,
        })
    }

    pub fn add_state(&mut self, state: ProcessState) -> Result<(), ConfigurationError> {
        if self.states.contains_key(&state.name) {
            return Err(ConfigurationError::DuplicateProcessState(state.name));
        }
        self.states.insert(state.name.clone(), state);
        Ok(())
    }

    /// Register a selector. Every state its switches connect must exist.
    pub fn add_selector(&mut self, selector: ProcessStateSwitchSelector) -> Result<(), ConfigurationError> {
        for switch in selector.switches() {
            self.get_state(switch.start_state_name())?;
            self.get_state(switch.end_state_name())?;
        }
        self.selector_handler.add_selector(selector)
    }

    /// The `AtNextDiscreteEvent` arc from the output state back to idle.
    pub fn set_idle_return_switch(&mut self, switch: ProcessStateSwitch) -> Result<(), ConfigurationError> {
        self.get_state(switch.start_state_name())?;
        if switch.end_state_name() != self.idle_state_name {
            return Err(ConfigurationError::UnknownProcessState(format!(
                "idle return switch must end in {}, not {}",
                self.idle_state_name,
                switch.end_state_name()
            )));
        }
        self.idle_return_switch = Some(switch);
        Ok(())
    }

    pub fn get_state(&self, name: &str) -> Result<&ProcessState, ConfigurationError> {
        self.states
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownProcessState(name.to_string()))
    }

    pub fn states(&self) -> impl Iterator<Item = &ProcessState> {
        self.states.values()
    }

    pub fn idle_state_name(&self) -> &str {
        &self.idle_state_name
    }

    pub fn selector_handler(&self) -> &ProcessStateSwitchSelectorHandler {
        &self.selector_handler
    }

    pub fn idle_return_switch(&self) -> Result<&ProcessStateSwitch, ConfigurationError> {
        self.idle_return_switch
            .as_ref()
            .ok_or_else(|| ConfigurationError::MissingSelector(self.idle_state_name.clone()))
    }

    /// The state providing `stream`.
    pub fn output_state_for(&self, stream: &str) -> Result<&ProcessState, ConfigurationError> {
        self.states
            .values()
            .find(|s| s.provided_output_stream() == Some(stream))
            .ok_or_else(|| ConfigurationError::MissingOutputState(stream.to_string()))
    }

    /// The switch that led into `target`.
    pub fn select_switch(
        &self,
        target: &str,
        mass_balance: &MassBalance,
        data: &ProductionStateData,
    ) -> Result<&ProcessStateSwitch, PlanningError> {
        let selector = self.selector_handler.get_selector(target)?;
        selector.select(mass_balance, data)
    }

    /// Structural checks run once when a step is built: every state but idle
    /// can be left backward and leads back to idle, and the output state
    /// returns to idle.
    pub fn validate(&self, output_stream: &str) -> Result<(), ConfigurationError> {
        let output = self.output_state_for(output_stream)?;
        for state in self.states.values() {
            if !state.is_idle() && !self.selector_handler.contains(&state.name) {
                return Err(ConfigurationError::MissingSelector(state.name.clone()));
            }
        }
        if let Some(stuck) = self.states_without_way_back().into_iter().next() {
            return Err(ConfigurationError::IdleUnreachable(stuck.to_string()));
        }
        let idle_return = self.idle_return_switch()?;
        if idle_return.start_state_name() != output.name {
            return Err(ConfigurationError::MissingOutputState(format!(
                "{output_stream} (idle return leaves {})",
                idle_return.start_state_name()
            )));
        }
        Ok(())
    }

    /// States from which no chain of incoming switches leads back to idle.
    fn states_without_way_back(&self) -> Vec<&str> {
        let mut reaches_idle: BTreeSet<&str> = BTreeSet::new();
        reaches_idle.insert(self.idle_state_name.as_str());
        loop {
            let before = reaches_idle.len();
            for selector in self.selector_handler.selectors() {
                let target = selector.end_state_name();
                if !reaches_idle.contains(target)
                    && selector
                        .switches()
                        .iter()
                        .any(|s| reaches_idle.contains(s.start_state_name()))
                {
                    reaches_idle.insert(target);
                }
            }
            if reaches_idle.len() == before {
                break;
            }
        }
        self.states
            .keys()
            .map(String::as_str)
            .filter(|name| !reaches_idle.contains(name))
            .collect()
    }

    pub fn from_template(
        template: &PetriNetTemplate,
        input_stream: &str,
        output_stream: &str,
    ) -> Result<Self, ConfigurationError> {
        let mut net = Self::new(ProcessState::idle(IDLE))?;
        match template {
            PetriNetTemplate::Batch
            | PetriNetTemplate::BatchWithProcessing { .. }
            | PetriNetTemplate::BatchWithStorage => {
                net.add_state(ProcessState::input_requesting(INPUT, input_stream))?;
                net.add_state(ProcessState::output_providing(OUTPUT, output_stream))?;
                net.add_selector(ProcessStateSwitchSelector::batch(
                    ProcessStateSwitch::new(IDLE, INPUT, SwitchKind::AtInputStreamProvided)?,
                    ProcessStateSwitch::new(INPUT, INPUT, SwitchKind::AtInputStreamProvided)?,
                )?)?;

                let before_output = match template {
                    PetriNetTemplate::BatchWithProcessing { processing_time } => {
                        net.add_state(ProcessState::intermediate(PROCESSING))?;
                        net.add_selector(ProcessStateSwitchSelector::single_choice(
                            ProcessStateSwitch::new(INPUT, PROCESSING, SwitchKind::Delay(*processing_time))?,
                        ))?;
                        PROCESSING
                    }
                    _ => INPUT,
                };

                let input_to_output =
                    ProcessStateSwitch::new(before_output, OUTPUT, SwitchKind::AtOutputStreamProvided)?;
                if matches!(template, PetriNetTemplate::BatchWithStorage) {
                    net.add_selector(ProcessStateSwitchSelector::provide_output_from_storage(
                        ProcessStateSwitch::new(IDLE, OUTPUT, SwitchKind::AtOutputStreamProvided)?,
                        input_to_output,
                    )?)?;
                } else {
                    net.add_selector(ProcessStateSwitchSelector::single_choice(input_to_output))?;
                }
                net.set_idle_return_switch(ProcessStateSwitch::new(
                    OUTPUT,
                    IDLE,
                    SwitchKind::AtNextDiscreteEvent,
                )?)?;
            }
            PetriNetTemplate::Continuous => {
                net.add_state(ProcessState::combined(COMBINED, input_stream, output_stream))?;
                net.add_selector(ProcessStateSwitchSelector::batch(
                    ProcessStateSwitch::new(IDLE, COMBINED, SwitchKind::AfterInputAndOutputStream)?,
                    ProcessStateSwitch::new(COMBINED, COMBINED, SwitchKind::AfterInputAndOutputStream)?,
                )?)?;
                net.set_idle_return_switch(ProcessStateSwitch::new(
                    COMBINED,
                    IDLE,
                    SwitchKind::AtNextDiscreteEvent,
                )?)?;
            }
        }
        net.validate(output_stream)?;
        Ok(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_template_is_valid() {
        let net = ProcessStateNetwork::from_template(&PetriNetTemplate::Batch, "ore", "steel").unwrap();
        assert_eq!(net.states().count(), 3);
        assert_eq!(net.output_state_for("steel").unwrap().name, OUTPUT);
        assert_eq!(net.idle_return_switch().unwrap().start_state_name(), OUTPUT);
    }

    #[test]
    fn processing_template_inserts_intermediate_state() {
        let net = ProcessStateNetwork::from_template(
            &PetriNetTemplate::BatchWithProcessing {
                processing_time: TimeDelta::minutes(10),
            },
            "ore",
            "steel",
        )
        .unwrap();
        let output_selector = net.selector_handler().get_selector(OUTPUT).unwrap();
        assert_eq!(output_selector.switches()[0].start_state_name(), PROCESSING);
    }

    #[test]
    fn storage_template_offers_idle_to_output() {
        let net =
            ProcessStateNetwork::from_template(&PetriNetTemplate::BatchWithStorage, "ore", "steel").unwrap();
        let starts: Vec<&str> = net
            .selector_handler()
            .get_selector(OUTPUT)
            .unwrap()
            .switches()
            .iter()
            .map(|s| s.start_state_name())
            .collect();
        assert_eq!(starts, vec![IDLE, INPUT]);
    }

    #[test]
    fn continuous_template_uses_combined_state() {
        let net = ProcessStateNetwork::from_template(&PetriNetTemplate::Continuous, "ore", "steel").unwrap();
        let combined = net.output_state_for("steel").unwrap();
        assert_eq!(combined.requested_input_stream(), Some("ore"));
    }

    #[test]
    fn duplicate_state_rejected() {
        let mut net = ProcessStateNetwork::new(ProcessState::idle(IDLE)).unwrap();
        assert_eq!(
            net.add_state(ProcessState::idle(IDLE)),
            Err(ConfigurationError::DuplicateProcessState(IDLE.into()))
        );
    }

    #[test]
    fn selector_with_unknown_state_rejected() {
        let mut net = ProcessStateNetwork::new(ProcessState::idle(IDLE)).unwrap();
        let sel = ProcessStateSwitchSelector::single_choice(
            ProcessStateSwitch::new(IDLE, "Nowhere", SwitchKind::AtOutputStreamProvided).unwrap(),
        );
        assert_eq!(
            net.add_selector(sel),
            Err(ConfigurationError::UnknownProcessState("Nowhere".into()))
        );
    }

    #[test]
    fn self_feeding_state_fails_validation() {
        let mut net = ProcessStateNetwork::new(ProcessState::idle(IDLE)).unwrap();
        net.add_state(ProcessState::intermediate(PROCESSING)).unwrap();
        net.add_state(ProcessState::output_providing(OUTPUT, "steel")).unwrap();
        net.add_selector(ProcessStateSwitchSelector::single_choice(
            ProcessStateSwitch::new(PROCESSING, OUTPUT, SwitchKind::AtOutputStreamProvided).unwrap(),
        ))
        .unwrap();
        net.add_selector(ProcessStateSwitchSelector::single_choice(
            ProcessStateSwitch::new(PROCESSING, PROCESSING, SwitchKind::Delay(TimeDelta::minutes(10))).unwrap(),
        ))
        .unwrap();
        net.set_idle_return_switch(ProcessStateSwitch::new(OUTPUT, IDLE, SwitchKind::AtNextDiscreteEvent).unwrap())
            .unwrap();
        assert_eq!(
            net.validate("steel"),
            Err(ConfigurationError::IdleUnreachable(OUTPUT.into()))
        );
    }

    #[test]
    fn state_without_selector_fails_validation() {
        let mut net = ProcessStateNetwork::new(ProcessState::idle(IDLE)).unwrap();
        net.add_state(ProcessState::output_providing(OUTPUT, "steel")).unwrap();
        assert_eq!(
            net.validate("steel"),
            Err(ConfigurationError::MissingSelector(OUTPUT.into()))
        );
    }
}
