//! Choosing the switch that led into a state.
//!
//! Walking backward, a step arrives in a state and must decide which of the
//! state's incoming switches produced it. One selector is registered per
//! target state; the selected switch's start state is the predecessor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, PlanningError};
use crate::fixed::Fixed64;
use crate::mass_balance::MassBalance;
use crate::petri_net::switch::ProcessStateSwitch;
use crate::simulation_data::production_state::ProductionStateData;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessStateSwitchSelector {
    /// Exactly one incoming switch.
    SingleChoice(ProcessStateSwitch),
    /// Missing mass `== 0` selects `input_satisfied`, `> 0` selects
    /// `more_input_required`. Negative missing mass is illogical.
    Batch {
        input_satisfied: ProcessStateSwitch,
        more_input_required: ProcessStateSwitch,
    },
    /// Output that storage can cover selects `from_storage`.
    ProvideOutputFromStorage {
        from_storage: ProcessStateSwitch,
        input_needed: ProcessStateSwitch,
    },
}

impl ProcessStateSwitchSelector {
    pub fn single_choice(switch: ProcessStateSwitch) -> Self {
        ProcessStateSwitchSelector::SingleChoice(switch)
    }

    pub fn batch(
        input_satisfied: ProcessStateSwitch,
        more_input_required: ProcessStateSwitch,
    ) -> Result<Self, ConfigurationError> {
        same_end_state(&input_satisfied, &more_input_required)?;
        Ok(ProcessStateSwitchSelector::Batch {
            input_satisfied,
            more_input_required,
        })
    }

    pub fn provide_output_from_storage(
        from_storage: ProcessStateSwitch,
        input_needed: ProcessStateSwitch,
    ) -> Result<Self, ConfigurationError> {
        same_end_state(&from_storage, &input_needed)?;
        Ok(ProcessStateSwitchSelector::ProvideOutputFromStorage {
            from_storage,
            input_needed,
        })
    }

    /// The state every switch of this selector leads into.
    pub fn end_state_name(&self) -> &str {
        match self {
            ProcessStateSwitchSelector::SingleChoice(s) => s.end_state_name(),
            ProcessStateSwitchSelector::Batch { input_satisfied, .. } => {
                input_satisfied.end_state_name()
            }
            ProcessStateSwitchSelector::ProvideOutputFromStorage { from_storage, .. } => {
                from_storage.end_state_name()
            }
        }
    }

    pub fn switches(&self) -> Vec<&ProcessStateSwitch> {
        match self {
            ProcessStateSwitchSelector::SingleChoice(s) => vec![s],
            ProcessStateSwitchSelector::Batch {
                input_satisfied,
                more_input_required,
            } => vec![input_satisfied, more_input_required],
            ProcessStateSwitchSelector::ProvideOutputFromStorage {
                from_storage,
                input_needed,
            } => vec![from_storage, input_needed],
        }
    }

    pub fn select(
        &self,
        mass_balance: &MassBalance,
        data: &ProductionStateData,
    ) -> Result<&ProcessStateSwitch, PlanningError> {
        match self {
            ProcessStateSwitchSelector::SingleChoice(s) => Ok(s),
            ProcessStateSwitchSelector::Batch {
                input_satisfied,
                more_input_required,
            } => {
                let missing = mass_balance.determine_missing_mass_for_output_stream(data)?;
                if missing == Fixed64::ZERO {
                    Ok(input_satisfied)
                } else if missing > Fixed64::ZERO {
                    Ok(more_input_required)
                } else {
                    Err(PlanningError::illogical(
                        self.end_state_name(),
                        format!("Unexpected missing mass: {missing}"),
                    ))
                }
            }
            ProcessStateSwitchSelector::ProvideOutputFromStorage {
                from_storage,
                input_needed,
            } => {
                if mass_balance.check_if_output_stream_can_be_supplied_directly_from_storage(data)? {
                    Ok(from_storage)
                } else {
                    Ok(input_needed)
                }
            }
        }
    }
}

fn same_end_state(a: &ProcessStateSwitch, b: &ProcessStateSwitch) -> Result<(), ConfigurationError> {
    if a.end_state_name() == b.end_state_name() {
        Ok(())
    } else {
        Err(ConfigurationError::SelectorEndStateMismatch {
            first: a.end_state_name().to_string(),
            second: b.end_state_name().to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// ProcessStateSwitchSelectorHandler
// ---------------------------------------------------------------------------

/// Selectors of one step, keyed by target state name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStateSwitchSelectorHandler {
    selectors: BTreeMap<String, ProcessStateSwitchSelector>,
}

impl ProcessStateSwitchSelectorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a selector. A second selector for the same target fails and
    /// leaves the handler unchanged.
    pub fn add_selector(&mut self, selector: ProcessStateSwitchSelector) -> Result<(), ConfigurationError> {
        let target = selector.end_state_name().to_string();
        if self.selectors.contains_key(&target) {
            return Err(ConfigurationError::DuplicateSelector(target));
        }
        self.selectors.insert(target, selector);
        Ok(())
    }

    pub fn get_selector(&self, target_state: &str) -> Result<&ProcessStateSwitchSelector, ConfigurationError> {
        self.selectors
            .get(target_state)
            .ok_or_else(|| ConfigurationError::MissingSelector(target_state.to_string()))
    }

    pub fn contains(&self, target_state: &str) -> bool {
        self.selectors.contains_key(target_state)
    }

    pub fn selectors(&self) -> impl Iterator<Item = &ProcessStateSwitchSelector> {
        self.selectors.values()
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}
