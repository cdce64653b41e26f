//! Error taxonomy of the planning engine.
//!
//! Every variant is fatal for the chain being planned. None of them is
//! retried: the same model and orders would reproduce the same failure.

/// Model definition errors, raised while the model is being assembled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("malformed state connector: '{start}' -> '{end}'")]
    MalformedStateConnector { start: String, end: String },
    #[error("a switch selector for target state '{0}' is already registered")]
    DuplicateSelector(String),
    #[error("selector switches end in different states: '{first}' and '{second}'")]
    SelectorEndStateMismatch { first: String, second: String },
    #[error("no switch selector registered for state '{0}'")]
    MissingSelector(String),
    #[error("stream '{name}' not found; available streams: [{}]", .available.join(", "))]
    UnknownStream { name: String, available: Vec<String> },
    #[error("stream '{name}' is invalid: {reason}")]
    InvalidStream { name: String, reason: String },
    #[error("process node '{0}' is already part of the chain")]
    DuplicateNode(String),
    #[error("process state '{0}' is already defined")]
    DuplicateProcessState(String),
    #[error("process state '{0}' is not defined")]
    UnknownProcessState(String),
    #[error("process state '{0}' cannot be traced back to the idle state")]
    IdleUnreachable(String),
    #[error("process step '{0}' has no output-providing state for its main output stream")]
    MissingOutputState(String),
    #[error("storage of '{0}' has not been created")]
    StorageNotCreated(String),
    #[error("storage of '{0}' has already been created")]
    StorageAlreadyCreated(String),
    #[error("conversion factor of '{0}' must be positive")]
    InvalidConversionFactor(String),
    #[error("{field} = {value} is not a valid mass")]
    InvalidMass { field: String, value: String },
    #[error("chain '{chain}' is invalid: {reason}")]
    InvalidChain { chain: String, reason: String },
}

/// Errors raised while a chain is being planned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanningError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// A state transition was attempted from the wrong predecessor state.
    #[error("illogical simulation state in {context}: {detail}")]
    IllogicalSimulationState { context: String, detail: String },
    /// A node received an operation it can never handle.
    #[error("node '{node}' cannot handle operation {operation}")]
    IllogicalFunctionCall { node: String, operation: String },
    #[error("chain '{chain}' did not converge within {iterations} iterations")]
    NonConvergence { chain: String, iterations: u64 },
    #[error("operation addressed to unknown node '{0}'")]
    UnknownNode(String),
}

impl PlanningError {
    pub fn illogical(context: &str, detail: impl Into<String>) -> Self {
        PlanningError::IllogicalSimulationState {
            context: context.to_string(),
            detail: detail.into(),
        }
    }

    /// Whether this error is one of the modeled planning failures (defective
    /// model, inconsistent state, non-convergence). Interface misuse between
    /// nodes is not and should surface to the caller unchanged.
    pub fn is_planning_failure(&self) -> bool {
        matches!(
            self,
            PlanningError::Configuration(_)
                | PlanningError::IllogicalSimulationState { .. }
                | PlanningError::NonConvergence { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_stream_lists_available_names() {
        let err = ConfigurationError::UnknownStream {
            name: "slag".into(),
            available: vec!["ore".into(), "steel".into()],
        };
        assert_eq!(
            err.to_string(),
            "stream 'slag' not found; available streams: [ore, steel]"
        );
    }

    #[test]
    fn configuration_errors_convert() {
        let err: PlanningError = ConfigurationError::DuplicateNode("press".into()).into();
        assert!(matches!(err, PlanningError::Configuration(_)));
        assert!(err.is_planning_failure());
    }

    #[test]
    fn interface_misuse_is_not_a_planning_failure() {
        let err = PlanningError::IllogicalFunctionCall {
            node: "source".into(),
            operation: "DownstreamValidationOrder".into(),
        };
        assert!(!err.is_planning_failure());
        assert!(!PlanningError::UnknownNode("x".into()).is_planning_failure());
    }

    #[test]
    fn illogical_helper_formats() {
        let err = PlanningError::illogical("branch", "wrong state");
        assert_eq!(err.to_string(), "illogical simulation state in branch: wrong state");
    }
}
