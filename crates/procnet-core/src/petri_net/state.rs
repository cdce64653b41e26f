use serde::{Deserialize, Serialize};

use crate::fixed::Fixed64;

/// What a step does while it sits in a state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessStateKind {
    Idle,
    InputStreamRequesting { stream: String },
    OutputStreamProviding { stream: String },
    Intermediate,
    /// Intermediate state drawing a constant power (kW).
    IntermediateWithEnergy { power: Fixed64 },
    CombinedInputOutputWithStorage { input_stream: String, output_stream: String },
}

/// A node of a step's petri net. Names are unique per step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessState {
    pub name: String,
    pub kind: ProcessStateKind,
}

impl ProcessState {
    pub fn idle(name: &str) -> Self {
        Self::with_kind(name, ProcessStateKind::Idle)
    }

    pub fn input_requesting(name: &str, stream: &str) -> Self {
        Self::with_kind(
            name,
            ProcessStateKind::InputStreamRequesting {
                stream: stream.to_string(),
            },
        )
    }

    pub fn output_providing(name: &str, stream: &str) -> Self {
        Self::with_kind(
            name,
            ProcessStateKind::OutputStreamProviding {
                stream: stream.to_string(),
            },
        )
    }

    pub fn intermediate(name: &str) -> Self {
        Self::with_kind(name, ProcessStateKind::Intermediate)
    }

    pub fn intermediate_with_energy(name: &str, power: Fixed64) -> Self {
        Self::with_kind(name, ProcessStateKind::IntermediateWithEnergy { power })
    }

    pub fn combined(name: &str, input_stream: &str, output_stream: &str) -> Self {
        Self::with_kind(
            name,
            ProcessStateKind::CombinedInputOutputWithStorage {
                input_stream: input_stream.to_string(),
                output_stream: output_stream.to_string(),
            },
        )
    }

    fn with_kind(name: &str, kind: ProcessStateKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.kind, ProcessStateKind::Idle)
    }

    /// Stream this state requests input on, if any.
    pub fn requested_input_stream(&self) -> Option<&str> {
        match &self.kind {
            ProcessStateKind::InputStreamRequesting { stream } => Some(stream),
            ProcessStateKind::CombinedInputOutputWithStorage { input_stream, .. } => {
                Some(input_stream)
            }
            _ => None,
        }
    }

    /// Stream this state provides output on, if any.
    pub fn provided_output_stream(&self) -> Option<&str> {
        match &self.kind {
            ProcessStateKind::OutputStreamProviding { stream } => Some(stream),
            ProcessStateKind::CombinedInputOutputWithStorage { output_stream, .. } => {
                Some(output_stream)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_state_requests_and_provides() {
        let s = ProcessState::combined("Combined", "ore", "steel");
        assert_eq!(s.requested_input_stream(), Some("ore"));
        assert_eq!(s.provided_output_stream(), Some("steel"));
        assert!(!s.is_idle());
    }

    #[test]
    fn intermediate_touches_no_stream() {
        let s = ProcessState::intermediate("Processing");
        assert_eq!(s.requested_input_stream(), None);
        assert_eq!(s.provided_output_stream(), None);
    }
}
