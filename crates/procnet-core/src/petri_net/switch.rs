//! Transitions of a step's petri net.
//!
//! Planning runs backward, so a switch does not say when it fires forward.
//! It says when the step must have entered the switch's end state, given
//! what is known about the current output and its inputs.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, PlanningError};
use crate::simulation_data::production_state::ProductionStateData;
use crate::time::{TimeData, Timestamp, duration_millis};

/// Directed arc between two named states.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateConnector {
    pub start_state_name: String,
    pub end_state_name: String,
}

impl StateConnector {
    /// Both names must be non-blank.
    pub fn new(start: &str, end: &str) -> Result<Self, ConfigurationError> {
        if start.trim().is_empty() || end.trim().is_empty() {
            return Err(ConfigurationError::MalformedStateConnector {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self {
            start_state_name: start.to_string(),
            end_state_name: end.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchKind {
    Delay(#[serde(with = "duration_millis")] TimeDelta),
    AtInputStreamProvided,
    AtOutputStreamProvided,
    AfterInputAndOutputStream,
    AtNextDiscreteEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStateSwitch {
    pub connector: StateConnector,
    pub kind: SwitchKind,
}

impl ProcessStateSwitch {
    pub fn new(start: &str, end: &str, kind: SwitchKind) -> Result<Self, ConfigurationError> {
        Ok(Self {
            connector: StateConnector::new(start, end)?,
            kind,
        })
    }

    pub fn start_state_name(&self) -> &str {
        &self.connector.start_state_name
    }

    pub fn end_state_name(&self) -> &str {
        &self.connector.end_state_name
    }

    /// Instant at which the step entered the end state.
    pub fn calculate_next_event_time_backward(
        &self,
        data: &ProductionStateData,
        time_data: &TimeData,
    ) -> Result<Timestamp, PlanningError> {
        match self.kind {
            SwitchKind::Delay(delay) => time_data
                .last_process_state_switch_time
                .map(|t| t - delay)
                .ok_or_else(|| self.missing("a last switch time")),
            SwitchKind::AtOutputStreamProvided => Ok(data.output_stream_state()?.start_time()),
            SwitchKind::AtInputStreamProvided => match data {
                ProductionStateData::ValidatedPostProduction(d) => d
                    .validated_input_stream_list
                    .last()
                    .map(|s| s.start_time())
                    .ok_or_else(|| self.missing("a validated input")),
                ProductionStateData::PostProduction(d) => Ok(d.current_input_stream_state.start_time()),
                // Nothing was requested: the state is left as soon as it is entered.
                ProductionStateData::PreProduction(_) => time_data
                    .last_process_state_switch_time
                    .ok_or_else(|| self.missing("a last switch time")),
                ProductionStateData::Uninitialized => {
                    Err(data.unexpected("calculate_next_event_time_backward"))
                }
            },
            SwitchKind::AfterInputAndOutputStream => {
                let output_start = data.output_stream_state()?.start_time();
                let earliest_input = data
                    .validated_inputs()
                    .iter()
                    .chain(data.pending_input())
                    .map(|s| s.start_time())
                    .min();
                Ok(earliest_input.map_or(output_start, |t| t.min(output_start)))
            }
            SwitchKind::AtNextDiscreteEvent => time_data
                .next_process_state_switch_time
                .ok_or_else(|| self.missing("a next discrete event")),
        }
    }

    fn missing(&self, what: &str) -> PlanningError {
        PlanningError::illogical(
            "process state switch",
            format!(
                "{:?} switch {} -> {} needs {what}",
                self.kind, self.connector.start_state_name, self.connector.end_state_name
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation_data::production_state::ProductionProcessStateContainer;
    use crate::stream::StreamState;
    use crate::test_utils::*;

    fn batch(end: &str, delay_minutes: i64) -> StreamState {
        make_batch_stream("s", "a", "b", ore(), delay_minutes, None)
            .create_state_ending_at(ts(end), mass(10.0), None)
            .unwrap()
    }

    fn pre_production() -> ProductionProcessStateContainer {
        let mut c = ProductionProcessStateContainer::new();
        c.initialize_production_data(batch("2024-01-01 12:00:00", 40), "Output", mass(0.0))
            .unwrap();
        c
    }

    #[test]
    fn blank_connector_is_malformed() {
        assert!(matches!(
            StateConnector::new("Idle", " "),
            Err(ConfigurationError::MalformedStateConnector { .. })
        ));
    }

    #[test]
    fn delay_counts_back_from_last_switch() {
        let sw = ProcessStateSwitch::new("Input", "Processing", SwitchKind::Delay(TimeDelta::minutes(15)))
            .unwrap();
        let mut td = TimeData::new();
        td.last_process_state_switch_time = Some(ts("2024-01-01 11:20:00"));
        let t = sw
            .calculate_next_event_time_backward(pre_production().data(), &td)
            .unwrap();
        assert_eq!(t, ts("2024-01-01 11:05:00"));
    }

    #[test]
    fn output_switch_uses_output_start() {
        let sw = ProcessStateSwitch::new("Input", "Output", SwitchKind::AtOutputStreamProvided).unwrap();
        let t = sw
            .calculate_next_event_time_backward(pre_production().data(), &TimeData::new())
            .unwrap();
        assert_eq!(t, ts("2024-01-01 11:20:00"));
    }

    #[test]
    fn input_switch_uses_pending_then_last_validated_input() {
        let sw = ProcessStateSwitch::new("Idle", "Input", SwitchKind::AtInputStreamProvided).unwrap();
        let mut c = pre_production();
        c.add_first_input_stream_state(batch("2024-01-01 11:20:00", 20)).unwrap();
        let td = TimeData::new();
        assert_eq!(
            sw.calculate_next_event_time_backward(c.data(), &td).unwrap(),
            ts("2024-01-01 11:00:00")
        );
        c.validate_input_stream(batch("2024-01-01 11:10:00", 20)).unwrap();
        assert_eq!(
            sw.calculate_next_event_time_backward(c.data(), &td).unwrap(),
            ts("2024-01-01 10:50:00")
        );
    }

    #[test]
    fn combined_switch_takes_earliest_start() {
        let sw = ProcessStateSwitch::new("Idle", "Combined", SwitchKind::AfterInputAndOutputStream)
            .unwrap();
        let mut c = pre_production();
        assert_eq!(
            sw.calculate_next_event_time_backward(c.data(), &TimeData::new())
                .unwrap(),
            ts("2024-01-01 11:20:00")
        );
        c.add_first_input_stream_state(batch("2024-01-01 12:00:00", 60)).unwrap();
        assert_eq!(
            sw.calculate_next_event_time_backward(c.data(), &TimeData::new())
                .unwrap(),
            ts("2024-01-01 11:00:00")
        );
    }

    #[test]
    fn next_discrete_event_must_be_set() {
        let sw = ProcessStateSwitch::new("Output", "Idle", SwitchKind::AtNextDiscreteEvent).unwrap();
        let mut td = TimeData::new();
        assert!(sw
            .calculate_next_event_time_backward(pre_production().data(), &td)
            .is_err());
        td.next_process_state_switch_time = Some(ts("2024-01-01 09:00:00"));
        assert_eq!(
            sw.calculate_next_event_time_backward(pre_production().data(), &td)
                .unwrap(),
            ts("2024-01-01 09:00:00")
        );
    }

    #[test]
    fn uninitialized_data_is_illogical() {
        let sw = ProcessStateSwitch::new("Idle", "Input", SwitchKind::AtInputStreamProvided).unwrap();
        let err = sw
            .calculate_next_event_time_backward(&ProductionStateData::Uninitialized, &TimeData::new())
            .unwrap_err();
        assert!(matches!(err, PlanningError::IllogicalSimulationState { .. }));
    }
}
