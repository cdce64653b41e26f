//! Material streams between process nodes and the stream registry.
//!
//! A [`Stream`] is the static definition of a directed transfer of one
//! [`Commodity`] between two named nodes. Every planned transfer on it is a
//! [`StreamState`]. Planning builds states backward from an end time: a batch
//! takes a fixed transfer delay, a continuous transfer takes `mass / rate`.

use std::collections::BTreeMap;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::commodity::Commodity;
use crate::error::{ConfigurationError, PlanningError};
use crate::fixed::{Fixed64, Mass, Rate, duration_for_mass};
use crate::plan::StreamProductionPlanEntry;
use crate::time::{Timestamp, duration_millis};

// ---------------------------------------------------------------------------
// Stream definitions
// ---------------------------------------------------------------------------

/// Parameters shared by every stream kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStaticData {
    pub name: String,
    pub start_process_step_name: String,
    pub end_process_step_name: String,
    pub commodity: Commodity,
    pub display_name: String,
}

/// Discrete transfers taking a fixed delay each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStream {
    pub static_data: StreamStaticData,
    #[serde(with = "duration_millis")]
    pub delay: TimeDelta,
    /// Upper bound on the mass of one batch. `None` means unbounded.
    #[serde(default)]
    pub maximum_batch_mass: Option<Mass>,
}

/// Rate-based transfers. Rates are mass per hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuousStream {
    pub static_data: StreamStaticData,
    pub minimum_operation_rate: Rate,
    pub maximum_operation_rate: Rate,
}

/// A stream definition. Dispatches via enum match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stream {
    Batch(BatchStream),
    Continuous(ContinuousStream),
}

// ---------------------------------------------------------------------------
// Stream states
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStreamState {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub batch_mass_value: Mass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuousStreamState {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub operation_rate: Rate,
    pub total_mass: Mass,
}

/// One planned transfer on a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamState {
    Batch(BatchStreamState),
    Continuous(ContinuousStreamState),
}

impl StreamState {
    pub fn start_time(&self) -> Timestamp {
        match self {
            StreamState::Batch(s) => s.start_time,
            StreamState::Continuous(s) => s.start_time,
        }
    }

    pub fn end_time(&self) -> Timestamp {
        match self {
            StreamState::Batch(s) => s.end_time,
            StreamState::Continuous(s) => s.end_time,
        }
    }

    pub fn mass(&self) -> Mass {
        match self {
            StreamState::Batch(s) => s.batch_mass_value,
            StreamState::Continuous(s) => s.total_mass,
        }
    }

    pub fn duration(&self) -> TimeDelta {
        self.end_time() - self.start_time()
    }

    pub fn is_continuous(&self) -> bool {
        matches!(self, StreamState::Continuous(_))
    }

    /// The same transfer moved so that it ends at `end`.
    pub fn shifted_to_end(&self, end: Timestamp) -> StreamState {
        let duration = self.duration();
        match *self {
            StreamState::Batch(s) => StreamState::Batch(BatchStreamState {
                start_time: end - duration,
                end_time: end,
                ..s
            }),
            StreamState::Continuous(s) => StreamState::Continuous(ContinuousStreamState {
                start_time: end - duration,
                end_time: end,
                ..s
            }),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            StreamState::Batch(_) => "batch",
            StreamState::Continuous(_) => "continuous",
        }
    }
}

// ---------------------------------------------------------------------------
// Stream behaviour
// ---------------------------------------------------------------------------

impl Stream {
    pub fn static_data(&self) -> &StreamStaticData {
        match self {
            Stream::Batch(s) => &s.static_data,
            Stream::Continuous(s) => &s.static_data,
        }
    }

    pub fn name(&self) -> &str {
        &self.static_data().name
    }

    pub fn commodity(&self) -> &Commodity {
        &self.static_data().commodity
    }

    pub fn is_continuous(&self) -> bool {
        matches!(self, Stream::Continuous(_))
    }

    /// Check the static parameters for consistency.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidStream {
            name: self.name().to_string(),
            reason: reason.to_string(),
        };
        match self {
            Stream::Batch(s) => {
                if s.delay < TimeDelta::zero() {
                    return Err(invalid("negative batch delay"));
                }
                if s.maximum_batch_mass.is_some_and(|m| m <= Fixed64::ZERO) {
                    return Err(invalid("maximum batch mass must be positive"));
                }
            }
            Stream::Continuous(s) => {
                if s.maximum_operation_rate <= Fixed64::ZERO {
                    return Err(invalid("maximum operation rate must be positive"));
                }
                if s.minimum_operation_rate > s.maximum_operation_rate {
                    return Err(invalid("minimum operation rate exceeds maximum"));
                }
            }
        }
        Ok(())
    }

    fn check_kind(&self, state: &StreamState) -> Result<(), PlanningError> {
        if self.is_continuous() == state.is_continuous() {
            Ok(())
        } else {
            Err(PlanningError::illogical(
                self.name(),
                format!("{} state on a stream of the other kind", state.kind_name()),
            ))
        }
    }

    /// Mass moved by a state of this stream.
    pub fn get_produced_amount(&self, state: &StreamState) -> Result<Mass, PlanningError> {
        self.check_kind(state)?;
        Ok(state.mass())
    }

    /// Flat record of a state for the production plan.
    pub fn create_production_plan_entry(
        &self,
        state: &StreamState,
    ) -> Result<StreamProductionPlanEntry, PlanningError> {
        self.check_kind(state)?;
        let operation_rate = match state {
            StreamState::Batch(_) => None,
            StreamState::Continuous(s) => Some(s.operation_rate),
        };
        Ok(StreamProductionPlanEntry {
            stream_name: self.name().to_string(),
            commodity: self.commodity().clone(),
            start_time: state.start_time(),
            end_time: state.end_time(),
            mass: state.mass(),
            operation_rate,
        })
    }

    /// Build the state that delivers `mass` and finishes at `end`.
    ///
    /// Continuous streams run at `rate_hint` clamped into the stream's
    /// operating range, or at the maximum rate without a hint.
    pub fn create_state_ending_at(
        &self,
        end: Timestamp,
        mass: Mass,
        rate_hint: Option<Rate>,
    ) -> Result<StreamState, PlanningError> {
        match self {
            Stream::Batch(s) => Ok(StreamState::Batch(BatchStreamState {
                start_time: end - s.delay,
                end_time: end,
                batch_mass_value: mass,
            })),
            Stream::Continuous(s) => {
                let mut rate = rate_hint.unwrap_or(s.maximum_operation_rate);
                if rate > s.maximum_operation_rate {
                    rate = s.maximum_operation_rate;
                }
                if rate < s.minimum_operation_rate {
                    rate = s.minimum_operation_rate;
                }
                let duration = duration_for_mass(mass, rate).ok_or_else(|| {
                    PlanningError::illogical(
                        self.name(),
                        format!("cannot transfer {mass} at rate {rate}"),
                    )
                })?;
                Ok(StreamState::Continuous(ContinuousStreamState {
                    start_time: end - duration,
                    end_time: end,
                    operation_rate: rate,
                    total_mass: mass,
                }))
            }
        }
    }

    /// The state a provider can accept instead of `requested`, if any.
    ///
    /// A provider whose earliest committed instant is `frontier` cannot deliver
    /// past it, so the request is moved earlier. Batches above the maximum
    /// batch mass are reduced. Returns `None` when the request is acceptable.
    pub fn propose_adaption(
        &self,
        requested: &StreamState,
        frontier: Option<Timestamp>,
    ) -> Option<StreamState> {
        let mut adapted = *requested;
        if let (Stream::Batch(s), StreamState::Batch(state)) = (self, &mut adapted) {
            if let Some(max) = s.maximum_batch_mass {
                if state.batch_mass_value > max {
                    state.batch_mass_value = max;
                }
            }
        }
        if let Some(f) = frontier {
            if adapted.end_time() > f {
                adapted = adapted.shifted_to_end(f);
            }
        }
        (adapted != *requested).then_some(adapted)
    }
}

// ---------------------------------------------------------------------------
// StreamHandler
// ---------------------------------------------------------------------------

/// Registry of all streams of a chain (or of a whole enterprise once combined).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHandler {
    stream_dict: BTreeMap<String, Stream>,
}

impl StreamHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stream. Names are unique.
    pub fn add_stream(&mut self, stream: Stream) -> Result<(), ConfigurationError> {
        stream.validate()?;
        if self.stream_dict.contains_key(stream.name()) {
            return Err(ConfigurationError::InvalidStream {
                name: stream.name().to_string(),
                reason: "a stream with this name already exists".to_string(),
            });
        }
        self.stream_dict.insert(stream.name().to_string(), stream);
        Ok(())
    }

    pub fn create_batch_stream(
        &mut self,
        static_data: StreamStaticData,
        delay: TimeDelta,
        maximum_batch_mass: Option<Mass>,
    ) -> Result<(), ConfigurationError> {
        self.add_stream(Stream::Batch(BatchStream {
            static_data,
            delay,
            maximum_batch_mass,
        }))
    }

    pub fn create_continuous_stream(
        &mut self,
        static_data: StreamStaticData,
        minimum_operation_rate: Rate,
        maximum_operation_rate: Rate,
    ) -> Result<(), ConfigurationError> {
        self.add_stream(Stream::Continuous(ContinuousStream {
            static_data,
            minimum_operation_rate,
            maximum_operation_rate,
        }))
    }

    /// Look up a stream. A miss lists every known stream name.
    pub fn get_stream(&self, name: &str) -> Result<&Stream, ConfigurationError> {
        self.stream_dict
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownStream {
                name: name.to_string(),
                available: self.stream_names(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stream_dict.contains_key(name)
    }

    pub fn stream_names(&self) -> Vec<String> {
        self.stream_dict.keys().cloned().collect()
    }

    pub fn streams(&self) -> impl Iterator<Item = &Stream> {
        self.stream_dict.values()
    }

    pub fn len(&self) -> usize {
        self.stream_dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stream_dict.is_empty()
    }

    /// Merge the stream registries of several chains. Streams present in more
    /// than one chain must have identical definitions.
    pub fn combine_stream_handler_from_chains<'a>(
        handlers: impl IntoIterator<Item = &'a StreamHandler>,
    ) -> Result<StreamHandler, ConfigurationError> {
        let mut combined = StreamHandler::new();
        for handler in handlers {
            for stream in handler.streams() {
                match combined.stream_dict.get(stream.name()) {
                    Some(existing) if existing == stream => {}
                    Some(_) => {
                        return Err(ConfigurationError::InvalidStream {
                            name: stream.name().to_string(),
                            reason: "defined differently in two chains".to_string(),
                        });
                    }
                    None => {
                        combined
                            .stream_dict
                            .insert(stream.name().to_string(), stream.clone());
                    }
                }
            }
        }
        Ok(combined)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
