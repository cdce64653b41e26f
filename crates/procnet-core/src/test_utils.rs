//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use chrono::TimeDelta;

use crate::chain::ProcessChain;
use crate::commodity::Commodity;
use crate::fixed::{Mass, f64_to_fixed64};
use crate::node::{ProcessStep, Sink, Source};
use crate::order::{OrderCollection, ProductionOrder};
use crate::petri_net::PetriNetTemplate;
use crate::stream::{BatchStream, ContinuousStream, Stream, StreamHandler, StreamStaticData};
use crate::time::{Timestamp, parse_timestamp};

// ===========================================================================
// Scalars
// ===========================================================================

pub fn mass(v: f64) -> Mass {
    f64_to_fixed64(v)
}

/// Parse `YYYY-MM-DD HH:MM:SS`, panicking on malformed input.
pub fn ts(text: &str) -> Timestamp {
    parse_timestamp(text).unwrap()
}

// ===========================================================================
// Commodities
// ===========================================================================

pub fn ore() -> Commodity {
    Commodity::new("ore")
}

pub fn steel() -> Commodity {
    Commodity::new("steel")
}

// ===========================================================================
// Streams
// ===========================================================================

fn static_data(name: &str, from: &str, to: &str, commodity: Commodity) -> StreamStaticData {
    StreamStaticData {
        name: name.to_string(),
        start_process_step_name: from.to_string(),
        end_process_step_name: to.to_string(),
        commodity,
        display_name: name.to_string(),
    }
}

pub fn make_batch_stream(
    name: &str,
    from: &str,
    to: &str,
    commodity: Commodity,
    delay_minutes: i64,
    maximum_batch_mass: Option<f64>,
) -> Stream {
    Stream::Batch(BatchStream {
        static_data: static_data(name, from, to, commodity),
        delay: TimeDelta::minutes(delay_minutes),
        maximum_batch_mass: maximum_batch_mass.map(mass),
    })
}

/// Rates in mass per hour.
pub fn make_continuous_stream(
    name: &str,
    from: &str,
    to: &str,
    commodity: Commodity,
    minimum_rate: f64,
    maximum_rate: f64,
) -> Stream {
    Stream::Continuous(ContinuousStream {
        static_data: static_data(name, from, to, commodity),
        minimum_operation_rate: mass(minimum_rate),
        maximum_operation_rate: mass(maximum_rate),
    })
}

// ===========================================================================
// Chains
// ===========================================================================

/// `mine -> mill -> yard` over the streams `ore` and `steel`, with a
/// conversion factor of one and a tiny storage tolerance.
pub fn linear_chain(
    name: &str,
    template: PetriNetTemplate,
    ore_stream: Stream,
    steel_stream: Stream,
    initial_storage: f64,
) -> ProcessChain {
    let mut streams = StreamHandler::new();
    streams.add_stream(ore_stream).unwrap();
    streams.add_stream(steel_stream).unwrap();
    let mill = ProcessStep::from_template(
        "mill",
        &template,
        ore(),
        mass(1.0),
        "ore",
        "steel",
        mass(initial_storage),
        mass(1e-6),
    )
    .unwrap();
    ProcessChain::linear(
        name,
        streams,
        [
            Source::new("mine", ore()).into(),
            mill.into(),
            Sink::new("yard", steel(), "steel").into(),
        ],
    )
    .unwrap()
}

/// Batch streams of 20 and 40 minutes around a batch mill.
pub fn batch_chain(name: &str, initial_storage: f64) -> ProcessChain {
    linear_chain(
        name,
        PetriNetTemplate::Batch,
        make_batch_stream("ore", "mine", "mill", ore(), 20, None),
        make_batch_stream("steel", "mill", "yard", steel(), 40, None),
        initial_storage,
    )
}

/// Batch streams around a mill that serves from storage when it can.
pub fn storage_chain(name: &str, initial_storage: f64) -> ProcessChain {
    linear_chain(
        name,
        PetriNetTemplate::BatchWithStorage,
        make_batch_stream("ore", "mine", "mill", ore(), 20, None),
        make_batch_stream("steel", "mill", "yard", steel(), 40, None),
        initial_storage,
    )
}

/// Continuous streams of 10..600 and 10..300 per hour around a continuous mill.
pub fn continuous_chain(name: &str, initial_storage: f64) -> ProcessChain {
    linear_chain(
        name,
        PetriNetTemplate::Continuous,
        make_continuous_stream("ore", "mine", "mill", ore(), 10.0, 600.0),
        make_continuous_stream("steel", "mill", "yard", steel(), 10.0, 300.0),
        initial_storage,
    )
}

// ===========================================================================
// Orders
// ===========================================================================

/// Steel orders numbered from one, given as `(mass, deadline)`.
pub fn orders(items: &[(f64, &str)]) -> OrderCollection {
    items
        .iter()
        .enumerate()
        .map(|(i, (m, deadline))| ProductionOrder::new(i as u64 + 1, steel(), mass(*m), ts(deadline)))
        .collect()
}
