//! The production plan: everything planning decided, as flat records.
//!
//! One [`ProductionPlan`] is shared by every chain of a run. Entries are
//! appended while chains are planned backward, so lists are kept in insertion
//! order until [`ProductionPlan::sort_chronologically`] is called.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::commodity::Commodity;
use crate::fixed::{Mass, Rate};
use crate::time::Timestamp;

// ---------------------------------------------------------------------------
// Plan records
// ---------------------------------------------------------------------------

/// One occurrence of a process state of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStateData {
    pub process_state_name: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

impl ProcessStateData {
    pub fn new(process_state_name: &str, start_time: Timestamp, end_time: Timestamp) -> Self {
        Self {
            process_state_name: process_state_name.to_string(),
            start_time,
            end_time,
        }
    }
}

/// One transfer on a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamProductionPlanEntry {
    pub stream_name: String,
    pub commodity: Commodity,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub mass: Mass,
    /// Set for continuous transfers only.
    pub operation_rate: Option<Rate>,
}

/// Signed change of a storage level at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub time: Timestamp,
    pub commodity: Commodity,
    pub mass_change: Mass,
    pub description: String,
}

/// Mass handed to a sink against one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDelivery {
    pub order_number: u64,
    pub commodity: Commodity,
    pub mass: Mass,
    pub end_time: Timestamp,
    pub deadline: Timestamp,
}

// ---------------------------------------------------------------------------
// TemporaryProductionPlan
// ---------------------------------------------------------------------------

/// Records of one output branch, flushed into the [`ProductionPlan`] when the
/// branch completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryProductionPlan {
    pub process_state_data: Vec<ProcessStateData>,
    pub stream_entries: Vec<StreamProductionPlanEntry>,
    pub storage_entries: Vec<StorageEntry>,
}

impl TemporaryProductionPlan {
    pub fn add_process_state_data(&mut self, data: ProcessStateData) {
        self.process_state_data.push(data);
    }

    pub fn add_stream_entry(&mut self, entry: StreamProductionPlanEntry) {
        self.stream_entries.push(entry);
    }

    pub fn add_storage_entry(&mut self, entry: StorageEntry) {
        self.storage_entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.process_state_data.is_empty()
            && self.stream_entries.is_empty()
            && self.storage_entries.is_empty()
    }

    /// Earliest start and latest end over states and stream transfers.
    pub fn time_span(&self) -> Option<(Timestamp, Timestamp)> {
        let states = self
            .process_state_data
            .iter()
            .map(|d| (d.start_time, d.end_time));
        let streams = self
            .stream_entries
            .iter()
            .map(|e| (e.start_time, e.end_time));
        states
            .chain(streams)
            .fold(None, |span, (start, end)| match span {
                None => Some((start, end)),
                Some((s, e)) => Some((s.min(start), e.max(end))),
            })
    }
}

// ---------------------------------------------------------------------------
// ProductionPlan
// ---------------------------------------------------------------------------

/// Plan of a whole run: per step, per stream, per storage and per sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionPlan {
    process_step_production_plan: BTreeMap<String, Vec<ProcessStateData>>,
    stream_production_plan: BTreeMap<String, Vec<StreamProductionPlanEntry>>,
    /// node name -> commodity name -> entries
    storage_production_plan: BTreeMap<String, BTreeMap<String, Vec<StorageEntry>>>,
    order_deliveries: BTreeMap<String, Vec<OrderDelivery>>,
}

impl ProductionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    // -- initialisation (idempotent, existing entries are kept) --

    pub fn initialize_process_step_production_plan_entry(&mut self, step_name: &str) {
        self.process_step_production_plan
            .entry(step_name.to_string())
            .or_default();
    }

    pub fn initialize_stream_production_plan_entry(&mut self, stream_name: &str) {
        self.stream_production_plan
            .entry(stream_name.to_string())
            .or_default();
    }

    pub fn initialize_storage_production_plan_entry(&mut self, node_name: &str, commodity: &Commodity) {
        self.storage_production_plan
            .entry(node_name.to_string())
            .or_default()
            .entry(commodity.name().to_string())
            .or_default();
    }

    // -- appends --

    pub fn add_process_state_data(&mut self, step_name: &str, data: ProcessStateData) {
        self.process_step_production_plan
            .entry(step_name.to_string())
            .or_default()
            .push(data);
    }

    pub fn add_stream_entry(&mut self, entry: StreamProductionPlanEntry) {
        self.stream_production_plan
            .entry(entry.stream_name.clone())
            .or_default()
            .push(entry);
    }

    pub fn add_list_of_storage_entries(
        &mut self,
        node_name: &str,
        commodity: &Commodity,
        entries: impl IntoIterator<Item = StorageEntry>,
    ) {
        self.storage_production_plan
            .entry(node_name.to_string())
            .or_default()
            .entry(commodity.name().to_string())
            .or_default()
            .extend(entries);
    }

    pub fn add_order_delivery(&mut self, sink_name: &str, delivery: OrderDelivery) {
        self.order_deliveries
            .entry(sink_name.to_string())
            .or_default()
            .push(delivery);
    }

    /// Flush the records of one completed branch of `step_name`. Storage
    /// entries are filed under the step itself.
    pub fn merge_temporary_plan(&mut self, step_name: &str, temporary: TemporaryProductionPlan) {
        for data in temporary.process_state_data {
            self.add_process_state_data(step_name, data);
        }
        for entry in temporary.stream_entries {
            self.add_stream_entry(entry);
        }
        for entry in temporary.storage_entries {
            let commodity = entry.commodity.clone();
            self.add_list_of_storage_entries(step_name, &commodity, [entry]);
        }
    }

    // -- reads --

    pub fn process_state_data(&self, step_name: &str) -> &[ProcessStateData] {
        self.process_step_production_plan
            .get(step_name)
            .map_or(&[], Vec::as_slice)
    }

    pub fn stream_entries(&self, stream_name: &str) -> &[StreamProductionPlanEntry] {
        self.stream_production_plan
            .get(stream_name)
            .map_or(&[], Vec::as_slice)
    }

    pub fn storage_entries(&self, node_name: &str, commodity: &Commodity) -> &[StorageEntry] {
        self.storage_production_plan
            .get(node_name)
            .and_then(|by_commodity| by_commodity.get(commodity.name()))
            .map_or(&[], Vec::as_slice)
    }

    pub fn order_deliveries(&self, sink_name: &str) -> &[OrderDelivery] {
        self.order_deliveries
            .get(sink_name)
            .map_or(&[], Vec::as_slice)
    }

    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.process_step_production_plan.keys().map(String::as_str)
    }

    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.stream_production_plan.keys().map(String::as_str)
    }

    pub fn sink_names(&self) -> impl Iterator<Item = &str> {
        self.order_deliveries.keys().map(String::as_str)
    }

    /// Every (node, commodity name, entries) storage record.
    pub fn storages(&self) -> impl Iterator<Item = (&str, &str, &[StorageEntry])> {
        self.storage_production_plan
            .iter()
            .flat_map(|(node, by_commodity)| {
                by_commodity
                    .iter()
                    .map(move |(commodity, entries)| (node.as_str(), commodity.as_str(), entries.as_slice()))
            })
    }

    /// Earliest start and latest end of the given steps and streams.
    pub fn time_span<'a>(
        &self,
        step_names: impl IntoIterator<Item = &'a str>,
        stream_names: impl IntoIterator<Item = &'a str>,
    ) -> Option<(Timestamp, Timestamp)> {
        let mut span: Option<(Timestamp, Timestamp)> = None;
        let mut widen = |start: Timestamp, end: Timestamp| {
            span = Some(match span {
                None => (start, end),
                Some((s, e)) => (s.min(start), e.max(end)),
            });
        };
        for step in step_names {
            for d in self.process_state_data(step) {
                widen(d.start_time, d.end_time);
            }
        }
        for stream in stream_names {
            for e in self.stream_entries(stream) {
                widen(e.start_time, e.end_time);
            }
        }
        span
    }

    /// Sort every list by time. Planning appends backward, readers expect
    /// forward order.
    pub fn sort_chronologically(&mut self) {
        for entries in self.process_step_production_plan.values_mut() {
            entries.sort_by_key(|d| (d.start_time, d.end_time));
        }
        for entries in self.stream_production_plan.values_mut() {
            entries.sort_by_key(|e| (e.start_time, e.end_time));
        }
        for by_commodity in self.storage_production_plan.values_mut() {
            for entries in by_commodity.values_mut() {
                entries.sort_by_key(|e| e.time);
            }
        }
        for deliveries in self.order_deliveries.values_mut() {
            deliveries.sort_by_key(|d| (d.end_time, d.order_number));
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
