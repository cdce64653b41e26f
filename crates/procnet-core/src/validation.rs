//! Executable invariants of a finished production plan.
//!
//! Each check inspects the plan on its own and returns the violations it
//! found. [`validate_plan`] runs all of them.

use crate::commodity::Commodity;
use crate::fixed::{Fixed64, Mass, checked_add_64, checked_div_64};
use crate::plan::ProductionPlan;
use crate::storage::Storage;
use crate::time::Timestamp;

// ---------------------------------------------------------------------------
// Violation types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanViolation {
    #[error("step '{step}' has no state between {end} and {next_start}")]
    TimelineGap {
        step: String,
        end: Timestamp,
        next_start: Timestamp,
    },
    #[error("step '{step}' has overlapping states ending {end} and starting {next_start}")]
    TimelineOverlap {
        step: String,
        end: Timestamp,
        next_start: Timestamp,
    },
    #[error("stream '{stream}' transfers overlap at {at}")]
    StreamOverlap { stream: String, at: Timestamp },
    #[error("step '{step}' consumed {input} for {output} (factor {factor}) with storage change {storage_change}")]
    MassImbalance {
        step: String,
        input: Mass,
        output: Mass,
        factor: Fixed64,
        storage_change: Mass,
    },
    #[error("mass totals of step '{step}' leave the representable range")]
    MassOverflow { step: String },
    #[error("order {order_number} at '{sink}' delivered at {end_time}, after its deadline {deadline}")]
    DeadlineMissed {
        sink: String,
        order_number: u64,
        end_time: Timestamp,
        deadline: Timestamp,
    },
    #[error("storage '{node}' of {commodity} drops to {level} at {time}")]
    StorageUnderflow {
        node: String,
        commodity: Commodity,
        time: Timestamp,
        level: Mass,
    },
}

/// Mass balance parameters of one step, as needed by
/// [`check_mass_conservation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepBalance {
    pub step: String,
    pub input_stream: String,
    pub output_stream: String,
    pub factor: Fixed64,
    pub commodity: Commodity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub violations: Vec<PlanViolation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Every step's states, in time order, form one gapless sequence.
pub fn check_time_ordering(plan: &ProductionPlan) -> Vec<PlanViolation> {
    let mut violations = Vec::new();
    for step in plan.step_names() {
        let mut states: Vec<_> = plan.process_state_data(step).iter().collect();
        states.sort_by_key(|s| (s.start_time, s.end_time));
        for pair in states.windows(2) {
            let (end, next_start) = (pair[0].end_time, pair[1].start_time);
            if end < next_start {
                violations.push(PlanViolation::TimelineGap {
                    step: step.to_string(),
                    end,
                    next_start,
                });
            } else if end > next_start {
                violations.push(PlanViolation::TimelineOverlap {
                    step: step.to_string(),
                    end,
                    next_start,
                });
            }
        }
    }
    violations
}

/// Transfers on one stream never overlap.
pub fn check_stream_ordering(plan: &ProductionPlan) -> Vec<PlanViolation> {
    let mut violations = Vec::new();
    for stream in plan.stream_names() {
        let mut entries: Vec<_> = plan.stream_entries(stream).iter().collect();
        entries.sort_by_key(|e| (e.start_time, e.end_time));
        for pair in entries.windows(2) {
            if pair[0].end_time > pair[1].start_time {
                violations.push(PlanViolation::StreamOverlap {
                    stream: stream.to_string(),
                    at: pair[1].start_time,
                });
            }
        }
    }
    violations
}

/// Input consumed equals output produced divided by the conversion factor,
/// corrected by the step's net storage change. Totals that overflow are
/// reported as [`PlanViolation::MassOverflow`].
pub fn check_mass_conservation(
    balance: &StepBalance,
    plan: &ProductionPlan,
    tolerance: Mass,
) -> Option<PlanViolation> {
    let overflow = || PlanViolation::MassOverflow {
        step: balance.step.clone(),
    };
    let sum = |stream: &str| {
        plan.stream_entries(stream)
            .iter()
            .try_fold(Fixed64::ZERO, |acc, e| checked_add_64(acc, e.mass))
    };
    let (Some(input), Some(output)) = (sum(&balance.input_stream), sum(&balance.output_stream)) else {
        return Some(overflow());
    };
    let Some(storage_change) = plan
        .storage_entries(&balance.step, &balance.commodity)
        .iter()
        .try_fold(Fixed64::ZERO, |acc, e| checked_add_64(acc, e.mass_change))
    else {
        return Some(overflow());
    };
    let Some(residual) = checked_div_64(output, balance.factor)
        .and_then(|required| input.checked_sub(required))
        .and_then(|r| r.checked_sub(storage_change))
    else {
        return Some(overflow());
    };
    (residual.abs() > tolerance).then(|| PlanViolation::MassImbalance {
        step: balance.step.clone(),
        input,
        output,
        factor: balance.factor,
        storage_change,
    })
}

/// No delivery ends after its order's deadline.
pub fn check_deadlines(plan: &ProductionPlan) -> Vec<PlanViolation> {
    plan.sink_names()
        .flat_map(|sink| {
            plan.order_deliveries(sink)
                .iter()
                .filter(|d| d.end_time > d.deadline)
                .map(move |d| PlanViolation::DeadlineMissed {
                    sink: sink.to_string(),
                    order_number: d.order_number,
                    end_time: d.end_time,
                    deadline: d.deadline,
                })
        })
        .collect()
}

/// Forward levels of each storage stay above its negative tolerance.
pub fn check_storage_levels(plan: &ProductionPlan, storages: &[Storage]) -> Vec<PlanViolation> {
    let mut violations = Vec::new();
    for storage in storages {
        let entries = plan.storage_entries(&storage.node_name, &storage.commodity);
        for level in storage.check_levels(entries) {
            violations.push(PlanViolation::StorageUnderflow {
                node: storage.node_name.clone(),
                commodity: storage.commodity.clone(),
                time: level.time,
                level: level.level,
            });
        }
    }
    violations
}

/// Run every check.
pub fn validate_plan(
    plan: &ProductionPlan,
    balances: &[StepBalance],
    storages: &[Storage],
    tolerance: Mass,
) -> ValidationReport {
    let mut violations = check_time_ordering(plan);
    violations.extend(check_stream_ordering(plan));
    violations.extend(
        balances
            .iter()
            .filter_map(|b| check_mass_conservation(b, plan, tolerance)),
    );
    violations.extend(check_deadlines(plan));
    violations.extend(check_storage_levels(plan, storages));
    ValidationReport { violations }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{OrderDelivery, ProcessStateData, StreamProductionPlanEntry};
    use crate::test_utils::*;

    fn entry(stream: &str, start: &str, end: &str, m: f64) -> StreamProductionPlanEntry {
        StreamProductionPlanEntry {
            stream_name: stream.into(),
            commodity: ore(),
            start_time: ts(start),
            end_time: ts(end),
            mass: mass(m),
            operation_rate: None,
        }
    }

    fn balance() -> StepBalance {
        StepBalance {
            step: "mill".into(),
            input_stream: "ore".into(),
            output_stream: "steel".into(),
            factor: mass(0.5),
            commodity: ore(),
        }
    }

    #[test]
    fn gap_and_overlap_are_reported() {
        let mut plan = ProductionPlan::new();
        plan.add_process_state_data("mill", ProcessStateData::new("Input", ts("2024-01-01 10:00:00"), ts("2024-01-01 11:00:00")));
        plan.add_process_state_data("mill", ProcessStateData::new("Output", ts("2024-01-01 11:30:00"), ts("2024-01-01 12:00:00")));
        plan.add_process_state_data("mill", ProcessStateData::new("Idle", ts("2024-01-01 11:45:00"), ts("2024-01-01 13:00:00")));
        let violations = check_time_ordering(&plan);
        assert_eq!(violations.len(), 2);
        assert!(matches!(violations[0], PlanViolation::TimelineGap { .. }));
        assert!(matches!(violations[1], PlanViolation::TimelineOverlap { .. }));
    }

    #[test]
    fn touching_transfers_do_not_overlap() {
        let mut plan = ProductionPlan::new();
        plan.add_stream_entry(entry("ore", "2024-01-01 10:00:00", "2024-01-01 11:00:00", 1.0));
        plan.add_stream_entry(entry("ore", "2024-01-01 11:00:00", "2024-01-01 12:00:00", 1.0));
        assert!(check_stream_ordering(&plan).is_empty());
        plan.add_stream_entry(entry("ore", "2024-01-01 11:30:00", "2024-01-01 12:30:00", 1.0));
        assert_eq!(check_stream_ordering(&plan).len(), 1);
    }

    #[test]
    fn conversion_factor_and_storage_balance() {
        let mut plan = ProductionPlan::new();
        plan.add_stream_entry(entry("ore", "2024-01-01 10:00:00", "2024-01-01 11:00:00", 100.0));
        plan.add_stream_entry(entry("steel", "2024-01-01 11:00:00", "2024-01-01 12:00:00", 40.0));
        let storage = Storage::new("mill", ore(), mass(0.0), mass(0.0));
        plan.add_list_of_storage_entries(
            "mill",
            &ore(),
            [
                storage.entry(ts("2024-01-01 11:00:00"), mass(100.0), "input"),
                storage.entry(ts("2024-01-01 11:00:00"), mass(-80.0), "output"),
            ],
        );
        assert_eq!(check_mass_conservation(&balance(), &plan, mass(0.0)), None);

        plan.add_stream_entry(entry("steel", "2024-01-01 12:00:00", "2024-01-01 13:00:00", 5.0));
        assert!(matches!(
            check_mass_conservation(&balance(), &plan, mass(0.0)),
            Some(PlanViolation::MassImbalance { .. })
        ));
    }

    #[test]
    fn totals_beyond_the_mass_range_are_reported() {
        let mut plan = ProductionPlan::new();
        for hour in 0..3 {
            let start = format!("2024-01-01 {:02}:00:00", 10 + hour);
            let end = format!("2024-01-01 {:02}:00:00", 11 + hour);
            plan.add_stream_entry(entry("ore", &start, &end, 1.0e9));
        }
        assert_eq!(
            check_mass_conservation(&balance(), &plan, mass(0.0)),
            Some(PlanViolation::MassOverflow { step: "mill".into() })
        );
    }

    #[test]
    fn late_delivery_is_reported() {
        let mut plan = ProductionPlan::new();
        plan.add_order_delivery(
            "yard",
            OrderDelivery {
                order_number: 3,
                commodity: steel(),
                mass: mass(1.0),
                end_time: ts("2024-01-01 12:00:01"),
                deadline: ts("2024-01-01 12:00:00"),
            },
        );
        let violations = check_deadlines(&plan);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].to_string().contains("order 3"));
    }

    #[test]
    fn storage_underflow_is_reported() {
        let mut plan = ProductionPlan::new();
        let storage = Storage::new("buffer", ore(), mass(10.0), mass(0.0));
        plan.add_list_of_storage_entries(
            "buffer",
            &ore(),
            [storage.entry(ts("2024-01-01 11:00:00"), mass(-15.0), "pellets")],
        );
        let report = validate_plan(&plan, &[], &[storage], mass(0.0));
        assert!(!report.is_valid());
        assert!(matches!(report.violations[0], PlanViolation::StorageUnderflow { .. }));
    }
}
