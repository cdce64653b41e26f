//! Enterprise runs fed by the order generator.

use chrono::TimeDelta;
use procnet_core::chain::ProcessChain;
use procnet_core::config::SimulationConfig;
use procnet_core::energy::NoEnergyData;
use procnet_core::enterprise::Enterprise;
use procnet_core::error::PlanningError;
use procnet_core::petri_net::PetriNetTemplate;
use procnet_core::test_utils::*;
use procnet_orders::{OrderDistributor, OrderGenerator};

fn run(chain: ProcessChain, series: OrderGenerator, config: SimulationConfig) -> Enterprise {
    let mut enterprise = Enterprise::new(config).unwrap();
    enterprise.add_chain(chain).unwrap();
    let orders = series.generate().unwrap();
    OrderDistributor::new().assign(&mut enterprise, &orders).unwrap();
    enterprise
}

fn steel_series(count: u64, first: &str, spacing_minutes: i64) -> OrderGenerator {
    OrderGenerator::new(steel(), mass(100.0), count, ts(first), TimeDelta::minutes(spacing_minutes))
}

fn delivery_ends(enterprise: &Enterprise) -> Vec<String> {
    let mut ends: Vec<_> = enterprise
        .plan()
        .order_deliveries("yard")
        .iter()
        .map(|d| d.end_time)
        .collect();
    ends.sort();
    ends.iter().map(|t| t.format("%H:%M").to_string()).collect()
}

#[test]
fn spaced_orders_meet_their_deadlines() {
    let mut enterprise = run(
        batch_chain("line", 0.0),
        steel_series(3, "2024-01-01 10:00:00", 120),
        SimulationConfig::default(),
    );
    let report = enterprise.plan_all(&mut NoEnergyData).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.planned[0].start, Some(ts("2024-01-01 09:00:00")));
    assert_eq!(report.planned[0].end, Some(ts("2024-01-01 14:00:00")));
    assert_eq!(delivery_ends(&enterprise), vec!["10:00", "12:00", "14:00"]);

    let validation = enterprise.validate();
    assert!(validation.is_valid(), "{:?}", validation.violations);
}

#[test]
fn crowded_series_is_pulled_forward() {
    let mut enterprise = run(
        batch_chain("line", 0.0),
        steel_series(3, "2024-01-01 12:00:00", 10),
        SimulationConfig::default(),
    );
    enterprise.plan_all(&mut NoEnergyData).unwrap();
    // One batch takes an hour: twenty minutes of input, forty of output.
    assert_eq!(delivery_ends(&enterprise), vec!["10:20", "11:20", "12:20"]);
    assert!(enterprise.validate().is_valid());
}

#[test]
fn storage_covers_latest_orders() {
    let mut enterprise = run(
        storage_chain("line", 250.0),
        steel_series(3, "2024-01-01 10:00:00", 120),
        SimulationConfig::default(),
    );
    enterprise.plan_all(&mut NoEnergyData).unwrap();
    let ore = enterprise.plan().stream_entries("ore");
    assert_eq!(ore.len(), 1);
    assert_eq!(ore[0].mass, mass(50.0));
    let validation = enterprise.validate();
    assert!(validation.is_valid(), "{:?}", validation.violations);
}

#[test]
fn non_convergence_is_reported_and_rolled_back() {
    let chain = linear_chain(
        "line",
        PetriNetTemplate::Batch,
        make_batch_stream("ore", "mine", "mill", ore(), 20, Some(1.0)),
        make_batch_stream("steel", "mill", "yard", steel(), 40, None),
        0.0,
    );
    let config = SimulationConfig {
        max_number_of_iterations: Some(50),
        ..SimulationConfig::default()
    };
    let mut enterprise = run(chain, steel_series(1, "2024-01-01 12:00:00", 0), config);
    let report = enterprise.plan_all(&mut NoEnergyData).unwrap();

    assert!(report.planned.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].iterations, 51);
    assert!(matches!(
        report.failed[0].error,
        PlanningError::NonConvergence { iterations: 51, .. }
    ));
    assert!(enterprise.plan().process_state_data("mill").is_empty());
    assert!(enterprise.plan().stream_entries("ore").is_empty());
}

#[test]
fn snapshot_restores_the_plan() {
    let mut planned = run(
        batch_chain("line", 0.0),
        steel_series(2, "2024-01-01 10:00:00", 120),
        SimulationConfig::default(),
    );
    planned.plan_all(&mut NoEnergyData).unwrap();
    let bytes = planned.snapshot().unwrap();

    let mut fresh = Enterprise::new(SimulationConfig::default()).unwrap();
    fresh.add_chain(batch_chain("line", 0.0)).unwrap();
    fresh.restore(&bytes).unwrap();
    assert_eq!(fresh.plan(), planned.plan());
    assert!(fresh.to_json().unwrap().contains("\"yard\""));
}
