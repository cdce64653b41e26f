//! Models loaded from data files and planned end to end.

use std::fs;
use std::path::{Path, PathBuf};

use procnet_core::energy::NoEnergyData;
use procnet_core::node::ProcessNode;
use procnet_data::{DataLoadError, load_enterprise};

const TWO_LINES: &str = r#"
[[commodities]]
name = "ore"

[[commodities]]
name = "steel"

[[streams]]
name = "ore_a"
from = "mine_a"
to = "mill_a"
commodity = "ore"
kind = { batch = { delay_minutes = 20 } }

[[streams]]
name = "steel_a"
from = "mill_a"
to = "yard_a"
commodity = "steel"
kind = { batch = { delay_minutes = 40 } }

[[streams]]
name = "ore_b"
from = "mine_b"
to = "mill_b"
commodity = "ore"
kind = { continuous = { minimum_rate = 10.0, maximum_rate = 600.0 } }

[[streams]]
name = "steel_b"
from = "mill_b"
to = "yard_b"
commodity = "steel"
kind = { continuous = { minimum_rate = 10.0, maximum_rate = 300.0 } }

[[steps]]
name = "mill_a"
template = "batch"
commodity = "ore"
input_stream = "ore_a"
output_stream = "steel_a"

[[steps]]
name = "mill_b"
template = "continuous"
commodity = "ore"
input_stream = "ore_b"
output_stream = "steel_b"

[[chains]]
name = "line_a"
nodes = [
    { source = { name = "mine_a", commodity = "ore" } },
    { step = "mill_a" },
    { sink = { name = "yard_a", commodity = "steel", input_stream = "steel_a" } },
]

[[chains]]
name = "line_b"
nodes = [
    { source = { name = "mine_b", commodity = "ore" } },
    { step = "mill_b" },
    { sink = { name = "yard_b", commodity = "steel", input_stream = "steel_b" } },
]

[[orders]]
commodity = "steel"
order_mass = 100.0
number_of_orders = 4
first_deadline = "2024-01-01 10:00:00"
deadline_spacing_minutes = 120
"#;

fn model_dir(suffix: &str, files: &[(&str, &str)]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("procnet_it_{suffix}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    for (name, content) in files {
        fs::write(dir.join(name), content).unwrap();
    }
    dir
}

fn cleanup(dir: &Path) {
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn orders_are_dealt_over_both_lines() {
    let dir = model_dir(
        "two_lines",
        &[("model.toml", TWO_LINES), ("config.json", r#"{"storage_tolerance": 0.001}"#)],
    );
    let mut enterprise = load_enterprise(&dir).unwrap();
    assert_eq!(enterprise.config().storage_tolerance, 0.001);

    let order_numbers = |chain: usize| -> Vec<u64> {
        let Some(ProcessNode::Sink(sink)) = enterprise.chains()[chain].demand_node() else {
            panic!("chain must end in a sink");
        };
        sink.orders().orders().iter().map(|o| o.order_number).collect()
    };
    assert_eq!(order_numbers(0), vec![1, 3]);
    assert_eq!(order_numbers(1), vec![2, 4]);

    let report = enterprise.plan_all(&mut NoEnergyData).unwrap();
    assert!(report.is_complete(), "{:?}", report.failed);
    let plan = enterprise.plan();
    for yard in ["yard_a", "yard_b"] {
        let deliveries = plan.order_deliveries(yard);
        assert_eq!(deliveries.len(), 2, "{yard}");
        assert!(deliveries.iter().all(|d| d.end_time <= d.deadline));
    }
    assert!(plan.process_state_data("mill_b").iter().any(|s| s.process_state_name == "Combined"));

    let validation = enterprise.validate();
    assert!(validation.is_valid(), "{:?}", validation.violations);
    cleanup(&dir);
}

#[test]
fn dangling_reference_is_reported_with_its_file() {
    let broken = TWO_LINES.replace(r#"{ step = "mill_b" }"#, r#"{ step = "mill_c" }"#);
    let dir = model_dir("dangling", &[("model.toml", &broken)]);
    let err = load_enterprise(&dir).unwrap_err();
    assert!(matches!(
        &err,
        DataLoadError::UnresolvedRef { name, expected_kind: "step", .. } if name == "mill_c"
    ));
    assert!(err.to_string().contains("model.toml"));
    cleanup(&dir);
}

#[test]
fn two_model_formats_conflict() {
    let dir = model_dir("conflict", &[("model.toml", TWO_LINES), ("model.json", "{}")]);
    assert!(matches!(
        load_enterprise(&dir),
        Err(DataLoadError::ConflictingFormats { .. })
    ));
    cleanup(&dir);
}
