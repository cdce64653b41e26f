//! Serde data file structs for model definitions.
//!
//! A model file describes commodities, streams, process steps, the chains
//! built from them and the order series to plan. Quantities are plain
//! floats here and become fixed-point values when the loader resolves the
//! model. Timestamps use `YYYY-MM-DD HH:MM:SS`.

use serde::Deserialize;

// ===========================================================================
// Model
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ModelData {
    pub commodities: Vec<CommodityData>,
    pub streams: Vec<StreamData>,
    #[serde(default)]
    pub steps: Vec<StepData>,
    pub chains: Vec<ChainData>,
    #[serde(default)]
    pub orders: Vec<OrderSeriesData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommodityData {
    pub name: String,
}

// ===========================================================================
// Streams
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct StreamData {
    pub name: String,
    pub from: String,
    pub to: String,
    pub commodity: String,
    pub kind: StreamKindData,
    /// Label used in reports; defaults to `name`.
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKindData {
    Batch {
        delay_minutes: i64,
        #[serde(default)]
        maximum_batch_mass: Option<f64>,
    },
    /// Rates in mass per hour.
    Continuous { minimum_rate: f64, maximum_rate: f64 },
}

// ===========================================================================
// Steps
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct StepData {
    pub name: String,
    pub template: TemplateData,
    /// Commodity held in the step's storage, i.e. its input commodity.
    pub commodity: String,
    pub input_stream: String,
    pub output_stream: String,
    #[serde(default = "default_conversion_factor")]
    pub conversion_factor: f64,
    #[serde(default)]
    pub initial_storage: f64,
}

fn default_conversion_factor() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateData {
    Batch,
    BatchWithProcessing { processing_minutes: i64 },
    BatchWithStorage,
    Continuous,
}

// ===========================================================================
// Chains
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ChainData {
    pub name: String,
    /// Nodes from the supplying end to the demanding end.
    pub nodes: Vec<ChainNodeData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainNodeData {
    Source {
        name: String,
        commodity: String,
    },
    Sink {
        name: String,
        commodity: String,
        input_stream: String,
    },
    /// Reference to an entry of `steps`. Each step belongs to one chain.
    Step(String),
    StorageSupplier {
        name: String,
        commodity: String,
        #[serde(default)]
        initial_level: f64,
    },
    StorageReceiver {
        name: String,
        commodity: String,
        input_stream: String,
        #[serde(default)]
        initial_level: f64,
    },
}

// ===========================================================================
// Orders
// ===========================================================================

/// A uniform order series, distributed over the chains whose sink takes
/// `commodity`.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderSeriesData {
    pub commodity: String,
    pub order_mass: f64,
    pub number_of_orders: u64,
    pub first_deadline: String,
    #[serde(default)]
    pub deadline_spacing_minutes: i64,
    /// Continues the numbering of earlier series of the same commodity
    /// when absent.
    #[serde(default)]
    pub first_order_number: Option<u64>,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_kinds_ron() {
        let ron = r#"[
            (name: "ore", from: "mine", to: "mill", commodity: "ore",
             kind: batch(delay_minutes: 20)),
            (name: "steel", from: "mill", to: "yard", commodity: "steel",
             kind: continuous(minimum_rate: 10.0, maximum_rate: 300.0),
             display_name: Some("Steel")),
        ]"#;
        let streams: Vec<StreamData> = ron::from_str(ron).unwrap();
        assert!(matches!(
            streams[0].kind,
            StreamKindData::Batch { delay_minutes: 20, maximum_batch_mass: None }
        ));
        assert!(matches!(streams[1].kind, StreamKindData::Continuous { .. }));
        assert_eq!(streams[1].display_name.as_deref(), Some("Steel"));
    }

    #[test]
    fn step_defaults() {
        let step: StepData = serde_json::from_str(
            r#"{"name": "mill", "template": "batch", "commodity": "ore",
                "input_stream": "ore", "output_stream": "steel"}"#,
        )
        .unwrap();
        assert!(matches!(step.template, TemplateData::Batch));
        assert_eq!(step.conversion_factor, 1.0);
        assert_eq!(step.initial_storage, 0.0);
    }

    #[test]
    fn processing_template_json() {
        let template: TemplateData =
            serde_json::from_str(r#"{"batch_with_processing": {"processing_minutes": 30}}"#).unwrap();
        assert!(matches!(
            template,
            TemplateData::BatchWithProcessing { processing_minutes: 30 }
        ));
    }

    #[test]
    fn chain_nodes_toml() {
        let toml = r#"
name = "line"
nodes = [
    { source = { name = "mine", commodity = "ore" } },
    { step = "mill" },
    { sink = { name = "yard", commodity = "steel", input_stream = "steel" } },
]
"#;
        let chain: ChainData = toml::from_str(toml).unwrap();
        assert_eq!(chain.nodes.len(), 3);
        assert!(matches!(&chain.nodes[1], ChainNodeData::Step(name) if name == "mill"));
    }

    #[test]
    fn order_series_defaults() {
        let series: OrderSeriesData = serde_json::from_str(
            r#"{"commodity": "steel", "order_mass": 100.0, "number_of_orders": 1,
                "first_deadline": "2024-01-01 12:00:00"}"#,
        )
        .unwrap();
        assert_eq!(series.deadline_spacing_minutes, 0);
        assert_eq!(series.first_order_number, None);
    }
}
