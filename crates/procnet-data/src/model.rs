//! Resolution pipeline: turns [`ModelData`] into a ready-to-plan
//! [`Enterprise`].
//!
//! Resolution order is commodities, streams, steps, chains, orders. Every
//! name is checked against what was resolved before it, so the first
//! dangling reference is reported with the file it came from.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use chrono::TimeDelta;
use procnet_core::chain::ProcessChain;
use procnet_core::commodity::Commodity;
use procnet_core::config::SimulationConfig;
use procnet_core::enterprise::Enterprise;
use procnet_core::error::ConfigurationError;
use procnet_core::fixed::{Fixed64, Mass, checked_f64_to_fixed64};
use procnet_core::node::{ProcessChainStorage, ProcessNode, ProcessStep, Sink, Source};
use procnet_core::order::OrderCollection;
use procnet_core::petri_net::PetriNetTemplate;
use procnet_core::stream::{BatchStream, ContinuousStream, Stream, StreamHandler, StreamStaticData};
use procnet_core::time::parse_timestamp;
use procnet_orders::{OrderDistributor, OrderError, OrderGenerator};
use tracing::{debug, info};

use crate::loader::{DataFile, DataLoadError, Resolver, deserialize_file};
use crate::schema::{ChainNodeData, ModelData, OrderSeriesData, StepData, StreamKindData, TemplateData};

/// Read a [`SimulationConfig`]. Missing fields keep their defaults.
pub fn load_simulation_config(path: &Path) -> Result<SimulationConfig, DataLoadError> {
    deserialize_file(path)
}

pub fn load_model_data(path: &Path) -> Result<ModelData, DataLoadError> {
    deserialize_file(path)
}

/// Load `model.{ron,toml,json}` and the optional `config.{ron,toml,json}`
/// from `dir` and build the enterprise they describe.
pub fn load_enterprise(dir: &Path) -> Result<Enterprise, DataLoadError> {
    let config = match DataFile::Config.locate(dir)? {
        Some(path) => load_simulation_config(&path)?,
        None => SimulationConfig::default(),
    };
    let model_path = DataFile::Model.require(dir)?;
    let model = load_model_data(&model_path)?;
    build_enterprise(&model, config, &model_path)
}

/// Resolve `model` into an enterprise. `file` only labels errors.
pub fn build_enterprise(
    model: &ModelData,
    config: SimulationConfig,
    file: &Path,
) -> Result<Enterprise, DataLoadError> {
    let names = Resolver::new(file);
    let planning = |source: ConfigurationError| names.planning(source);
    let tolerance = config.storage_tolerance_mass().map_err(planning)?;

    let mut commodities: HashMap<String, Commodity> = HashMap::new();
    for c in &model.commodities {
        names.ensure_unique(&commodities, &c.name)?;
        commodities.insert(c.name.clone(), Commodity::new(&c.name));
    }

    let mut streams: HashMap<String, Stream> = HashMap::new();
    for s in &model.streams {
        names.ensure_unique(&streams, &s.name)?;
        let commodity = names.resolve(&commodities, &s.commodity, "commodity")?.clone();
        let static_data = StreamStaticData {
            name: s.name.clone(),
            start_process_step_name: s.from.clone(),
            end_process_step_name: s.to.clone(),
            commodity,
            display_name: s.display_name.clone().unwrap_or_else(|| s.name.clone()),
        };
        let stream = match s.kind {
            StreamKindData::Batch {
                delay_minutes,
                maximum_batch_mass,
            } => Stream::Batch(BatchStream {
                static_data,
                delay: to_minutes(delay_minutes, "delay_minutes", names)?,
                maximum_batch_mass: maximum_batch_mass
                    .map(|m| to_fixed(m, "maximum_batch_mass", names))
                    .transpose()?,
            }),
            StreamKindData::Continuous {
                minimum_rate,
                maximum_rate,
            } => Stream::Continuous(ContinuousStream {
                static_data,
                minimum_operation_rate: to_fixed(minimum_rate, "minimum_rate", names)?,
                maximum_operation_rate: to_fixed(maximum_rate, "maximum_rate", names)?,
            }),
        };
        streams.insert(s.name.clone(), stream);
    }

    let mut steps: HashMap<String, &StepData> = HashMap::new();
    for step in &model.steps {
        names.ensure_unique(&steps, &step.name)?;
        names.resolve(&commodities, &step.commodity, "commodity")?;
        names.resolve(&streams, &step.input_stream, "stream")?;
        names.resolve(&streams, &step.output_stream, "stream")?;
        steps.insert(step.name.clone(), step);
    }

    let mut enterprise = Enterprise::new(config).map_err(planning)?;
    let mut placed_steps: HashSet<&str> = HashSet::new();
    for chain in &model.chains {
        let mut nodes: Vec<ProcessNode> = Vec::with_capacity(chain.nodes.len());
        let mut stream_names: BTreeSet<&str> = BTreeSet::new();
        for node in &chain.nodes {
            let node: ProcessNode = match node {
                ChainNodeData::Source { name, commodity } => {
                    Source::new(name, names.resolve(&commodities, commodity, "commodity")?.clone()).into()
                }
                ChainNodeData::Sink {
                    name,
                    commodity,
                    input_stream,
                } => {
                    names.resolve(&streams, input_stream, "stream")?;
                    stream_names.insert(input_stream);
                    let commodity = names.resolve(&commodities, commodity, "commodity")?.clone();
                    Sink::new(name, commodity, input_stream).into()
                }
                ChainNodeData::Step(name) => {
                    let step = *names.resolve(&steps, name, "step")?;
                    if !placed_steps.insert(step.name.as_str()) {
                        return Err(names.duplicate(&step.name));
                    }
                    stream_names.insert(&step.input_stream);
                    stream_names.insert(&step.output_stream);
                    build_step(step, &commodities, tolerance, names)?.into()
                }
                ChainNodeData::StorageSupplier {
                    name,
                    commodity,
                    initial_level,
                } => {
                    let commodity = names.resolve(&commodities, commodity, "commodity")?.clone();
                    let level = to_fixed(*initial_level, "initial_level", names)?;
                    ProcessChainStorage::supplier(name, commodity, level, tolerance).into()
                }
                ChainNodeData::StorageReceiver {
                    name,
                    commodity,
                    input_stream,
                    initial_level,
                } => {
                    names.resolve(&streams, input_stream, "stream")?;
                    stream_names.insert(input_stream);
                    let commodity = names.resolve(&commodities, commodity, "commodity")?.clone();
                    let level = to_fixed(*initial_level, "initial_level", names)?;
                    ProcessChainStorage::receiver(name, commodity, input_stream, level, tolerance).into()
                }
            };
            nodes.push(node);
        }

        let mut handler = StreamHandler::new();
        for name in stream_names {
            let stream = names.resolve(&streams, name, "stream")?;
            handler.add_stream(stream.clone()).map_err(planning)?;
        }
        let chain = ProcessChain::linear(&chain.name, handler, nodes).map_err(planning)?;
        debug!(chain = chain.name(), nodes = chain.len(), "chain resolved");
        enterprise.add_chain(chain).map_err(planning)?;
    }

    assign_orders(&mut enterprise, &model.orders, &commodities, names)?;
    info!(
        chains = enterprise.chains().len(),
        file = %file.display(),
        "model loaded"
    );
    Ok(enterprise)
}

fn to_fixed(value: f64, field: &str, names: Resolver<'_>) -> Result<Fixed64, DataLoadError> {
    checked_f64_to_fixed64(value).ok_or_else(|| names.parse_error(format!("{field} = {value} is out of range")))
}

fn to_minutes(value: i64, field: &str, names: Resolver<'_>) -> Result<TimeDelta, DataLoadError> {
    TimeDelta::try_minutes(value).ok_or_else(|| names.parse_error(format!("{field} = {value} is out of range")))
}

fn build_step(
    step: &StepData,
    commodities: &HashMap<String, Commodity>,
    tolerance: Mass,
    names: Resolver<'_>,
) -> Result<ProcessStep, DataLoadError> {
    let template = match step.template {
        TemplateData::Batch => PetriNetTemplate::Batch,
        TemplateData::BatchWithProcessing { processing_minutes } => PetriNetTemplate::BatchWithProcessing {
            processing_time: to_minutes(processing_minutes, "processing_minutes", names)?,
        },
        TemplateData::BatchWithStorage => PetriNetTemplate::BatchWithStorage,
        TemplateData::Continuous => PetriNetTemplate::Continuous,
    };
    let commodity = names.resolve(commodities, &step.commodity, "commodity")?.clone();
    ProcessStep::from_template(
        &step.name,
        &template,
        commodity,
        to_fixed(step.conversion_factor, "conversion_factor", names)?,
        &step.input_stream,
        &step.output_stream,
        to_fixed(step.initial_storage, "initial_storage", names)?,
        tolerance,
    )
    .map_err(|source| names.planning(source))
}

/// Generate every series, merge the series per commodity and distribute
/// each commodity's orders over the chains that take it.
fn assign_orders(
    enterprise: &mut Enterprise,
    series: &[OrderSeriesData],
    commodities: &HashMap<String, Commodity>,
    names: Resolver<'_>,
) -> Result<(), DataLoadError> {
    let orders_error = |source: OrderError| names.orders(source);
    let mut by_commodity: BTreeMap<&str, OrderCollection> = BTreeMap::new();
    let mut next_number: BTreeMap<&str, u64> = BTreeMap::new();
    for s in series {
        let commodity = names.resolve(commodities, &s.commodity, "commodity")?.clone();
        let first_deadline = parse_timestamp(&s.first_deadline)
            .map_err(|e| names.parse_error(format!("deadline '{}': {e}", s.first_deadline)))?;
        let mut generator = OrderGenerator::new(
            commodity,
            to_fixed(s.order_mass, "order_mass", names)?,
            s.number_of_orders,
            first_deadline,
            to_minutes(s.deadline_spacing_minutes, "deadline_spacing_minutes", names)?,
        );
        let next = next_number.entry(s.commodity.as_str()).or_insert(1);
        generator.first_order_number = s.first_order_number.unwrap_or(*next);
        *next = generator.first_order_number + s.number_of_orders;

        let collection = by_commodity.entry(s.commodity.as_str()).or_default();
        for order in generator.generate().map_err(orders_error)?.orders() {
            collection.push(order.clone());
        }
    }

    let distributor = OrderDistributor::new();
    for orders in by_commodity.values() {
        distributor.assign(enterprise, orders).map_err(orders_error)?;
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
