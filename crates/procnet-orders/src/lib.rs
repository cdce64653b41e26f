//! Order generation and distribution.
//!
//! An [`OrderGenerator`] describes a uniform series of production orders:
//! equal masses of one commodity with deadlines a fixed interval apart.
//! The [`OrderDistributor`] splits a collection round-robin over the chains
//! whose sink takes that commodity and hands each chain its share.
//!
//! Order numbers are unique over the whole series, so a chain's share keeps
//! the numbers it was generated with.

use std::collections::BTreeMap;

use chrono::TimeDelta;
use procnet_core::chain::ProcessChain;
use procnet_core::commodity::Commodity;
use procnet_core::enterprise::Enterprise;
use procnet_core::error::ConfigurationError;
use procnet_core::fixed::{Fixed64, Mass};
use procnet_core::node::ProcessNode;
use procnet_core::order::{OrderCollection, ProductionOrder};
use procnet_core::time::{Timestamp, duration_millis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("order series is invalid: {0}")]
    InvalidSeries(String),
    #[error("orders mix commodities '{first}' and '{second}'")]
    MixedCommodities { first: String, second: String },
    #[error("no chain ends in a sink taking '{0}'")]
    NoMatchingChain(String),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// A uniform series of orders. The first deadline belongs to order number
/// `first_order_number`, each following one is `deadline_spacing` later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderGenerator {
    pub commodity: Commodity,
    pub order_mass: Mass,
    pub number_of_orders: u64,
    pub first_deadline: Timestamp,
    #[serde(with = "duration_millis")]
    pub deadline_spacing: TimeDelta,
    #[serde(default = "default_first_order_number")]
    pub first_order_number: u64,
}

fn default_first_order_number() -> u64 {
    1
}

impl OrderGenerator {
    pub fn new(
        commodity: Commodity,
        order_mass: Mass,
        number_of_orders: u64,
        first_deadline: Timestamp,
        deadline_spacing: TimeDelta,
    ) -> Self {
        Self {
            commodity,
            order_mass,
            number_of_orders,
            first_deadline,
            deadline_spacing,
            first_order_number: default_first_order_number(),
        }
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        if self.order_mass <= Fixed64::ZERO {
            return Err(OrderError::InvalidSeries(format!(
                "order mass must be positive, got {}",
                self.order_mass
            )));
        }
        if self.number_of_orders > 1 && self.deadline_spacing <= TimeDelta::zero() {
            return Err(OrderError::InvalidSeries(
                "deadline spacing must be positive for more than one order".into(),
            ));
        }
        Ok(())
    }

    /// Build the series.
    pub fn generate(&self) -> Result<OrderCollection, OrderError> {
        self.validate()?;
        let mut orders = OrderCollection::default();
        let mut deadline = self.first_deadline;
        for i in 0..self.number_of_orders {
            orders.push(ProductionOrder::new(
                self.first_order_number + i,
                self.commodity.clone(),
                self.order_mass,
                deadline,
            ));
            deadline = deadline
                .checked_add_signed(self.deadline_spacing)
                .ok_or_else(|| OrderError::InvalidSeries(format!("deadline overflows after order {i}")))?;
        }
        debug!(
            commodity = %self.commodity,
            count = self.number_of_orders,
            "order series generated"
        );
        Ok(orders)
    }
}

// ---------------------------------------------------------------------------
// Distributor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderDistributor;

impl OrderDistributor {
    pub fn new() -> Self {
        Self
    }

    /// Chains ending in a sink that takes `commodity`, in the given order.
    pub fn matching_chains<'a>(
        chains: impl IntoIterator<Item = &'a ProcessChain>,
        commodity: &Commodity,
    ) -> Vec<&'a str> {
        chains
            .into_iter()
            .filter(|chain| {
                matches!(chain.demand_node(), Some(node @ ProcessNode::Sink(_)) if node.commodity() == Some(commodity))
            })
            .map(ProcessChain::name)
            .collect()
    }

    /// Split `orders` over the matching chains. Orders are dealt out by
    /// ascending deadline, so every chain gets deadlines spread over the
    /// whole series.
    pub fn distribute<'a>(
        &self,
        orders: &OrderCollection,
        chains: impl IntoIterator<Item = &'a ProcessChain>,
    ) -> Result<BTreeMap<String, OrderCollection>, OrderError> {
        let Some(commodity) = orders.commodity() else {
            return Ok(BTreeMap::new());
        };
        if let Some(other) = orders.orders().iter().find(|o| &o.commodity != commodity) {
            return Err(OrderError::MixedCommodities {
                first: commodity.name().to_string(),
                second: other.commodity.name().to_string(),
            });
        }
        let targets = Self::matching_chains(chains, commodity);
        if targets.is_empty() {
            return Err(OrderError::NoMatchingChain(commodity.name().to_string()));
        }

        let mut sorted: Vec<&ProductionOrder> = orders.orders().iter().collect();
        sorted.sort_by_key(|o| (o.production_deadline, o.order_number));

        let mut shares: BTreeMap<String, OrderCollection> = BTreeMap::new();
        for (i, order) in sorted.into_iter().enumerate() {
            let chain = targets[i % targets.len()];
            shares
                .entry(chain.to_string())
                .or_default()
                .push(order.clone());
        }
        Ok(shares)
    }

    /// Distribute `orders` over the enterprise's chains and hand every chain
    /// its share, replacing any orders it had.
    pub fn assign(&self, enterprise: &mut Enterprise, orders: &OrderCollection) -> Result<usize, OrderError> {
        let shares = self.distribute(orders, enterprise.chains())?;
        for (name, share) in &shares {
            let chain = enterprise
                .chain_mut(name)
                .ok_or_else(|| OrderError::NoMatchingChain(name.clone()))?;
            info!(chain = %name, orders = share.len(), "orders assigned");
            chain.set_orders(share.clone())?;
        }
        Ok(shares.len())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use procnet_core::config::SimulationConfig;
    use procnet_core::node::{Sink, Source};
    use procnet_core::stream::StreamHandler;
    use procnet_core::test_utils::*;

    fn series(count: u64) -> OrderGenerator {
        OrderGenerator::new(steel(), mass(100.0), count, ts("2024-01-01 10:00:00"), TimeDelta::hours(2))
    }

    #[test]
    fn uniform_series() {
        let orders = series(3).generate().unwrap();
        let deadlines: Vec<_> = orders.orders().iter().map(|o| o.production_deadline).collect();
        assert_eq!(
            deadlines,
            vec![ts("2024-01-01 10:00:00"), ts("2024-01-01 12:00:00"), ts("2024-01-01 14:00:00")]
        );
        assert_eq!(orders.target_mass(), mass(300.0));
        assert_eq!(orders.orders()[2].order_number, 3);
    }

    #[test]
    fn numbering_starts_where_asked() {
        let mut generator = series(2);
        generator.first_order_number = 10;
        let numbers: Vec<u64> = generator.generate().unwrap().orders().iter().map(|o| o.order_number).collect();
        assert_eq!(numbers, vec![10, 11]);
    }

    #[test]
    fn non_positive_mass_rejected() {
        let mut generator = series(1);
        generator.order_mass = mass(0.0);
        assert!(matches!(generator.generate(), Err(OrderError::InvalidSeries(_))));
    }

    #[test]
    fn zero_spacing_rejected_for_several_orders() {
        let mut generator = series(2);
        generator.deadline_spacing = TimeDelta::zero();
        assert!(generator.generate().is_err());
        generator.number_of_orders = 1;
        assert!(generator.generate().is_ok());
    }

    #[test]
    fn generator_serializes_spacing_in_millis() {
        let mut generator = series(2);
        generator.deadline_spacing = TimeDelta::minutes(30);
        let json = serde_json::to_string(&generator).unwrap();
        assert!(json.contains("\"deadline_spacing\":1800000"));
        let restored: OrderGenerator = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, generator);
    }

    #[test]
    fn round_robin_by_deadline() {
        let a = batch_chain("a", 0.0);
        let b = batch_chain("b", 0.0);
        let orders = series(5).generate().unwrap();
        let shares = OrderDistributor::new().distribute(&orders, [&a, &b]).unwrap();
        let numbers = |name: &str| -> Vec<u64> {
            shares[name].orders().iter().map(|o| o.order_number).collect()
        };
        assert_eq!(numbers("a"), vec![1, 3, 5]);
        assert_eq!(numbers("b"), vec![2, 4]);
    }

    #[test]
    fn chains_of_other_commodities_are_skipped() {
        let steel_chain = batch_chain("steel-line", 0.0);
        let mut streams = StreamHandler::new();
        streams
            .add_stream(make_batch_stream("ore", "mine", "dump", ore(), 10, None))
            .unwrap();
        let ore_chain = ProcessChain::linear(
            "ore-line",
            streams,
            [Source::new("mine", ore()).into(), Sink::new("dump", ore(), "ore").into()],
        )
        .unwrap();
        assert_eq!(
            OrderDistributor::matching_chains([&ore_chain, &steel_chain], &steel()),
            vec!["steel-line"]
        );
        let shares = OrderDistributor::new()
            .distribute(&series(2).generate().unwrap(), [&ore_chain, &steel_chain])
            .unwrap();
        assert_eq!(shares.len(), 1);
        assert_eq!(shares["steel-line"].len(), 2);
    }

    #[test]
    fn no_matching_chain() {
        let chain = batch_chain("a", 0.0);
        let orders: OrderCollection = [ProductionOrder::new(1, ore(), mass(1.0), ts("2024-01-01 10:00:00"))]
            .into_iter()
            .collect();
        assert_eq!(
            OrderDistributor::new().distribute(&orders, [&chain]),
            Err(OrderError::NoMatchingChain("ore".into()))
        );
    }

    #[test]
    fn mixed_commodities_rejected() {
        let chain = batch_chain("a", 0.0);
        let orders: OrderCollection = [
            ProductionOrder::new(1, steel(), mass(1.0), ts("2024-01-01 10:00:00")),
            ProductionOrder::new(2, ore(), mass(1.0), ts("2024-01-01 11:00:00")),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            OrderDistributor::new().distribute(&orders, [&chain]),
            Err(OrderError::MixedCommodities { .. })
        ));
    }

    #[test]
    fn assign_hands_orders_to_sinks() {
        let mut enterprise = Enterprise::new(SimulationConfig::default()).unwrap();
        enterprise.add_chain(batch_chain("a", 0.0)).unwrap();
        let assigned = OrderDistributor::new()
            .assign(&mut enterprise, &series(2).generate().unwrap())
            .unwrap();
        assert_eq!(assigned, 1);
        let chain = &enterprise.chains()[0];
        let Some(ProcessNode::Sink(sink)) = chain.demand_node() else {
            panic!("chain must end in a sink");
        };
        assert_eq!(sink.orders().len(), 2);
    }
}
