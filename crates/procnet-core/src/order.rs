//! Production orders handed to sinks.

use serde::{Deserialize, Serialize};

use crate::commodity::Commodity;
use crate::fixed::{Fixed64, Mass};
use crate::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionOrder {
    pub production_target: Mass,
    pub production_deadline: Timestamp,
    pub order_number: u64,
    pub commodity: Commodity,
    #[serde(default)]
    pub produced_mass: Mass,
}

impl ProductionOrder {
    pub fn new(order_number: u64, commodity: Commodity, production_target: Mass, production_deadline: Timestamp) -> Self {
        Self {
            production_target,
            production_deadline,
            order_number,
            commodity,
            produced_mass: Fixed64::ZERO,
        }
    }

    pub fn remaining_mass(&self) -> Mass {
        self.production_target - self.produced_mass
    }

    pub fn is_fulfilled(&self) -> bool {
        self.remaining_mass() <= Fixed64::ZERO
    }
}

/// All orders of one commodity handed to one sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCollection {
    orders: Vec<ProductionOrder>,
}

impl OrderCollection {
    pub fn new(orders: Vec<ProductionOrder>) -> Self {
        Self { orders }
    }

    pub fn push(&mut self, order: ProductionOrder) {
        self.orders.push(order);
    }

    /// Sum of all production targets.
    pub fn target_mass(&self) -> Mass {
        self.orders
            .iter()
            .fold(Fixed64::ZERO, |acc, o| acc + o.production_target)
    }

    pub fn commodity(&self) -> Option<&Commodity> {
        self.orders.first().map(|o| &o.commodity)
    }

    pub fn orders(&self) -> &[ProductionOrder] {
        &self.orders
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn has_unfulfilled_orders(&self) -> bool {
        self.orders.iter().any(|o| !o.is_fulfilled())
    }

    /// The unfulfilled order to plan next: latest deadline first, ties broken
    /// by the higher order number.
    pub fn next_unfulfilled(&self) -> Option<&ProductionOrder> {
        self.orders
            .iter()
            .filter(|o| !o.is_fulfilled())
            .max_by_key(|o| (o.production_deadline, o.order_number))
    }

    pub fn get_mut(&mut self, order_number: u64) -> Option<&mut ProductionOrder> {
        self.orders.iter_mut().find(|o| o.order_number == order_number)
    }
}

impl FromIterator<ProductionOrder> for OrderCollection {
    fn from_iter<I: IntoIterator<Item = ProductionOrder>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
