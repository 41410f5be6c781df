//! Conditions on elements.

use serde::{Deserialize, Serialize};

use super::{Condition, Instance, Requirement};
use crate::model::*;
use crate::storage::StorageBackend;
use crate::{Graph, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementCondition {
    pub element: Option<NodeId>,
    pub quantity: Option<QuantityCondition>,
    pub symbol: Requirement<String>,
    pub atomic_number: Requirement<i64, ValueSign>,
}

impl ElementCondition {
    /// Any element that is, or descends from, `element`.
    pub fn of(element: NodeId) -> Self {
        Self { element: Some(element), ..Self::default() }
    }

    pub fn with_quantity(mut self, sign: ValueSign, value: f64) -> Self {
        self.quantity = Some(QuantityCondition::new(sign, value));
        self
    }

    pub fn with_symbol(mut self, sign: EqualitySign, symbol: impl Into<String>) -> Self {
        self.symbol = Requirement::new(sign, symbol.into());
        self
    }

    pub fn with_atomic_number(mut self, sign: ValueSign, atomic_number: i64) -> Self {
        self.atomic_number = Requirement::new(sign, atomic_number);
        self
    }
}

impl Condition for ElementCondition {
    const FAMILY: Family = Family::Element;

    fn reference(&self) -> Option<NodeId> {
        self.element
    }

    fn quantity(&self) -> Option<&QuantityCondition> {
        self.quantity.as_ref()
    }

    fn attributes_match<B: StorageBackend>(&self, graph: &Graph<B>, instance: &Instance) -> Result<bool> {
        Ok(self.symbol.check(|| graph.symbol(instance.class))?
            && self.atomic_number.check(|| graph.atomic_number(instance.class))?)
    }
}
