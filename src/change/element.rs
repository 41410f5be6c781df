//! Changes to elements.

use serde::{Deserialize, Serialize};

use super::Change;
use crate::condition::Instance;
use crate::entity::{check_atomic_number, check_symbol};
use crate::model::*;
use crate::storage::StorageBackend;
use crate::{Graph, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementChange {
    pub element: Option<NodeId>,
    pub quantity: Option<QuantityChange>,
    pub symbol: Option<String>,
    pub atomic_number: Option<i64>,
}

impl ElementChange {
    pub fn of(element: NodeId) -> Self {
        Self { element: Some(element), ..Self::default() }
    }

    pub fn with_quantity(mut self, change: QuantityChange) -> Self {
        self.quantity = Some(change);
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_atomic_number(mut self, atomic_number: i64) -> Self {
        self.atomic_number = Some(atomic_number);
        self
    }
}

impl Change for ElementChange {
    const FAMILY: Family = Family::Element;

    fn reference(&self) -> Option<NodeId> {
        self.element
    }

    fn quantity(&self) -> Option<&QuantityChange> {
        self.quantity.as_ref()
    }

    fn check_attributes<B: StorageBackend>(&self, _graph: &Graph<B>, _instance: &Instance) -> Result<()> {
        if let Some(symbol) = &self.symbol {
            check_symbol(symbol)?;
        }
        if let Some(atomic_number) = self.atomic_number {
            check_atomic_number(atomic_number)?;
        }
        Ok(())
    }

    fn apply_attributes<B: StorageBackend>(&self, graph: &Graph<B>, instance: &Instance) -> Result<()> {
        if let Some(symbol) = &self.symbol {
            graph.set_symbol(instance.class, symbol)?;
        }
        if let Some(atomic_number) = self.atomic_number {
            graph.set_atomic_number(instance.class, atomic_number)?;
        }
        Ok(())
    }

    fn check_relations<B: StorageBackend>(&self, _graph: &Graph<B>, _node: NodeId) -> Result<()> {
        Ok(())
    }

    fn apply_relations<B: StorageBackend>(&self, _graph: &Graph<B>, _node: NodeId) -> Result<()> {
        Ok(())
    }
}
