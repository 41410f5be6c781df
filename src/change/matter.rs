//! Changes to matter and mixtures.

use serde::{Deserialize, Serialize};

use super::{Change, ElementChange, RelationChanges};
use crate::condition::{ElementCondition, Instance, MatterCondition, MixtureCondition};
use crate::model::*;
use crate::storage::StorageBackend;
use crate::{Error, Graph, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatterChange {
    pub matter: Option<NodeId>,
    pub quantity: Option<QuantityChange>,
    /// Written to the edge's role when the subject is a matter-valued edge,
    /// else to the matter's default state.
    pub state: Option<StateOfMatter>,
    pub elements: RelationChanges<ElementCondition, ElementChange>,
}

impl MatterChange {
    pub fn of(matter: NodeId) -> Self {
        Self { matter: Some(matter), ..Self::default() }
    }

    pub fn with_quantity(mut self, change: QuantityChange) -> Self {
        self.quantity = Some(change);
        self
    }

    pub fn with_state(mut self, state: StateOfMatter) -> Self {
        self.state = Some(state);
        self
    }
}

impl Change for MatterChange {
    const FAMILY: Family = Family::Matter;

    fn reference(&self) -> Option<NodeId> {
        self.matter
    }

    fn quantity(&self) -> Option<&QuantityChange> {
        self.quantity.as_ref()
    }

    fn check_attributes<B: StorageBackend>(&self, _graph: &Graph<B>, _instance: &Instance) -> Result<()> {
        Ok(())
    }

    fn apply_attributes<B: StorageBackend>(&self, graph: &Graph<B>, instance: &Instance) -> Result<()> {
        let Some(state) = self.state else {
            return Ok(());
        };
        match &instance.edge {
            Some(edge) if edge.role.state().is_some() => {
                graph.rewrite_edge(edge, edge.quantity, Role::Matter { state })
            }
            _ => graph.set_default_state(instance.class, state),
        }
    }

    fn check_relations<B: StorageBackend>(&self, graph: &Graph<B>, node: NodeId) -> Result<()> {
        graph.check_relation(node, Relation::Elements, &self.elements)?;
        Ok(())
    }

    fn apply_relations<B: StorageBackend>(&self, graph: &Graph<B>, node: NodeId) -> Result<()> {
        let elements = graph.plan_relation(node, Relation::Elements, &self.elements)?;
        graph.execute_plan(node, elements)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MixtureChange {
    pub matter: MatterChange,
    pub substances: RelationChanges<MatterCondition, MatterChange>,
    pub mixtures: RelationChanges<MixtureCondition, MixtureChange>,
}

impl MixtureChange {
    pub fn of(mixture: NodeId) -> Self {
        Self { matter: MatterChange::of(mixture), ..Self::default() }
    }
}

impl Change for MixtureChange {
    const FAMILY: Family = Family::Matter;

    fn reference(&self) -> Option<NodeId> {
        self.matter.matter
    }

    fn quantity(&self) -> Option<&QuantityChange> {
        self.matter.quantity.as_ref()
    }

    fn check_attributes<B: StorageBackend>(&self, graph: &Graph<B>, instance: &Instance) -> Result<()> {
        if graph.kind(instance.class)?.matter_kind() != Some(MatterKind::Mixture) {
            return Err(Error::InvalidArgument(format!(
                "mixture change cannot apply to {}",
                instance.class
            )));
        }
        self.matter.check_attributes(graph, instance)
    }

    fn apply_attributes<B: StorageBackend>(&self, graph: &Graph<B>, instance: &Instance) -> Result<()> {
        self.matter.apply_attributes(graph, instance)
    }

    fn check_relations<B: StorageBackend>(&self, graph: &Graph<B>, node: NodeId) -> Result<()> {
        graph.check_relation(node, Relation::Elements, &self.matter.elements)?;
        graph.check_relation(node, Relation::Substances, &self.substances)?;
        graph.check_relation(node, Relation::Mixtures, &self.mixtures)?;
        Ok(())
    }

    fn apply_relations<B: StorageBackend>(&self, graph: &Graph<B>, node: NodeId) -> Result<()> {
        let elements = graph.plan_relation(node, Relation::Elements, &self.matter.elements)?;
        let substances = graph.plan_relation(node, Relation::Substances, &self.substances)?;
        let mixtures = graph.plan_relation(node, Relation::Mixtures, &self.mixtures)?;
        graph.execute_plan(node, elements)?;
        graph.execute_plan(node, substances)?;
        graph.execute_plan(node, mixtures)
    }
}
