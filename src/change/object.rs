//! Changes to physical objects.

use serde::{Deserialize, Serialize};

use super::{Change, MatterChange, RelationChanges};
use crate::condition::{Instance, MatterCondition, PhysicalObjectCondition};
use crate::matter::check_thickness;
use crate::model::*;
use crate::storage::StorageBackend;
use crate::{Error, Graph, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicalObjectChange {
    pub object: Option<NodeId>,
    pub quantity: Option<QuantityChange>,
    /// New thickness of a cover edge subject.
    pub thickness: Option<f64>,
    /// Make the effective space edge to this target the default. Applied
    /// after the nested lists, so it may name a space added here.
    pub default_space: Option<NodeId>,
    pub matter: RelationChanges<MatterCondition, MatterChange>,
    pub spaces: RelationChanges<PhysicalObjectCondition, PhysicalObjectChange>,
    pub parts: RelationChanges<PhysicalObjectCondition, PhysicalObjectChange>,
    pub covers: RelationChanges<PhysicalObjectCondition, PhysicalObjectChange>,
}

impl PhysicalObjectChange {
    pub fn of(object: NodeId) -> Self {
        Self { object: Some(object), ..Self::default() }
    }

    pub fn with_quantity(mut self, change: QuantityChange) -> Self {
        self.quantity = Some(change);
        self
    }

    pub fn with_thickness(mut self, thickness: f64) -> Self {
        self.thickness = Some(thickness);
        self
    }

    pub fn with_default_space(mut self, target: NodeId) -> Self {
        self.default_space = Some(target);
        self
    }
}

impl Change for PhysicalObjectChange {
    const FAMILY: Family = Family::PhysicalObject;

    fn reference(&self) -> Option<NodeId> {
        self.object
    }

    fn quantity(&self) -> Option<&QuantityChange> {
        self.quantity.as_ref()
    }

    fn check_attributes<B: StorageBackend>(&self, _graph: &Graph<B>, instance: &Instance) -> Result<()> {
        let Some(thickness) = self.thickness else {
            return Ok(());
        };
        match &instance.edge {
            Some(edge) if edge.role.thickness().is_some() => check_thickness(thickness),
            _ => Err(Error::InvalidArgument(format!(
                "thickness change on {} needs a cover edge subject",
                instance.class
            ))),
        }
    }

    fn apply_attributes<B: StorageBackend>(&self, graph: &Graph<B>, instance: &Instance) -> Result<()> {
        match (self.thickness, &instance.edge) {
            (Some(thickness), Some(edge)) => graph.set_thickness(edge.id, thickness),
            _ => Ok(()),
        }
    }

    fn check_relations<B: StorageBackend>(&self, graph: &Graph<B>, node: NodeId) -> Result<()> {
        graph.check_relation(node, Relation::Matter, &self.matter)?;
        let spaces = graph.check_relation(node, Relation::Spaces, &self.spaces)?;
        graph.check_relation(node, Relation::Parts, &self.parts)?;
        graph.check_relation(node, Relation::Covers, &self.covers)?;
        match self.default_space {
            Some(target) if !spaces.present.contains(&target) => {
                Err(Error::NotFound(format!("{node} has no space {target}")))
            }
            _ => Ok(()),
        }
    }

    fn apply_relations<B: StorageBackend>(&self, graph: &Graph<B>, node: NodeId) -> Result<()> {
        let matter = graph.plan_relation(node, Relation::Matter, &self.matter)?;
        let spaces = graph.plan_relation(node, Relation::Spaces, &self.spaces)?;
        let parts = graph.plan_relation(node, Relation::Parts, &self.parts)?;
        let covers = graph.plan_relation(node, Relation::Covers, &self.covers)?;
        graph.execute_plan(node, matter)?;
        graph.execute_plan(node, spaces)?;
        graph.execute_plan(node, parts)?;
        graph.execute_plan(node, covers)?;

        if let Some(target) = self.default_space {
            let edge = graph
                .spaces(node)?
                .into_iter()
                .find(|e| e.target == target)
                .ok_or_else(|| Error::NotFound(format!("{node} has no space {target}")))?;
            graph.set_default_space(node, edge.id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thickness_needs_cover_edge() {
        let g = Graph::open_memory().unwrap();
        let book = g.create_object("Book", ObjectKind::Tangible).unwrap();
        let jacket = g.create_object("Jacket", ObjectKind::Tangible).unwrap();
        let edge = g.add_cover(book, jacket, 0.1).unwrap();

        g.apply(&PhysicalObjectChange::default().with_thickness(0.4), edge).unwrap();
        assert_eq!(g.edge(edge).unwrap().role.thickness(), Some(0.4));
        assert!(matches!(
            g.apply(&PhysicalObjectChange::default().with_thickness(0.4), book),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_default_space_by_target() {
        let g = Graph::open_memory().unwrap();
        let van = g.create_object("Van", ObjectKind::Tangible).unwrap();
        let cab = g.create_object("Cab", ObjectKind::Space).unwrap();
        let cargo = g.create_object("Cargo bay", ObjectKind::Space).unwrap();
        g.add_space(van, g.valued(Relation::Spaces, cab).unwrap()).unwrap();

        let mut change = PhysicalObjectChange::default().with_default_space(cargo);
        change.spaces.add(g.valued(Relation::Spaces, cargo).unwrap()).unwrap();
        g.apply(&change, van).unwrap();
        assert_eq!(g.default_space(van).unwrap().map(|e| e.target), Some(cargo));

        let missing = PhysicalObjectChange::default().with_default_space(van);
        assert!(matches!(g.apply(&missing, van), Err(Error::NotFound(_))));

        // The space addition is not kept when the default is unknown.
        let shed = g.create_object("Shed", ObjectKind::Space).unwrap();
        let mut change = PhysicalObjectChange::default().with_default_space(van);
        change.spaces.add(g.valued(Relation::Spaces, shed).unwrap()).unwrap();
        assert!(matches!(g.apply(&change, van), Err(Error::NotFound(_))));
        assert_eq!(g.spaces(van).unwrap().len(), 2);
    }
}
