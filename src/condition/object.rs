//! Conditions on physical objects.

use serde::{Deserialize, Serialize};

use super::{Condition, ConditionSet, Instance, MatterCondition, Presence, Requirement};
use crate::model::*;
use crate::storage::StorageBackend;
use crate::{Graph, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicalObjectCondition {
    pub object: Option<NodeId>,
    pub quantity: Option<QuantityCondition>,
    pub kind: Requirement<ObjectKind>,
    pub default_space: Presence,
    /// Only cover edges carry a thickness; anything else fails a
    /// constrained thickness.
    pub thickness: Requirement<f64, ValueSign>,
    pub matter: ConditionSet<MatterCondition>,
    pub spaces: ConditionSet<PhysicalObjectCondition>,
    pub parts: ConditionSet<PhysicalObjectCondition>,
    pub covers: ConditionSet<PhysicalObjectCondition>,
}

impl PhysicalObjectCondition {
    pub fn of(object: NodeId) -> Self {
        Self { object: Some(object), ..Self::default() }
    }

    pub fn with_quantity(mut self, sign: ValueSign, value: f64) -> Self {
        self.quantity = Some(QuantityCondition::new(sign, value));
        self
    }

    pub fn with_kind(mut self, sign: EqualitySign, kind: ObjectKind) -> Self {
        self.kind = Requirement::new(sign, kind);
        self
    }

    pub fn with_default_space(mut self, presence: Presence) -> Self {
        self.default_space = presence;
        self
    }

    pub fn with_thickness(mut self, sign: ValueSign, thickness: f64) -> Self {
        self.thickness = Requirement::new(sign, thickness);
        self
    }

    pub fn with_matter(mut self, matter: ConditionSet<MatterCondition>) -> Self {
        self.matter = matter;
        self
    }

    pub fn with_spaces(mut self, spaces: ConditionSet<PhysicalObjectCondition>) -> Self {
        self.spaces = spaces;
        self
    }

    pub fn with_parts(mut self, parts: ConditionSet<PhysicalObjectCondition>) -> Self {
        self.parts = parts;
        self
    }

    pub fn with_covers(mut self, covers: ConditionSet<PhysicalObjectCondition>) -> Self {
        self.covers = covers;
        self
    }
}

impl Condition for PhysicalObjectCondition {
    const FAMILY: Family = Family::PhysicalObject;

    fn reference(&self) -> Option<NodeId> {
        self.object
    }

    fn quantity(&self) -> Option<&QuantityCondition> {
        self.quantity.as_ref()
    }

    fn attributes_match<B: StorageBackend>(&self, graph: &Graph<B>, instance: &Instance) -> Result<bool> {
        let class = instance.class;
        let kind_ok = self.kind.check(|| {
            Ok(graph.kind(class)?.object_kind().unwrap_or(ObjectKind::Tangible))
        })?;
        if !kind_ok {
            return Ok(false);
        }
        if self.default_space != Presence::Unconstrained
            && !self.default_space.admits(graph.default_space(class)?.is_some())
        {
            return Ok(false);
        }
        if self.thickness.is_constrained() {
            match instance.role().and_then(|r| r.thickness()) {
                Some(thickness) if self.thickness.admits(&thickness) => {}
                _ => return Ok(false),
            }
        }

        Ok(graph.matches_nested(class, Relation::Matter, &self.matter)?
            && graph.matches_nested(class, Relation::Spaces, &self.spaces)?
            && graph.matches_nested(class, Relation::Parts, &self.parts)?
            && graph.matches_nested(class, Relation::Covers, &self.covers)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_space_presence_and_thickness() {
        let g = Graph::open_memory().unwrap();
        let chest = g.create_object("Chest", ObjectKind::Tangible).unwrap();
        let inside = g.create_object("Inside", ObjectKind::Space).unwrap();
        let lacquer = g.create_object("Lacquer", ObjectKind::Tangible).unwrap();

        let hollow = PhysicalObjectCondition::default().with_default_space(Presence::Present);
        assert!(!g.matches(&hollow, chest).unwrap());
        g.add_space(chest, g.valued(Relation::Spaces, inside).unwrap()).unwrap();
        assert!(g.matches(&hollow, chest).unwrap());

        let coat = g.add_cover(chest, lacquer, 0.5).unwrap();
        let thick = PhysicalObjectCondition::of(lacquer).with_thickness(ValueSign::Greater, 0.1);
        assert!(g.matches(&thick, coat).unwrap());
        assert!(!g.matches(&thick, lacquer).unwrap());
    }
}
