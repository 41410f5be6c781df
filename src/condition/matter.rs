//! Conditions on matter and mixtures.

use serde::{Deserialize, Serialize};

use super::{Condition, ConditionSet, ElementCondition, Instance, Requirement};
use crate::model::*;
use crate::storage::StorageBackend;
use crate::{Graph, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatterCondition {
    pub matter: Option<NodeId>,
    pub quantity: Option<QuantityCondition>,
    pub kind: Requirement<MatterKind>,
    /// Compared with the edge's state when the subject is an edge, else
    /// with the matter's default state.
    pub state: Requirement<StateOfMatter, ValueSign>,
    pub elements: ConditionSet<ElementCondition>,
}

impl MatterCondition {
    pub fn of(matter: NodeId) -> Self {
        Self { matter: Some(matter), ..Self::default() }
    }

    pub fn with_quantity(mut self, sign: ValueSign, value: f64) -> Self {
        self.quantity = Some(QuantityCondition::new(sign, value));
        self
    }

    pub fn with_kind(mut self, sign: EqualitySign, kind: MatterKind) -> Self {
        self.kind = Requirement::new(sign, kind);
        self
    }

    pub fn with_state(mut self, sign: ValueSign, state: StateOfMatter) -> Self {
        self.state = Requirement::new(sign, state);
        self
    }

    pub fn with_elements(mut self, elements: ConditionSet<ElementCondition>) -> Self {
        self.elements = elements;
        self
    }
}

impl Condition for MatterCondition {
    const FAMILY: Family = Family::Matter;

    fn reference(&self) -> Option<NodeId> {
        self.matter
    }

    fn quantity(&self) -> Option<&QuantityCondition> {
        self.quantity.as_ref()
    }

    fn attributes_match<B: StorageBackend>(&self, graph: &Graph<B>, instance: &Instance) -> Result<bool> {
        let class = instance.class;
        let kind_ok = self.kind.check(|| {
            Ok(graph.kind(class)?.matter_kind().unwrap_or(MatterKind::Substance))
        })?;
        if !kind_ok {
            return Ok(false);
        }
        let state_ok = self.state.check(|| match instance.role().and_then(|r| r.state()) {
            Some(state) => Ok(state),
            None => graph.default_state(class),
        })?;
        if !state_ok {
            return Ok(false);
        }
        graph.matches_nested(class, Relation::Elements, &self.elements)
    }
}

/// A matter condition that additionally requires a mixture and may
/// constrain what it blends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MixtureCondition {
    pub matter: MatterCondition,
    pub substances: ConditionSet<MatterCondition>,
    pub mixtures: ConditionSet<MixtureCondition>,
}

impl MixtureCondition {
    pub fn of(mixture: NodeId) -> Self {
        Self { matter: MatterCondition::of(mixture), ..Self::default() }
    }

    pub fn with_substances(mut self, substances: ConditionSet<MatterCondition>) -> Self {
        self.substances = substances;
        self
    }

    pub fn with_mixtures(mut self, mixtures: ConditionSet<MixtureCondition>) -> Self {
        self.mixtures = mixtures;
        self
    }
}

impl Condition for MixtureCondition {
    const FAMILY: Family = Family::Matter;

    fn reference(&self) -> Option<NodeId> {
        self.matter.matter
    }

    fn quantity(&self) -> Option<&QuantityCondition> {
        self.matter.quantity.as_ref()
    }

    fn attributes_match<B: StorageBackend>(&self, graph: &Graph<B>, instance: &Instance) -> Result<bool> {
        if graph.kind(instance.class)?.matter_kind() != Some(MatterKind::Mixture) {
            return Ok(false);
        }
        Ok(self.matter.attributes_match(graph, instance)?
            && graph.matches_nested(instance.class, Relation::Substances, &self.substances)?
            && graph.matches_nested(instance.class, Relation::Mixtures, &self.mixtures)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_prefers_edge_role() {
        let g = Graph::open_memory().unwrap();
        let water = g.create_matter("Water", MatterKind::Substance, StateOfMatter::Liquid).unwrap();
        let cube = g.create_object("Ice cube", ObjectKind::Tangible).unwrap();
        let edge = g.add_matter(cube, water, Quantity::exact(1.0)).unwrap();
        g.set_state(edge, StateOfMatter::Solid).unwrap();

        let frozen = MatterCondition::of(water).with_state(ValueSign::Equal, StateOfMatter::Solid);
        assert!(g.matches(&frozen, edge).unwrap());
        assert!(!g.matches(&frozen, water).unwrap());
        let fluid = MatterCondition::default().with_state(ValueSign::GreaterOrEqual, StateOfMatter::Liquid);
        assert!(g.matches(&fluid, water).unwrap());
    }

    #[test]
    fn test_mixture_requires_mixture_kind() {
        let g = Graph::open_memory().unwrap();
        let water = g.create_matter("Water", MatterKind::Substance, StateOfMatter::Liquid).unwrap();
        let tea = g.create_matter("Tea", MatterKind::Mixture, StateOfMatter::Liquid).unwrap();
        g.add_substance(tea, water, Quantity::exact(0.9)).unwrap();

        let any_mixture = MixtureCondition::default();
        assert!(g.matches(&any_mixture, tea).unwrap());
        assert!(!g.matches(&any_mixture, water).unwrap());

        let watery = MixtureCondition::default()
            .with_substances(ConditionSet::new().with(MatterCondition::of(water)).unwrap());
        assert!(g.matches(&watery, tea).unwrap());
        let kinds = MatterCondition::default().with_kind(EqualitySign::Equal, MatterKind::Mixture);
        assert!(g.matches(&kinds, tea).unwrap());
        assert!(!g.matches(&kinds, water).unwrap());
    }
}
