//! # Change algebra
//!
//! Typed mutation templates applied to a live node or edge, in order:
//!
//! 1. quantity change (edge subjects only)
//! 2. attribute new-values
//! 3. nested `remove` by condition
//! 4. nested `change` in place (inherited edges are overridden first)
//! 5. nested `add`
//!
//! The whole change, nested levels included, is checked against the
//! current state before anything is written, so a rejected change leaves
//! the graph untouched. Edge subjects take role attributes on the edge
//! itself; class attributes and nested lists go to the edge's target.

pub mod element;
pub mod matter;
pub mod object;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::condition::{same_key, Condition, Instance, Subject};
use crate::model::*;
use crate::storage::StorageBackend;
use crate::{Error, Graph, Result};

pub use element::ElementChange;
pub use matter::{MatterChange, MixtureChange};
pub use object::PhysicalObjectChange;

// ============================================================================
// Change trait
// ============================================================================

/// A typed mutation over one entity family.
pub trait Change {
    const FAMILY: Family;

    /// Class the subject must be or descend from. Nested change entries
    /// are keyed by it.
    fn reference(&self) -> Option<NodeId>;

    fn quantity(&self) -> Option<&QuantityChange>;

    /// Reject attribute new-values that cannot apply to `instance`. Writes nothing.
    fn check_attributes<B: StorageBackend>(&self, graph: &Graph<B>, instance: &Instance) -> Result<()>;

    fn apply_attributes<B: StorageBackend>(&self, graph: &Graph<B>, instance: &Instance) -> Result<()>;

    /// Plan every nested list of `node` and check the changes they carry.
    /// Writes nothing.
    fn check_relations<B: StorageBackend>(&self, graph: &Graph<B>, node: NodeId) -> Result<()>;

    fn apply_relations<B: StorageBackend>(&self, graph: &Graph<B>, node: NodeId) -> Result<()>;
}

// ============================================================================
// RelationChanges
// ============================================================================

/// Remove / change / add lists for one relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationChanges<C, X> {
    remove: Vec<C>,
    change: Vec<X>,
    add: Vec<EdgeValue>,
}

impl<C, X> Default for RelationChanges<C, X> {
    fn default() -> Self {
        Self { remove: Vec::new(), change: Vec::new(), add: Vec::new() }
    }
}

impl<C, X> RelationChanges<C, X> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn removals(&self) -> &[C] {
        &self.remove
    }

    pub fn changes(&self) -> &[X] {
        &self.change
    }

    pub fn additions(&self) -> &[EdgeValue] {
        &self.add
    }

    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.change.is_empty() && self.add.is_empty()
    }
}

impl<C: Condition + PartialEq, X: Change> RelationChanges<C, X> {
    /// Remove every local edge matching `condition`.
    pub fn remove_by(&mut self, condition: C) -> Result<()> {
        if self.remove.iter().any(|c| same_key(c, &condition)) {
            return Err(Error::AlreadyExists("removal condition already listed".into()));
        }
        self.remove.push(condition);
        Ok(())
    }

    /// Change the edges whose target is `change.reference()`.
    pub fn change(&mut self, change: X) -> Result<()> {
        let reference = change
            .reference()
            .ok_or_else(|| Error::InvalidArgument("nested change needs a reference".into()))?;
        if self.change.iter().any(|x| x.reference() == Some(reference)) {
            return Err(Error::AlreadyExists(format!("change on {reference} already listed")));
        }
        self.change.push(change);
        Ok(())
    }

    pub fn add(&mut self, value: EdgeValue) -> Result<()> {
        if self.add.iter().any(|v| v.target == value.target) {
            return Err(Error::AlreadyExists(format!("addition of {} already listed", value.target)));
        }
        self.add.push(value);
        Ok(())
    }

    pub fn withdraw_remove(&mut self, condition: &C) -> Result<C> {
        let pos = self
            .remove
            .iter()
            .position(|c| same_key(c, condition))
            .ok_or_else(|| Error::NotFound("removal condition not listed".into()))?;
        Ok(self.remove.remove(pos))
    }

    pub fn withdraw_change(&mut self, reference: NodeId) -> Result<X> {
        let pos = self
            .change
            .iter()
            .position(|x| x.reference() == Some(reference))
            .ok_or_else(|| Error::NotFound(format!("no change on {reference} listed")))?;
        Ok(self.change.remove(pos))
    }

    pub fn withdraw_add(&mut self, target: NodeId) -> Result<EdgeValue> {
        let pos = self
            .add
            .iter()
            .position(|v| v.target == target)
            .ok_or_else(|| Error::NotFound(format!("no addition of {target} listed")))?;
        Ok(self.add.remove(pos))
    }
}

/// Validated work for one relation of one node.
pub(crate) struct RelationPlan<'x, X> {
    relation: Relation,
    remove: Vec<Valued>,
    change: Vec<(Valued, &'x X)>,
    add: Vec<EdgeValue>,
    /// Targets present once the plan has run.
    pub(crate) present: HashSet<NodeId>,
}

// ============================================================================
// Application
// ============================================================================

impl<B: StorageBackend> Graph<B> {
    /// Apply `change` to a node or edge.
    pub fn apply<X: Change>(&self, change: &X, subject: impl Into<Subject>) -> Result<()> {
        let instance = self.instance(subject.into())?;
        let kind = self.require(instance.class)?;
        if kind.family() != X::FAMILY {
            return Err(Error::InvalidArgument(format!(
                "{:?} change cannot apply to {} ({kind})",
                X::FAMILY,
                instance.class
            )));
        }
        if let Some(reference) = change.reference() {
            if !self.is_a(instance.class, reference)? {
                return Err(Error::InvalidArgument(format!(
                    "{} is not a {reference}",
                    instance.class
                )));
            }
        }
        self.apply_instance(change, &instance)
    }

    pub(crate) fn apply_instance<X: Change>(&self, change: &X, instance: &Instance) -> Result<()> {
        self.check_instance(change, instance)?;
        let _tx = self.begin_change();
        self.write_instance(change, instance)
    }

    /// The quantity `change` gives the subject edge, if it changes one.
    fn changed_quantity<X: Change>(
        &self,
        change: &X,
        instance: &Instance,
    ) -> Result<Option<(Valued, Quantity)>> {
        let Some(quantity) = change.quantity() else {
            return Ok(None);
        };
        let edge = instance.edge.as_ref().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "quantity change on node {} needs an edge subject",
                instance.class
            ))
        })?;
        let next = quantity.apply(edge.quantity)?;
        if edge.relation == Relation::Elements && edge.origin == Origin::Personal {
            self.formula_count(&next)?;
        }
        Ok(Some((edge.clone(), next)))
    }

    /// Run every validation `write_instance` would hit, without writing.
    pub(crate) fn check_instance<X: Change>(&self, change: &X, instance: &Instance) -> Result<()> {
        self.changed_quantity(change, instance)?;
        change.check_attributes(self, instance)?;
        change.check_relations(self, instance.class)
    }

    fn write_instance<X: Change>(&self, change: &X, instance: &Instance) -> Result<()> {
        let refreshed;
        let instance = match self.changed_quantity(change, instance)? {
            Some((edge, quantity)) => {
                self.rewrite_edge(&edge, quantity, edge.role)?;
                refreshed = Instance::from(self.edge(edge.id)?);
                &refreshed
            }
            None => instance,
        };

        change.apply_attributes(self, instance)?;
        change.apply_relations(self, instance.class)
    }

    /// Plan one relation and check every nested change it reaches.
    pub(crate) fn check_relation<'x, C: Condition, X: Change>(
        &self,
        node: NodeId,
        relation: Relation,
        changes: &'x RelationChanges<C, X>,
    ) -> Result<RelationPlan<'x, X>> {
        let plan = self.plan_relation(node, relation, changes)?;
        for (edge, change) in &plan.change {
            self.check_instance(*change, &Instance::from(edge.clone()))?;
        }
        Ok(plan)
    }

    /// Validate one relation's lists against the current state of `node`.
    pub(crate) fn plan_relation<'x, C: Condition, X: Change>(
        &self,
        node: NodeId,
        relation: Relation,
        changes: &'x RelationChanges<C, X>,
    ) -> Result<RelationPlan<'x, X>> {
        let mut plan = RelationPlan {
            relation,
            remove: Vec::new(),
            change: Vec::new(),
            add: Vec::new(),
            present: HashSet::new(),
        };

        // Removal reaches local edges only.
        let mut kept = Vec::new();
        for edge in self
            .personal(node, relation)?
            .into_iter()
            .chain(self.overridden(node, relation)?)
        {
            let instance = Instance::from(edge.clone());
            let mut hit = false;
            for condition in &changes.remove {
                if self.matches_instance(condition, &instance)? {
                    hit = true;
                    break;
                }
            }
            if hit {
                plan.remove.push(edge);
            } else {
                kept.push(edge);
            }
        }

        // What survives the removals, inherited edges included.
        let mut present: HashSet<NodeId> = kept.iter().map(|e| e.target).collect();
        let inherited = self.parents_contribution(node, relation, &mut present)?;
        let survivors: Vec<Valued> = kept.into_iter().chain(inherited).collect();

        for change in &changes.change {
            let reference = change
                .reference()
                .ok_or_else(|| Error::InvalidArgument("nested change needs a reference".into()))?;
            let before = plan.change.len();
            for edge in &survivors {
                if self.is_a(edge.target, reference)? {
                    plan.change.push((edge.clone(), change));
                }
            }
            if plan.change.len() == before {
                return Err(Error::NotFound(format!(
                    "{node} has no {relation} edge to change for {reference}"
                )));
            }
        }

        for value in &changes.add {
            self.check_attach(node, relation, value)?;
            if !present.insert(value.target) {
                return Err(Error::AlreadyExists(format!(
                    "{node} already has {relation} target {}",
                    value.target
                )));
            }
            if relation.is_containment() && !self.can_contain(node, value.target)? {
                return Err(Error::CycleRejected { from: node, to: value.target });
            }
            plan.add.push(*value);
        }
        plan.present = present;
        Ok(plan)
    }

    pub(crate) fn execute_plan<X: Change>(&self, node: NodeId, plan: RelationPlan<'_, X>) -> Result<()> {
        let relation = plan.relation;
        if plan.remove.is_empty() && plan.change.is_empty() && plan.add.is_empty() {
            return Ok(());
        }
        let _tx = self.begin_change();

        for edge in &plan.remove {
            self.detach(node, edge)?;
        }
        for (edge, change) in plan.change {
            let edge = if edge.is_inherited() {
                let copy = self.override_edge(node, relation, edge.id)?;
                self.edge(copy)?
            } else {
                edge
            };
            self.write_instance(change, &Instance::from(edge))?;
        }
        for value in plan.add {
            self.add_personal(node, relation, value)?;
        }
        debug!(%node, %relation, "relation changes applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ElementCondition;

    #[test]
    fn test_builder_contract() {
        let mut changes: RelationChanges<ElementCondition, ElementChange> = RelationChanges::new();
        changes.remove_by(ElementCondition::of(NodeId(1))).unwrap();
        assert!(matches!(
            changes.remove_by(ElementCondition::of(NodeId(1))),
            Err(Error::AlreadyExists(_))
        ));
        assert!(matches!(
            changes.change(ElementChange::default()),
            Err(Error::InvalidArgument(_))
        ));
        changes.change(ElementChange::of(NodeId(2))).unwrap();
        assert!(matches!(
            changes.change(ElementChange::of(NodeId(2))),
            Err(Error::AlreadyExists(_))
        ));

        let value = EdgeValue::new(NodeId(3), Quantity::default(), Role::Plain);
        changes.add(value).unwrap();
        assert!(matches!(changes.add(value), Err(Error::AlreadyExists(_))));

        assert!(changes.withdraw_add(NodeId(3)).is_ok());
        assert!(matches!(changes.withdraw_add(NodeId(3)), Err(Error::NotFound(_))));
        assert!(changes.withdraw_change(NodeId(2)).is_ok());
        assert!(changes.withdraw_remove(&ElementCondition::of(NodeId(1))).is_ok());
        assert!(changes.is_empty());
    }
}
