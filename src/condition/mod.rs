//! # Condition algebra
//!
//! Typed, declarative predicates evaluated against a live node or edge.
//!
//! ```text
//! matches = family ∧ reference ∧ quantity ∧ attributes ∧ nested
//! ```
//!
//! Evaluation never writes. A condition may carry nested `ConditionSet`s
//! that are matched against the effective edges of one relation.

pub mod element;
pub mod matter;
pub mod object;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::model::*;
use crate::storage::StorageBackend;
use crate::{Error, Graph, Result};

pub use element::ElementCondition;
pub use matter::{MatterCondition, MixtureCondition};
pub use object::PhysicalObjectCondition;

// ============================================================================
// Subjects
// ============================================================================

/// What a condition or change is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subject {
    Node(NodeId),
    /// An edge stands for its target, with the edge's quantity and role.
    Edge(EdgeId),
}

impl From<NodeId> for Subject {
    fn from(id: NodeId) -> Self {
        Subject::Node(id)
    }
}

impl From<EdgeId> for Subject {
    fn from(id: EdgeId) -> Self {
        Subject::Edge(id)
    }
}

/// A resolved subject: the node whose class attributes apply, and the edge
/// carrying quantity and role when the subject is an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub class: NodeId,
    pub edge: Option<Valued>,
}

impl Instance {
    pub fn node(class: NodeId) -> Self {
        Self { class, edge: None }
    }

    pub fn quantity(&self) -> Option<Quantity> {
        self.edge.as_ref().map(|e| e.quantity)
    }

    pub fn role(&self) -> Option<Role> {
        self.edge.as_ref().map(|e| e.role)
    }
}

impl From<Valued> for Instance {
    fn from(edge: Valued) -> Self {
        Self { class: edge.target, edge: Some(edge) }
    }
}

// ============================================================================
// Requirements
// ============================================================================

/// A single attribute requirement. `S` is the sign set the attribute
/// supports: `EqualitySign` for plain values, `ValueSign` for ordinal and
/// numeric ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Requirement<T, S = EqualitySign> {
    Unconstrained,
    Constrained { sign: S, value: T },
}

impl<T, S> Default for Requirement<T, S> {
    fn default() -> Self {
        Requirement::Unconstrained
    }
}

impl<T, S> Requirement<T, S> {
    pub fn new(sign: S, value: T) -> Self {
        Requirement::Constrained { sign, value }
    }

    pub fn is_constrained(&self) -> bool {
        matches!(self, Requirement::Constrained { .. })
    }
}

impl<T: PartialEq> Requirement<T, EqualitySign> {
    pub fn admits(&self, actual: &T) -> bool {
        match self {
            Requirement::Unconstrained => true,
            Requirement::Constrained { sign, value } => sign.holds(actual, value),
        }
    }

    /// Like `admits`, reading the actual value only when constrained.
    pub fn check(&self, read: impl FnOnce() -> Result<T>) -> Result<bool> {
        match self {
            Requirement::Unconstrained => Ok(true),
            constrained => Ok(constrained.admits(&read()?)),
        }
    }
}

impl<T: PartialOrd> Requirement<T, ValueSign> {
    pub fn admits(&self, actual: &T) -> bool {
        match self {
            Requirement::Unconstrained => true,
            Requirement::Constrained { sign, value } => sign.holds(actual, value),
        }
    }

    pub fn check(&self, read: impl FnOnce() -> Result<T>) -> Result<bool> {
        match self {
            Requirement::Unconstrained => Ok(true),
            constrained => Ok(constrained.admits(&read()?)),
        }
    }
}

/// Requirement on a reference-valued attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    #[default]
    Unconstrained,
    Present,
    Absent,
}

impl Presence {
    pub fn admits(self, present: bool) -> bool {
        match self {
            Presence::Unconstrained => true,
            Presence::Present => present,
            Presence::Absent => !present,
        }
    }
}

// ============================================================================
// Condition trait
// ============================================================================

/// A typed predicate over one entity family.
pub trait Condition {
    const FAMILY: Family;

    /// Class the subject must be or descend from.
    fn reference(&self) -> Option<NodeId>;

    fn quantity(&self) -> Option<&QuantityCondition>;

    /// Family-specific attributes and nested sets. Family, reference and
    /// quantity have already been checked.
    fn attributes_match<B: StorageBackend>(&self, graph: &Graph<B>, instance: &Instance) -> Result<bool>;
}

// ============================================================================
// ConditionSet
// ============================================================================

/// Nested sub-conditions with an all/any policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSet<C> {
    entries: Vec<C>,
    /// Every entry must match some edge (true) or any one entry suffices.
    pub has_all_mandatory: bool,
}

impl<C> Default for ConditionSet<C> {
    fn default() -> Self {
        Self { entries: Vec::new(), has_all_mandatory: true }
    }
}

/// Entries are keyed by reference; unreferenced ones by structural equality.
pub(crate) fn same_key<C: Condition + PartialEq>(a: &C, b: &C) -> bool {
    match (a.reference(), b.reference()) {
        (Some(x), Some(y)) => x == y,
        (None, None) => a == b,
        _ => false,
    }
}

impl<C> ConditionSet<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set satisfied by any single matching entry.
    pub fn any() -> Self {
        Self { entries: Vec::new(), has_all_mandatory: false }
    }

    pub fn iter(&self) -> impl Iterator<Item = &C> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C: Condition + PartialEq> ConditionSet<C> {
    pub fn add(&mut self, condition: C) -> Result<()> {
        if self.entries.iter().any(|e| same_key(e, &condition)) {
            return Err(Error::AlreadyExists(match condition.reference() {
                Some(r) => format!("condition on {r} already listed"),
                None => "identical condition already listed".into(),
            }));
        }
        self.entries.push(condition);
        Ok(())
    }

    pub fn with(mut self, condition: C) -> Result<Self> {
        self.add(condition)?;
        Ok(self)
    }

    pub fn remove(&mut self, condition: &C) -> Result<C> {
        let pos = self
            .entries
            .iter()
            .position(|e| same_key(e, condition))
            .ok_or_else(|| Error::NotFound("condition not listed".into()))?;
        Ok(self.entries.remove(pos))
    }
}

// ============================================================================
// Evaluation
// ============================================================================

impl<B: StorageBackend> Graph<B> {
    /// Resolve a subject to the node and edge it stands for.
    pub fn instance(&self, subject: Subject) -> Result<Instance> {
        match subject {
            Subject::Node(id) => {
                self.require(id)?;
                Ok(Instance::node(id))
            }
            Subject::Edge(id) => Ok(Instance::from(self.edge(id)?)),
        }
    }

    pub fn matches<C: Condition>(&self, condition: &C, subject: impl Into<Subject>) -> Result<bool> {
        let instance = self.instance(subject.into())?;
        self.matches_instance(condition, &instance)
    }

    pub(crate) fn matches_instance<C: Condition>(&self, condition: &C, instance: &Instance) -> Result<bool> {
        let kind = self.require(instance.class)?;
        if kind.family() != C::FAMILY {
            trace!(class = %instance.class, "condition family mismatch");
            return Ok(false);
        }
        if let Some(reference) = condition.reference() {
            if !self.is_a(instance.class, reference)? {
                trace!(class = %instance.class, %reference, "condition reference mismatch");
                return Ok(false);
            }
        }
        if let Some(quantity) = condition.quantity() {
            // A bare node has no quantity to compare.
            if !instance.quantity().is_some_and(|q| quantity.admits(&q)) {
                trace!(class = %instance.class, "condition quantity mismatch");
                return Ok(false);
            }
        }
        condition.attributes_match(self, instance)
    }

    /// Match a nested set against the effective `relation` edges of `node`.
    pub(crate) fn matches_nested<C: Condition>(
        &self,
        node: NodeId,
        relation: Relation,
        set: &ConditionSet<C>,
    ) -> Result<bool> {
        if set.is_empty() {
            return Ok(true);
        }
        let instances: Vec<Instance> = self
            .effective(node, relation)?
            .into_iter()
            .map(Instance::from)
            .collect();

        let matched = |condition: &C| -> Result<bool> {
            for instance in &instances {
                if self.matches_instance(condition, instance)? {
                    return Ok(true);
                }
            }
            Ok(false)
        };

        if set.has_all_mandatory {
            for condition in set.iter() {
                if !matched(condition)? {
                    return Ok(false);
                }
            }
            Ok(true)
        } else {
            for condition in set.iter() {
                if matched(condition)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}
