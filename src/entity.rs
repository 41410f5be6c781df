//! Node lifecycle: creation, attributes, parents, cloning and removal.

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::model::*;
use crate::storage::schema::{self, col};
use crate::storage::{RowId, StorageBackend};
use crate::{Error, Graph, Result};

/// Element symbols are one uppercase letter followed by lowercase letters.
pub fn is_element_symbol(symbol: &str) -> bool {
    let mut chars = symbol.chars();
    chars.next().is_some_and(|c| c.is_ascii_uppercase()) && chars.all(|c| c.is_ascii_lowercase())
}

pub(crate) fn check_symbol(symbol: &str) -> Result<()> {
    if !is_element_symbol(symbol) {
        return Err(Error::InvalidArgument(format!("'{symbol}' is not an element symbol")));
    }
    Ok(())
}

pub(crate) fn check_atomic_number(atomic_number: i64) -> Result<()> {
    if atomic_number < 1 {
        return Err(Error::InvalidArgument(format!(
            "atomic number must be positive, got {atomic_number}"
        )));
    }
    Ok(())
}

impl<B: StorageBackend> Graph<B> {
    // ========================================================================
    // Row access
    // ========================================================================

    pub(crate) fn read<T: FromValue>(&self, row: impl Into<RowId>, table: &str, column: &str) -> Result<T> {
        T::from_value(&self.backend.select(row.into(), table, column)?)
    }

    /// Central mutation wrapper: one column write inside a change, followed
    /// by a notification for `node`.
    pub(crate) fn write(
        &self,
        node: NodeId,
        attribute: Attribute,
        row: impl Into<RowId>,
        table: &str,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let _tx = self.begin_change();
        self.backend.update(row.into(), table, column, value.into())?;
        self.notify(node, attribute);
        Ok(())
    }

    /// `NotFound` unless `node` exists; otherwise its kind.
    pub(crate) fn require(&self, node: NodeId) -> Result<EntityKind> {
        if !self.contains(node)? {
            return Err(Error::NotFound(format!("node {node}")));
        }
        self.read::<String>(node, schema::ENTITY, col::KIND)?.parse()
    }

    pub(crate) fn require_family(&self, node: NodeId, family: Family) -> Result<EntityKind> {
        let kind = self.require(node)?;
        if kind.family() != family {
            return Err(Error::InvalidArgument(format!(
                "node {node} is {kind}, expected a {family:?} node"
            )));
        }
        Ok(kind)
    }

    // ========================================================================
    // Creation
    // ========================================================================

    fn insert_entity(&self, name: &str, kind: EntityKind) -> Result<NodeId> {
        let id = NodeId(self.backend.allocate_id().0);
        self.backend.insert(
            id.into(),
            schema::ENTITY,
            &[col::NAME, col::KIND],
            vec![name.into(), kind.as_str().into()],
        )?;
        Ok(id)
    }

    pub fn create_element(&self, name: &str, symbol: &str, atomic_number: i64) -> Result<NodeId> {
        check_symbol(symbol)?;
        check_atomic_number(atomic_number)?;

        let _tx = self.begin_change();
        let _batch = self.begin_batch();
        let id = self.insert_entity(name, EntityKind::Element)?;
        self.backend.insert(
            id.into(),
            schema::ELEMENT,
            &[col::SYMBOL, col::ATOMIC_NUMBER],
            vec![symbol.into(), atomic_number.into()],
        )?;
        self.notify(id, Attribute::Name);
        debug!(node = %id, name, symbol, "element created");
        Ok(id)
    }

    pub fn create_matter(&self, name: &str, kind: MatterKind, state: StateOfMatter) -> Result<NodeId> {
        let _tx = self.begin_change();
        let _batch = self.begin_batch();
        let id = self.insert_entity(name, EntityKind::Matter(kind))?;
        self.backend.insert(
            id.into(),
            schema::MATTER,
            &[col::DEFAULT_STATE, col::FORMULA],
            vec![state.as_str().into(), "".into()],
        )?;
        self.notify(id, Attribute::Name);
        debug!(node = %id, name, ?kind, "matter created");
        Ok(id)
    }

    pub fn create_object(&self, name: &str, kind: ObjectKind) -> Result<NodeId> {
        let _tx = self.begin_change();
        let _batch = self.begin_batch();
        let id = self.insert_entity(name, EntityKind::PhysicalObject(kind))?;
        self.backend.insert(id.into(), schema::OBJECT, &[], Vec::new())?;
        self.notify(id, Attribute::Name);
        debug!(node = %id, name, ?kind, "object created");
        Ok(id)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn contains(&self, node: NodeId) -> Result<bool> {
        self.backend.has_row(node.into(), schema::ENTITY)
    }

    /// Snapshot of one node.
    pub fn node(&self, id: NodeId) -> Result<Node> {
        let kind = self.require(id)?;
        let name = self.read::<String>(id, schema::ENTITY, col::NAME)?;
        Ok(Node::new(id, name, kind).with_parents(self.parents(id)?))
    }

    /// Every node, ordered by name then id.
    pub fn nodes(&self) -> Result<Vec<Node>> {
        let mut nodes = self
            .backend
            .ids(schema::ENTITY)?
            .into_iter()
            .map(|row| self.node(NodeId(row.0)))
            .collect::<Result<Vec<_>>>()?;
        nodes.sort();
        Ok(nodes)
    }

    pub fn name(&self, node: NodeId) -> Result<String> {
        self.require(node)?;
        self.read(node, schema::ENTITY, col::NAME)
    }

    pub fn set_name(&self, node: NodeId, name: &str) -> Result<()> {
        self.require(node)?;
        self.write(node, Attribute::Name, node, schema::ENTITY, col::NAME, name)
    }

    pub fn kind(&self, node: NodeId) -> Result<EntityKind> {
        self.require(node)
    }

    /// Personal parents in insertion order.
    pub fn parents(&self, node: NodeId) -> Result<Vec<NodeId>> {
        self.backend
            .select_all(node.into(), schema::PARENTS, col::PARENT)?
            .iter()
            .map(NodeId::from_value)
            .collect()
    }

    pub fn children(&self, node: NodeId) -> Result<Vec<NodeId>> {
        self.backend
            .select_all(node.into(), schema::CHILDREN, col::CHILD)?
            .iter()
            .map(NodeId::from_value)
            .collect()
    }

    /// Transitive parents, breadth first, each listed once.
    pub fn ancestors(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut queue: VecDeque<NodeId> = self.parents(node)?.into();
        while let Some(next) = queue.pop_front() {
            if next == node || !seen.insert(next) {
                continue;
            }
            out.push(next);
            queue.extend(self.parents(next)?);
        }
        Ok(out)
    }

    /// `node` is `class` or descends from it.
    pub fn is_a(&self, node: NodeId, class: NodeId) -> Result<bool> {
        Ok(node == class || self.ancestors(node)?.contains(&class))
    }

    // ========================================================================
    // Element and matter attributes
    // ========================================================================

    pub fn symbol(&self, element: NodeId) -> Result<String> {
        self.require_family(element, Family::Element)?;
        self.read(element, schema::ELEMENT, col::SYMBOL)
    }

    pub fn set_symbol(&self, element: NodeId, symbol: &str) -> Result<()> {
        self.require_family(element, Family::Element)?;
        check_symbol(symbol)?;
        self.write(element, Attribute::Symbol, element, schema::ELEMENT, col::SYMBOL, symbol)
    }

    pub fn atomic_number(&self, element: NodeId) -> Result<i64> {
        self.require_family(element, Family::Element)?;
        self.read(element, schema::ELEMENT, col::ATOMIC_NUMBER)
    }

    pub fn set_atomic_number(&self, element: NodeId, atomic_number: i64) -> Result<()> {
        self.require_family(element, Family::Element)?;
        check_atomic_number(atomic_number)?;
        self.write(
            element,
            Attribute::AtomicNumber,
            element,
            schema::ELEMENT,
            col::ATOMIC_NUMBER,
            atomic_number,
        )
    }

    pub fn default_state(&self, matter: NodeId) -> Result<StateOfMatter> {
        self.require_family(matter, Family::Matter)?;
        self.read::<String>(matter, schema::MATTER, col::DEFAULT_STATE)?.parse()
    }

    pub fn set_default_state(&self, matter: NodeId, state: StateOfMatter) -> Result<()> {
        self.require_family(matter, Family::Matter)?;
        self.write(
            matter,
            Attribute::DefaultState,
            matter,
            schema::MATTER,
            col::DEFAULT_STATE,
            state.as_str(),
        )
    }

    // ========================================================================
    // Parents
    // ========================================================================

    pub fn add_parent(&self, child: NodeId, parent: NodeId) -> Result<()> {
        let child_kind = self.require(child)?;
        let parent_kind = self.require(parent)?;
        if child_kind != parent_kind {
            return Err(Error::InvalidArgument(format!(
                "{parent} is {parent_kind} and cannot be a parent of {child} ({child_kind})"
            )));
        }
        if self.is_a(parent, child)? {
            return Err(Error::CycleRejected { from: child, to: parent });
        }
        if self.parents(child)?.contains(&parent) {
            return Err(Error::AlreadyExists(format!("{parent} is already a parent of {child}")));
        }
        // The child inherits the parent's containment edges.
        for relation in Relation::ALL.into_iter().filter(|r| r.is_containment()) {
            for edge in self.effective(parent, relation)? {
                if !self.can_contain(child, edge.target)? {
                    return Err(Error::CycleRejected { from: child, to: edge.target });
                }
            }
        }

        let _tx = self.begin_change();
        self.backend
            .insert(child.into(), schema::PARENTS, &[col::PARENT], vec![parent.into()])?;
        self.backend
            .insert(parent.into(), schema::CHILDREN, &[col::CHILD], vec![child.into()])?;
        self.notify(child, Attribute::Parents);
        self.notify(parent, Attribute::Children);
        debug!(%child, %parent, "parent added");
        Ok(())
    }

    pub fn remove_parent(&self, child: NodeId, parent: NodeId) -> Result<()> {
        self.require(child)?;
        if !self.parents(child)?.contains(&parent) {
            return Err(Error::NotFound(format!("{parent} is not a parent of {child}")));
        }

        let _tx = self.begin_change();
        self.unlink(child, parent)?;
        debug!(%child, %parent, "parent removed");
        Ok(())
    }

    fn unlink(&self, child: NodeId, parent: NodeId) -> Result<()> {
        self.backend
            .remove_value(child.into(), schema::PARENTS, col::PARENT, &parent.into())?;
        self.backend
            .remove_value(parent.into(), schema::CHILDREN, col::CHILD, &child.into())?;
        self.notify(child, Attribute::Parents);
        self.notify(parent, Attribute::Children);
        Ok(())
    }

    // ========================================================================
    // Clone / remove
    // ========================================================================

    /// Copy a node: same attributes, same parents, and fresh copies of its
    /// personal and overridden edges. Edges whose target is gone are skipped.
    pub fn clone_node(&self, node: NodeId) -> Result<NodeId> {
        let kind = self.require(node)?;
        let name = self.name(node)?;

        let _tx = self.begin_change();
        let copy = match kind {
            EntityKind::Element => {
                self.create_element(&name, &self.symbol(node)?, self.atomic_number(node)?)?
            }
            EntityKind::Matter(matter_kind) => {
                let copy = self.create_matter(&name, matter_kind, self.default_state(node)?)?;
                self.backend.update(
                    copy.into(),
                    schema::MATTER,
                    col::FORMULA,
                    self.chemical_formula(node)?.into(),
                )?;
                copy
            }
            EntityKind::PhysicalObject(object_kind) => self.create_object(&name, object_kind)?,
        };

        for parent in self.parents(node)? {
            self.add_parent(copy, parent)?;
        }

        let mut remap: HashMap<EdgeId, EdgeId> = HashMap::new();
        for relation in Relation::ALL.into_iter().filter(|r| r.accepts_owner(kind)) {
            for table in [relation.personal_table(), relation.overridden_table()] {
                for id in self.edge_ids(node, table)? {
                    let edge = self.edge(id)?;
                    if !self.contains(edge.target)? {
                        warn!(%node, edge = %id, target = %edge.target, "clone skips edge with missing target");
                        continue;
                    }
                    let new_id = self.insert_edge(copy, relation, table, &edge.value())?;
                    remap.insert(id, new_id);
                }
            }
        }

        if kind.family() == Family::PhysicalObject {
            if let Some(default) = self.default_space(node)? {
                let id = remap.get(&default.id).copied().unwrap_or(default.id);
                self.backend
                    .update(copy.into(), schema::OBJECT, col::DEFAULT_SPACE, id.into())?;
            }
        }

        debug!(%node, %copy, edges = remap.len(), "node cloned");
        Ok(copy)
    }

    /// Delete a node: detach it from parents and children, destroy the edges
    /// it owns and every edge pointing at it, then drop its rows.
    pub fn remove_node(&self, node: NodeId) -> Result<()> {
        let kind = self.require(node)?;
        let _tx = self.begin_remove();

        for child in self.children(node)? {
            self.unlink(child, node)?;
        }
        for parent in self.parents(node)? {
            self.unlink(node, parent)?;
        }

        for relation in Relation::ALL.into_iter().filter(|r| r.accepts_owner(kind)) {
            for table in [relation.personal_table(), relation.overridden_table()] {
                for id in self.edge_ids(node, table)? {
                    self.destroy_edge(node, relation, id)?;
                }
            }
        }

        // Collect first so re-election never picks an edge about to vanish.
        let mut incoming = Vec::new();
        for row in self
            .backend
            .select_where(schema::VALUED, col::TARGET, &node.into())?
        {
            let edge = self.edge(EdgeId(row.0))?;
            let was_default = self.is_default_space(edge.owner, edge.relation, edge.id)?;
            incoming.push((edge, was_default));
        }
        for (edge, _) in &incoming {
            self.destroy_edge(edge.owner, edge.relation, edge.id)?;
        }
        for (edge, was_default) in &incoming {
            self.on_detached(edge.owner, edge, *was_default)?;
            self.notify(edge.owner, edge.relation.into());
        }

        for table in schema::NODE_TABLES {
            self.backend.remove(node.into(), table)?;
        }
        debug!(%node, incoming = incoming.len(), "node removed");
        Ok(())
    }
}
