//! # Override resolution
//!
//! Every relation of a node is seen through four views:
//!
//! | View | Contents |
//! |------|----------|
//! | Personal | edges the node owns |
//! | Overridden | node-local copies of inherited edges |
//! | Inherited | each parent's effective edges, in parent order, minus targets the node personally owns or overrides |
//! | Effective | personal, then inherited, then overridden |
//!
//! A target appears at most once in Effective. When two parents provide the
//! same target the first parent wins. Views are recomputed on every read.

use hashbrown::HashSet;
use tracing::debug;

use crate::model::*;
use crate::storage::schema::{self, col};
use crate::storage::{RowId, StorageBackend};
use crate::{Error, Graph, Result};

impl<B: StorageBackend> Graph<B> {
    // ========================================================================
    // Edge values
    // ========================================================================

    /// Template for a new edge to `target`, filled from the target's own
    /// defaults and the graph settings.
    pub fn valued(&self, relation: Relation, target: NodeId) -> Result<EdgeValue> {
        let kind = self.require(target)?;
        let role = match relation {
            Relation::Substances | Relation::Mixtures | Relation::Matter => {
                let state = if kind.family() == Family::Matter {
                    self.default_state(target)?
                } else {
                    self.settings.default_state
                };
                Role::Matter { state }
            }
            Relation::Covers => Role::Cover { thickness: self.settings.default_thickness },
            Relation::Elements | Relation::Spaces | Relation::Parts => Role::Plain,
        };
        Ok(EdgeValue::new(target, self.settings.default_quantity, role))
    }

    // ========================================================================
    // Edge rows
    // ========================================================================

    pub(crate) fn edge_ids(&self, node: NodeId, table: &str) -> Result<Vec<EdgeId>> {
        self.backend
            .select_all(node.into(), table, col::EDGE)?
            .iter()
            .map(EdgeId::from_value)
            .collect()
    }

    fn load_edge(&self, id: EdgeId, origin: Origin) -> Result<Valued> {
        let row = RowId::from(id);
        let relation: Relation = self.read::<String>(row, schema::VALUED, col::RELATION)?.parse()?;
        let quantity = Quantity::new(
            self.read(row, schema::VALUED, col::QTY_MIN)?,
            self.read(row, schema::VALUED, col::QTY_PREFERRED)?,
            self.read(row, schema::VALUED, col::QTY_MAX)?,
        )?;
        let role = match relation {
            Relation::Substances | Relation::Mixtures | Relation::Matter => Role::Matter {
                state: self.read::<String>(row, schema::VALUED, col::STATE)?.parse()?,
            },
            Relation::Covers => Role::Cover {
                thickness: self.read(row, schema::VALUED, col::THICKNESS)?,
            },
            Relation::Elements | Relation::Spaces | Relation::Parts => Role::Plain,
        };
        Ok(Valued {
            id,
            relation,
            owner: self.read(row, schema::VALUED, col::OWNER)?,
            target: self.read(row, schema::VALUED, col::TARGET)?,
            quantity,
            role,
            origin,
        })
    }

    /// A stored edge, as its owner sees it.
    pub fn edge(&self, id: EdgeId) -> Result<Valued> {
        if !self.backend.has_row(id.into(), schema::VALUED)? {
            return Err(Error::NotFound(format!("edge {id}")));
        }
        let edge = self.load_edge(id, Origin::Personal)?;
        if self.edge_ids(edge.owner, edge.relation.overridden_table())?.contains(&id) {
            return Ok(Valued { origin: Origin::Overridden, ..edge });
        }
        Ok(edge)
    }

    /// Write the edge row, then register it in `owner`'s `table`.
    pub(crate) fn insert_edge(
        &self,
        owner: NodeId,
        relation: Relation,
        table: &str,
        value: &EdgeValue,
    ) -> Result<EdgeId> {
        let id = EdgeId(self.backend.allocate_id().0);
        let q = value.quantity;
        self.backend.insert(
            id.into(),
            schema::VALUED,
            &[
                col::OWNER,
                col::RELATION,
                col::TARGET,
                col::QTY_MIN,
                col::QTY_PREFERRED,
                col::QTY_MAX,
                col::STATE,
                col::THICKNESS,
            ],
            vec![
                owner.into(),
                relation.as_str().into(),
                value.target.into(),
                q.min().into(),
                q.preferred().into(),
                q.max().into(),
                value.role.state().map(StateOfMatter::as_str).into(),
                value.role.thickness().into(),
            ],
        )?;
        self.backend.insert(owner.into(), table, &[col::EDGE], vec![id.into()])?;
        Ok(id)
    }

    /// Delete the edge row, then detach it from whichever table of `owner`
    /// holds it.
    pub(crate) fn destroy_edge(&self, owner: NodeId, relation: Relation, id: EdgeId) -> Result<()> {
        self.backend.remove(id.into(), schema::VALUED)?;
        for table in [relation.personal_table(), relation.overridden_table()] {
            self.backend.remove_value(owner.into(), table, col::EDGE, &id.into())?;
        }
        Ok(())
    }

    /// Overwrite quantity and role of a stored edge. The target never changes.
    pub(crate) fn rewrite_edge(&self, edge: &Valued, quantity: Quantity, role: Role) -> Result<()> {
        if !edge.relation.accepts_role(&role) {
            return Err(Error::InvalidArgument(format!(
                "{} edges cannot carry role {role:?}",
                edge.relation
            )));
        }
        let recount = match (edge.relation, edge.origin) {
            (Relation::Elements, Origin::Personal) => Some(self.formula_count(&quantity)?),
            _ => None,
        };
        let row = RowId::from(edge.id);
        let _tx = self.begin_change();
        self.backend.update(row, schema::VALUED, col::QTY_MIN, quantity.min().into())?;
        self.backend.update(row, schema::VALUED, col::QTY_PREFERRED, quantity.preferred().into())?;
        self.backend.update(row, schema::VALUED, col::QTY_MAX, quantity.max().into())?;
        self.backend.update(row, schema::VALUED, col::STATE, role.state().map(StateOfMatter::as_str).into())?;
        self.backend.update(row, schema::VALUED, col::THICKNESS, role.thickness().into())?;

        if let Some(after) = recount {
            self.element_requantified(edge.owner, edge.target, edge.quantity.count(), after)?;
        }
        self.notify(edge.owner, edge.relation.into());
        Ok(())
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn personal(&self, node: NodeId, relation: Relation) -> Result<Vec<Valued>> {
        self.require(node)?;
        self.edge_ids(node, relation.personal_table())?
            .into_iter()
            .map(|id| self.load_edge(id, Origin::Personal))
            .collect()
    }

    pub fn overridden(&self, node: NodeId, relation: Relation) -> Result<Vec<Valued>> {
        self.require(node)?;
        self.edge_ids(node, relation.overridden_table())?
            .into_iter()
            .map(|id| self.load_edge(id, Origin::Overridden))
            .collect()
    }

    pub fn inherited(&self, node: NodeId, relation: Relation) -> Result<Vec<Valued>> {
        let mut shadowed: HashSet<NodeId> = self
            .personal(node, relation)?
            .iter()
            .chain(&self.overridden(node, relation)?)
            .map(|e| e.target)
            .collect();
        self.parents_contribution(node, relation, &mut shadowed)
    }

    pub fn effective(&self, node: NodeId, relation: Relation) -> Result<Vec<Valued>> {
        let personal = self.personal(node, relation)?;
        let overridden = self.overridden(node, relation)?;
        let mut shadowed: HashSet<NodeId> =
            personal.iter().chain(&overridden).map(|e| e.target).collect();
        let inherited = self.parents_contribution(node, relation, &mut shadowed)?;

        let mut out = personal;
        out.extend(inherited);
        out.extend(overridden);
        Ok(out)
    }

    /// Edges the parents of `node` pass down, skipping (and then recording)
    /// every target already in `shadowed`.
    pub(crate) fn parents_contribution(
        &self,
        node: NodeId,
        relation: Relation,
        shadowed: &mut HashSet<NodeId>,
    ) -> Result<Vec<Valued>> {
        let mut out = Vec::new();
        for parent in self.parents(node)? {
            for edge in self.effective(parent, relation)? {
                if shadowed.insert(edge.target) {
                    out.push(Valued { origin: Origin::Inherited, ..edge });
                }
            }
        }
        Ok(out)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// `InvalidArgument` unless owner kind, target kind and role all fit
    /// `relation` and the target exists.
    pub(crate) fn check_attach(&self, owner: NodeId, relation: Relation, value: &EdgeValue) -> Result<()> {
        let owner_kind = self.require(owner)?;
        if !relation.accepts_owner(owner_kind) {
            return Err(Error::InvalidArgument(format!(
                "{owner} ({owner_kind}) cannot own {relation} edges"
            )));
        }
        if !self.contains(value.target)? {
            return Err(Error::InvalidArgument(format!(
                "target {} of a {relation} edge does not exist",
                value.target
            )));
        }
        let target_kind = self.require(value.target)?;
        if !relation.accepts_target(target_kind) {
            return Err(Error::InvalidArgument(format!(
                "{} ({target_kind}) cannot be the target of a {relation} edge",
                value.target
            )));
        }
        if !relation.accepts_role(&value.role) {
            return Err(Error::InvalidArgument(format!(
                "{relation} edges cannot carry role {:?}",
                value.role
            )));
        }
        if relation == Relation::Elements {
            self.formula_count(&value.quantity)?;
        }
        Ok(())
    }

    pub fn add_personal(&self, node: NodeId, relation: Relation, value: EdgeValue) -> Result<EdgeId> {
        self.check_attach(node, relation, &value)?;
        if relation.is_containment() && !self.can_contain(node, value.target)? {
            return Err(Error::CycleRejected { from: node, to: value.target });
        }
        if self.effective(node, relation)?.iter().any(|e| e.target == value.target) {
            return Err(Error::AlreadyExists(format!(
                "{node} already has {relation} target {}",
                value.target
            )));
        }

        let _tx = self.begin_change();
        let id = self.insert_edge(node, relation, relation.personal_table(), &value)?;
        self.on_attached(node, relation, id, &value)?;
        self.notify(node, relation.into());
        debug!(%node, %relation, edge = %id, target = %value.target, "edge added");
        Ok(id)
    }

    pub fn remove_personal(&self, node: NodeId, relation: Relation, edge: EdgeId) -> Result<()> {
        self.require(node)?;
        if !self.edge_ids(node, relation.personal_table())?.contains(&edge) {
            return Err(Error::NotFound(format!("{relation} edge {edge} is not personal to {node}")));
        }
        let removed = self.load_edge(edge, Origin::Personal)?;
        self.detach(node, &removed)?;
        debug!(%node, %relation, %edge, "edge removed");
        Ok(())
    }

    /// Copy an inherited edge into `node`'s overridden table. The copy
    /// shadows the original from then on.
    pub fn override_edge(&self, node: NodeId, relation: Relation, inherited_edge: EdgeId) -> Result<EdgeId> {
        self.require(node)?;
        let original = self.edge(inherited_edge)?;
        let local: HashSet<NodeId> = self
            .personal(node, relation)?
            .iter()
            .chain(&self.overridden(node, relation)?)
            .map(|e| e.target)
            .collect();
        if local.contains(&original.target) {
            return Err(Error::AlreadyExists(format!(
                "{node} already owns or overrides {relation} target {}",
                original.target
            )));
        }
        if !self.inherited(node, relation)?.iter().any(|e| e.id == inherited_edge) {
            return Err(Error::NotFound(format!(
                "{relation} edge {inherited_edge} is not inherited by {node}"
            )));
        }

        let _tx = self.begin_change();
        let was_default = self.is_default_space(node, relation, inherited_edge)?;
        let copy = self.insert_edge(node, relation, relation.overridden_table(), &original.value())?;
        if was_default {
            self.write_default_space(node, Some(copy))?;
        }
        self.notify(node, relation.into());
        debug!(%node, %relation, original = %inherited_edge, %copy, "edge overridden");
        Ok(copy)
    }

    pub fn remove_override(&self, node: NodeId, relation: Relation, edge: EdgeId) -> Result<()> {
        self.require(node)?;
        if !self.edge_ids(node, relation.overridden_table())?.contains(&edge) {
            return Err(Error::NotFound(format!("{relation} edge {edge} is not overridden by {node}")));
        }
        let removed = self.load_edge(edge, Origin::Overridden)?;
        self.detach(node, &removed)?;
        debug!(%node, %relation, %edge, "override removed");
        Ok(())
    }

    /// Destroy a stored edge of `owner` and run the relation's side effects.
    pub(crate) fn detach(&self, owner: NodeId, edge: &Valued) -> Result<()> {
        let _tx = self.begin_change();
        let was_default = self.is_default_space(owner, edge.relation, edge.id)?;
        self.destroy_edge(owner, edge.relation, edge.id)?;
        self.on_detached(owner, edge, was_default)?;
        self.notify(owner, edge.relation.into());
        Ok(())
    }

    // ========================================================================
    // Relation side effects
    // ========================================================================

    fn on_attached(&self, node: NodeId, relation: Relation, edge: EdgeId, value: &EdgeValue) -> Result<()> {
        match relation {
            Relation::Elements => self.element_attached(node, value.target, value.quantity.count()),
            Relation::Spaces => self.space_attached(node, edge),
            _ => Ok(()),
        }
    }

    pub(crate) fn on_detached(&self, node: NodeId, edge: &Valued, was_default: bool) -> Result<()> {
        match edge.relation {
            Relation::Elements if edge.origin == Origin::Personal => {
                self.element_detached(node, edge.target, edge.quantity.count())
            }
            Relation::Spaces if was_default => self.reelect_default_space(node, edge.target),
            _ => Ok(()),
        }
    }
}
