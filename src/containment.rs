//! Containment graph: spaces, parts and covers.
//!
//! An object contains whatever its effective Spaces, Parts and Covers
//! target. Containment is inherited downward, so a node also contains what
//! its ancestors contain. No object may end up containing itself.

use std::collections::VecDeque;

use hashbrown::HashSet;
use tracing::{debug, trace};

use crate::model::*;
use crate::storage::schema::{self, col};
use crate::storage::StorageBackend;
use crate::{Error, Graph, Result};

impl<B: StorageBackend> Graph<B> {
    // ========================================================================
    // Cycle guard
    // ========================================================================

    /// Whether an edge `container → target` keeps the containment graph
    /// acyclic.
    ///
    /// Walks upward from `container` through everything that (transitively)
    /// contains it, plus the descendants of every visited node since they
    /// inherit its edges. The edge is rejected if `target` is met.
    pub fn can_contain(&self, container: NodeId, target: NodeId) -> Result<bool> {
        self.require(container)?;
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([container]);
        while let Some(node) = queue.pop_front() {
            if node == target {
                trace!(%container, %target, via = %node, "containment cycle");
                return Ok(false);
            }
            if !seen.insert(node) {
                continue;
            }
            queue.extend(self.containers_of(node)?);
            queue.extend(self.children(node)?);
        }
        Ok(true)
    }

    /// Owners of stored containment edges targeting `node`.
    pub fn containers_of(&self, node: NodeId) -> Result<Vec<NodeId>> {
        self.stored_owners(node, Relation::is_containment)
    }

    fn stored_owners(&self, node: NodeId, accept: impl Fn(Relation) -> bool) -> Result<Vec<NodeId>> {
        let mut owners = Vec::new();
        for row in self.backend.select_where(schema::VALUED, col::TARGET, &node.into())? {
            let relation: Relation = self.read::<String>(row, schema::VALUED, col::RELATION)?.parse()?;
            if !accept(relation) {
                continue;
            }
            let owner: NodeId = self.read(row, schema::VALUED, col::OWNER)?;
            if !owners.contains(&owner) {
                owners.push(owner);
            }
        }
        Ok(owners)
    }

    // ========================================================================
    // Spaces
    // ========================================================================

    pub fn add_space(&self, object: NodeId, value: EdgeValue) -> Result<EdgeId> {
        self.add_personal(object, Relation::Spaces, value)
    }

    pub fn remove_space(&self, object: NodeId, edge: EdgeId) -> Result<()> {
        self.remove_personal(object, Relation::Spaces, edge)
    }

    pub fn spaces(&self, object: NodeId) -> Result<Vec<Valued>> {
        self.effective(object, Relation::Spaces)
    }

    /// The stored default space while it is still effective, else the first
    /// effective space.
    pub fn default_space(&self, object: NodeId) -> Result<Option<Valued>> {
        self.require_family(object, Family::PhysicalObject)?;
        let stored: Option<EdgeId> = self.read(object, schema::OBJECT, col::DEFAULT_SPACE)?;
        let mut effective = self.effective(object, Relation::Spaces)?;
        if let Some(pos) = stored.and_then(|id| effective.iter().position(|e| e.id == id)) {
            return Ok(Some(effective.swap_remove(pos)));
        }
        Ok(effective.into_iter().next())
    }

    pub fn set_default_space(&self, object: NodeId, edge: EdgeId) -> Result<()> {
        if !self.spaces(object)?.iter().any(|e| e.id == edge) {
            return Err(Error::NotFound(format!("space edge {edge} is not effective on {object}")));
        }
        self.write_default_space(object, Some(edge))
    }

    pub(crate) fn write_default_space(&self, object: NodeId, edge: Option<EdgeId>) -> Result<()> {
        self.write(object, Attribute::DefaultSpace, object, schema::OBJECT, col::DEFAULT_SPACE, edge)
    }

    pub(crate) fn is_default_space(&self, object: NodeId, relation: Relation, edge: EdgeId) -> Result<bool> {
        if relation != Relation::Spaces {
            return Ok(false);
        }
        Ok(self.default_space(object)?.is_some_and(|e| e.id == edge))
    }

    /// A new space becomes the default when the object has none.
    pub(crate) fn space_attached(&self, object: NodeId, edge: EdgeId) -> Result<()> {
        let stored: Option<EdgeId> = self.read(object, schema::OBJECT, col::DEFAULT_SPACE)?;
        let live = match stored {
            Some(id) => self.spaces(object)?.iter().any(|e| e.id == id),
            None => false,
        };
        if !live {
            self.write_default_space(object, Some(edge))?;
        }
        Ok(())
    }

    /// The default space was removed: prefer an effective edge to the same
    /// target (an override falling back to its original), else the first.
    pub(crate) fn reelect_default_space(&self, object: NodeId, target: NodeId) -> Result<()> {
        let spaces = self.spaces(object)?;
        let next = spaces
            .iter()
            .find(|e| e.target == target)
            .or_else(|| spaces.first())
            .map(|e| e.id);
        debug!(%object, default = ?next, "default space re-elected");
        self.write_default_space(object, next)
    }

    // ========================================================================
    // Parts and covers
    // ========================================================================

    pub fn add_part(&self, whole: NodeId, part: NodeId, quantity: Quantity) -> Result<EdgeId> {
        let value = self.valued(Relation::Parts, part)?.with_quantity(quantity);
        self.add_personal(whole, Relation::Parts, value)
    }

    pub fn remove_part(&self, whole: NodeId, edge: EdgeId) -> Result<()> {
        self.remove_personal(whole, Relation::Parts, edge)
    }

    pub fn parts(&self, whole: NodeId) -> Result<Vec<Valued>> {
        self.effective(whole, Relation::Parts)
    }

    /// Owners of stored part edges targeting `part`.
    pub fn wholes(&self, part: NodeId) -> Result<Vec<NodeId>> {
        self.require(part)?;
        self.stored_owners(part, |r| r == Relation::Parts)
    }

    pub fn add_cover(&self, object: NodeId, cover: NodeId, thickness: f64) -> Result<EdgeId> {
        if !thickness.is_finite() || thickness < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "cover thickness must be finite and non-negative, got {thickness}"
            )));
        }
        let value = self
            .valued(Relation::Covers, cover)?
            .with_role(Role::Cover { thickness });
        self.add_personal(object, Relation::Covers, value)
    }

    pub fn remove_cover(&self, object: NodeId, edge: EdgeId) -> Result<()> {
        self.remove_personal(object, Relation::Covers, edge)
    }

    pub fn covers(&self, object: NodeId) -> Result<Vec<Valued>> {
        self.effective(object, Relation::Covers)
    }
}
