//! Node in the entity graph.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::Error;

/// Opaque node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Family root. Parents, relations and conditions never cross families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Family {
    Element,
    Matter,
    PhysicalObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatterKind {
    /// A pure chemical substance.
    Substance,
    /// Matter objects are made of (wood, glass, water).
    Material,
    /// A blend of substances and other mixtures.
    Mixture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    Tangible,
    Intangible,
    Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateOfMatter {
    Solid,
    Liquid,
    Gas,
    Plasma,
}

impl StateOfMatter {
    pub fn as_str(self) -> &'static str {
        match self {
            StateOfMatter::Solid => "solid",
            StateOfMatter::Liquid => "liquid",
            StateOfMatter::Gas => "gas",
            StateOfMatter::Plasma => "plasma",
        }
    }
}

impl FromStr for StateOfMatter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "solid" => Ok(StateOfMatter::Solid),
            "liquid" => Ok(StateOfMatter::Liquid),
            "gas" => Ok(StateOfMatter::Gas),
            "plasma" => Ok(StateOfMatter::Plasma),
            other => Err(Error::InvalidArgument(format!("unknown state of matter '{other}'"))),
        }
    }
}

impl fmt::Display for StateOfMatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of concrete entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Element,
    Matter(MatterKind),
    PhysicalObject(ObjectKind),
}

impl EntityKind {
    pub fn family(self) -> Family {
        match self {
            EntityKind::Element => Family::Element,
            EntityKind::Matter(_) => Family::Matter,
            EntityKind::PhysicalObject(_) => Family::PhysicalObject,
        }
    }

    pub fn matter_kind(self) -> Option<MatterKind> {
        match self {
            EntityKind::Matter(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn object_kind(self) -> Option<ObjectKind> {
        match self {
            EntityKind::PhysicalObject(kind) => Some(kind),
            _ => None,
        }
    }

    /// Storage tag, e.g. `"matter:mixture"`.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Element => "element",
            EntityKind::Matter(MatterKind::Substance) => "matter:substance",
            EntityKind::Matter(MatterKind::Material) => "matter:material",
            EntityKind::Matter(MatterKind::Mixture) => "matter:mixture",
            EntityKind::PhysicalObject(ObjectKind::Tangible) => "object:tangible",
            EntityKind::PhysicalObject(ObjectKind::Intangible) => "object:intangible",
            EntityKind::PhysicalObject(ObjectKind::Space) => "object:space",
        }
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "element" => EntityKind::Element,
            "matter:substance" => EntityKind::Matter(MatterKind::Substance),
            "matter:material" => EntityKind::Matter(MatterKind::Material),
            "matter:mixture" => EntityKind::Matter(MatterKind::Mixture),
            "object:tangible" => EntityKind::PhysicalObject(ObjectKind::Tangible),
            "object:intangible" => EntityKind::PhysicalObject(ObjectKind::Intangible),
            "object:space" => EntityKind::PhysicalObject(ObjectKind::Space),
            other => return Err(Error::InvalidArgument(format!("unknown entity kind '{other}'"))),
        };
        Ok(kind)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in the entity graph (read snapshot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: EntityKind,
    /// Personal parents in insertion order.
    pub parents: SmallVec<[NodeId; 2]>,
}

impl Node {
    pub fn new(id: NodeId, name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            parents: SmallVec::new(),
        }
    }

    pub fn with_parents(mut self, parents: impl IntoIterator<Item = NodeId>) -> Self {
        self.parents = parents.into_iter().collect();
        self
    }

    pub fn family(&self) -> Family {
        self.kind.family()
    }

    pub fn has_parent(&self, parent: NodeId) -> bool {
        self.parents.contains(&parent)
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Name first, then id; the remaining fields keep the order total.
impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then(self.id.cmp(&other.id))
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.parents.cmp(&other.parents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_round_trip() {
        for kind in [
            EntityKind::Element,
            EntityKind::Matter(MatterKind::Mixture),
            EntityKind::PhysicalObject(ObjectKind::Space),
        ] {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("object:cloud".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_node_ordering_by_name_then_id() {
        let a = Node::new(NodeId(9), "Apple", EntityKind::Element);
        let b = Node::new(NodeId(1), "Banana", EntityKind::Element);
        let b2 = Node::new(NodeId(2), "Banana", EntityKind::Element);
        let mut nodes = vec![b2.clone(), a.clone(), b.clone()];
        nodes.sort();
        assert_eq!(nodes, vec![a, b, b2]);
    }

    #[test]
    fn test_family_of_kind() {
        assert_eq!(EntityKind::Matter(MatterKind::Substance).family(), Family::Matter);
        assert_eq!(
            EntityKind::PhysicalObject(ObjectKind::Tangible).object_kind(),
            Some(ObjectKind::Tangible)
        );
    }
}
