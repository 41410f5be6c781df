//! Valued relationships: "this much of that".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{EntityKind, MatterKind, NodeId, ObjectKind, Quantity, StateOfMatter};
use crate::Error;

/// Opaque valued-edge identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attribute families resolved through inheritance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Relation {
    /// Elements of any matter.
    Elements,
    /// Substances (or materials) blended into a mixture.
    Substances,
    /// Mixtures blended into a mixture.
    Mixtures,
    /// Matter a tangible object is made of.
    Matter,
    /// Spaces a physical object offers.
    Spaces,
    /// Parts of a tangible whole.
    Parts,
    /// Covers of a tangible object.
    Covers,
}

impl Relation {
    pub const ALL: [Relation; 7] = [
        Relation::Elements,
        Relation::Substances,
        Relation::Mixtures,
        Relation::Matter,
        Relation::Spaces,
        Relation::Parts,
        Relation::Covers,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Relation::Elements => "elements",
            Relation::Substances => "substances",
            Relation::Mixtures => "mixtures",
            Relation::Matter => "matter",
            Relation::Spaces => "spaces",
            Relation::Parts => "parts",
            Relation::Covers => "covers",
        }
    }

    pub fn personal_table(self) -> &'static str {
        match self {
            Relation::Elements => "elements.personal",
            Relation::Substances => "substances.personal",
            Relation::Mixtures => "mixtures.personal",
            Relation::Matter => "matter.personal",
            Relation::Spaces => "spaces.personal",
            Relation::Parts => "parts.personal",
            Relation::Covers => "covers.personal",
        }
    }

    pub fn overridden_table(self) -> &'static str {
        match self {
            Relation::Elements => "elements.overridden",
            Relation::Substances => "substances.overridden",
            Relation::Mixtures => "mixtures.overridden",
            Relation::Matter => "matter.overridden",
            Relation::Spaces => "spaces.overridden",
            Relation::Parts => "parts.overridden",
            Relation::Covers => "covers.overridden",
        }
    }

    /// Relations whose edges nest one physical thing inside another.
    pub fn is_containment(self) -> bool {
        matches!(self, Relation::Spaces | Relation::Parts | Relation::Covers)
    }

    pub fn accepts_owner(self, kind: EntityKind) -> bool {
        use EntityKind::*;
        match self {
            Relation::Elements => matches!(kind, Matter(_)),
            Relation::Substances | Relation::Mixtures => kind == Matter(MatterKind::Mixture),
            Relation::Matter | Relation::Parts | Relation::Covers => {
                kind == PhysicalObject(ObjectKind::Tangible)
            }
            Relation::Spaces => matches!(kind, PhysicalObject(_)),
        }
    }

    pub fn accepts_target(self, kind: EntityKind) -> bool {
        use EntityKind::*;
        match self {
            Relation::Elements => kind == Element,
            Relation::Substances => {
                matches!(kind, Matter(MatterKind::Substance | MatterKind::Material))
            }
            Relation::Mixtures => kind == Matter(MatterKind::Mixture),
            Relation::Matter => matches!(kind, Matter(_)),
            Relation::Spaces => matches!(kind, PhysicalObject(_)),
            Relation::Parts | Relation::Covers => kind == PhysicalObject(ObjectKind::Tangible),
        }
    }

    pub fn accepts_role(self, role: &Role) -> bool {
        match self {
            Relation::Elements | Relation::Spaces | Relation::Parts => matches!(role, Role::Plain),
            Relation::Substances | Relation::Mixtures | Relation::Matter => {
                matches!(role, Role::Matter { .. })
            }
            Relation::Covers => matches!(role, Role::Cover { .. }),
        }
    }
}

impl FromStr for Relation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Relation::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown relation '{s}'")))
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role-local attributes of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Role {
    Plain,
    Matter { state: StateOfMatter },
    Cover { thickness: f64 },
}

impl Role {
    pub fn state(&self) -> Option<StateOfMatter> {
        match self {
            Role::Matter { state } => Some(*state),
            _ => None,
        }
    }

    pub fn thickness(&self) -> Option<f64> {
        match self {
            Role::Cover { thickness } => Some(*thickness),
            _ => None,
        }
    }
}

/// The value part of an edge: target, quantity and role.
///
/// Used as the template for new edges and for value equality between
/// edges of different owners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeValue {
    pub target: NodeId,
    pub quantity: Quantity,
    pub role: Role,
}

impl EdgeValue {
    pub fn new(target: NodeId, quantity: Quantity, role: Role) -> Self {
        Self { target, quantity, role }
    }

    pub fn with_quantity(mut self, quantity: Quantity) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

/// Where an edge in a resolved view comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    Personal,
    Inherited,
    Overridden,
}

/// A stored valued edge as seen from a node's resolved view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valued {
    pub id: EdgeId,
    pub relation: Relation,
    /// Node whose table stores the edge. For inherited edges this is the
    /// ancestor that owns it.
    pub owner: NodeId,
    pub target: NodeId,
    pub quantity: Quantity,
    pub role: Role,
    pub origin: Origin,
}

impl Valued {
    pub fn value(&self) -> EdgeValue {
        EdgeValue::new(self.target, self.quantity, self.role)
    }

    pub fn is_inherited(&self) -> bool {
        self.origin == Origin::Inherited
    }
}
