//! Attribute names reported to the change sink.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Relation;

/// A named attribute of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    Name,
    Parents,
    Children,
    Symbol,
    AtomicNumber,
    DefaultState,
    Formula,
    DefaultSpace,
    /// Any view of a relation (personal, overridden or a stored edge).
    Relation(Relation),
}

impl Attribute {
    pub fn as_str(self) -> &'static str {
        match self {
            Attribute::Name => "name",
            Attribute::Parents => "parents",
            Attribute::Children => "children",
            Attribute::Symbol => "symbol",
            Attribute::AtomicNumber => "atomic_number",
            Attribute::DefaultState => "default_state",
            Attribute::Formula => "formula",
            Attribute::DefaultSpace => "default_space",
            Attribute::Relation(relation) => relation.as_str(),
        }
    }
}

impl From<Relation> for Attribute {
    fn from(relation: Relation) -> Self {
        Attribute::Relation(relation)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
