//! Table layout of the entity kernel.
//!
//! ```text
//! entity    (node)  name, kind
//! parents   (node)  parent*          children (node) child*
//! element   (node)  symbol, atomic_number
//! matter    (node)  default_state, formula
//! object    (node)  default_space?
//! valued    (edge)  owner, relation, target, qty_min, qty_preferred, qty_max?,
//!                   state?, thickness?
//! <rel>.personal / <rel>.overridden (node)  edge*
//! ```

use super::{ColumnDef, OwnerType, StorageBackend};
use crate::model::{Relation, ValueType};
use crate::Result;

pub const ENTITY: &str = "entity";
pub const PARENTS: &str = "parents";
pub const CHILDREN: &str = "children";
pub const ELEMENT: &str = "element";
pub const MATTER: &str = "matter";
pub const OBJECT: &str = "object";
pub const VALUED: &str = "valued";

/// Column names.
pub mod col {
    pub const NAME: &str = "name";
    pub const KIND: &str = "kind";
    pub const PARENT: &str = "parent";
    pub const CHILD: &str = "child";
    pub const SYMBOL: &str = "symbol";
    pub const ATOMIC_NUMBER: &str = "atomic_number";
    pub const DEFAULT_STATE: &str = "default_state";
    pub const FORMULA: &str = "formula";
    pub const DEFAULT_SPACE: &str = "default_space";
    pub const OWNER: &str = "owner";
    pub const RELATION: &str = "relation";
    pub const TARGET: &str = "target";
    pub const QTY_MIN: &str = "qty_min";
    pub const QTY_PREFERRED: &str = "qty_preferred";
    pub const QTY_MAX: &str = "qty_max";
    pub const STATE: &str = "state";
    pub const THICKNESS: &str = "thickness";
    pub const EDGE: &str = "edge";
}

/// Tables holding one row per node, cleared when the node is removed.
pub const NODE_TABLES: [&str; 6] = [ENTITY, PARENTS, CHILDREN, ELEMENT, MATTER, OBJECT];

/// Declare every table. Called once per graph at construction.
pub fn define<B: StorageBackend>(backend: &B) -> Result<()> {
    use ValueType::*;

    backend.define_table(ENTITY, OwnerType::Node, &[
        ColumnDef::required(col::NAME, String),
        ColumnDef::required(col::KIND, String),
    ])?;
    backend.define_table(PARENTS, OwnerType::Node, &[ColumnDef::required(col::PARENT, Node)])?;
    backend.define_table(CHILDREN, OwnerType::Node, &[ColumnDef::required(col::CHILD, Node)])?;
    backend.define_table(ELEMENT, OwnerType::Node, &[
        ColumnDef::required(col::SYMBOL, String),
        ColumnDef::required(col::ATOMIC_NUMBER, Int),
    ])?;
    backend.define_table(MATTER, OwnerType::Node, &[
        ColumnDef::required(col::DEFAULT_STATE, String),
        ColumnDef::required(col::FORMULA, String),
    ])?;
    backend.define_table(OBJECT, OwnerType::Node, &[
        ColumnDef::optional(col::DEFAULT_SPACE, Edge),
    ])?;
    backend.define_table(VALUED, OwnerType::Edge, &[
        ColumnDef::required(col::OWNER, Node),
        ColumnDef::required(col::RELATION, String),
        ColumnDef::required(col::TARGET, Node),
        ColumnDef::required(col::QTY_MIN, Float),
        ColumnDef::required(col::QTY_PREFERRED, Float),
        ColumnDef::optional(col::QTY_MAX, Float),
        ColumnDef::optional(col::STATE, String),
        ColumnDef::optional(col::THICKNESS, Float),
    ])?;

    for relation in Relation::ALL {
        for table in [relation.personal_table(), relation.overridden_table()] {
            backend.define_table(table, OwnerType::Node, &[ColumnDef::required(col::EDGE, Edge)])?;
        }
    }
    Ok(())
}
