//! # Entity Model
//!
//! Plain DTOs of the entity graph: ids, kinds, quantities and valued edges.
//! These types cross every boundary: storage ↔ engine ↔ conditions ↔ user.
//!
//! Design rule: this module is pure data. No I/O, no state.

pub mod node;
pub mod valued;
pub mod quantity;
pub mod sign;
pub mod value;
pub mod attribute;

pub use node::{EntityKind, Family, MatterKind, Node, NodeId, ObjectKind, StateOfMatter};
pub use valued::{EdgeId, EdgeValue, Origin, Relation, Role, Valued};
pub use quantity::{Quantity, QuantityChange, QuantityCondition};
pub use sign::{EqualitySign, ValueSign};
pub use value::{FromValue, Value, ValueType};
pub use attribute::Attribute;
