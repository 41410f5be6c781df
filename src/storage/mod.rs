//! # Storage Backend Trait
//!
//! This is THE contract between the entity kernel and any row store.
//! Rows are addressed by `(row id, table, column)`; a table may hold
//! several rows per id (relation tables) or exactly one (attribute tables).
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryBackend` | `memory` | In-memory for testing/embedding |

pub mod memory;
pub mod schema;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::Result;

pub use memory::MemoryBackend;

// ============================================================================
// Row identity
// ============================================================================

/// Backend row key. Nodes and edges share one id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(pub u64);

impl From<NodeId> for RowId {
    fn from(id: NodeId) -> Self { RowId(id.0) }
}

impl From<EdgeId> for RowId {
    fn from(id: EdgeId) -> Self { RowId(id.0) }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Schema declaration
// ============================================================================

/// What kind of row id owns the rows of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerType {
    Node,
    Edge,
}

/// One column of a table declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ValueType,
    pub nullable: bool,
}

impl ColumnDef {
    pub const fn required(name: &'static str, ty: ValueType) -> Self {
        Self { name, ty, nullable: false }
    }

    pub const fn optional(name: &'static str, ty: ValueType) -> Self {
        Self { name, ty, nullable: true }
    }
}

// ============================================================================
// Backend statistics
// ============================================================================

/// Counters a backend keeps about the batches it has seen.
///
/// All fields default to zero. Backends override via `stats()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    /// Completed outermost change transactions.
    pub changes: u64,
    /// Change transactions flagged as removals.
    pub removals: u64,
    /// Completed `query_begin`/`query_commit` batches.
    pub batches: u64,
    /// Individual row writes (insert, update, remove).
    pub writes: u64,
}

// ============================================================================
// StorageBackend Trait
// ============================================================================

/// The universal storage contract.
///
/// Reads never require an open change; writes do. Backends are expected to
/// reject writes outside `start_change`/`stop_change` with
/// `Error::TxError`.
pub trait StorageBackend: Send + Sync + 'static {
    // ========================================================================
    // Schema
    // ========================================================================

    /// Declare a table. Declaring the same table twice with the same
    /// columns is a no-op.
    fn define_table(&self, table: &str, owner: OwnerType, columns: &[ColumnDef]) -> Result<()>;

    /// Hand out a fresh row id, unique for the lifetime of the backend.
    fn allocate_id(&self) -> RowId;

    // ========================================================================
    // Reads
    // ========================================================================

    /// Read one column of the first row `id` owns in `table`.
    /// Fails with `Error::NotFound` if `id` owns no row there.
    fn select(&self, id: RowId, table: &str, column: &str) -> Result<Value>;

    /// Read one column of every row `id` owns in `table`, in insertion order.
    fn select_all(&self, id: RowId, table: &str, column: &str) -> Result<Vec<Value>>;

    /// Ids owning at least one row of `table` whose `column` equals `value`.
    fn select_where(&self, table: &str, column: &str, value: &Value) -> Result<Vec<RowId>>;

    /// Whether `id` owns any row in `table`.
    fn has_row(&self, id: RowId, table: &str) -> Result<bool>;

    /// Every id owning rows in `table`, ascending.
    fn ids(&self, table: &str) -> Result<Vec<RowId>>;

    // ========================================================================
    // Writes
    // ========================================================================

    /// Append a row. Columns not listed are stored as `Null`.
    fn insert(&self, id: RowId, table: &str, columns: &[&str], values: Vec<Value>) -> Result<()>;

    /// Overwrite one column of the first row `id` owns in `table`.
    fn update(&self, id: RowId, table: &str, column: &str, value: Value) -> Result<()>;

    /// Delete every row `id` owns in `table`. Returns the number removed.
    fn remove(&self, id: RowId, table: &str) -> Result<usize>;

    /// Delete the rows `id` owns in `table` whose `column` equals `value`.
    fn remove_value(&self, id: RowId, table: &str, column: &str, value: &Value) -> Result<usize>;

    // ========================================================================
    // Batch boundaries
    // ========================================================================

    /// Outermost change of one graph opened. Graphs sharing a backend may
    /// open changes that overlap, so backends count them.
    fn start_change(&self);

    /// Outermost change of one graph closed.
    fn stop_change(&self);

    /// The open change is a removal cascade; integrity checks that only
    /// apply to live objects may be skipped until its `stop_change`.
    fn start_remove(&self);

    /// Begin a batch of independent writes.
    ///
    /// Default: no-op. Override for backends that can bulk-insert.
    fn query_begin(&self) {}

    /// Flush a batch of independent writes.
    fn query_commit(&self) {}

    // ========================================================================
    // Introspection
    // ========================================================================

    fn stats(&self) -> BackendStats {
        BackendStats::default()
    }
}
