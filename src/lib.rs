//! # matter-rs: Semantic Entity Graph Kernel
//!
//! A typed graph of physical and chemical entities (elements, matter,
//! mixtures, physical objects, spaces) with multiple inheritance,
//! per-instance overrides and quantified relations.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `StorageBackend` is the contract between the kernel and storage
//! 2. **Clean DTOs**: `Node`, `Valued`, `Quantity`, `Value` cross all boundaries
//! 3. **One engine**: every relation resolves through the same override engine
//! 4. **Scoped changes**: writes run inside a nesting `ChangeGuard`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use matter_rs::{Graph, MatterKind, StateOfMatter, Quantity};
//!
//! # fn example() -> matter_rs::Result<()> {
//! let graph = Graph::open_memory()?;
//!
//! let hydrogen = graph.create_element("Hydrogen", "H", 1)?;
//! let oxygen = graph.create_element("Oxygen", "O", 8)?;
//! let water = graph.create_matter("Water", MatterKind::Substance, StateOfMatter::Liquid)?;
//!
//! graph.add_element(water, hydrogen, Quantity::exact(2.0))?;
//! graph.add_element(water, oxygen, Quantity::exact(1.0))?;
//! assert_eq!(graph.compact_formula(water)?, "H2O");
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage Backends
//!
//! | Backend | Description |
//! |---------|-------------|
//! | Memory | In-memory graph for testing/embedding |

use std::sync::Arc;

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod tx;
pub mod config;
pub mod notify;
pub mod entity;
pub mod resolve;
pub mod containment;
pub mod matter;
pub mod condition;
pub mod change;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Attribute, EdgeId, EdgeValue, EntityKind, EqualitySign, Family, MatterKind, Node, NodeId,
    ObjectKind, Origin, Quantity, QuantityChange, QuantityCondition, Relation, Role,
    StateOfMatter, Valued, Value, ValueSign,
};

// ============================================================================
// Re-exports: Storage, transactions, notifications
// ============================================================================

pub use storage::{BackendStats, MemoryBackend, StorageBackend};
pub use tx::{ChangeGuard, Transaction, TxId, TxMode};
pub use config::Settings;
pub use notify::{ChangeSink, NullSink, RecordingSink};

// ============================================================================
// Re-exports: Conditions and changes
// ============================================================================

pub use condition::{
    Condition, ConditionSet, ElementCondition, Instance, MatterCondition, MixtureCondition,
    PhysicalObjectCondition, Presence, Requirement, Subject,
};
pub use change::{
    Change, ElementChange, MatterChange, MixtureChange, PhysicalObjectChange, RelationChanges,
};

// ============================================================================
// Top-level Graph handle
// ============================================================================

/// The primary entry point. A `Graph` wraps a storage backend and exposes
/// the entity kernel over it. All state lives in the backend.
pub struct Graph<B: StorageBackend> {
    pub(crate) backend: B,
    pub(crate) settings: Settings,
    pub(crate) sink: Arc<dyn ChangeSink>,
    pub(crate) envelope: tx::Envelope,
}

impl<B: StorageBackend> Graph<B> {
    /// Create a Graph with the given backend and declare its tables.
    pub fn with_backend(backend: B) -> Result<Self> {
        storage::schema::define(&backend)?;
        Ok(Self {
            backend,
            settings: Settings::default(),
            sink: Arc::new(NullSink),
            envelope: tx::Envelope::new(),
        })
    }

    pub fn with_settings(mut self, settings: Settings) -> Result<Self> {
        settings.validate()?;
        self.settings = settings;
        Ok(self)
    }

    /// Route change notifications to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn ChangeSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Access the underlying backend (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// In-memory graph for testing and embedding.
impl Graph<storage::MemoryBackend> {
    pub fn open_memory() -> Result<Self> {
        let backend = storage::MemoryBackend::new();
        Self::with_backend(backend)
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cycle rejected: {from} cannot contain {to}")]
    CycleRejected { from: NodeId, to: NodeId },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
