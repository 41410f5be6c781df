//! Transaction management.
//!
//! Every write runs inside a `ChangeGuard`. Guards nest: only the outermost
//! acquisition opens the backend change, and only the outermost release
//! closes it and flushes the queued notifications. The guard holds a
//! re-entrant lock, so one thread may nest freely while other writers wait.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::model::{Attribute, NodeId};
use crate::storage::StorageBackend;
use crate::Graph;

/// Transaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxMode {
    /// Ordinary mutation.
    Change,
    /// Removal cascade: referential checks are suspended until it closes.
    Remove,
}

/// Opaque transaction identifier. Nested guards share the id of the
/// outermost one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub u64);

/// Implemented by every guard that scopes a backend change.
pub trait Transaction {
    fn mode(&self) -> TxMode;
    fn id(&self) -> TxId;
}

// ============================================================================
// Envelope (per graph)
// ============================================================================

#[derive(Debug, Default)]
struct EnvelopeState {
    depth: usize,
    batch_depth: usize,
    current: Option<TxId>,
    removing: bool,
    pending: Vec<(NodeId, Attribute)>,
}

/// Nesting state shared by all guards of one graph.
#[derive(Debug)]
pub struct Envelope {
    lock: ReentrantMutex<RefCell<EnvelopeState>>,
    next_tx: AtomicU64,
}

impl Envelope {
    pub fn new() -> Self {
        Self {
            lock: ReentrantMutex::new(RefCell::new(EnvelopeState::default())),
            next_tx: AtomicU64::new(1),
        }
    }

    /// Current nesting depth of change guards on this thread's view.
    pub fn depth(&self) -> usize {
        self.lock.lock().borrow().depth
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ChangeGuard
// ============================================================================

/// Scoped change. Dropping the outermost guard closes the backend change and
/// delivers the queued notifications.
pub struct ChangeGuard<'g, B: StorageBackend> {
    graph: &'g Graph<B>,
    state: ReentrantMutexGuard<'g, RefCell<EnvelopeState>>,
    id: TxId,
    mode: TxMode,
}

impl<'g, B: StorageBackend> ChangeGuard<'g, B> {
    fn acquire(graph: &'g Graph<B>, mode: TxMode) -> Self {
        let state = graph.envelope.lock.lock();
        let id = {
            let mut s = state.borrow_mut();
            s.depth += 1;
            if s.depth == 1 {
                let id = TxId(graph.envelope.next_tx.fetch_add(1, Ordering::Relaxed));
                s.current = Some(id);
                graph.backend.start_change();
                trace!(tx = id.0, "change opened");
            }
            if mode == TxMode::Remove && !s.removing {
                s.removing = true;
                graph.backend.start_remove();
            }
            s.current.unwrap_or(TxId(0))
        };
        Self { graph, state, id, mode }
    }

    /// Nesting depth including this guard.
    pub fn depth(&self) -> usize {
        self.state.borrow().depth
    }
}

impl<B: StorageBackend> Transaction for ChangeGuard<'_, B> {
    fn mode(&self) -> TxMode {
        self.mode
    }

    fn id(&self) -> TxId {
        self.id
    }
}

impl<B: StorageBackend> Drop for ChangeGuard<'_, B> {
    fn drop(&mut self) {
        let pending = {
            let mut s = self.state.borrow_mut();
            s.depth -= 1;
            if s.depth > 0 {
                return;
            }
            s.current = None;
            s.removing = false;
            std::mem::take(&mut s.pending)
        };

        self.graph.backend.stop_change();
        trace!(tx = self.id.0, notifications = pending.len(), "change closed");
        for (node, attribute) in pending {
            self.graph.sink.on_attribute_changed(node, attribute);
        }
    }
}

// ============================================================================
// BatchGuard
// ============================================================================

/// Scoped backend batch of independent writes.
pub struct BatchGuard<'g, B: StorageBackend> {
    graph: &'g Graph<B>,
    state: ReentrantMutexGuard<'g, RefCell<EnvelopeState>>,
}

impl<B: StorageBackend> Drop for BatchGuard<'_, B> {
    fn drop(&mut self) {
        let mut s = self.state.borrow_mut();
        s.batch_depth -= 1;
        if s.batch_depth == 0 {
            self.graph.backend.query_commit();
        }
    }
}

// ============================================================================
// Graph entry points
// ============================================================================

impl<B: StorageBackend> Graph<B> {
    /// Open (or nest into) a change.
    pub fn begin_change(&self) -> ChangeGuard<'_, B> {
        ChangeGuard::acquire(self, TxMode::Change)
    }

    /// Open (or nest into) a change and flag it as a removal cascade.
    pub fn begin_remove(&self) -> ChangeGuard<'_, B> {
        ChangeGuard::acquire(self, TxMode::Remove)
    }

    /// Open (or nest into) a backend batch.
    pub fn begin_batch(&self) -> BatchGuard<'_, B> {
        let state = self.envelope.lock.lock();
        {
            let mut s = state.borrow_mut();
            s.batch_depth += 1;
            if s.batch_depth == 1 {
                self.backend.query_begin();
            }
        }
        BatchGuard { graph: self, state }
    }

    /// Report a changed attribute. Queued while a change is open, delivered
    /// immediately otherwise.
    pub fn notify(&self, node: NodeId, attribute: Attribute) {
        let state = self.envelope.lock.lock();
        {
            let mut s = state.borrow_mut();
            if s.depth > 0 {
                if !s.pending.contains(&(node, attribute)) {
                    s.pending.push((node, attribute));
                }
                return;
            }
        }
        drop(state);
        self.sink.on_attribute_changed(node, attribute);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::notify::RecordingSink;

    #[test]
    fn test_nested_guards_open_one_change() {
        let sink = Arc::new(RecordingSink::new());
        let graph = Graph::open_memory().unwrap().with_sink(sink.clone());

        {
            let outer = graph.begin_change();
            let inner = graph.begin_change();
            assert_eq!(inner.depth(), 2);
            assert_eq!(inner.id(), outer.id());
            graph.notify(NodeId(7), Attribute::Name);
            graph.notify(NodeId(7), Attribute::Formula);
            graph.notify(NodeId(7), Attribute::Name);
            drop(inner);
            assert!(sink.is_empty());
        }

        assert_eq!(graph.backend().stats().changes, 1);
        assert_eq!(sink.changed(NodeId(7)), vec![Attribute::Name, Attribute::Formula]);
    }

    #[test]
    fn test_remove_flag_once_per_change() {
        let graph = Graph::open_memory().unwrap();
        {
            let outer = graph.begin_remove();
            let _inner = graph.begin_remove();
            assert_eq!(outer.mode(), TxMode::Remove);
        }
        {
            let _plain = graph.begin_change();
        }
        let stats = graph.backend().stats();
        assert_eq!((stats.changes, stats.removals), (2, 1));
        assert_eq!(graph.envelope.depth(), 0);
    }

    #[test]
    fn test_notify_outside_change_is_immediate() {
        let sink = Arc::new(RecordingSink::new());
        let graph = Graph::open_memory().unwrap().with_sink(sink.clone());
        graph.notify(NodeId(1), Attribute::Children);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_batches_nest() {
        let graph = Graph::open_memory().unwrap();
        {
            let _a = graph.begin_batch();
            let _b = graph.begin_batch();
        }
        assert_eq!(graph.backend().stats().batches, 1);
    }
}
