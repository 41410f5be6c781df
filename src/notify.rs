//! Change notifications.
//!
//! Every mutation names the node and attribute it touched. Inside a change
//! the notifications are queued by the transaction envelope and delivered
//! once, de-duplicated, when the outermost change closes.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::model::{Attribute, NodeId};

/// Receiver of attribute-change notifications.
pub trait ChangeSink: Send + Sync {
    fn on_attribute_changed(&self, node: NodeId, attribute: Attribute);
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ChangeSink for NullSink {
    fn on_attribute_changed(&self, _node: NodeId, _attribute: Attribute) {}
}

/// One delivered notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub node: NodeId,
    pub attribute: Attribute,
    pub at: DateTime<Utc>,
}

/// Keeps every notification it receives, stamped with the delivery time.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ChangeEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().clone()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<ChangeEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Attributes reported for `node`, in delivery order.
    pub fn changed(&self, node: NodeId) -> Vec<Attribute> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.node == node)
            .map(|e| e.attribute)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl ChangeSink for RecordingSink {
    fn on_attribute_changed(&self, node: NodeId, attribute: Attribute) {
        self.events.lock().push(ChangeEvent { node, attribute, at: Utc::now() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_filters_by_node() {
        let sink = RecordingSink::new();
        sink.on_attribute_changed(NodeId(1), Attribute::Name);
        sink.on_attribute_changed(NodeId(2), Attribute::Formula);
        sink.on_attribute_changed(NodeId(1), Attribute::Parents);

        assert_eq!(sink.changed(NodeId(1)), vec![Attribute::Name, Attribute::Parents]);
        assert_eq!(sink.take().len(), 3);
        assert!(sink.is_empty());
    }
}
