//! Lifecycle event publication
//!
//! Events are best-effort notifications about committed transitions. A
//! publish failure is logged and never blocks or rolls back the transition
//! that produced it.

use coldvault_domain::DocumentId;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;

/// The lifecycle events the engine publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A document was uploaded and its record inserted
    Archived,

    /// A document moved to a colder tier
    MovedToTier,

    /// A restore job was initiated
    RestoreInitiated,

    /// A restore completed; the document is temporarily retrievable
    RestoreReady,

    /// A restore window lapsed
    RestoreExpired,
}

impl EventKind {
    /// Get the event name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Archived => "archived",
            EventKind::MovedToTier => "moved_to_tier",
            EventKind::RestoreInitiated => "restore_initiated",
            EventKind::RestoreReady => "restore_ready",
            EventKind::RestoreExpired => "restore_expired",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published event, as captured by [`MemoryEventSink`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// What happened
    pub kind: EventKind,

    /// Which document it happened to
    pub document_id: DocumentId,

    /// Event-specific details (tiers, expiry, estimate)
    pub payload: serde_json::Value,
}

/// Event delivery failure
#[derive(Error, Debug)]
#[error("Event delivery failed: {0}")]
pub struct EventError(
    /// Sink-specific reason
    pub String,
);

/// Destination for lifecycle events
///
/// Publication is synchronous and cheap by contract; sinks that talk to the
/// network must buffer internally.
pub trait EventSink: Send + Sync {
    /// Publish one event
    fn publish(
        &self,
        kind: EventKind,
        document_id: DocumentId,
        payload: serde_json::Value,
    ) -> Result<(), EventError>;
}

/// Sink that writes events to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn publish(
        &self,
        kind: EventKind,
        document_id: DocumentId,
        payload: serde_json::Value,
    ) -> Result<(), EventError> {
        tracing::info!("Event {} for document {}: {}", kind, document_id, payload);
        Ok(())
    }
}

/// Sink that captures events in memory, for tests
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<Event>>,
}

impl MemoryEventSink {
    /// An empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Every captured event, in publication order
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// How many events of `kind` were captured
    pub fn count(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }

    /// Drop all captured events
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventSink for MemoryEventSink {
    fn publish(
        &self,
        kind: EventKind,
        document_id: DocumentId,
        payload: serde_json::Value,
    ) -> Result<(), EventError> {
        self.events.lock().unwrap().push(Event {
            kind,
            document_id,
            payload,
        });
        Ok(())
    }
}

/// Publish an event, demoting a sink failure to a warning
///
/// The transition is already committed when this runs; the event must not
/// un-commit it.
pub(crate) fn emit(
    sink: &dyn EventSink,
    kind: EventKind,
    document_id: DocumentId,
    payload: serde_json::Value,
) -> bool {
    match sink.publish(kind, document_id, payload) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Dropping event {} for document {}: {}", kind, document_id, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_captures_in_order() {
        let sink = MemoryEventSink::new();
        let id = DocumentId::new();
        sink.publish(EventKind::Archived, id, serde_json::json!({})).unwrap();
        sink.publish(
            EventKind::MovedToTier,
            id,
            serde_json::json!({"new_tier": "archive"}),
        )
        .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Archived);
        assert_eq!(events[1].payload["new_tier"], "archive");
        assert_eq!(sink.count(EventKind::MovedToTier), 1);
        assert_eq!(sink.count(EventKind::RestoreReady), 0);
    }

    #[test]
    fn test_emit_swallows_sink_failures() {
        struct FailingSink;
        impl EventSink for FailingSink {
            fn publish(
                &self,
                _kind: EventKind,
                _document_id: DocumentId,
                _payload: serde_json::Value,
            ) -> Result<(), EventError> {
                Err(EventError("broker down".to_string()))
            }
        }

        assert!(!emit(
            &FailingSink,
            EventKind::RestoreReady,
            DocumentId::new(),
            serde_json::json!({}),
        ));
    }
}
