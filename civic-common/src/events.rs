//! Engine events and the broadcast bus that carries them
//!
//! Events are emitted after the owning transaction commits, so a subscriber
//! never observes state that was rolled back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Interactive element engine events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// An element was attached to a section
    ElementCreated {
        element_id: i64,
        section_id: i64,
        book_id: i64,
        timestamp: DateTime<Utc>,
    },

    /// An element and all of its responses were removed
    ElementDeleted {
        element_id: i64,
        book_id: i64,
        removed_responses: u64,
        timestamp: DateTime<Utc>,
    },

    /// A graded response was stored
    ResponseRecorded {
        response_id: i64,
        user_id: i64,
        element_id: i64,
        book_id: i64,
        score: i64,
        completion_status: String,
        /// First completed response for this (user, element)
        new_completion: bool,
        timestamp: DateTime<Utc>,
    },

    /// A user's per-book aggregate changed
    ProgressUpdated {
        user_id: i64,
        book_id: i64,
        completion_percentage: i64,
        total_points_earned: i64,
        required_completed: bool,
        timestamp: DateTime<Utc>,
    },
}

impl EngineEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::ElementCreated { .. } => "ElementCreated",
            EngineEvent::ElementDeleted { .. } => "ElementDeleted",
            EngineEvent::ResponseRecorded { .. } => "ResponseRecorded",
            EngineEvent::ProgressUpdated { .. } => "ProgressUpdated",
        }
    }
}

/// Broadcast bus for [`EngineEvent`]s
///
/// Cloning shares the underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event; `Err` when nobody is subscribed
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: EngineEvent,
    ) -> Result<usize, broadcast::error::SendError<EngineEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the absence of subscribers
    pub fn emit_lossy(&self, event: EngineEvent) {
        let event_type = event.event_type();
        if self.tx.send(event).is_err() {
            debug!(event_type, "No subscribers for engine event");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
