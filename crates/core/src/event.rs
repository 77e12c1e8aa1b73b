//! Domain events emitted by the response pipeline and rule administration.
//!
//! Subscribers (the SSE endpoint, tests) observe routing decisions and
//! degradations without the pipeline knowing who is listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// An inbound message was accepted for a session
    MessageReceived {
        session_id: String,
        kind: String,
        content_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// A rule answered the message directly
    RuleMatched {
        session_id: String,
        rule_id: i64,
        timestamp: DateTime<Utc>,
    },

    /// The orchestrator picked an inference branch
    RouteSelected {
        session_id: String,
        route: String,
        timestamp: DateTime<Utc>,
    },

    /// The rule cache was rebuilt
    RulesReloaded {
        active: usize,
        skipped: usize,
        generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// An external call failed or timed out and the pipeline degraded
    ExternalCallDegraded {
        session_id: String,
        call: String,
        outcome: String,
        timestamp: DateTime<Utc>,
    },

    /// A reply was produced
    ReplyGenerated {
        session_id: String,
        kind: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A user rated an assistant turn
    FeedbackRecorded {
        session_id: String,
        turn_id: i64,
        score: i32,
        timestamp: DateTime<Utc>,
    },

    /// An administrator corrected an assistant turn
    TurnCorrected {
        session_id: String,
        turn_id: i64,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred outside the reply path (persistence, reload)
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
