//! Event bus - decoupled progress-fact delivery
//!
//! Producers (trackers, the proficiency engine) publish named events;
//! consumers (summary aggregators, gamification UIs) subscribe by name.
//! Delivery is synchronous, in-process, ordered by subscription order and
//! at-most-once per publish, with no persistence or replay: a handler
//! registered after a publish never sees it. A failing handler is logged
//! and must not prevent later handlers from running.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Event fired whenever a practice answer changes completion state
pub const PRACTICE_PROGRESS_SAVED: &str = "practiceProgressSaved";
/// Event fired on every accepted (non-duplicate) quiz answer
pub const QUIZ_PROGRESS: &str = "quizProgress";
/// Event fired when a lesson's proficiency level is explicitly changed
pub const LEVEL_CHANGED: &str = "levelChanged";

/// Payload delivered to subscribers: which lesson, plus event-specific data
#[derive(Debug, Clone)]
pub struct EventPayload {
    pub lesson_id: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl EventPayload {
    pub fn new(lesson_id: &str, data: serde_json::Value) -> Self {
        Self {
            lesson_id: lesson_id.to_string(),
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Type alias for subscriber handler functions
pub type HandlerFn = Arc<dyn Fn(&EventPayload) -> Result<()> + Send + Sync>;

struct Subscriber {
    name: String,
    handler: HandlerFn,
}

/// Process-wide publish/subscribe channel
pub struct EventBus {
    subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: Mutex::new(HashMap::new()),
        })
    }

    /// Register a named handler for an event; handlers fire in
    /// subscription order
    pub fn subscribe(&self, event: &str, name: &str, handler: HandlerFn) {
        let mut subs = self.subscribers.lock().unwrap();
        subs.entry(event.to_string()).or_default().push(Subscriber {
            name: name.to_string(),
            handler,
        });
        debug!("Subscribed '{}' to event '{}'", name, event);
    }

    /// Remove a handler by name; returns whether anything was removed
    pub fn unsubscribe(&self, event: &str, name: &str) -> bool {
        let mut subs = self.subscribers.lock().unwrap();
        if let Some(handlers) = subs.get_mut(event) {
            let before = handlers.len();
            handlers.retain(|s| s.name != name);
            handlers.len() < before
        } else {
            false
        }
    }

    /// Deliver `payload` to every current subscriber of `event`.
    ///
    /// Returns the number of handlers that ran without error.
    pub fn publish(&self, event: &str, payload: &EventPayload) -> usize {
        // Snapshot the handler list so a handler may subscribe or publish
        // without deadlocking; late registrations miss this publish
        let handlers: Vec<(String, HandlerFn)> = {
            let subs = self.subscribers.lock().unwrap();
            subs.get(event)
                .map(|hs| hs.iter().map(|s| (s.name.clone(), s.handler.clone())).collect())
                .unwrap_or_default()
        };

        let mut delivered = 0;
        for (name, handler) in handlers {
            match handler(payload) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Handler '{}' for event '{}' failed: {}", name, event, e);
                }
            }
        }

        debug!("Published '{}' for lesson '{}' to {} handler(s)", event, payload.lesson_id, delivered);
        delivered
    }

    /// Number of subscribers across all events
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().values().map(|v| v.len()).sum()
    }
}
