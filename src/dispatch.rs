//! Event dispatch to registered consumers.
//!
//! Consumers attach either a callback handler per event kind via
//! [`Dispatcher::register`] (invoked in registration order, failures
//! isolated) or a broadcast receiver via [`Dispatcher::subscribe`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::HandlerError;
use crate::event::{EventKind, StreamEvent};

type HandlerFn = dyn Fn(&StreamEvent) -> std::result::Result<(), HandlerError> + Send + Sync;

struct HandlerEntry {
    id: u64,
    handler: Arc<HandlerFn>,
}

/// Fan-out point for domain events.
pub struct Dispatcher {
    /// Registered handlers per event kind, in registration order
    handlers: Mutex<HashMap<EventKind, Vec<HandlerEntry>>>,
    /// Channel-style consumers
    event_tx: broadcast::Sender<StreamEvent>,
    /// Next handler ID
    next_id: AtomicU64,
}

impl Dispatcher {
    /// Create a new dispatcher with the given broadcast buffer size.
    pub fn new(event_buffer_size: usize) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(event_buffer_size);

        Arc::new(Self {
            handlers: Mutex::new(HashMap::new()),
            event_tx,
            next_id: AtomicU64::new(0),
        })
    }

    /// Register a handler for one event kind.
    ///
    /// Handlers for a kind run in registration order. A handler returning an
    /// error is logged and skipped; it never affects delivery to the other
    /// handlers or future events.
    pub fn register<F>(self: &Arc<Self>, kind: EventKind, handler: F) -> EventSubscription
    where
        F: Fn(&StreamEvent) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.lock().entry(kind).or_default().push(HandlerEntry {
            id,
            handler: Arc::new(handler),
        });

        EventSubscription {
            kind,
            id,
            dispatcher: Arc::downgrade(self),
        }
    }

    fn unregister(&self, kind: EventKind, id: u64) {
        if let Some(entries) = self.handlers.lock().get_mut(&kind) {
            entries.retain(|entry| entry.id != id);
        }
    }

    /// Subscribe to all events via a broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.event_tx.subscribe()
    }

    /// Deliver one event to every registered consumer.
    ///
    /// Handlers run outside the registry lock, so a slow consumer cannot
    /// block registration or dispatch from other tasks.
    pub fn dispatch(&self, event: StreamEvent) {
        let snapshot: Vec<(u64, Arc<HandlerFn>)> = {
            let handlers = self.handlers.lock();
            handlers
                .get(&event.kind())
                .map(|entries| {
                    entries
                        .iter()
                        .map(|entry| (entry.id, Arc::clone(&entry.handler)))
                        .collect()
                })
                .unwrap_or_default()
        };

        for (id, handler) in snapshot {
            if let Err(e) = handler(&event) {
                tracing::warn!(
                    kind = ?event.kind(),
                    handler_id = id,
                    error = %e,
                    "event handler failed"
                );
            }
        }

        // Ignore the no-receivers case; broadcast consumers are optional.
        let _ = self.event_tx.send(event);
    }
}

/// Handle returned by [`Dispatcher::register`]; revokes the handler on
/// [`unsubscribe`](Self::unsubscribe).
pub struct EventSubscription {
    kind: EventKind,
    id: u64,
    dispatcher: Weak<Dispatcher>,
}

impl EventSubscription {
    /// The event kind this subscription is registered for.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Remove the handler from the dispatcher.
    pub fn unsubscribe(self) {
        if let Some(dispatcher) = self.dispatcher.upgrade() {
            dispatcher.unregister(self.kind, self.id);
        }
    }
}
