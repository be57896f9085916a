//! Multi-subscriber event fan-out.
//!
//! Each event kind has its own [`HandlerRegistry`]. `subscribe` hands back a
//! [`Subscription`] disposer that removes exactly the handler it was issued
//! for. Dispatch snapshots the handler set before invoking anything, so a
//! handler may subscribe or unsubscribe (itself or others) while an event is
//! being delivered; a handler removed mid-dispatch is skipped.
//!
//! ```text
//! ConnectionManager ── emit(&event) ──► HandlerRegistry<E>
//!                                          │
//!                       ┌──────────────────┼──────────────────┐
//!                       ▼                  ▼                  ▼
//!                   handler #1         handler #2         handler #3
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::client::ConnectionStatus;
use crate::cursor::CursorPosition;
use crate::error::CollabError;
use crate::protocol::CollaborationUpdate;
use crate::room::RoomEvent;

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Slots<E> {
    next_id: u64,
    handlers: BTreeMap<u64, Handler<E>>,
}

/// Handler set for one event kind.
pub struct HandlerRegistry<E> {
    slots: Arc<Mutex<Slots<E>>>,
}

impl<E: 'static> HandlerRegistry<E> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_id: 0,
                handlers: BTreeMap::new(),
            })),
        }
    }

    /// Register a handler. It receives every event emitted until the
    /// returned [`Subscription`] is unsubscribed or the registry is cleared.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut slots = self.slots.lock();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.handlers.insert(id, Arc::new(handler));
            id
        };

        let weak: Weak<Mutex<Slots<E>>> = Arc::downgrade(&self.slots);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(slots) = weak.upgrade() {
                    slots.lock().handlers.remove(&id);
                }
            })),
        }
    }

    /// Deliver `event` to every registered handler in subscription order.
    ///
    /// Returns the number of handlers invoked.
    pub fn emit(&self, event: &E) -> usize {
        let snapshot: Vec<(u64, Handler<E>)> = {
            let slots = self.slots.lock();
            slots
                .handlers
                .iter()
                .map(|(id, handler)| (*id, handler.clone()))
                .collect()
        };

        let mut delivered = 0;
        for (id, handler) in snapshot {
            // Lock is not held while the handler runs.
            let live = self.slots.lock().handlers.contains_key(&id);
            if live {
                handler(event);
                delivered += 1;
            }
        }
        delivered
    }

    /// Drop every handler.
    pub fn clear(&self) {
        self.slots.lock().handlers.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.lock().handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: 'static> Default for HandlerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for HandlerRegistry<E> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
        }
    }
}

/// Disposer returned by [`HandlerRegistry::subscribe`].
///
/// Dropping it does not unsubscribe; call [`Subscription::unsubscribe`].
#[must_use = "keep the subscription to be able to unsubscribe later"]
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Remove the handler. No invocation starts after this returns.
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

/// Identity resolved by a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

/// All registries of one session.
///
/// Cloning shares the underlying handler sets, which is how a
/// `SessionHandle` lets application code subscribe to a session running on
/// another task.
#[derive(Clone, Default)]
pub struct EventHub {
    pub(crate) connection: HandlerRegistry<ConnectionStatus>,
    pub(crate) authenticated: HandlerRegistry<AuthenticatedUser>,
    pub(crate) error: HandlerRegistry<CollabError>,
    pub(crate) room: HandlerRegistry<RoomEvent>,
    pub(crate) operation: HandlerRegistry<CollaborationUpdate>,
    pub(crate) cursor: HandlerRegistry<CursorPosition>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status snapshots, one per state change.
    pub fn on_connection<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ConnectionStatus) + Send + Sync + 'static,
    {
        self.connection.subscribe(handler)
    }

    pub fn on_authenticated<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&AuthenticatedUser) + Send + Sync + 'static,
    {
        self.authenticated.subscribe(handler)
    }

    pub fn on_error<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&CollabError) + Send + Sync + 'static,
    {
        self.error.subscribe(handler)
    }

    pub fn on_room<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&RoomEvent) + Send + Sync + 'static,
    {
        self.room.subscribe(handler)
    }

    /// Every inbound operation broadcast, in arrival order.
    pub fn on_operation<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&CollaborationUpdate) + Send + Sync + 'static,
    {
        self.operation.subscribe(handler)
    }

    pub fn on_cursor<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&CursorPosition) + Send + Sync + 'static,
    {
        self.cursor.subscribe(handler)
    }

    /// Clear every event kind's handler set.
    pub fn destroy(&self) {
        self.connection.clear();
        self.authenticated.clear();
        self.error.clear();
        self.room.clear();
        self.operation.clear();
        self.cursor.clear();
    }

    /// Total handlers across all event kinds.
    pub fn handler_count(&self) -> usize {
        self.connection.len()
            + self.authenticated.len()
            + self.error.len()
            + self.room.len()
            + self.operation.len()
            + self.cursor.len()
    }
}
