//! Fan-out of inbound messages to registered consumers.
//!
//! The dispatcher is a plain broadcast registry: every registered
//! handler sees every message, synchronously and in registration
//! order. Handler execution is isolated; a panicking handler is
//! logged and delivery continues to the remaining handlers.

use std::panic::{catch_unwind, AssertUnwindSafe};
use surge_protocol::ServerMessage;
use tracing::{trace, warn};

/// Opaque handle returned by [`Dispatcher::subscribe`], used to
/// unregister the handler later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Box<dyn FnMut(&ServerMessage) + Send>;

/// Ordered registry of inbound message consumers.
#[derive(Default)]
pub struct Dispatcher {
    handlers: Vec<(HandlerId, Handler)>,
    next_id: u64,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Register a handler. Handlers are invoked in registration order.
    pub fn subscribe(&mut self, handler: impl FnMut(&ServerMessage) + Send + 'static) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Unregister a handler. No-op if the id is unknown.
    pub fn unsubscribe(&mut self, id: HandlerId) {
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
    }

    /// Deliver one message to every registered handler.
    ///
    /// A handler that panics is caught and logged; it never halts
    /// delivery to the remaining handlers.
    pub fn dispatch(&mut self, message: &ServerMessage) {
        trace!(kind = message.kind(), handlers = self.handlers.len(), "Dispatching");

        for (id, handler) in &mut self.handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(message))).is_err() {
                warn!(handler = id.0, kind = message.kind(), "Handler panicked during dispatch");
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handlers.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
