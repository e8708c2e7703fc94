//! Message dispatch keyed by the `type` discriminator.
//!
//! DESIGN
//! ======
//! An explicit `type -> Vec<handler>` map. Handlers for one message run
//! synchronously, in registration order, before the next inbound message is
//! processed. The handler list is cloned out of the lock before invocation so
//! a handler may register further handlers without deadlocking.
//!
//! ERROR HANDLING
//! ==============
//! Undecodable frames are logged and dropped. A handler that returns an error
//! or panics is logged and the remaining handlers still run.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use messages::{CodecError, Message};
use tracing::{debug, error, warn};

/// Error a handler reports for one message.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The payload did not have the shape the handler expects.
    #[error("invalid payload: {0}")]
    Payload(#[from] CodecError),
    /// Any other handler-specific failure.
    #[error("{0}")]
    Failed(String),
}

pub type Handler = Arc<dyn Fn(&Message) -> Result<(), HandlerError> + Send + Sync>;

#[derive(Default)]
pub struct Dispatcher {
    handlers: RwLock<HashMap<String, Vec<Handler>>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a message type. Multiple handlers per type are
    /// all invoked.
    pub fn on<F>(&self, kind: impl Into<String>, handler: F)
    where
        F: Fn(&Message) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.entry(kind.into()).or_default().push(Arc::new(handler));
    }

    #[must_use]
    pub fn handler_count(&self, kind: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .map_or(0, Vec::len)
    }

    /// Decode a raw text frame and dispatch it.
    ///
    /// Returns the number of handlers that completed successfully; an
    /// undecodable frame yields zero.
    pub fn dispatch_text(&self, text: &str) -> usize {
        match messages::decode_message(text) {
            Ok(message) => self.dispatch(&message),
            Err(e) => {
                warn!(error = %e, "dropping undecodable message");
                0
            }
        }
    }

    /// Invoke every handler registered for `message.kind`.
    ///
    /// A type with no handlers is a silent no-op.
    pub fn dispatch(&self, message: &Message) -> usize {
        let handlers = {
            let map = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            match map.get(&message.kind) {
                Some(list) => list.clone(),
                None => {
                    debug!(kind = %message.kind, "no handler registered");
                    return 0;
                }
            }
        };

        let mut completed = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(message))) {
                Ok(Ok(())) => completed += 1,
                Ok(Err(e)) => warn!(kind = %message.kind, error = %e, "message handler failed"),
                Err(_) => error!(kind = %message.kind, "message handler panicked"),
            }
        }
        completed
    }
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
