//! Auto-reconnecting message channel to the backend.
//!
//! The `Channel` owns the connection lifecycle: connect, receive loop,
//! reconnect after a constant delay, best-effort send and explicit
//! disconnect. Inbound text frames are handed to the [`Dispatcher`] one at a
//! time, in arrival order.
//!
//! DESIGN
//! ======
//! All mutable state lives behind one mutex that is never held across an
//! await. Each connection attempt gets a generation number; completions from
//! a superseded generation (after `disconnect()` or a newer attempt) are
//! ignored, so at most one transport is ever live. A reconnect is scheduled
//! only while the channel is disconnected and no reconnect timer is pending;
//! a successful open and `disconnect()` both cancel the pending timer.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures are never surfaced as errors: they are logged, reported
//! through the status sink, and followed by a reconnect. There is no retry
//! limit.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use messages::Message;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::dispatch::Dispatcher;
use crate::status::{ConnectionStatus, StatusSink};

/// Errors produced while opening a transport.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The handshake with the endpoint failed.
    #[error("websocket connect failed: {0}")]
    Connect(String),
}

/// Lifecycle state of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport; a reconnect may be pending.
    Disconnected,
    /// An open is in flight.
    Connecting,
    /// A transport is live and inbound frames are being dispatched.
    Connected,
}

/// Events produced by an open transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// One inbound text frame.
    Text(String),
    /// The peer closed the transport.
    Closed,
    /// The transport failed; no further events follow.
    Error(String),
}

/// An open transport: a sender for outbound text and a stream of events.
///
/// Dropping `outbound` asks the transport to close.
pub struct Link {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<LinkEvent>,
}

/// Opens transports. Implemented over websockets in [`super::ws`] and by
/// scripted fakes in tests.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Open a new transport to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Connect`] when the handshake fails.
    async fn open(&self, url: &str) -> Result<Link, ChannelError>;
}

#[derive(Clone)]
pub struct Channel {
    shared: Arc<Shared>,
}

struct Shared {
    url: String,
    reconnect_delay: Duration,
    connector: Arc<dyn Connector>,
    dispatcher: Arc<Dispatcher>,
    status: Arc<dyn StatusSink>,
    inner: Mutex<Inner>,
}

struct Inner {
    state: ConnectionState,
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<String>>,
    session: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
    /// Set by `disconnect()`; suppresses reconnects until the next `connect()`.
    stopped: bool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Channel {
    /// Create a disconnected channel. Nothing happens until [`Channel::connect`].
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        reconnect_delay: Duration,
        connector: Arc<dyn Connector>,
        dispatcher: Arc<Dispatcher>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                url: url.into(),
                reconnect_delay,
                connector,
                dispatcher,
                status,
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    generation: 0,
                    outbound: None,
                    session: None,
                    reconnect: None,
                    stopped: false,
                }),
            }),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.shared.dispatcher
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    #[must_use]
    pub fn reconnect_pending(&self) -> bool {
        self.shared.lock().reconnect.is_some()
    }

    /// Start connecting. A no-op while connected or while an attempt is in
    /// flight.
    pub fn connect(&self) {
        let started = {
            let mut inner = self.shared.lock();
            inner.stopped = false;
            if inner.state == ConnectionState::Disconnected {
                begin_attempt(&self.shared, &mut inner);
                true
            } else {
                false
            }
        };
        if started {
            self.shared.status.connection_changed(ConnectionStatus::Connecting);
        }
    }

    /// Serialize and transmit a message if connected.
    ///
    /// Returns `false` (and logs a warning) when the message was dropped.
    /// Nothing is buffered for later delivery.
    pub fn send(&self, message: &Message) -> bool {
        let inner = self.shared.lock();
        let sent = match (&inner.state, &inner.outbound) {
            (ConnectionState::Connected, Some(tx)) => tx.send(messages::encode_message(message)).is_ok(),
            _ => false,
        };
        if !sent {
            warn!(kind = %message.kind, "cannot send message: websocket is not connected");
        }
        sent
    }

    /// Schedule one reconnect attempt after the configured delay.
    ///
    /// Returns `false` without scheduling when a timer is already pending,
    /// the transport is not disconnected, or the channel was stopped.
    pub fn schedule_reconnect(&self) -> bool {
        let mut inner = self.shared.lock();
        schedule_reconnect(&self.shared, &mut inner)
    }

    /// Close the transport and cancel any pending reconnect. No reconnect
    /// happens until [`Channel::connect`] is called again.
    pub fn disconnect(&self) {
        let previous = {
            let mut inner = self.shared.lock();
            inner.stopped = true;
            inner.generation += 1;
            inner.outbound = None;
            if let Some(session) = inner.session.take() {
                session.abort();
            }
            if let Some(timer) = inner.reconnect.take() {
                timer.abort();
            }
            std::mem::replace(&mut inner.state, ConnectionState::Disconnected)
        };
        if previous != ConnectionState::Disconnected {
            info!(url = %self.shared.url, "websocket disconnected");
            self.shared
                .status
                .connection_changed(ConnectionStatus::Disconnected { reconnecting: false });
        }
    }
}

fn begin_attempt(shared: &Arc<Shared>, inner: &mut Inner) {
    if let Some(timer) = inner.reconnect.take() {
        timer.abort();
    }
    inner.state = ConnectionState::Connecting;
    inner.generation += 1;
    let generation = inner.generation;
    debug!(url = %shared.url, generation, "opening websocket");
    inner.session = Some(tokio::spawn(run_session(Arc::clone(shared), generation)));
}

fn schedule_reconnect(shared: &Arc<Shared>, inner: &mut Inner) -> bool {
    if inner.reconnect.is_some() || inner.state != ConnectionState::Disconnected || inner.stopped {
        return false;
    }

    let delay = shared.reconnect_delay;
    let generation = inner.generation;
    let timer_shared = Arc::clone(shared);
    inner.reconnect = Some(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        debug!(url = %timer_shared.url, "reconnect timer fired");
        reconnect_now(&timer_shared, generation);
    }));
    true
}

/// Timer body: start the next attempt unless the channel was stopped or
/// moved on since the timer was scheduled. The check and the attempt happen
/// under one lock, so a concurrent `disconnect()` either cancels the timer
/// or is observed here.
fn reconnect_now(shared: &Arc<Shared>, generation: u64) {
    {
        let mut inner = shared.lock();
        if inner.generation != generation || inner.stopped {
            return;
        }
        inner.reconnect = None;
        if inner.state != ConnectionState::Disconnected {
            return;
        }
        begin_attempt(shared, &mut inner);
    }
    shared.status.connection_changed(ConnectionStatus::Connecting);
}

async fn run_session(shared: Arc<Shared>, generation: u64) {
    let link = match shared.connector.open(&shared.url).await {
        Ok(link) => link,
        Err(e) => {
            warn!(url = %shared.url, error = %e, "failed to establish websocket connection");
            connection_lost(&shared, generation);
            return;
        }
    };

    let Link { outbound, mut inbound } = link;
    {
        let mut inner = shared.lock();
        if inner.generation != generation || inner.stopped {
            // Superseded while the handshake was in flight; dropping the link closes it.
            return;
        }
        inner.state = ConnectionState::Connected;
        inner.outbound = Some(outbound);
        if let Some(timer) = inner.reconnect.take() {
            timer.abort();
        }
    }
    info!(url = %shared.url, "websocket connection established");
    shared.status.connection_changed(ConnectionStatus::Connected);

    while let Some(event) = inbound.recv().await {
        match event {
            LinkEvent::Text(text) => {
                shared.dispatcher.dispatch_text(&text);
            }
            LinkEvent::Closed => {
                info!(url = %shared.url, "websocket connection closed");
                break;
            }
            LinkEvent::Error(e) => {
                warn!(url = %shared.url, error = %e, "websocket error");
                break;
            }
        }
    }

    connection_lost(&shared, generation);
}

fn connection_lost(shared: &Arc<Shared>, generation: u64) {
    let reconnecting = {
        let mut inner = shared.lock();
        if inner.generation != generation {
            return;
        }
        inner.state = ConnectionState::Disconnected;
        inner.outbound = None;
        inner.session = None;
        schedule_reconnect(shared, &mut inner);
        inner.reconnect.is_some()
    };
    if reconnecting {
        info!(url = %shared.url, delay = ?shared.reconnect_delay, "reconnect scheduled");
    }
    shared
        .status
        .connection_changed(ConnectionStatus::Disconnected { reconnecting });
}

#[cfg(test)]
#[path = "channel_test.rs"]
mod tests;
