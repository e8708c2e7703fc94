//! Realtime channel to the backend: transport, reconnect loop, dispatch.

pub mod channel;
pub mod dispatch;
pub mod ws;

pub use channel::{Channel, ChannelError, ConnectionState, Connector, Link, LinkEvent};
pub use dispatch::{Dispatcher, HandlerError};
pub use ws::WsConnector;
