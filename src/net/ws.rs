//! Websocket transport for [`Channel`](super::channel::Channel).
//!
//! Each open spawns two pump tasks: a writer that forwards outbound text to
//! the socket (and sends a close frame once the outbound sender is dropped)
//! and a reader that turns socket messages into [`LinkEvent`]s.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::debug;

use super::channel::{ChannelError, Connector, Link, LinkEvent};

#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<Link, ChannelError> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        let (mut ws_write, mut ws_read) = stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<LinkEvent>();

        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if ws_write.send(WsMessage::text(text)).await.is_err() {
                    return;
                }
            }
            let _ = ws_write.send(WsMessage::Close(None)).await;
            let _ = ws_write.close().await;
        });

        tokio::spawn(async move {
            while let Some(msg) = ws_read.next().await {
                let event = match msg {
                    Ok(WsMessage::Text(text)) => LinkEvent::Text(text.as_str().to_owned()),
                    Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => LinkEvent::Text(text),
                        Err(_) => {
                            debug!(len = bytes.len(), "ignoring non-utf8 binary frame");
                            continue;
                        }
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = in_tx.send(LinkEvent::Error(e.to_string()));
                        return;
                    }
                };
                if in_tx.send(event).is_err() {
                    return;
                }
            }
            let _ = in_tx.send(LinkEvent::Closed);
        });

        Ok(Link { outbound: out_tx, inbound: in_rx })
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
