use super::*;
use crate::net::channel::{Channel, ConnectionState};
use crate::net::dispatch::Dispatcher;
use crate::status::NoStatus;
use axum::Router;
use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

const HELLO: &str = r#"{"type":"joint_states","joint_positions":{"joint_a1":0.5}}"#;

async fn echo_handler(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(echo_socket)
}

async fn echo_socket(mut socket: WebSocket) {
    if socket.send(AxumMessage::Text(HELLO.into())).await.is_err() {
        return;
    }
    while let Some(Ok(msg)) = socket.recv().await {
        if let AxumMessage::Text(text) = msg {
            let reply = format!(r#"{{"type":"echo","body":{}}}"#, text.as_str());
            if socket.send(AxumMessage::Text(reply.into())).await.is_err() {
                return;
            }
        }
    }
}

async fn bye_handler(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(|mut socket: WebSocket| async move {
        let _ = socket.send(AxumMessage::Close(None)).await;
    })
}

async fn spawn_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = Router::new()
        .route("/ws", get(echo_handler))
        .route("/bye", get(bye_handler));
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("ws://{addr}")
}

async fn next_event(link: &mut Link) -> LinkEvent {
    timeout(Duration::from_secs(2), link.inbound.recv())
        .await
        .expect("link event timed out")
        .expect("link event channel closed")
}

#[tokio::test]
async fn open_receives_and_sends_text() {
    let base = spawn_server().await;
    let mut link = WsConnector.open(&format!("{base}/ws")).await.expect("open");

    assert_eq!(next_event(&mut link).await, LinkEvent::Text(HELLO.to_owned()));

    link.outbound.send(r#"{"type":"ping"}"#.to_owned()).expect("outbound open");
    let LinkEvent::Text(reply) = next_event(&mut link).await else {
        panic!("expected echo text");
    };
    let msg = messages::decode_message(&reply).expect("decode echo");
    assert_eq!(msg.kind, "echo");
    assert_eq!(msg.get("body").and_then(|b| b.get("type")), Some(&serde_json::json!("ping")));
}

#[tokio::test]
async fn server_close_ends_link() {
    let base = spawn_server().await;
    let mut link = WsConnector.open(&format!("{base}/bye")).await.expect("open");
    let event = next_event(&mut link).await;
    assert!(matches!(event, LinkEvent::Closed | LinkEvent::Error(_)), "got {event:?}");
}

#[tokio::test]
async fn open_fails_for_unreachable_server() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let err = WsConnector.open(&format!("ws://{addr}/ws")).await.err().expect("should fail");
    assert!(err.to_string().contains("websocket connect failed"));
}

#[tokio::test]
async fn channel_dispatches_frames_from_live_socket() {
    let base = spawn_server().await;
    let dispatcher = Arc::new(Dispatcher::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    dispatcher.on(messages::JOINT_STATES, move |msg| {
        let states = messages::JointStates::from_message(msg)?;
        sink.lock().expect("seen mutex").push(states.joint_positions);
        Ok(())
    });

    let ch = Channel::new(
        format!("{base}/ws"),
        Duration::from_millis(50),
        Arc::new(WsConnector),
        dispatcher,
        Arc::new(NoStatus),
    );
    ch.connect();

    timeout(Duration::from_secs(2), async {
        while seen.lock().expect("seen mutex").is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("joint_states never dispatched");

    assert_eq!(ch.state(), ConnectionState::Connected);
    assert_eq!(seen.lock().expect("seen mutex")[0]["joint_a1"], 0.5);
    ch.disconnect();
    assert_eq!(ch.state(), ConnectionState::Disconnected);
}
