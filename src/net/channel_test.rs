use super::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const DELAY: Duration = Duration::from_millis(3000);

struct ServerEnd {
    events: mpsc::UnboundedSender<LinkEvent>,
    sent: mpsc::UnboundedReceiver<String>,
}

#[derive(Default)]
struct FakeConnector {
    opens: AtomicUsize,
    fail: AtomicBool,
    ends: Mutex<Vec<ServerEnd>>,
}

impl FakeConnector {
    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn take_end(&self) -> ServerEnd {
        self.ends.lock().expect("ends mutex").pop().expect("an open link")
    }
}

#[async_trait::async_trait]
impl Connector for FakeConnector {
    async fn open(&self, _url: &str) -> Result<Link, ChannelError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChannelError::Connect("connection refused".into()));
        }
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        self.ends.lock().expect("ends mutex").push(ServerEnd { events: in_tx, sent: out_rx });
        Ok(Link { outbound: out_tx, inbound: in_rx })
    }
}

#[derive(Default)]
struct RecordingStatus {
    seen: Mutex<Vec<ConnectionStatus>>,
}

impl RecordingStatus {
    fn seen(&self) -> Vec<ConnectionStatus> {
        self.seen.lock().expect("status mutex").clone()
    }
}

impl StatusSink for RecordingStatus {
    fn connection_changed(&self, status: ConnectionStatus) {
        self.seen.lock().expect("status mutex").push(status);
    }
}

fn channel(connector: &Arc<FakeConnector>, status: &Arc<RecordingStatus>) -> Channel {
    Channel::new(
        "ws://robot.test/ws",
        DELAY,
        Arc::clone(connector) as Arc<dyn Connector>,
        Arc::new(Dispatcher::new()),
        Arc::clone(status) as Arc<dyn StatusSink>,
    )
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn connect_twice_opens_single_transport() {
    let connector = Arc::new(FakeConnector::default());
    let status = Arc::new(RecordingStatus::default());
    let ch = channel(&connector, &status);

    ch.connect();
    ch.connect();
    settle().await;
    assert_eq!(connector.opens(), 1);
    assert_eq!(ch.state(), ConnectionState::Connected);

    ch.connect();
    settle().await;
    assert_eq!(connector.opens(), 1);
    assert_eq!(status.seen(), vec![ConnectionStatus::Connecting, ConnectionStatus::Connected]);
}

#[tokio::test(start_paused = true)]
async fn close_schedules_exactly_one_reconnect() {
    let connector = Arc::new(FakeConnector::default());
    let status = Arc::new(RecordingStatus::default());
    let ch = channel(&connector, &status);

    ch.connect();
    settle().await;
    let end = connector.take_end();
    end.events.send(LinkEvent::Closed).expect("link open");
    settle().await;

    assert_eq!(ch.state(), ConnectionState::Disconnected);
    assert!(ch.reconnect_pending());
    assert!(!ch.schedule_reconnect(), "second reconnect must not be scheduled");
    assert_eq!(
        status.seen().last(),
        Some(&ConnectionStatus::Disconnected { reconnecting: true })
    );
    assert_eq!(connector.opens(), 1);

    tokio::time::sleep(DELAY).await;
    assert_eq!(connector.opens(), 2);
    assert_eq!(ch.state(), ConnectionState::Connected);
    assert!(!ch.reconnect_pending());
}

#[tokio::test(start_paused = true)]
async fn schedule_reconnect_refused_while_connected() {
    let connector = Arc::new(FakeConnector::default());
    let status = Arc::new(RecordingStatus::default());
    let ch = channel(&connector, &status);

    ch.connect();
    settle().await;
    assert!(!ch.schedule_reconnect());
    assert!(!ch.reconnect_pending());
}

#[tokio::test(start_paused = true)]
async fn transport_error_triggers_reconnect() {
    let connector = Arc::new(FakeConnector::default());
    let status = Arc::new(RecordingStatus::default());
    let ch = channel(&connector, &status);

    ch.connect();
    settle().await;
    let end = connector.take_end();
    end.events.send(LinkEvent::Error("reset by peer".into())).expect("link open");
    settle().await;
    assert!(ch.reconnect_pending());

    tokio::time::sleep(DELAY).await;
    assert_eq!(connector.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_opens_retry_without_limit() {
    let connector = Arc::new(FakeConnector::default());
    connector.fail.store(true, Ordering::SeqCst);
    let status = Arc::new(RecordingStatus::default());
    let ch = channel(&connector, &status);

    ch.connect();
    settle().await;
    assert_eq!(connector.opens(), 1);
    assert_eq!(ch.state(), ConnectionState::Disconnected);

    for expected in 2..=4 {
        tokio::time::sleep(DELAY).await;
        assert_eq!(connector.opens(), expected);
    }

    connector.fail.store(false, Ordering::SeqCst);
    tokio::time::sleep(DELAY).await;
    assert_eq!(ch.state(), ConnectionState::Connected);
    assert_eq!(status.seen().last(), Some(&ConnectionStatus::Connected));
}

#[tokio::test(start_paused = true)]
async fn send_only_while_connected() {
    let connector = Arc::new(FakeConnector::default());
    let status = Arc::new(RecordingStatus::default());
    let ch = channel(&connector, &status);
    let msg = Message::new("robot_pose").with("position", serde_json::json!([0, 0, 0]));

    assert!(!ch.send(&msg));

    ch.connect();
    settle().await;
    assert!(ch.send(&msg));
    let mut end = connector.take_end();
    let text = end.sent.recv().await.expect("outbound text");
    assert_eq!(messages::decode_message(&text).expect("decode"), msg);

    end.events.send(LinkEvent::Closed).expect("link open");
    settle().await;
    assert!(!ch.send(&msg), "messages are dropped, not queued, while disconnected");
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_reconnect() {
    let connector = Arc::new(FakeConnector::default());
    let status = Arc::new(RecordingStatus::default());
    let ch = channel(&connector, &status);

    ch.connect();
    settle().await;
    connector.take_end().events.send(LinkEvent::Closed).expect("link open");
    settle().await;
    assert!(ch.reconnect_pending());

    ch.disconnect();
    assert!(!ch.reconnect_pending());
    tokio::time::sleep(DELAY * 3).await;
    assert_eq!(connector.opens(), 1);
    assert!(!ch.schedule_reconnect());

    ch.connect();
    settle().await;
    assert_eq!(connector.opens(), 2);
    assert_eq!(ch.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn disconnect_after_timer_elapsed_stays_stopped() {
    let connector = Arc::new(FakeConnector::default());
    let status = Arc::new(RecordingStatus::default());
    let ch = channel(&connector, &status);

    ch.connect();
    settle().await;
    connector.take_end().events.send(LinkEvent::Closed).expect("link open");
    settle().await;

    // The timer has elapsed and released its handle, but has not yet
    // started the next attempt when disconnect() runs.
    let generation = ch.shared.lock().generation;
    ch.shared.lock().reconnect.take().expect("pending timer").abort();
    ch.disconnect();
    reconnect_now(&ch.shared, generation);
    settle().await;

    assert_eq!(connector.opens(), 1);
    assert_eq!(ch.state(), ConnectionState::Disconnected);
    assert!(!ch.reconnect_pending());
    assert!(!status.seen().ends_with(&[ConnectionStatus::Connecting]));

    tokio::time::sleep(DELAY * 2).await;
    assert_eq!(connector.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn manual_connect_supersedes_pending_timer() {
    let connector = Arc::new(FakeConnector::default());
    let status = Arc::new(RecordingStatus::default());
    let ch = channel(&connector, &status);

    ch.connect();
    settle().await;
    connector.fail.store(true, Ordering::SeqCst);
    connector.take_end().events.send(LinkEvent::Closed).expect("link open");
    settle().await;
    assert!(ch.reconnect_pending());

    ch.connect();
    settle().await;
    assert_eq!(connector.opens(), 2);
    assert!(ch.reconnect_pending(), "failed manual attempt schedules its own retry");

    connector.fail.store(false, Ordering::SeqCst);
    tokio::time::sleep(DELAY).await;
    assert_eq!(connector.opens(), 3);
    assert_eq!(ch.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn disconnect_closes_live_transport() {
    let connector = Arc::new(FakeConnector::default());
    let status = Arc::new(RecordingStatus::default());
    let ch = channel(&connector, &status);

    ch.connect();
    settle().await;
    let mut end = connector.take_end();

    ch.disconnect();
    settle().await;
    assert_eq!(ch.state(), ConnectionState::Disconnected);
    assert!(end.sent.recv().await.is_none(), "outbound side should be dropped");
    assert_eq!(
        status.seen().last(),
        Some(&ConnectionStatus::Disconnected { reconnecting: false })
    );

    tokio::time::sleep(DELAY * 2).await;
    assert_eq!(connector.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn inbound_frames_dispatch_in_order_and_garbage_keeps_link() {
    let connector = Arc::new(FakeConnector::default());
    let status = Arc::new(RecordingStatus::default());
    let ch = channel(&connector, &status);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    ch.dispatcher().on("joint_states", move |msg| {
        let ts = msg.get("timestamp").and_then(serde_json::Value::as_f64).unwrap_or_default();
        sink.lock().expect("seen mutex").push(ts);
        Ok(())
    });

    ch.connect();
    settle().await;
    let end = connector.take_end();
    for text in [
        r#"{"type":"joint_states","joint_positions":{},"timestamp":1}"#,
        "{{garbage",
        r#"{"type":"joint_states","joint_positions":{},"timestamp":2}"#,
    ] {
        end.events.send(LinkEvent::Text(text.to_owned())).expect("link open");
    }
    settle().await;

    assert_eq!(*seen.lock().expect("seen mutex"), vec![1.0, 2.0]);
    assert_eq!(ch.state(), ConnectionState::Connected);
    assert_eq!(connector.opens(), 1);
}
