use super::*;
use crate::canvas::test_helpers;
use crate::services::registry::Registry;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};
use uuid::Uuid;

fn stroke(i: usize) -> Stroke {
    let x = f64::from(u32::try_from(i).expect("small index"));
    test_helpers::stroke(x, "#ffffff", 2.0)
}

fn strokes(n: usize) -> Vec<Stroke> {
    (0..n).map(stroke).collect()
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        out.push(message);
    }
    out
}

async fn next_due(events: &mut mpsc::Receiver<EngineEvent>) -> ConnectionId {
    match timeout(Duration::from_secs(5), events.recv()).await {
        Ok(Some(EngineEvent::CatchupDue { id })) => id,
        other => panic!("expected CatchupDue, got {other:?}"),
    }
}

struct Fixture {
    registry: Registry,
    catchup: Catchup,
    events_tx: mpsc::Sender<EngineEvent>,
    events_rx: mpsc::Receiver<EngineEvent>,
}

impl Fixture {
    fn new() -> Self {
        let (events_tx, events_rx) = mpsc::channel(16);
        let catchup = Catchup::new(CatchupConfig::default(), events_tx.downgrade());
        Self { registry: Registry::new(), catchup, events_tx, events_rx }
    }

    fn connect(&mut self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.registry.add(id, tx);
        (id, rx)
    }

    fn start(&mut self, id: ConnectionId, background: &str, strokes: &[Stroke]) {
        let connection = self.registry.get(id).expect("registered");
        self.catchup.start(id, connection, background, strokes);
    }

    fn resume(&mut self, id: ConnectionId) {
        self.catchup.resume(id, self.registry.get(id));
    }
}

fn stroke_count(messages: &[ServerMessage]) -> usize {
    messages.iter().filter(|m| matches!(m, ServerMessage::Stroke(_))).count()
}

// =============================================================================
// start
// =============================================================================

#[tokio::test(start_paused = true)]
async fn empty_canvas_sends_only_the_fill() {
    let mut fx = Fixture::new();
    let (id, mut rx) = fx.connect();

    fx.start(id, "#000000", &[]);

    assert_eq!(drain(&mut rx), vec![ServerMessage::Fill { color: "#000000".into() }]);
    assert!(!fx.catchup.is_active(id));
    assert!(timeout(Duration::from_secs(1), fx.events_rx.recv()).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn small_canvas_completes_in_first_chunk() {
    let mut fx = Fixture::new();
    let (id, mut rx) = fx.connect();
    let history = strokes(3);

    fx.start(id, "#101010", &history);

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0], ServerMessage::Fill { color: "#101010".into() });
    assert_eq!(messages[1..], history.into_iter().map(ServerMessage::Stroke).collect::<Vec<_>>()[..]);
    assert!(!fx.catchup.is_active(id));
}

#[tokio::test(start_paused = true)]
async fn large_canvas_streams_in_spaced_chunks() {
    let mut fx = Fixture::new();
    let (id, mut rx) = fx.connect();
    let history = strokes(450);
    let start = Instant::now();

    fx.start(id, "#000000", &history);
    let first = drain(&mut rx);
    assert_eq!(first.len(), 201);
    assert!(fx.catchup.is_active(id));

    assert_eq!(next_due(&mut fx.events_rx).await, id);
    assert!(start.elapsed() >= Duration::from_millis(10));
    fx.resume(id);
    let second = drain(&mut rx);
    assert_eq!(stroke_count(&second), 200);

    assert_eq!(next_due(&mut fx.events_rx).await, id);
    assert!(start.elapsed() >= Duration::from_millis(20));
    fx.resume(id);
    let third = drain(&mut rx);
    assert_eq!(stroke_count(&third), 50);
    assert!(!fx.catchup.is_active(id));

    let replayed: Vec<ServerMessage> = first.into_iter().skip(1).chain(second).chain(third).collect();
    let expected: Vec<ServerMessage> = history.into_iter().map(ServerMessage::Stroke).collect();
    assert_eq!(replayed, expected);
}

// =============================================================================
// deferral
// =============================================================================

#[tokio::test(start_paused = true)]
async fn live_messages_wait_for_replay_to_finish() {
    let mut fx = Fixture::new();
    let (id, mut rx) = fx.connect();
    fx.start(id, "#000000", &strokes(250));
    drain(&mut rx);

    let live = ServerMessage::Stroke(stroke(999));
    assert!(fx.catchup.defer(id, live.clone()).is_none());
    assert!(drain(&mut rx).is_empty());

    next_due(&mut fx.events_rx).await;
    fx.resume(id);

    let rest = drain(&mut rx);
    assert_eq!(rest.len(), 51);
    assert_eq!(rest.last(), Some(&live));
}

#[tokio::test(start_paused = true)]
async fn defer_hands_message_back_when_not_replaying() {
    let mut fx = Fixture::new();
    let (id, _rx) = fx.connect();
    let message = ServerMessage::Fill { color: "#ffffff".into() };
    assert_eq!(fx.catchup.defer(id, message.clone()), Some(message));
}

// =============================================================================
// cancellation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn closed_connection_stops_replay_silently() {
    let mut fx = Fixture::new();
    let (id, rx) = fx.connect();
    fx.start(id, "#000000", &strokes(450));
    drop(rx);

    next_due(&mut fx.events_rx).await;
    fx.resume(id);

    assert!(!fx.catchup.is_active(id));
    assert!(timeout(Duration::from_secs(1), fx.events_rx.recv()).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn resume_after_disconnect_cancels() {
    let mut fx = Fixture::new();
    let (id, _rx) = fx.connect();
    fx.start(id, "#000000", &strokes(450));
    fx.registry.remove(id);

    next_due(&mut fx.events_rx).await;
    fx.resume(id);
    assert_eq!(fx.catchup.active(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_aborts_pending_chunk_timer() {
    let mut fx = Fixture::new();
    let (id, mut rx) = fx.connect();
    fx.start(id, "#000000", &strokes(450));
    drain(&mut rx);

    fx.catchup.cancel(id);

    assert!(!fx.catchup.is_active(id));
    assert!(timeout(Duration::from_secs(1), fx.events_rx.recv()).await.is_err());
    assert!(drain(&mut rx).is_empty());
    drop(fx.events_tx);
}

#[tokio::test(start_paused = true)]
async fn zero_chunk_size_is_clamped() {
    let (events_tx, _events_rx) = mpsc::channel(4);
    let config = CatchupConfig { chunk_size: 0, chunk_delay: Duration::from_millis(1) };
    let mut catchup = Catchup::new(config, events_tx.downgrade());
    let mut registry = Registry::new();
    let id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel();
    registry.add(id, tx);

    catchup.start(id, registry.get(id).expect("registered"), "#000000", &strokes(2));

    assert_eq!(drain(&mut rx).len(), 2);
    assert!(catchup.is_active(id));
}
