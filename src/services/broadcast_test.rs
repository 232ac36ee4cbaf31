use super::*;
use crate::canvas::Stroke;
use crate::canvas::test_helpers;
use crate::services::catchup::CatchupConfig;
use crate::services::engine::EngineEvent;
use tokio::sync::mpsc;
use uuid::Uuid;

fn stroke(x: f64) -> Stroke {
    test_helpers::stroke(x, "#ffffff", 2.0)
}

struct Peer {
    id: ConnectionId,
    rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Peer {
    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            out.push(message);
        }
        out
    }
}

fn join(registry: &mut Registry) -> Peer {
    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::unbounded_channel();
    registry.add(id, tx);
    Peer { id, rx }
}

/// Timers only hold a weak sender, so the strong one must outlive the test.
struct Timers {
    _tx: mpsc::Sender<EngineEvent>,
    rx: mpsc::Receiver<EngineEvent>,
}

fn catchup() -> (Catchup, Timers) {
    let (tx, rx) = mpsc::channel(8);
    let catchup = Catchup::new(CatchupConfig::default(), tx.downgrade());
    (catchup, Timers { _tx: tx, rx })
}

#[tokio::test]
async fn excluded_sender_gets_nothing() {
    let mut registry = Registry::new();
    let (mut catchup, _events) = catchup();
    let mut sender = join(&mut registry);
    let mut other = join(&mut registry);

    let message = ServerMessage::Stroke(stroke(1.0));
    let delivered = fan_out(&registry, &mut catchup, &message, Some(sender.id));

    assert_eq!(delivered, 1);
    assert!(sender.drain().is_empty());
    assert_eq!(other.drain(), vec![message]);
}

#[tokio::test]
async fn no_exclusion_reaches_everyone() {
    let mut registry = Registry::new();
    let (mut catchup, _events) = catchup();
    let mut peers: Vec<Peer> = (0..3).map(|_| join(&mut registry)).collect();

    let message = ServerMessage::Fill { color: "#00ff00".into() };
    assert_eq!(fan_out(&registry, &mut catchup, &message, None), 3);

    for peer in &mut peers {
        assert_eq!(peer.drain(), vec![message.clone()]);
    }
}

#[tokio::test]
async fn closed_connections_are_skipped() {
    let mut registry = Registry::new();
    let (mut catchup, _events) = catchup();
    let gone = join(&mut registry);
    let mut alive = join(&mut registry);
    drop(gone.rx);

    let message = ServerMessage::Stroke(stroke(2.0));
    assert_eq!(fan_out(&registry, &mut catchup, &message, None), 1);
    assert_eq!(alive.drain(), vec![message]);
}

#[tokio::test(start_paused = true)]
async fn replaying_connection_receives_message_after_its_replay() {
    let mut registry = Registry::new();
    let (mut catchup, mut events) = catchup();
    let mut newcomer = join(&mut registry);
    let history: Vec<Stroke> = (0..300).map(|i| stroke(f64::from(i))).collect();

    let connection = registry.get(newcomer.id).expect("registered");
    catchup.start(newcomer.id, connection, "#000000", &history);
    assert_eq!(newcomer.drain().len(), 201);

    let live = ServerMessage::Stroke(stroke(-1.0));
    assert_eq!(fan_out(&registry, &mut catchup, &live, None), 1);
    assert!(newcomer.drain().is_empty());

    let Some(EngineEvent::CatchupDue { id }) = events.rx.recv().await else {
        panic!("expected a chunk timer");
    };
    catchup.resume(id, registry.get(id));

    let rest = newcomer.drain();
    assert_eq!(rest.len(), 101);
    assert_eq!(rest.last(), Some(&live));
}
