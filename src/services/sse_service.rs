use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt, stream::BoxStream};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::{ReceiverStream, WatchStream};
use tracing::{info, warn};

use crate::{
    dao::event_store::LiveFeed,
    dto::{
        room_event::RoomId,
        session::SessionSnapshot,
        sse::{Handshake, ServerEvent},
    },
    services::replication::ReplicaSnapshot,
};

/// Identifies the source of an SSE stream so teardown can be logged per kind.
#[derive(Clone, Debug)]
pub enum StreamKind {
    /// Raw room events.
    Room(RoomId),
    /// Session snapshots rendered for one player.
    Session(RoomId, String),
}

impl StreamKind {
    fn handshake(&self) -> Option<ServerEvent> {
        let (stream, room_id) = match self {
            StreamKind::Room(room_id) => ("room", *room_id),
            StreamKind::Session(room_id, _) => ("session", *room_id),
        };
        ServerEvent::json(
            Some("handshake".to_string()),
            &Handshake {
                stream: stream.to_string(),
                room_id,
                message: format!("subscribed to room {room_id}"),
            },
        )
        .ok()
    }
}

/// Live room events, one `room_event` SSE message each.
pub fn room_events(feed: LiveFeed) -> BoxStream<'static, ServerEvent> {
    feed.filter_map(|event| async move {
        match ServerEvent::json(Some("room_event".to_string()), &event) {
            Ok(payload) => Some(payload),
            Err(err) => {
                warn!(event_id = event.id, error = %err, "failed to serialise room event");
                None
            }
        }
    })
    .boxed()
}

/// Session snapshots, starting with the current one, one `snapshot` SSE message per change.
pub fn session_snapshots(
    receiver: watch::Receiver<ReplicaSnapshot>,
    room_id: RoomId,
    user_id: String,
) -> BoxStream<'static, ServerEvent> {
    WatchStream::new(receiver)
        .filter_map(move |snapshot| {
            let rendered = SessionSnapshot::from_replica(room_id, &user_id, &snapshot);
            async move {
                match ServerEvent::json(Some("snapshot".to_string()), &rendered) {
                    Ok(payload) => Some(payload),
                    Err(err) => {
                        warn!(room_id, error = %err, "failed to serialise session snapshot");
                        None
                    }
                }
            }
        })
        .boxed()
}

/// Convert a stream of server events into an SSE response, forwarding events
/// and cleaning up once the client disconnects or the source ends.
pub fn to_sse_stream(
    mut source: BoxStream<'static, ServerEvent>,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let handshake = kind.handshake().map(to_event);
        if let Some(handshake) = handshake {
            if tx.send(Ok(handshake)).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                next = source.next() => {
                    let Some(payload) = next else { break };
                    if tx.send(Ok(to_event(payload))).await.is_err() {
                        break;
                    }
                }
            }
        }

        match kind {
            StreamKind::Room(room_id) => info!(room_id, "room SSE stream disconnected"),
            StreamKind::Session(room_id, user_id) => {
                info!(room_id, %user_id, "session SSE stream disconnected")
            }
        }
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::stream;
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        dto::room_event::RoomEvent,
        state::{game::Game, state_machine::State},
    };

    #[tokio::test]
    async fn room_events_are_named_and_serialised() {
        let event = RoomEvent {
            id: 5,
            timestamp: "2024-01-01T00:00:00Z".into(),
            room_id: 1,
            kind: "start_round".into(),
            payload: json!({ "round": 0 }),
        };
        let mut events = room_events(stream::iter(vec![event]).boxed());

        let first = events.next().await.unwrap();
        assert_eq!(first.event.as_deref(), Some("room_event"));
        let data: Value = serde_json::from_str(&first.data).unwrap();
        assert_eq!(data["type"], "start_round");
        assert_eq!(data["roomId"], 1);
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn session_stream_starts_with_current_snapshot() {
        let (_tx, rx) = watch::channel(ReplicaSnapshot {
            state: Arc::new(State::new(Arc::new(Game::mock()))),
            events_seen: 0,
            fault: None,
        });
        let mut snapshots = session_snapshots(rx, 3, "a".into());

        let first = snapshots.next().await.unwrap();
        assert_eq!(first.event.as_deref(), Some("snapshot"));
        let data: Value = serde_json::from_str(&first.data).unwrap();
        assert_eq!(data["room_id"], 3);
        assert_eq!(data["phase"], "preview");
    }
}
