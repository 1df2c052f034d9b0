//! Process-local room event log backed by a map of per-room vectors.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
    time::SystemTime,
};

use dashmap::DashMap;
use futures::{
    FutureExt,
    future::{self, BoxFuture},
};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::{
    dao::{
        event_store::{LiveFeed, RoomEventStore, RoomLog},
        storage::{StorageError, StorageResult},
    },
    dto::{
        format_system_time,
        room_event::{RoomEvent, RoomEventBody, RoomId},
    },
};

#[derive(Debug, Error)]
#[error("room log has been closed")]
struct LogClosed;

/// In-memory event log. Cloning shares the same underlying log.
#[derive(Clone)]
pub struct MemoryEventLog {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    next_id: AtomicI64,
    closed: AtomicBool,
    feed_capacity: usize,
    rooms: DashMap<RoomId, RoomStream>,
}

struct RoomStream {
    events: Vec<RoomEvent>,
    sender: broadcast::Sender<RoomEvent>,
}

impl MemoryEventLog {
    /// Create an empty log whose live feeds buffer up to `feed_capacity` events per subscriber.
    pub fn new(feed_capacity: usize) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                next_id: AtomicI64::new(1),
                closed: AtomicBool::new(false),
                feed_capacity: feed_capacity.max(1),
                rooms: DashMap::new(),
            }),
        }
    }

    /// Refuse further operations and end every live feed.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        // Dropping the senders closes every subscriber stream.
        self.inner.rooms.clear();
    }
}

impl MemoryInner {
    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("room log closed".into(), LogClosed));
        }
        Ok(())
    }

    fn append(&self, room_id: RoomId, body: RoomEventBody) -> StorageResult<RoomEvent> {
        self.ensure_open()?;
        let payload = body.payload().map_err(StorageError::Encoding)?;

        // Ids are assigned under the room's entry lock so each room's log and
        // feed stay in ascending id order.
        let mut room = self
            .rooms
            .entry(room_id)
            .or_insert_with(|| RoomStream::new(self.feed_capacity));

        let event = RoomEvent {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            timestamp: format_system_time(SystemTime::now()),
            room_id,
            kind: body.kind().as_str().to_string(),
            payload,
        };
        room.events.push(event.clone());
        // No receivers is fine: nobody is watching the room yet.
        let _ = room.sender.send(event.clone());

        debug!(room_id, event_id = event.id, kind = %event.kind, "appended room event");
        Ok(event)
    }

    fn history(&self, room_id: RoomId) -> StorageResult<Vec<RoomEvent>> {
        self.ensure_open()?;
        Ok(self
            .rooms
            .get(&room_id)
            .map(|room| room.events.clone())
            .unwrap_or_default())
    }

    fn receiver(&self, room_id: RoomId) -> StorageResult<broadcast::Receiver<RoomEvent>> {
        self.ensure_open()?;
        let room = self
            .rooms
            .entry(room_id)
            .or_insert_with(|| RoomStream::new(self.feed_capacity));
        Ok(room.sender.subscribe())
    }
}

impl RoomStream {
    fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self {
            events: Vec::new(),
            sender,
        }
    }
}

impl RoomLog for MemoryEventLog {
    fn history(&self, room_id: RoomId) -> BoxFuture<'static, StorageResult<Vec<RoomEvent>>> {
        future::ready(self.inner.history(room_id)).boxed()
    }

    fn subscribe(&self, room_id: RoomId) -> BoxFuture<'static, StorageResult<LiveFeed>> {
        let subscription = self.inner.receiver(room_id).map(|mut receiver| {
            let inner = Arc::clone(&self.inner);
            let feed = async_stream::stream! {
                loop {
                    match receiver.recv().await {
                        Ok(event) => yield event,
                        Err(RecvError::Lagged(skipped)) => {
                            // Consumers deduplicate, so replaying the whole
                            // backlog is enough to close the gap.
                            warn!(room_id, skipped, "live feed lagged; replaying room backlog");
                            match inner.history(room_id) {
                                Ok(events) => {
                                    for event in events {
                                        yield event;
                                    }
                                }
                                Err(_) => break,
                            }
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            };
            Box::pin(feed) as LiveFeed
        });
        future::ready(subscription).boxed()
    }
}

impl RoomEventStore for MemoryEventLog {
    fn append(
        &self,
        room_id: RoomId,
        body: RoomEventBody,
    ) -> BoxFuture<'static, StorageResult<RoomEvent>> {
        future::ready(self.inner.append(room_id, body)).boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        future::ready(self.inner.ensure_open()).boxed()
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::dto::room_event::{PlayerPayload, StartRoundPayload};

    fn join(user_id: &str) -> RoomEventBody {
        RoomEventBody::Join(PlayerPayload {
            user_id: user_id.into(),
            name: user_id.into(),
        })
    }

    #[tokio::test]
    async fn append_assigns_monotonic_ids_per_log() {
        let log = MemoryEventLog::new(8);
        let first = log.append(1, join("a")).await.unwrap();
        let other_room = log.append(2, join("b")).await.unwrap();
        let second = log
            .append(1, RoomEventBody::StartRound(StartRoundPayload { round: 0 }))
            .await
            .unwrap();

        assert!(first.id < other_room.id && other_room.id < second.id);
        assert_eq!(second.kind, "start_round");
        assert_eq!(second.room_id, 1);

        let history = log.history(1).await.unwrap();
        assert_eq!(
            history.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );
        assert!(log.history(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscribers_only_see_their_room() {
        let log = MemoryEventLog::new(8);
        let mut feed = log.subscribe(1).await.unwrap();

        log.append(2, join("x")).await.unwrap();
        let appended = log.append(1, join("a")).await.unwrap();

        assert_eq!(feed.next().await, Some(appended));
    }

    #[tokio::test]
    async fn lagging_subscriber_receives_backlog_again() {
        let log = MemoryEventLog::new(1);
        let mut feed = log.subscribe(1).await.unwrap();

        let first = log.append(1, join("a")).await.unwrap();
        let second = log.append(1, join("b")).await.unwrap();
        let third = log.append(1, join("c")).await.unwrap();

        let mut seen = Vec::new();
        while let Some(event) = feed.next().await {
            seen.push(event.id);
            if event.id == third.id && seen.contains(&first.id) {
                break;
            }
        }
        assert!(seen.contains(&first.id));
        assert!(seen.contains(&second.id));
    }

    #[tokio::test]
    async fn closing_ends_feeds_and_rejects_writes() {
        let log = MemoryEventLog::new(4);
        let mut feed = log.subscribe(1).await.unwrap();

        log.close();

        assert_eq!(feed.next().await, None);
        assert!(log.append(1, join("a")).await.is_err());
        assert!(log.health_check().await.is_err());
    }
}
