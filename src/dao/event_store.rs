use futures::{future::BoxFuture, stream::BoxStream};

use crate::dao::storage::StorageResult;
use crate::dto::room_event::{RoomEvent, RoomEventBody, RoomId};

/// Push feed of newly appended events for a single room.
///
/// Delivery is at-least-once; consumers deduplicate by [`RoomEvent::id`].
pub type LiveFeed = BoxStream<'static, RoomEvent>;

/// Read side of a room's event log, as consumed by replicas.
pub trait RoomLog: Send + Sync {
    /// Every event recorded for `room_id`, in ascending id order.
    fn history(&self, room_id: RoomId) -> BoxFuture<'static, StorageResult<Vec<RoomEvent>>>;
    /// Subscribe to events appended to `room_id` from now on.
    ///
    /// Dropping the returned stream cancels the subscription.
    fn subscribe(&self, room_id: RoomId) -> BoxFuture<'static, StorageResult<LiveFeed>>;
}

/// Write side of the room event log.
pub trait RoomEventStore: Send + Sync {
    /// Persist a new event, assigning its id and timestamp.
    fn append(
        &self,
        room_id: RoomId,
        body: RoomEventBody,
    ) -> BoxFuture<'static, StorageResult<RoomEvent>>;
    /// Report whether the backend can currently serve requests.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
