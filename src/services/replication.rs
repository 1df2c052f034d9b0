//! Keeps a local game state in step with a room's event log.
//!
//! [`Replica`] is the synchronous core: a set of consumed event ids plus the
//! current state. [`ReplicationEngine`] owns a replica on a single worker task
//! and feeds it from the room backlog, the live feed and local dispatches,
//! all through one queue.

use std::{collections::HashSet, sync::Arc};

use futures::StreamExt;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, trace};

use crate::{
    dao::{
        event_store::{LiveFeed, RoomLog},
        storage::StorageError,
    },
    dto::room_event::{EventId, RoomEvent, RoomId},
    services::translator::{TranslateError, translate},
    state::{
        game::Game,
        grid::Cell,
        state_machine::{Action, ReduceError, State, reduce},
    },
};

/// Errors surfaced by replicas and replication engines.
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// A log entry violated the wire contract.
    #[error(transparent)]
    Translate(#[from] TranslateError),
    /// An action could not be reduced.
    #[error(transparent)]
    Reduce(#[from] ReduceError),
    /// The room log could not be read.
    #[error("room log unavailable")]
    Storage(#[from] StorageError),
    /// The engine was detached from its room.
    #[error("replica is detached")]
    Detached,
    /// The engine stopped after a protocol violation in the live feed.
    #[error("replica halted: {0}")]
    Faulted(String),
}

/// Outcome of offering an event to a [`Replica`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The event id was already consumed.
    Duplicate,
    /// The event was consumed but not admissible in the current state.
    Dropped,
    /// The event was reduced into a new state.
    Reduced,
}

/// Game state plus the ids of every log entry folded into it.
#[derive(Debug, Clone)]
pub struct Replica {
    seen: HashSet<EventId>,
    state: Arc<State>,
}

impl Replica {
    /// Start from the preview of round 0 with nothing consumed.
    pub fn new(game: Arc<Game>) -> Self {
        Self {
            seen: HashSet::new(),
            state: Arc::new(State::new(game)),
        }
    }

    /// Current state. A new `Arc` is installed on every reduction.
    pub fn state(&self) -> &Arc<State> {
        &self.state
    }

    /// Whether the event with `id` was already consumed.
    pub fn has_seen(&self, id: EventId) -> bool {
        self.seen.contains(&id)
    }

    /// Number of consumed events.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Consume `event` unless it was consumed before.
    ///
    /// The id is recorded before translation, so a rejected event is never
    /// retried.
    pub fn apply(&mut self, event: &RoomEvent) -> Result<Applied, ReplicationError> {
        if !self.seen.insert(event.id) {
            trace!(event_id = event.id, "skipping already consumed event");
            return Ok(Applied::Duplicate);
        }

        let Some(action) = translate(event, &self.state)? else {
            return Ok(Applied::Dropped);
        };
        self.state = Arc::new(reduce(&self.state, action)?);
        Ok(Applied::Reduced)
    }

    /// Consume a backlog in ascending id order, returning how many events were reduced.
    pub fn apply_batch<'a>(
        &mut self,
        events: impl IntoIterator<Item = &'a RoomEvent>,
    ) -> Result<usize, ReplicationError> {
        let mut ordered: Vec<&RoomEvent> = events.into_iter().collect();
        ordered.sort_by_key(|event| event.id);

        let mut reduced = 0;
        for event in ordered {
            if self.apply(event)? == Applied::Reduced {
                reduced += 1;
            }
        }
        Ok(reduced)
    }

    /// Reduce a locally originated action.
    pub fn dispatch(&mut self, action: Action) -> Result<&Arc<State>, ReduceError> {
        self.state = Arc::new(reduce(&self.state, action)?);
        Ok(&self.state)
    }

    /// Open `cell` on behalf of `user_id` if they hold board control and the
    /// cell can be opened.
    ///
    /// Returns `false` without touching the state otherwise.
    pub fn click_clue_as(&mut self, user_id: &str, cell: Cell) -> Result<bool, ReduceError> {
        if self.state.board_control() != Some(user_id) {
            debug!(user_id, ?cell, "ignoring click from player without board control");
            return Ok(false);
        }
        if !self.state.can_open(cell) {
            debug!(
                user_id,
                ?cell,
                phase = ?self.state.phase(),
                "ignoring click on unavailable clue"
            );
            return Ok(false);
        }
        self.dispatch(Action::ClickClue(cell))?;
        Ok(true)
    }

    fn snapshot(&self, fault: Option<String>) -> ReplicaSnapshot {
        ReplicaSnapshot {
            state: Arc::clone(&self.state),
            events_seen: self.seen.len(),
            fault,
        }
    }
}

/// Value published to observers of a [`ReplicationEngine`].
#[derive(Debug, Clone)]
pub struct ReplicaSnapshot {
    /// Latest state.
    pub state: Arc<State>,
    /// Number of log entries consumed so far.
    pub events_seen: usize,
    /// Set once a protocol violation halted the engine.
    pub fault: Option<String>,
}

enum Command {
    Event(RoomEvent),
    Dispatch {
        action: Action,
        reply: oneshot::Sender<Result<Arc<State>, ReplicationError>>,
    },
    ClickAs {
        user_id: String,
        cell: Cell,
        reply: oneshot::Sender<Result<bool, ReplicationError>>,
    },
    Shutdown,
}

/// Replica attached to a room log, applying backlog and live events exactly once.
pub struct ReplicationEngine {
    room_id: RoomId,
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<ReplicaSnapshot>,
    feed: JoinHandle<()>,
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ReplicationEngine {
    /// Attach to `room_id`: subscribe to the live feed, fold in the backlog, then
    /// keep applying live events in the background.
    ///
    /// A protocol violation in the backlog fails the attach.
    pub async fn attach(
        room_id: RoomId,
        game: Arc<Game>,
        log: Arc<dyn RoomLog>,
    ) -> Result<Self, ReplicationError> {
        // Subscribing first means nothing appended while the backlog is read
        // can be missed; the seen set absorbs the overlap.
        let feed = log.subscribe(room_id).await?;
        let backlog = log.history(room_id).await?;

        let mut replica = Replica::new(game);
        let reduced = replica.apply_batch(&backlog)?;
        info!(room_id, backlog = backlog.len(), reduced, "replica attached");

        let (snapshot_tx, snapshots) = watch::channel(replica.snapshot(None));
        let (commands, queue) = mpsc::unbounded_channel();

        let worker = tokio::spawn(run_worker(room_id, replica, queue, snapshot_tx));
        let feed = tokio::spawn(forward_feed(room_id, feed, commands.clone()));

        Ok(Self {
            room_id,
            commands,
            snapshots,
            feed,
            worker: std::sync::Mutex::new(Some(worker)),
        })
    }

    /// Room this engine follows.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> ReplicaSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Latest state.
    pub fn state(&self) -> Arc<State> {
        Arc::clone(&self.snapshots.borrow().state)
    }

    /// Receive a notification each time the state changes.
    ///
    /// The channel closes once the engine is detached.
    pub fn subscribe(&self) -> watch::Receiver<ReplicaSnapshot> {
        self.snapshots.clone()
    }

    /// Reduce a locally originated action after everything queued before it.
    pub async fn dispatch(&self, action: Action) -> Result<Arc<State>, ReplicationError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Dispatch { action, reply })?;
        response.await.map_err(|_| ReplicationError::Detached)?
    }

    /// Open `cell` for `user_id`, provided they hold board control when the
    /// command is processed. Returns whether the click was dispatched.
    pub async fn click_clue_as(
        &self,
        user_id: impl Into<String>,
        cell: Cell,
    ) -> Result<bool, ReplicationError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::ClickAs {
            user_id: user_id.into(),
            cell,
            reply,
        })?;
        response.await.map_err(|_| ReplicationError::Detached)?
    }

    /// Cancel the live subscription and stop the worker once queued work is done.
    ///
    /// Calling it more than once is harmless.
    pub async fn detach(&self) {
        self.feed.abort();
        let _ = self.commands.send(Command::Shutdown);

        let worker = match self.worker.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                error!(room_id = self.room_id, error = %err, "replica worker panicked");
            }
            info!(room_id = self.room_id, "replica detached");
        }
    }

    /// Whether the worker has stopped, after [`ReplicationEngine::detach`] or on its own.
    pub fn is_detached(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command) -> Result<(), ReplicationError> {
        self.commands
            .send(command)
            .map_err(|_| ReplicationError::Detached)
    }
}

impl Drop for ReplicationEngine {
    fn drop(&mut self) {
        // The feed task holds a sender, so the worker only stops once it is gone.
        self.feed.abort();
        let _ = self.commands.send(Command::Shutdown);
    }
}

async fn forward_feed(
    room_id: RoomId,
    mut feed: LiveFeed,
    commands: mpsc::UnboundedSender<Command>,
) {
    while let Some(event) = feed.next().await {
        if commands.send(Command::Event(event)).is_err() {
            break;
        }
    }
    debug!(room_id, "live feed ended");
}

async fn run_worker(
    room_id: RoomId,
    mut replica: Replica,
    mut queue: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<ReplicaSnapshot>,
) {
    let mut fault: Option<String> = None;

    while let Some(command) = queue.recv().await {
        match command {
            Command::Shutdown => break,
            Command::Event(event) => {
                if fault.is_some() {
                    continue;
                }
                match replica.apply(&event) {
                    Ok(Applied::Reduced) => {
                        trace!(room_id, event_id = event.id, "applied live event");
                        snapshots.send_replace(replica.snapshot(None));
                    }
                    Ok(Applied::Dropped) => {
                        snapshots.send_replace(replica.snapshot(None));
                    }
                    Ok(Applied::Duplicate) => {}
                    Err(err) => {
                        error!(
                            room_id,
                            event_id = event.id,
                            error = %err,
                            "halting replica on protocol violation"
                        );
                        let message = err.to_string();
                        fault = Some(message.clone());
                        snapshots.send_replace(replica.snapshot(Some(message)));
                    }
                }
            }
            Command::Dispatch { action, reply } => {
                let result = match &fault {
                    Some(message) => Err(ReplicationError::Faulted(message.clone())),
                    None => replica
                        .dispatch(action)
                        .map(Arc::clone)
                        .map_err(ReplicationError::from),
                };
                if result.is_ok() {
                    snapshots.send_replace(replica.snapshot(None));
                }
                let _ = reply.send(result);
            }
            Command::ClickAs {
                user_id,
                cell,
                reply,
            } => {
                let result = match &fault {
                    Some(message) => Err(ReplicationError::Faulted(message.clone())),
                    None => replica
                        .click_clue_as(&user_id, cell)
                        .map_err(ReplicationError::from),
                };
                if matches!(result, Ok(true)) {
                    snapshots.send_replace(replica.snapshot(None));
                }
                let _ = reply.send(result);
            }
        }
    }

    debug!(room_id, "replica worker stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::future::{self, BoxFuture, FutureExt};
    use serde_json::{Value, json};
    use tokio::time::timeout;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    use super::*;
    use crate::{
        dao::{event_store::RoomEventStore, memory::MemoryEventLog, storage::StorageResult},
        dto::room_event::{ChooseCluePayload, PlayerPayload, RoomEventBody, StartRoundPayload},
        state::state_machine::Phase,
    };

    const WAIT: Duration = Duration::from_secs(2);

    fn event(id: EventId, kind: &str, payload: Value) -> RoomEvent {
        RoomEvent {
            id,
            timestamp: "2024-01-01T00:00:00Z".into(),
            room_id: 1,
            kind: kind.into(),
            payload,
        }
    }

    fn join(id: EventId, user_id: &str) -> RoomEvent {
        event(id, "join", json!({ "userId": user_id, "name": user_id }))
    }

    fn mock_replica() -> Replica {
        Replica::new(Arc::new(Game::mock()))
    }

    /// Room log whose live feed is driven by the test.
    struct ScriptedLog {
        backlog: Vec<RoomEvent>,
        live: std::sync::Mutex<Option<mpsc::UnboundedReceiver<RoomEvent>>>,
    }

    impl ScriptedLog {
        fn new(backlog: Vec<RoomEvent>) -> (Arc<Self>, mpsc::UnboundedSender<RoomEvent>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let log = Arc::new(Self {
                backlog,
                live: std::sync::Mutex::new(Some(rx)),
            });
            (log, tx)
        }
    }

    impl RoomLog for ScriptedLog {
        fn history(&self, _room_id: RoomId) -> BoxFuture<'static, StorageResult<Vec<RoomEvent>>> {
            future::ready(Ok(self.backlog.clone())).boxed()
        }

        fn subscribe(&self, _room_id: RoomId) -> BoxFuture<'static, StorageResult<LiveFeed>> {
            let receiver = self.live.lock().unwrap().take().expect("subscribed twice");
            let feed: LiveFeed = Box::pin(UnboundedReceiverStream::new(receiver));
            future::ready(Ok(feed)).boxed()
        }
    }

    async fn wait_for_seen(engine: &ReplicationEngine, count: usize) -> ReplicaSnapshot {
        let mut rx = engine.subscribe();
        timeout(
            WAIT,
            rx.wait_for(|snapshot| snapshot.events_seen >= count || snapshot.fault.is_some()),
        )
        .await
            .expect("timed out waiting for replica")
            .expect("engine stopped")
            .clone()
    }

    #[test]
    fn replaying_any_event_twice_matches_applying_it_once() {
        let events = vec![
            join(1, "a"),
            event(2, "change_name", json!({ "userId": "a", "name": "Ally" })),
            event(3, "start_round", json!({ "round": 0 })),
            event(4, "choose_clue", json!({ "userId": "a", "i": 0, "j": 0 })),
        ];

        let mut once = mock_replica();
        once.apply_batch(&events).unwrap();

        let mut twice = mock_replica();
        for event in &events {
            assert_eq!(twice.apply(event).unwrap(), Applied::Reduced);
            assert_eq!(twice.apply(event).unwrap(), Applied::Duplicate);
        }
        twice.apply_batch(&events).unwrap();

        assert_eq!(once.state(), twice.state());
        assert_eq!(twice.seen_count(), events.len());
        assert_eq!(twice.state().active_clue(), Some(Cell::new(0, 0)));
    }

    #[test]
    fn admissible_events_converge_in_any_order() {
        let base = [join(1, "a"), event(2, "start_round", json!({ "round": 0 }))];
        let events = [
            event(3, "choose_clue", json!({ "userId": "a", "i": 1, "j": 0 })),
            join(4, "b"),
            event(5, "change_name", json!({ "userId": "c", "name": "Cy" })),
            event(6, "start_round", json!({ "round": 1 })),
        ];

        let mut reference = mock_replica();
        reference.apply_batch(&base).unwrap();
        reference.apply_batch(&events).unwrap();
        assert_eq!(reference.state().active_clue(), Some(Cell::new(1, 0)));

        let mut order: Vec<usize> = (0..events.len()).collect();
        for permutation in permutations(&mut order) {
            let mut replica = mock_replica();
            replica.apply_batch(&base).unwrap();
            for idx in permutation {
                replica.apply(&events[idx]).unwrap();
            }
            assert_eq!(replica.state(), reference.state());
        }
    }

    fn permutations(items: &mut [usize]) -> Vec<Vec<usize>> {
        fn heap(k: usize, items: &mut [usize], out: &mut Vec<Vec<usize>>) {
            if k <= 1 {
                out.push(items.to_vec());
                return;
            }
            for i in 0..k {
                heap(k - 1, items, out);
                let swap = if k % 2 == 0 { i } else { 0 };
                items.swap(swap, k - 1);
            }
        }
        let mut out = Vec::new();
        heap(items.len(), items, &mut out);
        out
    }

    #[test]
    fn joins_assign_board_control_to_first_player() {
        let mut replica = mock_replica();
        replica.apply_batch(&[join(1, "a"), join(2, "b")]).unwrap();

        let state = replica.state();
        assert_eq!(state.board_control(), Some("a"));
        assert!(state.players().contains_key("a"));
        assert!(state.players().contains_key("b"));
    }

    #[test]
    fn clue_choice_from_non_controller_changes_nothing() {
        let mut replica = mock_replica();
        replica
            .apply_batch(&[
                join(1, "a"),
                join(2, "b"),
                event(3, "start_round", json!({ "round": 0 })),
            ])
            .unwrap();
        let before = Arc::clone(replica.state());

        let outcome = replica
            .apply(&event(4, "choose_clue", json!({ "userId": "b", "i": 0, "j": 0 })))
            .unwrap();

        assert_eq!(outcome, Applied::Dropped);
        assert!(Arc::ptr_eq(&before, replica.state()));
        assert_eq!(replica.state().active_clue(), None);
    }

    #[test]
    fn backlog_is_applied_in_id_order() {
        let mut replica = mock_replica();
        let reduced = replica
            .apply_batch(&[join(2, "b"), join(1, "a")])
            .unwrap();
        assert_eq!(reduced, 2);
        assert_eq!(replica.state().board_control(), Some("a"));
    }

    #[test]
    fn rejected_event_is_still_marked_seen() {
        let mut replica = mock_replica();
        let bad = event(7, "buzz", json!({}));
        assert!(matches!(replica.apply(&bad), Err(ReplicationError::Translate(_))));
        assert!(replica.has_seen(7));
        assert_eq!(replica.apply(&bad).unwrap(), Applied::Duplicate);
    }

    #[test]
    fn local_clicks_require_board_control() {
        let mut replica = mock_replica();
        replica
            .apply_batch(&[
                join(1, "a"),
                join(2, "b"),
                event(3, "start_round", json!({ "round": 0 })),
            ])
            .unwrap();

        assert!(!replica.click_clue_as("b", Cell::new(0, 0)).unwrap());
        assert_eq!(replica.state().phase(), Phase::AwaitingClueChoice);

        assert!(replica.click_clue_as("a", Cell::new(0, 0)).unwrap());
        assert_eq!(replica.state().phase(), Phase::ActiveClue(Cell::new(0, 0)));

        replica.dispatch(Action::AnswerClue).unwrap();
        assert_eq!(replica.state().num_answered(), 1);
        assert!(replica.dispatch(Action::AnswerClue).is_err());
    }

    #[tokio::test]
    async fn engine_folds_backlog_then_live_events() {
        let log = MemoryEventLog::new(16);
        log.append(
            1,
            RoomEventBody::Join(PlayerPayload {
                user_id: "a".into(),
                name: "Alice".into(),
            }),
        )
        .await
        .unwrap();

        let engine = ReplicationEngine::attach(1, Arc::new(Game::mock()), Arc::new(log.clone()))
            .await
            .unwrap();
        assert_eq!(engine.state().board_control(), Some("a"));

        log.append(1, RoomEventBody::StartRound(StartRoundPayload { round: 0 }))
            .await
            .unwrap();
        log.append(
            1,
            RoomEventBody::ChooseClue(ChooseCluePayload {
                user_id: "a".into(),
                i: 1,
                j: 0,
            }),
        )
        .await
        .unwrap();

        let snapshot = wait_for_seen(&engine, 3).await;
        assert_eq!(snapshot.state.active_clue(), Some(Cell::new(1, 0)));

        let state = engine.dispatch(Action::AnswerClue).await.unwrap();
        assert_eq!(state.num_answered(), 1);
        assert_eq!(state.phase(), Phase::AwaitingClueChoice);

        engine.detach().await;
    }

    #[tokio::test]
    async fn redelivered_events_are_applied_once() {
        let backlog = vec![join(1, "a"), event(2, "start_round", json!({ "round": 0 }))];
        let (log, live) = ScriptedLog::new(backlog.clone());
        let engine = ReplicationEngine::attach(1, Arc::new(Game::mock()), log)
            .await
            .unwrap();

        let choose = event(3, "choose_clue", json!({ "userId": "a", "i": 0, "j": 0 }));
        for event in backlog.iter().chain([&choose, &choose]) {
            live.send(event.clone()).unwrap();
        }
        live.send(join(4, "b")).unwrap();

        let snapshot = wait_for_seen(&engine, 4).await;

        let mut expected = mock_replica();
        expected.apply_batch(backlog.iter().chain([&choose, &join(4, "b")])).unwrap();
        assert_eq!(snapshot.state.as_ref(), expected.state().as_ref());
        assert_eq!(snapshot.events_seen, 4);

        engine.detach().await;
    }

    #[tokio::test]
    async fn nothing_is_applied_after_detach() {
        let (log, live) = ScriptedLog::new(vec![join(1, "a")]);
        let engine = ReplicationEngine::attach(1, Arc::new(Game::mock()), log)
            .await
            .unwrap();

        engine.detach().await;
        let _ = live.send(join(2, "b"));

        assert_eq!(engine.snapshot().events_seen, 1);
        assert!(matches!(
            engine.dispatch(Action::StartRound(0)).await,
            Err(ReplicationError::Detached)
        ));
        assert!(engine.is_detached());
        engine.detach().await;
    }

    #[tokio::test]
    async fn protocol_violation_in_live_feed_halts_engine() {
        let (log, live) = ScriptedLog::new(vec![join(1, "a")]);
        let engine = ReplicationEngine::attach(1, Arc::new(Game::mock()), log)
            .await
            .unwrap();

        live.send(event(2, "start_round", json!({}))).unwrap();
        let snapshot = wait_for_seen(&engine, 2).await;
        assert!(snapshot.fault.is_some());

        live.send(join(3, "b")).unwrap();
        assert!(matches!(
            engine.dispatch(Action::StartRound(0)).await,
            Err(ReplicationError::Faulted(_))
        ));
        assert_eq!(engine.state().players().len(), 1);

        engine.detach().await;
    }

    #[tokio::test]
    async fn malformed_backlog_fails_attach() {
        let (log, _live) = ScriptedLog::new(vec![event(1, "join", json!({ "name": "x" }))]);
        let result = ReplicationEngine::attach(1, Arc::new(Game::mock()), log).await;
        assert!(matches!(result, Err(ReplicationError::Translate(_))));
    }
}
