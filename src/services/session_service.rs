//! Server-hosted player sessions: one replication engine per `(room, user)`.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    dto::{
        room::{ChooseClueRequest, StartRoundRequest},
        room_event::RoomId,
        session::{SessionActionRequest, SessionActionResponse, SessionSnapshot},
        validation::validate_user_id,
    },
    error::ServiceError,
    services::{
        replication::{ReplicaSnapshot, ReplicationEngine},
        room_service::{self, require_room},
    },
    state::{
        SharedState,
        grid::Cell,
        state_machine::{Action, Phase},
    },
};

/// Attach a session for `user_id` to the room, reusing a live one if present.
pub async fn open_session(
    state: &SharedState,
    room_id: RoomId,
    user_id: &str,
) -> Result<SessionSnapshot, ServiceError> {
    validate_user_id(user_id).map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    let room = require_room(state, room_id)?;
    let key = (room_id, user_id.to_string());

    if let Some(engine) = live_session(state, room_id, user_id) {
        return Ok(SessionSnapshot::from_replica(
            room_id,
            user_id,
            &engine.snapshot(),
        ));
    }

    let engine = Arc::new(ReplicationEngine::attach(room_id, room.game, state.room_log()).await?);

    // A concurrent open may have won the race; keep whichever landed first.
    let engine = {
        let mut entry = state.sessions().entry(key).or_insert_with(|| Arc::clone(&engine));
        if entry.is_detached() {
            *entry = Arc::clone(&engine);
        }
        Arc::clone(entry.value())
    };

    info!(room_id, %user_id, "session opened");
    Ok(SessionSnapshot::from_replica(
        room_id,
        user_id,
        &engine.snapshot(),
    ))
}

/// Current snapshot of a session.
pub fn get_session(
    state: &SharedState,
    room_id: RoomId,
    user_id: &str,
) -> Result<SessionSnapshot, ServiceError> {
    let engine = require_session(state, room_id, user_id)?;
    Ok(SessionSnapshot::from_replica(
        room_id,
        user_id,
        &engine.snapshot(),
    ))
}

/// Reduce a local action on a session, then append the matching room event
/// so every other session in the room follows.
///
/// `click_clue` only reaches the reducer while the session's player holds
/// board control and the clue can be opened; otherwise `dispatched` is false
/// and nothing is appended. `answer_clue` has no room event and stays local.
/// The appended event echoes back to this session and is dropped there,
/// since its phase has already moved on.
pub async fn dispatch_action(
    state: &SharedState,
    room_id: RoomId,
    user_id: &str,
    request: SessionActionRequest,
) -> Result<SessionActionResponse, ServiceError> {
    let engine = require_session(state, room_id, user_id)?;

    let dispatched = match request {
        SessionActionRequest::ClickClue { row, col } => {
            let opened = engine.click_clue_as(user_id, Cell::new(row, col)).await?;
            if opened {
                room_service::choose_clue(
                    state,
                    room_id,
                    ChooseClueRequest {
                        user_id: user_id.to_string(),
                        i: row,
                        j: col,
                    },
                )
                .await?;
            }
            opened
        }
        SessionActionRequest::AnswerClue => {
            engine.dispatch(Action::AnswerClue).await?;
            true
        }
        SessionActionRequest::StartRound { round } => {
            let next = engine.dispatch(Action::StartRound(round)).await?;
            let started = next.round() == round && next.phase() != Phase::Preview;
            if started {
                room_service::start_round(state, room_id, StartRoundRequest { round }).await?;
            }
            started
        }
    };

    Ok(SessionActionResponse {
        dispatched,
        snapshot: SessionSnapshot::from_replica(room_id, user_id, &engine.snapshot()),
    })
}

/// Receiver notified on every state change of a session.
pub fn subscribe_session(
    state: &SharedState,
    room_id: RoomId,
    user_id: &str,
) -> Result<watch::Receiver<ReplicaSnapshot>, ServiceError> {
    Ok(require_session(state, room_id, user_id)?.subscribe())
}

/// Detach and forget a session.
pub async fn close_session(
    state: &SharedState,
    room_id: RoomId,
    user_id: &str,
) -> Result<(), ServiceError> {
    let (_, engine) = state
        .sessions()
        .remove(&(room_id, user_id.to_string()))
        .ok_or_else(|| session_not_found(room_id, user_id))?;
    engine.detach().await;
    info!(room_id, %user_id, "session closed");
    Ok(())
}

fn live_session(
    state: &SharedState,
    room_id: RoomId,
    user_id: &str,
) -> Option<Arc<ReplicationEngine>> {
    let key = (room_id, user_id.to_string());
    let engine = state.sessions().get(&key).map(|entry| Arc::clone(entry.value()))?;
    if engine.is_detached() {
        warn!(room_id, %user_id, "discarding stopped session");
        state
            .sessions()
            .remove_if(&key, |_, current| Arc::ptr_eq(current, &engine));
        return None;
    }
    Some(engine)
}

fn require_session(
    state: &SharedState,
    room_id: RoomId,
    user_id: &str,
) -> Result<Arc<ReplicationEngine>, ServiceError> {
    state
        .sessions()
        .get(&(room_id, user_id.to_string()))
        .map(|entry| Arc::clone(entry.value()))
        .ok_or_else(|| session_not_found(room_id, user_id))
}

fn session_not_found(room_id: RoomId, user_id: &str) -> ServiceError {
    ServiceError::NotFound(format!("session for `{user_id}` in room {room_id}"))
}
