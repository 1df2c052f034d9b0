//! Room lifecycle and appends to the room event log.

use tracing::info;
use uuid::Uuid;

use crate::{
    dto::{
        room::{
            AppendResponse, ChangeNameRequest, ChooseClueRequest, CreateRoomRequest,
            GameListItem, JoinRoomRequest, JoinRoomResponse, RoomSummary, StartRoundRequest,
        },
        room_event::{
            ChooseCluePayload, PlayerPayload, RoomEvent, RoomEventBody, RoomId,
            StartRoundPayload,
        },
    },
    error::ServiceError,
    state::{Room, SharedState},
};

impl From<&Room> for RoomSummary {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id,
            game_id: room.game.id.clone(),
            game_title: room.game.title.clone(),
            rounds: room.game.rounds(),
            created_at: room.created_at.clone(),
        }
    }
}

/// List the games new rooms can be created for.
pub fn list_games(state: &SharedState) -> Vec<GameListItem> {
    state
        .config()
        .games()
        .values()
        .map(|game| GameListItem::from(game.as_ref()))
        .collect()
}

/// Open a new room for a catalog game.
pub fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<RoomSummary, ServiceError> {
    let game = state
        .config()
        .game(&request.game_id)
        .ok_or_else(|| ServiceError::NotFound(format!("game `{}`", request.game_id)))?;

    let room = state.create_room(game);
    info!(room_id = room.id, game_id = %room.game.id, "room created");
    Ok(RoomSummary::from(&room))
}

/// Describe an existing room.
pub fn get_room(state: &SharedState, room_id: RoomId) -> Result<RoomSummary, ServiceError> {
    require_room(state, room_id).map(|room| RoomSummary::from(&room))
}

/// Append a `join` event, issuing a user id when the request carries none.
pub async fn join(
    state: &SharedState,
    room_id: RoomId,
    request: JoinRoomRequest,
) -> Result<JoinRoomResponse, ServiceError> {
    let user_id = request
        .user_id
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    let event = append(
        state,
        room_id,
        RoomEventBody::Join(PlayerPayload {
            user_id: user_id.clone(),
            name: request.name,
        }),
    )
    .await?;

    info!(room_id, %user_id, event_id = event.id, "player joined");
    Ok(JoinRoomResponse {
        user_id,
        event_id: event.id,
    })
}

/// Append a `change_name` event.
pub async fn change_name(
    state: &SharedState,
    room_id: RoomId,
    request: ChangeNameRequest,
) -> Result<AppendResponse, ServiceError> {
    let event = append(
        state,
        room_id,
        RoomEventBody::ChangeName(PlayerPayload {
            user_id: request.user_id,
            name: request.name,
        }),
    )
    .await?;
    Ok(AppendResponse { event_id: event.id })
}

/// Append a `start_round` event for a round that exists in the room's game.
pub async fn start_round(
    state: &SharedState,
    room_id: RoomId,
    request: StartRoundRequest,
) -> Result<AppendResponse, ServiceError> {
    let room = require_room(state, room_id)?;
    if request.round >= room.game.rounds() {
        return Err(ServiceError::InvalidInput(format!(
            "round {} does not exist (game has {} rounds)",
            request.round,
            room.game.rounds()
        )));
    }

    let event = append(
        state,
        room_id,
        RoomEventBody::StartRound(StartRoundPayload {
            round: request.round,
        }),
    )
    .await?;
    Ok(AppendResponse { event_id: event.id })
}

/// Append a `choose_clue` event.
///
/// The log records the choice as-is; replicas drop it when the sender lacks
/// board control or the clue cannot be opened.
pub async fn choose_clue(
    state: &SharedState,
    room_id: RoomId,
    request: ChooseClueRequest,
) -> Result<AppendResponse, ServiceError> {
    let event = append(
        state,
        room_id,
        RoomEventBody::ChooseClue(ChooseCluePayload {
            user_id: request.user_id,
            i: clue_index(request.i)?,
            j: clue_index(request.j)?,
        }),
    )
    .await?;
    Ok(AppendResponse { event_id: event.id })
}

/// Full event history of a room, in ascending id order.
pub async fn list_events(
    state: &SharedState,
    room_id: RoomId,
) -> Result<Vec<RoomEvent>, ServiceError> {
    require_room(state, room_id)?;
    Ok(state.room_log().history(room_id).await?)
}

/// Look a room up or fail with [`ServiceError::NotFound`].
pub fn require_room(state: &SharedState, room_id: RoomId) -> Result<Room, ServiceError> {
    state
        .room(room_id)
        .ok_or_else(|| ServiceError::NotFound(format!("room {room_id}")))
}

fn clue_index(index: usize) -> Result<i64, ServiceError> {
    i64::try_from(index)
        .map_err(|_| ServiceError::InvalidInput(format!("clue index {index} is too large")))
}

async fn append(
    state: &SharedState,
    room_id: RoomId,
    body: RoomEventBody,
) -> Result<RoomEvent, ServiceError> {
    require_room(state, room_id)?;
    Ok(state.store().append(room_id, body).await?)
}
