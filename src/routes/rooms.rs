use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        room::{
            AppendResponse, ChangeNameRequest, ChooseClueRequest, CreateRoomRequest,
            GameListItem, JoinRoomRequest, JoinRoomResponse, RoomSummary, StartRoundRequest,
        },
        room_event::{RoomEvent, RoomId},
    },
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Catalog, room creation and event append endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", get(list_games))
        .route("/rooms", post(create_room))
        .route("/rooms/{room_id}", get(get_room))
        .route("/rooms/{room_id}/join", post(join_room))
        .route("/rooms/{room_id}/change-name", post(change_name))
        .route("/rooms/{room_id}/start-round", post(start_round))
        .route("/rooms/{room_id}/choose-clue", post(choose_clue))
        .route("/rooms/{room_id}/events", get(list_events))
}

#[utoipa::path(
    get,
    path = "/games",
    tag = "rooms",
    responses((status = 200, description = "Playable games", body = [GameListItem]))
)]
/// List the games rooms can be created for.
pub async fn list_games(State(state): State<SharedState>) -> Json<Vec<GameListItem>> {
    Json(room_service::list_games(&state))
}

#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = RoomSummary),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Unknown game")
    )
)]
/// Open a new room for a catalog game.
pub async fn create_room(
    State(state): State<SharedState>,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomSummary>), AppError> {
    payload.validate()?;
    let room = room_service::create_room(&state, payload)?;
    Ok((StatusCode::CREATED, Json(room)))
}

#[utoipa::path(
    get,
    path = "/rooms/{room_id}",
    tag = "rooms",
    params(("room_id" = i64, Path, description = "Identifier of the room")),
    responses(
        (status = 200, description = "Room summary", body = RoomSummary),
        (status = 404, description = "Unknown room")
    )
)]
/// Describe a room.
pub async fn get_room(
    State(state): State<SharedState>,
    Path(room_id): Path<RoomId>,
) -> Result<Json<RoomSummary>, AppError> {
    Ok(Json(room_service::get_room(&state, room_id)?))
}

#[utoipa::path(
    post,
    path = "/rooms/{room_id}/join",
    tag = "rooms",
    params(("room_id" = i64, Path, description = "Identifier of the room")),
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Join event appended", body = JoinRoomResponse),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Unknown room")
    )
)]
/// Append a `join` event, issuing a user id when none is supplied.
pub async fn join_room(
    State(state): State<SharedState>,
    Path(room_id): Path<RoomId>,
    Json(payload): Json<JoinRoomRequest>,
) -> Result<Json<JoinRoomResponse>, AppError> {
    payload.validate()?;
    Ok(Json(room_service::join(&state, room_id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/rooms/{room_id}/change-name",
    tag = "rooms",
    params(("room_id" = i64, Path, description = "Identifier of the room")),
    request_body = ChangeNameRequest,
    responses(
        (status = 200, description = "Rename appended", body = AppendResponse),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Unknown room")
    )
)]
/// Append a `change_name` event.
pub async fn change_name(
    State(state): State<SharedState>,
    Path(room_id): Path<RoomId>,
    Json(payload): Json<ChangeNameRequest>,
) -> Result<Json<AppendResponse>, AppError> {
    payload.validate()?;
    Ok(Json(
        room_service::change_name(&state, room_id, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/rooms/{room_id}/start-round",
    tag = "rooms",
    params(("room_id" = i64, Path, description = "Identifier of the room")),
    request_body = StartRoundRequest,
    responses(
        (status = 200, description = "Round start appended", body = AppendResponse),
        (status = 400, description = "Round does not exist"),
        (status = 404, description = "Unknown room")
    )
)]
/// Append a `start_round` event.
pub async fn start_round(
    State(state): State<SharedState>,
    Path(room_id): Path<RoomId>,
    Json(payload): Json<StartRoundRequest>,
) -> Result<Json<AppendResponse>, AppError> {
    Ok(Json(
        room_service::start_round(&state, room_id, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/rooms/{room_id}/choose-clue",
    tag = "rooms",
    params(("room_id" = i64, Path, description = "Identifier of the room")),
    request_body = ChooseClueRequest,
    responses(
        (status = 200, description = "Clue choice appended", body = AppendResponse),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Unknown room")
    )
)]
/// Append a `choose_clue` event. Replicas ignore choices made without board control.
pub async fn choose_clue(
    State(state): State<SharedState>,
    Path(room_id): Path<RoomId>,
    Json(payload): Json<ChooseClueRequest>,
) -> Result<Json<AppendResponse>, AppError> {
    payload.validate()?;
    Ok(Json(
        room_service::choose_clue(&state, room_id, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/rooms/{room_id}/events",
    tag = "rooms",
    params(("room_id" = i64, Path, description = "Identifier of the room")),
    responses(
        (status = 200, description = "Room history in ascending id order", body = [RoomEvent]),
        (status = 404, description = "Unknown room")
    )
)]
/// Return every event appended to a room so far.
pub async fn list_events(
    State(state): State<SharedState>,
    Path(room_id): Path<RoomId>,
) -> Result<Json<Vec<RoomEvent>>, AppError> {
    Ok(Json(room_service::list_events(&state, room_id).await?))
}
