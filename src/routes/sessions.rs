use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};

use crate::{
    dto::{
        room_event::RoomId,
        session::{SessionActionRequest, SessionActionResponse, SessionSnapshot},
    },
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Endpoints driving server-hosted player sessions.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/rooms/{room_id}/sessions/{user_id}",
            post(open_session).get(get_session).delete(close_session),
        )
        .route(
            "/rooms/{room_id}/sessions/{user_id}/actions",
            post(dispatch_action),
        )
}

#[utoipa::path(
    post,
    path = "/rooms/{room_id}/sessions/{user_id}",
    tag = "sessions",
    params(
        ("room_id" = i64, Path, description = "Identifier of the room"),
        ("user_id" = String, Path, description = "Player the session renders for")
    ),
    responses(
        (status = 200, description = "Session attached", body = SessionSnapshot),
        (status = 400, description = "Invalid user id"),
        (status = 404, description = "Unknown room"),
        (status = 500, description = "Room history violates the event contract")
    )
)]
/// Attach a session to the room, replaying its history.
pub async fn open_session(
    State(state): State<SharedState>,
    Path((room_id, user_id)): Path<(RoomId, String)>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(
        session_service::open_session(&state, room_id, &user_id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/rooms/{room_id}/sessions/{user_id}",
    tag = "sessions",
    params(
        ("room_id" = i64, Path, description = "Identifier of the room"),
        ("user_id" = String, Path, description = "Player the session renders for")
    ),
    responses(
        (status = 200, description = "Current session state", body = SessionSnapshot),
        (status = 404, description = "No such session")
    )
)]
/// Return the current snapshot of a session.
pub async fn get_session(
    State(state): State<SharedState>,
    Path((room_id, user_id)): Path<(RoomId, String)>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(session_service::get_session(
        &state, room_id, &user_id,
    )?))
}

#[utoipa::path(
    post,
    path = "/rooms/{room_id}/sessions/{user_id}/actions",
    tag = "sessions",
    params(
        ("room_id" = i64, Path, description = "Identifier of the room"),
        ("user_id" = String, Path, description = "Player the session renders for")
    ),
    request_body = SessionActionRequest,
    responses(
        (status = 200, description = "Action processed", body = SessionActionResponse),
        (status = 404, description = "No such session"),
        (status = 409, description = "Action not valid in the current phase"),
        (status = 500, description = "Session halted after a protocol violation")
    )
)]
/// Apply a local action (`click_clue`, `answer_clue`, `start_round`) to a session.
pub async fn dispatch_action(
    State(state): State<SharedState>,
    Path((room_id, user_id)): Path<(RoomId, String)>,
    Json(payload): Json<SessionActionRequest>,
) -> Result<Json<SessionActionResponse>, AppError> {
    Ok(Json(
        session_service::dispatch_action(&state, room_id, &user_id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/rooms/{room_id}/sessions/{user_id}",
    tag = "sessions",
    params(
        ("room_id" = i64, Path, description = "Identifier of the room"),
        ("user_id" = String, Path, description = "Player the session renders for")
    ),
    responses(
        (status = 204, description = "Session detached"),
        (status = 404, description = "No such session")
    )
)]
/// Detach a session and stop following the room.
pub async fn close_session(
    State(state): State<SharedState>,
    Path((room_id, user_id)): Path<(RoomId, String)>,
) -> Result<StatusCode, AppError> {
    session_service::close_session(&state, room_id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
