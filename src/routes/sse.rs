use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    dto::room_event::RoomId,
    error::{AppError, ServiceError},
    services::{
        room_service, session_service,
        sse_service::{self, StreamKind},
    },
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/rooms/{room_id}/events/stream",
    tag = "sse",
    params(("room_id" = i64, Path, description = "Identifier of the room")),
    responses(
        (status = 200, description = "Live room events", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown room")
    )
)]
/// Stream events appended to a room from now on.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(room_id): Path<RoomId>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    room_service::require_room(&state, room_id)?;
    let feed = state
        .room_log()
        .subscribe(room_id)
        .await
        .map_err(ServiceError::from)?;
    info!(room_id, "new room SSE connection");
    Ok(sse_service::to_sse_stream(
        sse_service::room_events(feed),
        StreamKind::Room(room_id),
    ))
}

#[utoipa::path(
    get,
    path = "/rooms/{room_id}/sessions/{user_id}/stream",
    tag = "sse",
    params(
        ("room_id" = i64, Path, description = "Identifier of the room"),
        ("user_id" = String, Path, description = "Player the session renders for")
    ),
    responses(
        (status = 200, description = "Session snapshots", content_type = "text/event-stream", body = String),
        (status = 404, description = "No such session")
    )
)]
/// Stream a session's snapshot every time its state changes.
pub async fn session_stream(
    State(state): State<SharedState>,
    Path((room_id, user_id)): Path<(RoomId, String)>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let receiver = session_service::subscribe_session(&state, room_id, &user_id)?;
    info!(room_id, %user_id, "new session SSE connection");
    Ok(sse_service::to_sse_stream(
        sse_service::session_snapshots(receiver, room_id, user_id.clone()),
        StreamKind::Session(room_id, user_id),
    ))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/rooms/{room_id}/events/stream", get(room_stream))
        .route(
            "/rooms/{room_id}/sessions/{user_id}/stream",
            get(session_stream),
        )
}
