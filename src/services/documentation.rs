use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the trivia room server.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::list_games,
        crate::routes::rooms::create_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::change_name,
        crate::routes::rooms::start_round,
        crate::routes::rooms::choose_clue,
        crate::routes::rooms::list_events,
        crate::routes::sessions::open_session,
        crate::routes::sessions::get_session,
        crate::routes::sessions::dispatch_action,
        crate::routes::sessions::close_session,
        crate::routes::sse::room_stream,
        crate::routes::sse::session_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::GameListItem,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::RoomSummary,
            crate::dto::room::JoinRoomRequest,
            crate::dto::room::JoinRoomResponse,
            crate::dto::room::ChangeNameRequest,
            crate::dto::room::StartRoundRequest,
            crate::dto::room::ChooseClueRequest,
            crate::dto::room::AppendResponse,
            crate::dto::room_event::RoomEvent,
            crate::dto::session::SessionSnapshot,
            crate::dto::session::SessionActionRequest,
            crate::dto::session::SessionActionResponse,
            crate::dto::sse::Handshake,
            crate::state::game::Game,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room catalog and event log appends"),
        (name = "sessions", description = "Server-hosted player sessions"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_room_and_session_paths() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/rooms/{room_id}/join"));
        assert!(paths.contains_key("/rooms/{room_id}/sessions/{user_id}/actions"));
        assert!(paths.contains_key("/rooms/{room_id}/events/stream"));
    }
}
