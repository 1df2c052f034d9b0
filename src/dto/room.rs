//! Request and response bodies of the room endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{
        room_event::RoomId,
        validation::{validate_display_name, validate_user_id},
    },
    state::game::Game,
};

/// Catalog entry available for new rooms.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameListItem {
    pub id: String,
    pub title: String,
    pub rounds: usize,
}

impl From<&Game> for GameListItem {
    fn from(game: &Game) -> Self {
        Self {
            id: game.id.clone(),
            title: game.title.clone(),
            rounds: game.rounds(),
        }
    }
}

/// Payload used to open a new room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    /// Catalog identifier of the game to play.
    #[validate(length(min = 1, max = 64))]
    pub game_id: String,
}

/// Public description of a room.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSummary {
    pub id: RoomId,
    pub game_id: String,
    pub game_title: String,
    pub rounds: usize,
    pub created_at: String,
}

/// Payload appended as a `join` event.
#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinRoomRequest {
    /// Existing identifier to reuse; a fresh one is issued when omitted.
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
}

impl Validate for JoinRoomRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(ref id) = self.user_id {
            if let Err(e) = validate_user_id(id) {
                errors.add("user_id", e);
            }
        }
        if let Err(e) = validate_display_name(&self.name) {
            errors.add("name", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Payload appended as a `change_name` event.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeNameRequest {
    pub user_id: String,
    pub name: String,
}

impl Validate for ChangeNameRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_user_id(&self.user_id) {
            errors.add("user_id", e);
        }
        if let Err(e) = validate_display_name(&self.name) {
            errors.add("name", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Payload appended as a `start_round` event.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartRoundRequest {
    pub round: usize,
}

/// Payload appended as a `choose_clue` event.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChooseClueRequest {
    pub user_id: String,
    /// Clue index within its category.
    pub i: usize,
    /// Category index.
    pub j: usize,
}

impl Validate for ChooseClueRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_user_id(&self.user_id) {
            errors.add("user_id", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Response to a successful `join`.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinRoomResponse {
    /// Identifier to use for later requests.
    pub user_id: String,
    /// Identifier of the appended event.
    pub event_id: i64,
}

/// Response to any other append.
#[derive(Debug, Serialize, ToSchema)]
pub struct AppendResponse {
    /// Identifier of the appended event.
    pub event_id: i64,
}
