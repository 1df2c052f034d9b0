//! Turns persisted room events into reducer actions.

use thiserror::Error;
use tracing::debug;

use crate::{
    dto::room_event::{DecodeError, EventId, RoomEvent, RoomEventBody},
    state::{
        game::Player,
        grid::Cell,
        state_machine::{Action, State},
    },
};

/// Fatal translation failure: the log producer broke the wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("event {id} rejected: {source}")]
pub struct TranslateError {
    /// Identifier of the offending event.
    pub id: EventId,
    /// What was wrong with it.
    #[source]
    pub source: DecodeError,
}

/// Translate `event` into an action against the current `state`.
///
/// Returns `Ok(None)` when a `choose_clue` event is not admissible right now
/// (wrong phase, sender without board control, answered, unknown or negative cell).
/// Must be called in log order, right before the result is reduced.
pub fn translate(event: &RoomEvent, state: &State) -> Result<Option<Action>, TranslateError> {
    let body = event.body().map_err(|source| TranslateError {
        id: event.id,
        source,
    })?;

    let action = match body {
        RoomEventBody::Join(payload) => {
            Action::PlayerJoin(Player::new(payload.user_id, payload.name))
        }
        RoomEventBody::ChangeName(payload) => {
            Action::PlayerChangeName(Player::new(payload.user_id, payload.name))
        }
        RoomEventBody::StartRound(payload) => Action::StartRound(payload.round),
        RoomEventBody::ChooseClue(payload) => {
            let (Ok(row), Ok(col)) = (usize::try_from(payload.i), usize::try_from(payload.j))
            else {
                debug!(
                    event_id = event.id,
                    i = payload.i,
                    j = payload.j,
                    "dropping clue choice with negative index"
                );
                return Ok(None);
            };
            let cell = Cell::new(row, col);
            let has_control = state.board_control() == Some(payload.user_id.as_str());
            if !has_control || !state.can_open(cell) {
                debug!(
                    event_id = event.id,
                    user_id = %payload.user_id,
                    ?cell,
                    has_control,
                    phase = ?state.phase(),
                    "dropping inadmissible clue choice"
                );
                return Ok(None);
            }
            Action::ClickClue(cell)
        }
    };

    Ok(Some(action))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};

    use super::*;
    use crate::{
        dto::room_event::{RoomEventType, UnknownEventType},
        state::{
            game::Game,
            state_machine::{Phase, reduce},
        },
    };

    fn event(id: EventId, kind: &str, payload: Value) -> RoomEvent {
        RoomEvent {
            id,
            timestamp: "2024-01-01T00:00:00Z".into(),
            room_id: 1,
            kind: kind.into(),
            payload,
        }
    }

    fn started_with_host(host: &str) -> State {
        let state = State::new(Arc::new(Game::mock()));
        let state = reduce(&state, Action::PlayerJoin(Player::new(host, host))).unwrap();
        reduce(&state, Action::StartRound(0)).unwrap()
    }

    #[test]
    fn player_events_become_player_actions() {
        let state = State::new(Arc::new(Game::mock()));
        let join = event(1, "join", json!({ "userId": "a", "name": "Alice" }));
        let rename = event(2, "change_name", json!({ "userId": "a", "name": "Ally" }));

        assert_eq!(
            translate(&join, &state).unwrap(),
            Some(Action::PlayerJoin(Player::new("a", "Alice")))
        );
        assert_eq!(
            translate(&rename, &state).unwrap(),
            Some(Action::PlayerChangeName(Player::new("a", "Ally")))
        );
    }

    #[test]
    fn start_round_is_forwarded_unconditionally() {
        let state = State::new(Arc::new(Game::mock()));
        let start = event(1, "start_round", json!({ "round": 4 }));
        assert_eq!(translate(&start, &state).unwrap(), Some(Action::StartRound(4)));
    }

    #[test]
    fn choose_clue_from_board_control_is_admitted() {
        let state = started_with_host("a");
        let choose = event(3, "choose_clue", json!({ "userId": "a", "i": 1, "j": 0 }));
        assert_eq!(
            translate(&choose, &state).unwrap(),
            Some(Action::ClickClue(Cell::new(1, 0)))
        );
    }

    #[test]
    fn choose_clue_from_other_player_is_dropped() {
        let state = started_with_host("a");
        let state = reduce(&state, Action::PlayerJoin(Player::new("b", "Bob"))).unwrap();
        let choose = event(4, "choose_clue", json!({ "userId": "b", "i": 0, "j": 0 }));
        assert_eq!(translate(&choose, &state).unwrap(), None);
    }

    #[test]
    fn choose_clue_outside_choice_phase_or_on_answered_cell_is_dropped() {
        let preview = State::new(Arc::new(Game::mock()));
        let preview = reduce(&preview, Action::PlayerJoin(Player::new("a", "a"))).unwrap();
        let choose = event(5, "choose_clue", json!({ "userId": "a", "i": 0, "j": 0 }));
        assert_eq!(translate(&choose, &preview).unwrap(), None);

        let state = started_with_host("a");
        let state = reduce(&state, Action::ClickClue(Cell::new(0, 0))).unwrap();
        let state = reduce(&state, Action::AnswerClue).unwrap();
        assert_eq!(state.phase(), Phase::AwaitingClueChoice);
        assert_eq!(translate(&choose, &state).unwrap(), None);

        let off_board = event(6, "choose_clue", json!({ "userId": "a", "i": 9, "j": 9 }));
        assert_eq!(translate(&off_board, &state).unwrap(), None);
    }

    #[test]
    fn choose_clue_with_negative_index_is_dropped() {
        let state = started_with_host("a");
        let negative = event(7, "choose_clue", json!({ "userId": "a", "i": -1, "j": 0 }));
        assert_eq!(translate(&negative, &state).unwrap(), None);
    }

    #[test]
    fn unknown_type_is_fatal() {
        let state = State::new(Arc::new(Game::mock()));
        let err = translate(&event(9, "buzz", json!({})), &state).unwrap_err();
        assert_eq!(err.id, 9);
        assert_eq!(
            err.source,
            DecodeError::UnknownType(UnknownEventType("buzz".into()))
        );
    }

    #[test]
    fn malformed_payload_is_fatal() {
        let state = State::new(Arc::new(Game::mock()));
        let err = translate(&event(10, "join", json!({ "userId": "a" })), &state).unwrap_err();
        assert!(matches!(
            err.source,
            DecodeError::MalformedPayload {
                kind: RoomEventType::Join,
                ..
            }
        ));
    }
}
