//! Serialisable projections of a hosted player session.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    services::replication::ReplicaSnapshot,
    state::{
        game::{Category, Clue, Player},
        grid::Cell,
        state_machine::Phase,
        view::SessionView,
    },
};

/// Phase of the turn loop as sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PhaseSnapshot {
    Preview,
    AwaitingClueChoice,
    /// See [`SessionSnapshot::active_clue`] for the open cell.
    ActiveClue,
}

impl From<Phase> for PhaseSnapshot {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Preview => PhaseSnapshot::Preview,
            Phase::AwaitingClueChoice => PhaseSnapshot::AwaitingClueChoice,
            Phase::ActiveClue(_) => PhaseSnapshot::ActiveClue,
        }
    }
}

/// One board square as rendered for a client.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClueSquare {
    pub value: u32,
    pub answered: bool,
}

/// The clue currently being read.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActiveClueSummary {
    pub row: usize,
    pub col: usize,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_note: Option<String>,
    pub clue: String,
    pub answer: String,
    pub value: u32,
}

/// Everything a client needs to render a session.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionSnapshot {
    pub room_id: i64,
    pub user_id: String,
    pub game_title: String,
    pub round: usize,
    pub rounds: usize,
    pub phase: PhaseSnapshot,
    pub game_over: bool,
    /// Category names of the current board, left to right.
    pub categories: Vec<String>,
    /// Board squares, one row per clue index; `null` where a category is short.
    pub board: Vec<Vec<Option<ClueSquare>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_clue: Option<ActiveClueSummary>,
    pub answered: usize,
    pub clues_in_round: usize,
    /// Players in the order the session first saw them; display order only.
    pub players: Vec<Player>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_control: Option<String>,
    pub has_board_control: bool,
    pub events_seen: usize,
    /// Set once the session stopped following the room after a protocol violation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

impl SessionSnapshot {
    /// Render `snapshot` from the point of view of `user_id`.
    pub fn from_replica(room_id: i64, user_id: &str, snapshot: &ReplicaSnapshot) -> Self {
        let state = snapshot.state.as_ref();
        let view = SessionView::new(state);

        let board = view
            .clue_rows()
            .iter_rows()
            .enumerate()
            .map(|(row, clues)| {
                clues
                    .iter()
                    .copied()
                    .enumerate()
                    .map(|(col, clue)| {
                        clue.map(|clue| ClueSquare {
                            value: clue.value,
                            answered: view.is_answered(row, col),
                        })
                    })
                    .collect()
            })
            .collect();

        let active_clue = match (state.active_clue(), view.clue(), view.category()) {
            (Some(cell), Some(clue), Some(category)) => {
                Some(ActiveClueSummary::new(cell, category, clue))
            }
            _ => None,
        };

        Self {
            room_id,
            user_id: user_id.to_string(),
            game_title: state.game().title.clone(),
            round: view.round(),
            rounds: state.game().rounds(),
            phase: view.phase().into(),
            game_over: view.is_game_over(),
            categories: view
                .board()
                .map(|board| board.category_names().map(str::to_string).collect())
                .unwrap_or_default(),
            board,
            active_clue,
            answered: state.num_answered(),
            clues_in_round: state.num_clues_in_round(),
            players: view.players().cloned().collect(),
            board_control: view.board_control().map(str::to_string),
            has_board_control: view.has_board_control(user_id),
            events_seen: snapshot.events_seen,
            fault: snapshot.fault.clone(),
        }
    }
}

impl ActiveClueSummary {
    fn new(cell: Cell, category: &Category, clue: &Clue) -> Self {
        Self {
            row: cell.row,
            col: cell.col,
            category: category.name.clone(),
            category_note: category.note.clone(),
            clue: clue.clue.clone(),
            answer: clue.answer.clone(),
            value: clue.value,
        }
    }
}

/// Locally originated action sent to a hosted session.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SessionActionRequest {
    /// Open a clue; only honoured while the session's player holds board control.
    ClickClue { row: usize, col: usize },
    /// Close the active clue.
    AnswerClue,
    /// Leave the preview of `round` on this session only.
    StartRound { round: usize },
}

/// Result of a session action.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionActionResponse {
    /// Whether the action reached the reducer.
    pub dispatched: bool,
    pub snapshot: SessionSnapshot,
}
