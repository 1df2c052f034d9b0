use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

use crate::state::{
    game::{Board, Game, Player},
    grid::{Cell, Grid},
};

/// Stage of the per-round turn loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Round preview; waiting for the round to be started.
    Preview,
    /// The player with board control picks the next clue.
    AwaitingClueChoice,
    /// A clue is being read and answered.
    ActiveClue(Cell),
}

/// Inputs accepted by [`reduce`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open the clue at the given cell.
    ClickClue(Cell),
    /// Close the active clue, marking it answered.
    AnswerClue,
    /// A player joined the room.
    PlayerJoin(Player),
    /// A player picked a new display name.
    PlayerChangeName(Player),
    /// Leave the preview of the given round.
    StartRound(usize),
}

/// Contract violations detected while reducing an action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    /// `AnswerClue` arrived while no clue was active.
    #[error("cannot answer a clue while no clue is active (phase {phase:?})")]
    NoActiveClue {
        /// Phase the state was in when the action arrived.
        phase: Phase,
    },
}

/// Replicated game state. Only [`reduce`] produces new values.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    game: Arc<Game>,
    phase: Phase,
    round: usize,
    answered: Grid<bool>,
    num_answered: usize,
    num_clues_in_round: usize,
    board_control: Option<String>,
    /// Keyed by user id. Iteration follows arrival order on this replica,
    /// which is presentation-only: equality compares the entries, not their
    /// order.
    players: IndexMap<String, Player>,
}

impl State {
    /// Fresh state positioned on the preview of round 0.
    pub fn new(game: Arc<Game>) -> Self {
        let answered = Grid::for_board(game.board(0), false);
        let num_clues_in_round = game.board(0).map(Board::clue_count).unwrap_or(0);
        Self {
            game,
            phase: Phase::Preview,
            round: 0,
            answered,
            num_answered: 0,
            num_clues_in_round,
            board_control: None,
            players: IndexMap::new(),
        }
    }

    /// Game reference data this state is played against.
    pub fn game(&self) -> &Arc<Game> {
        &self.game
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Index of the current round; may point past the last board once the game is over.
    pub fn round(&self) -> usize {
        self.round
    }

    /// Answered flags for the current round.
    pub fn answered(&self) -> &Grid<bool> {
        &self.answered
    }

    /// Whether the clue at `(row, col)` was answered this round.
    ///
    /// Out-of-bounds addresses report `false`.
    pub fn is_answered(&self, row: usize, col: usize) -> bool {
        self.answered.get(row, col).copied().unwrap_or(false)
    }

    /// Number of clues answered this round.
    pub fn num_answered(&self) -> usize {
        self.num_answered
    }

    /// Number of clues on the current round's board.
    pub fn num_clues_in_round(&self) -> usize {
        self.num_clues_in_round
    }

    /// Clue currently being read, if any.
    pub fn active_clue(&self) -> Option<Cell> {
        match self.phase {
            Phase::ActiveClue(cell) => Some(cell),
            _ => None,
        }
    }

    /// Player allowed to choose the next clue.
    pub fn board_control(&self) -> Option<&str> {
        self.board_control.as_deref()
    }

    /// Players in the order this replica first saw them.
    ///
    /// Replicas folding the same backlog agree on it; replicas that saw live
    /// events interleave differently may not.
    pub fn players(&self) -> &IndexMap<String, Player> {
        &self.players
    }

    /// Whether `cell` can be opened right now: the board is waiting for a
    /// choice and the cell exists and is unanswered.
    pub fn can_open(&self, cell: Cell) -> bool {
        self.phase == Phase::AwaitingClueChoice && self.answered.at(cell) == Some(&false)
    }

    fn enter_round(&self, round: usize) -> Self {
        let board = self.game.board(round);
        Self {
            game: Arc::clone(&self.game),
            phase: Phase::Preview,
            round,
            answered: Grid::for_board(board, false),
            num_answered: 0,
            num_clues_in_round: board.map(Board::clue_count).unwrap_or(0),
            board_control: self.board_control.clone(),
            players: self.players.clone(),
        }
    }
}

/// Apply `action` to `state`, returning the next state.
///
/// Never mutates `state`. Benign races (stale rounds, already answered or
/// unknown cells, clicks outside the choice phase) return an unchanged copy.
pub fn reduce(state: &State, action: Action) -> Result<State, ReduceError> {
    let next = match action {
        Action::StartRound(round) => {
            if state.phase == Phase::Preview && round == state.round {
                State {
                    phase: Phase::AwaitingClueChoice,
                    ..state.clone()
                }
            } else {
                debug!(
                    round,
                    current = state.round,
                    phase = ?state.phase,
                    "ignoring stale round start"
                );
                state.clone()
            }
        }
        Action::ClickClue(cell) => {
            if state.can_open(cell) {
                State {
                    phase: Phase::ActiveClue(cell),
                    ..state.clone()
                }
            } else {
                debug!(?cell, phase = ?state.phase, "ignoring clue click");
                state.clone()
            }
        }
        Action::AnswerClue => {
            let Phase::ActiveClue(cell) = state.phase else {
                return Err(ReduceError::NoActiveClue { phase: state.phase });
            };
            answer(state, cell)
        }
        Action::PlayerJoin(player) => {
            let mut next = state.clone();
            if next.players.is_empty() {
                next.board_control = Some(player.user_id.clone());
            }
            next.players.insert(player.user_id.clone(), player);
            next
        }
        Action::PlayerChangeName(player) => {
            let mut next = state.clone();
            next.players.insert(player.user_id.clone(), player);
            next
        }
    };

    Ok(next)
}

fn answer(state: &State, cell: Cell) -> State {
    // The active cell was admitted by `can_open`, so it is in bounds.
    let answered = state
        .answered
        .set(cell.row, cell.col, true)
        .unwrap_or_else(|| state.answered.clone());
    let num_answered = state.num_answered + 1;

    if num_answered >= state.num_clues_in_round {
        return state.enter_round(state.round + 1);
    }

    State {
        phase: Phase::AwaitingClueChoice,
        answered,
        num_answered,
        ..state.clone()
    }
}
