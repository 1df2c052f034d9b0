//! Read-only projections of a [`State`] for rendering.

use indexmap::map::Values;

use crate::state::{
    game::{Board, Category, Clue, Player},
    grid::{Cell, Grid},
    state_machine::{Phase, State},
};

/// Derived, non-authoritative view over a state. Rebuild it whenever the state changes.
#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    state: &'a State,
}

impl<'a> SessionView<'a> {
    /// View `state`.
    pub fn new(state: &'a State) -> Self {
        Self { state }
    }

    /// Underlying state.
    pub fn state(&self) -> &'a State {
        self.state
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Current round index.
    pub fn round(&self) -> usize {
        self.state.round()
    }

    /// Board for the current round; `None` once every round has been played.
    pub fn board(&self) -> Option<&'a Board> {
        self.state.game().board(self.state.round())
    }

    /// Clue being read, if any.
    pub fn clue(&self) -> Option<&'a Clue> {
        let Cell { row, col } = self.state.active_clue()?;
        self.board()?.clue(row, col)
    }

    /// Category of the clue being read, if any.
    pub fn category(&self) -> Option<&'a Category> {
        let cell = self.state.active_clue()?;
        self.board()?.categories.get(cell.col)
    }

    /// Whether the clue at `(row, col)` was answered this round.
    pub fn is_answered(&self, row: usize, col: usize) -> bool {
        self.state.is_answered(row, col)
    }

    /// Players in join order.
    pub fn players(&self) -> Values<'a, String, Player> {
        self.state.players().values()
    }

    /// Player allowed to choose the next clue.
    pub fn board_control(&self) -> Option<&'a str> {
        self.state.board_control()
    }

    /// Whether `user_id` may choose the next clue.
    pub fn has_board_control(&self, user_id: &str) -> bool {
        self.board_control() == Some(user_id)
    }

    /// True once the round counter has moved past the last board.
    pub fn is_game_over(&self) -> bool {
        self.state.round() >= self.state.game().rounds()
    }

    /// Board laid out for rendering: one row per clue index, one column per
    /// category, `None` where a category is shorter than the tallest one.
    pub fn clue_rows(&self) -> Grid<Option<&'a Clue>> {
        let Some(board) = self.board() else {
            return Grid::filled(0, 0, None);
        };
        let rows = board
            .categories
            .iter()
            .map(|category| category.clues.len())
            .max()
            .unwrap_or(0);
        Grid::from_fn(rows, board.categories.len(), |row, col| board.clue(row, col))
    }
}
