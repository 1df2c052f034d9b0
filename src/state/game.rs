use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Read-only trivia game: one board per round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Game {
    /// Catalog identifier used when creating rooms.
    pub id: String,
    /// Human readable title.
    pub title: String,
    /// Who wrote the clues.
    #[serde(default)]
    pub author: String,
    /// Copyright notice shipped with the clues.
    #[serde(default)]
    pub copyright: String,
    /// Free-form note displayed before the game starts.
    #[serde(default)]
    pub note: String,
    /// Boards in round order.
    pub boards: Vec<Board>,
}

/// Categories played during a single round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Board {
    /// Categories in column order.
    pub categories: Vec<Category>,
}

/// Named column of clues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Category {
    /// Category title shown above the column.
    pub name: String,
    /// Optional hint attached to the category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Clues ordered from lowest to highest value.
    pub clues: Vec<Clue>,
}

/// Single question/answer unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Clue {
    /// Text read to the players.
    pub clue: String,
    /// Expected response.
    pub answer: String,
    /// Point value.
    pub value: u32,
}

/// Participant in a room, keyed by `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Player {
    /// Stable identifier issued when the player first joined.
    pub user_id: String,
    /// Display name, may change during the session.
    pub name: String,
}

impl Game {
    /// Board played during `round`, if the game has that many rounds.
    pub fn board(&self, round: usize) -> Option<&Board> {
        self.boards.get(round)
    }

    /// Number of rounds (boards) in the game.
    pub fn rounds(&self) -> usize {
        self.boards.len()
    }

    /// Check that every board is rectangular and non-empty.
    ///
    /// The reducer assumes this shape and never re-validates it.
    pub fn check_shape(&self) -> Result<(), String> {
        if self.boards.is_empty() {
            return Err(format!("game `{}` has no boards", self.id));
        }

        for (round, board) in self.boards.iter().enumerate() {
            let Some(first) = board.categories.first() else {
                return Err(format!("game `{}` round {round} has no categories", self.id));
            };
            let expected = first.clues.len();
            if expected == 0 {
                return Err(format!(
                    "game `{}` round {round} category `{}` has no clues",
                    self.id, first.name
                ));
            }
            if let Some(category) = board.categories.iter().find(|c| c.clues.len() != expected) {
                return Err(format!(
                    "game `{}` round {round} is not rectangular: category `{}` has {} clues, expected {expected}",
                    self.id,
                    category.name,
                    category.clues.len()
                ));
            }
        }

        Ok(())
    }

    /// Two-round game used as the built-in catalog entry and in tests.
    ///
    /// The first round has one category with two clues, the second round one
    /// category with a single clue.
    pub fn mock() -> Self {
        Self {
            id: "mock".into(),
            title: "Mock Game".into(),
            author: String::new(),
            copyright: String::new(),
            note: String::new(),
            boards: vec![
                Board {
                    categories: vec![Category {
                        name: "Round 1, Category 1".into(),
                        note: None,
                        clues: vec![
                            Clue {
                                clue: "a".into(),
                                answer: "b".into(),
                                value: 200,
                            },
                            Clue {
                                clue: "c".into(),
                                answer: "d".into(),
                                value: 400,
                            },
                        ],
                    }],
                },
                Board {
                    categories: vec![Category {
                        name: "Round 2, Category 1".into(),
                        note: None,
                        clues: vec![Clue {
                            clue: "e".into(),
                            answer: "f".into(),
                            value: 400,
                        }],
                    }],
                },
            ],
        }
    }
}

impl Board {
    /// `(rows, cols)`: clues per category and number of categories.
    pub fn shape(&self) -> (usize, usize) {
        let rows = self
            .categories
            .first()
            .map(|category| category.clues.len())
            .unwrap_or(0);
        (rows, self.categories.len())
    }

    /// Total number of clues on the board.
    pub fn clue_count(&self) -> usize {
        self.categories.iter().map(|c| c.clues.len()).sum()
    }

    /// Clue at `(row, col)`, with `row` indexing into the category at `col`.
    pub fn clue(&self, row: usize, col: usize) -> Option<&Clue> {
        self.categories.get(col)?.clues.get(row)
    }

    /// Category names in column order.
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }
}

impl Player {
    /// Build a player from its identifier and display name.
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_game_is_rectangular() {
        let game = Game::mock();
        assert!(game.check_shape().is_ok());
        assert_eq!(game.rounds(), 2);
        assert_eq!(game.board(0).map(Board::shape), Some((2, 1)));
        assert_eq!(game.board(0).map(Board::clue_count), Some(2));
        assert_eq!(game.board(0).and_then(|b| b.clue(1, 0)).map(|c| c.value), Some(400));
    }

    #[test]
    fn ragged_board_is_rejected() {
        let mut game = Game::mock();
        game.boards[0].categories.push(Category {
            name: "short".into(),
            note: None,
            clues: vec![],
        });

        let err = game.check_shape().unwrap_err();
        assert!(err.contains("not rectangular"), "{err}");
    }

    #[test]
    fn game_without_boards_is_rejected() {
        let mut game = Game::mock();
        game.boards.clear();
        assert!(game.check_shape().is_err());
    }
}
