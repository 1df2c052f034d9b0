//! Rectangular addressing helpers for clue boards.
//!
//! Rows are clue indices within a category and columns are category indices,
//! which matches how boards are rendered (one column per category).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::game::Board;

/// Address of a single clue on a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Cell {
    /// Clue index within its category.
    pub row: usize,
    /// Category index within the board.
    pub col: usize,
}

impl Cell {
    /// Build a cell from its row and column.
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Immutable `rows × cols` matrix with copy-on-write updates.
///
/// Cloning a grid only bumps a reference count; [`Grid::set`] always
/// allocates fresh storage so two states never share a mutated matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Arc<[T]>,
}

impl<T: Clone> Grid<T> {
    /// Create a grid where every cell holds `value`.
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        let cells: Vec<T> = vec![value; rows * cols];
        Self {
            rows,
            cols,
            cells: cells.into(),
        }
    }

    /// Create a grid shaped like `board`, or an empty grid when there is no board.
    ///
    /// The row count is taken from the first category; boards are assumed to
    /// be rectangular.
    pub fn for_board(board: Option<&Board>, value: T) -> Self {
        let (rows, cols) = board.map(Board::shape).unwrap_or((0, 0));
        Self::filled(rows, cols, value)
    }

    /// Number of rows (clues per category).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (categories).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Borrow the value at `(row, col)`, if it is in bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        self.index(row, col).map(|idx| &self.cells[idx])
    }

    /// Borrow the value at `cell`, if it is in bounds.
    pub fn at(&self, cell: Cell) -> Option<&T> {
        self.get(cell.row, cell.col)
    }

    /// Return a new grid with `(row, col)` replaced by `value`.
    ///
    /// Returns `None` when the address is out of bounds; `self` is never touched.
    pub fn set(&self, row: usize, col: usize, value: T) -> Option<Self> {
        let idx = self.index(row, col)?;
        let mut cells = self.cells.to_vec();
        cells[idx] = value;
        Some(Self {
            rows: self.rows,
            cols: self.cols,
            cells: cells.into(),
        })
    }

    /// Count cells matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&T) -> bool) -> usize {
        self.cells.iter().filter(|value| predicate(value)).count()
    }

    /// Iterate over the rows as slices.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[T]> {
        // chunks(0) panics, so an empty grid yields no rows.
        self.cells.chunks(self.cols.max(1)).take(self.rows)
    }

    /// Copy the grid into nested vectors, row by row.
    pub fn to_rows(&self) -> Vec<Vec<T>> {
        self.iter_rows().map(<[T]>::to_vec).collect()
    }

    fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.cols).then(|| row * self.cols + col)
    }
}

impl<T> Grid<T> {
    /// Build a grid by evaluating `cell` at every address.
    pub fn from_fn(rows: usize, cols: usize, cell: impl Fn(usize, usize) -> T) -> Self {
        let cells: Vec<T> = (0..rows)
            .flat_map(|row| (0..cols).map(move |col| (row, col)))
            .map(|(row, col)| cell(row, col))
            .collect();
        Self {
            rows,
            cols,
            cells: cells.into(),
        }
    }
}
