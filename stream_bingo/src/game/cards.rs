//! Card generation and win checking.
//!
//! A card is a 5x5 grid of ball values. Column k (0-indexed) is drawn without
//! replacement from the band `15k+1 ..= 15k+15`, so the columns line up with
//! the B-I-N-G-O letter bands. Cell 12 (the center) is a free marker when the
//! card is generated with a free space.
//!
//! Win checking is a pure function of the immutable grid and the authoritative
//! call history. Client-reported marks are display state only and are never
//! consulted here.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::balls::Ball;
use super::errors::GameError;

/// Number of cells in a card grid
pub const GRID_SIZE: usize = 25;

/// Row-major index of the center cell
pub const CENTER_CELL: usize = 12;

/// One cell of a card grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    /// A ball value in 1..=75
    Number(Ball),
    /// The free center marker, always considered matched
    Free,
}

/// Win condition for a card check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WinMode {
    /// Any full row, column, or diagonal
    #[default]
    Line,
    /// Every cell on the card
    Blackout,
}

/// An immutable 5x5 card grid, row-major
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid(pub [Cell; GRID_SIZE]);

/// A player's card for one game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    /// Unique card identifier assigned by the store
    pub id: i64,

    /// Name of the owning game
    pub game_name: String,

    /// Identifier of the player holding the card
    pub holder_id: i64,

    /// Display name of the player holding the card
    pub holder_name: String,

    /// The card grid, fixed at creation time
    pub grid: Grid,
}

/// The 12 winning lines: 5 rows, 5 columns, 2 diagonals
const LINES: [[usize; 5]; 12] = [
    [0, 1, 2, 3, 4],
    [5, 6, 7, 8, 9],
    [10, 11, 12, 13, 14],
    [15, 16, 17, 18, 19],
    [20, 21, 22, 23, 24],
    [0, 5, 10, 15, 20],
    [1, 6, 11, 16, 21],
    [2, 7, 12, 17, 22],
    [3, 8, 13, 18, 23],
    [4, 9, 14, 19, 24],
    [0, 6, 12, 18, 24],
    [4, 8, 12, 16, 20],
];

impl Grid {
    /// Generate a random grid, optionally with a free center cell
    pub fn generate(free_space: bool) -> Self {
        Self::generate_with_rng(free_space, &mut rand::rng())
    }

    /// Generate a random grid using the provided RNG
    pub fn generate_with_rng<R: Rng>(free_space: bool, rng: &mut R) -> Self {
        let mut cells = [Cell::Free; GRID_SIZE];

        for col in 0..5 {
            let base = (col as Ball) * 15;
            let mut band: Vec<Ball> = (base + 1..=base + 15).collect();
            band.shuffle(rng);

            for (row, value) in band.into_iter().take(5).enumerate() {
                cells[row * 5 + col] = Cell::Number(value);
            }
        }

        if free_space {
            cells[CENTER_CELL] = Cell::Free;
        }

        Grid(cells)
    }

    /// Whether a cell counts as covered given the call history
    fn covered(&self, index: usize, called: &[Ball]) -> bool {
        match self.0[index] {
            Cell::Free => true,
            Cell::Number(value) => called.contains(&value),
        }
    }

    /// Check the grid against a call history for the given win mode
    pub fn check_win(&self, called: &[Ball], mode: WinMode) -> bool {
        match mode {
            WinMode::Line => LINES
                .iter()
                .any(|line| line.iter().all(|&cell| self.covered(cell, called))),
            WinMode::Blackout => (0..GRID_SIZE).all(|cell| self.covered(cell, called)),
        }
    }

    /// Encode the grid as the stored comma-joined representation
    ///
    /// The free cell is stored as `0`.
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|cell| match cell {
                Cell::Free => "0".to_string(),
                Cell::Number(value) => value.to_string(),
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Decode a grid from its stored comma-joined representation
    ///
    /// # Errors
    ///
    /// Returns [`GameError::CardNotFound`] when the stored text does not parse
    /// as exactly 25 cell values.
    pub fn decode(text: &str) -> Result<Self, GameError> {
        let values: Vec<Ball> = text
            .split(',')
            .map(|part| part.trim().parse().map_err(|_| GameError::CardNotFound))
            .collect::<Result<_, _>>()?;

        if values.len() != GRID_SIZE {
            return Err(GameError::CardNotFound);
        }

        let mut cells = [Cell::Free; GRID_SIZE];
        for (index, value) in values.into_iter().enumerate() {
            cells[index] = if value == 0 {
                Cell::Free
            } else {
                Cell::Number(value)
            };
        }

        Ok(Grid(cells))
    }
}
