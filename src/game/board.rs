use crate::game::color::Color;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

pub const BOARD_SIDE: u8 = 7;
pub const CELL_COUNT: u8 = BOARD_SIDE * BOARD_SIDE;

/// One of the 49 board positions, `0..49` in row-major order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Cell(u8);

impl Cell {
    pub fn new(index: u8) -> Option<Self> {
        if index < CELL_COUNT {
            Some(Cell(index))
        } else {
            None
        }
    }

    pub fn from_row_col(row: u8, col: u8) -> Option<Self> {
        if row < BOARD_SIDE && col < BOARD_SIDE {
            Some(Cell(row * BOARD_SIDE + col))
        } else {
            None
        }
    }

    pub fn index(&self) -> u8 {
        self.0
    }

    pub fn row_col(&self) -> (u8, u8) {
        (self.0 / BOARD_SIDE, self.0 % BOARD_SIDE)
    }

    pub fn all() -> impl Iterator<Item = Cell> {
        (0..CELL_COUNT).map(Cell)
    }
}

impl TryFrom<i64> for Cell {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Cell::new)
            .ok_or_else(|| format!("cell index {} out of range", value))
    }
}

impl From<Cell> for u8 {
    fn from(cell: Cell) -> Self {
        cell.0
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What occupies a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Piece {
    Peg(Color),
    Thaler,
}

/// Everything a renderer needs to draw the board.
///
/// The view model has no partial mutators: pegs and thaler are replaced
/// together by `apply_snapshot`, highlights by `set_highlights`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoardViewModel {
    pegs: BTreeMap<Color, Cell>,
    thaler: Option<Cell>,
    highlights: BTreeSet<Cell>,
}

impl BoardViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace pegs and thaler with an authoritative snapshot.
    /// Highlights computed against the previous board are dropped.
    pub fn apply_snapshot(&mut self, pegs: BTreeMap<Color, Cell>, thaler: Option<Cell>) {
        self.pegs = pegs;
        self.thaler = thaler;
        self.highlights.clear();
    }

    pub fn set_highlights<I>(&mut self, cells: I)
    where
        I: IntoIterator<Item = Cell>,
    {
        self.highlights = cells.into_iter().collect();
    }

    pub fn clear_highlights(&mut self) {
        self.highlights.clear();
    }

    pub fn pegs(&self) -> &BTreeMap<Color, Cell> {
        &self.pegs
    }

    pub fn thaler(&self) -> Option<Cell> {
        self.thaler
    }

    pub fn highlights(&self) -> &BTreeSet<Cell> {
        &self.highlights
    }

    pub fn is_highlighted(&self, cell: Cell) -> bool {
        self.highlights.contains(&cell)
    }

    pub fn peg_of(&self, color: Color) -> Option<Cell> {
        self.pegs.get(&color).copied()
    }

    /// The thaler wins if a malformed snapshot puts a peg on the same cell.
    pub fn piece_at(&self, cell: Cell) -> Option<Piece> {
        if self.thaler == Some(cell) {
            return Some(Piece::Thaler);
        }
        self.pegs
            .iter()
            .find(|(_, &c)| c == cell)
            .map(|(&color, _)| Piece::Peg(color))
    }
}

#[cfg(test)]
mod test_board {
    use super::*;

    fn cell(i: u8) -> Cell {
        Cell::new(i).unwrap()
    }

    #[test]
    fn test_cell_range() {
        assert!(Cell::new(0).is_some());
        assert!(Cell::new(48).is_some());
        assert!(Cell::new(49).is_none());
        assert_eq!(Cell::from_row_col(6, 6), Cell::new(48));
        assert_eq!(Cell::from_row_col(7, 0), None);
        assert_eq!(cell(10).row_col(), (1, 3));
        assert_eq!(Cell::all().count(), 49);
    }

    #[test]
    fn test_cell_decode() {
        let c: Cell = serde_json::from_str("12").unwrap();
        assert_eq!(c.index(), 12);
        assert!(serde_json::from_str::<Cell>("49").is_err());
        assert!(serde_json::from_str::<Cell>("-1").is_err());
        assert_eq!(serde_json::to_string(&c).unwrap(), "12");
    }

    #[test]
    fn test_snapshot_overwrites_everything() {
        let mut board = BoardViewModel::new();
        let first: BTreeMap<Color, Cell> = Color::ALL
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, cell(i as u8)))
            .collect();
        board.apply_snapshot(first, Some(cell(20)));
        board.set_highlights(vec![cell(30), cell(31)]);

        let second = BTreeMap::from([(Color::Green, cell(3))]);
        board.apply_snapshot(second.clone(), Some(cell(9)));
        assert_eq!(board.pegs(), &second);
        assert_eq!(board.thaler(), Some(cell(9)));
        assert!(board.highlights().is_empty());
        assert_eq!(board.piece_at(cell(0)), None);
        assert_eq!(board.piece_at(cell(3)), Some(Piece::Peg(Color::Green)));
        assert_eq!(board.piece_at(cell(9)), Some(Piece::Thaler));
    }

    #[test]
    fn test_same_snapshot_twice() {
        let pegs = BTreeMap::from([(Color::Red, cell(5)), (Color::Blue, cell(6))]);
        let mut once = BoardViewModel::new();
        once.apply_snapshot(pegs.clone(), Some(cell(10)));
        let mut twice = once.clone();
        twice.apply_snapshot(pegs, Some(cell(10)));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_highlights_replace() {
        let mut board = BoardViewModel::new();
        board.set_highlights(vec![cell(1), cell(2)]);
        board.set_highlights(vec![cell(3)]);
        assert_eq!(board.highlights(), &BTreeSet::from([cell(3)]));
        assert!(board.is_highlighted(cell(3)));
        assert!(!board.is_highlighted(cell(1)));
        board.clear_highlights();
        assert!(board.highlights().is_empty());
    }
}
