mod board;
mod color;

pub use board::{BoardViewModel, Cell, Piece, BOARD_SIDE, CELL_COUNT};
pub use color::Color;
