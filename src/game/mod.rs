//! The position-state collaborator: a compact Go-style board and history.
//!
//! The book only needs a handful of things from the game rules: apply a move, check legality
//! (strictly and tolerantly), produce a hash of the full situation, and bound the size of the
//! region a move interacts with. This module provides those on a small Go board with captures,
//! simple ko, optional situational superko, and games ending after two consecutive passes.
//!
//! # Module Organization
//!
//! - [`zobrist`]: Explicitly constructed, immutable zobrist tables
//! - [`loc`]: Points, locations, players and colors, plus GTP-style location strings
//! - [`rules`]: Ruleset options that affect legality and the situation hash
//! - [`board`]: Stones, captures, ko point and position hashes
//! - [`history`]: Move history, player to move, superko and game end

mod board;
mod history;
mod loc;
mod rules;
mod zobrist;

pub use board::Board;
pub use history::{BoardHistory, Move};
pub use loc::{BoardDims, Color, Loc, Player, Point, MAX_BOARD_LEN};
pub use rules::{KoRule, Rules};
pub use zobrist::ZobristTable;
