//! # openbook-core
//!
//! A library for growing and maintaining opening books for Go: graphs of positions reachable from
//! a starting position, annotated with evaluations and ranked by how much they would benefit from
//! further exploration.
//!
//! ## Overview
//!
//! An external driver (typically wrapping a neural-net guided search) runs a loop against a
//! [`book::Book`]:
//!
//! 1. ask for the cheapest frontier nodes with [`book::Book::next_n_to_expand`],
//! 2. evaluate them, producing leaf statistics and candidate moves,
//! 3. feed the results back with [`book::SymNode::play_and_add_move`] and by editing each node's
//!    [`book::BookValues`],
//! 4. call [`book::Book::recompute`] so aggregated values and costs reflect the update.
//!
//! ### Key Features
//!
//! - **Symmetry-canonical storage**: every position is stored once, in the orientation whose hash
//!   is smallest, however many board symmetries and move orders lead to it
//! - **Transpositions and cycles**: nodes link to each other by hash, so the book is a general
//!   graph rather than a tree
//! - **Oriented views**: [`book::SymNode`] lets callers work in whatever orientation they see the
//!   board in, and translates to and from the stored orientation
//! - **Cost-driven expansion**: minimax value bounds and a configurable cost model decide which
//!   nodes to expand next
//! - **Crash-safe persistence**: line-oriented JSON files written through a temporary file
//!
//! ## Quick Start
//!
//! ```rust
//! use openbook_core::{
//!     book::{Book, BookValues},
//!     config::{BoardSetup, BookConfig},
//!     game::{Loc, Rules},
//! };
//!
//! # fn main() -> Result<(), openbook_core::BookError> {
//! let config = BookConfig::new(BoardSetup::empty(7, 7), Rules::default(), 9);
//! let mut book = Book::new(&config)?;
//!
//! for _ in 0..3 {
//!     let frontier: Vec<_> = book.next_n_to_expand(1).iter().map(|n| n.hash()).collect();
//!     for hash in frontier {
//!         let Some(mut node) = book.get_by_hash_mut(hash) else { continue };
//!         let Some(mut hist) = node.board_history_reaching_here() else { continue };
//!         // A real driver would evaluate the position here.
//!         let loc = Loc::at(3, 3);
//!         if let Some((mut child, _)) = node.reborrow().play_and_add_move(&mut hist, loc, 0.5) {
//!             *child.this_values_not_in_book_mut() = BookValues {
//!                 max_policy: 0.3,
//!                 visits: 10.0,
//!                 weight: 10.0,
//!                 ..BookValues::default()
//!             };
//!         }
//!         node.set_can_expand(false);
//!     }
//!     book.recompute_everything();
//! }
//! assert!(book.len() >= 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Canonical Hashes
//!
//! A [`hash::BookHash`] has two 128-bit halves: one hashing the board, ko and rules state, and
//! one folding in the recent move history so that short repetition cycles are told apart. The
//! history half restarts whenever a move interacts with a region too large to be part of such a
//! cycle, which is what lets different move orders meet in the same node. Both halves are
//! computed for every board symmetry and the smallest result wins; see [`hash::canonicalize`].
//!
//! ### Symmetry Bookkeeping
//!
//! Stored moves are expressed in the orientation of the node they leave, and each edge records
//! the symmetry that aligns its source's orientation with its target's. [`symmetry::Transform`]
//! tags symmetries with the spaces they map between, so composing them in the wrong order fails
//! to compile.
//!
//! ### Costs
//!
//! Every edge carries a cost from the root: the cost of its source plus a per-move cost, a regret
//! term for the value it gives up, and a policy term. Every node carries the cost of expanding
//! one more move there. The cheapest nodes by cost from root plus expansion cost are the
//! frontier. Coefficients live in [`config::CostParams`].
//!
//! ## Module Guide
//!
//! - **[`book`]**: The graph, oriented views, recompute, persistence and display reports
//! - **[`config`]**: Cost parameters and TOML book configuration
//! - **[`game`]**: Boards, move legality, histories and Zobrist tables
//! - **[`hash`]**: 128-bit hashes, [`hash::BookHash`] and canonicalization
//! - **[`symmetry`]**: The board symmetry group and typed transforms
//! - **[`error`]**: [`BookError`]

pub mod book;
pub mod config;
pub mod error;
pub mod game;
pub mod hash;
pub mod symmetry;

pub use error::*;
