//! Book module: the opening book graph.
//!
//! A book is a graph of canonical positions. Each node is stored once, in its canonical
//! orientation, no matter how many move orders or board symmetries lead to it. Nodes refer to
//! each other only by [`BookHash`](crate::hash::BookHash), so the graph may contain
//! transpositions and cycles.
//!
//! # Module Organization
//!
//! - [`graph`]: The [`Book`] container: node arena, hash index, traversals, recompute, frontier
//!   selection
//! - [`node`]: Stored nodes and edges ([`BookNode`], [`BookMove`])
//! - [`values`]: Leaf and aggregated evaluations ([`BookValues`], [`RecursiveBookValues`])
//! - [`view`]: [`SymNode`], a node seen through a symmetry, and growing the book
//! - [`cost`]: Per-node value aggregation and cost propagation
//! - [`persist`]: Book files
//! - [`report`]: Per-node display summaries
//!
//! # Public API
//!
//! ```rust
//! use openbook_core::{
//!     book::Book,
//!     config::{BoardSetup, BookConfig},
//!     game::{Loc, Rules},
//! };
//!
//! let config = BookConfig::new(BoardSetup::empty(5, 5), Rules::default(), 9);
//! let mut book = Book::new(&config).unwrap();
//! let mut hist = book.initial_hist();
//! let root = book.root_mut();
//! let (child, transposing) = root.play_and_add_move(&mut hist, Loc::at(2, 2), 0.4).unwrap();
//! assert!(!transposing);
//! let child_hash = child.hash();
//! book.recompute(&[child_hash]);
//! assert_eq!(book.len(), 2);
//! ```

mod cost;
mod graph;
mod node;
mod persist;
mod report;
mod values;
mod view;


pub use graph::{Book, DfsAction};
pub use node::{BookMove, BookNode};
pub use persist::BOOK_VERSION;
pub use report::{node_report, ChildLink, MoveReport, NodeLink, NodeReport};
pub use values::{BookValues, RecursiveBookValues};
pub use view::SymNode;
