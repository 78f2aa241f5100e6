//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use openbook_core::{
    book::{Book, BookValues},
    config::{BoardSetup, BookConfig},
    game::{BoardHistory, Loc, Rules},
    hash::BookHash,
};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// An empty square board under default rules.
#[allow(dead_code)]
pub fn new_book(size: u8, rep_bound: u32) -> Book {
    let config = BookConfig::new(BoardSetup::empty(size, size), Rules::default(), rep_bound);
    Book::new(&config).expect("valid test config")
}

#[allow(dead_code)]
pub fn leaf(win_loss: f64, score: f64, max_policy: f64, visits: f64) -> BookValues {
    BookValues {
        win_loss_value: win_loss,
        score_mean: score,
        sharp_score_mean: score + 0.5,
        win_loss_error: 0.1,
        score_error: 1.5,
        score_stdev: 6.0,
        max_policy,
        weight: visits,
        visits,
    }
}

/// Stand-in for an engine evaluation: deterministic values spread over a realistic range,
/// derived from the node's hash.
#[allow(dead_code)]
pub fn fake_eval(hash: BookHash) -> BookValues {
    let bits = hash.state_hash.hash0 ^ hash.history_hash.hash1;
    let unit = |shift: u32| ((bits >> shift) & 0xffff) as f64 / 65535.0;
    leaf(
        unit(0) * 1.6 - 0.8,
        unit(16) * 20.0 - 10.0,
        0.05 + unit(32) * 0.5,
        1.0 + (unit(48) * 100.0).round(),
    )
}

/// Play `moves` from the root, adding any missing nodes with raw policy 0.3 and `fake_eval`
/// values. Returns the final node's hash and the history reaching it.
#[allow(dead_code)]
pub fn grow_line(book: &mut Book, moves: &[Loc]) -> (BookHash, BoardHistory) {
    let mut hist = book.initial_hist();
    let mut node = book.root_mut();
    for loc in moves {
        let (mut child, transposing) = node
            .play_and_add_move(&mut hist, *loc, 0.3)
            .expect("legal test move");
        if !transposing {
            let values = fake_eval(child.hash());
            *child.this_values_not_in_book_mut() = values;
        }
        node = child;
    }
    (node.hash(), hist)
}
