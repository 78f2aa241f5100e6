//! Saving and loading book files.

mod common;

use std::{collections::BTreeMap, fs, path::Path};

use common::{grow_line, leaf, new_book};
use openbook_core::{
    book::{Book, BOOK_VERSION},
    game::Loc,
    hash::BookHash,
    BookError,
};
use serde_json::Value;
use tempfile::TempDir;
use test_log::test;

const REP_BOUND: u32 = 9;

/// A 7x7 book with two lines that transpose into each other, a side branch and a disabled node.
fn sample_book() -> (Book, BookHash, BookHash) {
    let mut book = new_book(7, REP_BOUND);
    *book.root_mut().this_values_not_in_book_mut() = leaf(0.05, 0.5, 0.4, 200.0);
    let (shared, _) = grow_line(&mut book, &[Loc::at(2, 2), Loc::at(4, 4), Loc::at(2, 4)]);
    let (again, _) = grow_line(&mut book, &[Loc::at(2, 4), Loc::at(4, 4), Loc::at(2, 2)]);
    assert_eq!(shared, again);
    let (leaf_hash, _) = grow_line(&mut book, &[Loc::at(3, 3), Loc::at(3, 2)]);
    book.get_by_hash_mut(leaf_hash)
        .expect("leaf")
        .set_can_expand(false);
    book.params_mut().cost_per_move = 0.7;
    book.recompute_everything();
    (book, shared, leaf_hash)
}

type EdgeSet = BTreeMap<BookHash, Vec<(Loc, BookHash, u8, u64)>>;

fn edge_set(book: &Book) -> EdgeSet {
    book.iter_nodes()
        .map(|node| {
            let edges = node
                .moves()
                .values()
                .map(|m| (m.mv, m.hash, m.symmetry_to_align.bits(), m.raw_policy.to_bits()))
                .collect();
            (node.hash(), edges)
        })
        .collect()
}

fn assert_close(a: f64, b: f64, what: &str) {
    assert!((a - b).abs() <= 1e-9 * (1.0 + a.abs()), "{what}: {a} vs {b}");
}

fn rewrite_lines(src: &Path, dst: &Path, mut edit: impl FnMut(usize, &mut Value) -> bool) {
    let text = fs::read_to_string(src).expect("saved book");
    let mut out = String::new();
    for (i, line) in text.lines().enumerate() {
        let mut value: Value = serde_json::from_str(line).expect("json line");
        if edit(i, &mut value) {
            out.push_str(&value.to_string());
            out.push('\n');
        }
    }
    fs::write(dst, out).expect("write edited book");
}

#[test]
fn test_round_trip() {
    let (book, shared, leaf_hash) = sample_book();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.jsonl");
    book.save_to_file(&path).unwrap();
    assert!(path.exists());
    assert!(!dir.path().join("book.jsonl.tmp").exists());

    let loaded = Book::load_from_file(&path).unwrap();
    assert_eq!(loaded.len(), book.len());
    assert_eq!(loaded.root_hash(), book.root_hash());
    assert_eq!(loaded.params(), book.params());
    assert_eq!(edge_set(&loaded), edge_set(&book));
    assert_eq!(
        loaded.get(shared).unwrap().parents(),
        book.get(shared).unwrap().parents()
    );
    assert!(!loaded.get(leaf_hash).unwrap().can_expand());

    for node in book.iter_nodes() {
        let other = loaded.get(node.hash()).expect("node survives");
        assert_eq!(other.pla(), node.pla());
        assert_eq!(other.symmetries(), node.symmetries());
        assert_eq!(other.this_values_not_in_book(), node.this_values_not_in_book());
        let (a, b) = (node.recursive_values(), other.recursive_values());
        assert_close(a.win_loss_value, b.win_loss_value, "winLossValue");
        assert_close(a.win_loss_lcb, b.win_loss_lcb, "winLossLCB");
        assert_close(a.win_loss_ucb, b.win_loss_ucb, "winLossUCB");
        assert_close(a.score_lcb, b.score_lcb, "scoreLCB");
        assert_close(a.score_ucb, b.score_ucb, "scoreUCB");
        assert_close(a.visits, b.visits, "visits");
        assert_close(node.min_cost_from_root(), other.min_cost_from_root(), "minCostFromRoot");
        assert_close(
            node.this_node_expansion_cost(),
            other.this_node_expansion_cost(),
            "thisNodeExpansionCost",
        );
    }

    // The loaded book keeps growing like the saved one.
    let mut grown = loaded;
    let (hash, hist) = grow_line(&mut grown, &[Loc::at(3, 3), Loc::at(3, 2), Loc::at(1, 1)]);
    let view = grown.get_by_history(&hist).expect("new line");
    assert_eq!(view.hash(), hash);
}

#[test]
fn test_failed_save_leaves_no_temporary_file() {
    let (book, _, _) = sample_book();
    let dir = TempDir::new().unwrap();
    // A directory in the way makes the final rename fail after the lines are written.
    let blocked = dir.path().join("blocked.jsonl");
    fs::create_dir(&blocked).unwrap();
    fs::write(blocked.join("keep"), "x").unwrap();

    assert!(book.save_to_file(&blocked).is_err());
    assert!(!dir.path().join("blocked.jsonl.tmp").exists());
    assert!(blocked.join("keep").exists());

    // Nothing can be created inside a missing directory.
    let missing_dir = dir.path().join("absent").join("book.jsonl");
    assert!(book.save_to_file(&missing_dir).is_err());
    assert!(!dir.path().join("absent").exists());
}

#[test]
fn test_unsupported_version() {
    let (book, _, _) = sample_book();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.jsonl");
    book.save_to_file(&path).unwrap();

    let edited = dir.path().join("v2.jsonl");
    rewrite_lines(&path, &edited, |i, value| {
        if i == 0 {
            value["version"] = Value::from(BOOK_VERSION + 1);
        }
        true
    });
    match Book::load_from_file(&edited) {
        Err(BookError::UnsupportedVersion(v)) => assert_eq!(v, BOOK_VERSION + 1),
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn test_missing_and_malformed_fields() {
    let (book, _, _) = sample_book();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.jsonl");
    book.save_to_file(&path).unwrap();

    let missing = dir.path().join("missing.jsonl");
    rewrite_lines(&path, &missing, |i, value| {
        if i == 2 {
            value.as_object_mut().unwrap().remove("visits");
        }
        true
    });
    match Book::load_from_file(&missing) {
        Err(BookError::MissingField { field, line }) => {
            assert_eq!(field, "visits");
            assert!(line.contains("\"hash\""));
        }
        other => panic!("unexpected result {other:?}"),
    }

    let malformed = dir.path().join("malformed.jsonl");
    rewrite_lines(&path, &malformed, |i, value| {
        if i == 1 {
            value["hash"] = Value::from("not-a-hash");
        }
        true
    });
    assert!(matches!(
        Book::load_from_file(&malformed),
        Err(BookError::MalformedHash(_))
    ));

    let bad_move = dir.path().join("bad_move.jsonl");
    rewrite_lines(&path, &bad_move, |i, value| {
        if i == 1 {
            value["moves"][0]["move"] = Value::from("Z99");
        }
        true
    });
    assert!(matches!(
        Book::load_from_file(&bad_move),
        Err(BookError::MalformedLoc(_))
    ));

    assert!(matches!(
        Book::load_from_file(dir.path().join("absent.jsonl")),
        Err(BookError::NotFound(_))
    ));
}

#[test]
fn test_invalid_cost_params_are_rejected() {
    let (book, _, _) = sample_book();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.jsonl");
    book.save_to_file(&path).unwrap();

    let zero_error = dir.path().join("zero_error.jsonl");
    rewrite_lines(&path, &zero_error, |i, value| {
        if i == 0 {
            value["errorFactor"] = Value::from(0.0);
        }
        true
    });
    match Book::load_from_file(&zero_error) {
        Err(BookError::Config(msg)) => assert!(msg.contains("errorFactor")),
        other => panic!("unexpected result {other:?}"),
    }

    let negative_cap = dir.path().join("negative_cap.jsonl");
    rewrite_lines(&path, &negative_cap, |i, value| {
        if i == 0 {
            value["sharpScoreOutlierCap"] = Value::from(-1.0);
        }
        true
    });
    assert!(matches!(
        Book::load_from_file(&negative_cap),
        Err(BookError::Config(_))
    ));
}

#[test]
fn test_inconsistent_root() {
    let (book, _, _) = sample_book();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.jsonl");
    book.save_to_file(&path).unwrap();

    let rotated = dir.path().join("rotated.jsonl");
    rewrite_lines(&path, &rotated, |i, value| {
        if i == 0 {
            value["initialSymmetry"] = Value::from(3);
        }
        true
    });
    assert!(matches!(
        Book::load_from_file(&rotated),
        Err(BookError::InconsistentRoot(_))
    ));

    let wrong_player = dir.path().join("wrong_player.jsonl");
    rewrite_lines(&path, &wrong_player, |i, value| {
        if i == 1 {
            value["pla"] = Value::from("White");
        }
        true
    });
    assert!(matches!(
        Book::load_from_file(&wrong_player),
        Err(BookError::InconsistentRoot(_))
    ));

    let rootless = dir.path().join("rootless.jsonl");
    rewrite_lines(&path, &rootless, |i, _| i != 1);
    assert!(matches!(
        Book::load_from_file(&rootless),
        Err(BookError::InconsistentRoot(_))
    ));
}

#[test]
fn test_dangling_references_are_dropped() {
    let (book, _, leaf_hash) = sample_book();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.jsonl");
    book.save_to_file(&path).unwrap();

    let pruned = dir.path().join("pruned.jsonl");
    let leaf_str = leaf_hash.to_string();
    rewrite_lines(&path, &pruned, |_, value| value["hash"].as_str() != Some(leaf_str.as_str()));

    let loaded = Book::load_from_file(&pruned).unwrap();
    assert_eq!(loaded.len(), book.len() - 1);
    assert!(loaded.get(leaf_hash).is_none());
    assert!(loaded
        .iter_nodes()
        .all(|node| node.moves().values().all(|m| m.hash != leaf_hash)));
    // Everything left still reaches the root.
    for node in loaded.iter_nodes() {
        let view = loaded.get_by_hash(node.hash()).unwrap();
        assert!(view.board_history_reaching_here().is_some());
    }
}
