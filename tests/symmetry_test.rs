//! Canonical hashing and book lookups agree across board symmetries.

mod common;

use std::sync::Arc;

use common::{grow_line, new_book};
use openbook_core::{
    game::{Board, BoardDims, BoardHistory, Loc, Player, Rules, ZobristTable},
    hash::canonicalize,
    symmetry::Symmetry,
};
use test_log::test;

const REP_BOUND: u32 = 9;

fn empty_history(x: u8, y: u8) -> BoardHistory {
    let zobrist = Arc::new(ZobristTable::new(BoardDims::new(x, y)));
    BoardHistory::new(Rules::default(), Board::new(zobrist), Player::Black)
}

fn play_all(hist: &mut BoardHistory, moves: &[Loc]) {
    for loc in moves {
        let pla = hist.next_pla();
        assert!(hist.is_legal(*loc, pla), "illegal test move {loc:?}");
        hist.play_assume_legal(*loc, pla);
    }
}

/// The same game as `hist`, played on a board transformed by `sym`.
fn transformed_game(hist: &BoardHistory, sym: Symmetry) -> BoardHistory {
    let dims = hist.initial_board().dims();
    let mut out = hist.transformed_initial(sym);
    let moves: Vec<Loc> = hist.moves().iter().map(|mv| sym.apply(mv.loc, dims)).collect();
    play_all(&mut out, &moves);
    out
}

/// A game on 7x7 ending with a ko capture at (2,1).
fn ko_game() -> BoardHistory {
    let mut hist = empty_history(7, 7);
    play_all(
        &mut hist,
        &[
            Loc::at(1, 0),
            Loc::at(2, 0),
            Loc::at(0, 1),
            Loc::at(3, 1),
            Loc::at(1, 2),
            Loc::at(2, 2),
            Loc::at(5, 5),
            Loc::at(1, 1),
            Loc::at(2, 1),
        ],
    );
    hist
}

fn assert_invariant(hist: &BoardHistory) {
    let dims = hist.initial_board().dims();
    let base = canonicalize(hist, REP_BOUND);
    assert!(base.symmetries.contains(&Symmetry::IDENTITY));
    let canonical_board = hist.board().transformed(base.symmetry_to_align);

    for sym in Symmetry::all(dims) {
        let other_hist = transformed_game(hist, sym);
        let other = canonicalize(&other_hist, REP_BOUND);
        assert_eq!(other.hash, base.hash, "hash differs under {sym}");
        assert_eq!(
            other.symmetries.len(),
            base.symmetries.len(),
            "stabilizer differs under {sym}"
        );
        // Going through `sym` and then the other alignment lands on the same canonical board.
        assert_eq!(
            hist.board().transformed(sym.compose(other.symmetry_to_align)),
            canonical_board,
            "alignment differs under {sym}"
        );
    }
}

#[test]
fn test_canonical_hash_is_symmetry_invariant() {
    let mut hist = empty_history(7, 7);
    assert_invariant(&hist);
    play_all(&mut hist, &[Loc::at(1, 2), Loc::at(4, 5), Loc::at(3, 3)]);
    assert_invariant(&hist);
    play_all(&mut hist, &[Loc::Pass, Loc::at(0, 6)]);
    assert_invariant(&hist);
}

#[test]
fn test_ko_point_follows_the_symmetry() {
    let hist = ko_game();
    assert!(hist.board().ko_point().is_some());
    assert_invariant(&hist);
}

#[test]
fn test_rectangular_board_uses_four_symmetries() {
    let mut hist = empty_history(7, 5);
    assert_eq!(Symmetry::all(hist.initial_board().dims()).count(), 4);
    assert_eq!(canonicalize(&hist, REP_BOUND).symmetries.len(), 4);
    play_all(&mut hist, &[Loc::at(1, 1), Loc::at(5, 3), Loc::at(2, 3)]);
    assert_invariant(&hist);
    assert_eq!(canonicalize(&hist, REP_BOUND).symmetries, vec![Symmetry::IDENTITY]);
}

#[test]
fn test_symmetric_position_has_nontrivial_stabilizer() {
    let mut hist = empty_history(7, 7);
    play_all(&mut hist, &[Loc::at(3, 3)]);
    assert_eq!(canonicalize(&hist, REP_BOUND).symmetries.len(), 8);
    play_all(&mut hist, &[Loc::at(2, 2)]);
    // Only the diagonal reflection through (2,2) and (3,3) survives.
    assert_eq!(canonicalize(&hist, REP_BOUND).symmetries.len(), 2);
}

#[test]
fn test_book_lookup_in_any_orientation() {
    let mut book = new_book(7, REP_BOUND);
    let line = [Loc::at(1, 2), Loc::at(4, 5), Loc::at(3, 3), Loc::at(5, 1)];
    let (hash, hist) = grow_line(&mut book, &line);
    let dims = book.dims();
    let size = book.len();

    for sym in Symmetry::all(dims) {
        let other_hist = transformed_game(&hist, sym);
        let view = book.get_by_history(&other_hist).expect("symmetric line is in the book");
        assert_eq!(view.hash(), hash);
        let rebuilt = view
            .board_history_reaching_here()
            .expect("reachable from the root");
        assert_eq!(rebuilt.board(), other_hist.board(), "orientation lost under {sym}");

        // Growing the symmetric line finds every position already present.
        let moves: Vec<Loc> = line.iter().map(|loc| sym.apply(*loc, dims)).collect();
        let (again, _) = grow_line(&mut book, &moves);
        assert_eq!(again, hash);
        assert_eq!(book.len(), size);
    }
}
