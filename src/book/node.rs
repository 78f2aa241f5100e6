use std::collections::BTreeMap;

use crate::{
    book::values::{BookValues, RecursiveBookValues},
    game::{BoardDims, Loc, Player},
    hash::BookHash,
    symmetry::{ChildSpace, NodeSpace, Symmetry, Transform},
};

/// An edge of the book: a move from one node to another.
#[derive(Debug, Clone, PartialEq)]
pub struct BookMove {
    /// The move, in the orientation of the node the edge leaves.
    pub mv: Loc,
    /// Maps the source node's orientation to the target node's orientation.
    pub symmetry_to_align: Symmetry,
    pub hash: BookHash,
    pub raw_policy: f64,

    pub cost_from_root: f64,
    /// Whether this move is the best move by win/loss value at its source node.
    pub is_wlpv: bool,
    pub biggest_wl_cost_from_root: f64,
}

impl BookMove {
    pub fn new(mv: Loc, symmetry_to_align: Symmetry, hash: BookHash, raw_policy: f64) -> Self {
        BookMove {
            mv,
            symmetry_to_align,
            hash,
            raw_policy,
            cost_from_root: 0.0,
            is_wlpv: false,
            biggest_wl_cost_from_root: 0.0,
        }
    }

    pub fn align(&self) -> Transform<NodeSpace, ChildSpace> {
        Transform::new(self.symmetry_to_align)
    }

    /// The same edge as seen from an orientation that `sym` maps the source node into.
    pub fn sym_book_move<Space>(&self, sym: Transform<NodeSpace, Space>, dims: BoardDims) -> BookMove {
        BookMove {
            mv: sym.apply(self.mv, dims),
            symmetry_to_align: sym.inverse().then(self.align()).symmetry(),
            hash: self.hash,
            raw_policy: self.raw_policy,
            cost_from_root: self.cost_from_root,
            is_wlpv: false,
            biggest_wl_cost_from_root: 0.0,
        }
    }
}

/// A canonical position in the book.
#[derive(Debug, Clone)]
pub struct BookNode {
    pub(crate) hash: BookHash,
    pub(crate) pla: Player,
    /// Symmetries of the canonical orientation that leave the hash unchanged.
    pub(crate) symmetries: Vec<Symmetry>,

    pub(crate) this_values_not_in_book: BookValues,
    pub(crate) can_expand: bool,

    pub(crate) moves: BTreeMap<Loc, BookMove>,
    /// Incoming edges as (parent hash, move in the parent's orientation), in insertion order.
    pub(crate) parents: Vec<(BookHash, Loc)>,

    pub(crate) recursive_values: RecursiveBookValues,
    pub(crate) min_cost_from_root: f64,
    pub(crate) this_node_expansion_cost: f64,
    pub(crate) min_cost_from_root_wlpv: f64,
    pub(crate) expansion_is_wlpv: bool,
    pub(crate) biggest_wl_cost_from_root: f64,
}

impl BookNode {
    pub fn new(hash: BookHash, pla: Player, symmetries: Vec<Symmetry>) -> Self {
        BookNode {
            hash,
            pla,
            symmetries,
            this_values_not_in_book: BookValues::default(),
            can_expand: true,
            moves: BTreeMap::new(),
            parents: Vec::new(),
            recursive_values: RecursiveBookValues::default(),
            min_cost_from_root: 0.0,
            this_node_expansion_cost: 0.0,
            min_cost_from_root_wlpv: 0.0,
            expansion_is_wlpv: false,
            biggest_wl_cost_from_root: 0.0,
        }
    }

    pub fn hash(&self) -> BookHash {
        self.hash
    }

    pub fn pla(&self) -> Player {
        self.pla
    }

    pub fn symmetries(&self) -> &[Symmetry] {
        &self.symmetries
    }

    pub fn moves(&self) -> &BTreeMap<Loc, BookMove> {
        &self.moves
    }

    pub fn parents(&self) -> &[(BookHash, Loc)] {
        &self.parents
    }

    pub fn this_values_not_in_book(&self) -> &BookValues {
        &self.this_values_not_in_book
    }

    pub fn can_expand(&self) -> bool {
        self.can_expand
    }

    pub fn recursive_values(&self) -> &RecursiveBookValues {
        &self.recursive_values
    }

    pub fn min_cost_from_root(&self) -> f64 {
        self.min_cost_from_root
    }

    pub fn min_cost_from_root_wlpv(&self) -> f64 {
        self.min_cost_from_root_wlpv
    }

    pub fn this_node_expansion_cost(&self) -> f64 {
        self.this_node_expansion_cost
    }

    pub fn total_expansion_cost(&self) -> f64 {
        self.min_cost_from_root + self.this_node_expansion_cost
    }

    pub fn expansion_is_wlpv(&self) -> bool {
        self.expansion_is_wlpv
    }

    pub fn biggest_wl_cost_from_root(&self) -> f64 {
        self.biggest_wl_cost_from_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{hash::Hash128, symmetry::ViewSpace};
    use test_log::test;

    #[test]
    fn test_sym_book_move_keeps_target_alignment() {
        let dims = BoardDims::new(5, 5);
        let target = BookHash::new(Hash128::new(1, 2), Hash128::new(3, 4));
        let edge = BookMove::new(Loc::at(4, 0), Symmetry::new(3).unwrap(), target, 0.25);
        for s in Symmetry::all(dims) {
            let view: Transform<NodeSpace, ViewSpace> = Transform::new(s);
            let moved = edge.sym_book_move(view, dims);
            assert_eq!(moved.mv, s.apply(edge.mv, dims));
            assert_eq!(moved.hash, target);
            // Going view -> node -> child must agree with the stored view -> child map.
            assert_eq!(s.compose(moved.symmetry_to_align), edge.symmetry_to_align);
        }
    }
}
