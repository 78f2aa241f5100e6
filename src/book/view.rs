//! Oriented views of book nodes.

use std::{
    fmt,
    ops::{Deref, DerefMut},
};

use crate::{
    book::{
        graph::ROOT_IDX,
        node::BookMove,
        values::{BookValues, RecursiveBookValues},
        Book, BookNode, DfsAction,
    },
    game::{BoardHistory, Loc, Player},
    hash::{canonicalize, BookHash},
    symmetry::{ChildSpace, HistSpace, InitialSpace, NodeSpace, Symmetry, Transform, ViewSpace},
};

/// A book node seen through a symmetry.
///
/// Callers work in "view" coordinates: every location passed in or handed back is in the
/// orientation of the view, and the stored canonical orientation stays an internal detail.
/// `B` is `&Book` for read-only views and `&mut Book` for views that can grow the book.
#[derive(Clone, Copy)]
pub struct SymNode<B> {
    book: B,
    idx: usize,
    to_view: Transform<NodeSpace, ViewSpace>,
}

impl<B: Deref<Target = Book>> fmt::Debug for SymNode<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymNode")
            .field("hash", &self.hash())
            .field("pla", &self.pla())
            .field("to_view", &self.to_view)
            .finish()
    }
}

impl<B: Deref<Target = Book>> SymNode<B> {
    pub(super) fn new(book: B, idx: usize, to_view: Transform<NodeSpace, ViewSpace>) -> Self {
        SymNode { book, idx, to_view }
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn node(&self) -> &BookNode {
        self.book.node(self.idx)
    }

    /// A read-only copy of this view.
    pub fn view(&self) -> SymNode<&Book> {
        SymNode::new(&*self.book, self.idx, self.to_view)
    }

    pub fn hash(&self) -> BookHash {
        self.node().hash
    }

    pub fn pla(&self) -> Player {
        self.node().pla
    }

    pub fn is_root(&self) -> bool {
        self.idx == ROOT_IDX
    }

    /// Maps the node's canonical orientation to this view.
    pub fn symmetry_of_node(&self) -> Transform<NodeSpace, ViewSpace> {
        self.to_view
    }

    pub fn this_values_not_in_book(&self) -> &BookValues {
        &self.node().this_values_not_in_book
    }

    pub fn recursive_values(&self) -> &RecursiveBookValues {
        &self.node().recursive_values
    }

    pub fn can_expand(&self) -> bool {
        self.node().can_expand
    }

    pub fn min_cost_from_root(&self) -> f64 {
        self.node().min_cost_from_root
    }

    pub fn total_expansion_cost(&self) -> f64 {
        self.node().total_expansion_cost()
    }

    /// The same node, with `sym` applied on top of the current view.
    pub fn apply_symmetry(self, sym: Symmetry) -> SymNode<B> {
        let to_view = self.to_view.then(Transform::<ViewSpace, ViewSpace>::new(sym));
        SymNode::new(self.book, self.idx, to_view)
    }

    /// Symmetries of the position as seen in this view.
    pub fn symmetries(&self) -> Vec<Symmetry> {
        let to_node = self.to_view.inverse();
        self.node()
            .symmetries
            .iter()
            .map(|s| {
                to_node
                    .then(Transform::<NodeSpace, NodeSpace>::new(*s))
                    .then(self.to_view)
                    .symmetry()
            })
            .collect()
    }

    /// The stored edge reached by playing `loc` (in view coordinates), if any, along with the map
    /// from view coordinates into the node space the edge is stored in. Off-board locations
    /// have no edge.
    fn find_edge(&self, loc: Loc) -> Option<(&BookMove, Transform<ViewSpace, NodeSpace>)> {
        if !self.book.initial_board().is_on_board(loc) {
            return None;
        }
        let dims = self.book.dims();
        let node = self.node();
        let to_node = self.to_view.inverse();
        node.symmetries.iter().find_map(|s| {
            let view_to_node = to_node.then(Transform::<NodeSpace, NodeSpace>::new(*s));
            node.moves
                .get(&view_to_node.apply(loc, dims))
                .map(|edge| (edge, view_to_node))
        })
    }

    pub fn is_move_in_book(&self, loc: Loc) -> bool {
        self.find_edge(loc).is_some()
    }

    /// Every stored edge, re-expressed in view coordinates. Moves equivalent under the node's
    /// symmetries appear once.
    pub fn unique_moves_in_book(&self) -> Vec<BookMove> {
        let dims = self.book.dims();
        self.node()
            .moves
            .values()
            .map(|edge| edge.sym_book_move(self.to_view, dims))
            .collect()
    }

    fn locate_child(&self, loc: Loc) -> Option<(usize, Transform<NodeSpace, ViewSpace>)> {
        let (edge, view_to_node) = self.find_edge(loc)?;
        let idx = self.book.index_of(edge.hash)?;
        let view_to_child: Transform<ViewSpace, ChildSpace> = view_to_node.then(edge.align());
        Some((idx, view_to_child.inverse().relabel()))
    }

    /// The child reached by `loc`, oriented so that this view's coordinates carry over.
    pub fn follow(&self, loc: Loc) -> Option<SymNode<&Book>> {
        let (idx, to_view) = self.locate_child(loc)?;
        Some(SymNode::new(&*self.book, idx, to_view))
    }

    pub fn into_follow(self, loc: Loc) -> Option<SymNode<B>> {
        let (idx, to_view) = self.locate_child(loc)?;
        Some(SymNode::new(self.book, idx, to_view))
    }

    /// Follow `loc` and play it on `hist`, which must be in this view's orientation. `None`,
    /// leaving `hist` untouched, if the move is not in the book or not legal.
    pub fn play_move(&self, hist: &mut BoardHistory, loc: Loc) -> Option<SymNode<&Book>> {
        if !hist.is_legal(loc, self.pla()) {
            return None;
        }
        let child = self.follow(loc)?;
        hist.play_assume_legal(loc, self.pla());
        Some(child)
    }

    fn locate_canonical_parent(&self) -> Option<(usize, Transform<NodeSpace, ViewSpace>)> {
        let node = self.node();
        let (parent_hash, loc) = node.parents.first()?;
        let parent_idx = self.book.index_of(*parent_hash)?;
        let edge = self.book.node(parent_idx).moves.get(loc)?;
        let child_to_view: Transform<ChildSpace, ViewSpace> = self.to_view.relabel();
        Some((parent_idx, edge.align().then(child_to_view)))
    }

    /// The first recorded parent, oriented consistently with this view.
    pub fn canonical_parent(&self) -> Option<SymNode<&Book>> {
        let (idx, to_view) = self.locate_canonical_parent()?;
        Some(SymNode::new(&*self.book, idx, to_view))
    }

    pub fn into_canonical_parent(self) -> Option<SymNode<B>> {
        let (idx, to_view) = self.locate_canonical_parent()?;
        Some(SymNode::new(self.book, idx, to_view))
    }

    /// Some game from the book's starting position to this node, replayed in this view's
    /// orientation. `None` if the root cannot be reached through parent links, or if a recorded
    /// move turns out not to be playable.
    pub fn board_history_reaching_here(&self) -> Option<BoardHistory> {
        let book: &Book = &self.book;
        let root_hash = book.root_hash();
        let mut found: Option<(Vec<BookHash>, Vec<Option<Loc>>)> = None;
        book.reverse_depth_first_search_with_moves(self.hash(), |stack, moves| {
            if stack.last().map(|n| n.hash) == Some(root_hash) {
                found = Some((
                    stack.iter().rev().map(|n| n.hash).collect(),
                    moves.iter().rev().copied().collect(),
                ));
                DfsAction::Abort
            } else {
                DfsAction::Recurse
            }
        });
        let Some((path, moves)) = found else {
            tracing::warn!(
                "[SymNode::board_history_reaching_here] No path from root to {}",
                self.hash()
            );
            return None;
        };

        // path[i] -> path[i + 1] is moves[i], expressed in path[i]'s orientation.
        let mut edges: Vec<(Player, &BookMove)> = Vec::with_capacity(path.len());
        for (hash, mv) in path.iter().zip(&moves).take(path.len() - 1) {
            let node = book.get(*hash)?;
            let edge = node.moves.get(&(*mv)?)?;
            edges.push((node.pla, edge));
        }

        let root_to_here: Transform<NodeSpace, NodeSpace> = edges
            .iter()
            .fold(Transform::identity(), |acc, (_, edge)| acc.then(edge.align()).relabel());
        let initial_to_hist: Transform<InitialSpace, HistSpace> = book
            .initial_symmetry
            .then(root_to_here)
            .then(self.to_view)
            .relabel();
        let mut hist = book.initial_hist_with_symmetry(initial_to_hist.symmetry());

        let dims = book.dims();
        let mut node_to_hist: Transform<NodeSpace, HistSpace> =
            book.initial_symmetry.inverse().then(initial_to_hist);
        for (pla, edge) in edges {
            let loc = node_to_hist.apply(edge.mv, dims);
            if !hist.is_legal_tolerant(loc, pla) {
                tracing::warn!(
                    "[SymNode::board_history_reaching_here] Illegal move {} on the path to {}",
                    loc.to_gtp(dims),
                    self.hash()
                );
                return None;
            }
            hist.play_assume_legal(loc, pla);
            node_to_hist = edge.align().inverse().then(node_to_hist).relabel();
        }
        Some(hist)
    }
}

impl<B: DerefMut<Target = Book>> SymNode<B> {
    fn node_mut(&mut self) -> &mut BookNode {
        self.book.node_mut(self.idx)
    }

    /// A mutable view that borrows this one.
    pub fn reborrow(&mut self) -> SymNode<&mut Book> {
        SymNode::new(&mut *self.book, self.idx, self.to_view)
    }

    /// The leaf evaluation. Call [`Book::recompute`] with this node's hash after changing it.
    pub fn this_values_not_in_book_mut(&mut self) -> &mut BookValues {
        &mut self.node_mut().this_values_not_in_book
    }

    pub fn set_can_expand(&mut self, can_expand: bool) {
        self.node_mut().can_expand = can_expand;
    }

    pub fn follow_mut(&mut self, loc: Loc) -> Option<SymNode<&mut Book>> {
        let (idx, to_view) = self.locate_child(loc)?;
        Some(SymNode::new(&mut *self.book, idx, to_view))
    }

    /// Play `loc` on `hist` (in this view's orientation) and add the resulting position to the
    /// book as a child of this node, creating it if needed.
    ///
    /// Returns the child, oriented to match `hist`, and whether it already existed (a
    /// transposition). If `loc` is already in the book the existing edge is followed. `None`,
    /// leaving the book and `hist` untouched, if `loc` is illegal in `hist`. Use
    /// [`SymNode::reborrow`] to keep this view.
    ///
    /// New nodes have default values; call [`Book::recompute`] once they are filled in.
    pub fn play_and_add_move(
        mut self,
        hist: &mut BoardHistory,
        loc: Loc,
        raw_policy: f64,
    ) -> Option<(SymNode<B>, bool)> {
        let pla = self.pla();
        if !hist.is_legal(loc, pla) {
            tracing::debug!(
                "[SymNode::play_and_add_move] Illegal move {} at {}",
                loc.to_gtp(self.book.dims()),
                self.hash()
            );
            return None;
        }
        if let Some((idx, to_view)) = self.locate_child(loc) {
            hist.play_assume_legal(loc, pla);
            return Some((SymNode::new(self.book, idx, to_view), true));
        }

        let dims = self.book.dims();
        let node_hash = self.hash();
        let sym_loc = self.to_view.inverse().apply(loc, dims);

        // Among equivalent orientations, store the move with the largest x, then smallest y.
        let mut best_loc = sym_loc;
        let mut best_sym: Transform<NodeSpace, NodeSpace> = Transform::identity();
        if let Loc::Point(_) = sym_loc {
            for s in &self.node().symmetries {
                if *s == Symmetry::IDENTITY {
                    continue;
                }
                let candidate = s.apply(sym_loc, dims);
                if let (Loc::Point(c), Loc::Point(b)) = (candidate, best_loc) {
                    if c.x > b.x || (c.x == b.x && c.y < b.y) {
                        best_loc = candidate;
                        best_sym = Transform::new(*s);
                    }
                }
            }
        }

        hist.play_assume_legal(loc, pla);
        let canonical = canonicalize(hist, self.book.rep_bound());
        let view_to_child: Transform<ViewSpace, ChildSpace> = Transform::new(canonical.symmetry_to_align);

        let book: &mut Book = &mut self.book;
        let (child_idx, transposing) = match book.index_of(canonical.hash) {
            Some(idx) => (idx, true),
            None => {
                let child = BookNode::new(canonical.hash, hist.next_pla(), canonical.symmetries);
                book.add(child);
                (book.len() - 1, false)
            }
        };
        book.node_mut(child_idx).parents.push((node_hash, best_loc));

        let align = best_sym.inverse().then(self.to_view).then(view_to_child);
        let edge = BookMove::new(best_loc, align.symmetry(), canonical.hash, raw_policy);
        self.book.node_mut(self.idx).moves.insert(best_loc, edge);

        tracing::trace!(
            "[SymNode::play_and_add_move] {} -> {} via {} (transposing: {transposing})",
            node_hash,
            canonical.hash,
            best_loc.to_gtp(dims)
        );
        let child_to_view = view_to_child.inverse().relabel();
        Some((SymNode::new(self.book, child_idx, child_to_view), transposing))
    }
}
