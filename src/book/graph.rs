//! The book's node arena, hash index and traversals.

use std::{
    cell::RefCell,
    collections::{btree_map, BTreeMap, BTreeSet},
    fmt,
};

use crate::{
    book::{node::BookMove, BookNode, SymNode},
    config::{BookConfig, BoardSetup, CostParams},
    error::BookError,
    game::{Board, BoardDims, BoardHistory, Loc, Player, Rules},
    hash::{canonicalize, BookHash, NUM_HASH_BUCKETS},
    symmetry::{InitialSpace, NodeSpace, Symmetry, Transform, ViewSpace},
};

pub(super) const ROOT_IDX: usize = 0;

/// Views a node in its own canonical orientation.
fn canonical_view() -> Transform<NodeSpace, ViewSpace> {
    Transform::new(Symmetry::IDENTITY)
}

/// What a traversal callback wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DfsAction {
    /// Continue into this node's neighbors.
    Recurse,
    /// Do not continue past this node.
    Skip,
    /// Stop the whole traversal.
    Abort,
}

/// An opening book: a graph of canonical positions reachable from one starting position.
///
/// Nodes live in an append-only arena and are never removed, so indices stay valid for the
/// book's lifetime. All links between nodes are stored as hashes and resolved through a
/// bucketed hash index. The root, created from the starting position, is always at index 0.
pub struct Book {
    pub(super) initial_board: Board,
    pub(super) initial_rules: Rules,
    pub(super) initial_pla: Player,
    pub(super) rep_bound: u32,
    pub(super) params: CostParams,
    pub(super) bonus_by_hash: BTreeMap<BookHash, f64>,
    /// Maps the starting position's orientation to the root's canonical orientation.
    pub(super) initial_symmetry: Transform<InitialSpace, NodeSpace>,
    pub(super) nodes: Vec<BookNode>,
    node_idx_by_hash: Vec<BTreeMap<BookHash, usize>>,
}

impl fmt::Debug for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Book")
            .field("dims", &self.dims())
            .field("initial_pla", &self.initial_pla)
            .field("rep_bound", &self.rep_bound)
            .field("initial_symmetry", &self.initial_symmetry)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

impl Book {
    pub fn new(config: &BookConfig) -> Result<Book, BookError> {
        config.validate()?;
        let board = config.board.build()?;
        Ok(Book::from_parts(
            board,
            config.rules,
            config.initial_pla,
            config.rep_bound,
            config.params,
        ))
    }

    pub fn from_parts(
        initial_board: Board,
        initial_rules: Rules,
        initial_pla: Player,
        rep_bound: u32,
        params: CostParams,
    ) -> Book {
        let initial_hist = BoardHistory::new(initial_rules, initial_board.clone(), initial_pla);
        let canonical = canonicalize(&initial_hist, rep_bound);
        let mut book = Book {
            initial_board,
            initial_rules,
            initial_pla,
            rep_bound,
            params,
            bonus_by_hash: BTreeMap::new(),
            initial_symmetry: Transform::new(canonical.symmetry_to_align),
            nodes: Vec::new(),
            node_idx_by_hash: vec![BTreeMap::new(); NUM_HASH_BUCKETS],
        };
        let root = BookNode::new(canonical.hash, initial_pla, canonical.symmetries);
        book.add(root);
        tracing::debug!(
            "[Book::new] Root {} with initial symmetry {}",
            canonical.hash,
            canonical.symmetry_to_align
        );
        book
    }

    /// The configuration this book was created from, with its current parameters.
    pub fn config(&self) -> BookConfig {
        BookConfig {
            board: BoardSetup::from_board(&self.initial_board),
            rules: self.initial_rules,
            initial_pla: self.initial_pla,
            rep_bound: self.rep_bound,
            params: self.params,
        }
    }

    pub fn initial_board(&self) -> &Board {
        &self.initial_board
    }

    pub fn initial_rules(&self) -> &Rules {
        &self.initial_rules
    }

    pub fn initial_pla(&self) -> Player {
        self.initial_pla
    }

    pub fn rep_bound(&self) -> u32 {
        self.rep_bound
    }

    pub fn dims(&self) -> BoardDims {
        self.initial_board.dims()
    }

    pub fn initial_symmetry(&self) -> Transform<InitialSpace, NodeSpace> {
        self.initial_symmetry
    }

    pub fn params(&self) -> &CostParams {
        &self.params
    }

    /// Changes take effect at the next recompute.
    pub fn params_mut(&mut self) -> &mut CostParams {
        &mut self.params
    }

    pub fn bonus_by_hash(&self) -> &BTreeMap<BookHash, f64> {
        &self.bonus_by_hash
    }

    /// Per-node reductions of cost from root. Changes take effect at the next recompute.
    pub fn set_bonus_by_hash(&mut self, bonus_by_hash: BTreeMap<BookHash, f64>) {
        self.bonus_by_hash = bonus_by_hash;
    }

    /// The starting position, in the orientation it was supplied in.
    pub fn initial_hist(&self) -> BoardHistory {
        self.initial_hist_with_symmetry(Symmetry::IDENTITY)
    }

    pub(super) fn initial_hist_with_symmetry(&self, sym: Symmetry) -> BoardHistory {
        BoardHistory::new(
            self.initial_rules,
            self.initial_board.transformed(sym),
            self.initial_pla,
        )
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root exists from construction.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node, in insertion order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &BookNode> {
        self.nodes.iter()
    }

    pub fn root_hash(&self) -> BookHash {
        self.nodes[ROOT_IDX].hash
    }

    /// Insert a node under its own hash. Returns false, leaving the book unchanged, if a node
    /// with that hash already exists.
    pub fn add(&mut self, node: BookNode) -> bool {
        let hash = node.hash;
        match self.node_idx_by_hash[hash.bucket()].entry(hash) {
            btree_map::Entry::Occupied(_) => false,
            btree_map::Entry::Vacant(entry) => {
                entry.insert(self.nodes.len());
                self.nodes.push(node);
                true
            }
        }
    }

    pub(super) fn index_of(&self, hash: BookHash) -> Option<usize> {
        self.node_idx_by_hash[hash.bucket()].get(&hash).copied()
    }

    pub fn get(&self, hash: BookHash) -> Option<&BookNode> {
        self.index_of(hash).map(|idx| &self.nodes[idx])
    }

    pub fn get_mut(&mut self, hash: BookHash) -> Option<&mut BookNode> {
        self.index_of(hash).map(|idx| &mut self.nodes[idx])
    }

    pub(super) fn node(&self, idx: usize) -> &BookNode {
        &self.nodes[idx]
    }

    pub(super) fn node_mut(&mut self, idx: usize) -> &mut BookNode {
        &mut self.nodes[idx]
    }

    /// The root, viewed in the orientation of the starting position.
    pub fn root(&self) -> SymNode<&Book> {
        let to_view = self.initial_symmetry.inverse().relabel();
        SymNode::new(self, ROOT_IDX, to_view)
    }

    pub fn root_mut(&mut self) -> SymNode<&mut Book> {
        let to_view = self.initial_symmetry.inverse().relabel();
        SymNode::new(self, ROOT_IDX, to_view)
    }

    /// A node by hash, viewed in its own canonical orientation.
    pub fn get_by_hash(&self, hash: BookHash) -> Option<SymNode<&Book>> {
        self.index_of(hash)
            .map(|idx| SymNode::new(self, idx, canonical_view()))
    }

    pub fn get_by_hash_mut(&mut self, hash: BookHash) -> Option<SymNode<&mut Book>> {
        self.index_of(hash)
            .map(|idx| SymNode::new(self, idx, canonical_view()))
    }

    /// Follow the moves of `hist`, which must start from the book's starting position, from the
    /// root. `None` if any move leaves the book.
    pub fn get_by_history(&self, hist: &BoardHistory) -> Option<SymNode<&Book>> {
        hist.moves()
            .iter()
            .try_fold(self.root(), |node, mv| node.into_follow(mv.loc))
    }

    pub fn get_by_history_mut(&mut self, hist: &BoardHistory) -> Option<SymNode<&mut Book>> {
        hist.moves()
            .iter()
            .try_fold(self.root_mut(), |node, mv| node.into_follow(mv.loc))
    }

    /// Walk parent links depth first from `start`, calling `f` with the current path (`stack`,
    /// with `start` first) and the moves along it: `moves[i]` leads from `stack[i]` to
    /// `stack[i - 1]`, in `stack[i]`'s orientation, and `moves[0]` is `None`.
    ///
    /// Each node is visited at most once, so cycles and reverse transpositions terminate.
    /// Returns true if `f` aborted, false if the walk completed.
    pub fn reverse_depth_first_search_with_moves<F>(&self, start: BookHash, mut f: F) -> bool
    where
        F: FnMut(&[&BookNode], &[Option<Loc>]) -> DfsAction,
    {
        let Some(initial) = self.get(start) else {
            tracing::warn!("[Book::reverse_depth_first_search_with_moves] Unknown start node {start}");
            return false;
        };
        let mut stack: Vec<&BookNode> = vec![initial];
        let mut move_stack: Vec<Option<Loc>> = vec![None];
        let mut next_parent_idx: Vec<usize> = vec![0];
        let mut visited: BTreeSet<BookHash> = BTreeSet::from([start]);

        loop {
            match f(&stack, &move_stack) {
                DfsAction::Abort => return true,
                DfsAction::Skip => {
                    if let Some(next) = next_parent_idx.last_mut() {
                        *next = usize::MAX;
                    }
                }
                DfsAction::Recurse => {}
            }

            loop {
                let (Some(node), Some(next)) = (stack.last().copied(), next_parent_idx.last_mut()) else {
                    return false;
                };
                if let Some((parent_hash, parent_loc)) = node.parents.get(*next) {
                    *next += 1;
                    if visited.contains(parent_hash) {
                        continue;
                    }
                    let Some(parent) = self.get(*parent_hash) else {
                        tracing::warn!(
                            "[Book::reverse_depth_first_search_with_moves] Node {} has unknown parent {parent_hash}",
                            node.hash
                        );
                        continue;
                    };
                    visited.insert(*parent_hash);
                    stack.push(parent);
                    move_stack.push(Some(*parent_loc));
                    next_parent_idx.push(0);
                    break;
                } else {
                    stack.pop();
                    move_stack.pop();
                    next_parent_idx.pop();
                    if stack.is_empty() {
                        return false;
                    }
                }
            }
        }
    }

    /// Walk parent links depth first from `start`, calling `f` on discovering each node and
    /// `post` once all of that node's parents have been walked.
    ///
    /// Each node is visited at most once. Returns true if `f` aborted.
    pub fn reverse_depth_first_search_with_post<F, P>(&self, start: BookHash, mut f: F, mut post: P) -> bool
    where
        F: FnMut(&BookNode) -> DfsAction,
        P: FnMut(&BookNode),
    {
        let Some(initial) = self.get(start) else {
            tracing::warn!("[Book::reverse_depth_first_search_with_post] Unknown start node {start}");
            return false;
        };
        let mut stack: Vec<(&BookNode, usize)> = vec![(initial, 0)];
        let mut visited: BTreeSet<BookHash> = BTreeSet::from([start]);

        loop {
            if let Some((node, next)) = stack.last_mut() {
                match f(node) {
                    DfsAction::Abort => return true,
                    DfsAction::Skip => *next = usize::MAX,
                    DfsAction::Recurse => {}
                }
            }

            loop {
                let Some((node, next)) = stack.last_mut() else {
                    return false;
                };
                let node: &BookNode = *node;
                if let Some((parent_hash, _)) = node.parents.get(*next) {
                    *next += 1;
                    if visited.contains(parent_hash) {
                        continue;
                    }
                    let Some(parent) = self.get(*parent_hash) else {
                        tracing::warn!(
                            "[Book::reverse_depth_first_search_with_post] Node {} has unknown parent {parent_hash}",
                            node.hash
                        );
                        continue;
                    };
                    visited.insert(*parent_hash);
                    stack.push((parent, 0));
                    break;
                } else {
                    post(node);
                    stack.pop();
                    if stack.is_empty() {
                        return false;
                    }
                }
            }
        }
    }

    /// Like [`Book::reverse_depth_first_search_with_post`], without a post-visit callback.
    pub fn reverse_depth_first_search<F>(&self, start: BookHash, f: F) -> bool
    where
        F: FnMut(&BookNode) -> DfsAction,
    {
        self.reverse_depth_first_search_with_post(start, f, |_| {})
    }

    /// Arena indices of the dirty nodes (or every node, if `all_dirty`) ordered so that each
    /// node comes after all of its dirty children. A cycle is broken at an arbitrary point.
    ///
    /// The walk starts from the root and then from any dirty node it did not reach.
    pub(super) fn dirty_nodes_post_order(&self, dirty: &BTreeSet<BookHash>, all_dirty: bool) -> Vec<usize> {
        let is_dirty = |hash: &BookHash| all_dirty || dirty.contains(hash);
        let mut order = Vec::new();
        if !all_dirty && dirty.is_empty() {
            return order;
        }
        let mut visited: BTreeSet<BookHash> = BTreeSet::new();
        let mut stack: Vec<(usize, btree_map::Values<'_, Loc, BookMove>)> = Vec::new();

        for start in 0..self.nodes.len() {
            let start_hash = self.nodes[start].hash;
            if visited.contains(&start_hash) || !is_dirty(&start_hash) {
                continue;
            }
            visited.insert(start_hash);
            stack.push((start, self.nodes[start].moves.values()));

            while let Some((idx, children)) = stack.last_mut() {
                let idx = *idx;
                match children.next() {
                    Some(edge) => {
                        if visited.contains(&edge.hash) || !is_dirty(&edge.hash) {
                            continue;
                        }
                        let Some(child_idx) = self.index_of(edge.hash) else {
                            tracing::warn!(
                                "[Book::dirty_nodes_post_order] Node {} has unknown child {}",
                                self.nodes[idx].hash,
                                edge.hash
                            );
                            continue;
                        };
                        visited.insert(edge.hash);
                        stack.push((child_idx, self.nodes[child_idx].moves.values()));
                    }
                    None => {
                        order.push(idx);
                        stack.pop();
                    }
                }
            }
        }
        order
    }

    /// Arena indices of every node, ordered so that each node comes after all of its parents
    /// (up to cycles, which are broken arbitrarily).
    pub(super) fn entire_book_pre_order(&self) -> Vec<usize> {
        let visited: RefCell<BTreeSet<BookHash>> = RefCell::new(BTreeSet::new());
        let mut order = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if visited.borrow().contains(&node.hash) {
                continue;
            }
            self.reverse_depth_first_search_with_post(
                node.hash,
                |n| {
                    if visited.borrow().contains(&n.hash) {
                        DfsAction::Skip
                    } else {
                        DfsAction::Recurse
                    }
                },
                |n| {
                    if visited.borrow_mut().insert(n.hash) {
                        if let Some(idx) = self.index_of(n.hash) {
                            order.push(idx);
                        }
                    }
                },
            );
        }
        order
    }

    /// Bring derived values and costs up to date after the leaf values or edges of `changed`
    /// were modified (or the nodes were added).
    ///
    /// Every ancestor of a changed node is marked dirty and has its minimax values recomputed,
    /// children first. Costs are then recomputed for the whole book, parents first, since a
    /// value change anywhere can shift which moves are cheapest everywhere.
    pub fn recompute(&mut self, changed: &[BookHash]) {
        let mut dirty: BTreeSet<BookHash> = BTreeSet::new();
        for hash in changed {
            self.reverse_depth_first_search(*hash, |node| {
                if dirty.insert(node.hash) {
                    DfsAction::Recurse
                } else {
                    DfsAction::Skip
                }
            });
        }
        tracing::debug!(
            "[Book::recompute] {} changed nodes marked {} of {} nodes dirty",
            changed.len(),
            dirty.len(),
            self.nodes.len()
        );

        for idx in self.dirty_nodes_post_order(&dirty, false) {
            self.recompute_node_values(idx);
        }
        for idx in self.entire_book_pre_order() {
            self.recompute_node_cost(idx);
        }
    }

    pub fn recompute_everything(&mut self) {
        tracing::debug!("[Book::recompute_everything] Recomputing {} nodes", self.nodes.len());
        for idx in self.dirty_nodes_post_order(&BTreeSet::new(), true) {
            self.recompute_node_values(idx);
        }
        for idx in self.entire_book_pre_order() {
            self.recompute_node_cost(idx);
        }
    }

    /// Up to `n` expandable nodes with the smallest cost from root plus expansion cost,
    /// cheapest first, each viewed in its canonical orientation.
    pub fn next_n_to_expand(&self, n: usize) -> Vec<SymNode<&Book>> {
        if n == 0 {
            return Vec::new();
        }
        let by_cost = |a: &usize, b: &usize| {
            self.nodes[*a]
                .total_expansion_cost()
                .total_cmp(&self.nodes[*b].total_expansion_cost())
                .then(a.cmp(b))
        };
        let mut candidates: Vec<usize> = (0..self.nodes.len())
            .filter(|idx| self.nodes[*idx].can_expand)
            .collect();
        if candidates.len() > n {
            candidates.select_nth_unstable_by(n - 1, by_cost);
            candidates.truncate(n);
        }
        candidates.sort_unstable_by(by_cost);
        candidates
            .into_iter()
            .map(|idx| SymNode::new(self, idx, canonical_view()))
            .collect()
    }

    /// Nodes with at least `min_visits` visits none of whose children have that many.
    pub fn all_leaves(&self, min_visits: f64) -> Vec<SymNode<&Book>> {
        (0..self.nodes.len())
            .filter(|idx| {
                let node = &self.nodes[*idx];
                node.recursive_values.visits >= min_visits
                    && node.moves.values().all(|edge| {
                        self.get(edge.hash)
                            .map_or(true, |child| child.recursive_values.visits < min_visits)
                    })
            })
            .map(|idx| SymNode::new(self, idx, canonical_view()))
            .collect()
    }
}
