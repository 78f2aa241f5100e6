//! Per-node summaries for display.
//!
//! [`node_report`] collects what a renderer needs to show one node: the board as seen from the
//! view, links to the parent and children with the orientation to show them in, and the book
//! moves ranked for display. Formatting is left to the caller.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, ops::Deref};

use crate::{
    book::{Book, RecursiveBookValues, SymNode},
    game::{Loc, Player, Point},
    hash::BookHash,
    symmetry::Symmetry,
};

/// A link to another node, shown in the orientation given by `symmetry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeLink {
    pub hash: BookHash,
    pub symmetry: Symmetry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildLink {
    #[serde(rename = "move")]
    pub mv: String,
    #[serde(flatten)]
    pub link: NodeLink,
}

/// Statistics for one book move, or for the unexpanded remainder of the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveReport {
    /// GTP coordinate of the move, `"pass"`, or `"other"` for moves not in the book.
    #[serde(rename = "move")]
    pub mv: String,
    /// Every board point equivalent to this move under the position's symmetries, as (x, y).
    pub xy: Vec<(u8, u8)>,
    pub raw_policy: f64,
    pub win_loss_value: f64,
    #[serde(rename = "winLossLCB")]
    pub win_loss_lcb: f64,
    #[serde(rename = "winLossUCB")]
    pub win_loss_ucb: f64,
    pub score_mean: f64,
    pub sharp_score_mean: f64,
    #[serde(rename = "scoreLCB")]
    pub score_lcb: f64,
    #[serde(rename = "scoreUCB")]
    pub score_ucb: f64,
    pub visits: f64,
    /// Cost of the move beyond the node's own cost from root.
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeReport {
    pub hash: BookHash,
    pub next_pla: Player,
    /// Board rows from the top, as `X`, `O` and `.`.
    pub board: Vec<String>,
    pub parent: Option<NodeLink>,
    pub children: Vec<ChildLink>,
    /// Book moves, best first for the player to move, then the `"other"` entry if any policy
    /// remains unexpanded.
    pub moves: Vec<MoveReport>,
}

/// Summarize `view` for display. `None` if no game from the root to the node can be
/// reconstructed.
pub fn node_report<B: Deref<Target = Book>>(view: &SymNode<B>) -> Option<NodeReport> {
    let book = view.book();
    let params = book.params();
    let dims = book.dims();
    let hist = view.board_history_reaching_here()?;
    let node = view.node();
    let pla = node.pla();

    let parent = view.canonical_parent().map(|p| NodeLink {
        hash: p.hash(),
        symmetry: p.symmetry_of_node().symmetry(),
    });

    let mut candidate_locs: Vec<Loc> = dims.points().map(Loc::Point).collect();
    // Passing after a pass ends the game, so there is nothing to link to.
    if hist.consecutive_passes() == 0 {
        candidate_locs.push(Loc::Pass);
    }
    let children = candidate_locs
        .into_iter()
        .filter_map(|loc| {
            view.follow(loc).map(|child| ChildLink {
                mv: loc.to_gtp(dims),
                link: NodeLink {
                    hash: child.hash(),
                    symmetry: child.symmetry_of_node().symmetry(),
                },
            })
        })
        .collect();

    let pla_factor = if pla.is_maximizing() { 1.0 } else { -1.0 };
    let symmetries = view.symmetries();
    let mut ranked: Vec<(f64, MoveReport)> = Vec::new();
    let mut points_handled: BTreeSet<Point> = BTreeSet::new();
    for edge in view.unique_moves_in_book() {
        let Some(child) = view.follow(edge.mv) else {
            continue;
        };
        let values = *child.recursive_values();
        let bound = if pla.is_maximizing() {
            values.score_lcb
        } else {
            values.score_ucb
        };
        let sort_utility = pla_factor
            * (values.win_loss_value + values.sharp_score_mean * params.utility_per_score * 0.5)
            + pla_factor * bound * 0.5 * params.utility_per_score
            + params.utility_per_policy_for_sorting
                * (0.75 * edge.raw_policy + 0.5 * (edge.raw_policy + 0.0001).log10() / 4.0);

        let mut xy = Vec::new();
        for s in &symmetries {
            if let Some(p) = s.apply(edge.mv, dims).point() {
                if points_handled.insert(p) {
                    xy.push((p.x, p.y));
                }
            }
        }
        ranked.push((
            sort_utility,
            MoveReport {
                mv: edge.mv.to_gtp(dims),
                xy,
                raw_policy: edge.raw_policy,
                win_loss_value: values.win_loss_value,
                win_loss_lcb: values.win_loss_lcb,
                win_loss_ucb: values.win_loss_ucb,
                score_mean: values.score_mean,
                sharp_score_mean: values.sharp_score_mean,
                score_lcb: values.score_lcb,
                score_ucb: values.score_ucb,
                visits: values.visits,
                cost: edge.cost_from_root - node.min_cost_from_root(),
            },
        ));
    }
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    let mut moves: Vec<MoveReport> = ranked.into_iter().map(|(_, report)| report).collect();

    let leaf = node.this_values_not_in_book();
    if leaf.max_policy > 0.0 {
        let bounds = RecursiveBookValues::from_leaf(
            leaf,
            book.initial_rules(),
            params.error_factor,
            params.sharp_score_outlier_cap,
        );
        moves.push(MoveReport {
            mv: "other".to_string(),
            xy: Vec::new(),
            raw_policy: leaf.max_policy,
            win_loss_value: bounds.win_loss_value,
            win_loss_lcb: bounds.win_loss_lcb,
            win_loss_ucb: bounds.win_loss_ucb,
            score_mean: bounds.score_mean,
            sharp_score_mean: bounds.sharp_score_mean,
            score_lcb: bounds.score_lcb,
            score_ucb: bounds.score_ucb,
            visits: bounds.visits,
            cost: node.this_node_expansion_cost(),
        });
    }

    Some(NodeReport {
        hash: node.hash(),
        next_pla: pla,
        board: hist.board().to_rows(),
        parent,
        children,
        moves,
    })
}
