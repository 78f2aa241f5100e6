//! Per-node value and cost recomputation.
//!
//! A node's cost from root estimates how undesirable it is to spend effort on it: each step away
//! from the root adds a base cost plus penalties for how much value the move gives up relative to
//! the best option and for how unlikely the move is under the policy. The expansion cost adds the
//! price of expanding one more move at the node. Uncertainty, score sharpness and principal
//! variation status earn bonuses that pull those costs down again.

use crate::{
    book::{
        graph::ROOT_IDX,
        values::{BookValues, RecursiveBookValues},
        Book,
    },
    config::CostParams,
    game::Loc,
};

const HUGE_COST: f64 = 1e100;
const TINY_POLICY: f64 = 1e-100;

/// A snapshot of one outgoing edge with its target's values.
struct EdgeInfo {
    loc: Loc,
    raw_policy: f64,
    child: RecursiveBookValues,
}

impl Book {
    pub(super) fn recompute_node_values(&mut self, idx: usize) {
        let node = &self.nodes[idx];
        let mut values = RecursiveBookValues::from_leaf(
            &node.this_values_not_in_book,
            &self.initial_rules,
            self.params.error_factor,
            self.params.sharp_score_outlier_cap,
        );
        for edge in node.moves.values() {
            match self.get(edge.hash) {
                Some(child) => values.absorb_child(&child.recursive_values, node.pla),
                None => tracing::warn!(
                    "[Book::recompute_node_values] Node {} has unknown child {}",
                    node.hash,
                    edge.hash
                ),
            }
        }
        self.nodes[idx].recursive_values = values;
    }

    fn utility(&self, win_loss: f64, score: f64) -> f64 {
        win_loss + score * self.params.utility_per_score
    }

    pub(super) fn recompute_node_cost(&mut self, idx: usize) {
        let p = self.params;
        let node = &self.nodes[idx];
        let pla = node.pla;
        let maximizing = pla.is_maximizing();
        let sign = if maximizing { 1.0 } else { -1.0 };

        let (mut min_cost, mut min_cost_wlpv, biggest_wl) = if idx == ROOT_IDX {
            (0.0, 0.0, 0.0)
        } else {
            let mut min_cost = HUGE_COST;
            let mut min_cost_wlpv = HUGE_COST;
            let mut biggest_wl = HUGE_COST;
            for (parent_hash, loc) in &node.parents {
                let Some(parent) = self.get(*parent_hash) else {
                    continue;
                };
                let Some(edge) = parent.moves.get(loc) else {
                    continue;
                };
                if edge.cost_from_root < min_cost {
                    min_cost = edge.cost_from_root;
                    biggest_wl = edge.biggest_wl_cost_from_root;
                }
                if edge.is_wlpv && parent.min_cost_from_root_wlpv < min_cost_wlpv {
                    min_cost_wlpv = parent.min_cost_from_root_wlpv;
                }
            }
            (min_cost, min_cost_wlpv, biggest_wl)
        };
        if let Some(bonus) = self.bonus_by_hash.get(&node.hash) {
            min_cost -= bonus;
        }
        min_cost_wlpv = min_cost_wlpv.min(min_cost);

        let leaf: BookValues = node.this_values_not_in_book;
        let own = node.recursive_values;
        let num_moves = node.moves.len();
        let can_expand = node.can_expand;
        let edges: Vec<EdgeInfo> = node
            .moves
            .iter()
            .filter_map(|(loc, edge)| {
                self.get(edge.hash).map(|child| EdgeInfo {
                    loc: *loc,
                    raw_policy: edge.raw_policy,
                    child: child.recursive_values,
                })
            })
            .collect();

        // Best move by win/loss value from the mover's perspective; the node's own evaluation
        // stands for the unexpanded moves.
        let mut wlpv_edge: Option<usize> = None;
        let mut best_wl = -HUGE_COST;
        for (i, e) in edges.iter().enumerate() {
            if sign * e.child.win_loss_value > best_wl {
                best_wl = sign * e.child.win_loss_value;
                wlpv_edge = Some(i);
            }
        }
        let expansion_is_wlpv = sign * leaf.win_loss_value > best_wl;
        if expansion_is_wlpv {
            wlpv_edge = None;
        }

        // Pull a move's log policy toward that of the first higher-policy sibling, to the extent
        // this move's utility is not worse than that sibling's.
        let boost_log_policy = |log_policy: f64, utility: f64, raw_policy: f64| -> f64 {
            edges
                .iter()
                .find(|other| other.raw_policy > raw_policy)
                .map_or(log_policy, |other| {
                    let other_utility = self.utility(other.child.win_loss_value, other.child.score_mean);
                    let gain = sign * (utility - other_utility);
                    let factor = 1.0 / (1.0 + (-gain / p.policy_boost_soft_utility_scale + 1.0).exp());
                    let other_log_policy = (other.raw_policy + TINY_POLICY).ln();
                    log_policy.max(log_policy + factor * (other_log_policy - log_policy))
                })
        };

        let (pass_policy, pass_utility) = edges
            .iter()
            .find(|e| e.loc == Loc::Pass)
            .map_or((0.0, -sign * HUGE_COST), |e| {
                (e.raw_policy, self.utility(e.child.win_loss_value, e.child.score_mean))
            });
        let pass_penalty = |raw_policy: f64, utility: f64| -> f64 {
            let pass_close = if maximizing {
                pass_utility > utility - 0.02
            } else {
                pass_utility < utility + 0.02
            };
            if pass_policy > 0.15 && pass_policy > raw_policy * 0.8 && pass_close {
                p.cost_when_pass_favored
            } else {
                0.0
            }
        };

        // Value given up by choosing a move with these bounds over the node's own bounds.
        let win_loss_cost = |child_ucb: f64, child_lcb: f64| -> f64 {
            let (hi, lo) = if maximizing {
                (own.win_loss_ucb, child_ucb)
            } else {
                (child_lcb, own.win_loss_lcb)
            };
            let cost = (hi - lo) * p.cost_per_ucb_win_loss_loss
                + (hi.powi(3) - lo.powi(3)) * p.cost_per_ucb_win_loss_loss_pow3
                + (hi.powi(7) - lo.powi(7)) * p.cost_per_ucb_win_loss_loss_pow7;
            if cost > biggest_wl {
                cost - p.bonus_for_biggest_wl_cost * (cost - biggest_wl)
            } else {
                cost
            }
        };
        let score_loss = |child_ucb: f64, child_lcb: f64| -> f64 {
            let loss = if maximizing {
                own.score_ucb - child_ucb
            } else {
                child_lcb - own.score_lcb
            };
            loss.min(p.score_loss_cap)
        };

        let mut smallest_cost_from_ucb = HUGE_COST;
        let mut costs: Vec<f64> = Vec::with_capacity(edges.len());
        let mut biggest_wl_costs: Vec<f64> = Vec::with_capacity(edges.len());
        for e in &edges {
            let cost_from_wl = win_loss_cost(e.child.win_loss_ucb, e.child.win_loss_lcb);
            let cost_from_ucb =
                cost_from_wl + score_loss(e.child.score_ucb, e.child.score_lcb) * p.cost_per_ucb_score_loss;
            let utility = self.utility(e.child.win_loss_value, e.child.score_mean);
            let log_policy = (e.raw_policy + TINY_POLICY).ln();
            let boosted = boost_log_policy(log_policy, utility, e.raw_policy);
            costs.push(
                min_cost + p.cost_per_move + cost_from_ucb - boosted * p.cost_per_log_policy
                    + pass_penalty(e.raw_policy, utility),
            );
            biggest_wl_costs.push(biggest_wl.max(cost_from_wl));
            smallest_cost_from_ucb = smallest_cost_from_ucb.min(cost_from_ucb);
        }

        let mut expansion_cost = if can_expand {
            let score_error = leaf.adjusted_score_error(&self.initial_rules);
            let wl_ucb = leaf.win_loss_value + p.error_factor * leaf.win_loss_error;
            let wl_lcb = leaf.win_loss_value - p.error_factor * leaf.win_loss_error;
            let score_ucb = leaf.score_mean + p.error_factor * score_error;
            let score_lcb = leaf.score_mean - p.error_factor * score_error;
            let cost_from_wl = win_loss_cost(wl_ucb, wl_lcb);
            let cost_from_ucb = cost_from_wl + score_loss(score_ucb, score_lcb) * p.cost_per_ucb_score_loss;
            let utility = self.utility(leaf.win_loss_value, leaf.score_mean);
            let log_policy = (leaf.max_policy + TINY_POLICY).ln();
            let boosted = boost_log_policy(log_policy, utility, leaf.max_policy);
            let moves_expanded = (num_moves as f64).min(1.0 / (leaf.max_policy + 1e-30));
            smallest_cost_from_ucb = smallest_cost_from_ucb.min(cost_from_ucb);
            p.cost_per_move + cost_from_ucb - boosted * p.cost_per_log_policy
                + moves_expanded * p.cost_per_moves_expanded
                + moves_expanded * moves_expanded * p.cost_per_squared_moves_expanded
                + pass_penalty(leaf.max_policy, utility)
        } else {
            HUGE_COST
        };

        // Most of the loss that every option shares is not the fault of any single move.
        if smallest_cost_from_ucb > 1e-100 {
            for cost in costs.iter_mut() {
                *cost -= 0.8 * smallest_cost_from_ucb;
            }
            expansion_cost -= 0.8 * smallest_cost_from_ucb;
        }

        // A move clearly better than a cheaper sibling should not cost much more than it.
        for i in 0..edges.len() {
            let wl = sign * edges[i].child.win_loss_value;
            let mut best_other = costs[i];
            for j in 0..edges.len() {
                if costs[j] < best_other && wl > sign * edges[j].child.win_loss_value + 0.03 {
                    best_other = costs[j];
                }
            }
            if best_other < costs[i] {
                costs[i] += 0.5 * (best_other - costs[i]);
            }
        }
        {
            let wl = sign * leaf.win_loss_value;
            let mut best_other = expansion_cost + min_cost;
            for (j, e) in edges.iter().enumerate() {
                if costs[j] < best_other && wl > sign * e.child.win_loss_value + 0.03 {
                    best_other = costs[j];
                }
            }
            if best_other - min_cost < expansion_cost {
                expansion_cost += 0.5 * (best_other - min_cost - expansion_cost);
            }
        }

        for (i, e) in edges.iter().enumerate() {
            let wl_error = (e.child.win_loss_ucb - e.child.win_loss_lcb).abs() / p.error_factor / 2.0;
            let score_error = (e.child.score_ucb - e.child.score_lcb).abs() / p.error_factor / 2.0;
            let sharp_discrepancy = (e.child.sharp_score_mean - e.child.score_mean).abs();
            let bonus = (p.bonus_per_win_loss_error * wl_error
                + p.bonus_per_score_error * score_error
                + p.bonus_per_sharp_score_discrepancy * sharp_discrepancy)
                .min((costs[i] - min_cost) * 0.75);
            costs[i] -= bonus;

            if wlpv_edge == Some(i) {
                let scale = costs[i] - min_cost;
                if scale > 0.0 {
                    costs[i] -= scale * wlpv_bonus_factor(&p, e.child.win_loss_value);
                }
            }
        }
        {
            let sharp_discrepancy = (leaf.sharp_score_mean - leaf.score_mean).abs();
            let moves_expanded = num_moves as f64;
            let excess_policy = if num_moves > 0 && leaf.max_policy > 1.0 / moves_expanded {
                leaf.max_policy - 1.0 / moves_expanded
            } else {
                0.0
            };
            let mut bonus = (p.bonus_per_win_loss_error * leaf.win_loss_error
                + p.bonus_per_score_error * leaf.score_error
                + p.bonus_per_sharp_score_discrepancy * sharp_discrepancy.min(1.0)
                + p.bonus_per_excess_unexpanded_policy * excess_policy)
                .min(expansion_cost * 0.75);
            bonus += p.bonus_per_sharp_score_discrepancy * (sharp_discrepancy - 1.0).max(0.0);
            expansion_cost -= bonus;

            if expansion_is_wlpv && expansion_cost > 0.0 {
                expansion_cost -= expansion_cost * wlpv_bonus_factor(&p, leaf.win_loss_value);
            }
        }

        let node = &mut self.nodes[idx];
        node.min_cost_from_root = min_cost;
        node.min_cost_from_root_wlpv = min_cost_wlpv;
        node.biggest_wl_cost_from_root = biggest_wl;
        node.this_node_expansion_cost = expansion_cost;
        node.expansion_is_wlpv = expansion_is_wlpv;
        for edge in node.moves.values_mut() {
            edge.is_wlpv = false;
        }
        for (i, e) in edges.iter().enumerate() {
            if let Some(edge) = node.moves.get_mut(&e.loc) {
                edge.cost_from_root = costs[i];
                edge.biggest_wl_cost_from_root = biggest_wl_costs[i];
                edge.is_wlpv = wlpv_edge == Some(i);
            }
        }
    }
}

/// Fraction of the remaining cost forgiven for lying on the win/loss principal variation. Peaks
/// for balanced positions through the first term and for moderately decided ones through the
/// second.
fn wlpv_bonus_factor(p: &CostParams, win_loss: f64) -> f64 {
    let balanced = (1.0 - win_loss * win_loss).max(0.0);
    let moderate = 4.0 * (0.25 - (0.5 - win_loss.abs()).powi(2)).max(0.0);
    (balanced * p.bonus_for_wlpv1 + moderate * p.bonus_for_wlpv2).tanh()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_wlpv_bonus_factor() {
        let p = CostParams {
            bonus_for_wlpv1: 1.0,
            bonus_for_wlpv2: 0.0,
            ..CostParams::default()
        };
        assert!((wlpv_bonus_factor(&p, 0.0) - 1.0f64.tanh()).abs() < 1e-12);
        assert_eq!(wlpv_bonus_factor(&p, 1.0), 0.0);

        let p = CostParams {
            bonus_for_wlpv1: 0.0,
            bonus_for_wlpv2: 1.0,
            ..CostParams::default()
        };
        assert!((wlpv_bonus_factor(&p, -0.5) - 1.0f64.tanh()).abs() < 1e-12);
        assert_eq!(wlpv_bonus_factor(&p, 0.0), 0.0);
    }
}
