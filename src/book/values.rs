use serde::{Deserialize, Serialize};

use crate::game::{Player, Rules};

/// Evaluation of a node as if none of its children were in the book.
///
/// Values are from White's perspective. Supplied by whatever engine evaluates the position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookValues {
    pub win_loss_value: f64,
    pub score_mean: f64,
    pub sharp_score_mean: f64,
    pub win_loss_error: f64,
    pub score_error: f64,
    pub score_stdev: f64,
    /// Largest prior probability among moves not yet expanded into the book.
    pub max_policy: f64,
    pub weight: f64,
    pub visits: f64,
}

impl BookValues {
    /// Score uncertainty, correcting for the variance that integer komi adds by blurring
    /// results onto half-integer grid points.
    pub fn adjusted_score_error(&self, rules: &Rules) -> f64 {
        if rules.result_will_be_integer() {
            let score_variance = self.score_stdev * self.score_stdev;
            let adjusted = (score_variance - 0.25).max(score_variance * 0.05);
            adjusted.sqrt().min(self.score_error)
        } else {
            self.score_stdev.min(self.score_error)
        }
    }
}

/// Minimax bounds over a node's own evaluation and every expanded child.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecursiveBookValues {
    pub win_loss_value: f64,
    pub score_mean: f64,
    pub sharp_score_mean: f64,
    #[serde(rename = "winLossLCB")]
    pub win_loss_lcb: f64,
    #[serde(rename = "scoreLCB")]
    pub score_lcb: f64,
    #[serde(rename = "scoreFinalLCB")]
    pub score_final_lcb: f64,
    #[serde(rename = "winLossUCB")]
    pub win_loss_ucb: f64,
    #[serde(rename = "scoreUCB")]
    pub score_ucb: f64,
    #[serde(rename = "scoreFinalUCB")]
    pub score_final_ucb: f64,
    pub weight: f64,
    pub visits: f64,
}

impl RecursiveBookValues {
    /// Bounds implied by a leaf evaluation alone. The sharp score widens the score bounds and is
    /// itself clamped to within `sharp_score_outlier_cap` of the mean.
    pub fn from_leaf(values: &BookValues, rules: &Rules, error_factor: f64, sharp_score_outlier_cap: f64) -> Self {
        let score_error = values.adjusted_score_error(rules);
        let mut ret = RecursiveBookValues {
            win_loss_value: values.win_loss_value,
            score_mean: values.score_mean,
            sharp_score_mean: values.sharp_score_mean,
            win_loss_lcb: values.win_loss_value - error_factor * values.win_loss_error,
            score_lcb: values.score_mean - error_factor * score_error,
            score_final_lcb: values.score_mean - error_factor * values.score_stdev,
            win_loss_ucb: values.win_loss_value + error_factor * values.win_loss_error,
            score_ucb: values.score_mean + error_factor * score_error,
            score_final_ucb: values.score_mean + error_factor * values.score_stdev,
            weight: values.weight,
            visits: values.visits,
        };
        ret.score_ucb = ret.score_ucb.max(ret.sharp_score_mean);
        ret.score_lcb = ret.score_lcb.min(ret.sharp_score_mean);
        ret.sharp_score_mean = ret
            .sharp_score_mean
            .min(ret.score_mean + sharp_score_outlier_cap)
            .max(ret.score_mean - sharp_score_outlier_cap);
        ret
    }

    /// Fold in a child: elementwise max for White to move, min for Black. Weights and visits add.
    pub fn absorb_child(&mut self, child: &RecursiveBookValues, pla: Player) {
        let pick = |a: f64, b: f64| if pla.is_maximizing() { a.max(b) } else { a.min(b) };
        self.win_loss_value = pick(self.win_loss_value, child.win_loss_value);
        self.score_mean = pick(self.score_mean, child.score_mean);
        self.sharp_score_mean = pick(self.sharp_score_mean, child.sharp_score_mean);
        self.win_loss_lcb = pick(self.win_loss_lcb, child.win_loss_lcb);
        self.score_lcb = pick(self.score_lcb, child.score_lcb);
        self.score_final_lcb = pick(self.score_final_lcb, child.score_final_lcb);
        self.win_loss_ucb = pick(self.win_loss_ucb, child.win_loss_ucb);
        self.score_ucb = pick(self.score_ucb, child.score_ucb);
        self.score_final_ucb = pick(self.score_final_ucb, child.score_final_ucb);
        self.weight += child.weight;
        self.visits += child.visits;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn leaf(wl: f64, score: f64) -> BookValues {
        BookValues {
            win_loss_value: wl,
            score_mean: score,
            sharp_score_mean: score,
            win_loss_error: 0.1,
            score_error: 2.0,
            score_stdev: 3.0,
            max_policy: 0.5,
            weight: 10.0,
            visits: 20.0,
        }
    }

    #[test]
    fn test_adjusted_score_error() {
        let values = leaf(0.0, 0.0);
        let half_komi = Rules::default();
        assert_eq!(values.adjusted_score_error(&half_komi), 2.0);
        let integer_komi = Rules {
            komi: 7.0,
            ..half_komi
        };
        // sqrt(9 - 0.25) is above the reported error, so the error wins.
        assert_eq!(values.adjusted_score_error(&integer_komi), 2.0);
        let tight = BookValues {
            score_stdev: 0.4,
            score_error: 10.0,
            ..values
        };
        // 0.16 - 0.25 is negative, so the 5% floor applies.
        let expected = (0.16f64 * 0.05).sqrt();
        assert!((tight.adjusted_score_error(&integer_komi) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_sharp_score_is_clamped_and_widens_bounds() {
        let mut values = leaf(0.2, 1.0);
        values.sharp_score_mean = 10.0;
        let rv = RecursiveBookValues::from_leaf(&values, &Rules::default(), 1.0, 2.0);
        assert_eq!(rv.score_ucb, 10.0);
        assert_eq!(rv.sharp_score_mean, 3.0);
        assert_eq!(rv.score_lcb, 1.0 - 2.0);
        assert!((rv.win_loss_lcb - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_absorb_child_minimax() {
        let rules = Rules::default();
        let a = RecursiveBookValues::from_leaf(&leaf(0.1, 1.0), &rules, 1.0, 2.0);
        let b = RecursiveBookValues::from_leaf(&leaf(0.5, -1.0), &rules, 1.0, 2.0);

        let mut white = a;
        white.absorb_child(&b, Player::White);
        assert_eq!(white.win_loss_value, 0.5);
        assert_eq!(white.score_mean, 1.0);
        assert_eq!(white.visits, 40.0);

        let mut black = a;
        black.absorb_child(&b, Player::Black);
        assert_eq!(black.win_loss_value, 0.1);
        assert_eq!(black.score_mean, -1.0);
        assert_eq!(black.weight, 20.0);
    }
}
