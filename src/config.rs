use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::Path,
    sync::Arc,
};

use crate::{
    error::BookError,
    game::{Board, BoardDims, Player, Rules, ZobristTable, MAX_BOARD_LEN},
};

/// Coefficients of the expansion cost model.
///
/// Only the shape of the cost formula is fixed; these values are tuning inputs. Coefficients
/// that older book files may not carry default to zero when absent from serialized input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostParams {
    /// Number of standard errors between a value estimate and its confidence bounds.
    pub error_factor: f64,
    pub cost_per_move: f64,
    #[serde(rename = "costPerUCBWinLossLoss")]
    pub cost_per_ucb_win_loss_loss: f64,
    #[serde(rename = "costPerUCBWinLossLossPow3", default)]
    pub cost_per_ucb_win_loss_loss_pow3: f64,
    #[serde(rename = "costPerUCBWinLossLossPow7", default)]
    pub cost_per_ucb_win_loss_loss_pow7: f64,
    #[serde(rename = "costPerUCBScoreLoss")]
    pub cost_per_ucb_score_loss: f64,
    pub cost_per_log_policy: f64,
    pub cost_per_moves_expanded: f64,
    pub cost_per_squared_moves_expanded: f64,
    pub cost_when_pass_favored: f64,
    pub bonus_per_win_loss_error: f64,
    #[serde(default)]
    pub bonus_per_score_error: f64,
    #[serde(default)]
    pub bonus_per_sharp_score_discrepancy: f64,
    #[serde(default)]
    pub bonus_per_excess_unexpanded_policy: f64,
    #[serde(rename = "bonusForWLPV1", default)]
    pub bonus_for_wlpv1: f64,
    #[serde(rename = "bonusForWLPV2", default)]
    pub bonus_for_wlpv2: f64,
    #[serde(rename = "bonusForBiggestWLCost", default)]
    pub bonus_for_biggest_wl_cost: f64,
    pub score_loss_cap: f64,
    pub utility_per_score: f64,
    pub policy_boost_soft_utility_scale: f64,
    pub utility_per_policy_for_sorting: f64,
    /// Largest distance the sharp score may sit from the mean score before it is clamped.
    #[serde(default = "default_sharp_score_outlier_cap")]
    pub sharp_score_outlier_cap: f64,
}

fn default_sharp_score_outlier_cap() -> f64 {
    2.0
}

impl Default for CostParams {
    fn default() -> Self {
        CostParams {
            error_factor: 1.0,
            cost_per_move: 1.0,
            cost_per_ucb_win_loss_loss: 60.0,
            cost_per_ucb_win_loss_loss_pow3: 0.0,
            cost_per_ucb_win_loss_loss_pow7: 0.0,
            cost_per_ucb_score_loss: 2.0,
            cost_per_log_policy: 0.8,
            cost_per_moves_expanded: 0.6,
            cost_per_squared_moves_expanded: 0.03,
            cost_when_pass_favored: 4.0,
            bonus_per_win_loss_error: 10.0,
            bonus_per_score_error: 0.05,
            bonus_per_sharp_score_discrepancy: 0.1,
            bonus_per_excess_unexpanded_policy: 2.0,
            bonus_for_wlpv1: 0.2,
            bonus_for_wlpv2: 0.5,
            bonus_for_biggest_wl_cost: 0.2,
            score_loss_cap: 5.0,
            utility_per_score: 0.05,
            policy_boost_soft_utility_scale: 0.03,
            utility_per_policy_for_sorting: 0.02,
            sharp_score_outlier_cap: default_sharp_score_outlier_cap(),
        }
    }
}

impl CostParams {
    pub fn validate(&self) -> Result<(), BookError> {
        if !(self.error_factor > 0.0) {
            return Err(BookError::Config(format!(
                "errorFactor must be positive, got {}",
                self.error_factor
            )));
        }
        if !(self.policy_boost_soft_utility_scale > 0.0) {
            return Err(BookError::Config(format!(
                "policyBoostSoftUtilityScale must be positive, got {}",
                self.policy_boost_soft_utility_scale
            )));
        }
        if self.sharp_score_outlier_cap < 0.0 {
            return Err(BookError::Config(format!(
                "sharpScoreOutlierCap must not be negative, got {}",
                self.sharp_score_outlier_cap
            )));
        }
        Ok(())
    }
}

/// Board dimensions plus the starting stones, as rows of `X`, `O` and `.` from the top.
/// An empty `stones` list means an empty board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSetup {
    pub x_size: u8,
    pub y_size: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stones: Vec<String>,
}

impl BoardSetup {
    pub fn empty(x_size: u8, y_size: u8) -> Self {
        BoardSetup {
            x_size,
            y_size,
            stones: Vec::new(),
        }
    }

    pub fn from_board(board: &Board) -> Self {
        let dims = board.dims();
        BoardSetup {
            x_size: dims.x_size,
            y_size: dims.y_size,
            stones: if board.is_empty() {
                Vec::new()
            } else {
                board.to_rows()
            },
        }
    }

    pub fn dims(&self) -> BoardDims {
        BoardDims::new(self.x_size, self.y_size)
    }

    pub fn build(&self) -> Result<Board, BookError> {
        let dims = self.dims();
        if dims.x_size < 2 || dims.y_size < 2 || dims.x_size > MAX_BOARD_LEN || dims.y_size > MAX_BOARD_LEN {
            return Err(BookError::Config(format!(
                "board size {dims} outside of 2x2..{MAX_BOARD_LEN}x{MAX_BOARD_LEN}"
            )));
        }
        let zobrist = Arc::new(ZobristTable::new(dims));
        if self.stones.is_empty() {
            Ok(Board::new(zobrist))
        } else {
            Board::from_rows(zobrist, &self.stones)
        }
    }
}

fn default_initial_pla() -> Player {
    Player::Black
}

/// Everything needed to start a new book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookConfig {
    pub board: BoardSetup,
    #[serde(default)]
    pub rules: Rules,
    #[serde(default = "default_initial_pla")]
    pub initial_pla: Player,
    /// Moves whose played chain and surrounding empty regions exceed this many points restart
    /// the history component of node hashes.
    pub rep_bound: u32,
    #[serde(default)]
    pub params: CostParams,
}

impl BookConfig {
    pub fn new(board: BoardSetup, rules: Rules, rep_bound: u32) -> Self {
        BookConfig {
            board,
            rules,
            initial_pla: Player::Black,
            rep_bound,
            params: CostParams::default(),
        }
    }

    pub fn validate(&self) -> Result<(), BookError> {
        self.board.build()?;
        self.params.validate()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, BookError> {
        let config: BookConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, BookError> {
        tracing::debug!("[BookConfig::from_toml_file] Reading {:?}", path.as_ref());
        let content = read_to_string(path)?;
        BookConfig::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, BookError> {
        Ok(toml::to_string(self)?)
    }

    pub fn write_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), BookError> {
        tracing::debug!("[BookConfig::write_toml_file] Writing {:?}", path.as_ref());
        write(path, self.to_toml_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::KoRule;
    use test_log::test;

    const SAMPLE: &str = r#"
initialPla = "White"
repBound = 11

[board]
xSize = 5
ySize = 5
stones = [".....", ".X...", ".....", "...O.", "....."]

[rules]
koRule = "SIMPLE"
komi = 6.0

[params]
errorFactor = 1.5
costPerMove = 0.5
costPerUCBWinLossLoss = 40.0
costPerUCBScoreLoss = 1.0
costPerLogPolicy = 0.5
costPerMovesExpanded = 0.5
costPerSquaredMovesExpanded = 0.01
costWhenPassFavored = 2.0
bonusPerWinLossError = 5.0
scoreLossCap = 4.0
utilityPerScore = 0.04
policyBoostSoftUtilityScale = 0.02
utilityPerPolicyForSorting = 0.01
"#;

    #[test]
    fn test_parse_config() {
        let config = BookConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.initial_pla, Player::White);
        assert_eq!(config.rep_bound, 11);
        assert_eq!(config.rules.ko_rule, KoRule::Simple);
        assert!(config.rules.result_will_be_integer());
        assert_eq!(config.params.error_factor, 1.5);
        // Optional coefficients fall back to zero.
        assert_eq!(config.params.cost_per_ucb_win_loss_loss_pow3, 0.0);
        assert_eq!(config.params.bonus_for_wlpv1, 0.0);
        assert_eq!(config.params.sharp_score_outlier_cap, 2.0);
        let board = config.board.build().unwrap();
        assert_eq!(board.num_stones(), 2);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = BookConfig::new(BoardSetup::empty(7, 5), Rules::default(), 9);
        let text = config.to_toml_string().unwrap();
        assert_eq!(BookConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_validation() {
        let mut config = BookConfig::new(BoardSetup::empty(30, 5), Rules::default(), 9);
        assert!(matches!(config.validate(), Err(BookError::Config(_))));
        config.board = BoardSetup::empty(5, 5);
        config.params.error_factor = 0.0;
        assert!(matches!(config.validate(), Err(BookError::Config(_))));
        config.params.error_factor = 1.0;
        assert!(config.validate().is_ok());
        let missing = "repBound = 3\n[board]\nxSize = 5\nySize = 5\n[params]\nerrorFactor = 1.0\n";
        assert!(matches!(
            BookConfig::from_toml_str(missing),
            Err(BookError::Serialization(_))
        ));
    }
}
