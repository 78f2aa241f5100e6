use serde::{Deserialize, Serialize};

use crate::{game::ZobristTable, hash::Hash128};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KoRule {
    Simple,
    #[default]
    Situational,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rules {
    #[serde(default)]
    pub ko_rule: KoRule,
    #[serde(default)]
    pub multi_stone_suicide_legal: bool,
    pub komi: f32,
}

impl Default for Rules {
    fn default() -> Self {
        Rules {
            ko_rule: KoRule::Situational,
            multi_stone_suicide_legal: false,
            komi: 7.5,
        }
    }
}

impl Rules {
    /// Integer komi allows draws, which blurs score estimates on the half-integer grid.
    pub fn result_will_be_integer(&self) -> bool {
        self.komi.fract() == 0.0
    }

    pub fn hash(&self, zobrist: &ZobristTable) -> Hash128 {
        let mut hash = zobrist.ko_rule(self.ko_rule) ^ zobrist.komi(self.komi);
        if self.multi_stone_suicide_legal {
            hash ^= zobrist.multi_stone_suicide();
        }
        hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::BoardDims;
    use test_log::test;

    #[test]
    fn test_integer_komi() {
        let mut rules = Rules::default();
        assert!(!rules.result_will_be_integer());
        rules.komi = 7.0;
        assert!(rules.result_will_be_integer());
    }

    #[test]
    fn test_rules_hash_distinguishes_options() {
        let z = ZobristTable::new(BoardDims::new(5, 5));
        let base = Rules::default();
        let simple = Rules {
            ko_rule: KoRule::Simple,
            ..base
        };
        let suicide = Rules {
            multi_stone_suicide_legal: true,
            ..base
        };
        let komi = Rules { komi: 6.5, ..base };
        assert_ne!(base.hash(&z), simple.hash(&z));
        assert_ne!(base.hash(&z), suicide.hash(&z));
        assert_ne!(base.hash(&z), komi.hash(&z));
    }

    #[test]
    fn test_rules_parse_from_toml() {
        let rules: Rules = toml::from_str("komi = 6.5\nkoRule = \"SIMPLE\"").unwrap();
        assert_eq!(rules.ko_rule, KoRule::Simple);
        assert!(!rules.multi_stone_suicide_legal);
        assert_eq!(rules.komi, 6.5);
    }
}
