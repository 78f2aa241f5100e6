use crate::{
    game::{BoardDims, Color, KoRule, Player, Point},
    hash::{murmur_mix, splitmix64, Hash128},
};

const SEED: u64 = 0x6f70_656e_626f_6f6b;

const TAG_STONE: u64 = 1;
const TAG_STRUCTURE: u64 = 2;
const TAG_KO_POINT: u64 = 3;
const TAG_PLAYER: u64 = 4;
const TAG_SIZE_X: u64 = 5;
const TAG_SIZE_Y: u64 = 6;
const TAG_KO_RULE: u64 = 7;
const TAG_SUICIDE: u64 = 8;
const TAG_KOMI: u64 = 9;

/// Fixed marker folded into a situation hash once the game has ended.
pub const GAME_IS_OVER: Hash128 = Hash128::new(0xb6f9_e465_597a_77ee, 0xf1d5_83d9_60a4_ce7f);

/// Zobrist keys for one board size.
///
/// Every key is a pure function of a fixed seed and the coordinates or value it encodes, so two
/// tables built for different board sizes agree on every key they share, and building the same
/// table twice gives the same table. Construct once and share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZobristTable {
    dims: BoardDims,
    stones: Vec<[Hash128; 2]>,
    structure: Vec<[Hash128; 3]>,
    ko_points: Vec<Hash128>,
    players: [Hash128; 2],
    size: Hash128,
}

fn derive(tag: u64, a: u64, b: u64) -> Hash128 {
    let h0 = splitmix64(SEED ^ splitmix64(tag ^ splitmix64(a.wrapping_add(splitmix64(b)))));
    let h1 = splitmix64(h0 ^ splitmix64(tag.wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ a ^ (b << 32)));
    Hash128::new(h0, h1)
}

fn color_index(color: Color) -> u64 {
    match color {
        Color::Empty => 0,
        Color::Black => 1,
        Color::White => 2,
    }
}

fn coord_key(p: Point) -> u64 {
    ((p.x as u64) << 8) | p.y as u64
}

impl ZobristTable {
    pub fn new(dims: BoardDims) -> Self {
        let mut stones = Vec::with_capacity(dims.area());
        let mut structure = Vec::with_capacity(dims.area());
        let mut ko_points = Vec::with_capacity(dims.area());
        for p in dims.points() {
            let key = coord_key(p);
            stones.push([
                derive(TAG_STONE, key, color_index(Color::Black)),
                derive(TAG_STONE, key, color_index(Color::White)),
            ]);
            structure.push([Color::Empty, Color::Black, Color::White].map(|c| {
                let h = derive(TAG_STRUCTURE, key, color_index(c));
                Hash128::new(murmur_mix(h.hash0), splitmix64(h.hash1))
            }));
            ko_points.push(derive(TAG_KO_POINT, key, 0));
        }
        ZobristTable {
            dims,
            stones,
            structure,
            ko_points,
            players: [
                derive(TAG_PLAYER, 1, 0),
                derive(TAG_PLAYER, 2, 0),
            ],
            size: derive(TAG_SIZE_X, dims.x_size as u64, 0)
                ^ derive(TAG_SIZE_Y, dims.y_size as u64, 0),
        }
    }

    pub fn dims(&self) -> BoardDims {
        self.dims
    }

    /// Key for a stone of `color` at `p`; empty points contribute nothing.
    pub fn stone(&self, p: Point, color: Color) -> Hash128 {
        let idx = self.dims.index(p);
        match color {
            Color::Empty => Hash128::ZERO,
            Color::Black => self.stones[idx][0],
            Color::White => self.stones[idx][1],
        }
    }

    /// Independent key set used for the structural board hash, including empty points.
    pub fn structure(&self, p: Point, color: Color) -> Hash128 {
        self.structure[self.dims.index(p)][color_index(color) as usize]
    }

    pub fn ko_point(&self, p: Point) -> Hash128 {
        self.ko_points[self.dims.index(p)]
    }

    pub fn player(&self, pla: Player) -> Hash128 {
        match pla {
            Player::Black => self.players[0],
            Player::White => self.players[1],
        }
    }

    pub fn board_size(&self) -> Hash128 {
        self.size
    }

    pub fn ko_rule(&self, rule: KoRule) -> Hash128 {
        match rule {
            KoRule::Simple => Hash128::ZERO,
            KoRule::Situational => derive(TAG_KO_RULE, 1, 0),
        }
    }

    pub fn multi_stone_suicide(&self) -> Hash128 {
        derive(TAG_SUICIDE, 1, 0)
    }

    /// Komi is hashed in half-point units.
    pub fn komi(&self, komi: f32) -> Hash128 {
        derive(TAG_KOMI, (komi as f64 * 2.0).round() as i64 as u64, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_tables_are_reproducible() {
        let dims = BoardDims::new(7, 7);
        assert_eq!(ZobristTable::new(dims), ZobristTable::new(dims));
    }

    #[test]
    fn test_keys_do_not_depend_on_board_size() {
        let small = ZobristTable::new(BoardDims::new(5, 5));
        let large = ZobristTable::new(BoardDims::new(9, 7));
        let p = Point::new(3, 2);
        assert_eq!(small.stone(p, Color::Black), large.stone(p, Color::Black));
        assert_eq!(small.structure(p, Color::Empty), large.structure(p, Color::Empty));
        assert_eq!(small.player(Player::White), large.player(Player::White));
        assert_ne!(small.board_size(), large.board_size());
    }

    #[test]
    fn test_keys_are_distinct() {
        let table = ZobristTable::new(BoardDims::new(5, 5));
        let p = Point::new(1, 1);
        let q = Point::new(1, 2);
        assert_ne!(table.stone(p, Color::Black), table.stone(p, Color::White));
        assert_ne!(table.stone(p, Color::Black), table.stone(q, Color::Black));
        assert_eq!(table.stone(p, Color::Empty), Hash128::ZERO);
        assert_ne!(table.player(Player::Black), table.player(Player::White));
    }
}
