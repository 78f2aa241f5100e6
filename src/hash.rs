//! Position identity for the book.
//!
//! A [`BookHash`] pairs a `state_hash` (everything that determines the future of the game:
//! stones, player to move, ko state, rules and whether the game is over) with a `history_hash`
//! (a mixed accumulation of the positions passed through since the last move that could not be
//! part of a short repetition cycle, plus an independent structural hash of the board).
//! Identical positions reached through histories that differ in ways that could matter for
//! repetition therefore get distinct hashes, while ordinary transpositions merge.
//!
//! [`canonicalize`] computes the hash for every symmetry of the board and keeps the smallest,
//! so that symmetric positions share one node.

use std::{
    fmt,
    ops::{BitXor, BitXorAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    game::BoardHistory,
    symmetry::{Symmetry, NUM_SYMMETRIES},
    BookError,
};

/// Number of buckets the book's node index is split into.
pub const NUM_HASH_BUCKETS: usize = 2048;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash128 {
    pub hash0: u64,
    pub hash1: u64,
}

impl Hash128 {
    pub const ZERO: Hash128 = Hash128 { hash0: 0, hash1: 0 };

    pub const fn new(hash0: u64, hash1: u64) -> Self {
        Hash128 { hash0, hash1 }
    }

    fn to_bytes(self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&self.hash1.to_be_bytes());
        bytes[8..].copy_from_slice(&self.hash0.to_be_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, BookError> {
        let word = |range: std::ops::Range<usize>| -> Result<u64, BookError> {
            let raw: [u8; 8] = bytes
                .get(range)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| BookError::MalformedHash(format!("expected 16 bytes, found {}", bytes.len())))?;
            Ok(u64::from_be_bytes(raw))
        };
        Ok(Hash128::new(word(8..16)?, word(0..8)?))
    }
}

impl BitXor for Hash128 {
    type Output = Hash128;

    fn bitxor(self, rhs: Hash128) -> Hash128 {
        Hash128::new(self.hash0 ^ rhs.hash0, self.hash1 ^ rhs.hash1)
    }
}

impl BitXorAssign for Hash128 {
    fn bitxor_assign(&mut self, rhs: Hash128) {
        self.hash0 ^= rhs.hash0;
        self.hash1 ^= rhs.hash1;
    }
}

impl fmt::Display for Hash128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

pub fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Pelle Evensen's NASAM mixer.
pub fn nasam(x: u64) -> u64 {
    let mut v = x;
    v ^= v.rotate_right(25) ^ v.rotate_right(47);
    v = v.wrapping_mul(0x9e6c_63d0_676a_9a99);
    v ^= (v >> 23) ^ (v >> 51);
    v = v.wrapping_mul(0x9e6d_62d0_6f6a_9a9b);
    v ^= (v >> 23) ^ (v >> 51);
    v
}

/// MurmurHash3 64-bit finalizer.
pub fn murmur_mix(x: u64) -> u64 {
    let mut k = x;
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

/// Identity of a book node. Orders by `state_hash` first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BookHash {
    pub state_hash: Hash128,
    pub history_hash: Hash128,
}

impl BookHash {
    pub fn new(history_hash: Hash128, state_hash: Hash128) -> Self {
        BookHash {
            state_hash,
            history_hash,
        }
    }

    /// Index of the bucket this hash is stored under.
    pub fn bucket(&self) -> usize {
        (self.state_hash.hash0 % NUM_HASH_BUCKETS as u64) as usize
    }
}

impl fmt::Display for BookHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.state_hash, self.history_hash)
    }
}

impl TryFrom<&str> for BookHash {
    type Error = BookError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.len() != 64 {
            return Err(BookError::MalformedHash(format!(
                "expected 64 hex characters, found {}: {value}",
                value.len()
            )));
        }
        let bytes = hex::decode(value).map_err(|e| BookError::MalformedHash(format!("{e}: {value}")))?;
        Ok(BookHash {
            state_hash: Hash128::from_bytes(&bytes[..16])?,
            history_hash: Hash128::from_bytes(&bytes[16..])?,
        })
    }
}

impl TryFrom<String> for BookHash {
    type Error = BookError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        BookHash::try_from(value.as_str())
    }
}

impl FromStr for BookHash {
    type Err = BookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookHash::try_from(s)
    }
}

impl From<BookHash> for String {
    fn from(hash: BookHash) -> String {
        hash.to_string()
    }
}

/// The result of canonicalizing a position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Canonical {
    /// Smallest hash over all orientations of the position.
    pub hash: BookHash,
    /// Maps the orientation of the supplied history to the canonical orientation.
    pub symmetry_to_align: Symmetry,
    /// Every symmetry of the canonical orientation that leaves the hash unchanged.
    pub symmetries: Vec<Symmetry>,
}

/// Hash the position reached by `hist`, under every symmetry of the board, and pick the
/// orientation with the smallest hash.
///
/// The history accumulator folds in each position passed through together with the player who
/// moved from it, and restarts from zero whenever a move's played chain plus the empty regions
/// it touches exceed `rep_bound` points, since no short repetition cycle can run through such a
/// move.
pub fn canonicalize(hist: &BoardHistory, rep_bound: u32) -> Canonical {
    let dims = hist.initial_board().dims();
    let symmetries: Vec<Symmetry> = Symmetry::all(dims).collect();

    let mut hashes = [BookHash::default(); NUM_SYMMETRIES];
    for sym in &symmetries {
        let mut sym_hist = hist.transformed_initial(*sym);
        let mut accum = Hash128::ZERO;
        for mv in hist.moves() {
            let loc = sym.apply(mv.loc, dims);
            let board = sym_hist.board();
            let next = board.pos_hash() ^ board.zobrist().player(mv.pla);
            accum.hash0 = splitmix64(accum.hash0.wrapping_add(next.hash0));
            accum.hash1 = nasam(accum.hash1.wrapping_add(next.hash1));

            sym_hist.play_assume_legal(loc, mv.pla);
            if sym_hist.board().simple_repetition_bound_gt(loc, rep_bound) {
                accum = Hash128::ZERO;
            }
        }
        hashes[sym.bits() as usize] = BookHash::new(
            accum ^ sym_hist.board().structural_hash(),
            sym_hist.situation_rules_and_ko_hash(),
        );
    }

    let mut smallest = Symmetry::IDENTITY;
    for sym in &symmetries {
        if hashes[sym.bits() as usize] < hashes[smallest.bits() as usize] {
            smallest = *sym;
        }
    }
    let smallest_hash = hashes[smallest.bits() as usize];
    let stabilizer = symmetries
        .iter()
        .copied()
        .filter(|s| hashes[smallest.compose(*s).bits() as usize] == smallest_hash)
        .collect();

    Canonical {
        hash: smallest_hash,
        symmetry_to_align: smallest,
        symmetries: stabilizer,
    }
}
