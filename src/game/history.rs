use serde::{Deserialize, Serialize};

use super::zobrist::GAME_IS_OVER;
use crate::{
    game::{Board, Color, KoRule, Loc, Player, Point, Rules},
    hash::Hash128,
    symmetry::Symmetry,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub loc: Loc,
    pub pla: Player,
}

impl Move {
    pub fn new(loc: Loc, pla: Player) -> Self {
        Move { loc, pla }
    }
}

/// A game from a fixed starting position: the moves played, the current board and whose turn
/// it is, plus the bookkeeping needed for superko and game end.
#[derive(Clone, Debug)]
pub struct BoardHistory {
    rules: Rules,
    initial_board: Board,
    initial_pla: Player,
    moves: Vec<Move>,
    board: Board,
    next_pla: Player,
    consecutive_passes: u32,
    finished: bool,
    /// Position hash with the player to move, for every position reached so far.
    ko_hashes: Vec<Hash128>,
    /// Points the player to move may not play because of situational superko.
    superko_banned: Vec<bool>,
}

impl BoardHistory {
    pub fn new(rules: Rules, board: Board, next_pla: Player) -> Self {
        let area = board.dims().area();
        let mut hist = BoardHistory {
            rules,
            initial_board: board.clone(),
            initial_pla: next_pla,
            moves: Vec::new(),
            board,
            next_pla,
            consecutive_passes: 0,
            finished: false,
            ko_hashes: Vec::new(),
            superko_banned: vec![false; area],
        };
        hist.ko_hashes.push(hist.ko_hash(&hist.board, next_pla));
        hist
    }

    /// A fresh history starting from this history's initial position transformed by `sym`.
    pub fn transformed_initial(&self, sym: Symmetry) -> BoardHistory {
        BoardHistory::new(self.rules, self.initial_board.transformed(sym), self.initial_pla)
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn initial_board(&self) -> &Board {
        &self.initial_board
    }

    pub fn initial_pla(&self) -> Player {
        self.initial_pla
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn next_pla(&self) -> Player {
        self.next_pla
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn consecutive_passes(&self) -> u32 {
        self.consecutive_passes
    }

    fn ko_hash(&self, board: &Board, next_pla: Player) -> Hash128 {
        board.pos_hash() ^ board.zobrist().player(next_pla)
    }

    fn is_superko_banned(&self, loc: Loc) -> bool {
        match loc {
            Loc::Pass => false,
            Loc::Point(p) => self.superko_banned[self.board.dims().index(p)],
        }
    }

    /// Legal for `pla` under the full rules. Nothing is legal once the game has ended.
    pub fn is_legal(&self, loc: Loc, pla: Player) -> bool {
        !self.finished
            && self.board.is_legal(loc, pla, self.rules.multi_stone_suicide_legal)
            && !self.is_superko_banned(loc)
    }

    /// Accepts anything that can physically be played: ignores superko, allows suicide and
    /// allows moves after the game has ended. Only simple ko and occupied points are rejected.
    pub fn is_legal_tolerant(&self, loc: Loc, pla: Player) -> bool {
        self.board.is_on_board(loc) && self.board.is_legal(loc, pla, true)
    }

    pub fn play_assume_legal(&mut self, loc: Loc, pla: Player) {
        self.board.play_assume_legal(loc, pla);
        self.moves.push(Move::new(loc, pla));
        self.next_pla = pla.opp();

        if loc.is_pass() {
            self.consecutive_passes += 1;
            if self.consecutive_passes >= 2 {
                self.finished = true;
            }
        } else {
            self.consecutive_passes = 0;
        }

        let hash = self.ko_hash(&self.board, self.next_pla);
        self.ko_hashes.push(hash);
        self.update_superko_bans();
    }

    fn update_superko_bans(&mut self) {
        let dims = self.board.dims();
        let next = self.next_pla;
        let msl = self.rules.multi_stone_suicide_legal;
        let mut banned = vec![false; dims.area()];
        if self.rules.ko_rule == KoRule::Situational {
            for p in dims.points() {
                let loc = Loc::Point(p);
                if self.board.color(p) != Color::Empty || !self.board.is_legal(loc, next, msl) {
                    continue;
                }
                let mut after = self.board.clone();
                after.play_assume_legal(loc, next);
                let hash = self.ko_hash(&after, next.opp());
                banned[dims.index(p)] = self.ko_hashes.contains(&hash);
            }
        }
        self.superko_banned = banned;
    }

    /// Hash of everything that determines the future of the game from here: stones, player to
    /// move, ko and superko prohibitions, the rules and whether the game is over.
    pub fn situation_rules_and_ko_hash(&self) -> Hash128 {
        let zobrist = self.board.zobrist();
        let mut hash = self.board.pos_hash() ^ zobrist.player(self.next_pla);
        let ko_point = self.board.ko_point();
        if let Some(ko) = ko_point {
            hash ^= zobrist.ko_point(ko);
        }
        for p in self.board.dims().points() {
            if self.superko_banned[self.board.dims().index(p)] && Some(p) != ko_point {
                hash ^= zobrist.ko_point(p);
            }
        }
        hash ^= self.rules.hash(zobrist);
        if self.finished {
            hash ^= GAME_IS_OVER;
        }
        hash
    }

    /// Points currently forbidden to the player to move by superko.
    pub fn superko_banned_points(&self) -> Vec<Point> {
        self.board
            .dims()
            .points()
            .filter(|p| self.superko_banned[self.board.dims().index(*p)])
            .collect()
    }
}
