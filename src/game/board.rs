use std::{fmt, sync::Arc};

use crate::{
    game::{BoardDims, Color, Loc, Player, Point, ZobristTable},
    hash::Hash128,
    symmetry::Symmetry,
    BookError,
};

/// A Go board: stones, the simple-ko point and an incrementally maintained zobrist hash.
#[derive(Clone)]
pub struct Board {
    dims: BoardDims,
    colors: Vec<Color>,
    ko_point: Option<Point>,
    pos_hash: Hash128,
    zobrist: Arc<ZobristTable>,
}

/// Stones and liberties of one chain.
struct Chain {
    stones: Vec<Point>,
    liberties: Vec<Point>,
}

impl Board {
    pub fn new(zobrist: Arc<ZobristTable>) -> Self {
        let dims = zobrist.dims();
        Board {
            dims,
            colors: vec![Color::Empty; dims.area()],
            ko_point: None,
            pos_hash: zobrist.board_size(),
            zobrist,
        }
    }

    /// Parse rows of `X` (black), `O` (white) and `.` (empty), top row first.
    pub fn from_rows<S: AsRef<str>>(zobrist: Arc<ZobristTable>, rows: &[S]) -> Result<Self, BookError> {
        let mut board = Board::new(zobrist);
        let dims = board.dims;
        if rows.len() != dims.y_size as usize {
            return Err(BookError::Config(format!(
                "expected {} board rows, found {}",
                dims.y_size,
                rows.len()
            )));
        }
        for (y, row) in rows.iter().enumerate() {
            let cells: Vec<char> = row.as_ref().chars().filter(|c| !c.is_whitespace()).collect();
            if cells.len() != dims.x_size as usize {
                return Err(BookError::Config(format!(
                    "board row {y} has {} cells, expected {}",
                    cells.len(),
                    dims.x_size
                )));
            }
            for (x, c) in cells.into_iter().enumerate() {
                let color = Color::from_char(c)
                    .ok_or_else(|| BookError::Config(format!("invalid board character '{c}'")))?;
                board.set_stone(Point::new(x as u8, y as u8), color);
            }
        }
        Ok(board)
    }

    pub fn to_rows(&self) -> Vec<String> {
        (0..self.dims.y_size)
            .map(|y| {
                (0..self.dims.x_size)
                    .map(|x| self.color(Point::new(x, y)).to_char())
                    .collect()
            })
            .collect()
    }

    pub fn dims(&self) -> BoardDims {
        self.dims
    }

    pub fn zobrist(&self) -> &Arc<ZobristTable> {
        &self.zobrist
    }

    pub fn color(&self, p: Point) -> Color {
        self.colors[self.dims.index(p)]
    }

    pub fn ko_point(&self) -> Option<Point> {
        self.ko_point
    }

    /// Zobrist hash of the stones and the board size. Excludes ko and the player to move.
    pub fn pos_hash(&self) -> Hash128 {
        self.pos_hash
    }

    /// A second, independent hash of every point's contents.
    pub fn structural_hash(&self) -> Hash128 {
        self.dims
            .points()
            .fold(Hash128::ZERO, |acc, p| acc ^ self.zobrist.structure(p, self.color(p)))
    }

    pub fn is_empty(&self) -> bool {
        self.colors.iter().all(|c| *c == Color::Empty)
    }

    pub fn num_stones(&self) -> usize {
        self.colors.iter().filter(|c| **c != Color::Empty).count()
    }

    /// Overwrite a point, keeping the hash consistent. Clears any ko prohibition.
    pub fn set_stone(&mut self, p: Point, color: Color) {
        let idx = self.dims.index(p);
        self.pos_hash ^= self.zobrist.stone(p, self.colors[idx]);
        self.colors[idx] = color;
        self.pos_hash ^= self.zobrist.stone(p, color);
        self.ko_point = None;
    }

    pub fn clear_ko(&mut self) {
        self.ko_point = None;
    }

    fn remove_stone(&mut self, p: Point) {
        let idx = self.dims.index(p);
        self.pos_hash ^= self.zobrist.stone(p, self.colors[idx]);
        self.colors[idx] = Color::Empty;
    }

    fn chain(&self, start: Point) -> Chain {
        let color = self.color(start);
        let mut seen = vec![false; self.dims.area()];
        let mut liberty_seen = vec![false; self.dims.area()];
        let mut stones = Vec::new();
        let mut liberties = Vec::new();
        let mut stack = vec![start];
        seen[self.dims.index(start)] = true;
        while let Some(p) = stack.pop() {
            stones.push(p);
            for q in self.dims.neighbors(p) {
                let qi = self.dims.index(q);
                let qc = self.colors[qi];
                if qc == color && !seen[qi] {
                    seen[qi] = true;
                    stack.push(q);
                } else if qc == Color::Empty && !liberty_seen[qi] {
                    liberty_seen[qi] = true;
                    liberties.push(q);
                }
            }
        }
        Chain { stones, liberties }
    }

    pub fn chain_size(&self, p: Point) -> usize {
        self.chain(p).stones.len()
    }

    pub fn num_liberties(&self, p: Point) -> usize {
        self.chain(p).liberties.len()
    }

    pub fn is_ko_banned(&self, loc: Loc) -> bool {
        matches!((loc, self.ko_point), (Loc::Point(p), Some(ko)) if p == ko)
    }

    pub fn is_on_board(&self, loc: Loc) -> bool {
        match loc {
            Loc::Pass => true,
            Loc::Point(p) => self.dims.contains(p),
        }
    }

    /// Legality ignoring the simple-ko prohibition. Single-stone suicide is never legal.
    pub fn is_legal_ignoring_ko(&self, loc: Loc, pla: Player, multi_stone_suicide_legal: bool) -> bool {
        let p = match loc {
            Loc::Pass => return true,
            Loc::Point(p) => p,
        };
        if !self.dims.contains(p) || self.color(p) != Color::Empty {
            return false;
        }
        let own = pla.color();
        let opp = pla.opp().color();
        let mut has_own_neighbor = false;
        for q in self.dims.neighbors(p) {
            match self.color(q) {
                Color::Empty => return true,
                c if c == own => {
                    has_own_neighbor = true;
                    if self.num_liberties(q) > 1 {
                        return true;
                    }
                }
                c if c == opp => {
                    if self.num_liberties(q) == 1 {
                        return true;
                    }
                }
                _ => {}
            }
        }
        multi_stone_suicide_legal && has_own_neighbor
    }

    pub fn is_legal(&self, loc: Loc, pla: Player, multi_stone_suicide_legal: bool) -> bool {
        !self.is_ko_banned(loc) && self.is_legal_ignoring_ko(loc, pla, multi_stone_suicide_legal)
    }

    /// Play a move that the caller has already checked, resolving captures, suicide and ko.
    pub fn play_assume_legal(&mut self, loc: Loc, pla: Player) {
        let p = match loc {
            Loc::Pass => {
                self.ko_point = None;
                return;
            }
            Loc::Point(p) => p,
        };
        let idx = self.dims.index(p);
        self.colors[idx] = pla.color();
        self.pos_hash ^= self.zobrist.stone(p, pla.color());

        let opp = pla.opp().color();
        let mut captured: Vec<Point> = Vec::new();
        let neighbors: Vec<Point> = self.dims.neighbors(p).collect();
        for q in neighbors {
            if self.color(q) == opp {
                let chain = self.chain(q);
                if chain.liberties.is_empty() {
                    for s in chain.stones {
                        self.remove_stone(s);
                        captured.push(s);
                    }
                }
            }
        }

        let own_chain = self.chain(p);
        if own_chain.liberties.is_empty() {
            for s in own_chain.stones {
                self.remove_stone(s);
            }
            self.ko_point = None;
            return;
        }

        self.ko_point = match captured.as_slice() {
            [single] if own_chain.stones.len() == 1 && own_chain.liberties.len() == 1 => Some(*single),
            _ => None,
        };
    }

    /// A copy of this board with `sym` applied to every stone and to the ko point.
    pub fn transformed(&self, sym: Symmetry) -> Board {
        let mut board = Board::new(self.zobrist.clone());
        debug_assert_eq!(sym.apply_dims(self.dims), board.dims);
        for p in self.dims.points() {
            let color = self.color(p);
            if color != Color::Empty {
                board.set_stone(sym.apply_point(p, self.dims), color);
            }
        }
        board.ko_point = self.ko_point.map(|ko| sym.apply_point(ko, self.dims));
        board
    }

    /// For a move just played at `loc`: whether the played chain plus the empty regions it
    /// touches hold more than `bound` points. Always false for passes.
    pub fn simple_repetition_bound_gt(&self, loc: Loc, bound: u32) -> bool {
        let p = match loc {
            Loc::Pass => return false,
            Loc::Point(p) => p,
        };
        let bound = bound as usize;
        let mut counted = vec![false; self.dims.area()];
        let mut count = 0;

        if self.color(p) == Color::Empty {
            // The move was a suicide, so only the region it emptied matters.
            return self.count_empty_region(p, &mut counted, &mut count, bound);
        }

        let chain = self.chain(p);
        count += chain.stones.len();
        if count + chain.liberties.len() > bound {
            return true;
        }
        for lib in chain.liberties {
            if self.count_empty_region(lib, &mut counted, &mut count, bound) {
                return true;
            }
        }
        false
    }

    fn count_empty_region(&self, start: Point, counted: &mut [bool], count: &mut usize, bound: usize) -> bool {
        let si = self.dims.index(start);
        if counted[si] {
            return false;
        }
        counted[si] = true;
        let mut stack = vec![start];
        while let Some(p) = stack.pop() {
            *count += 1;
            if *count > bound {
                return true;
            }
            for q in self.dims.neighbors(p) {
                let qi = self.dims.index(q);
                if !counted[qi] && self.colors[qi] == Color::Empty {
                    counted[qi] = true;
                    stack.push(q);
                }
            }
        }
        false
    }
}

impl PartialEq for Board {
    fn eq(&self, other: &Self) -> bool {
        self.dims == other.dims && self.colors == other.colors && self.ko_point == other.ko_point
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Board({}, ko={:?})", self.dims, self.ko_point)?;
        for row in self.to_rows() {
            writeln!(f, "{row}")?;
        }
        Ok(())
    }
}
