use serde::{Deserialize, Serialize};
use std::fmt;

use crate::BookError;

/// Largest supported edge length. Only bounds GTP coordinates; no hash depends on it.
pub const MAX_BOARD_LEN: u8 = 25;

const GTP_COLUMNS: &[u8] = b"ABCDEFGHJKLMNOPQRSTUVWXYZ";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardDims {
    pub x_size: u8,
    pub y_size: u8,
}

impl BoardDims {
    pub fn new(x_size: u8, y_size: u8) -> Self {
        BoardDims { x_size, y_size }
    }

    pub fn is_square(&self) -> bool {
        self.x_size == self.y_size
    }

    pub fn area(&self) -> usize {
        self.x_size as usize * self.y_size as usize
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x < self.x_size && p.y < self.y_size
    }

    pub fn index(&self, p: Point) -> usize {
        p.y as usize * self.x_size as usize + p.x as usize
    }

    pub fn points(&self) -> impl Iterator<Item = Point> {
        let (x_size, y_size) = (self.x_size, self.y_size);
        (0..y_size).flat_map(move |y| (0..x_size).map(move |x| Point { x, y }))
    }

    /// Orthogonal neighbors of `p` that lie on the board.
    pub fn neighbors(&self, p: Point) -> impl Iterator<Item = Point> {
        let dims = *self;
        let candidates = [
            (p.x.checked_sub(1), Some(p.y)),
            (p.x.checked_add(1), Some(p.y)),
            (Some(p.x), p.y.checked_sub(1)),
            (Some(p.x), p.y.checked_add(1)),
        ];
        candidates.into_iter().filter_map(move |c| match c {
            (Some(x), Some(y)) if dims.contains(Point { x, y }) => Some(Point { x, y }),
            _ => None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: u8,
    pub y: u8,
}

impl Point {
    pub fn new(x: u8, y: u8) -> Self {
        Point { x, y }
    }
}

/// Row-major, so that maps keyed by location iterate in board order.
impl Ord for Point {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A move location: a point on the board, or a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Loc {
    Pass,
    Point(Point),
}

impl Loc {
    pub fn at(x: u8, y: u8) -> Loc {
        Loc::Point(Point { x, y })
    }

    pub fn point(self) -> Option<Point> {
        match self {
            Loc::Pass => None,
            Loc::Point(p) => Some(p),
        }
    }

    pub fn is_pass(self) -> bool {
        matches!(self, Loc::Pass)
    }

    /// GTP-style coordinate: column letter (skipping `I`) then row counted from the bottom.
    pub fn to_gtp(self, dims: BoardDims) -> String {
        match self {
            Loc::Pass => "pass".to_string(),
            Loc::Point(p) => {
                let column = GTP_COLUMNS
                    .get(p.x as usize)
                    .map(|c| *c as char)
                    .unwrap_or('?');
                format!("{}{}", column, dims.y_size as i32 - p.y as i32)
            }
        }
    }

    pub fn from_gtp(s: &str, dims: BoardDims) -> Result<Loc, BookError> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("pass") {
            return Ok(Loc::Pass);
        }
        let malformed = || BookError::MalformedLoc(format!("'{s}' on a {dims} board"));
        let mut chars = s.chars();
        let column = chars.next().ok_or_else(malformed)?.to_ascii_uppercase();
        let x = GTP_COLUMNS
            .iter()
            .position(|c| *c as char == column)
            .ok_or_else(malformed)?;
        let row: u32 = chars.as_str().parse().map_err(|_| malformed())?;
        if row == 0 || row > dims.y_size as u32 || x >= dims.x_size as usize {
            return Err(malformed());
        }
        let y = dims.y_size as u32 - row;
        Ok(Loc::at(x as u8, y as u8))
    }
}

impl fmt::Display for BoardDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x_size, self.y_size)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Player {
    Black,
    White,
}

impl Player {
    pub fn opp(self) -> Player {
        match self {
            Player::Black => Player::White,
            Player::White => Player::Black,
        }
    }

    /// Values in the book are from White's perspective, so White maximizes.
    pub fn is_maximizing(self) -> bool {
        self == Player::White
    }

    pub fn color(self) -> Color {
        match self {
            Player::Black => Color::Black,
            Player::White => Color::White,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::Black => write!(f, "Black"),
            Player::White => write!(f, "White"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    #[default]
    Empty,
    Black,
    White,
}

impl Color {
    pub fn player(self) -> Option<Player> {
        match self {
            Color::Empty => None,
            Color::Black => Some(Player::Black),
            Color::White => Some(Player::White),
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Color::Empty => '.',
            Color::Black => 'X',
            Color::White => 'O',
        }
    }

    pub fn from_char(c: char) -> Option<Color> {
        match c {
            '.' | '+' => Some(Color::Empty),
            'X' | 'x' => Some(Color::Black),
            'O' | 'o' => Some(Color::White),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_gtp_coordinates() {
        let dims = BoardDims::new(9, 9);
        assert_eq!(Loc::at(0, 8).to_gtp(dims), "A1");
        assert_eq!(Loc::at(8, 0).to_gtp(dims), "J9");
        assert_eq!(Loc::from_gtp("a1", dims).unwrap(), Loc::at(0, 8));
        assert_eq!(Loc::from_gtp("PASS", dims).unwrap(), Loc::Pass);
        assert!(Loc::from_gtp("I5", dims).is_err());
        assert!(Loc::from_gtp("A10", dims).is_err());
        assert!(Loc::from_gtp("", dims).is_err());
        for p in dims.points() {
            let loc = Loc::Point(p);
            assert_eq!(Loc::from_gtp(&loc.to_gtp(dims), dims).unwrap(), loc);
        }
    }

    #[test]
    fn test_neighbors_stay_on_board() {
        let dims = BoardDims::new(3, 2);
        assert_eq!(dims.neighbors(Point::new(0, 0)).count(), 2);
        assert_eq!(dims.neighbors(Point::new(1, 0)).count(), 3);
        assert_eq!(dims.neighbors(Point::new(2, 1)).count(), 2);
    }
}
