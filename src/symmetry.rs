//! The dihedral symmetry group of a rectangular board.
//!
//! A [`Symmetry`] is one of the 8 elements of D4, encoded in three bits: bit 0 flips the y axis,
//! bit 1 flips the x axis and bit 2 transposes, with the transpose applied after the flips.
//! Rectangular boards only admit the 4 transpose-free elements, since transposing would swap the
//! board's dimensions.
//!
//! Most of the book's bookkeeping consists of composing symmetries that map between different
//! orientations of the same position: the orientation a node is stored in, the orientation a
//! caller is looking at it from, the orientation of a child node, and so on. [`Transform`] tags a
//! symmetry with the space it maps *from* and the space it maps *to*, so that
//! [`Transform::then`] only type-checks when the spaces line up.

use serde::{Deserialize, Serialize};
use std::{fmt, marker::PhantomData};

use crate::game::{BoardDims, Loc, Point};

const FLIP_Y: u8 = 0x1;
const FLIP_X: u8 = 0x2;
const TRANSPOSE: u8 = 0x4;

/// Number of elements of the full symmetry group of a square board.
pub const NUM_SYMMETRIES: usize = 8;
/// Number of elements that do not swap the board's axes.
pub const NUM_SYMMETRIES_WITHOUT_TRANSPOSE: usize = 4;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Symmetry(u8);

impl Symmetry {
    pub const IDENTITY: Symmetry = Symmetry(0);

    pub fn new(bits: u8) -> Option<Symmetry> {
        if (bits as usize) < NUM_SYMMETRIES {
            Some(Symmetry(bits))
        } else {
            None
        }
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_transpose(self) -> bool {
        self.0 & TRANSPOSE != 0
    }

    fn flips_x(self) -> bool {
        self.0 & FLIP_X != 0
    }

    fn flips_y(self) -> bool {
        self.0 & FLIP_Y != 0
    }

    /// The symmetry equivalent to applying `self` first and then `next`.
    pub fn compose(self, next: Symmetry) -> Symmetry {
        // Flips that happen after a transpose act on swapped axes.
        let next = if self.is_transpose() {
            (next.0 & TRANSPOSE) | ((next.0 & FLIP_X) >> 1) | ((next.0 & FLIP_Y) << 1)
        } else {
            next.0
        };
        Symmetry(self.0 ^ next)
    }

    pub fn compose3(self, second: Symmetry, third: Symmetry) -> Symmetry {
        self.compose(second).compose(third)
    }

    pub fn invert(self) -> Symmetry {
        match self.0 {
            5 => Symmetry(6),
            6 => Symmetry(5),
            bits => Symmetry(bits),
        }
    }

    /// All symmetries that preserve the board dimensions, identity first.
    pub fn all(dims: BoardDims) -> impl Iterator<Item = Symmetry> {
        let n = if dims.is_square() {
            NUM_SYMMETRIES
        } else {
            NUM_SYMMETRIES_WITHOUT_TRANSPOSE
        };
        (0..n as u8).map(Symmetry)
    }

    /// Map a point of a board with dimensions `dims` (the dimensions before the transform).
    pub fn apply_point(self, point: Point, dims: BoardDims) -> Point {
        let mut x = point.x;
        let mut y = point.y;
        if self.flips_x() {
            x = dims.x_size - x - 1;
        }
        if self.flips_y() {
            y = dims.y_size - y - 1;
        }
        if self.is_transpose() {
            std::mem::swap(&mut x, &mut y);
        }
        Point { x, y }
    }

    pub fn apply(self, loc: Loc, dims: BoardDims) -> Loc {
        match loc {
            Loc::Pass => Loc::Pass,
            Loc::Point(p) => Loc::Point(self.apply_point(p, dims)),
        }
    }

    /// Dimensions of a board after this symmetry is applied to it.
    pub fn apply_dims(self, dims: BoardDims) -> BoardDims {
        if self.is_transpose() {
            BoardDims {
                x_size: dims.y_size,
                y_size: dims.x_size,
            }
        } else {
            dims
        }
    }
}

impl From<Symmetry> for u8 {
    fn from(sym: Symmetry) -> u8 {
        sym.0
    }
}

impl TryFrom<u8> for Symmetry {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        Symmetry::new(bits).ok_or_else(|| format!("symmetry out of range: {bits}"))
    }
}

impl fmt::Display for Symmetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The orientation the book's initial board was supplied in.
#[derive(Debug, Clone, Copy)]
pub enum InitialSpace {}
/// The canonical orientation a node's data is stored in.
#[derive(Debug, Clone, Copy)]
pub enum NodeSpace {}
/// The orientation a caller is viewing a node from.
#[derive(Debug, Clone, Copy)]
pub enum ViewSpace {}
/// The canonical orientation of a child node.
#[derive(Debug, Clone, Copy)]
pub enum ChildSpace {}
/// The orientation of a concrete board history being replayed.
#[derive(Debug, Clone, Copy)]
pub enum HistSpace {}

/// A symmetry known to map positions in space `From` to positions in space `To`.
pub struct Transform<From, To> {
    sym: Symmetry,
    spaces: PhantomData<fn(From) -> To>,
}

impl<From, To> Clone for Transform<From, To> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<From, To> Copy for Transform<From, To> {}

impl<From, To> PartialEq for Transform<From, To> {
    fn eq(&self, other: &Self) -> bool {
        self.sym == other.sym
    }
}

impl<From, To> Eq for Transform<From, To> {}

impl<From, To> fmt::Debug for Transform<From, To> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transform<{}, {}>({})",
            short_name::<From>(),
            short_name::<To>(),
            self.sym
        )
    }
}

fn short_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

impl<From, To> Transform<From, To> {
    /// Assert that `sym` maps `From` to `To`. Every stored symmetry enters the typed world here.
    pub fn new(sym: Symmetry) -> Self {
        Transform {
            sym,
            spaces: PhantomData,
        }
    }

    pub fn symmetry(self) -> Symmetry {
        self.sym
    }

    pub fn then<Next>(self, next: Transform<To, Next>) -> Transform<From, Next> {
        Transform::new(self.sym.compose(next.sym))
    }

    pub fn inverse(self) -> Transform<To, From> {
        Transform::new(self.sym.invert())
    }

    /// Re-label the spaces, for when a space changes role (e.g. a child becomes the current node).
    pub fn relabel<NewFrom, NewTo>(self) -> Transform<NewFrom, NewTo> {
        Transform::new(self.sym)
    }

    pub fn apply(self, loc: Loc, dims: BoardDims) -> Loc {
        self.sym.apply(loc, dims)
    }
}

impl<Space> Transform<Space, Space> {
    pub fn identity() -> Self {
        Transform::new(Symmetry::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn square() -> BoardDims {
        BoardDims::new(5, 5)
    }

    fn all_points(dims: BoardDims) -> Vec<Point> {
        let mut points = Vec::new();
        for y in 0..dims.y_size {
            for x in 0..dims.x_size {
                points.push(Point { x, y });
            }
        }
        points
    }

    #[test]
    fn test_compose_matches_sequential_application() {
        let dims = square();
        for a in Symmetry::all(dims) {
            for b in Symmetry::all(dims) {
                let ab = a.compose(b);
                for p in all_points(dims) {
                    let sequential = b.apply_point(a.apply_point(p, dims), a.apply_dims(dims));
                    assert_eq!(ab.apply_point(p, dims), sequential, "a={a} b={b} p={p:?}");
                }
            }
        }
    }

    #[test]
    fn test_inverse_and_identity() {
        let dims = square();
        for a in Symmetry::all(dims) {
            assert_eq!(a.compose(a.invert()), Symmetry::IDENTITY);
            assert_eq!(a.invert().compose(a), Symmetry::IDENTITY);
            assert_eq!(a.compose(Symmetry::IDENTITY), a);
            assert_eq!(Symmetry::IDENTITY.compose(a), a);
        }
    }

    #[test]
    fn test_associativity() {
        let dims = square();
        for a in Symmetry::all(dims) {
            for b in Symmetry::all(dims) {
                for c in Symmetry::all(dims) {
                    assert_eq!(a.compose(b).compose(c), a.compose(b.compose(c)));
                }
            }
        }
    }

    #[test]
    fn test_rectangular_boards_exclude_transposes() {
        let dims = BoardDims::new(5, 3);
        let syms: Vec<_> = Symmetry::all(dims).collect();
        assert_eq!(syms.len(), NUM_SYMMETRIES_WITHOUT_TRANSPOSE);
        assert!(syms.iter().all(|s| !s.is_transpose()));
        for p in all_points(dims) {
            for s in &syms {
                let q = s.apply_point(p, dims);
                assert!(q.x < dims.x_size && q.y < dims.y_size);
            }
        }
    }

    #[test]
    fn test_typed_transforms_compose_like_symmetries() {
        let a: Transform<NodeSpace, ViewSpace> = Transform::new(Symmetry(5));
        let b: Transform<ViewSpace, HistSpace> = Transform::new(Symmetry(3));
        let ab = a.then(b);
        assert_eq!(ab.symmetry(), Symmetry(5).compose(Symmetry(3)));
        assert_eq!(a.then(a.inverse()), Transform::<NodeSpace, NodeSpace>::identity());
        assert_eq!(Loc::Pass, ab.apply(Loc::Pass, square()));
    }

    #[test]
    fn test_serde_rejects_out_of_range() {
        assert!(serde_json::from_str::<Symmetry>("7").is_ok());
        assert!(serde_json::from_str::<Symmetry>("8").is_err());
    }
}
