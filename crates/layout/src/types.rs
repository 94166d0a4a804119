use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use crate::graph::EdgeId;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// A point in layout space. Also used for force and displacement vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Position) -> f64 {
        (other - self).length()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Position {
    fn add_assign(&mut self, rhs: Position) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Position {
    fn sub_assign(&mut self, rhs: Position) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f64> for Position {
    type Output = Position;

    fn mul(self, rhs: f64) -> Position {
        Position::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Position {
    type Output = Position;

    fn neg(self) -> Position {
        Position::new(-self.x, -self.y)
    }
}

/// Which screen axis carries the hierarchy levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    /// Levels grow downwards along y; x is the orthogonal axis.
    #[default]
    TopDown,
    /// Levels grow rightwards along x; y is the orthogonal axis.
    LeftRight,
}

impl Direction {
    /// Coordinate along the hierarchy axis.
    pub fn primary(self, p: Position) -> f64 {
        match self {
            Direction::TopDown => p.y,
            Direction::LeftRight => p.x,
        }
    }

    /// Coordinate along the orthogonal axis.
    pub fn cross(self, p: Position) -> f64 {
        match self {
            Direction::TopDown => p.x,
            Direction::LeftRight => p.y,
        }
    }

    pub fn compose(self, primary: f64, cross: f64) -> Position {
        match self {
            Direction::TopDown => Position::new(cross, primary),
            Direction::LeftRight => Position::new(primary, cross),
        }
    }

    pub fn with_primary(self, p: Position, primary: f64) -> Position {
        self.compose(primary, self.cross(p))
    }

    pub fn with_cross(self, p: Position, cross: f64) -> Position {
        self.compose(self.primary(p), cross)
    }

    pub fn primary_extent(self, size: Size) -> f64 {
        match self {
            Direction::TopDown => size.height,
            Direction::LeftRight => size.width,
        }
    }

    pub fn cross_extent(self, size: Size) -> f64 {
        match self {
            Direction::TopDown => size.width,
            Direction::LeftRight => size.height,
        }
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn around(center: Position, half_width: f64, half_height: f64) -> Self {
        Self {
            min_x: center.x - half_width,
            min_y: center.y - half_height,
            max_x: center.x + half_width,
            max_y: center.y + half_height,
        }
    }

    /// Smallest box holding every point, `None` when there are no points.
    pub fn enclosing<I: IntoIterator<Item = Position>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Bounds::around(first, 0.0, 0.0);
        for p in iter {
            bounds.include(p);
        }
        Some(bounds)
    }

    pub fn include(&mut self, p: Position) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Interiors intersect. Boxes sharing only an edge do not overlap.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    /// True when the segment `a`-`b` passes through the interior of the box.
    pub fn intersects_segment(&self, a: Position, b: Position) -> bool {
        let d = b - a;
        let mut t0 = 0.0_f64;
        let mut t1 = 1.0_f64;
        // Liang-Barsky clipping against the four slabs.
        let slabs = [
            (-d.x, a.x - self.min_x),
            (d.x, self.max_x - a.x),
            (-d.y, a.y - self.min_y),
            (d.y, self.max_y - a.y),
        ];
        for (p, q) in slabs {
            if p == 0.0 {
                if q <= 0.0 {
                    return false;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r >= t1 {
                    return false;
                }
                t0 = t0.max(r);
            } else {
                if r <= t0 {
                    return false;
                }
                t1 = t1.min(r);
            }
        }
        t1 - t0 > 1e-9
    }
}

/// Output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResult {
    pub positions: BTreeMap<String, Position>,
    pub edge_paths: BTreeMap<EdgeId, Vec<Position>>,
    pub levels: BTreeMap<String, usize>,
    pub feedback_edges: Vec<EdgeId>,
    pub iterations_run: usize,
    pub converged: bool,
    pub importance_applied: bool,
    pub cancelled: bool,
    pub divergence_resets: usize,
    pub canvas: Bounds,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Bounds {
        Bounds::around(Position::new(0.0, 0.0), 1.0, 1.0)
    }

    #[test]
    fn test_segment_through_box() {
        let b = unit_box();
        assert!(b.intersects_segment(Position::new(-5.0, 0.0), Position::new(5.0, 0.0)));
        assert!(b.intersects_segment(Position::new(-5.0, -5.0), Position::new(5.0, 5.0)));
    }

    #[test]
    fn test_segment_missing_box() {
        let b = unit_box();
        assert!(!b.intersects_segment(Position::new(-5.0, 3.0), Position::new(5.0, 3.0)));
        assert!(!b.intersects_segment(Position::new(2.0, -5.0), Position::new(2.0, 5.0)));
        // stops short
        assert!(!b.intersects_segment(Position::new(-5.0, 0.0), Position::new(-2.0, 0.0)));
    }

    #[test]
    fn test_segment_touching_boundary_is_not_a_hit() {
        let b = unit_box();
        assert!(!b.intersects_segment(Position::new(-5.0, 1.0), Position::new(5.0, 1.0)));
        assert!(!b.intersects_segment(Position::new(1.0, -5.0), Position::new(1.0, 5.0)));
    }

    #[test]
    fn test_overlap_is_strict() {
        let a = unit_box();
        let touching = Bounds::around(Position::new(2.0, 0.0), 1.0, 1.0);
        let crossing = Bounds::around(Position::new(1.5, 0.5), 1.0, 1.0);
        assert!(!a.overlaps(&touching));
        assert!(a.overlaps(&crossing));
    }

    #[test]
    fn test_direction_axes() {
        let p = Position::new(3.0, 7.0);
        assert_eq!(Direction::TopDown.primary(p), 7.0);
        assert_eq!(Direction::TopDown.cross(p), 3.0);
        assert_eq!(Direction::LeftRight.primary(p), 3.0);
        assert_eq!(Direction::LeftRight.compose(1.0, 2.0), Position::new(1.0, 2.0));
        assert_eq!(Direction::TopDown.compose(1.0, 2.0), Position::new(2.0, 1.0));
    }

    #[test]
    fn test_enclosing() {
        assert!(Bounds::enclosing(Vec::<Position>::new()).is_none());
        let b = Bounds::enclosing([Position::new(1.0, 5.0), Position::new(-2.0, 3.0)]).unwrap();
        assert_eq!(b.width(), 3.0);
        assert_eq!(b.height(), 2.0);
    }
}
