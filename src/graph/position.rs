//! Per-vertex layout records and the buffer the renderer reads.
//!
//! Coordinates are `f32` to match what gets uploaded for drawing; engines
//! accumulate in `f64` where precision matters and narrow on write.

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use super::adjacency::Graph;
use crate::error::{Error, Result};

/// A 2D coordinate or displacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Drag-finalize displacement meaning "release the pin".
///
/// No real pointer delta can reach `f32::MAX` on both axes.
pub const RELEASE_PIN: Point = Point {
    x: f32::MAX,
    y: f32::MAX,
};

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean length, computed in `f64`.
    #[inline]
    pub fn norm(self) -> f64 {
        let (x, y) = (self.x as f64, self.y as f64);
        (x * x + y * y).sqrt()
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    /// True for the [`RELEASE_PIN`] sentinel.
    #[inline]
    pub fn is_release_pin(self) -> bool {
        self.x == RELEASE_PIN.x && self.y == RELEASE_PIN.y
    }
}

impl Add for Point {
    type Output = Point;
    #[inline]
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    #[inline]
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Point;
    #[inline]
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Point {
    #[inline]
    fn sub_assign(&mut self, rhs: Point) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f32> for Point {
    type Output = Point;
    #[inline]
    fn mul(self, rhs: f32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Point {
    type Output = Point;
    #[inline]
    fn div(self, rhs: f32) -> Point {
        Point::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Point {
    type Output = Point;
    #[inline]
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

/// Layout record of one vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Coordinate in layout space.
    pub pos: Point,
    /// Display radius, set by [`crate::layout::size_radii`]. Engines never
    /// write it.
    pub radius: f32,
    /// Pinned by the user; automatic updates skip the vertex.
    pub fixed: bool,
}

impl Position {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            pos: Point::new(x, y),
            ..Self::default()
        }
    }
}

/// Axis-aligned bounding box `(min, max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }
}

/// Bounding box of a run of positions, `None` when empty.
pub fn bounds_of(positions: &[Position]) -> Option<Bounds> {
    let first = positions.first()?.pos;
    let mut bounds = Bounds {
        min: first,
        max: first,
    };
    for p in &positions[1..] {
        bounds.min.x = bounds.min.x.min(p.pos.x);
        bounds.min.y = bounds.min.y.min(p.pos.y);
        bounds.max.x = bounds.max.x.max(p.pos.x);
        bounds.max.y = bounds.max.y.max(p.pos.y);
    }
    Some(bounds)
}

/// Ordered per-vertex positions, one entry per graph vertex.
///
/// This is the surface the renderer reads. Whenever the graph changes the
/// store must be resized and the engine rebuilt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionStore {
    entries: Vec<Position>,
}

impl PositionStore {
    /// A store sized for `graph`, every vertex at the origin.
    pub fn for_graph(graph: &Graph) -> Self {
        Self {
            entries: vec![Position::default(); graph.vertex_count()],
        }
    }

    pub fn from_positions(entries: Vec<Position>) -> Self {
        Self { entries }
    }

    /// Resize to `len` entries; new entries start at the origin.
    pub fn resize(&mut self, len: usize) {
        self.entries.resize(len, Position::default());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[Position] {
        &self.entries
    }

    pub fn as_mut_slice(&mut self) -> &mut [Position] {
        &mut self.entries
    }

    pub fn get(&self, index: usize) -> Option<&Position> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Position> {
        self.entries.iter()
    }

    /// Fail unless the store holds exactly `expected` entries.
    pub fn ensure_len(&self, expected: usize) -> Result<()> {
        ensure_len(&self.entries, expected)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        bounds_of(&self.entries)
    }

    /// Coordinates as `[x0, y0, x1, y1, ...]`.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.entries.len() * 2);
        for p in &self.entries {
            out.push(p.pos.x);
            out.push(p.pos.y);
        }
        out
    }

    pub fn radii(&self) -> Vec<f32> {
        self.entries.iter().map(|p| p.radius).collect()
    }
}

impl AsRef<[Position]> for PositionStore {
    fn as_ref(&self) -> &[Position] {
        &self.entries
    }
}

impl AsMut<[Position]> for PositionStore {
    fn as_mut(&mut self) -> &mut [Position] {
        &mut self.entries
    }
}

pub(crate) fn ensure_len(positions: &[Position], expected: usize) -> Result<()> {
    if positions.len() == expected {
        Ok(())
    } else {
        Err(Error::SizeMismatch {
            expected,
            actual: positions.len(),
        })
    }
}
