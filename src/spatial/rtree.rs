//! R-tree based spatial index using the rstar crate.
//!
//! Provides O(log n) spatial queries for:
//! - Pointer picking against vertex circles
//! - Nearest vertex
//! - Rectangle and radius selection

use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::graph::{Position, VertexId};

/// A vertex circle in the spatial index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexPoint {
    pub id: VertexId,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

impl VertexPoint {
    pub fn new(id: VertexId, x: f32, y: f32, radius: f32) -> Self {
        Self { id, x, y, radius }
    }

    /// Whether a point at squared distance `distance_2` picks this vertex.
    fn picked_at(&self, distance_2: f32) -> bool {
        distance_2 < 2.0 * self.radius * self.radius
    }
}

impl RTreeObject for VertexPoint {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.x, self.y])
    }
}

impl PointDistance for VertexPoint {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dx = self.x - point[0];
        let dy = self.y - point[1];
        dx * dx + dy * dy
    }
}

/// Spatial index over the vertices of one layout frame.
///
/// Positions change every step, so the index is rebuilt in bulk from a
/// position slice rather than updated in place.
#[derive(Default)]
pub struct SpatialIndex {
    tree: RTree<VertexPoint>,
    max_radius: f32,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load an index from `positions`, vertex `i` at slot `i`.
    pub fn from_positions(positions: &[Position]) -> Self {
        let mut index = Self::new();
        index.rebuild(positions);
        index
    }

    /// Replace the indexed vertices with `positions`.
    pub fn rebuild(&mut self, positions: &[Position]) {
        let points: Vec<_> = positions
            .iter()
            .enumerate()
            .map(|(i, p)| VertexPoint::new(VertexId::from(i), p.pos.x, p.pos.y, p.radius))
            .collect();

        self.max_radius = points.iter().map(|p| p.radius).fold(0.0, f32::max);
        self.tree = RTree::bulk_load(points);
    }

    /// Vertex whose circle contains `(x, y)`.
    ///
    /// A point picks a vertex when its squared distance to the center is
    /// below `2 * radius^2`. When circles overlap the closest center wins.
    pub fn vertex_at(&self, x: f32, y: f32) -> Option<VertexId> {
        let reach = 2.0 * self.max_radius * self.max_radius;
        self.tree
            .nearest_neighbor_iter_with_distance_2(&[x, y])
            .take_while(|&(_, distance_2)| distance_2 < reach)
            .find(|(point, distance_2)| point.picked_at(*distance_2))
            .map(|(point, _)| point.id)
    }

    pub fn nearest(&self, x: f32, y: f32) -> Option<VertexId> {
        self.tree.nearest_neighbor(&[x, y]).map(|point| point.id)
    }

    /// Find all vertices within a rectangle.
    pub fn in_rect(&self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<VertexId> {
        let envelope = AABB::from_corners([min_x, min_y], [max_x, max_y]);
        self.tree
            .locate_in_envelope(&envelope)
            .map(|point| point.id)
            .collect()
    }

    /// Find all vertices within `radius` of a point.
    pub fn in_radius(&self, x: f32, y: f32, radius: f32) -> Vec<VertexId> {
        self.tree
            .locate_within_distance([x, y], radius * radius)
            .map(|point| point.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
