//! Spatial indexing for O(log n) hit testing.
//!
//! Hosts rebuild a [`SpatialIndex`] from the latest layout frame to turn a
//! pointer location into the vertex id a drag refers to.

mod rtree;

pub use rtree::{SpatialIndex, VertexPoint};
