//! Graph data structures.
//!
//! This module provides the immutable undirected topology the engines lay
//! out, dense vertex identifiers, and the per-vertex position records the
//! engines write and the renderer reads.

mod adjacency;
mod position;
mod vertex;

pub use adjacency::Graph;
pub(crate) use position::ensure_len;
pub use position::{Bounds, Point, Position, PositionStore, RELEASE_PIN, bounds_of};
pub use vertex::VertexId;
