//! Incremental layout engines.
//!
//! Two engines compute positions a little at a time so a host can call them
//! once per rendered frame:
//! - [`ForceEngine`]: Fruchterman-Reingold simulation with cooling and an
//!   escalating snapshot schedule.
//! - [`EnergyEngine`]: Kamada-Kawai energy minimization that relaxes the
//!   worst vertex per step and fits the result to a viewport.
//!
//! Both share the [`LayoutEngine`] capability set, the placement seeds in
//! [`placement`], and the user pin/unpin protocol of `move_pos`.

pub mod energy;
pub mod force;
pub mod placement;
pub mod springs;

pub use energy::{EnergyConfig, EnergyEngine, Viewport};
pub use force::{ForceConfig, ForceEngine, ForceFrame};
pub use placement::{RadiusConfig, Seed, seed, size_radii};
pub use springs::{HopMatrix, Spring, SpringTable, UNREACHABLE};

use crate::error::Result;
use crate::graph::{Point, Position, VertexId};

/// Operations every layout engine exposes to its host.
///
/// Engines hold their graph through a `Deref<Target = Graph>` handle and
/// never outlive it; a host that replaces the graph builds new engines.
pub trait LayoutEngine {
    /// Per-call parameters of [`LayoutEngine::step`].
    type Frame;

    /// Seed positions and reset all convergence state. Safe to repeat.
    fn start(&mut self, seed: Seed);

    /// Advance a bounded amount of work.
    ///
    /// Returns `true` when `out` was refreshed. `out` must hold one entry
    /// per vertex; radii in `out` are never written.
    fn step(&mut self, frame: Self::Frame, out: &mut [Position]) -> Result<bool>;

    /// Relay a user drag.
    ///
    /// With `recalculate == false` the vertex moves by `delta` and becomes
    /// fixed. With `recalculate == true` the drag is finalized; passing
    /// [`crate::graph::RELEASE_PIN`] as `delta` unpins the vertex.
    fn move_pos(&mut self, vertex: VertexId, delta: Point, recalculate: bool) -> Result<()>;

    /// Convergence diagnostic: temperature or maximum vertex energy.
    fn energy(&self) -> f64;
}
