//! Fruchterman-Reingold force simulation.
//!
//! Each internal iteration:
//! 1. **Repulsion**: every unordered pair closer than the cutoff pushes apart
//!    with magnitude `k^2 / d`.
//! 2. **Attraction**: every edge pulls its endpoints together with magnitude
//!    `d^2 / k`.
//! 3. **Cap**: each free vertex moves along its net force by at most the
//!    current temperature. Net forces under the stability threshold are
//!    ignored.
//! 4. **Cooling**: temperature decays geometrically down to a floor.
//!
//! Snapshots reach the caller on an escalating schedule: the first `step`
//! surfaces the seed, the next surfaces after 1 iteration, then 2, then 3...
//! Early frames update quickly while later frames batch more work per redraw.

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::LayoutEngine;
use super::placement::{self, Seed};
use crate::error::{Error, Result};
use crate::graph::{Graph, Point, Position, VertexId, ensure_len};

/// Separation assumed for coincident vertices so repulsion stays finite.
const MIN_SEPARATION: f64 = 0.01;

/// Configuration for the force engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForceConfig {
    /// Optimal pair distance (default: 15.0).
    pub k: f64,
    /// Temperature multiplier per iteration (default: 0.85).
    pub cooling: f64,
    /// Lowest temperature reached by cooling (default: 0.1).
    pub temperature_floor: f64,
    /// Pairs farther apart than this do not repel (default: 1000.0).
    pub repulsion_cutoff: f64,
    /// Net forces below this magnitude move nothing (default: 1.0).
    pub stability_threshold: f64,
    /// Whether `move_pos` may pin vertices (default: true).
    pub pinning: bool,
    /// Surface snapshots on the escalating milestone schedule (default:
    /// true). When false every `step` runs its whole batch and surfaces.
    pub milestone_batching: bool,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            k: 15.0,
            cooling: 0.85,
            temperature_floor: 0.1,
            repulsion_cutoff: 1000.0,
            stability_threshold: 1.0,
            pinning: true,
            milestone_batching: true,
        }
    }
}

/// Per-call work bound of [`ForceEngine::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceFrame {
    /// Maximum internal iterations this call.
    pub batch: u32,
    /// Largest milestone the schedule may grow to; 0 means unbounded.
    pub milestone_cap: u32,
}

impl ForceFrame {
    pub fn new(batch: u32, milestone_cap: u32) -> Self {
        Self {
            batch,
            milestone_cap,
        }
    }
}

/// Incremental Fruchterman-Reingold layout.
pub struct ForceEngine<G: Deref<Target = Graph>> {
    graph: G,
    config: ForceConfig,
    k_squared: f64,
    positions: Vec<Position>,
    /// Net displacement per vertex, cleared every iteration.
    movements: Vec<(f64, f64)>,
    temperature: f64,
    iteration: u32,
    milestone: u32,
    /// A live drag moved a vertex since the last surfaced frame.
    drag_pending: bool,
}

impl<G: Deref<Target = Graph>> ForceEngine<G> {
    /// Create an engine for `graph`. Call [`LayoutEngine::start`] before
    /// stepping.
    pub fn new(graph: G, config: ForceConfig) -> Self {
        let n = graph.vertex_count();
        let mut engine = Self {
            graph,
            config,
            k_squared: config.k * config.k,
            positions: vec![Position::default(); n],
            movements: vec![(0.0, 0.0); n],
            temperature: 0.0,
            iteration: 0,
            milestone: 0,
            drag_pending: false,
        };
        engine.temperature = engine.initial_temperature();
        engine
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn config(&self) -> &ForceConfig {
        &self.config
    }

    /// Current movement cap.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Iterations run since the last snapshot.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Iterations required before the next snapshot.
    pub fn milestone(&self) -> u32 {
        self.milestone
    }

    /// Working positions, including those not yet surfaced.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    fn initial_temperature(&self) -> f64 {
        (10.0 * (self.graph.vertex_count() as f64).sqrt()).max(self.config.temperature_floor)
    }

    fn reset_schedule(&mut self) {
        self.iteration = 0;
        self.milestone = 0;
        self.drag_pending = false;
    }

    /// Run one simulation iteration on the working positions.
    fn do_step(&mut self) {
        let n = self.positions.len();
        self.movements.fill((0.0, 0.0));

        for v in 0..n {
            for other in v + 1..n {
                let (dx, dy, distance) = self.delta(v, other);
                if distance > self.config.repulsion_cutoff {
                    continue;
                }

                let (ux, uy, distance) = if distance == 0.0 {
                    warn!(v, other, "coincident vertices, separating along x");
                    (1.0, 0.0, MIN_SEPARATION)
                } else {
                    (dx / distance, dy / distance, distance)
                };

                let repulsion = self.k_squared / distance;
                self.movements[v].0 += ux * repulsion;
                self.movements[v].1 += uy * repulsion;
                self.movements[other].0 -= ux * repulsion;
                self.movements[other].1 -= uy * repulsion;
            }
        }

        for (a, b) in self.graph.edges() {
            let (dx, dy, distance) = self.delta(a, b);
            if distance == 0.0 {
                continue;
            }

            let attraction = distance * distance / self.config.k;
            let (ux, uy) = (dx / distance, dy / distance);
            self.movements[a].0 -= ux * attraction;
            self.movements[a].1 -= uy * attraction;
            self.movements[b].0 += ux * attraction;
            self.movements[b].1 += uy * attraction;
        }

        for (p, &(mx, my)) in self.positions.iter_mut().zip(&self.movements) {
            if p.fixed {
                continue;
            }
            let norm = (mx * mx + my * my).sqrt();
            if norm < self.config.stability_threshold {
                continue;
            }
            let capped = norm.min(self.temperature);
            p.pos.x += (mx / norm * capped) as f32;
            p.pos.y += (my / norm * capped) as f32;
        }

        self.temperature = (self.temperature * self.config.cooling).max(self.config.temperature_floor);
    }

    fn delta(&self, a: usize, b: usize) -> (f64, f64, f64) {
        let d = self.positions[a].pos - self.positions[b].pos;
        (d.x as f64, d.y as f64, d.norm())
    }

    fn write_out(&self, out: &mut [Position]) {
        for (dst, src) in out.iter_mut().zip(&self.positions) {
            dst.pos = src.pos;
            dst.fixed = src.fixed;
        }
    }
}

impl<G: Deref<Target = Graph>> LayoutEngine for ForceEngine<G> {
    type Frame = ForceFrame;

    fn start(&mut self, seed: Seed) {
        let n = self.graph.vertex_count();
        self.positions.resize(n, Position::default());
        self.movements.clear();
        self.movements.resize(n, (0.0, 0.0));
        placement::seed(seed, &mut self.positions);

        self.temperature = self.initial_temperature();
        self.reset_schedule();
        debug!(vertices = n, temperature = self.temperature, "force layout started");
    }

    fn step(&mut self, frame: ForceFrame, out: &mut [Position]) -> Result<bool> {
        ensure_len(out, self.positions.len())?;

        if !self.config.milestone_batching {
            for _ in 0..frame.batch {
                self.do_step();
            }
            self.write_out(out);
            trace!(temperature = self.temperature, "force step");
            return Ok(true);
        }

        for _ in 0..frame.batch {
            if self.iteration >= self.milestone {
                break;
            }
            self.do_step();
            self.iteration += 1;
        }

        if self.iteration < self.milestone {
            if !self.drag_pending {
                return Ok(false);
            }
            // Surface the drag now; the schedule keeps its progress.
            self.drag_pending = false;
            self.write_out(out);
            trace!(iteration = self.iteration, "drag surfaced between milestones");
            return Ok(true);
        }

        self.drag_pending = false;
        self.iteration = 0;
        if frame.milestone_cap == 0 || self.milestone < frame.milestone_cap {
            self.milestone += 1;
        }
        self.write_out(out);
        trace!(
            milestone = self.milestone,
            temperature = self.temperature,
            "force snapshot"
        );
        Ok(true)
    }

    fn move_pos(&mut self, vertex: VertexId, delta: Point, recalculate: bool) -> Result<()> {
        if !self.config.pinning {
            return Err(Error::PinningDisabled);
        }
        let v = self.graph.check_vertex(vertex)?;

        if recalculate {
            if delta.is_release_pin() {
                self.positions[v].fixed = false;
                debug!(%vertex, "vertex unpinned");
            }
            self.reset_schedule();
            debug!(%vertex, "drag finalized, force schedule restarted");
            return Ok(());
        }

        if delta.is_zero() {
            return Ok(());
        }
        self.positions[v].pos += delta;
        self.positions[v].fixed = true;
        self.drag_pending = true;
        Ok(())
    }

    fn energy(&self) -> f64 {
        self.temperature
    }
}
