//! Kamada-Kawai energy minimization.
//!
//! Every vertex pair is joined by a spring whose ideal length grows with
//! their graph distance. The energy of a vertex is the magnitude of the
//! gradient of total spring potential at its position. Each `step` takes the
//! vertex with the highest energy and moves it with a few Newton updates,
//! then fits the whole layout into the caller's viewport.
//!
//! # Per-call cost
//!
//! A step does at most `max_vertex_iterations` Newton updates on one vertex
//! plus one energy scan. The O(n^3) shortest-path rebuild only happens in
//! `start` and when a drag is finalized.

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::LayoutEngine;
use super::placement::{self, Seed};
use super::springs::{HopMatrix, SpringTable};
use crate::error::{Error, Result};
use crate::graph::{Graph, Point, Position, VertexId, bounds_of, ensure_len};

/// Maximum energy changes smaller than this count as a steady round.
const STEADY_EPSILON: f64 = 1e-20;

/// Fraction of the viewport the layout fills.
const VIEWPORT_FILL: f32 = 0.9;

/// Configuration for the energy engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnergyConfig {
    /// Spring stiffness constant (default: 300.0).
    pub k: f64,
    /// Vertices at or below this energy are left alone (default: 0.01).
    pub energy_threshold: f64,
    /// Newton updates per relaxed vertex and step (default: 10).
    pub max_vertex_iterations: u32,
    /// Steady rounds after which relaxation stops (default: 50).
    pub steady_limit: u32,
    /// Hessian determinants below this magnitude skip the update
    /// (default: 1e-9).
    pub min_determinant: f64,
    /// Whether `move_pos` may pin vertices (default: true).
    pub pinning: bool,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            k: 300.0,
            energy_threshold: 1e-2,
            max_vertex_iterations: 10,
            steady_limit: 50,
            min_determinant: 1e-9,
            pinning: true,
        }
    }
}

/// Output area the layout is fitted into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// First and second partial derivatives of one vertex's spring potential.
#[derive(Debug, Clone, Copy, Default)]
struct Partials {
    dx: f64,
    dy: f64,
    dxx: f64,
    dxy: f64,
    dyy: f64,
}

/// Incremental Kamada-Kawai layout.
pub struct EnergyEngine<G: Deref<Target = Graph>> {
    graph: G,
    config: EnergyConfig,
    /// Unit-scale working positions.
    positions: Vec<Position>,
    hops: HopMatrix,
    springs: SpringTable,
    max_energy: f64,
    max_vertex: usize,
    steady_count: u32,
    /// Scale applied by the last viewport fit; drag deltas are divided by it.
    scale: f32,
}

impl<G: Deref<Target = Graph>> EnergyEngine<G> {
    /// Create an engine for `graph`. Call [`LayoutEngine::start`] before
    /// stepping.
    pub fn new(graph: G, config: EnergyConfig) -> Self {
        let n = graph.vertex_count();
        Self {
            graph,
            config,
            positions: vec![Position::default(); n],
            hops: HopMatrix::default(),
            springs: SpringTable::zeroed(n),
            max_energy: 0.0,
            max_vertex: 0,
            steady_count: 0,
            scale: 1.0,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn config(&self) -> &EnergyConfig {
        &self.config
    }

    /// Working positions at unit scale.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn hop_distances(&self) -> &HopMatrix {
        &self.hops
    }

    pub fn springs(&self) -> &SpringTable {
        &self.springs
    }

    /// Vertex currently holding the maximum energy.
    pub fn max_energy_vertex(&self) -> VertexId {
        VertexId::from(self.max_vertex)
    }

    /// Consecutive relaxation rounds that left the maximum energy unchanged.
    pub fn steady_count(&self) -> u32 {
        self.steady_count
    }

    /// Scale factor of the last viewport fit.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Energy of `vertex` at its current position.
    pub fn vertex_energy(&self, vertex: VertexId) -> Result<f64> {
        let v = self.graph.check_vertex(vertex)?;
        Ok(self.energy_of(v))
    }

    fn energy_of(&self, v: usize) -> f64 {
        if self.positions[v].fixed {
            return 0.0;
        }
        let p = self.partials(v, false);
        (p.dx * p.dx + p.dy * p.dy).sqrt()
    }

    fn partials(&self, v: usize, with_hessian: bool) -> Partials {
        let mut p = Partials::default();
        let origin = self.positions[v].pos;

        for (other, spring) in self.springs.row(v).iter().enumerate() {
            if other == v {
                continue;
            }
            let delta = origin - self.positions[other].pos;
            let distance = delta.norm();
            if distance == 0.0 {
                continue;
            }
            let (dx, dy) = (delta.x as f64, delta.y as f64);

            let pull = spring.strength * (1.0 - spring.length / distance);
            p.dx += dx * pull;
            p.dy += dy * pull;

            if with_hessian {
                let cubed = distance * distance * distance;
                p.dxy += spring.strength * spring.length * dx * dy / cubed;
                p.dxx += spring.strength * (1.0 - spring.length * dy * dy / cubed);
                p.dyy += spring.strength * (1.0 - spring.length * dx * dx / cubed);
            }
        }
        p
    }

    /// Newton displacement lowering the energy of `v`, `None` when the
    /// Hessian is too close to singular.
    fn newton_displacement(&self, v: usize) -> Option<Point> {
        let p = self.partials(v, true);
        let determinant = p.dxx * p.dyy - p.dxy * p.dxy;
        if determinant.abs() < self.config.min_determinant {
            warn!(vertex = v, determinant, "degenerate newton system, skipping");
            return None;
        }

        let step_x = (p.dxy * p.dy - p.dyy * p.dx) / determinant;
        let step_y = (p.dxy * p.dx - p.dxx * p.dy) / determinant;
        if !step_x.is_finite() || !step_y.is_finite() {
            warn!(vertex = v, "non-finite newton step, skipping");
            return None;
        }
        Some(Point::new(step_x as f32, step_y as f32))
    }

    /// Move `v` until its energy drops below threshold or the iteration cap
    /// is reached.
    fn relax(&mut self, v: usize) {
        if self.positions[v].fixed {
            return;
        }
        for _ in 0..self.config.max_vertex_iterations {
            let Some(displacement) = self.newton_displacement(v) else {
                break;
            };
            self.positions[v].pos += displacement;
            if self.energy_of(v) <= self.config.energy_threshold {
                break;
            }
        }
    }

    /// Scan every vertex and record the highest energy and its owner.
    fn refresh_max_energy(&mut self) {
        let mut max_energy = 0.0;
        let mut max_vertex = 0;
        for v in 0..self.positions.len() {
            let energy = self.energy_of(v);
            if energy > max_energy {
                max_energy = energy;
                max_vertex = v;
            }
        }
        self.max_energy = max_energy;
        self.max_vertex = max_vertex;
    }

    /// Rebuild shortest paths and the spring row of `v`, then rescan.
    fn recalculate_springs(&mut self, v: usize) {
        self.hops = HopMatrix::compute(&self.graph);
        self.springs.rebuild_row(&self.hops, self.config.k, v);
        self.steady_count = 0;
        self.refresh_max_energy();
    }

    /// Fit working positions into `viewport` and write them to `out`.
    fn center_and_scale(&mut self, viewport: Viewport, out: &mut [Position]) {
        let Some(bounds) = bounds_of(&self.positions) else {
            return;
        };

        let (width, height) = (bounds.width(), bounds.height());
        let scale = match (width > 0.0, height > 0.0) {
            (true, true) => VIEWPORT_FILL * (viewport.width / width).min(viewport.height / height),
            (true, false) => VIEWPORT_FILL * viewport.width / width,
            (false, true) => VIEWPORT_FILL * viewport.height / height,
            (false, false) => 1.0,
        };
        // A collapsed or invalid viewport still yields finite output, but drag
        // deltas keep dividing by the last usable scale.
        let scale = if scale.is_finite() { scale.max(0.0) } else { 0.0 };
        if scale > 0.0 {
            self.scale = scale;
        } else {
            warn!(?viewport, "viewport has no usable area");
        }

        let center = bounds.center();
        for (dst, src) in out.iter_mut().zip(&self.positions) {
            dst.pos = (src.pos - center) * scale;
            dst.fixed = src.fixed;
        }
    }
}

impl<G: Deref<Target = Graph>> LayoutEngine for EnergyEngine<G> {
    type Frame = Viewport;

    fn start(&mut self, seed: Seed) {
        let n = self.graph.vertex_count();
        self.positions.resize(n, Position::default());
        placement::seed(seed, &mut self.positions);

        self.hops = HopMatrix::compute(&self.graph);
        self.springs = SpringTable::build(&self.hops, self.config.k);
        self.steady_count = 0;
        self.refresh_max_energy();
        debug!(
            vertices = n,
            max_hop = self.hops.max_finite(),
            max_energy = self.max_energy,
            "energy layout started"
        );
    }

    fn step(&mut self, viewport: Viewport, out: &mut [Position]) -> Result<bool> {
        ensure_len(out, self.positions.len())?;

        if self.max_energy > self.config.energy_threshold
            && self.steady_count < self.config.steady_limit
        {
            self.relax(self.max_vertex);

            let previous = self.max_energy;
            self.refresh_max_energy();
            if (self.max_energy - previous).abs() < STEADY_EPSILON {
                self.steady_count += 1;
            } else {
                self.steady_count = 0;
            }
            trace!(
                max_energy = self.max_energy,
                vertex = self.max_vertex,
                steady = self.steady_count,
                "energy step"
            );
        }

        self.center_and_scale(viewport, out);
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
            self.recalculate_springs(v);
            debug!(%vertex, max_energy = self.max_energy, "drag finalized, springs rebuilt");
            return Ok(());
        }

        if delta.is_zero() {
            return Ok(());
        }
        let moved = self.positions[v].pos + delta / self.scale;
        if !moved.x.is_finite() || !moved.y.is_finite() {
            warn!(%vertex, "drag to a non-finite position ignored");
            return Ok(());
        }
        self.positions[v].pos = moved;
        self.positions[v].fixed = true;
        Ok(())
    }

    fn energy(&self) -> f64 {
        self.max_energy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RELEASE_PIN;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn path(n: usize) -> Graph {
        let edges: Vec<_> = (1..n).map(|v| (v - 1, v)).collect();
        Graph::from_edges(n, &edges).unwrap()
    }

    fn complete(n: usize) -> Graph {
        let mut edges = Vec::new();
        for a in 0..n {
            for b in a + 1..n {
                edges.push((a, b));
            }
        }
        Graph::from_edges(n, &edges).unwrap()
    }

    fn fresh_argmax<G: Deref<Target = Graph>>(engine: &EnergyEngine<G>) -> (f64, usize) {
        let mut best = (0.0, 0);
        for v in 0..engine.positions().len() {
            let e = engine.energy_of(v);
            if e > best.0 {
                best = (e, v);
            }
        }
        best
    }

    #[test]
    fn test_path_springs() {
        let graph = path(3);
        let mut engine = EnergyEngine::new(&graph, EnergyConfig::default());
        engine.start(Seed::Circle);

        assert_eq!(
            engine.hop_distances().to_rows(),
            vec![vec![0, 1, 2], vec![1, 0, 1], vec![2, 1, 0]]
        );
        let springs = engine.springs();
        assert_eq!(springs.get(0, 2).length, 1.0);
        assert_eq!(springs.get(0, 1).length, 0.5);
        assert_eq!(springs.get(1, 2).length, 0.5);
        assert_eq!(springs.get(1, 1).length, 0.0);
        assert_eq!(springs.get(1, 1).strength, 0.0);
        assert_eq!(springs.get(0, 2).strength, 75.0);
    }

    #[test]
    fn test_start_is_idempotent() {
        let graph = complete(5);
        let mut engine = EnergyEngine::new(&graph, EnergyConfig::default());
        engine.start(Seed::Circle);
        let first = engine.positions().to_vec();
        let first_energy = engine.energy();

        let mut out = vec![Position::default(); 5];
        for _ in 0..5 {
            engine.step(Viewport::new(800.0, 600.0), &mut out).unwrap();
        }
        engine.start(Seed::Circle);
        assert_eq!(engine.positions(), &first[..]);
        assert_eq!(engine.energy(), first_energy);
        assert_eq!(engine.steady_count(), 0);
    }

    #[test]
    fn test_center_and_scale_exact() {
        let graph = Graph::with_vertices(3);
        let mut engine = EnergyEngine::new(&graph, EnergyConfig::default());
        engine.positions = vec![
            Position::at(0.0, 0.0),
            Position::at(4.0, 2.0),
            Position::at(2.0, 1.0),
        ];
        let mut out = vec![Position::default(); 3];

        // Extent 4 x 2 into 100 x 100: scale = 0.9 * min(25, 50) = 22.5.
        engine.center_and_scale(Viewport::new(100.0, 100.0), &mut out);
        assert_eq!(engine.scale(), 22.5);
        assert_eq!(out[0].pos, Point::new(-45.0, -22.5));
        assert_eq!(out[1].pos, Point::new(45.0, 22.5));
        assert_eq!(out[2].pos, Point::new(0.0, 0.0));

        let fitted = bounds_of(&out).unwrap();
        assert!(fitted.width() <= 100.0 && fitted.height() <= 100.0);
        assert_eq!(fitted.center(), Point::ZERO);
    }

    #[test]
    fn test_center_and_scale_degenerate_extent() {
        let graph = Graph::with_vertices(2);
        let mut engine = EnergyEngine::new(&graph, EnergyConfig::default());
        engine.positions = vec![Position::at(1.0, 3.0), Position::at(5.0, 3.0)];
        let mut out = vec![Position::default(); 2];

        engine.center_and_scale(Viewport::new(80.0, 60.0), &mut out);
        assert_eq!(engine.scale(), 18.0);
        assert_eq!(out[0].pos, Point::new(-36.0, 0.0));

        engine.positions = vec![Position::at(2.0, 2.0), Position::at(2.0, 2.0)];
        engine.center_and_scale(Viewport::new(80.0, 60.0), &mut out);
        assert_eq!(engine.scale(), 1.0);
        assert_eq!(out[1].pos, Point::ZERO);
    }

    #[test]
    fn test_empty_viewport_keeps_drag_finite() {
        let graph = path(3);
        let mut engine = EnergyEngine::new(&graph, EnergyConfig::default());
        engine.start(Seed::Circle);
        let mut out = vec![Position::default(); 3];

        engine.step(Viewport::new(0.0, 0.0), &mut out).unwrap();
        assert_eq!(engine.scale(), 1.0);
        assert!(out.iter().all(|p| p.pos == Point::ZERO));

        let before = engine.positions()[1].pos;
        engine.move_pos(VertexId(1), Point::new(3.0, 0.0), false).unwrap();
        assert_eq!(engine.positions()[1].pos, before + Point::new(3.0, 0.0));
        engine.move_pos(VertexId(1), Point::ZERO, true).unwrap();

        engine.step(Viewport::new(400.0, 400.0), &mut out).unwrap();
        assert!(engine.scale() > 0.0 && engine.scale().is_finite());
        assert!(out.iter().all(|p| p.pos.x.is_finite() && p.pos.y.is_finite()));

        engine
            .move_pos(VertexId(0), Point::new(f32::NAN, 1.0), false)
            .unwrap();
        assert!(!engine.positions()[0].fixed);
        assert!(engine.positions()[0].pos.x.is_finite());
    }

    #[test]
    fn test_step_writes_scaled_output() {
        let graph = path(4);
        let mut engine = EnergyEngine::new(&graph, EnergyConfig::default());
        engine.start(Seed::Circle);
        let mut out = vec![
            Position {
                radius: 6.0,
                ..Position::default()
            };
            4
        ];

        assert!(engine.step(Viewport::new(800.0, 600.0), &mut out).unwrap());
        let fitted = bounds_of(&out).unwrap();
        assert!(fitted.width() <= 800.0 * 0.9 + 1e-3);
        assert!(fitted.height() <= 600.0 * 0.9 + 1e-3);
        assert!(out.iter().all(|p| p.radius == 6.0));
    }

    #[test]
    fn test_max_energy_tracks_argmax() {
        let graph = Graph::from_edges(8, &[(0, 1), (1, 2), (2, 3), (3, 0), (3, 4), (4, 5), (5, 6), (6, 7)])
            .unwrap();
        let mut engine = EnergyEngine::new(&graph, EnergyConfig::default());
        engine.start(Seed::Circle);
        let mut out = vec![Position::default(); 8];

        for _ in 0..40 {
            engine.step(Viewport::new(800.0, 600.0), &mut out).unwrap();
            let (energy, vertex) = fresh_argmax(&engine);
            assert_eq!(engine.energy(), energy);
            assert_eq!(engine.max_energy_vertex(), VertexId::from(vertex));
        }
    }

    #[test]
    fn test_converges_on_small_graphs() {
        for graph in [path(3), path(10), complete(6)] {
            let mut engine = EnergyEngine::new(&graph, EnergyConfig::default());
            engine.start(Seed::Circle);
            let initial = engine.energy();
            let mut out = vec![Position::default(); graph.vertex_count()];

            for _ in 0..500 {
                engine.step(Viewport::new(800.0, 600.0), &mut out).unwrap();
            }
            assert!(engine.energy() < initial);
            assert!(engine.energy() <= engine.config().energy_threshold);
            assert!(out.iter().all(|p| p.pos.x.is_finite() && p.pos.y.is_finite()));
        }
    }

    #[test]
    fn test_path_ends_spread_apart() {
        let graph = path(3);
        let mut engine = EnergyEngine::new(&graph, EnergyConfig::default());
        engine.start(Seed::Circle);
        let mut out = vec![Position::default(); 3];
        for _ in 0..200 {
            engine.step(Viewport::new(100.0, 100.0), &mut out).unwrap();
        }

        let p = engine.positions();
        let ends = (p[0].pos - p[2].pos).norm();
        let near = (p[0].pos - p[1].pos).norm();
        assert_relative_eq!(ends, 1.0, epsilon = 0.05);
        assert_relative_eq!(near, 0.5, epsilon = 0.05);
    }

    #[test]
    fn test_single_vertex_never_relaxes() {
        let graph = Graph::with_vertices(1);
        let mut engine = EnergyEngine::new(&graph, EnergyConfig::default());
        engine.start(Seed::Circle);
        assert_eq!(engine.energy(), 0.0);

        let mut out = vec![Position::default(); 1];
        engine.step(Viewport::new(100.0, 100.0), &mut out).unwrap();
        assert_eq!(engine.positions()[0].pos, Point::new(1.0, 0.0));
        assert_eq!(out[0].pos, Point::ZERO);
        assert_eq!(engine.steady_count(), 0);
    }

    #[test]
    fn test_empty_graph_is_noop() {
        let graph = Graph::default();
        let mut engine = EnergyEngine::new(&graph, EnergyConfig::default());
        engine.start(Seed::Circle);
        let mut out: Vec<Position> = Vec::new();
        assert!(engine.step(Viewport::new(100.0, 100.0), &mut out).unwrap());
        assert_eq!(engine.energy(), 0.0);
    }

    #[test]
    fn test_degenerate_hessian_is_skipped() {
        let graph = path(3);
        let config = EnergyConfig {
            min_determinant: f64::INFINITY,
            ..EnergyConfig::default()
        };
        let mut engine = EnergyEngine::new(&graph, config);
        engine.start(Seed::Circle);
        let before = engine.positions().to_vec();

        let mut out = vec![Position::default(); 3];
        engine.step(Viewport::new(100.0, 100.0), &mut out).unwrap();
        assert_eq!(engine.positions(), &before[..]);
        assert_eq!(engine.steady_count(), 1);
    }

    #[test]
    fn test_pin_and_release() {
        let graph = complete(4);
        let mut engine = EnergyEngine::new(&graph, EnergyConfig::default());
        engine.start(Seed::Circle);
        let mut out = vec![Position::default(); 4];
        engine.step(Viewport::new(400.0, 400.0), &mut out).unwrap();

        let scale = engine.scale();
        let before = engine.positions()[1].pos;
        engine
            .move_pos(VertexId(1), Point::new(scale * 2.0, 0.0), false)
            .unwrap();
        let pinned = engine.positions()[1].pos;
        assert_relative_eq!(pinned.x, before.x + 2.0, epsilon = 1e-5);
        assert!(engine.positions()[1].fixed);
        assert_eq!(engine.vertex_energy(VertexId(1)), Ok(0.0));

        for _ in 0..50 {
            engine.step(Viewport::new(400.0, 400.0), &mut out).unwrap();
            assert_eq!(engine.positions()[1].pos, pinned);
            assert!(out[1].fixed);
        }

        engine.move_pos(VertexId(1), RELEASE_PIN, true).unwrap();
        assert!(!engine.positions()[1].fixed);
        assert_eq!(engine.steady_count(), 0);
        let (energy, vertex) = fresh_argmax(&engine);
        assert_eq!(engine.energy(), energy);
        assert_eq!(engine.max_energy_vertex(), VertexId::from(vertex));
    }

    #[test]
    fn test_finalize_rebuilds_springs() {
        let graph = path(4);
        let mut engine = EnergyEngine::new(&graph, EnergyConfig::default());
        engine.start(Seed::Circle);
        let springs = engine.springs().clone();

        engine.move_pos(VertexId(2), Point::new(3.0, 3.0), false).unwrap();
        engine.move_pos(VertexId(2), Point::new(3.0, 3.0), true).unwrap();
        assert!(engine.positions()[2].fixed);
        assert_eq!(engine.springs(), &springs);
    }

    #[test]
    fn test_move_pos_rejects_invalid_vertex() {
        let graph = path(3);
        let mut engine = EnergyEngine::new(&graph, EnergyConfig::default());
        engine.start(Seed::Circle);
        assert_eq!(
            engine.move_pos(VertexId(9), RELEASE_PIN, true),
            Err(Error::InvalidVertex {
                vertex: 9,
                vertex_count: 3
            })
        );
        assert!(engine.vertex_energy(VertexId(3)).is_err());
    }

    #[test]
    fn test_move_pos_without_pinning() {
        let graph = path(3);
        let config = EnergyConfig {
            pinning: false,
            ..EnergyConfig::default()
        };
        let mut engine = EnergyEngine::new(&graph, config);
        engine.start(Seed::Circle);
        assert_eq!(
            engine.move_pos(VertexId(0), Point::new(1.0, 0.0), false),
            Err(Error::PinningDisabled)
        );
    }

    proptest! {
        #[test]
        fn prop_output_fits_viewport(
            s in any::<u64>(),
            width in 50.0f32..2000.0,
            height in 50.0f32..2000.0,
        ) {
            let graph = path(6);
            let mut engine = EnergyEngine::new(&graph, EnergyConfig::default());
            engine.start(Seed::Random { seed: Some(s) });
            let mut out = vec![Position::default(); 6];
            engine.step(Viewport::new(width, height), &mut out).unwrap();

            let fitted = bounds_of(&out).unwrap();
            prop_assert!(fitted.width() <= width * 0.9 * 1.0001);
            prop_assert!(fitted.height() <= height * 0.9 * 1.0001);
        }
    }
}
