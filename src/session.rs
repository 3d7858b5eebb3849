//! LayoutSession - one graph, its position store, and the engine laying it out.
//!
//! The session is the host-side driver: it sizes radii, seeds the engine,
//! forwards per-frame steps into the position store, relays drags, and
//! answers pointer hit tests. The graph is immutable for the lifetime of a
//! session; a host that needs a different graph builds a new session.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::{Graph, Point, Position, PositionStore, RELEASE_PIN, VertexId};
use crate::layout::{
    EnergyConfig, EnergyEngine, ForceConfig, ForceEngine, ForceFrame, LayoutEngine, RadiusConfig,
    Seed, Viewport, size_radii,
};
use crate::layout::placement::fill_radii;
use crate::spatial::SpatialIndex;

/// Which engine a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Method {
    /// Fruchterman-Reingold.
    Force,
    /// Kamada-Kawai.
    Energy,
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "force" | "fr" | "fruchterman-reingold" => Ok(Method::Force),
            "energy" | "kk" | "kamada-kawai" => Ok(Method::Energy),
            _ => Err(Error::UnknownMethod(s.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Force => write!(f, "force"),
            Method::Energy => write!(f, "energy"),
        }
    }
}

enum Engine {
    Force(ForceEngine<Rc<Graph>>),
    Energy(EnergyEngine<Rc<Graph>>),
}

/// Host driver for one layout run.
pub struct LayoutSession {
    graph: Rc<Graph>,
    store: PositionStore,
    engine: Engine,
    spatial: SpatialIndex,
    /// Whether the spatial index lags behind the store.
    spatial_dirty: bool,
    /// Whether a step has surfaced a frame since the last `start`.
    framed: bool,
}

impl LayoutSession {
    /// A Fruchterman-Reingold session with default radii.
    pub fn with_force(graph: Graph, config: ForceConfig) -> Self {
        let graph = Rc::new(graph);
        let engine = Engine::Force(ForceEngine::new(Rc::clone(&graph), config));
        Self::from_engine(graph, engine)
    }

    /// A Kamada-Kawai session with default radii.
    pub fn with_energy(graph: Graph, config: EnergyConfig) -> Self {
        let graph = Rc::new(graph);
        let engine = Engine::Energy(EnergyEngine::new(Rc::clone(&graph), config));
        Self::from_engine(graph, engine)
    }

    /// A session running `method` with its default configuration.
    pub fn new(graph: Graph, method: Method) -> Self {
        match method {
            Method::Force => Self::with_force(graph, ForceConfig::default()),
            Method::Energy => Self::with_energy(graph, EnergyConfig::default()),
        }
    }

    fn from_engine(graph: Rc<Graph>, engine: Engine) -> Self {
        let mut store = PositionStore::for_graph(&graph);
        fill_radii(&graph, store.as_mut_slice(), &RadiusConfig::default());
        Self {
            graph,
            store,
            engine,
            spatial: SpatialIndex::new(),
            spatial_dirty: true,
            framed: false,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn method(&self) -> Method {
        match self.engine {
            Engine::Force(_) => Method::Force,
            Engine::Energy(_) => Method::Energy,
        }
    }

    /// The latest surfaced frame.
    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    pub fn positions(&self) -> &[Position] {
        self.store.as_slice()
    }

    /// Resize every vertex radius with `config`.
    pub fn size_radii(&mut self, config: &RadiusConfig) -> Result<()> {
        size_radii(&self.graph, self.store.as_mut_slice(), config)?;
        self.spatial_dirty = true;
        Ok(())
    }

    /// Seed the engine and reset convergence state.
    ///
    /// The store keeps the previous frame until the next `step` surfaces the
    /// seed; hit tests find nothing in between.
    pub fn start(&mut self, seed: Seed) {
        match &mut self.engine {
            Engine::Force(engine) => engine.start(seed),
            Engine::Energy(engine) => engine.start(seed),
        }
        self.framed = false;
        debug!(method = %self.method(), vertices = self.graph.vertex_count(), "session started");
    }

    /// Advance the force engine by one frame.
    pub fn step_force(&mut self, frame: ForceFrame) -> Result<bool> {
        match &mut self.engine {
            Engine::Force(engine) => {
                let surfaced = engine.step(frame, self.store.as_mut_slice())?;
                self.spatial_dirty |= surfaced;
                self.framed |= surfaced;
                Ok(surfaced)
            }
            Engine::Energy(_) => Err(Error::WrongEngine {
                running: Method::Energy.to_string(),
            }),
        }
    }

    /// Advance the energy engine by one frame.
    pub fn step_energy(&mut self, viewport: Viewport) -> Result<bool> {
        match &mut self.engine {
            Engine::Energy(engine) => {
                let surfaced = engine.step(viewport, self.store.as_mut_slice())?;
                self.spatial_dirty |= surfaced;
                self.framed |= surfaced;
                Ok(surfaced)
            }
            Engine::Force(_) => Err(Error::WrongEngine {
                running: Method::Force.to_string(),
            }),
        }
    }

    /// Advance whichever engine runs.
    ///
    /// The force engine reads `(a, b)` as `(batch, milestone_cap)`, the
    /// energy engine as the viewport `(width, height)`.
    pub fn step(&mut self, a: f64, b: f64) -> Result<bool> {
        match self.engine {
            Engine::Force(_) => {
                self.step_force(ForceFrame::new(a.max(0.0) as u32, b.max(0.0) as u32))
            }
            Engine::Energy(_) => self.step_energy(Viewport::new(a as f32, b as f32)),
        }
    }

    /// Relay a drag of `vertex` by `delta`.
    pub fn move_pos(&mut self, vertex: VertexId, delta: Point, recalculate: bool) -> Result<()> {
        match &mut self.engine {
            Engine::Force(engine) => engine.move_pos(vertex, delta, recalculate),
            Engine::Energy(engine) => engine.move_pos(vertex, delta, recalculate),
        }
    }

    /// Unpin `vertex` and finalize.
    pub fn release_pin(&mut self, vertex: VertexId) -> Result<()> {
        self.move_pos(vertex, RELEASE_PIN, true)
    }

    /// Temperature (force) or maximum vertex energy (energy).
    pub fn energy(&self) -> f64 {
        match &self.engine {
            Engine::Force(engine) => engine.energy(),
            Engine::Energy(engine) => engine.energy(),
        }
    }

    /// Vertex under the pointer in the latest frame.
    pub fn vertex_at(&mut self, x: f32, y: f32) -> Option<VertexId> {
        self.frame_index()?.vertex_at(x, y)
    }

    /// Vertex closest to the pointer in the latest frame.
    pub fn nearest(&mut self, x: f32, y: f32) -> Option<VertexId> {
        self.frame_index()?.nearest(x, y)
    }

    /// Spatial index of the latest frame, `None` before the first one.
    fn frame_index(&mut self) -> Option<&SpatialIndex> {
        if !self.framed {
            return None;
        }
        self.ensure_spatial_index_up_to_date();
        Some(&self.spatial)
    }

    fn ensure_spatial_index_up_to_date(&mut self) {
        if self.spatial_dirty {
            self.spatial.rebuild(self.store.as_slice());
            self.spatial_dirty = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Graph {
        Graph::from_edges(3, &[(0, 1), (1, 2), (2, 0)]).unwrap()
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("force".parse::<Method>(), Ok(Method::Force));
        assert_eq!("Kamada-Kawai".parse::<Method>(), Ok(Method::Energy));
        assert_eq!("fr".parse::<Method>(), Ok(Method::Force));
        assert_eq!(
            "spectral".parse::<Method>(),
            Err(Error::UnknownMethod("spectral".to_string()))
        );
    }

    #[test]
    fn test_new_session_sizes_radii() {
        let session = LayoutSession::new(triangle(), Method::Force);
        assert_eq!(session.store().len(), 3);
        // log2(300 * 2 / 3) > 0
        assert!(session.positions().iter().all(|p| p.radius > 4.0));
        assert_eq!(session.method(), Method::Force);
    }

    #[test]
    fn test_size_radii_reconfigures() {
        let mut session = LayoutSession::new(Graph::with_vertices(2), Method::Energy);
        session
            .size_radii(&RadiusConfig {
                min_radius: 7.0,
                k: 300.0,
            })
            .unwrap();
        assert_eq!(session.store().radii(), vec![7.0, 7.0]);
    }

    #[test]
    fn test_first_force_step_surfaces_seed() {
        let mut session = LayoutSession::with_force(triangle(), ForceConfig::default());
        session.start(Seed::Circle);
        assert!(session.step(10.0, 0.0).unwrap());
        assert_eq!(session.positions()[0].pos, Point::new(1.0, 0.0));
    }

    #[test]
    fn test_step_with_wrong_method() {
        let mut session = LayoutSession::with_energy(triangle(), EnergyConfig::default());
        session.start(Seed::Circle);
        assert!(session.energy() > 0.0);
        assert_eq!(
            session.step_force(ForceFrame::new(5, 0)),
            Err(Error::WrongEngine {
                running: "energy".to_string()
            })
        );
        assert!(session.step_energy(Viewport::new(100.0, 100.0)).unwrap());
    }

    #[test]
    fn test_vertex_at_follows_frames() {
        let mut session = LayoutSession::with_energy(triangle(), EnergyConfig::default());
        session.start(Seed::Circle);
        session.step(400.0, 400.0).unwrap();

        let target = session.positions()[2].pos;
        assert_eq!(session.vertex_at(target.x, target.y), Some(VertexId(2)));
        assert_eq!(session.nearest(target.x + 0.5, target.y), Some(VertexId(2)));
        assert_eq!(session.vertex_at(10_000.0, 10_000.0), None);
    }

    #[test]
    fn test_hit_tests_wait_for_first_frame() {
        let mut session = LayoutSession::with_energy(triangle(), EnergyConfig::default());
        session.start(Seed::Circle);
        assert!(session.positions().iter().all(|p| p.pos == Point::ZERO));
        assert_eq!(session.vertex_at(0.0, 0.0), None);
        assert_eq!(session.nearest(0.0, 0.0), None);

        session.step(400.0, 400.0).unwrap();
        let target = session.positions()[0].pos;
        assert_eq!(session.vertex_at(target.x, target.y), Some(VertexId(0)));

        session.start(Seed::Circle);
        assert_eq!(session.vertex_at(target.x, target.y), None);
    }

    #[test]
    fn test_release_pin_unfixes() {
        let mut session = LayoutSession::with_force(triangle(), ForceConfig::default());
        session.start(Seed::Circle);
        session.step(1.0, 0.0).unwrap();

        session.move_pos(VertexId(1), Point::new(5.0, 5.0), false).unwrap();
        session.move_pos(VertexId(1), Point::new(5.0, 5.0), true).unwrap();
        session.step(1.0, 0.0).unwrap();
        assert!(session.positions()[1].fixed);

        session.release_pin(VertexId(1)).unwrap();
        assert!(session.step(1.0, 0.0).unwrap());
        assert!(!session.positions()[1].fixed);
    }
}
