//! NodeSoup - WASM Module
//!
//! Incremental force-directed graph layout for interactive renderers. Each
//! engine does a bounded amount of work per call so a host can interleave
//! layout with drawing, and users can drag vertices to pin them mid-run.
//!
//! # Architecture
//!
//! - `graph`: Immutable undirected topology (petgraph) and position records
//! - `layout`: Fruchterman-Reingold and Kamada-Kawai engines, placement seeds
//! - `spatial`: R-tree spatial indexing for pointer hit testing
//! - `session`: Host driver tying a graph, its positions, and an engine
//!   together

use js_sys::Float32Array;
use wasm_bindgen::prelude::*;

pub mod error;
pub mod graph;
pub mod layout;
pub mod session;
pub mod spatial;

pub use error::Error;
pub use graph::{Graph, Point, Position, PositionStore, RELEASE_PIN, VertexId};
pub use layout::{
    EnergyConfig, EnergyEngine, ForceConfig, ForceEngine, ForceFrame, LayoutEngine, RadiusConfig,
    Seed, Viewport,
};
pub use session::{LayoutSession, Method};

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Main entry point for hosts running in JavaScript.
///
/// Wraps a [`LayoutSession`]. The graph is fixed at construction; build a
/// new instance to lay out a different graph.
#[wasm_bindgen]
pub struct NodeSoupWasm {
    session: LayoutSession,
}

#[wasm_bindgen]
impl NodeSoupWasm {
    /// Create a layout for a graph.
    ///
    /// # Arguments
    ///
    /// * `vertex_count` - Number of vertices, ids `0..vertex_count`
    /// * `edges` - Flat undirected pairs `[a0, b0, a1, b1, ...]`
    /// * `method` - `"force"` (Fruchterman-Reingold) or `"energy"`
    ///   (Kamada-Kawai)
    /// * `config` - Optional engine configuration object; missing keys take
    ///   their defaults
    #[wasm_bindgen(constructor)]
    pub fn new(
        vertex_count: usize,
        edges: &[u32],
        method: &str,
        config: JsValue,
    ) -> std::result::Result<NodeSoupWasm, JsError> {
        let graph = Graph::from_flat_pairs(vertex_count, edges)?;
        let method: Method = method.parse()?;
        let configured = !config.is_undefined() && !config.is_null();

        let session = match method {
            Method::Force if configured => {
                LayoutSession::with_force(graph, serde_wasm_bindgen::from_value(config)?)
            }
            Method::Energy if configured => {
                LayoutSession::with_energy(graph, serde_wasm_bindgen::from_value(config)?)
            }
            _ => LayoutSession::new(graph, method),
        };
        Ok(Self { session })
    }

    /// Get the number of vertices in the graph.
    #[wasm_bindgen(js_name = vertexCount)]
    pub fn vertex_count(&self) -> usize {
        self.session.graph().vertex_count()
    }

    /// Get the number of edges in the graph.
    #[wasm_bindgen(js_name = edgeCount)]
    pub fn edge_count(&self) -> usize {
        self.session.graph().edge_count()
    }

    /// Name of the running engine.
    pub fn method(&self) -> String {
        self.session.method().to_string()
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Resize vertex radii from a `{ minRadius, k }` object.
    #[wasm_bindgen(js_name = sizeRadii)]
    pub fn size_radii(&mut self, config: JsValue) -> std::result::Result<(), JsError> {
        let config: RadiusConfig = serde_wasm_bindgen::from_value(config)?;
        self.session.size_radii(&config)?;
        Ok(())
    }

    /// Seed positions and reset convergence state.
    ///
    /// With `circle` the vertices start evenly spaced on the unit circle,
    /// otherwise uniformly scattered in the unit square.
    pub fn start(&mut self, circle: bool) {
        self.session.start(Seed::from_circle_flag(circle));
    }

    /// Advance the layout by one frame.
    ///
    /// Force engine: `a` is the iteration batch, `b` the milestone cap
    /// (0 = unbounded). Energy engine: `a` and `b` are the viewport width and
    /// height. Returns true when `positions()` changed.
    pub fn step(&mut self, a: f64, b: f64) -> std::result::Result<bool, JsError> {
        Ok(self.session.step(a, b)?)
    }

    /// Relay a user drag.
    ///
    /// While dragging pass `recalculate = false`; the vertex moves by
    /// `(dx, dy)` and becomes pinned. On release pass `recalculate = true`.
    #[wasm_bindgen(js_name = movePos)]
    pub fn move_pos(
        &mut self,
        vertex: u32,
        dx: f32,
        dy: f32,
        recalculate: bool,
    ) -> std::result::Result<(), JsError> {
        self.session
            .move_pos(VertexId(vertex), Point::new(dx, dy), recalculate)?;
        Ok(())
    }

    /// Unpin a vertex so the engine moves it again.
    #[wasm_bindgen(js_name = releasePin)]
    pub fn release_pin(&mut self, vertex: u32) -> std::result::Result<(), JsError> {
        self.session.release_pin(VertexId(vertex))?;
        Ok(())
    }

    /// Temperature (force) or maximum vertex energy (energy).
    pub fn energy(&self) -> f64 {
        self.session.energy()
    }

    // =========================================================================
    // Frame Access
    // =========================================================================

    /// Latest frame as a Float32Array `[x0, y0, x1, y1, ...]`.
    pub fn positions(&self) -> Float32Array {
        Float32Array::from(&self.session.store().to_interleaved()[..])
    }

    /// Vertex radii as a Float32Array.
    pub fn radii(&self) -> Float32Array {
        Float32Array::from(&self.session.store().radii()[..])
    }

    /// Pinned flags, 1 for fixed vertices.
    #[wasm_bindgen(js_name = fixedFlags)]
    pub fn fixed_flags(&self) -> Vec<u8> {
        self.session.positions().iter().map(|p| p.fixed as u8).collect()
    }

    // =========================================================================
    // Spatial Queries
    // =========================================================================

    /// Find the vertex whose circle contains a point.
    ///
    /// Returns the vertex ID, or None if the point hits no vertex.
    #[wasm_bindgen(js_name = vertexAt)]
    pub fn vertex_at(&mut self, x: f32, y: f32) -> Option<u32> {
        self.session.vertex_at(x, y).map(VertexId::raw)
    }

    /// Find the vertex nearest to a point.
    ///
    /// Returns the vertex ID, or None if the graph is empty.
    #[wasm_bindgen(js_name = nearestVertex)]
    pub fn nearest_vertex(&mut self, x: f32, y: f32) -> Option<u32> {
        self.session.nearest(x, y).map(VertexId::raw)
    }
}
