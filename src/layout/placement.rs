//! Initial placement and radius sizing.
//!
//! Both engines start from one of two seeds:
//! - **Circle**: vertex `i` sits at angle `2*pi*i/n` on the unit circle. The
//!   result only depends on `n`, so restarting reproduces it exactly.
//! - **Random**: every vertex lands uniformly in the unit square. The
//!   thread-local generator is used unless a seed is supplied.
//!
//! Radii grow logarithmically with degree so hubs stand out. They are sized
//! once, before an engine starts, and never touched by the engines.

use std::f64::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::{Graph, Point, Position, ensure_len};

/// Initial placement mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Seed {
    /// Evenly spaced on the unit circle.
    #[default]
    Circle,
    /// Uniform in the unit square; `seed` pins the generator stream.
    Random {
        #[serde(default)]
        seed: Option<u64>,
    },
}

impl Seed {
    /// `Circle` when `circle` is true, an unseeded `Random` otherwise.
    pub fn from_circle_flag(circle: bool) -> Self {
        if circle {
            Seed::Circle
        } else {
            Seed::Random { seed: None }
        }
    }
}

/// Place every vertex according to `mode` and clear all fixed flags.
pub fn seed(mode: Seed, positions: &mut [Position]) {
    match mode {
        Seed::Circle => place_on_circle(positions),
        Seed::Random { seed: Some(s) } => scatter(&mut StdRng::seed_from_u64(s), positions),
        Seed::Random { seed: None } => scatter(&mut rand::thread_rng(), positions),
    }
}

fn place_on_circle(positions: &mut [Position]) {
    if positions.is_empty() {
        return;
    }
    let angle = TAU / positions.len() as f64;
    for (i, p) in positions.iter_mut().enumerate() {
        let theta = i as f64 * angle;
        p.pos = Point::new(theta.cos() as f32, theta.sin() as f32);
        p.fixed = false;
    }
}

fn scatter<R: Rng + ?Sized>(rng: &mut R, positions: &mut [Position]) {
    for p in positions.iter_mut() {
        p.pos = Point::new(rng.r#gen::<f32>(), rng.r#gen::<f32>());
        p.fixed = false;
    }
}

/// Configuration for degree-based radius sizing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RadiusConfig {
    /// Radius of low-degree vertices (default: 4.0).
    pub min_radius: f32,
    /// Degree multiplier inside the logarithm (default: 300.0).
    pub k: f32,
}

impl Default for RadiusConfig {
    fn default() -> Self {
        Self {
            min_radius: 4.0,
            k: 300.0,
        }
    }
}

/// Assign `min_radius + max(0, log2(k * degree / n))` to every vertex.
pub fn size_radii(graph: &Graph, positions: &mut [Position], config: &RadiusConfig) -> Result<()> {
    ensure_len(positions, graph.vertex_count())?;
    fill_radii(graph, positions, config);
    Ok(())
}

/// Radius sizing for a buffer already known to match `graph`.
pub(crate) fn fill_radii(graph: &Graph, positions: &mut [Position], config: &RadiusConfig) {
    let n = graph.vertex_count() as f32;
    for (v, p) in positions.iter_mut().enumerate() {
        let bump = (config.k * graph.degree(v) as f32 / n).log2();
        p.radius = config.min_radius + bump.max(0.0);
    }
}
