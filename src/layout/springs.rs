//! All-pairs hop distances and the spring table derived from them.
//!
//! Hop counts come from Floyd-Warshall over the unweighted graph (O(n^3)),
//! which is why the energy engine only rebuilds them on `start` and on
//! drag-finalize. Springs turn each hop count `h` into an ideal length
//! `h / max_hop` and a strength `k / h^2`.

use serde::Serialize;

use crate::graph::Graph;

/// Hop count of a pair with no connecting path.
///
/// Half of `u32::MAX`, so adding two of them in the relaxation cannot wrap.
pub const UNREACHABLE: u32 = u32::MAX / 2;

/// Dense `n x n` matrix of shortest-path hop counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HopMatrix {
    n: usize,
    hops: Vec<u32>,
}

impl HopMatrix {
    /// Run Floyd-Warshall over `graph`.
    pub fn compute(graph: &Graph) -> Self {
        let n = graph.vertex_count();
        let mut hops = vec![UNREACHABLE; n * n];
        for v in 0..n {
            hops[v * n + v] = 0;
        }
        for (a, b) in graph.edges() {
            hops[a * n + b] = 1;
            hops[b * n + a] = 1;
        }

        for k in 0..n {
            for i in 0..n {
                let ik = hops[i * n + k];
                if ik == UNREACHABLE {
                    continue;
                }
                for j in 0..n {
                    let through = ik + hops[k * n + j];
                    if through < hops[i * n + j] {
                        hops[i * n + j] = through;
                    }
                }
            }
        }

        Self { n, hops }
    }

    pub fn vertex_count(&self) -> usize {
        self.n
    }

    /// Hop count between `i` and `j`, [`UNREACHABLE`] when disconnected.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> u32 {
        self.hops[i * self.n + j]
    }

    pub fn row(&self, i: usize) -> &[u32] {
        &self.hops[i * self.n..(i + 1) * self.n]
    }

    /// Largest finite hop count; 0 when no two vertices are connected.
    pub fn max_finite(&self) -> u32 {
        self.hops
            .iter()
            .copied()
            .filter(|&h| h != UNREACHABLE)
            .max()
            .unwrap_or(0)
    }

    /// Rows as nested vectors.
    pub fn to_rows(&self) -> Vec<Vec<u32>> {
        (0..self.n).map(|i| self.row(i).to_vec()).collect()
    }
}

/// Ideal length and strength of the spring between two vertices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Spring {
    pub length: f64,
    pub strength: f64,
}

/// Per ordered pair springs, zero on the diagonal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpringTable {
    n: usize,
    springs: Vec<Spring>,
}

impl SpringTable {
    /// An all-zero table, used before the first `start`.
    pub fn zeroed(n: usize) -> Self {
        Self {
            n,
            springs: vec![Spring::default(); n * n],
        }
    }

    /// Derive every spring from `hops` with stiffness constant `k`.
    pub fn build(hops: &HopMatrix, k: f64) -> Self {
        let n = hops.vertex_count();
        let mut table = Self::zeroed(n);
        let scale = SpringScale::of(hops);
        for v in 0..n {
            table.fill_row(hops, k, scale, v);
        }
        table
    }

    /// Recompute the springs of row `v` only.
    pub fn rebuild_row(&mut self, hops: &HopMatrix, k: f64, v: usize) {
        let scale = SpringScale::of(hops);
        self.fill_row(hops, k, scale, v);
    }

    fn fill_row(&mut self, hops: &HopMatrix, k: f64, scale: SpringScale, v: usize) {
        let n = self.n;
        for other in 0..n {
            self.springs[v * n + other] = if v == other {
                Spring::default()
            } else {
                scale.spring(hops.get(v, other), k)
            };
        }
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Spring {
        self.springs[i * self.n + j]
    }

    pub fn row(&self, i: usize) -> &[Spring] {
        &self.springs[i * self.n..(i + 1) * self.n]
    }

    pub fn vertex_count(&self) -> usize {
        self.n
    }
}

#[derive(Debug, Clone, Copy)]
struct SpringScale {
    max_hop: u32,
}

impl SpringScale {
    fn of(hops: &HopMatrix) -> Self {
        Self {
            max_hop: hops.max_finite(),
        }
    }

    fn spring(self, hop: u32, k: f64) -> Spring {
        // Disconnected pairs sit one hop beyond the farthest connected pair.
        let hop = if hop == UNREACHABLE {
            self.max_hop + 1
        } else {
            hop
        } as f64;
        Spring {
            length: hop / self.max_hop.max(1) as f64,
            strength: k / (hop * hop),
        }
    }
}
