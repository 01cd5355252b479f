//! Red-Black Successive Over-Relaxation (SOR) on non-uniform grids.
//!
//! The stencil is a finite-volume discretisation of
//!   ∇·(ε_r ∇V) = -ρ / ε₀
//! on the dual cells of a [`Grid`]. For every node `i` the balance
//!   Σ_j w_ij (V_j - V_i) + ρ_i Vol_i / ε₀ = 0
//! gives the Gauss-Seidel value `V_i* = (Σ_j w_ij V_j + ρ_i Vol_i / ε₀) / Σ_j w_ij`.
//! Missing neighbours at open grid edges carry no flux (mirror symmetry);
//! periodic axes wrap. Cylindrical face areas include the r factors, so the
//! axis r = 0 needs no special treatment apart from the azimuthal coupling.

use rayon::prelude::*;
use ssd_types::constants::EPSILON0;
use ssd_types::error::{DetectorError, SimResult};
use ssd_types::state::{CoordinateSystem, Grid};
use std::f64::consts::PI;

/// Maximum number of neighbours of a node (two per axis, three axes).
pub const MAX_NEIGHBOURS: usize = 6;

/// Precomputed coupling weights of every node.
#[derive(Debug, Clone)]
pub struct Stencil {
    neighbours: Vec<[usize; MAX_NEIGHBOURS]>,
    weights: Vec<[f64; MAX_NEIGHBOURS]>,
    /// Vol_i / ε₀, converts a charge density into the source of node `i`.
    source_scale: Vec<f64>,
}

/// Gauss-Seidel value of one node and the range spanned by its neighbours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Relaxed {
    pub value: f64,
    pub neighbour_min: f64,
    pub neighbour_max: f64,
}

impl Stencil {
    /// Build the stencil for `grid` with per-node relative permittivity.
    pub fn build(grid: &Grid, permittivity: &[f64]) -> SimResult<Self> {
        if permittivity.len() != grid.len() {
            return Err(DetectorError::ShapeMismatch {
                what: "permittivity".to_string(),
                expected: vec![grid.len()],
                actual: vec![permittivity.len()],
            });
        }
        if let Some(i) = permittivity.iter().position(|e| !e.is_finite() || *e <= 0.0) {
            return Err(DetectorError::PhysicsViolation(format!(
                "relative permittivity must be finite and > 0 at node {i}"
            )));
        }

        let n = grid.len();
        let mut neighbours = vec![[0usize; MAX_NEIGHBOURS]; n];
        let mut weights = vec![[0.0f64; MAX_NEIGHBOURS]; n];
        let mut source_scale = vec![0.0f64; n];

        for flat in 0..n {
            let multi = grid.multi_index(flat);
            source_scale[flat] = grid.cell_volume(flat) / EPSILON0;
            neighbours[flat] = [flat; MAX_NEIGHBOURS];
            for d in 0..grid.ndim() {
                let axis = grid.axis(d);
                let i = multi[d];
                let stride = grid.strides()[d] as isize;
                let candidates = [
                    (axis.below(i), axis.spacing_below(i), -1.0),
                    (axis.above(i), axis.spacing_above(i), 1.0),
                ];
                for (slot, (nb, h, side)) in candidates.into_iter().enumerate() {
                    let (Some(nb), Some(h)) = (nb, h) else {
                        continue;
                    };
                    let j = (flat as isize + (nb as isize - i as isize) * stride) as usize;
                    let coupling = face_coupling(grid, &multi, d, h, side);
                    let eps_face = 0.5 * (permittivity[flat] + permittivity[j]);
                    neighbours[flat][2 * d + slot] = j;
                    weights[flat][2 * d + slot] = eps_face * coupling;
                }
            }
        }

        Ok(Stencil {
            neighbours,
            weights,
            source_scale,
        })
    }

    pub fn len(&self) -> usize {
        self.neighbours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbours.is_empty()
    }

    /// Gauss-Seidel value of node `i` for charge density `rho` (C/m³).
    #[inline(always)]
    pub fn relax(&self, i: usize, values: &[f64], rho: f64) -> Relaxed {
        let mut sum_w = 0.0;
        let mut sum = 0.0;
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for k in 0..MAX_NEIGHBOURS {
            let w = self.weights[i][k];
            if w == 0.0 {
                continue;
            }
            let v = values[self.neighbours[i][k]];
            sum_w += w;
            sum += w * v;
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if sum_w == 0.0 {
            return Relaxed {
                value: values[i],
                neighbour_min: values[i],
                neighbour_max: values[i],
            };
        }
        Relaxed {
            value: (sum + rho * self.source_scale[i]) / sum_w,
            neighbour_min: lo,
            neighbour_max: hi,
        }
    }

    /// Value shared by a group of nodes held at one common potential, such
    /// as a floating contact. Only faces leading out of the group carry
    /// flux; `None` if the group couples to nothing outside.
    pub fn relax_group<F: Fn(usize) -> bool>(
        &self,
        nodes: &[usize],
        in_group: F,
        values: &[f64],
        rho: &[f64],
    ) -> Option<f64> {
        let mut sum_w = 0.0;
        let mut sum = 0.0;
        for &i in nodes {
            sum += rho[i] * self.source_scale[i];
            for k in 0..MAX_NEIGHBOURS {
                let w = self.weights[i][k];
                let j = self.neighbours[i][k];
                if w == 0.0 || in_group(j) {
                    continue;
                }
                sum_w += w;
                sum += w * values[j];
            }
        }
        (sum_w > 0.0).then(|| sum / sum_w)
    }

    /// Flux imbalance of node `i` divided by its total coupling (volts).
    pub fn residual_at(&self, i: usize, values: &[f64], rho: f64) -> f64 {
        let r = self.relax(i, values, rho);
        (r.value - values[i]).abs()
    }
}

/// Geometric coupling (face area / distance) between a node and its
/// neighbour along axis `d` on the given `side` (-1 below, +1 above).
fn face_coupling(grid: &Grid, multi: &[usize], d: usize, h: f64, side: f64) -> f64 {
    let axes = grid.axes();
    let width = |e: usize| axes[e].dual_width(multi[e]);
    match (grid.system(), grid.ndim()) {
        (CoordinateSystem::Cartesian, _) => {
            let area: f64 = (0..grid.ndim()).filter(|&e| e != d).map(width).product();
            area / h
        }
        (CoordinateSystem::Cylindrical, 2) => {
            let r = axes[0].values()[multi[0]];
            if d == 0 {
                let r_face = r + side * 0.5 * h;
                2.0 * PI * r_face * width(1) / h
            } else {
                let (r_lo, r_hi) = axes[0].dual_edges(multi[0]);
                let r_lo = r_lo.max(0.0);
                PI * (r_hi * r_hi - r_lo * r_lo) / h
            }
        }
        _ => {
            let r = axes[0].values()[multi[0]];
            let (r_lo, r_hi) = axes[0].dual_edges(multi[0]);
            let r_lo = r_lo.max(0.0);
            match d {
                0 => {
                    let r_face = r + side * 0.5 * h;
                    r_face * width(1) * width(2) / h
                }
                1 => {
                    if r <= 0.0 {
                        0.0
                    } else {
                        (r_hi - r_lo) * width(2) / (r * h)
                    }
                }
                _ => 0.5 * (r_hi * r_hi - r_lo * r_lo) * width(1) / h,
            }
        }
    }
}

/// Unknown nodes split by checkerboard colour.
#[derive(Debug, Clone, Default)]
pub struct RedBlack {
    pub red: Vec<usize>,
    pub black: Vec<usize>,
}

impl RedBlack {
    /// Partition the nodes selected by `is_unknown` by the parity of their
    /// index sum.
    pub fn partition<F: Fn(usize) -> bool>(grid: &Grid, is_unknown: F) -> Self {
        let mut out = RedBlack::default();
        for flat in 0..grid.len() {
            if !is_unknown(flat) {
                continue;
            }
            let parity: usize = grid.multi_index(flat).iter().sum();
            if parity % 2 == 0 {
                out.red.push(flat);
            } else {
                out.black.push(flat);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.red.len() + self.black.len()
    }

    pub fn is_empty(&self) -> bool {
        self.red.is_empty() && self.black.is_empty()
    }
}

/// Update one colour in parallel.
///
/// New values are computed from the current array for every node in `nodes`
/// and written back only after all of them are known, so the half-sweep
/// acts as a barrier. `update` returns the new value plus a per-node tag
/// that is left in `out` in node order. Returns the largest absolute change.
pub fn half_sweep<T, F>(
    values: &mut [f64],
    nodes: &[usize],
    out: &mut Vec<(f64, T)>,
    update: F,
) -> f64
where
    T: Send,
    F: Fn(usize, &[f64]) -> (f64, T) + Sync,
{
    {
        let current: &[f64] = values;
        nodes
            .par_iter()
            .map(|&i| update(i, current))
            .collect_into_vec(out);
    }
    let mut max_change = 0.0f64;
    for (&i, (v, _)) in nodes.iter().zip(out.iter()) {
        max_change = max_change.max((v - values[i]).abs());
        values[i] = *v;
    }
    max_change
}

/// Perform one Red-Black SOR iteration without depletion handling.
///
/// `rho` is the charge density per node (C/m³). Returns the largest change.
pub fn sor_step(
    values: &mut [f64],
    rho: &[f64],
    stencil: &Stencil,
    colours: &RedBlack,
    omega: f64,
) -> f64 {
    let mut buf: Vec<(f64, ())> = Vec::with_capacity(colours.red.len());
    let mut max_change = 0.0f64;
    for nodes in [&colours.red, &colours.black] {
        let change = half_sweep(values, nodes, &mut buf, |i, v| {
            let r = stencil.relax(i, v, rho[i]);
            ((1.0 - omega) * v[i] + omega * r.value, ())
        });
        max_change = max_change.max(change);
    }
    max_change
}

/// Run SOR until the largest change drops below `tol` or `max_iterations`
/// is reached. Returns `(converged, iterations, last_change)`.
pub fn sor_solve(
    values: &mut [f64],
    rho: &[f64],
    stencil: &Stencil,
    colours: &RedBlack,
    omega: f64,
    tol: f64,
    max_iterations: usize,
) -> (bool, usize, f64) {
    let mut change = f64::INFINITY;
    for k in 0..max_iterations {
        change = sor_step(values, rho, stencil, colours, omega);
        if change < tol {
            return (true, k + 1, change);
        }
    }
    (false, max_iterations, change)
}

/// L-infinity residual (volts) over the given nodes.
pub fn sor_residual(values: &[f64], rho: &[f64], stencil: &Stencil, colours: &RedBlack) -> f64 {
    colours
        .red
        .iter()
        .chain(colours.black.iter())
        .map(|&i| stencil.residual_at(i, values, rho[i]))
        .fold(0.0, f64::max)
}
