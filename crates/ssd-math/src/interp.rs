//! Multilinear interpolation and finite differences on non-uniform grids.
//!
//! Interpolation never extrapolates: a coordinate outside a non-periodic
//! axis yields [`DetectorError::OutOfDomain`].

use ssd_types::error::{DetectorError, SimResult};
use ssd_types::state::Grid;

/// Corner nodes and weights of the cell enclosing a point.
#[derive(Debug, Clone, Copy)]
pub struct Corners {
    pub index: [usize; 8],
    pub weight: [f64; 8],
    pub count: usize,
}

/// Locate `coords` (grid coordinates) and return the multilinear corner weights.
pub fn corners(grid: &Grid, coords: &[f64]) -> SimResult<Corners> {
    let ndim = grid.ndim();
    let mut cells = [(0usize, 0usize, 0.0f64); 3];
    for d in 0..ndim {
        let axis = grid.axis(d);
        let x = coords[d];
        let c = axis.locate(x).ok_or(DetectorError::OutOfDomain {
            axis: d,
            value: x,
            min: axis.min(),
            max: axis.upper_bound(),
        })?;
        cells[d] = (c.lower, c.upper, c.t);
    }

    let count = 1usize << ndim;
    let mut out = Corners {
        index: [0; 8],
        weight: [0.0; 8],
        count,
    };
    for corner in 0..count {
        let mut flat = 0usize;
        let mut w = 1.0;
        for (d, &(lo, hi, t)) in cells.iter().enumerate().take(ndim) {
            if corner & (1 << d) == 0 {
                flat += lo * grid.strides()[d];
                w *= 1.0 - t;
            } else {
                flat += hi * grid.strides()[d];
                w *= t;
            }
        }
        out.index[corner] = flat;
        out.weight[corner] = w;
    }
    Ok(out)
}

/// Multilinear interpolation of flat row-major `values` at grid coordinates.
pub fn interpolate(grid: &Grid, values: &[f64], coords: &[f64]) -> SimResult<f64> {
    let c = corners(grid, coords)?;
    Ok((0..c.count).map(|k| c.weight[k] * values[c.index[k]]).sum())
}

/// Multilinear interpolation of three-component values.
pub fn interpolate_vector(grid: &Grid, values: &[[f64; 3]], coords: &[f64]) -> SimResult<[f64; 3]> {
    let c = corners(grid, coords)?;
    let mut out = [0.0; 3];
    for k in 0..c.count {
        let v = values[c.index[k]];
        for (o, x) in out.iter_mut().zip(v.iter()) {
            *o += c.weight[k] * x;
        }
    }
    Ok(out)
}

/// Derivative of `values` along axis `d` at node `flat`.
///
/// Second-order central differences with the actual node spacing in the
/// interior, one-sided differences at open edges, wrap-around on periodic
/// axes.
pub fn axis_derivative(grid: &Grid, values: &[f64], flat: usize, d: usize, i: usize) -> f64 {
    let axis = grid.axis(d);
    let stride = grid.strides()[d] as isize;
    let at = |j: usize| values[(flat as isize + (j as isize - i as isize) * stride) as usize];
    let f0 = values[flat];
    match (
        axis.below(i).zip(axis.spacing_below(i)),
        axis.above(i).zip(axis.spacing_above(i)),
    ) {
        (Some((lo, hm)), Some((hi, hp))) => {
            let fm = at(lo);
            let fp = at(hi);
            (hm * hm * (fp - f0) + hp * hp * (f0 - fm)) / (hm * hp * (hm + hp))
        }
        (None, Some((hi, hp))) => (at(hi) - f0) / hp,
        (Some((lo, hm)), None) => (f0 - at(lo)) / hm,
        (None, None) => 0.0,
    }
}

/// Gradient of flat `values` in the grid's natural basis.
///
/// Cylindrical grids return (∂/∂r, (1/r) ∂/∂φ, ∂/∂z). At r = 0 of a 2-D
/// (r, z) grid the radial component vanishes by symmetry. On the axis of a
/// 3-D grid the transverse gradient is fitted through the first ring and
/// expressed in the basis of the axis node's own φ.
pub fn gradient(grid: &Grid, values: &[f64]) -> Vec<[f64; 3]> {
    (0..grid.len())
        .map(|flat| gradient_at(grid, values, flat))
        .collect()
}

/// Gradient at a single node, see [`gradient`].
pub fn gradient_at(grid: &Grid, values: &[f64], flat: usize) -> [f64; 3] {
    let multi = grid.multi_index(flat);
    let mut g = [0.0; 3];
    let on_axis = grid.is_cylindrical() && grid.axis(0).values()[multi[0]] <= 0.0;
    if on_axis && grid.azimuthal_axis().is_some() {
        return axis_gradient(grid, values, flat, &multi);
    }
    for d in 0..grid.ndim() {
        let comp = grid.component_of_axis(d);
        if on_axis && comp != 2 {
            continue;
        }
        let mut df = axis_derivative(grid, values, flat, d, multi[d]);
        if Some(d) == grid.azimuthal_axis() {
            df /= grid.axis(0).values()[multi[0]];
        }
        g[comp] = df;
    }
    g
}

/// Gradient at an r = 0 node of a 3-D cylindrical grid.
///
/// Least-squares fit of (V(r₁, φ_k) - V₀) / r₁ = g_x cos φ_k + g_y sin φ_k
/// over the first ring, exact for fields linear in x and y.
fn axis_gradient(grid: &Grid, values: &[f64], flat: usize, multi: &[usize]) -> [f64; 3] {
    let gz = axis_derivative(grid, values, flat, 2, multi[2]);
    let radii = grid.axis(0).values();
    let mut gxy = [0.0, 0.0];
    if radii.len() > 1 {
        let r1 = radii[1] - radii[0];
        let phi_stride = grid.strides()[1];
        let ring = flat - multi[1] * phi_stride + grid.strides()[0];
        let f0 = values[flat];
        let (mut cc, mut cs, mut ss, mut bc, mut bs) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (k, phi) in grid.axis(1).values().iter().enumerate() {
            let (s, c) = phi.sin_cos();
            let slope = (values[ring + k * phi_stride] - f0) / r1;
            cc += c * c;
            cs += c * s;
            ss += s * s;
            bc += slope * c;
            bs += slope * s;
        }
        let det = cc * ss - cs * cs;
        // fewer than two independent directions on the ring
        if det > 1e-12 * (cc + ss) * (cc + ss) {
            gxy = [(bc * ss - bs * cs) / det, (cc * bs - cs * bc) / det];
        }
    }
    grid.cartesian_to_basis([gxy[0], gxy[1], gz], grid.node_azimuth(flat))
}
