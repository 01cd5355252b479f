// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::constants::{
    GE_FANO_FACTOR, GE_IONIZATION_ENERGY_EV, GE_RELATIVE_PERMITTIVITY, SI_FANO_FACTOR,
    SI_IONIZATION_ENERGY_EV, SI_RELATIVE_PERMITTIVITY,
};
use crate::error::{DetectorError, SimResult};
use ndarray::{Array1, ArrayD};
use std::f64::consts::PI;

/// One grid axis: strictly increasing coordinates, optionally periodic.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    values: Array1<f64>,
    period: Option<f64>,
}

/// Position of a coordinate inside an axis cell.
/// `upper` wraps to 0 for the closing cell of a periodic axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellLocation {
    pub lower: usize,
    pub upper: usize,
    pub t: f64,
}

impl Axis {
    pub fn new(values: Vec<f64>) -> SimResult<Self> {
        if values.len() < 2 {
            return Err(DetectorError::InvalidGrid(format!(
                "axis needs at least 2 points, got {}",
                values.len()
            )));
        }
        for (i, v) in values.iter().enumerate() {
            if !v.is_finite() {
                return Err(DetectorError::InvalidGrid(format!(
                    "axis coordinate {i} is not finite"
                )));
            }
        }
        for (i, w) in values.windows(2).enumerate() {
            if w[1] <= w[0] {
                return Err(DetectorError::InvalidGrid(format!(
                    "axis must be strictly increasing: x[{}]={} >= x[{}]={}",
                    i,
                    w[0],
                    i + 1,
                    w[1]
                )));
            }
        }
        Ok(Axis {
            values: Array1::from(values),
            period: None,
        })
    }

    /// `n` equally spaced points on `[min, max]`.
    pub fn uniform(min: f64, max: f64, n: usize) -> SimResult<Self> {
        if n < 2 || !(max > min) {
            return Err(DetectorError::InvalidGrid(format!(
                "uniform axis needs n >= 2 and max > min, got n={n}, [{min}, {max}]"
            )));
        }
        let mut values = Array1::linspace(min, max, n).to_vec();
        // pin the end point so that `max` itself is inside the axis
        values[n - 1] = max;
        Self::new(values)
    }

    /// Periodic axis: the point after the last one is `values[0] + period`.
    pub fn periodic(values: Vec<f64>, period: f64) -> SimResult<Self> {
        let mut axis = Self::new(values)?;
        let span = axis.max() - axis.min();
        if !period.is_finite() || period <= span {
            return Err(DetectorError::InvalidGrid(format!(
                "period {period} must exceed axis span {span}"
            )));
        }
        axis.period = Some(period);
        Ok(axis)
    }

    /// `n` uniform slices covering `[0, 2π)`.
    pub fn azimuthal(n: usize) -> SimResult<Self> {
        if n < 2 {
            return Err(DetectorError::InvalidGrid(format!(
                "azimuthal axis needs at least 2 slices, got {n}"
            )));
        }
        let step = 2.0 * PI / n as f64;
        Self::periodic((0..n).map(|k| k as f64 * step).collect(), 2.0 * PI)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn period(&self) -> Option<f64> {
        self.period
    }

    pub fn is_periodic(&self) -> bool {
        self.period.is_some()
    }

    pub fn min(&self) -> f64 {
        self.values[0]
    }

    pub fn max(&self) -> f64 {
        self.values[self.len() - 1]
    }

    /// Upper bound of the covered interval (closing cell included when periodic).
    pub fn upper_bound(&self) -> f64 {
        match self.period {
            Some(p) => self.min() + p,
            None => self.max(),
        }
    }

    /// Distance to the previous node, wrapping on periodic axes.
    pub fn spacing_below(&self, i: usize) -> Option<f64> {
        if i > 0 {
            Some(self.values[i] - self.values[i - 1])
        } else {
            self.period
                .map(|p| self.values[0] + p - self.values[self.len() - 1])
        }
    }

    /// Distance to the next node, wrapping on periodic axes.
    pub fn spacing_above(&self, i: usize) -> Option<f64> {
        if i + 1 < self.len() {
            Some(self.values[i + 1] - self.values[i])
        } else {
            self.period
                .map(|p| self.values[0] + p - self.values[self.len() - 1])
        }
    }

    /// Index of the neighbour below `i`, if any.
    pub fn below(&self, i: usize) -> Option<usize> {
        if i > 0 {
            Some(i - 1)
        } else if self.is_periodic() {
            Some(self.len() - 1)
        } else {
            None
        }
    }

    /// Index of the neighbour above `i`, if any.
    pub fn above(&self, i: usize) -> Option<usize> {
        if i + 1 < self.len() {
            Some(i + 1)
        } else if self.is_periodic() {
            Some(0)
        } else {
            None
        }
    }

    /// Width of the dual cell around node `i` (half cells at open edges).
    pub fn dual_width(&self, i: usize) -> f64 {
        let lo = self.spacing_below(i).unwrap_or(0.0);
        let hi = self.spacing_above(i).unwrap_or(0.0);
        0.5 * (lo + hi)
    }

    /// Lower and upper edge of the dual cell around node `i`.
    pub fn dual_edges(&self, i: usize) -> (f64, f64) {
        let x = self.values[i];
        let lo = self.spacing_below(i).map_or(x, |h| x - 0.5 * h);
        let hi = self.spacing_above(i).map_or(x, |h| x + 0.5 * h);
        (lo, hi)
    }

    fn wrap(&self, x: f64) -> f64 {
        match self.period {
            Some(p) => self.min() + (x - self.min()).rem_euclid(p),
            None => x,
        }
    }

    /// Locate `x` inside an axis cell. `None` when outside a non-periodic axis.
    pub fn locate(&self, x: f64) -> Option<CellLocation> {
        if !x.is_finite() {
            return None;
        }
        let x = self.wrap(x);
        let n = self.len();
        if x < self.min() || x > self.upper_bound() {
            return None;
        }
        if x >= self.max() {
            return match self.period {
                Some(p) => {
                    let h = self.min() + p - self.max();
                    Some(CellLocation {
                        lower: n - 1,
                        upper: 0,
                        t: ((x - self.max()) / h).clamp(0.0, 1.0),
                    })
                }
                None => Some(CellLocation {
                    lower: n - 2,
                    upper: n - 1,
                    t: 1.0,
                }),
            };
        }
        let values = self.values.as_slice().unwrap_or(&[]);
        let upper = values.partition_point(|&v| v <= x).clamp(1, n - 1);
        let lower = upper - 1;
        let t = (x - values[lower]) / (values[upper] - values[lower]);
        Some(CellLocation {
            lower,
            upper,
            t: t.clamp(0.0, 1.0),
        })
    }

    /// Nearest node index to `x`, or `None` if outside the axis.
    pub fn nearest(&self, x: f64) -> Option<usize> {
        self.locate(x)
            .map(|c| if c.t < 0.5 { c.lower } else { c.upper })
    }

    /// Contains `x` (periodic axes contain everything finite).
    pub fn contains(&self, x: f64) -> bool {
        self.locate(x).is_some()
    }
}

/// Coordinate system of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSystem {
    /// Axes (x, y, z).
    Cartesian,
    /// Axes (r, z) for azimuthally symmetric problems or (r, φ, z).
    Cylindrical,
}

/// Discretized coordinate system with non-uniform spacing.
///
/// Node data is stored row-major: the last axis varies fastest.
/// Vector data always has three components in the natural basis
/// ((x, y, z) or (r, φ, z); φ stays zero on a 2-D cylindrical grid).
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    system: CoordinateSystem,
    axes: Vec<Axis>,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl Grid {
    pub fn new(system: CoordinateSystem, axes: Vec<Axis>) -> SimResult<Self> {
        match (system, axes.len()) {
            (CoordinateSystem::Cartesian, 3) => {}
            (CoordinateSystem::Cylindrical, 2) | (CoordinateSystem::Cylindrical, 3) => {}
            (s, n) => {
                return Err(DetectorError::InvalidGrid(format!(
                    "{s:?} grid cannot have {n} axes"
                )))
            }
        }
        if system == CoordinateSystem::Cylindrical {
            if axes[0].min() < 0.0 {
                return Err(DetectorError::InvalidGrid(format!(
                    "radial axis must start at r >= 0, got {}",
                    axes[0].min()
                )));
            }
            if axes[0].is_periodic() || axes[axes.len() - 1].is_periodic() {
                return Err(DetectorError::InvalidGrid(
                    "only the azimuthal axis of a cylindrical grid may be periodic".to_string(),
                ));
            }
            if axes.len() == 3 {
                let phi = &axes[1];
                if phi.min() < 0.0 || phi.upper_bound() > 2.0 * PI + 1e-12 {
                    return Err(DetectorError::InvalidGrid(format!(
                        "azimuthal axis must lie in [0, 2π], got [{}, {}]",
                        phi.min(),
                        phi.upper_bound()
                    )));
                }
            }
        }
        let shape: Vec<usize> = axes.iter().map(Axis::len).collect();
        let mut strides = vec![1usize; shape.len()];
        for d in (0..shape.len().saturating_sub(1)).rev() {
            strides[d] = strides[d + 1] * shape[d + 1];
        }
        Ok(Grid {
            system,
            axes,
            shape,
            strides,
        })
    }

    pub fn cartesian(x: Axis, y: Axis, z: Axis) -> SimResult<Self> {
        Self::new(CoordinateSystem::Cartesian, vec![x, y, z])
    }

    /// Azimuthally symmetric (r, z) grid.
    pub fn cylindrical_2d(r: Axis, z: Axis) -> SimResult<Self> {
        Self::new(CoordinateSystem::Cylindrical, vec![r, z])
    }

    pub fn cylindrical_3d(r: Axis, phi: Axis, z: Axis) -> SimResult<Self> {
        Self::new(CoordinateSystem::Cylindrical, vec![r, phi, z])
    }

    pub fn system(&self) -> CoordinateSystem {
        self.system
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn axis(&self, d: usize) -> &Axis {
        &self.axes[d]
    }

    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_cylindrical(&self) -> bool {
        self.system == CoordinateSystem::Cylindrical
    }

    /// Index of the azimuthal axis on a 3-D cylindrical grid.
    pub fn azimuthal_axis(&self) -> Option<usize> {
        (self.is_cylindrical() && self.ndim() == 3).then_some(1)
    }

    /// Vector component carried along grid axis `d`.
    pub fn component_of_axis(&self, d: usize) -> usize {
        if self.is_cylindrical() && self.ndim() == 2 && d == 1 {
            2
        } else {
            d
        }
    }

    pub fn index_of(&self, multi: &[usize]) -> usize {
        multi
            .iter()
            .zip(self.strides.iter())
            .map(|(i, s)| i * s)
            .sum()
    }

    pub fn multi_index(&self, flat: usize) -> Vec<usize> {
        let mut rest = flat;
        self.strides
            .iter()
            .map(|s| {
                let i = rest / s;
                rest %= s;
                i
            })
            .collect()
    }

    /// Grid coordinates of a node.
    pub fn node_coords(&self, flat: usize) -> Vec<f64> {
        self.multi_index(flat)
            .iter()
            .zip(self.axes.iter())
            .map(|(&i, a)| a.values()[i])
            .collect()
    }

    /// Azimuth of a node (0 on 2-D cylindrical and Cartesian grids).
    pub fn node_azimuth(&self, flat: usize) -> f64 {
        match self.azimuthal_axis() {
            Some(d) => self.axes[d].values()[(flat / self.strides[d]) % self.shape[d]],
            None => 0.0,
        }
    }

    /// Cartesian position of a node. 2-D cylindrical nodes lie in the φ = 0 plane.
    pub fn node_position(&self, flat: usize) -> [f64; 3] {
        self.to_cartesian(&self.node_coords(flat))
    }

    pub fn to_cartesian(&self, coords: &[f64]) -> [f64; 3] {
        match (self.system, coords.len()) {
            (CoordinateSystem::Cylindrical, 2) => [coords[0], 0.0, coords[1]],
            (CoordinateSystem::Cylindrical, _) => [
                coords[0] * coords[1].cos(),
                coords[0] * coords[1].sin(),
                coords[2],
            ],
            _ => [coords[0], coords[1], coords[2]],
        }
    }

    /// Convert a Cartesian point to grid coordinates.
    pub fn to_grid_coords(&self, p: [f64; 3]) -> Vec<f64> {
        match (self.system, self.ndim()) {
            (CoordinateSystem::Cartesian, _) => p.to_vec(),
            (CoordinateSystem::Cylindrical, 2) => vec![p[0].hypot(p[1]), p[2]],
            _ => {
                let phi = p[1].atan2(p[0]).rem_euclid(2.0 * PI);
                vec![p[0].hypot(p[1]), phi, p[2]]
            }
        }
    }

    /// Azimuth of a Cartesian point (used to rotate basis vectors).
    pub fn azimuth_of(&self, p: [f64; 3]) -> f64 {
        if self.is_cylindrical() {
            p[1].atan2(p[0])
        } else {
            0.0
        }
    }

    /// Rotate a natural-basis vector at azimuth `phi` into Cartesian components.
    pub fn basis_to_cartesian(&self, v: [f64; 3], phi: f64) -> [f64; 3] {
        if !self.is_cylindrical() {
            return v;
        }
        let (s, c) = phi.sin_cos();
        [v[0] * c - v[1] * s, v[0] * s + v[1] * c, v[2]]
    }

    /// Rotate a Cartesian vector at azimuth `phi` into the natural basis.
    pub fn cartesian_to_basis(&self, v: [f64; 3], phi: f64) -> [f64; 3] {
        if !self.is_cylindrical() {
            return v;
        }
        let (s, c) = phi.sin_cos();
        [v[0] * c + v[1] * s, -v[0] * s + v[1] * c, v[2]]
    }

    pub fn contains_grid_coords(&self, coords: &[f64]) -> bool {
        coords.len() == self.ndim()
            && coords
                .iter()
                .zip(self.axes.iter())
                .all(|(&x, a)| a.contains(x))
    }

    /// Nearest node to a Cartesian point, `None` if outside the grid.
    pub fn nearest_node(&self, p: [f64; 3]) -> Option<usize> {
        let coords = self.to_grid_coords(p);
        let mut multi = Vec::with_capacity(self.ndim());
        for (x, a) in coords.iter().zip(self.axes.iter()) {
            multi.push(a.nearest(*x)?);
        }
        Some(self.index_of(&multi))
    }

    /// Smallest positive spacing of the cell containing `coords` along each axis,
    /// converted to a length (r·dφ on the azimuthal axis).
    pub fn local_cell_size(&self, coords: &[f64]) -> Option<f64> {
        let mut size = f64::INFINITY;
        for (d, (x, a)) in coords.iter().zip(self.axes.iter()).enumerate() {
            let c = a.locate(*x)?;
            let mut h = a.spacing_above(c.lower).unwrap_or(0.0);
            if Some(d) == self.azimuthal_axis() {
                h *= coords[0];
            }
            if h > 0.0 {
                size = size.min(h);
            }
        }
        size.is_finite().then_some(size)
    }

    /// Volume of the dual cell around a node (m³).
    ///
    /// 2-D cylindrical cells are full rings (2π), 3-D cylindrical cells are
    /// annular sectors.
    pub fn cell_volume(&self, flat: usize) -> f64 {
        let multi = self.multi_index(flat);
        match (self.system, self.ndim()) {
            (CoordinateSystem::Cartesian, _) => multi
                .iter()
                .zip(self.axes.iter())
                .map(|(&i, a)| a.dual_width(i))
                .product(),
            (CoordinateSystem::Cylindrical, 2) => {
                let (r_lo, r_hi) = self.axes[0].dual_edges(multi[0]);
                let r_lo = r_lo.max(0.0);
                PI * (r_hi * r_hi - r_lo * r_lo) * self.axes[1].dual_width(multi[1])
            }
            _ => {
                let (r_lo, r_hi) = self.axes[0].dual_edges(multi[0]);
                let r_lo = r_lo.max(0.0);
                0.5 * (r_hi * r_hi - r_lo * r_lo)
                    * self.axes[1].dual_width(multi[1])
                    * self.axes[2].dual_width(multi[2])
            }
        }
    }

    /// Check that an array has exactly this grid's shape.
    pub fn check_shape(&self, what: &str, actual: &[usize]) -> SimResult<()> {
        if actual != self.shape.as_slice() {
            return Err(DetectorError::ShapeMismatch {
                what: what.to_string(),
                expected: self.shape.clone(),
                actual: actual.to_vec(),
            });
        }
        Ok(())
    }
}

/// Classification tag of a grid node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointType {
    /// Dirichlet node held at a contact bias.
    Fixed,
    /// Depleted semiconductor node updated by relaxation.
    Free,
    /// Semiconductor node in an undepleted (floating) region.
    Undepleted,
    /// Node outside the active volume (surroundings); relaxed without charge.
    Outside,
    /// Not yet classified.
    #[default]
    Undefined,
}

impl PointType {
    /// Semiconductor bulk (depleted or not).
    pub fn is_bulk(self) -> bool {
        matches!(self, PointType::Free | PointType::Undepleted)
    }

    /// Updated by the relaxation sweep.
    pub fn is_unknown(self) -> bool {
        matches!(
            self,
            PointType::Free | PointType::Undepleted | PointType::Outside
        )
    }
}

/// Point-type tags, parallel to a potential array on the same grid.
///
/// Tags are stored flat in the grid's row-major node order whatever the
/// memory layout of the array they were built from. Nodes of floating
/// contacts carry `Undepleted` and are additionally marked floating; they
/// do not count as undepleted semiconductor.
#[derive(Debug, Clone, PartialEq)]
pub struct PointTypes {
    tags: Vec<PointType>,
    floating: Vec<bool>,
    shape: Vec<usize>,
}

impl PointTypes {
    pub fn new(grid: &Grid, tags: ArrayD<PointType>) -> SimResult<Self> {
        grid.check_shape("point types", tags.shape())?;
        let tags: Vec<PointType> = tags.iter().copied().collect();
        Ok(PointTypes {
            floating: vec![false; tags.len()],
            tags,
            shape: grid.shape().to_vec(),
        })
    }

    pub fn from_elem(grid: &Grid, tag: PointType) -> Self {
        PointTypes {
            tags: vec![tag; grid.len()],
            floating: vec![false; grid.len()],
            shape: grid.shape().to_vec(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn as_slice(&self) -> &[PointType] {
        &self.tags
    }

    pub fn get(&self, flat: usize) -> PointType {
        self.tags[flat]
    }

    pub fn set(&mut self, flat: usize, tag: PointType) {
        self.tags[flat] = tag;
    }

    /// Mark `flat` as part of a floating contact.
    pub fn mark_floating(&mut self, flat: usize) {
        self.floating[flat] = true;
    }

    pub fn is_floating(&self, flat: usize) -> bool {
        self.floating[flat]
    }

    pub fn count(&self, tag: PointType) -> usize {
        self.tags.iter().filter(|&&t| t == tag).count()
    }

    /// Undepleted semiconductor nodes, floating contacts excluded.
    pub fn undepleted_count(&self) -> usize {
        self.tags
            .iter()
            .zip(&self.floating)
            .filter(|(&t, &f)| t == PointType::Undepleted && !f)
            .count()
    }

    /// Depleted (active) volume: dual-cell volume of all `Free` nodes (m³).
    pub fn active_volume(&self, grid: &Grid) -> f64 {
        self.volume_where(grid, |i| self.tags[i] == PointType::Free)
    }

    /// Volume of the undepleted semiconductor region (m³).
    pub fn undepleted_volume(&self, grid: &Grid) -> f64 {
        self.volume_where(grid, |i| {
            self.tags[i] == PointType::Undepleted && !self.floating[i]
        })
    }

    fn volume_where<F: Fn(usize) -> bool>(&self, grid: &Grid, keep: F) -> f64 {
        (0..self.tags.len())
            .filter(|&i| keep(i))
            .map(|i| grid.cell_volume(i))
            .sum()
    }

    pub fn is_fully_depleted(&self) -> bool {
        self.undepleted_count() == 0
    }
}

/// Bulk material of a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub relative_permittivity: f64,
    /// Mean energy to create one electron-hole pair (eV).
    pub ionization_energy_ev: f64,
    pub fano_factor: f64,
}

impl Material {
    pub fn germanium() -> Self {
        Material {
            name: "HPGe".to_string(),
            relative_permittivity: GE_RELATIVE_PERMITTIVITY,
            ionization_energy_ev: GE_IONIZATION_ENERGY_EV,
            fano_factor: GE_FANO_FACTOR,
        }
    }

    pub fn silicon() -> Self {
        Material {
            name: "Si".to_string(),
            relative_permittivity: SI_RELATIVE_PERMITTIVITY,
            ionization_energy_ev: SI_IONIZATION_ENERGY_EV,
            fano_factor: SI_FANO_FACTOR,
        }
    }
}

/// Outcome of a potential solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    pub converged: bool,
    pub iterations: usize,
    /// Largest node change of the last checked sweep, relative to the bias span.
    pub max_change: f64,
    /// Point-type changes during the last checked sweep.
    pub reclassified: usize,
    pub undepleted_nodes: usize,
    pub solve_time_ms: f64,
}
