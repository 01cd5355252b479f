// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Field Differentiation & Interpolation
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Electric field from a potential, and point queries on shared fields.
//!
//! E = -∇V with second-order differences on the non-uniform grid.
//! Queries take Cartesian points and return Cartesian vectors.

use rayon::prelude::*;
use ssd_math::interp::{gradient_at, interpolate, interpolate_vector};
use ssd_types::error::{DetectorError, SimResult};
use ssd_types::field::{ScalarField, Unit, VectorField};
use std::sync::Arc;

fn gradient_unit(unit: Unit) -> SimResult<Unit> {
    match unit {
        Unit::Volt => Ok(Unit::VoltPerMetre),
        Unit::Dimensionless => Ok(Unit::PerMetre),
        other => Err(DetectorError::PhysicsViolation(format!(
            "gradient of a {other:?} field is not supported"
        ))),
    }
}

/// ∇f at every node, in the grid's natural basis.
pub fn gradient_field(field: &ScalarField) -> SimResult<VectorField> {
    let unit = gradient_unit(field.unit())?;
    let grid = field.grid();
    let values = field.as_slice();
    let g: Vec<[f64; 3]> = (0..grid.len())
        .into_par_iter()
        .map(|flat| gradient_at(grid, values, flat))
        .collect();
    VectorField::from_flat(Arc::clone(grid), g, unit)
}

/// E = -∇V (V/m).
pub fn electric_field(potential: &ScalarField) -> SimResult<VectorField> {
    if potential.unit() != Unit::Volt {
        return Err(DetectorError::PhysicsViolation(format!(
            "electric field needs a potential in volts, got {:?}",
            potential.unit()
        )));
    }
    let grad = gradient_field(potential)?;
    let e: Vec<[f64; 3]> = grad
        .as_slice()
        .par_iter()
        .map(|g| [-g[0], -g[1], -g[2]])
        .collect();
    VectorField::from_flat(Arc::clone(potential.grid()), e, Unit::VoltPerMetre)
}

/// Multilinear point queries on a shared scalar field.
#[derive(Debug, Clone)]
pub struct InterpolatedScalar {
    field: Arc<ScalarField>,
}

impl InterpolatedScalar {
    pub fn new(field: Arc<ScalarField>) -> Self {
        InterpolatedScalar { field }
    }

    pub fn field(&self) -> &Arc<ScalarField> {
        &self.field
    }

    /// Value at a Cartesian point.
    pub fn at(&self, p: [f64; 3]) -> SimResult<f64> {
        let grid = self.field.grid();
        interpolate(grid, self.field.as_slice(), &grid.to_grid_coords(p))
    }
}

/// Multilinear point queries on a shared vector field.
#[derive(Debug, Clone)]
pub struct InterpolatedVector {
    field: Arc<VectorField>,
}

impl InterpolatedVector {
    pub fn new(field: Arc<VectorField>) -> Self {
        InterpolatedVector { field }
    }

    pub fn field(&self) -> &Arc<VectorField> {
        &self.field
    }

    pub fn unit(&self) -> Unit {
        self.field.unit()
    }

    /// Cartesian vector at a Cartesian point.
    ///
    /// Natural-basis components are interpolated and then rotated at the
    /// query azimuth.
    pub fn at(&self, p: [f64; 3]) -> SimResult<[f64; 3]> {
        let grid = self.field.grid();
        let v = interpolate_vector(grid, self.field.as_slice(), &grid.to_grid_coords(p))?;
        Ok(grid.basis_to_cartesian(v, grid.azimuth_of(p)))
    }
}
