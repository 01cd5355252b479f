// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Fields
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::error::{DetectorError, SimResult};
use crate::state::Grid;
use ndarray::{ArrayD, IxDyn};
use std::sync::Arc;

/// Physical unit of field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Volt,
    /// Weighting potentials.
    Dimensionless,
    VoltPerMetre,
    /// Gradient of a dimensionless field.
    PerMetre,
    MetrePerSecond,
    CoulombPerCubicMetre,
}

/// Replication factor intended for a reduced-symmetry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AzimuthalSymmetry {
    pub slices: usize,
}

/// Dense scalar values on a grid.
#[derive(Debug, Clone)]
pub struct ScalarField {
    grid: Arc<Grid>,
    values: ArrayD<f64>,
    unit: Unit,
    symmetry: Option<AzimuthalSymmetry>,
}

impl ScalarField {
    pub fn new(grid: Arc<Grid>, values: ArrayD<f64>, unit: Unit) -> SimResult<Self> {
        grid.check_shape("scalar field", values.shape())?;
        Ok(ScalarField {
            grid,
            values: values.as_standard_layout().into_owned(),
            unit,
            symmetry: None,
        })
    }

    pub fn from_elem(grid: Arc<Grid>, value: f64, unit: Unit) -> Self {
        let values = ArrayD::from_elem(IxDyn(grid.shape()), value);
        ScalarField {
            grid,
            values,
            unit,
            symmetry: None,
        }
    }

    /// Build from a flat row-major vector.
    pub fn from_flat(grid: Arc<Grid>, flat: Vec<f64>, unit: Unit) -> SimResult<Self> {
        let values = ArrayD::from_shape_vec(IxDyn(grid.shape()), flat).map_err(|e| {
            DetectorError::ShapeMismatch {
                what: format!("scalar field ({e})"),
                expected: grid.shape().to_vec(),
                actual: vec![],
            }
        })?;
        Self::new(grid, values, unit)
    }

    pub fn with_symmetry(mut self, symmetry: AzimuthalSymmetry) -> Self {
        self.symmetry = Some(symmetry);
        self
    }

    pub fn grid(&self) -> &Arc<Grid> {
        &self.grid
    }

    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    pub fn as_slice(&self) -> &[f64] {
        self.values.as_slice().unwrap_or(&[])
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn symmetry(&self) -> Option<AzimuthalSymmetry> {
        self.symmetry
    }

    pub fn get(&self, flat: usize) -> f64 {
        self.as_slice()[flat]
    }

    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// One three-component vector per grid node, in the grid's natural basis.
#[derive(Debug, Clone)]
pub struct VectorField {
    grid: Arc<Grid>,
    values: ArrayD<[f64; 3]>,
    unit: Unit,
}

impl VectorField {
    pub fn new(grid: Arc<Grid>, values: ArrayD<[f64; 3]>, unit: Unit) -> SimResult<Self> {
        grid.check_shape("vector field", values.shape())?;
        Ok(VectorField {
            grid,
            values: values.as_standard_layout().into_owned(),
            unit,
        })
    }

    pub fn from_flat(grid: Arc<Grid>, flat: Vec<[f64; 3]>, unit: Unit) -> SimResult<Self> {
        let values = ArrayD::from_shape_vec(IxDyn(grid.shape()), flat).map_err(|e| {
            DetectorError::ShapeMismatch {
                what: format!("vector field ({e})"),
                expected: grid.shape().to_vec(),
                actual: vec![],
            }
        })?;
        Self::new(grid, values, unit)
    }

    pub fn grid(&self) -> &Arc<Grid> {
        &self.grid
    }

    pub fn values(&self) -> &ArrayD<[f64; 3]> {
        &self.values
    }

    pub fn as_slice(&self) -> &[[f64; 3]] {
        self.values.as_slice().unwrap_or(&[])
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn get(&self, flat: usize) -> [f64; 3] {
        self.as_slice()[flat]
    }

    /// Euclidean magnitude at every node.
    pub fn magnitude(&self) -> ArrayD<f64> {
        self.values
            .mapv(|v| (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Axis;

    fn grid() -> Arc<Grid> {
        Arc::new(
            Grid::cylindrical_2d(
                Axis::uniform(0.0, 1.0, 4).unwrap(),
                Axis::uniform(0.0, 1.0, 3).unwrap(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_scalar_field_shape_checked() {
        let g = grid();
        assert!(ScalarField::new(g.clone(), ArrayD::zeros(IxDyn(&[3, 4])), Unit::Volt).is_err());
        assert!(ScalarField::from_flat(g.clone(), vec![0.0; 11], Unit::Volt).is_err());
        let f = ScalarField::from_flat(g, (0..12).map(|i| i as f64).collect(), Unit::Volt).unwrap();
        assert_eq!(f.get(5), 5.0);
        assert_eq!(f.min(), 0.0);
        assert_eq!(f.max(), 11.0);
    }

    #[test]
    fn test_vector_field_magnitude() {
        let g = grid();
        let f = VectorField::from_flat(g, vec![[3.0, 0.0, 4.0]; 12], Unit::VoltPerMetre).unwrap();
        assert!(f.magnitude().iter().all(|&m| (m - 5.0).abs() < 1e-12));
    }
}
