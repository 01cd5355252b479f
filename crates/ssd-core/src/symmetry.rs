// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Symmetry Extension
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Full-azimuth views of reduced-symmetry solutions.
//!
//! Both extensions map indices onto the source field instead of copying it;
//! [`SymmetryExtension::materialize`] produces an owned 3-D field when one
//! is needed.

use ndarray::{ArrayD, Axis as NdAxis};
use ssd_types::error::{DetectorError, SimResult};
use ssd_types::field::ScalarField;
use ssd_types::state::{Axis, Grid};
use std::f64::consts::PI;
use std::sync::Arc;

/// Relative tolerance on the wedge angle check.
const WEDGE_ANGLE_TOLERANCE: f64 = 1e-9;

/// Largest value jumps across replica seams and between interior slices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeamCheck {
    pub max_seam_jump: f64,
    pub max_interior_jump: f64,
    pub tolerance: f64,
}

impl SeamCheck {
    /// The seams are no rougher than the interior.
    pub fn is_smooth(&self) -> bool {
        self.max_seam_jump <= self.max_interior_jump + self.tolerance
    }
}

/// Common interface of the azimuthal views.
pub trait SymmetryExtension {
    /// (nr, nφ, nz) of the extended field.
    fn extended_shape(&self) -> [usize; 3];

    /// Value at extended indices; `iphi` wraps around the full circle,
    /// `ir` and `iz` outside the source grid are `OutOfDomain`.
    fn get(&self, ir: usize, iphi: usize, iz: usize) -> SimResult<f64>;

    /// Azimuthal slice `k` of the extended field, shape (nr, nz).
    fn slice(&self, k: usize) -> SimResult<ArrayD<f64>>;

    /// Azimuthal axis of the extended field.
    fn azimuthal_axis(&self) -> SimResult<Axis>;

    fn source(&self) -> &Arc<ScalarField>;

    fn check_seam(&self, tolerance: f64) -> SeamCheck;

    /// Owned 3-D field on a periodic azimuthal axis.
    fn materialize(&self) -> SimResult<ScalarField> {
        let source_grid = self.source().grid();
        let r = source_grid.axis(0).clone();
        let z = source_grid.axis(source_grid.ndim() - 1).clone();
        let grid = Arc::new(Grid::cylindrical_3d(r, self.azimuthal_axis()?, z)?);
        let [nr, nphi, nz] = self.extended_shape();
        let mut flat = Vec::with_capacity(nr * nphi * nz);
        for ir in 0..nr {
            for iphi in 0..nphi {
                for iz in 0..nz {
                    flat.push(self.get(ir, iphi, iz)?);
                }
            }
        }
        ScalarField::from_flat(grid, flat, self.source().unit())
    }
}

fn check_node_index(ir: usize, iz: usize, shape: [usize; 3]) -> SimResult<()> {
    for (axis, i, n) in [(0, ir, shape[0]), (2, iz, shape[2])] {
        if i >= n {
            return Err(DetectorError::OutOfDomain {
                axis,
                value: i as f64,
                min: 0.0,
                max: n.saturating_sub(1) as f64,
            });
        }
    }
    Ok(())
}

fn check_slice_index(k: usize, n: usize) -> SimResult<()> {
    if k >= n {
        return Err(DetectorError::OutOfDomain {
            axis: 1,
            value: k as f64,
            min: 0.0,
            max: (n - 1) as f64,
        });
    }
    Ok(())
}

/// A 2-D (r, z) field presented as `slices` identical azimuthal slices.
#[derive(Debug, Clone)]
pub struct AzimuthalExtension {
    source: Arc<ScalarField>,
    slices: usize,
}

impl AzimuthalExtension {
    pub fn new(source: Arc<ScalarField>, slices: usize) -> SimResult<Self> {
        let grid = source.grid();
        if !(grid.is_cylindrical() && grid.ndim() == 2) {
            return Err(DetectorError::InvalidGrid(
                "azimuthal extension needs a 2-D (r, z) field".to_string(),
            ));
        }
        if slices < 2 {
            return Err(DetectorError::Config(format!(
                "azimuthal extension needs at least 2 slices, got {slices}"
            )));
        }
        Ok(AzimuthalExtension { source, slices })
    }

    /// Use the slice count recorded on the field, or `default_slices`.
    pub fn from_field(source: Arc<ScalarField>, default_slices: usize) -> SimResult<Self> {
        let slices = source.symmetry().map_or(default_slices, |s| s.slices);
        Self::new(source, slices)
    }

    pub fn slices(&self) -> usize {
        self.slices
    }
}

impl SymmetryExtension for AzimuthalExtension {
    fn extended_shape(&self) -> [usize; 3] {
        let shape = self.source.grid().shape();
        [shape[0], self.slices, shape[1]]
    }

    fn get(&self, ir: usize, _iphi: usize, iz: usize) -> SimResult<f64> {
        check_node_index(ir, iz, self.extended_shape())?;
        Ok(self.source.values()[[ir, iz]])
    }

    fn slice(&self, k: usize) -> SimResult<ArrayD<f64>> {
        check_slice_index(k, self.slices)?;
        Ok(self.source.values().clone())
    }

    fn azimuthal_axis(&self) -> SimResult<Axis> {
        Axis::azimuthal(self.slices)
    }

    fn source(&self) -> &Arc<ScalarField> {
        &self.source
    }

    fn check_seam(&self, tolerance: f64) -> SeamCheck {
        // every slice is the source itself
        SeamCheck {
            max_seam_jump: 0.0,
            max_interior_jump: 0.0,
            tolerance,
        }
    }
}

/// A 3-D cylindrical wedge covering 2π / `replicas`, repeated around the axis.
///
/// The wedge's azimuthal nodes must be uniformly spaced so that the
/// replicated axis is uniform over [φ₀, φ₀ + 2π).
#[derive(Debug, Clone)]
pub struct WedgeExtension {
    source: Arc<ScalarField>,
    replicas: usize,
    step: f64,
}

impl WedgeExtension {
    pub fn new(source: Arc<ScalarField>, replicas: usize) -> SimResult<Self> {
        let grid = source.grid();
        if !(grid.is_cylindrical() && grid.ndim() == 3) {
            return Err(DetectorError::InvalidGrid(
                "wedge extension needs a 3-D (r, φ, z) field".to_string(),
            ));
        }
        if replicas < 1 {
            return Err(DetectorError::Config(
                "wedge extension needs at least one replica".to_string(),
            ));
        }
        let phi = grid.axis(1).values();
        let m = phi.len();
        let step = 2.0 * PI / (replicas * m) as f64;
        let uniform = phi
            .iter()
            .enumerate()
            .all(|(k, &p)| (p - phi[0] - k as f64 * step).abs() <= WEDGE_ANGLE_TOLERANCE * 2.0 * PI);
        if !uniform {
            return Err(DetectorError::InvalidGrid(format!(
                "wedge azimuthal nodes must be spaced 2π/({replicas}·{m}) apart"
            )));
        }
        Ok(WedgeExtension {
            source,
            replicas,
            step,
        })
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    fn wedge_slices(&self) -> usize {
        self.source.grid().shape()[1]
    }
}

impl SymmetryExtension for WedgeExtension {
    fn extended_shape(&self) -> [usize; 3] {
        let shape = self.source.grid().shape();
        [shape[0], shape[1] * self.replicas, shape[2]]
    }

    fn get(&self, ir: usize, iphi: usize, iz: usize) -> SimResult<f64> {
        check_node_index(ir, iz, self.extended_shape())?;
        Ok(self.source.values()[[ir, iphi % self.wedge_slices(), iz]])
    }

    fn slice(&self, k: usize) -> SimResult<ArrayD<f64>> {
        check_slice_index(k, self.extended_shape()[1])?;
        Ok(self
            .source
            .values()
            .index_axis(NdAxis(1), k % self.wedge_slices())
            .to_owned())
    }

    fn azimuthal_axis(&self) -> SimResult<Axis> {
        let phi0 = self.source.grid().axis(1).min();
        let n = self.extended_shape()[1];
        Axis::periodic((0..n).map(|k| phi0 + k as f64 * self.step).collect(), 2.0 * PI)
    }

    fn source(&self) -> &Arc<ScalarField> {
        &self.source
    }

    fn check_seam(&self, tolerance: f64) -> SeamCheck {
        let shape = self.source.grid().shape();
        let (nr, m, nz) = (shape[0], shape[1], shape[2]);
        let v = self.source.values();
        let mut seam = 0.0f64;
        let mut interior = 0.0f64;
        for ir in 0..nr {
            for iz in 0..nz {
                for k in 0..m.saturating_sub(1) {
                    interior = interior.max((v[[ir, k + 1, iz]] - v[[ir, k, iz]]).abs());
                }
                seam = seam.max((v[[ir, 0, iz]] - v[[ir, m - 1, iz]]).abs());
            }
        }
        SeamCheck {
            max_seam_jump: seam,
            max_interior_jump: interior,
            tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssd_types::field::{AzimuthalSymmetry, Unit};

    fn rz_field() -> Arc<ScalarField> {
        let grid = Arc::new(
            Grid::cylindrical_2d(
                Axis::uniform(0.0, 0.03, 7).unwrap(),
                Axis::uniform(0.0, 0.05, 5).unwrap(),
            )
            .unwrap(),
        );
        let values = (0..grid.len()).map(|i| (i as f64 * 0.37).sin()).collect();
        Arc::new(ScalarField::from_flat(grid, values, Unit::Volt).unwrap())
    }

    #[test]
    fn test_azimuthal_slice_zero_roundtrip() {
        let src = rz_field();
        let ext = AzimuthalExtension::new(Arc::clone(&src), 12).unwrap();
        assert_eq!(&ext.slice(0).unwrap(), src.values());
        assert_eq!(ext.extended_shape(), [7, 12, 5]);
        assert!(ext.slice(12).is_err());
    }

    #[test]
    fn test_extended_get_checks_node_range() {
        let src = rz_field();
        let ext = AzimuthalExtension::new(Arc::clone(&src), 12).unwrap();
        assert_eq!(ext.get(6, 11, 4).unwrap(), src.values()[[6, 4]]);
        assert_eq!(ext.get(3, 40, 2).unwrap(), src.values()[[3, 2]]);
        assert!(matches!(
            ext.get(7, 0, 0),
            Err(DetectorError::OutOfDomain { axis: 0, .. })
        ));
        assert!(matches!(
            ext.get(0, 0, 5),
            Err(DetectorError::OutOfDomain { axis: 2, .. })
        ));

        let wedge_src = wedge(4, 6, |phi| (4.0 * phi).cos());
        let w = WedgeExtension::new(Arc::clone(&wedge_src), 4).unwrap();
        assert_eq!(w.get(2, 13, 1).unwrap(), wedge_src.values()[[2, 1, 1]]);
        assert!(w.get(3, 0, 0).is_err());
        assert!(w.get(0, 0, 2).is_err());
    }

    #[test]
    fn test_azimuthal_materialize() {
        let src = rz_field();
        let ext = AzimuthalExtension::new(Arc::clone(&src), 8).unwrap();
        let full = ext.materialize().unwrap();
        assert_eq!(full.grid().shape(), &[7, 8, 5]);
        assert!(full.grid().axis(1).is_periodic());
        for k in 0..8 {
            let s = full.values().index_axis(NdAxis(1), k).to_owned();
            assert_eq!(&s, src.values(), "slice {k}");
        }
        assert!(ext.check_seam(0.0).is_smooth());
    }

    #[test]
    fn test_azimuthal_slices_from_field_symmetry() {
        let src = rz_field();
        let tagged = Arc::new((*src).clone().with_symmetry(AzimuthalSymmetry { slices: 24 }));
        assert_eq!(AzimuthalExtension::from_field(tagged, 36).unwrap().slices(), 24);
        assert_eq!(AzimuthalExtension::from_field(src, 36).unwrap().slices(), 36);
    }

    fn wedge(replicas: usize, m: usize, f: impl Fn(f64) -> f64) -> Arc<ScalarField> {
        let step = 2.0 * PI / (replicas * m) as f64;
        let phi = Axis::new((0..m).map(|k| k as f64 * step).collect()).unwrap();
        let grid = Arc::new(
            Grid::cylindrical_3d(
                Axis::uniform(0.01, 0.03, 3).unwrap(),
                phi,
                Axis::uniform(0.0, 0.05, 2).unwrap(),
            )
            .unwrap(),
        );
        let values = (0..grid.len()).map(|i| f(grid.node_coords(i)[1])).collect();
        Arc::new(ScalarField::from_flat(grid, values, Unit::Volt).unwrap())
    }

    #[test]
    fn test_wedge_roundtrip_and_materialize() {
        // cos(4φ) has the 4-fold symmetry of a quarter wedge
        let src = wedge(4, 6, |phi| (4.0 * phi).cos());
        let ext = WedgeExtension::new(Arc::clone(&src), 4).unwrap();
        for k in 0..6 {
            let expected = src.values().index_axis(NdAxis(1), k).to_owned();
            assert_eq!(ext.slice(k).unwrap(), expected);
            assert_eq!(ext.slice(k + 6).unwrap(), expected);
        }
        let full = ext.materialize().unwrap();
        assert_eq!(full.grid().shape(), &[3, 24, 2]);
        let phi = full.grid().axis(1).values();
        assert!((phi[23] - 23.0 * 2.0 * PI / 24.0).abs() < 1e-12);
        assert!(ext.check_seam(1e-9).is_smooth());
    }

    #[test]
    fn test_wedge_seam_detects_discontinuity() {
        // φ itself jumps back at every seam
        let src = wedge(4, 6, |phi| phi);
        let ext = WedgeExtension::new(src, 4).unwrap();
        let check = ext.check_seam(1e-9);
        assert!(!check.is_smooth(), "{check:?}");
        assert!(check.max_seam_jump > check.max_interior_jump);
    }

    #[test]
    fn test_wedge_rejects_wrong_spacing() {
        let src = wedge(4, 6, |phi| phi);
        assert!(WedgeExtension::new(src, 3).is_err());
        assert!(AzimuthalExtension::new(rz_field(), 1).is_err());
    }
}
