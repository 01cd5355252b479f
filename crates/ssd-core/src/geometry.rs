// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Detector Geometry
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Detector geometry model and grid classification.
//!
//! A geometry answers point queries (active volume, contacts, space charge)
//! in Cartesian coordinates. [`DetectorGeometry::classify`] turns those
//! answers into per-node boundary-condition tags for a given [`Grid`].

use ssd_types::error::{DetectorError, SimResult};
use ssd_types::state::{Axis, CoordinateSystem, Grid, Material, PointType, PointTypes};

/// Relative tolerance used to decide whether a node lies on a contact surface.
const SURFACE_TOLERANCE: f64 = 1e-9;

/// Electrode of a detector. `bias` is `None` for a floating contact.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub id: usize,
    pub name: String,
    pub bias: Option<f64>,
}

/// Per-node classification of a grid against a geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub point_types: PointTypes,
    /// Contact owning each node, if any.
    pub contact_of: Vec<Option<usize>>,
}

impl Classification {
    /// Nodes belonging to `contact`.
    pub fn contact_nodes(&self, contact: usize) -> impl Iterator<Item = usize> + '_ {
        self.contact_of
            .iter()
            .enumerate()
            .filter(move |(_, c)| **c == Some(contact))
            .map(|(i, _)| i)
    }
}

/// In-memory detector model.
pub trait DetectorGeometry: Send + Sync {
    fn coordinate_system(&self) -> CoordinateSystem;

    /// Contacts, indexed by their id.
    fn contacts(&self) -> &[Contact];

    fn material(&self) -> &Material;

    /// Whether a Cartesian point lies in the semiconductor volume.
    fn contains(&self, p: [f64; 3]) -> bool;

    /// Contact occupying a Cartesian point.
    fn contact_at(&self, p: [f64; 3]) -> Option<usize>;

    /// Space-charge density (C/m³) at a point of the semiconductor.
    fn charge_density(&self, _p: [f64; 3]) -> f64 {
        0.0
    }

    /// Relative permittivity at a point; vacuum outside the crystal.
    fn relative_permittivity(&self, p: [f64; 3]) -> f64 {
        if self.contains(p) || self.contact_at(p).is_some() {
            self.material().relative_permittivity
        } else {
            1.0
        }
    }

    fn contact(&self, id: usize) -> SimResult<&Contact> {
        self.contacts()
            .get(id)
            .ok_or(DetectorError::MissingContact(id))
    }

    /// Tag every node of `grid`.
    ///
    /// Biased contact nodes become `Fixed`, floating contact nodes
    /// `Undepleted` (and marked floating), semiconductor nodes `Free` and
    /// everything else `Outside`.
    fn classify(&self, grid: &Grid) -> SimResult<Classification> {
        if grid.system() != self.coordinate_system() {
            return Err(DetectorError::InvalidGrid(format!(
                "grid is {:?} but the detector is described in {:?}",
                grid.system(),
                self.coordinate_system()
            )));
        }
        let mut point_types = PointTypes::from_elem(grid, PointType::Undefined);
        let mut contact_of = vec![None; grid.len()];
        for (flat, owner) in contact_of.iter_mut().enumerate() {
            let p = grid.node_position(flat);
            let tag = match self.contact_at(p) {
                Some(id) => {
                    *owner = Some(id);
                    match self.contact(id)?.bias {
                        Some(_) => PointType::Fixed,
                        None => {
                            point_types.mark_floating(flat);
                            PointType::Undepleted
                        }
                    }
                }
                None if self.contains(p) => PointType::Free,
                None => PointType::Outside,
            };
            point_types.set(flat, tag);
        }
        Ok(Classification {
            point_types,
            contact_of,
        })
    }
}

fn validate_length(label: &str, v: f64) -> SimResult<()> {
    if !v.is_finite() || v <= 0.0 {
        return Err(DetectorError::PhysicsViolation(format!(
            "{label} must be finite and > 0, got {v}"
        )));
    }
    Ok(())
}

fn validate_bias(label: &str, bias: Option<f64>) -> SimResult<()> {
    if let Some(v) = bias {
        if !v.is_finite() {
            return Err(DetectorError::PhysicsViolation(format!(
                "{label} bias must be finite, got {v}"
            )));
        }
    }
    Ok(())
}

/// Slab of thickness `thickness` along z between two planar contacts.
///
/// Contact 0 covers z = 0, contact 1 covers z = `thickness`. The crystal
/// spans x, y ∈ [0, `width`]; a world grid may extend laterally beyond it.
#[derive(Debug, Clone)]
pub struct PlanarDetector {
    thickness: f64,
    width: f64,
    contacts: Vec<Contact>,
    material: Material,
    space_charge: f64,
}

impl PlanarDetector {
    pub fn new(thickness: f64, width: f64, bottom_bias: f64, top_bias: f64) -> SimResult<Self> {
        validate_length("planar thickness", thickness)?;
        validate_length("planar width", width)?;
        validate_bias("bottom contact", Some(bottom_bias))?;
        validate_bias("top contact", Some(top_bias))?;
        Ok(PlanarDetector {
            thickness,
            width,
            contacts: vec![
                Contact {
                    id: 0,
                    name: "bottom".to_string(),
                    bias: Some(bottom_bias),
                },
                Contact {
                    id: 1,
                    name: "top".to_string(),
                    bias: Some(top_bias),
                },
            ],
            material: Material::germanium(),
            space_charge: 0.0,
        })
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    /// Uniform space-charge density (C/m³) of the bulk.
    pub fn with_charge_density(mut self, rho: f64) -> Self {
        self.space_charge = rho;
        self
    }

    /// Leave contact `id` floating.
    pub fn with_floating_contact(mut self, id: usize) -> SimResult<Self> {
        let contact = self
            .contacts
            .get_mut(id)
            .ok_or(DetectorError::MissingContact(id))?;
        contact.bias = None;
        Ok(self)
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    /// Uniform grid over the crystal plus a lateral `margin` of vacuum.
    pub fn grid(&self, n_lateral: usize, n_depth: usize, margin: f64) -> SimResult<Grid> {
        if !margin.is_finite() || margin < 0.0 {
            return Err(DetectorError::InvalidGrid(format!(
                "lateral margin must be finite and >= 0, got {margin}"
            )));
        }
        let lateral = Axis::uniform(-margin, self.width + margin, n_lateral)?;
        Grid::cartesian(
            lateral.clone(),
            lateral,
            Axis::uniform(0.0, self.thickness, n_depth)?,
        )
    }

    fn laterally_inside(&self, p: [f64; 3]) -> bool {
        let tol = SURFACE_TOLERANCE * self.width;
        (-tol..=self.width + tol).contains(&p[0]) && (-tol..=self.width + tol).contains(&p[1])
    }
}

impl DetectorGeometry for PlanarDetector {
    fn coordinate_system(&self) -> CoordinateSystem {
        CoordinateSystem::Cartesian
    }

    fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    fn material(&self) -> &Material {
        &self.material
    }

    fn contains(&self, p: [f64; 3]) -> bool {
        self.laterally_inside(p) && p[2] > 0.0 && p[2] < self.thickness
    }

    fn contact_at(&self, p: [f64; 3]) -> Option<usize> {
        if !self.laterally_inside(p) {
            return None;
        }
        let tol = SURFACE_TOLERANCE * self.thickness;
        if p[2] <= tol {
            Some(0)
        } else if p[2] >= self.thickness - tol {
            Some(1)
        } else {
            None
        }
    }

    fn charge_density(&self, p: [f64; 3]) -> f64 {
        if self.contains(p) {
            self.space_charge
        } else {
            0.0
        }
    }
}

/// True coaxial detector: a cylinder shell between an inner contact at
/// `inner_radius` and an outer contact at `outer_radius`, height `height`.
#[derive(Debug, Clone)]
pub struct CoaxialDetector {
    inner_radius: f64,
    outer_radius: f64,
    height: f64,
    contacts: Vec<Contact>,
    material: Material,
    space_charge: f64,
}

impl CoaxialDetector {
    pub fn new(
        inner_radius: f64,
        outer_radius: f64,
        height: f64,
        inner_bias: f64,
        outer_bias: f64,
    ) -> SimResult<Self> {
        validate_length("coaxial inner radius", inner_radius)?;
        validate_length("coaxial height", height)?;
        if !(outer_radius.is_finite() && outer_radius > inner_radius) {
            return Err(DetectorError::PhysicsViolation(format!(
                "coaxial outer radius must exceed inner radius {inner_radius}, got {outer_radius}"
            )));
        }
        validate_bias("inner contact", Some(inner_bias))?;
        validate_bias("outer contact", Some(outer_bias))?;
        Ok(CoaxialDetector {
            inner_radius,
            outer_radius,
            height,
            contacts: vec![
                Contact {
                    id: 0,
                    name: "core".to_string(),
                    bias: Some(inner_bias),
                },
                Contact {
                    id: 1,
                    name: "mantle".to_string(),
                    bias: Some(outer_bias),
                },
            ],
            material: Material::germanium(),
            space_charge: 0.0,
        })
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_charge_density(mut self, rho: f64) -> Self {
        self.space_charge = rho;
        self
    }

    pub fn inner_radius(&self) -> f64 {
        self.inner_radius
    }

    pub fn outer_radius(&self) -> f64 {
        self.outer_radius
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Reduced (r, z) grid spanning the crystal.
    pub fn grid_2d(&self, nr: usize, nz: usize) -> SimResult<Grid> {
        Grid::cylindrical_2d(
            Axis::uniform(self.inner_radius, self.outer_radius, nr)?,
            Axis::uniform(0.0, self.height, nz)?,
        )
    }

    /// Full (r, φ, z) grid spanning the crystal.
    pub fn grid_3d(&self, nr: usize, nphi: usize, nz: usize) -> SimResult<Grid> {
        Grid::cylindrical_3d(
            Axis::uniform(self.inner_radius, self.outer_radius, nr)?,
            Axis::azimuthal(nphi)?,
            Axis::uniform(0.0, self.height, nz)?,
        )
    }

    fn radius(p: [f64; 3]) -> f64 {
        p[0].hypot(p[1])
    }

    fn axially_inside(&self, p: [f64; 3]) -> bool {
        let tol = SURFACE_TOLERANCE * self.height;
        p[2] >= -tol && p[2] <= self.height + tol
    }
}

impl DetectorGeometry for CoaxialDetector {
    fn coordinate_system(&self) -> CoordinateSystem {
        CoordinateSystem::Cylindrical
    }

    fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    fn material(&self) -> &Material {
        &self.material
    }

    fn contains(&self, p: [f64; 3]) -> bool {
        let r = Self::radius(p);
        self.axially_inside(p) && r > self.inner_radius && r < self.outer_radius
    }

    fn contact_at(&self, p: [f64; 3]) -> Option<usize> {
        if !self.axially_inside(p) {
            return None;
        }
        let r = Self::radius(p);
        let tol = SURFACE_TOLERANCE * self.outer_radius;
        if r <= self.inner_radius + tol {
            Some(0)
        } else if r >= self.outer_radius - tol {
            Some(1)
        } else {
            None
        }
    }

    fn charge_density(&self, p: [f64; 3]) -> f64 {
        if self.contains(p) {
            self.space_charge
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_classification() {
        let det = PlanarDetector::new(0.01, 0.02, 0.0, 100.0).unwrap();
        let grid = det.grid(5, 11, 0.0).unwrap();
        let cls = det.classify(&grid).unwrap();
        let pt = &cls.point_types;
        assert_eq!(pt.count(PointType::Undefined), 0);
        assert_eq!(pt.count(PointType::Outside), 0);
        assert_eq!(pt.count(PointType::Fixed), 2 * 25);
        assert_eq!(pt.count(PointType::Free), 9 * 25);
        assert_eq!(cls.contact_nodes(1).count(), 25);
        for flat in cls.contact_nodes(1) {
            assert!((grid.node_position(flat)[2] - 0.01).abs() < 1e-12);
        }
    }

    #[test]
    fn test_planar_margin_is_outside() {
        let det = PlanarDetector::new(0.01, 0.02, 0.0, 100.0).unwrap();
        let grid = det.grid(9, 5, 0.01).unwrap();
        let cls = det.classify(&grid).unwrap();
        let corner = grid.index_of(&[0, 0, 2]);
        assert_eq!(cls.point_types.get(corner), PointType::Outside);
        let centre = grid.index_of(&[4, 4, 2]);
        assert_eq!(cls.point_types.get(centre), PointType::Free);
        assert!((det.relative_permittivity(grid.node_position(corner)) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_floating_contact_is_undepleted() {
        let det = PlanarDetector::new(0.01, 0.02, 0.0, 100.0)
            .unwrap()
            .with_floating_contact(1)
            .unwrap();
        let grid = det.grid(3, 5, 0.0).unwrap();
        let cls = det.classify(&grid).unwrap();
        assert_eq!(cls.point_types.count(PointType::Undepleted), 9);
        for flat in cls.contact_nodes(1) {
            assert!(cls.point_types.is_floating(flat));
        }
        assert!(cls.contact_nodes(0).all(|f| !cls.point_types.is_floating(f)));
        assert!(cls.point_types.is_fully_depleted());
        assert!(matches!(
            PlanarDetector::new(0.01, 0.02, 0.0, 1.0).unwrap().with_floating_contact(7),
            Err(DetectorError::MissingContact(7))
        ));
    }

    #[test]
    fn test_coaxial_contacts() {
        let det = CoaxialDetector::new(0.005, 0.04, 0.08, 3000.0, 0.0).unwrap();
        assert_eq!(det.contact_at([0.005, 0.0, 0.01]), Some(0));
        assert_eq!(det.contact_at([0.0, -0.04, 0.01]), Some(1));
        assert_eq!(det.contact_at([0.02, 0.0, 0.01]), None);
        assert!(det.contains([0.01, 0.01, 0.04]));
        assert!(!det.contains([0.001, 0.0, 0.04]));
        let grid = det.grid_2d(8, 6).unwrap();
        let cls = det.classify(&grid).unwrap();
        assert_eq!(cls.point_types.count(PointType::Fixed), 12);
    }

    #[test]
    fn test_classify_rejects_wrong_system() {
        let det = CoaxialDetector::new(0.005, 0.04, 0.08, 3000.0, 0.0).unwrap();
        let planar = PlanarDetector::new(0.01, 0.02, 0.0, 1.0).unwrap();
        let grid = planar.grid(3, 3, 0.0).unwrap();
        assert!(det.classify(&grid).is_err());
    }

    #[test]
    fn test_invalid_dimensions_rejected() {
        assert!(PlanarDetector::new(0.0, 0.02, 0.0, 1.0).is_err());
        assert!(PlanarDetector::new(0.01, 0.02, f64::NAN, 1.0).is_err());
        assert!(CoaxialDetector::new(0.04, 0.01, 0.08, 1.0, 0.0).is_err());
    }
}
