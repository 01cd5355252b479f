// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Potential Solver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Electric and weighting potentials by red-black SOR.
//!
//! Algorithm:
//! 1. Classify the grid against the geometry (fixed contacts, bulk, outside)
//! 2. Build the finite-volume stencil from the permittivity map
//! 3. Relax red then black nodes until the largest change of a sweep,
//!    relative to the bias span, drops below the limit
//! 4. With depletion handling, re-tag bulk nodes as `Free` or `Undepleted`
//!    on every sweep; a solve only converges once no tag changes
//! 5. Move every floating contact as a whole to the potential that balances
//!    the flux through its outer faces

use crate::geometry::DetectorGeometry;
use log::{debug, info, warn};
use ssd_math::sor::{half_sweep, RedBlack, Stencil};
use ssd_types::config::SolverConfig;
use ssd_types::error::{DetectorError, SimResult};
use ssd_types::field::{ScalarField, Unit};
use ssd_types::state::{Grid, PointType, PointTypes, SolveReport};
use std::sync::Arc;
use std::time::Instant;

/// Input of one relaxation: tags, start values and sources on a grid.
#[derive(Debug, Clone)]
pub struct PotentialProblem {
    pub point_types: PointTypes,
    /// Start values; `Fixed` nodes keep theirs throughout.
    pub initial: Vec<f64>,
    /// Space charge per node (C/m³).
    pub charge_density: Vec<f64>,
    pub permittivity: Vec<f64>,
    /// Nodes that may switch between `Free` and `Undepleted`.
    pub retag: Vec<bool>,
    /// Node sets of floating contacts; each set shares one potential.
    pub floating: Vec<Vec<usize>>,
    pub unit: Unit,
}

impl PotentialProblem {
    /// Electric potential of `geometry` at its contact biases.
    pub fn electric(geometry: &dyn DetectorGeometry, grid: &Grid) -> SimResult<Self> {
        let cls = geometry.classify(grid)?;
        let biases: Vec<f64> = geometry.contacts().iter().filter_map(|c| c.bias).collect();
        if biases.is_empty() {
            return Err(DetectorError::PhysicsViolation(
                "electric potential needs at least one biased contact".to_string(),
            ));
        }
        let mean_bias = biases.iter().sum::<f64>() / biases.len() as f64;

        let n = grid.len();
        let mut initial = vec![mean_bias; n];
        let mut charge_density = vec![0.0; n];
        let mut permittivity = vec![1.0; n];
        let mut retag = vec![false; n];
        for flat in 0..n {
            let p = grid.node_position(flat);
            permittivity[flat] = geometry.relative_permittivity(p);
            match (cls.point_types.get(flat), cls.contact_of[flat]) {
                (PointType::Fixed, Some(id)) => {
                    initial[flat] = geometry.contact(id)?.bias.unwrap_or(mean_bias);
                }
                (PointType::Free, None) => {
                    charge_density[flat] = geometry.charge_density(p);
                    retag[flat] = true;
                }
                _ => {}
            }
        }
        let floating = geometry
            .contacts()
            .iter()
            .filter(|c| c.bias.is_none())
            .map(|c| cls.contact_nodes(c.id).collect::<Vec<_>>())
            .filter(|nodes| !nodes.is_empty())
            .collect();
        Ok(PotentialProblem {
            point_types: cls.point_types,
            initial,
            charge_density,
            permittivity,
            retag,
            floating,
            unit: Unit::Volt,
        })
    }

    /// Weighting potential of `contact`: that contact at 1, every other
    /// contact (floating ones included) at 0, no space charge.
    pub fn weighting(
        geometry: &dyn DetectorGeometry,
        grid: &Grid,
        contact: usize,
    ) -> SimResult<Self> {
        geometry.contact(contact)?;
        let mut cls = geometry.classify(grid)?;
        let start = 1.0 / geometry.contacts().len() as f64;

        let n = grid.len();
        let mut initial = vec![start; n];
        let mut permittivity = vec![1.0; n];
        for flat in 0..n {
            permittivity[flat] = geometry.relative_permittivity(grid.node_position(flat));
            if let Some(id) = cls.contact_of[flat] {
                cls.point_types.set(flat, PointType::Fixed);
                initial[flat] = if id == contact { 1.0 } else { 0.0 };
            }
        }
        Ok(PotentialProblem {
            point_types: cls.point_types,
            initial,
            charge_density: vec![0.0; n],
            permittivity,
            retag: vec![false; n],
            floating: Vec::new(),
            unit: Unit::Dimensionless,
        })
    }

    fn validate(&self, grid: &Grid) -> SimResult<()> {
        grid.check_shape("point types", self.point_types.shape())?;
        for (what, len) in [
            ("initial values", self.initial.len()),
            ("charge density", self.charge_density.len()),
            ("permittivity", self.permittivity.len()),
            ("retag mask", self.retag.len()),
        ] {
            if len != grid.len() {
                return Err(DetectorError::ShapeMismatch {
                    what: what.to_string(),
                    expected: vec![grid.len()],
                    actual: vec![len],
                });
            }
        }
        if let Some(i) = self.floating.iter().flatten().find(|&&i| i >= grid.len()) {
            return Err(DetectorError::InvalidGrid(format!(
                "floating contact node {i} outside a grid of {} nodes",
                grid.len()
            )));
        }
        if let Some(i) = self.initial.iter().position(|v| !v.is_finite()) {
            return Err(DetectorError::PhysicsViolation(format!(
                "initial potential must be finite at node {i}"
            )));
        }
        if let Some(i) = self.charge_density.iter().position(|v| !v.is_finite()) {
            return Err(DetectorError::PhysicsViolation(format!(
                "charge density must be finite at node {i}"
            )));
        }
        Ok(())
    }
}

/// Relaxed potential with its final point types.
#[derive(Debug, Clone)]
pub struct PotentialSolution {
    pub potential: ScalarField,
    pub point_types: PointTypes,
    pub report: SolveReport,
}

impl PotentialSolution {
    pub fn grid(&self) -> &Arc<Grid> {
        self.potential.grid()
    }

    /// Depleted volume (m³).
    pub fn active_volume(&self) -> f64 {
        self.point_types.active_volume(self.grid())
    }

    pub fn is_fully_depleted(&self) -> bool {
        self.point_types.is_fully_depleted()
    }
}

/// Red-black SOR solver bound to one grid.
#[derive(Debug, Clone)]
pub struct PotentialSolver {
    grid: Arc<Grid>,
    config: SolverConfig,
}

impl PotentialSolver {
    pub fn new(grid: Arc<Grid>, config: SolverConfig) -> SimResult<Self> {
        config.validate()?;
        Ok(PotentialSolver { grid, config })
    }

    pub fn grid(&self) -> &Arc<Grid> {
        &self.grid
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Electric potential, honouring `depletion_handling` from the config.
    pub fn electric_potential(
        &self,
        geometry: &dyn DetectorGeometry,
    ) -> SimResult<PotentialSolution> {
        let problem = PotentialProblem::electric(geometry, &self.grid)?;
        self.solve(problem, self.config.depletion_handling)
    }

    /// Weighting potential of one contact; depletion handling is always off.
    pub fn weighting_potential(
        &self,
        geometry: &dyn DetectorGeometry,
        contact: usize,
    ) -> SimResult<PotentialSolution> {
        let problem = PotentialProblem::weighting(geometry, &self.grid, contact)?;
        self.solve(problem, false)
    }

    /// Relax `problem` to convergence or until the iteration budget runs out.
    ///
    /// Non-convergence is reported through [`SolveReport::converged`] with the
    /// last iterate returned.
    pub fn solve(
        &self,
        problem: PotentialProblem,
        depletion_handling: bool,
    ) -> SimResult<PotentialSolution> {
        let grid = &self.grid;
        problem.validate(grid)?;
        let undefined = problem.point_types.count(PointType::Undefined);
        if undefined > 0 {
            return Err(DetectorError::UndefinedPointType { count: undefined });
        }

        let PotentialProblem {
            mut point_types,
            initial: mut values,
            charge_density: rho,
            permittivity,
            retag,
            floating,
            unit,
        } = problem;

        let (lo, hi) = point_types
            .as_slice()
            .iter()
            .zip(values.iter())
            .filter(|(t, _)| **t == PointType::Fixed)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, &v)| {
                (lo.min(v), hi.max(v))
            });
        if !lo.is_finite() {
            return Err(DetectorError::PhysicsViolation(
                "potential problem has no fixed nodes".to_string(),
            ));
        }
        let span = if hi > lo { hi - lo } else { 1.0 };

        let mut group_of = vec![None; grid.len()];
        for (g, nodes) in floating.iter().enumerate() {
            for &i in nodes {
                group_of[i] = Some(g);
            }
        }
        let stencil = Stencil::build(grid, &permittivity)?;
        let colours = RedBlack::partition(grid, |f| {
            point_types.get(f).is_unknown() && group_of[f].is_none()
        });
        let omega = self.config.relaxation_factor;
        let started = Instant::now();

        let mut buf: Vec<(f64, PointType)> = Vec::with_capacity(colours.red.len());
        let mut report = SolveReport {
            converged: false,
            iterations: 0,
            max_change: f64::INFINITY,
            reclassified: 0,
            undepleted_nodes: 0,
            solve_time_ms: 0.0,
        };

        for iter in 0..self.config.max_iterations {
            let mut change = 0.0f64;
            let mut flips = 0usize;
            for nodes in [&colours.red, &colours.black] {
                let tags = point_types.as_slice();
                let c = half_sweep(&mut values, nodes, &mut buf, |i, v| {
                    let r = stencil.relax(i, v, rho[i]);
                    let mut next = v[i] + omega * (r.value - v[i]);
                    let mut tag = tags[i];
                    if depletion_handling && retag[i] {
                        if r.value < r.neighbour_min || r.value > r.neighbour_max {
                            next = next.clamp(r.neighbour_min, r.neighbour_max);
                            tag = PointType::Undepleted;
                        } else {
                            tag = PointType::Free;
                        }
                        next = next.clamp(lo, hi);
                    }
                    (next, tag)
                });
                change = change.max(c);
                for (&i, &(_, tag)) in nodes.iter().zip(buf.iter()) {
                    if point_types.get(i) != tag {
                        point_types.set(i, tag);
                        flips += 1;
                    }
                }
            }
            for (g, nodes) in floating.iter().enumerate() {
                let current = nodes.iter().map(|&i| values[i]).sum::<f64>() / nodes.len() as f64;
                let member = |j: usize| group_of[j] == Some(g);
                let Some(target) = stencil.relax_group(nodes, member, &values, &rho) else {
                    continue;
                };
                let next = current + omega * (target - current);
                for &i in nodes {
                    change = change.max((next - values[i]).abs());
                    values[i] = next;
                }
            }

            report.iterations = iter + 1;
            report.max_change = change / span;
            report.reclassified = flips;
            if (iter + 1) % self.config.log_every == 0 {
                debug!(
                    "SOR sweep {}: max change {:.3e}, {} reclassified",
                    iter + 1,
                    report.max_change,
                    flips
                );
            }
            if report.max_change < self.config.convergence_limit && flips == 0 {
                report.converged = true;
                break;
            }
        }

        report.undepleted_nodes = point_types.undepleted_count();
        report.solve_time_ms = started.elapsed().as_secs_f64() * 1e3;
        if report.converged {
            info!(
                "{:?} potential converged after {} sweeps ({:.1} ms, {} undepleted nodes)",
                unit, report.iterations, report.solve_time_ms, report.undepleted_nodes
            );
        } else {
            warn!(
                "{:?} potential did not converge in {} sweeps (max change {:.3e}, {} reclassified)",
                unit, report.iterations, report.max_change, report.reclassified
            );
        }

        Ok(PotentialSolution {
            potential: ScalarField::from_flat(Arc::clone(grid), values, unit)?,
            point_types,
            report,
        })
    }
}

/// Solve the electric potential of `geometry` on `grid`.
pub fn electric_potential(
    geometry: &dyn DetectorGeometry,
    grid: Arc<Grid>,
    config: &SolverConfig,
) -> SimResult<PotentialSolution> {
    PotentialSolver::new(grid, config.clone())?.electric_potential(geometry)
}

/// Solve the weighting potential of `contact` on `grid`.
pub fn weighting_potential(
    geometry: &dyn DetectorGeometry,
    grid: Arc<Grid>,
    contact: usize,
    config: &SolverConfig,
) -> SimResult<PotentialSolution> {
    PotentialSolver::new(grid, config.clone())?.weighting_potential(geometry, contact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CoaxialDetector, Contact, PlanarDetector};
    use ssd_types::constants::EPSILON0;
    use ssd_types::state::{CoordinateSystem, Material};

    /// 10 mm slab, 0 V below, 100 V on top, floating grid plane at 2.5 mm.
    struct GatedSlab {
        contacts: Vec<Contact>,
        material: Material,
    }

    impl GatedSlab {
        const GATE_Z: f64 = 0.0025;

        fn new() -> Self {
            let contact = |id: usize, name: &str, bias: Option<f64>| Contact {
                id,
                name: name.to_string(),
                bias,
            };
            GatedSlab {
                contacts: vec![
                    contact(0, "bottom", Some(0.0)),
                    contact(1, "top", Some(100.0)),
                    contact(2, "gate", None),
                ],
                material: Material::germanium(),
            }
        }
    }

    impl DetectorGeometry for GatedSlab {
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
            p[2] > 0.0 && p[2] < 0.01 && self.contact_at(p).is_none()
        }

        fn contact_at(&self, p: [f64; 3]) -> Option<usize> {
            if p[2] <= 1e-12 {
                Some(0)
            } else if p[2] >= 0.01 - 1e-12 {
                Some(1)
            } else if (p[2] - Self::GATE_Z).abs() <= 1e-12 {
                Some(2)
            } else {
                None
            }
        }
    }

    fn tight() -> SolverConfig {
        SolverConfig {
            convergence_limit: 1e-10,
            max_iterations: 50_000,
            ..SolverConfig::default()
        }
    }

    #[test]
    fn test_planar_linear_potential() {
        let det = PlanarDetector::new(0.01, 0.01, 0.0, 100.0).unwrap();
        let grid = Arc::new(det.grid(3, 21, 0.0).unwrap());
        let sol = electric_potential(&det, Arc::clone(&grid), &tight()).unwrap();
        assert!(sol.report.converged, "report: {:?}", sol.report);
        assert_eq!(sol.potential.unit(), Unit::Volt);
        for flat in 0..grid.len() {
            let z = grid.node_position(flat)[2];
            let v = sol.potential.get(flat);
            assert!((v - 1e4 * z).abs() < 1e-4, "V({z}) = {v}");
        }
    }

    #[test]
    fn test_weighting_potential_planar() {
        let det = PlanarDetector::new(0.01, 0.01, 0.0, 100.0).unwrap();
        let grid = Arc::new(det.grid(3, 11, 0.0).unwrap());
        let sol = weighting_potential(&det, Arc::clone(&grid), 1, &tight()).unwrap();
        assert_eq!(sol.potential.unit(), Unit::Dimensionless);
        for flat in 0..grid.len() {
            let z = grid.node_position(flat)[2];
            assert!((sol.potential.get(flat) - z / 0.01).abs() < 1e-6);
        }
        assert!(matches!(
            weighting_potential(&det, grid, 5, &tight()),
            Err(DetectorError::MissingContact(5))
        ));
    }

    #[test]
    fn test_weighting_potentials_sum_to_one() {
        let det = CoaxialDetector::new(0.005, 0.03, 0.04, 2000.0, 0.0).unwrap();
        let grid = Arc::new(det.grid_2d(26, 9).unwrap());
        let w0 = weighting_potential(&det, Arc::clone(&grid), 0, &tight()).unwrap();
        let w1 = weighting_potential(&det, Arc::clone(&grid), 1, &tight()).unwrap();
        for flat in 0..grid.len() {
            let s = w0.potential.get(flat) + w1.potential.get(flat);
            assert!((s - 1.0).abs() < 1e-6, "sum at node {flat}: {s}");
        }
    }

    #[test]
    fn test_undefined_point_type_rejected() {
        let det = PlanarDetector::new(0.01, 0.01, 0.0, 100.0).unwrap();
        let grid = Arc::new(det.grid(3, 5, 0.0).unwrap());
        let mut problem = PotentialProblem::electric(&det, &grid).unwrap();
        problem.point_types.set(20, PointType::Undefined);
        problem.point_types.set(21, PointType::Undefined);
        let solver = PotentialSolver::new(grid, tight()).unwrap();
        match solver.solve(problem, false) {
            Err(DetectorError::UndefinedPointType { count }) => assert_eq!(count, 2),
            other => panic!("expected UndefinedPointType, got {other:?}"),
        }
    }

    #[test]
    fn test_non_convergence_reports_last_iterate() {
        let det = PlanarDetector::new(0.01, 0.01, 0.0, 100.0).unwrap();
        let grid = Arc::new(det.grid(3, 41, 0.0).unwrap());
        let config = SolverConfig {
            max_iterations: 3,
            ..tight()
        };
        let sol = electric_potential(&det, grid, &config).unwrap();
        assert!(!sol.report.converged);
        assert_eq!(sol.report.iterations, 3);
        assert!(sol.report.max_change > 0.0);
        assert!(sol.potential.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_partial_depletion_width() {
        // n-type slab, full depletion at 200 V for ρ/(ε0 εr) = 4e6 V/m²
        let thickness = 0.01;
        let c = 4e6;
        let rho = c * EPSILON0 * 16.0;
        let bias = 100.0;
        let det = PlanarDetector::new(thickness, 0.01, 0.0, bias)
            .unwrap()
            .with_charge_density(rho);
        let grid = Arc::new(det.grid(3, 41, 0.0).unwrap());
        let config = SolverConfig {
            convergence_limit: 1e-8,
            depletion_handling: true,
            ..tight()
        };
        let sol = electric_potential(&det, grid, &config).unwrap();
        assert!(sol.report.converged, "report: {:?}", sol.report);
        assert!(!sol.is_fully_depleted());
        let width = sol.active_volume() / (0.01 * 0.01);
        let expected = (2.0 * bias / c).sqrt();
        assert!(
            (width - expected).abs() < 3.0 * thickness / 40.0,
            "depleted width {width}, expected {expected}"
        );
        assert!(sol.potential.max() <= bias + 1e-9);
    }

    #[test]
    fn test_full_depletion_above_threshold() {
        let c = 4e6;
        let det = PlanarDetector::new(0.01, 0.01, 0.0, 300.0)
            .unwrap()
            .with_charge_density(c * EPSILON0 * 16.0);
        let grid = Arc::new(det.grid(3, 41, 0.0).unwrap());
        let config = SolverConfig {
            convergence_limit: 1e-8,
            depletion_handling: true,
            ..tight()
        };
        let sol = electric_potential(&det, Arc::clone(&grid), &config).unwrap();
        assert!(sol.report.converged);
        assert!(sol.is_fully_depleted());
        let bulk: f64 = (0..grid.len())
            .filter(|&f| sol.point_types.get(f) == PointType::Free)
            .map(|f| grid.cell_volume(f))
            .sum();
        assert!((sol.active_volume() - bulk).abs() < 1e-15);
        assert!(sol.active_volume() > 0.9 * 1e-6);
    }

    #[test]
    fn test_fixed_nodes_never_retagged() {
        let det = PlanarDetector::new(0.01, 0.01, 0.0, 50.0)
            .unwrap()
            .with_charge_density(4e6 * EPSILON0 * 16.0);
        let grid = Arc::new(det.grid(3, 21, 0.0).unwrap());
        let config = SolverConfig {
            depletion_handling: true,
            ..tight()
        };
        let sol = electric_potential(&det, Arc::clone(&grid), &config).unwrap();
        assert_eq!(sol.point_types.count(PointType::Fixed), 18);
        for flat in 0..grid.len() {
            let z = grid.node_position(flat)[2];
            if z < 1e-12 {
                assert_eq!(sol.potential.get(flat), 0.0);
            }
        }
    }

    #[test]
    fn test_floating_contact_is_one_equipotential() {
        let det = GatedSlab::new();
        let grid = Arc::new(
            PlanarDetector::new(0.01, 0.01, 0.0, 100.0)
                .unwrap()
                .grid(3, 21, 0.0)
                .unwrap(),
        );
        let problem = PotentialProblem::electric(&det, &grid).unwrap();
        assert_eq!(problem.floating.len(), 1);
        assert_eq!(problem.floating[0].len(), 9);

        let config = SolverConfig {
            depletion_handling: true,
            ..tight()
        };
        let sol = electric_potential(&det, Arc::clone(&grid), &config).unwrap();
        assert!(sol.report.converged, "report: {:?}", sol.report);
        assert_eq!(sol.report.undepleted_nodes, 0);
        assert!(sol.is_fully_depleted());

        let gate: Vec<f64> = (0..grid.len())
            .filter(|&f| (grid.node_position(f)[2] - GatedSlab::GATE_Z).abs() < 1e-12)
            .map(|f| sol.potential.get(f))
            .collect();
        assert_eq!(gate.len(), 9);
        assert!(gate.iter().all(|&v| v == gate[0]), "gate values {gate:?}");
        assert!((gate[0] - 25.0).abs() < 1e-4, "gate at {} V", gate[0]);
        for flat in 0..grid.len() {
            let z = grid.node_position(flat)[2];
            assert!((sol.potential.get(flat) - 1e4 * z).abs() < 1e-4);
        }
    }
}
