// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Trajectory Integrator
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Point-charge drift through an interpolated velocity field.
//!
//! Fixed-step RK4 in time. When a stage would sample outside the field the
//! step falls back to explicit Euler. A step that leaves the semiconductor
//! is bisected along its chord to place the end point on the boundary, so
//! the arrival time carries no half-step bias.

use crate::drift_field::DriftFields;
use crate::efield::InterpolatedVector;
use crate::geometry::DetectorGeometry;
use log::debug;
use rayon::prelude::*;
use ssd_math::rk4::{axpy, euler_step, norm, rk4_step, sub};
use ssd_types::config::DriftConfig;
use ssd_types::error::{DetectorError, SimResult};
use ssd_types::event::{CarrierType, DriftPath, Termination};
use ssd_types::state::{Grid, PointType, PointTypes};
use std::sync::Arc;

/// Drifts carriers of both types through one detector.
#[derive(Clone)]
pub struct Drifter {
    geometry: Arc<dyn DetectorGeometry>,
    point_types: Arc<PointTypes>,
    electron: InterpolatedVector,
    hole: InterpolatedVector,
    config: DriftConfig,
}

impl Drifter {
    pub fn new(
        geometry: Arc<dyn DetectorGeometry>,
        point_types: Arc<PointTypes>,
        fields: &DriftFields,
        config: DriftConfig,
    ) -> SimResult<Self> {
        config.validate()?;
        fields
            .electron
            .grid()
            .check_shape("point types", point_types.shape())?;
        Ok(Drifter {
            geometry,
            point_types,
            electron: InterpolatedVector::new(Arc::clone(&fields.electron)),
            hole: InterpolatedVector::new(Arc::clone(&fields.hole)),
            config,
        })
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    fn grid(&self) -> &Grid {
        self.electron.field().grid()
    }

    fn velocity(&self, carrier: CarrierType) -> &InterpolatedVector {
        match carrier {
            CarrierType::Electron => &self.electron,
            CarrierType::Hole => &self.hole,
        }
    }

    /// Inside the grid and the semiconductor, away from every contact.
    fn in_bulk(&self, p: [f64; 3]) -> bool {
        let grid = self.grid();
        grid.contains_grid_coords(&grid.to_grid_coords(p))
            && self.geometry.contains(p)
            && self.geometry.contact_at(p).is_none()
    }

    /// Contact collecting a carrier at `p`: `Some(contact)` when collected.
    fn collected(&self, p: [f64; 3]) -> Option<Option<usize>> {
        if let Some(id) = self.geometry.contact_at(p) {
            return Some(Some(id));
        }
        let grid = self.grid();
        let node = grid.nearest_node(p)?;
        if self.point_types.get(node) != PointType::Fixed {
            return None;
        }
        let coords = grid.to_grid_coords(p);
        let size = grid.local_cell_size(&coords)?;
        let node_coords = grid.node_coords(node);
        let distance = coords
            .iter()
            .zip(node_coords.iter())
            .enumerate()
            .map(|(d, (a, b))| {
                let mut delta = a - b;
                if Some(d) == grid.azimuthal_axis() {
                    delta *= coords[0];
                }
                delta * delta
            })
            .sum::<f64>()
            .sqrt();
        (distance <= self.config.contact_tolerance * size)
            .then(|| self.geometry.contact_at(grid.node_position(node)))
    }

    /// Bisect the chord `a → b` for the first point outside the bulk.
    /// Returns that point and its chord fraction.
    fn locate_crossing(&self, a: [f64; 3], b: [f64; 3]) -> ([f64; 3], f64) {
        let chord = sub(b, a);
        let (mut lo, mut hi) = (0.0, 1.0);
        for _ in 0..self.config.boundary_bisections {
            let mid = 0.5 * (lo + hi);
            if self.in_bulk(axpy(a, mid, chord)) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        (axpy(a, hi, chord), hi)
    }

    /// Drift one carrier from `start` until it is collected, leaves the
    /// semiconductor or runs out of steps.
    pub fn drift(&self, carrier: CarrierType, start: [f64; 3]) -> SimResult<DriftPath> {
        if start.iter().any(|c| !c.is_finite()) {
            return Err(DetectorError::PhysicsViolation(format!(
                "drift start must be finite, got {start:?}"
            )));
        }
        if let Some(contact) = self.collected(start) {
            return DriftPath::new(
                carrier,
                vec![start],
                vec![0.0],
                Termination::Absorbed { contact },
            );
        }
        if !self.in_bulk(start) {
            return Err(DetectorError::PhysicsViolation(format!(
                "drift start {start:?} lies outside the semiconductor"
            )));
        }

        let field = self.velocity(carrier);
        let dt = self.config.time_step;
        let mut points = vec![start];
        let mut times = vec![0.0];
        let mut x = start;
        let mut t = 0.0;

        for _ in 0..self.config.max_steps {
            let y = match rk4_step(x, dt, |p| field.at(p)) {
                Ok(y) => y,
                Err(_) => euler_step(x, dt, |p| field.at(p))?,
            };

            if !self.in_bulk(y) {
                let (p, s) = self.locate_crossing(x, y);
                points.push(p);
                times.push(t + s * dt);
                let termination = match self.collected(p) {
                    Some(contact) => Termination::Absorbed { contact },
                    None => Termination::Exited,
                };
                return DriftPath::new(carrier, points, times, termination);
            }
            if norm(sub(y, x)) == 0.0 {
                debug!("{carrier:?} stalled at {x:?} after {t:.3e} s");
                return DriftPath::new(carrier, points, times, Termination::Incomplete);
            }

            x = y;
            t += dt;
            points.push(x);
            times.push(t);
            if let Some(contact) = self.collected(x) {
                return DriftPath::new(
                    carrier,
                    points,
                    times,
                    Termination::Absorbed { contact },
                );
            }
        }

        debug!(
            "{carrier:?} from {start:?} still drifting after {} steps",
            self.config.max_steps
        );
        DriftPath::new(carrier, points, times, Termination::Incomplete)
    }

    /// Independent drifts from many starts, in parallel.
    pub fn drift_many(&self, carrier: CarrierType, starts: &[[f64; 3]]) -> SimResult<Vec<DriftPath>> {
        starts
            .par_iter()
            .map(|&start| self.drift(carrier, start))
            .collect()
    }

    /// Electron and hole created at the same point.
    pub fn drift_pair(&self, start: [f64; 3]) -> SimResult<(DriftPath, DriftPath)> {
        let (electron, hole) = rayon::join(
            || self.drift(CarrierType::Electron, start),
            || self.drift(CarrierType::Hole, start),
        );
        Ok((electron?, hole?))
    }
}
