// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Drift Field Builder
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Electron and hole drift-velocity fields from an electric field.

use crate::drift_model::ChargeDriftModel;
use rayon::prelude::*;
use ssd_types::error::{DetectorError, SimResult};
use ssd_types::event::CarrierType;
use ssd_types::field::{Unit, VectorField};
use std::sync::Arc;

/// Per-node drift velocities (m/s) in the grid's natural basis.
#[derive(Debug, Clone)]
pub struct DriftFields {
    pub electron: Arc<VectorField>,
    pub hole: Arc<VectorField>,
}

impl DriftFields {
    /// Map every node of `efield` through `model`.
    ///
    /// Cylindrical vectors are rotated into Cartesian components at the node
    /// azimuth before the model sees them, so crystal-frame models work
    /// unchanged.
    pub fn build(efield: &VectorField, model: &dyn ChargeDriftModel) -> SimResult<Self> {
        if efield.unit() != Unit::VoltPerMetre {
            return Err(DetectorError::PhysicsViolation(format!(
                "drift fields need an electric field in V/m, got {:?}",
                efield.unit()
            )));
        }
        let grid = efield.grid();
        let (electron, hole): (Vec<[f64; 3]>, Vec<[f64; 3]>) = efield
            .as_slice()
            .par_iter()
            .enumerate()
            .map(|(flat, &e)| {
                let phi = grid.node_azimuth(flat);
                let e_cart = grid.basis_to_cartesian(e, phi);
                (
                    grid.cartesian_to_basis(model.electron_velocity(e_cart), phi),
                    grid.cartesian_to_basis(model.hole_velocity(e_cart), phi),
                )
            })
            .unzip();
        Ok(DriftFields {
            electron: Arc::new(VectorField::from_flat(
                Arc::clone(grid),
                electron,
                Unit::MetrePerSecond,
            )?),
            hole: Arc::new(VectorField::from_flat(
                Arc::clone(grid),
                hole,
                Unit::MetrePerSecond,
            )?),
        })
    }

    pub fn for_carrier(&self, carrier: CarrierType) -> &Arc<VectorField> {
        match carrier {
            CarrierType::Electron => &self.electron,
            CarrierType::Hole => &self.hole,
        }
    }
}
