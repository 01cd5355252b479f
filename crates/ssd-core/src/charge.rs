// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Charge Generation
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Number of electron-hole pairs created by an energy deposit.
//!
//! N = E / ε with ε the mean pair-creation energy. With Fano noise enabled
//! N is drawn from Normal(N, √(F·N)), seeded per event so that the result
//! does not depend on scheduling.

use rand::prelude::*;
use rand_distr::Normal;
use ssd_types::config::SignalConfig;
use ssd_types::error::{DetectorError, SimResult};
use ssd_types::event::DepositionEvent;
use ssd_types::state::Material;

/// Odd 64-bit constant spreading consecutive event ids over the seed space.
const EVENT_SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeGenerator {
    ionization_energy_ev: f64,
    fano_factor: f64,
    fano_noise: bool,
    seed: u64,
}

impl ChargeGenerator {
    pub fn new(material: &Material, config: &SignalConfig) -> SimResult<Self> {
        if !material.ionization_energy_ev.is_finite() || material.ionization_energy_ev <= 0.0 {
            return Err(DetectorError::PhysicsViolation(format!(
                "{} ionization energy must be finite and > 0, got {}",
                material.name, material.ionization_energy_ev
            )));
        }
        if !material.fano_factor.is_finite() || material.fano_factor < 0.0 {
            return Err(DetectorError::PhysicsViolation(format!(
                "{} Fano factor must be finite and >= 0, got {}",
                material.name, material.fano_factor
            )));
        }
        Ok(ChargeGenerator {
            ionization_energy_ev: material.ionization_energy_ev,
            fano_factor: material.fano_factor,
            fano_noise: config.fano_noise,
            seed: config.seed,
        })
    }

    /// Expected pair count for `energy_ev`.
    pub fn mean_carriers(&self, energy_ev: f64) -> f64 {
        energy_ev / self.ionization_energy_ev
    }

    /// RNG stream of one event.
    pub fn event_rng(&self, event_id: u64) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ event_id.wrapping_mul(EVENT_SEED_MIX))
    }

    /// Pair count for one deposit, never negative.
    pub fn carriers<R: Rng>(&self, energy_ev: f64, rng: &mut R) -> SimResult<f64> {
        if !energy_ev.is_finite() || energy_ev < 0.0 {
            return Err(DetectorError::PhysicsViolation(format!(
                "deposit energy must be finite and >= 0, got {energy_ev}"
            )));
        }
        let mean = self.mean_carriers(energy_ev);
        if !self.fano_noise || mean == 0.0 {
            return Ok(mean);
        }
        let normal = Normal::new(mean, (self.fano_factor * mean).sqrt())
            .map_err(|e| DetectorError::Config(e.to_string()))?;
        Ok(normal.sample(rng).max(0.0))
    }

    /// Pair counts of all deposits of an event, in deposit order.
    pub fn carriers_for_event(&self, event: &DepositionEvent) -> SimResult<Vec<f64>> {
        let mut rng = self.event_rng(event.event_id);
        event
            .deposits
            .iter()
            .map(|d| self.carriers(d.energy, &mut rng))
            .collect()
    }
}
