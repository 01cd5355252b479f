// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Events
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::constants::ELEMENTARY_CHARGE;
use crate::error::{DetectorError, SimResult};
use std::collections::BTreeMap;

/// One energy deposition inside a detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deposit {
    /// Cartesian position (m).
    pub position: [f64; 3],
    /// Deposited energy (eV).
    pub energy: f64,
}

/// All depositions of one event in one detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DepositionEvent {
    pub event_id: u64,
    pub detector_id: u32,
    pub deposits: Vec<Deposit>,
}

impl DepositionEvent {
    pub fn total_energy(&self) -> f64 {
        self.deposits.iter().map(|d| d.energy).sum()
    }

    /// Drop deposits for which `inside` is false. Returns the number removed.
    ///
    /// Numerically misplaced deposits are the caller's concern; the simulation
    /// rejects them instead of moving them.
    pub fn retain_inside<F: Fn([f64; 3]) -> bool>(&mut self, inside: F) -> usize {
        let before = self.deposits.len();
        self.deposits.retain(|d| inside(d.position));
        before - self.deposits.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CarrierType {
    Electron,
    Hole,
}

impl CarrierType {
    /// Charge sign in units of the elementary charge.
    pub fn charge_sign(self) -> f64 {
        match self {
            CarrierType::Electron => -1.0,
            CarrierType::Hole => 1.0,
        }
    }
}

/// How a drift path ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Reached a contact. `contact` is `None` when only the grid tagging
    /// identified a fixed node.
    Absorbed { contact: Option<usize> },
    /// Left the active volume away from any contact.
    Exited,
    /// Step budget exhausted before reaching a boundary.
    Incomplete,
}

/// Drift trajectory of one carrier: positions (m) and times (s).
#[derive(Debug, Clone, PartialEq)]
pub struct DriftPath {
    carrier: CarrierType,
    points: Vec<[f64; 3]>,
    times: Vec<f64>,
    termination: Termination,
}

impl DriftPath {
    /// Finalize a path. `points` and `times` must have equal, non-zero
    /// length and the times must be finite and non-decreasing.
    pub fn new(
        carrier: CarrierType,
        points: Vec<[f64; 3]>,
        times: Vec<f64>,
        termination: Termination,
    ) -> SimResult<Self> {
        if points.len() != times.len() {
            return Err(DetectorError::ShapeMismatch {
                what: "drift path times".to_string(),
                expected: vec![points.len()],
                actual: vec![times.len()],
            });
        }
        if points.is_empty() {
            return Err(DetectorError::PhysicsViolation(
                "drift path needs at least one point".to_string(),
            ));
        }
        if let Some(i) = times.iter().position(|t| !t.is_finite()) {
            return Err(DetectorError::PhysicsViolation(format!(
                "drift path time {i} is not finite"
            )));
        }
        if let Some(i) = times.windows(2).position(|w| w[1] < w[0]) {
            return Err(DetectorError::PhysicsViolation(format!(
                "drift path times decrease after sample {i}"
            )));
        }
        Ok(DriftPath {
            carrier,
            points,
            times,
            termination,
        })
    }

    pub fn carrier(&self) -> CarrierType {
        self.carrier
    }

    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn termination(&self) -> Termination {
        self.termination
    }

    pub fn is_absorbed(&self) -> bool {
        matches!(self.termination, Termination::Absorbed { .. })
    }

    pub fn is_incomplete(&self) -> bool {
        self.termination == Termination::Incomplete
    }

    pub fn start(&self) -> [f64; 3] {
        self.points[0]
    }

    pub fn end(&self) -> [f64; 3] {
        self.points[self.points.len() - 1]
    }

    /// Time of the last sample (s).
    pub fn duration(&self) -> f64 {
        self.times[self.times.len() - 1]
    }

    /// Total polyline length (m).
    pub fn drift_distance(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| {
                let d = [w[1][0] - w[0][0], w[1][1] - w[0][1], w[1][2] - w[0][2]];
                (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
            })
            .sum()
    }
}

/// Unit of waveform samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeUnit {
    /// Induced charge in elementary charges.
    ElementaryCharge,
    Coulomb,
}

impl ChargeUnit {
    /// One elementary charge expressed in this unit.
    pub fn elementary_charge(self) -> f64 {
        match self {
            ChargeUnit::ElementaryCharge => 1.0,
            ChargeUnit::Coulomb => ELEMENTARY_CHARGE,
        }
    }
}

/// Induced charge on one contact for one event, on a fixed time grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub contact: usize,
    /// Sample spacing (s); sample `i` is at `i * time_step`.
    pub time_step: f64,
    pub unit: ChargeUnit,
    pub samples: Vec<f64>,
}

impl Waveform {
    pub fn time_at(&self, i: usize) -> f64 {
        i as f64 * self.time_step
    }

    pub fn duration(&self) -> f64 {
        self.time_at(self.samples.len().saturating_sub(1))
    }

    pub fn final_value(&self) -> f64 {
        self.samples.last().copied().unwrap_or(0.0)
    }

    /// Same waveform with samples rescaled to `unit`.
    pub fn in_unit(&self, unit: ChargeUnit) -> Waveform {
        let scale = unit.elementary_charge() / self.unit.elementary_charge();
        Waveform {
            contact: self.contact,
            time_step: self.time_step,
            unit,
            samples: self.samples.iter().map(|s| s * scale).collect(),
        }
    }
}

/// Waveforms of all contacts of interest for one event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventWaveforms {
    pub event_id: u64,
    pub detector_id: u32,
    pub waveforms: BTreeMap<usize, Waveform>,
    /// Paths that ran out of steps but were kept.
    pub incomplete_paths: usize,
}

impl EventWaveforms {
    /// All waveforms rescaled to `unit`.
    pub fn in_unit(&self, unit: ChargeUnit) -> EventWaveforms {
        EventWaveforms {
            event_id: self.event_id,
            detector_id: self.detector_id,
            waveforms: self
                .waveforms
                .iter()
                .map(|(&c, w)| (c, w.in_unit(unit)))
                .collect(),
            incomplete_paths: self.incomplete_paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drift_distance_polyline() {
        let path = DriftPath::new(
            CarrierType::Hole,
            vec![[0.0, 0.0, 0.0], [3.0, 4.0, 0.0], [3.0, 4.0, 1.0]],
            vec![0.0, 1.0, 2.0],
            Termination::Absorbed { contact: Some(0) },
        )
        .unwrap();
        assert!((path.drift_distance() - 6.0).abs() < 1e-12);
        assert!((path.duration() - 2.0).abs() < 1e-12);
        assert!(path.is_absorbed());
    }

    #[test]
    fn test_malformed_drift_path_rejected() {
        let end = Termination::Incomplete;
        assert!(matches!(
            DriftPath::new(CarrierType::Electron, vec![], vec![], end),
            Err(DetectorError::PhysicsViolation(_))
        ));
        assert!(matches!(
            DriftPath::new(CarrierType::Electron, vec![[0.0; 3]; 2], vec![0.0], end),
            Err(DetectorError::ShapeMismatch { .. })
        ));
        assert!(DriftPath::new(CarrierType::Hole, vec![[0.0; 3]; 3], vec![0.0, 2.0, 1.0], end).is_err());
        assert!(DriftPath::new(CarrierType::Hole, vec![[0.0; 3]; 2], vec![0.0, f64::NAN], end).is_err());

        let still = DriftPath::new(CarrierType::Hole, vec![[1.0, 2.0, 3.0]], vec![0.0], end).unwrap();
        assert_eq!(still.start(), still.end());
        assert_eq!(still.duration(), 0.0);
        assert_eq!(still.drift_distance(), 0.0);
    }

    #[test]
    fn test_retain_inside_counts_removed() {
        let mut ev = DepositionEvent {
            event_id: 1,
            detector_id: 0,
            deposits: vec![
                Deposit {
                    position: [0.0, 0.0, 0.5],
                    energy: 1.0,
                },
                Deposit {
                    position: [0.0, 0.0, 1.5],
                    energy: 2.0,
                },
            ],
        };
        let removed = ev.retain_inside(|p| p[2] < 1.0);
        assert_eq!(removed, 1);
        assert_eq!(ev.deposits.len(), 1);
        assert!((ev.total_energy() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_waveform_timing() {
        let wf = Waveform {
            contact: 1,
            time_step: 2e-9,
            unit: ChargeUnit::ElementaryCharge,
            samples: vec![0.0, 0.5, 1.0],
        };
        assert!((wf.duration() - 4e-9).abs() < 1e-21);
        assert_eq!(wf.final_value(), 1.0);
    }

    #[test]
    fn test_waveform_unit_conversion() {
        let wf = Waveform {
            contact: 0,
            time_step: 1e-9,
            unit: ChargeUnit::ElementaryCharge,
            samples: vec![0.0, -5000.0, -10000.0],
        };
        let ev = EventWaveforms {
            event_id: 4,
            detector_id: 2,
            waveforms: BTreeMap::from([(0, wf.clone())]),
            incomplete_paths: 0,
        };
        let coulomb = ev.in_unit(ChargeUnit::Coulomb);
        let c = &coulomb.waveforms[&0];
        assert_eq!(c.unit, ChargeUnit::Coulomb);
        assert_eq!(c.time_step, wf.time_step);
        assert!((c.final_value() + 1.602176634e-15).abs() < 1e-27, "{}", c.final_value());

        let back = c.in_unit(ChargeUnit::ElementaryCharge);
        for (a, b) in back.samples.iter().zip(&wf.samples) {
            assert!((a - b).abs() < 1e-9);
        }
        assert_eq!(wf.in_unit(ChargeUnit::ElementaryCharge), wf);
    }
}
