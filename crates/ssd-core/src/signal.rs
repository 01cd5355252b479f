// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Signal Synthesizer
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Induced charge on contacts via the Shockley–Ramo theorem.
//!
//! For every path segment the charge induced on contact k changes by
//!   ΔQ_k = q · ∇W_k(x_mid) · Δx
//! which is the time integral of q v·∇W_k over the segment. The running sum
//! is resampled onto a uniform time grid.

use crate::efield::{gradient_field, InterpolatedVector};
use log::warn;
use ssd_math::rk4::{axpy, dot, sub};
use ssd_types::config::{IncompletePolicy, SignalConfig};
use ssd_types::error::{DetectorError, SimResult};
use ssd_types::event::{ChargeUnit, DriftPath, EventWaveforms, Waveform};
use ssd_types::field::{ScalarField, Unit};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A drift path carrying `carriers` elementary charges of its type.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargedPath {
    pub path: DriftPath,
    pub carriers: f64,
}

/// Linear resampling of a piecewise-linear signal `(times, values)` onto
/// `t_j = j * step`. Before the first time the first value holds, after the
/// last time the last value holds.
pub fn resample_linear(times: &[f64], values: &[f64], step: f64, len: usize) -> SimResult<Vec<f64>> {
    if times.len() != values.len() {
        return Err(DetectorError::ShapeMismatch {
            what: "resampled values".to_string(),
            expected: vec![times.len()],
            actual: vec![values.len()],
        });
    }
    if times.is_empty() {
        return Err(DetectorError::PhysicsViolation(
            "cannot resample an empty signal".to_string(),
        ));
    }
    let mut out = Vec::with_capacity(len);
    let mut k = 0usize;
    for j in 0..len {
        let t = j as f64 * step;
        while k + 1 < times.len() && times[k + 1] <= t {
            k += 1;
        }
        let v = if k + 1 >= times.len() || t <= times[k] {
            values[k]
        } else {
            let span = times[k + 1] - times[k];
            if span > 0.0 {
                values[k] + (values[k + 1] - values[k]) * (t - times[k]) / span
            } else {
                values[k + 1]
            }
        };
        out.push(v);
    }
    Ok(out)
}

/// Weighting-field gradients of the contacts of interest.
#[derive(Debug, Clone)]
pub struct SignalSynthesizer {
    weighting: BTreeMap<usize, InterpolatedVector>,
    config: SignalConfig,
}

impl SignalSynthesizer {
    /// `weighting` maps contact ids to their weighting potentials.
    pub fn new(
        weighting: &BTreeMap<usize, Arc<ScalarField>>,
        config: SignalConfig,
    ) -> SimResult<Self> {
        config.validate()?;
        let mut gradients = BTreeMap::new();
        for (&contact, potential) in weighting {
            if potential.unit() != Unit::Dimensionless {
                return Err(DetectorError::PhysicsViolation(format!(
                    "weighting potential of contact {contact} must be dimensionless, got {:?}",
                    potential.unit()
                )));
            }
            let grad = gradient_field(potential)?;
            gradients.insert(contact, InterpolatedVector::new(Arc::new(grad)));
        }
        Ok(SignalSynthesizer {
            weighting: gradients,
            config,
        })
    }

    pub fn contacts(&self) -> impl Iterator<Item = usize> + '_ {
        self.weighting.keys().copied()
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Running induced charge (e) on `contact` at every point of `path`.
    pub fn induced_charge(&self, contact: usize, charged: &ChargedPath) -> SimResult<Vec<f64>> {
        let grad = self
            .weighting
            .get(&contact)
            .ok_or(DetectorError::MissingContact(contact))?;
        let q = charged.path.carrier().charge_sign() * charged.carriers;
        let points = charged.path.points();
        let mut out = Vec::with_capacity(points.len());
        let mut acc = 0.0;
        out.push(acc);
        for seg in points.windows(2) {
            let dx = sub(seg[1], seg[0]);
            let mid = axpy(seg[0], 0.5, dx);
            // a chord ending on a curved boundary may have its midpoint just outside
            let g = grad.at(mid).or_else(|_| grad.at(seg[0]))?;
            acc += q * dot(g, dx);
            out.push(acc);
        }
        Ok(out)
    }

    fn waveform_length(&self, paths: &[ChargedPath]) -> usize {
        self.config.waveform_length.unwrap_or_else(|| {
            let longest = paths
                .iter()
                .map(|p| p.path.duration())
                .fold(0.0, f64::max);
            (longest / self.config.sampling_step).ceil() as usize + 1
        })
    }

    /// Waveforms of one event on every contact of interest.
    ///
    /// Returns `None` when the event holds an incomplete path and the policy
    /// discards such events.
    pub fn synthesize(
        &self,
        event_id: u64,
        detector_id: u32,
        paths: &[ChargedPath],
    ) -> SimResult<Option<EventWaveforms>> {
        let incomplete_paths = paths.iter().filter(|p| p.path.is_incomplete()).count();
        if incomplete_paths > 0 && self.config.incomplete_policy == IncompletePolicy::DiscardEvent {
            warn!("event {event_id}: discarded, {incomplete_paths} drift paths incomplete");
            return Ok(None);
        }

        let len = self.waveform_length(paths);
        let step = self.config.sampling_step;
        let mut waveforms = BTreeMap::new();
        for contact in self.contacts() {
            let mut samples = vec![0.0; len];
            for charged in paths {
                let q = self.induced_charge(contact, charged)?;
                let resampled = resample_linear(charged.path.times(), &q, step, len)?;
                for (s, r) in samples.iter_mut().zip(resampled) {
                    *s += r;
                }
            }
            waveforms.insert(
                contact,
                Waveform {
                    contact,
                    time_step: step,
                    unit: ChargeUnit::ElementaryCharge,
                    samples,
                },
            );
        }
        Ok(Some(EventWaveforms {
            event_id,
            detector_id,
            waveforms,
            incomplete_paths,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssd_types::event::{CarrierType, Termination};
    use ssd_types::state::{Axis, Grid};

    /// W_k on a 1 cm slab: contact 1 at z = L, contact 0 at z = 0.
    fn planar_synth(config: SignalConfig) -> SignalSynthesizer {
        let grid = Arc::new(
            Grid::cartesian(
                Axis::uniform(0.0, 0.01, 2).unwrap(),
                Axis::uniform(0.0, 0.01, 2).unwrap(),
                Axis::uniform(0.0, 0.01, 11).unwrap(),
            )
            .unwrap(),
        );
        let mut weighting = BTreeMap::new();
        for contact in [0usize, 1] {
            let w = (0..grid.len())
                .map(|i| {
                    let z = grid.node_coords(i)[2] / 0.01;
                    if contact == 1 {
                        z
                    } else {
                        1.0 - z
                    }
                })
                .collect();
            let field = ScalarField::from_flat(Arc::clone(&grid), w, Unit::Dimensionless).unwrap();
            weighting.insert(contact, Arc::new(field));
        }
        SignalSynthesizer::new(&weighting, config).unwrap()
    }

    fn straight(carrier: CarrierType, z0: f64, z1: f64, steps: usize, dt: f64, end: Termination) -> DriftPath {
        let points = (0..=steps)
            .map(|k| [0.005, 0.005, z0 + (z1 - z0) * k as f64 / steps as f64])
            .collect();
        let times = (0..=steps).map(|k| k as f64 * dt).collect();
        DriftPath::new(carrier, points, times, end).unwrap()
    }

    #[test]
    fn test_resample_linear_partial_segments() {
        let times = [0.0, 1.5, 4.0];
        let values = [0.0, 3.0, 8.0];
        let out = resample_linear(&times, &values, 1.0, 6).unwrap();
        let expected = [0.0, 2.0, 4.0, 6.0, 8.0, 8.0];
        for (o, e) in out.iter().zip(expected.iter()) {
            assert!((o - e).abs() < 1e-12, "{out:?}");
        }
    }

    #[test]
    fn test_resample_rejects_empty_or_mismatched() {
        assert!(resample_linear(&[], &[], 1.0, 4).is_err());
        assert!(resample_linear(&[0.0, 1.0], &[0.0], 1.0, 4).is_err());
        let held = resample_linear(&[0.0], &[2.5], 1.0, 3).unwrap();
        assert_eq!(held, vec![2.5; 3]);
    }

    #[test]
    fn test_pair_collection_gives_full_charge() {
        let synth = planar_synth(SignalConfig::default());
        let absorbed = |c| Termination::Absorbed { contact: Some(c) };
        let paths = vec![
            ChargedPath {
                path: straight(CarrierType::Hole, 0.004, 0.0, 8, 1e-9, absorbed(0)),
                carriers: 1000.0,
            },
            ChargedPath {
                path: straight(CarrierType::Electron, 0.004, 0.01, 4, 1e-9, absorbed(1)),
                carriers: 1000.0,
            },
        ];
        let ev = synth.synthesize(7, 2, &paths).unwrap().unwrap();
        assert_eq!(ev.event_id, 7);
        assert_eq!(ev.incomplete_paths, 0);
        let w0 = &ev.waveforms[&0];
        let w1 = &ev.waveforms[&1];
        assert_eq!(w0.samples.len(), 9);
        assert_eq!(w0.unit, ChargeUnit::ElementaryCharge);
        assert!((w0.final_value() - 1000.0).abs() < 1e-9);
        assert!((w1.final_value() + 1000.0).abs() < 1e-9);
        assert_eq!(w0.samples[0], 0.0);
        for (a, b) in w0.samples.iter().zip(w1.samples.iter()) {
            assert!((a + b).abs() < 1e-9);
        }
        // electrons done after 4 ns: contact 0 ramps faster before than after
        let early = w0.samples[4] - w0.samples[0];
        let late = w0.samples[8] - w0.samples[4];
        assert!(early > late);
    }

    #[test]
    fn test_incomplete_policy() {
        let path = ChargedPath {
            path: straight(CarrierType::Hole, 0.004, 0.003, 2, 1e-9, Termination::Incomplete),
            carriers: 10.0,
        };
        let keep = planar_synth(SignalConfig::default());
        let ev = keep.synthesize(1, 1, std::slice::from_ref(&path)).unwrap().unwrap();
        assert_eq!(ev.incomplete_paths, 1);
        assert!((ev.waveforms[&1].final_value() + 10.0 * 0.1).abs() < 1e-9);

        let discard = planar_synth(SignalConfig {
            incomplete_policy: IncompletePolicy::DiscardEvent,
            ..SignalConfig::default()
        });
        assert!(discard.synthesize(1, 1, &[path]).unwrap().is_none());
    }

    #[test]
    fn test_fixed_waveform_length_and_unknown_contact() {
        let synth = planar_synth(SignalConfig {
            waveform_length: Some(32),
            ..SignalConfig::default()
        });
        let charged = ChargedPath {
            path: straight(CarrierType::Hole, 0.004, 0.0, 4, 1e-9, Termination::Exited),
            carriers: 1.0,
        };
        let ev = synth.synthesize(0, 0, std::slice::from_ref(&charged)).unwrap().unwrap();
        assert!(ev.waveforms.values().all(|w| w.samples.len() == 32));
        assert!(matches!(
            synth.induced_charge(9, &charged),
            Err(DetectorError::MissingContact(9))
        ));
    }
}
