// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Charge Drift Models
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Carrier velocity as a function of the local electric field.
//!
//! All vectors are Cartesian. Holes drift along E, electrons against it.

use ssd_math::rk4::{dot, norm};
use ssd_types::error::{DetectorError, SimResult};
use ssd_types::event::CarrierType;

/// Mapping from electric field (V/m) to drift velocity (m/s).
pub trait ChargeDriftModel: Send + Sync {
    fn electron_velocity(&self, e: [f64; 3]) -> [f64; 3];

    fn hole_velocity(&self, e: [f64; 3]) -> [f64; 3];

    fn velocity(&self, carrier: CarrierType, e: [f64; 3]) -> [f64; 3] {
        match carrier {
            CarrierType::Electron => self.electron_velocity(e),
            CarrierType::Hole => self.hole_velocity(e),
        }
    }
}

fn scale(v: [f64; 3], s: f64) -> [f64; 3] {
    [v[0] * s, v[1] * s, v[2] * s]
}

/// Shrink `v` to at most `max_speed`.
fn cap_speed(v: [f64; 3], max_speed: f64) -> [f64; 3] {
    let speed = norm(v);
    if speed > max_speed && speed > 0.0 {
        scale(v, max_speed / speed)
    } else {
        v
    }
}

fn validate_positive(label: &str, v: f64) -> SimResult<()> {
    if !v.is_finite() || v <= 0.0 {
        return Err(DetectorError::PhysicsViolation(format!(
            "{label} must be finite and > 0, got {v}"
        )));
    }
    Ok(())
}

/// v = ±μE with an optional speed limit.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantMobility {
    /// m²/(V·s)
    pub electron_mobility: f64,
    pub hole_mobility: f64,
    pub saturation_velocity: Option<f64>,
}

impl ConstantMobility {
    pub fn new(electron_mobility: f64, hole_mobility: f64) -> SimResult<Self> {
        validate_positive("electron mobility", electron_mobility)?;
        validate_positive("hole mobility", hole_mobility)?;
        Ok(ConstantMobility {
            electron_mobility,
            hole_mobility,
            saturation_velocity: None,
        })
    }

    pub fn with_saturation(mut self, velocity: f64) -> SimResult<Self> {
        validate_positive("saturation velocity", velocity)?;
        self.saturation_velocity = Some(velocity);
        Ok(self)
    }

    fn limit(&self, v: [f64; 3]) -> [f64; 3] {
        match self.saturation_velocity {
            Some(max) => cap_speed(v, max),
            None => v,
        }
    }
}

impl ChargeDriftModel for ConstantMobility {
    fn electron_velocity(&self, e: [f64; 3]) -> [f64; 3] {
        self.limit(scale(e, -self.electron_mobility))
    }

    fn hole_velocity(&self, e: [f64; 3]) -> [f64; 3] {
        self.limit(scale(e, self.hole_mobility))
    }
}

/// Caughey–Thomas parameters of one carrier species.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarrierMobility {
    /// Low-field mobility μ₀ (m²/(V·s)).
    pub mobility: f64,
    /// v_sat (m/s).
    pub saturation_velocity: f64,
    /// Shape exponent β.
    pub beta: f64,
}

impl CarrierMobility {
    fn validate(&self, label: &str) -> SimResult<()> {
        validate_positive(&format!("{label} mobility"), self.mobility)?;
        validate_positive(&format!("{label} saturation velocity"), self.saturation_velocity)?;
        validate_positive(&format!("{label} beta"), self.beta)
    }

    /// Drift speed at field magnitude `field` (V/m).
    ///
    /// v = μ₀E / (1 + (μ₀E / v_sat)^β)^(1/β)
    pub fn speed(&self, field: f64) -> f64 {
        let low = self.mobility * field;
        low / (1.0 + (low / self.saturation_velocity).powf(self.beta)).powf(1.0 / self.beta)
    }
}

/// Field-dependent mobility with velocity saturation.
///
/// Beyond `max_field` the speed is pinned to the saturation velocity.
#[derive(Debug, Clone, PartialEq)]
pub struct SaturatedMobility {
    pub electron: CarrierMobility,
    pub hole: CarrierMobility,
    /// V/m
    pub max_field: f64,
}

/// Default upper end of the calibrated field range (V/m).
const DEFAULT_MAX_FIELD_V_M: f64 = 1e7;

impl SaturatedMobility {
    pub fn new(electron: CarrierMobility, hole: CarrierMobility, max_field: f64) -> SimResult<Self> {
        electron.validate("electron")?;
        hole.validate("hole")?;
        validate_positive("max field", max_field)?;
        Ok(SaturatedMobility {
            electron,
            hole,
            max_field,
        })
    }

    /// High-purity germanium near 78 K.
    pub fn germanium() -> Self {
        SaturatedMobility {
            electron: CarrierMobility {
                mobility: 3.86,
                saturation_velocity: 1.0e5,
                beta: 0.8,
            },
            hole: CarrierMobility {
                mobility: 6.18,
                saturation_velocity: 0.9e5,
                beta: 0.75,
            },
            max_field: DEFAULT_MAX_FIELD_V_M,
        }
    }

    /// Silicon at room temperature.
    pub fn silicon() -> Self {
        SaturatedMobility {
            electron: CarrierMobility {
                mobility: 0.1417,
                saturation_velocity: 1.07e5,
                beta: 1.109,
            },
            hole: CarrierMobility {
                mobility: 0.0471,
                saturation_velocity: 8.37e4,
                beta: 1.213,
            },
            max_field: DEFAULT_MAX_FIELD_V_M,
        }
    }

    fn drift(&self, params: &CarrierMobility, e: [f64; 3], sign: f64) -> [f64; 3] {
        let field = norm(e);
        if field == 0.0 {
            return [0.0; 3];
        }
        let speed = if field >= self.max_field {
            params.saturation_velocity
        } else {
            params.speed(field)
        };
        scale(e, sign * speed / field)
    }
}

impl ChargeDriftModel for SaturatedMobility {
    fn electron_velocity(&self, e: [f64; 3]) -> [f64; 3] {
        self.drift(&self.electron, e, -1.0)
    }

    fn hole_velocity(&self, e: [f64; 3]) -> [f64; 3] {
        self.drift(&self.hole, e, 1.0)
    }
}

/// Orthonormal rotation of angle `angle` (rad) about the z axis.
pub fn rotation_about_z(angle: f64) -> [[f64; 3]; 3] {
    let (s, c) = angle.sin_cos();
    [[c, s, 0.0], [-s, c, 0.0], [0.0, 0.0, 1.0]]
}

fn mat_vec(m: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [dot(m[0], v), dot(m[1], v), dot(m[2], v)]
}

fn mat_t_vec(m: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[1][0] * v[1] + m[2][0] * v[2],
        m[0][1] * v[0] + m[1][1] * v[1] + m[2][1] * v[2],
        m[0][2] * v[0] + m[1][2] * v[1] + m[2][2] * v[2],
    ]
}

/// Crystal-axis dependent drift over an isotropic base model.
///
/// The base velocity is rotated into the crystal frame, scaled per crystal
/// axis, rotated back, and capped at `max_speed`.
#[derive(Debug, Clone)]
pub struct AnisotropicMobility<M> {
    base: M,
    /// Lab → crystal frame; rows are the crystal axes in lab coordinates.
    rotation: [[f64; 3]; 3],
    electron_scale: [f64; 3],
    hole_scale: [f64; 3],
    max_speed: f64,
}

impl<M: ChargeDriftModel> AnisotropicMobility<M> {
    pub fn new(
        base: M,
        rotation: [[f64; 3]; 3],
        electron_scale: [f64; 3],
        hole_scale: [f64; 3],
        max_speed: f64,
    ) -> SimResult<Self> {
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                if (dot(rotation[i], rotation[j]) - expected).abs() > 1e-9 {
                    return Err(DetectorError::PhysicsViolation(
                        "crystal rotation must be orthonormal".to_string(),
                    ));
                }
            }
        }
        for s in electron_scale.iter().chain(hole_scale.iter()) {
            validate_positive("crystal axis scale", *s)?;
        }
        validate_positive("max speed", max_speed)?;
        Ok(AnisotropicMobility {
            base,
            rotation,
            electron_scale,
            hole_scale,
            max_speed,
        })
    }

    pub fn base(&self) -> &M {
        &self.base
    }

    fn apply(&self, v: [f64; 3], s: [f64; 3]) -> [f64; 3] {
        let c = mat_vec(&self.rotation, v);
        let lab = mat_t_vec(&self.rotation, [c[0] * s[0], c[1] * s[1], c[2] * s[2]]);
        cap_speed(lab, self.max_speed)
    }
}

impl<M: ChargeDriftModel> ChargeDriftModel for AnisotropicMobility<M> {
    fn electron_velocity(&self, e: [f64; 3]) -> [f64; 3] {
        self.apply(self.base.electron_velocity(e), self.electron_scale)
    }

    fn hole_velocity(&self, e: [f64; 3]) -> [f64; 3] {
        self.apply(self.base.hole_velocity(e), self.hole_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: [f64; 3], b: [f64; 3], tol: f64) -> bool {
        (0..3).all(|i| (a[i] - b[i]).abs() <= tol)
    }

    #[test]
    fn test_constant_mobility_directions() {
        let m = ConstantMobility::new(3.0, 2.0).unwrap();
        let e = [0.0, 0.0, 1000.0];
        assert!(close(m.hole_velocity(e), [0.0, 0.0, 2000.0], 1e-12));
        assert!(close(m.electron_velocity(e), [0.0, 0.0, -3000.0], 1e-12));
        assert!(close(m.velocity(CarrierType::Hole, e), m.hole_velocity(e), 0.0));
    }

    #[test]
    fn test_constant_mobility_saturation() {
        let m = ConstantMobility::new(3.0, 2.0)
            .unwrap()
            .with_saturation(1e5)
            .unwrap();
        let v = m.electron_velocity([3e5, 4e5, 0.0]);
        assert!((norm(v) - 1e5).abs() < 1e-6);
        assert!(v[0] < 0.0 && v[1] < 0.0);
        assert!(ConstantMobility::new(-1.0, 2.0).is_err());
    }

    #[test]
    fn test_caughey_thomas_limits() {
        let m = SaturatedMobility::silicon();
        let low = m.hole_velocity([0.0, 10.0, 0.0]);
        assert!((low[1] - 0.0471 * 10.0).abs() < 1e-3 * 0.471);
        let mut last = 0.0;
        for k in 0..60 {
            let field = 10f64.powf(1.0 + k as f64 * 0.1);
            let speed = norm(m.electron_velocity([field, 0.0, 0.0]));
            assert!(speed >= last, "speed must not drop at {field} V/m");
            assert!(speed <= 1.07e5 + 1e-9);
            last = speed;
        }
        let beyond = m.electron_velocity([0.0, 0.0, 2e7]);
        assert!((beyond[2] + 1.07e5).abs() < 1e-9);
        assert_eq!(m.electron_velocity([0.0; 3]), [0.0; 3]);
    }

    #[test]
    fn test_anisotropic_identity_matches_base() {
        let base = SaturatedMobility::germanium();
        let m = AnisotropicMobility::new(
            base.clone(),
            rotation_about_z(0.3),
            [1.0; 3],
            [1.0; 3],
            1e6,
        )
        .unwrap();
        let e = [1200.0, -300.0, 5000.0];
        assert!(close(m.hole_velocity(e), base.hole_velocity(e), 1e-8));
        assert!(close(m.electron_velocity(e), base.electron_velocity(e), 1e-8));
    }

    #[test]
    fn test_anisotropic_axis_scale() {
        let base = ConstantMobility::new(1.0, 1.0).unwrap();
        // crystal x axis points along lab y
        let rot = rotation_about_z(std::f64::consts::FRAC_PI_2);
        let m = AnisotropicMobility::new(base, rot, [2.0, 1.0, 1.0], [1.0; 3], 1e9).unwrap();
        let along_y = m.electron_velocity([0.0, 100.0, 0.0]);
        assert!(close(along_y, [0.0, -200.0, 0.0], 1e-9), "{along_y:?}");
        let along_x = m.electron_velocity([100.0, 0.0, 0.0]);
        assert!(close(along_x, [-100.0, 0.0, 0.0], 1e-9), "{along_x:?}");
        let capped = AnisotropicMobility::new(
            ConstantMobility::new(1.0, 1.0).unwrap(),
            rot,
            [2.0, 1.0, 1.0],
            [1.0; 3],
            150.0,
        )
        .unwrap();
        assert!((norm(capped.electron_velocity([0.0, 100.0, 0.0])) - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_anisotropic_rejects_non_orthonormal() {
        let base = ConstantMobility::new(1.0, 1.0).unwrap();
        let bad = [[1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert!(AnisotropicMobility::new(base, bad, [1.0; 3], [1.0; 3], 1e5).is_err());
    }
}
