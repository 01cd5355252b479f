// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::error::{DetectorError, SimResult};
use serde::{Deserialize, Serialize};

/// Top-level simulation configuration.
/// Every section may be omitted from the JSON; missing fields take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub drift: DriftConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub symmetry: SymmetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Stop when the largest node change of a sweep, relative to the
    /// bias span, drops below this value.
    #[serde(default = "default_convergence_limit")]
    pub convergence_limit: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// SOR over-relaxation factor ω in (0, 2).
    #[serde(default = "default_relaxation_factor")]
    pub relaxation_factor: f64,
    #[serde(default)]
    pub depletion_handling: bool,
    /// Sweeps between progress log lines.
    #[serde(default = "default_log_every")]
    pub log_every: usize,
}

fn default_convergence_limit() -> f64 {
    1e-7
}
fn default_max_iterations() -> usize {
    20_000
}
fn default_relaxation_factor() -> f64 {
    1.4
}
fn default_log_every() -> usize {
    1000
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            convergence_limit: default_convergence_limit(),
            max_iterations: default_max_iterations(),
            relaxation_factor: default_relaxation_factor(),
            depletion_handling: false,
            log_every: default_log_every(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Integrator time step (s).
    #[serde(default = "default_time_step")]
    pub time_step: f64,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// A carrier counts as collected when its nearest node is fixed and it
    /// is closer than this fraction of the local cell size.
    #[serde(default = "default_contact_tolerance")]
    pub contact_tolerance: f64,
    /// Bisection steps used to locate a boundary crossing.
    #[serde(default = "default_boundary_bisections")]
    pub boundary_bisections: usize,
}

fn default_time_step() -> f64 {
    1e-9
}
fn default_max_steps() -> usize {
    5000
}
fn default_contact_tolerance() -> f64 {
    1e-3
}
fn default_boundary_bisections() -> usize {
    24
}

impl Default for DriftConfig {
    fn default() -> Self {
        DriftConfig {
            time_step: default_time_step(),
            max_steps: default_max_steps(),
            contact_tolerance: default_contact_tolerance(),
            boundary_bisections: default_boundary_bisections(),
        }
    }
}

/// What to do with an event if one of its paths ran out of steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompletePolicy {
    #[default]
    UseTruncated,
    DiscardEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Waveform sample spacing (s).
    #[serde(default = "default_sampling_step")]
    pub sampling_step: f64,
    /// Fixed number of samples; by default long enough for the slowest carrier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waveform_length: Option<usize>,
    #[serde(default)]
    pub incomplete_policy: IncompletePolicy,
    /// Apply Fano fluctuations to the number of generated carriers.
    #[serde(default)]
    pub fano_noise: bool,
    #[serde(default)]
    pub seed: u64,
}

fn default_sampling_step() -> f64 {
    1e-9
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig {
            sampling_step: default_sampling_step(),
            waveform_length: None,
            incomplete_policy: IncompletePolicy::default(),
            fano_noise: false,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Merge radius (m); 0 disables clustering.
    #[serde(default)]
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymmetryConfig {
    /// Slices used when a 2-D cylindrical solution is viewed in 3-D.
    #[serde(default = "default_azimuthal_slices")]
    pub azimuthal_slices: usize,
}

fn default_azimuthal_slices() -> usize {
    36
}

impl Default for SymmetryConfig {
    fn default() -> Self {
        SymmetryConfig {
            azimuthal_slices: default_azimuthal_slices(),
        }
    }
}

fn positive(name: &str, v: f64) -> SimResult<()> {
    if !v.is_finite() || v <= 0.0 {
        return Err(DetectorError::Config(format!(
            "{name} must be finite and > 0, got {v}"
        )));
    }
    Ok(())
}

impl SolverConfig {
    pub fn validate(&self) -> SimResult<()> {
        positive("solver.convergence_limit", self.convergence_limit)?;
        if !(self.relaxation_factor > 0.0 && self.relaxation_factor < 2.0) {
            return Err(DetectorError::Config(format!(
                "solver.relaxation_factor must be in (0, 2), got {}",
                self.relaxation_factor
            )));
        }
        if self.max_iterations == 0 || self.log_every == 0 {
            return Err(DetectorError::Config(
                "solver.max_iterations and solver.log_every must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl DriftConfig {
    pub fn validate(&self) -> SimResult<()> {
        positive("drift.time_step", self.time_step)?;
        positive("drift.contact_tolerance", self.contact_tolerance)?;
        if self.max_steps == 0 {
            return Err(DetectorError::Config(
                "drift.max_steps must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl SignalConfig {
    pub fn validate(&self) -> SimResult<()> {
        positive("signal.sampling_step", self.sampling_step)?;
        if self.waveform_length == Some(0) {
            return Err(DetectorError::Config(
                "signal.waveform_length must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl SimulationConfig {
    /// Load from a JSON file.
    pub fn from_file(path: &str) -> SimResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> SimResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        self.solver.validate()?;
        self.drift.validate()?;
        self.signal.validate()?;
        if !self.clustering.radius.is_finite() || self.clustering.radius < 0.0 {
            return Err(DetectorError::Config(format!(
                "clustering.radius must be finite and >= 0, got {}",
                self.clustering.radius
            )));
        }
        if self.symmetry.azimuthal_slices < 2 {
            return Err(DetectorError::Config(format!(
                "symmetry.azimuthal_slices must be >= 2, got {}",
                self.symmetry.azimuthal_slices
            )));
        }
        Ok(())
    }
}
