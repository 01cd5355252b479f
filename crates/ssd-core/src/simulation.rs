// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Simulation
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! One detector, set up once, turning deposition events into waveforms.
//!
//! Setup solves the electric potential, derives the field and the drift
//! fields, and solves one weighting potential per contact. Events are then
//! independent and run in parallel against the shared immutable fields.

use crate::cache::{FieldCache, MemoryFieldCache};
use crate::charge::ChargeGenerator;
use crate::clustering::cluster_event;
use crate::drift_field::DriftFields;
use crate::drift_model::ChargeDriftModel;
use crate::efield::{electric_field, InterpolatedScalar};
use crate::geometry::DetectorGeometry;
use crate::potential::PotentialSolver;
use crate::signal::{ChargedPath, SignalSynthesizer};
use crate::symmetry::{AzimuthalExtension, SymmetryExtension};
use crate::trajectory::Drifter;
use log::info;
use rayon::prelude::*;
use ssd_types::config::SimulationConfig;
use ssd_types::error::{DetectorError, SimResult};
use ssd_types::event::{DepositionEvent, EventWaveforms};
use ssd_types::field::{AzimuthalSymmetry, ScalarField, VectorField};
use ssd_types::state::{Grid, PointType, PointTypes, SolveReport};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Solved detector ready to process events.
pub struct Simulation {
    geometry: Arc<dyn DetectorGeometry>,
    config: SimulationConfig,
    potential: Arc<ScalarField>,
    point_types: Arc<PointTypes>,
    report: SolveReport,
    efield: Arc<VectorField>,
    drift_fields: DriftFields,
    weighting: BTreeMap<usize, Arc<ScalarField>>,
    drifter: Drifter,
    charge: ChargeGenerator,
    synthesizer: SignalSynthesizer,
}

impl Simulation {
    /// Set up with a private in-memory field cache.
    pub fn new(
        geometry: Arc<dyn DetectorGeometry>,
        grid: Arc<Grid>,
        model: &dyn ChargeDriftModel,
        config: SimulationConfig,
    ) -> SimResult<Self> {
        let cache = MemoryFieldCache::new();
        Self::with_cache(geometry, grid, model, config, &cache, "detector")
    }

    /// Set up, taking weighting potentials from `cache` under keys
    /// `"{cache_prefix}/weighting/{contact}"`.
    pub fn with_cache(
        geometry: Arc<dyn DetectorGeometry>,
        grid: Arc<Grid>,
        model: &dyn ChargeDriftModel,
        config: SimulationConfig,
        cache: &dyn FieldCache,
        cache_prefix: &str,
    ) -> SimResult<Self> {
        config.validate()?;
        let solver = PotentialSolver::new(Arc::clone(&grid), config.solver.clone())?;

        let solution = solver.electric_potential(geometry.as_ref())?;
        let report = solution.report.clone();
        let mut potential = solution.potential;
        if grid.is_cylindrical() && grid.ndim() == 2 {
            potential = potential.with_symmetry(AzimuthalSymmetry {
                slices: config.symmetry.azimuthal_slices,
            });
        }
        let potential = Arc::new(potential);
        let point_types = Arc::new(solution.point_types);

        let efield = Arc::new(electric_field(&potential)?);
        let drift_fields = DriftFields::build(&efield, model)?;

        let mut weighting = BTreeMap::new();
        for contact in geometry.contacts() {
            let key = format!("{cache_prefix}/weighting/{}", contact.id);
            let field = cache.get_or_compute(&key, &mut || {
                Ok(solver.weighting_potential(geometry.as_ref(), contact.id)?.potential)
            })?;
            weighting.insert(contact.id, field);
        }

        let drifter = Drifter::new(
            Arc::clone(&geometry),
            Arc::clone(&point_types),
            &drift_fields,
            config.drift.clone(),
        )?;
        let charge = ChargeGenerator::new(geometry.material(), &config.signal)?;
        let synthesizer = SignalSynthesizer::new(&weighting, config.signal.clone())?;

        info!(
            "detector ready: {} nodes, {} contacts, active volume {:.3e} m³, fully depleted: {}",
            grid.len(),
            weighting.len(),
            point_types.active_volume(&grid),
            point_types.is_fully_depleted()
        );

        Ok(Simulation {
            geometry,
            config,
            potential,
            point_types,
            report,
            efield,
            drift_fields,
            weighting,
            drifter,
            charge,
            synthesizer,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn potential(&self) -> &Arc<ScalarField> {
        &self.potential
    }

    /// Electric potential (V) at a Cartesian point.
    pub fn potential_at(&self, p: [f64; 3]) -> SimResult<f64> {
        InterpolatedScalar::new(Arc::clone(&self.potential)).at(p)
    }

    pub fn point_types(&self) -> &Arc<PointTypes> {
        &self.point_types
    }

    pub fn solve_report(&self) -> &SolveReport {
        &self.report
    }

    pub fn electric_field(&self) -> &Arc<VectorField> {
        &self.efield
    }

    pub fn drift_fields(&self) -> &DriftFields {
        &self.drift_fields
    }

    pub fn weighting_potentials(&self) -> &BTreeMap<usize, Arc<ScalarField>> {
        &self.weighting
    }

    pub fn drifter(&self) -> &Drifter {
        &self.drifter
    }

    /// Depleted volume (m³).
    pub fn active_volume(&self) -> f64 {
        self.point_types.active_volume(self.potential.grid())
    }

    pub fn is_fully_depleted(&self) -> bool {
        self.point_types.is_fully_depleted()
    }

    /// Full-circle view of a 2-D cylindrical potential; `None` on 3-D grids.
    pub fn potential_3d(&self) -> SimResult<Option<ScalarField>> {
        let grid = self.potential.grid();
        if !(grid.is_cylindrical() && grid.ndim() == 2) {
            return Ok(None);
        }
        let ext = AzimuthalExtension::from_field(
            Arc::clone(&self.potential),
            self.config.symmetry.azimuthal_slices,
        )?;
        ext.materialize().map(Some)
    }

    /// Inside the semiconductor with a depleted or contact node nearest.
    pub fn in_active_volume(&self, p: [f64; 3]) -> bool {
        if !self.geometry.contains(p) {
            return false;
        }
        self.potential
            .grid()
            .nearest_node(p)
            .map(|n| matches!(self.point_types.get(n), PointType::Free | PointType::Fixed))
            .unwrap_or(false)
    }

    fn check_active(&self, event: &DepositionEvent) -> SimResult<()> {
        match event
            .deposits
            .iter()
            .position(|d| !self.in_active_volume(d.position))
        {
            Some(index) => Err(DetectorError::DepositOutsideActiveVolume {
                event_id: event.event_id,
                index,
            }),
            None => Ok(()),
        }
    }

    /// Waveforms of one event, `None` if the incomplete-path policy
    /// discarded it.
    ///
    /// Input deposits are checked first. A merged deposit whose centroid
    /// falls outside is reported with its index in the clustered list.
    pub fn simulate_event(&self, event: &DepositionEvent) -> SimResult<Option<EventWaveforms>> {
        self.check_active(event)?;
        let clustered = cluster_event(event, self.config.clustering.radius)?;
        self.check_active(&clustered)?;
        let carriers = self.charge.carriers_for_event(&clustered)?;
        let pairs: Vec<[ChargedPath; 2]> = clustered
            .deposits
            .par_iter()
            .zip(carriers.par_iter())
            .map(|(d, &n)| -> SimResult<[ChargedPath; 2]> {
                let (electron, hole) = self.drifter.drift_pair(d.position)?;
                Ok([
                    ChargedPath {
                        path: electron,
                        carriers: n,
                    },
                    ChargedPath {
                        path: hole,
                        carriers: n,
                    },
                ])
            })
            .collect::<SimResult<_>>()?;
        let paths: Vec<ChargedPath> = pairs.into_iter().flatten().collect();
        self.synthesizer
            .synthesize(event.event_id, event.detector_id, &paths)
    }

    /// Run all events in parallel; results keep the input order.
    pub fn simulate_events(
        &self,
        events: &[DepositionEvent],
    ) -> SimResult<Vec<Option<EventWaveforms>>> {
        events.par_iter().map(|ev| self.simulate_event(ev)).collect()
    }
}
