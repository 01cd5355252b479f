// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Core
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
pub mod cache;
pub mod charge;
pub mod clustering;
pub mod drift_field;
pub mod drift_model;
pub mod efield;
pub mod geometry;
pub mod potential;
pub mod signal;
pub mod simulation;
pub mod symmetry;
pub mod trajectory;
