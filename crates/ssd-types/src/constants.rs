// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Vacuum permittivity (F/m).
pub const EPSILON0: f64 = 8.8541878128e-12;

/// Elementary charge (C)
pub const ELEMENTARY_CHARGE: f64 = 1.602176634e-19;

/// Relative permittivity of high-purity germanium.
pub const GE_RELATIVE_PERMITTIVITY: f64 = 16.0;

/// Mean energy per electron-hole pair in germanium at 77 K (eV).
pub const GE_IONIZATION_ENERGY_EV: f64 = 2.96;

/// Fano factor of germanium.
pub const GE_FANO_FACTOR: f64 = 0.11;

/// Relative permittivity of silicon.
pub const SI_RELATIVE_PERMITTIVITY: f64 = 11.7;

/// Mean energy per electron-hole pair in silicon at 300 K (eV).
pub const SI_IONIZATION_ENERGY_EV: f64 = 3.62;

/// Fano factor of silicon.
pub const SI_FANO_FACTOR: f64 = 0.115;
