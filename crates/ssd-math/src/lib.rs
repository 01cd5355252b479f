//! Numerical kernels for SSD Drift Core.

pub mod interp;
pub mod rk4;
pub mod sor;
