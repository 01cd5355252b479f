// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Property-Based Tests (proptest) for ssd-math
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for ssd-math using proptest.
//!
//! Covers: SOR solver on non-uniform slabs, multilinear interpolation,
//! non-uniform finite differences.

use proptest::prelude::*;
use ssd_math::interp::{gradient, interpolate};
use ssd_math::sor::{sor_solve, RedBlack, Stencil};
use ssd_types::state::{Axis, Grid};

fn increasing(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.05f64..1.0, min_len..max_len).prop_map(|steps| {
        let mut acc = 0.0;
        let mut out = vec![0.0];
        for s in steps {
            acc += s;
            out.push(acc);
        }
        out
    })
}

// ── SOR Solver Properties ────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Between two fixed planes the Laplace solution is linear on any
    /// non-uniform spacing.
    #[test]
    fn sor_planar_solution_is_linear(
        zs in increasing(3, 16),
        v0 in -500.0f64..500.0,
        v1 in -500.0f64..500.0,
    ) {
        let nz = zs.len();
        let zmax = zs[nz - 1];
        let grid = Grid::cartesian(
            Axis::uniform(0.0, 1.0, 2).unwrap(),
            Axis::uniform(0.0, 1.0, 2).unwrap(),
            Axis::new(zs).unwrap(),
        ).unwrap();
        let stencil = Stencil::build(&grid, &vec![1.0; grid.len()]).unwrap();
        let is_fixed = |f: usize| {
            let iz = grid.multi_index(f)[2];
            iz == 0 || iz == nz - 1
        };
        let colours = RedBlack::partition(&grid, |f| !is_fixed(f));
        let mut v: Vec<f64> = (0..grid.len())
            .map(|f| if grid.multi_index(f)[2] == nz - 1 { v1 } else { v0 })
            .collect();
        let rho = vec![0.0; grid.len()];
        let (converged, _, _) = sor_solve(&mut v, &rho, &stencil, &colours, 1.2, 1e-12, 200_000);
        prop_assert!(converged);
        for f in 0..grid.len() {
            let z = grid.node_coords(f)[2];
            let exact = v0 + (v1 - v0) * z / zmax;
            prop_assert!((v[f] - exact).abs() < 1e-7, "V({}) = {}, exact {}", z, v[f], exact);
        }
    }
}

// ── Interpolation Properties ─────────────────────────────────────────

proptest! {
    /// Interpolated values stay inside the range of the node values.
    #[test]
    fn interpolate_bounded(
        xs in increasing(1, 6),
        seed in 0u64..1000,
        fx in 0.0f64..1.0,
        fy in 0.0f64..1.0,
        fz in 0.0f64..1.0,
    ) {
        let grid = Grid::cartesian(
            Axis::new(xs.clone()).unwrap(),
            Axis::new(xs.clone()).unwrap(),
            Axis::new(xs.clone()).unwrap(),
        ).unwrap();
        let values: Vec<f64> = (0..grid.len())
            .map(|i| ((i as u64 * 2654435761 + seed) % 1000) as f64 - 500.0)
            .collect();
        let span = xs[xs.len() - 1];
        let v = interpolate(&grid, &values, &[fx * span, fy * span, fz * span]).unwrap();
        let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(v >= lo - 1e-9 && v <= hi + 1e-9);
    }

    /// Gradient of a linear function is exact everywhere, edges included.
    #[test]
    fn gradient_linear_exact(
        xs in increasing(1, 6),
        a in -10.0f64..10.0,
        b in -10.0f64..10.0,
        c in -10.0f64..10.0,
    ) {
        let grid = Grid::cartesian(
            Axis::new(xs.clone()).unwrap(),
            Axis::new(xs.clone()).unwrap(),
            Axis::new(xs).unwrap(),
        ).unwrap();
        let values: Vec<f64> = (0..grid.len())
            .map(|i| {
                let p = grid.node_coords(i);
                a * p[0] + b * p[1] + c * p[2]
            })
            .collect();
        for g in gradient(&grid, &values) {
            prop_assert!((g[0] - a).abs() < 1e-8);
            prop_assert!((g[1] - b).abs() < 1e-8);
            prop_assert!((g[2] - c).abs() < 1e-8);
        }
    }
}
