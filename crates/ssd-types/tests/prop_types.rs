// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Property-Based Tests (proptest) for ssd-types
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for ssd-types using proptest.
//!
//! Covers: Axis construction and lookup, Grid indexing and cell volumes,
//! point-type volume accounting.

use ssd_types::state::{Axis, Grid, PointType, PointTypes};
use proptest::prelude::*;

fn increasing(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.01f64..1.0, min_len..max_len).prop_map(|steps| {
        let mut acc = 0.0;
        let mut out = vec![0.0];
        for s in steps {
            acc += s;
            out.push(acc);
        }
        out
    })
}

// ── Axis Invariants ──────────────────────────────────────────────────

proptest! {
    /// Every node is located at itself (t = 0 or t = 1 on the neighbouring cell).
    #[test]
    fn axis_locates_own_nodes(values in increasing(1, 30)) {
        let axis = Axis::new(values.clone()).unwrap();
        for (i, &x) in values.iter().enumerate() {
            let c = axis.locate(x).unwrap();
            let back = axis.values()[c.lower]
                + c.t * (axis.values()[c.upper] - axis.values()[c.lower]);
            prop_assert!((back - x).abs() < 1e-12, "node {} located at {}", i, back);
            prop_assert_eq!(axis.nearest(x), Some(i));
        }
    }

    /// Points outside a non-periodic axis are rejected.
    #[test]
    fn axis_rejects_outside(values in increasing(1, 30), off in 1e-6f64..10.0) {
        let axis = Axis::new(values).unwrap();
        prop_assert!(axis.locate(axis.min() - off).is_none());
        prop_assert!(axis.locate(axis.max() + off).is_none());
    }

    /// Dual widths of an open axis add up to its span.
    #[test]
    fn axis_dual_widths_cover_span(values in increasing(1, 30)) {
        let axis = Axis::new(values).unwrap();
        let total: f64 = (0..axis.len()).map(|i| axis.dual_width(i)).sum();
        prop_assert!((total - (axis.max() - axis.min())).abs() < 1e-10);
    }
}

// ── Grid Invariants ──────────────────────────────────────────────────

proptest! {
    /// Flat and multi indices are inverse to each other.
    #[test]
    fn grid_index_roundtrip(nx in 2usize..8, ny in 2usize..8, nz in 2usize..8) {
        let grid = Grid::cartesian(
            Axis::uniform(0.0, 1.0, nx).unwrap(),
            Axis::uniform(0.0, 1.0, ny).unwrap(),
            Axis::uniform(0.0, 1.0, nz).unwrap(),
        ).unwrap();
        for flat in 0..grid.len() {
            prop_assert_eq!(grid.index_of(&grid.multi_index(flat)), flat);
        }
    }

    /// Cartesian cell volumes add up to the box volume.
    #[test]
    fn grid_cell_volumes_cover_box(
        xs in increasing(1, 8),
        ys in increasing(1, 8),
        zs in increasing(1, 8),
    ) {
        let grid = Grid::cartesian(
            Axis::new(xs).unwrap(),
            Axis::new(ys).unwrap(),
            Axis::new(zs).unwrap(),
        ).unwrap();
        let expected: f64 = grid.axes().iter().map(|a| a.max() - a.min()).product();
        let total: f64 = (0..grid.len()).map(|i| grid.cell_volume(i)).sum();
        prop_assert!((total - expected).abs() < 1e-10 * expected.max(1.0));
    }

    /// Depleted and undepleted volumes partition the bulk volume.
    #[test]
    fn point_type_volumes_partition(n in 3usize..10, split in 0usize..10) {
        let grid = Grid::cartesian(
            Axis::uniform(0.0, 1.0, n).unwrap(),
            Axis::uniform(0.0, 1.0, 3).unwrap(),
            Axis::uniform(0.0, 1.0, 3).unwrap(),
        ).unwrap();
        let mut pt = PointTypes::from_elem(&grid, PointType::Free);
        for flat in 0..grid.len() {
            if grid.multi_index(flat)[0] < split.min(n) {
                pt.set(flat, PointType::Undepleted);
            }
        }
        let total = pt.active_volume(&grid) + pt.undepleted_volume(&grid);
        prop_assert!((total - 1.0).abs() < 1e-12);
        prop_assert_eq!(pt.is_fully_depleted(), split == 0);
    }
}
