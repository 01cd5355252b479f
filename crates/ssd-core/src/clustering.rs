// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Hit Clustering
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Greedy merging of nearby energy deposits.
//!
//! Deposits are visited in input order. Each joins the first cluster whose
//! energy-weighted centroid is strictly closer than the radius, otherwise it
//! opens a new cluster.

use ssd_types::error::{DetectorError, SimResult};
use ssd_types::event::{Deposit, DepositionEvent};

#[derive(Debug, Clone)]
struct Cluster {
    first: Deposit,
    count: usize,
    energy: f64,
    weighted: [f64; 3],
    plain: [f64; 3],
}

impl Cluster {
    fn new(d: &Deposit) -> Self {
        let mut c = Cluster {
            first: *d,
            count: 0,
            energy: 0.0,
            weighted: [0.0; 3],
            plain: [0.0; 3],
        };
        c.add(d);
        c
    }

    fn add(&mut self, d: &Deposit) {
        self.count += 1;
        self.energy += d.energy;
        for i in 0..3 {
            self.weighted[i] += d.energy * d.position[i];
            self.plain[i] += d.position[i];
        }
    }

    fn centroid(&self) -> [f64; 3] {
        if self.count == 1 {
            return self.first.position;
        }
        if self.energy > 0.0 {
            self.weighted.map(|w| w / self.energy)
        } else {
            self.plain.map(|p| p / self.count as f64)
        }
    }

    fn into_deposit(self) -> Deposit {
        if self.count == 1 {
            return self.first;
        }
        Deposit {
            position: self.centroid(),
            energy: self.energy,
        }
    }
}

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

/// Merge deposits closer than `radius` (m). A radius of 0 returns the input.
pub fn cluster_deposits(deposits: &[Deposit], radius: f64) -> SimResult<Vec<Deposit>> {
    if !radius.is_finite() || radius < 0.0 {
        return Err(DetectorError::Config(format!(
            "clustering radius must be finite and >= 0, got {radius}"
        )));
    }
    if radius == 0.0 {
        return Ok(deposits.to_vec());
    }
    let mut clusters: Vec<Cluster> = Vec::new();
    for d in deposits {
        match clusters
            .iter_mut()
            .find(|c| distance(c.centroid(), d.position) < radius)
        {
            Some(c) => c.add(d),
            None => clusters.push(Cluster::new(d)),
        }
    }
    Ok(clusters.into_iter().map(Cluster::into_deposit).collect())
}

/// Cluster the deposits of one event; ids are kept.
pub fn cluster_event(event: &DepositionEvent, radius: f64) -> SimResult<DepositionEvent> {
    Ok(DepositionEvent {
        event_id: event.event_id,
        detector_id: event.detector_id,
        deposits: cluster_deposits(&event.deposits, radius)?,
    })
}
