// ─────────────────────────────────────────────────────────────────────
// SSD Drift Core — Field Cache
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Get-or-compute storage for solved fields.

use log::debug;
use ssd_types::error::SimResult;
use ssd_types::field::ScalarField;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Keyed store of solved scalar fields.
pub trait FieldCache: Send + Sync {
    /// Return the field stored under `key`, computing and storing it first
    /// if absent. A failed computation stores nothing.
    fn get_or_compute(
        &self,
        key: &str,
        compute: &mut dyn FnMut() -> SimResult<ScalarField>,
    ) -> SimResult<Arc<ScalarField>>;
}

/// In-process cache. Computation runs outside the lock, so two threads
/// asking for the same missing key may both compute it; the first insert wins.
#[derive(Debug, Default)]
pub struct MemoryFieldCache {
    fields: Mutex<HashMap<String, Arc<ScalarField>>>,
}

impl MemoryFieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &str) -> Option<Arc<ScalarField>> {
        let map = self.fields.lock().unwrap_or_else(|p| p.into_inner());
        map.get(key).cloned()
    }
}

impl FieldCache for MemoryFieldCache {
    fn get_or_compute(
        &self,
        key: &str,
        compute: &mut dyn FnMut() -> SimResult<ScalarField>,
    ) -> SimResult<Arc<ScalarField>> {
        if let Some(field) = self.lookup(key) {
            debug!("field cache hit: {key}");
            return Ok(field);
        }
        let field = Arc::new(compute()?);
        let mut map = self.fields.lock().unwrap_or_else(|p| p.into_inner());
        Ok(Arc::clone(
            map.entry(key.to_string()).or_insert(field),
        ))
    }
}
