//! Capturing and restoring the in-flight routed water
//!
//! A snapshot is the ring of every outlet, in registry order, after the last
//! processed timestep. Restoring it into a registry built from the same unit
//! hydrographs continues the run exactly where it stopped.

use crate::registry::{OutletKey, UnitHydrographRegistry};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uhroute_core::{Error, Result};

/// One outlet's saved state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub y: usize,
    pub x: usize,
    /// Pending amounts in lag order, slot 0 due at the next timestep
    pub ring: Vec<f64>,
    /// Last processed input time plus this outlet's first lag offset
    pub timestamp: f64,
}

impl SnapshotEntry {
    pub fn key(&self) -> OutletKey {
        OutletKey::new(self.y, self.x)
    }
}

/// Serialized form: entries as an ordered list
#[derive(Serialize, Deserialize)]
struct SnapshotDoc {
    time: f64,
    outlets: Vec<SnapshotEntry>,
}

/// Full set of per-outlet rings at a timestep boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SnapshotDoc", into = "SnapshotDoc")]
pub struct Snapshot {
    time: f64,
    entries: IndexMap<OutletKey, SnapshotEntry>,
}

impl From<SnapshotDoc> for Snapshot {
    fn from(doc: SnapshotDoc) -> Self {
        Snapshot::from_entries(doc.time, doc.outlets)
    }
}

impl From<Snapshot> for SnapshotDoc {
    fn from(snapshot: Snapshot) -> Self {
        SnapshotDoc {
            time: snapshot.time,
            outlets: snapshot.entries.into_values().collect(),
        }
    }
}

impl Snapshot {
    /// Build from entries; a later entry for the same outlet replaces an earlier one.
    pub fn from_entries(time: f64, entries: impl IntoIterator<Item = SnapshotEntry>) -> Self {
        Self {
            time,
            entries: entries.into_iter().map(|e| (e.key(), e)).collect(),
        }
    }

    /// Capture the current ring of every outlet.
    ///
    /// `last_time` is the time of the last processed input.
    pub fn capture(registry: &UnitHydrographRegistry, last_time: f64) -> Self {
        let entries = registry.iter().map(|outlet| SnapshotEntry {
            y: outlet.key().y,
            x: outlet.key().x,
            ring: outlet.ring().to_vec(),
            timestamp: last_time + outlet.base_offset(),
        });
        Self::from_entries(last_time, entries)
    }

    /// Time of the last input processed before capture
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &OutletKey) -> Option<&SnapshotEntry> {
        self.entries.get(key)
    }

    /// Entries in capture order
    pub fn entries(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries.values()
    }

    /// Overwrite every outlet's ring from this snapshot.
    ///
    /// Every outlet must have an entry of matching length; entries for
    /// unknown outlets are ignored. Nothing is written unless all outlets
    /// validate.
    pub fn restore_into(&self, registry: &mut UnitHydrographRegistry) -> Result<()> {
        for outlet in registry.iter() {
            let key = outlet.key();
            let entry = self
                .entries
                .get(&key)
                .ok_or(Error::MissingState { y: key.y, x: key.x })?;
            if entry.ring.len() != outlet.lags() {
                return Err(Error::ShapeMismatch {
                    what: format!("restart ring of outlet {}", key),
                    expected: vec![outlet.lags()],
                    actual: vec![entry.ring.len()],
                });
            }
            if entry.ring.iter().any(|v| !v.is_finite()) {
                return Err(Error::InvalidInput(format!(
                    "restart ring of outlet {} contains non-finite values",
                    key
                )));
            }
        }

        let keys: Vec<OutletKey> = registry.keys().collect();
        for key in &keys {
            if let (Some(outlet), Some(entry)) = (registry.get_mut(key), self.entries.get(key)) {
                outlet.ring_mut().load(&entry.ring);
            }
        }

        let ignored = self.entries.len().saturating_sub(keys.len());
        if ignored > 0 {
            tracing::debug!("ignored {} snapshot entries without a matching outlet", ignored);
        }
        Ok(())
    }
}
