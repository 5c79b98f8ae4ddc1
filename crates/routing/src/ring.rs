//! Circular convolution accumulator
//!
//! A `Ring` holds one outlet's routed water that has not yet been emitted,
//! indexed by remaining lag: logical slot 0 is due at the current timestep,
//! slot `l` is due `l` timesteps from now. Rotation is done with a head
//! offset into a fixed buffer, so emitting never moves data.

use serde::{Deserialize, Serialize};

/// Fixed-capacity convolution ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "Vec<f64>")]
pub struct Ring {
    buf: Vec<f64>,
    head: usize,
}

impl Ring {
    /// A cold-start ring of `len` zeros
    pub fn zeros(len: usize) -> Self {
        Self {
            buf: vec![0.0; len],
            head: 0,
        }
    }

    /// Build a ring whose logical slot `l` is `values[l]`
    pub fn from_vec(values: Vec<f64>) -> Self {
        Self {
            buf: values,
            head: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    fn slot(&self, lag: usize) -> usize {
        let i = self.head + lag;
        if i >= self.buf.len() {
            i - self.buf.len()
        } else {
            i
        }
    }

    /// Add `value` to the amount due in `lag` timesteps.
    ///
    /// # Panics
    /// If `lag >= self.len()`.
    #[inline]
    pub fn add(&mut self, lag: usize, value: f64) {
        assert!(lag < self.buf.len(), "lag {} outside ring of length {}", lag, self.buf.len());
        let i = self.slot(lag);
        self.buf[i] += value;
    }

    /// Read the amount due now, zero that slot and advance one timestep.
    ///
    /// After this call the zeroed slot is the furthest-future slot and every
    /// other pending amount is one lag closer.
    pub fn emit(&mut self) -> f64 {
        if self.buf.is_empty() {
            return 0.0;
        }
        let due = self.buf[self.head];
        self.buf[self.head] = 0.0;
        self.head = self.slot(1);
        due
    }

    /// Pending amounts in lag order
    pub fn to_vec(&self) -> Vec<f64> {
        let (older, newer) = self.buf.split_at(self.head);
        newer.iter().chain(older.iter()).copied().collect()
    }

    /// Overwrite the pending amounts; `values.len()` must equal `self.len()`
    pub fn load(&mut self, values: &[f64]) -> bool {
        if values.len() != self.buf.len() {
            return false;
        }
        self.buf.copy_from_slice(values);
        self.head = 0;
        true
    }

    /// Total water still in transit
    pub fn total(&self) -> f64 {
        self.buf.iter().sum()
    }

    pub fn is_drained(&self) -> bool {
        self.buf.iter().all(|&v| v == 0.0)
    }

    /// Whether every pending amount is a finite number
    pub fn is_finite(&self) -> bool {
        self.buf.iter().all(|v| v.is_finite())
    }
}

impl From<Vec<f64>> for Ring {
    fn from(values: Vec<f64>) -> Self {
        Ring::from_vec(values)
    }
}

impl From<Ring> for Vec<f64> {
    fn from(ring: Ring) -> Self {
        ring.to_vec()
    }
}
