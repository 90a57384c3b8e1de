//! Full-precision dense weight storage.
//!
//! [`DenseModel`] is the `f32` twin of [`CompactModel`](crate::compact::CompactModel):
//! same contract, same growth curve, twice the memory and no quantization.
//! Use it when the feature space fits comfortably in RAM, or as the
//! full-precision oracle when validating the compact store.

use tracing::debug;

use crate::error::Result;
use crate::model::{bits_required, grown_capacity, PredictionModel};
use crate::weight::{WeightEntry, DEFAULT_COVARIANCE};

/// Dense model storage in full `f32` precision.
///
/// Every finite weight is representable, so writes never fail; the
/// `Result` returns exist to satisfy the shared [`PredictionModel`]
/// contract.
#[derive(Clone, Debug)]
pub struct DenseModel {
    weights: Vec<f32>,
    /// Parallel covariances; `None` when tracking is disabled.
    covariances: Option<Vec<f32>>,
}

impl DenseModel {
    /// Create a store covering `ndims` feature dimensions, weights only.
    pub fn new(ndims: usize) -> Self {
        Self {
            weights: vec![0.0; ndims + 1],
            covariances: None,
        }
    }

    /// Create a store covering `ndims` feature dimensions with per-weight
    /// covariance tracking.
    pub fn with_covariance(ndims: usize) -> Self {
        Self {
            weights: vec![0.0; ndims + 1],
            covariances: Some(vec![DEFAULT_COVARIANCE; ndims + 1]),
        }
    }

    /// Whether this store keeps a covariance per weight.
    pub fn tracks_covariance(&self) -> bool {
        self.covariances.is_some()
    }

    /// Iterate all slots `0..capacity` in ascending index order.
    pub fn entries(&self) -> Entries<'_> {
        Entries {
            model: self,
            cursor: 0,
        }
    }

    fn ensure_capacity(&mut self, index: usize) {
        if index < self.weights.len() {
            return;
        }
        let old_size = self.weights.len();
        let new_size = grown_capacity(index);
        debug!(
            "expanding weight array from {} to {} ({} bits)",
            old_size,
            new_size,
            bits_required(index)
        );
        self.weights.resize(new_size, 0.0);
        if let Some(covariances) = &mut self.covariances {
            covariances.resize(new_size, DEFAULT_COVARIANCE);
        }
    }

    fn entry_at(&self, index: usize) -> WeightEntry {
        let weight = self.weights[index];
        match &self.covariances {
            Some(covariances) => {
                let covariance = covariances[index];
                let mut entry = WeightEntry::with_covariance(weight, covariance);
                entry.set_touched(weight != 0.0 || covariance != DEFAULT_COVARIANCE);
                entry
            }
            None => {
                let mut entry = WeightEntry::new(weight);
                entry.set_touched(weight != 0.0);
                entry
            }
        }
    }

    fn default_entry(&self) -> WeightEntry {
        match self.covariances {
            Some(_) => {
                let mut entry = WeightEntry::with_covariance(0.0, DEFAULT_COVARIANCE);
                entry.set_touched(false);
                entry
            }
            None => WeightEntry::default(),
        }
    }
}

impl PredictionModel for DenseModel {
    fn capacity(&self) -> usize {
        self.weights.len()
    }

    fn weight(&self, index: usize) -> f32 {
        if index >= self.weights.len() {
            return 0.0;
        }
        self.weights[index]
    }

    fn covariance(&self, index: usize) -> f32 {
        match &self.covariances {
            Some(covariances) if index < covariances.len() => covariances[index],
            _ => DEFAULT_COVARIANCE,
        }
    }

    fn get(&self, index: usize) -> WeightEntry {
        if index >= self.weights.len() {
            return self.default_entry();
        }
        self.entry_at(index)
    }

    fn set(&mut self, index: usize, entry: &WeightEntry) -> Result<()> {
        self.ensure_capacity(index);
        self.weights[index] = entry.weight();
        if let (Some(covariances), Some(covariance)) = (&mut self.covariances, entry.covariance())
        {
            covariances[index] = covariance;
        }
        Ok(())
    }

    fn set_weight(&mut self, index: usize, weight: f32) -> Result<()> {
        self.ensure_capacity(index);
        self.weights[index] = weight;
        Ok(())
    }

    fn set_weight_and_covariance(
        &mut self,
        index: usize,
        weight: f32,
        covariance: f32,
    ) -> Result<()> {
        self.ensure_capacity(index);
        self.weights[index] = weight;
        if let Some(covariances) = &mut self.covariances {
            covariances[index] = covariance;
        }
        Ok(())
    }

    fn contains(&self, index: usize) -> bool {
        index < self.weights.len() && self.weights[index] != 0.0
    }
}

/// Lazy forward iterator over every allocated slot of a [`DenseModel`].
pub struct Entries<'a> {
    model: &'a DenseModel,
    cursor: usize,
}

impl Entries<'_> {
    /// Non-allocating form of [`Iterator::next`]: copy the next slot into
    /// `probe` and return its index.
    pub fn next_into(&mut self, probe: &mut WeightEntry) -> Option<usize> {
        if self.cursor >= self.model.capacity() {
            return None;
        }
        let index = self.cursor;
        self.cursor += 1;
        probe.copy_from(&self.model.entry_at(index));
        Some(index)
    }
}

impl Iterator for Entries<'_> {
    type Item = (usize, WeightEntry);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.model.capacity() {
            return None;
        }
        let index = self.cursor;
        self.cursor += 1;
        Some((index, self.model.entry_at(index)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.model.capacity().saturating_sub(self.cursor);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Entries<'_> {}
