//! Space-efficient dense weight storage.
//!
//! [`CompactModel`] is an array-backed map from feature index to model
//! weight, with every weight held as a 16-bit half-precision code. For
//! models with millions of features this halves resident memory versus
//! `f32` storage, at a precision cost online gradient updates absorb.
//!
//! # Key Insight: Deviation Is the Write Flag
//!
//! There is no per-slot "written" bit. A slot counts as touched when its
//! decoded state deviates from the defaults (weight 0, covariance 1), so
//! an entry explicitly written back to the defaults is indistinguishable
//! from one never written. That keeps the store at exactly two bytes per
//! weight.

use tracing::debug;

use crate::error::Result;
use crate::half;
use crate::model::{bits_required, grown_capacity, PredictionModel};
use crate::weight::{WeightEntry, DEFAULT_COVARIANCE};

/// Dense model storage in half precision.
///
/// Covariance tracking is a construction-time mode: [`CompactModel::new`]
/// stores weights only, [`CompactModel::with_covariance`] keeps a
/// parallel covariance array defaulting to 1.0. The backing arrays grow
/// lazily as unseen indices arrive.
#[derive(Clone, Debug)]
pub struct CompactModel {
    /// Half-float codes, one per feature index.
    weights: Vec<u16>,
    /// Parallel covariance codes; `None` when tracking is disabled.
    covariances: Option<Vec<u16>>,
}

impl CompactModel {
    /// Create a store covering `ndims` feature dimensions, weights only.
    pub fn new(ndims: usize) -> Self {
        Self {
            weights: vec![half::ZERO; ndims + 1],
            covariances: None,
        }
    }

    /// Create a store covering `ndims` feature dimensions with per-weight
    /// covariance tracking.
    pub fn with_covariance(ndims: usize) -> Self {
        Self {
            weights: vec![half::ZERO; ndims + 1],
            covariances: Some(vec![half::ONE; ndims + 1]),
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

    /// Grow the backing arrays to cover `index`.
    ///
    /// New weight slots are zero-filled; new covariance slots are filled
    /// with the code for 1.0. Existing codes are preserved.
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
        self.weights.resize(new_size, half::ZERO);
        if let Some(covariances) = &mut self.covariances {
            covariances.resize(new_size, half::ONE);
        }
    }

    /// Decoded entry for an in-range `index`, touched flag computed from
    /// deviation.
    fn entry_at(&self, index: usize) -> WeightEntry {
        let weight = half::decode(self.weights[index]);
        match &self.covariances {
            Some(covariances) => {
                let covariance = half::decode(covariances[index]);
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

    /// Default entry for an index beyond capacity.
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

impl PredictionModel for CompactModel {
    fn capacity(&self) -> usize {
        self.weights.len()
    }

    fn weight(&self, index: usize) -> f32 {
        if index >= self.weights.len() {
            return 0.0;
        }
        half::decode(self.weights[index])
    }

    fn covariance(&self, index: usize) -> f32 {
        match &self.covariances {
            Some(covariances) if index < covariances.len() => half::decode(covariances[index]),
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
        self.weights[index] = half::encode(entry.weight())?;
        if let (Some(covariances), Some(covariance)) = (&mut self.covariances, entry.covariance())
        {
            covariances[index] = half::encode(covariance)?;
        }
        Ok(())
    }

    fn set_weight(&mut self, index: usize, weight: f32) -> Result<()> {
        self.ensure_capacity(index);
        self.weights[index] = half::encode(weight)?;
        Ok(())
    }

    fn set_weight_and_covariance(
        &mut self,
        index: usize,
        weight: f32,
        covariance: f32,
    ) -> Result<()> {
        self.ensure_capacity(index);
        self.weights[index] = half::encode(weight)?;
        if let Some(covariances) = &mut self.covariances {
            covariances[index] = half::encode(covariance)?;
        }
        Ok(())
    }

    fn contains(&self, index: usize) -> bool {
        index < self.weights.len() && half::decode(self.weights[index]) != 0.0
    }
}

/// Lazy forward iterator over every allocated slot of a [`CompactModel`].
///
/// Yields `(index, WeightEntry)` for `0..capacity` in ascending order.
/// Single-pass and forward-only; the shared borrow of the model rules out
/// growth while an iteration is in flight.
pub struct Entries<'a> {
    model: &'a CompactModel,
    cursor: usize,
}

impl Entries<'_> {
    /// Non-allocating form of [`Iterator::next`]: decode the next slot
    /// into `probe` and return its index.
    ///
    /// Per-weight update loops over millions of slots thread one reusable
    /// buffer through the scan instead of materializing an entry per
    /// slot.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense::DenseModel;
    use crate::error::ModelError;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_fresh_store_reports_defaults() {
        let model = CompactModel::with_covariance(10);
        assert_eq!(model.capacity(), 11);

        // In allocated range, beyond the requested dimensionality, and
        // beyond capacity
        for index in [0, 5, 10, 100, 1 << 20] {
            assert_eq!(model.weight(index), 0.0);
            assert_eq!(model.covariance(index), 1.0);
            assert!(!model.contains(index));
            assert!(!model.get(index).touched());
        }
    }

    #[test]
    fn test_set_get_round_trip() {
        let mut model = CompactModel::new(16);
        model.set_weight(3, 3.5).unwrap();
        assert_eq!(model.weight(3), 3.5);

        model.set_weight(4, 0.1).unwrap();
        assert!((model.weight(4) - 0.1).abs() < 1e-4);
        assert!(model.contains(4));
    }

    #[test]
    fn test_growth_preserves_stored_values() {
        let mut model = CompactModel::new(1);
        let indices = [1usize, 10, 100, 1_000, 10_000, 100_000];

        for (step, &index) in indices.iter().enumerate() {
            model.set_weight(index, index as f32 / 1_000.0).unwrap();
            for &earlier in &indices[..=step] {
                let expected = earlier as f32 / 1_000.0;
                let got = model.weight(earlier);
                assert!(
                    (got - expected).abs() <= expected * 1e-3,
                    "index {} lost its value after growth: {} vs {}",
                    earlier,
                    got,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_capacity_never_decreases() {
        let mut model = CompactModel::with_covariance(4);
        let mut last = model.capacity();

        for index in [2usize, 40, 3, 400, 5, 4_000] {
            model.set_weight(index, 1.0).unwrap();
            model.get(index);
            model.contains(index);
            assert!(model.capacity() >= last);
            last = model.capacity();
        }
    }

    #[test]
    fn test_contains_checks_weight_only() {
        let mut model = CompactModel::with_covariance(8);
        model.set_weight_and_covariance(4, 0.0, 0.5).unwrap();

        // The moved covariance makes the slot touched, but existence is a
        // weight-only check
        assert!(!model.contains(4));
        let (_, entry) = model.entries().nth(4).unwrap();
        assert!(entry.touched());
    }

    #[test]
    fn test_explicit_default_write_is_invisible() {
        let mut model = CompactModel::with_covariance(8);
        model.set_weight_and_covariance(5, 0.0, 1.0).unwrap();

        assert_eq!(model.get(5), model.get(6));
        let (_, entry) = model.entries().nth(5).unwrap();
        assert!(!entry.touched());
    }

    #[test]
    fn test_overflow_leaves_prior_value() {
        let mut model = CompactModel::new(8);
        model.set_weight(2, 1.5).unwrap();

        let err = model.set_weight(2, 70_000.0).unwrap_err();
        assert!(matches!(err, ModelError::MagnitudeOverflow { .. }));
        assert_eq!(model.weight(2), 1.5);
    }

    #[test]
    fn test_covariance_overflow_keeps_new_weight() {
        let mut model = CompactModel::with_covariance(8);
        model.set_weight_and_covariance(3, 1.0, 0.5).unwrap();

        // Weight is stored first; the failing covariance aborts before
        // touching its slot
        assert!(model.set_weight_and_covariance(3, 2.0, 70_000.0).is_err());
        assert_eq!(model.weight(3), 2.0);
        assert_eq!(model.covariance(3), 0.5);
    }

    #[test]
    fn test_entry_without_covariance_preserves_slot() {
        let mut model = CompactModel::with_covariance(8);
        model.set_weight_and_covariance(7, 1.0, 0.5).unwrap();

        model.set(7, &WeightEntry::new(2.0)).unwrap();
        assert_eq!(model.weight(7), 2.0);
        assert_eq!(model.covariance(7), 0.5);
    }

    #[test]
    fn test_entry_covariance_ignored_when_untracked() {
        let mut model = CompactModel::new(8);
        model.set(3, &WeightEntry::with_covariance(1.0, 0.25)).unwrap();

        assert_eq!(model.weight(3), 1.0);
        assert_eq!(model.covariance(3), 1.0);
        assert!(!model.tracks_covariance());
    }

    #[test]
    fn test_entries_cover_every_slot_in_order() {
        let model = CompactModel::new(100);
        let indices: Vec<usize> = model.entries().map(|(index, _)| index).collect();
        let expected: Vec<usize> = (0..model.capacity()).collect();
        assert_eq!(indices, expected);
        assert_eq!(model.entries().len(), model.capacity());
    }

    #[test]
    fn test_probe_matches_allocating_iteration() {
        let mut model = CompactModel::with_covariance(32);
        model.set_weight_and_covariance(10, 2.0, 0.5).unwrap();
        model.set_weight(20, -1.25).unwrap();

        let collected: Vec<(usize, WeightEntry)> = model.entries().collect();

        let mut probe = WeightEntry::default();
        let mut probed = Vec::new();
        let mut entries = model.entries();
        while let Some(index) = entries.next_into(&mut probe) {
            probed.push((index, probe));
        }

        assert_eq!(probed, collected);
    }

    #[test]
    fn test_matches_full_precision_model() {
        let ndims = 1 << 12;
        let mut compact = CompactModel::new(ndims);
        let mut dense = DenseModel::new(ndims);

        let mut rng = ChaCha8Rng::seed_from_u64(31337);
        for _ in 0..1_000 {
            let index = rng.gen_range(0..ndims);
            let weight = half::MAX_FLOAT * rng.gen::<f32>();
            compact.set_weight(index, weight).unwrap();
            dense.set_weight(index, weight).unwrap();
        }

        assert_eq!(dense.capacity(), compact.capacity());

        // Half-float spacing at the top of the range is 32
        for (index, entry) in compact.entries() {
            let expected = dense.weight(index);
            assert!(
                (entry.weight() - expected).abs() <= 32.0,
                "index {} diverged: {} vs {}",
                index,
                entry.weight(),
                expected
            );
        }
    }
}
