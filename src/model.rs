//! The prediction-model contract and the shared capacity-growth policy.
//!
//! Learning algorithms only ever see [`PredictionModel`]: read-modify-write
//! cycles through `get`/`set`, shorthand accessors for hot paths, and the
//! capacity probe. Feature keys are mapped to integer indices upstream;
//! the contract is strictly typed end-to-end.
//!
//! Both store implementations grow along the same power-of-two curve, so
//! the policy lives here as free functions that can be exercised without
//! touching write semantics.

use crate::error::Result;
use crate::weight::WeightEntry;

/// Read/write contract for dense weight storage.
///
/// Reads are total: an index beyond the allocated capacity yields the
/// default state (weight 0, covariance 1) rather than an error. Writes
/// grow the store on demand and fail only when a magnitude cannot be
/// stored.
pub trait PredictionModel {
    /// Allocated capacity.
    ///
    /// An allocation probe, not a count of touched entries. Never
    /// decreases.
    fn capacity(&self) -> usize;

    /// Weight at `index`, `0.0` beyond capacity.
    fn weight(&self, index: usize) -> f32;

    /// Covariance at `index`; `1.0` beyond capacity or when the store
    /// does not track covariance.
    fn covariance(&self, index: usize) -> f32;

    /// Full entry at `index`; the default entry beyond capacity.
    fn get(&self, index: usize) -> WeightEntry;

    /// Store `entry`'s weight at `index`, growing if needed.
    ///
    /// The covariance slot is updated only when the store tracks
    /// covariance AND the entry carries one; an entry without covariance
    /// leaves the slot as it was.
    fn set(&mut self, index: usize, entry: &WeightEntry) -> Result<()>;

    /// Store a bare weight at `index`, growing if needed.
    fn set_weight(&mut self, index: usize, weight: f32) -> Result<()>;

    /// Store weight and covariance at `index`, growing if needed.
    ///
    /// The weight is stored first: when the covariance fails the overflow
    /// check, the new weight stays in place. On a store without
    /// covariance tracking the covariance is ignored.
    fn set_weight_and_covariance(
        &mut self,
        index: usize,
        weight: f32,
        covariance: f32,
    ) -> Result<()>;

    /// Whether `index` holds a non-zero weight.
    ///
    /// Checks the weight only, even on covariance-tracking stores. An
    /// entry whose covariance moved but whose weight is zero reports
    /// absent here while still iterating as touched.
    fn contains(&self, index: usize) -> bool;
}

/// Number of bits required to represent `x`.
pub(crate) fn bits_required(x: usize) -> u32 {
    usize::BITS - x.leading_zeros()
}

/// Capacity after growing to cover `index`: one past the next power of
/// two. Phase-aligned to the index bit length, the curve costs amortized
/// O(1) per write over a monotonically increasing index stream, like
/// classic doubling.
pub(crate) fn grown_capacity(index: usize) -> usize {
    (1usize << bits_required(index)) + 1
}
