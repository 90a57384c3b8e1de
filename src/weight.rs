//! Weight entry value type.
//!
//! A single tagged record carries a weight plus an optional covariance.
//! Learning algorithms read and write entries through a weight store;
//! stores that do not track covariance simply leave it `None`.

use std::fmt;

/// Default covariance for slots that were never written.
pub const DEFAULT_COVARIANCE: f32 = 1.0;

/// A model weight with an optional per-weight covariance.
///
/// Covariance is the confidence value maintained by confidence-weighted
/// online learners (CW, AROW and friends) alongside the weight itself.
/// The touched flag distinguishes entries that deviate from the store
/// defaults (weight 0, covariance 1) from never-written slots.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightEntry {
    weight: f32,
    covariance: Option<f32>,
    touched: bool,
}

impl WeightEntry {
    /// Create an entry carrying a bare weight.
    ///
    /// Entries materialized during training start out touched.
    pub fn new(weight: f32) -> Self {
        Self {
            weight,
            covariance: None,
            touched: true,
        }
    }

    /// Create an entry carrying both a weight and a covariance.
    pub fn with_covariance(weight: f32, covariance: f32) -> Self {
        Self {
            weight,
            covariance: Some(covariance),
            touched: true,
        }
    }

    /// The weight.
    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Replace the weight.
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight;
    }

    /// Whether this entry carries a covariance.
    pub fn has_covariance(&self) -> bool {
        self.covariance.is_some()
    }

    /// The covariance, if carried.
    pub fn covariance(&self) -> Option<f32> {
        self.covariance
    }

    /// The covariance, or [`DEFAULT_COVARIANCE`] when absent.
    pub fn covariance_or_default(&self) -> f32 {
        self.covariance.unwrap_or(DEFAULT_COVARIANCE)
    }

    /// Attach or replace the covariance.
    pub fn set_covariance(&mut self, covariance: f32) {
        self.covariance = Some(covariance);
    }

    /// Whether this entry deviates from the store defaults.
    pub fn touched(&self) -> bool {
        self.touched
    }

    /// Set the touched flag.
    pub fn set_touched(&mut self, touched: bool) {
        self.touched = touched;
    }

    /// Overwrite this entry from another.
    ///
    /// Reusable-buffer support for the non-allocating iteration probe.
    pub fn copy_from(&mut self, other: &WeightEntry) {
        *self = *other;
    }
}

impl Default for WeightEntry {
    /// The untouched state: weight 0, no covariance.
    fn default() -> Self {
        Self {
            weight: 0.0,
            covariance: None,
            touched: false,
        }
    }
}

impl fmt::Display for WeightEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.covariance {
            Some(covariance) => {
                write!(f, "weight={} covariance={}", self.weight, covariance)
            }
            None => write!(f, "weight={}", self.weight),
        }
    }
}
