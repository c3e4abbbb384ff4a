//! Growth and shrink policy shared by component and entity tables.
//!
//! Growth happens when a table is full; shrinking only when it is clearly
//! sparse. The gap between the two thresholds keeps a table whose length
//! hovers near a boundary from reallocating back and forth.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Smallest capacity any table or reverse index is ever reallocated to.
pub const MIN_CAPACITY: usize = 10;

/// Reallocation thresholds for one family of tables.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizePolicy {
    /// Floor for every capacity computed by this policy.
    pub min_capacity: usize,
    /// Capacity multiplier applied when a full table needs another row.
    pub growth_factor: f64,
    /// Shrink once `capacity > shrink_threshold * len`.
    pub shrink_threshold: f64,
    /// New capacity after a shrink, as a multiple of `len`.
    pub shrink_target: f64,
    /// Trim a reverse index once `index_len >= index_trim_threshold * (largest + 1)`.
    pub index_trim_threshold: f64,
}

impl Default for ResizePolicy {
    fn default() -> Self {
        Self::component()
    }
}

impl ResizePolicy {
    /// Policy used by component tables.
    #[must_use]
    pub const fn component() -> Self {
        Self {
            min_capacity: MIN_CAPACITY,
            growth_factor: 1.4,
            shrink_threshold: 1.7,
            shrink_target: 1.3,
            index_trim_threshold: 1.7,
        }
    }

    /// Policy used by per-kind entity tables and the global entity index.
    #[must_use]
    pub const fn entity() -> Self {
        Self {
            shrink_target: 1.2,
            ..Self::component()
        }
    }

    /// Check that the thresholds cannot make a table oscillate or shrink below
    /// its own length.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_capacity == 0 {
            return Err(ConfigError::ZeroMinCapacity);
        }
        if self.growth_factor.is_nan() || self.growth_factor <= 1.0 {
            return Err(ConfigError::GrowthFactor(self.growth_factor));
        }
        if self.shrink_target.is_nan() || self.shrink_target < 1.0 {
            return Err(ConfigError::ShrinkTarget(self.shrink_target));
        }
        if self.shrink_threshold.is_nan() || self.shrink_threshold <= self.shrink_target {
            return Err(ConfigError::ShrinkThreshold {
                threshold: self.shrink_threshold,
                target: self.shrink_target,
            });
        }
        if self.index_trim_threshold.is_nan() || self.index_trim_threshold <= 1.0 {
            return Err(ConfigError::IndexTrimThreshold(self.index_trim_threshold));
        }
        Ok(())
    }

    /// Capacity to grow a full table of `capacity` rows to.
    #[must_use]
    pub fn grown(&self, capacity: usize) -> usize {
        let scaled = (capacity as f64 * self.growth_factor) as usize;
        scaled.max(capacity + 1).max(self.min_capacity)
    }

    /// New capacity if a table holding `len` of `capacity` rows is sparse enough.
    #[must_use]
    pub fn shrunk(&self, capacity: usize, len: usize) -> Option<usize> {
        if capacity as f64 <= self.shrink_threshold * len as f64 {
            return None;
        }

        let target = ((len as f64 * self.shrink_target) as usize)
            .max(len)
            .max(self.min_capacity);
        (target < capacity).then_some(target)
    }

    /// New reverse-index length if an index of `index_len` slots is much
    /// larger than the `necessary` slots covering the largest live id.
    #[must_use]
    pub fn index_trim(&self, index_len: usize, necessary: usize) -> Option<usize> {
        let wanted = self.index_trim_threshold * necessary as f64;
        if (index_len as f64) < wanted || wanted < self.min_capacity as f64 {
            return None;
        }

        let target = necessary.max(self.min_capacity);
        (target < index_len).then_some(target)
    }
}

/// Policies for every table family in a [`World`](crate::World).
///
/// Deserializes from partial documents; missing fields keep their defaults.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Policy for component tables and their reverse indices.
    pub components: ResizePolicy,
    /// Policy for entity kind tables and the global entity index.
    pub entities: ResizePolicy,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            components: ResizePolicy::component(),
            entities: ResizePolicy::entity(),
        }
    }
}

impl WorldConfig {
    /// Validate both policies.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.components.validate()?;
        self.entities.validate()
    }
}
