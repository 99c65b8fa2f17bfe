//! Fruit tier table
//!
//! Each tier has a radius and a score value. Radii strictly increase with the
//! tier index and the last tier cannot merge further.

use serde::{Deserialize, Serialize};

use crate::game::constants::tiers::TABLE;

/// Index into the tier table (0 = smallest fruit)
pub type TierIndex = u8;

/// One entry in the tier table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub radius: f32,
    pub score_value: u32,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TierTableError {
    #[error("Tier table is empty")]
    Empty,
    #[error("Tier table has {0} tiers (max 256)")]
    TooLarge(usize),
    #[error("Tier {0} radius must be positive and finite")]
    InvalidRadius(usize),
    #[error("Tier {0} radius does not exceed the previous tier")]
    NotIncreasing(usize),
}

/// Ordered, immutable tier definitions
#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    tiers: Vec<Tier>,
}

impl TierTable {
    /// Build a table, checking that radii are positive and strictly increasing
    pub fn new(tiers: Vec<Tier>) -> Result<Self, TierTableError> {
        if tiers.is_empty() {
            return Err(TierTableError::Empty);
        }
        if tiers.len() > TierIndex::MAX as usize + 1 {
            return Err(TierTableError::TooLarge(tiers.len()));
        }
        for (i, tier) in tiers.iter().enumerate() {
            if !tier.radius.is_finite() || tier.radius <= 0.0 {
                return Err(TierTableError::InvalidRadius(i));
            }
            if i > 0 && tier.radius <= tiers[i - 1].radius {
                return Err(TierTableError::NotIncreasing(i));
            }
        }
        Ok(Self { tiers })
    }

    /// The standard eleven-tier table. Built from constants; the running
    /// config re-checks it through [`TierTable::new`] at startup.
    pub fn standard() -> Self {
        let tiers = TABLE
            .iter()
            .map(|&(radius, score_value)| Tier { radius, score_value })
            .collect();
        Self { tiers }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    #[inline]
    pub fn get(&self, index: TierIndex) -> Option<&Tier> {
        self.tiers.get(index as usize)
    }

    /// Map an untrusted client index onto the table
    pub fn checked_index(&self, raw: i32) -> Option<TierIndex> {
        usize::try_from(raw)
            .ok()
            .filter(|&i| i < self.tiers.len())
            .map(|i| i as TierIndex)
    }

    #[inline]
    pub fn max_tier(&self) -> TierIndex {
        (self.tiers.len() - 1) as TierIndex
    }

    #[inline]
    pub fn is_max(&self, index: TierIndex) -> bool {
        index >= self.max_tier()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tier> {
        self.tiers.iter()
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self::standard()
    }
}
