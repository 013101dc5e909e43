//! Tier bitmask.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of ranked tiers.
pub const TIER_COUNT: usize = 6;

/// A tier outside 1..=6 reached code that only accepts ranked tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0} is not a valid tier")]
pub struct InvalidTier(pub u8);

/// Validate a ranked tier and return its 0-based slot.
pub fn tier_index(tier: u8) -> Result<usize, InvalidTier> {
    match tier {
        1..=6 => Ok(usize::from(tier - 1)),
        other => Err(InvalidTier(other)),
    }
}

/// Set of tiers 1 through 6, one bit each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierMask(u8);

impl TierMask {
    pub const EMPTY: TierMask = TierMask(0);
    pub const T1: TierMask = TierMask(1 << 0);
    pub const T2: TierMask = TierMask(1 << 1);
    pub const T3: TierMask = TierMask(1 << 2);
    pub const T4: TierMask = TierMask(1 << 3);
    pub const T5: TierMask = TierMask(1 << 4);
    pub const T6: TierMask = TierMask(1 << 5);

    /// Mask holding a single tier. Tier 0 is not a member of any mask.
    pub fn from_tier(tier: u8) -> Result<Self, InvalidTier> {
        let index = tier_index(tier)?;
        Ok(TierMask(1 << index))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn set(&mut self, other: TierMask) {
        self.0 |= other.0;
    }

    pub fn with(self, other: TierMask) -> Self {
        TierMask(self.0 | other.0)
    }

    pub fn contains(&self, tier: u8) -> bool {
        match TierMask::from_tier(tier) {
            Ok(mask) => self.0 & mask.0 != 0,
            Err(_) => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_subset_of(&self, other: TierMask) -> bool {
        self.0 & other.0 == self.0
    }

    /// Member tiers in ascending order.
    pub fn tiers(&self) -> impl Iterator<Item = u8> + '_ {
        (1..=TIER_COUNT as u8).filter(move |t| self.contains(*t))
    }
}

impl std::ops::BitOr for TierMask {
    type Output = TierMask;

    fn bitor(self, rhs: TierMask) -> TierMask {
        self.with(rhs)
    }
}

impl std::ops::BitAnd for TierMask {
    type Output = TierMask;

    fn bitand(self, rhs: TierMask) -> TierMask {
        TierMask(self.0 & rhs.0)
    }
}
