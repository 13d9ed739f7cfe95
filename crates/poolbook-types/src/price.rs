//! Discrete price levels and the two axes of a book: outcome and pool kind.
//!
//! Prices are integer basis points in `1..=9999`; a share of an outcome
//! priced at `p` bps costs `p / 10000` collateral units per share unit.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_PRICE_BPS, MIN_PRICE_BPS};
use crate::{PoolbookError, Result};

/// A validated price level in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Price(u16);

impl Price {
    /// Lowest valid level.
    pub const MIN: Self = Self(MIN_PRICE_BPS);
    /// Highest valid level.
    pub const MAX: Self = Self(MAX_PRICE_BPS);

    /// Validate a raw bps value.
    ///
    /// # Errors
    /// Returns `InvalidPrice` for 0 and for anything `>= 10000`.
    pub fn new(bps: u16) -> Result<Self> {
        if (MIN_PRICE_BPS..=MAX_PRICE_BPS).contains(&bps) {
            Ok(Self(bps))
        } else {
            Err(PoolbookError::InvalidPrice { bps: u32::from(bps) })
        }
    }

    /// Raw basis points.
    #[must_use]
    pub fn bps(self) -> u16 {
        self.0
    }

    /// Basis points widened for amount arithmetic.
    #[must_use]
    pub fn bps_u128(self) -> u128 {
        u128::from(self.0)
    }

    /// Price of the complementary outcome (`10000 - bps`).
    #[must_use]
    pub fn complement(self) -> Self {
        // 1..=9999 maps onto 9999..=1, always valid.
        Self(10_000 - self.0)
    }

    /// The level as an implied probability (e.g. 2500 bps -> 0.25).
    #[must_use]
    pub fn as_probability(self) -> Decimal {
        Decimal::new(i64::from(self.0), 4)
    }

    /// Next level up, or `None` at the top.
    #[must_use]
    pub fn next_up(self) -> Option<Self> {
        (self.0 < MAX_PRICE_BPS).then(|| Self(self.0 + 1))
    }

    /// Next level down, or `None` at the bottom.
    #[must_use]
    pub fn next_down(self) -> Option<Self> {
        (self.0 > MIN_PRICE_BPS).then(|| Self(self.0 - 1))
    }
}

impl TryFrom<u16> for Price {
    type Error = PoolbookError;

    fn try_from(bps: u16) -> Result<Self> {
        Self::new(bps)
    }
}

impl From<Price> for u16 {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

/// Which outcome token of a binary market a book trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Yes => Self::No,
            Self::No => Self::Yes,
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Yes => 1,
            Self::No => 0,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => write!(f, "YES"),
            Self::No => write!(f, "NO"),
        }
    }
}

/// Ask pools hold shares for sale; bid pools hold collateral to buy shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum PoolKind {
    Ask,
    Bid,
}

impl PoolKind {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Ask => 1,
            Self::Bid => 0,
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ask => write!(f, "ASK"),
            Self::Bid => write!(f, "BID"),
        }
    }
}
