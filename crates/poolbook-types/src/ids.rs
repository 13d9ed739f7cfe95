//! Identifiers used throughout PoolBook.
//!
//! Accounts use UUIDv7 for time-ordered sorting. Book keys are SHA-256
//! digests of `(market, outcome, kind)` so the price index can be keyed
//! by a single fixed-size value.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Outcome, PoolKind, Price};

// ---------------------------------------------------------------------------
// MarketId
// ---------------------------------------------------------------------------

/// Identifier of a binary-outcome market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MarketId(pub u64);

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "market:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// A token holder: a depositor, a taker, the engine's custody, or an AMM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TokenId
// ---------------------------------------------------------------------------

/// Vault-assigned identifier of an outcome share token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TokenId(pub u128);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token:{:x}", self.0)
    }
}

// ---------------------------------------------------------------------------
// BookKey
// ---------------------------------------------------------------------------

/// Digest of `(market, outcome, kind)`; one price-index bit vector per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct BookKey(pub [u8; 32]);

impl BookKey {
    #[must_use]
    pub fn derive(market: MarketId, outcome: Outcome, kind: PoolKind) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"poolbook:book_key:v1:");
        hasher.update(market.0.to_le_bytes());
        hasher.update([outcome.tag(), kind.tag()]);
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for BookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "book:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// PoolKey / PositionKey
// ---------------------------------------------------------------------------

/// Composite key of a single pool: one per (market, outcome, kind, price).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PoolKey {
    pub market: MarketId,
    pub outcome: Outcome,
    pub kind: PoolKind,
    pub price: Price,
}

impl PoolKey {
    #[must_use]
    pub fn new(market: MarketId, outcome: Outcome, kind: PoolKind, price: Price) -> Self {
        Self {
            market,
            outcome,
            kind,
            price,
        }
    }

    #[must_use]
    pub fn ask(market: MarketId, outcome: Outcome, price: Price) -> Self {
        Self::new(market, outcome, PoolKind::Ask, price)
    }

    #[must_use]
    pub fn bid(market: MarketId, outcome: Outcome, price: Price) -> Self {
        Self::new(market, outcome, PoolKind::Bid, price)
    }

    /// Key of the price-index bit vector this pool lives in.
    #[must_use]
    pub fn book_key(&self) -> BookKey {
        BookKey::derive(self.market, self.outcome, self.kind)
    }

    /// Same book, different level.
    #[must_use]
    pub fn at(&self, price: Price) -> Self {
        Self { price, ..*self }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}@{}",
            self.market, self.outcome, self.kind, self.price
        )
    }
}

/// A depositor's slot in one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PositionKey {
    pub pool: PoolKey,
    pub owner: AccountId,
}

impl PositionKey {
    #[must_use]
    pub fn new(pool: PoolKey, owner: AccountId) -> Self {
        Self { pool, owner }
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl PoolKey {
    /// YES ask pool of market 1 at `bps`.
    ///
    /// # Panics
    /// Panics if `bps` is not a valid level.
    pub fn dummy_ask(bps: u16) -> Self {
        Self::ask(MarketId(1), Outcome::Yes, Price::new(bps).expect("valid test price"))
    }

    /// YES bid pool of market 1 at `bps`.
    ///
    /// # Panics
    /// Panics if `bps` is not a valid level.
    pub fn dummy_bid(bps: u16) -> Self {
        Self::bid(MarketId(1), Outcome::Yes, Price::new(bps).expect("valid test price"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_uniqueness() {
        let a = AccountId::new();
        let b = AccountId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn book_key_is_deterministic() {
        let a = BookKey::derive(MarketId(3), Outcome::Yes, PoolKind::Ask);
        let b = BookKey::derive(MarketId(3), Outcome::Yes, PoolKind::Ask);
        assert_eq!(a, b);
    }

    #[test]
    fn book_key_separates_every_axis() {
        let base = BookKey::derive(MarketId(3), Outcome::Yes, PoolKind::Ask);
        assert_ne!(base, BookKey::derive(MarketId(4), Outcome::Yes, PoolKind::Ask));
        assert_ne!(base, BookKey::derive(MarketId(3), Outcome::No, PoolKind::Ask));
        assert_ne!(base, BookKey::derive(MarketId(3), Outcome::Yes, PoolKind::Bid));
    }

    #[test]
    fn pools_at_different_prices_share_a_book() {
        let a = PoolKey::dummy_ask(100);
        let b = a.at(Price::new(200).unwrap());
        assert_ne!(a, b);
        assert_eq!(a.book_key(), b.book_key());
        assert_ne!(a.book_key(), PoolKey::dummy_bid(100).book_key());
    }

    #[test]
    fn pool_key_display() {
        let key = PoolKey::dummy_ask(150);
        assert_eq!(format!("{key}"), "market:1/YES/ASK@150bps");
    }

    #[test]
    fn serde_roundtrips() {
        let key = PositionKey::new(PoolKey::dummy_bid(42), AccountId::new());
        let json = serde_json::to_string(&key).unwrap();
        let back: PositionKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }
}
