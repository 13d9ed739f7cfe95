//! Pool and position storage with staged, all-or-nothing updates.
//!
//! Mutations never touch [`PoolBook`] directly. A caller opens a
//! [`BookTxn`] over a shared borrow, runs ledger operations against
//! copy-on-write overlays, performs its external transfers, and only then
//! folds the resulting [`Changeset`] back with [`PoolBook::apply`].
//! Dropping a transaction (e.g. after a failed transfer) discards it.

use std::collections::HashMap;

use poolbook_types::{AccountId, PoolKey, PoolKind, PoolbookError, PositionKey, Price, Result};
use serde::Serialize;
use tracing::debug;

use crate::accumulator::{self, DepositReceipt, FillReceipt, Pool, Position, WithdrawReceipt};
use crate::price_index::PriceIndex;

/// Resting liquidity at one level, as reported by [`PoolBook::depth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelDepth {
    pub price: Price,
    pub inventory: u128,
    pub total_shares: u128,
}

// ============================================================================
// PoolBook
// ============================================================================

/// Every pool, every position, and the active-level index.
#[derive(Debug, Default)]
pub struct PoolBook {
    pools: HashMap<PoolKey, Pool>,
    positions: HashMap<PositionKey, Position>,
    index: PriceIndex,
}

impl PoolBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a staged transaction.
    #[must_use]
    pub fn begin(&self) -> BookTxn<'_> {
        BookTxn {
            base: self,
            pools: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    #[must_use]
    pub fn pool(&self, key: &PoolKey) -> Option<Pool> {
        self.pools.get(key).copied()
    }

    #[must_use]
    pub fn position(&self, key: &PoolKey, owner: AccountId) -> Option<Position> {
        self.positions.get(&PositionKey::new(*key, owner)).copied()
    }

    /// Proceeds `owner` could claim from `key` right now (0 without a position).
    pub fn pending(&self, key: &PoolKey, owner: AccountId) -> Result<u128> {
        match (self.pool(key), self.position(key, owner)) {
            (Some(pool), Some(position)) => accumulator::pending(&pool, &position),
            _ => Ok(0),
        }
    }

    #[must_use]
    pub fn index(&self) -> &PriceIndex {
        &self.index
    }

    /// Whether the level at `key` has sellable inventory.
    #[must_use]
    pub fn is_active(&self, key: &PoolKey) -> bool {
        self.index.is_active(&key.book_key(), key.price)
    }

    /// Cheapest active ask level of `book`'s side, if any.
    #[must_use]
    pub fn lowest_active(&self, book: &PoolKey) -> Option<Price> {
        self.index.best_at_or_above(&book.book_key(), 0)
    }

    /// Richest active bid level of `book`'s side, if any.
    #[must_use]
    pub fn highest_active(&self, book: &PoolKey) -> Option<Price> {
        self.index.best_at_or_below(&book.book_key(), u16::MAX)
    }

    /// Up to `max_levels` active levels of the book `key` belongs to,
    /// best first: ascending for asks, descending for bids.
    #[must_use]
    pub fn depth(&self, key: &PoolKey, max_levels: usize) -> Vec<LevelDepth> {
        let book = key.book_key();
        let ascending = key.kind == PoolKind::Ask;
        let mut levels = Vec::new();
        let mut cursor = if ascending {
            self.index.best_at_or_above(&book, 0)
        } else {
            self.index.best_at_or_below(&book, u16::MAX)
        };

        while let Some(price) = cursor {
            if levels.len() >= max_levels {
                break;
            }
            if let Some(pool) = self.pool(&key.at(price)) {
                levels.push(LevelDepth {
                    price,
                    inventory: pool.inventory,
                    total_shares: pool.total_shares,
                });
            }
            cursor = if ascending {
                price.next_up().and_then(|p| self.index.best_at_or_above(&book, p.bps()))
            } else {
                price.next_down().and_then(|p| self.index.best_at_or_below(&book, p.bps()))
            };
        }
        levels
    }

    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    #[must_use]
    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Commit a changeset produced by [`BookTxn::into_changeset`].
    ///
    /// Pools with no ownership left and empty positions are dropped; index
    /// bits follow `inventory > 0`.
    pub fn apply(&mut self, changes: Changeset) {
        let touched_pools = changes.pools.len();
        let touched_positions = changes.positions.len();

        for (key, pool) in changes.pools {
            let active = pool.inventory > 0 && pool.total_shares > 0;
            self.index.set_bit(key.book_key(), key.price, active);
            if pool.total_shares == 0 {
                self.pools.remove(&key);
            } else {
                self.pools.insert(key, pool);
            }
        }
        for (key, position) in changes.positions {
            if position.is_empty() {
                self.positions.remove(&key);
            } else {
                self.positions.insert(key, position);
            }
        }

        debug!(
            pools = touched_pools,
            positions = touched_positions,
            "Changeset applied"
        );
    }
}

// ============================================================================
// Transaction
// ============================================================================

/// Staged pool and position updates, ready to commit.
#[derive(Debug, Default)]
#[must_use = "a changeset does nothing until applied"]
pub struct Changeset {
    pools: HashMap<PoolKey, Pool>,
    positions: HashMap<PositionKey, Position>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty() && self.positions.is_empty()
    }
}

/// Copy-on-write view over a [`PoolBook`].
#[derive(Debug)]
pub struct BookTxn<'a> {
    base: &'a PoolBook,
    pools: HashMap<PoolKey, Pool>,
    positions: HashMap<PositionKey, Position>,
}

impl BookTxn<'_> {
    /// Pool as seen by this transaction.
    #[must_use]
    pub fn pool(&self, key: &PoolKey) -> Option<Pool> {
        self.pools
            .get(key)
            .copied()
            .or_else(|| self.base.pool(key))
            .filter(|pool| pool.total_shares > 0)
    }

    /// Position as seen by this transaction.
    #[must_use]
    pub fn position(&self, key: &PoolKey, owner: AccountId) -> Option<Position> {
        let pk = PositionKey::new(*key, owner);
        self.positions
            .get(&pk)
            .copied()
            .or_else(|| self.base.positions.get(&pk).copied())
            .filter(|position| !position.is_empty())
    }

    /// Pending proceeds as seen by this transaction.
    pub fn pending(&self, key: &PoolKey, owner: AccountId) -> Result<u128> {
        match (self.pool(key), self.position(key, owner)) {
            (Some(pool), Some(position)) => accumulator::pending(&pool, &position),
            _ => Ok(0),
        }
    }

    /// Active-level index as of the start of the transaction.
    ///
    /// Fills staged here only ever clear levels, so a scan that re-reads
    /// each pool through [`BookTxn::pool`] stays correct.
    #[must_use]
    pub fn index(&self) -> &PriceIndex {
        &self.base.index
    }

    fn require_pool(&self, key: &PoolKey) -> Result<Pool> {
        self.pool(key).ok_or(PoolbookError::PoolNotFound(*key))
    }

    fn require_position(&self, key: &PoolKey, owner: AccountId) -> Result<Position> {
        self.position(key, owner)
            .ok_or(PoolbookError::PositionNotFound { pool: *key, owner })
    }

    fn stage(&mut self, key: PoolKey, owner: Option<AccountId>, pool: Pool, position: Option<Position>) {
        self.pools.insert(key, pool);
        if let (Some(owner), Some(position)) = (owner, position) {
            self.positions.insert(PositionKey::new(key, owner), position);
        }
    }

    /// Deposit into the pool at `key`, creating pool and position as needed.
    pub fn deposit(&mut self, key: PoolKey, owner: AccountId, amount: u128) -> Result<DepositReceipt> {
        let mut pool = self.pool(&key).unwrap_or_default();
        let mut position = self.position(&key, owner).unwrap_or_default();
        let receipt = accumulator::deposit(&mut pool, &mut position, amount)?;
        self.stage(key, Some(owner), pool, Some(position));
        Ok(receipt)
    }

    pub fn fill(&mut self, key: PoolKey, units_out: u128, proceeds_in: u128) -> Result<FillReceipt> {
        let mut pool = self.require_pool(&key)?;
        let receipt = accumulator::fill(&mut pool, units_out, proceeds_in)?;
        self.stage(key, None, pool, None);
        Ok(receipt)
    }

    pub fn claim(&mut self, key: PoolKey, owner: AccountId) -> Result<u128> {
        let pool = self.require_pool(&key)?;
        let mut position = self.require_position(&key, owner)?;
        let owed = accumulator::claim(&pool, &mut position)?;
        self.stage(key, Some(owner), pool, Some(position));
        Ok(owed)
    }

    pub fn withdraw(&mut self, key: PoolKey, owner: AccountId, wanted: u128) -> Result<WithdrawReceipt> {
        let mut pool = self.require_pool(&key)?;
        let mut position = self.require_position(&key, owner)?;
        let receipt = accumulator::withdraw(&mut pool, &mut position, wanted)?;
        self.stage(key, Some(owner), pool, Some(position));
        Ok(receipt)
    }

    pub fn exit_depleted(&mut self, key: PoolKey, owner: AccountId) -> Result<u128> {
        let mut pool = self.require_pool(&key)?;
        let mut position = self.require_position(&key, owner)?;
        let owed = accumulator::exit_depleted(&mut pool, &mut position)?;
        self.stage(key, Some(owner), pool, Some(position));
        Ok(owed)
    }

    /// Finish staging. The borrow on the book ends here.
    pub fn into_changeset(self) -> Changeset {
        Changeset {
            pools: self.pools,
            positions: self.positions,
        }
    }
}
