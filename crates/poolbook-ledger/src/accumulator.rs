//! Reward-per-unit accumulator: the bookkeeping shared by ask and bid pools.
//!
//! A pool holds fungible `inventory` (shares for asks, collateral for bids)
//! owned by depositors through ownership units. Every fill distributes its
//! proceeds across *all* ownership through `acc_per_unit` (scaled by 1e18),
//! and each position remembers the accrued value at its last interaction
//! (`debt`). A depositor who joins after a fill starts with
//! `debt == ownership * acc_per_unit / 1e18`, so earlier proceeds are not
//! claimable by them.
//!
//! ```text
//! pending(position) = ownership * acc_per_unit / 1e18 - debt
//! ```
//!
//! These functions are pure state transitions on copies; persistence and
//! index maintenance live in [`crate::book`].

use poolbook_types::math::{self, Rounding};
use poolbook_types::{PoolbookError, Result};
use serde::{Deserialize, Serialize};

/// One price level's pool.
///
/// For ask pools `inventory` is `totalUnits` (shares for sale) and proceeds
/// are collateral; for bid pools `inventory` is `totalCollateral` and
/// proceeds are shares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    /// Remaining tradable inventory.
    pub inventory: u128,
    /// Total ownership units outstanding.
    pub total_shares: u128,
    /// Cumulative proceeds per ownership unit, scaled by 1e18.
    pub acc_per_unit: u128,
    /// Cumulative proceeds collected (informational).
    pub earned: u128,
}

impl Pool {
    /// Ask-side name for `inventory`.
    #[must_use]
    pub fn total_units(&self) -> u128 {
        self.inventory
    }

    /// Bid-side name for `inventory`.
    #[must_use]
    pub fn total_collateral(&self) -> u128 {
        self.inventory
    }

    /// Sold out, though owners may still hold claims.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.inventory == 0
    }
}

/// A depositor's claim on one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Ownership units held.
    pub ownership: u128,
    /// Accrued value recorded at the last interaction.
    pub debt: u128,
}

impl Position {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ownership == 0
    }
}

/// Outcome of [`deposit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositReceipt {
    /// Ownership units minted (1:1 with the deposit).
    pub minted: u128,
    /// Previously accrued proceeds paid out before the debt reset.
    pub realized: u128,
}

/// Outcome of [`fill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillReceipt {
    pub units_out: u128,
    pub proceeds_in: u128,
    /// Whether this fill sold the last of the inventory.
    pub depleted: bool,
}

/// Outcome of [`withdraw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawReceipt {
    /// Inventory handed back to the depositor.
    pub returned: u128,
    /// Ownership units burned.
    pub burned: u128,
    /// Proceeds auto-claimed before withdrawing.
    pub realized: u128,
}

/// Proceeds claimable by `position` right now.
pub fn pending(pool: &Pool, position: &Position) -> Result<u128> {
    let accrued = math::accrued(position.ownership, pool.acc_per_unit)?;
    accrued
        .checked_sub(position.debt)
        .ok_or_else(|| PoolbookError::Internal("position debt exceeds accrued value".into()))
}

/// Add `amount_in` inventory and mint the same number of ownership units.
///
/// Pending proceeds are realized into the receipt first, so a top-up never
/// discards unclaimed value.
pub fn deposit(pool: &mut Pool, position: &mut Position, amount_in: u128) -> Result<DepositReceipt> {
    if amount_in == 0 {
        return Err(PoolbookError::zero_amount("deposit"));
    }
    let realized = pending(pool, position)?;

    let ownership = checked_add(position.ownership, amount_in, "position ownership")?;
    let inventory = checked_add(pool.inventory, amount_in, "pool inventory")?;
    let total_shares = checked_add(pool.total_shares, amount_in, "pool ownership")?;
    let debt = math::accrued(ownership, pool.acc_per_unit)?;

    pool.inventory = inventory;
    pool.total_shares = total_shares;
    position.ownership = ownership;
    position.debt = debt;

    Ok(DepositReceipt {
        minted: amount_in,
        realized,
    })
}

/// Sell `units_out` of the pool's inventory for `proceeds_in`, distributing
/// the proceeds across every ownership unit.
pub fn fill(pool: &mut Pool, units_out: u128, proceeds_in: u128) -> Result<FillReceipt> {
    if units_out == 0 {
        return Err(PoolbookError::zero_amount("fill"));
    }
    if pool.total_shares == 0 || units_out > pool.inventory {
        return Err(PoolbookError::InsufficientLiquidity {
            requested: units_out,
            available: if pool.total_shares == 0 { 0 } else { pool.inventory },
        });
    }

    let increment = math::acc_increment(proceeds_in, pool.total_shares)?;
    let acc_per_unit = checked_add(pool.acc_per_unit, increment, "accumulator")?;
    let earned = checked_add(pool.earned, proceeds_in, "pool earned")?;

    pool.acc_per_unit = acc_per_unit;
    pool.earned = earned;
    pool.inventory -= units_out;

    Ok(FillReceipt {
        units_out,
        proceeds_in,
        depleted: pool.inventory == 0,
    })
}

/// Realize and return pending proceeds. Idempotent without new fills.
pub fn claim(pool: &Pool, position: &mut Position) -> Result<u128> {
    let owed = pending(pool, position)?;
    position.debt = math::accrued(position.ownership, pool.acc_per_unit)?;
    Ok(owed)
}

/// Auto-claim, then return up to `units_wanted` of the position's
/// proportional share of the remaining inventory.
///
/// The bound is `ownership * inventory / total_shares`. Ownership burned is
/// `ceil(returned * total_shares / inventory)`, which is exactly `returned`
/// while nothing has been sold; asking for the whole bound (or more) burns
/// the whole position.
///
/// Once the pool has sold anything the burn is no longer 1:1 with units
/// returned: each ownership unit then backs less than one unit of
/// inventory, so a unit returned costs `total_shares / inventory` units of
/// ownership. Burning only `returned` would let an early withdrawer take
/// more than their pro-rata slice of what is left and leave the others
/// short. Proceeds already earned are unaffected since they are claimed
/// first. When the bound is zero (a depleted pool, or a
/// position too small to own a whole unit) nothing is returned or burned;
/// use [`exit_depleted`] once the pool sells out.
pub fn withdraw(
    pool: &mut Pool,
    position: &mut Position,
    units_wanted: u128,
) -> Result<WithdrawReceipt> {
    if units_wanted == 0 {
        return Err(PoolbookError::zero_amount("withdraw"));
    }
    if position.ownership == 0 {
        return Err(PoolbookError::InsufficientLiquidity {
            requested: units_wanted,
            available: 0,
        });
    }

    let realized = claim(pool, position)?;
    let bound = if pool.inventory == 0 {
        0
    } else {
        math::mul_div(
            position.ownership,
            pool.inventory,
            pool.total_shares,
            Rounding::Down,
            "withdraw bound",
        )?
    };
    if bound == 0 {
        return Ok(WithdrawReceipt {
            returned: 0,
            burned: 0,
            realized,
        });
    }

    let (returned, burned) = if units_wanted >= bound {
        (bound, position.ownership)
    } else {
        let burned = math::mul_div(
            units_wanted,
            pool.total_shares,
            pool.inventory,
            Rounding::Up,
            "withdraw burn",
        )?
        .min(position.ownership);
        (units_wanted, burned)
    };

    pool.inventory -= returned;
    pool.total_shares -= burned;
    position.ownership -= burned;
    position.debt = math::accrued(position.ownership, pool.acc_per_unit)?;

    Ok(WithdrawReceipt {
        returned,
        burned,
        realized,
    })
}

/// Leave a sold-out pool: claim what is owed and burn all ownership.
pub fn exit_depleted(pool: &mut Pool, position: &mut Position) -> Result<u128> {
    if pool.inventory != 0 {
        return Err(PoolbookError::PoolNotDepleted {
            inventory: pool.inventory,
        });
    }
    if position.ownership == 0 {
        return Err(PoolbookError::InsufficientLiquidity {
            requested: 0,
            available: 0,
        });
    }
    let owed = claim(pool, position)?;
    pool.total_shares -= position.ownership;
    *position = Position::default();
    Ok(owed)
}

// ---------------------------------------------------------------------------
// Bid-side mirrors: collateral is the inventory, shares are the proceeds.
// ---------------------------------------------------------------------------

/// Bid-side [`deposit`]: add collateral, mint ownership.
pub fn deposit_collateral(
    pool: &mut Pool,
    position: &mut Position,
    collateral_in: u128,
) -> Result<DepositReceipt> {
    deposit(pool, position, collateral_in)
}

/// Bid-side [`fill`]: pay out `collateral_out` for `shares_in`.
pub fn fill_bid(pool: &mut Pool, collateral_out: u128, shares_in: u128) -> Result<FillReceipt> {
    fill(pool, collateral_out, shares_in)
}

/// Bid-side [`claim`]: realize accrued shares.
pub fn claim_shares(pool: &Pool, position: &mut Position) -> Result<u128> {
    claim(pool, position)
}

/// Bid-side [`withdraw`]: take back unspent collateral.
pub fn withdraw_collateral(
    pool: &mut Pool,
    position: &mut Position,
    collateral_wanted: u128,
) -> Result<WithdrawReceipt> {
    withdraw(pool, position, collateral_wanted)
}

/// Bid-side [`exit_depleted`].
pub fn exit_depleted_bid(pool: &mut Pool, position: &mut Position) -> Result<u128> {
    exit_depleted(pool, position)
}

fn checked_add(a: u128, b: u128, context: &'static str) -> Result<u128> {
    a.checked_add(b).ok_or(PoolbookError::Overflow { context })
}
