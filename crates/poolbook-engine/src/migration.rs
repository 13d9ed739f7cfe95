//! Moving a position between price levels of the same book.
//!
//! The inventory itself never leaves custody: the old position is
//! withdrawn (auto-claiming its proceeds) and exactly what came back is
//! deposited at the new level, all inside one staged transaction. Realized
//! proceeds are a different asset from the inventory, so they are paid out
//! to the owner rather than re-deposited.

use poolbook_ledger::{BookTxn, DepositReceipt};
use poolbook_types::{AccountId, PoolKey, PoolbookError, Price, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReceipt {
    pub from: PoolKey,
    pub to: PoolKey,
    /// Inventory moved to the new level.
    pub moved: u128,
    /// Ownership burned at the old level.
    pub burned: u128,
    /// Proceeds realized at either level, owed to the owner.
    pub realized: u128,
    /// Ownership minted at the new level, absent when nothing moved.
    pub deposit: Option<DepositReceipt>,
}

/// Stage a migration of up to `amount` from `from` to the same book at `to`.
pub(crate) fn stage(
    txn: &mut BookTxn<'_>,
    owner: AccountId,
    from: PoolKey,
    to: Price,
    amount: u128,
) -> Result<MigrationReceipt> {
    if amount == 0 {
        return Err(PoolbookError::zero_amount("migration amount"));
    }
    if to == from.price {
        return Err(PoolbookError::SamePriceMigration { bps: to.bps() });
    }
    let target = from.at(to);

    let withdrawn = txn.withdraw(from, owner, amount)?;
    let deposit = if withdrawn.returned > 0 {
        Some(txn.deposit(target, owner, withdrawn.returned)?)
    } else {
        None
    };

    let realized = withdrawn
        .realized
        .checked_add(deposit.map_or(0, |d| d.realized))
        .ok_or(PoolbookError::Overflow { context: "migration proceeds" })?;

    if withdrawn.returned == 0 && realized == 0 {
        return Err(PoolbookError::InsufficientLiquidity {
            requested: amount,
            available: 0,
        });
    }

    Ok(MigrationReceipt {
        from,
        to: target,
        moved: withdrawn.returned,
        burned: withdrawn.burned,
        realized,
        deposit,
    })
}
