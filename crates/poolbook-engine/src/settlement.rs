//! Token movements of one engine operation, with rollback.
//!
//! Ledger changes are staged first. [`Settlement`] then executes the
//! matching vault legs in order and remembers each one; if any later leg
//! (or the AMM) fails, [`Settlement::rollback`] replays the executed legs in
//! reverse so the vault returns to where it started. The staged ledger
//! changes are applied only after [`Settlement::finish`].

use poolbook_types::{AccountId, MarketId, Result};

use crate::adapters::{Asset, OutcomeVault};

/// One executed vault step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    Transfer {
        asset: Asset,
        from: AccountId,
        to: AccountId,
        amount: u128,
    },
    Mint {
        market: MarketId,
        owner: AccountId,
        amount: u128,
    },
}

pub struct Settlement<'v, V: OutcomeVault> {
    vault: &'v mut V,
    executed: Vec<Leg>,
}

impl<'v, V: OutcomeVault> Settlement<'v, V> {
    pub fn new(vault: &'v mut V) -> Self {
        Self {
            vault,
            executed: Vec::new(),
        }
    }

    pub fn vault(&self) -> &V {
        &*self.vault
    }

    /// Move `amount` of `asset`; zero amounts are skipped.
    pub fn transfer(&mut self, asset: Asset, from: AccountId, to: AccountId, amount: u128) -> Result<()> {
        if amount == 0 || from == to {
            return Ok(());
        }
        self.vault.transfer(asset, from, to, amount)?;
        self.executed.push(Leg::Transfer {
            asset,
            from,
            to,
            amount,
        });
        Ok(())
    }

    pub fn mint_pair(&mut self, market: MarketId, owner: AccountId, amount: u128) -> Result<()> {
        self.vault.mint_pair(market, owner, amount)?;
        self.executed.push(Leg::Mint {
            market,
            owner,
            amount,
        });
        Ok(())
    }

    /// Undo every executed leg, newest first.
    pub fn rollback(self) {
        let legs = self.executed.len();
        for leg in self.executed.into_iter().rev() {
            let undone = match leg {
                Leg::Transfer {
                    asset,
                    from,
                    to,
                    amount,
                } => self.vault.transfer(asset, to, from, amount),
                Leg::Mint {
                    market,
                    owner,
                    amount,
                } => self.vault.burn_pair(market, owner, amount),
            };
            if let Err(err) = undone {
                tracing::error!(leg = ?leg, error = %err, "Rollback leg failed");
            }
        }
        tracing::debug!(legs, "Settlement rolled back");
    }

    /// Keep every executed leg.
    pub fn finish(self) -> Vec<Leg> {
        self.executed
    }

    /// Run `f`; roll back on error, finish on success.
    pub fn run<T>(mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<(T, Vec<Leg>)> {
        match f(&mut self) {
            Ok(value) => Ok((value, self.finish())),
            Err(err) => {
                tracing::warn!(error = %err, "Settlement failed, rolling back");
                self.rollback();
                Err(err)
            }
        }
    }
}
