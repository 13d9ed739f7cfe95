//! Boundary adapters: the outcome-token vault and the fallback AMM.
//!
//! The engine never owns tokens itself. It moves them through an
//! [`OutcomeVault`] between takers, makers, its own custody account, and the
//! AMM's account, and it asks a [`FallbackAmm`] to price and execute the
//! remainder of a sweep that resting pools could not absorb.

pub mod memory;

use poolbook_types::{AccountId, MarketId, Outcome, Result, TokenId};
use serde::{Deserialize, Serialize};

pub use memory::{ConstantProductAmm, MemoryVault};

/// Something the vault can hold a balance of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    Collateral,
    Shares(TokenId),
}

/// Custodian of collateral and outcome-share balances.
pub trait OutcomeVault {
    /// Share token of `outcome` in `market`.
    fn share_token(&self, market: MarketId, outcome: Outcome) -> TokenId;

    /// The opposite outcome's token of the same market.
    fn paired_token(&self, token: TokenId) -> TokenId;

    fn collateral_balance(&self, account: AccountId) -> u128;

    fn share_balance(&self, account: AccountId, token: TokenId) -> u128;

    /// # Errors
    /// `TransferFailed` when `from` cannot cover `amount`.
    fn transfer_collateral(&mut self, from: AccountId, to: AccountId, amount: u128) -> Result<()>;

    /// # Errors
    /// `TransferFailed` when `from` cannot cover `amount`.
    fn transfer_shares(
        &mut self,
        token: TokenId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<()>;

    /// Lock `collateral` from `owner` and credit `owner` with the same
    /// amount of both outcome tokens.
    ///
    /// # Errors
    /// `MintFailed` when `owner` cannot cover the collateral.
    fn mint_pair(&mut self, market: MarketId, owner: AccountId, collateral: u128) -> Result<()>;

    /// Inverse of [`OutcomeVault::mint_pair`].
    ///
    /// # Errors
    /// `MintFailed` when `owner` lacks either outcome token.
    fn burn_pair(&mut self, market: MarketId, owner: AccountId, amount: u128) -> Result<()>;

    fn balance(&self, account: AccountId, asset: Asset) -> u128 {
        match asset {
            Asset::Collateral => self.collateral_balance(account),
            Asset::Shares(token) => self.share_balance(account, token),
        }
    }

    fn transfer(&mut self, asset: Asset, from: AccountId, to: AccountId, amount: u128) -> Result<()> {
        match asset {
            Asset::Collateral => self.transfer_collateral(from, to, amount),
            Asset::Shares(token) => self.transfer_shares(token, from, to, amount),
        }
    }
}

/// Direction of an AMM swap from the taker's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapSide {
    /// Collateral in, outcome shares out.
    Buy,
    /// Outcome shares in, collateral out.
    Sell,
}

/// External market maker used as the last leg of a sweep.
///
/// The engine delivers `amount_in` to [`FallbackAmm::account`] before
/// calling [`FallbackAmm::swap`], and collects the returned output from that
/// same account afterwards.
pub trait FallbackAmm {
    /// Vault account holding the AMM's reserves.
    fn account(&self) -> AccountId;

    /// Output a swap of `amount_in` would produce right now. Read-only.
    fn quote(&self, market: MarketId, outcome: Outcome, side: SwapSide, amount_in: u128)
    -> Result<u128>;

    /// Execute a swap.
    ///
    /// # Errors
    /// `AmmSwapFailed` when the output would fall below `min_out` or the
    /// pool cannot serve the trade. Reserves are unchanged on error.
    fn swap(
        &mut self,
        market: MarketId,
        outcome: Outcome,
        side: SwapSide,
        amount_in: u128,
        min_out: u128,
    ) -> Result<u128>;
}

/// AMM stand-in that never quotes or fills; for pool-only deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAmm {
    pub account: AccountId,
}

impl FallbackAmm for NoAmm {
    fn account(&self) -> AccountId {
        self.account
    }

    fn quote(&self, _: MarketId, _: Outcome, _: SwapSide, _: u128) -> Result<u128> {
        Ok(0)
    }

    fn swap(&mut self, _: MarketId, _: Outcome, _: SwapSide, _: u128, _: u128) -> Result<u128> {
        Err(poolbook_types::PoolbookError::AmmSwapFailed {
            reason: "no AMM configured".into(),
        })
    }
}
