//! In-memory vault and constant-product AMM.
//!
//! Both are complete implementations of the adapter traits, used by the
//! test suites and by embedders that keep balances in process.

use std::collections::HashMap;

use poolbook_types::constants::BPS_DENOMINATOR;
use poolbook_types::math::{self, Rounding};
use poolbook_types::{AccountId, MarketId, Outcome, PoolbookError, Result, TokenId};
use serde::{Deserialize, Serialize};

use super::{Asset, FallbackAmm, OutcomeVault, SwapSide};

// ============================================================================
// MemoryVault
// ============================================================================

/// Balance ledger for collateral and outcome shares.
///
/// Tracks issuance next to balances so the supply invariant
/// `sum(balances) + locked == issued` can be checked after any sequence of
/// operations.
#[derive(Debug, Default)]
pub struct MemoryVault {
    /// `(account, asset) -> balance`
    balances: HashMap<(AccountId, Asset), u128>,
    /// Units created from outside (credits and mints) minus units burned.
    issued: HashMap<Asset, u128>,
    /// Collateral backing minted outcome pairs, per market.
    locked: HashMap<MarketId, u128>,
}

impl MemoryVault {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account from outside the system (a funding deposit).
    pub fn credit(&mut self, account: AccountId, asset: Asset, amount: u128) {
        *self.balances.entry((account, asset)).or_insert(0) += amount;
        *self.issued.entry(asset).or_insert(0) += amount;
    }

    /// Sum of all balances of `asset`.
    #[must_use]
    pub fn circulating(&self, asset: Asset) -> u128 {
        self.balances
            .iter()
            .filter(|((_, a), _)| *a == asset)
            .map(|(_, amount)| amount)
            .sum()
    }

    /// Collateral locked behind minted pairs of `market`.
    #[must_use]
    pub fn locked_collateral(&self, market: MarketId) -> u128 {
        self.locked.get(&market).copied().unwrap_or(0)
    }

    /// Check that no units of `asset` were created or destroyed outside
    /// credits, mints and burns.
    pub fn verify_supply(&self, asset: Asset) -> Result<()> {
        let issued = self.issued.get(&asset).copied().unwrap_or(0);
        let locked = match asset {
            Asset::Collateral => self.locked.values().sum(),
            Asset::Shares(_) => 0,
        };
        let actual = self.circulating(asset) + locked;
        if actual != issued {
            return Err(PoolbookError::Internal(format!(
                "supply mismatch for {asset:?}: circulating+locked {actual} != issued {issued}"
            )));
        }
        Ok(())
    }

    fn debit(&mut self, account: AccountId, asset: Asset, amount: u128) -> std::result::Result<(), u128> {
        let balance = self.balances.entry((account, asset)).or_insert(0);
        if *balance < amount {
            return Err(*balance);
        }
        *balance -= amount;
        Ok(())
    }

    fn move_asset(&mut self, asset: Asset, from: AccountId, to: AccountId, amount: u128) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        self.debit(from, asset, amount)
            .map_err(|available| PoolbookError::TransferFailed {
                reason: format!("{asset:?}: {from} holds {available}, needs {amount}"),
            })?;
        *self.balances.entry((to, asset)).or_insert(0) += amount;
        Ok(())
    }
}

impl OutcomeVault for MemoryVault {
    fn share_token(&self, market: MarketId, outcome: Outcome) -> TokenId {
        let bit = match outcome {
            Outcome::Yes => 1,
            Outcome::No => 0,
        };
        TokenId((u128::from(market.0) << 1) | bit)
    }

    fn paired_token(&self, token: TokenId) -> TokenId {
        TokenId(token.0 ^ 1)
    }

    fn collateral_balance(&self, account: AccountId) -> u128 {
        self.balances
            .get(&(account, Asset::Collateral))
            .copied()
            .unwrap_or(0)
    }

    fn share_balance(&self, account: AccountId, token: TokenId) -> u128 {
        self.balances
            .get(&(account, Asset::Shares(token)))
            .copied()
            .unwrap_or(0)
    }

    fn transfer_collateral(&mut self, from: AccountId, to: AccountId, amount: u128) -> Result<()> {
        self.move_asset(Asset::Collateral, from, to, amount)
    }

    fn transfer_shares(
        &mut self,
        token: TokenId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<()> {
        self.move_asset(Asset::Shares(token), from, to, amount)
    }

    fn mint_pair(&mut self, market: MarketId, owner: AccountId, collateral: u128) -> Result<()> {
        if collateral == 0 {
            return Err(PoolbookError::MintFailed {
                reason: "nothing to mint".into(),
            });
        }
        self.debit(owner, Asset::Collateral, collateral)
            .map_err(|available| PoolbookError::MintFailed {
                reason: format!("{owner} holds {available} collateral, needs {collateral}"),
            })?;
        *self.locked.entry(market).or_insert(0) += collateral;
        for outcome in [Outcome::Yes, Outcome::No] {
            let token = self.share_token(market, outcome);
            *self.balances.entry((owner, Asset::Shares(token))).or_insert(0) += collateral;
            *self.issued.entry(Asset::Shares(token)).or_insert(0) += collateral;
        }
        Ok(())
    }

    fn burn_pair(&mut self, market: MarketId, owner: AccountId, amount: u128) -> Result<()> {
        let yes = Asset::Shares(self.share_token(market, Outcome::Yes));
        let no = Asset::Shares(self.share_token(market, Outcome::No));
        let locked = self.locked_collateral(market);
        let held_yes = self.balance(owner, yes);
        let held_no = self.balance(owner, no);
        if held_yes < amount || held_no < amount || locked < amount {
            return Err(PoolbookError::MintFailed {
                reason: format!("cannot burn {amount} pairs: holds {held_yes} YES / {held_no} NO"),
            });
        }
        for asset in [yes, no] {
            *self.balances.entry((owner, asset)).or_insert(0) -= amount;
            *self.issued.entry(asset).or_insert(0) -= amount;
        }
        *self.locked.entry(market).or_insert(0) -= amount;
        *self.balances.entry((owner, Asset::Collateral)).or_insert(0) += amount;
        Ok(())
    }
}

// ============================================================================
// ConstantProductAmm
// ============================================================================

/// Reserves of one (market, outcome) curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserves {
    pub collateral: u128,
    pub shares: u128,
}

/// `x * y = k` market maker between collateral and one outcome token,
/// charging `fee_bps` on the input:
///
/// ```text
/// out = in * (10000 - fee) * reserve_out / (reserve_in * 10000 + in * (10000 - fee))
/// ```
#[derive(Debug)]
pub struct ConstantProductAmm {
    account: AccountId,
    fee_bps: u16,
    curves: HashMap<(MarketId, Outcome), Reserves>,
}

impl ConstantProductAmm {
    /// # Errors
    /// `Configuration` when `fee_bps` is not below 10000.
    pub fn new(account: AccountId, fee_bps: u16) -> Result<Self> {
        if u128::from(fee_bps) >= BPS_DENOMINATOR {
            return Err(PoolbookError::Configuration(format!(
                "AMM fee {fee_bps} bps must be below 10000"
            )));
        }
        Ok(Self {
            account,
            fee_bps,
            curves: HashMap::new(),
        })
    }

    #[must_use]
    pub fn fee_bps(&self) -> u16 {
        self.fee_bps
    }

    #[must_use]
    pub fn reserves(&self, market: MarketId, outcome: Outcome) -> Reserves {
        self.curves.get(&(market, outcome)).copied().unwrap_or_default()
    }

    /// Add liquidity to a curve and fund the AMM's vault account with it.
    pub fn seed(
        &mut self,
        vault: &mut MemoryVault,
        market: MarketId,
        outcome: Outcome,
        collateral: u128,
        shares: u128,
    ) {
        let token = vault.share_token(market, outcome);
        vault.credit(self.account, Asset::Collateral, collateral);
        vault.credit(self.account, Asset::Shares(token), shares);
        let curve = self.curves.entry((market, outcome)).or_default();
        curve.collateral += collateral;
        curve.shares += shares;
    }

    fn output(&self, reserves: Reserves, side: SwapSide, amount_in: u128) -> Result<u128> {
        let (reserve_in, reserve_out) = match side {
            SwapSide::Buy => (reserves.collateral, reserves.shares),
            SwapSide::Sell => (reserves.shares, reserves.collateral),
        };
        if reserve_in == 0 || reserve_out == 0 || amount_in == 0 {
            return Ok(0);
        }
        let net_bps = BPS_DENOMINATOR - u128::from(self.fee_bps);
        let in_with_fee = amount_in
            .checked_mul(net_bps)
            .ok_or(PoolbookError::Overflow { context: "amm input" })?;
        let denominator = reserve_in
            .checked_mul(BPS_DENOMINATOR)
            .and_then(|scaled| scaled.checked_add(in_with_fee))
            .ok_or(PoolbookError::Overflow { context: "amm denominator" })?;
        math::mul_div(in_with_fee, reserve_out, denominator, Rounding::Down, "amm output")
    }
}

impl FallbackAmm for ConstantProductAmm {
    fn account(&self) -> AccountId {
        self.account
    }

    fn quote(&self, market: MarketId, outcome: Outcome, side: SwapSide, amount_in: u128) -> Result<u128> {
        self.output(self.reserves(market, outcome), side, amount_in)
    }

    fn swap(
        &mut self,
        market: MarketId,
        outcome: Outcome,
        side: SwapSide,
        amount_in: u128,
        min_out: u128,
    ) -> Result<u128> {
        let reserves = self.reserves(market, outcome);
        let out = self.output(reserves, side, amount_in)?;
        if out == 0 {
            return Err(PoolbookError::AmmSwapFailed {
                reason: format!("no output for {amount_in} in on {market}/{outcome}"),
            });
        }
        if out < min_out {
            return Err(PoolbookError::AmmSwapFailed {
                reason: format!("output {out} below minimum {min_out}"),
            });
        }

        let curve = self.curves.entry((market, outcome)).or_default();
        match side {
            SwapSide::Buy => {
                curve.collateral += amount_in;
                curve.shares -= out;
            }
            SwapSide::Sell => {
                curve.shares += amount_in;
                curve.collateral -= out;
            }
        }
        tracing::debug!(
            market = %market,
            outcome = %outcome,
            side = ?side,
            amount_in,
            amount_out = out,
            "AMM swap executed"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_moves_and_rejects_overdraft() {
        let mut vault = MemoryVault::new();
        let alice = AccountId::new();
        let bob = AccountId::new();
        vault.credit(alice, Asset::Collateral, 100);
        vault.transfer_collateral(alice, bob, 40).unwrap();
        assert_eq!(vault.collateral_balance(alice), 60);
        assert_eq!(vault.collateral_balance(bob), 40);

        let err = vault.transfer_collateral(bob, alice, 41).unwrap_err();
        assert!(matches!(err, PoolbookError::TransferFailed { .. }));
        assert_eq!(vault.collateral_balance(bob), 40);
        vault.verify_supply(Asset::Collateral).unwrap();
    }

    #[test]
    fn tokens_pair_up() {
        let vault = MemoryVault::new();
        let yes = vault.share_token(MarketId(9), Outcome::Yes);
        let no = vault.share_token(MarketId(9), Outcome::No);
        assert_ne!(yes, no);
        assert_eq!(vault.paired_token(yes), no);
        assert_eq!(vault.paired_token(no), yes);
        assert_ne!(yes, vault.share_token(MarketId(10), Outcome::Yes));
    }

    #[test]
    fn mint_and_burn_conserve_supply() {
        let mut vault = MemoryVault::new();
        let market = MarketId(1);
        let alice = AccountId::new();
        vault.credit(alice, Asset::Collateral, 50);
        vault.mint_pair(market, alice, 30).unwrap();

        let yes = vault.share_token(market, Outcome::Yes);
        assert_eq!(vault.collateral_balance(alice), 20);
        assert_eq!(vault.share_balance(alice, yes), 30);
        assert_eq!(vault.locked_collateral(market), 30);
        vault.verify_supply(Asset::Collateral).unwrap();
        vault.verify_supply(Asset::Shares(yes)).unwrap();

        vault.burn_pair(market, alice, 30).unwrap();
        assert_eq!(vault.collateral_balance(alice), 50);
        assert_eq!(vault.share_balance(alice, yes), 0);
        vault.verify_supply(Asset::Collateral).unwrap();

        assert!(matches!(
            vault.mint_pair(market, alice, 51),
            Err(PoolbookError::MintFailed { .. })
        ));
    }

    #[test]
    fn amm_quote_matches_formula() {
        let mut vault = MemoryVault::new();
        let mut amm = ConstantProductAmm::new(AccountId::new(), 30).unwrap();
        amm.seed(&mut vault, MarketId(1), Outcome::Yes, 10_000, 10_000);
        // 1000 * 9970 * 10000 / (10000 * 10000 + 1000 * 9970) = 906.6...
        let out = amm.quote(MarketId(1), Outcome::Yes, SwapSide::Buy, 1_000).unwrap();
        assert_eq!(out, 906);
    }

    #[test]
    fn amm_swap_updates_reserves_and_honours_min_out() {
        let mut vault = MemoryVault::new();
        let mut amm = ConstantProductAmm::new(AccountId::new(), 0).unwrap();
        amm.seed(&mut vault, MarketId(1), Outcome::Yes, 1_000, 1_000);

        let err = amm
            .swap(MarketId(1), Outcome::Yes, SwapSide::Buy, 1_000, 501)
            .unwrap_err();
        assert!(matches!(err, PoolbookError::AmmSwapFailed { .. }));
        assert_eq!(amm.reserves(MarketId(1), Outcome::Yes).shares, 1_000);

        let out = amm
            .swap(MarketId(1), Outcome::Yes, SwapSide::Buy, 1_000, 500)
            .unwrap();
        assert_eq!(out, 500);
        let r = amm.reserves(MarketId(1), Outcome::Yes);
        assert_eq!(r.collateral, 2_000);
        assert_eq!(r.shares, 500);
    }

    #[test]
    fn empty_curve_quotes_zero() {
        let amm = ConstantProductAmm::new(AccountId::new(), 30).unwrap();
        assert_eq!(
            amm.quote(MarketId(5), Outcome::No, SwapSide::Sell, 100).unwrap(),
            0
        );
        assert!(ConstantProductAmm::new(AccountId::new(), 10_000).is_err());
    }
}
