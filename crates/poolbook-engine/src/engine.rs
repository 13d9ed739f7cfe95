//! The pooled order engine: every public operation of PoolBook.
//!
//! # Operation lifecycle
//!
//! Each mutating entry point runs the same five steps:
//!
//! 1. Enter the [`ReentrancyGuard`]; a collaborator calling back in fails here.
//! 2. Check the caller's deadline.
//! 3. Stage ledger changes in a [`BookTxn`] (validation happens here).
//! 4. Move tokens through the vault (and AMM) via a [`Settlement`]; any
//!    failure rolls the executed legs back and drops the staged changes.
//! 5. Apply the staged changes to the [`PoolBook`].
//!
//! Entry points take `&self`. Interior mutability keeps the book, vault and
//! AMM separately borrowable, so a reentrant call reaches the guard and is
//! rejected instead of tripping a borrow panic.

use std::cell::{Ref, RefCell};

use chrono::{DateTime, Utc};
use poolbook_ledger::{BookTxn, DepositReceipt, LevelDepth, PoolBook, WithdrawReceipt};
use poolbook_types::{
    AccountId, EngineConfig, MarketId, Outcome, PoolKey, PoolKind, PoolbookError, Price, Result,
    TokenId,
};
use serde::{Deserialize, Serialize};

use crate::adapters::{Asset, FallbackAmm, OutcomeVault, SwapSide};
use crate::guard::ReentrancyGuard;
use crate::migration::{self, MigrationReceipt};
use crate::settlement::Settlement;
use crate::sweep::{self, BuyOrder, SellOrder, SweepReport};

// ============================================================================
// Views and receipts
// ============================================================================

/// Read view of one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolView {
    pub key: PoolKey,
    /// Unsold shares (asks) or unspent collateral (bids).
    pub inventory: u128,
    pub total_shares: u128,
    pub acc_per_unit: u128,
    pub earned: u128,
    /// Whether the price index lists this level.
    pub active: bool,
}

/// Read view of one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionView {
    pub key: PoolKey,
    pub owner: AccountId,
    pub ownership: u128,
    pub debt: u128,
    pub pending: u128,
}

/// Outcome of [`PoolEngine::mint_and_deposit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintDepositReceipt {
    /// Pairs minted from the caller's collateral.
    pub minted: u128,
    /// Token now in the ask pool.
    pub deposited_token: TokenId,
    /// Opposite token, left with the caller.
    pub kept_token: TokenId,
    pub deposit: DepositReceipt,
}

// ============================================================================
// Engine
// ============================================================================

pub struct PoolEngine<V: OutcomeVault, A: FallbackAmm> {
    config: EngineConfig,
    /// Vault account holding all pooled inventory and unclaimed proceeds.
    custody: AccountId,
    book: RefCell<PoolBook>,
    vault: RefCell<V>,
    amm: RefCell<A>,
    guard: ReentrancyGuard,
}

impl<V: OutcomeVault, A: FallbackAmm> PoolEngine<V, A> {
    /// # Errors
    /// `Configuration` when `config` does not validate.
    pub fn new(config: EngineConfig, vault: V, amm: A) -> Result<Self> {
        Self::with_custody(config, vault, amm, AccountId::new())
    }

    /// Like [`PoolEngine::new`] with a caller-chosen custody account.
    pub fn with_custody(config: EngineConfig, vault: V, amm: A, custody: AccountId) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            custody = %custody,
            amm_fallback = config.amm_fallback,
            max_levels = config.max_levels_per_sweep,
            "Pool engine started"
        );
        Ok(Self {
            config,
            custody,
            book: RefCell::new(PoolBook::new()),
            vault: RefCell::new(vault),
            amm: RefCell::new(amm),
            guard: ReentrancyGuard::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn custody(&self) -> AccountId {
        self.custody
    }

    /// Borrow the vault.
    ///
    /// # Panics
    /// If called from inside a vault callback.
    pub fn vault(&self) -> Ref<'_, V> {
        self.vault.borrow()
    }

    /// Borrow the AMM.
    ///
    /// # Panics
    /// If called from inside an AMM callback.
    pub fn amm(&self) -> Ref<'_, A> {
        self.amm.borrow()
    }

    /// Exclusive access to the vault and AMM outside any pool operation,
    /// e.g. to fund accounts or seed AMM reserves.
    ///
    /// # Errors
    /// `Reentrancy` when called while an operation is in flight.
    pub fn with_collaborators<R>(&self, f: impl FnOnce(&mut V, &mut A) -> R) -> Result<R> {
        let _entered = self.guard.enter()?;
        let mut vault = self.vault.try_borrow_mut().map_err(|_| PoolbookError::Reentrancy)?;
        let mut amm = self.amm.try_borrow_mut().map_err(|_| PoolbookError::Reentrancy)?;
        Ok(f(&mut vault, &mut amm))
    }

    // =================================================================
    // Maker operations
    // =================================================================

    /// Deposit inventory into the pool at `key`: shares into an ask pool,
    /// collateral into a bid pool. Proceeds realized on a top-up are paid
    /// out in the same operation.
    pub fn deposit(
        &self,
        owner: AccountId,
        key: PoolKey,
        amount: u128,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<DepositReceipt> {
        let receipt = self.execute(
            deadline,
            |txn| {
                self.check_min_deposit(amount)?;
                txn.deposit(key, owner, amount)
            },
            |receipt, s| {
                let (inventory, proceeds) = assets(s.vault(), &key);
                s.transfer(inventory, owner, self.custody, amount)?;
                s.transfer(proceeds, self.custody, owner, receipt.realized)
            },
        )?;
        tracing::info!(
            pool = %key,
            owner = %owner,
            amount,
            realized = receipt.realized,
            "Deposit accepted"
        );
        Ok(receipt)
    }

    /// Offer `shares` of `outcome` at `price`.
    pub fn deposit_asks(
        &self,
        owner: AccountId,
        market: MarketId,
        outcome: Outcome,
        price: Price,
        shares: u128,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<DepositReceipt> {
        self.deposit(owner, PoolKey::ask(market, outcome, price), shares, deadline)
    }

    /// Offer `collateral` to buy `outcome` at `price`.
    pub fn deposit_bids(
        &self,
        owner: AccountId,
        market: MarketId,
        outcome: Outcome,
        price: Price,
        collateral: u128,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<DepositReceipt> {
        self.deposit(owner, PoolKey::bid(market, outcome, price), collateral, deadline)
    }

    /// Pay out pending proceeds: collateral from asks, shares from bids.
    pub fn claim(&self, owner: AccountId, key: PoolKey, deadline: Option<DateTime<Utc>>) -> Result<u128> {
        let owed = self.execute(
            deadline,
            |txn| txn.claim(key, owner),
            |owed, s| {
                let (_, proceeds) = assets(s.vault(), &key);
                s.transfer(proceeds, self.custody, owner, *owed)
            },
        )?;
        tracing::info!(pool = %key, owner = %owner, owed, "Proceeds claimed");
        Ok(owed)
    }

    /// Take back up to `amount` of unsold inventory, auto-claiming first.
    pub fn withdraw(
        &self,
        owner: AccountId,
        key: PoolKey,
        amount: u128,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<WithdrawReceipt> {
        let receipt = self.execute(
            deadline,
            |txn| {
                let receipt = txn.withdraw(key, owner, amount)?;
                if receipt.returned == 0 && receipt.burned == 0 && receipt.realized == 0 {
                    return Err(PoolbookError::InsufficientLiquidity {
                        requested: amount,
                        available: 0,
                    });
                }
                Ok(receipt)
            },
            |receipt, s| {
                let (inventory, proceeds) = assets(s.vault(), &key);
                s.transfer(inventory, self.custody, owner, receipt.returned)?;
                s.transfer(proceeds, self.custody, owner, receipt.realized)
            },
        )?;
        tracing::info!(
            pool = %key,
            owner = %owner,
            returned = receipt.returned,
            burned = receipt.burned,
            realized = receipt.realized,
            "Withdrawal processed"
        );
        Ok(receipt)
    }

    /// Leave a sold-out pool, collecting whatever is still owed.
    pub fn exit_depleted(&self, owner: AccountId, key: PoolKey, deadline: Option<DateTime<Utc>>) -> Result<u128> {
        let owed = self.execute(
            deadline,
            |txn| txn.exit_depleted(key, owner),
            |owed, s| {
                let (_, proceeds) = assets(s.vault(), &key);
                s.transfer(proceeds, self.custody, owner, *owed)
            },
        )?;
        tracing::info!(pool = %key, owner = %owner, owed, "Exited depleted pool");
        Ok(owed)
    }

    /// Move up to `amount` of a position at `from` to price `to` in the
    /// same book. Realized proceeds are paid out, not re-deposited.
    pub fn migrate(
        &self,
        owner: AccountId,
        from: PoolKey,
        to: Price,
        amount: u128,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<MigrationReceipt> {
        let receipt = self.execute(
            deadline,
            |txn| migration::stage(txn, owner, from, to, amount),
            |receipt, s| {
                let (_, proceeds) = assets(s.vault(), &from);
                s.transfer(proceeds, self.custody, owner, receipt.realized)
            },
        )?;
        tracing::info!(
            from = %receipt.from,
            to = %receipt.to,
            owner = %owner,
            moved = receipt.moved,
            realized = receipt.realized,
            "Position migrated"
        );
        Ok(receipt)
    }

    /// Mint a YES/NO pair from `collateral`, deposit the `sell` side into
    /// the ask pool at `price`, and leave the other side with the caller.
    pub fn mint_and_deposit(
        &self,
        owner: AccountId,
        market: MarketId,
        sell: Outcome,
        price: Price,
        collateral: u128,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<MintDepositReceipt> {
        let key = PoolKey::ask(market, sell, price);
        let (deposited_token, kept_token) = {
            let vault = self.vault.try_borrow().map_err(|_| PoolbookError::Reentrancy)?;
            let token = vault.share_token(market, sell);
            (token, vault.paired_token(token))
        };

        let deposit = self.execute(
            deadline,
            |txn| {
                self.check_min_deposit(collateral)?;
                txn.deposit(key, owner, collateral)
            },
            |receipt, s| {
                s.mint_pair(market, owner, collateral)?;
                s.transfer(Asset::Shares(deposited_token), owner, self.custody, collateral)?;
                s.transfer(Asset::Collateral, self.custody, owner, receipt.realized)
            },
        )?;
        tracing::info!(
            pool = %key,
            owner = %owner,
            minted = collateral,
            "Minted pair and deposited one side"
        );
        Ok(MintDepositReceipt {
            minted: collateral,
            deposited_token,
            kept_token,
            deposit,
        })
    }

    // =================================================================
    // Taker operations
    // =================================================================

    /// Buy shares by sweeping ask levels up to `order.max_price`, then the AMM.
    pub fn buy(&self, order: &BuyOrder) -> Result<SweepReport> {
        let report = self.execute(
            order.deadline,
            |txn| {
                let amm = self.amm.try_borrow().map_err(|_| PoolbookError::Reentrancy)?;
                let report = sweep::plan_buy(txn, &*amm, &self.config, order)?;
                require_liquidity(&report)?;
                sweep::check_min_out(&report, order.min_out)?;
                Ok(report)
            },
            |report, s| {
                let shares = Asset::Shares(s.vault().share_token(order.market, order.outcome));
                s.transfer(Asset::Collateral, order.taker, self.custody, report.spent)?;
                if let Some(leg) = report.amm {
                    let leg_min = order.min_out.saturating_sub(report.pool_shares());
                    let out = self.swap_leg(s, order.market, order.outcome, SwapSide::Buy, leg.amount_in, leg_min)?;
                    report.settle_amm(out);
                    sweep::check_min_out(report, order.min_out)?;
                }
                s.transfer(shares, self.custody, order.taker, report.filled)
            },
        )?;
        Ok(self.finish_sweep(report))
    }

    /// Sell shares by sweeping bid levels down to `order.min_price`, then the AMM.
    pub fn sell(&self, order: &SellOrder) -> Result<SweepReport> {
        let report = self.execute(
            order.deadline,
            |txn| {
                let amm = self.amm.try_borrow().map_err(|_| PoolbookError::Reentrancy)?;
                let report = sweep::plan_sell(txn, &*amm, &self.config, order)?;
                require_liquidity(&report)?;
                sweep::check_min_out(&report, order.min_out)?;
                Ok(report)
            },
            |report, s| {
                let shares = Asset::Shares(s.vault().share_token(order.market, order.outcome));
                s.transfer(shares, order.taker, self.custody, report.spent)?;
                if let Some(leg) = report.amm {
                    let leg_min = order.min_out.saturating_sub(report.pool_collateral());
                    let out = self.swap_leg(s, order.market, order.outcome, SwapSide::Sell, leg.amount_in, leg_min)?;
                    report.settle_amm(out);
                    sweep::check_min_out(report, order.min_out)?;
                }
                s.transfer(Asset::Collateral, self.custody, order.taker, report.filled)
            },
        )?;
        Ok(self.finish_sweep(report))
    }

    /// Dry run of [`PoolEngine::buy`]; nothing is staged or moved.
    pub fn quote_buy(&self, order: &BuyOrder) -> Result<SweepReport> {
        let book = self.book.try_borrow().map_err(|_| PoolbookError::Reentrancy)?;
        let amm = self.amm.try_borrow().map_err(|_| PoolbookError::Reentrancy)?;
        let mut txn = book.begin();
        sweep::plan_buy(&mut txn, &*amm, &self.config, order)
    }

    /// Dry run of [`PoolEngine::sell`]; nothing is staged or moved.
    pub fn quote_sell(&self, order: &SellOrder) -> Result<SweepReport> {
        let book = self.book.try_borrow().map_err(|_| PoolbookError::Reentrancy)?;
        let amm = self.amm.try_borrow().map_err(|_| PoolbookError::Reentrancy)?;
        let mut txn = book.begin();
        sweep::plan_sell(&mut txn, &*amm, &self.config, order)
    }

    // =================================================================
    // Views
    // =================================================================

    #[must_use]
    pub fn pool(&self, key: &PoolKey) -> Option<PoolView> {
        let book = self.book.borrow();
        book.pool(key).map(|pool| PoolView {
            key: *key,
            inventory: pool.inventory,
            total_shares: pool.total_shares,
            acc_per_unit: pool.acc_per_unit,
            earned: pool.earned,
            active: book.is_active(key),
        })
    }

    pub fn position(&self, key: &PoolKey, owner: AccountId) -> Result<Option<PositionView>> {
        let book = self.book.borrow();
        let Some(position) = book.position(key, owner) else {
            return Ok(None);
        };
        Ok(Some(PositionView {
            key: *key,
            owner,
            ownership: position.ownership,
            debt: position.debt,
            pending: book.pending(key, owner)?,
        }))
    }

    pub fn pending(&self, key: &PoolKey, owner: AccountId) -> Result<u128> {
        self.book.borrow().pending(key, owner)
    }

    /// Active levels of the book `key` belongs to, best first.
    #[must_use]
    pub fn depth(&self, key: &PoolKey, max_levels: usize) -> Vec<LevelDepth> {
        self.book.borrow().depth(key, max_levels)
    }

    #[must_use]
    pub fn best_ask(&self, market: MarketId, outcome: Outcome) -> Option<Price> {
        self.book
            .borrow()
            .lowest_active(&PoolKey::ask(market, outcome, Price::MIN))
    }

    #[must_use]
    pub fn best_bid(&self, market: MarketId, outcome: Outcome) -> Option<Price> {
        self.book
            .borrow()
            .highest_active(&PoolKey::bid(market, outcome, Price::MAX))
    }

    // =================================================================
    // Internals
    // =================================================================

    fn execute<T>(
        &self,
        deadline: Option<DateTime<Utc>>,
        stage: impl FnOnce(&mut BookTxn<'_>) -> Result<T>,
        settle: impl FnOnce(&mut T, &mut Settlement<'_, V>) -> Result<()>,
    ) -> Result<T> {
        let _entered = self.guard.enter()?;
        check_deadline(deadline)?;

        let (mut value, changes) = {
            let book = self.book.borrow();
            let mut txn = book.begin();
            let value = stage(&mut txn)?;
            (value, txn.into_changeset())
        };

        {
            let mut vault = self.vault.borrow_mut();
            Settlement::new(&mut *vault).run(|s| settle(&mut value, s))?;
        }

        self.book.borrow_mut().apply(changes);
        Ok(value)
    }

    /// Route `amount_in` through the AMM and collect its output in custody.
    fn swap_leg(
        &self,
        s: &mut Settlement<'_, V>,
        market: MarketId,
        outcome: Outcome,
        side: SwapSide,
        amount_in: u128,
        min_out: u128,
    ) -> Result<u128> {
        let shares = Asset::Shares(s.vault().share_token(market, outcome));
        let (asset_in, asset_out) = match side {
            SwapSide::Buy => (Asset::Collateral, shares),
            SwapSide::Sell => (shares, Asset::Collateral),
        };
        let mut amm = self.amm.borrow_mut();
        let amm_account = amm.account();
        s.transfer(asset_in, self.custody, amm_account, amount_in)?;
        let out = amm.swap(market, outcome, side, amount_in, min_out).map_err(|err| {
            tracing::warn!(market = %market, outcome = %outcome, error = %err, "AMM leg failed");
            err
        })?;
        s.transfer(asset_out, amm_account, self.custody, out)?;
        Ok(out)
    }

    fn finish_sweep(&self, mut report: SweepReport) -> SweepReport {
        report.executed_at = Some(Utc::now());
        tracing::info!(
            market = %report.market,
            outcome = %report.outcome,
            side = ?report.side,
            filled = report.filled,
            spent = report.spent,
            levels = report.levels_touched,
            amm_in = report.amm_routed(),
            custody = %self.custody,
            "Sweep complete"
        );
        report
    }

    fn check_min_deposit(&self, amount: u128) -> Result<()> {
        if amount == 0 {
            return Err(PoolbookError::zero_amount("deposit"));
        }
        if amount < self.config.min_deposit {
            return Err(PoolbookError::InvalidAmount {
                reason: format!(
                    "deposit {amount} below minimum {}",
                    self.config.min_deposit
                ),
            });
        }
        Ok(())
    }
}

/// `(inventory asset, proceeds asset)` of the pool at `key`.
fn assets<V: OutcomeVault>(vault: &V, key: &PoolKey) -> (Asset, Asset) {
    let shares = Asset::Shares(vault.share_token(key.market, key.outcome));
    match key.kind {
        PoolKind::Ask => (shares, Asset::Collateral),
        PoolKind::Bid => (Asset::Collateral, shares),
    }
}

fn check_deadline(deadline: Option<DateTime<Utc>>) -> Result<()> {
    match deadline {
        Some(deadline) if Utc::now() > deadline => Err(PoolbookError::DeadlineExpired),
        _ => Ok(()),
    }
}

fn require_liquidity(report: &SweepReport) -> Result<()> {
    if report.fills.is_empty() && report.amm.is_none() {
        return Err(PoolbookError::NoLiquidity);
    }
    Ok(())
}
