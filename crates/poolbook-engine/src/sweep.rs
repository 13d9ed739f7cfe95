//! Multi-level sweeps across resting pools, with an AMM fallback leg.
//!
//! # Algorithm (buy side)
//!
//! 1. Start at the lowest active ask level of the book.
//! 2. Stop when no level is left, the level is above `max_price`, demand is
//!    met, the budget is spent, or `max_levels_per_sweep` levels were seen.
//! 3. At each level fill `min(remaining demand, inventory, affordable)`
//!    shares; the cost is rounded up in the makers' favour.
//! 4. Advance to the next active level strictly above.
//! 5. Hand any remainder to the AMM in one call, sized so the leg neither
//!    overshoots demand nor averages above `max_price`.
//!
//! The sell side walks bid levels downward from the highest, bounded by
//! `min_price`, and its AMM leg must average at least `min_price`. A bid
//! level too thin to pay anything for the shares it could take is stepped
//! over. Slippage is checked once, against the aggregate of pool fills and
//! the AMM leg. Planning only stages ledger changes in a [`BookTxn`];
//! nothing is committed here.

use chrono::{DateTime, Utc};
use poolbook_ledger::BookTxn;
use poolbook_types::math::{self, Rounding};
use poolbook_types::{
    AccountId, EngineConfig, MarketId, Outcome, PoolKey, PoolbookError, Price, Result,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::adapters::{FallbackAmm, SwapSide};

// ============================================================================
// Orders
// ============================================================================

/// Buy outcome shares with collateral, sweeping ask pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyOrder {
    pub taker: AccountId,
    pub market: MarketId,
    pub outcome: Outcome,
    /// Most shares wanted; `u128::MAX` for "as many as the budget buys".
    pub max_shares: u128,
    /// Highest ask level to take from.
    pub max_price: Price,
    /// Collateral the taker is willing to spend.
    pub budget: u128,
    /// Fewest shares acceptable, pools and AMM combined.
    pub min_out: u128,
    pub deadline: Option<DateTime<Utc>>,
}

/// Sell outcome shares for collateral, sweeping bid pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellOrder {
    pub taker: AccountId,
    pub market: MarketId,
    pub outcome: Outcome,
    pub shares_in: u128,
    /// Lowest bid level to sell into.
    pub min_price: Price,
    /// Least collateral acceptable, pools and AMM combined.
    pub min_out: u128,
    pub deadline: Option<DateTime<Utc>>,
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TakerSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquiditySource {
    Pools,
    Amm,
}

/// One level's contribution to a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelFill {
    pub price: Price,
    pub shares: u128,
    pub collateral: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmmLeg {
    pub amount_in: u128,
    pub amount_out: u128,
}

/// Outcome of a sweep, or of a dry run when `executed_at` is `None`.
///
/// For buys `filled` is shares received and `spent` is collateral paid;
/// for sells `filled` is collateral received and `spent` is shares sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub market: MarketId,
    pub outcome: Outcome,
    pub side: TakerSide,
    pub fills: Vec<LevelFill>,
    pub amm: Option<AmmLeg>,
    pub filled: u128,
    pub spent: u128,
    pub levels_touched: usize,
    /// Collateral per share in bps, across pools and AMM.
    pub average_price_bps: Option<Decimal>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl SweepReport {
    #[must_use]
    pub fn pool_shares(&self) -> u128 {
        self.fills.iter().map(|f| f.shares).sum()
    }

    #[must_use]
    pub fn pool_collateral(&self) -> u128 {
        self.fills.iter().map(|f| f.collateral).sum()
    }

    #[must_use]
    pub fn amm_routed(&self) -> u128 {
        self.amm.map_or(0, |leg| leg.amount_in)
    }

    #[must_use]
    pub fn sources(&self) -> Vec<LiquiditySource> {
        let mut sources = Vec::with_capacity(2);
        if !self.fills.is_empty() {
            sources.push(LiquiditySource::Pools);
        }
        if self.amm.is_some() {
            sources.push(LiquiditySource::Amm);
        }
        sources
    }

    /// Recompute the aggregates after the AMM leg settled.
    pub(crate) fn settle_amm(&mut self, amount_out: u128) {
        if let Some(leg) = self.amm.as_mut() {
            leg.amount_out = amount_out;
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        let (amm_in, amm_out) = self.amm.map_or((0, 0), |l| (l.amount_in, l.amount_out));
        let (shares, collateral) = match self.side {
            TakerSide::Buy => {
                self.filled = self.pool_shares() + amm_out;
                self.spent = self.pool_collateral() + amm_in;
                (self.filled, self.spent)
            }
            TakerSide::Sell => {
                self.filled = self.pool_collateral() + amm_out;
                self.spent = self.pool_shares() + amm_in;
                (self.spent, self.filled)
            }
        };
        self.levels_touched = self.fills.len();
        self.average_price_bps = average_price_bps(collateral, shares);
    }
}

fn to_decimal(value: u128) -> Option<Decimal> {
    Decimal::try_from_i128_with_scale(i128::try_from(value).ok()?, 0).ok()
}

fn average_price_bps(collateral: u128, shares: u128) -> Option<Decimal> {
    if shares == 0 {
        return None;
    }
    to_decimal(collateral)?
        .checked_mul(Decimal::new(10_000, 0))?
        .checked_div(to_decimal(shares)?)
}

// ============================================================================
// Planning
// ============================================================================

/// Stage the pool fills of a buy and size the AMM leg from a quote.
pub(crate) fn plan_buy<A: FallbackAmm>(
    txn: &mut BookTxn<'_>,
    amm: &A,
    config: &EngineConfig,
    order: &BuyOrder,
) -> Result<SweepReport> {
    if order.budget == 0 {
        return Err(PoolbookError::zero_amount("budget"));
    }
    if order.max_shares == 0 {
        return Err(PoolbookError::zero_amount("max_shares"));
    }

    let book = PoolKey::ask(order.market, order.outcome, Price::MIN).book_key();
    let mut demand = order.max_shares;
    let mut budget = order.budget;
    let mut fills = Vec::new();
    let mut visited = 0;
    let mut cursor = txn.index().best_at_or_above(&book, Price::MIN.bps());

    while let Some(price) = cursor {
        if price > order.max_price || demand == 0 || budget == 0 {
            break;
        }
        if visited >= config.max_levels_per_sweep {
            tracing::debug!(visited, "Sweep level bound reached");
            break;
        }
        visited += 1;

        let key = PoolKey::ask(order.market, order.outcome, price);
        if let Some(pool) = txn.pool(&key) {
            let affordable = math::collateral_to_shares(budget, price)?;
            let shares = demand.min(pool.inventory).min(affordable);
            if shares == 0 {
                // Higher levels only cost more.
                break;
            }
            let cost = math::shares_to_collateral(shares, price, Rounding::Up)?;
            txn.fill(key, shares, cost)?;
            tracing::debug!(pool = %key, shares, cost, "Ask level filled");

            fills.push(LevelFill {
                price,
                shares,
                collateral: cost,
            });
            demand -= shares;
            budget -= cost;
        }
        cursor = price
            .next_up()
            .and_then(|next| txn.index().best_at_or_above(&book, next.bps()));
    }

    let amm_leg = if config.amm_fallback && demand > 0 && budget > 0 {
        size_buy_leg(amm, order, budget, demand)?
    } else {
        None
    };

    Ok(report(order.market, order.outcome, TakerSide::Buy, fills, amm_leg))
}

/// Stage the pool fills of a sell and size the AMM leg from a quote.
pub(crate) fn plan_sell<A: FallbackAmm>(
    txn: &mut BookTxn<'_>,
    amm: &A,
    config: &EngineConfig,
    order: &SellOrder,
) -> Result<SweepReport> {
    if order.shares_in == 0 {
        return Err(PoolbookError::zero_amount("shares_in"));
    }

    let book = PoolKey::bid(order.market, order.outcome, Price::MAX).book_key();
    let mut remaining = order.shares_in;
    let mut fills = Vec::new();
    let mut visited = 0;
    let mut cursor = txn.index().best_at_or_below(&book, Price::MAX.bps());

    while let Some(price) = cursor {
        if price < order.min_price || remaining == 0 {
            break;
        }
        if visited >= config.max_levels_per_sweep {
            tracing::debug!(visited, "Sweep level bound reached");
            break;
        }
        visited += 1;

        let key = PoolKey::bid(order.market, order.outcome, price);
        if let Some(pool) = txn.pool(&key) {
            let capacity = math::collateral_to_shares(pool.inventory, price)?;
            let shares = remaining.min(capacity);
            let payout = math::shares_to_collateral(shares, price, Rounding::Down)?;
            if payout > 0 {
                txn.fill(key, payout, shares)?;
                tracing::debug!(pool = %key, shares, payout, "Bid level filled");

                fills.push(LevelFill {
                    price,
                    shares,
                    collateral: payout,
                });
                remaining -= shares;
            } else if shares == remaining {
                // Lower levels only pay less for the same shares.
                break;
            } else {
                tracing::debug!(pool = %key, inventory = pool.inventory, "Dust bid level skipped");
            }
        }
        cursor = price
            .next_down()
            .and_then(|next| txn.index().best_at_or_below(&book, next.bps()));
    }

    let amm_leg = if config.amm_fallback && remaining > 0 {
        size_sell_leg(amm, order, remaining)?
    } else {
        None
    };

    Ok(report(order.market, order.outcome, TakerSide::Sell, fills, amm_leg))
}

/// Largest collateral input whose quoted output stays within `demand` and
/// averages no more than `max_price` per share.
fn size_buy_leg<A: FallbackAmm>(
    amm: &A,
    order: &BuyOrder,
    budget: u128,
    demand: u128,
) -> Result<Option<AmmLeg>> {
    let quote = |amount: u128| amm.quote(order.market, order.outcome, SwapSide::Buy, amount);

    let amount_in = largest_fitting(budget, |amount| {
        let out = quote(amount)?;
        // amount / out <= max_price / 10000, in integers.
        let ceiling = math::shares_to_collateral(out, order.max_price, Rounding::Down)?;
        Ok(out > 0 && out <= demand && amount <= ceiling)
    })?;
    if amount_in == 0 {
        tracing::debug!(budget, demand, "No AMM leg within the price limit");
        return Ok(None);
    }
    Ok(Some(AmmLeg {
        amount_in,
        amount_out: quote(amount_in)?,
    }))
}

/// Largest share input whose quoted collateral averages at least
/// `min_price` per share.
fn size_sell_leg<A: FallbackAmm>(amm: &A, order: &SellOrder, remaining: u128) -> Result<Option<AmmLeg>> {
    let quote = |amount: u128| amm.quote(order.market, order.outcome, SwapSide::Sell, amount);

    let amount_in = largest_fitting(remaining, |amount| {
        let out = quote(amount)?;
        // out / amount >= min_price / 10000, in integers.
        let floor = math::shares_to_collateral(amount, order.min_price, Rounding::Up)?;
        Ok(out > 0 && out >= floor)
    })?;
    if amount_in == 0 {
        tracing::debug!(remaining, "No AMM leg within the price limit");
        return Ok(None);
    }
    Ok(Some(AmmLeg {
        amount_in,
        amount_out: quote(amount_in)?,
    }))
}

/// Binary search for the largest input in `0..=cap` that `fits`, assuming
/// larger inputs fit no better than smaller ones. Zero means none fit; any
/// non-zero result has been checked.
fn largest_fitting(cap: u128, mut fits: impl FnMut(u128) -> Result<bool>) -> Result<u128> {
    if cap == 0 || fits(cap)? {
        return Ok(cap);
    }
    let (mut lo, mut hi) = (0u128, cap - 1);
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if fits(mid)? {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    Ok(lo)
}

fn report(
    market: MarketId,
    outcome: Outcome,
    side: TakerSide,
    fills: Vec<LevelFill>,
    amm: Option<AmmLeg>,
) -> SweepReport {
    let mut report = SweepReport {
        market,
        outcome,
        side,
        fills,
        amm,
        filled: 0,
        spent: 0,
        levels_touched: 0,
        average_price_bps: None,
        executed_at: None,
    };
    report.recompute();
    report
}

/// Aggregate slippage check.
pub(crate) fn check_min_out(report: &SweepReport, min_out: u128) -> Result<()> {
    if report.filled < min_out {
        tracing::warn!(
            market = %report.market,
            outcome = %report.outcome,
            side = ?report.side,
            min_out,
            actual = report.filled,
            "Sweep rejected: slippage bound"
        );
        return Err(PoolbookError::SlippageExceeded {
            min_out,
            actual: report.filled,
        });
    }
    Ok(())
}
