//! Integration test: taker sweeps
//!
//! Resting pools are consumed in best-price order, the AMM absorbs what is
//! left within the order's price limit, and slippage is judged on the
//! aggregate. Tokens move through the
//! in-memory vault so every test can check balances on both sides.

use poolbook_engine::{
    Asset, BuyOrder, ConstantProductAmm, FallbackAmm, LiquiditySource, MemoryVault, OutcomeVault,
    PoolEngine, SellOrder, SwapSide, SweepReport,
};
use poolbook_types::*;
use rust_decimal::Decimal;

const MARKET: MarketId = MarketId(1);

fn p(bps: u16) -> Price {
    Price::new(bps).unwrap()
}

struct Desk {
    engine: PoolEngine<MemoryVault, ConstantProductAmm>,
    yes: TokenId,
}

impl Desk {
    fn new(amm_fee_bps: u16) -> Self {
        let vault = MemoryVault::new();
        let yes = vault.share_token(MARKET, Outcome::Yes);
        let amm = ConstantProductAmm::new(AccountId::new(), amm_fee_bps).unwrap();
        let engine = PoolEngine::new(EngineConfig::default(), vault, amm).unwrap();
        Self { engine, yes }
    }

    fn account(&self, shares: u128, collateral: u128) -> AccountId {
        let account = AccountId::new();
        let yes = self.yes;
        self.engine
            .with_collaborators(|vault, _| {
                vault.credit(account, Asset::Shares(yes), shares);
                vault.credit(account, Asset::Collateral, collateral);
            })
            .unwrap();
        account
    }

    fn seed_amm(&self, collateral: u128, shares: u128) {
        self.engine
            .with_collaborators(|vault, amm| amm.seed(vault, MARKET, Outcome::Yes, collateral, shares))
            .unwrap();
    }

    fn shares(&self, who: AccountId) -> u128 {
        self.engine.vault().share_balance(who, self.yes)
    }

    fn collateral(&self, who: AccountId) -> u128 {
        self.engine.vault().collateral_balance(who)
    }

    fn ask(&self, maker: AccountId, bps: u16, shares: u128) {
        self.engine
            .deposit_asks(maker, MARKET, Outcome::Yes, p(bps), shares, None)
            .unwrap();
    }

    fn bid(&self, maker: AccountId, bps: u16, collateral: u128) {
        self.engine
            .deposit_bids(maker, MARKET, Outcome::Yes, p(bps), collateral, None)
            .unwrap();
    }

    fn assert_conserved(&self) {
        let vault = self.engine.vault();
        vault.verify_supply(Asset::Collateral).unwrap();
        vault.verify_supply(Asset::Shares(self.yes)).unwrap();
    }
}

fn buy_order(taker: AccountId, max_shares: u128, max_price: u16, budget: u128, min_out: u128) -> BuyOrder {
    BuyOrder {
        taker,
        market: MARKET,
        outcome: Outcome::Yes,
        max_shares,
        max_price: p(max_price),
        budget,
        min_out,
        deadline: None,
    }
}

#[test]
fn sweep_two_levels_without_amm() {
    let desk = Desk::new(30);
    let cheap = desk.account(50, 0);
    let dear = desk.account(100, 0);
    let taker = desk.account(0, 1_000);
    desk.ask(cheap, 100, 50);
    desk.ask(dear, 150, 100);

    let report = desk.engine.buy(&buy_order(taker, 120, 150, 1_000, 120)).unwrap();

    assert_eq!(report.levels_touched, 2);
    assert_eq!(report.fills[0].price, p(100));
    assert_eq!(report.fills[0].shares, 50);
    assert_eq!(report.fills[1].price, p(150));
    assert_eq!(report.fills[1].shares, 70);
    assert_eq!(report.amm_routed(), 0);
    assert!(report.amm.is_none());
    assert_eq!(report.sources(), vec![LiquiditySource::Pools]);
    assert_eq!(report.filled, 120);
    // ceil(50 * 100 / 10000) + ceil(70 * 150 / 10000)
    assert_eq!(report.spent, 3);
    assert!(report.executed_at.is_some());

    assert_eq!(desk.shares(taker), 120);
    assert_eq!(desk.collateral(taker), 997);

    // Cheap level is sold out and leaves the index; the dear one remains.
    let cheap_key = PoolKey::ask(MARKET, Outcome::Yes, p(100));
    let dear_key = PoolKey::ask(MARKET, Outcome::Yes, p(150));
    assert!(!desk.engine.pool(&cheap_key).unwrap().active);
    assert_eq!(desk.engine.pool(&dear_key).unwrap().inventory, 30);
    assert_eq!(desk.engine.best_ask(MARKET, Outcome::Yes), Some(p(150)));

    assert_eq!(desk.engine.claim(cheap, cheap_key, None).unwrap(), 1);
    assert_eq!(desk.engine.claim(dear, dear_key, None).unwrap(), 2);
    desk.assert_conserved();
}

#[test]
fn remainder_routes_to_amm() {
    let desk = Desk::new(0);
    desk.seed_amm(4_000, 10_000);
    let maker = desk.account(100, 0);
    let taker = desk.account(0, 1_000);
    desk.ask(maker, 5_000, 100);

    let report = desk
        .engine
        .buy(&buy_order(taker, u128::MAX, 5_000, 1_000, 2_000))
        .unwrap();

    assert_eq!(report.pool_shares(), 100);
    assert_eq!(report.pool_collateral(), 50);
    let leg = report.amm.unwrap();
    assert_eq!(leg.amount_in, 950);
    // 950 * 10000 / (4000 + 950)
    assert_eq!(leg.amount_out, 1_919);
    assert_eq!(report.filled, 2_019);
    assert_eq!(report.spent, 1_000);
    assert_eq!(report.sources(), vec![LiquiditySource::Pools, LiquiditySource::Amm]);

    assert_eq!(desk.shares(taker), 2_019);
    assert_eq!(desk.collateral(taker), 0);
    let reserves = desk.engine.amm().reserves(MARKET, Outcome::Yes);
    assert_eq!(reserves.collateral, 4_950);
    assert_eq!(reserves.shares, 8_081);
    desk.assert_conserved();
}

#[test]
fn amm_leg_stops_at_the_price_limit() {
    let desk = Desk::new(0);
    desk.seed_amm(4_000, 10_000);
    let taker = desk.account(0, 3_000);

    // Past 1000 collateral in, the pool averages above 5000 bps.
    let report = desk.engine.buy(&buy_order(taker, u128::MAX, 5_000, 3_000, 0)).unwrap();

    let leg = report.amm.unwrap();
    assert_eq!(leg.amount_in, 1_000);
    assert_eq!(leg.amount_out, 2_000);
    assert_eq!(report.average_price_bps, Some(Decimal::new(5_000, 0)));
    assert_eq!(desk.collateral(taker), 2_000);
    assert_eq!(desk.shares(taker), 2_000);

    // A pool priced above the limit throughout gives no leg at all.
    let other = desk.account(0, 100);
    let err = desk.engine.buy(&buy_order(other, u128::MAX, 1_000, 100, 0)).unwrap_err();
    assert!(matches!(err, PoolbookError::NoLiquidity));
    assert_eq!(desk.collateral(other), 100);
    desk.assert_conserved();
}

#[test]
fn amm_leg_is_capped_by_remaining_demand() {
    let desk = Desk::new(0);
    desk.seed_amm(4_000, 10_000);
    let taker = desk.account(0, 1_000);

    let report = desk.engine.buy(&buy_order(taker, 100, 9_999, 1_000, 0)).unwrap();

    // 41 collateral would buy 101 shares; 40 buys 99.
    assert!(report.fills.is_empty());
    assert_eq!(report.filled, 99);
    assert_eq!(report.spent, 40);
    assert_eq!(report.sources(), vec![LiquiditySource::Amm]);
    assert_eq!(desk.collateral(taker), 960);
    desk.assert_conserved();
}

#[test]
fn amm_fallback_can_be_disabled() {
    let vault = MemoryVault::new();
    let yes = vault.share_token(MARKET, Outcome::Yes);
    let amm = ConstantProductAmm::new(AccountId::new(), 0).unwrap();
    let config = EngineConfig::from_json_str(r#"{"amm_fallback": false}"#).unwrap();
    let engine = PoolEngine::new(config, vault, amm).unwrap();
    let taker = AccountId::new();
    engine
        .with_collaborators(|vault, amm| {
            amm.seed(vault, MARKET, Outcome::Yes, 4_000, 10_000);
            vault.credit(taker, Asset::Collateral, 100);
        })
        .unwrap();

    let err = engine.buy(&buy_order(taker, 10, 9_999, 100, 0)).unwrap_err();
    assert!(matches!(err, PoolbookError::NoLiquidity));
    assert_eq!(engine.vault().share_balance(taker, yes), 0);
}

#[test]
fn aggregate_slippage_rejects_and_reverts() {
    let desk = Desk::new(30);
    let maker = desk.account(50, 0);
    let taker = desk.account(0, 1_000);
    desk.ask(maker, 100, 50);

    let err = desk.engine.buy(&buy_order(taker, 120, 150, 1_000, 120)).unwrap_err();
    assert!(matches!(
        err,
        PoolbookError::SlippageExceeded { min_out: 120, actual: 50 }
    ));

    // Nothing moved and the level is still fully stocked.
    assert_eq!(desk.collateral(taker), 1_000);
    assert_eq!(desk.shares(taker), 0);
    let key = PoolKey::ask(MARKET, Outcome::Yes, p(100));
    assert_eq!(desk.engine.pool(&key).unwrap().inventory, 50);
    assert_eq!(desk.engine.pending(&key, maker).unwrap(), 0);
}

#[test]
fn sell_sweeps_bids_from_the_top() {
    let desk = Desk::new(30);
    let high = desk.account(0, 25);
    let low = desk.account(0, 40);
    let seller = desk.account(80, 0);
    desk.bid(high, 5_000, 25);
    desk.bid(low, 4_000, 40);
    assert_eq!(desk.engine.best_bid(MARKET, Outcome::Yes), Some(p(5_000)));

    let report = desk
        .engine
        .sell(&SellOrder {
            taker: seller,
            market: MARKET,
            outcome: Outcome::Yes,
            shares_in: 80,
            min_price: p(4_000),
            min_out: 37,
            deadline: None,
        })
        .unwrap();

    assert_eq!(report.levels_touched, 2);
    assert_eq!(report.filled, 37);
    assert_eq!(report.spent, 80);
    assert_eq!(desk.collateral(seller), 37);
    assert_eq!(desk.shares(seller), 0);

    let high_key = PoolKey::bid(MARKET, Outcome::Yes, p(5_000));
    let low_key = PoolKey::bid(MARKET, Outcome::Yes, p(4_000));
    assert_eq!(desk.engine.claim(high, high_key, None).unwrap(), 50);
    assert_eq!(desk.engine.claim(low, low_key, None).unwrap(), 30);
    assert_eq!(desk.shares(high), 50);
    assert_eq!(desk.engine.best_bid(MARKET, Outcome::Yes), Some(p(4_000)));
    desk.assert_conserved();
}

#[test]
fn sell_remainder_routes_to_amm() {
    let desk = Desk::new(0);
    desk.seed_amm(10_000, 10_000);
    let maker = desk.account(0, 10);
    let seller = desk.account(120, 0);
    desk.bid(maker, 5_000, 10);

    let report = desk
        .engine
        .sell(&SellOrder {
            taker: seller,
            market: MARKET,
            outcome: Outcome::Yes,
            shares_in: 120,
            min_price: p(1),
            min_out: 0,
            deadline: None,
        })
        .unwrap();

    assert_eq!(report.pool_shares(), 20);
    assert_eq!(report.pool_collateral(), 10);
    // 100 shares in: 100 * 10000 / (10000 + 100) = 99
    let leg = report.amm.unwrap();
    assert_eq!(leg.amount_in, 100);
    assert_eq!(leg.amount_out, 99);
    let reserves = desk.engine.amm().reserves(MARKET, Outcome::Yes);
    assert_eq!(reserves.shares, 10_100);
    assert_eq!(reserves.collateral, 9_901);
    assert_eq!(desk.collateral(seller), 109);
    desk.assert_conserved();
}

#[test]
fn sell_remainder_respects_min_price() {
    let desk = Desk::new(0);
    desk.seed_amm(4_000, 10_000);
    let seller = desk.account(5_000, 0);

    let report = desk
        .engine
        .sell(&SellOrder {
            taker: seller,
            market: MARKET,
            outcome: Outcome::Yes,
            shares_in: 5_000,
            min_price: p(3_000),
            min_out: 0,
            deadline: None,
        })
        .unwrap();

    // Selling all 5000 would average 2666 bps; the leg stops short.
    let leg = report.amm.unwrap();
    assert_eq!(leg.amount_in, 3_330);
    assert_eq!(leg.amount_out, 999);
    assert!(leg.amount_out * 10_000 >= leg.amount_in * 3_000);
    assert_eq!(report.spent, 3_330);
    assert_eq!(desk.shares(seller), 1_670);
    assert_eq!(desk.collateral(seller), 999);
    desk.assert_conserved();
}

#[test]
fn dust_bid_does_not_block_deeper_levels() {
    let desk = Desk::new(30);
    let high = desk.account(0, 41);
    let low = desk.account(0, 1_000);
    desk.bid(high, 4_000, 41);
    desk.bid(low, 3_000, 1_000);

    // 102 shares at 4000 pay 40 and leave one unit of collateral behind.
    let first = desk.account(102, 0);
    let order = SellOrder {
        taker: first,
        market: MARKET,
        outcome: Outcome::Yes,
        shares_in: 102,
        min_price: p(4_000),
        min_out: 40,
        deadline: None,
    };
    desk.engine.sell(&order).unwrap();
    let high_key = PoolKey::bid(MARKET, Outcome::Yes, p(4_000));
    assert_eq!(desk.engine.pool(&high_key).unwrap().inventory, 1);
    assert_eq!(desk.engine.best_bid(MARKET, Outcome::Yes), Some(p(4_000)));

    let second = desk.account(100, 0);
    let report = desk
        .engine
        .sell(&SellOrder {
            taker: second,
            shares_in: 100,
            min_price: p(1),
            min_out: 30,
            ..order
        })
        .unwrap();

    assert_eq!(report.fills.len(), 1);
    assert_eq!(report.fills[0].price, p(3_000));
    assert_eq!(report.fills[0].shares, 100);
    assert_eq!(report.filled, 30);
    assert_eq!(desk.collateral(second), 30);
    assert_eq!(desk.engine.pool(&high_key).unwrap().inventory, 1);
    desk.assert_conserved();
}

#[test]
fn sweep_report_round_trips_through_json() {
    let desk = Desk::new(0);
    desk.seed_amm(4_000, 10_000);
    let maker = desk.account(100, 0);
    let taker = desk.account(0, 1_000);
    desk.ask(maker, 5_000, 100);

    let report = desk.engine.buy(&buy_order(taker, u128::MAX, 5_000, 1_000, 0)).unwrap();
    let json = serde_json::to_string(&report).unwrap();
    let back: SweepReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["side"], "Buy");
    assert_eq!(value["amm"]["amount_in"], 950);
    assert_eq!(value["fills"][0]["shares"], 100);
}

#[test]
fn quote_matches_execution() {
    let desk = Desk::new(30);
    let maker = desk.account(500, 0);
    let taker = desk.account(0, 10_000);
    desk.ask(maker, 2_000, 200);
    desk.ask(maker, 2_500, 300);

    let order = buy_order(taker, 400, 3_000, 10_000, 0);
    let quote = desk.engine.quote_buy(&order).unwrap();
    assert!(quote.executed_at.is_none());
    // Quoting stages nothing.
    let key = PoolKey::ask(MARKET, Outcome::Yes, p(2_000));
    assert_eq!(desk.engine.pool(&key).unwrap().inventory, 200);

    let executed = desk.engine.buy(&order).unwrap();
    assert_eq!(quote.fills, executed.fills);
    assert_eq!(quote.filled, executed.filled);
    assert_eq!(quote.spent, executed.spent);
    assert_eq!(executed.filled, 400);
    // 200 @ 20% + 200 @ 25%
    assert_eq!(executed.spent, 90);
}

#[test]
fn amm_quote_trait_is_read_only() {
    let desk = Desk::new(30);
    desk.seed_amm(1_000, 1_000);
    let before = desk.engine.amm().reserves(MARKET, Outcome::Yes);
    let out = desk
        .engine
        .amm()
        .quote(MARKET, Outcome::Yes, SwapSide::Buy, 100)
        .unwrap();
    assert!(out > 0);
    assert_eq!(desk.engine.amm().reserves(MARKET, Outcome::Yes), before);
}
