//! Property tests for the ledger: pro-rata accrual, the ownership sum,
//! and bitmap search against an ordered-set model.

use std::collections::BTreeSet;

use poolbook_ledger::{PoolBook, PriceBitmap, PriceIndex};
use poolbook_types::*;
use rand::Rng;

fn commit(book: &mut PoolBook, f: impl FnOnce(&mut poolbook_ledger::BookTxn<'_>)) {
    let mut txn = book.begin();
    f(&mut txn);
    let changes = txn.into_changeset();
    book.apply(changes);
}

#[test]
fn accrual_is_pro_rata_within_one_unit() {
    let mut rng = rand::thread_rng();
    for _ in 0..50 {
        let mut book = PoolBook::new();
        let key = PoolKey::dummy_ask(rng.gen_range(1..10_000u16));
        let owners: Vec<(AccountId, u128)> = (0..rng.gen_range(2..6))
            .map(|_| (AccountId::new(), rng.gen_range(1..1_000_000u128)))
            .collect();
        let total: u128 = owners.iter().map(|(_, amount)| amount).sum();
        let sold = rng.gen_range(1..=total);
        let proceeds = rng.gen_range(0..10_000_000u128);

        commit(&mut book, |txn| {
            for (owner, amount) in &owners {
                txn.deposit(key, *owner, *amount).unwrap();
            }
            txn.fill(key, sold, proceeds).unwrap();
        });

        let mut paid = 0;
        for (owner, amount) in &owners {
            let pending = book.pending(&key, *owner).unwrap();
            let exact = proceeds * amount / total;
            assert!(exact.abs_diff(pending) <= 1, "pending {pending} vs exact {exact}");
            paid += pending;
        }
        assert!(paid <= proceeds);
        assert_eq!(book.pool(&key).unwrap().earned, proceeds);
    }
}

#[test]
fn ownership_sums_to_total_shares() {
    let mut rng = rand::thread_rng();
    let mut book = PoolBook::new();
    let key = PoolKey::dummy_bid(4_200);
    let owners: Vec<AccountId> = (0..5).map(|_| AccountId::new()).collect();

    for _ in 0..300 {
        let owner = owners[rng.gen_range(0..owners.len())];
        let amount = rng.gen_range(1..10_000u128);
        let mut txn = book.begin();
        let staged = match rng.gen_range(0..4) {
            0 | 1 => txn.deposit(key, owner, amount).map(|_| ()),
            2 => {
                let available = txn.pool(&key).map_or(0, |pool| pool.inventory);
                if available == 0 {
                    Ok(())
                } else {
                    txn.fill(key, amount.min(available), amount).map(|_| ())
                }
            }
            _ => txn.withdraw(key, owner, amount).map(|_| ()),
        };
        // A rejected step is dropped wholesale.
        if staged.is_ok() {
            let changes = txn.into_changeset();
            book.apply(changes);
        }

        let ownership: u128 = owners
            .iter()
            .filter_map(|owner| book.position(&key, *owner))
            .map(|position| position.ownership)
            .sum();
        match book.pool(&key) {
            Some(pool) => {
                assert_eq!(ownership, pool.total_shares);
                assert_eq!(book.is_active(&key), pool.inventory > 0);
            }
            None => {
                assert_eq!(ownership, 0);
                assert!(!book.is_active(&key));
            }
        }
    }
}

#[test]
fn bitmap_search_matches_ordered_set() {
    let mut rng = rand::thread_rng();
    let mut bitmap = PriceBitmap::default();
    let mut model = BTreeSet::new();

    for _ in 0..2_000 {
        let level = rng.gen_range(1..=9_999u16);
        let active = rng.gen_bool(0.6);
        bitmap.set(level, active);
        if active {
            model.insert(level);
        } else {
            model.remove(&level);
        }

        let probe = rng.gen_range(1..=9_999u16);
        assert_eq!(bitmap.lowest_at_or_above(probe), model.range(probe..).next().copied());
        assert_eq!(
            bitmap.highest_at_or_below(probe),
            model.range(..=probe).next_back().copied()
        );
    }
    assert_eq!(bitmap.count() as usize, model.len());
}

#[test]
fn books_are_isolated() {
    let mut index = PriceIndex::new();
    let yes_asks = PoolKey::ask(MarketId(1), Outcome::Yes, Price::MIN).book_key();
    let no_asks = PoolKey::ask(MarketId(1), Outcome::No, Price::MIN).book_key();
    let yes_bids = PoolKey::bid(MarketId(1), Outcome::Yes, Price::MIN).book_key();

    index.set_bit(yes_asks, Price::new(300).unwrap(), true);
    assert_eq!(index.best_at_or_above(&yes_asks, 1), Some(Price::new(300).unwrap()));
    assert_eq!(index.best_at_or_above(&no_asks, 1), None);
    assert_eq!(index.best_at_or_below(&yes_bids, 9_999), None);
}

#[test]
fn pool_state_serializes() {
    let mut book = PoolBook::new();
    let key = PoolKey::dummy_ask(2_500);
    let owner = AccountId::new();
    commit(&mut book, |txn| {
        txn.deposit(key, owner, 40).unwrap();
        txn.fill(key, 40, 10).unwrap();
    });

    let pool = book.pool(&key).unwrap();
    let json = serde_json::to_value(pool).unwrap();
    assert_eq!(json["inventory"], 0);
    assert_eq!(json["total_shares"], 40);
    assert_eq!(json["earned"], 10);
    let back: poolbook_ledger::Pool = serde_json::from_value(json).unwrap();
    assert_eq!(back, pool);
}
