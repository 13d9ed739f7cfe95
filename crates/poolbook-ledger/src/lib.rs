//! # poolbook-ledger
//!
//! Bookkeeping core of **PoolBook**: the reward-per-unit accumulator every
//! pool runs on, the per-book price-level bitmap, and the staged
//! pool/position store the engine commits through.
//!
//! ## Layout
//!
//! - [`accumulator`]: pure deposit / fill / claim / withdraw transitions
//! - [`price_index`]: active-level bitmaps keyed by [`poolbook_types::BookKey`]
//! - [`book`]: [`PoolBook`] storage and [`BookTxn`] copy-on-write staging
//!
//! Nothing here moves tokens. The engine crate pairs each staged change
//! with the matching vault transfer and applies it only once that
//! transfer has succeeded.

pub mod accumulator;
pub mod book;
pub mod price_index;

pub use accumulator::{DepositReceipt, FillReceipt, Pool, Position, WithdrawReceipt};
pub use book::{BookTxn, Changeset, LevelDepth, PoolBook};
pub use price_index::{PriceBitmap, PriceIndex};
