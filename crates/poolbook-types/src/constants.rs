//! System-wide constants for the PoolBook engine.

/// Fixed-point scale of the reward-per-unit accumulator (1e18).
pub const ACC_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Basis-point denominator: a price of `BPS_DENOMINATOR` means 1 collateral per share.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Lowest valid price level in basis points.
pub const MIN_PRICE_BPS: u16 = 1;

/// Highest valid price level in basis points.
pub const MAX_PRICE_BPS: u16 = 9_999;

/// Width of one price-index word in bits.
pub const WORD_BITS: usize = 256;

/// Number of words in a price-index bit vector.
pub const INDEX_WORDS: usize = 40;

/// Total addressable price levels per book (10,240).
pub const INDEX_BITS: usize = WORD_BITS * INDEX_WORDS;

/// Default bound on price levels visited by one sweep.
pub const DEFAULT_MAX_LEVELS_PER_SWEEP: usize = 512;

/// Default smallest accepted deposit (token base units).
pub const DEFAULT_MIN_DEPOSIT: u128 = 1;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "PoolBook";

const _: () = assert!(INDEX_BITS > MAX_PRICE_BPS as usize);
