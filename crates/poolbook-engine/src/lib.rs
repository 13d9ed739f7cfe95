//! # poolbook-engine
//!
//! The execution layer of **PoolBook**. It pairs every staged ledger change
//! with the vault transfers it implies and commits both or neither.
//!
//! ## Components
//!
//! - [`PoolEngine`]: public maker, taker and view operations
//! - [`sweep`]: multi-level sweeps with an AMM fallback leg
//! - [`migration`]: moving a position between price levels
//! - [`adapters`]: [`OutcomeVault`] and [`FallbackAmm`] boundaries plus
//!   in-memory implementations
//! - [`settlement`]: vault legs with rollback
//! - [`guard`]: the reentrancy latch around every mutating entry point

pub mod adapters;
pub mod engine;
pub mod guard;
pub mod migration;
pub mod settlement;
pub mod sweep;

pub use adapters::{
    Asset, ConstantProductAmm, FallbackAmm, MemoryVault, NoAmm, OutcomeVault, SwapSide,
};
pub use engine::{MintDepositReceipt, PoolEngine, PoolView, PositionView};
pub use guard::ReentrancyGuard;
pub use migration::MigrationReceipt;
pub use sweep::{AmmLeg, BuyOrder, LevelFill, LiquiditySource, SellOrder, SweepReport, TakerSide};
