//! # poolbook-types
//!
//! Shared types, errors, and configuration for the **PoolBook** pooled
//! limit-order engine.
//!
//! This crate is the leaf dependency of the workspace -- every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`MarketId`], [`AccountId`], [`TokenId`], [`BookKey`], [`PoolKey`], [`PositionKey`]
//! - **Price model**: [`Price`], [`Outcome`], [`PoolKind`]
//! - **Fixed-point math**: [`math::mul_div`] and friends over 256-bit intermediates
//! - **Configuration**: [`EngineConfig`]
//! - **Errors**: [`PoolbookError`] with `PB_ERR_` prefix codes
//! - **Constants**: system-wide limits and scaling factors

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod math;
pub mod price;

// Re-export the primary types at crate root:
//   use poolbook_types::{Price, PoolKey, PoolbookError, ...};

pub use config::*;
pub use error::*;
pub use ids::*;
pub use price::*;

// Constants and math helpers are accessed via their module path
// (`poolbook_types::constants::ACC_PRECISION`, `poolbook_types::math::mul_div`).
