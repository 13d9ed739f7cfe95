//! Error types for the PoolBook engine.
//!
//! All errors use the `PB_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by category:
//! - 1xx: Validation errors
//! - 2xx: State errors
//! - 3xx: Liquidity errors
//! - 4xx: Transfer errors
//! - 5xx: Reentrancy
//! - 6xx: Computation errors
//! - 9xx: General / internal errors
//!
//! Every error is fatal to the operation that raised it: the operation is
//! rejected as a whole and no pool or position state changes.

use std::fmt;

use thiserror::Error;

use crate::{AccountId, PoolKey};

/// Coarse failure category, used for metrics and caller-side routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    State,
    Liquidity,
    Transfer,
    Reentrancy,
    Computation,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "VALIDATION"),
            Self::State => write!(f, "STATE"),
            Self::Liquidity => write!(f, "LIQUIDITY"),
            Self::Transfer => write!(f, "TRANSFER"),
            Self::Reentrancy => write!(f, "REENTRANCY"),
            Self::Computation => write!(f, "COMPUTATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Central error enum for all PoolBook operations.
#[derive(Debug, Error)]
pub enum PoolbookError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// An amount argument was zero (or below the configured minimum).
    #[error("PB_ERR_100: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Price outside the 1..=9999 bps range.
    #[error("PB_ERR_101: Invalid price: {bps} bps (valid range 1..=9999)")]
    InvalidPrice { bps: u32 },

    /// The caller-supplied deadline has passed.
    #[error("PB_ERR_102: Deadline expired")]
    DeadlineExpired,

    /// Migration source and destination are the same level.
    #[error("PB_ERR_103: Migration target equals source price {bps} bps")]
    SamePriceMigration { bps: u16 },

    // =================================================================
    // State Errors (2xx)
    // =================================================================
    /// No pool exists at this key.
    #[error("PB_ERR_200: Pool not found: {0}")]
    PoolNotFound(PoolKey),

    /// The account has no position in this pool.
    #[error("PB_ERR_201: Position not found for {owner} in {pool}")]
    PositionNotFound { pool: PoolKey, owner: AccountId },

    /// `exit_depleted` was called while the pool still has inventory.
    #[error("PB_ERR_202: Pool not depleted: {inventory} units of inventory remain")]
    PoolNotDepleted { inventory: u128 },

    // =================================================================
    // Liquidity Errors (3xx)
    // =================================================================
    /// The pool cannot satisfy the requested fill.
    #[error("PB_ERR_300: Insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: u128, available: u128 },

    /// Aggregate output fell below the caller's bound.
    #[error("PB_ERR_301: Slippage exceeded: minimum {min_out}, got {actual}")]
    SlippageExceeded { min_out: u128, actual: u128 },

    /// Nothing could be executed at all (no levels, no fallback).
    #[error("PB_ERR_302: No liquidity within price limit")]
    NoLiquidity,

    // =================================================================
    // Transfer Errors (4xx)
    // =================================================================
    /// A collateral or share transfer through the vault failed.
    #[error("PB_ERR_400: Transfer failed: {reason}")]
    TransferFailed { reason: String },

    /// The vault refused to mint an outcome pair.
    #[error("PB_ERR_401: Mint failed: {reason}")]
    MintFailed { reason: String },

    /// The AMM fallback leg failed or returned less than its bound.
    #[error("PB_ERR_402: AMM swap failed: {reason}")]
    AmmSwapFailed { reason: String },

    // =================================================================
    // Reentrancy (5xx)
    // =================================================================
    /// A state-mutating entry point was called while another was in flight.
    #[error("PB_ERR_500: Reentrant call rejected")]
    Reentrancy,

    // =================================================================
    // Computation Errors (6xx)
    // =================================================================
    /// Fixed-point arithmetic overflowed.
    #[error("PB_ERR_600: Arithmetic overflow in {context}")]
    Overflow { context: &'static str },

    /// Division by zero in accumulator math.
    #[error("PB_ERR_601: Division by zero in {context}")]
    DivisionByZero { context: &'static str },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("PB_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("PB_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, zero bounds, etc.).
    #[error("PB_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl PoolbookError {
    /// Category tag of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidAmount { .. }
            | Self::InvalidPrice { .. }
            | Self::DeadlineExpired
            | Self::SamePriceMigration { .. } => ErrorCategory::Validation,
            Self::PoolNotFound(_) | Self::PositionNotFound { .. } | Self::PoolNotDepleted { .. } => {
                ErrorCategory::State
            }
            Self::InsufficientLiquidity { .. } | Self::SlippageExceeded { .. } | Self::NoLiquidity => {
                ErrorCategory::Liquidity
            }
            Self::TransferFailed { .. } | Self::MintFailed { .. } | Self::AmmSwapFailed { .. } => {
                ErrorCategory::Transfer
            }
            Self::Reentrancy => ErrorCategory::Reentrancy,
            Self::Overflow { .. } | Self::DivisionByZero { .. } => ErrorCategory::Computation,
            Self::Internal(_) | Self::Serialization(_) | Self::Configuration(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Shorthand for a zero-amount rejection.
    #[must_use]
    pub fn zero_amount(what: &str) -> Self {
        Self::InvalidAmount {
            reason: format!("{what} must be greater than zero"),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, PoolbookError>;

impl From<serde_json::Error> for PoolbookError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
