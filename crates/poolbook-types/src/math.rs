//! Fixed-point helpers over 256-bit intermediates.
//!
//! Amounts are `u128` token base units and the accumulator is scaled by
//! [`ACC_PRECISION`]; `amount * acc` can exceed `u128`, so every product
//! is formed in a [`U256`] and narrowed back with an explicit overflow check.

use ethnum::U256;

use crate::constants::{ACC_PRECISION, BPS_DENOMINATOR};
use crate::{PoolbookError, Price, Result};

/// Rounding direction of an integer division.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Floor, towards zero.
    Down,
    /// Ceiling, away from zero.
    Up,
}

/// `a * b / denominator` with the chosen rounding.
///
/// # Errors
/// `DivisionByZero` when `denominator == 0`; `Overflow` when the quotient
/// does not fit in `u128`.
pub fn mul_div(
    a: u128,
    b: u128,
    denominator: u128,
    rounding: Rounding,
    context: &'static str,
) -> Result<u128> {
    if denominator == 0 {
        return Err(PoolbookError::DivisionByZero { context });
    }
    let product = U256::new(a) * U256::new(b);
    let denominator = U256::new(denominator);
    let mut quotient = product / denominator;
    if rounding == Rounding::Up && product % denominator != U256::ZERO {
        quotient += U256::ONE;
    }
    narrow(quotient, context)
}

/// Narrow a 256-bit value back to `u128`.
///
/// # Errors
/// `Overflow` when the value exceeds `u128::MAX`.
pub fn narrow(value: U256, context: &'static str) -> Result<u128> {
    if value > U256::new(u128::MAX) {
        return Err(PoolbookError::Overflow { context });
    }
    Ok(value.as_u128())
}

/// Accumulated value of `units` ownership at accumulator `acc`:
/// `units * acc / 1e18`, floored.
pub fn accrued(units: u128, acc_per_unit: u128) -> Result<u128> {
    mul_div(units, acc_per_unit, ACC_PRECISION, Rounding::Down, "accrued")
}

/// Accumulator increment for distributing `proceeds` over `total_shares`:
/// `proceeds * 1e18 / total_shares`, floored.
pub fn acc_increment(proceeds: u128, total_shares: u128) -> Result<u128> {
    mul_div(
        proceeds,
        ACC_PRECISION,
        total_shares,
        Rounding::Down,
        "accumulator increment",
    )
}

/// Collateral value of `shares` at `price`.
pub fn shares_to_collateral(shares: u128, price: Price, rounding: Rounding) -> Result<u128> {
    mul_div(
        shares,
        price.bps_u128(),
        BPS_DENOMINATOR,
        rounding,
        "shares to collateral",
    )
}

/// Shares purchasable with `collateral` at `price`, floored.
pub fn collateral_to_shares(collateral: u128, price: Price) -> Result<u128> {
    mul_div(
        collateral,
        BPS_DENOMINATOR,
        price.bps_u128(),
        Rounding::Down,
        "collateral to shares",
    )
}
