//! Checked arithmetic over raw coin amounts.
//!
//! Amounts are fixed-point integers (u64 raw units). Every balance and
//! supply mutation in the ledger goes through these helpers so that an
//! arithmetic guard failure surfaces as an error, never a panic.

use thiserror::Error;

/// Arithmetic guard failure on a balance or supply operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    #[error("amount addition overflows")]
    Overflow,

    #[error("amount subtraction underflows")]
    Underflow,
}

/// `a + b`, failing on overflow.
pub fn checked_add(a: u64, b: u64) -> Result<u64, ArithmeticError> {
    a.checked_add(b).ok_or(ArithmeticError::Overflow)
}

/// `a - b`, failing on underflow.
pub fn checked_sub(a: u64, b: u64) -> Result<u64, ArithmeticError> {
    a.checked_sub(b).ok_or(ArithmeticError::Underflow)
}

/// Convert whole coins into raw units given a decimal separator.
pub fn to_units(coins: u64, decimal_separator: u8) -> Result<u64, ArithmeticError> {
    let factor = 10u64
        .checked_pow(decimal_separator as u32)
        .ok_or(ArithmeticError::Overflow)?;
    coins.checked_mul(factor).ok_or(ArithmeticError::Overflow)
}
