//! Exchange increment aware decimal helpers.
//!
//! Sizes are truncated toward zero, never rounded to nearest, so an order can
//! never ask for more than the funds it was sized from.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{Result, TopupError};

/// Digits kept by [`div_round`] when sizing orders.
pub const SIZE_DIVISION_DP: u32 = 8;

fn invalid(increment: &str, reason: &str) -> TopupError {
    TopupError::InvalidIncrement {
        increment: increment.to_string(),
        reason: reason.to_string(),
    }
}

/// Number of fractional digits implied by a base increment string.
///
/// Zero when the fractional part holds no `1`, otherwise one past the index of
/// the first `1`: `"1.00"` -> 0, `"0.1"` -> 1, `"0.001"` -> 3.
pub fn increment_precision(increment: &str) -> Result<u32> {
    let increment = increment.trim();
    if increment.is_empty() {
        return Err(invalid(increment, "empty increment"));
    }

    let mut parts = increment.split('.');
    let integer = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();
    if parts.next().is_some() {
        return Err(invalid(increment, "more than one decimal point"));
    }
    if integer.is_empty() && fraction.is_empty() {
        return Err(invalid(increment, "no digits"));
    }
    if !integer.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid(increment, "non-digit characters"));
    }

    Ok(fraction.find('1').map(|idx| idx as u32 + 1).unwrap_or(0))
}

/// Truncate `size` to the precision implied by `increment`.
pub fn round_to_increment(size: Decimal, increment: &str) -> Result<Decimal> {
    let precision = increment_precision(increment)?;
    Ok(truncate(size, precision))
}

/// Truncate toward zero at `dp` fractional digits.
pub fn truncate(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
}

/// `numerator / denominator` rounded half away from zero to `dp` digits.
pub fn div_round(numerator: Decimal, denominator: Decimal, dp: u32) -> Result<Decimal> {
    if denominator <= Decimal::ZERO {
        return Err(TopupError::InvalidMarketData(format!(
            "cannot divide by non-positive price {}",
            denominator
        )));
    }
    let quotient = numerator.checked_div(denominator).ok_or_else(|| {
        TopupError::InvalidMarketData(format!(
            "division overflow: {} / {}",
            numerator, denominator
        ))
    })?;
    Ok(quotient.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
}
