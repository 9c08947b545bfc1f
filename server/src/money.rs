// server/src/money.rs

//! Conversions between order amounts (rupees as `Decimal`) and ledger amounts (paise as `i64`).
//!
//! `to_minor` is the only place major units become minor units.

use crate::errors::{AppError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

const MINOR_PER_MAJOR: i64 = 100;

/// Rupees to paise, rounding half away from zero.
pub fn to_minor(major: Decimal) -> Result<i64> {
  major
    .checked_mul(Decimal::from(MINOR_PER_MAJOR))
    .map(|minor| minor.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
    .and_then(|minor| minor.to_i64())
    .ok_or_else(|| AppError::InvalidInput(format!("Amount {} is out of range", major)))
}

pub fn to_major(minor: i64) -> Decimal {
  Decimal::new(minor, 2)
}

/// "1234.50" style rendering used by the gateway and on documents.
pub fn format_minor(minor: i64) -> String {
  format!("{:.2}", to_major(minor))
}

/// Parses a gateway amount string ("150.00", "150") into paise.
pub fn parse_major_str(raw: &str) -> Result<i64> {
  let value: Decimal = raw
    .trim()
    .parse()
    .map_err(|_| AppError::MalformedPayload(format!("Amount '{}' is not a number", raw)))?;
  to_minor(value)
}
