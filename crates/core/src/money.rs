//! Money in integer minor units (cents).
//!
//! Amounts never touch floating point inside the engine. Decimal text is
//! parsed once at the edge and formatted back only for display or for
//! remote grids that want a decimal string.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// Input was empty after trimming.
    Empty,
    /// Input is not a plain decimal number.
    Invalid(String),
    /// More than two fractional digits.
    TooPrecise(String),
    /// Negative amounts are not expenses.
    Negative(String),
    /// Value does not fit in i64 cents.
    Overflow(String),
}

impl fmt::Display for AmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "amount is empty"),
            Self::Invalid(s) => write!(f, "cannot parse amount '{s}'"),
            Self::TooPrecise(s) => write!(f, "amount '{s}' has more than 2 decimal places"),
            Self::Negative(s) => write!(f, "amount '{s}' is negative"),
            Self::Overflow(s) => write!(f, "amount '{s}' is too large"),
        }
    }
}

impl std::error::Error for AmountError {}

/// Parse a decimal amount ("10", "10.5", "10.01", "10,01") into cents.
///
/// A comma is accepted as the decimal separator since spreadsheet locales
/// hand values back that way.
pub fn parse_amount(input: &str) -> Result<i64, AmountError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }
    if s.starts_with('-') {
        return Err(AmountError::Negative(s.to_string()));
    }
    let s_norm = s.strip_prefix('+').unwrap_or(s).replace(',', ".");

    let (whole, frac) = match s_norm.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s_norm.as_str(), ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::Invalid(s.to_string()));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(AmountError::Invalid(s.to_string()));
    }
    if frac.len() > 2 {
        return Err(AmountError::TooPrecise(s.to_string()));
    }

    let whole_val: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| AmountError::Overflow(s.to_string()))?
    };
    let frac_val: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map(|v| v * 10).unwrap_or(0),
        _ => frac.parse::<i64>().unwrap_or(0),
    };

    whole_val
        .checked_mul(100)
        .and_then(|v| v.checked_add(frac_val))
        .ok_or_else(|| AmountError::Overflow(s.to_string()))
}

/// Format cents as a plain decimal string with two places ("5.01", "-0.30").
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Split a shared amount between the two parties.
///
/// Returns `(initiator_half, other_half)`. The initiating owner's half
/// carries the odd cent, so the halves always sum to `amount_cents`.
pub fn split_shared(amount_cents: i64) -> (i64, i64) {
    let other = amount_cents / 2;
    (amount_cents - other, other)
}
