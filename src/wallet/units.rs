//! Exact smallest-unit to display-unit conversion.

use alloy::primitives::U256;

/// Render `value` smallest units as a decimal string with `decimals`
/// fractional places, trimming trailing zeros but keeping at least one
/// fractional digit ("1.0", "0.25"). Pure integer arithmetic.
pub fn format_units(value: U256, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }

    let base = U256::from(10u64).pow(U256::from(decimals));
    let whole = value / base;
    let fraction = value % base;

    let padded = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    let trimmed = padded.trim_end_matches('0');
    let fraction = if trimmed.is_empty() { "0" } else { trimmed };

    format!("{}.{}", whole, fraction)
}

/// [`format_units`] followed by a currency symbol.
pub fn format_balance(value: U256, decimals: u8, symbol: &str) -> String {
    format!("{} {}", format_units(value, decimals), symbol)
}
