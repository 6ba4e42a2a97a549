//! Centralized input sanitation and validation
//!
//! Pure functions, no side effects. Externally supplied symbols and names
//! must be sanitized first and validated second. Prices and intervals are
//! validated directly: out-of-range numbers are rejected, never clamped.

use crate::config::constants::{
    MAX_NAME_LEN, MAX_STOCK_PRICE, MAX_SYMBOL_LEN, MIN_STOCK_PRICE, MIN_UPDATE_INTERVAL_MS,
};
use crate::core::ValidationError;

/// Outcome of a validation check; the error's `Display` is the message.
pub type ValidationResult = Result<(), ValidationError>;

/// Uppercase, drop everything outside `A-Z`, keep at most 5 characters.
pub fn sanitize_symbol(input: &str) -> String {
    input
        .to_ascii_uppercase()
        .chars()
        .filter(|ch| ch.is_ascii_uppercase())
        .take(MAX_SYMBOL_LEN)
        .collect()
}

/// Drop everything outside `[A-Za-z0-9&\s\-.,]`, keep at most 50 characters.
pub fn sanitize_name(input: &str) -> String {
    input
        .chars()
        .filter(|&ch| is_name_char(ch))
        .take(MAX_NAME_LEN)
        .collect()
}

/// Accepts exactly `^[A-Z]{1,5}$`.
pub fn validate_symbol(symbol: &str) -> ValidationResult {
    if symbol.is_empty() {
        return Err(ValidationError::EmptySymbol);
    }

    let len = symbol.chars().count();
    let well_formed = len <= MAX_SYMBOL_LEN && symbol.chars().all(|ch| ch.is_ascii_uppercase());
    if !well_formed {
        return Err(ValidationError::InvalidSymbol {
            value: symbol.to_string(),
            max: MAX_SYMBOL_LEN,
        });
    }

    Ok(())
}

/// Accepts `^[A-Za-z0-9&\s\-.,]+$` up to 50 characters, not blank.
pub fn validate_name(name: &str) -> ValidationResult {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }

    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong {
            len,
            max: MAX_NAME_LEN,
        });
    }

    for (index, ch) in name.chars().enumerate() {
        if !is_name_char(ch) {
            return Err(ValidationError::NameInvalidChar { ch, index });
        }
    }

    Ok(())
}

/// Finite and within `[MIN_STOCK_PRICE, MAX_STOCK_PRICE]`.
pub fn validate_price(price: f64) -> ValidationResult {
    if !price.is_finite() {
        return Err(ValidationError::NonFinitePrice);
    }

    if !(MIN_STOCK_PRICE..=MAX_STOCK_PRICE).contains(&price) {
        return Err(ValidationError::PriceOutOfRange {
            price,
            min: MIN_STOCK_PRICE,
            max: MAX_STOCK_PRICE,
        });
    }

    Ok(())
}

/// At least `MIN_UPDATE_INTERVAL_MS`; no ceiling at this layer.
pub fn validate_interval(interval_ms: u64) -> ValidationResult {
    if interval_ms < MIN_UPDATE_INTERVAL_MS {
        return Err(ValidationError::IntervalTooShort {
            interval_ms,
            min_ms: MIN_UPDATE_INTERVAL_MS,
        });
    }
    Ok(())
}

/// Sanitize then validate a caller-supplied symbol.
pub fn clean_symbol(input: &str) -> Result<String, ValidationError> {
    let symbol = sanitize_symbol(input);
    validate_symbol(&symbol)?;
    Ok(symbol)
}

/// Sanitize then validate a caller-supplied name.
pub fn clean_name(input: &str) -> Result<String, ValidationError> {
    let name = sanitize_name(input);
    validate_name(&name)?;
    Ok(name)
}

#[inline]
fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch.is_whitespace() || matches!(ch, '&' | '-' | '.' | ',')
}
