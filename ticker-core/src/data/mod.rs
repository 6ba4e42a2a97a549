//! Input sanitation and validation for symbols, names, prices and intervals

pub mod validator;

pub use validator::{
    clean_name, clean_symbol, sanitize_name, sanitize_symbol, validate_interval, validate_name,
    validate_price, validate_symbol, ValidationResult,
};
