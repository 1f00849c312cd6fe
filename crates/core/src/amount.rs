//! Hex quantity and uint256 decoding, and conversion to human units.

use rust_decimal::Decimal;
use thiserror::Error;

/// Largest scale a `Decimal` can carry.
const MAX_DECIMAL_SCALE: u32 = 28;

/// Largest mantissa a `Decimal` can carry (2^96 - 1).
const MAX_DECIMAL_MANTISSA: u128 = 79_228_162_514_264_337_593_543_950_335;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("missing 0x prefix")]
    MissingPrefix,
    #[error("empty value")]
    Empty,
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("value does not fit in 128 bits")]
    Overflow,
}

fn strip_prefix(value: &str) -> Result<&str, AmountError> {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or(AmountError::MissingPrefix)
}

/// Parse a JSON-RPC hex quantity such as `"0x1b4"`.
pub fn parse_hex_u64(value: &str) -> Result<u64, AmountError> {
    let body = strip_prefix(value)?;
    if body.is_empty() {
        return Err(AmountError::Empty);
    }
    u64::from_str_radix(body, 16).map_err(|e| AmountError::InvalidHex(e.to_string()))
}

/// Decode big-endian unsigned integer data (e.g. an ERC-20 `Transfer` value).
///
/// Accepts any number of hex digits; fails with `Overflow` when the value
/// needs more than 128 bits.
pub fn decode_uint256(data: &str) -> Result<u128, AmountError> {
    let digits = strip_prefix(data)?;
    if digits.is_empty() {
        return Err(AmountError::Empty);
    }
    let body = digits.trim_start_matches('0');
    if body.is_empty() {
        return Ok(0);
    }
    if body.len() > 32 {
        if !body.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AmountError::InvalidHex(data.to_string()));
        }
        return Err(AmountError::Overflow);
    }
    u128::from_str_radix(body, 16).map_err(|e| AmountError::InvalidHex(e.to_string()))
}

/// Convert a raw integer token amount into human units (`raw / 10^decimals`).
///
/// Precision beyond what a `Decimal` can hold is truncated. Returns `None` only
/// when the integer part itself is too large to represent.
pub fn to_human_units(raw: u128, decimals: u32) -> Option<Decimal> {
    let mut mantissa = raw;
    let mut scale = decimals;
    while scale > MAX_DECIMAL_SCALE || mantissa > MAX_DECIMAL_MANTISSA {
        if scale == 0 {
            return None;
        }
        mantissa /= 10;
        scale -= 1;
    }
    Decimal::try_from_i128_with_scale(mantissa as i128, scale).ok()
}
