//! Integer helpers: `add1`, `add`, `sub`, `div`, `mod`, `mul`, `rand`.
//!
//! Every operand goes through [`to_int`] first, so templates can pass strings,
//! floats or bools straight from query bindings.

use minijinja::value::{Value, ValueKind};
use rand::Rng;
use thiserror::Error;

/// Faults raised by the arithmetic helpers at the point of use.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MathError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("invalid range for rand: max ({max}) must be greater than min ({min})")]
    InvalidRange { min: i64, max: i64 },
}

/// Coerce any template value to an `i64`.
///
/// - integers pass through, floats truncate toward zero
/// - bools map to `1`/`0`
/// - strings are trimmed and parsed as an integer (sign and `0x`/`0o`/`0b`
///   prefixes allowed), then as a float. A bare leading zero is still
///   decimal (`"010"` is 10, not octal 8), and `"3.75"` truncates to 3
///   rather than falling back to 0
/// - everything else, and anything that does not fit in an `i64`, is `0`
pub fn to_int(value: &Value) -> i64 {
    match value.kind() {
        ValueKind::Bool => i64::from(value.is_true()),
        ValueKind::Number => i64::try_from(value.clone())
            .ok()
            .or_else(|| f64::try_from(value.clone()).ok().and_then(float_to_int))
            .unwrap_or(0),
        ValueKind::String => value.as_str().map_or(0, parse_int),
        _ => 0,
    }
}

fn parse_int(s: &str) -> i64 {
    let s = s.trim();
    if s.is_empty() {
        return 0;
    }

    let (negative, digits) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let radix = match digits.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };

    if let Some(radix) = radix {
        return i64::from_str_radix(&digits[2..], radix)
            .ok()
            .map_or(0, |n| if negative { n.wrapping_neg() } else { n });
    }

    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(float_to_int))
        .unwrap_or(0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_int(f: f64) -> Option<i64> {
    let f = f.trunc();
    (f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

pub fn add1(x: i64) -> i64 {
    x.wrapping_add(1)
}

pub fn add(operands: impl IntoIterator<Item = i64>) -> i64 {
    operands.into_iter().fold(0, i64::wrapping_add)
}

pub fn sub(a: i64, b: i64) -> i64 {
    a.wrapping_sub(b)
}

pub fn div(a: i64, b: i64) -> Result<i64, MathError> {
    if b == 0 {
        return Err(MathError::DivisionByZero);
    }
    a.checked_div(b).ok_or(MathError::Overflow)
}

pub fn rem(a: i64, b: i64) -> Result<i64, MathError> {
    if b == 0 {
        return Err(MathError::DivisionByZero);
    }
    a.checked_rem(b).ok_or(MathError::Overflow)
}

pub fn mul(a: i64, operands: impl IntoIterator<Item = i64>) -> i64 {
    operands.into_iter().fold(a, i64::wrapping_mul)
}

/// Uniform integer in `[min, max)`.
pub fn rand_range<R: Rng>(rng: &mut R, min: i64, max: i64) -> Result<i64, MathError> {
    if max <= min {
        return Err(MathError::InvalidRange { min, max });
    }
    Ok(rng.gen_range(min..max))
}
