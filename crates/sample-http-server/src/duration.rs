//! Duration string parsing.
//!
//! Durations are written as a sequence of decimal numbers, each with an
//! optional fraction and a unit suffix, such as `"300ms"`, `"1.5s"` or
//! `"2h45m"`. Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`.
//!
//! # Example
//!
//! ```rust
//! use sample_http_server::parse_duration;
//! use std::time::Duration;
//!
//! assert_eq!(parse_duration("7s").unwrap(), Duration::from_secs(7));
//! assert_eq!(parse_duration("10us").unwrap(), Duration::from_micros(10));
//! assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
//! ```

use std::time::Duration;

use thiserror::Error;

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Unit suffixes and their length in nanoseconds.
const UNITS: &[(&str, u64)] = &[
    ("ns", 1),
    ("us", NANOS_PER_MICRO),
    ("µs", NANOS_PER_MICRO), // U+00B5 micro sign
    ("μs", NANOS_PER_MICRO), // U+03BC greek small letter mu
    ("ms", NANOS_PER_MILLI),
    ("s", NANOS_PER_SEC),
    ("m", 60 * NANOS_PER_SEC),
    ("h", 3600 * NANOS_PER_SEC),
];

/// Fraction digits past this many are ignored.
const MAX_FRACTION_DIGITS: usize = 18;

/// Errors produced by [`parse_duration`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    /// The input was empty.
    #[error("empty duration string")]
    Empty,

    /// A number was not followed by a unit.
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    /// A number was followed by an unrecognised unit.
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit {
        /// The unrecognised unit text.
        unit: String,
        /// The full input.
        input: String,
    },

    /// The input is not a duration.
    #[error("invalid duration {0:?}")]
    Invalid(String),

    /// The duration does not fit in 64 bits of nanoseconds.
    #[error("duration {0:?} is out of range")]
    Overflow(String),
}

/// Parses a duration string such as `"7s"` or `"10us"`.
///
/// A leading sign is accepted and negative durations clamp to zero. The
/// bare string `"0"` needs no unit.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    if input.is_empty() {
        return Err(DurationError::Empty);
    }

    let (negative, mut rest) = match input.as_bytes()[0] {
        b'-' => (true, &input[1..]),
        b'+' => (false, &input[1..]),
        _ => (false, input),
    };

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(DurationError::Invalid(input.to_string()));
    }

    let overflow = || DurationError::Overflow(input.to_string());
    let mut total: u64 = 0;

    while !rest.is_empty() {
        let int_len = leading_digits(rest);
        let int_part = &rest[..int_len];
        rest = &rest[int_len..];

        let mut frac_part = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let frac_len = leading_digits(after_dot);
            frac_part = &after_dot[..frac_len];
            rest = &after_dot[frac_len..];
        }

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(DurationError::Invalid(input.to_string()));
        }

        let unit_len = rest
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        if unit.is_empty() {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let whole: u64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| overflow())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(overflow)?;
        nanos = nanos
            .checked_add(fraction_nanos(frac_part, scale))
            .ok_or_else(overflow)?;
        total = total.checked_add(nanos).ok_or_else(overflow)?;
    }

    if total > i64::MAX as u64 {
        return Err(overflow());
    }

    if negative {
        Ok(Duration::ZERO)
    } else {
        Ok(Duration::from_nanos(total))
    }
}

fn leading_digits(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_digit).count()
}

fn unit_nanos(unit: &str) -> Option<u64> {
    UNITS
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|&(_, nanos)| nanos)
}

/// Nanoseconds contributed by the digits after the decimal point.
fn fraction_nanos(digits: &str, scale: u64) -> u64 {
    let digits = &digits[..digits.len().min(MAX_FRACTION_DIGITS)];
    if digits.is_empty() {
        return 0;
    }
    let numerator: u128 = digits.parse().unwrap_or(0);
    let denominator = 10u128.pow(digits.len() as u32);
    (numerator * u128::from(scale) / denominator) as u64
}
