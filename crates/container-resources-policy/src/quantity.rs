//! Kubernetes resource quantities, e.g. `500m`, `1.5`, `128Mi`, `1e3`.
//!
//! Values are kept as an exact number of nano units, which is enough to
//! compare any two quantities found inside of a pod spec.

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum QuantityError {
    #[error("'{0}' is not a valid quantity")]
    Invalid(String),
    #[error("'{0}' is out of the supported range")]
    OutOfRange(String),
}

/// Largest decimal exponent accepted, which keeps every value inside of
/// an i128
const MAX_EXPONENT: i32 = 18;
const MAX_DIGITS: usize = 18;

#[derive(Debug, Clone)]
pub struct Quantity {
    raw: String,
    nanos: i128,
}

enum Suffix {
    Decimal(i32),
    Binary(u32),
}

fn parse_suffix(suffix: &str) -> Option<Suffix> {
    let suffix = match suffix {
        "" => Suffix::Decimal(0),
        "n" => Suffix::Decimal(-9),
        "u" => Suffix::Decimal(-6),
        "m" => Suffix::Decimal(-3),
        "k" => Suffix::Decimal(3),
        "M" => Suffix::Decimal(6),
        "G" => Suffix::Decimal(9),
        "T" => Suffix::Decimal(12),
        "P" => Suffix::Decimal(15),
        "E" => Suffix::Decimal(18),
        "Ki" => Suffix::Binary(10),
        "Mi" => Suffix::Binary(20),
        "Gi" => Suffix::Binary(30),
        "Ti" => Suffix::Binary(40),
        "Pi" => Suffix::Binary(50),
        "Ei" => Suffix::Binary(60),
        exponent if exponent.starts_with(['e', 'E']) => {
            let exponent: i32 = exponent[1..].parse().ok()?;
            Suffix::Decimal(exponent)
        }
        _ => return None,
    };
    Some(suffix)
}

/// `value * 10^scale`, rounded up like Kubernetes does for sub-nano
/// precision. `None` when the result does not fit in an i128.
fn scale_pow10(value: i128, scale: i32) -> Option<i128> {
    if scale >= 0 {
        return 10i128
            .checked_pow(scale.unsigned_abs())
            .and_then(|factor| value.checked_mul(factor));
    }
    // 10^39 is above i128::MAX, so every non-zero value is below the divisor
    if scale < -38 {
        return Some(i128::from(value > 0));
    }
    let divisor = 10i128.pow(scale.unsigned_abs());
    let quotient = value / divisor;
    Some(if value % divisor > 0 { quotient + 1 } else { quotient })
}

impl Quantity {
    pub fn as_nanos(&self) -> i128 {
        self.nanos
    }

    pub fn is_negative(&self) -> bool {
        self.nanos < 0
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || QuantityError::Invalid(raw.to_string());
        let out_of_range = || QuantityError::OutOfRange(raw.to_string());

        let (negative, unsigned) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw.strip_prefix('+').unwrap_or(raw)),
        };

        let number_len = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(number_len);

        let (integer, fraction) = number.split_once('.').unwrap_or((number, ""));
        if (integer.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return Err(invalid());
        }
        let digits = format!("{integer}{fraction}");
        let digits = digits.trim_start_matches('0');
        if digits.len() > MAX_DIGITS {
            return Err(out_of_range());
        }
        let mantissa: i128 = if digits.is_empty() {
            0
        } else {
            digits.parse().map_err(|_| invalid())?
        };

        let fraction_len = i32::try_from(fraction.len()).map_err(|_| out_of_range())?;
        let nanos = match parse_suffix(suffix).ok_or_else(invalid)? {
            Suffix::Decimal(exponent) => {
                if exponent > MAX_EXPONENT {
                    return Err(out_of_range());
                }
                let scale = exponent
                    .checked_add(9)
                    .and_then(|scale| scale.checked_sub(fraction_len))
                    .ok_or_else(out_of_range)?;
                scale_pow10(mantissa, scale).ok_or_else(out_of_range)?
            }
            Suffix::Binary(shift) => mantissa
                .checked_mul(1i128 << shift)
                .and_then(|v| v.checked_mul(1_000_000_000))
                .and_then(|v| scale_pow10(v, -fraction_len))
                .ok_or_else(out_of_range)?,
        };

        Ok(Quantity {
            raw: raw.to_string(),
            nanos: if negative { -nanos } else { nanos },
        })
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.nanos == other.nanos
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nanos.cmp(&other.nanos)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// Quantities are usually strings, plain numbers are accepted too
impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Integer(i64),
            Float(f64),
        }

        let raw = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text,
            Raw::Integer(integer) => integer.to_string(),
            Raw::Float(float) => float.to_string(),
        };
        raw.parse().map_err(de::Error::custom)
    }
}
