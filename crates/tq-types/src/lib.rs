#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::ser::{Serialize, Serializer};
use thiserror::Error;

/// Largest magnitude at which every integral `f64` is exactly representable.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

static LEADING_DECIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?(?:Infinity|(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?))")
        .expect("leading decimal pattern is valid")
});

static WHOLE_DECIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:Infinity|(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?)$")
        .expect("whole decimal pattern is valid")
});

/// One cell of a record.
///
/// Cells are loosely typed: uploaded delimited text produces `Utf8` cells,
/// JSON callers may hand in numbers, and absent or `null` values are `Null`.
/// Numeric operators never trust the variant; they go through the coercions
/// defined on this type so every operator agrees on what "numeric" means.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Number(f64),
    Utf8(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("value {value:?} has no numeric prefix")]
    NonNumericValue { value: String },
    #[error("value is missing")]
    ValueIsMissing,
    #[error("value is NaN")]
    NotANumber,
}

impl Scalar {
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Lenient numeric coercion used by aggregation, ordered comparison and
    /// top-K. Strings contribute their leading decimal literal; anything that
    /// has none becomes NaN.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Null => f64::NAN,
            Self::Number(v) => *v,
            Self::Utf8(v) => parse_float_prefix(v),
        }
    }

    /// Same coercion as [`Scalar::to_number`], but reports why a value does
    /// not count as a number. Aggregation inputs are exactly the `Ok` values.
    pub fn to_f64(&self) -> Result<f64, TypeError> {
        let value = match self {
            Self::Null => return Err(TypeError::ValueIsMissing),
            Self::Number(v) => *v,
            Self::Utf8(v) => {
                let parsed = parse_float_prefix(v);
                if parsed.is_nan() {
                    return Err(TypeError::NonNumericValue { value: v.clone() });
                }
                parsed
            }
        };
        if value.is_nan() {
            return Err(TypeError::NotANumber);
        }
        Ok(value)
    }

    /// Whole-string numeric conversion used when a number meets a string in
    /// an equality or ordering test. `Null` has no numeric value here.
    #[must_use]
    pub fn to_strict_number(&self) -> f64 {
        match self {
            Self::Null => f64::NAN,
            Self::Number(v) => *v,
            Self::Utf8(v) => strict_number(v),
        }
    }

    /// Text form used for grouping keys, substring matching and list joins.
    /// `None` for missing cells.
    #[must_use]
    pub fn display_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Number(v) => Some(format_number(*v)),
            Self::Utf8(v) => Some(v.clone()),
        }
    }

    /// Loose equality: numbers meeting strings compare numerically, `Null`
    /// only equals `Null`.
    #[must_use]
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Null, _) | (_, Self::Null) => false,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Utf8(a), Self::Utf8(b)) => a == b,
            (Self::Number(n), Self::Utf8(s)) | (Self::Utf8(s), Self::Number(n)) => {
                *n == strict_number(s)
            }
        }
    }

    /// Strict equality used for list membership: same variant, same value,
    /// and NaN is a member of a list that holds NaN.
    #[must_use]
    pub fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Utf8(a), Self::Utf8(b)) => a == b,
            _ => false,
        }
    }

    /// Raw relational ordering: two strings compare lexicographically,
    /// everything else compares numerically after whole-string conversion.
    /// Incomparable pairs are `Equal`, so this is not a total order on
    /// mixed or partially missing columns.
    #[must_use]
    pub fn raw_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Utf8(a), Self::Utf8(b)) => a.cmp(b),
            _ => self
                .to_strict_number()
                .partial_cmp(&other.to_strict_number())
                .unwrap_or(Ordering::Equal),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Number(v) => f.write_str(&format_number(*v)),
            Self::Utf8(v) => f.write_str(v),
        }
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Number(v) if !v.is_finite() => serializer.serialize_unit(),
            Self::Number(v) if v.fract() == 0.0 && v.abs() <= MAX_SAFE_INTEGER => {
                serializer.serialize_i64(*v as i64)
            }
            Self::Number(v) => serializer.serialize_f64(*v),
            Self::Utf8(v) => serializer.serialize_str(v),
        }
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ScalarVisitor)
    }
}

struct ScalarVisitor;

impl<'de> Visitor<'de> for ScalarVisitor {
    type Value = Scalar;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string, number, boolean or null cell value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Scalar, E> {
        Ok(Scalar::Utf8(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Scalar, E> {
        Ok(Scalar::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Scalar, E> {
        Ok(Scalar::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Scalar, E> {
        Ok(Scalar::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Scalar, E> {
        Ok(Scalar::Utf8(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Scalar, E> {
        Ok(Scalar::Utf8(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Scalar, E> {
        Ok(Scalar::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Scalar, E> {
        Ok(Scalar::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Scalar, D::Error> {
        Scalar::deserialize(deserializer)
    }
}

/// Longest leading decimal literal of `text`, NaN when there is none.
/// `"12.5kg"` is 12.5, `"  7"` is 7, `"x"` and `""` are NaN.
#[must_use]
pub fn parse_float_prefix(text: &str) -> f64 {
    LEADING_DECIMAL
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(f64::NAN, |m| parse_decimal(m.as_str()))
}

/// Whole-string numeric conversion: surrounding whitespace is ignored, the
/// empty string is 0, `0x`/`0o`/`0b` prefixes are integer literals, and any
/// trailing garbage makes the result NaN.
#[must_use]
pub fn strict_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = trimmed.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix).map_or(f64::NAN, |v| v as f64);
        }
    }

    if WHOLE_DECIMAL.is_match(trimmed) {
        parse_decimal(trimmed)
    } else {
        f64::NAN
    }
}

fn parse_decimal(literal: &str) -> f64 {
    match literal {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        other => other.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// Canonical text for a number: integral values carry no fractional part,
/// negative zero prints as `0`, non-finite values print as `NaN`,
/// `Infinity` or `-Infinity`.
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_owned()
    } else if value == f64::INFINITY {
        "Infinity".to_owned()
    } else if value == f64::NEG_INFINITY {
        "-Infinity".to_owned()
    } else if value == 0.0 {
        "0".to_owned()
    } else {
        format!("{value}")
    }
}
