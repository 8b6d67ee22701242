//! Fixed-point money type.
//!
//! All monetary amounts (wallet balances, unit prices, line totals, order
//! totals) use a 1e-2 (minor unit) fixed-point representation stored as
//! `i64`. Floats never touch money: decimal strings are parsed directly into
//! minor units and anything finer than one minor unit is rejected instead of
//! rounded.
//!
//! `Money` wraps the raw `i64` so the type system prevents mixing amounts
//! with quantities or other plain integers. There is no `From<i64>`.
//!
//! Over the wire `Money` is a decimal string (`"75.00"`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Minor units per major currency unit.
pub const MINOR_SCALE: i64 = 100;

// ---------------------------------------------------------------------------
// Money newtype
// ---------------------------------------------------------------------------

/// A monetary amount in minor units (1/100 of the currency unit).
///
/// `Money::new(7_500)` is 75.00.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);
    pub const MAX: Money = Money(i64::MAX);

    /// Construct from raw minor units.
    #[inline]
    pub const fn new(minor: i64) -> Self {
        Money(minor)
    }

    /// Construct from a whole number of major units (`from_major(75)` is 75.00).
    ///
    /// Returns `None` on overflow.
    #[inline]
    pub fn from_major(major: i64) -> Option<Self> {
        major.checked_mul(MINOR_SCALE).map(Money)
    }

    /// Underlying minor units.
    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    #[inline]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    #[inline]
    pub fn saturating_add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }

    /// Multiply a unit price by an item count.
    ///
    /// Returns `None` on overflow. Overflow in a line total is a resolution
    /// error for that line, never a silent clamp.
    #[inline]
    pub fn checked_mul_qty(self, qty: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(qty)).map(Money)
    }

    /// Parse a decimal string (`"60"`, `"60.5"`, `"-12.75"`) into minor units.
    ///
    /// Rejects more than two fractional digits, exponents, empty input and
    /// anything that is not plain ASCII digits around a single `.`.
    pub fn parse_decimal(s: &str) -> Result<Money, MoneyError> {
        let t = s.trim();
        if t.is_empty() {
            return Err(MoneyError::Empty);
        }

        let (negative, body) = match t.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, t.strip_prefix('+').unwrap_or(t)),
        };

        let mut parts = body.split('.');
        let int_part = parts.next().unwrap_or("");
        let frac_part = parts.next();
        if parts.next().is_some() {
            return Err(MoneyError::Invalid(t.to_string()));
        }
        if int_part.is_empty() && frac_part.map_or(true, str::is_empty) {
            return Err(MoneyError::Invalid(t.to_string()));
        }
        if !int_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(MoneyError::Invalid(t.to_string()));
        }

        let int_val: i64 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| MoneyError::Overflow(t.to_string()))?
        };

        let frac_val: i64 = match frac_part {
            None | Some("") => 0,
            Some(frac) => {
                if !frac.chars().all(|c| c.is_ascii_digit()) {
                    return Err(MoneyError::Invalid(t.to_string()));
                }
                if frac.len() > 2 {
                    return Err(MoneyError::TooPrecise(t.to_string()));
                }
                let padded = format!("{frac:0<2}");
                padded
                    .parse()
                    .map_err(|_| MoneyError::Invalid(t.to_string()))?
            }
        };

        let magnitude = int_val
            .checked_mul(MINOR_SCALE)
            .and_then(|v| v.checked_add(frac_val))
            .ok_or_else(|| MoneyError::Overflow(t.to_string()))?;

        Ok(Money(if negative { -magnitude } else { magnitude }))
    }
}

// ---------------------------------------------------------------------------
// MoneyError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    Empty,
    Invalid(String),
    /// More than two fractional digits.
    TooPrecise(String),
    Overflow(String),
}

impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoneyError::Empty => write!(f, "empty money amount"),
            MoneyError::Invalid(s) => write!(f, "invalid money amount: {s:?}"),
            MoneyError::TooPrecise(s) => {
                write!(f, "money amount has more than 2 decimal places: {s:?}")
            }
            MoneyError::Overflow(s) => write!(f, "money amount out of range: {s:?}"),
        }
    }
}

impl std::error::Error for MoneyError {}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse_decimal(s)
    }
}

// ---------------------------------------------------------------------------
// Display / serde
// ---------------------------------------------------------------------------

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let major = self.0 / MINOR_SCALE;
        let minor = (self.0 % MINOR_SCALE).abs();
        // -0.50 would otherwise lose its sign because major truncates to 0.
        if self.0 < 0 && major == 0 {
            write!(f, "-{major}.{minor:02}")
        } else {
            write!(f, "{major}.{minor:02}")
        }
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Money::parse_decimal(&raw).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
