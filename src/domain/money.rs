//! Currency amounts and the platform commission rate.
//!
//! [`Money`] stores a non-negative amount in minor units (two decimal
//! places). Arithmetic is checked; callers turn `None` into
//! [`SettlementError::AmountOverflow`] or a domain-specific error before
//! mutating anything.
//!
//! On the wire amounts are decimal strings (`"3000.00"`) so that clients
//! never round-trip them through binary floating point. Input also accepts
//! JSON numbers for convenience.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

use crate::error::SettlementError;

/// Minor units per major currency unit.
pub const MINOR_PER_MAJOR: u64 = 100;

/// Basis points in 100 %.
pub const BPS_DENOMINATOR: u16 = 10_000;

/// A non-negative currency amount in minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema)]
#[schema(value_type = String, example = "3000.00")]
pub struct Money(u64);

/// Failure to parse a decimal amount string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyParseError {
    /// The string was empty.
    #[error("amount is empty")]
    Empty,
    /// The string contained something other than digits and one dot.
    #[error("malformed amount: {0}")]
    Malformed(String),
    /// More than two fractional digits.
    #[error("amount has more than two decimal places: {0}")]
    TooPrecise(String),
    /// The value does not fit in the representable range.
    #[error("amount out of range: {0}")]
    OutOfRange(String),
}

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from minor units.
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Creates an amount from whole major units, saturating at the maximum.
    #[must_use]
    pub const fn from_major(major: u64) -> Self {
        Self(major.saturating_mul(MINOR_PER_MAJOR))
    }

    /// Returns the amount in minor units.
    #[must_use]
    pub const fn minor(self) -> u64 {
        self.0
    }

    /// Returns `true` for a zero amount.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked subtraction; `None` when the result would be negative.
    #[must_use]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Addition clamped at the maximum representable amount.
    #[must_use]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Subtraction clamped at zero.
    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Checked multiplication by an integer factor.
    #[must_use]
    pub const fn checked_mul(self, factor: u64) -> Option<Self> {
        match self.0.checked_mul(factor) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Adds `rhs`, mapping overflow to [`SettlementError::AmountOverflow`].
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::AmountOverflow`] if the sum does not fit.
    pub fn try_add(self, rhs: Self) -> Result<Self, SettlementError> {
        self.checked_add(rhs).ok_or(SettlementError::AmountOverflow)
    }

    /// Ensures the amount is strictly positive.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidAmount`] for zero.
    pub fn ensure_positive(self) -> Result<Self, SettlementError> {
        if self.is_zero() {
            return Err(SettlementError::InvalidAmount(
                "amount must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }

    /// Ratio `self / whole` as a percentage, for display only.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percentage_of(self, whole: Self) -> f64 {
        if whole.is_zero() {
            return 0.0;
        }
        let pct = self.0 as f64 / whole.0 as f64 * 100.0;
        (pct * 100.0).round() / 100.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02}",
            self.0 / MINOR_PER_MAJOR,
            self.0 % MINOR_PER_MAJOR
        )
    }
}

impl FromStr for Money {
    type Err = MoneyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MoneyParseError::Empty);
        }
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || !all_digits(frac) {
            return Err(MoneyParseError::Malformed(s.to_string()));
        }
        if frac.len() > 2 {
            return Err(MoneyParseError::TooPrecise(s.to_string()));
        }

        let out_of_range = || MoneyParseError::OutOfRange(s.to_string());
        let major: u64 = whole.parse().map_err(|_| out_of_range())?;
        let minor: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().map_err(|_| out_of_range())? * 10,
            _ => frac.parse().map_err(|_| out_of_range())?,
        };

        major
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|m| m.checked_add(minor))
            .map(Self)
            .ok_or_else(out_of_range)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

/// Marker carried by every [`Money`] deserialization error, so request
/// extractors can report a bad amount as `invalid_amount`.
pub const AMOUNT_ERROR_TAG: &str = "money amount";

fn amount_error<E: de::Error>(reason: impl fmt::Display) -> E {
    E::custom(format_args!("invalid {AMOUNT_ERROR_TAG}: {reason}"))
}

struct MoneyVisitor;

impl Visitor<'_> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a non-negative {AMOUNT_ERROR_TAG} as a decimal string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        v.parse().map_err(amount_error)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        v.checked_mul(MINOR_PER_MAJOR)
            .map(Money)
            .ok_or_else(|| amount_error(MoneyParseError::OutOfRange(v.to_string())))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        let v = u64::try_from(v).map_err(|_| amount_error("must not be negative"))?;
        self.visit_u64(v)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        if !v.is_finite() || v < 0.0 {
            return Err(amount_error("must be a finite, non-negative number"));
        }
        // Two decimals is the finest granularity we accept, so format and
        // re-parse instead of scaling the float.
        format!("{v:.2}").parse().map_err(amount_error)
    }
}

/// Platform commission expressed in basis points of the gross payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = u16)]
pub struct CommissionRate(u16);

impl CommissionRate {
    /// 20%, used when no rate is configured.
    pub const DEFAULT: Self = Self(2000);

    /// Creates a rate from basis points.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidRequest`] above 10 000 bps.
    pub fn from_bps(bps: u16) -> Result<Self, SettlementError> {
        if bps > BPS_DENOMINATOR {
            return Err(SettlementError::InvalidRequest(format!(
                "commission rate {bps} bps exceeds 100%"
            )));
        }
        Ok(Self(bps))
    }

    /// Returns the rate in basis points.
    #[must_use]
    pub const fn bps(self) -> u16 {
        self.0
    }

    /// Splits a gross amount into `(creator_share, commission)`.
    ///
    /// The commission is rounded down to the minor unit and the creator
    /// receives the remainder, so the parts always add up to `gross`.
    #[must_use]
    pub fn split(self, gross: Money) -> (Money, Money) {
        let commission =
            u128::from(gross.minor()) * u128::from(self.0) / u128::from(BPS_DENOMINATOR);
        // commission <= gross because bps <= 10 000
        let commission = Money(u64::try_from(commission).unwrap_or(gross.minor()));
        (gross.saturating_sub(commission), commission)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn money(s: &str) -> Money {
        let Ok(m) = s.parse() else {
            panic!("valid amount {s}");
        };
        m
    }

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!(money("3000"), Money::from_major(3000));
        assert_eq!(money("12.5"), Money::from_minor(1250));
        assert_eq!(money("0.07"), Money::from_minor(7));
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert_eq!("".parse::<Money>(), Err(MoneyParseError::Empty));
        assert!(matches!("-5".parse::<Money>(), Err(MoneyParseError::Malformed(_))));
        assert!(matches!("1.234".parse::<Money>(), Err(MoneyParseError::TooPrecise(_))));
        assert!(matches!(".5".parse::<Money>(), Err(MoneyParseError::Malformed(_))));
        assert!(matches!(
            "99999999999999999999".parse::<Money>(),
            Err(MoneyParseError::OutOfRange(_))
        ));
    }

    #[test]
    fn displays_two_decimals() {
        assert_eq!(Money::from_minor(250_005).to_string(), "2500.05");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn deserializes_strings_and_numbers() {
        let from_str: Result<Money, _> = serde_json::from_str("\"10.25\"");
        let from_int: Result<Money, _> = serde_json::from_str("10");
        let from_float: Result<Money, _> = serde_json::from_str("10.5");
        let negative: Result<Money, _> = serde_json::from_str("-1");
        assert_eq!(from_str.ok(), Some(Money::from_minor(1025)));
        assert_eq!(from_int.ok(), Some(Money::from_major(10)));
        assert_eq!(from_float.ok(), Some(Money::from_minor(1050)));
        assert!(negative.is_err());
    }

    #[test]
    fn deserialize_errors_carry_the_amount_tag() {
        for raw in ["-5", "\"abc\"", "\"1.234\"", "true"] {
            let Err(e) = serde_json::from_str::<Money>(raw) else {
                panic!("{raw} should not parse");
            };
            assert!(e.to_string().contains(AMOUNT_ERROR_TAG), "{raw}: {e}");
        }
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&Money::from_major(5000)).unwrap_or_default();
        assert_eq!(json, "\"5000.00\"");
    }

    #[test]
    fn checked_sub_refuses_negative_results() {
        assert_eq!(Money::from_major(1).checked_sub(Money::from_major(2)), None);
    }

    #[test]
    fn commission_split_always_sums_to_gross() {
        let Ok(rate) = CommissionRate::from_bps(2000) else {
            panic!("valid rate");
        };
        let (share, commission) = rate.split(Money::from_major(3000));
        assert_eq!(share, Money::from_major(2400));
        assert_eq!(commission, Money::from_major(600));

        let (share, commission) = rate.split(Money::from_minor(3));
        assert_eq!(commission, Money::ZERO);
        assert_eq!(share, Money::from_minor(3));
    }

    #[test]
    fn commission_rate_above_hundred_percent_is_rejected() {
        assert!(CommissionRate::from_bps(10_001).is_err());
        assert!(CommissionRate::from_bps(10_000).is_ok());
    }
}
