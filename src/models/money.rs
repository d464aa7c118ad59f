//! Price normalization between dollars (what users type and see) and cents
//! (what the store holds and every filter compares against).
//!
//! Amounts are parsed with `rust_decimal` so no float rounding happens on the
//! way in. There are exactly two crossing points: [`DollarAmount`] /
//! [`Cents::from_dollars`] on the way in, [`DisplayPrice`] on the way out. `Cents` itself does not
//! implement `Serialize`, so a stored price can only leave the process through
//! `DisplayPrice`, and only once.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount is empty")]
    Empty,
    #[error("amount must not be negative")]
    Negative,
    #[error("amount is not a number: {0}")]
    Malformed(String),
    #[error("amount is too large")]
    Overflow,
}

/// Price in minor currency units. Always non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cents(i64);

impl Cents {
    pub fn new(value: i64) -> Result<Self, MoneyError> {
        if value < 0 {
            return Err(MoneyError::Negative);
        }
        Ok(Self(value))
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// Parse a dollar amount. Digits past the second decimal place are
    /// truncated, never rounded.
    pub fn from_dollars(input: &str) -> Result<Self, MoneyError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(MoneyError::Empty);
        }
        let amount =
            Decimal::from_str(input).map_err(|_| MoneyError::Malformed(input.to_string()))?;
        Self::from_decimal(amount)
    }

    pub fn from_decimal(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        amount
            .round_dp_with_strategy(2, RoundingStrategy::ToZero)
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|cents| cents.to_i64())
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Exact decimal rendering for text surfaces, e.g. `125000` -> `"1250.00"`.
    pub fn to_dollar_string(self) -> String {
        format!("{}.{:02}", self.0 / 100, self.0 % 100)
    }

    pub fn display(self) -> DisplayPrice {
        DisplayPrice(self)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.to_dollar_string())
    }
}

/// A dollar amount arriving from a client, already normalized to cents.
///
/// Accepts JSON numbers and numeric strings. Floats convert to the nearest
/// short decimal, so `19.99` becomes 1999 cents rather than 1998.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DollarAmount(Cents);

impl DollarAmount {
    pub fn cents(self) -> Cents {
        self.0
    }
}

impl From<Cents> for DollarAmount {
    fn from(cents: Cents) -> Self {
        Self(cents)
    }
}

impl<'de> Deserialize<'de> for DollarAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DollarVisitor;

        impl Visitor<'_> for DollarVisitor {
            type Value = DollarAmount;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a non-negative dollar amount")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Cents::from_decimal(Decimal::from(v)).map(DollarAmount).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Cents::from_decimal(Decimal::from(v)).map(DollarAmount).map_err(E::custom)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                let amount = Decimal::from_f64(v)
                    .ok_or_else(|| E::custom(MoneyError::Malformed(v.to_string())))?;
                Cents::from_decimal(amount).map(DollarAmount).map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Cents::from_dollars(v).map(DollarAmount).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(DollarVisitor)
    }
}

/// Outbound price in dollars. Serializes as a JSON number: whole-dollar
/// amounts as integers (`1250`), the rest with at most two decimals (`19.99`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayPrice(Cents);

impl Serialize for DisplayPrice {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let cents = self.0.get();
        if cents % 100 == 0 {
            return serializer.serialize_i64(cents / 100);
        }
        // at most two decimals, so the nearest f64 prints back identically
        match Decimal::new(cents, 2).to_f64() {
            Some(dollars) => serializer.serialize_f64(dollars),
            None => Err(serde::ser::Error::custom(MoneyError::Overflow)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_dollars() {
        assert_eq!(Cents::from_dollars("1250").unwrap().get(), 125_000);
        assert_eq!(Cents::from_dollars(" 1000 ").unwrap().get(), 100_000);
    }

    #[test]
    fn truncates_past_two_decimals() {
        assert_eq!(Cents::from_dollars("19.999").unwrap().get(), 1999);
        assert_eq!(Cents::from_dollars("0.5").unwrap().get(), 50);
        assert_eq!(Cents::from_dollars("1250.009").unwrap().get(), 125_000);
    }

    #[test]
    fn rejects_bad_amounts() {
        assert_eq!(Cents::from_dollars(""), Err(MoneyError::Empty));
        assert_eq!(Cents::from_dollars("-5"), Err(MoneyError::Negative));
        assert!(matches!(
            Cents::from_dollars("abc"),
            Err(MoneyError::Malformed(_))
        ));
        assert!(matches!(
            Cents::from_dollars("1.2.3"),
            Err(MoneyError::Malformed(_))
        ));
        assert_eq!(
            Cents::from_dollars("99999999999999999999"),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn display_price_is_exact_for_whole_dollars() {
        let json = serde_json::to_string(&Cents::new(125_000).unwrap().display()).unwrap();
        assert_eq!(json, "1250");

        let json = serde_json::to_string(&Cents::new(1999).unwrap().display()).unwrap();
        assert_eq!(json, "19.99");

        let json = serde_json::to_string(&Cents::new(125_050).unwrap().display()).unwrap();
        assert_eq!(json, "1250.5");
    }

    #[test]
    fn dollar_string_keeps_cents() {
        assert_eq!(Cents::new(125_000).unwrap().to_dollar_string(), "1250.00");
        assert_eq!(Cents::new(5).unwrap().to_dollar_string(), "0.05");
    }

    #[test]
    fn dollar_amount_reads_floats_through_decimal_form() {
        let amount: DollarAmount = serde_json::from_str("19.99").unwrap();
        assert_eq!(amount.cents().get(), 1999);

        let amount: DollarAmount = serde_json::from_str("\"850\"").unwrap();
        assert_eq!(amount.cents().get(), 85_000);

        let amount: DollarAmount = serde_json::from_str("1019.999").unwrap();
        assert_eq!(amount.cents().get(), 101_999);

        assert!(serde_json::from_str::<DollarAmount>("-1").is_err());
        assert!(serde_json::from_str::<DollarAmount>("-0.5").is_err());
    }
}
