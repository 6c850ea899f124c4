use crate::error::{BookingError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// Largest single charge accepted, in dollars.
pub const MAX_AMOUNT: Decimal = dec!(999999.99);

/// A positive currency amount with at most two decimal places.
///
/// Construction is the validation boundary: anything that is zero, negative,
/// carries sub-cent precision, or exceeds [`MAX_AMOUNT`] is rejected with
/// `InvalidAmount`. The inner value is always stored at scale 2 so that it
/// renders as `3.20`, never `3.2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(BookingError::InvalidAmount(format!(
                "{value} must be positive"
            )));
        }
        if value > MAX_AMOUNT {
            return Err(BookingError::InvalidAmount(format!(
                "{value} exceeds the maximum of {MAX_AMOUNT}"
            )));
        }
        if value.normalize().scale() > 2 {
            return Err(BookingError::InvalidAmount(format!(
                "{value} has sub-cent precision"
            )));
        }

        let mut scaled = value;
        scaled.rescale(2);
        Ok(Self(scaled))
    }

    /// Parses user input such as `"19.99"`. Non-numeric text (including
    /// `NaN` and `inf`) is an `InvalidAmount`.
    pub fn parse(input: &str) -> Result<Self> {
        let value = Decimal::from_str(input.trim())
            .map_err(|_| BookingError::InvalidAmount(format!("'{input}' is not a number")))?;
        Self::new(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn to_cents(self) -> Cents {
        // Scale is pinned to 2, so the mantissa is the amount in cents.
        Cents(self.0.mantissa() as i64)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = BookingError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Integer minor units (cents), the only unit the payment processor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Cents(pub i64);

impl Cents {
    pub const ZERO: Self = Self(0);

    /// Rounds a fractional cent value half-up (away from zero).
    pub fn round_half_up(value: Decimal) -> Result<Self> {
        value
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map(Self)
            .ok_or_else(|| BookingError::InvalidAmount(format!("{value} cents is out of range")))
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    pub fn to_amount(self) -> Result<Amount> {
        Amount::new(self.to_decimal())
    }
}

impl Add for Cents {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Cents {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
