use crate::error::{PayoutError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// All monetary values are quantized to two decimal places (minor units).
pub const MINOR_UNIT_SCALE: u32 = 2;

/// ISO-style currency code carried by every monetary value.
///
/// Conversion between currencies is out of scope; mixing currencies in
/// arithmetic is rejected instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Gbp,
    Inr,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Inr => "INR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = PayoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            "INR" => Ok(Self::Inr),
            other => Err(PayoutError::InvalidInput(format!(
                "unsupported currency code: {other}"
            ))),
        }
    }
}

/// A fixed-point monetary value.
///
/// Wraps `rust_decimal::Decimal` pinned to [`MINOR_UNIT_SCALE`] so every
/// stored amount is an exact number of minor units. Rounding uses banker's
/// rounding (`MidpointNearestEven`) and is applied at construction and after
/// every multiplication, never accumulated across re-computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Builds a value from an arbitrary decimal amount, quantizing to minor
    /// units with banker's rounding.
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self {
            amount: quantize(amount),
            currency,
        }
    }

    /// Builds a value from an integer count of minor units (e.g. cents).
    pub fn from_minor_units(minor: i64, currency: Currency) -> Self {
        Self {
            amount: Decimal::new(minor, MINOR_UNIT_SCALE),
            currency,
        }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::from_minor_units(0, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// Exact addition; fails when the currencies differ.
    pub fn try_add(self, rhs: Self) -> Result<Self> {
        self.require_same_currency(rhs)?;
        Ok(Self {
            amount: self.amount + rhs.amount,
            currency: self.currency,
        })
    }

    /// Exact subtraction; fails when the currencies differ.
    pub fn try_sub(self, rhs: Self) -> Result<Self> {
        self.require_same_currency(rhs)?;
        Ok(Self {
            amount: self.amount - rhs.amount,
            currency: self.currency,
        })
    }

    /// Multiplies by a dimensionless rate and re-quantizes to minor units.
    pub fn mul_rate(self, rate: Decimal) -> Self {
        Self {
            amount: quantize(self.amount * rate),
            currency: self.currency,
        }
    }

    fn require_same_currency(&self, rhs: Self) -> Result<()> {
        if self.currency == rhs.currency {
            Ok(())
        } else {
            Err(PayoutError::InvalidInput(format!(
                "currency mismatch: {} vs {}",
                self.currency, rhs.currency
            )))
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

fn quantize(amount: Decimal) -> Decimal {
    let mut rounded =
        amount.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(MINOR_UNIT_SCALE);
    rounded
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quantizes_to_minor_units() {
        let m = Money::new(dec!(10), Currency::Usd);
        assert_eq!(m.amount().to_string(), "10.00");

        let m = Money::new(dec!(10.005), Currency::Usd);
        // Banker's rounding: 10.005 -> 10.00 (even neighbor).
        assert_eq!(m.amount(), dec!(10.00));

        let m = Money::new(dec!(10.015), Currency::Usd);
        assert_eq!(m.amount(), dec!(10.02));
    }

    #[test]
    fn test_arithmetic_same_currency() {
        let a = Money::from_minor_units(1050, Currency::Usd);
        let b = Money::from_minor_units(250, Currency::Usd);
        assert_eq!(a.try_add(b).unwrap(), Money::new(dec!(13.00), Currency::Usd));
        assert_eq!(a.try_sub(b).unwrap(), Money::new(dec!(8.00), Currency::Usd));
    }

    #[test]
    fn test_currency_mismatch_rejected() {
        let usd = Money::zero(Currency::Usd);
        let inr = Money::zero(Currency::Inr);
        assert!(matches!(
            usd.try_add(inr),
            Err(PayoutError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_mul_rate_rounds_half_even() {
        let m = Money::new(dec!(10.05), Currency::Usd);
        // 10.05 * 0.5 = 5.025 -> 5.02 under half-even.
        assert_eq!(m.mul_rate(dec!(0.5)).amount(), dec!(5.02));
    }

    #[test]
    fn test_currency_round_trip() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!(Currency::Inr.to_string(), "INR");
        assert!("XXX".parse::<Currency>().is_err());
    }
}
