use crate::domain::money::{Currency, Money};
use crate::error::{PayoutError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Which amount the tax rate applies to.
///
/// Both variants existed in the business rules at different times; the
/// policy makes the choice explicit instead of baking one in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxBase {
    /// Tax is computed on the base payout.
    #[default]
    BasePayout,
    /// Tax is computed on the base payout minus the platform fee.
    AfterPlatformFee,
}

/// Fee and tax rates applied when a session is approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutPolicy {
    platform_fee_rate: Decimal,
    tax_rate: Decimal,
    tax_base: TaxBase,
}

impl Default for PayoutPolicy {
    /// 10% platform fee, 18% tax on the base payout.
    fn default() -> Self {
        Self {
            platform_fee_rate: dec!(0.10),
            tax_rate: dec!(0.18),
            tax_base: TaxBase::BasePayout,
        }
    }
}

impl PayoutPolicy {
    /// Validates rates at construction. Both rates must lie in `[0, 1]`, and
    /// with [`TaxBase::BasePayout`] their sum must not exceed 1 so the final
    /// payout can never go negative.
    pub fn new(platform_fee_rate: Decimal, tax_rate: Decimal, tax_base: TaxBase) -> Result<Self> {
        for (name, rate) in [("platform fee", platform_fee_rate), ("tax", tax_rate)] {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(PayoutError::InvalidInput(format!(
                    "{name} rate {rate} is outside [0, 1]"
                )));
            }
        }
        if tax_base == TaxBase::BasePayout && platform_fee_rate + tax_rate > Decimal::ONE {
            return Err(PayoutError::InvalidInput(format!(
                "combined fee and tax rates exceed 1: {}",
                platform_fee_rate + tax_rate
            )));
        }
        Ok(Self {
            platform_fee_rate,
            tax_rate,
            tax_base,
        })
    }

    pub fn platform_fee_rate(&self) -> Decimal {
        self.platform_fee_rate
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    pub fn tax_base(&self) -> TaxBase {
        self.tax_base
    }

    /// Computes the payout breakdown for a single session.
    ///
    /// `base = rate * minutes / 60`, rounded once to minor units; fee and tax
    /// are each derived from the rounded base so a later re-computation from
    /// the same stored inputs reproduces the same figures.
    pub fn compute_session_payout(
        &self,
        hourly_rate: Money,
        duration_minutes: i64,
    ) -> Result<PayoutBreakdown> {
        if !hourly_rate.is_positive() {
            return Err(PayoutError::InvalidInput(format!(
                "hourly rate must be positive, got {hourly_rate}"
            )));
        }
        if duration_minutes <= 0 {
            return Err(PayoutError::InvalidInput(format!(
                "duration must be positive, got {duration_minutes} minutes"
            )));
        }

        let hours = Decimal::from(duration_minutes) / dec!(60);
        let base_payout = hourly_rate.mul_rate(hours);
        let platform_fee = base_payout.mul_rate(self.platform_fee_rate);
        let taxed_amount = match self.tax_base {
            TaxBase::BasePayout => base_payout,
            TaxBase::AfterPlatformFee => base_payout.try_sub(platform_fee)?,
        };
        let taxes = taxed_amount.mul_rate(self.tax_rate);
        let final_payout = base_payout.try_sub(platform_fee)?.try_sub(taxes)?;

        Ok(PayoutBreakdown {
            base_payout,
            platform_fee,
            taxes,
            final_payout,
        })
    }
}

/// The `{base, platform fee, taxes, final}` decomposition of an amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutBreakdown {
    pub base_payout: Money,
    pub platform_fee: Money,
    pub taxes: Money,
    pub final_payout: Money,
}

impl PayoutBreakdown {
    pub fn zero(currency: Currency) -> Self {
        let zero = Money::zero(currency);
        Self {
            base_payout: zero,
            platform_fee: zero,
            taxes: zero,
            final_payout: zero,
        }
    }

    pub fn currency(&self) -> Currency {
        self.base_payout.currency()
    }

    /// Component-wise sum. Aggregates preserve each member's own rounding;
    /// totals are never re-derived from an already-summed base.
    pub fn try_add(self, rhs: Self) -> Result<Self> {
        Ok(Self {
            base_payout: self.base_payout.try_add(rhs.base_payout)?,
            platform_fee: self.platform_fee.try_add(rhs.platform_fee)?,
            taxes: self.taxes.try_add(rhs.taxes)?,
            final_payout: self.final_payout.try_add(rhs.final_payout)?,
        })
    }
}
