//! Decimal money helpers shared by pricing, booking creation and admin analytics.
//!
//! Amounts are `rust_decimal::Decimal` everywhere; binary floating point never
//! touches a monetary value. Each currency declares its minor-unit exponent,
//! which bounds the precision prices may carry.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Currency {
    #[default]
    Eur,
    Usd,
    Gbp,
    Sar,
    Jpy,
}

impl Currency {
    pub fn code(self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Sar => "SAR",
            Currency::Jpy => "JPY",
        }
    }

    /// Number of decimal places of the currency's minor unit (ISO 4217).
    pub fn minor_units(self) -> u32 {
        match self {
            Currency::Jpy => 0,
            _ => 2,
        }
    }

    /// Rejects negative amounts and amounts finer than the minor unit.
    pub fn check_amount(self, amount: Decimal) -> CoreResult<Decimal> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(CoreError::ValidationError(format!(
                "amount {} must not be negative",
                amount
            )));
        }
        let normalized = amount.normalize();
        if normalized.scale() > self.minor_units() {
            return Err(CoreError::ValidationError(format!(
                "amount {} has more precision than {} allows",
                amount,
                self.code()
            )));
        }
        Ok(normalized)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EUR" => Ok(Currency::Eur),
            "USD" => Ok(Currency::Usd),
            "GBP" => Ok(Currency::Gbp),
            "SAR" => Ok(Currency::Sar),
            "JPY" => Ok(Currency::Jpy),
            other => Err(CoreError::ValidationError(format!("unsupported currency {}", other))),
        }
    }
}

/// `percent`% of `amount`, floored to whole currency units.
///
/// Flooring means a deposit is never over-charged; the remainder (including
/// any cents) stays in the balance.
pub fn floor_share(amount: Decimal, percent: Decimal) -> Decimal {
    (amount * percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::ToNegativeInfinity)
}

pub fn sum<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().fold(Decimal::ZERO, |acc, amount| acc + amount)
}

/// Period-over-period growth in percent, one decimal place, half-up.
///
/// A previous period of zero reports 100% growth when anything was earned
/// since and 0% otherwise.
pub fn growth_percent(previous: Decimal, current: Decimal) -> Decimal {
    if previous.is_zero() {
        return if current.is_zero() { Decimal::ZERO } else { Decimal::ONE_HUNDRED };
    }
    ((current - previous) / previous * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_floor_share_never_rounds_up() {
        assert_eq!(floor_share(dec!(6698), dec!(30)), dec!(2009));
        assert_eq!(floor_share(dec!(99.99), dec!(30)), dec!(29));
        assert_eq!(floor_share(dec!(0), dec!(30)), dec!(0));
    }

    #[test]
    fn test_check_amount_respects_minor_units() {
        assert!(Currency::Eur.check_amount(dec!(10.25)).is_ok());
        assert!(Currency::Eur.check_amount(dec!(10.250)).is_ok());
        assert!(Currency::Eur.check_amount(dec!(10.255)).is_err());
        assert!(Currency::Jpy.check_amount(dec!(1500)).is_ok());
        assert!(Currency::Jpy.check_amount(dec!(1500.5)).is_err());
        assert!(Currency::Usd.check_amount(dec!(-1)).is_err());
    }

    #[test]
    fn test_growth_percent() {
        assert_eq!(growth_percent(dec!(1000), dec!(1250)), dec!(25.0));
        assert_eq!(growth_percent(dec!(3000), dec!(1000)), dec!(-66.7));
        assert_eq!(growth_percent(dec!(0), dec!(10)), dec!(100));
        assert_eq!(growth_percent(dec!(0), dec!(0)), dec!(0));
    }

    #[test]
    fn test_sum_is_exact() {
        let cents = std::iter::repeat(dec!(0.10)).take(10);
        assert_eq!(sum(cents), dec!(1.00));
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("eur".parse::<Currency>().unwrap(), Currency::Eur);
        assert!("XYZ".parse::<Currency>().is_err());
    }
}
