use pilgrim_core::money::{floor_share, Currency};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Hard ceiling on travelers per booking; larger groups go through the agency directly.
pub const MAX_TRAVELERS: u8 = 10;

/// Everything the price of a booking depends on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingInput {
    pub base_price: Decimal,
    pub traveler_count: u8,
    pub insurance_selected: bool,
    pub insurance_unit_cost: Decimal,
    pub flight_selected: bool,
    pub flight_included_in_tour: bool,
    pub flight_unit_cost: Decimal,
    pub currency: Currency,
}

/// Derived prices for a draft. Never stored on its own; the booking record
/// copies the figures at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSnapshot {
    pub currency: Currency,
    pub traveler_count: u8,
    pub base_total: Decimal,
    pub insurance_cost: Decimal,
    pub flight_cost: Decimal,
    /// True when the tour price already covers the flight.
    pub flight_included: bool,
    pub grand_total: Decimal,
    pub deposit: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Share of the grand total due at booking time, in percent.
    pub deposit_percent: Decimal,
    pub max_travelers: u8,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            deposit_percent: dec!(30),
            max_travelers: MAX_TRAVELERS,
        }
    }
}

pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn quote(&self, input: &PricingInput) -> Result<PricingSnapshot, PricingError> {
        if input.traveler_count == 0 || input.traveler_count > self.config.max_travelers {
            return Err(PricingError::TravelerCount {
                count: input.traveler_count,
                max: self.config.max_travelers,
            });
        }
        let base_price = check(input.currency, "base price", input.base_price)?;
        let insurance_unit = check(input.currency, "insurance cost", input.insurance_unit_cost)?;
        let flight_unit = check(input.currency, "flight cost", input.flight_unit_cost)?;

        let travelers = Decimal::from(input.traveler_count);
        let base_total = base_price * travelers;
        let insurance_cost = if input.insurance_selected {
            insurance_unit * travelers
        } else {
            Decimal::ZERO
        };
        // An included flight is part of the tour price, whatever the toggle says.
        let flight_cost = if input.flight_selected && !input.flight_included_in_tour {
            flight_unit * travelers
        } else {
            Decimal::ZERO
        };

        let grand_total = base_total + insurance_cost + flight_cost;
        let deposit = floor_share(grand_total, self.config.deposit_percent);
        let balance = grand_total - deposit;

        Ok(PricingSnapshot {
            currency: input.currency,
            traveler_count: input.traveler_count,
            base_total,
            insurance_cost,
            flight_cost,
            flight_included: input.flight_included_in_tour,
            grand_total,
            deposit,
            balance,
        })
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(PricingConfig::default())
    }
}

/// Prices a booking with the standard 30% deposit rule.
pub fn price_booking(input: &PricingInput) -> Result<PricingSnapshot, PricingError> {
    PricingEngine::default().quote(input)
}

fn check(currency: Currency, field: &'static str, amount: Decimal) -> Result<Decimal, PricingError> {
    currency
        .check_amount(amount)
        .map_err(|_| PricingError::InvalidAmount { field, amount })
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PricingError {
    #[error("Traveler count must be between 1 and {max}, got {count}")]
    TravelerCount { count: u8, max: u8 },

    #[error("Invalid {field}: {amount}")]
    InvalidAmount { field: &'static str, amount: Decimal },
}
