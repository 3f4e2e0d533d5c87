use chrono::{DateTime, NaiveDate, Utc};
use pilgrim_catalog::{PricingEngine, PricingInput, PricingSnapshot, Tour};
use pilgrim_core::{money::Currency, PaymentMethod};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{Step, WizardError};
use crate::models::{BookingRef, TravelerRecord};
use crate::validation::TravelerErrors;

/// The tour terms a draft was started with. Copied so later catalog edits
/// do not change the price under a user mid-booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourQuote {
    pub tour_id: Uuid,
    pub slug: String,
    pub title: String,
    pub currency: Currency,
    pub base_price: Decimal,
    pub insurance_unit_cost: Decimal,
    pub flight_unit_cost: Decimal,
    pub flight_included: bool,
    pub departure_date: Option<NaiveDate>,
}

impl From<&Tour> for TourQuote {
    fn from(tour: &Tour) -> Self {
        Self {
            tour_id: tour.id,
            slug: tour.slug.clone(),
            title: tour.title.clone(),
            currency: tour.currency,
            base_price: tour.base_price,
            insurance_unit_cost: tour.insurance_unit_cost,
            flight_unit_cost: tour.flight_unit_cost,
            flight_included: tour.flight_included,
            departure_date: tour.departure_date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddOns {
    pub insurance: bool,
    /// Always true when the tour includes the flight.
    pub flight: bool,
}

/// An in-progress booking. Lives in the draft store between requests and is
/// discarded when abandoned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingDraft {
    pub id: Uuid,
    pub quote: TourQuote,
    pub travelers: Vec<TravelerRecord>,
    pub add_ons: AddOns,
    pub payment_method: PaymentMethod,
    pub terms_accepted: bool,
    pub special_requests: Option<String>,
    pub step: Step,
    /// Field errors from the last failed advance, cleared field by field as
    /// the user edits.
    pub errors: TravelerErrors,
    /// Non-blocking "did you mean" email suggestions, by traveler.
    pub email_hints: BTreeMap<Uuid, String>,
    pub booking_ref: Option<BookingRef>,
    pub created_at: DateTime<Utc>,
}

impl BookingDraft {
    pub fn new(quote: TourQuote) -> Self {
        let add_ons = AddOns {
            insurance: false,
            flight: quote.flight_included,
        };
        Self {
            id: Uuid::new_v4(),
            quote,
            travelers: vec![TravelerRecord::blank()],
            add_ons,
            payment_method: PaymentMethod::BankTransfer,
            terms_accepted: false,
            special_requests: None,
            step: Step::TravelerInfo,
            errors: TravelerErrors::new(),
            email_hints: BTreeMap::new(),
            booking_ref: None,
            created_at: Utc::now(),
        }
    }

    /// The traveler counter is the traveler list itself, so the two can
    /// never disagree.
    pub fn traveler_count(&self) -> u8 {
        u8::try_from(self.travelers.len()).unwrap_or(u8::MAX)
    }

    pub fn pricing_input(&self) -> PricingInput {
        PricingInput {
            base_price: self.quote.base_price,
            traveler_count: self.traveler_count(),
            insurance_selected: self.add_ons.insurance,
            insurance_unit_cost: self.quote.insurance_unit_cost,
            flight_selected: self.add_ons.flight,
            flight_included_in_tour: self.quote.flight_included,
            flight_unit_cost: self.quote.flight_unit_cost,
            currency: self.quote.currency,
        }
    }

    pub fn pricing(&self, engine: &PricingEngine) -> Result<PricingSnapshot, WizardError> {
        Ok(engine.quote(&self.pricing_input())?)
    }

    /// Position and id of the first traveler with errors, for scrolling the
    /// form to it.
    pub fn first_invalid_traveler(&self) -> Option<(usize, Uuid)> {
        self.travelers
            .iter()
            .enumerate()
            .find(|(_, traveler)| self.errors.contains_key(&traveler.id))
            .map(|(index, traveler)| (index, traveler.id))
    }

    pub fn is_submitted(&self) -> bool {
        self.step == Step::Submitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(flight_included: bool) -> TourQuote {
        TourQuote {
            tour_id: Uuid::new_v4(),
            slug: "umrah-spring".into(),
            title: "Umrah Spring".into(),
            currency: Currency::Eur,
            base_price: dec!(1650),
            insurance_unit_cost: dec!(99),
            flight_unit_cost: dec!(450),
            flight_included,
            departure_date: NaiveDate::from_ymd_opt(2027, 3, 1),
        }
    }

    #[test]
    fn test_new_draft_starts_with_one_traveler() {
        let draft = BookingDraft::new(quote(false));
        assert_eq!(draft.traveler_count(), 1);
        assert_eq!(draft.step, Step::TravelerInfo);
        assert!(!draft.add_ons.flight);
    }

    #[test]
    fn test_included_flight_is_locked_on() {
        let draft = BookingDraft::new(quote(true));
        assert!(draft.add_ons.flight);

        let pricing = draft.pricing(&PricingEngine::default()).unwrap();
        assert_eq!(pricing.flight_cost, dec!(0));
        assert_eq!(pricing.grand_total, dec!(1650));
    }

    #[test]
    fn test_draft_survives_serialization() {
        let draft = BookingDraft::new(quote(false));
        let json = serde_json::to_string(&draft).unwrap();
        let restored: BookingDraft = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, draft);
    }
}
