use chrono::{DateTime, NaiveDate, Utc};
use pilgrim_catalog::PricingSnapshot;
use pilgrim_core::{money::Currency, CoreError, PaymentMethod};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    DepositPaid,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::DepositPaid,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::DepositPaid => "DEPOSIT_PAID",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::ValidationError(format!("unknown booking status {}", s)))
    }
}

/// Human-readable booking identifier, `PREFIX-XXXXX`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingRef(String);

impl BookingRef {
    pub const SUFFIX_LEN: usize = 5;

    /// Accepts `PREFIX-XXXXX` where the prefix is 1..=8 uppercase letters and
    /// the suffix five characters of `[A-Z0-9]`.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        let value = value.trim().to_ascii_uppercase();
        let valid = match value.split_once('-') {
            Some((prefix, suffix)) => {
                (1..=8).contains(&prefix.len())
                    && prefix.chars().all(|c| c.is_ascii_uppercase())
                    && suffix.len() == Self::SUFFIX_LEN
                    && suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            }
            None => false,
        };
        if valid {
            Ok(Self(value))
        } else {
            Err(CoreError::ValidationError(format!("malformed booking reference {}", value)))
        }
    }

    pub(crate) fn from_parts(prefix: &str, suffix: &str) -> Self {
        Self(format!("{}-{}", prefix, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One traveler as typed into the wizard. Values stay raw until validation
/// turns them into a [`Traveler`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelerRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub passport_number: String,
    /// `YYYY-MM-DD`
    pub passport_expiry: String,
    /// `YYYY-MM-DD`
    pub date_of_birth: String,
    pub nationality: String,
}

impl TravelerRecord {
    pub fn blank() -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone: String::new(),
            passport_number: String::new(),
            passport_expiry: String::new(),
            date_of_birth: String::new(),
            nationality: String::new(),
        }
    }
}

/// A traveler that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traveler {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub passport_number: String,
    pub passport_expiry: NaiveDate,
    pub date_of_birth: NaiveDate,
    pub nationality: String,
}

impl Traveler {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    /// Stored lower-cased; customers are looked up by email.
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

/// Everything the store needs to persist a booking in one transaction:
/// customer (by lead traveler email), booking row, travelers, payment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub tour_id: Uuid,
    pub tour_title: String,
    pub departure_date: Option<NaiveDate>,
    pub travelers: Vec<Traveler>,
    pub pricing: PricingSnapshot,
    pub insurance_selected: bool,
    pub flight_selected: bool,
    pub payment_method: PaymentMethod,
    pub terms_accepted: bool,
    pub special_requests: Option<String>,
}

impl NewBooking {
    /// The first traveler is the contact person for the booking.
    pub fn lead_traveler(&self) -> Option<&Traveler> {
        self.travelers.first()
    }
}

/// A persisted booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: Uuid,
    pub booking_ref: BookingRef,
    pub tour_id: Uuid,
    pub customer_id: Uuid,
    pub traveler_count: u8,
    pub currency: Currency,
    pub base_amount: Decimal,
    pub insurance_amount: Decimal,
    pub flight_amount: Decimal,
    pub total_amount: Decimal,
    pub deposit_amount: Decimal,
    pub insurance_selected: bool,
    pub flight_selected: bool,
    pub payment_method: PaymentMethod,
    pub status: BookingStatus,
    pub special_requests: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingRecord {
    /// Builds the record a store writes for `booking` under `reference`.
    pub fn from_new(reference: BookingRef, customer_id: Uuid, booking: &NewBooking) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_ref: reference,
            tour_id: booking.tour_id,
            customer_id,
            traveler_count: booking.pricing.traveler_count,
            currency: booking.pricing.currency,
            base_amount: booking.pricing.base_total,
            insurance_amount: booking.pricing.insurance_cost,
            flight_amount: booking.pricing.flight_cost,
            total_amount: booking.pricing.grand_total,
            deposit_amount: booking.pricing.deposit,
            insurance_selected: booking.insurance_selected,
            flight_selected: booking.flight_selected,
            payment_method: booking.payment_method,
            status: BookingStatus::Pending,
            special_requests: booking.special_requests.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn balance_amount(&self) -> Decimal {
        self.total_amount - self.deposit_amount
    }
}

/// Payment intent created with every booking; the deposit is what is due first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub currency: Currency,
    pub status: pilgrim_core::payment::PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn deposit_for(booking: &BookingRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            method: booking.payment_method,
            amount: booking.deposit_amount,
            currency: booking.currency,
            status: pilgrim_core::payment::PaymentStatus::Pending,
            created_at: booking.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_ref_parse() {
        let reference = BookingRef::parse("plg-a1b2c").unwrap();
        assert_eq!(reference.as_str(), "PLG-A1B2C");
        assert!(BookingRef::parse("PLG-A1B2").is_err());
        assert!(BookingRef::parse("PLGA1B2C").is_err());
        assert!(BookingRef::parse("PLG-A1B2!").is_err());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in BookingStatus::ALL {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(!BookingStatus::DepositPaid.is_terminal());
    }
}
