use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::pii::Masked;

/// Who a notification is addressed to. Every finalized booking or
/// consultation produces one message per audience.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Audience {
    Requester,
    Operator,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCreatedEvent {
    pub booking_id: Uuid,
    pub booking_ref: String,
    pub tour_id: Uuid,
    pub tour_title: String,
    pub departure_date: Option<NaiveDate>,
    pub lead_traveler_name: String,
    pub customer_email: Masked<String>,
    pub traveler_count: u8,
    pub currency: String,
    pub total: Decimal,
    pub deposit: Decimal,
    pub balance: Decimal,
    pub payment_method: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ConsultationRequestedEvent {
    pub consultation_id: Uuid,
    pub full_name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
    /// Drives the calendar invite sent alongside the confirmation.
    pub preferred_date: Option<NaiveDate>,
    pub preferred_time: Option<String>,
    pub tour_interest: Option<String>,
    pub message: String,
    pub timestamp: i64,
}

/// Envelope published to the notification topics.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct NotificationEnvelope<E> {
    pub audience: Audience,
    pub event: E,
}
