use async_trait::async_trait;
use pilgrim_core::StoreResult;
use std::time::Duration;
use uuid::Uuid;

use crate::consultation::{ConsultationRequest, ConsultationStatus};
use crate::models::{BookingRecord, BookingRef, BookingStatus, NewBooking, Traveler};
use crate::wizard::BookingDraft;

/// Booking persistence.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_booking_by_reference(&self, reference: &BookingRef) -> StoreResult<Option<BookingRecord>>;

    /// Persists the whole booking in one transaction: customer upsert by lead
    /// traveler email, booking row, travelers and the deposit payment record.
    ///
    /// A reference that is already taken fails with
    /// `StoreError::DuplicateReference` and nothing is written.
    async fn create_booking(&self, reference: &BookingRef, booking: &NewBooking) -> StoreResult<BookingRecord>;

    async fn list_bookings(&self, status: Option<BookingStatus>) -> StoreResult<Vec<BookingRecord>>;

    /// Compare-and-set on the status column. Fails with `StoreError::Conflict`
    /// if the booking is no longer in `from`.
    async fn update_booking_status(
        &self,
        reference: &BookingRef,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<BookingRecord>;

    async fn booking_travelers(&self, booking_id: Uuid) -> StoreResult<Vec<Traveler>>;
}

#[async_trait]
pub trait ConsultationRepository: Send + Sync {
    async fn create_consultation(&self, request: &ConsultationRequest) -> StoreResult<ConsultationRequest>;

    async fn list_consultations(&self, status: Option<ConsultationStatus>) -> StoreResult<Vec<ConsultationRequest>>;

    async fn get_consultation(&self, id: Uuid) -> StoreResult<Option<ConsultationRequest>>;

    async fn update_consultation_status(
        &self,
        id: Uuid,
        status: ConsultationStatus,
    ) -> StoreResult<ConsultationRequest>;
}

/// Short-lived storage for wizard sessions.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn save_draft(&self, draft: &BookingDraft, ttl: Duration) -> StoreResult<()>;

    async fn load_draft(&self, id: Uuid) -> StoreResult<Option<BookingDraft>>;

    async fn delete_draft(&self, id: Uuid) -> StoreResult<()>;

    /// Takes the one-time right to submit draft `id`. Returns false when
    /// another request already holds it. The claim outlives the draft's own
    /// TTL so a committed draft can never be claimed again.
    async fn claim_submission(&self, id: Uuid, ttl: Duration) -> StoreResult<bool>;

    /// Gives the claim back after a submission that wrote nothing.
    async fn release_submission(&self, id: Uuid) -> StoreResult<()>;
}
