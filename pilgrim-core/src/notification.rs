use async_trait::async_trait;
use pilgrim_shared::models::events::{BookingCreatedEvent, ConsultationRequestedEvent};

/// Outbound notification channel (confirmation to the requester, heads-up to
/// the operator inbox). Callers treat it as fire-and-forget: an error is
/// logged and never undoes the write that triggered it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn booking_created(
        &self,
        event: &BookingCreatedEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn consultation_requested(
        &self,
        event: &ConsultationRequestedEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
