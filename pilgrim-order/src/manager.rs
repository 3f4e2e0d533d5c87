use pilgrim_core::StoreError;
use std::sync::Arc;
use tracing::info;

use crate::models::{BookingRecord, BookingRef, BookingStatus};
use crate::repository::BookingRepository;

/// Booking status rules plus the store write that applies them.
pub struct BookingLifecycle {
    bookings: Arc<dyn BookingRepository>,
}

impl BookingLifecycle {
    pub fn new(bookings: Arc<dyn BookingRepository>) -> Self {
        Self { bookings }
    }

    /// Statuses reachable from `from` in one step.
    pub fn allowed_transitions(from: BookingStatus) -> &'static [BookingStatus] {
        match from {
            BookingStatus::Pending => &[
                BookingStatus::DepositPaid,
                BookingStatus::Confirmed,
                BookingStatus::Cancelled,
            ],
            BookingStatus::DepositPaid => &[BookingStatus::Confirmed, BookingStatus::Cancelled],
            BookingStatus::Confirmed => &[BookingStatus::Completed, BookingStatus::Cancelled],
            BookingStatus::Completed | BookingStatus::Cancelled => &[],
        }
    }

    pub fn check_transition(from: BookingStatus, to: BookingStatus) -> Result<(), LifecycleError> {
        if Self::allowed_transitions(from).contains(&to) {
            Ok(())
        } else {
            Err(LifecycleError::InvalidTransition { from, to })
        }
    }

    /// Moves the booking to `to`. The rule check runs before any write and
    /// the write itself is a compare-and-set on the status read here.
    pub async fn transition(&self, reference: &BookingRef, to: BookingStatus) -> Result<BookingRecord, LifecycleError> {
        let booking = self
            .bookings
            .find_booking_by_reference(reference)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(reference.to_string()))?;

        Self::check_transition(booking.status, to)?;

        let updated = self.bookings.update_booking_status(reference, booking.status, to).await?;
        info!(booking_ref = %reference, from = %booking.status, to = %to, "Booking status changed");
        Ok(updated)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Booking not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error(transparent)]
    Store(#[from] StoreError),
}
