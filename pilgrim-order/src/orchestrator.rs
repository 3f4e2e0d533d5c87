use pilgrim_core::{Notifier, StoreError};
use pilgrim_shared::models::events::BookingCreatedEvent;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::models::{BookingRecord, NewBooking};
use crate::reference::{AllocationError, ReferenceAllocator};
use crate::repository::BookingRepository;
use crate::wizard::WizardError;

/// Turns a finished wizard into a stored booking.
///
/// Allocation pre-checks the reference, the store's unique constraint closes
/// the remaining race, and a `DuplicateReference` from the store is retried
/// with a fresh reference under the allocator's attempt cap.
pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    allocator: ReferenceAllocator,
    notifier: Arc<dyn Notifier>,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        allocator: ReferenceAllocator,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            bookings,
            allocator,
            notifier,
        }
    }

    pub fn bookings(&self) -> &Arc<dyn BookingRepository> {
        &self.bookings
    }

    pub async fn submit(&self, booking: NewBooking) -> Result<BookingRecord, SubmitError> {
        if !booking.terms_accepted {
            return Err(WizardError::TermsNotAccepted.into());
        }
        if booking.travelers.is_empty() {
            return Err(WizardError::MinimumTravelers.into());
        }

        let attempts = self.allocator.max_attempts();
        for attempt in 1..=attempts {
            let reference = self.allocator.allocate(self.bookings.as_ref()).await?;
            match self.bookings.create_booking(&reference, &booking).await {
                Ok(record) => {
                    info!(
                        booking_ref = %record.booking_ref,
                        tour_id = %record.tour_id,
                        travelers = record.traveler_count,
                        total = %record.total_amount,
                        "Booking created"
                    );
                    self.notify(&record, &booking);
                    return Ok(record);
                }
                Err(StoreError::DuplicateReference(taken)) => {
                    warn!(booking_ref = %taken, attempt, "Booking reference taken at insert, retrying");
                }
                Err(e) => {
                    error!("Failed to persist booking: {}", e);
                    return Err(e.into());
                }
            }
        }
        Err(SubmitError::Allocation(AllocationError::Exhausted { attempts }))
    }

    /// Fire-and-forget: the booking is already committed, so a mailer outage
    /// is logged and never reported to the customer.
    fn notify(&self, record: &BookingRecord, booking: &NewBooking) {
        let Some(event) = booking_event(record, booking) else {
            return;
        };
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.booking_created(&event).await {
                warn!(booking_ref = %event.booking_ref, "Booking notification failed: {}", e);
            }
        });
    }
}

pub fn booking_event(record: &BookingRecord, booking: &NewBooking) -> Option<BookingCreatedEvent> {
    let lead = booking.lead_traveler()?;
    Some(BookingCreatedEvent {
        booking_id: record.id,
        booking_ref: record.booking_ref.to_string(),
        tour_id: record.tour_id,
        tour_title: booking.tour_title.clone(),
        departure_date: booking.departure_date,
        lead_traveler_name: lead.full_name(),
        customer_email: lead.email.clone().into(),
        traveler_count: record.traveler_count,
        currency: record.currency.code().to_string(),
        total: record.total_amount,
        deposit: record.deposit_amount,
        balance: record.balance_amount(),
        payment_method: record.payment_method.as_str().to_string(),
        timestamp: record.created_at.timestamp(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Wizard(#[from] WizardError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("Could not save the booking: {0}")]
    Store(#[from] StoreError),

    #[error("This booking is already being submitted")]
    AlreadyClaimed,
}

impl SubmitError {
    /// True when resubmitting the same draft may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SubmitError::Wizard(_) => false,
            SubmitError::Allocation(err) => err.is_transient(),
            SubmitError::Store(err) => err.is_transient(),
            SubmitError::AlreadyClaimed => false,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use pilgrim_catalog::{price_booking, PricingInput};
    use pilgrim_core::{money::Currency, PaymentMethod, StoreResult};
    use pilgrim_shared::models::events::ConsultationRequestedEvent;
    use rust_decimal_macros::dec;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use crate::models::{BookingRef, BookingStatus, Traveler};

    pub(crate) fn traveler(first_name: &str) -> Traveler {
        Traveler {
            id: Uuid::new_v4(),
            first_name: first_name.into(),
            last_name: "Haddad".into(),
            email: format!("{}@example.com", first_name.to_lowercase()),
            phone: "+33612345678".into(),
            passport_number: "X1234567".into(),
            passport_expiry: NaiveDate::from_ymd_opt(2031, 1, 1).unwrap(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 2, 3).unwrap(),
            nationality: "French".into(),
        }
    }

    pub(crate) fn new_booking() -> NewBooking {
        let pricing = price_booking(&PricingInput {
            base_price: dec!(2500),
            traveler_count: 2,
            insurance_selected: true,
            insurance_unit_cost: dec!(99),
            flight_selected: true,
            flight_included_in_tour: false,
            flight_unit_cost: dec!(750),
            currency: Currency::Eur,
        })
        .unwrap();
        NewBooking {
            tour_id: Uuid::new_v4(),
            tour_title: "Umrah Ramadan".into(),
            departure_date: NaiveDate::from_ymd_opt(2027, 2, 20),
            travelers: vec![traveler("Amina"), traveler("Yusuf")],
            pricing,
            insurance_selected: true,
            flight_selected: true,
            payment_method: PaymentMethod::BankTransfer,
            terms_accepted: true,
            special_requests: None,
        }
    }

    /// In-memory bookings whose inserts can be scripted to fail.
    #[derive(Default)]
    pub(crate) struct ScriptedBookings {
        pub(crate) stored: Mutex<HashMap<BookingRef, BookingRecord>>,
        pub(crate) insert_failures: Mutex<VecDeque<StoreError>>,
    }

    #[async_trait]
    impl BookingRepository for ScriptedBookings {
        async fn find_booking_by_reference(&self, reference: &BookingRef) -> StoreResult<Option<BookingRecord>> {
            Ok(self.stored.lock().unwrap().get(reference).cloned())
        }

        async fn create_booking(&self, reference: &BookingRef, booking: &NewBooking) -> StoreResult<BookingRecord> {
            if let Some(err) = self.insert_failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            let record = BookingRecord::from_new(reference.clone(), Uuid::new_v4(), booking);
            self.stored.lock().unwrap().insert(reference.clone(), record.clone());
            Ok(record)
        }

        async fn list_bookings(&self, status: Option<BookingStatus>) -> StoreResult<Vec<BookingRecord>> {
            Ok(self
                .stored
                .lock()
                .unwrap()
                .values()
                .filter(|b| status.map_or(true, |s| b.status == s))
                .cloned()
                .collect())
        }

        async fn update_booking_status(
            &self,
            reference: &BookingRef,
            _from: BookingStatus,
            to: BookingStatus,
        ) -> StoreResult<BookingRecord> {
            let mut stored = self.stored.lock().unwrap();
            let record = stored
                .get_mut(reference)
                .ok_or_else(|| StoreError::NotFound(reference.to_string()))?;
            record.status = to;
            Ok(record.clone())
        }

        async fn booking_travelers(&self, _booking_id: Uuid) -> StoreResult<Vec<Traveler>> {
            Ok(vec![])
        }
    }

    /// Forwards every booking event to a channel so tests can await it.
    pub(crate) struct ChannelNotifier {
        pub(crate) tx: mpsc::UnboundedSender<BookingCreatedEvent>,
        pub(crate) fail: bool,
    }

    #[async_trait]
    impl Notifier for ChannelNotifier {
        async fn booking_created(&self, event: &BookingCreatedEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            let _ = self.tx.send(event.clone());
            if self.fail {
                return Err("smtp relay refused connection".into());
            }
            Ok(())
        }

        async fn consultation_requested(
            &self,
            _event: &ConsultationRequestedEvent,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }
    }

    fn service(
        repo: Arc<ScriptedBookings>,
        fail_notifications: bool,
    ) -> (BookingService, mpsc::UnboundedReceiver<BookingCreatedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Arc::new(ChannelNotifier {
            tx,
            fail: fail_notifications,
        });
        let service = BookingService::new(repo, ReferenceAllocator::seeded("PLG", 10, 9), notifier);
        (service, rx)
    }

    #[tokio::test]
    async fn test_submit_persists_and_notifies() {
        let repo = Arc::new(ScriptedBookings::default());
        let (service, mut rx) = service(repo.clone(), false);

        let record = service.submit(new_booking()).await.unwrap();
        assert_eq!(record.status, BookingStatus::Pending);
        assert_eq!(record.total_amount, dec!(6698));
        assert_eq!(record.deposit_amount, dec!(2009));
        assert!(repo.stored.lock().unwrap().contains_key(&record.booking_ref));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.booking_ref, record.booking_ref.to_string());
        assert_eq!(event.balance, dec!(4689));
        assert_eq!(event.lead_traveler_name, "Amina Haddad");
    }

    #[tokio::test]
    async fn test_duplicate_reference_at_insert_is_retried() {
        let repo = Arc::new(ScriptedBookings::default());
        repo.insert_failures
            .lock()
            .unwrap()
            .extend([StoreError::DuplicateReference("PLG-AAAAA".into()), StoreError::DuplicateReference("PLG-BBBBB".into())]);
        let (service, _rx) = service(repo.clone(), false);

        let record = service.submit(new_booking()).await.unwrap();
        assert_eq!(repo.stored.lock().unwrap().len(), 1);
        assert!(repo.stored.lock().unwrap().contains_key(&record.booking_ref));
    }

    #[tokio::test]
    async fn test_persistent_duplicates_escalate() {
        let repo = Arc::new(ScriptedBookings::default());
        repo.insert_failures
            .lock()
            .unwrap()
            .extend((0..10).map(|i| StoreError::DuplicateReference(format!("PLG-{:05}", i))));
        let (service, _rx) = service(repo.clone(), false);

        let err = service.submit(new_booking()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Allocation(AllocationError::Exhausted { attempts: 10 })));
        assert!(repo.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_storage_outage_is_retryable() {
        let repo = Arc::new(ScriptedBookings::default());
        repo.insert_failures
            .lock()
            .unwrap()
            .push_back(StoreError::Unavailable("pool timed out".into()));
        let (service, _rx) = service(repo, false);

        let err = service.submit(new_booking()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Store(StoreError::Unavailable(_))));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_notification_failure_is_swallowed() {
        let repo = Arc::new(ScriptedBookings::default());
        let (service, mut rx) = service(repo, true);

        let record = service.submit(new_booking()).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.booking_id, record.id);
    }

    #[tokio::test]
    async fn test_terms_must_be_accepted() {
        let repo = Arc::new(ScriptedBookings::default());
        let (service, _rx) = service(repo.clone(), false);
        let mut booking = new_booking();
        booking.terms_accepted = false;

        let err = service.submit(booking).await.unwrap_err();
        assert!(matches!(err, SubmitError::Wizard(WizardError::TermsNotAccepted)));
        assert!(!err.is_retryable());
        assert!(repo.stored.lock().unwrap().is_empty());
    }
}
