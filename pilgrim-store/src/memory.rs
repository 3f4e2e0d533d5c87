//! In-memory repositories.
//!
//! Used by tests and by local runs without Postgres. State lives in maps
//! behind `tokio::sync::RwLock`; every write takes the write lock for the
//! whole operation, which gives the same all-or-nothing behavior the
//! Postgres transactions give. Nothing survives a restart.

use async_trait::async_trait;
use chrono::Utc;
use pilgrim_catalog::{FeaturedPolicy, Tour, TourRepository, TourUpdate};
use pilgrim_core::{StoreError, StoreResult};
use pilgrim_order::models::{Customer, PaymentRecord};
use pilgrim_order::{
    BookingDraft, BookingRecord, BookingRef, BookingRepository, BookingStatus, ConsultationRepository,
    ConsultationRequest, ConsultationStatus, DraftStore, NewBooking, Traveler,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryTourRepository {
    featured: FeaturedPolicy,
    tours: RwLock<HashMap<Uuid, Tour>>,
}

impl InMemoryTourRepository {
    pub fn new(featured: FeaturedPolicy) -> Self {
        Self {
            featured,
            tours: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl TourRepository for InMemoryTourRepository {
    async fn list_tours(&self, active_only: bool) -> StoreResult<Vec<Tour>> {
        let tours = self.tours.read().await;
        let mut listed: Vec<Tour> = tours
            .values()
            .filter(|tour| !active_only || tour.is_active)
            .cloned()
            .collect();
        listed.sort_by(|a, b| {
            b.is_featured
                .cmp(&a.is_featured)
                .then_with(|| a.departure_date.is_none().cmp(&b.departure_date.is_none()))
                .then_with(|| a.departure_date.cmp(&b.departure_date))
                .then_with(|| a.title.cmp(&b.title))
        });
        Ok(listed)
    }

    async fn get_tour(&self, id: Uuid) -> StoreResult<Option<Tour>> {
        Ok(self.tours.read().await.get(&id).cloned())
    }

    async fn get_tour_by_slug(&self, slug: &str) -> StoreResult<Option<Tour>> {
        Ok(self.tours.read().await.values().find(|tour| tour.slug == slug).cloned())
    }

    async fn create_tour(&self, tour: &Tour) -> StoreResult<Tour> {
        let mut tours = self.tours.write().await;
        if tours.values().any(|existing| existing.slug == tour.slug) {
            return Err(StoreError::Conflict(format!(
                "A tour with slug '{}' already exists",
                tour.slug
            )));
        }
        if tour.is_featured {
            self.featured.admit(tours.values(), tour.id)?;
        }
        tours.insert(tour.id, tour.clone());
        Ok(tour.clone())
    }

    async fn update_tour(&self, id: Uuid, update: &TourUpdate) -> StoreResult<Tour> {
        let mut tours = self.tours.write().await;
        let current = tours
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("tour {}", id)))?;
        let next = update.apply(current)?;

        if next.slug != current.slug && tours.values().any(|other| other.id != id && other.slug == next.slug) {
            return Err(StoreError::Conflict(format!(
                "A tour with slug '{}' already exists",
                next.slug
            )));
        }
        if next.is_featured && !current.is_featured {
            self.featured.admit(tours.values(), id)?;
        }
        tours.insert(id, next.clone());
        Ok(next)
    }

    async fn delete_tour(&self, id: Uuid) -> StoreResult<()> {
        match self.tours.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(format!("tour {}", id))),
        }
    }
}

#[derive(Default)]
struct BookingTables {
    customers: HashMap<String, Customer>,
    bookings: HashMap<BookingRef, BookingRecord>,
    travelers: HashMap<Uuid, Vec<Traveler>>,
    payments: HashMap<Uuid, PaymentRecord>,
}

#[derive(Default)]
pub struct InMemoryBookingRepository {
    tables: RwLock<BookingTables>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn customer_by_email(&self, email: &str) -> Option<Customer> {
        self.tables.read().await.customers.get(&email.to_ascii_lowercase()).cloned()
    }

    pub async fn payment_for(&self, booking_id: Uuid) -> Option<PaymentRecord> {
        self.tables.read().await.payments.get(&booking_id).cloned()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn find_booking_by_reference(&self, reference: &BookingRef) -> StoreResult<Option<BookingRecord>> {
        Ok(self.tables.read().await.bookings.get(reference).cloned())
    }

    async fn create_booking(&self, reference: &BookingRef, booking: &NewBooking) -> StoreResult<BookingRecord> {
        let lead = booking
            .lead_traveler()
            .ok_or_else(|| StoreError::Invalid("a booking needs at least one traveler".into()))?;

        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        if tables.bookings.contains_key(reference) {
            return Err(StoreError::DuplicateReference(reference.to_string()));
        }

        let email = lead.email.to_ascii_lowercase();
        let customer_id = match tables.customers.get_mut(&email) {
            Some(existing) => {
                existing.first_name = lead.first_name.clone();
                existing.last_name = lead.last_name.clone();
                existing.phone = lead.phone.clone();
                existing.id
            }
            None => {
                let customer = Customer {
                    id: Uuid::new_v4(),
                    email: email.clone(),
                    first_name: lead.first_name.clone(),
                    last_name: lead.last_name.clone(),
                    phone: lead.phone.clone(),
                    created_at: Utc::now(),
                };
                let id = customer.id;
                tables.customers.insert(email, customer);
                id
            }
        };

        let record = BookingRecord::from_new(reference.clone(), customer_id, booking);
        tables.travelers.insert(record.id, booking.travelers.clone());
        tables.payments.insert(record.id, PaymentRecord::deposit_for(&record));
        tables.bookings.insert(reference.clone(), record.clone());
        Ok(record)
    }

    async fn list_bookings(&self, status: Option<BookingStatus>) -> StoreResult<Vec<BookingRecord>> {
        let tables = self.tables.read().await;
        let mut listed: Vec<BookingRecord> = tables
            .bookings
            .values()
            .filter(|booking| status.map_or(true, |s| booking.status == s))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed)
    }

    async fn update_booking_status(
        &self,
        reference: &BookingRef,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<BookingRecord> {
        let mut tables = self.tables.write().await;
        let booking = tables
            .bookings
            .get_mut(reference)
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", reference)))?;
        if booking.status != from {
            return Err(StoreError::Conflict(format!("booking {} is no longer {}", reference, from)));
        }
        booking.status = to;
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn booking_travelers(&self, booking_id: Uuid) -> StoreResult<Vec<Traveler>> {
        Ok(self
            .tables
            .read()
            .await
            .travelers
            .get(&booking_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryConsultationRepository {
    requests: RwLock<HashMap<Uuid, ConsultationRequest>>,
}

impl InMemoryConsultationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConsultationRepository for InMemoryConsultationRepository {
    async fn create_consultation(&self, request: &ConsultationRequest) -> StoreResult<ConsultationRequest> {
        let mut requests = self.requests.write().await;
        if requests.contains_key(&request.id) {
            return Err(StoreError::Conflict(format!("consultation {} already exists", request.id)));
        }
        requests.insert(request.id, request.clone());
        Ok(request.clone())
    }

    async fn list_consultations(&self, status: Option<ConsultationStatus>) -> StoreResult<Vec<ConsultationRequest>> {
        let requests = self.requests.read().await;
        let mut listed: Vec<ConsultationRequest> = requests
            .values()
            .filter(|request| status.map_or(true, |s| request.status == s))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed)
    }

    async fn get_consultation(&self, id: Uuid) -> StoreResult<Option<ConsultationRequest>> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn update_consultation_status(
        &self,
        id: Uuid,
        status: ConsultationStatus,
    ) -> StoreResult<ConsultationRequest> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("consultation {}", id)))?;
        request.status = status;
        Ok(request.clone())
    }
}

/// Drafts with an expiry, checked lazily on read. Submission claims expire
/// the same way.
#[derive(Default)]
pub struct InMemoryDraftStore {
    drafts: RwLock<HashMap<Uuid, (BookingDraft, Instant)>>,
    claims: RwLock<HashMap<Uuid, Instant>>,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for InMemoryDraftStore {
    async fn save_draft(&self, draft: &BookingDraft, ttl: Duration) -> StoreResult<()> {
        self.drafts
            .write()
            .await
            .insert(draft.id, (draft.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn load_draft(&self, id: Uuid) -> StoreResult<Option<BookingDraft>> {
        let mut drafts = self.drafts.write().await;
        match drafts.get(&id) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                drafts.remove(&id);
                Ok(None)
            }
            Some((draft, _)) => Ok(Some(draft.clone())),
            None => Ok(None),
        }
    }

    async fn delete_draft(&self, id: Uuid) -> StoreResult<()> {
        self.drafts.write().await.remove(&id);
        Ok(())
    }

    async fn claim_submission(&self, id: Uuid, ttl: Duration) -> StoreResult<bool> {
        let mut claims = self.claims.write().await;
        let now = Instant::now();
        if claims.get(&id).is_some_and(|expires_at| *expires_at > now) {
            return Ok(false);
        }
        claims.insert(id, now + ttl);
        Ok(true)
    }

    async fn release_submission(&self, id: Uuid) -> StoreResult<()> {
        self.claims.write().await.remove(&id);
        Ok(())
    }
}
