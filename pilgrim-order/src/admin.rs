//! Back-office operations. Every call takes the caller's [`AuthGate`] and is
//! refused before any storage access when the caller is not an admin.

use chrono::NaiveDate;
use pilgrim_catalog::{NewTour, Tour, TourRepository, TourUpdate};
use pilgrim_core::{require_admin, AuthGate, CoreError, StoreError};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::consultation::{ConsultationRequest, ConsultationStatus};
use crate::finance::{self, DashboardSummary};
use crate::manager::{BookingLifecycle, LifecycleError};
use crate::models::{BookingRecord, BookingRef, BookingStatus, Traveler};
use crate::repository::{BookingRepository, ConsultationRepository};

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Unauthorized: admin session required")]
    Unauthorized,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<CoreError> for AdminError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Unauthorized => AdminError::Unauthorized,
            CoreError::ValidationError(msg) => AdminError::Validation(msg),
            CoreError::NotFound(what) => AdminError::NotFound(what),
            CoreError::Conflict(msg) => AdminError::Conflict(msg),
            CoreError::InternalError(msg) => AdminError::Store(StoreError::Unexpected(anyhow::anyhow!(msg))),
        }
    }
}

impl From<StoreError> for AdminError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AdminError::NotFound(what),
            StoreError::Conflict(msg) => AdminError::Conflict(msg),
            StoreError::Invalid(msg) => AdminError::Validation(msg),
            other => AdminError::Store(other),
        }
    }
}

impl From<LifecycleError> for AdminError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::NotFound(what) => AdminError::NotFound(what),
            invalid @ LifecycleError::InvalidTransition { .. } => AdminError::Conflict(invalid.to_string()),
            LifecycleError::Store(err) => err.into(),
        }
    }
}

pub type AdminResult<T> = Result<T, AdminError>;

/// A booking with its travelers, for the admin detail view.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BookingDetail {
    pub booking: BookingRecord,
    pub travelers: Vec<Traveler>,
}

pub struct AdminService {
    tours: Arc<dyn TourRepository>,
    bookings: Arc<dyn BookingRepository>,
    consultations: Arc<dyn ConsultationRepository>,
    lifecycle: BookingLifecycle,
}

impl AdminService {
    pub fn new(
        tours: Arc<dyn TourRepository>,
        bookings: Arc<dyn BookingRepository>,
        consultations: Arc<dyn ConsultationRepository>,
    ) -> Self {
        let lifecycle = BookingLifecycle::new(Arc::clone(&bookings));
        Self {
            tours,
            bookings,
            consultations,
            lifecycle,
        }
    }

    // ========================================================================
    // Tours
    // ========================================================================

    pub async fn list_tours(&self, gate: &dyn AuthGate) -> AdminResult<Vec<Tour>> {
        require_admin(gate)?;
        Ok(self.tours.list_tours(false).await?)
    }

    pub async fn create_tour(&self, gate: &dyn AuthGate, input: NewTour) -> AdminResult<Tour> {
        require_admin(gate)?;
        let tour = input.into_tour()?;
        let created = self.tours.create_tour(&tour).await?;
        info!(tour_id = %created.id, slug = %created.slug, admin = gate.subject().unwrap_or("-"), "Tour created");
        Ok(created)
    }

    pub async fn update_tour(&self, gate: &dyn AuthGate, id: Uuid, update: TourUpdate) -> AdminResult<Tour> {
        require_admin(gate)?;
        let updated = self.tours.update_tour(id, &update).await?;
        info!(tour_id = %id, admin = gate.subject().unwrap_or("-"), "Tour updated");
        Ok(updated)
    }

    pub async fn set_tour_active(&self, gate: &dyn AuthGate, id: Uuid, active: bool) -> AdminResult<Tour> {
        self.update_tour(gate, id, TourUpdate::activation(active)).await
    }

    /// Featuring a fourth tour is a conflict; the store checks the cap
    /// before writing.
    pub async fn set_tour_featured(&self, gate: &dyn AuthGate, id: Uuid, featured: bool) -> AdminResult<Tour> {
        self.update_tour(gate, id, TourUpdate::featured(featured)).await
    }

    pub async fn delete_tour(&self, gate: &dyn AuthGate, id: Uuid) -> AdminResult<()> {
        require_admin(gate)?;
        self.tours.delete_tour(id).await?;
        info!(tour_id = %id, admin = gate.subject().unwrap_or("-"), "Tour deleted");
        Ok(())
    }

    // ========================================================================
    // Bookings
    // ========================================================================

    pub async fn list_bookings(&self, gate: &dyn AuthGate, status: Option<BookingStatus>) -> AdminResult<Vec<BookingRecord>> {
        require_admin(gate)?;
        Ok(self.bookings.list_bookings(status).await?)
    }

    pub async fn get_booking(&self, gate: &dyn AuthGate, reference: &BookingRef) -> AdminResult<BookingDetail> {
        require_admin(gate)?;
        let booking = self
            .bookings
            .find_booking_by_reference(reference)
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("booking {}", reference)))?;
        let travelers = self.bookings.booking_travelers(booking.id).await?;
        Ok(BookingDetail { booking, travelers })
    }

    pub async fn update_booking_status(
        &self,
        gate: &dyn AuthGate,
        reference: &BookingRef,
        status: BookingStatus,
    ) -> AdminResult<BookingRecord> {
        require_admin(gate)?;
        Ok(self.lifecycle.transition(reference, status).await?)
    }

    // ========================================================================
    // Consultations
    // ========================================================================

    pub async fn list_consultations(
        &self,
        gate: &dyn AuthGate,
        status: Option<ConsultationStatus>,
    ) -> AdminResult<Vec<ConsultationRequest>> {
        require_admin(gate)?;
        Ok(self.consultations.list_consultations(status).await?)
    }

    pub async fn update_consultation_status(
        &self,
        gate: &dyn AuthGate,
        id: Uuid,
        status: ConsultationStatus,
    ) -> AdminResult<ConsultationRequest> {
        require_admin(gate)?;
        let current = self
            .consultations
            .get_consultation(id)
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("consultation {}", id)))?;
        if !current.status.can_transition_to(status) {
            return Err(AdminError::Conflict(format!(
                "Consultation cannot move from {} to {}",
                current.status, status
            )));
        }
        let updated = self.consultations.update_consultation_status(id, status).await?;
        info!(consultation_id = %id, status = %status, "Consultation status changed");
        Ok(updated)
    }

    // ========================================================================
    // Dashboard
    // ========================================================================

    pub async fn dashboard(&self, gate: &dyn AuthGate, today: NaiveDate) -> AdminResult<DashboardSummary> {
        require_admin(gate)?;
        let bookings = self.bookings.list_bookings(None).await?;
        Ok(finance::summarize(&bookings, today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::{new_booking, ScriptedBookings};
    use async_trait::async_trait;
    use pilgrim_catalog::FeaturedPolicy;
    use pilgrim_core::{StoreResult, Unauthenticated};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct Admin;

    impl AuthGate for Admin {
        fn is_admin(&self) -> bool {
            true
        }

        fn subject(&self) -> Option<&str> {
            Some("ops@agency.test")
        }
    }

    /// Tour store that counts every call, reads included.
    #[derive(Default)]
    struct CountingTours {
        tours: Mutex<Vec<Tour>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl TourRepository for CountingTours {
        async fn list_tours(&self, active_only: bool) -> StoreResult<Vec<Tour>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .tours
                .lock()
                .unwrap()
                .iter()
                .filter(|t| !active_only || t.is_active)
                .cloned()
                .collect())
        }

        async fn get_tour(&self, id: Uuid) -> StoreResult<Option<Tour>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.tours.lock().unwrap().iter().find(|t| t.id == id).cloned())
        }

        async fn get_tour_by_slug(&self, slug: &str) -> StoreResult<Option<Tour>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.tours.lock().unwrap().iter().find(|t| t.slug == slug).cloned())
        }

        async fn create_tour(&self, tour: &Tour) -> StoreResult<Tour> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut tours = self.tours.lock().unwrap();
            if tours.iter().any(|t| t.slug == tour.slug) {
                return Err(StoreError::Conflict(format!("slug {} is taken", tour.slug)));
            }
            if tour.is_featured {
                FeaturedPolicy::default().admit(tours.iter(), tour.id)?;
            }
            tours.push(tour.clone());
            Ok(tour.clone())
        }

        async fn update_tour(&self, id: Uuid, update: &TourUpdate) -> StoreResult<Tour> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut tours = self.tours.lock().unwrap();
            if update.sets_featured() {
                FeaturedPolicy::default().admit(tours.iter(), id)?;
            }
            let tour = tours
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            *tour = update.apply(tour)?;
            Ok(tour.clone())
        }

        async fn delete_tour(&self, id: Uuid) -> StoreResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.tours.lock().unwrap().retain(|t| t.id != id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct NoConsultations;

    #[async_trait]
    impl ConsultationRepository for NoConsultations {
        async fn create_consultation(&self, request: &ConsultationRequest) -> StoreResult<ConsultationRequest> {
            Ok(request.clone())
        }

        async fn list_consultations(&self, _status: Option<ConsultationStatus>) -> StoreResult<Vec<ConsultationRequest>> {
            Ok(vec![])
        }

        async fn get_consultation(&self, _id: Uuid) -> StoreResult<Option<ConsultationRequest>> {
            Ok(None)
        }

        async fn update_consultation_status(&self, id: Uuid, _status: ConsultationStatus) -> StoreResult<ConsultationRequest> {
            Err(StoreError::NotFound(id.to_string()))
        }
    }

    fn new_tour(slug: &str, featured: bool) -> NewTour {
        serde_json::from_value(serde_json::json!({
            "slug": slug,
            "title": "Umrah Package",
            "duration_days": 10,
            "base_price": "1650",
            "insurance_unit_cost": "99",
            "flight_unit_cost": "450",
            "is_featured": featured
        }))
        .unwrap()
    }

    fn service() -> (AdminService, Arc<CountingTours>, Arc<ScriptedBookings>) {
        let tours = Arc::new(CountingTours::default());
        let bookings = Arc::new(ScriptedBookings::default());
        let admin = AdminService::new(tours.clone(), bookings.clone(), Arc::new(NoConsultations));
        (admin, tours, bookings)
    }

    #[tokio::test]
    async fn test_unauthenticated_calls_never_reach_storage() {
        let (admin, tours, _) = service();
        let gate = Unauthenticated;

        assert!(matches!(admin.list_tours(&gate).await, Err(AdminError::Unauthorized)));
        assert!(matches!(
            admin.create_tour(&gate, new_tour("hajj-2027", false)).await,
            Err(AdminError::Unauthorized)
        ));
        assert!(matches!(
            admin.set_tour_featured(&gate, Uuid::new_v4(), true).await,
            Err(AdminError::Unauthorized)
        ));
        assert!(matches!(admin.delete_tour(&gate, Uuid::new_v4()).await, Err(AdminError::Unauthorized)));
        assert!(matches!(admin.list_bookings(&gate, None).await, Err(AdminError::Unauthorized)));
        assert!(matches!(
            admin.dashboard(&gate, NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()).await,
            Err(AdminError::Unauthorized)
        ));
        assert_eq!(tours.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fourth_featured_tour_is_refused() {
        let (admin, tours, _) = service();
        for slug in ["umrah-a", "umrah-b", "umrah-c"] {
            admin.create_tour(&Admin, new_tour(slug, true)).await.unwrap();
        }

        let err = admin.create_tour(&Admin, new_tour("umrah-d", true)).await.unwrap_err();
        assert!(matches!(err, AdminError::Conflict(_)));

        let plain = admin.create_tour(&Admin, new_tour("umrah-e", false)).await.unwrap();
        let err = admin.set_tour_featured(&Admin, plain.id, true).await.unwrap_err();
        assert!(matches!(err, AdminError::Conflict(_)));

        let featured = tours.tours.lock().unwrap().iter().filter(|t| t.is_featured).count();
        assert_eq!(featured, 3);
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_a_conflict() {
        let (admin, _, _) = service();
        admin.create_tour(&Admin, new_tour("ziyarat-iraq", false)).await.unwrap();
        let err = admin.create_tour(&Admin, new_tour("ziyarat-iraq", false)).await.unwrap_err();
        assert!(matches!(err, AdminError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_booking_status_rules_apply() {
        let (admin, _, bookings) = service();
        let reference = BookingRef::parse("PLG-Q7W3E").unwrap();
        bookings.create_booking(&reference, &new_booking()).await.unwrap();

        let confirmed = admin
            .update_booking_status(&Admin, &reference, BookingStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let err = admin
            .update_booking_status(&Admin, &reference, BookingStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Conflict(_)));

        let summary = admin
            .dashboard(&Admin, chrono::Utc::now().date_naive())
            .await
            .unwrap();
        assert_eq!(summary.bookings_by_status["CONFIRMED"], 1);
        assert_eq!(summary.revenue_total, confirmed.total_amount);
    }

    #[tokio::test]
    async fn test_missing_booking() {
        let (admin, _, _) = service();
        let reference = BookingRef::parse("PLG-NONE1").unwrap();
        assert!(matches!(
            admin.get_booking(&Admin, &reference).await,
            Err(AdminError::NotFound(_))
        ));
    }
}
