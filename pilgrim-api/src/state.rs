use pilgrim_catalog::{FeaturedPolicy, TourRepository};
use pilgrim_core::Notifier;
use pilgrim_order::{
    AdminService, BookingRepository, BookingService, ConsultationRepository, ConsultationService, DraftStore,
    ReferenceAllocator, WizardSettings,
};
use pilgrim_store::app_config::{BookingConfig, RateLimitConfig};
use pilgrim_store::{
    InMemoryBookingRepository, InMemoryConsultationRepository, InMemoryDraftStore, InMemoryTourRepository,
    RedisClient,
};
use std::sync::Arc;
use std::time::Duration;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

/// Storage backends, chosen once at startup.
#[derive(Clone)]
pub struct Repositories {
    pub tours: Arc<dyn TourRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub consultations: Arc<dyn ConsultationRepository>,
    pub drafts: Arc<dyn DraftStore>,
}

impl Repositories {
    pub fn in_memory(featured: FeaturedPolicy) -> Self {
        Self {
            tours: Arc::new(InMemoryTourRepository::new(featured)),
            bookings: Arc::new(InMemoryBookingRepository::new()),
            consultations: Arc::new(InMemoryConsultationRepository::new()),
            drafts: Arc::new(InMemoryDraftStore::new()),
        }
    }
}

#[derive(Clone)]
pub struct RateLimit {
    pub redis: Arc<RedisClient>,
    pub limits: RateLimitConfig,
}

#[derive(Clone)]
pub struct AppState {
    pub tours: Arc<dyn TourRepository>,
    pub drafts: Arc<dyn DraftStore>,
    pub bookings: Arc<BookingService>,
    pub consultations: Arc<ConsultationService>,
    pub admin: Arc<AdminService>,
    pub wizard: WizardSettings,
    pub draft_ttl: Duration,
    pub auth: AuthConfig,
    pub rate_limit: Option<RateLimit>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        notifier: Arc<dyn Notifier>,
        booking: &BookingConfig,
        auth: AuthConfig,
    ) -> Result<Self, prometheus::Error> {
        let allocator = ReferenceAllocator::new(booking.reference_prefix.clone(), booking.max_reference_attempts);
        let bookings = BookingService::new(Arc::clone(&repos.bookings), allocator, Arc::clone(&notifier));
        let consultations = ConsultationService::new(Arc::clone(&repos.consultations), notifier);
        let admin = AdminService::new(
            Arc::clone(&repos.tours),
            Arc::clone(&repos.bookings),
            Arc::clone(&repos.consultations),
        );

        Ok(Self {
            tours: repos.tours,
            drafts: repos.drafts,
            bookings: Arc::new(bookings),
            consultations: Arc::new(consultations),
            admin: Arc::new(admin),
            wizard: booking.wizard_settings(),
            draft_ttl: booking.draft_ttl(),
            auth,
            rate_limit: None,
            metrics: Arc::new(Metrics::new()?),
        })
    }

    pub fn with_rate_limit(mut self, redis: Arc<RedisClient>, limits: RateLimitConfig) -> Self {
        self.rate_limit = Some(RateLimit { redis, limits });
        self
    }
}
