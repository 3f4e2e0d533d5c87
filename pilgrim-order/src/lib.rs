pub mod admin;
pub mod consultation;
pub mod finance;
pub mod manager;
pub mod models;
pub mod orchestrator;
pub mod reference;
pub mod repository;
pub mod validation;
pub mod wizard;

pub use admin::{AdminError, AdminService, BookingDetail};
pub use consultation::{
    ConsultationError, ConsultationForm, ConsultationReceipt, ConsultationRequest, ConsultationService, ConsultationStatus,
};
pub use finance::DashboardSummary;
pub use manager::{BookingLifecycle, LifecycleError};
pub use models::{BookingRecord, BookingRef, BookingStatus, NewBooking, Traveler, TravelerRecord};
pub use orchestrator::{BookingService, SubmitError};
pub use reference::{AllocationError, ReferenceAllocator, ReferenceIndex};
pub use repository::{BookingRepository, ConsultationRepository, DraftStore};
pub use wizard::{BookingDraft, BookingWizard, DraftAction, Step, TourQuote, WizardError, WizardSettings};
