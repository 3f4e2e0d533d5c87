pub mod featured;
pub mod pricing;
pub mod repository;
pub mod tour;

pub use featured::FeaturedPolicy;
pub use pricing::{price_booking, PricingConfig, PricingEngine, PricingError, PricingInput, PricingSnapshot};
pub use repository::TourRepository;
pub use tour::{NewTour, Tour, TourUpdate};
