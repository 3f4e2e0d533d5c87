pub mod app_config;
pub mod booking_repo;
pub mod consultation_repo;
pub mod database;
pub mod events;
pub mod memory;
pub mod redis_repo;
pub mod tour_repo;

pub use app_config::Config;
pub use booking_repo::PgBookingRepository;
pub use consultation_repo::PgConsultationRepository;
pub use database::DbClient;
pub use events::{EventProducer, TracingNotifier};
pub use memory::{InMemoryBookingRepository, InMemoryConsultationRepository, InMemoryDraftStore, InMemoryTourRepository};
pub use redis_repo::{RedisClient, RedisDraftStore};
pub use tour_repo::PgTourRepository;
