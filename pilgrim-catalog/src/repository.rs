use async_trait::async_trait;
use pilgrim_core::StoreResult;
use uuid::Uuid;

use crate::tour::{Tour, TourUpdate};

/// Tour persistence. Implementations enforce slug uniqueness and the
/// featured-tour cap inside their write path, before any row changes.
#[async_trait]
pub trait TourRepository: Send + Sync {
    async fn list_tours(&self, active_only: bool) -> StoreResult<Vec<Tour>>;

    async fn get_tour(&self, id: Uuid) -> StoreResult<Option<Tour>>;

    async fn get_tour_by_slug(&self, slug: &str) -> StoreResult<Option<Tour>>;

    async fn create_tour(&self, tour: &Tour) -> StoreResult<Tour>;

    async fn update_tour(&self, id: Uuid, update: &TourUpdate) -> StoreResult<Tour>;

    async fn delete_tour(&self, id: Uuid) -> StoreResult<()>;
}
