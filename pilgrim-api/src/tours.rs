use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use pilgrim_catalog::Tour;

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/tours", get(list_tours))
        .route("/v1/tours/{slug}", get(get_tour))
}

/// GET /v1/tours
async fn list_tours(State(state): State<AppState>) -> Result<Json<Vec<Tour>>, AppError> {
    Ok(Json(state.tours.list_tours(true).await?))
}

/// GET /v1/tours/{slug}
///
/// Inactive tours are hidden from the public site.
async fn get_tour(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<Tour>, AppError> {
    match state.tours.get_tour_by_slug(&slug).await? {
        Some(tour) if tour.is_active => Ok(Json(tour)),
        _ => Err(AppError::NotFoundError(format!("Tour '{}' not found", slug))),
    }
}
