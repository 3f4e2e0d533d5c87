use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, patch, put},
    Extension, Json, Router,
};
use chrono::Utc;
use pilgrim_catalog::{NewTour, Tour, TourUpdate};
use pilgrim_order::{
    BookingDetail, BookingRecord, BookingRef, BookingStatus, ConsultationRequest, ConsultationStatus,
    DashboardSummary,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::{admin_auth_middleware, AdminClaims},
    state::AppState,
};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetFeaturedRequest {
    pub featured: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/tours", get(list_tours).post(create_tour))
        .route("/v1/admin/tours/{id}", patch(update_tour).delete(delete_tour))
        .route("/v1/admin/tours/{id}/active", put(set_active))
        .route("/v1/admin/tours/{id}/featured", put(set_featured))
        .route("/v1/admin/bookings", get(list_bookings))
        .route("/v1/admin/bookings/{reference}", get(get_booking))
        .route("/v1/admin/bookings/{reference}/status", put(update_booking_status))
        .route("/v1/admin/consultations", get(list_consultations))
        .route("/v1/admin/consultations/{id}/status", put(update_consultation_status))
        .route("/v1/admin/dashboard", get(dashboard))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}

fn parse_reference(reference: &str) -> Result<BookingRef, AppError> {
    BookingRef::parse(reference).map_err(|_| AppError::NotFoundError(format!("Booking {} not found", reference)))
}

// ============================================================================
// Tour Management Handlers
// ============================================================================

/// GET /v1/admin/tours
async fn list_tours(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
) -> Result<Json<Vec<Tour>>, AppError> {
    Ok(Json(state.admin.list_tours(&claims).await?))
}

/// POST /v1/admin/tours
async fn create_tour(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Json(input): Json<NewTour>,
) -> Result<(StatusCode, Json<Tour>), AppError> {
    let tour = state.admin.create_tour(&claims, input).await?;
    Ok((StatusCode::CREATED, Json(tour)))
}

/// PATCH /v1/admin/tours/{id}
async fn update_tour(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(id): Path<Uuid>,
    Json(update): Json<TourUpdate>,
) -> Result<Json<Tour>, AppError> {
    Ok(Json(state.admin.update_tour(&claims, id, update).await?))
}

/// PUT /v1/admin/tours/{id}/active
async fn set_active(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<Tour>, AppError> {
    Ok(Json(state.admin.set_tour_active(&claims, id, req.active).await?))
}

/// PUT /v1/admin/tours/{id}/featured
async fn set_featured(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetFeaturedRequest>,
) -> Result<Json<Tour>, AppError> {
    Ok(Json(state.admin.set_tour_featured(&claims, id, req.featured).await?))
}

/// DELETE /v1/admin/tours/{id}
async fn delete_tour(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.admin.delete_tour(&claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Booking Handlers
// ============================================================================

/// GET /v1/admin/bookings?status=CONFIRMED
async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<BookingRecord>>, AppError> {
    let status = filter.status.as_deref().map(str::parse::<BookingStatus>).transpose()?;
    Ok(Json(state.admin.list_bookings(&claims, status).await?))
}

/// GET /v1/admin/bookings/{reference}
async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(reference): Path<String>,
) -> Result<Json<BookingDetail>, AppError> {
    let reference = parse_reference(&reference)?;
    Ok(Json(state.admin.get_booking(&claims, &reference).await?))
}

/// PUT /v1/admin/bookings/{reference}/status
async fn update_booking_status(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(reference): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<BookingRecord>, AppError> {
    let reference = parse_reference(&reference)?;
    let status: BookingStatus = req.status.parse()?;
    Ok(Json(state.admin.update_booking_status(&claims, &reference, status).await?))
}

// ============================================================================
// Consultation Handlers
// ============================================================================

/// GET /v1/admin/consultations?status=NEW
async fn list_consultations(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<ConsultationRequest>>, AppError> {
    let status = filter.status.as_deref().map(str::parse::<ConsultationStatus>).transpose()?;
    Ok(Json(state.admin.list_consultations(&claims, status).await?))
}

/// PUT /v1/admin/consultations/{id}/status
async fn update_consultation_status(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<ConsultationRequest>, AppError> {
    let status: ConsultationStatus = req.status.parse()?;
    Ok(Json(state.admin.update_consultation_status(&claims, id, status).await?))
}

// ============================================================================
// Dashboard
// ============================================================================

/// GET /v1/admin/dashboard
async fn dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
) -> Result<Json<DashboardSummary>, AppError> {
    Ok(Json(state.admin.dashboard(&claims, Utc::now().date_naive()).await?))
}
