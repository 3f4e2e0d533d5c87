//! Booking wizard over HTTP. The draft lives in the draft store between
//! requests; every request loads it, applies one action and saves it back.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use pilgrim_catalog::PricingSnapshot;
use pilgrim_order::{BookingDraft, BookingRef, BookingWizard, DraftAction, SubmitError, TourQuote, WizardError};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartDraftRequest {
    pub tour_slug: String,
}

#[derive(Debug, Serialize)]
pub struct DraftResponse {
    pub draft: BookingDraft,
    pub pricing: Option<PricingSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub booking_ref: BookingRef,
    pub draft: BookingDraft,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings/drafts", post(start_draft))
        .route("/v1/bookings/drafts/{id}", get(get_draft).delete(discard_draft))
        .route("/v1/bookings/drafts/{id}/actions", post(apply_action))
        .route("/v1/bookings/drafts/{id}/submit", post(submit_draft))
}

fn respond(wizard: &BookingWizard) -> DraftResponse {
    DraftResponse {
        draft: wizard.draft().clone(),
        pricing: wizard.pricing().ok(),
    }
}

async fn load_wizard(state: &AppState, id: Uuid) -> Result<BookingWizard, AppError> {
    let draft = state
        .drafts
        .load_draft(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Draft {} not found or expired", id)))?;
    Ok(BookingWizard::resume(draft, state.wizard.clone()))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/bookings/drafts
async fn start_draft(
    State(state): State<AppState>,
    Json(req): Json<StartDraftRequest>,
) -> Result<(StatusCode, Json<DraftResponse>), AppError> {
    let tour = match state.tours.get_tour_by_slug(&req.tour_slug).await? {
        Some(tour) if tour.is_active => tour,
        _ => return Err(AppError::NotFoundError(format!("Tour '{}' not found", req.tour_slug))),
    };

    let wizard = BookingWizard::start(TourQuote::from(&tour), state.wizard.clone());
    state.drafts.save_draft(wizard.draft(), state.draft_ttl).await?;
    state.metrics.drafts_started.inc();
    info!(draft_id = %wizard.draft().id, tour = %tour.slug, "Booking draft started");

    Ok((StatusCode::CREATED, Json(respond(&wizard))))
}

/// GET /v1/bookings/drafts/{id}
async fn get_draft(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<DraftResponse>, AppError> {
    let wizard = load_wizard(&state, id).await?;
    Ok(Json(respond(&wizard)))
}

/// DELETE /v1/bookings/drafts/{id}
async fn discard_draft(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    state.drafts.delete_draft(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/bookings/drafts/{id}/actions
///
/// A blocked advance still saves the draft so the field errors survive a
/// reload, then answers 400 with those errors.
async fn apply_action(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(action): Json<DraftAction>,
) -> Result<Json<DraftResponse>, AppError> {
    let mut wizard = load_wizard(&state, id).await?;
    let today = Utc::now().date_naive();

    let dispatched = wizard.dispatch(action, today).map(|_| ());
    match dispatched {
        Ok(()) => {
            state.drafts.save_draft(wizard.draft(), state.draft_ttl).await?;
            Ok(Json(respond(&wizard)))
        }
        Err(err @ WizardError::InvalidTravelers { .. }) => {
            state.drafts.save_draft(wizard.draft(), state.draft_ttl).await?;
            Err(AppError::ValidationError {
                message: err.to_string(),
                fields: serde_json::to_value(&wizard.draft().errors).ok(),
            })
        }
        Err(err) => Err(err.into()),
    }
}

/// POST /v1/bookings/drafts/{id}/submit
///
/// A draft books at most once: a second submit, concurrent or not, is a 409.
async fn submit_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let mut wizard = load_wizard(&state, id).await?;
    let today = Utc::now().date_naive();

    let result = wizard
        .submit_stored(&state.bookings, state.drafts.as_ref(), state.draft_ttl, today)
        .await;
    let outcome = match &result {
        Ok(_) => "created",
        Err(SubmitError::Wizard(_) | SubmitError::AlreadyClaimed) => "rejected",
        Err(_) => "failed",
    };
    state.metrics.bookings_submitted.with_label_values(&[outcome]).inc();
    let booking_ref = result?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            booking_ref,
            draft: wizard.into_draft(),
        }),
    ))
}
