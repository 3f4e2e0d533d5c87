use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::Utc;
use pilgrim_order::{ConsultationForm, ConsultationReceipt};

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/consultations", post(request_consultation))
}

/// POST /v1/consultations
async fn request_consultation(
    State(state): State<AppState>,
    Json(form): Json<ConsultationForm>,
) -> Result<(StatusCode, Json<ConsultationReceipt>), AppError> {
    let receipt = state.consultations.request(form, Utc::now().date_naive()).await?;
    state.metrics.consultations_received.inc();
    Ok((StatusCode::CREATED, Json(receipt)))
}
