use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::AppError;
use crate::state::AppState;

pub struct Metrics {
    registry: Registry,
    pub drafts_started: IntCounter,
    /// Labelled by `outcome`: `created`, `rejected` or `failed`.
    pub bookings_submitted: IntCounterVec,
    pub consultations_received: IntCounter,
    pub rate_limited: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("pilgrim".into()), None)?;

        let drafts_started = IntCounter::new("drafts_started_total", "Booking drafts started")?;
        let bookings_submitted = IntCounterVec::new(
            Opts::new("bookings_submitted_total", "Booking submissions by outcome"),
            &["outcome"],
        )?;
        let consultations_received =
            IntCounter::new("consultations_received_total", "Consultation requests stored")?;
        let rate_limited = IntCounter::new("rate_limited_total", "Requests rejected by the rate limiter")?;

        registry.register(Box::new(drafts_started.clone()))?;
        registry.register(Box::new(bookings_submitted.clone()))?;
        registry.register(Box::new(consultations_received.clone()))?;
        registry.register(Box::new(rate_limited.clone()))?;

        Ok(Self {
            registry,
            drafts_started,
            bookings_submitted,
            consultations_received,
            rate_limited,
        })
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::InternalServerError(format!("Metrics encoding failed: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.bookings_submitted.with_label_values(&["created"]).inc();
        metrics.drafts_started.inc();

        let text = metrics.render().unwrap();
        assert!(text.contains("pilgrim_bookings_submitted_total{outcome=\"created\"} 1"));
        assert!(text.contains("pilgrim_drafts_started_total 1"));
    }
}
