use chrono::{DateTime, NaiveDate, Utc};
use pilgrim_core::{CoreError, Notifier, StoreError};
use pilgrim_shared::models::events::ConsultationRequestedEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::repository::ConsultationRepository;
use crate::validation;

pub const MAX_MESSAGE_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsultationStatus {
    New,
    Contacted,
    Scheduled,
    Closed,
}

impl ConsultationStatus {
    pub const ALL: [ConsultationStatus; 4] = [
        ConsultationStatus::New,
        ConsultationStatus::Contacted,
        ConsultationStatus::Scheduled,
        ConsultationStatus::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConsultationStatus::New => "NEW",
            ConsultationStatus::Contacted => "CONTACTED",
            ConsultationStatus::Scheduled => "SCHEDULED",
            ConsultationStatus::Closed => "CLOSED",
        }
    }

    /// Requests only move forward; a closed request stays closed.
    pub fn can_transition_to(self, next: ConsultationStatus) -> bool {
        next > self
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsultationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConsultationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::ValidationError(format!("unknown consultation status {}", s)))
    }
}

/// The public "book a consultation" form.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsultationForm {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub preferred_date: Option<NaiveDate>,
    #[serde(default)]
    pub preferred_time: Option<String>,
    #[serde(default)]
    pub tour_interest: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultationRequest {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub preferred_date: Option<NaiveDate>,
    pub preferred_time: Option<String>,
    pub tour_interest: Option<String>,
    pub message: String,
    pub status: ConsultationStatus,
    pub created_at: DateTime<Utc>,
}

impl ConsultationRequest {
    pub fn to_event(&self) -> ConsultationRequestedEvent {
        ConsultationRequestedEvent {
            consultation_id: self.id,
            full_name: self.full_name.clone(),
            email: self.email.clone().into(),
            phone: self.phone.clone().into(),
            preferred_date: self.preferred_date,
            preferred_time: self.preferred_time.clone(),
            tour_interest: self.tour_interest.clone(),
            message: self.message.clone(),
            timestamp: self.created_at.timestamp(),
        }
    }
}

/// Field name to message.
pub type FormErrors = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum ConsultationError {
    #[error("Please correct the highlighted fields")]
    Invalid(FormErrors),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validates the form and returns the request to persist.
pub fn validate_form(form: &ConsultationForm, today: NaiveDate) -> Result<ConsultationRequest, FormErrors> {
    let mut errors = FormErrors::new();

    if form.full_name.trim().is_empty() {
        errors.insert("fullName".into(), "Name is required".into());
    }
    if !validation::is_valid_email(&form.email) {
        errors.insert("email".into(), "Enter a valid email address".into());
    }
    if !validation::is_valid_phone(&form.phone) {
        errors.insert(
            "phone".into(),
            "Enter the phone number with country code, e.g. +49 151 2345678".into(),
        );
    }
    if form.preferred_date.is_some_and(|date| date < today) {
        errors.insert("preferredDate".into(), "Pick a date from today onwards".into());
    }
    if form.message.chars().count() > MAX_MESSAGE_LEN {
        errors.insert(
            "message".into(),
            format!("Keep the message under {} characters", MAX_MESSAGE_LEN),
        );
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ConsultationRequest {
        id: Uuid::new_v4(),
        full_name: form.full_name.trim().to_string(),
        email: form.email.trim().to_ascii_lowercase(),
        phone: validation::normalize_phone(&form.phone),
        preferred_date: form.preferred_date,
        preferred_time: non_blank(form.preferred_time.as_deref()),
        tour_interest: non_blank(form.tour_interest.as_deref()),
        message: form.message.trim().to_string(),
        status: ConsultationStatus::New,
        created_at: Utc::now(),
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// What the caller gets back: the stored request and an optional
/// "did you mean" for the email.
#[derive(Debug, Clone, Serialize)]
pub struct ConsultationReceipt {
    pub request: ConsultationRequest,
    pub email_hint: Option<String>,
}

pub struct ConsultationService {
    repository: Arc<dyn ConsultationRepository>,
    notifier: Arc<dyn Notifier>,
}

impl ConsultationService {
    pub fn new(repository: Arc<dyn ConsultationRepository>, notifier: Arc<dyn Notifier>) -> Self {
        Self { repository, notifier }
    }

    pub async fn request(&self, form: ConsultationForm, today: NaiveDate) -> Result<ConsultationReceipt, ConsultationError> {
        let email_hint = validation::suggest_email(&form.email);
        let request = validate_form(&form, today).map_err(ConsultationError::Invalid)?;
        let stored = self.repository.create_consultation(&request).await?;
        info!(consultation_id = %stored.id, "Consultation request received");

        let notifier = Arc::clone(&self.notifier);
        let event = stored.to_event();
        tokio::spawn(async move {
            if let Err(e) = notifier.consultation_requested(&event).await {
                warn!(consultation_id = %event.consultation_id, "Consultation notification failed: {}", e);
            }
        });

        Ok(ConsultationReceipt {
            request: stored,
            email_hint,
        })
    }
}
