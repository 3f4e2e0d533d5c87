use chrono::NaiveDate;
use pilgrim_catalog::{PricingEngine, PricingSnapshot};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{reduce, BookingDraft, DraftAction, Step, TourQuote, WizardEnv, WizardError, WizardSettings};
use crate::models::{BookingRef, NewBooking};
use crate::orchestrator::{BookingService, SubmitError};
use crate::repository::DraftStore;
use crate::validation::{self, TravelerField, ValidationContext};

/// Owns one session's draft and applies actions to it.
pub struct BookingWizard {
    draft: BookingDraft,
    settings: WizardSettings,
    engine: PricingEngine,
}

impl BookingWizard {
    pub fn start(quote: TourQuote, settings: WizardSettings) -> Self {
        Self::resume(BookingDraft::new(quote), settings)
    }

    /// Picks up a draft loaded from the draft store.
    pub fn resume(draft: BookingDraft, settings: WizardSettings) -> Self {
        let engine = PricingEngine::new(settings.pricing.clone());
        Self {
            draft,
            settings,
            engine,
        }
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    pub fn into_draft(self) -> BookingDraft {
        self.draft
    }

    pub fn step(&self) -> Step {
        self.draft.step
    }

    pub fn pricing(&self) -> Result<PricingSnapshot, WizardError> {
        self.draft.pricing(&self.engine)
    }

    /// Applies one action. A refused action leaves the draft untouched. A
    /// blocked advance keeps the refreshed error map on the draft and still
    /// reports `InvalidTravelers` so the caller can focus the first one.
    pub fn dispatch(&mut self, action: DraftAction, today: NaiveDate) -> Result<&BookingDraft, WizardError> {
        let is_advance = action == DraftAction::Advance;
        let env = WizardEnv {
            today,
            settings: &self.settings,
        };
        let next = reduce(&self.draft, action, env)?;
        let blocked = is_advance && next.step == self.draft.step;
        self.draft = next;

        if blocked {
            debug!(draft_id = %self.draft.id, invalid = self.draft.errors.len(), "Advance blocked by traveler errors");
            return Err(WizardError::InvalidTravelers {
                invalid_travelers: self.draft.errors.len(),
            });
        }
        Ok(&self.draft)
    }

    pub fn advance(&mut self, today: NaiveDate) -> Result<&BookingDraft, WizardError> {
        self.dispatch(DraftAction::Advance, today)
    }

    pub fn retreat(&mut self, today: NaiveDate) -> Result<&BookingDraft, WizardError> {
        self.dispatch(DraftAction::Retreat, today)
    }

    pub fn jump_to(&mut self, step: Step, today: NaiveDate) -> Result<&BookingDraft, WizardError> {
        self.dispatch(DraftAction::JumpTo { step }, today)
    }

    pub fn add_traveler(&mut self, today: NaiveDate) -> Result<&BookingDraft, WizardError> {
        self.dispatch(DraftAction::AddTraveler, today)
    }

    pub fn remove_traveler(&mut self, today: NaiveDate) -> Result<&BookingDraft, WizardError> {
        self.dispatch(DraftAction::RemoveTraveler, today)
    }

    pub fn update_traveler(
        &mut self,
        traveler_id: Uuid,
        field: TravelerField,
        value: impl Into<String>,
        today: NaiveDate,
    ) -> Result<&BookingDraft, WizardError> {
        self.dispatch(
            DraftAction::UpdateTraveler {
                traveler_id,
                field,
                value: value.into(),
            },
            today,
        )
    }

    /// Everything the booking service needs, or the reason the draft is not
    /// ready yet.
    pub fn submission(&self, today: NaiveDate) -> Result<NewBooking, WizardError> {
        match self.draft.step {
            Step::Review => {}
            Step::Submitted => return Err(WizardError::AlreadySubmitted),
            actual => {
                return Err(WizardError::WrongStep {
                    expected: Step::Review,
                    actual,
                })
            }
        }
        if !self.draft.terms_accepted {
            return Err(WizardError::TermsNotAccepted);
        }

        let ctx = ValidationContext::new(today, self.draft.quote.departure_date);
        let travelers = self
            .draft
            .travelers
            .iter()
            .map(|record| validation::to_traveler(record, &ctx))
            .collect::<Result<Vec<_>, _>>();
        // Only reachable when the draft sat in Review past a passport expiry.
        let travelers = travelers.map_err(|_| WizardError::InvalidTravelers {
            invalid_travelers: validation::validate_travelers(&self.draft.travelers, &ctx).len(),
        })?;

        Ok(NewBooking {
            tour_id: self.draft.quote.tour_id,
            tour_title: self.draft.quote.title.clone(),
            departure_date: self.draft.quote.departure_date,
            travelers,
            pricing: self.pricing()?,
            insurance_selected: self.draft.add_ons.insurance,
            flight_selected: self.draft.add_ons.flight,
            payment_method: self.draft.payment_method,
            terms_accepted: self.draft.terms_accepted,
            special_requests: self.draft.special_requests.clone(),
        })
    }

    /// Submits the draft. On failure the wizard stays in Review with the
    /// draft intact so the user can try again.
    pub async fn submit(&mut self, service: &BookingService, today: NaiveDate) -> Result<BookingRef, SubmitError> {
        let booking = self.submission(today)?;
        match service.submit(booking).await {
            Ok(record) => {
                info!(draft_id = %self.draft.id, booking_ref = %record.booking_ref, "Draft submitted");
                self.draft.step = Step::Submitted;
                self.draft.booking_ref = Some(record.booking_ref.clone());
                Ok(record.booking_ref)
            }
            Err(e) => {
                warn!(draft_id = %self.draft.id, retryable = e.is_retryable(), "Draft submission failed: {}", e);
                Err(e)
            }
        }
    }

    /// Submits a draft held in `drafts`, at most once.
    ///
    /// The draft is claimed before anything is written, so a double click or
    /// a retry racing the first request gets `AlreadyClaimed` instead of a
    /// second booking. The claim is released only when the submission wrote
    /// nothing. Once the booking is committed the call succeeds even if the
    /// submitted draft cannot be saved back.
    pub async fn submit_stored(
        &mut self,
        service: &BookingService,
        drafts: &dyn DraftStore,
        ttl: Duration,
        today: NaiveDate,
    ) -> Result<BookingRef, SubmitError> {
        let id = self.draft.id;
        if !drafts.claim_submission(id, ttl).await? {
            warn!(draft_id = %id, "Draft submission already claimed");
            return Err(SubmitError::AlreadyClaimed);
        }

        let reference = match self.submit(service, today).await {
            Ok(reference) => reference,
            Err(e) => {
                if let Err(release) = drafts.release_submission(id).await {
                    error!(draft_id = %id, "Failed to release draft claim: {}", release);
                }
                return Err(e);
            }
        };

        if let Err(e) = drafts.save_draft(&self.draft, ttl).await {
            error!(draft_id = %id, booking_ref = %reference, "Booking committed but draft not saved: {}", e);
        }
        Ok(reference)
    }
}
