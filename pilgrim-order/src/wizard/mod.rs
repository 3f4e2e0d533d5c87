//! Multi-step booking wizard.
//!
//! The draft is a plain serializable value and every user action is a pure
//! reduction `(draft, action) -> draft` ([`reduce`]). [`BookingWizard`] owns a
//! draft and wraps the reducer with submission.

mod controller;
mod draft;
mod reduce;

pub use controller::BookingWizard;
pub use draft::{AddOns, BookingDraft, TourQuote};
pub use reduce::{reduce, DraftAction, WizardEnv};

use pilgrim_catalog::{pricing::MAX_TRAVELERS, PricingConfig, PricingError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wizard stations, in order, plus the terminal `Submitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    TravelerInfo,
    AddOns,
    Payment,
    Review,
    Submitted,
}

impl Step {
    pub fn next(self) -> Option<Step> {
        match self {
            Step::TravelerInfo => Some(Step::AddOns),
            Step::AddOns => Some(Step::Payment),
            Step::Payment => Some(Step::Review),
            Step::Review | Step::Submitted => None,
        }
    }

    pub fn previous(self) -> Option<Step> {
        match self {
            Step::AddOns => Some(Step::TravelerInfo),
            Step::Payment => Some(Step::AddOns),
            Step::Review => Some(Step::Payment),
            Step::TravelerInfo | Step::Submitted => None,
        }
    }

    /// Stations the review page links back to.
    pub fn is_editable(self) -> bool {
        matches!(self, Step::TravelerInfo | Step::AddOns | Step::Payment)
    }
}

/// Deployment switches for the wizard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardSettings {
    pub max_travelers: u8,
    pub online_payment_enabled: bool,
    pub pricing: PricingConfig,
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self {
            max_travelers: MAX_TRAVELERS,
            online_payment_enabled: true,
            pricing: PricingConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WizardError {
    #[error("Bookings are limited to {max} travelers. For larger groups please contact us directly and we will arrange it for you.")]
    TravelerLimit { max: u8 },

    #[error("A booking needs at least one traveler")]
    MinimumTravelers,

    #[error("Traveler {0} is not part of this booking")]
    UnknownTraveler(Uuid),

    #[error("This change belongs to the {expected:?} step, the booking is at {actual:?}")]
    WrongStep { expected: Step, actual: Step },

    #[error("Cannot advance from {0:?}")]
    CannotAdvance(Step),

    #[error("Cannot go back from {0:?}")]
    CannotRetreat(Step),

    #[error("Cannot jump from {from:?} to {to:?}")]
    InvalidJump { from: Step, to: Step },

    #[error("Please correct the highlighted fields for {invalid_travelers} traveler(s)")]
    InvalidTravelers { invalid_travelers: usize },

    #[error("The flight is included in this tour and cannot be removed")]
    FlightIncluded,

    #[error("Online payment is not available; please choose bank transfer")]
    PaymentMethodUnavailable,

    #[error("Please accept the terms and conditions")]
    TermsNotAccepted,

    #[error("This booking has already been submitted")]
    AlreadySubmitted,

    #[error(transparent)]
    Pricing(#[from] PricingError),
}
