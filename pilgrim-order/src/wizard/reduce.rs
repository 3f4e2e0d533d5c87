use chrono::NaiveDate;
use pilgrim_core::PaymentMethod;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BookingDraft, Step, WizardError, WizardSettings};
use crate::models::TravelerRecord;
use crate::validation::{self, TravelerField, ValidationContext};

/// Everything a user can do to a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DraftAction {
    AddTraveler,
    RemoveTraveler,
    UpdateTraveler {
        traveler_id: Uuid,
        field: TravelerField,
        value: String,
    },
    SetInsurance {
        selected: bool,
    },
    SetFlight {
        selected: bool,
    },
    SetPaymentMethod {
        method: PaymentMethod,
    },
    SetSpecialRequests {
        text: Option<String>,
    },
    AcceptTerms {
        accepted: bool,
    },
    Advance,
    Retreat,
    JumpTo {
        step: Step,
    },
}

/// Inputs a reduction may read besides the draft itself.
#[derive(Debug, Clone, Copy)]
pub struct WizardEnv<'a> {
    pub today: NaiveDate,
    pub settings: &'a WizardSettings,
}

/// Applies `action` to `draft` and returns the next draft.
///
/// `Err` means the action was refused and the draft is unchanged. A failed
/// advance from `TravelerInfo` is not a refusal: it returns a draft still on
/// `TravelerInfo` with the error map filled in.
pub fn reduce(draft: &BookingDraft, action: DraftAction, env: WizardEnv<'_>) -> Result<BookingDraft, WizardError> {
    if draft.is_submitted() {
        return Err(WizardError::AlreadySubmitted);
    }
    let mut next = draft.clone();

    match action {
        DraftAction::AddTraveler => {
            expect_step(draft, Step::TravelerInfo)?;
            if next.traveler_count() >= env.settings.max_travelers {
                return Err(WizardError::TravelerLimit {
                    max: env.settings.max_travelers,
                });
            }
            next.travelers.push(TravelerRecord::blank());
        }
        DraftAction::RemoveTraveler => {
            expect_step(draft, Step::TravelerInfo)?;
            if next.travelers.len() <= 1 {
                return Err(WizardError::MinimumTravelers);
            }
            if let Some(removed) = next.travelers.pop() {
                next.errors.remove(&removed.id);
                next.email_hints.remove(&removed.id);
            }
        }
        DraftAction::UpdateTraveler {
            traveler_id,
            field,
            value,
        } => {
            expect_step(draft, Step::TravelerInfo)?;
            let traveler = next
                .travelers
                .iter_mut()
                .find(|traveler| traveler.id == traveler_id)
                .ok_or(WizardError::UnknownTraveler(traveler_id))?;
            set_field(traveler, field, value);

            if field == TravelerField::Email {
                match validation::suggest_email(&traveler.email) {
                    Some(hint) => next.email_hints.insert(traveler_id, hint),
                    None => next.email_hints.remove(&traveler_id),
                };
            }
            // Optimistic clearing: the error goes away on edit and comes back
            // only if the next advance still finds it.
            if let Some(errors) = next.errors.get_mut(&traveler_id) {
                errors.remove(&field);
                if errors.is_empty() {
                    next.errors.remove(&traveler_id);
                }
            }
        }
        DraftAction::SetInsurance { selected } => {
            expect_step(draft, Step::AddOns)?;
            next.add_ons.insurance = selected;
        }
        DraftAction::SetFlight { selected } => {
            expect_step(draft, Step::AddOns)?;
            if next.quote.flight_included && !selected {
                return Err(WizardError::FlightIncluded);
            }
            next.add_ons.flight = selected || next.quote.flight_included;
        }
        DraftAction::SetPaymentMethod { method } => {
            expect_step(draft, Step::Payment)?;
            if method == PaymentMethod::OnlinePayment && !env.settings.online_payment_enabled {
                return Err(WizardError::PaymentMethodUnavailable);
            }
            next.payment_method = method;
        }
        DraftAction::SetSpecialRequests { text } => {
            expect_step(draft, Step::Payment)?;
            next.special_requests = text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        }
        DraftAction::AcceptTerms { accepted } => {
            expect_step(draft, Step::Review)?;
            next.terms_accepted = accepted;
        }
        DraftAction::Advance => advance(&mut next, env)?,
        DraftAction::Retreat => {
            next.step = draft.step.previous().ok_or(WizardError::CannotRetreat(draft.step))?;
        }
        DraftAction::JumpTo { step } => {
            if draft.step != Step::Review || !step.is_editable() {
                return Err(WizardError::InvalidJump {
                    from: draft.step,
                    to: step,
                });
            }
            next.step = step;
        }
    }

    Ok(next)
}

fn advance(next: &mut BookingDraft, env: WizardEnv<'_>) -> Result<(), WizardError> {
    let target = next.step.next().ok_or(WizardError::CannotAdvance(next.step))?;

    if next.step == Step::TravelerInfo {
        let ctx = ValidationContext::new(env.today, next.quote.departure_date);
        next.errors = validation::validate_travelers(&next.travelers, &ctx);
        next.email_hints = next
            .travelers
            .iter()
            .filter_map(|traveler| validation::suggest_email(&traveler.email).map(|hint| (traveler.id, hint)))
            .collect();
        if !next.errors.is_empty() {
            return Ok(());
        }
        for traveler in &mut next.travelers {
            traveler.passport_number = validation::normalize_passport_number(&traveler.passport_number);
        }
    }

    next.step = target;
    Ok(())
}

fn expect_step(draft: &BookingDraft, expected: Step) -> Result<(), WizardError> {
    if draft.step == expected {
        Ok(())
    } else {
        Err(WizardError::WrongStep {
            expected,
            actual: draft.step,
        })
    }
}

fn set_field(traveler: &mut TravelerRecord, field: TravelerField, value: String) {
    match field {
        TravelerField::FirstName => traveler.first_name = value,
        TravelerField::LastName => traveler.last_name = value,
        TravelerField::Email => traveler.email = value,
        TravelerField::Phone => traveler.phone = value,
        TravelerField::PassportNumber => traveler.passport_number = validation::normalize_passport_number(&value),
        TravelerField::PassportExpiry => traveler.passport_expiry = value,
        TravelerField::DateOfBirth => traveler.date_of_birth = value,
        TravelerField::Nationality => traveler.nationality = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::TourQuote;
    use pilgrim_core::money::Currency;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn draft(flight_included: bool) -> BookingDraft {
        BookingDraft::new(TourQuote {
            tour_id: Uuid::new_v4(),
            slug: "hajj-2027".into(),
            title: "Hajj 2027".into(),
            currency: Currency::Eur,
            base_price: dec!(3250),
            insurance_unit_cost: dec!(99),
            flight_unit_cost: dec!(450),
            flight_included,
            departure_date: NaiveDate::from_ymd_opt(2027, 5, 20),
        })
    }

    fn apply(draft: &BookingDraft, action: DraftAction, settings: &WizardSettings) -> Result<BookingDraft, WizardError> {
        reduce(draft, action, WizardEnv { today: today(), settings })
    }

    fn fill(draft: BookingDraft, traveler_id: Uuid, passport: &str, settings: &WizardSettings) -> BookingDraft {
        let values = [
            (TravelerField::FirstName, "Bilal"),
            (TravelerField::LastName, "Rahman"),
            (TravelerField::Email, "bilal@example.com"),
            (TravelerField::Phone, "+44 7700 900123"),
            (TravelerField::PassportNumber, passport),
            (TravelerField::PassportExpiry, "2031-01-01"),
            (TravelerField::DateOfBirth, "1990-07-04"),
            (TravelerField::Nationality, "British"),
        ];
        values.into_iter().fold(draft, |draft, (field, value)| {
            apply(
                &draft,
                DraftAction::UpdateTraveler {
                    traveler_id,
                    field,
                    value: value.to_string(),
                },
                settings,
            )
            .unwrap()
        })
    }

    #[test]
    fn test_traveler_count_tracks_list_within_bounds() {
        let settings = WizardSettings::default();
        let mut current = draft(false);

        for _ in 0..9 {
            current = apply(&current, DraftAction::AddTraveler, &settings).unwrap();
        }
        assert_eq!(current.traveler_count(), 10);
        assert_eq!(
            apply(&current, DraftAction::AddTraveler, &settings),
            Err(WizardError::TravelerLimit { max: 10 })
        );

        for _ in 0..9 {
            current = apply(&current, DraftAction::RemoveTraveler, &settings).unwrap();
        }
        assert_eq!(current.travelers.len(), 1);
        assert_eq!(
            apply(&current, DraftAction::RemoveTraveler, &settings),
            Err(WizardError::MinimumTravelers)
        );
    }

    #[test]
    fn test_advance_is_gated_on_valid_travelers() {
        let settings = WizardSettings::default();
        let start = draft(false);
        let traveler_id = start.travelers[0].id;

        let blocked = apply(&start, DraftAction::Advance, &settings).unwrap();
        assert_eq!(blocked.step, Step::TravelerInfo);
        assert_eq!(blocked.errors[&traveler_id].len(), 8);
        assert_eq!(blocked.first_invalid_traveler(), Some((0, traveler_id)));

        let filled = fill(blocked, traveler_id, "ab1234567", &settings);
        assert!(filled.errors.is_empty(), "edits clear errors optimistically");

        let advanced = apply(&filled, DraftAction::Advance, &settings).unwrap();
        assert_eq!(advanced.step, Step::AddOns);
        assert!(advanced.errors.is_empty());
        assert_eq!(advanced.travelers[0].passport_number, "AB1234567");
    }

    #[test]
    fn test_edit_clears_only_the_edited_field() {
        let settings = WizardSettings::default();
        let start = draft(false);
        let traveler_id = start.travelers[0].id;
        let blocked = apply(&start, DraftAction::Advance, &settings).unwrap();

        let edited = apply(
            &blocked,
            DraftAction::UpdateTraveler {
                traveler_id,
                field: TravelerField::FirstName,
                value: "".into(),
            },
            &settings,
        )
        .unwrap();
        assert!(!edited.errors[&traveler_id].contains_key(&TravelerField::FirstName));
        assert!(edited.errors[&traveler_id].contains_key(&TravelerField::LastName));
    }

    #[test]
    fn test_errors_keyed_by_invalid_travelers_only() {
        let settings = WizardSettings::default();
        let mut current = draft(false);
        current = apply(&current, DraftAction::AddTraveler, &settings).unwrap();
        current = apply(&current, DraftAction::AddTraveler, &settings).unwrap();
        let ids: Vec<Uuid> = current.travelers.iter().map(|t| t.id).collect();

        current = fill(current, ids[0], "12", &settings);
        current = fill(current, ids[1], "N1234567", &settings);
        current = fill(current, ids[2], "bad!pass", &settings);

        let blocked = apply(&current, DraftAction::Advance, &settings).unwrap();
        assert_eq!(blocked.step, Step::TravelerInfo);
        assert_eq!(blocked.errors.len(), 2);
        for id in [ids[0], ids[2]] {
            let fields = &blocked.errors[&id];
            assert_eq!(fields.len(), 1);
            assert!(fields.contains_key(&TravelerField::PassportNumber));
        }
        assert!(!blocked.errors.contains_key(&ids[1]));
        assert_eq!(blocked.first_invalid_traveler(), Some((0, ids[0])));
    }

    #[test]
    fn test_retreat_and_jump_skip_validation() {
        let settings = WizardSettings::default();
        let start = draft(false);
        let traveler_id = start.travelers[0].id;
        let mut current = fill(start, traveler_id, "ab1234567", &settings);
        for _ in 0..3 {
            current = apply(&current, DraftAction::Advance, &settings).unwrap();
        }
        assert_eq!(current.step, Step::Review);
        assert_eq!(
            apply(&current, DraftAction::Advance, &settings),
            Err(WizardError::CannotAdvance(Step::Review))
        );

        let jumped = apply(&current, DraftAction::JumpTo { step: Step::TravelerInfo }, &settings).unwrap();
        assert_eq!(jumped.step, Step::TravelerInfo);
        assert!(jumped.errors.is_empty());
        assert_eq!(
            apply(&jumped, DraftAction::Retreat, &settings),
            Err(WizardError::CannotRetreat(Step::TravelerInfo))
        );
        assert!(matches!(
            apply(&jumped, DraftAction::JumpTo { step: Step::Payment }, &settings),
            Err(WizardError::InvalidJump { .. })
        ));

        let back = apply(&current, DraftAction::Retreat, &settings).unwrap();
        assert_eq!(back.step, Step::Payment);
    }

    #[test]
    fn test_included_flight_cannot_be_removed() {
        let settings = WizardSettings::default();
        let mut current = draft(true);
        current.step = Step::AddOns;

        assert_eq!(
            apply(&current, DraftAction::SetFlight { selected: false }, &settings),
            Err(WizardError::FlightIncluded)
        );
        let with_insurance = apply(&current, DraftAction::SetInsurance { selected: true }, &settings).unwrap();
        assert!(with_insurance.add_ons.flight);
        assert!(with_insurance.add_ons.insurance);
    }

    #[test]
    fn test_online_payment_can_be_disabled() {
        let settings = WizardSettings {
            online_payment_enabled: false,
            ..WizardSettings::default()
        };
        let mut current = draft(false);
        current.step = Step::Payment;

        assert_eq!(
            apply(
                &current,
                DraftAction::SetPaymentMethod {
                    method: PaymentMethod::OnlinePayment
                },
                &settings
            ),
            Err(WizardError::PaymentMethodUnavailable)
        );
    }

    #[test]
    fn test_actions_are_tied_to_their_step() {
        let settings = WizardSettings::default();
        let current = draft(false);
        assert_eq!(
            apply(&current, DraftAction::SetInsurance { selected: true }, &settings),
            Err(WizardError::WrongStep {
                expected: Step::AddOns,
                actual: Step::TravelerInfo
            })
        );
    }

    #[test]
    fn test_email_hint_is_not_an_error() {
        let settings = WizardSettings::default();
        let start = draft(false);
        let traveler_id = start.travelers[0].id;
        let filled = fill(start, traveler_id, "ab1234567", &settings);
        let typo = apply(
            &filled,
            DraftAction::UpdateTraveler {
                traveler_id,
                field: TravelerField::Email,
                value: "bilal@gmial.com".into(),
            },
            &settings,
        )
        .unwrap();
        assert_eq!(typo.email_hints[&traveler_id], "bilal@gmail.com");

        let advanced = apply(&typo, DraftAction::Advance, &settings).unwrap();
        assert_eq!(advanced.step, Step::AddOns);
    }

    #[test]
    fn test_action_wire_format() {
        let action: DraftAction = serde_json::from_value(serde_json::json!({
            "type": "UPDATE_TRAVELER",
            "traveler_id": "6f1c2b8e-41f0-4d8e-9b3c-2a4f5e6d7c8b",
            "field": "passportNumber",
            "value": "x1234567"
        }))
        .unwrap();
        assert!(matches!(action, DraftAction::UpdateTraveler { field: TravelerField::PassportNumber, .. }));

        let jump: DraftAction = serde_json::from_value(serde_json::json!({
            "type": "JUMP_TO",
            "step": "ADD_ONS"
        }))
        .unwrap();
        assert_eq!(jump, DraftAction::JumpTo { step: Step::AddOns });
    }
}
