//! Field-level validation for traveler and contact data.
//!
//! Every rule runs for every field and every traveler; nothing short-circuits,
//! so a form can show all of its problems at once. "Today" and the travel date
//! are passed in through [`ValidationContext`].

use chrono::{Months, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::models::{Traveler, TravelerRecord};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

/// Providers a mistyped domain is compared against for the "did you mean" hint.
const COMMON_EMAIL_PROVIDERS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "yahoo.fr",
    "hotmail.com",
    "hotmail.fr",
    "outlook.com",
    "live.com",
    "msn.com",
    "icloud.com",
    "me.com",
    "aol.com",
    "protonmail.com",
    "proton.me",
    "gmx.de",
    "gmx.net",
    "web.de",
    "orange.fr",
    "t-online.de",
];

/// Minimum passport validity past the travel date.
const PASSPORT_VALIDITY_MONTHS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TravelerField {
    FirstName,
    LastName,
    Email,
    Phone,
    PassportNumber,
    PassportExpiry,
    DateOfBirth,
    Nationality,
}

/// Problems for a single traveler, keyed by field.
pub type FieldErrors = BTreeMap<TravelerField, String>;

/// Problems for a whole draft, keyed by traveler id. Valid travelers have no entry.
pub type TravelerErrors = BTreeMap<Uuid, FieldErrors>;

#[derive(Debug, Clone, Copy)]
pub struct ValidationContext {
    pub today: NaiveDate,
    /// Departure date of the tour, or the best estimate available.
    pub travel_date: NaiveDate,
}

impl ValidationContext {
    pub fn new(today: NaiveDate, travel_date: Option<NaiveDate>) -> Self {
        Self {
            today,
            travel_date: travel_date.unwrap_or(today),
        }
    }
}

pub fn validate_traveler(traveler: &TravelerRecord, ctx: &ValidationContext) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if traveler.first_name.trim().is_empty() {
        errors.insert(TravelerField::FirstName, "First name is required".into());
    }
    if traveler.last_name.trim().is_empty() {
        errors.insert(TravelerField::LastName, "Last name is required".into());
    }
    if !is_valid_email(&traveler.email) {
        errors.insert(TravelerField::Email, "Enter a valid email address".into());
    }
    if !is_valid_phone(&traveler.phone) {
        errors.insert(
            TravelerField::Phone,
            "Enter the phone number with country code, e.g. +49 151 2345678".into(),
        );
    }
    if !is_valid_passport_number(&traveler.passport_number) {
        errors.insert(
            TravelerField::PassportNumber,
            "Passport number must be 6 to 9 letters or digits".into(),
        );
    }
    if traveler.nationality.trim().is_empty() {
        errors.insert(TravelerField::Nationality, "Nationality is required".into());
    }

    match parse_date(&traveler.date_of_birth) {
        None => {
            errors.insert(TravelerField::DateOfBirth, "Enter a valid date of birth".into());
        }
        Some(dob) if dob > ctx.today => {
            errors.insert(TravelerField::DateOfBirth, "Date of birth cannot be in the future".into());
        }
        Some(_) => {}
    }

    match parse_date(&traveler.passport_expiry) {
        None => {
            errors.insert(TravelerField::PassportExpiry, "Enter a valid passport expiry date".into());
        }
        Some(expiry) if expiry <= ctx.today => {
            errors.insert(TravelerField::PassportExpiry, "This passport has expired".into());
        }
        Some(expiry) if expiry < minimum_passport_expiry(ctx.travel_date) => {
            errors.insert(
                TravelerField::PassportExpiry,
                format!(
                    "Passport must be valid for at least {} months after travel ({} or later)",
                    PASSPORT_VALIDITY_MONTHS,
                    minimum_passport_expiry(ctx.travel_date)
                ),
            );
        }
        Some(_) => {}
    }

    errors
}

/// Validates every traveler; only travelers with problems appear in the result.
pub fn validate_travelers(travelers: &[TravelerRecord], ctx: &ValidationContext) -> TravelerErrors {
    travelers
        .iter()
        .filter_map(|traveler| {
            let errors = validate_traveler(traveler, ctx);
            (!errors.is_empty()).then_some((traveler.id, errors))
        })
        .collect()
}

/// Converts a record into a validated traveler, normalizing as it goes.
pub fn to_traveler(record: &TravelerRecord, ctx: &ValidationContext) -> Result<Traveler, FieldErrors> {
    let errors = validate_traveler(record, ctx);
    if !errors.is_empty() {
        return Err(errors);
    }
    // Both dates parsed above, so the fallbacks are unreachable.
    let (Some(passport_expiry), Some(date_of_birth)) =
        (parse_date(&record.passport_expiry), parse_date(&record.date_of_birth))
    else {
        return Err(errors);
    };
    Ok(Traveler {
        id: record.id,
        first_name: record.first_name.trim().to_string(),
        last_name: record.last_name.trim().to_string(),
        email: record.email.trim().to_ascii_lowercase(),
        phone: normalize_phone(&record.phone),
        passport_number: normalize_passport_number(&record.passport_number),
        passport_expiry,
        date_of_birth,
        nationality: record.nationality.trim().to_string(),
    })
}

pub fn minimum_passport_expiry(travel_date: NaiveDate) -> NaiveDate {
    travel_date
        .checked_add_months(Months::new(PASSPORT_VALIDITY_MONTHS))
        .unwrap_or(NaiveDate::MAX)
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email.trim())
}

/// Suggests a corrected address when the domain is a near miss of a common
/// provider (same first letter, length within two). Never blocks the form.
pub fn suggest_email(email: &str) -> Option<String> {
    let email = email.trim();
    if !is_valid_email(email) {
        return None;
    }
    let (local, domain) = email.rsplit_once('@')?;
    let domain = domain.to_ascii_lowercase();
    if COMMON_EMAIL_PROVIDERS.contains(&domain.as_str()) {
        return None;
    }
    let first = domain.chars().next()?;

    COMMON_EMAIL_PROVIDERS
        .iter()
        .filter(|provider| provider.starts_with(first) && provider.len().abs_diff(domain.len()) <= 2)
        .min_by_key(|provider| edit_distance(&domain, provider))
        .map(|provider| format!("{}@{}", local, provider))
}

pub fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect()
}

pub fn is_valid_phone(phone: &str) -> bool {
    let normalized = normalize_phone(phone);
    match normalized.strip_prefix('+') {
        Some(digits) => (10..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Passport numbers are stored upper-case without surrounding whitespace.
pub fn normalize_passport_number(value: &str) -> String {
    value.trim().to_ascii_uppercase()
}

pub fn is_valid_passport_number(value: &str) -> bool {
    let normalized = normalize_passport_number(value);
    (6..=9).contains(&normalized.len()) && normalized.chars().all(|c| c.is_ascii_alphanumeric())
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        previous = current;
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn ctx() -> ValidationContext {
        ValidationContext::new(today(), NaiveDate::from_ymd_opt(2027, 3, 1))
    }

    fn valid_traveler() -> TravelerRecord {
        TravelerRecord {
            first_name: "Amina".into(),
            last_name: "Yusuf".into(),
            email: "amina@example.com".into(),
            phone: "+49 (151) 234-5678".into(),
            passport_number: "c01x00t47".into(),
            passport_expiry: "2030-05-01".into(),
            date_of_birth: "1985-02-14".into(),
            nationality: "German".into(),
            ..TravelerRecord::blank()
        }
    }

    #[test]
    fn test_valid_traveler_has_no_errors() {
        assert!(validate_traveler(&valid_traveler(), &ctx()).is_empty());
    }

    #[test]
    fn test_blank_traveler_reports_every_field() {
        let errors = validate_traveler(&TravelerRecord::blank(), &ctx());
        assert_eq!(errors.len(), 8);
    }

    #[test]
    fn test_passport_must_outlast_travel_by_six_months() {
        let mut traveler = valid_traveler();
        traveler.passport_expiry = "2027-08-31".into();
        let errors = validate_traveler(&traveler, &ctx());
        assert!(errors.contains_key(&TravelerField::PassportExpiry));

        traveler.passport_expiry = "2027-09-01".into();
        assert!(validate_traveler(&traveler, &ctx()).is_empty());
    }

    #[test]
    fn test_expired_passport() {
        let mut traveler = valid_traveler();
        traveler.passport_expiry = "2026-10-18".into();
        let errors = validate_traveler(&traveler, &ctx());
        assert_eq!(errors[&TravelerField::PassportExpiry], "This passport has expired");
    }

    #[test]
    fn test_date_of_birth_cannot_be_in_the_future() {
        let mut traveler = valid_traveler();
        traveler.date_of_birth = "2026-10-19".into();
        let errors = validate_traveler(&traveler, &ctx());
        assert_eq!(
            errors[&TravelerField::DateOfBirth],
            "Date of birth cannot be in the future"
        );
        assert_eq!(errors.len(), 1);

        // Born today is allowed.
        traveler.date_of_birth = "2026-10-18".into();
        assert!(validate_traveler(&traveler, &ctx()).is_empty());
    }

    #[test]
    fn test_phone_rules() {
        assert!(is_valid_phone("+966 50 123 4567"));
        assert!(is_valid_phone("+1 (415) 555-0100"));
        assert!(!is_valid_phone("0151 2345678"));
        assert!(!is_valid_phone("+49 151"));
        assert!(!is_valid_phone("+49 151 2345 678x"));
        assert!(!is_valid_phone("+1234567890123456"));
    }

    #[test]
    fn test_passport_number_rules() {
        assert!(is_valid_passport_number("ab12345"));
        assert_eq!(normalize_passport_number(" ab12345 "), "AB12345");
        assert!(!is_valid_passport_number("AB123"));
        assert!(!is_valid_passport_number("AB1234567X"));
        assert!(!is_valid_passport_number("AB-12345"));
    }

    #[test]
    fn test_email_suggestion_for_near_miss() {
        assert_eq!(suggest_email("ali@gmial.com").as_deref(), Some("ali@gmail.com"));
        assert_eq!(suggest_email("ali@hotmial.com").as_deref(), Some("ali@hotmail.com"));
        assert_eq!(suggest_email("ali@gmail.com"), None);
        assert_eq!(suggest_email("ali@university.edu"), None);
        assert_eq!(suggest_email("not-an-email"), None);
    }

    #[test]
    fn test_to_traveler_normalizes() {
        let traveler = to_traveler(&valid_traveler(), &ctx()).unwrap();
        assert_eq!(traveler.passport_number, "C01X00T47");
        assert_eq!(traveler.phone, "+491512345678");
        assert_eq!(traveler.date_of_birth, NaiveDate::from_ymd_opt(1985, 2, 14).unwrap());
    }

    #[test]
    fn test_validation_is_exhaustive_across_travelers() {
        let mut first = valid_traveler();
        first.passport_number = "X1".into();
        let second = valid_traveler();
        let mut third = valid_traveler();
        third.passport_number = "TOO-LONG-123".into();
        let second_id = second.id;

        let errors = validate_travelers(&[first.clone(), second, third.clone()], &ctx());
        assert_eq!(errors.len(), 2);
        assert!(errors[&first.id].contains_key(&TravelerField::PassportNumber));
        assert!(errors[&third.id].contains_key(&TravelerField::PassportNumber));
        assert!(!errors.contains_key(&second_id));
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("gmial.com", "gmail.com"), 2);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("same", "same"), 0);
    }
}
