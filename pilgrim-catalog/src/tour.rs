use chrono::{DateTime, NaiveDate, Utc};
use pilgrim_core::{money::Currency, CoreError, CoreResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A tour offered by the agency (Umrah, Hajj, Ziyarat packages).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub summary: Option<String>,
    pub duration_days: u16,
    pub departure_date: Option<NaiveDate>,
    pub currency: Currency,
    pub base_price: Decimal,
    pub insurance_unit_cost: Decimal,
    pub flight_unit_cost: Decimal,
    pub flight_included: bool,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin input for creating a tour. Every accepted field is listed; anything
/// else in the payload is rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewTour {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    pub duration_days: u16,
    #[serde(default)]
    pub departure_date: Option<NaiveDate>,
    #[serde(default)]
    pub currency: Currency,
    pub base_price: Decimal,
    pub insurance_unit_cost: Decimal,
    pub flight_unit_cost: Decimal,
    #[serde(default)]
    pub flight_included: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
}

fn default_true() -> bool {
    true
}

impl NewTour {
    pub fn into_tour(self) -> CoreResult<Tour> {
        validate_slug(&self.slug)?;
        validate_title(&self.title)?;
        if self.duration_days == 0 {
            return Err(CoreError::ValidationError("duration_days must be positive".into()));
        }
        let now = Utc::now();
        Ok(Tour {
            id: Uuid::new_v4(),
            slug: self.slug,
            title: self.title.trim().to_string(),
            summary: self.summary,
            duration_days: self.duration_days,
            departure_date: self.departure_date,
            currency: self.currency,
            base_price: self.currency.check_amount(self.base_price)?,
            insurance_unit_cost: self.currency.check_amount(self.insurance_unit_cost)?,
            flight_unit_cost: self.currency.check_amount(self.flight_unit_cost)?,
            flight_included: self.flight_included,
            is_active: self.is_active,
            is_featured: self.is_featured,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of a tour. `None` leaves a field untouched. Unknown fields
/// fail deserialization instead of being merged silently.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TourUpdate {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// `null` clears the summary; omitting the field keeps it.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub summary: Option<Option<String>>,
    #[serde(default)]
    pub duration_days: Option<u16>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub departure_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub base_price: Option<Decimal>,
    #[serde(default)]
    pub insurance_unit_cost: Option<Decimal>,
    #[serde(default)]
    pub flight_unit_cost: Option<Decimal>,
    #[serde(default)]
    pub flight_included: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_featured: Option<bool>,
}

impl TourUpdate {
    pub fn activation(active: bool) -> Self {
        Self {
            is_active: Some(active),
            ..Self::default()
        }
    }

    pub fn featured(featured: bool) -> Self {
        Self {
            is_featured: Some(featured),
            ..Self::default()
        }
    }

    /// Whether applying this update would leave the tour featured.
    pub fn sets_featured(&self) -> bool {
        self.is_featured == Some(true)
    }

    /// Applies the update to a copy of `tour`, validating each changed field.
    pub fn apply(&self, tour: &Tour) -> CoreResult<Tour> {
        let mut next = tour.clone();
        if let Some(slug) = &self.slug {
            validate_slug(slug)?;
            next.slug = slug.clone();
        }
        if let Some(title) = &self.title {
            validate_title(title)?;
            next.title = title.trim().to_string();
        }
        if let Some(summary) = &self.summary {
            next.summary = summary.clone();
        }
        if let Some(days) = self.duration_days {
            if days == 0 {
                return Err(CoreError::ValidationError("duration_days must be positive".into()));
            }
            next.duration_days = days;
        }
        if let Some(date) = self.departure_date {
            next.departure_date = date;
        }
        if let Some(price) = self.base_price {
            next.base_price = next.currency.check_amount(price)?;
        }
        if let Some(cost) = self.insurance_unit_cost {
            next.insurance_unit_cost = next.currency.check_amount(cost)?;
        }
        if let Some(cost) = self.flight_unit_cost {
            next.flight_unit_cost = next.currency.check_amount(cost)?;
        }
        if let Some(included) = self.flight_included {
            next.flight_included = included;
        }
        if let Some(active) = self.is_active {
            next.is_active = active;
        }
        if let Some(featured) = self.is_featured {
            next.is_featured = featured;
        }
        next.updated_at = Utc::now();
        Ok(next)
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn validate_slug(slug: &str) -> CoreResult<()> {
    let well_formed = !slug.is_empty()
        && slug.len() <= 80
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if well_formed {
        Ok(())
    } else {
        Err(CoreError::ValidationError(format!(
            "slug '{}' must be lowercase letters, digits and inner hyphens",
            slug
        )))
    }
}

fn validate_title(title: &str) -> CoreResult<()> {
    if title.trim().is_empty() {
        return Err(CoreError::ValidationError("title must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_tour() -> NewTour {
        serde_json::from_value(serde_json::json!({
            "slug": "umrah-ramadan-2027",
            "title": "Umrah Ramadan 2027",
            "duration_days": 14,
            "base_price": "3250",
            "insurance_unit_cost": "99",
            "flight_unit_cost": "450"
        }))
        .unwrap()
    }

    #[test]
    fn test_new_tour_defaults() {
        let tour = new_tour().into_tour().unwrap();
        assert!(tour.is_active);
        assert!(!tour.is_featured);
        assert_eq!(tour.currency, Currency::Eur);
        assert_eq!(tour.base_price, dec!(3250));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result = serde_json::from_value::<TourUpdate>(serde_json::json!({
            "title": "Hajj",
            "discount_hack": 100
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_update_applies_only_given_fields() {
        let tour = new_tour().into_tour().unwrap();
        let update: TourUpdate = serde_json::from_value(serde_json::json!({
            "base_price": "2999.50",
            "is_featured": true
        }))
        .unwrap();

        let next = update.apply(&tour).unwrap();
        assert_eq!(next.base_price, dec!(2999.50));
        assert!(next.is_featured);
        assert_eq!(next.title, tour.title);
        assert!(update.sets_featured());
    }

    #[test]
    fn test_null_clears_and_missing_keeps() {
        let mut tour = new_tour().into_tour().unwrap();
        tour.summary = Some("Two weeks in Makkah and Madinah".into());

        let keep: TourUpdate = serde_json::from_value(serde_json::json!({ "title": "Umrah" })).unwrap();
        assert!(keep.apply(&tour).unwrap().summary.is_some());

        let clear: TourUpdate = serde_json::from_value(serde_json::json!({ "summary": null })).unwrap();
        assert_eq!(clear.summary, Some(None));
        assert!(clear.apply(&tour).unwrap().summary.is_none());
    }

    #[test]
    fn test_bad_slug() {
        let mut tour = new_tour();
        tour.slug = "Umrah 2027".into();
        assert!(tour.into_tour().is_err());
    }
}
