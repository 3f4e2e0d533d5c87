use pilgrim_core::{CoreError, CoreResult};
use uuid::Uuid;

use crate::tour::Tour;

/// At most this many tours can be promoted on the homepage at once.
pub const DEFAULT_FEATURED_CAP: usize = 3;

/// Enforces the featured-tour cap. Stores call `admit` inside their write
/// path, before anything is written.
#[derive(Debug, Clone, Copy)]
pub struct FeaturedPolicy {
    cap: usize,
}

impl FeaturedPolicy {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// `featured` is the current set of featured tours. `candidate` is the
    /// tour about to be written as featured; it does not count against the
    /// cap if it is already in the set.
    pub fn admit<'a, I>(&self, featured: I, candidate: Uuid) -> CoreResult<()>
    where
        I: IntoIterator<Item = &'a Tour>,
    {
        let others = featured
            .into_iter()
            .filter(|tour| tour.is_featured && tour.id != candidate)
            .count();
        if others >= self.cap {
            return Err(CoreError::Conflict(format!(
                "At most {} tours can be featured at the same time; un-feature one first",
                self.cap
            )));
        }
        Ok(())
    }

    pub fn admit_count(&self, other_featured: usize) -> CoreResult<()> {
        if other_featured >= self.cap {
            return Err(CoreError::Conflict(format!(
                "At most {} tours can be featured at the same time; un-feature one first",
                self.cap
            )));
        }
        Ok(())
    }
}

impl Default for FeaturedPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FEATURED_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tour::NewTour;

    fn featured_tour(slug: &str) -> Tour {
        let new: NewTour = serde_json::from_value(serde_json::json!({
            "slug": slug,
            "title": slug,
            "duration_days": 10,
            "base_price": "1000",
            "insurance_unit_cost": "50",
            "flight_unit_cost": "400",
            "is_featured": true
        }))
        .unwrap();
        new.into_tour().unwrap()
    }

    #[test]
    fn test_fourth_featured_tour_is_rejected() {
        let policy = FeaturedPolicy::default();
        let tours = vec![featured_tour("a"), featured_tour("b"), featured_tour("c")];

        let result = policy.admit(&tours, Uuid::new_v4());
        assert!(matches!(result, Err(CoreError::Conflict(_))));
    }

    #[test]
    fn test_refeaturing_a_featured_tour_is_allowed() {
        let policy = FeaturedPolicy::default();
        let tours = vec![featured_tour("a"), featured_tour("b"), featured_tour("c")];

        assert!(policy.admit(&tours, tours[1].id).is_ok());
        assert!(policy.admit(&tours[..2], Uuid::new_v4()).is_ok());
    }
}
