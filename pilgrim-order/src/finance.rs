use chrono::{Datelike, NaiveDate};
use pilgrim_core::money;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{BookingRecord, BookingStatus};

/// Figures shown on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_bookings: usize,
    pub bookings_by_status: BTreeMap<String, usize>,
    /// Sum of booking totals, cancelled bookings excluded.
    pub revenue_total: Decimal,
    /// Deposits still owed on pending bookings.
    pub deposits_due: Decimal,
    pub revenue_this_month: Decimal,
    pub revenue_last_month: Decimal,
    /// Month-over-month revenue change in percent, one decimal place.
    pub revenue_growth_percent: Decimal,
}

/// Builds the dashboard summary for the month containing `today`.
pub fn summarize(bookings: &[BookingRecord], today: NaiveDate) -> DashboardSummary {
    let mut bookings_by_status: BTreeMap<String, usize> = BookingStatus::ALL
        .into_iter()
        .map(|status| (status.as_str().to_string(), 0))
        .collect();
    for booking in bookings {
        *bookings_by_status.entry(booking.status.as_str().to_string()).or_default() += 1;
    }

    let earning: Vec<&BookingRecord> = bookings
        .iter()
        .filter(|booking| booking.status != BookingStatus::Cancelled)
        .collect();

    let this_month = month_key(today);
    let last_month = previous_month(this_month);
    let revenue_in = |month: (i32, u32)| {
        money::sum(
            earning
                .iter()
                .filter(|booking| month_key(booking.created_at.date_naive()) == month)
                .map(|booking| booking.total_amount),
        )
    };
    let revenue_this_month = revenue_in(this_month);
    let revenue_last_month = revenue_in(last_month);

    DashboardSummary {
        total_bookings: bookings.len(),
        bookings_by_status,
        revenue_total: money::sum(earning.iter().map(|booking| booking.total_amount)),
        deposits_due: money::sum(
            bookings
                .iter()
                .filter(|booking| booking.status == BookingStatus::Pending)
                .map(|booking| booking.deposit_amount),
        ),
        revenue_this_month,
        revenue_last_month,
        revenue_growth_percent: money::growth_percent(revenue_last_month, revenue_this_month),
    }
}

fn month_key(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

fn previous_month((year, month): (i32, u32)) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingRef;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn booking(status: BookingStatus, total: Decimal, deposit: Decimal, created: (i32, u32, u32)) -> BookingRecord {
        let created_at = Utc.with_ymd_and_hms(created.0, created.1, created.2, 10, 0, 0).unwrap();
        BookingRecord {
            id: Uuid::new_v4(),
            booking_ref: BookingRef::parse("PLG-00001").unwrap(),
            tour_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            traveler_count: 1,
            currency: Default::default(),
            base_amount: total,
            insurance_amount: Decimal::ZERO,
            flight_amount: Decimal::ZERO,
            total_amount: total,
            deposit_amount: deposit,
            insurance_selected: false,
            flight_selected: false,
            payment_method: Default::default(),
            status,
            special_requests: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_summary_excludes_cancelled_revenue() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();
        let bookings = vec![
            booking(BookingStatus::Pending, dec!(1650), dec!(495), (2026, 1, 5)),
            booking(BookingStatus::Confirmed, dec!(6698), dec!(2009), (2026, 1, 12)),
            booking(BookingStatus::Cancelled, dec!(5000), dec!(1500), (2026, 1, 14)),
            booking(BookingStatus::Completed, dec!(4000), dec!(1200), (2025, 12, 3)),
        ];

        let summary = summarize(&bookings, today);
        assert_eq!(summary.total_bookings, 4);
        assert_eq!(summary.bookings_by_status["PENDING"], 1);
        assert_eq!(summary.bookings_by_status["DEPOSIT_PAID"], 0);
        assert_eq!(summary.bookings_by_status["CANCELLED"], 1);
        assert_eq!(summary.revenue_total, dec!(12348));
        assert_eq!(summary.deposits_due, dec!(495));
        assert_eq!(summary.revenue_this_month, dec!(8348));
        assert_eq!(summary.revenue_last_month, dec!(4000));
        assert_eq!(summary.revenue_growth_percent, dec!(108.7));
    }

    #[test]
    fn test_empty_dashboard() {
        let summary = summarize(&[], NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert_eq!(summary.total_bookings, 0);
        assert_eq!(summary.revenue_total, Decimal::ZERO);
        assert_eq!(summary.revenue_growth_percent, Decimal::ZERO);
        assert_eq!(summary.bookings_by_status.len(), 5);
    }
}
