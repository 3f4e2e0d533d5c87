use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use pilgrim_core::{StoreError, StoreResult};
use pilgrim_order::models::{Customer, PaymentRecord};
use pilgrim_order::{BookingRecord, BookingRef, BookingRepository, BookingStatus, NewBooking, Traveler};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::database::{store_error, unique_violation};

const BOOKING_REF_CONSTRAINT: &str = "bookings_booking_ref_key";

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    booking_ref: String,
    tour_id: Uuid,
    customer_id: Uuid,
    traveler_count: i16,
    currency: String,
    base_amount: Decimal,
    insurance_amount: Decimal,
    flight_amount: Decimal,
    total_amount: Decimal,
    deposit_amount: Decimal,
    insurance_selected: bool,
    flight_selected: bool,
    payment_method: String,
    status: String,
    special_requests: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for BookingRecord {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(BookingRecord {
            id: row.id,
            booking_ref: BookingRef::parse(&row.booking_ref)?,
            tour_id: row.tour_id,
            customer_id: row.customer_id,
            traveler_count: u8::try_from(row.traveler_count)
                .map_err(|_| StoreError::Invalid(format!("traveler_count {} out of range", row.traveler_count)))?,
            currency: row.currency.parse()?,
            base_amount: row.base_amount,
            insurance_amount: row.insurance_amount,
            flight_amount: row.flight_amount,
            total_amount: row.total_amount,
            deposit_amount: row.deposit_amount,
            insurance_selected: row.insurance_selected,
            flight_selected: row.flight_selected,
            payment_method: row.payment_method.parse()?,
            status: row.status.parse()?,
            special_requests: row.special_requests,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TravelerRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    passport_number: String,
    passport_expiry: NaiveDate,
    date_of_birth: NaiveDate,
    nationality: String,
}

impl From<TravelerRow> for Traveler {
    fn from(row: TravelerRow) -> Self {
        Traveler {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            passport_number: row.passport_number,
            passport_expiry: row.passport_expiry,
            date_of_birth: row.date_of_birth,
            nationality: row.nationality,
        }
    }
}

const BOOKING_COLUMNS: &str = "id, booking_ref, tour_id, customer_id, traveler_count, currency, base_amount, \
     insurance_amount, flight_amount, total_amount, deposit_amount, insurance_selected, flight_selected, \
     payment_method, status, special_requests, created_at, updated_at";

impl PgBookingRepository {
    /// Customers are keyed by email; a returning customer keeps their id and
    /// gets their contact details refreshed.
    async fn upsert_customer(tx: &mut Transaction<'_, Postgres>, lead: &Traveler) -> StoreResult<Customer> {
        let (id, created_at): (Uuid, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO customers (id, email, first_name, last_name, phone)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE
                SET first_name = EXCLUDED.first_name,
                    last_name = EXCLUDED.last_name,
                    phone = EXCLUDED.phone
            RETURNING id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(lead.email.to_ascii_lowercase())
        .bind(&lead.first_name)
        .bind(&lead.last_name)
        .bind(&lead.phone)
        .fetch_one(&mut **tx)
        .await
        .map_err(store_error)?;

        Ok(Customer {
            id,
            email: lead.email.to_ascii_lowercase(),
            first_name: lead.first_name.clone(),
            last_name: lead.last_name.clone(),
            phone: lead.phone.clone(),
            created_at,
        })
    }

    async fn insert_booking(
        tx: &mut Transaction<'_, Postgres>,
        record: &BookingRecord,
        terms_accepted: bool,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, booking_ref, tour_id, customer_id, traveler_count, currency,
                base_amount, insurance_amount, flight_amount, total_amount, deposit_amount,
                insurance_selected, flight_selected, payment_method, status, terms_accepted,
                special_requests, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(record.id)
        .bind(record.booking_ref.as_str())
        .bind(record.tour_id)
        .bind(record.customer_id)
        .bind(i16::from(record.traveler_count))
        .bind(record.currency.code())
        .bind(record.base_amount)
        .bind(record.insurance_amount)
        .bind(record.flight_amount)
        .bind(record.total_amount)
        .bind(record.deposit_amount)
        .bind(record.insurance_selected)
        .bind(record.flight_selected)
        .bind(record.payment_method.as_str())
        .bind(record.status.as_str())
        .bind(terms_accepted)
        .bind(&record.special_requests)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(constraint) if constraint == BOOKING_REF_CONSTRAINT => {
                StoreError::DuplicateReference(record.booking_ref.to_string())
            }
            _ => store_error(e),
        })?;
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn find_booking_by_reference(&self, reference: &BookingRef) -> StoreResult<Option<BookingRecord>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE booking_ref = $1");
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(reference.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        row.map(BookingRecord::try_from).transpose()
    }

    async fn create_booking(&self, reference: &BookingRef, booking: &NewBooking) -> StoreResult<BookingRecord> {
        let lead = booking
            .lead_traveler()
            .ok_or_else(|| StoreError::Invalid("a booking needs at least one traveler".into()))?;

        // Dropping the transaction without commit rolls everything back.
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let customer = Self::upsert_customer(&mut tx, lead).await?;
        let record = BookingRecord::from_new(reference.clone(), customer.id, booking);
        Self::insert_booking(&mut tx, &record, booking.terms_accepted).await?;

        for (position, traveler) in booking.travelers.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO booking_travelers (
                    id, booking_id, position, first_name, last_name, email, phone,
                    passport_number, passport_expiry, date_of_birth, nationality
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(traveler.id)
            .bind(record.id)
            .bind(i16::try_from(position).unwrap_or(i16::MAX))
            .bind(&traveler.first_name)
            .bind(&traveler.last_name)
            .bind(&traveler.email)
            .bind(&traveler.phone)
            .bind(&traveler.passport_number)
            .bind(traveler.passport_expiry)
            .bind(traveler.date_of_birth)
            .bind(&traveler.nationality)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        }

        let payment = PaymentRecord::deposit_for(&record);
        sqlx::query(
            r#"
            INSERT INTO payments (id, booking_id, method, amount, currency, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(payment.method.as_str())
        .bind(payment.amount)
        .bind(payment.currency.code())
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        tx.commit().await.map_err(store_error)?;
        info!(booking_ref = %record.booking_ref, customer_id = %customer.id, "Booking persisted");
        Ok(record)
    }

    async fn list_bookings(&self, status: Option<BookingStatus>) -> StoreResult<Vec<BookingRecord>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE ($1::TEXT IS NULL OR status = $1) ORDER BY created_at DESC"
        );
        let rows: Vec<BookingRow> = sqlx::query_as(&sql)
            .bind(status.map(BookingStatus::as_str))
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        rows.into_iter().map(BookingRecord::try_from).collect()
    }

    async fn update_booking_status(
        &self,
        reference: &BookingRef,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<BookingRecord> {
        let sql = format!(
            "UPDATE bookings SET status = $3, updated_at = NOW() \
             WHERE booking_ref = $1 AND status = $2 \
             RETURNING {BOOKING_COLUMNS}"
        );
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(reference.as_str())
            .bind(from.as_str())
            .bind(to.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        match row {
            Some(row) => row.try_into(),
            None => Err(StoreError::Conflict(format!(
                "booking {} is no longer {}",
                reference, from
            ))),
        }
    }

    async fn booking_travelers(&self, booking_id: Uuid) -> StoreResult<Vec<Traveler>> {
        let rows: Vec<TravelerRow> = sqlx::query_as(
            r#"
            SELECT id, first_name, last_name, email, phone, passport_number,
                   passport_expiry, date_of_birth, nationality
            FROM booking_travelers
            WHERE booking_id = $1
            ORDER BY position
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(Traveler::from).collect())
    }
}
