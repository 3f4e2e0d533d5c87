use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use pilgrim_catalog::{FeaturedPolicy, Tour, TourRepository, TourUpdate};
use pilgrim_core::{StoreError, StoreResult};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::{store_error, unique_violation};

pub struct PgTourRepository {
    pool: PgPool,
    featured: FeaturedPolicy,
}

impl PgTourRepository {
    pub fn new(pool: PgPool, featured: FeaturedPolicy) -> Self {
        Self { pool, featured }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct TourRow {
    id: Uuid,
    slug: String,
    title: String,
    summary: Option<String>,
    duration_days: i32,
    departure_date: Option<NaiveDate>,
    currency: String,
    base_price: Decimal,
    insurance_unit_cost: Decimal,
    flight_unit_cost: Decimal,
    flight_included: bool,
    is_active: bool,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TourRow> for Tour {
    type Error = StoreError;

    fn try_from(row: TourRow) -> Result<Self, Self::Error> {
        Ok(Tour {
            id: row.id,
            slug: row.slug,
            title: row.title,
            summary: row.summary,
            duration_days: u16::try_from(row.duration_days)
                .map_err(|_| StoreError::Invalid(format!("duration_days {} out of range", row.duration_days)))?,
            departure_date: row.departure_date,
            currency: row.currency.parse()?,
            base_price: row.base_price,
            insurance_unit_cost: row.insurance_unit_cost,
            flight_unit_cost: row.flight_unit_cost,
            flight_included: row.flight_included,
            is_active: row.is_active,
            is_featured: row.is_featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const TOUR_COLUMNS: &str = "id, slug, title, summary, duration_days, departure_date, currency, base_price, \
     insurance_unit_cost, flight_unit_cost, flight_included, is_active, is_featured, created_at, updated_at";

fn slug_conflict(err: sqlx::Error, slug: &str) -> StoreError {
    match unique_violation(&err) {
        Some(constraint) if constraint == "tours_slug_key" => {
            StoreError::Conflict(format!("A tour with slug '{}' already exists", slug))
        }
        _ => store_error(err),
    }
}

impl PgTourRepository {
    /// Serializes featured-flag writes and checks the cap. Runs inside the
    /// caller's transaction, before the write.
    async fn admit_featured(&self, tx: &mut Transaction<'_, Postgres>, candidate: Uuid) -> StoreResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext('tours.featured'))")
            .execute(&mut **tx)
            .await
            .map_err(store_error)?;

        let (others,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tours WHERE is_featured AND id <> $1")
            .bind(candidate)
            .fetch_one(&mut **tx)
            .await
            .map_err(store_error)?;

        self.featured.admit_count(usize::try_from(others).unwrap_or(usize::MAX))?;
        Ok(())
    }

    async fn write_tour(&self, tx: &mut Transaction<'_, Postgres>, tour: &Tour, insert: bool) -> StoreResult<Tour> {
        let sql = if insert {
            format!(
                "INSERT INTO tours ({TOUR_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
                 RETURNING {TOUR_COLUMNS}"
            )
        } else {
            format!(
                "UPDATE tours SET slug = $2, title = $3, summary = $4, duration_days = $5, departure_date = $6, \
                 currency = $7, base_price = $8, insurance_unit_cost = $9, flight_unit_cost = $10, \
                 flight_included = $11, is_active = $12, is_featured = $13, updated_at = $15 \
                 WHERE id = $1 \
                 RETURNING {TOUR_COLUMNS}"
            )
        };

        let row: TourRow = sqlx::query_as(&sql)
            .bind(tour.id)
            .bind(&tour.slug)
            .bind(&tour.title)
            .bind(&tour.summary)
            .bind(i32::from(tour.duration_days))
            .bind(tour.departure_date)
            .bind(tour.currency.code())
            .bind(tour.base_price)
            .bind(tour.insurance_unit_cost)
            .bind(tour.flight_unit_cost)
            .bind(tour.flight_included)
            .bind(tour.is_active)
            .bind(tour.is_featured)
            .bind(tour.created_at)
            .bind(tour.updated_at)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| slug_conflict(e, &tour.slug))?;

        row.try_into()
    }
}

#[async_trait]
impl TourRepository for PgTourRepository {
    async fn list_tours(&self, active_only: bool) -> StoreResult<Vec<Tour>> {
        let sql = format!(
            "SELECT {TOUR_COLUMNS} FROM tours WHERE ($1 = FALSE OR is_active) \
             ORDER BY is_featured DESC, departure_date NULLS LAST, title"
        );
        let rows: Vec<TourRow> = sqlx::query_as(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        rows.into_iter().map(Tour::try_from).collect()
    }

    async fn get_tour(&self, id: Uuid) -> StoreResult<Option<Tour>> {
        let sql = format!("SELECT {TOUR_COLUMNS} FROM tours WHERE id = $1");
        let row: Option<TourRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        row.map(Tour::try_from).transpose()
    }

    async fn get_tour_by_slug(&self, slug: &str) -> StoreResult<Option<Tour>> {
        let sql = format!("SELECT {TOUR_COLUMNS} FROM tours WHERE slug = $1");
        let row: Option<TourRow> = sqlx::query_as(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        row.map(Tour::try_from).transpose()
    }

    async fn create_tour(&self, tour: &Tour) -> StoreResult<Tour> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        if tour.is_featured {
            self.admit_featured(&mut tx, tour.id).await?;
        }
        let created = self.write_tour(&mut tx, tour, true).await?;
        tx.commit().await.map_err(store_error)?;
        Ok(created)
    }

    async fn update_tour(&self, id: Uuid, update: &TourUpdate) -> StoreResult<Tour> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let sql = format!("SELECT {TOUR_COLUMNS} FROM tours WHERE id = $1 FOR UPDATE");
        let current: Tour = sqlx::query_as::<_, TourRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(store_error)?
            .ok_or_else(|| StoreError::NotFound(format!("tour {}", id)))?
            .try_into()?;

        let next = update.apply(&current)?;
        if next.is_featured && !current.is_featured {
            self.admit_featured(&mut tx, id).await?;
        }
        let updated = self.write_tour(&mut tx, &next, false).await?;
        tx.commit().await.map_err(store_error)?;
        Ok(updated)
    }

    async fn delete_tour(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM tours WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                    StoreError::Conflict("Tour has bookings; deactivate it instead".into())
                }
                other => store_error(other),
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("tour {}", id)));
        }
        Ok(())
    }
}
