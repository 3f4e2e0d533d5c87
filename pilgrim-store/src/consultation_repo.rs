use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use pilgrim_core::{StoreError, StoreResult};
use pilgrim_order::{ConsultationRepository, ConsultationRequest, ConsultationStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::store_error;

pub struct PgConsultationRepository {
    pool: PgPool,
}

impl PgConsultationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ConsultationRow {
    id: Uuid,
    full_name: String,
    email: String,
    phone: String,
    preferred_date: Option<NaiveDate>,
    preferred_time: Option<String>,
    tour_interest: Option<String>,
    message: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ConsultationRow> for ConsultationRequest {
    type Error = StoreError;

    fn try_from(row: ConsultationRow) -> Result<Self, Self::Error> {
        Ok(ConsultationRequest {
            id: row.id,
            full_name: row.full_name,
            email: row.email,
            phone: row.phone,
            preferred_date: row.preferred_date,
            preferred_time: row.preferred_time,
            tour_interest: row.tour_interest,
            message: row.message,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

const CONSULTATION_COLUMNS: &str =
    "id, full_name, email, phone, preferred_date, preferred_time, tour_interest, message, status, created_at";

#[async_trait]
impl ConsultationRepository for PgConsultationRepository {
    async fn create_consultation(&self, request: &ConsultationRequest) -> StoreResult<ConsultationRequest> {
        let sql = format!(
            "INSERT INTO consultation_requests ({CONSULTATION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {CONSULTATION_COLUMNS}"
        );
        let row: ConsultationRow = sqlx::query_as(&sql)
            .bind(request.id)
            .bind(&request.full_name)
            .bind(&request.email)
            .bind(&request.phone)
            .bind(request.preferred_date)
            .bind(&request.preferred_time)
            .bind(&request.tour_interest)
            .bind(&request.message)
            .bind(request.status.as_str())
            .bind(request.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;

        row.try_into()
    }

    async fn list_consultations(&self, status: Option<ConsultationStatus>) -> StoreResult<Vec<ConsultationRequest>> {
        let sql = format!(
            "SELECT {CONSULTATION_COLUMNS} FROM consultation_requests \
             WHERE ($1::TEXT IS NULL OR status = $1) ORDER BY created_at DESC"
        );
        let rows: Vec<ConsultationRow> = sqlx::query_as(&sql)
            .bind(status.map(ConsultationStatus::as_str))
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        rows.into_iter().map(ConsultationRequest::try_from).collect()
    }

    async fn get_consultation(&self, id: Uuid) -> StoreResult<Option<ConsultationRequest>> {
        let sql = format!("SELECT {CONSULTATION_COLUMNS} FROM consultation_requests WHERE id = $1");
        let row: Option<ConsultationRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        row.map(ConsultationRequest::try_from).transpose()
    }

    async fn update_consultation_status(
        &self,
        id: Uuid,
        status: ConsultationStatus,
    ) -> StoreResult<ConsultationRequest> {
        let sql = format!(
            "UPDATE consultation_requests SET status = $2 WHERE id = $1 RETURNING {CONSULTATION_COLUMNS}"
        );
        let row: ConsultationRow = sqlx::query_as(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?
            .ok_or_else(|| StoreError::NotFound(format!("consultation {}", id)))?;

        row.try_into()
    }
}
