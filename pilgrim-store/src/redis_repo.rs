use async_trait::async_trait;
use pilgrim_core::{StoreError, StoreResult};
use pilgrim_order::{BookingDraft, DraftStore};
use redis::{AsyncCommands, RedisResult};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. Returns false once `key` has been hit more than
    /// `limit` times inside the current window.
    ///
    /// The TTL is set only when the window's counter is created, so hits
    /// inside a window never push its end out.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = rate_limit_pipe(key, window_seconds).query_async(&mut conn).await?;

        Ok(count <= limit)
    }

    pub async fn ping(&self) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

fn rate_limit_pipe(key: &str, window_seconds: i64) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SET")
        .arg(key)
        .arg(0)
        .arg("NX")
        .arg("EX")
        .arg(window_seconds.max(1))
        .ignore()
        .incr(key, 1);
    pipe
}

fn draft_key(id: Uuid) -> String {
    format!("draft:{}", id)
}

fn claim_key(id: Uuid) -> String {
    format!("draft:{}:submit", id)
}

fn redis_error(err: redis::RedisError) -> StoreError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Unexpected(err.into())
    }
}

/// Wizard drafts as JSON strings with a TTL, so abandoned sessions clean
/// themselves up.
#[derive(Clone)]
pub struct RedisDraftStore {
    redis: RedisClient,
}

impl RedisDraftStore {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl DraftStore for RedisDraftStore {
    async fn save_draft(&self, draft: &BookingDraft, ttl: Duration) -> StoreResult<()> {
        let payload = serde_json::to_string(draft).map_err(|e| StoreError::Unexpected(e.into()))?;
        let mut conn = self
            .redis
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(redis_error)?;

        conn.set_ex::<_, _, ()>(draft_key(draft.id), payload, ttl.as_secs().max(1))
            .await
            .map_err(redis_error)?;
        debug!(draft_id = %draft.id, step = ?draft.step, "Draft saved");
        Ok(())
    }

    async fn load_draft(&self, id: Uuid) -> StoreResult<Option<BookingDraft>> {
        let mut conn = self
            .redis
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(redis_error)?;

        let payload: Option<String> = conn.get(draft_key(id)).await.map_err(redis_error)?;
        payload
            .map(|json| {
                serde_json::from_str(&json)
                    .map_err(|e| StoreError::Invalid(format!("stored draft {} is unreadable: {}", id, e)))
            })
            .transpose()
    }

    async fn delete_draft(&self, id: Uuid) -> StoreResult<()> {
        let mut conn = self
            .redis
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(redis_error)?;

        conn.del::<_, ()>(draft_key(id)).await.map_err(redis_error)
    }

    async fn claim_submission(&self, id: Uuid, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self
            .redis
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(redis_error)?;

        // SET NX: only the first submit gets the claim
        let claimed: Option<String> = redis::cmd("SET")
            .arg(claim_key(id))
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        Ok(claimed.is_some())
    }

    async fn release_submission(&self, id: Uuid) -> StoreResult<()> {
        let mut conn = self
            .redis
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(redis_error)?;

        conn.del::<_, ()>(claim_key(id)).await.map_err(redis_error)
    }
}
