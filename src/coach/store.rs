use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Shared key-value state behind the cache and the rate limiter.
///
/// Injected, never a process-local singleton: multiple service instances
/// must see the same buckets and cache entries. The bucket increment is
/// the one operation that must be atomic end to end.
#[async_trait]
pub trait CoachStore: Send + Sync {
    /// Fetch a cache entry: `(serialized response, stored_at unix secs)`.
    async fn cache_get(&self, fingerprint: &str) -> Result<Option<(String, i64)>, StoreError>;

    /// Unconditional overwrite. Last writer wins; entries are derived
    /// purely from input fingerprints so this is safe.
    async fn cache_put(&self, fingerprint: &str, body: &str, stored_at: i64)
        -> Result<(), StoreError>;

    /// Atomically bump the bucket for `key`, resetting it first when its
    /// window has elapsed. Returns `(count, window_start)` after the bump.
    async fn bucket_incr(
        &self,
        key: &str,
        now: i64,
        window_secs: i64,
    ) -> Result<(i64, i64), StoreError>;
}

/// In-process store for tests and single-instance development runs.
#[derive(Default)]
pub struct MemoryStore {
    cache: Mutex<HashMap<String, (String, i64)>>,
    buckets: Mutex<HashMap<String, (i64, i64)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoachStore for MemoryStore {
    async fn cache_get(&self, fingerprint: &str) -> Result<Option<(String, i64)>, StoreError> {
        Ok(self.cache.lock().await.get(fingerprint).cloned())
    }

    async fn cache_put(
        &self,
        fingerprint: &str,
        body: &str,
        stored_at: i64,
    ) -> Result<(), StoreError> {
        self.cache
            .lock()
            .await
            .insert(fingerprint.to_string(), (body.to_string(), stored_at));
        Ok(())
    }

    async fn bucket_incr(
        &self,
        key: &str,
        now: i64,
        window_secs: i64,
    ) -> Result<(i64, i64), StoreError> {
        let mut buckets = self.buckets.lock().await;
        let entry = buckets.entry(key.to_string()).or_insert((0, now));
        if entry.1 + window_secs <= now {
            *entry = (0, now);
        }
        entry.0 += 1;
        Ok(*entry)
    }
}

/// Postgres-backed store shared across service instances.
///
/// Tables:
///   coach_cache(fingerprint text primary key, body text, stored_at bigint)
///   coach_rate_buckets(bucket_key text primary key, count bigint, window_start bigint)
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CoachStore for PostgresStore {
    async fn cache_get(&self, fingerprint: &str) -> Result<Option<(String, i64)>, StoreError> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT body, stored_at FROM coach_cache WHERE fingerprint = $1")
                .bind(fingerprint)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    async fn cache_put(
        &self,
        fingerprint: &str,
        body: &str,
        stored_at: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO coach_cache (fingerprint, body, stored_at) VALUES ($1, $2, $3) \
             ON CONFLICT (fingerprint) DO UPDATE SET body = $2, stored_at = $3",
        )
        .bind(fingerprint)
        .bind(body)
        .bind(stored_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn bucket_incr(
        &self,
        key: &str,
        now: i64,
        window_secs: i64,
    ) -> Result<(i64, i64), StoreError> {
        // Single upsert keeps the read-modify-write race-free under
        // concurrent requests from the same user.
        let row: (i64, i64) = sqlx::query_as(
            "INSERT INTO coach_rate_buckets (bucket_key, count, window_start) \
             VALUES ($1, 1, $2) \
             ON CONFLICT (bucket_key) DO UPDATE SET \
               count = CASE WHEN coach_rate_buckets.window_start + $3 <= $2 \
                            THEN 1 ELSE coach_rate_buckets.count + 1 END, \
               window_start = CASE WHEN coach_rate_buckets.window_start + $3 <= $2 \
                                   THEN $2 ELSE coach_rate_buckets.window_start END \
             RETURNING count, window_start",
        )
        .bind(key)
        .bind(now)
        .bind(window_secs)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
