use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::user_log_prefix;

use super::store::CoachStore;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: i64,
    /// Unix seconds at which the current window resets
    pub reset_at: i64,
}

impl RateDecision {
    /// Seconds the caller should wait before retrying. Never below 1 so
    /// a Retry-After header is always meaningful.
    pub fn retry_after(&self, now: i64) -> i64 {
        (self.reset_at - now).max(1)
    }
}

/// Sliding-window counter over the shared store, keyed per
/// `(user, feature)`. One window definition for the whole service:
/// the bucket anchors at the first request and resets when
/// `window_start + window_secs` passes.
pub struct RateLimiter {
    store: Arc<dyn CoachStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CoachStore>) -> Self {
        Self { store }
    }

    pub fn bucket_key(user_id: &Uuid, feature: &str) -> String {
        format!("rate:{}:{}", user_id.simple(), feature)
    }

    pub async fn check(
        &self,
        user_id: &Uuid,
        feature: &str,
        max_requests: u32,
        window_secs: i64,
    ) -> RateDecision {
        self.check_at(user_id, feature, max_requests, window_secs, Utc::now().timestamp())
            .await
    }

    pub async fn check_at(
        &self,
        user_id: &Uuid,
        feature: &str,
        max_requests: u32,
        window_secs: i64,
        now: i64,
    ) -> RateDecision {
        let key = Self::bucket_key(user_id, feature);

        let (count, window_start) = match self.store.bucket_incr(&key, now, window_secs).await {
            Ok(bucket) => bucket,
            // Fail open: coaching availability beats strict enforcement
            // during a store outage.
            Err(e) => {
                tracing::warn!(
                    user = %user_log_prefix(user_id),
                    feature,
                    error = %e,
                    "rate-limit store unreachable, allowing request"
                );
                return RateDecision { allowed: true, remaining: 0, reset_at: now + window_secs };
            }
        };

        let max = max_requests as i64;
        RateDecision {
            allowed: count <= max,
            remaining: (max - count).max(0),
            reset_at: window_start + window_secs,
        }
    }
}
