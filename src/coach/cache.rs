use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::types::CoachResponse;

use super::store::CoachStore;

/// TTL cache over the shared store, keyed by request fingerprint.
///
/// Store failures degrade to a miss on read and a no-op on write - the
/// cache is an optimization, never a reason to fail a request.
pub struct ResponseCache {
    store: Arc<dyn CoachStore>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CoachStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, fingerprint: &str, ttl_secs: i64) -> Option<CoachResponse> {
        self.get_at(fingerprint, ttl_secs, Utc::now().timestamp()).await
    }

    pub async fn get_at(&self, fingerprint: &str, ttl_secs: i64, now: i64) -> Option<CoachResponse> {
        let entry = match self.store.cache_get(fingerprint).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        let (body, stored_at) = entry?;
        if stored_at + ttl_secs <= now {
            return None;
        }

        match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(map)) => Some(map),
            // A non-object entry means a writer bug or a corrupt row; miss
            _ => {
                tracing::warn!(fingerprint = %&fingerprint[..12.min(fingerprint.len())],
                    "cache entry was not a JSON object, ignoring");
                None
            }
        }
    }

    pub async fn put(&self, fingerprint: &str, response: &CoachResponse) {
        self.put_at(fingerprint, response, Utc::now().timestamp()).await
    }

    pub async fn put_at(&self, fingerprint: &str, response: &CoachResponse, now: i64) {
        let body = Value::Object(response.clone()).to_string();
        if let Err(e) = self.store.cache_put(fingerprint, &body, now).await {
            tracing::warn!(error = %e, "cache write failed, response served uncached");
        }
    }
}
