use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

use crate::auth::{user_log_prefix, PlanTier};
use crate::config::CoachConfig;
use crate::middleware::AuthUser;
use crate::types::CoachResponse;

use super::aggregate::{CoachDataSource, DataAggregator, REFLECTION_COUNT};
use super::cache::ResponseCache;
use super::context::{route, CoachContext};
use super::fingerprint::fingerprint;
use super::invoke::{ModelInvoker, ModelRequest};
use super::normalize;
use super::rate_limit::RateLimiter;
use super::store::CoachStore;

/// Rate-limit bucket feature tag for the generate endpoint.
const FEATURE: &str = "ai_coach";

/// Body of `POST /ai-coach/generate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default = "default_context")]
    pub context: String,
    // Context-specific fields
    #[serde(default)]
    pub focus_areas: Option<Vec<String>>,
    #[serde(default)]
    pub pnl_data: Option<Value>,
    #[serde(default)]
    pub inputs: Option<Value>,
}

fn default_context() -> String {
    "general".to_string()
}

/// Gating failures - the only errors surfaced as HTTP statuses. Anything
/// that happens after the gate collapses into a fallback response.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("coaching feature is disabled")]
    FeatureDisabled,

    #[error("plan tier below {required}")]
    PlanInsufficient { required: PlanTier },

    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: i64 },
}

/// Post-gate failures. Never leave the pipeline: the orchestrator's final
/// step collapses them into the fixed fallback response.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("data aggregation failed: {0}")]
    Aggregation(#[source] anyhow::Error),

    #[error("data aggregation timed out")]
    AggregationTimeout,

    #[error("model call failed: {0}")]
    Upstream(#[source] anyhow::Error),

    #[error("model call timed out")]
    UpstreamTimeout,
}

/// Events on the streaming response channel, one `data:` line each.
#[derive(Debug)]
pub enum StreamEvent {
    Delta(String),
    Done,
    Fallback(CoachResponse),
    Error(String),
}

impl StreamEvent {
    pub fn to_sse(&self) -> String {
        let value = match self {
            StreamEvent::Delta(text) => serde_json::json!({ "delta": text }),
            StreamEvent::Done => serde_json::json!({ "done": true }),
            StreamEvent::Fallback(obj) => {
                serde_json::json!({ "fallback": Value::Object(obj.clone()) })
            }
            StreamEvent::Error(msg) => serde_json::json!({ "error": msg }),
        };
        format!("data: {}\n\n", value)
    }
}

/// Counts-only visibility for support: what the pipeline can currently
/// see for this user. No content leaves here.
#[derive(Debug, Serialize)]
pub struct DiagReport {
    pub feature_enabled: bool,
    pub model: String,
    pub profile_set: bool,
    pub activity_days_28d: i64,
    pub recent_reflections: usize,
    pub deal_count_ytd: i64,
}

/// The orchestrator. One instance per process, shared across requests;
/// all cross-instance state lives in the injected store.
pub struct CoachPipeline {
    config: CoachConfig,
    aggregator: DataAggregator,
    data: Arc<dyn CoachDataSource>,
    cache: ResponseCache,
    limiter: RateLimiter,
    invoker: Arc<dyn ModelInvoker>,
}

impl CoachPipeline {
    pub fn new(
        config: CoachConfig,
        data: Arc<dyn CoachDataSource>,
        store: Arc<dyn CoachStore>,
        invoker: Arc<dyn ModelInvoker>,
    ) -> Self {
        Self {
            config,
            aggregator: DataAggregator::new(data.clone()),
            data,
            cache: ResponseCache::new(store.clone()),
            limiter: RateLimiter::new(store),
            invoker,
        }
    }

    pub fn config(&self) -> &CoachConfig {
        &self.config
    }

    /// Gate: feature flag, plan tier, rate limit. Body size is enforced
    /// by the router layer before the handler runs.
    pub async fn gate(&self, user: &AuthUser) -> Result<(), GateError> {
        if !self.config.enabled {
            return Err(GateError::FeatureDisabled);
        }
        if user.plan < self.config.min_plan {
            return Err(GateError::PlanInsufficient { required: self.config.min_plan });
        }

        let now = Utc::now().timestamp();
        let decision = self
            .limiter
            .check_at(
                &user.user_id,
                FEATURE,
                self.config.requests_per_minute,
                self.config.rate_window_secs,
                now,
            )
            .await;
        if !decision.allowed {
            return Err(GateError::RateLimited { retry_after: decision.retry_after(now) });
        }
        Ok(())
    }

    /// Non-streaming generation. Gate failures surface; everything after
    /// the gate resolves to a schema-valid response.
    pub async fn generate(
        &self,
        user: &AuthUser,
        request: &GenerateRequest,
    ) -> Result<CoachResponse, GateError> {
        self.gate(user).await?;

        let context = CoachContext::from_tag(&request.context);
        let response = match self.run(user, context, request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    user = %user_log_prefix(&user.user_id),
                    context = context.as_tag(),
                    error = %e,
                    "pipeline failed after gate, serving fallback"
                );
                normalize::error_fallback(context)
            }
        };
        Ok(response)
    }

    /// The happy path state machine: Aggregating -> CacheCheck ->
    /// (hit: Done) | (miss: Routing -> Invoking -> Normalizing ->
    /// Caching -> Done).
    async fn run(
        &self,
        user: &AuthUser,
        context: CoachContext,
        request: &GenerateRequest,
    ) -> Result<CoachResponse, PipelineError> {
        let payload = self.aggregate(user.user_id, context, request).await?;

        if !payload.has_usable_data {
            tracing::debug!(
                user = %user_log_prefix(&user.user_id),
                context = context.as_tag(),
                "no usable data, serving needs-setup response"
            );
            return Ok(normalize::empty_data_response(context));
        }

        let fp = fingerprint(&user.user_id, context, &payload.payload);

        if !request.force {
            if let Some(hit) = self.cache.get(&fp, self.config.cache_ttl_secs).await {
                tracing::debug!(context = context.as_tag(), "cache hit");
                return Ok(hit);
            }
        }

        let raw = self.invoke(context, &payload.payload).await?;
        let response = normalize::normalize(&raw, context);

        // Forced refreshes still warm the cache for later non-forced calls
        self.cache.put(&fp, &response).await;
        Ok(response)
    }

    /// Streaming generation: gate here, then hand back a channel fed by a
    /// producer task. Dropping the receiver (client disconnect) makes the
    /// next send fail and the producer stop consuming upstream deltas.
    pub async fn generate_stream(
        self: Arc<Self>,
        user: &AuthUser,
        request: GenerateRequest,
    ) -> Result<mpsc::Receiver<StreamEvent>, GateError> {
        self.gate(user).await?;

        let (tx, rx) = mpsc::channel(32);
        let user = user.clone();
        tokio::spawn(async move {
            self.stream_worker(user, request, tx).await;
        });
        Ok(rx)
    }

    async fn stream_worker(
        &self,
        user: AuthUser,
        request: GenerateRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        let context = CoachContext::from_tag(&request.context);
        if let Err(e) = self.stream_run(&user, context, &request, &tx).await {
            tracing::warn!(
                user = %user_log_prefix(&user.user_id),
                context = context.as_tag(),
                error = %e,
                "stream failed, emitting terminal error event"
            );
            let _ = tx.send(StreamEvent::Error("generation failed, please retry".into())).await;
        }
    }

    async fn stream_run(
        &self,
        user: &AuthUser,
        context: CoachContext,
        request: &GenerateRequest,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> Result<(), PipelineError> {
        let payload = self.aggregate(user.user_id, context, request).await?;

        if !payload.has_usable_data {
            let _ = tx.send(StreamEvent::Fallback(normalize::empty_data_response(context))).await;
            return Ok(());
        }

        let fp = fingerprint(&user.user_id, context, &payload.payload);

        if !request.force {
            if let Some(hit) = self.cache.get(&fp, self.config.cache_ttl_secs).await {
                let body = Value::Object(hit).to_string();
                let _ = tx.send(StreamEvent::Delta(body)).await;
                let _ = tx.send(StreamEvent::Done).await;
                return Ok(());
            }
        }

        let model_request = self.model_request(context, &payload.payload);
        let model_timeout = Duration::from_secs(self.config.model_timeout_secs);

        let mut deltas = timeout(model_timeout, self.invoker.stream(&model_request))
            .await
            .map_err(|_| PipelineError::UpstreamTimeout)?
            .map_err(PipelineError::Upstream)?;

        let mut full = String::new();
        loop {
            let next = timeout(model_timeout, deltas.next())
                .await
                .map_err(|_| PipelineError::UpstreamTimeout)?;
            let Some(chunk) = next else { break };
            let text = chunk.map_err(PipelineError::Upstream)?;

            full.push_str(&text);
            if tx.send(StreamEvent::Delta(text)).await.is_err() {
                // Client went away; stop pulling from upstream
                tracing::debug!(context = context.as_tag(), "stream consumer dropped");
                return Ok(());
            }
        }

        let response = normalize::normalize(&full, context);
        self.cache.put(&fp, &response).await;

        if normalize::parses_to_schema(&full, context) {
            let _ = tx.send(StreamEvent::Done).await;
        } else {
            let _ = tx.send(StreamEvent::Fallback(response)).await;
        }
        Ok(())
    }

    async fn aggregate(
        &self,
        user_id: Uuid,
        context: CoachContext,
        request: &GenerateRequest,
    ) -> Result<super::aggregate::AggregatedPayload, PipelineError> {
        timeout(
            Duration::from_secs(self.config.aggregation_timeout_secs),
            self.aggregator.aggregate(user_id, context, request),
        )
        .await
        .map_err(|_| PipelineError::AggregationTimeout)?
        .map_err(PipelineError::Aggregation)
    }

    async fn invoke(&self, context: CoachContext, payload: &Value) -> Result<String, PipelineError> {
        let model_request = self.model_request(context, payload);
        timeout(
            Duration::from_secs(self.config.model_timeout_secs),
            self.invoker.complete(&model_request),
        )
        .await
        .map_err(|_| PipelineError::UpstreamTimeout)?
        .map_err(PipelineError::Upstream)
    }

    fn model_request(&self, context: CoachContext, payload: &Value) -> ModelRequest {
        ModelRequest {
            model: self.config.model.clone(),
            system_prompt: route(context).system_prompt.to_string(),
            payload: payload.clone(),
            max_output_tokens: self.config.max_output_tokens,
            temperature: self.config.temperature,
        }
    }

    /// Support diagnostics: counts of what the pipeline can see.
    pub async fn diag(&self, user_id: Uuid) -> DiagReport {
        let year = Utc::now().year();

        let profile_set = self
            .data
            .coaching_profile(user_id)
            .await
            .ok()
            .flatten()
            .map(|p| p.has_goals())
            .unwrap_or(false);
        let activity_days_28d = self
            .data
            .activity_rollup(user_id, super::aggregate::ACTIVITY_WINDOW_DAYS)
            .await
            .map(|r| r.days_logged)
            .unwrap_or(0);
        let recent_reflections = self
            .data
            .recent_reflections(user_id, REFLECTION_COUNT)
            .await
            .map(|r| r.len())
            .unwrap_or(0);
        let deal_count_ytd = self
            .data
            .financial_summary(user_id, year)
            .await
            .map(|s| s.deal_count)
            .unwrap_or(0);

        DiagReport {
            feature_enabled: self.config.enabled,
            model: self.config.model.clone(),
            profile_set,
            activity_days_28d,
            recent_reflections,
            deal_count_ytd,
        }
    }
}
