use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use futures::stream::BoxStream;
use futures::StreamExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use uuid::Uuid;

use dealcoach_api::auth::{Claims, PlanTier};
use dealcoach_api::coach::aggregate::CoachDataSource;
use dealcoach_api::coach::invoke::{ModelInvoker, ModelRequest};
use dealcoach_api::coach::store::MemoryStore;
use dealcoach_api::coach::CoachPipeline;
use dealcoach_api::config::CoachConfig;
use dealcoach_api::server::app;
use dealcoach_api::state::AppState;
use dealcoach_api::types::{
    ActivityRollup, CoachingProfile, FinancialSummary, MonthlySummary, ReflectionLogEntry,
};

// Development preset secret; APP_ENV is unset when tests run
pub const JWT_SECRET: &str = "dev-secret-do-not-use";

pub fn bearer_token(user_id: Uuid, plan: &str) -> String {
    let claims = Claims {
        sub: user_id,
        plan: plan.to_string(),
        exp: Utc::now().timestamp() + 3600,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("encode test token");
    format!("Bearer {}", token)
}

pub fn coach_config() -> CoachConfig {
    CoachConfig {
        enabled: true,
        model: "test-model".to_string(),
        model_base_url: "http://localhost:9".to_string(),
        max_output_tokens: 800,
        temperature: 0.2,
        requests_per_minute: 100,
        rate_window_secs: 60,
        cache_ttl_secs: 900,
        max_body_bytes: 16 * 1024,
        model_timeout_secs: 5,
        aggregation_timeout_secs: 5,
        min_plan: PlanTier::Free,
    }
}

/// Fixture data source: one active agent with activity and P&L records.
pub struct FixtureData;

#[async_trait]
impl CoachDataSource for FixtureData {
    async fn coaching_profile(&self, user_id: Uuid) -> anyhow::Result<Option<CoachingProfile>> {
        Ok(Some(CoachingProfile {
            user_id,
            market: Some("Austin".to_string()),
            annual_gci_target: Some(Decimal::new(150_000, 0)),
            weekly_call_target: Some(50),
            weekly_conversation_target: Some(15),
            weekly_appointment_target: Some(3),
            monthly_marketing_budget: Some(Decimal::new(1200, 0)),
            updated_at: Utc::now().naive_utc(),
        }))
    }

    async fn activity_rollup(&self, _: Uuid, _: u32) -> anyhow::Result<ActivityRollup> {
        Ok(ActivityRollup {
            days_logged: 14,
            calls: 210,
            conversations: 45,
            appointments: 6,
            listings: 1,
            prospecting_hours: Decimal::new(28, 0),
            admin_hours: Decimal::new(10, 0),
        })
    }

    async fn recent_reflections(
        &self,
        user_id: Uuid,
        _: u32,
    ) -> anyhow::Result<Vec<ReflectionLogEntry>> {
        Ok(vec![ReflectionLogEntry {
            user_id,
            log_date: Utc::now().date_naive(),
            mood: Some("focused".to_string()),
            note: "good week of calls".to_string(),
        }])
    }

    async fn financial_summary(&self, _: Uuid, year: i32) -> anyhow::Result<FinancialSummary> {
        Ok(FinancialSummary {
            year,
            total_income: Decimal::new(85_000, 0),
            total_expenses: Decimal::new(22_000, 0),
            net_income: Decimal::new(63_000, 0),
            deal_count: 7,
        })
    }

    async fn monthly_summaries(
        &self,
        _: Uuid,
        months_back: u32,
    ) -> anyhow::Result<Vec<MonthlySummary>> {
        Ok((0..months_back.min(3))
            .map(|i| MonthlySummary {
                year: 2026,
                month: 8 - i,
                total_income: Decimal::new(12_000, 0),
                total_expenses: Decimal::new(3_000, 0),
            })
            .collect())
    }
}

/// Scripted model invoker with a call counter.
pub struct ScriptedInvoker {
    output: String,
    calls: AtomicUsize,
}

impl ScriptedInvoker {
    pub fn new(output: &str) -> Self {
        Self { output: output.to_string(), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelInvoker for ScriptedInvoker {
    async fn complete(&self, _: &ModelRequest) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }

    async fn stream(
        &self,
        _: &ModelRequest,
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<String>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let chunks: Vec<anyhow::Result<String>> = self
            .output
            .as_bytes()
            .chunks(16)
            .map(|c| Ok(String::from_utf8_lossy(c).into_owned()))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

pub fn model_output() -> String {
    serde_json::json!({
        "summary": "Net income of 20000 this month puts you ahead of plan.",
        "stats": {"net_income": 20000, "margin": 0.8},
        "actions": ["Review marketing spend", "Invoice pending closings",
                    "Batch expense entry weekly", "Set aside taxes", "Extra action"],
        "risks": ["Single-source lead flow"],
        "next_inputs": ["Log July expenses"],
    })
    .to_string()
}

pub fn test_app(config: CoachConfig, invoker: Arc<ScriptedInvoker>) -> Router {
    let pipeline = Arc::new(CoachPipeline::new(
        config,
        Arc::new(FixtureData),
        Arc::new(MemoryStore::new()),
        invoker,
    ));
    app(AppState::new(pipeline))
}
