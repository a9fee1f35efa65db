use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::types::{
    ActivityRollup, CoachingProfile, FinancialSummary, MonthlySummary, ReflectionLogEntry,
};

use super::context::CoachContext;
use super::pipeline::GenerateRequest;
use super::redact::redact;

/// How far back the dashboard coaching context looks.
pub const ACTIVITY_WINDOW_DAYS: u32 = 28;
pub const REFLECTION_COUNT: u32 = 2;
pub const PNL_HISTORY_MONTHS: u32 = 6;

/// Read-only view of the user's business data. The write-side CRUD lives
/// elsewhere; the pipeline only ever reads through this seam.
#[async_trait]
pub trait CoachDataSource: Send + Sync {
    async fn coaching_profile(&self, user_id: Uuid) -> anyhow::Result<Option<CoachingProfile>>;

    async fn activity_rollup(&self, user_id: Uuid, days: u32) -> anyhow::Result<ActivityRollup>;

    async fn recent_reflections(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> anyhow::Result<Vec<ReflectionLogEntry>>;

    async fn financial_summary(&self, user_id: Uuid, year: i32)
        -> anyhow::Result<FinancialSummary>;

    /// Most-recent-first monthly income/expense pairs, current month
    /// included, up to `months_back` entries.
    async fn monthly_summaries(
        &self,
        user_id: Uuid,
        months_back: u32,
    ) -> anyhow::Result<Vec<MonthlySummary>>;
}

/// The payload one context feeds to the model, plus whether the user has
/// anything worth coaching on. An empty payload short-circuits the
/// pipeline to the needs-setup response before any model call.
#[derive(Debug, Clone)]
pub struct AggregatedPayload {
    pub payload: Value,
    pub has_usable_data: bool,
}

pub struct DataAggregator {
    data: Arc<dyn CoachDataSource>,
}

impl DataAggregator {
    pub fn new(data: Arc<dyn CoachDataSource>) -> Self {
        Self { data }
    }

    /// Fetch exactly what `context` requires - the calculator contexts
    /// take caller input only and never touch the store.
    pub async fn aggregate(
        &self,
        user_id: Uuid,
        context: CoachContext,
        request: &GenerateRequest,
    ) -> anyhow::Result<AggregatedPayload> {
        match context {
            CoachContext::General => self.aggregate_general(user_id, request.year).await,
            CoachContext::PnlAnalysis => self.aggregate_pnl(user_id, request).await,
            CoachContext::AffordabilityAnalysis | CoachContext::NetSheetAnalysis => {
                Ok(Self::aggregate_inputs(request))
            }
        }
    }

    async fn aggregate_general(
        &self,
        user_id: Uuid,
        year: Option<i32>,
    ) -> anyhow::Result<AggregatedPayload> {
        let year = year.unwrap_or_else(current_year);

        let profile = self.data.coaching_profile(user_id).await?;
        let activity = self.data.activity_rollup(user_id, ACTIVITY_WINDOW_DAYS).await?;
        let reflections = self.data.recent_reflections(user_id, REFLECTION_COUNT).await?;
        let pnl = self.data.financial_summary(user_id, year).await?;

        let has_goals = profile.as_ref().map(|p| p.has_goals()).unwrap_or(false);
        let has_usable_data =
            has_goals || !activity.is_empty() || !reflections.is_empty() || !pnl.is_empty();

        let payload = json!({
            "year": year,
            "goals": profile.map(profile_json),
            "activity_28d": activity,
            "reflections": reflections.iter().map(reflection_json).collect::<Vec<_>>(),
            "pnl_ytd": pnl,
        });

        Ok(AggregatedPayload { payload, has_usable_data })
    }

    async fn aggregate_pnl(
        &self,
        user_id: Uuid,
        request: &GenerateRequest,
    ) -> anyhow::Result<AggregatedPayload> {
        let focus_areas = request.focus_areas.clone().unwrap_or_default();

        // Caller-supplied figures take precedence over stored records so
        // the P&L screen can analyze exactly what it is displaying.
        if let Some(pnl_data) = &request.pnl_data {
            let has_usable_data = pnl_data
                .get("current_month")
                .and_then(Value::as_object)
                .map(|m| !m.is_empty())
                .unwrap_or(false)
                || pnl_data
                    .get("historical")
                    .and_then(Value::as_array)
                    .map(|h| !h.is_empty())
                    .unwrap_or(false);

            let payload = json!({
                "current_month": pnl_data.get("current_month").cloned().unwrap_or(Value::Null),
                "historical": pnl_data.get("historical").cloned().unwrap_or_else(|| json!([])),
                "focus_areas": focus_areas,
            });
            return Ok(AggregatedPayload { payload, has_usable_data });
        }

        let mut months = self
            .data
            .monthly_summaries(user_id, PNL_HISTORY_MONTHS + 1)
            .await?;
        let current = if months.is_empty() { None } else { Some(months.remove(0)) };

        let has_usable_data = current
            .as_ref()
            .map(|m| !m.total_income.is_zero() || !m.total_expenses.is_zero())
            .unwrap_or(false)
            || !months.is_empty();

        let payload = json!({
            "current_month": current,
            "historical": months,
            "focus_areas": focus_areas,
        });

        Ok(AggregatedPayload { payload, has_usable_data })
    }

    /// Calculator contexts: structured numeric inputs straight from the
    /// caller, no stored business data.
    fn aggregate_inputs(request: &GenerateRequest) -> AggregatedPayload {
        let inputs = request
            .inputs
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()));
        let has_usable_data = inputs.as_object().map(|m| !m.is_empty()).unwrap_or(false);

        AggregatedPayload { payload: json!({ "inputs": inputs }), has_usable_data }
    }
}

fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Utc::now().year()
}

fn profile_json(profile: CoachingProfile) -> Value {
    json!({
        "market": profile.market,
        "annual_gci_target": profile.annual_gci_target,
        "weekly_call_target": profile.weekly_call_target,
        "weekly_conversation_target": profile.weekly_conversation_target,
        "weekly_appointment_target": profile.weekly_appointment_target,
        "monthly_marketing_budget": profile.monthly_marketing_budget,
    })
}

/// Reflections are the one free-text field that leaves the process; the
/// note is redacted here, at the aggregation boundary, not later.
fn reflection_json(entry: &ReflectionLogEntry) -> Value {
    json!({
        "date": entry.log_date,
        "mood": entry.mood,
        "note": redact(&entry.note),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coach::pipeline::GenerateRequest;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts store reads so tests can assert which contexts touch it.
    struct FixtureSource {
        reads: AtomicUsize,
        reflections: Vec<ReflectionLogEntry>,
        empty: bool,
    }

    impl FixtureSource {
        fn empty() -> Self {
            Self { reads: AtomicUsize::new(0), reflections: Vec::new(), empty: true }
        }

        fn with_reflection(note: &str) -> Self {
            Self {
                reads: AtomicUsize::new(0),
                reflections: vec![ReflectionLogEntry {
                    user_id: Uuid::nil(),
                    log_date: NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(),
                    mood: Some("tired".to_string()),
                    note: note.to_string(),
                }],
                empty: false,
            }
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CoachDataSource for FixtureSource {
        async fn coaching_profile(&self, _: Uuid) -> anyhow::Result<Option<CoachingProfile>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn activity_rollup(&self, _: Uuid, _: u32) -> anyhow::Result<ActivityRollup> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.empty {
                Ok(ActivityRollup::default())
            } else {
                Ok(ActivityRollup { days_logged: 12, calls: 96, ..Default::default() })
            }
        }

        async fn recent_reflections(
            &self,
            _: Uuid,
            _: u32,
        ) -> anyhow::Result<Vec<ReflectionLogEntry>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.reflections.clone())
        }

        async fn financial_summary(&self, _: Uuid, year: i32) -> anyhow::Result<FinancialSummary> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(FinancialSummary { year, ..Default::default() })
        }

        async fn monthly_summaries(
            &self,
            _: Uuid,
            _: u32,
        ) -> anyhow::Result<Vec<MonthlySummary>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(vec![MonthlySummary {
                year: 2026,
                month: 8,
                total_income: Decimal::new(25000, 0),
                total_expenses: Decimal::new(5000, 0),
            }])
        }
    }

    fn request(context: &str) -> GenerateRequest {
        GenerateRequest { context: context.to_string(), ..Default::default() }
    }

    #[tokio::test]
    async fn general_flags_empty_user() {
        let source = Arc::new(FixtureSource::empty());
        let agg = DataAggregator::new(source.clone());

        let out = agg
            .aggregate(Uuid::new_v4(), CoachContext::General, &request("general"))
            .await
            .unwrap();
        assert!(!out.has_usable_data);
        assert_eq!(source.reads(), 4);
    }

    #[tokio::test]
    async fn general_redacts_reflection_notes() {
        let source = FixtureSource::with_reflection("seller at 555-867-5309, email bob@x.com");
        let agg = DataAggregator::new(Arc::new(source));

        let out = agg
            .aggregate(Uuid::new_v4(), CoachContext::General, &request("general"))
            .await
            .unwrap();
        let note = out.payload["reflections"][0]["note"].as_str().unwrap();
        assert_eq!(note, "seller at [PHONE], email [EMAIL]");
        assert!(out.has_usable_data);
    }

    #[tokio::test]
    async fn calculator_contexts_never_touch_the_store() {
        let source = Arc::new(FixtureSource::empty());
        let agg = DataAggregator::new(source.clone());

        let mut req = request("affordability_analysis");
        req.inputs = Some(serde_json::json!({"home_price": 450000, "annual_income": 110000}));

        let out = agg
            .aggregate(Uuid::new_v4(), CoachContext::AffordabilityAnalysis, &req)
            .await
            .unwrap();
        assert!(out.has_usable_data);
        assert_eq!(source.reads(), 0, "calculator context fetched stored data");
        // Payload carries only the caller's inputs
        assert_eq!(out.payload["inputs"]["home_price"], 450000);
        assert!(out.payload.get("activity_28d").is_none());
    }

    #[tokio::test]
    async fn pnl_uses_caller_data_without_store_reads() {
        let source = Arc::new(FixtureSource::empty());
        let agg = DataAggregator::new(source.clone());

        let mut req = request("pnl_analysis");
        req.pnl_data = Some(serde_json::json!({
            "current_month": {"total_income": 25000, "total_expenses": 5000}
        }));
        req.focus_areas = Some(vec!["margin".to_string()]);

        let out = agg
            .aggregate(Uuid::new_v4(), CoachContext::PnlAnalysis, &req)
            .await
            .unwrap();
        assert!(out.has_usable_data);
        assert_eq!(source.reads(), 0);
        assert_eq!(out.payload["current_month"]["total_income"], 25000);
        assert_eq!(out.payload["focus_areas"][0], "margin");
    }

    #[tokio::test]
    async fn pnl_falls_back_to_stored_summaries() {
        let source = Arc::new(FixtureSource::empty());
        let agg = DataAggregator::new(source.clone());

        let out = agg
            .aggregate(Uuid::new_v4(), CoachContext::PnlAnalysis, &request("pnl_analysis"))
            .await
            .unwrap();
        assert!(out.has_usable_data);
        assert_eq!(source.reads(), 1, "pnl context should make exactly one store read");
        assert!(out.payload.get("reflections").is_none(), "dashboard data leaked into pnl");
    }
}
