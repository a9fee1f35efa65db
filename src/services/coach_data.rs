use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::coach::aggregate::CoachDataSource;
use crate::types::{
    ActivityRollup, CoachingProfile, FinancialSummary, MonthlySummary, ReflectionLogEntry,
};

/// Read-only sqlx implementation of the pipeline's data seam over the
/// business tables (coaching_profiles, activity_logs, reflection_logs,
/// deals, expenses). The write side of these tables belongs to the CRUD
/// endpoints, not to this service.
pub struct SqlCoachData {
    pool: PgPool,
}

impl SqlCoachData {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CoachDataSource for SqlCoachData {
    async fn coaching_profile(&self, user_id: Uuid) -> anyhow::Result<Option<CoachingProfile>> {
        let row = sqlx::query_as::<_, CoachingProfile>(
            "SELECT user_id, market, annual_gci_target, weekly_call_target, \
                    weekly_conversation_target, weekly_appointment_target, \
                    monthly_marketing_budget, updated_at \
             FROM coaching_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn activity_rollup(&self, user_id: Uuid, days: u32) -> anyhow::Result<ActivityRollup> {
        let since = Utc::now().date_naive() - chrono::Duration::days(days as i64);

        let (days_logged, calls, conversations, appointments, listings, prospecting, admin): (
            i64,
            i64,
            i64,
            i64,
            i64,
            Decimal,
            Decimal,
        ) = sqlx::query_as(
            "SELECT COUNT(*), \
                    COALESCE(SUM(calls), 0)::bigint, \
                    COALESCE(SUM(conversations), 0)::bigint, \
                    COALESCE(SUM(appointments), 0)::bigint, \
                    COALESCE(SUM(listings), 0)::bigint, \
                    COALESCE(SUM(prospecting_hours), 0), \
                    COALESCE(SUM(admin_hours), 0) \
             FROM activity_logs WHERE user_id = $1 AND log_date >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(ActivityRollup {
            days_logged,
            calls,
            conversations,
            appointments,
            listings,
            prospecting_hours: prospecting,
            admin_hours: admin,
        })
    }

    async fn recent_reflections(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> anyhow::Result<Vec<ReflectionLogEntry>> {
        let rows = sqlx::query_as::<_, ReflectionLogEntry>(
            "SELECT user_id, log_date, mood, note \
             FROM reflection_logs WHERE user_id = $1 \
             ORDER BY log_date DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn financial_summary(
        &self,
        user_id: Uuid,
        year: i32,
    ) -> anyhow::Result<FinancialSummary> {
        let (start, end) = year_bounds(year);

        let (total_income, deal_count): (Decimal, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(net_commission), 0), COUNT(*) \
             FROM deals \
             WHERE user_id = $1 AND status = 'closed' \
               AND closed_date >= $2 AND closed_date < $3",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        let total_expenses: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) \
             FROM expenses \
             WHERE user_id = $1 AND expense_date >= $2 AND expense_date < $3",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(FinancialSummary {
            year,
            total_income,
            total_expenses,
            net_income: total_income - total_expenses,
            deal_count,
        })
    }

    async fn monthly_summaries(
        &self,
        user_id: Uuid,
        months_back: u32,
    ) -> anyhow::Result<Vec<MonthlySummary>> {
        let today = Utc::now().date_naive();
        let mut out = Vec::with_capacity(months_back as usize);

        // One query pair per month keeps the SQL simple; months_back <= 7
        let mut year = today.year();
        let mut month = today.month();
        for _ in 0..months_back {
            let start = NaiveDate::from_ymd_opt(year, month, 1)
                .ok_or_else(|| anyhow::anyhow!("invalid month boundary {}-{}", year, month))?;
            let end = next_month(year, month);

            let total_income: Decimal = sqlx::query_scalar(
                "SELECT COALESCE(SUM(net_commission), 0) \
                 FROM deals \
                 WHERE user_id = $1 AND status = 'closed' \
                   AND closed_date >= $2 AND closed_date < $3",
            )
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_one(&self.pool)
            .await?;

            let total_expenses: Decimal = sqlx::query_scalar(
                "SELECT COALESCE(SUM(amount), 0) \
                 FROM expenses \
                 WHERE user_id = $1 AND expense_date >= $2 AND expense_date < $3",
            )
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_one(&self.pool)
            .await?;

            out.push(MonthlySummary { year, month, total_income, total_expenses });

            if month == 1 {
                year -= 1;
                month = 12;
            } else {
                month -= 1;
            }
        }

        Ok(out)
    }
}

fn year_bounds(year: i32) -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(year, 1, 1).expect("January 1st always exists"),
        NaiveDate::from_ymd_opt(year + 1, 1, 1).expect("January 1st always exists"),
    )
}

fn next_month(year: i32, month: u32) -> NaiveDate {
    if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1).expect("January 1st always exists")
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).expect("months 2-12 start on the 1st")
    }
}
