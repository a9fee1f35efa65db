use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Per-user goal settings. Created on first save, updated in place,
/// never deleted automatically.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CoachingProfile {
    pub user_id: Uuid,
    pub market: Option<String>,
    pub annual_gci_target: Option<Decimal>,
    pub weekly_call_target: Option<i32>,
    pub weekly_conversation_target: Option<i32>,
    pub weekly_appointment_target: Option<i32>,
    pub monthly_marketing_budget: Option<Decimal>,
    pub updated_at: NaiveDateTime,
}

impl CoachingProfile {
    /// A profile with no goals filled in counts as unset for gating purposes.
    pub fn has_goals(&self) -> bool {
        self.annual_gci_target.is_some()
            || self.weekly_call_target.is_some()
            || self.weekly_conversation_target.is_some()
            || self.weekly_appointment_target.is_some()
    }
}

/// One day of logged prospecting activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub user_id: Uuid,
    pub log_date: NaiveDate,
    pub calls: i32,
    pub conversations: i32,
    pub appointments: i32,
    pub listings: i32,
    pub prospecting_hours: Decimal,
    pub admin_hours: Decimal,
    pub reflection: Option<String>,
}

/// Trailing-window aggregate of activity entries. This is what the
/// pipeline sees; individual rows stay in the database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityRollup {
    pub days_logged: i64,
    pub calls: i64,
    pub conversations: i64,
    pub appointments: i64,
    pub listings: i64,
    pub prospecting_hours: Decimal,
    pub admin_hours: Decimal,
}

impl ActivityRollup {
    pub fn is_empty(&self) -> bool {
        self.days_logged == 0
    }
}

/// Daily free-text note plus mood tag. PII-bearing: the note must pass
/// through the redactor before leaving the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReflectionLogEntry {
    pub user_id: Uuid,
    pub log_date: NaiveDate,
    pub mood: Option<String>,
    pub note: String,
}

/// Derived P&L aggregate for a (user, year) scope. Computed on demand
/// from deal and expense records, never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub year: i32,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_income: Decimal,
    pub deal_count: i64,
}

impl FinancialSummary {
    pub fn is_empty(&self) -> bool {
        self.deal_count == 0 && self.total_income.is_zero() && self.total_expenses.is_zero()
    }
}

/// One month of income/expense history for trend analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
}

/// The object handed back to the caller. Required keys depend on the
/// active context; every code path produces a complete object.
pub type CoachResponse = serde_json::Map<String, Value>;
