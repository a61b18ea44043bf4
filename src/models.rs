use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize};

/// One reporting snapshot for one employee on one date.
///
/// Every numeric column falls back to zero when it is missing from the source
/// or left blank, so the metric code never has to care about absent values.
#[derive(Debug, Clone, PartialEq, Deserialize, sqlx::FromRow)]
pub struct PerformanceRecord {
    pub employee_id: i64,
    #[serde(default = "unknown_name", deserialize_with = "name_or_unknown")]
    pub employee_name: String,
    #[serde(deserialize_with = "leading_date")]
    pub dated: NaiveDate,
    #[serde(default)]
    pub created: Option<String>,

    #[serde(default, deserialize_with = "count_or_zero")]
    pub lead_taken: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub tours_booked: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub applications: i64,

    #[serde(default, deserialize_with = "amount_or_zero")]
    pub revenue_confirmed: f64,
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub revenue_pending: f64,
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub revenue_runrate: f64,
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub estimated_revenue: f64,

    #[serde(default, deserialize_with = "amount_or_zero")]
    pub tours_per_lead: f64,
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub apps_per_tour: f64,
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub apps_per_lead: f64,
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub avg_close_rate_30_days: f64,
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub avg_deal_value_30_days: f64,

    #[serde(default, deserialize_with = "count_or_zero")]
    pub mon_text: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub mon_call: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub tue_text: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub tue_call: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub wed_text: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub wed_call: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub thur_text: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub thur_call: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub fri_text: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub fri_call: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub sat_text: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub sat_call: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub sun_text: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub sun_call: i64,

    #[serde(default, deserialize_with = "count_or_zero")]
    pub tours_in_pipeline: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub tours_scheduled: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub tours_pending: i64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub tours_cancelled: i64,
}

impl PerformanceRecord {
    /// A zeroed snapshot, mostly useful as a base for struct update syntax.
    #[cfg(test)]
    pub fn blank(employee_id: i64, employee_name: &str, dated: NaiveDate) -> Self {
        Self {
            employee_id,
            employee_name: employee_name.to_string(),
            dated,
            created: None,
            lead_taken: 0,
            tours_booked: 0,
            applications: 0,
            revenue_confirmed: 0.0,
            revenue_pending: 0.0,
            revenue_runrate: 0.0,
            estimated_revenue: 0.0,
            tours_per_lead: 0.0,
            apps_per_tour: 0.0,
            apps_per_lead: 0.0,
            avg_close_rate_30_days: 0.0,
            avg_deal_value_30_days: 0.0,
            mon_text: 0,
            mon_call: 0,
            tue_text: 0,
            tue_call: 0,
            wed_text: 0,
            wed_call: 0,
            thur_text: 0,
            thur_call: 0,
            fri_text: 0,
            fri_call: 0,
            sat_text: 0,
            sat_call: 0,
            sun_text: 0,
            sun_call: 0,
            tours_in_pipeline: 0,
            tours_scheduled: 0,
            tours_pending: 0,
            tours_cancelled: 0,
        }
    }

    /// (day label, texts, calls) for Monday through Sunday.
    pub fn weekday_activity(&self) -> [(&'static str, i64, i64); 7] {
        [
            ("Monday", self.mon_text, self.mon_call),
            ("Tuesday", self.tue_text, self.tue_call),
            ("Wednesday", self.wed_text, self.wed_call),
            ("Thursday", self.thur_text, self.thur_call),
            ("Friday", self.fri_text, self.fri_call),
            ("Saturday", self.sat_text, self.sat_call),
            ("Sunday", self.sun_text, self.sun_call),
        ]
    }

    pub fn total_texts(&self) -> i64 {
        self.weekday_activity().iter().map(|(_, texts, _)| texts).sum()
    }

    pub fn total_calls(&self) -> i64 {
        self.weekday_activity().iter().map(|(_, _, calls)| calls).sum()
    }
}

fn unknown_name() -> String {
    "Unknown".to_string()
}

fn name_or_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Ok(unknown_name())
    } else {
        Ok(trimmed.to_string())
    }
}

fn leading_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|err| de::Error::custom(format!("invalid date {trimmed:?}: {err}")))
}

fn count_or_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    // Exports sometimes write whole counts as "12.0".
    match i64::from_str(trimmed) {
        Ok(value) => Ok(value),
        Err(_) => f64::from_str(trimmed)
            .map(|value| if value.is_finite() { value as i64 } else { 0 })
            .map_err(|err| de::Error::custom(format!("invalid count {trimmed:?}: {err}"))),
    }
}

fn amount_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    f64::from_str(trimmed)
        .map(|value| if value.is_nan() { 0.0 } else { value })
        .map_err(|err| de::Error::custom(format!("invalid amount {trimmed:?}: {err}")))
}

/// Granularity used to bucket records by calendar period.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Monthly,
    Quarterly,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Monthly => f.write_str("monthly"),
            Period::Quarterly => f.write_str("quarterly"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineHealth {
    pub pipeline_tours: i64,
    pub scheduled_tours: i64,
    pub cancelled_rate: f64,
    pub pending_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentPerformance {
    pub conversion_rate: f64,
    pub revenue_per_lead: f64,
    pub activity_score: f64,
    pub pipeline_health: PipelineHealth,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalTrends {
    pub total_records: usize,
    pub avg_monthly_revenue: f64,
    pub avg_monthly_leads: f64,
    pub performance_consistency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeMetrics {
    pub current_performance: CurrentPerformance,
    pub historical_trends: HistoricalTrends,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopPerformer {
    pub name: String,
    pub value: f64,
    pub employee_id: i64,
}

impl TopPerformer {
    pub fn unknown() -> Self {
        Self {
            name: "Unknown".to_string(),
            value: 0.0,
            employee_id: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamOverview {
    pub total_employees: usize,
    pub total_leads: i64,
    pub total_tours: i64,
    pub total_applications: i64,
    pub total_confirmed_revenue: f64,
    pub total_pending_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamAverages {
    pub avg_leads_per_employee: f64,
    pub avg_revenue_per_employee: f64,
    pub avg_close_rate: f64,
    pub avg_deal_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionMetrics {
    pub team_tours_per_lead: f64,
    pub team_apps_per_tour: f64,
    pub team_apps_per_lead: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopPerformers {
    pub highest_revenue: TopPerformer,
    pub highest_leads: TopPerformer,
    pub highest_applications: TopPerformer,
    pub highest_close_rate: TopPerformer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamMetrics {
    pub overview: TeamOverview,
    pub averages: TeamAverages,
    pub conversion_metrics: ConversionMetrics,
    pub top_performers: TopPerformers,
}

/// Aggregates for one calendar bucket, labelled "2024-03" or "2024Q1".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub label: String,
    pub revenue: f64,
    pub leads: i64,
    pub applications: i64,
    pub avg_close_rate: f64,
    pub record_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthMetrics {
    pub recent_revenue_growth: f64,
    pub total_periods: usize,
    pub avg_period_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineMetrics {
    pub total_pipeline_tours: i64,
    pub total_pending_revenue: f64,
    pub avg_deal_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendMetrics {
    pub buckets: Vec<PeriodSummary>,
    pub growth_metrics: GrowthMetrics,
    pub pipeline_metrics: PipelineMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeAnalysis {
    pub employee_id: i64,
    pub employee_name: String,
    pub performance_metrics: EmployeeMetrics,
    pub narrative: String,
    pub historical_record_count: usize,
    pub last_updated: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamAnalysis {
    pub team_metrics: TeamMetrics,
    pub narrative: String,
    pub total_records: usize,
    pub unique_employee_count: usize,
    pub analysis_timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendAnalysis {
    pub period: Period,
    pub trend_metrics: TrendMetrics,
    pub narrative: String,
    pub analysis_timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub employee_id: i64,
    pub employee_name: String,
    pub record_count: usize,
    pub last_updated: NaiveDate,
}
