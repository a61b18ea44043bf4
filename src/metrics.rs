use crate::error::AnalysisError;
use crate::models::{
    ConversionMetrics, CurrentPerformance, EmployeeMetrics, HistoricalTrends, PerformanceRecord,
    PipelineHealth, TeamAverages, TeamMetrics, TeamOverview, TopPerformer, TopPerformers,
};
use crate::records::RecordSet;

/// Columns a top performer can be ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankMetric {
    Revenue,
    Leads,
    Applications,
    CloseRate,
}

impl RankMetric {
    pub fn value(self, record: &PerformanceRecord) -> f64 {
        match self {
            RankMetric::Revenue => record.revenue_confirmed,
            RankMetric::Leads => record.lead_taken as f64,
            RankMetric::Applications => record.applications as f64,
            RankMetric::CloseRate => record.avg_close_rate_30_days,
        }
    }
}

pub fn employee_metrics(
    latest: &PerformanceRecord,
    history: &[&PerformanceRecord],
) -> EmployeeMetrics {
    let revenues: Vec<f64> = history.iter().map(|r| r.revenue_confirmed).collect();
    let leads: Vec<f64> = history.iter().map(|r| r.lead_taken as f64).collect();
    let avg_revenue = mean(&revenues);

    EmployeeMetrics {
        current_performance: CurrentPerformance {
            conversion_rate: latest.apps_per_lead,
            revenue_per_lead: latest.revenue_confirmed / latest.lead_taken.max(1) as f64,
            activity_score: activity_score(latest),
            pipeline_health: pipeline_health(latest),
        },
        historical_trends: HistoricalTrends {
            total_records: history.len(),
            avg_monthly_revenue: avg_revenue,
            avg_monthly_leads: mean(&leads),
            performance_consistency: sample_std_dev(&revenues) / avg_revenue.max(1.0),
        },
    }
}

/// Calls weigh twice as much as texts.
pub fn activity_score(record: &PerformanceRecord) -> f64 {
    (record.total_texts() + 2 * record.total_calls()) as f64
}

pub fn pipeline_health(record: &PerformanceRecord) -> PipelineHealth {
    let open_tours = record.tours_in_pipeline + record.tours_scheduled;
    PipelineHealth {
        pipeline_tours: record.tours_in_pipeline,
        scheduled_tours: record.tours_scheduled,
        cancelled_rate: record.tours_cancelled as f64 / open_tours.max(1) as f64,
        pending_revenue: record.revenue_pending,
    }
}

/// Aggregates every row of the set, including repeated snapshots of the same
/// employee.
pub fn team_metrics(set: &RecordSet) -> Result<TeamMetrics, AnalysisError> {
    if set.is_empty() {
        return Err(AnalysisError::EmptyDataset);
    }
    let records = set.records();

    Ok(TeamMetrics {
        overview: TeamOverview {
            total_employees: set.unique_employee_count(),
            total_leads: records.iter().map(|r| r.lead_taken).sum(),
            total_tours: records.iter().map(|r| r.tours_booked).sum(),
            total_applications: records.iter().map(|r| r.applications).sum(),
            total_confirmed_revenue: records.iter().map(|r| r.revenue_confirmed).sum(),
            total_pending_revenue: records.iter().map(|r| r.revenue_pending).sum(),
        },
        averages: TeamAverages {
            avg_leads_per_employee: column_mean(records, |r| r.lead_taken as f64),
            avg_revenue_per_employee: column_mean(records, |r| r.revenue_confirmed),
            avg_close_rate: column_mean(records, |r| r.avg_close_rate_30_days),
            avg_deal_value: column_mean(records, |r| r.avg_deal_value_30_days),
        },
        conversion_metrics: ConversionMetrics {
            team_tours_per_lead: column_mean(records, |r| r.tours_per_lead),
            team_apps_per_tour: column_mean(records, |r| r.apps_per_tour),
            team_apps_per_lead: column_mean(records, |r| r.apps_per_lead),
        },
        top_performers: TopPerformers {
            highest_revenue: top_performer(records, RankMetric::Revenue),
            highest_leads: top_performer(records, RankMetric::Leads),
            highest_applications: top_performer(records, RankMetric::Applications),
            highest_close_rate: top_performer(records, RankMetric::CloseRate),
        },
    })
}

/// Stable argmax: a later record only wins with a strictly greater value.
pub fn top_performer(records: &[PerformanceRecord], metric: RankMetric) -> TopPerformer {
    let mut best: Option<(&PerformanceRecord, f64)> = None;

    for record in records {
        let value = metric.value(record);
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((record, value)),
        }
    }

    match best {
        Some((record, value)) => TopPerformer {
            name: record.employee_name.clone(),
            value,
            employee_id: record.employee_id,
        },
        None => TopPerformer::unknown(),
    }
}

pub(crate) fn column_mean<F>(records: &[PerformanceRecord], column: F) -> f64
where
    F: Fn(&PerformanceRecord) -> f64,
{
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(column).sum::<f64>() / records.len() as f64
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation (n - 1). Zero below two observations.
pub(crate) fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
