use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::error::AnalysisError;
use crate::metrics::{column_mean, mean};
use crate::models::{GrowthMetrics, Period, PeriodSummary, PipelineMetrics, TrendMetrics};
use crate::records::RecordSet;

/// Calendar bucket; ordering is chronological because year sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BucketKey {
    pub year: i32,
    /// Month (1-12) or quarter (1-4) depending on the period.
    pub index: u32,
    period: Period,
}

impl BucketKey {
    pub fn for_date(date: NaiveDate, period: Period) -> Self {
        let index = match period {
            Period::Monthly => date.month(),
            Period::Quarterly => (date.month() - 1) / 3 + 1,
        };
        Self {
            year: date.year(),
            index,
            period,
        }
    }

    pub fn label(&self) -> String {
        match self.period {
            Period::Monthly => format!("{:04}-{:02}", self.year, self.index),
            Period::Quarterly => format!("{:04}Q{}", self.year, self.index),
        }
    }
}

#[derive(Default)]
struct BucketTotals {
    revenue: f64,
    leads: i64,
    applications: i64,
    close_rate_sum: f64,
    records: usize,
}

pub fn bucket_records(set: &RecordSet, period: Period) -> Vec<PeriodSummary> {
    let mut buckets: BTreeMap<BucketKey, BucketTotals> = BTreeMap::new();

    for record in set.records() {
        let totals = buckets
            .entry(BucketKey::for_date(record.dated, period))
            .or_default();
        totals.revenue += record.revenue_confirmed;
        totals.leads += record.lead_taken;
        totals.applications += record.applications;
        totals.close_rate_sum += record.avg_close_rate_30_days;
        totals.records += 1;
    }

    buckets
        .into_iter()
        .map(|(key, totals)| PeriodSummary {
            label: key.label(),
            revenue: totals.revenue,
            leads: totals.leads,
            applications: totals.applications,
            avg_close_rate: totals.close_rate_sum / totals.records.max(1) as f64,
            record_count: totals.records,
        })
        .collect()
}

/// Percent change between the last two buckets; zero with fewer than two.
pub fn recent_growth(buckets: &[PeriodSummary]) -> f64 {
    match buckets {
        [.., previous, last] => (last.revenue - previous.revenue) / previous.revenue.max(1.0) * 100.0,
        _ => 0.0,
    }
}

pub fn trend_metrics(set: &RecordSet, period: Period) -> Result<TrendMetrics, AnalysisError> {
    if set.is_empty() {
        return Err(AnalysisError::EmptyDataset);
    }

    let buckets = bucket_records(set, period);
    let revenues: Vec<f64> = buckets.iter().map(|b| b.revenue).collect();
    let records = set.records();

    Ok(TrendMetrics {
        growth_metrics: GrowthMetrics {
            recent_revenue_growth: recent_growth(&buckets),
            total_periods: buckets.len(),
            avg_period_revenue: mean(&revenues),
        },
        pipeline_metrics: PipelineMetrics {
            total_pipeline_tours: records.iter().map(|r| r.tours_in_pipeline).sum(),
            total_pending_revenue: records.iter().map(|r| r.revenue_pending).sum(),
            avg_deal_value: column_mean(records, |r| r.avg_deal_value_30_days),
        },
        buckets,
    })
}
