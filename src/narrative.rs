use std::fmt::Write;

use chrono::Duration;

use crate::error::NarrativeError;
use crate::metrics::{column_mean, top_performer, RankMetric};
use crate::models::{PerformanceRecord, Period};
use crate::records::RecordSet;
use crate::trends::bucket_records;

/// Produces commentary for computed metrics. Implementations may fail; the
/// caller turns a failure into inline text instead of dropping the metrics.
pub trait Narrator {
    fn describe_employee(&self, record: &PerformanceRecord) -> Result<String, NarrativeError>;
    fn describe_team(&self, set: &RecordSet) -> Result<String, NarrativeError>;
    fn describe_trends(&self, set: &RecordSet, period: Period) -> Result<String, NarrativeError>;
}

/// Renders a markdown briefing straight from the records.
#[derive(Debug, Default, Clone, Copy)]
pub struct BriefingNarrator;

impl Narrator for BriefingNarrator {
    fn describe_employee(&self, record: &PerformanceRecord) -> Result<String, NarrativeError> {
        let mut output = String::new();

        let _ = writeln!(
            output,
            "# Performance Briefing: {} (ID {})",
            record.employee_name, record.employee_id
        );
        let _ = writeln!(output, "Snapshot dated {}", record.dated);
        let _ = writeln!(output);
        let _ = writeln!(output, "## Funnel");
        let _ = writeln!(output, "- Leads taken: {}", record.lead_taken);
        let _ = writeln!(output, "- Tours booked: {}", record.tours_booked);
        let _ = writeln!(output, "- Applications: {}", record.applications);
        let _ = writeln!(
            output,
            "- Tours per lead {:.2}, apps per tour {:.2}, apps per lead {:.2}",
            record.tours_per_lead, record.apps_per_tour, record.apps_per_lead
        );
        let _ = writeln!(output);
        let _ = writeln!(output, "## Revenue");
        let _ = writeln!(output, "- Confirmed: ${:.0}", record.revenue_confirmed);
        let _ = writeln!(output, "- Pending: ${:.0}", record.revenue_pending);
        let _ = writeln!(output, "- Runrate: ${:.0}", record.revenue_runrate);
        let _ = writeln!(output, "- Estimated: ${:.0}", record.estimated_revenue);
        let _ = writeln!(
            output,
            "- 30-day average deal ${:.0} at a {:.2}% close rate",
            record.avg_deal_value_30_days, record.avg_close_rate_30_days
        );
        let _ = writeln!(output);
        let _ = writeln!(output, "## Pipeline");
        let _ = writeln!(
            output,
            "- {} in pipeline, {} scheduled, {} pending, {} cancelled",
            record.tours_in_pipeline,
            record.tours_scheduled,
            record.tours_pending,
            record.tours_cancelled
        );
        let _ = writeln!(output);
        let _ = writeln!(output, "## Daily Activity");
        for (day, texts, calls) in record.weekday_activity() {
            let _ = writeln!(output, "- {day}: {texts} texts, {calls} calls");
        }

        Ok(output)
    }

    fn describe_team(&self, set: &RecordSet) -> Result<String, NarrativeError> {
        if set.is_empty() {
            return Err(NarrativeError::Unavailable("no records loaded".to_string()));
        }
        let records = set.records();
        let revenue_leader = top_performer(records, RankMetric::Revenue);
        let lead_leader = top_performer(records, RankMetric::Leads);
        let mut output = String::new();

        let _ = writeln!(output, "# Team Performance Briefing");
        let _ = writeln!(output);
        let _ = writeln!(output, "## Overview");
        let _ = writeln!(output, "- Snapshots analysed: {}", set.len());
        let _ = writeln!(output, "- Team members: {}", set.unique_employee_count());
        let _ = writeln!(
            output,
            "- Leads {}, tours {}, applications {}",
            records.iter().map(|r| r.lead_taken).sum::<i64>(),
            records.iter().map(|r| r.tours_booked).sum::<i64>(),
            records.iter().map(|r| r.applications).sum::<i64>()
        );
        let _ = writeln!(
            output,
            "- Confirmed revenue ${:.0}, pending ${:.0}",
            records.iter().map(|r| r.revenue_confirmed).sum::<f64>(),
            records.iter().map(|r| r.revenue_pending).sum::<f64>()
        );
        let _ = writeln!(
            output,
            "- Average close rate {:.2}%",
            column_mean(records, |r| r.avg_close_rate_30_days)
        );
        let _ = writeln!(output);
        let _ = writeln!(output, "## Distribution");
        let _ = writeln!(
            output,
            "- Highest revenue: {} (${:.0})",
            revenue_leader.name, revenue_leader.value
        );
        let _ = writeln!(
            output,
            "- Most leads: {} ({:.0} leads)",
            lead_leader.name, lead_leader.value
        );
        let _ = writeln!(
            output,
            "- Per snapshot: ${:.0} revenue, {:.1} leads, {:.1} applications",
            column_mean(records, |r| r.revenue_confirmed),
            column_mean(records, |r| r.lead_taken as f64),
            column_mean(records, |r| r.applications as f64)
        );
        let _ = writeln!(output);
        let _ = writeln!(output, "## Conversion");
        let _ = writeln!(
            output,
            "- Tours per lead {:.2}, apps per tour {:.2}, apps per lead {:.2}",
            column_mean(records, |r| r.tours_per_lead),
            column_mean(records, |r| r.apps_per_tour),
            column_mean(records, |r| r.apps_per_lead)
        );

        Ok(output)
    }

    fn describe_trends(&self, set: &RecordSet, period: Period) -> Result<String, NarrativeError> {
        let records = set.records();
        let (Some(first), Some(last)) = (
            records.iter().map(|r| r.dated).min(),
            records.iter().map(|r| r.dated).max(),
        ) else {
            return Err(NarrativeError::Unavailable("no records loaded".to_string()));
        };

        let window_start = last - Duration::days(30);
        let recent: Vec<PerformanceRecord> = records
            .iter()
            .filter(|r| r.dated >= window_start)
            .cloned()
            .collect();
        let buckets = bucket_records(set, period);
        let mut output = String::new();

        let _ = writeln!(output, "# Performance Trends ({period})");
        let _ = writeln!(
            output,
            "Covering {} days from {} to {} across {} snapshots",
            (last - first).num_days(),
            first,
            last,
            set.len()
        );
        let _ = writeln!(output);
        let _ = writeln!(output, "## Last 30 Days");
        let _ = writeln!(output, "- Snapshots: {}", recent.len());
        let _ = writeln!(
            output,
            "- Revenue ${:.0}, leads {}, applications {}",
            recent.iter().map(|r| r.revenue_confirmed).sum::<f64>(),
            recent.iter().map(|r| r.lead_taken).sum::<i64>(),
            recent.iter().map(|r| r.applications).sum::<i64>()
        );
        let _ = writeln!(
            output,
            "- Average close rate {:.2}%",
            column_mean(&recent, |r| r.avg_close_rate_30_days)
        );
        let _ = writeln!(output);
        let _ = writeln!(output, "## Indicators");
        let _ = writeln!(
            output,
            "- Average runrate ${:.0}",
            column_mean(records, |r| r.revenue_runrate)
        );
        let _ = writeln!(
            output,
            "- Tours in pipeline {}, pending revenue ${:.0}",
            records.iter().map(|r| r.tours_in_pipeline).sum::<i64>(),
            records.iter().map(|r| r.revenue_pending).sum::<f64>()
        );
        let _ = writeln!(
            output,
            "- Average deal value ${:.0}",
            column_mean(records, |r| r.avg_deal_value_30_days)
        );
        let _ = writeln!(
            output,
            "- Tours per lead {:.2}, apps per tour {:.2}",
            column_mean(records, |r| r.tours_per_lead),
            column_mean(records, |r| r.apps_per_tour)
        );
        let _ = writeln!(
            output,
            "- Texts sent: {}",
            records.iter().map(|r| r.total_texts()).sum::<i64>()
        );
        let _ = writeln!(output);
        let _ = writeln!(output, "## Revenue by Period");
        for bucket in &buckets {
            let _ = writeln!(
                output,
                "- {}: ${:.0} from {} leads",
                bucket.label, bucket.revenue, bucket.leads
            );
        }

        Ok(output)
    }
}
