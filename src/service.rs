use chrono::Utc;
use tracing::{info, warn};

use crate::error::{AnalysisError, NarrativeError};
use crate::metrics;
use crate::models::{EmployeeAnalysis, Period, RosterEntry, TeamAnalysis, TrendAnalysis};
use crate::narrative::Narrator;
use crate::records::{latest_record, RecordSet, RecordStore};
use crate::trends;

/// Answers analysis queries against the current record snapshot.
pub struct AnalysisService<N> {
    store: RecordStore,
    narrator: N,
}

impl<N: Narrator> AnalysisService<N> {
    pub fn new(narrator: N) -> Self {
        Self {
            store: RecordStore::new(RecordSet::default()),
            narrator,
        }
    }

    pub fn reload(&self, records: RecordSet) {
        info!(records = records.len(), "replacing record snapshot");
        self.store.replace(records);
    }

    /// Installs the loaded records, or an empty snapshot when the store
    /// failed. Queries then report `EmptyDataset` or `NotFound`.
    pub fn reload_or_empty(&self, loaded: anyhow::Result<RecordSet>) {
        match loaded {
            Ok(records) => self.reload(records),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to load sales data");
                self.reload(RecordSet::default());
            }
        }
    }

    pub fn employee_analysis(&self, employee_id: i64) -> Result<EmployeeAnalysis, AnalysisError> {
        let snapshot = self.store.snapshot();
        let history = snapshot.employee_history(employee_id);
        let latest =
            latest_record(&history).ok_or(AnalysisError::NotFound { employee_id })?;

        info!(employee_id, records = history.len(), "analysing employee");
        let performance_metrics = metrics::employee_metrics(latest, &history);
        let narrative = inline_failure(
            "Error generating analysis",
            self.narrator.describe_employee(latest),
        );

        Ok(EmployeeAnalysis {
            employee_id,
            employee_name: latest.employee_name.clone(),
            performance_metrics,
            narrative,
            historical_record_count: history.len(),
            last_updated: latest.dated.to_string(),
        })
    }

    pub fn team_analysis(&self) -> Result<TeamAnalysis, AnalysisError> {
        let snapshot = self.store.snapshot();
        let team_metrics = metrics::team_metrics(&snapshot)?;

        info!(records = snapshot.len(), "analysing team");
        let narrative = inline_failure(
            "Error generating team analysis",
            self.narrator.describe_team(&snapshot),
        );

        Ok(TeamAnalysis {
            team_metrics,
            narrative,
            total_records: snapshot.len(),
            unique_employee_count: snapshot.unique_employee_count(),
            analysis_timestamp: Utc::now().to_rfc3339(),
        })
    }

    pub fn trends(&self, period: Period) -> Result<TrendAnalysis, AnalysisError> {
        let snapshot = self.store.snapshot();
        let trend_metrics = trends::trend_metrics(&snapshot, period)?;

        info!(%period, buckets = trend_metrics.buckets.len(), "analysing trends");
        let narrative = inline_failure(
            "Error generating trend analysis",
            self.narrator.describe_trends(&snapshot, period),
        );

        Ok(TrendAnalysis {
            period,
            trend_metrics,
            narrative,
            analysis_timestamp: Utc::now().to_rfc3339(),
        })
    }

    /// One entry per employee, in order of first appearance.
    pub fn roster(&self) -> Vec<RosterEntry> {
        let snapshot = self.store.snapshot();
        snapshot
            .group_by_employee()
            .into_iter()
            .filter_map(|(employee_id, history)| {
                latest_record(&history).map(|latest| RosterEntry {
                    employee_id,
                    employee_name: latest.employee_name.clone(),
                    record_count: history.len(),
                    last_updated: latest.dated,
                })
            })
            .collect()
    }
}

fn inline_failure(prefix: &str, result: Result<String, NarrativeError>) -> String {
    match result {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, "narrative generation failed");
            format!("{prefix}: {err}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PerformanceRecord;
    use crate::narrative::BriefingNarrator;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct BrokenNarrator;

    impl Narrator for BrokenNarrator {
        fn describe_employee(&self, _: &PerformanceRecord) -> Result<String, NarrativeError> {
            Err(NarrativeError::Unavailable("quota exceeded".to_string()))
        }

        fn describe_team(&self, _: &RecordSet) -> Result<String, NarrativeError> {
            Err(NarrativeError::Unavailable("quota exceeded".to_string()))
        }

        fn describe_trends(&self, _: &RecordSet, _: Period) -> Result<String, NarrativeError> {
            Err(NarrativeError::Unavailable("quota exceeded".to_string()))
        }
    }

    fn sample_set() -> RecordSet {
        RecordSet::new(vec![
            PerformanceRecord {
                lead_taken: 10,
                revenue_confirmed: 1000.0,
                ..PerformanceRecord::blank(1, "Avery Lee", day(2024, 1, 31))
            },
            PerformanceRecord {
                lead_taken: 5,
                revenue_confirmed: 2000.0,
                ..PerformanceRecord::blank(2, "Jules Moreno", day(2024, 1, 31))
            },
            PerformanceRecord {
                lead_taken: 8,
                revenue_confirmed: 1600.0,
                ..PerformanceRecord::blank(1, "Avery Lee", day(2024, 2, 29))
            },
        ])
    }

    fn loaded<N: Narrator>(narrator: N) -> AnalysisService<N> {
        let service = AnalysisService::new(narrator);
        service.reload(sample_set());
        service
    }

    #[test]
    fn every_loaded_employee_resolves_to_latest_snapshot() {
        let service = loaded(BriefingNarrator);
        for (employee_id, name) in [(1, "Avery Lee"), (2, "Jules Moreno")] {
            let analysis = service.employee_analysis(employee_id).unwrap();
            assert_eq!(analysis.employee_id, employee_id);
            assert_eq!(analysis.employee_name, name);
        }

        let avery = service.employee_analysis(1).unwrap();
        assert_eq!(avery.historical_record_count, 2);
        assert_eq!(avery.last_updated, "2024-02-29");
        assert_eq!(
            avery.performance_metrics.current_performance.revenue_per_lead,
            200.0
        );
    }

    #[test]
    fn unknown_employee_is_not_found() {
        let service = loaded(BriefingNarrator);
        assert_eq!(
            service.employee_analysis(99).unwrap_err(),
            AnalysisError::NotFound { employee_id: 99 }
        );
    }

    #[test]
    fn empty_store_reports_empty_dataset() {
        let service = AnalysisService::new(BriefingNarrator);
        assert_eq!(
            service.team_analysis().unwrap_err(),
            AnalysisError::EmptyDataset
        );
        assert_eq!(
            service.trends(Period::Quarterly).unwrap_err(),
            AnalysisError::EmptyDataset
        );
        assert!(service.roster().is_empty());
    }

    #[test]
    fn narrative_failure_keeps_metrics() {
        let service = loaded(BrokenNarrator);

        let employee = service.employee_analysis(2).unwrap();
        assert_eq!(
            employee.narrative,
            "Error generating analysis: narrative unavailable: quota exceeded"
        );

        let team = service.team_analysis().unwrap();
        assert!(team.narrative.starts_with("Error generating team analysis"));
        assert_eq!(team.team_metrics.overview.total_leads, 23);
        assert_eq!(team.total_records, 3);
        assert_eq!(team.unique_employee_count, 2);

        let trends = service.trends(Period::Monthly).unwrap();
        assert!(trends.narrative.starts_with("Error generating trend analysis"));
        assert_eq!(trends.trend_metrics.growth_metrics.total_periods, 2);
    }

    #[test]
    fn trend_growth_from_monthly_buckets() {
        let service = loaded(BriefingNarrator);
        let trends = service.trends(Period::Monthly).unwrap();
        let growth = &trends.trend_metrics.growth_metrics;
        assert!((growth.recent_revenue_growth - (1600.0 - 3000.0) / 3000.0 * 100.0).abs() < 1e-9);
        assert_eq!(trends.period, Period::Monthly);
    }

    #[test]
    fn roster_follows_first_appearance() {
        let service = loaded(BriefingNarrator);
        let roster = service.roster();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].employee_id, 1);
        assert_eq!(roster[0].record_count, 2);
        assert_eq!(roster[0].last_updated, day(2024, 2, 29));
        assert_eq!(roster[1].employee_name, "Jules Moreno");
    }

    #[test]
    fn failed_load_leaves_an_empty_dataset() {
        let service = loaded(BriefingNarrator);
        service.reload_or_empty(Err(anyhow::anyhow!("file not found: sales.csv")));

        let err = service.team_analysis().unwrap_err();
        assert_eq!(err, AnalysisError::EmptyDataset);
        assert_eq!(err.status_code(), 500);
        assert_eq!(
            service.trends(Period::Monthly).unwrap_err(),
            AnalysisError::EmptyDataset
        );
        assert_eq!(
            service.employee_analysis(1).unwrap_err(),
            AnalysisError::NotFound { employee_id: 1 }
        );
    }

    #[test]
    fn successful_load_installs_records() {
        let service = AnalysisService::new(BriefingNarrator);
        service.reload_or_empty(Ok(sample_set()));
        assert_eq!(service.team_analysis().unwrap().total_records, 3);
    }

    #[test]
    fn reload_replaces_previous_data() {
        let service = loaded(BriefingNarrator);
        service.reload(RecordSet::new(vec![PerformanceRecord::blank(
            5,
            "Kiara Patel",
            day(2024, 4, 30),
        )]));

        assert!(service.employee_analysis(1).is_err());
        assert_eq!(service.employee_analysis(5).unwrap().employee_name, "Kiara Patel");
    }
}
