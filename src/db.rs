use std::path::Path;

use sqlx::PgPool;
use tracing::info;

use crate::models::PerformanceRecord;
use crate::records::{self, RecordSet};

const COLUMNS: [&str; 34] = [
    "employee_id",
    "employee_name",
    "dated",
    "created",
    "lead_taken",
    "tours_booked",
    "applications",
    "revenue_confirmed",
    "revenue_pending",
    "revenue_runrate",
    "estimated_revenue",
    "tours_per_lead",
    "apps_per_tour",
    "apps_per_lead",
    "avg_close_rate_30_days",
    "avg_deal_value_30_days",
    "mon_text",
    "mon_call",
    "tue_text",
    "tue_call",
    "wed_text",
    "wed_call",
    "thur_text",
    "thur_call",
    "fri_text",
    "fri_call",
    "sat_text",
    "sat_call",
    "sun_text",
    "sun_call",
    "tours_in_pipeline",
    "tours_scheduled",
    "tours_pending",
    "tours_cancelled",
];

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Loads every stored snapshot in insertion order.
pub async fn fetch_records(pool: &PgPool) -> anyhow::Result<RecordSet> {
    let query = format!(
        "SELECT {} FROM sales_insights.performance_records ORDER BY load_order",
        COLUMNS.join(", ")
    );
    let rows = sqlx::query_as::<_, PerformanceRecord>(&query)
        .fetch_all(pool)
        .await?;

    info!(records = rows.len(), "loaded sales data from postgres");
    Ok(RecordSet::new(rows))
}

fn upsert_sql() -> String {
    let placeholders: Vec<String> = (1..=COLUMNS.len()).map(|i| format!("${i}")).collect();
    let updates: Vec<String> = COLUMNS
        .iter()
        .skip(2)
        .filter(|column| **column != "dated")
        .map(|column| format!("{column} = EXCLUDED.{column}"))
        .collect();

    format!(
        "INSERT INTO sales_insights.performance_records ({}) VALUES ({}) \
         ON CONFLICT (employee_id, dated) DO UPDATE SET employee_name = EXCLUDED.employee_name, {}",
        COLUMNS.join(", "),
        placeholders.join(", "),
        updates.join(", ")
    )
}

/// Copies a CSV export into the table, updating snapshots that already exist
/// for the same employee and date.
pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let set = records::load_csv(csv_path)?;
    let sql = upsert_sql();
    let mut written = 0usize;

    for row in set.records() {
        let result = sqlx::query(&sql)
            .bind(row.employee_id)
            .bind(&row.employee_name)
            .bind(row.dated)
            .bind(row.created.as_deref())
            .bind(row.lead_taken)
            .bind(row.tours_booked)
            .bind(row.applications)
            .bind(row.revenue_confirmed)
            .bind(row.revenue_pending)
            .bind(row.revenue_runrate)
            .bind(row.estimated_revenue)
            .bind(row.tours_per_lead)
            .bind(row.apps_per_tour)
            .bind(row.apps_per_lead)
            .bind(row.avg_close_rate_30_days)
            .bind(row.avg_deal_value_30_days)
            .bind(row.mon_text)
            .bind(row.mon_call)
            .bind(row.tue_text)
            .bind(row.tue_call)
            .bind(row.wed_text)
            .bind(row.wed_call)
            .bind(row.thur_text)
            .bind(row.thur_call)
            .bind(row.fri_text)
            .bind(row.fri_call)
            .bind(row.sat_text)
            .bind(row.sat_call)
            .bind(row.sun_text)
            .bind(row.sun_call)
            .bind(row.tours_in_pipeline)
            .bind(row.tours_scheduled)
            .bind(row.tours_pending)
            .bind(row.tours_cancelled)
            .execute(pool)
            .await?;

        written += result.rows_affected() as usize;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_binds_every_column_once() {
        let sql = upsert_sql();
        assert!(sql.contains("$34)"));
        assert!(!sql.contains("$35"));
        assert!(sql.contains("ON CONFLICT (employee_id, dated)"));
        assert!(sql.contains("tours_cancelled = EXCLUDED.tours_cancelled"));
        assert!(!sql.contains("dated = EXCLUDED.dated"));
    }
}
