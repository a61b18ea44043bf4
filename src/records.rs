use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::Context;
use tracing::{debug, info};

use crate::models::PerformanceRecord;

/// Performance records in the order they were loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: Vec<PerformanceRecord>,
}

impl RecordSet {
    pub fn new(records: Vec<PerformanceRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[PerformanceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn employee_history(&self, employee_id: i64) -> Vec<&PerformanceRecord> {
        self.records
            .iter()
            .filter(|record| record.employee_id == employee_id)
            .collect()
    }

    /// Groups records by employee. Groups follow the order in which each
    /// employee first appears; records inside a group keep load order.
    pub fn group_by_employee(&self) -> Vec<(i64, Vec<&PerformanceRecord>)> {
        let mut slots: HashMap<i64, usize> = HashMap::new();
        let mut groups: Vec<(i64, Vec<&PerformanceRecord>)> = Vec::new();

        for record in &self.records {
            let slot = *slots.entry(record.employee_id).or_insert_with(|| {
                groups.push((record.employee_id, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(record);
        }

        groups
    }

    pub fn unique_employee_count(&self) -> usize {
        self.records
            .iter()
            .map(|record| record.employee_id)
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Most recent snapshot in a history. When several share the latest date the
/// one loaded last wins.
pub fn latest_record<'a>(history: &[&'a PerformanceRecord]) -> Option<&'a PerformanceRecord> {
    history.iter().copied().fold(None, |best, record| match best {
        Some(current) if current.dated > record.dated => Some(current),
        _ => Some(record),
    })
}

pub fn load_csv(path: &Path) -> anyhow::Result<RecordSet> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("file not found: {}", path.display()))?;
    let set = read_csv(file).with_context(|| format!("failed to load {}", path.display()))?;
    info!(path = %path.display(), records = set.len(), "loaded sales data");
    Ok(set)
}

pub fn read_csv<R: Read>(source: R) -> anyhow::Result<RecordSet> {
    let mut reader = csv::Reader::from_reader(source);
    let mut records = Vec::new();

    for (index, result) in reader.deserialize::<PerformanceRecord>().enumerate() {
        let record = result.with_context(|| format!("invalid row {}", index + 1))?;
        records.push(record);
    }

    debug!(rows = records.len(), "parsed csv rows");
    Ok(RecordSet::new(records))
}

/// Owner of the current snapshot. Readers get an `Arc` they can hold for the
/// whole computation; a reload swaps the pointer and never touches old data.
#[derive(Debug, Default)]
pub struct RecordStore {
    current: RwLock<Arc<RecordSet>>,
}

impl RecordStore {
    pub fn new(records: RecordSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(records)),
        }
    }

    pub fn snapshot(&self) -> Arc<RecordSet> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    pub fn replace(&self, records: RecordSet) {
        let next = Arc::new(records);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_set() -> RecordSet {
        RecordSet::new(vec![
            PerformanceRecord::blank(7, "Avery Lee", day(2024, 1, 31)),
            PerformanceRecord::blank(3, "Jules Moreno", day(2024, 1, 31)),
            PerformanceRecord::blank(7, "Avery Lee", day(2024, 2, 29)),
            PerformanceRecord::blank(9, "Kiara Patel", day(2024, 2, 29)),
            PerformanceRecord::blank(3, "Jules Moreno", day(2024, 2, 29)),
        ])
    }

    #[test]
    fn groups_follow_first_appearance() {
        let set = sample_set();
        let groups = set.group_by_employee();
        let ids: Vec<i64> = groups.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![7, 3, 9]);
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[0].1[1].dated, day(2024, 2, 29));
        assert_eq!(set.unique_employee_count(), 3);
    }

    #[test]
    fn latest_record_prefers_max_date() {
        let set = RecordSet::new(vec![
            PerformanceRecord::blank(1, "A", day(2024, 3, 31)),
            PerformanceRecord::blank(1, "A", day(2024, 1, 31)),
        ]);
        let history = set.employee_history(1);
        assert_eq!(latest_record(&history).unwrap().dated, day(2024, 3, 31));
    }

    #[test]
    fn latest_record_tie_resolves_to_last_loaded() {
        let set = RecordSet::new(vec![
            PerformanceRecord::blank(1, "First", day(2024, 3, 31)),
            PerformanceRecord::blank(1, "Second", day(2024, 3, 31)),
            PerformanceRecord::blank(1, "Older", day(2024, 2, 29)),
        ]);
        let history = set.employee_history(1);
        assert_eq!(latest_record(&history).unwrap().employee_name, "Second");
        assert!(latest_record(&[]).is_none());
    }

    #[test]
    fn csv_missing_columns_default_to_zero() {
        let data = "employee_id,employee_name,dated,lead_taken,revenue_confirmed,mon_text\n\
                    1,Avery Lee,2024-03-01,10,1500.5,\n\
                    2,Jules Moreno,2024-03-02 09:30:00,4.0,,3\n";
        let set = read_csv(data.as_bytes()).unwrap();
        assert_eq!(set.len(), 2);

        let first = &set.records()[0];
        assert_eq!(first.lead_taken, 10);
        assert_eq!(first.revenue_confirmed, 1500.5);
        assert_eq!(first.mon_text, 0);
        assert_eq!(first.tours_cancelled, 0);
        assert_eq!(first.avg_deal_value_30_days, 0.0);

        let second = &set.records()[1];
        assert_eq!(second.dated, day(2024, 3, 2));
        assert_eq!(second.lead_taken, 4);
        assert_eq!(second.revenue_confirmed, 0.0);
        assert_eq!(second.mon_text, 3);
    }

    #[test]
    fn csv_blank_or_missing_name_is_unknown() {
        let data = "employee_id,employee_name,dated\n5, ,2024-03-01\n6,Kiara Patel,2024-03-01\n";
        let set = read_csv(data.as_bytes()).unwrap();
        assert_eq!(set.records()[0].employee_name, "Unknown");
        assert_eq!(set.records()[1].employee_name, "Kiara Patel");

        let nameless = "employee_id,dated\n5,2024-03-01\n";
        let set = read_csv(nameless.as_bytes()).unwrap();
        assert_eq!(set.records()[0].employee_name, "Unknown");
    }

    #[test]
    fn csv_rejects_unparseable_dates() {
        let data = "employee_id,employee_name,dated\n1,Avery Lee,not-a-date\n";
        assert!(read_csv(data.as_bytes()).is_err());
    }

    #[test]
    fn replace_swaps_whole_snapshot() {
        let store = RecordStore::new(sample_set());
        let before = store.snapshot();
        store.replace(RecordSet::default());

        assert_eq!(before.len(), 5);
        assert!(store.snapshot().is_empty());
    }
}
