//! Label extraction and time bucketing.
//!
//! A record contributes one count to every distinct label it carries, so the
//! per-label sum of a bucket can exceed the number of records in it.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::domain::{MonthKey, Record};

/// Every distinct label across the store, in byte-wise lexicographic order.
///
/// This order is the chart series order and the filter checkbox order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index_of(label).is_some()
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels
            .binary_search_by(|probe| probe.as_str().cmp(label))
            .ok()
    }
}

impl<'a> FromIterator<&'a str> for LabelSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let labels = iter
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        Self { labels }
    }
}

/// Restricts which event dates take part in monthly bucketing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateFilter {
    pub year: Option<i32>,
}

impl DateFilter {
    pub fn admits(&self, date: NaiveDate) -> bool {
        self.year.is_none_or(|year| date.year() == year)
    }
}

/// One chart bucket: a month or a day with a count for every known label.
///
/// Counts serialize nested under `counts`; a label may itself be named
/// `bucket`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketRow<K> {
    pub bucket: K,
    pub counts: BTreeMap<String, usize>,
}

pub type MonthRow = BucketRow<MonthKey>;
pub type DayRow = BucketRow<NaiveDate>;

impl<K> BucketRow<K> {
    fn zero_filled(bucket: K, labels: &LabelSet, tallies: Option<&HashMap<String, usize>>) -> Self {
        let counts = labels
            .iter()
            .map(|label| {
                let count = tallies
                    .and_then(|tallies| tallies.get(label))
                    .copied()
                    .unwrap_or(0);
                (label.to_string(), count)
            })
            .collect();
        Self { bucket, counts }
    }

    pub fn count(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn total_for<'a>(&self, labels: impl IntoIterator<Item = &'a str>) -> usize {
        labels.into_iter().map(|label| self.count(label)).sum()
    }
}

pub fn extract_labels(records: &[Record]) -> LabelSet {
    records.iter().flat_map(|record| record.labels()).collect()
}

pub fn bucket_by_month(records: &[Record], labels: &LabelSet) -> Vec<MonthRow> {
    bucket_by_month_filtered(records, labels, &DateFilter::default())
}

/// Monthly rows in chronological order. Months only appear when at least one
/// admitted record is dated in them.
pub fn bucket_by_month_filtered(
    records: &[Record],
    labels: &LabelSet,
    filter: &DateFilter,
) -> Vec<MonthRow> {
    let mut tallies: BTreeMap<MonthKey, HashMap<String, usize>> = BTreeMap::new();
    let mut undated = 0usize;
    let mut filtered = 0usize;

    for record in records {
        let Some(date) = record.event_date() else {
            undated += 1;
            continue;
        };
        if !filter.admits(date) {
            filtered += 1;
            continue;
        }
        add_label_counts(&mut tallies, MonthKey::of(date), record);
    }

    debug!(
        months = tallies.len(),
        undated, filtered, "bucketed records by month"
    );

    tallies
        .iter()
        .map(|(month, counts)| BucketRow::zero_filled(*month, labels, Some(counts)))
        .collect()
}

/// One row per calendar day of `month`, including days without records.
pub fn bucket_by_day(records: &[Record], month: MonthKey, labels: &LabelSet) -> Vec<DayRow> {
    let mut tallies: BTreeMap<NaiveDate, HashMap<String, usize>> = BTreeMap::new();

    for record in records {
        let Some(date) = record.event_date() else {
            continue;
        };
        if month.contains(date) {
            add_label_counts(&mut tallies, date, record);
        }
    }

    debug!(%month, active_days = tallies.len(), "bucketed records by day");

    month
        .days()
        .map(|day| BucketRow::zero_filled(day, labels, tallies.get(&day)))
        .collect()
}

pub fn available_months(rows: &[MonthRow]) -> Vec<MonthKey> {
    rows.iter().map(|row| row.bucket).collect()
}

/// Sum of every label count across `rows`.
pub fn view_total<K>(rows: &[BucketRow<K>]) -> usize {
    rows.iter().map(BucketRow::total).sum()
}

pub fn view_total_for<'a, K>(
    rows: &[BucketRow<K>],
    labels: impl IntoIterator<Item = &'a str> + Clone,
) -> usize {
    rows.iter().map(|row| row.total_for(labels.clone())).sum()
}

fn add_label_counts<K: Ord>(
    tallies: &mut BTreeMap<K, HashMap<String, usize>>,
    bucket: K,
    record: &Record,
) {
    let label_counts = tallies.entry(bucket).or_default();
    for label in record.label_set() {
        *label_counts.entry(label.to_string()).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::domain::{MonthKey, Record};

    use super::{
        DateFilter, available_months, bucket_by_day, bucket_by_month, bucket_by_month_filtered,
        extract_labels, view_total, view_total_for,
    };

    fn sample_records() -> Vec<Record> {
        vec![
            Record::new("1", "first", "A,B", Some("2025-01-05T09:00:00"), None),
            Record::new("2", "second", "B", Some("2025-01-05T11:30:00"), None),
            Record::new("3", "third", "A", None, Some("2025-02-10")),
        ]
    }

    #[test]
    fn extracts_sorted_distinct_labels() {
        let mut records = sample_records();
        records.push(Record::new("4", "", " ", None, None));
        records.push(Record::new("5", "", "b, A ,C", Some("garbage"), None));
        let labels = extract_labels(&records);
        assert_eq!(labels.as_slice(), ["A", "B", "C", "b"]);
        assert_eq!(labels, extract_labels(&records));
    }

    #[test]
    fn buckets_months_with_fan_out_and_zero_fill() {
        let records = sample_records();
        let labels = extract_labels(&records);
        let rows = bucket_by_month(&records, &labels);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].bucket.to_string(), "2025-01");
        assert_eq!(rows[0].count("A"), 1);
        assert_eq!(rows[0].count("B"), 2);
        assert_eq!(rows[1].bucket.to_string(), "2025-02");
        assert_eq!(rows[1].count("A"), 1);
        assert_eq!(rows[1].counts.get("B"), Some(&0));
        assert_eq!(view_total(&rows), 4);
    }

    #[test]
    fn orders_months_by_calendar_not_by_text() {
        let records = vec![
            Record::new("1", "", "A", Some("2025-10-01"), None),
            Record::new("2", "", "A", Some("2025-2-01 10:00"), Some("2025-02-03")),
            Record::new("3", "", "A", Some("2024-12-31"), None),
        ];
        let labels = extract_labels(&records);
        let months = available_months(&bucket_by_month(&records, &labels))
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        assert_eq!(months, vec!["2024-12", "2025-02", "2025-10"]);
    }

    #[test]
    fn skips_undated_records_and_counts_duplicate_labels_once() {
        let records = vec![
            Record::new("1", "", "A,A", Some("2025-03-01"), None),
            Record::new("2", "", "A", Some("nope"), Some("")),
        ];
        let labels = extract_labels(&records);
        let rows = bucket_by_month(&records, &labels);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count("A"), 1);
    }

    #[test]
    fn year_filter_limits_monthly_buckets() {
        let records = vec![
            Record::new("1", "", "A", Some("2024-12-31"), None),
            Record::new("2", "", "A", Some("2025-01-01"), None),
        ];
        let labels = extract_labels(&records);
        let rows = bucket_by_month_filtered(&records, &labels, &DateFilter { year: Some(2025) });
        assert_eq!(available_months(&rows), vec![MonthKey::new(2025, 1).unwrap()]);
    }

    #[test]
    fn day_buckets_span_the_full_month() {
        let records = sample_records();
        let labels = extract_labels(&records);
        let january = MonthKey::new(2025, 1).unwrap();
        let rows = bucket_by_day(&records, january, &labels);

        assert_eq!(rows.len(), 31);
        assert_eq!(rows[0].bucket, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(rows[30].bucket, NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
        for row in &rows {
            if row.bucket == NaiveDate::from_ymd_opt(2025, 1, 5).unwrap() {
                assert_eq!((row.count("A"), row.count("B")), (1, 2));
            } else {
                assert_eq!(row.counts.len(), 2);
                assert_eq!(row.total(), 0);
            }
        }
        assert_eq!(view_total_for(&rows, ["B"]), 2);
    }

    #[test]
    fn empty_month_still_yields_every_day() {
        let records = sample_records();
        let labels = extract_labels(&records);
        let rows = bucket_by_day(&records, MonthKey::new(2023, 2).unwrap(), &labels);
        assert_eq!(rows.len(), 28);
        assert!(rows.iter().all(|row| row.total() == 0 && row.counts.len() == 2));

        let rows = bucket_by_day(&records, MonthKey::new(2025, 4).unwrap(), &labels);
        assert_eq!(rows.len(), 30);
        assert_eq!(rows[29].bucket, NaiveDate::from_ymd_opt(2025, 4, 30).unwrap());
        assert!(rows.iter().all(|row| row.total() == 0 && row.counts.len() == 2));
    }

    #[test]
    fn bucketing_is_repeatable() {
        let records = sample_records();
        let labels = extract_labels(&records);
        assert_eq!(bucket_by_month(&records, &labels), bucket_by_month(&records, &labels));

        let january = MonthKey::new(2025, 1).unwrap();
        assert_eq!(
            bucket_by_day(&records, january, &labels),
            bucket_by_day(&records, january, &labels)
        );
    }

    #[test]
    fn serializes_rows_with_nested_counts() {
        let records = sample_records();
        let labels = extract_labels(&records);
        let rows = bucket_by_month(&records, &labels);
        let json = serde_json::to_value(&rows[0]).expect("row should serialize");
        assert_eq!(
            json,
            serde_json::json!({"bucket": "2025-01", "counts": {"A": 1, "B": 2}})
        );
    }

    #[test]
    fn label_named_bucket_keeps_its_count_in_json() {
        let records = vec![Record::new("1", "", "bucket,A", Some("2025-01-05"), None)];
        let labels = extract_labels(&records);
        let rows = bucket_by_month(&records, &labels);
        let json = serde_json::to_string(&rows[0]).expect("row should serialize");
        assert_eq!(json, r#"{"bucket":"2025-01","counts":{"A":1,"bucket":1}}"#);
    }
}
