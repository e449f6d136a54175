use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];
const OFFSET_DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

/// One exported VOC entry.
///
/// `label_csv` is a set of labels serialized as a comma-separated string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "chatId", deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "chatText", default, deserialize_with = "deserialize_text")]
    pub text: String,
    #[serde(rename = "label", default, deserialize_with = "deserialize_text")]
    pub label_csv: String,
    #[serde(
        rename = "latestUserDate",
        default,
        deserialize_with = "deserialize_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub latest_user_date: Option<String>,
    #[serde(
        rename = "firstUserDate",
        default,
        deserialize_with = "deserialize_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub first_user_date: Option<String>,
}

impl Record {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        label_csv: impl Into<String>,
        latest_user_date: Option<&str>,
        first_user_date: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            label_csv: label_csv.into(),
            latest_user_date: latest_user_date.map(str::to_string),
            first_user_date: first_user_date.map(str::to_string),
        }
    }

    /// Labels in the order they are written, blanks dropped. May repeat.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        split_labels(&self.label_csv)
    }

    /// Distinct labels of this record.
    pub fn label_set(&self) -> BTreeSet<&str> {
        self.labels().collect()
    }

    /// Latest activity when it parses, otherwise first activity.
    pub fn event_time(&self) -> Option<NaiveDateTime> {
        self.latest_user_date
            .as_deref()
            .and_then(parse_event_time)
            .or_else(|| self.first_user_date.as_deref().and_then(parse_event_time))
    }

    pub fn event_date(&self) -> Option<NaiveDate> {
        self.event_time().map(|time| time.date())
    }

    pub fn short_text(&self) -> &str {
        self.text.lines().next().unwrap_or("")
    }
}

/// The loaded export. Never mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn undated_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.event_time().is_none())
            .count()
    }
}

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey(NaiveDate);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid month '{input}', expected YYYY-MM")]
pub struct MonthKeyError {
    input: String,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    pub fn of(date: NaiveDate) -> Self {
        Self(date.with_day0(0).unwrap_or(date))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year() && date.month() == self.month()
    }

    /// Every calendar day of the month, first to last.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let month = *self;
        self.0.iter_days().take_while(move |day| month.contains(*day))
    }

    pub fn days_in_month(&self) -> u32 {
        self.days().count() as u32
    }
}

impl Display for MonthKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for MonthKey {
    type Err = MonthKeyError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || MonthKeyError {
            input: input.to_string(),
        };
        let (year, month) = input.trim().split_once('-').ok_or_else(invalid)?;
        if year.is_empty() || month.is_empty() || month.len() > 2 {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        MonthKey::new(year, month).ok_or_else(invalid)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn split_labels(label_csv: &str) -> impl Iterator<Item = &str> {
    label_csv
        .split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
}

/// Parses an export timestamp into its written wall-clock time.
///
/// Offsets are kept as written, not converted.
pub fn parse_event_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.naive_local());
    }

    for format in OFFSET_DATE_TIME_FORMATS {
        if let Ok(timestamp) = DateTime::parse_from_str(raw, format) {
            return Some(timestamp.naive_local());
        }
    }

    for format in DATE_TIME_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(timestamp);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
}

fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(value) => value,
        RawId::Integer(value) => value.to_string(),
        RawId::Unsigned(value) => value.to_string(),
        RawId::Float(value) => value.to_string(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDate {
    Text(String),
    EpochMillis(i64),
    Other(IgnoredAny),
}

/// Date fields never fail a load: numbers are epoch milliseconds, and any
/// other non-string value is treated as missing.
fn deserialize_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Option::<RawDate>::deserialize(deserializer)? {
        Some(RawDate::Text(value)) => Some(value),
        Some(RawDate::EpochMillis(millis)) => DateTime::from_timestamp_millis(millis)
            .map(|timestamp| timestamp.naive_utc().format("%Y-%m-%dT%H:%M:%S%.3f").to_string()),
        Some(RawDate::Other(_)) | None => None,
    })
}

fn deserialize_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Timelike};

    use super::{MonthKey, Record, parse_event_time};

    #[test]
    fn resolves_latest_date_before_first_date() {
        let record = Record::new(
            "1",
            "hello",
            "A",
            Some("2025-03-02T08:15:00"),
            Some("2025-02-27"),
        );
        assert_eq!(
            record.event_date(),
            NaiveDate::from_ymd_opt(2025, 3, 2)
        );

        let fallback = Record::new("2", "hello", "A", Some("not a date"), Some("2025-02-27"));
        assert_eq!(
            fallback.event_date(),
            NaiveDate::from_ymd_opt(2025, 2, 27)
        );

        let undated = Record::new("3", "hello", "A", None, Some(""));
        assert_eq!(undated.event_time(), None);
    }

    #[test]
    fn keeps_written_wall_clock_for_offset_timestamps() {
        let time = parse_event_time("2025-01-31T23:30:00+09:00").expect("rfc3339 should parse");
        assert_eq!(time.date(), NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
        assert_eq!(time.hour(), 23);

        let time = parse_event_time("2025-01-05 10:00:00.250").expect("space separated should parse");
        assert_eq!(time.minute(), 0);
        assert!(parse_event_time("2025/01/05").is_some());
        assert!(parse_event_time("2025-13-01").is_none());
    }

    #[test]
    fn splits_labels_and_drops_blanks() {
        let record = Record::new("1", "", " A , B,, ", None, None);
        assert_eq!(record.labels().collect::<Vec<_>>(), vec!["A", "B"]);
        let blank = Record::new("2", "", "   ", None, None);
        assert_eq!(blank.labels().count(), 0);
    }

    #[test]
    fn month_keys_sort_chronologically() {
        let feb: MonthKey = "2025-2".parse().expect("single digit month should parse");
        let oct: MonthKey = "2025-10".parse().expect("month should parse");
        assert!(feb < oct);
        assert_eq!(feb.to_string(), "2025-02");
        assert!("2025".parse::<MonthKey>().is_err());
        assert!("2025-13".parse::<MonthKey>().is_err());
        assert!("abcd-01".parse::<MonthKey>().is_err());
    }

    #[test]
    fn month_days_cover_the_whole_month() {
        let leap = MonthKey::new(2024, 2).unwrap();
        assert_eq!(leap.days_in_month(), 29);
        let days = leap.days().collect::<Vec<_>>();
        assert_eq!(days.first(), NaiveDate::from_ymd_opt(2024, 2, 1).as_ref());
        assert_eq!(days.last(), NaiveDate::from_ymd_opt(2024, 2, 29).as_ref());
        assert_eq!(MonthKey::new(2025, 12).unwrap().days_in_month(), 31);
    }

    #[test]
    fn accepts_numeric_ids_and_null_fields() {
        let record: Record = serde_json::from_str(
            r#"{"chatId": 42, "chatText": null, "label": null, "latestUserDate": "2025-01-05"}"#,
        )
        .expect("record should decode");
        assert_eq!(record.id, "42");
        assert_eq!(record.text, "");
        assert_eq!(record.label_csv, "");
        assert_eq!(record.first_user_date, None);
    }

    #[test]
    fn keeps_large_unsigned_ids_exact() {
        let record: Record =
            serde_json::from_str(r#"{"chatId": 18446744073709551615}"#).expect("record should decode");
        assert_eq!(record.id, "18446744073709551615");
    }

    #[test]
    fn reads_numeric_dates_as_epoch_millis_and_ignores_other_types() {
        let record: Record = serde_json::from_str(
            r#"{"chatId": "1", "latestUserDate": 1736035200000, "firstUserDate": {"at": "2025-01-01"}}"#,
        )
        .expect("record should decode");
        assert_eq!(record.latest_user_date.as_deref(), Some("2025-01-05T00:00:00.000"));
        assert_eq!(record.first_user_date, None);
        assert_eq!(record.event_date(), NaiveDate::from_ymd_opt(2025, 1, 5));

        let record: Record =
            serde_json::from_str(r#"{"chatId": "2", "latestUserDate": true, "firstUserDate": [1, 2]}"#)
                .expect("record should decode");
        assert_eq!(record.event_time(), None);
    }
}
