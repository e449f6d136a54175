use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Record;
use crate::selection::SelectionState;

/// Ordering of the drill-down list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Chronological,
    Label,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort key '{0}', expected 'chronological' or 'label'")]
pub struct SortKeyError(String);

impl SortKey {
    pub fn next(self) -> Self {
        match self {
            SortKey::Chronological => SortKey::Label,
            SortKey::Label => SortKey::Chronological,
        }
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SortKey::Chronological => f.write_str("chronological"),
            SortKey::Label => f.write_str("label"),
        }
    }
}

impl FromStr for SortKey {
    type Err = SortKeyError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "chronological" | "time" | "date" => Ok(SortKey::Chronological),
            "label" | "labels" => Ok(SortKey::Label),
            _ => Err(SortKeyError(input.to_string())),
        }
    }
}

pub fn filter_details<'a>(
    records: &'a [Record],
    selection: &SelectionState,
    sort_key: SortKey,
) -> Vec<&'a Record> {
    matching_indices(records, selection, sort_key)
        .into_iter()
        .map(|index| &records[index])
        .collect()
}

/// Store positions of the records on the selected day that carry at least one
/// selected label, sorted stably by `sort_key`.
///
/// Empty until a day is picked; an empty label selection matches nothing.
pub fn matching_indices(
    records: &[Record],
    selection: &SelectionState,
    sort_key: SortKey,
) -> Vec<usize> {
    let Some(day) = selection.day() else {
        return Vec::new();
    };
    if selection.labels().is_empty() {
        return Vec::new();
    }

    let mut matches = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let time = record.event_time()?;
            if time.date() != day {
                return None;
            }
            record
                .labels()
                .any(|label| selection.is_label_selected(label))
                .then_some((index, time))
        })
        .collect::<Vec<(usize, NaiveDateTime)>>();

    match sort_key {
        SortKey::Chronological => matches.sort_by_key(|(_, time)| *time),
        SortKey::Label => matches.sort_by(|left, right| {
            records[left.0].label_csv.cmp(&records[right.0].label_csv)
        }),
    }

    matches.into_iter().map(|(index, _)| index).collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::aggregate::extract_labels;
    use crate::domain::{MonthKey, Record};
    use crate::selection::{MonthSelection, SelectionState};

    use super::{SortKey, filter_details};

    fn records() -> Vec<Record> {
        vec![
            Record::new("1", "late", "A,B", Some("2025-01-05T18:00:00"), None),
            Record::new("2", "early", "B", Some("2025-01-05T08:00:00"), None),
            Record::new("3", "other day", "A", Some("2025-01-06T09:00:00"), None),
            Record::new("4", "same label", "A,B", None, Some("2025-01-05T07:00:00")),
            Record::new("5", "unlabelled", "", Some("2025-01-05T12:00:00"), None),
        ]
    }

    fn selection_on_day(records: &[Record]) -> SelectionState {
        let labels = extract_labels(records);
        let mut selection = SelectionState::new(&labels);
        selection.select_month(MonthSelection::Month(MonthKey::new(2025, 1).unwrap()), &labels);
        selection.select_day(NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
        selection
    }

    fn ids(records: &[&Record]) -> Vec<String> {
        records.iter().map(|record| record.id.clone()).collect()
    }

    #[test]
    fn nothing_is_listed_before_a_day_is_picked() {
        let records = records();
        let labels = extract_labels(&records);
        let selection = SelectionState::new(&labels);
        assert!(filter_details(&records, &selection, SortKey::Chronological).is_empty());
    }

    #[test]
    fn lists_records_sharing_any_selected_label() {
        let records = records();
        let mut selection = selection_on_day(&records);
        selection.toggle_label("A");

        let details = filter_details(&records, &selection, SortKey::Chronological);
        assert_eq!(ids(&details), vec!["4", "2", "1"]);
    }

    #[test]
    fn empty_label_selection_lists_nothing() {
        let records = records();
        let labels = extract_labels(&records);
        let mut selection = selection_on_day(&records);
        selection.toggle_select_all(&labels);
        assert!(selection.labels().is_empty());
        assert!(filter_details(&records, &selection, SortKey::Label).is_empty());
    }

    #[test]
    fn label_sort_is_stable_for_equal_label_strings() {
        let records = records();
        let selection = selection_on_day(&records);
        let details = filter_details(&records, &selection, SortKey::Label);
        assert_eq!(ids(&details), vec!["1", "4", "2"]);
    }

    #[test]
    fn parses_sort_keys() {
        assert_eq!("label".parse::<SortKey>(), Ok(SortKey::Label));
        assert_eq!(" Chronological ".parse::<SortKey>(), Ok(SortKey::Chronological));
        assert!("size".parse::<SortKey>().is_err());
        assert_eq!(SortKey::Label.next(), SortKey::Chronological);
    }
}
