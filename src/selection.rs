use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;

use crate::aggregate::LabelSet;
use crate::domain::{MonthKey, MonthKeyError};

const ALL_MONTHS: &str = "ALL";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MonthSelection {
    #[default]
    All,
    Month(MonthKey),
}

impl MonthSelection {
    pub fn month(&self) -> Option<MonthKey> {
        match self {
            MonthSelection::All => None,
            MonthSelection::Month(month) => Some(*month),
        }
    }
}

impl Display for MonthSelection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MonthSelection::All => f.write_str(ALL_MONTHS),
            MonthSelection::Month(month) => write!(f, "{month}"),
        }
    }
}

impl FromStr for MonthSelection {
    type Err = MonthKeyError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.trim().eq_ignore_ascii_case(ALL_MONTHS) {
            return Ok(MonthSelection::All);
        }
        input.parse().map(MonthSelection::Month)
    }
}

/// What the chart and the detail list are currently projected onto.
///
/// Picking a month always clears the day and re-selects every label, so a
/// filter from one month never leaks into the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    month: MonthSelection,
    labels: BTreeSet<String>,
    day: Option<NaiveDate>,
}

impl SelectionState {
    pub fn new(all_labels: &LabelSet) -> Self {
        Self {
            month: MonthSelection::All,
            labels: full_selection(all_labels),
            day: None,
        }
    }

    pub fn month(&self) -> MonthSelection {
        self.month
    }

    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    pub fn day(&self) -> Option<NaiveDate> {
        self.day
    }

    pub fn is_label_selected(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn all_selected(&self, all_labels: &LabelSet) -> bool {
        self.labels.len() == all_labels.len()
            && all_labels.iter().all(|label| self.labels.contains(label))
    }

    pub fn select_month(&mut self, month: MonthSelection, all_labels: &LabelSet) {
        self.month = month;
        self.day = None;
        self.labels = full_selection(all_labels);
    }

    pub fn toggle_label(&mut self, label: &str) {
        if !self.labels.remove(label) {
            self.labels.insert(label.to_string());
        }
    }

    pub fn toggle_select_all(&mut self, all_labels: &LabelSet) {
        if self.all_selected(all_labels) {
            self.labels.clear();
        } else {
            self.labels = full_selection(all_labels);
        }
    }

    /// Drills into `day`. Ignored while every month is shown or when the day
    /// lies outside the selected month; returns whether the day was taken.
    pub fn select_day(&mut self, day: NaiveDate) -> bool {
        match self.month {
            MonthSelection::Month(month) if month.contains(day) => {
                self.day = Some(day);
                true
            }
            _ => false,
        }
    }
}

fn full_selection(all_labels: &LabelSet) -> BTreeSet<String> {
    all_labels.iter().map(str::to_string).collect()
}
