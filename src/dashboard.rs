use std::fmt::{Display, Formatter};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::aggregate::{
    DateFilter, DayRow, LabelSet, MonthRow, available_months, bucket_by_day,
    bucket_by_month_filtered, extract_labels, view_total, view_total_for,
};
use crate::details::{SortKey, matching_indices};
use crate::domain::{MonthKey, Record, RecordStore};
use crate::selection::{MonthSelection, SelectionState};

#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardOptions {
    pub filter: DateFilter,
    pub sort_key: SortKey,
}

/// Inputs accepted from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    SelectMonth(MonthSelection),
    ToggleLabel(String),
    ToggleSelectAll,
    SelectDay(NaiveDate),
    SetSortKey(SortKey),
}

/// Informational states shown instead of an empty chart or list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    NoLabelsSelected,
    PickMonth,
    PickDay,
    NoMatches,
}

impl Display for Notice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            Notice::NoLabelsSelected => "Select at least one label",
            Notice::PickMonth => "Pick a month to drill into its days",
            Notice::PickDay => "Pick a day on the chart to list its records",
            Notice::NoMatches => "No records match the selected day and labels",
        };
        f.write_str(message)
    }
}

/// Rows currently feeding the chart.
#[derive(Debug, Clone, Copy)]
pub enum ChartRows<'a> {
    Monthly(&'a [MonthRow]),
    Daily(&'a [DayRow]),
}

impl ChartRows<'_> {
    pub fn len(&self) -> usize {
        match self {
            ChartRows::Monthly(rows) => rows.len(),
            ChartRows::Daily(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, index: usize, label: &str) -> usize {
        match self {
            ChartRows::Monthly(rows) => rows.get(index).map_or(0, |row| row.count(label)),
            ChartRows::Daily(rows) => rows.get(index).map_or(0, |row| row.count(label)),
        }
    }

    /// Axis text for each bucket: `YYYY-MM` for months, `DD` for days.
    pub fn bucket_labels(&self) -> Vec<String> {
        match self {
            ChartRows::Monthly(rows) => rows.iter().map(|row| row.bucket.to_string()).collect(),
            ChartRows::Daily(rows) => rows
                .iter()
                .map(|row| row.bucket.format("%d").to_string())
                .collect(),
        }
    }

    pub fn day_at(&self, index: usize) -> Option<NaiveDate> {
        match self {
            ChartRows::Monthly(_) => None,
            ChartRows::Daily(rows) => rows.get(index).map(|row| row.bucket),
        }
    }

    pub fn max_count<'l>(&self, labels: impl IntoIterator<Item = &'l str> + Clone) -> usize {
        (0..self.len())
            .flat_map(|index| {
                labels
                    .clone()
                    .into_iter()
                    .map(move |label| self.count(index, label))
            })
            .max()
            .unwrap_or(0)
    }
}

/// Owns the record store and the selection, and keeps every derived view in
/// step with the selection. Each `apply` finishes its recompute before it
/// returns.
#[derive(Debug, Clone)]
pub struct Dashboard {
    store: RecordStore,
    filter: DateFilter,
    labels: LabelSet,
    monthly: Vec<MonthRow>,
    daily: Vec<DayRow>,
    selection: SelectionState,
    sort_key: SortKey,
    detail_indices: Vec<usize>,
}

impl Dashboard {
    pub fn new(store: RecordStore, options: DashboardOptions) -> Self {
        let labels = extract_labels(store.records());
        let monthly = bucket_by_month_filtered(store.records(), &labels, &options.filter);
        let selection = SelectionState::new(&labels);
        let undated = store.undated_count();

        if undated > 0 {
            warn!(undated, "records without a parseable date are left out of the charts");
        }
        info!(
            records = store.len(),
            undated,
            labels = labels.len(),
            months = monthly.len(),
            "dashboard ready"
        );

        Self {
            store,
            filter: options.filter,
            labels,
            monthly,
            daily: Vec::new(),
            selection,
            sort_key: options.sort_key,
            detail_indices: Vec::new(),
        }
    }

    pub fn apply(&mut self, event: DashboardEvent) {
        debug!(?event, "applying dashboard event");
        match event {
            DashboardEvent::SelectMonth(month) => {
                self.selection.select_month(month, &self.labels);
                self.recompute_daily();
            }
            DashboardEvent::ToggleLabel(label) => self.selection.toggle_label(&label),
            DashboardEvent::ToggleSelectAll => self.selection.toggle_select_all(&self.labels),
            DashboardEvent::SelectDay(day) => {
                if !self.selection.select_day(day) {
                    debug!(%day, month = %self.selection.month(), "ignored day outside the selected month");
                }
            }
            DashboardEvent::SetSortKey(sort_key) => self.sort_key = sort_key,
        }
        self.recompute_details();
    }

    fn recompute_daily(&mut self) {
        self.daily = match self.selection.month() {
            MonthSelection::All => Vec::new(),
            MonthSelection::Month(month) => bucket_by_day(self.store.records(), month, &self.labels),
        };
    }

    fn recompute_details(&mut self) {
        self.detail_indices = matching_indices(self.store.records(), &self.selection, self.sort_key);
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn filter(&self) -> DateFilter {
        self.filter
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn monthly_rows(&self) -> &[MonthRow] {
        &self.monthly
    }

    pub fn daily_rows(&self) -> &[DayRow] {
        &self.daily
    }

    pub fn chart_rows(&self) -> ChartRows<'_> {
        match self.selection.month() {
            MonthSelection::All => ChartRows::Monthly(&self.monthly),
            MonthSelection::Month(_) => ChartRows::Daily(&self.daily),
        }
    }

    pub fn months(&self) -> Vec<MonthKey> {
        available_months(&self.monthly)
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    /// Selected labels in label-set order; these are the chart series.
    pub fn visible_series(&self) -> Vec<&str> {
        self.labels
            .iter()
            .filter(|label| self.selection.is_label_selected(label))
            .collect()
    }

    pub fn details(&self) -> impl Iterator<Item = &Record> {
        let records = self.store.records();
        self.detail_indices.iter().map(move |index| &records[*index])
    }

    pub fn detail_count(&self) -> usize {
        self.detail_indices.len()
    }

    /// Every label count in the current chart view, fan-out included.
    pub fn chart_total(&self) -> usize {
        match self.chart_rows() {
            ChartRows::Monthly(rows) => view_total(rows),
            ChartRows::Daily(rows) => view_total(rows),
        }
    }

    pub fn visible_total(&self) -> usize {
        let series = self.visible_series();
        match self.chart_rows() {
            ChartRows::Monthly(rows) => view_total_for(rows, series.iter().copied()),
            ChartRows::Daily(rows) => view_total_for(rows, series.iter().copied()),
        }
    }

    pub fn notice(&self) -> Option<Notice> {
        if self.selection.labels().is_empty() {
            return Some(Notice::NoLabelsSelected);
        }
        if self.selection.month() == MonthSelection::All {
            return Some(Notice::PickMonth);
        }
        if self.selection.day().is_none() {
            return Some(Notice::PickDay);
        }
        if self.detail_indices.is_empty() {
            return Some(Notice::NoMatches);
        }
        None
    }
}
