use std::error::Error;
use std::io;
use std::time::Duration as StdDuration;

use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
	Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, List, ListItem, ListState,
	Paragraph, Wrap,
};
use ratatui::{Frame, Terminal};
use tracing::{debug, info};

use crate::config::ChartStyle;
use crate::dashboard::{ChartRows, Dashboard, DashboardEvent};
use crate::domain::Record;
use crate::selection::MonthSelection;

const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_PANEL_BORDER_COLOR: Color = Color::DarkGray;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);
const SERIES_HUE_STEP: u16 = 47;
const SERIES_SATURATION: f64 = 0.7;
const SERIES_LIGHTNESS: f64 = 0.5;

pub fn run_dashboard(dashboard: &mut Dashboard, chart_style: ChartStyle) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, dashboard, chart_style);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	dashboard: &mut Dashboard,
	chart_style: ChartStyle,
) -> Result<(), Box<dyn Error>> {
	let mut app = App::new(chart_style);
	info!("dashboard started");

	loop {
		app.clamp_selection(dashboard);
		terminal.draw(|frame| draw_dashboard(frame, &app, dashboard))?;

		if event::poll(StdDuration::from_millis(250))? {
			if let CEvent::Key(key) = event::read()? {
				if key.kind != KeyEventKind::Press {
					continue;
				}

				if handle_key(&mut app, key.code, dashboard) {
					break;
				}
			}
		}
	}

	info!("dashboard closed");
	Ok(())
}

fn draw_dashboard(frame: &mut Frame, app: &App, dashboard: &Dashboard) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Length(3), Constraint::Min(12), Constraint::Length(4)])
		.split(frame.area());

	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints([Constraint::Percentage(22), Constraint::Percentage(78)])
		.split(layout[1]);

	let right = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
		.split(body[1]);

	render_month_bar(frame, layout[0], app, dashboard);
	render_label_panel(frame, body[0], app, dashboard);
	render_chart_panel(frame, right[0], app, dashboard);
	render_detail_panel(frame, right[1], app, dashboard);
	render_footer(frame, layout[2], app, dashboard);
}

fn render_month_bar(frame: &mut Frame, area: Rect, app: &App, dashboard: &Dashboard) {
	let selected = dashboard.selection().month();
	let mut spans = Vec::new();
	for (index, option) in month_options(dashboard).into_iter().enumerate() {
		let mut style = Style::default();
		if option == selected {
			style = style.fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD);
		}
		if app.focus == FocusPane::Months && index == app.month_cursor {
			style = style.add_modifier(Modifier::UNDERLINED);
		}
		spans.push(Span::styled(format!(" {option} "), style));
		spans.push(Span::raw(" "));
	}

	let block = Block::default()
		.borders(Borders::ALL)
		.title(format!("Period: {selected}"))
		.border_style(border_style(app.focus == FocusPane::Months));
	frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_label_panel(frame: &mut Frame, area: Rect, app: &App, dashboard: &Dashboard) {
	let selection = dashboard.selection();
	let items = dashboard
		.labels()
		.iter()
		.enumerate()
		.map(|(index, label)| {
			let mark = if selection.is_label_selected(label) { "[x]" } else { "[ ]" };
			ListItem::new(Line::from(vec![
				Span::raw(format!("{mark} ")),
				Span::styled(label.to_string(), Style::default().fg(series_color(index))),
			]))
		})
		.collect::<Vec<_>>();

	let mut state = ListState::default();
	if !items.is_empty() {
		state.select(Some(app.label_cursor.min(items.len() - 1)));
	}

	let title = format!(
		"Labels {}/{}",
		selection.labels().len(),
		dashboard.labels().len()
	);
	let list = List::new(if items.is_empty() {
		vec![ListItem::new("(no labels)")]
	} else {
		items
	})
	.block(
		Block::default()
			.borders(Borders::ALL)
			.title(title)
			.border_style(border_style(app.focus == FocusPane::Labels)),
	)
	.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));

	frame.render_stateful_widget(list, area, &mut state);
}

fn render_chart_panel(frame: &mut Frame, area: Rect, app: &App, dashboard: &Dashboard) {
	let rows = dashboard.chart_rows();
	let series = dashboard.visible_series();
	let cursor = app.chart_cursor.min(rows.len().saturating_sub(1));
	let cursor_text = rows.bucket_labels().get(cursor).cloned().unwrap_or_default();
	let title = format!(
		"{} VOC ({}) | shown {} | cursor {}",
		dashboard.selection().month(),
		dashboard.chart_total(),
		dashboard.visible_total(),
		cursor_text
	);
	let block = Block::default()
		.borders(Borders::ALL)
		.title(title)
		.border_style(border_style(app.focus == FocusPane::Chart));

	if series.is_empty() || rows.is_empty() {
		let message = if series.is_empty() {
			"Select at least one label"
		} else {
			"No dated records to chart"
		};
		let placeholder = Paragraph::new(message)
			.style(Style::default().fg(Color::DarkGray))
			.wrap(Wrap { trim: true })
			.block(block);
		frame.render_widget(placeholder, area);
		return;
	}

	match app.chart_style {
		ChartStyle::Line => render_line_chart(frame, area, block, dashboard, rows, &series, cursor),
		ChartStyle::Bar => render_bar_chart(frame, area, block, dashboard, rows, &series, cursor),
	}
}

fn render_line_chart(
	frame: &mut Frame,
	area: Rect,
	block: Block,
	dashboard: &Dashboard,
	rows: ChartRows,
	series: &[&str],
	cursor: usize,
) {
	let max_count = rows.max_count(series.iter().copied()).max(1) as f64;
	let points = series
		.iter()
		.map(|label| {
			(0..rows.len())
				.map(|index| (index as f64, rows.count(index, label) as f64))
				.collect::<Vec<_>>()
		})
		.collect::<Vec<_>>();
	let cursor_points = [(cursor as f64, max_count)];

	let mut datasets = series
		.iter()
		.zip(points.iter())
		.map(|(label, data)| {
			let color = series_color(dashboard.labels().index_of(label).unwrap_or(0));
			Dataset::default()
				.name(label.to_string())
				.marker(Marker::Braille)
				.graph_type(GraphType::Line)
				.style(Style::default().fg(color))
				.data(data)
		})
		.collect::<Vec<_>>();
	datasets.push(
		Dataset::default()
			.marker(Marker::Dot)
			.graph_type(GraphType::Bar)
			.style(Style::default().fg(Color::DarkGray))
			.data(&cursor_points),
	);

	let x_labels = axis_labels(&rows.bucket_labels());
	let chart = Chart::new(datasets)
		.block(block)
		.x_axis(
			Axis::default()
				.style(Style::default().fg(Color::Gray))
				.bounds([0.0, rows.len().saturating_sub(1).max(1) as f64])
				.labels(x_labels),
		)
		.y_axis(
			Axis::default()
				.style(Style::default().fg(Color::Gray))
				.bounds([0.0, max_count])
				.labels(vec!["0".to_string(), format!("{}", max_count as usize)]),
		);
	frame.render_widget(chart, area);
}

fn render_bar_chart(
	frame: &mut Frame,
	area: Rect,
	block: Block,
	dashboard: &Dashboard,
	rows: ChartRows,
	series: &[&str],
	cursor: usize,
) {
	let bucket_labels = rows.bucket_labels();
	let mut chart = BarChart::default()
		.block(block)
		.bar_width(1)
		.bar_gap(0)
		.group_gap(1);

	for (index, bucket) in bucket_labels.iter().enumerate() {
		let bars = series
			.iter()
			.map(|label| {
				let color = series_color(dashboard.labels().index_of(label).unwrap_or(0));
				Bar::default()
					.value(rows.count(index, label) as u64)
					.text_value(String::new())
					.style(Style::default().fg(color))
			})
			.collect::<Vec<_>>();
		let label_style = if index == cursor {
			Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
		} else {
			Style::default()
		};
		chart = chart.data(
			BarGroup::default()
				.label(Line::styled(bucket.clone(), label_style))
				.bars(&bars),
		);
	}

	frame.render_widget(chart, area);
}

fn render_detail_panel(frame: &mut Frame, area: Rect, app: &App, dashboard: &Dashboard) {
	let selection = dashboard.selection();
	let title = match selection.day() {
		Some(day) => format!(
			"{} | {} records | sort {}",
			day.format("%A, %d %B %Y"),
			dashboard.detail_count(),
			dashboard.sort_key()
		),
		None => format!("Records | sort {}", dashboard.sort_key()),
	};
	let block = Block::default()
		.borders(Borders::ALL)
		.title(title)
		.border_style(border_style(app.focus == FocusPane::Details));

	if let Some(notice) = dashboard.notice() {
		let placeholder = Paragraph::new(notice.to_string())
			.style(Style::default().fg(Color::DarkGray))
			.block(block);
		frame.render_widget(placeholder, area);
		return;
	}

	let items = dashboard
		.details()
		.map(|record| ListItem::new(render_detail_line(record, dashboard)))
		.collect::<Vec<_>>();
	let mut state = ListState::default();
	if !items.is_empty() {
		state.select(Some(app.detail_index.min(items.len() - 1)));
	}

	let list = List::new(items)
		.block(block)
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));
	frame.render_stateful_widget(list, area, &mut state);
}

fn render_detail_line(record: &Record, dashboard: &Dashboard) -> Line<'static> {
	let time = record
		.event_time()
		.map(|time| time.format("%H:%M").to_string())
		.unwrap_or_else(|| "--:--".to_string());

	let mut spans = vec![
		Span::styled(format!("{time} "), Style::default().fg(Color::DarkGray)),
		Span::raw(format!("{} | ", record.id)),
	];
	for (position, label) in record.labels().enumerate() {
		if position > 0 {
			spans.push(Span::raw(","));
		}
		let color = dashboard
			.labels()
			.index_of(label)
			.map(series_color)
			.unwrap_or(Color::Gray);
		spans.push(Span::styled(label.to_string(), Style::default().fg(color)));
	}
	spans.push(Span::raw(format!(" | {}", record.short_text())));

	Line::from(spans)
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App, dashboard: &Dashboard) {
	let drill_hint = match dashboard.selection().month() {
		MonthSelection::All => "Enter on chart needs a month",
		MonthSelection::Month(_) => "Enter on chart lists that day",
	};
	let footer_lines = vec![
		Line::from("Tab pane | arrows/hjkl move | Enter/space select or toggle | a all labels | s sort | c chart style | q quit"),
		Line::from(format!("{} | {}", app.status, drill_hint)),
	];

	let footer = Paragraph::new(footer_lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn axis_labels(buckets: &[String]) -> Vec<String> {
	match buckets.len() {
		0 => Vec::new(),
		1 => vec![buckets[0].clone()],
		len => {
			let middle = len / 2;
			vec![
				buckets[0].clone(),
				buckets[middle].clone(),
				buckets[len - 1].clone(),
			]
		}
	}
}

fn handle_key(app: &mut App, code: KeyCode, dashboard: &mut Dashboard) -> bool {
	match code {
		KeyCode::Char('q') | KeyCode::Esc => true,
		KeyCode::Tab => {
			app.focus = app.focus.next();
			false
		}
		KeyCode::BackTab => {
			app.focus = app.focus.prev();
			false
		}
		KeyCode::Char('a') => {
			dashboard.apply(DashboardEvent::ToggleSelectAll);
			app.status = format!(
				"{} of {} labels selected",
				dashboard.selection().labels().len(),
				dashboard.labels().len()
			);
			false
		}
		KeyCode::Char('s') => {
			let next = dashboard.sort_key().next();
			dashboard.apply(DashboardEvent::SetSortKey(next));
			app.detail_index = 0;
			app.status = format!("Sorted records by {next}");
			false
		}
		KeyCode::Char('c') => {
			app.chart_style = app.chart_style.toggled();
			false
		}
		KeyCode::Left | KeyCode::Char('h') => {
			match app.focus {
				FocusPane::Months => app.month_cursor = app.month_cursor.saturating_sub(1),
				FocusPane::Chart => app.chart_cursor = app.chart_cursor.saturating_sub(1),
				FocusPane::Labels | FocusPane::Details => {}
			}
			false
		}
		KeyCode::Right | KeyCode::Char('l') => {
			match app.focus {
				FocusPane::Months => app.month_cursor += 1,
				FocusPane::Chart => app.chart_cursor += 1,
				FocusPane::Labels | FocusPane::Details => {}
			}
			app.clamp_selection(dashboard);
			false
		}
		KeyCode::Up | KeyCode::Char('k') => {
			match app.focus {
				FocusPane::Labels => app.label_cursor = app.label_cursor.saturating_sub(1),
				FocusPane::Details => app.detail_index = app.detail_index.saturating_sub(1),
				FocusPane::Months | FocusPane::Chart => {}
			}
			false
		}
		KeyCode::Down | KeyCode::Char('j') => {
			match app.focus {
				FocusPane::Labels => app.label_cursor += 1,
				FocusPane::Details => app.detail_index += 1,
				FocusPane::Months | FocusPane::Chart => {}
			}
			app.clamp_selection(dashboard);
			false
		}
		KeyCode::Enter | KeyCode::Char(' ') => {
			match app.focus {
				FocusPane::Months => select_month_at_cursor(app, dashboard),
				FocusPane::Labels => toggle_label_at_cursor(app, dashboard),
				FocusPane::Chart => select_day_at_cursor(app, dashboard),
				FocusPane::Details => {}
			}
			false
		}
		_ => false,
	}
}

fn select_month_at_cursor(app: &mut App, dashboard: &mut Dashboard) {
	let Some(option) = month_options(dashboard).get(app.month_cursor).copied() else {
		return;
	};
	dashboard.apply(DashboardEvent::SelectMonth(option));
	app.chart_cursor = 0;
	app.detail_index = 0;
	app.label_cursor = 0;
	app.status = format!("Showing {option}");
}

fn toggle_label_at_cursor(app: &mut App, dashboard: &mut Dashboard) {
	let Some(label) = dashboard.labels().as_slice().get(app.label_cursor).cloned() else {
		return;
	};
	dashboard.apply(DashboardEvent::ToggleLabel(label.clone()));
	app.detail_index = 0;
	app.status = if dashboard.selection().is_label_selected(&label) {
		format!("Showing {label}")
	} else {
		format!("Hiding {label}")
	};
}

fn select_day_at_cursor(app: &mut App, dashboard: &mut Dashboard) {
	let Some(day) = dashboard.chart_rows().day_at(app.chart_cursor) else {
		app.status = "Pick a month first to drill into days".to_string();
		return;
	};
	dashboard.apply(DashboardEvent::SelectDay(day));
	app.detail_index = 0;
	app.status = format!("{} records on {}", dashboard.detail_count(), day.format("%Y-%m-%d"));
	debug!(%day, records = dashboard.detail_count(), "drilled into day");
}

fn month_options(dashboard: &Dashboard) -> Vec<MonthSelection> {
	std::iter::once(MonthSelection::All)
		.chain(dashboard.months().into_iter().map(MonthSelection::Month))
		.collect()
}

fn border_style(focused: bool) -> Style {
	if focused {
		Style::default()
			.fg(FOCUSED_PANEL_BORDER_COLOR)
			.add_modifier(Modifier::BOLD)
	} else {
		Style::default().fg(INACTIVE_PANEL_BORDER_COLOR)
	}
}

/// Stable per-label colour: hue steps by 47 degrees along the label order.
fn series_color(index: usize) -> Color {
	let hue = ((index as u64 * SERIES_HUE_STEP as u64) % 360) as f64;
	let (red, green, blue) = hsl_to_rgb(hue, SERIES_SATURATION, SERIES_LIGHTNESS);
	Color::Rgb(red, green, blue)
}

fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> (u8, u8, u8) {
	let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
	let sector = hue / 60.0;
	let secondary = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
	let (red, green, blue) = match sector as u32 {
		0 => (chroma, secondary, 0.0),
		1 => (secondary, chroma, 0.0),
		2 => (0.0, chroma, secondary),
		3 => (0.0, secondary, chroma),
		4 => (secondary, 0.0, chroma),
		_ => (chroma, 0.0, secondary),
	};
	let offset = lightness - chroma / 2.0;
	let channel = |value: f64| ((value + offset) * 255.0).round().clamp(0.0, 255.0) as u8;
	(channel(red), channel(green), channel(blue))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusPane {
	Months,
	Labels,
	Chart,
	Details,
}

impl FocusPane {
	fn next(self) -> Self {
		match self {
			FocusPane::Months => FocusPane::Labels,
			FocusPane::Labels => FocusPane::Chart,
			FocusPane::Chart => FocusPane::Details,
			FocusPane::Details => FocusPane::Months,
		}
	}

	fn prev(self) -> Self {
		match self {
			FocusPane::Months => FocusPane::Details,
			FocusPane::Labels => FocusPane::Months,
			FocusPane::Chart => FocusPane::Labels,
			FocusPane::Details => FocusPane::Chart,
		}
	}
}

#[derive(Debug, Clone)]
struct App {
	focus: FocusPane,
	month_cursor: usize,
	label_cursor: usize,
	chart_cursor: usize,
	detail_index: usize,
	chart_style: ChartStyle,
	status: String,
}

impl App {
	fn new(chart_style: ChartStyle) -> Self {
		Self {
			focus: FocusPane::Months,
			month_cursor: 0,
			label_cursor: 0,
			chart_cursor: 0,
			detail_index: 0,
			chart_style,
			status: "Ready".to_string(),
		}
	}

	fn clamp_selection(&mut self, dashboard: &Dashboard) {
		self.month_cursor = self.month_cursor.min(dashboard.months().len());
		self.label_cursor = self.label_cursor.min(dashboard.labels().len().saturating_sub(1));
		self.chart_cursor = self.chart_cursor.min(dashboard.chart_rows().len().saturating_sub(1));
		self.detail_index = self.detail_index.min(dashboard.detail_count().saturating_sub(1));
	}
}
