use std::error::Error;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voc_dashboard::aggregate::{BucketRow, DateFilter, LabelSet, view_total};
use voc_dashboard::config::{load_config, resolve_data_path};
use voc_dashboard::dashboard::{Dashboard, DashboardEvent, DashboardOptions};
use voc_dashboard::details::SortKey;
use voc_dashboard::domain::{MonthKey, Record};
use voc_dashboard::selection::MonthSelection;
use voc_dashboard::storage::load_records;
use voc_dashboard::ui::run_dashboard;

#[derive(Debug, Parser)]
#[command(name = "voc-dashboard", about = "Monthly and daily VOC label trends in the terminal")]
struct Cli {
	/// JSON or JSON Lines export to load.
	#[arg(long)]
	data: Option<PathBuf>,
	#[arg(long)]
	config: Option<PathBuf>,
	/// Only bucket months of this calendar year.
	#[arg(long)]
	year: Option<i32>,
	#[arg(long)]
	log_file: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Dashboard,
	Labels,
	Months {
		#[arg(long)]
		json: bool,
	},
	Days {
		#[arg(long)]
		month: MonthKey,
		#[arg(long)]
		json: bool,
	},
	Details {
		#[arg(long)]
		day: NaiveDate,
		#[arg(long = "label")]
		labels: Vec<String>,
		#[arg(long)]
		sort: Option<SortKey>,
		#[arg(long)]
		json: bool,
	},
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();
	let interactive = matches!(cli.command, None | Some(Command::Dashboard));
	init_tracing(cli.log_file.as_deref(), interactive)?;

	let config = load_config(cli.config.as_deref())?;
	let data_path = resolve_data_path(cli.data, &config);
	let store = load_records(&data_path)?;
	let options = DashboardOptions {
		filter: DateFilter {
			year: cli.year.or(config.year),
		},
		sort_key: config.sort,
	};
	let mut dashboard = Dashboard::new(store, options);

	match cli.command.unwrap_or(Command::Dashboard) {
		Command::Dashboard => {
			run_dashboard(&mut dashboard, config.chart)?;
		}
		Command::Labels => {
			print_labels(dashboard.labels());
		}
		Command::Months { json } => {
			print_rows(dashboard.monthly_rows(), dashboard.labels(), json)?;
		}
		Command::Days { month, json } => {
			dashboard.apply(DashboardEvent::SelectMonth(MonthSelection::Month(month)));
			print_rows(dashboard.daily_rows(), dashboard.labels(), json)?;
		}
		Command::Details {
			day,
			labels,
			sort,
			json,
		} => {
			drill_into_day(&mut dashboard, day, &labels, sort);
			print_details(&dashboard, json)?;
		}
	}

	Ok(())
}

fn init_tracing(log_file: Option<&Path>, interactive: bool) -> Result<(), Box<dyn Error>> {
	let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("voc_dashboard=info"))?;

	if let Some(path) = log_file {
		let file = OpenOptions::new().create(true).append(true).open(path)?;
		tracing_subscriber::fmt()
			.with_env_filter(filter)
			.with_writer(Mutex::new(file))
			.with_ansi(false)
			.with_target(false)
			.try_init()
			.map_err(|err| err.to_string())?;
		return Ok(());
	}

	// The alternate screen owns stderr while the dashboard runs.
	if interactive {
		return Ok(());
	}

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.compact()
		.try_init()
		.map_err(|err| err.to_string())?;
	Ok(())
}

fn drill_into_day(dashboard: &mut Dashboard, day: NaiveDate, labels: &[String], sort: Option<SortKey>) {
	dashboard.apply(DashboardEvent::SelectMonth(MonthSelection::Month(MonthKey::of(day))));
	if !labels.is_empty() {
		// A fresh month selects every label, so this clears them.
		dashboard.apply(DashboardEvent::ToggleSelectAll);
		for label in labels {
			if !dashboard.selection().is_label_selected(label) {
				dashboard.apply(DashboardEvent::ToggleLabel(label.clone()));
			}
		}
	}
	dashboard.apply(DashboardEvent::SelectDay(day));
	if let Some(sort) = sort {
		dashboard.apply(DashboardEvent::SetSortKey(sort));
	}
}

fn print_labels(labels: &LabelSet) {
	if labels.is_empty() {
		println!("no labels found");
		return;
	}

	for label in labels.iter() {
		println!("{label}");
	}
}

fn print_rows<K: std::fmt::Display + serde::Serialize>(
	rows: &[BucketRow<K>],
	labels: &LabelSet,
	json: bool,
) -> Result<(), Box<dyn Error>> {
	if json {
		println!("{}", serde_json::to_string_pretty(rows)?);
		return Ok(());
	}

	if rows.is_empty() {
		println!("no dated records");
		return Ok(());
	}

	for row in rows {
		let counts = labels
			.iter()
			.map(|label| format!("{label}={}", row.count(label)))
			.collect::<Vec<_>>()
			.join(" ");
		println!("{} | {:>5} | {}", row.bucket, row.total(), counts);
	}
	println!("total {}", view_total(rows));

	Ok(())
}

fn print_details(dashboard: &Dashboard, json: bool) -> Result<(), Box<dyn Error>> {
	if json {
		let records = dashboard.details().collect::<Vec<&Record>>();
		println!("{}", serde_json::to_string_pretty(&records)?);
		return Ok(());
	}

	if let Some(notice) = dashboard.notice() {
		println!("{notice}");
		return Ok(());
	}

	for record in dashboard.details() {
		let time = record
			.event_time()
			.map(|time| time.format("%Y-%m-%d %H:%M").to_string())
			.unwrap_or_default();
		println!(
			"{} | {} | {} | {}",
			time,
			record.id,
			record.label_csv.trim(),
			record.short_text()
		);
	}

	Ok(())
}
