use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::details::SortKey;

const CONFIG_ENV: &str = "VOC_DASHBOARD_CONFIG";
const DATA_ENV: &str = "VOC_DATA";
const LOCAL_CONFIG_FILE: &str = "voc_dashboard.toml";
const DEFAULT_DATA_FILE: &str = "exported_data.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartStyle {
	#[default]
	Line,
	Bar,
}

impl ChartStyle {
	pub fn toggled(self) -> Self {
		match self {
			ChartStyle::Line => ChartStyle::Bar,
			ChartStyle::Bar => ChartStyle::Line,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
	pub data_path: Option<PathBuf>,
	pub year: Option<i32>,
	pub sort: SortKey,
	pub chart: ChartStyle,
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config {}: {source}", .path.display())]
	Io {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error("failed to parse config {}: {source}", .path.display())]
	TomlDecode {
		path: PathBuf,
		source: toml::de::Error,
	},
}

/// Finds the config file: `--config`, then `VOC_DASHBOARD_CONFIG`, then
/// `voc_dashboard.toml` in the working directory. No file means defaults.
pub fn load_config(cli_path: Option<&Path>) -> Result<DashboardConfig, ConfigError> {
	if let Some(path) = cli_path {
		return read_config(path);
	}

	if let Some(path) = env::var_os(CONFIG_ENV) {
		let path = PathBuf::from(path);
		if !path.as_os_str().is_empty() {
			return read_config(&path);
		}
	}

	let local = PathBuf::from(LOCAL_CONFIG_FILE);
	if local.is_file() {
		return read_config(&local);
	}

	debug!("no config file found, using defaults");
	Ok(DashboardConfig::default())
}

pub fn parse_config(raw: &str, origin: &Path) -> Result<DashboardConfig, ConfigError> {
	toml::from_str(raw).map_err(|source| ConfigError::TomlDecode {
		path: origin.to_path_buf(),
		source,
	})
}

fn read_config(path: &Path) -> Result<DashboardConfig, ConfigError> {
	let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
		path: path.to_path_buf(),
		source,
	})?;
	let config = parse_config(&raw, path)?;
	debug!(path = %path.display(), ?config, "loaded config");
	Ok(config)
}

pub fn resolve_data_path(cli_path: Option<PathBuf>, config: &DashboardConfig) -> PathBuf {
	resolve_data_path_from(cli_path, env::var_os(DATA_ENV), config)
}

fn resolve_data_path_from(
	cli_path: Option<PathBuf>,
	env_path: Option<OsString>,
	config: &DashboardConfig,
) -> PathBuf {
	if let Some(path) = cli_path {
		return path;
	}

	if let Some(path) = env_path {
		let path = PathBuf::from(path);
		if !path.as_os_str().is_empty() {
			return path;
		}
	}

	config
		.data_path
		.clone()
		.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE))
}
