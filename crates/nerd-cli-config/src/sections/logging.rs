// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Logging configuration section.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_LOG_LEVEL: &str = "warn";
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// How log lines are rendered on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	Pretty,
	#[default]
	Compact,
	Json,
}

impl FromStr for LogFormat {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"pretty" => Ok(LogFormat::Pretty),
			"compact" => Ok(LogFormat::Compact),
			"json" => Ok(LogFormat::Json),
			other => Err(ConfigError::invalid_value(
				"logging.format",
				format!("unknown format {other:?}, expected pretty, compact or json"),
			)),
		}
	}
}

impl fmt::Display for LogFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			LogFormat::Pretty => "pretty",
			LogFormat::Compact => "compact",
			LogFormat::Json => "json",
		})
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfigLayer {
	pub level: Option<String>,
	pub format: Option<String>,
}

impl LoggingConfigLayer {
	pub fn merge(&mut self, other: LoggingConfigLayer) {
		if other.level.is_some() {
			self.level = other.level;
		}
		if other.format.is_some() {
			self.format = other.format;
		}
	}

	pub fn finalize(self) -> Result<LoggingConfig, ConfigError> {
		let level = self
			.level
			.map(|l| l.to_ascii_lowercase())
			.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
		if !LOG_LEVELS.contains(&level.as_str()) {
			return Err(ConfigError::invalid_value(
				"logging.level",
				format!("unknown level {level:?}"),
			));
		}
		let format = match self.format {
			Some(f) => f.parse()?,
			None => LogFormat::default(),
		};
		Ok(LoggingConfig { level, format })
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
	pub level: String,
	pub format: LogFormat,
}

impl LoggingConfig {
	/// Default `EnvFilter` directive: our crates at the configured level.
	pub fn filter_directive(&self) -> String {
		format!("nerd={0},nerd_svc={0},nerd_kube={0},nerd_transfer={0}", self.level)
	}
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: DEFAULT_LOG_LEVEL.to_string(),
			format: LogFormat::default(),
		}
	}
}
