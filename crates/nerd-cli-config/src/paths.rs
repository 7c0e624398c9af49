// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Where the user config file lives.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "NERD_CONFIG";

/// `~/.nerd/config.toml`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
	let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
	Ok(home.join(".nerd").join("config.toml"))
}

/// The explicit path if given, then `NERD_CONFIG`, then the default.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
	if let Some(path) = explicit {
		return Ok(path);
	}
	match std::env::var_os(CONFIG_PATH_ENV).filter(|v| !v.is_empty()) {
		Some(path) => Ok(PathBuf::from(path)),
		None => default_config_path(),
	}
}
