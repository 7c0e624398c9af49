// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration error types.

use std::path::PathBuf;

use nerd_common_core::{ErrorKind, Kinded};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// Config file exists but could not be read
	#[error("failed to read {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// TOML parsing error
	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	/// An environment variable or flag held an unusable value
	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	/// Resolved configuration broke a rule
	#[error("validation error: {0}")]
	Validation(String),

	/// Home directory not found
	#[error("could not determine home directory")]
	HomeDirNotFound,
}

impl ConfigError {
	pub fn validation(msg: impl Into<String>) -> Self {
		Self::Validation(msg.into())
	}

	pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			key: key.into(),
			message: message.into(),
		}
	}
}

impl Kinded for ConfigError {
	fn kind(&self) -> ErrorKind {
		ErrorKind::Config
	}
}
