// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the nerd command line.
//!
//! This crate provides:
//! - Layered configuration from defaults, `~/.nerd/config.toml`, `NERD_*`
//!   environment variables and command-line flags
//! - Type-safe resolved sections with validation
//!
//! # Usage
//!
//! ```ignore
//! use nerd_cli_config::{load_config, CliOverrides};
//!
//! let config = load_config(None, CliOverrides::default())?;
//! println!("namespace {}", config.kube.namespace);
//! ```

pub mod error;
pub mod layer;
pub mod paths;
pub mod sections;
pub mod sources;

use std::path::PathBuf;

pub use error::ConfigError;
pub use layer::NerdConfigLayer;
pub use paths::{default_config_path, resolve_config_path, CONFIG_PATH_ENV};
pub use sections::*;
pub use sources::{
	CliOverrides, CliSource, ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource,
};

use tracing::debug;

/// Fully resolved configuration.
#[derive(Debug, Clone, Default)]
pub struct NerdConfig {
	pub kube: KubeConfig,
	pub transfer: TransferConfig,
	pub logging: LoggingConfig,
	pub compliance: ComplianceConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Command-line flags
/// 2. Environment variables (`NERD_*`)
/// 3. Config file (`config_path`, else `NERD_CONFIG`, else `~/.nerd/config.toml`)
/// 4. Built-in defaults
pub fn load_config(config_path: Option<PathBuf>, cli: CliOverrides) -> Result<NerdConfig, ConfigError> {
	let path = resolve_config_path(config_path)?;
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(path)),
		Box::new(EnvSource::new()),
		Box::new(CliSource::new(cli)),
	])
}

/// Merge `sources` in precedence order and resolve the result.
pub fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<NerdConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = NerdConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Resolve a merged layer, applying defaults and validation.
pub fn finalize(layer: NerdConfigLayer) -> Result<NerdConfig, ConfigError> {
	let config = NerdConfig {
		kube: layer.kube.unwrap_or_default().finalize()?,
		transfer: layer.transfer.unwrap_or_default().finalize()?,
		logging: layer.logging.unwrap_or_default().finalize()?,
		compliance: layer.compliance.unwrap_or_default().finalize(),
	};

	debug!(
		namespace = %config.kube.namespace,
		kube_timeout_secs = config.kube.timeout_secs,
		bucket = %config.transfer.bucket,
		log_level = %config.logging.level,
		log_format = %config.logging.format,
		"configuration loaded"
	);
	Ok(config)
}

#[cfg(test)]
mod tests {
	use super::*;
	use nerd_common_core::{ErrorKind, Kinded};

	#[test]
	fn test_defaults_only() {
		let config = load_from_sources(vec![Box::new(DefaultsSource)]).unwrap();
		assert_eq!(config.kube.namespace, DEFAULT_NAMESPACE);
		assert_eq!(config.kube.timeout_secs, DEFAULT_KUBE_TIMEOUT_SECS);
		assert_eq!(config.logging.level, DEFAULT_LOG_LEVEL);
		assert_eq!(config.logging.format, LogFormat::Compact);
		assert_eq!(config.compliance.manifest_urls.len(), DEFAULT_MANIFEST_URLS.len());
	}

	#[test]
	fn test_errors_are_config_kind() {
		let err = ConfigError::validation("nope");
		assert_eq!(err.kind(), ErrorKind::Config);
		assert_eq!(err.kind().exit_code(), 255);
	}
}
