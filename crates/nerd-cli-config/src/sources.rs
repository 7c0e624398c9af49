// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML file, environment and flags.

use std::collections::HashMap;
use std::path::PathBuf;

use nerd_common_core::SecretString;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::NerdConfigLayer;
use crate::sections::{
	ComplianceConfigLayer, KubeConfigLayer, LoggingConfigLayer, TransferConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
	Cli = 100,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<NerdConfigLayer, ConfigError>;
}

/// Built-in defaults source. Every default lives in the sections'
/// `finalize`, so this layer is empty.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<NerdConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(NerdConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<NerdConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(NerdConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: NerdConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: NERD_<SECTION>_<FIELD>, with `NERD_NAMESPACE` and
/// `NERD_LOG_LEVEL`/`NERD_LOG_FORMAT` as the short forms.
pub struct EnvSource {
	vars: Option<HashMap<String, String>>,
}

impl EnvSource {
	/// Reads the process environment.
	pub fn new() -> Self {
		Self { vars: None }
	}

	/// Reads from a fixed set of variables instead of the process environment.
	pub fn from_vars<I, K, V>(vars: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			vars: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		let value = match &self.vars {
			Some(vars) => vars.get(name).cloned(),
			None => std::env::var(name).ok(),
		};
		value.filter(|s| !s.is_empty())
	}

	fn u64(&self, name: &str) -> Result<Option<u64>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid u64 value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn list(&self, name: &str) -> Option<Vec<String>> {
		self.var(name).map(|s| {
			s.split(',')
				.map(|s| s.trim().to_string())
				.filter(|s| !s.is_empty())
				.collect()
		})
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<NerdConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(NerdConfigLayer {
			kube: Some(KubeConfigLayer {
				namespace: self.var("NERD_NAMESPACE"),
				kubeconfig: self.var("NERD_KUBECONFIG").map(PathBuf::from),
				context: self.var("NERD_KUBE_CONTEXT"),
				timeout_secs: self.u64("NERD_KUBE_TIMEOUT_SECS")?,
			}),
			transfer: Some(TransferConfigLayer {
				bucket: self.var("NERD_TRANSFER_BUCKET"),
				prefix: self.var("NERD_TRANSFER_PREFIX"),
				region: self.var("NERD_TRANSFER_REGION"),
				endpoint: self.var("NERD_TRANSFER_ENDPOINT"),
				access_key: self.var("NERD_TRANSFER_ACCESS_KEY"),
				secret_key: self.var("NERD_TRANSFER_SECRET_KEY").map(SecretString::from),
				session_token: self.var("NERD_TRANSFER_SESSION_TOKEN").map(SecretString::from),
				timeout_secs: self.u64("NERD_TRANSFER_TIMEOUT_SECS")?,
			}),
			logging: Some(LoggingConfigLayer {
				level: self.var("NERD_LOG_LEVEL"),
				format: self.var("NERD_LOG_FORMAT"),
			}),
			compliance: Some(ComplianceConfigLayer {
				manifest_urls: self.list("NERD_COMPLIANCE_MANIFEST_URLS"),
			}),
		})
	}
}

/// Values given as command-line flags.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
	pub namespace: Option<String>,
	pub kubeconfig: Option<PathBuf>,
	pub context: Option<String>,
	pub timeout_secs: Option<u64>,
	pub log_level: Option<String>,
	pub log_format: Option<String>,
}

pub struct CliSource {
	overrides: CliOverrides,
}

impl CliSource {
	pub fn new(overrides: CliOverrides) -> Self {
		Self { overrides }
	}
}

impl ConfigSource for CliSource {
	fn name(&self) -> &'static str {
		"cli"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Cli
	}

	fn load(&self) -> Result<NerdConfigLayer, ConfigError> {
		let o = self.overrides.clone();
		Ok(NerdConfigLayer {
			kube: Some(KubeConfigLayer {
				namespace: o.namespace,
				kubeconfig: o.kubeconfig,
				context: o.context,
				timeout_secs: o.timeout_secs,
			}),
			logging: Some(LoggingConfigLayer {
				level: o.log_level,
				format: o.log_format,
			}),
			..Default::default()
		})
	}
}
