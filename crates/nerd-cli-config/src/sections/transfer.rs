// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Default object storage for new datasets.

use nerd_common_core::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TransferConfigLayer {
	pub bucket: Option<String>,
	/// Prepended to every object key; empty or ending in `/`.
	pub prefix: Option<String>,
	pub region: Option<String>,
	/// S3-compatible endpoint, addressed path-style.
	pub endpoint: Option<String>,
	pub access_key: Option<String>,
	pub secret_key: Option<SecretString>,
	pub session_token: Option<SecretString>,
	/// Deadline for push and pull; 0 means none.
	pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for TransferConfigLayer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TransferConfigLayer")
			.field("bucket", &self.bucket)
			.field("prefix", &self.prefix)
			.field("region", &self.region)
			.field("endpoint", &self.endpoint)
			.field("access_key", &self.access_key)
			.field("secret_key", &self.secret_key)
			.field("session_token", &self.session_token)
			.field("timeout_secs", &self.timeout_secs)
			.finish()
	}
}

impl TransferConfigLayer {
	pub fn merge(&mut self, other: TransferConfigLayer) {
		if other.bucket.is_some() {
			self.bucket = other.bucket;
		}
		if other.prefix.is_some() {
			self.prefix = other.prefix;
		}
		if other.region.is_some() {
			self.region = other.region;
		}
		if other.endpoint.is_some() {
			self.endpoint = other.endpoint;
		}
		if other.access_key.is_some() {
			self.access_key = other.access_key;
		}
		if other.secret_key.is_some() {
			self.secret_key = other.secret_key;
		}
		if other.session_token.is_some() {
			self.session_token = other.session_token;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
	}

	pub fn finalize(self) -> Result<TransferConfig, ConfigError> {
		let prefix = self.prefix.unwrap_or_default();
		if !prefix.is_empty() && !prefix.ends_with('/') {
			return Err(ConfigError::validation(format!(
				"transfer.prefix {prefix:?} must be empty or end with '/'"
			)));
		}
		Ok(TransferConfig {
			bucket: self.bucket.unwrap_or_default(),
			prefix,
			region: self
				.region
				.filter(|r| !r.is_empty())
				.unwrap_or_else(|| DEFAULT_REGION.to_string()),
			endpoint: self.endpoint.filter(|e| !e.is_empty()),
			access_key: self.access_key.unwrap_or_default(),
			secret_key: self.secret_key.unwrap_or_default(),
			session_token: self.session_token.unwrap_or_default(),
			timeout_secs: self.timeout_secs.unwrap_or(0),
		})
	}
}

#[derive(Clone, PartialEq, Eq)]
pub struct TransferConfig {
	pub bucket: String,
	pub prefix: String,
	pub region: String,
	pub endpoint: Option<String>,
	pub access_key: String,
	pub secret_key: SecretString,
	pub session_token: SecretString,
	pub timeout_secs: u64,
}

impl std::fmt::Debug for TransferConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TransferConfig")
			.field("bucket", &self.bucket)
			.field("prefix", &self.prefix)
			.field("region", &self.region)
			.field("endpoint", &self.endpoint)
			.field("access_key", &self.access_key)
			.field("secret_key", &self.secret_key)
			.field("session_token", &self.session_token)
			.field("timeout_secs", &self.timeout_secs)
			.finish()
	}
}

impl Default for TransferConfig {
	fn default() -> Self {
		Self {
			bucket: String::new(),
			prefix: String::new(),
			region: DEFAULT_REGION.to_string(),
			endpoint: None,
			access_key: String::new(),
			secret_key: SecretString::default(),
			session_token: SecretString::default(),
			timeout_secs: 0,
		}
	}
}
