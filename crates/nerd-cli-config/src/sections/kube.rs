// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cluster connection section.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_KUBE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeConfigLayer {
	pub namespace: Option<String>,
	pub kubeconfig: Option<PathBuf>,
	/// Kubeconfig context to use instead of the current one.
	pub context: Option<String>,
	/// Deadline for control-plane calls.
	pub timeout_secs: Option<u64>,
}

impl KubeConfigLayer {
	/// Values from `other` take precedence when present.
	pub fn merge(&mut self, other: KubeConfigLayer) {
		if other.namespace.is_some() {
			self.namespace = other.namespace;
		}
		if other.kubeconfig.is_some() {
			self.kubeconfig = other.kubeconfig;
		}
		if other.context.is_some() {
			self.context = other.context;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
	}

	pub fn finalize(self) -> Result<KubeConfig, ConfigError> {
		let namespace = self
			.namespace
			.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
		if namespace.trim().is_empty() {
			return Err(ConfigError::validation("kube.namespace must not be empty"));
		}
		Ok(KubeConfig {
			namespace,
			kubeconfig: self.kubeconfig,
			context: self.context.filter(|c| !c.is_empty()),
			timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_KUBE_TIMEOUT_SECS),
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeConfig {
	pub namespace: String,
	pub kubeconfig: Option<PathBuf>,
	pub context: Option<String>,
	pub timeout_secs: u64,
}

impl Default for KubeConfig {
	fn default() -> Self {
		Self {
			namespace: DEFAULT_NAMESPACE.to_string(),
			kubeconfig: None,
			context: None,
			timeout_secs: DEFAULT_KUBE_TIMEOUT_SECS,
		}
	}
}
