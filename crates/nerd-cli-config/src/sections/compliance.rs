// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cluster bootstrap manifests.

use serde::{Deserialize, Serialize};

/// The dataset CRD, then the flex-volume driver's RBAC objects and daemonset.
pub const DEFAULT_MANIFEST_URLS: [&str; 3] = [
	"https://raw.githubusercontent.com/nerdalize/nerd/master/crd/dataset.yml",
	"https://raw.githubusercontent.com/nerdalize/nerd/master/flexvolume/rbac.yml",
	"https://raw.githubusercontent.com/nerdalize/nerd/master/flexvolume/daemonset.yml",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceConfigLayer {
	pub manifest_urls: Option<Vec<String>>,
}

impl ComplianceConfigLayer {
	pub fn merge(&mut self, other: ComplianceConfigLayer) {
		if other.manifest_urls.is_some() {
			self.manifest_urls = other.manifest_urls;
		}
	}

	pub fn finalize(self) -> ComplianceConfig {
		ComplianceConfig {
			manifest_urls: self
				.manifest_urls
				.unwrap_or_else(|| DEFAULT_MANIFEST_URLS.iter().map(|u| u.to_string()).collect()),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceConfig {
	pub manifest_urls: Vec<String>,
}

impl Default for ComplianceConfig {
	fn default() -> Self {
		ComplianceConfigLayer::default().finalize()
	}
}
