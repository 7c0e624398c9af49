// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The mergeable shape every source produces.

use serde::{Deserialize, Serialize};

use crate::sections::{
	ComplianceConfigLayer, KubeConfigLayer, LoggingConfigLayer, TransferConfigLayer,
};

/// One source's view of the configuration. Absent sections and fields
/// leave lower layers untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NerdConfigLayer {
	pub kube: Option<KubeConfigLayer>,
	pub transfer: Option<TransferConfigLayer>,
	pub logging: Option<LoggingConfigLayer>,
	pub compliance: Option<ComplianceConfigLayer>,
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(b), Some(o)) => merge(b, o),
		(None, Some(o)) => *base = Some(o),
		(_, None) => {}
	}
}

impl NerdConfigLayer {
	/// Values from `other` take precedence when present.
	pub fn merge(&mut self, other: NerdConfigLayer) {
		merge_section(&mut self.kube, other.kube, KubeConfigLayer::merge);
		merge_section(&mut self.transfer, other.transfer, TransferConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_section(&mut self.compliance, other.compliance, ComplianceConfigLayer::merge);
	}
}
