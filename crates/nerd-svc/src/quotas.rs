// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resource quotas of the namespace.
//!
//! Every amount is reported in milli-units, memory included: a quota of
//! `1Gi` memory comes back as `1073741824000`.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use nerd_common_core::Ctx;
use nerd_kube::{parse_quantity, ListOptions, ResourceQuota};
use serde::Serialize;
use tracing::instrument;

use crate::error::SvcResult;
use crate::kube::{name_of, Kube};

pub const REQUESTS_CPU: &str = "requests.cpu";
pub const REQUESTS_MEMORY: &str = "requests.memory";
pub const LIMITS_CPU: &str = "limits.cpu";
pub const LIMITS_MEMORY: &str = "limits.memory";

/// One set of amounts, in milli-units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QuotaAmounts {
	pub requests_cpu: i64,
	pub requests_memory: i64,
	pub limits_cpu: i64,
	pub limits_memory: i64,
}

impl QuotaAmounts {
	fn from_map(map: Option<&BTreeMap<String, Quantity>>) -> SvcResult<Self> {
		let read = |key: &str| -> SvcResult<i64> {
			match map.and_then(|m| m.get(key)) {
				Some(q) => Ok(parse_quantity(&q.0)?),
				None => Ok(0),
			}
		};
		Ok(Self {
			requests_cpu: read(REQUESTS_CPU)?,
			requests_memory: read(REQUESTS_MEMORY)?,
			limits_cpu: read(LIMITS_CPU)?,
			limits_memory: read(LIMITS_MEMORY)?,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaOutput {
	pub name: String,
	pub hard: QuotaAmounts,
	pub used: QuotaAmounts,
}

fn quota_output(quota: &ResourceQuota) -> SvcResult<QuotaOutput> {
	let status = quota.status.as_ref();
	Ok(QuotaOutput {
		name: name_of(&quota.metadata),
		hard: QuotaAmounts::from_map(status.and_then(|s| s.hard.as_ref()))?,
		used: QuotaAmounts::from_map(status.and_then(|s| s.used.as_ref()))?,
	})
}

impl Kube {
	#[instrument(skip(self, ctx))]
	pub async fn list_quotas(&self, ctx: &Ctx) -> SvcResult<Vec<QuotaOutput>> {
		let quotas = self.kv.list::<ResourceQuota>(ctx, &ListOptions::new()).await?;
		quotas.iter().map(quota_output).collect()
	}
}
