// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The service handle every operation hangs off.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use nerd_kube::{KubeClient, Kubevisor};
use nerd_transfer::Manager;
use tracing::info;

use crate::error::SvcResult;
use crate::validate::required;

/// Where and how to reach the cluster.
#[derive(Debug, Clone, Default)]
pub struct KubeSettings {
	pub namespace: String,
	/// Kubeconfig file; `None` falls back to in-cluster config, then
	/// `KUBECONFIG` and `~/.kube/config`.
	pub kubeconfig: Option<PathBuf>,
	pub context: Option<String>,
}

/// Service operations against one namespace.
///
/// Cheap to clone; clones share the underlying client.
#[derive(Debug, Clone)]
pub struct Kube {
	pub(crate) kv: Kubevisor,
}

impl Kube {
	pub fn new(kv: Kubevisor) -> Self {
		Self { kv }
	}

	pub async fn connect(settings: &KubeSettings) -> SvcResult<Self> {
		required("namespace", &settings.namespace)?;
		let client =
			KubeClient::from_kubeconfig(settings.kubeconfig.as_deref(), settings.context.as_deref())
				.await?;
		info!(namespace = %settings.namespace, "connected to cluster");
		Ok(Self::new(Kubevisor::new(Arc::new(client), &settings.namespace)))
	}

	pub fn kubevisor(&self) -> &Kubevisor {
		&self.kv
	}

	pub fn namespace(&self) -> &str {
		self.kv.namespace()
	}

	/// A transfer manager whose dataset records live in this namespace.
	pub fn transfers(&self) -> Manager {
		Manager::new(Arc::new(self.clone()))
	}
}

pub(crate) fn time(t: &Option<Time>) -> Option<DateTime<Utc>> {
	t.as_ref().map(|t| t.0)
}

pub(crate) fn created_at(meta: &ObjectMeta) -> Option<DateTime<Utc>> {
	time(&meta.creation_timestamp)
}

pub(crate) fn name_of(meta: &ObjectMeta) -> String {
	meta.name.clone().unwrap_or_default()
}
