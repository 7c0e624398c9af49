// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject, ListParams};

/// Options for fetching container logs.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
	pub container: String,
	/// Upper bound on returned bytes, enforced by the apiserver.
	pub limit_bytes: Option<i64>,
	pub tail_lines: Option<i64>,
}

/// Trait for the raw apiserver calls the Kubevisor is built on.
///
/// Objects cross this seam untyped so the trait stays object-safe; the
/// Kubevisor converts to and from typed resources. A `None` namespace
/// addresses cluster-scoped resources. Errors are returned unclassified.
#[async_trait]
pub trait K8sClient: Send + Sync {
	async fn create(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		obj: DynamicObject,
	) -> Result<DynamicObject, kube::Error>;

	async fn get(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		name: &str,
	) -> Result<DynamicObject, kube::Error>;

	/// Replace an object; the apiserver rejects stale `resourceVersion`s.
	async fn replace(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		name: &str,
		obj: DynamicObject,
	) -> Result<DynamicObject, kube::Error>;

	/// Delete with background propagation so dependents follow.
	async fn delete(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		name: &str,
	) -> Result<(), kube::Error>;

	async fn list(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		params: &ListParams,
	) -> Result<Vec<DynamicObject>, kube::Error>;

	async fn pod_logs(
		&self,
		namespace: &str,
		pod: &str,
		opts: &LogOptions,
	) -> Result<String, kube::Error>;
}
