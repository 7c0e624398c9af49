// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Event;
use kube::api::{ApiResource, DynamicObject, ListParams, TypeMeta};
use nerd_common_core::Ctx;
use tracing::{debug, instrument};

use crate::client::{K8sClient, LogOptions};
use crate::error::{classify, KubeError, KubeResult};
use crate::resource::{
	generate_prefix, kind_name, prefixed, unprefixed, Managed, MANAGED_LABEL, MANAGED_PREFIXES,
	MANAGED_VALUE,
};

/// Upper bound on log bytes returned by a single fetch.
pub const MAX_LOG_BYTES: i64 = 1024 * 1024;

/// Extra predicates for list calls, on top of the `nerd-app=cli` label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
	labels: Vec<String>,
	fields: Vec<String>,
}

impl ListOptions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add a label predicate such as `registry=quay.io` or `!archived`.
	pub fn label(mut self, selector: impl Into<String>) -> Self {
		self.labels.push(selector.into());
		self
	}

	/// Add a field predicate such as `involvedObject.name=pod-1`.
	pub fn field(mut self, selector: impl Into<String>) -> Self {
		self.fields.push(selector.into());
		self
	}

	fn params(&self, managed_only: bool) -> ListParams {
		let mut labels = Vec::with_capacity(self.labels.len() + 1);
		if managed_only {
			labels.push(format!("{MANAGED_LABEL}={MANAGED_VALUE}"));
		}
		labels.extend(self.labels.iter().cloned());

		let mut params = ListParams::default();
		if !labels.is_empty() {
			params = params.labels(&labels.join(","));
		}
		if !self.fields.is_empty() {
			params = params.fields(&self.fields.join(","));
		}
		params
	}
}

/// Namespaced, prefix- and label-aware access to the cluster.
///
/// Names given to and returned from the Kubevisor never carry the kind's
/// prefix; it is added on the way in and stripped on the way out.
#[derive(Clone)]
pub struct Kubevisor {
	client: Arc<dyn K8sClient>,
	namespace: String,
}

impl std::fmt::Debug for Kubevisor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Kubevisor")
			.field("namespace", &self.namespace)
			.finish_non_exhaustive()
	}
}

impl Kubevisor {
	pub fn new(client: Arc<dyn K8sClient>, namespace: impl Into<String>) -> Self {
		Self {
			client,
			namespace: namespace.into(),
		}
	}

	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	/// Same client, different namespace.
	pub fn in_namespace(&self, namespace: impl Into<String>) -> Self {
		Self {
			client: self.client.clone(),
			namespace: namespace.into(),
		}
	}

	fn scope<K: Managed>(&self) -> Option<&str> {
		if K::CLUSTER_SCOPED {
			None
		} else {
			Some(&self.namespace)
		}
	}

	/// Create `obj` under `name`, or under a server-generated name when
	/// `name` is empty. Returns the stored object.
	#[instrument(skip(self, ctx, obj), fields(kind = %kind_name::<K>(), namespace = %self.namespace))]
	pub async fn create<K: Managed>(&self, ctx: &Ctx, mut obj: K, name: &str) -> KubeResult<K> {
		let kind = kind_name::<K>();
		if !K::PREFIX.is_empty() {
			if let Some(prefix) = MANAGED_PREFIXES.iter().find(|p| name.starts_with(*p)) {
				return Err(KubeError::InvalidName {
					kind,
					name: name.to_string(),
					message: format!("names may not start with the reserved prefix {prefix:?}"),
				});
			}
		}

		let meta = obj.meta_mut();
		if name.is_empty() {
			meta.name = None;
			meta.generate_name = Some(generate_prefix::<K>().to_string());
		} else {
			meta.name = Some(prefixed::<K>(name));
			meta.generate_name = None;
		}
		meta.namespace = self.scope::<K>().map(str::to_string);
		meta
			.labels
			.get_or_insert_with(BTreeMap::new)
			.insert(MANAGED_LABEL.to_string(), MANAGED_VALUE.to_string());

		let dynamic = to_dynamic(&obj)?;
		let created = ctx
			.run(self.client.create(&api_resource::<K>(), self.scope::<K>(), dynamic))
			.await?
			.map_err(|e| classify(e, &kind, name))?;

		let out = from_dynamic::<K>(created)?;
		debug!(name = ?out.meta().name, "created resource");
		Ok(out)
	}

	/// Read a namespaced resource by its unprefixed name.
	pub async fn get<K: Managed>(&self, ctx: &Ctx, name: &str) -> KubeResult<K> {
		self.get_in::<K>(ctx, self.scope::<K>(), name).await
	}

	/// Read a resource without namespacing the lookup.
	pub async fn get_cluster<K: Managed>(&self, ctx: &Ctx, name: &str) -> KubeResult<K> {
		self.get_in::<K>(ctx, None, name).await
	}

	async fn get_in<K: Managed>(&self, ctx: &Ctx, scope: Option<&str>, name: &str) -> KubeResult<K> {
		let kind = kind_name::<K>();
		let obj = ctx
			.run(self.client.get(&api_resource::<K>(), scope, &prefixed::<K>(name)))
			.await?
			.map_err(|e| classify(e, &kind, name))?;
		from_dynamic::<K>(obj)
	}

	/// Replace a resource previously read with [`Kubevisor::get`]. The
	/// apiserver rejects the write when the object changed in between.
	#[instrument(skip(self, ctx, obj), fields(kind = %kind_name::<K>(), namespace = %self.namespace))]
	pub async fn update<K: Managed>(&self, ctx: &Ctx, mut obj: K, name: &str) -> KubeResult<K> {
		let kind = kind_name::<K>();
		let stored_name = prefixed::<K>(name);
		let meta = obj.meta_mut();
		meta.name = Some(stored_name.clone());
		meta.namespace = self.scope::<K>().map(str::to_string);
		meta
			.labels
			.get_or_insert_with(BTreeMap::new)
			.insert(MANAGED_LABEL.to_string(), MANAGED_VALUE.to_string());

		let dynamic = to_dynamic(&obj)?;
		let updated = ctx
			.run(
				self
					.client
					.replace(&api_resource::<K>(), self.scope::<K>(), &stored_name, dynamic),
			)
			.await?
			.map_err(|e| classify(e, &kind, name))?;
		debug!("updated resource");
		from_dynamic::<K>(updated)
	}

	#[instrument(skip(self, ctx), fields(kind = %kind_name::<K>(), namespace = %self.namespace))]
	pub async fn delete<K: Managed>(&self, ctx: &Ctx, name: &str) -> KubeResult<()> {
		let kind = kind_name::<K>();
		ctx
			.run(
				self
					.client
					.delete(&api_resource::<K>(), self.scope::<K>(), &prefixed::<K>(name)),
			)
			.await?
			.map_err(|e| classify(e, &kind, name))?;
		debug!("deleted resource");
		Ok(())
	}

	/// List managed resources of one kind. Only objects labeled
	/// `nerd-app=cli` are returned, with their prefixes stripped.
	pub async fn list<K: Managed>(&self, ctx: &Ctx, opts: &ListOptions) -> KubeResult<Vec<K>> {
		self.list_with::<K>(ctx, opts, true).await
	}

	/// List events in the namespace. Events are emitted by the cluster and
	/// never carry the managed label, so only `opts` filters apply.
	pub async fn list_events(&self, ctx: &Ctx, opts: &ListOptions) -> KubeResult<Vec<Event>> {
		self.list_with::<Event>(ctx, opts, false).await
	}

	async fn list_with<K: Managed>(
		&self,
		ctx: &Ctx,
		opts: &ListOptions,
		managed_only: bool,
	) -> KubeResult<Vec<K>> {
		let kind = kind_name::<K>();
		let items = ctx
			.run(
				self
					.client
					.list(&api_resource::<K>(), self.scope::<K>(), &opts.params(managed_only)),
			)
			.await?
			.map_err(|e| classify(e, &kind, ""))?;
		items.into_iter().map(from_dynamic::<K>).collect()
	}

	/// Fetch logs of one container of a pod in the namespace.
	pub async fn pod_logs(&self, ctx: &Ctx, pod: &str, opts: &LogOptions) -> KubeResult<String> {
		ctx
			.run(self.client.pod_logs(&self.namespace, pod, opts))
			.await?
			.map_err(|e| classify(e, "Pod", pod))
	}
}

pub(crate) fn api_resource<K: Managed>() -> ApiResource {
	ApiResource::erase::<K>(&())
}

fn type_meta<K: Managed>() -> TypeMeta {
	TypeMeta {
		api_version: K::api_version(&()).into_owned(),
		kind: K::kind(&()).into_owned(),
	}
}

fn to_dynamic<K: Managed>(obj: &K) -> KubeResult<DynamicObject> {
	let kind = kind_name::<K>();
	let value = serde_json::to_value(obj).map_err(|source| KubeError::Serialization {
		kind: kind.clone(),
		source,
	})?;
	let mut dynamic: DynamicObject =
		serde_json::from_value(value).map_err(|source| KubeError::Serialization { kind, source })?;
	dynamic.types = Some(type_meta::<K>());
	Ok(dynamic)
}

fn from_dynamic<K: Managed>(mut obj: DynamicObject) -> KubeResult<K> {
	let kind = kind_name::<K>();
	obj.types = Some(type_meta::<K>());
	let value = serde_json::to_value(&obj).map_err(|source| KubeError::Serialization {
		kind: kind.clone(),
		source,
	})?;
	let mut typed: K =
		serde_json::from_value(value).map_err(|source| KubeError::Serialization { kind, source })?;
	let meta = typed.meta_mut();
	if let Some(name) = meta.name.take() {
		meta.name = Some(unprefixed::<K>(&name));
	}
	Ok(typed)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dataset::{Dataset, DatasetSpec};
	use crate::mock::MockK8sClient;
	use k8s_openapi::api::batch::v1::Job;
	use k8s_openapi::api::core::v1::{Pod, Secret};
	use nerd_common_core::{ErrorKind, Kinded};

	fn kubevisor() -> (Arc<MockK8sClient>, Kubevisor) {
		let mock = Arc::new(MockK8sClient::new());
		let kv = Kubevisor::new(mock.clone(), "tenant");
		(mock, kv)
	}

	fn dataset() -> Dataset {
		Dataset::new("", DatasetSpec::default())
	}

	#[test]
	fn list_params_put_managed_label_first() {
		let opts = ListOptions::new().label("registry=quay.io").field("metadata.name=x");
		let params = opts.params(true);
		assert_eq!(
			params.label_selector.as_deref(),
			Some("nerd-app=cli,registry=quay.io")
		);
		assert_eq!(params.field_selector.as_deref(), Some("metadata.name=x"));

		let params = ListOptions::new().params(false);
		assert_eq!(params.label_selector, None);
	}

	#[tokio::test]
	async fn create_prefixes_and_labels() {
		let (mock, kv) = kubevisor();
		let ctx = Ctx::background();

		let created = kv.create(&ctx, dataset(), "ds1").await.unwrap();
		assert_eq!(created.metadata.name.as_deref(), Some("ds1"));
		assert_eq!(created.metadata.namespace.as_deref(), Some("tenant"));
		assert_eq!(
			created.metadata.labels.as_ref().unwrap().get(MANAGED_LABEL).map(String::as_str),
			Some(MANAGED_VALUE)
		);
		assert!(mock.contains("datasets", Some("tenant"), "d-ds1"));
	}

	#[tokio::test]
	async fn create_with_empty_name_generates_one() {
		let (_mock, kv) = kubevisor();
		let ctx = Ctx::background();

		let job = kv.create(&ctx, Job::default(), "").await.unwrap();
		let name = job.metadata.name.unwrap();
		assert!(!name.is_empty());
		assert!(!name.starts_with("j-"));

		let again: Job = kv.get(&ctx, &name).await.unwrap();
		assert_eq!(again.metadata.name.as_deref(), Some(name.as_str()));
	}

	#[tokio::test]
	async fn reserved_prefixes_are_rejected() {
		let (_mock, kv) = kubevisor();
		let err = kv
			.create(&Ctx::background(), dataset(), "j-sneaky")
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::InvalidName);
	}

	#[tokio::test]
	async fn get_missing_is_not_exists() {
		let (_mock, kv) = kubevisor();
		let err = kv.get::<Secret>(&Ctx::background(), "nope").await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NotExists);
		assert!(err.to_string().contains("nope"));
	}

	#[tokio::test]
	async fn list_hides_unlabeled_objects() {
		let (mock, kv) = kubevisor();
		let ctx = Ctx::background();
		kv.create(&ctx, dataset(), "mine").await.unwrap();
		let mut foreign = dataset();
		foreign.metadata.name = Some("d-foreign".to_string());
		foreign.metadata.namespace = Some("tenant".to_string());
		mock.insert(foreign);

		let listed: Vec<Dataset> = kv.list(&ctx, &ListOptions::new()).await.unwrap();
		let names: Vec<_> = listed.iter().filter_map(|d| d.metadata.name.clone()).collect();
		assert_eq!(names, vec!["mine".to_string()]);
	}

	#[tokio::test]
	async fn update_after_concurrent_write_is_race() {
		let (_mock, kv) = kubevisor();
		let ctx = Ctx::background();
		kv.create(&ctx, dataset(), "ds").await.unwrap();

		let first: Dataset = kv.get(&ctx, "ds").await.unwrap();
		let second: Dataset = kv.get(&ctx, "ds").await.unwrap();

		let mut a = first.clone();
		a.spec.size = 1;
		kv.update(&ctx, a, "ds").await.unwrap();

		let mut b = second.clone();
		b.spec.size = 2;
		let err = kv.update(&ctx, b, "ds").await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::RaceCondition);
	}

	#[tokio::test]
	async fn cancelled_context_stops_calls() {
		let (_mock, kv) = kubevisor();
		let ctx = Ctx::background();
		ctx.cancel();
		let err = kv.list::<Pod>(&ctx, &ListOptions::new()).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Cancelled);
	}
}
