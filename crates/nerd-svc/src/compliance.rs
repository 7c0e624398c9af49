// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cluster bootstrap: checking for and installing the objects nerd needs.
//!
//! Bootstrap manifests are plain multi-document YAML served over HTTPS.
//! A cluster is compliant when every object they describe already exists.

use std::time::Duration;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use nerd_common_core::Ctx;
use nerd_kube::{
	ClusterRole, ClusterRoleBinding, CustomResourceDefinition, DaemonSet, Deployment, KubeError,
	Kubevisor, Managed, Role, RoleBinding, ServiceAccount,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{SvcError, SvcResult};
use crate::kube::Kube;

/// Client timeout for manifest downloads.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// One decoded bootstrap object.
#[derive(Debug, Clone)]
pub enum Manifest {
	Crd(CustomResourceDefinition),
	ClusterRole(ClusterRole),
	ClusterRoleBinding(ClusterRoleBinding),
	Role(Role),
	RoleBinding(RoleBinding),
	ServiceAccount(ServiceAccount),
	DaemonSet(DaemonSet),
	Deployment(Deployment),
}

impl Manifest {
	pub fn meta(&self) -> &ObjectMeta {
		match self {
			Manifest::Crd(o) => &o.metadata,
			Manifest::ClusterRole(o) => &o.metadata,
			Manifest::ClusterRoleBinding(o) => &o.metadata,
			Manifest::Role(o) => &o.metadata,
			Manifest::RoleBinding(o) => &o.metadata,
			Manifest::ServiceAccount(o) => &o.metadata,
			Manifest::DaemonSet(o) => &o.metadata,
			Manifest::Deployment(o) => &o.metadata,
		}
	}

	pub fn kind(&self) -> &'static str {
		match self {
			Manifest::Crd(_) => "CustomResourceDefinition",
			Manifest::ClusterRole(_) => "ClusterRole",
			Manifest::ClusterRoleBinding(_) => "ClusterRoleBinding",
			Manifest::Role(_) => "Role",
			Manifest::RoleBinding(_) => "RoleBinding",
			Manifest::ServiceAccount(_) => "ServiceAccount",
			Manifest::DaemonSet(_) => "DaemonSet",
			Manifest::Deployment(_) => "Deployment",
		}
	}

	pub fn name(&self) -> &str {
		self.meta().name.as_deref().unwrap_or_default()
	}

	/// `Kind/name`, as shown in compliance reports.
	pub fn label(&self) -> String {
		format!("{}/{}", self.kind(), self.name())
	}
}

fn decode<K: Managed>(url: &str, value: serde_yaml::Value) -> SvcResult<K> {
	serde_yaml::from_value(value).map_err(|e| SvcError::Manifest {
		url: url.to_string(),
		message: e.to_string(),
	})
}

/// Decode every document of a multi-document YAML manifest. Empty
/// documents are skipped.
pub fn parse_manifests(url: &str, yaml: &str) -> SvcResult<Vec<Manifest>> {
	let malformed = |message: String| SvcError::Manifest {
		url: url.to_string(),
		message,
	};

	let mut out = Vec::new();
	for document in serde_yaml::Deserializer::from_str(yaml) {
		let value = serde_yaml::Value::deserialize(document).map_err(|e| malformed(e.to_string()))?;
		if value.is_null() {
			continue;
		}
		let kind = value
			.get("kind")
			.and_then(serde_yaml::Value::as_str)
			.ok_or_else(|| malformed("document has no kind".to_string()))?
			.to_string();
		let manifest = match kind.as_str() {
			"CustomResourceDefinition" => Manifest::Crd(decode(url, value)?),
			"ClusterRole" => Manifest::ClusterRole(decode(url, value)?),
			"ClusterRoleBinding" => Manifest::ClusterRoleBinding(decode(url, value)?),
			"Role" => Manifest::Role(decode(url, value)?),
			"RoleBinding" => Manifest::RoleBinding(decode(url, value)?),
			"ServiceAccount" => Manifest::ServiceAccount(decode(url, value)?),
			"DaemonSet" => Manifest::DaemonSet(decode(url, value)?),
			"Deployment" => Manifest::Deployment(decode(url, value)?),
			_ => {
				return Err(SvcError::ManifestKind {
					url: url.to_string(),
					kind,
				})
			}
		};
		if manifest.name().is_empty() {
			return Err(malformed(format!("{kind} has no metadata.name")));
		}
		out.push(manifest);
	}
	Ok(out)
}

/// Where the bootstrap manifests live and how to fetch them.
#[derive(Debug, Clone)]
pub struct Compliance {
	http: reqwest::Client,
	urls: Vec<String>,
}

impl Compliance {
	pub fn new(urls: Vec<String>) -> SvcResult<Self> {
		let http = reqwest::Client::builder()
			.timeout(FETCH_TIMEOUT)
			.build()
			.map_err(|source| SvcError::HttpClient { source })?;
		Ok(Self { http, urls })
	}

	pub fn urls(&self) -> &[String] {
		&self.urls
	}

	/// Download and decode every manifest, in URL order.
	#[instrument(skip(self, ctx), fields(urls = self.urls.len()))]
	pub async fn fetch(&self, ctx: &Ctx) -> SvcResult<Vec<Manifest>> {
		if self.urls.is_empty() {
			return Err(SvcError::NoInput {
				what: "manifest urls",
			});
		}
		let mut manifests = Vec::new();
		for url in &self.urls {
			let body = ctx.run(self.fetch_one(url)).await??;
			let parsed = parse_manifests(url, &body)?;
			debug!(%url, objects = parsed.len(), "fetched manifest");
			manifests.extend(parsed);
		}
		Ok(manifests)
	}

	async fn fetch_one(&self, url: &str) -> SvcResult<String> {
		let fetch_err = |source| SvcError::Fetch {
			url: url.to_string(),
			source,
		};
		let response = self
			.http
			.get(url)
			.send()
			.await
			.and_then(reqwest::Response::error_for_status)
			.map_err(fetch_err)?;
		response.text().await.map_err(fetch_err)
	}
}

/// Outcome of a compliance probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComplianceReport {
	pub compliant: bool,
	/// `Kind/name` of every object not found on the cluster.
	pub missing: Vec<String>,
}

impl Kube {
	/// Manifests carrying their own namespace are looked up and created
	/// there; the rest go to the service namespace.
	fn kubevisor_for(&self, meta: &ObjectMeta) -> Kubevisor {
		match meta.namespace.as_deref() {
			Some(ns) if !ns.is_empty() => self.kv.in_namespace(ns),
			_ => self.kv.clone(),
		}
	}

	async fn manifest_exists(&self, ctx: &Ctx, manifest: &Manifest) -> SvcResult<bool> {
		async fn exists<K: Managed>(kv: &Kubevisor, ctx: &Ctx, name: &str) -> SvcResult<bool> {
			match kv.get::<K>(ctx, name).await {
				Ok(_) => Ok(true),
				Err(KubeError::NotExists { .. }) => Ok(false),
				Err(e) => Err(e.into()),
			}
		}

		let kv = self.kubevisor_for(manifest.meta());
		let name = manifest.name();
		match manifest {
			Manifest::Crd(_) => exists::<CustomResourceDefinition>(&kv, ctx, name).await,
			Manifest::ClusterRole(_) => exists::<ClusterRole>(&kv, ctx, name).await,
			Manifest::ClusterRoleBinding(_) => exists::<ClusterRoleBinding>(&kv, ctx, name).await,
			Manifest::Role(_) => exists::<Role>(&kv, ctx, name).await,
			Manifest::RoleBinding(_) => exists::<RoleBinding>(&kv, ctx, name).await,
			Manifest::ServiceAccount(_) => exists::<ServiceAccount>(&kv, ctx, name).await,
			Manifest::DaemonSet(_) => exists::<DaemonSet>(&kv, ctx, name).await,
			Manifest::Deployment(_) => exists::<Deployment>(&kv, ctx, name).await,
		}
	}

	/// Check which of `manifests` already exist on the cluster.
	#[instrument(skip(self, ctx, manifests), fields(manifests = manifests.len()))]
	pub async fn probe_manifests(&self, ctx: &Ctx, manifests: &[Manifest]) -> SvcResult<ComplianceReport> {
		let mut missing = Vec::new();
		for manifest in manifests {
			if !self.manifest_exists(ctx, manifest).await? {
				missing.push(manifest.label());
			}
		}
		Ok(ComplianceReport {
			compliant: missing.is_empty(),
			missing,
		})
	}

	/// Fetch the bootstrap manifests and probe the cluster for them.
	pub async fn is_nerd_compliant(&self, ctx: &Ctx, compliance: &Compliance) -> SvcResult<ComplianceReport> {
		let manifests = compliance.fetch(ctx).await?;
		self.probe_manifests(ctx, &manifests).await
	}

	/// Create each manifest's object. Objects that appeared since the
	/// probe are left alone. Returns the `Kind/name` of everything created.
	#[instrument(skip(self, ctx, manifests), fields(manifests = manifests.len()))]
	pub async fn apply_manifests(&self, ctx: &Ctx, manifests: Vec<Manifest>) -> SvcResult<Vec<String>> {
		async fn create<K: Managed>(kv: &Kubevisor, ctx: &Ctx, obj: K, name: &str) -> SvcResult<bool> {
			match kv.create(ctx, obj, name).await {
				Ok(_) => Ok(true),
				Err(KubeError::AlreadyExists { .. }) => Ok(false),
				Err(e) => Err(e.into()),
			}
		}

		let mut applied = Vec::new();
		for manifest in manifests {
			let kv = self.kubevisor_for(manifest.meta());
			let label = manifest.label();
			let name = manifest.name().to_string();
			let created = match manifest {
				Manifest::Crd(o) => create(&kv, ctx, o, &name).await?,
				Manifest::ClusterRole(o) => create(&kv, ctx, o, &name).await?,
				Manifest::ClusterRoleBinding(o) => create(&kv, ctx, o, &name).await?,
				Manifest::Role(o) => create(&kv, ctx, o, &name).await?,
				Manifest::RoleBinding(o) => create(&kv, ctx, o, &name).await?,
				Manifest::ServiceAccount(o) => create(&kv, ctx, o, &name).await?,
				Manifest::DaemonSet(o) => create(&kv, ctx, o, &name).await?,
				Manifest::Deployment(o) => create(&kv, ctx, o, &name).await?,
			};
			if created {
				info!(object = %label, "applied manifest");
				applied.push(label);
			} else {
				debug!(object = %label, "already present");
			}
		}
		Ok(applied)
	}

	/// Install whatever the bootstrap manifests describe that the cluster
	/// lacks. Returns the `Kind/name` of everything created.
	pub async fn add_nerd_dependencies(&self, ctx: &Ctx, compliance: &Compliance) -> SvcResult<Vec<String>> {
		let manifests = compliance.fetch(ctx).await?;
		let mut missing = Vec::new();
		for manifest in manifests {
			if !self.manifest_exists(ctx, &manifest).await? {
				missing.push(manifest);
			}
		}
		self.apply_manifests(ctx, missing).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use nerd_common_core::{ErrorKind, Kinded};

	const FLEX: &str = r#"
apiVersion: v1
kind: ServiceAccount
metadata:
  name: flexvolume
  namespace: kube-system
---
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRole
metadata:
  name: flexvolume
rules:
  - apiGroups: ["stable.nerdalize.com"]
    resources: ["datasets"]
    verbs: ["get", "list"]
---
"#;

	#[test]
	fn multi_document_manifests_decode_in_order() {
		let manifests = parse_manifests("https://x/flex.yml", FLEX).unwrap();
		let labels: Vec<_> = manifests.iter().map(Manifest::label).collect();
		assert_eq!(labels, vec!["ServiceAccount/flexvolume", "ClusterRole/flexvolume"]);
		assert_eq!(manifests[0].meta().namespace.as_deref(), Some("kube-system"));
	}

	#[test]
	fn unknown_kinds_are_unsupported() {
		let yaml = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: c\n";
		let err = parse_manifests("u", yaml).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Unsupported);
		assert!(err.to_string().contains("ConfigMap"));
	}

	#[test]
	fn nameless_or_kindless_documents_are_malformed() {
		let err = parse_manifests("u", "apiVersion: v1\nmetadata: {}\n").unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Internal);
		let err = parse_manifests("u", "apiVersion: v1\nkind: ServiceAccount\nmetadata: {}\n").unwrap_err();
		assert!(err.to_string().contains("no metadata.name"));
	}

	#[tokio::test]
	async fn fetching_without_urls_is_no_input() {
		let compliance = Compliance::new(Vec::new()).unwrap();
		let err = compliance.fetch(&Ctx::background()).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NoInput);
	}
}
