// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{
	api::{Api, ApiResource, DeleteParams, DynamicObject, ListParams, LogParams, PostParams},
	config::{KubeConfigOptions, Kubeconfig},
	Client, Config,
};
use tracing::debug;

use crate::client::{K8sClient, LogOptions};
use crate::error::KubeError;

/// Production client implementation using the kube crate.
#[derive(Clone)]
pub struct KubeClient {
	client: Client,
}

impl KubeClient {
	/// Create a client that auto-discovers cluster configuration.
	///
	/// This will attempt to load config from:
	/// 1. In-cluster service account (`KUBERNETES_SERVICE_HOST`/`_PORT`)
	/// 2. KUBECONFIG environment variable
	/// 3. ~/.kube/config
	pub async fn new() -> Result<Self, KubeError> {
		Self::from_kubeconfig(None, None).await
	}

	/// Create a client from an explicit kubeconfig file and/or context.
	pub async fn from_kubeconfig(
		path: Option<&Path>,
		context: Option<&str>,
	) -> Result<Self, KubeError> {
		let options = KubeConfigOptions {
			context: context.map(str::to_string),
			..Default::default()
		};

		let config = match (path, context) {
			(Some(path), _) => {
				let kubeconfig = Kubeconfig::read_from(path).map_err(|e| KubeError::Config {
					message: format!("failed to read {}: {e}", path.display()),
				})?;
				Config::from_custom_kubeconfig(kubeconfig, &options)
					.await
					.map_err(|e| KubeError::Config {
						message: e.to_string(),
					})?
			}
			(None, Some(_)) => Config::from_kubeconfig(&options)
				.await
				.map_err(|e| KubeError::Config {
					message: e.to_string(),
				})?,
			(None, None) => Config::infer().await.map_err(|e| KubeError::Config {
				message: e.to_string(),
			})?,
		};

		let client = Client::try_from(config).map_err(|e| KubeError::Config {
			message: e.to_string(),
		})?;
		debug!("K8s client initialized");
		Ok(Self { client })
	}

	pub fn from_client(client: Client) -> Self {
		Self { client }
	}

	fn api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
		match namespace {
			Some(ns) => Api::namespaced_with(self.client.clone(), ns, resource),
			None => Api::all_with(self.client.clone(), resource),
		}
	}
}

#[async_trait]
impl K8sClient for KubeClient {
	async fn create(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		obj: DynamicObject,
	) -> Result<DynamicObject, kube::Error> {
		self
			.api(resource, namespace)
			.create(&PostParams::default(), &obj)
			.await
	}

	async fn get(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		name: &str,
	) -> Result<DynamicObject, kube::Error> {
		self.api(resource, namespace).get(name).await
	}

	async fn replace(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		name: &str,
		obj: DynamicObject,
	) -> Result<DynamicObject, kube::Error> {
		self
			.api(resource, namespace)
			.replace(name, &PostParams::default(), &obj)
			.await
	}

	async fn delete(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		name: &str,
	) -> Result<(), kube::Error> {
		self
			.api(resource, namespace)
			.delete(name, &DeleteParams::background())
			.await?;
		Ok(())
	}

	async fn list(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		params: &ListParams,
	) -> Result<Vec<DynamicObject>, kube::Error> {
		let list = self.api(resource, namespace).list(params).await?;
		Ok(list.items)
	}

	async fn pod_logs(
		&self,
		namespace: &str,
		pod: &str,
		opts: &LogOptions,
	) -> Result<String, kube::Error> {
		let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
		let lp = LogParams {
			container: Some(opts.container.clone()),
			limit_bytes: opts.limit_bytes,
			tail_lines: opts.tail_lines,
			..Default::default()
		};
		pods.logs(pod, &lp).await
	}
}
